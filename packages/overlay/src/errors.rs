//! Error types for the overlay engine

use crate::path::PathError;
use canopy_dom::DomError;
use thiserror::Error;

pub type OverlayResult<T> = Result<T, OverlayError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OverlayError {
    /// An address does not resolve to a live element
    #[error("Target element not found: {structure}/{address}")]
    TargetNotFound { structure: String, address: String },

    /// A markup fragment parsed to zero elements
    #[error("Invalid HTML: fragment contains no element")]
    InvalidContent,

    /// A splice would create a cycle or the platform rejected it
    #[error("Hierarchy violation: {0}")]
    HierarchyViolation(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error(transparent)]
    Path(#[from] PathError),
}

impl OverlayError {
    pub fn not_found(structure: &str, address: &str) -> Self {
        Self::TargetNotFound {
            structure: structure.to_string(),
            address: address.to_string(),
        }
    }
}

impl From<DomError> for OverlayError {
    fn from(e: DomError) -> Self {
        match e {
            DomError::InvalidSelector { selector, .. } => OverlayError::InvalidSelector(selector),
            other => OverlayError::HierarchyViolation(other.to_string()),
        }
    }
}
