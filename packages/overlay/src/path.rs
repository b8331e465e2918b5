//! # Structural Addresses
//!
//! A [`NodePath`] is the decoded form of a dot-separated address such as
//! `"2.0.1"`. The string form only exists at the DOM-attribute and message
//! boundaries; everything inside the engine compares index slices.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct NodePath(Vec<u32>);

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PathError {
    #[error("Invalid address `{address}`: segment `{segment}` is not a sibling index")]
    InvalidSegment { address: String, segment: String },

    #[error("The root address has no sibling index")]
    NoSiblingIndex,
}

impl NodePath {
    /// The empty address, denoting the root of a structure
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn new(indices: Vec<u32>) -> Self {
        Self(indices)
    }

    pub fn indices(&self) -> &[u32] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// All but the last component. The root is its own parent.
    pub fn parent(&self) -> NodePath {
        match self.0.split_last() {
            Some((_, rest)) => Self(rest.to_vec()),
            None => Self::root(),
        }
    }

    pub fn last_index(&self) -> Option<u32> {
        self.0.last().copied()
    }

    /// `(parent, last_index)`, the sibling slot this address names
    pub fn slot(&self) -> Result<(NodePath, u32), PathError> {
        let index = self.last_index().ok_or(PathError::NoSiblingIndex)?;
        Ok((self.parent(), index))
    }

    pub fn child(&self, index: u32) -> NodePath {
        let mut indices = self.0.clone();
        indices.push(index);
        Self(indices)
    }

    /// Same parent, different sibling index
    pub fn with_last_index(&self, index: u32) -> NodePath {
        self.parent().child(index)
    }

    /// True when `self` equals `other` or is one of its ancestors
    pub fn is_prefix_of(&self, other: &NodePath) -> bool {
        other.0.starts_with(&self.0)
    }

    /// Swap the `old_prefix` part of this address for `new_prefix`,
    /// keeping the relative suffix. `None` if `old_prefix` does not apply.
    pub fn rebase(&self, old_prefix: &NodePath, new_prefix: &NodePath) -> Option<NodePath> {
        if !old_prefix.is_prefix_of(self) {
            return None;
        }
        let mut indices = new_prefix.0.clone();
        indices.extend_from_slice(&self.0[old_prefix.0.len()..]);
        Some(Self(indices))
    }
}

impl From<Vec<u32>> for NodePath {
    fn from(indices: Vec<u32>) -> Self {
        Self(indices)
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, index) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", index)?;
        }
        Ok(())
    }
}

impl FromStr for NodePath {
    type Err = PathError;

    fn from_str(address: &str) -> Result<Self, Self::Err> {
        if address.is_empty() {
            return Ok(Self::root());
        }
        address
            .split('.')
            .map(|segment| {
                segment.parse::<u32>().map_err(|_| PathError::InvalidSegment {
                    address: address.to_string(),
                    segment: segment.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}
