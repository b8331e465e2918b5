//! # Canopy DOM
//!
//! The render-tree seam used by the canopy overlay engine.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ overlay: path indexing, drag/drop, modes    │
//! └─────────────────────────────────────────────┘
//!                     ↓ RenderTree
//! ┌──────────────────────┐  ┌───────────────────┐
//! │ MemoryDom (headless) │  │ WebDom (web-sys)  │
//! │  - fragment parser   │  │  canopy-wasm      │
//! │  - selector engine   │  │                   │
//! └──────────────────────┘  └───────────────────┘
//! ```
//!
//! The engine never caches node handles across operations; every query goes
//! through [`RenderTree`] against the live tree.

pub mod error;
pub mod fragment;
pub mod memory;
pub mod selector;
pub mod tokenizer;
pub mod tree;

pub use error::{DomError, DomResult};
pub use fragment::{parse_fragment, FragmentNode};
pub use memory::{MemoryDom, NodeId};
pub use selector::SelectorList;
pub use tree::{Rect, RenderTree};
