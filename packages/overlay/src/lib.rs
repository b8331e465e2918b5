//! # Canopy Overlay
//!
//! The editing engine that runs inside the preview document. It keeps the
//! structural addresses on rendered elements consistent while the host
//! inserts, removes, duplicates and drags them, and talks to the host over a
//! flat JSON message channel.
//!
//! ```text
//! host ──Command──▶ Overlay ──▶ mutations / drag / selection / text_edit
//!                      │                    │
//!                      │                    ▼
//!                      │          reindex ──▶ registry ──▶ RenderTree
//!                      ▼
//! host ◀──Event──── outbox
//! ```
//!
//! The engine is generic over [`canopy_dom::RenderTree`] and runs the same
//! way against a browser document and a [`canopy_dom::MemoryDom`].

pub mod config;
pub mod drag;
pub mod errors;
pub mod gateway;
pub mod inspect;
pub mod mutations;
pub mod path;
pub mod protocol;
pub mod registry;
pub mod reindex;
pub mod selection;
pub mod session;
pub mod text_edit;

pub use config::{AttributeNames, ChannelConfig, Marker, OverlayConfig};
pub use drag::{can_drop_at, drop_zone, is_meaningful_move, Anchor, DragMachine, DragOutcome, DragState};
pub use errors::{OverlayError, OverlayResult};
pub use gateway::Overlay;
pub use inspect::{ElementInfo, StyleInfo};
pub use mutations::Position;
pub use path::{NodePath, PathError};
pub use protocol::{Command, Disposition, Event, InputEvent};
pub use registry::{Registry, Tagged};
pub use selection::{Mode, SelectionTracker};
pub use session::Session;
pub use text_edit::{TextChange, TextEdit, TextEditor};
