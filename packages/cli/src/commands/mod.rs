pub mod inspect;
pub mod replay;

pub use inspect::{inspect, InspectArgs};
pub use replay::{replay, ReplayArgs};
