//! Conversation orchestration
//!
//! [`Session`] is the pure state machine; [`Driver`] is the event loop
//! that feeds it and executes its commands; the restart policy holds
//! every re-arm delay in one table.

mod driver;
mod machine;
mod restart;

pub use driver::{Driver, DriverParts, UserAction};
pub use machine::{Command, ListeningMode, Phase, Session, SessionEvent};
pub use restart::RestartTrigger;
