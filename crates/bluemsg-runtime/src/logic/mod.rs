//! Coordinator Logic
//!
//! The coordinator is the single owner of connection state. It is split into:
//! - `state`: state, statistics and the logger wrapper
//! - `handlers`: one handler per command and worker event
//! - `task`: the select loop that serializes all of them
//!
//! Workers never share state with the coordinator. They post `Event`s tagged
//! with their `WorkerId`; an event from a worker that has since been
//! cancelled or superseded is stale and is dropped (closing any stream it
//! carries), so the coordinator decides every race between an inbound
//! accept and an outbound connect in the order it sees them.

pub mod handlers;
pub mod state;
pub mod task;

pub use handlers::CoordinatorHandlers;
pub use state::{CoordinatorState, CoordinatorStats, LoggerWrapper};
pub use task::CoordinatorTask;
