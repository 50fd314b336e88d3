//! BlueMsg Runtime Engine
//!
//! This crate contains the runtime for BlueMsg:
//! - `MessagingRuntime`: owns the coordinator task and its channels
//! - `CoordinatorTask`: the single owner of connection state
//! - Workers: scanner, listener, initiator and session tasks
//!
//! `bluemsg-core` provides the types; this crate provides the behavior.

pub mod builder;
pub mod logic;
mod runtime;
pub mod workers;

pub use builder::RuntimeBuilder;
pub use logic::{CoordinatorState, CoordinatorStats, CoordinatorTask, LoggerWrapper};
pub use runtime::*;
pub use workers::WorkerContext;

// Re-export core types for convenience
pub use bluemsg_core::{
    internal::{AppEventReceiver, CommandSender},
    AppEvent, BluemsgError, BluemsgResult, Command, ConnectionState, Message, PeerDevice, Sender, Snapshot,
    StatusDetail,
};
