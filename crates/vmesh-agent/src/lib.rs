//! Host-side agent for the vmesh control plane.
//!
//! One agent runs per host. It holds a live subscription to the host's
//! command queue in the coordination store, diff-detects newly-appeared
//! commands against its executed set, and runs each through the
//! [`CommandInterpreter`](interpreter::CommandInterpreter) into local
//! dataplane actions:
//!
//! - **[`CommandWatcher`](watcher::CommandWatcher)** — the Idle/Active
//!   state machine around the one-shot child watch: re-arm first, then
//!   process, so no queue change is ever missed.
//!
//! - **[`interpreter`]** — the consumed contracts for turning a command
//!   descriptor into ordered executable actions. The concrete dataplane
//!   side effects live outside this crate.
//!
//! Execution failures are written back to the store as error-log entries
//! and never abort sibling commands; the agent's job is to keep serving
//! the queue.

pub mod error;
pub mod interpreter;
pub mod watcher;

pub use error::AgentError;
pub use interpreter::{CommandExecutor, CommandInterpreter, ExecutionError, LogOnly};
pub use watcher::{CommandWatcher, WatcherState};
