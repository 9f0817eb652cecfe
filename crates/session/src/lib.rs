//! Per-task session state: history, outbox, human-in-the-loop callbacks,
//! and terminal state.

pub mod callback;
pub mod session;

/// Single-use human answer handle and its responder side.
pub use callback::{Callback, CallbackSlot};
/// Session, its forked turn sequences, and the active-tool back-reference.
pub use session::{ActiveTool, Session, SessionState, Thread};
