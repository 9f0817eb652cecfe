//! Task dispatch service and its HTTP long-poll transport.

pub mod catalog;
pub mod dispatch;
pub mod server;

/// Task kinds and the credentials they need.
pub use catalog::{Credentials, TaskCatalog};
/// Session registry and background agent execution.
pub use dispatch::{DispatchService, PingStatus};
/// axum routes over the dispatch service.
pub use server::{HttpServer, router};
