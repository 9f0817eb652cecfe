//! Element-addressing browser navigator.
//!
//! Interactive elements on the current page get short integer ids that stay
//! valid for one page-load epoch. Actions address elements by those ids and
//! fall back to a DOM-level invocation when the live handle misbehaves.

mod cdp;
mod driver;
mod elements;
mod navigator;

pub use cdp::CdpPage;
pub use driver::{ElementAction, PageDriver, PageScan};
pub use elements::{ElementInfo, ElementTable, Snapshot};
pub use navigator::{NavOp, Navigator, NavigatorSettings, NavigatorTool};
