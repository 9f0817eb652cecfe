//! Page driver seam between the navigator and a concrete browser.

use std::time::Duration;

use async_trait::async_trait;
use proto::ToolError;

use super::elements::ElementInfo;

/// An interaction against one addressed element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementAction {
    Click,
    Fill(String),
    Select(String),
    Enter,
}

impl ElementAction {
    pub fn verb(&self) -> &'static str {
        match self {
            ElementAction::Click => "click",
            ElementAction::Fill(_) => "fill",
            ElementAction::Select(_) => "select",
            ElementAction::Enter => "enter",
        }
    }
}

/// Interactive elements currently visible on the page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageScan {
    /// Token identifying the loaded document; changes on every navigation.
    pub document: String,
    pub title: String,
    pub url: String,
    pub elements: Vec<ElementInfo>,
}

/// Page-level operations the navigator needs from a browser backend.
///
/// Element ids are assigned by the page itself and stay attached to the
/// DOM nodes, so both the direct path and the DOM fallback can find them.
#[async_trait]
pub trait PageDriver: Send {
    async fn goto(&mut self, url: &str) -> Result<(), ToolError>;

    /// Token of the currently loaded document.
    async fn document_token(&mut self) -> Result<String, ToolError>;

    /// Tags not-yet-numbered visible interactive elements and lists all numbered ones.
    async fn scan(&mut self) -> Result<PageScan, ToolError>;

    /// Runs the action through the element's live handle.
    async fn perform(&mut self, id: u32, action: &ElementAction) -> Result<(), ToolError>;

    /// Runs the same action as an in-page DOM call keyed by the id.
    async fn perform_in_dom(&mut self, id: u32, action: &ElementAction) -> Result<(), ToolError>;

    async fn scroll(&mut self) -> Result<(), ToolError>;

    /// Resolves once no DOM mutation happened for `quiet`, or after `cap`.
    async fn wait_quiescent(&mut self, quiet: Duration, cap: Duration) -> Result<(), ToolError>;

    /// Returns up to `limit` unvisited matches for `selector` and marks them visited.
    async fn collect(&mut self, selector: &str, limit: usize) -> Result<Vec<String>, ToolError>;

    /// PNG-encoded capture of the viewport.
    async fn screenshot(&mut self) -> Result<Vec<u8>, ToolError>;

    async fn close(&mut self);
}
