//! Element-addressing browser navigator and its tool bindings.

use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use proto::{ParamKind, ToolError, ToolSchema};
use reqwest::Url;
use serde::Deserialize;
use session::ActiveTool;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info};

use super::cdp::CdpPage;
use super::driver::{ElementAction, PageDriver};
use super::elements::{ElementTable, Snapshot};
use crate::{Tool, ToolContext, parse_args};

const DEFAULT_TIMEOUT_SECS: u64 = 15;
const MAX_TIMEOUT_SECS: u64 = 60;
const DEFAULT_QUIESCENCE_MS: u64 = 500;
const DEFAULT_COLLECT_LIMIT: usize = 10;

/// Launch and timing options for the navigator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigatorSettings {
    pub headless: bool,
    /// Bound for one direct or fallback element action.
    pub timeout: Duration,
    /// How long the DOM must stay unchanged to count as settled.
    pub quiescence: Duration,
}

impl NavigatorSettings {
    pub fn new(headless: bool, timeout_secs: u64, quiescence_ms: u64) -> Self {
        Self {
            headless,
            timeout: Duration::from_secs(timeout_secs.clamp(1, MAX_TIMEOUT_SECS)),
            quiescence: Duration::from_millis(quiescence_ms),
        }
    }
}

impl Default for NavigatorSettings {
    fn default() -> Self {
        Self::new(true, DEFAULT_TIMEOUT_SECS, DEFAULT_QUIESCENCE_MS)
    }
}

struct NavState {
    driver: Option<Box<dyn PageDriver>>,
    table: ElementTable,
}

/// One browser tab plus the id table for its current document.
///
/// Owned by a single task; internal steps run one at a time under the state lock.
pub struct Navigator {
    settings: NavigatorSettings,
    state: Mutex<NavState>,
}

fn validate_url(raw: &str) -> Result<String, ToolError> {
    let url = Url::parse(raw).map_err(|e| ToolError::InvalidArgs(format!("invalid url '{raw}': {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url.to_string()),
        other => Err(ToolError::InvalidArgs(format!(
            "unsupported url scheme '{other}': only http and https are allowed"
        ))),
    }
}

impl Navigator {
    /// Creates a navigator that launches Chromium on first use.
    pub fn new(settings: NavigatorSettings) -> Arc<Self> {
        Arc::new(Self {
            settings,
            state: Mutex::new(NavState {
                driver: None,
                table: ElementTable::new(),
            }),
        })
    }

    /// Creates a navigator over an already running page driver.
    pub fn with_driver(settings: NavigatorSettings, driver: Box<dyn PageDriver>) -> Arc<Self> {
        Arc::new(Self {
            settings,
            state: Mutex::new(NavState {
                driver: Some(driver),
                table: ElementTable::new(),
            }),
        })
    }

    pub fn settings(&self) -> &NavigatorSettings {
        &self.settings
    }

    /// Every navigator operation as a registrable tool.
    pub fn tools(self: &Arc<Self>) -> Vec<NavigatorTool> {
        NavOp::ALL
            .iter()
            .map(|&op| NavigatorTool {
                nav: Arc::clone(self),
                op,
            })
            .collect()
    }

    async fn ensure_driver<'a>(
        &self,
        slot: &'a mut Option<Box<dyn PageDriver>>,
    ) -> Result<&'a mut Box<dyn PageDriver>, ToolError> {
        if slot.is_none() {
            let page = CdpPage::launch(self.settings.headless).await?;
            *slot = Some(Box::new(page));
        }
        slot.as_mut()
            .ok_or_else(|| ToolError::ExecutionFailed("Browser page is not initialized".to_string()))
    }

    async fn settle(&self, page: &mut Box<dyn PageDriver>) {
        if let Err(e) = page
            .wait_quiescent(self.settings.quiescence, self.settings.timeout)
            .await
        {
            debug!(error = %e, "Page did not report quiescence");
        }
    }

    /// Navigates to an http(s) url and snapshots the new document.
    pub async fn open(&self, url: &str) -> Result<Snapshot, ToolError> {
        let url = validate_url(url)?;
        let mut state = self.state.lock().await;
        let NavState { driver, table } = &mut *state;
        let page = self.ensure_driver(driver).await?;

        timeout(self.settings.timeout, page.goto(&url))
            .await
            .map_err(|_| ToolError::Timeout(self.settings.timeout.as_secs()))??;
        self.settle(page).await;

        let snapshot = table.absorb(page.scan().await?);
        info!(url = %snapshot.url, epoch = snapshot.epoch, elements = snapshot.elements.len(), "Page opened");
        Ok(snapshot)
    }

    /// Re-scans the page, optionally attaching a screenshot for the model.
    pub async fn snapshot(&self, with_screenshot: bool) -> Result<Snapshot, ToolError> {
        let mut state = self.state.lock().await;
        let NavState { driver, table } = &mut *state;
        let page = self.ensure_driver(driver).await?;

        let mut snapshot = table.absorb(page.scan().await?);
        if with_screenshot {
            let png = page.screenshot().await?;
            snapshot.screenshot = Some(serde_json::json!({
                "mime": "image/png",
                "data_b64": general_purpose::STANDARD.encode(&png),
            }));
        }
        Ok(snapshot)
    }

    /// Runs `action` against element `id` issued in `epoch`, falling back to the DOM path.
    pub async fn act(&self, id: u32, epoch: u64, action: ElementAction) -> Result<Snapshot, ToolError> {
        let mut state = self.state.lock().await;
        let NavState { driver, table } = &mut *state;
        let page = self.ensure_driver(driver).await?;

        let document = page.document_token().await?;
        if table.sync(&document) {
            debug!(epoch = table.epoch(), "Document changed since last snapshot");
        }
        table.resolve(id, epoch)?;

        let limit = self.settings.timeout;
        let direct = match timeout(limit, page.perform(id, &action)).await {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => Some(format!("timed out after {}s", limit.as_secs())),
        };
        if let Some(reason) = direct {
            debug!(id, action = action.verb(), %reason, "Direct element action failed; using DOM fallback");
            match timeout(limit, page.perform_in_dom(id, &action)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    return Err(ToolError::ExecutionFailed(format!(
                        "{} on element {id} failed: {reason}; DOM fallback: {e}",
                        action.verb()
                    )));
                }
                Err(_) => return Err(ToolError::Timeout(limit.as_secs())),
            }
        }

        self.settle(page).await;
        Ok(table.absorb(page.scan().await?))
    }

    pub async fn scroll(&self) -> Result<Snapshot, ToolError> {
        let mut state = self.state.lock().await;
        let NavState { driver, table } = &mut *state;
        let page = self.ensure_driver(driver).await?;

        page.scroll().await?;
        self.settle(page).await;
        Ok(table.absorb(page.scan().await?))
    }

    /// Returns the next batch of unvisited items matching `selector`.
    pub async fn collect(&self, selector: &str, limit: usize) -> Result<serde_json::Value, ToolError> {
        let mut state = self.state.lock().await;
        let NavState { driver, table } = &mut *state;
        let page = self.ensure_driver(driver).await?;

        let document = page.document_token().await?;
        table.sync(&document);
        let items = page.collect(selector, limit).await?;
        Ok(serde_json::json!({
            "epoch": table.epoch(),
            "selector": selector,
            "items": items,
        }))
    }

    /// Closes the browser if it was launched. Safe to call repeatedly.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        if let Some(mut driver) = state.driver.take() {
            driver.close().await;
            info!("Browser closed");
        }
    }
}

#[async_trait]
impl ActiveTool for Navigator {
    fn label(&self) -> &str {
        "browser"
    }

    async fn screenshot(&self) -> Result<Vec<u8>, ToolError> {
        let mut state = self.state.lock().await;
        let page = state
            .driver
            .as_mut()
            .ok_or_else(|| ToolError::ExecutionFailed("Browser has not been opened".to_string()))?;
        page.screenshot().await
    }
}

/// Navigator operation exposed as a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavOp {
    Open,
    Snapshot,
    Click,
    Fill,
    Select,
    Enter,
    Scroll,
    Collect,
}

impl NavOp {
    pub const ALL: [NavOp; 8] = [
        NavOp::Open,
        NavOp::Snapshot,
        NavOp::Click,
        NavOp::Fill,
        NavOp::Select,
        NavOp::Enter,
        NavOp::Scroll,
        NavOp::Collect,
    ];
}

/// A [`Navigator`] operation bound to a shared navigator instance.
pub struct NavigatorTool {
    nav: Arc<Navigator>,
    op: NavOp,
}

#[derive(Debug, Deserialize)]
struct OpenArgs {
    url: String,
}

#[derive(Debug, Deserialize)]
struct SnapshotArgs {
    #[serde(default)]
    screenshot: bool,
}

#[derive(Debug, Deserialize)]
struct ElementArgs {
    id: u32,
    epoch: u64,
}

#[derive(Debug, Deserialize)]
struct ValueArgs {
    id: u32,
    epoch: u64,
    value: String,
}

#[derive(Debug, Deserialize)]
struct CollectArgs {
    selector: String,
    limit: Option<usize>,
}

fn element_schema() -> ToolSchema {
    ToolSchema::new()
        .required("id", ParamKind::Integer, "Element id from the latest snapshot")
        .required(
            "epoch",
            ParamKind::Integer,
            "Epoch of the snapshot the id came from; ids from earlier pages are rejected",
        )
}

impl NavigatorTool {
    pub fn op(&self) -> NavOp {
        self.op
    }

    fn encode(value: &impl serde::Serialize) -> Result<String, ToolError> {
        serde_json::to_string(value)
            .map_err(|e| ToolError::ExecutionFailed(format!("Failed to encode output: {e}")))
    }
}

#[async_trait]
impl Tool for NavigatorTool {
    fn name(&self) -> &str {
        match self.op {
            NavOp::Open => "browser.open",
            NavOp::Snapshot => "browser.snapshot",
            NavOp::Click => "browser.click",
            NavOp::Fill => "browser.fill",
            NavOp::Select => "browser.select",
            NavOp::Enter => "browser.enter",
            NavOp::Scroll => "browser.scroll",
            NavOp::Collect => "browser.collect",
        }
    }

    fn description(&self) -> &str {
        match self.op {
            NavOp::Open => "Open an http(s) URL and list its interactive elements by id",
            NavOp::Snapshot => "List the interactive elements on the current page, optionally with a screenshot",
            NavOp::Click => "Click the element with the given id",
            NavOp::Fill => "Replace the text of the input element with the given id",
            NavOp::Select => "Choose an option (by value or label) in the select element with the given id",
            NavOp::Enter => "Press Enter on the element with the given id",
            NavOp::Scroll => "Scroll the page down by most of one viewport",
            NavOp::Collect => "Return the next batch of not-yet-returned items matching a CSS selector",
        }
    }

    fn schema(&self) -> ToolSchema {
        match self.op {
            NavOp::Open => ToolSchema::new().required("url", ParamKind::String, "http or https URL"),
            NavOp::Snapshot => ToolSchema::new().optional(
                "screenshot",
                ParamKind::Boolean,
                "Attach a PNG screenshot of the viewport",
            ),
            NavOp::Click | NavOp::Enter => element_schema(),
            NavOp::Fill => element_schema().required("value", ParamKind::String, "Text to enter"),
            NavOp::Select => element_schema().required("value", ParamKind::String, "Option value or label"),
            NavOp::Scroll => ToolSchema::new(),
            NavOp::Collect => ToolSchema::new()
                .required("selector", ParamKind::String, "CSS selector of list items")
                .optional("limit", ParamKind::Integer, "Maximum items to return (default: 10)"),
        }
    }

    async fn execute(&self, ctx: &ToolContext, args: serde_json::Value) -> Result<String, ToolError> {
        let active = Arc::downgrade(&self.nav);
        let active: Weak<dyn ActiveTool> = active;
        ctx.session.set_active_tool(active);

        match self.op {
            NavOp::Open => {
                let parsed: OpenArgs = parse_args(args)?;
                Self::encode(&self.nav.open(&parsed.url).await?)
            }
            NavOp::Snapshot => {
                let parsed: SnapshotArgs = parse_args(args)?;
                Self::encode(&self.nav.snapshot(parsed.screenshot).await?)
            }
            NavOp::Click | NavOp::Enter => {
                let parsed: ElementArgs = parse_args(args)?;
                let action = if self.op == NavOp::Click {
                    ElementAction::Click
                } else {
                    ElementAction::Enter
                };
                Self::encode(&self.nav.act(parsed.id, parsed.epoch, action).await?)
            }
            NavOp::Fill | NavOp::Select => {
                let parsed: ValueArgs = parse_args(args)?;
                let action = if self.op == NavOp::Fill {
                    ElementAction::Fill(parsed.value)
                } else {
                    ElementAction::Select(parsed.value)
                };
                Self::encode(&self.nav.act(parsed.id, parsed.epoch, action).await?)
            }
            NavOp::Scroll => Self::encode(&self.nav.scroll().await?),
            NavOp::Collect => {
                let parsed: CollectArgs = parse_args(args)?;
                let limit = parsed.limit.unwrap_or(DEFAULT_COLLECT_LIMIT).max(1);
                Self::encode(&self.nav.collect(&parsed.selector, limit).await?)
            }
        }
    }

    async fn close(&self) {
        self.nav.close().await;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use parking_lot::Mutex as SyncMutex;
    use session::Session;

    use super::super::driver::PageScan;
    use super::super::elements::ElementInfo;
    use super::*;

    #[derive(Default)]
    struct FakeFlags {
        fail_direct: bool,
        fail_dom: bool,
        navigate_on_click: bool,
    }

    struct FakePage {
        log: Arc<SyncMutex<Vec<String>>>,
        flags: FakeFlags,
        document: u32,
        url: String,
        next_id: u32,
        pending: u32,
        visible: Vec<ElementInfo>,
        items: Vec<String>,
        visited: usize,
    }

    impl FakePage {
        fn new(flags: FakeFlags) -> (Self, Arc<SyncMutex<Vec<String>>>) {
            let log = Arc::new(SyncMutex::new(Vec::new()));
            let page = Self {
                log: Arc::clone(&log),
                flags,
                document: 0,
                url: "about:blank".into(),
                next_id: 0,
                pending: 0,
                visible: Vec::new(),
                items: ["a", "b", "c", "d", "e"].map(String::from).to_vec(),
                visited: 0,
            };
            (page, log)
        }

        fn load(&mut self, url: &str) {
            self.document += 1;
            self.url = url.to_string();
            self.next_id = 0;
            self.pending = 3;
            self.visible.clear();
            self.visited = 0;
        }
    }

    #[async_trait]
    impl PageDriver for FakePage {
        async fn goto(&mut self, url: &str) -> Result<(), ToolError> {
            self.log.lock().push(format!("goto:{url}"));
            self.load(url);
            Ok(())
        }

        async fn document_token(&mut self) -> Result<String, ToolError> {
            Ok(format!("doc-{}", self.document))
        }

        async fn scan(&mut self) -> Result<PageScan, ToolError> {
            for _ in 0..self.pending {
                let id = self.next_id;
                self.next_id += 1;
                self.visible.push(ElementInfo {
                    id,
                    tag: "button".into(),
                    role: None,
                    name: format!("button {id}"),
                    description: None,
                    attributes: BTreeMap::new(),
                });
            }
            self.pending = 0;
            Ok(PageScan {
                document: format!("doc-{}", self.document),
                title: format!("Page {}", self.document),
                url: self.url.clone(),
                elements: self.visible.clone(),
            })
        }

        async fn perform(&mut self, id: u32, action: &ElementAction) -> Result<(), ToolError> {
            self.log.lock().push(format!("direct:{id}:{}", action.verb()));
            if self.flags.fail_direct {
                return Err(ToolError::ExecutionFailed("element not interactable".into()));
            }
            if self.flags.navigate_on_click && *action == ElementAction::Click {
                self.load("https://example.com/next");
            } else {
                self.pending += 1;
            }
            Ok(())
        }

        async fn perform_in_dom(&mut self, id: u32, action: &ElementAction) -> Result<(), ToolError> {
            self.log.lock().push(format!("dom:{id}:{}", action.verb()));
            if self.flags.fail_dom {
                return Err(ToolError::ExecutionFailed(format!("element {id} is gone")));
            }
            Ok(())
        }

        async fn scroll(&mut self) -> Result<(), ToolError> {
            self.pending += 2;
            Ok(())
        }

        async fn wait_quiescent(&mut self, _quiet: Duration, _cap: Duration) -> Result<(), ToolError> {
            self.log.lock().push("settle".into());
            Ok(())
        }

        async fn collect(&mut self, _selector: &str, limit: usize) -> Result<Vec<String>, ToolError> {
            let end = (self.visited + limit).min(self.items.len());
            let batch = self.items[self.visited..end].to_vec();
            self.visited = end;
            Ok(batch)
        }

        async fn screenshot(&mut self) -> Result<Vec<u8>, ToolError> {
            Ok(vec![0x89, b'P', b'N', b'G'])
        }

        async fn close(&mut self) {
            self.log.lock().push("close".into());
        }
    }

    fn navigator(flags: FakeFlags) -> (Arc<Navigator>, Arc<SyncMutex<Vec<String>>>) {
        let (page, log) = FakePage::new(flags);
        (Navigator::with_driver(NavigatorSettings::default(), Box::new(page)), log)
    }

    #[tokio::test]
    async fn actions_report_newly_assigned_ids() {
        let (nav, log) = navigator(FakeFlags::default());
        let opened = nav.open("https://example.com").await.expect("open");
        assert_eq!(opened.epoch, 1);
        assert_eq!(opened.new_ids, vec![0, 1, 2]);

        let clicked = nav.act(1, 1, ElementAction::Click).await.expect("click");
        assert_eq!(clicked.epoch, 1);
        assert_eq!(clicked.new_ids, vec![3]);
        assert_eq!(clicked.elements.len(), 4);

        let entries = log.lock().clone();
        assert!(entries.contains(&"direct:1:click".to_string()));
        assert_eq!(entries.last().map(String::as_str), Some("settle"));
    }

    #[tokio::test]
    async fn ids_from_previous_epoch_fail_as_stale() {
        let flags = FakeFlags {
            navigate_on_click: true,
            ..Default::default()
        };
        let (nav, _log) = navigator(flags);
        nav.open("https://example.com").await.expect("open");

        let next = nav.act(0, 1, ElementAction::Click).await.expect("navigating click");
        assert_eq!(next.epoch, 2);
        assert_eq!(next.new_ids, vec![0, 1, 2]);

        let err = nav
            .act(1, 1, ElementAction::Click)
            .await
            .expect_err("old epoch");
        assert!(matches!(err, ToolError::StaleElementId { id: 1, epoch: 2 }));

        let err = nav.act(9, 2, ElementAction::Click).await.expect_err("unknown id");
        assert!(matches!(err, ToolError::StaleElementId { id: 9, .. }));
    }

    #[tokio::test]
    async fn failed_direct_action_falls_back_to_dom() {
        let flags = FakeFlags {
            fail_direct: true,
            ..Default::default()
        };
        let (nav, log) = navigator(flags);
        nav.open("https://example.com").await.expect("open");

        nav.act(2, 1, ElementAction::Fill("hello".into()))
            .await
            .expect("fallback succeeds");
        let entries = log.lock().clone();
        assert!(entries.contains(&"direct:2:fill".to_string()));
        assert!(entries.contains(&"dom:2:fill".to_string()));
    }

    #[tokio::test]
    async fn error_when_both_paths_fail() {
        let flags = FakeFlags {
            fail_direct: true,
            fail_dom: true,
            ..Default::default()
        };
        let (nav, _log) = navigator(flags);
        nav.open("https://example.com").await.expect("open");

        let err = nav.act(0, 1, ElementAction::Click).await.expect_err("both fail");
        let text = err.to_string();
        assert!(text.contains("click on element 0 failed"));
        assert!(text.contains("DOM fallback"));
    }

    #[tokio::test]
    async fn collect_never_repeats_items_within_epoch() {
        let (nav, _log) = navigator(FakeFlags::default());
        nav.open("https://example.com").await.expect("open");

        let first = nav.collect("li", 2).await.expect("first batch");
        let second = nav.collect("li", 2).await.expect("second batch");
        let third = nav.collect("li", 2).await.expect("third batch");
        assert_eq!(first["items"], serde_json::json!(["a", "b"]));
        assert_eq!(second["items"], serde_json::json!(["c", "d"]));
        assert_eq!(third["items"], serde_json::json!(["e"]));
    }

    #[tokio::test]
    async fn open_rejects_non_http_urls() {
        let (nav, log) = navigator(FakeFlags::default());
        let err = nav.open("file:///etc/passwd").await.expect_err("file scheme");
        assert!(matches!(err, ToolError::InvalidArgs(_)));
        assert!(err.to_string().contains("only http and https"));
        assert!(log.lock().is_empty());
    }

    #[tokio::test]
    async fn tool_execution_registers_active_tool_and_screenshots() {
        let (nav, log) = navigator(FakeFlags::default());
        let tools = nav.tools();
        let session = Session::new("browse");
        let ctx = ToolContext::new(Arc::clone(&session), "call-1");

        let open = tools
            .iter()
            .find(|t| t.name() == "browser.open")
            .expect("open tool");
        let output = open
            .execute(&ctx, serde_json::json!({"url": "https://example.com"}))
            .await
            .expect("open");
        let value: serde_json::Value = serde_json::from_str(&output).expect("json");
        assert_eq!(value["epoch"], 1);
        assert_eq!(value["title"], "Page 1");

        let active = session.active_tool().expect("active tool");
        assert_eq!(active.label(), "browser");
        assert_eq!(active.screenshot().await.expect("png")[1..4], *b"PNG");

        let snapshot = tools
            .iter()
            .find(|t| t.name() == "browser.snapshot")
            .expect("snapshot tool");
        let output = snapshot
            .execute(&ctx, serde_json::json!({"screenshot": true}))
            .await
            .expect("snapshot");
        let value: serde_json::Value = serde_json::from_str(&output).expect("json");
        assert_eq!(value["screenshot"]["mime"], "image/png");

        open.close().await;
        open.close().await;
        assert_eq!(log.lock().iter().filter(|e| *e == "close").count(), 1);
    }

    fn tool<'a>(tools: &'a [NavigatorTool], name: &str) -> &'a NavigatorTool {
        tools.iter().find(|t| t.name() == name).expect("tool")
    }

    #[tokio::test]
    async fn element_tools_never_act_on_reissued_ids() {
        let flags = FakeFlags {
            navigate_on_click: true,
            ..Default::default()
        };
        let (nav, log) = navigator(flags);
        let tools = nav.tools();
        let ctx = ToolContext::new(Session::new("browse"), "call-1");

        tool(&tools, "browser.open")
            .execute(&ctx, serde_json::json!({"url": "https://example.com"}))
            .await
            .expect("open");
        tool(&tools, "browser.click")
            .execute(&ctx, serde_json::json!({"id": 0, "epoch": 1}))
            .await
            .expect("navigating click");

        let err = tool(&tools, "browser.fill")
            .execute(&ctx, serde_json::json!({"id": 2, "value": "x"}))
            .await
            .expect_err("epoch is required");
        assert!(matches!(err, ToolError::InvalidArgs(_)));

        let err = tool(&tools, "browser.fill")
            .execute(&ctx, serde_json::json!({"id": 2, "epoch": 1, "value": "x"}))
            .await
            .expect_err("id from the first page");
        assert!(matches!(err, ToolError::StaleElementId { id: 2, epoch: 2 }));
        assert!(!log.lock().iter().any(|e| e == "direct:2:fill"));
    }

    #[test]
    fn navigator_tool_metadata_is_stable() {
        let nav = Navigator::new(NavigatorSettings::default());
        let names: Vec<String> = nav.tools().iter().map(|t| t.name().to_string()).collect();
        assert_eq!(
            names,
            vec![
                "browser.open",
                "browser.snapshot",
                "browser.click",
                "browser.fill",
                "browser.select",
                "browser.enter",
                "browser.scroll",
                "browser.collect",
            ]
        );
        let tools = nav.tools();
        assert!(tools[6].schema().is_empty());
        let fill = tools[3].schema().to_json_schema().expect("schema");
        assert_eq!(fill["required"], serde_json::json!(["id", "epoch", "value"]));
    }

    #[test]
    fn settings_clamp_timeout() {
        assert_eq!(NavigatorSettings::new(true, 0, 10).timeout, Duration::from_secs(1));
        assert_eq!(NavigatorSettings::new(true, 600, 10).timeout, Duration::from_secs(60));
    }
}
