//! Chromium page driver over CDP.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::element::Element;
use chromiumoxide::page::ScreenshotParams;
use futures_util::StreamExt;
use proto::ToolError;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::driver::{ElementAction, PageDriver, PageScan};
use super::elements::ElementInfo;

const ID_ATTR: &str = "data-steward-id";

/// Shared prelude: keeps one token and one id counter per loaded document.
///
/// Evaluated again before every script, so it may only assign to `window`.
const PRELUDE: &str = r#"
window.__stewardInit = window.__stewardInit || (() => {
  if (!window.__stewardDoc) {
    window.__stewardDoc = Date.now().toString(36) + Math.random().toString(36).slice(2);
    window.__stewardNext = 0;
  }
  return window.__stewardDoc;
});
"#;

const SCAN_SCRIPT: &str = r#"
(() => {
  const doc = window.__stewardInit();
  const selector = 'a[href], button, input:not([type=hidden]), select, textarea, summary, ' +
    '[role=button], [role=link], [role=checkbox], [role=radio], [role=tab], [role=menuitem], ' +
    '[role=option], [role=combobox], [onclick], [contenteditable=true]';
  const visible = (el) => {
    const rect = el.getBoundingClientRect();
    if (rect.width === 0 || rect.height === 0) return false;
    if (rect.bottom < 0 || rect.top > window.innerHeight) return false;
    const style = window.getComputedStyle(el);
    return style.visibility !== 'hidden' && style.display !== 'none';
  };
  const text = (value) => (value || '').replace(/\s+/g, ' ').trim().slice(0, 120);
  for (const el of document.querySelectorAll(selector)) {
    if (!el.hasAttribute('data-steward-id') && visible(el)) {
      el.setAttribute('data-steward-id', String(window.__stewardNext++));
    }
  }
  const keep = ['href', 'type', 'name', 'placeholder', 'aria-expanded', 'aria-checked', 'disabled'];
  const elements = [];
  for (const el of document.querySelectorAll('[data-steward-id]')) {
    if (!el.isConnected) continue;
    const attributes = {};
    for (const key of keep) {
      if (el.hasAttribute(key)) attributes[key] = text(el.getAttribute(key));
    }
    if (el.type !== 'password' && typeof el.value === 'string' && el.value !== '') {
      attributes.value = text(el.value);
    }
    const describedBy = el.getAttribute('aria-describedby');
    const described = describedBy ? document.getElementById(describedBy) : null;
    elements.push({
      id: Number(el.getAttribute('data-steward-id')),
      tag: el.tagName.toLowerCase(),
      role: el.getAttribute('role') || undefined,
      name: text(el.getAttribute('aria-label') || el.innerText || el.getAttribute('placeholder') ||
        el.getAttribute('alt') || el.getAttribute('title') || el.value),
      description: text(described ? described.innerText : el.getAttribute('title')) || undefined,
      attributes,
    });
  }
  return { document: doc, title: document.title, url: location.href, elements };
})()
"#;

#[derive(Debug, Deserialize)]
struct RawScan {
    document: String,
    title: String,
    url: String,
    elements: Vec<ElementInfo>,
}

/// A single Chromium tab driven through chromiumoxide.
pub struct CdpPage {
    browser: Browser,
    page: Page,
    handler_task: Option<JoinHandle<()>>,
}

fn failed(context: &str, err: impl std::fmt::Display) -> ToolError {
    ToolError::ExecutionFailed(format!("{context}: {err}"))
}

fn js_string(value: &str) -> String {
    serde_json::Value::from(value).to_string()
}

fn document_script() -> String {
    format!("{PRELUDE}\nwindow.__stewardInit()")
}

fn scan_script() -> String {
    format!("{PRELUDE}\n{SCAN_SCRIPT}")
}

impl CdpPage {
    /// Launches a browser process and opens a blank tab.
    pub async fn launch(headless: bool) -> Result<Self, ToolError> {
        let mut builder = BrowserConfig::builder();
        if !headless {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|e| failed("Failed to build browser config", e))?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| failed("Failed to launch browser", e))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler_task.abort();
                let _ = browser.close().await;
                return Err(failed("Failed to create page", e));
            }
        };

        debug!(headless, "Browser launched");
        Ok(Self {
            browser,
            page,
            handler_task: Some(handler_task),
        })
    }

    async fn eval<T: DeserializeOwned>(&self, script: String) -> Result<T, ToolError> {
        let params = EvaluateParams::builder()
            .expression(script)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(|e| failed("Failed to build evaluation", e))?;
        let result = self
            .page
            .evaluate_expression(params)
            .await
            .map_err(|e| failed("Script evaluation failed", e))?;
        result
            .into_value()
            .map_err(|e| failed("Unexpected script result", e))
    }

    async fn element(&self, id: u32) -> Result<Element, ToolError> {
        let selector = format!("[{ID_ATTR}=\"{id}\"]");
        self.page
            .find_element(selector)
            .await
            .map_err(|e| failed(&format!("Failed to find element {id}"), e))
    }
}

#[async_trait]
impl PageDriver for CdpPage {
    async fn goto(&mut self, url: &str) -> Result<(), ToolError> {
        self.page
            .goto(url)
            .await
            .map_err(|e| failed(&format!("Failed to navigate to {url}"), e))?;
        Ok(())
    }

    async fn document_token(&mut self) -> Result<String, ToolError> {
        self.eval(document_script()).await
    }

    async fn scan(&mut self) -> Result<PageScan, ToolError> {
        let raw: RawScan = self.eval(scan_script()).await?;
        Ok(PageScan {
            document: raw.document,
            title: raw.title,
            url: raw.url,
            elements: raw.elements,
        })
    }

    async fn perform(&mut self, id: u32, action: &ElementAction) -> Result<(), ToolError> {
        let element = self.element(id).await?;
        match action {
            ElementAction::Click => {
                element
                    .click()
                    .await
                    .map_err(|e| failed(&format!("Failed to click element {id}"), e))?;
            }
            ElementAction::Fill(value) => {
                element
                    .click()
                    .await
                    .map_err(|e| failed(&format!("Failed to focus element {id}"), e))?;
                element
                    .call_js_fn("function() { if ('value' in this) this.value = ''; }", false)
                    .await
                    .map_err(|e| failed(&format!("Failed to clear element {id}"), e))?;
                element
                    .type_str(value)
                    .await
                    .map_err(|e| failed(&format!("Failed to type into element {id}"), e))?;
            }
            ElementAction::Select(value) => {
                let function = format!(
                    "function() {{
                        const wanted = {value};
                        const option = Array.from(this.options || [])
                            .find((o) => o.value === wanted || o.text.trim() === wanted);
                        if (!option) throw new Error('no option ' + wanted);
                        this.value = option.value;
                        this.dispatchEvent(new Event('input', {{ bubbles: true }}));
                        this.dispatchEvent(new Event('change', {{ bubbles: true }}));
                    }}",
                    value = js_string(value)
                );
                element
                    .call_js_fn(function, false)
                    .await
                    .map_err(|e| failed(&format!("Failed to select on element {id}"), e))?;
            }
            ElementAction::Enter => {
                element
                    .press_key("Enter")
                    .await
                    .map_err(|e| failed(&format!("Failed to press Enter on element {id}"), e))?;
            }
        }
        Ok(())
    }

    async fn perform_in_dom(&mut self, id: u32, action: &ElementAction) -> Result<(), ToolError> {
        let (verb, value) = match action {
            ElementAction::Click => ("click", String::new()),
            ElementAction::Fill(v) => ("fill", v.clone()),
            ElementAction::Select(v) => ("select", v.clone()),
            ElementAction::Enter => ("enter", String::new()),
        };
        let script = format!(
            r#"(() => {{
  const el = document.querySelector('[{ID_ATTR}="{id}"]');
  if (!el) return 'element {id} is gone';
  const verb = {verb};
  const value = {value};
  el.scrollIntoView({{ block: 'center' }});
  if (verb === 'click') {{ el.click(); return 'ok'; }}
  if (verb === 'fill' || verb === 'select') {{
    if (!('value' in el)) return 'element {id} has no value';
    el.focus();
    el.value = value;
    el.dispatchEvent(new Event('input', {{ bubbles: true }}));
    el.dispatchEvent(new Event('change', {{ bubbles: true }}));
    return 'ok';
  }}
  for (const type of ['keydown', 'keypress', 'keyup']) {{
    el.dispatchEvent(new KeyboardEvent(type, {{ key: 'Enter', code: 'Enter', keyCode: 13, bubbles: true }}));
  }}
  if (el.form) el.form.requestSubmit();
  return 'ok';
}})()"#,
            verb = js_string(verb),
            value = js_string(&value),
        );
        let outcome: String = self.eval(script).await?;
        if outcome == "ok" {
            Ok(())
        } else {
            Err(ToolError::ExecutionFailed(outcome))
        }
    }

    async fn scroll(&mut self) -> Result<(), ToolError> {
        let _: bool = self
            .eval("(() => { window.scrollBy(0, Math.round(window.innerHeight * 0.8)); return true; })()".to_string())
            .await?;
        Ok(())
    }

    async fn wait_quiescent(&mut self, quiet: Duration, cap: Duration) -> Result<(), ToolError> {
        let script = format!(
            r#"new Promise((resolve) => {{
  const start = () => {{
    let timer;
    const done = () => {{ observer.disconnect(); clearTimeout(timer); clearTimeout(hard); resolve(true); }};
    const observer = new MutationObserver(() => {{ clearTimeout(timer); timer = setTimeout(done, {quiet}); }});
    const hard = setTimeout(done, {cap});
    timer = setTimeout(done, {quiet});
    observer.observe(document, {{ subtree: true, childList: true, attributes: true, characterData: true }});
  }};
  if (document.readyState === 'complete') start();
  else window.addEventListener('load', start, {{ once: true }});
}})"#,
            quiet = quiet.as_millis(),
            cap = cap.as_millis(),
        );
        match self.eval::<bool>(script.clone()).await {
            Ok(_) => Ok(()),
            Err(first) => {
                // The execution context goes away when the action navigated.
                debug!(error = %first, "Quiescence probe interrupted; waiting for navigation");
                self.page
                    .wait_for_navigation()
                    .await
                    .map_err(|e| failed("Navigation wait failed", e))?;
                self.eval::<bool>(script).await.map(|_| ())
            }
        }
    }

    async fn collect(&mut self, selector: &str, limit: usize) -> Result<Vec<String>, ToolError> {
        let script = format!(
            r#"(() => {{
  const out = [];
  for (const el of document.querySelectorAll({selector})) {{
    if (out.length >= {limit}) break;
    if (el.hasAttribute('data-steward-visited')) continue;
    el.setAttribute('data-steward-visited', '1');
    out.push((el.innerText || el.textContent || '').replace(/\s+/g, ' ').trim());
  }}
  return out;
}})()"#,
            selector = js_string(selector),
        );
        self.eval(script).await
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, ToolError> {
        self.page
            .screenshot(ScreenshotParams::builder().build())
            .await
            .map_err(|e| failed("Failed to capture screenshot", e))
    }

    async fn close(&mut self) {
        if let Err(e) = self.browser.close().await {
            warn!(error = %e, "Failed to close browser");
        }
        if let Some(handle) = self.handler_task.take() {
            handle.abort();
        }
    }
}

impl Drop for CdpPage {
    fn drop(&mut self) {
        if let Some(handle) = self.handler_task.take() {
            handle.abort();
        }
    }
}
