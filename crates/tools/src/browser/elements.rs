//! Per-epoch element id table and the snapshot rendered from it.

use std::collections::BTreeMap;

use proto::ToolError;
use serde::{Deserialize, Serialize};

use super::driver::PageScan;

/// Description of one interactive element the model can address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementInfo {
    pub id: u32,
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Accessible name (label, text content, placeholder...).
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

/// What the model sees after every navigator step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub title: String,
    pub url: String,
    pub epoch: u64,
    pub elements: Vec<ElementInfo>,
    /// Ids assigned since the previous snapshot in this epoch.
    pub new_ids: Vec<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<serde_json::Value>,
}

/// Id table for the current page-load epoch.
#[derive(Debug, Default)]
pub struct ElementTable {
    document: Option<String>,
    epoch: u64,
    elements: BTreeMap<u32, ElementInfo>,
}

impl ElementTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Starts a new epoch when `document` differs from the tracked one.
    ///
    /// Returns `true` when the table was discarded.
    pub fn sync(&mut self, document: &str) -> bool {
        if self.document.as_deref() == Some(document) {
            return false;
        }
        self.document = Some(document.to_string());
        self.epoch += 1;
        self.elements.clear();
        true
    }

    /// Merges a page scan into the table and renders the resulting snapshot.
    pub fn absorb(&mut self, scan: PageScan) -> Snapshot {
        self.sync(&scan.document);
        let mut new_ids = Vec::new();
        for element in scan.elements {
            if !self.elements.contains_key(&element.id) {
                new_ids.push(element.id);
            }
            self.elements.insert(element.id, element);
        }
        new_ids.sort_unstable();

        Snapshot {
            title: scan.title,
            url: scan.url,
            epoch: self.epoch,
            elements: self.elements.values().cloned().collect(),
            new_ids,
            screenshot: None,
        }
    }

    /// Looks up an id issued in `epoch`.
    ///
    /// Ids restart on every page load, so a mismatched epoch fails even when
    /// the number exists on the new page.
    pub fn resolve(&self, id: u32, epoch: u64) -> Result<&ElementInfo, ToolError> {
        let stale = || ToolError::StaleElementId {
            id,
            epoch: self.epoch,
        };
        if epoch != self.epoch {
            return Err(stale());
        }
        self.elements.get(&id).ok_or_else(stale)
    }
}
