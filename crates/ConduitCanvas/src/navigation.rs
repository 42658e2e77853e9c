//! # Subgraph Navigation
//!
//! Tracks which nested graph is being edited as a path of task ids starting
//! at a fixed root marker, and encodes that path in a shareable URL.

use std::future::Future;
use url::Url;

/// First segment of every path.
pub const ROOT_SEGMENT: &str = "root";

/// How a path restored from a URL is applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RestoreMode {
    /// Jump straight to the target (editor-only context).
    Direct,
    /// Enter one level at a time, running the per-level hook before each
    /// step (execution views fetch data per level).
    Stepwise,
}

/// The current subgraph path. Never empty; always starts with [`ROOT_SEGMENT`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubgraphNavigator {
    path: Vec<String>,
}

impl Default for SubgraphNavigator {
    fn default() -> Self {
        Self {
            path: vec![ROOT_SEGMENT.to_string()],
        }
    }
}

fn normalize(path: Vec<String>) -> Vec<String> {
    let mut segments: Vec<String> = path.into_iter().filter(|s| !s.is_empty()).collect();
    if segments.first().map(String::as_str) != Some(ROOT_SEGMENT) {
        segments.insert(0, ROOT_SEGMENT.to_string());
    }
    segments
}

impl SubgraphNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full path including the root marker.
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Task ids below the root.
    pub fn task_path(&self) -> &[String] {
        &self.path[1..]
    }

    pub fn is_root(&self) -> bool {
        self.path.len() == 1
    }

    /// Enters the nested graph of `task_id`.
    pub fn enter(&mut self, task_id: impl Into<String>) {
        self.path.push(task_id.into());
    }

    /// Sets the path directly (breadcrumbs, deep links).
    ///
    /// Segments are not checked against the spec; a missing root marker is
    /// added.
    pub fn navigate_to_path(&mut self, path: Vec<String>) {
        self.path = normalize(path);
        tracing::debug!(path = ?self.path, "Navigated to subgraph");
    }

    /// Pops one level. Returns `false` at the root.
    pub fn navigate_back(&mut self) -> bool {
        if self.path.len() > 1 {
            self.path.pop();
            true
        } else {
            false
        }
    }

    /// Returns to the root graph.
    pub fn reset(&mut self) {
        self.path.truncate(1);
    }

    /// Comma-joined path, or `None` at the root.
    pub fn to_query_value(&self) -> Option<String> {
        (!self.is_root()).then(|| self.path.join(","))
    }

    pub fn parse_query_value(value: &str) -> Vec<String> {
        normalize(value.split(',').map(str::to_string).collect())
    }

    /// Writes the path into `url` under `param`, removing it at the root.
    pub fn write_to_url(&self, url: &mut Url, param: &str) {
        let retained: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| key != param)
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.clear();
            pairs.extend_pairs(retained);
            if let Some(value) = self.to_query_value() {
                pairs.append_pair(param, &value);
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }
    }

    /// Reads a path from `url`, if the parameter is present.
    pub fn read_from_url(url: &Url, param: &str) -> Option<Vec<String>> {
        url.query_pairs()
            .find(|(key, _)| key == param)
            .map(|(_, value)| Self::parse_query_value(&value))
    }

    /// Applies a restored path.
    ///
    /// With [`RestoreMode::Stepwise`] the navigator starts at the root and,
    /// for every deeper level, awaits `on_level(level_path)` before entering
    /// it. If a level fails the navigator stays on the last level that
    /// succeeded and the error is returned.
    pub async fn restore<F, Fut>(&mut self, target: Vec<String>, mode: RestoreMode, mut on_level: F) -> anyhow::Result<()>
    where
        F: FnMut(Vec<String>) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        let target = normalize(target);
        match mode {
            RestoreMode::Direct => {
                self.navigate_to_path(target);
                Ok(())
            }
            RestoreMode::Stepwise => {
                self.reset();
                for segment in &target[1..] {
                    let mut level = self.path.clone();
                    level.push(segment.clone());
                    on_level(level).await?;
                    self.enter(segment.clone());
                }
                tracing::debug!(path = ?self.path, "Restored subgraph path stepwise");
                Ok(())
            }
        }
    }
}
