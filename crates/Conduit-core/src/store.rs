//! Named pipeline persistence.
//!
//! A flat key-value store keyed by pipeline name. Last write wins; there is
//! no versioning.

use crate::error::{SpecError, SpecResult};
use crate::spec::ComponentSpec;
use async_trait::async_trait;
use dashmap::DashMap;
use std::path::PathBuf;

/// Backend for saved pipelines. Values are serialized component specs.
#[async_trait]
pub trait PipelineStore: Send + Sync {
    async fn save(&self, name: &str, text: &str) -> anyhow::Result<()>;
    async fn load(&self, name: &str) -> anyhow::Result<Option<String>>;
    async fn list(&self) -> anyhow::Result<Vec<String>>;
    async fn delete(&self, name: &str) -> anyhow::Result<bool>;
}

/// Serializes `spec` and stores it under `name`.
#[tracing::instrument(skip(store, spec))]
pub async fn save_pipeline(store: &dyn PipelineStore, name: &str, spec: &ComponentSpec) -> SpecResult<()> {
    let text = spec.to_yaml()?;
    store.save(name, &text).await.map_err(|e| SpecError::Store {
        name: name.to_string(),
        message: e.to_string(),
    })?;
    tracing::info!(bytes = text.len(), "Saved pipeline");
    Ok(())
}

/// Loads and parses the pipeline stored under `name`.
#[tracing::instrument(skip(store))]
pub async fn load_pipeline(store: &dyn PipelineStore, name: &str) -> SpecResult<Option<ComponentSpec>> {
    let text = store.load(name).await.map_err(|e| SpecError::Store {
        name: name.to_string(),
        message: e.to_string(),
    })?;
    text.map(|t| ComponentSpec::from_yaml(&t)).transpose()
}

#[derive(Debug, Default)]
pub struct InMemoryPipelineStore {
    entries: DashMap<String, String>,
}

impl InMemoryPipelineStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PipelineStore for InMemoryPipelineStore {
    async fn save(&self, name: &str, text: &str) -> anyhow::Result<()> {
        self.entries.insert(name.to_string(), text.to_string());
        Ok(())
    }

    async fn load(&self, name: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries.get(name).map(|e| e.value().clone()))
    }

    async fn list(&self) -> anyhow::Result<Vec<String>> {
        let mut names: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        names.sort();
        Ok(names)
    }

    async fn delete(&self, name: &str) -> anyhow::Result<bool> {
        Ok(self.entries.remove(name).is_some())
    }
}

/// Stores each pipeline as `<root>/<name>.pipeline.yaml`.
#[derive(Debug, Clone)]
pub struct FilePipelineStore {
    root: PathBuf,
}

const EXTENSION: &str = ".pipeline.yaml";

impl FilePipelineStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, name: &str) -> anyhow::Result<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            anyhow::bail!("invalid pipeline name '{name}'");
        }
        Ok(self.root.join(format!("{name}{EXTENSION}")))
    }
}

#[async_trait]
impl PipelineStore for FilePipelineStore {
    async fn save(&self, name: &str, text: &str) -> anyhow::Result<()> {
        let path = self.path_for(name)?;
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(path, text).await?;
        Ok(())
    }

    async fn load(&self, name: &str) -> anyhow::Result<Option<String>> {
        let path = self.path_for(name)?;
        match tokio::fs::read_to_string(path).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> anyhow::Result<Vec<String>> {
        let mut names = Vec::new();
        let mut dir = match tokio::fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = dir.next_entry().await? {
            let file_name = entry.file_name();
            if let Some(name) = file_name.to_str().and_then(|n| n.strip_suffix(EXTENSION)) {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn delete(&self, name: &str) -> anyhow::Result<bool> {
        let path = self.path_for(name)?;
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
