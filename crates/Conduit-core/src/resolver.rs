//! # Component Resolution
//!
//! Turns bare [`ComponentReference`]s (url and/or digest) into hydrated ones
//! carrying `text`, `digest` and `spec`. Fetching is delegated to a
//! [`ComponentLoader`]; results are cached by digest and url so repeated
//! resolution of the same reference returns identical data.

use crate::error::{SpecError, SpecResult};
use crate::spec::{ComponentReference, ComponentSpec, ImplementationType, has_valid_digest};
use async_trait::async_trait;
use dashmap::DashMap;
use futures::FutureExt;
use futures::future::{BoxFuture, try_join_all};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Source of serialized component definitions.
#[async_trait]
pub trait ComponentLoader: Send + Sync {
    /// Fetches the serialized text of the referenced component.
    async fn load_text(&self, reference: &ComponentReference) -> anyhow::Result<String>;
}

/// Hex encoded BLAKE3 digest of a component's text.
pub fn compute_digest(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}

#[derive(Debug)]
struct CachedComponent {
    text: String,
    digest: String,
    spec: ComponentSpec,
}

/// Resolves and caches component references.
pub struct ComponentResolver<L: ComponentLoader> {
    loader: L,
    cache: DashMap<String, Arc<CachedComponent>>,
}

impl<L: ComponentLoader> ComponentResolver<L> {
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            cache: DashMap::new(),
        }
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// Number of distinct components held in the cache.
    pub fn cached_len(&self) -> usize {
        self.cache
            .iter()
            .map(|entry| entry.value().digest.clone())
            .collect::<std::collections::HashSet<_>>()
            .len()
    }

    fn hydrate(reference: &ComponentReference, cached: &CachedComponent) -> ComponentReference {
        ComponentReference {
            name: reference.name.clone().or_else(|| cached.spec.name.clone()),
            url: reference.url.clone(),
            digest: Some(cached.digest.clone()),
            text: Some(cached.text.clone()),
            spec: Some(Box::new(cached.spec.clone())),
        }
    }

    fn parse(text: String) -> SpecResult<CachedComponent> {
        let spec = ComponentSpec::from_yaml(&text)?;
        Ok(CachedComponent {
            digest: compute_digest(&text),
            text,
            spec,
        })
    }

    /// Returns `reference` with `spec`, `text` and `digest` populated.
    ///
    /// Already hydrated references are returned unchanged; references carrying
    /// inline `text` are parsed without touching the loader.
    #[tracing::instrument(skip(self, reference), fields(reference = %reference.display_name()))]
    pub async fn resolve(&self, reference: &ComponentReference) -> SpecResult<ComponentReference> {
        if reference.is_hydrated() {
            return Ok(reference.clone());
        }
        if let Some(text) = &reference.text {
            let cached = Self::parse(text.clone())?;
            return Ok(Self::hydrate(reference, &cached));
        }

        let key = reference.cache_key().ok_or_else(|| SpecError::Fetch {
            reference: reference.display_name(),
            message: "reference has neither a url nor a valid digest".to_string(),
        })?;
        if let Some(cached) = self.cache.get(&key).map(|e| Arc::clone(e.value())) {
            tracing::debug!(key = %key, "Component cache hit");
            return Ok(Self::hydrate(reference, &cached));
        }

        let text = self
            .loader
            .load_text(reference)
            .await
            .map_err(|e| SpecError::Fetch {
                reference: reference.display_name(),
                message: e.to_string(),
            })?;
        let cached = Arc::new(Self::parse(text)?);

        if has_valid_digest(reference) && reference.digest.as_deref() != Some(cached.digest.as_str()) {
            tracing::warn!(
                expected = ?reference.digest,
                actual = %cached.digest,
                "Fetched component digest differs from reference"
            );
        }

        self.cache.insert(key, Arc::clone(&cached));
        self.cache.insert(cached.digest.clone(), Arc::clone(&cached));
        if let Some(url) = &reference.url {
            self.cache.insert(url.clone(), Arc::clone(&cached));
        }
        tracing::info!(digest = %cached.digest, "Resolved component");
        Ok(Self::hydrate(reference, &cached))
    }

    /// Recursively hydrates every task reference of a graph component.
    ///
    /// Container components are returned unchanged.
    pub fn preload<'a>(&'a self, spec: &'a ComponentSpec) -> BoxFuture<'a, SpecResult<ComponentSpec>> {
        async move {
            let ImplementationType::Graph(graph) = &spec.implementation else {
                return Ok(spec.clone());
            };

            let hydrated = try_join_all(graph.tasks.iter().map(|(task_id, task)| async move {
                let mut reference = self.resolve(&task.component_ref).await?;
                if let Some(nested) = reference.spec.take() {
                    reference.spec = Some(Box::new(self.preload(&nested).await?));
                }
                Ok::<_, SpecError>((task_id.clone(), reference))
            }))
            .await?;

            let mut next = spec.clone();
            if let Some(next_graph) = next.graph_mut() {
                for (task_id, reference) in hydrated {
                    if let Some(task) = next_graph.tasks.get_mut(&task_id) {
                        task.component_ref = reference;
                    }
                }
            }
            tracing::debug!(component = next.display_name(), "Preloaded component references");
            Ok(next)
        }
        .boxed()
    }
}

/// Loads components from files under a directory.
///
/// The reference url is read as a path relative to `root` (a `file://`
/// prefix is accepted); digest-only references map to `<root>/<digest>.yaml`.
#[derive(Debug, Clone)]
pub struct DirectoryLoader {
    root: PathBuf,
}

impl DirectoryLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, reference: &ComponentReference) -> Option<PathBuf> {
        if let Some(url) = &reference.url {
            let relative = url.strip_prefix("file://").unwrap_or(url);
            return Some(self.root.join(relative.trim_start_matches('/')));
        }
        reference
            .digest
            .as_ref()
            .map(|digest| self.root.join(format!("{digest}.yaml")))
    }
}

#[async_trait]
impl ComponentLoader for DirectoryLoader {
    async fn load_text(&self, reference: &ComponentReference) -> anyhow::Result<String> {
        let path = self
            .path_for(reference)
            .ok_or_else(|| anyhow::anyhow!("reference has no url or digest"))?;
        let text = tokio::fs::read_to_string(&path).await?;
        Ok(text)
    }
}

/// In-memory component library keyed by url and digest.
#[derive(Debug, Default)]
pub struct InMemoryLoader {
    by_url: HashMap<String, String>,
    by_digest: HashMap<String, String>,
    fetches: AtomicUsize,
}

impl InMemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a component under its digest, returning the digest.
    pub fn insert(&mut self, text: impl Into<String>) -> String {
        let text = text.into();
        let digest = compute_digest(&text);
        self.by_digest.insert(digest.clone(), text);
        digest
    }

    /// Registers a component under `url` (and its digest).
    pub fn insert_url(&mut self, url: impl Into<String>, text: impl Into<String>) -> String {
        let text = text.into();
        let digest = self.insert(text.clone());
        self.by_url.insert(url.into(), text);
        digest
    }

    /// How many times [`ComponentLoader::load_text`] was called.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ComponentLoader for InMemoryLoader {
    async fn load_text(&self, reference: &ComponentReference) -> anyhow::Result<String> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        reference
            .url
            .as_ref()
            .and_then(|url| self.by_url.get(url))
            .or_else(|| reference.digest.as_ref().and_then(|d| self.by_digest.get(d)))
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("component not found"))
    }
}
