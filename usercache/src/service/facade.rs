//! Per-kind cache facades.
//!
//! [`ArtifactCache`] composes key derivation, store lookup, generation
//! coordination and rendering:
//!
//! ```text
//! get(request)
//!   └─► KeyDeriver::derive ──► store.lookup ── hit ──► touch ──► Artifact (CacheHit)
//!                                   │
//!                                  miss
//!                                   ▼
//!                 coordinator.obtain(key, producer)
//!                   producer: re-check store ─► render (timeout, cancel) ─► insert
//! ```
//!
//! [`ThumbnailCache`] and [`TileCache`] are thin typed front-ends over it.

use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cache::{ArtifactStore, StoreStats};
use crate::coordinator::{CoordinatorStats, GenerationCoordinator};
use crate::error::CacheError;
use crate::key::{
    ArtifactKind, CacheKey, GenerationOptions, KeyDeriver, RenderOptions, TileCoord,
};
use crate::render::{RenderError, RenderRequest, Renderer};

/// How a returned artifact was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactOrigin {
    /// Served from the store.
    CacheHit,
    /// Rendered for this request.
    Generated,
    /// Rendered for a concurrent request with the same key.
    Coalesced,
}

/// Whether the artifact made it into the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Persistence {
    Stored,
    /// Served from the store, nothing to write.
    NotAttempted,
    /// Rendered and returned but could not be written; later requests will
    /// render it again.
    Failed(String),
}

/// A thumbnail or tile handed back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub data: Bytes,
    pub kind: ArtifactKind,
    pub origin: ArtifactOrigin,
    pub persistence: Persistence,
}

impl Artifact {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// True when the artifact was returned but not cached.
    pub fn persistence_failed(&self) -> bool {
        matches!(self.persistence, Persistence::Failed(_))
    }
}

/// Outcome of one generation, shared with every coalesced waiter.
#[derive(Debug, Clone)]
struct Generated {
    data: Bytes,
    persistence: Persistence,
    /// Another generation stored the entry between our lookup and the producer.
    from_store: bool,
}

/// Cache for one artifact kind.
pub struct ArtifactCache {
    deriver: KeyDeriver,
    store: Arc<dyn ArtifactStore>,
    coordinator: GenerationCoordinator<Generated>,
    renderer: Arc<dyn Renderer>,
    render_timeout: Option<Duration>,
}

impl ArtifactCache {
    /// Create a cache for `kind`; no render timeout until one is set.
    pub fn new(
        kind: ArtifactKind,
        defaults: RenderOptions,
        store: Arc<dyn ArtifactStore>,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        Self {
            deriver: KeyDeriver::new(kind, defaults),
            store,
            coordinator: GenerationCoordinator::new(),
            renderer,
            render_timeout: None,
        }
    }

    pub fn with_render_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.render_timeout = timeout;
        self
    }

    pub fn kind(&self) -> ArtifactKind {
        self.deriver.kind()
    }

    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        &self.store
    }

    pub fn store_stats(&self) -> StoreStats {
        self.store.stats()
    }

    pub fn coordinator_stats(&self) -> CoordinatorStats {
        self.coordinator.stats()
    }

    /// Number of keys currently being generated.
    pub fn in_flight_count(&self) -> usize {
        self.coordinator.in_flight_count()
    }

    /// Key a request would be stored under.
    pub fn key_for(
        &self,
        source: &Path,
        mtime_ms: i64,
        options: &GenerationOptions,
        tile: Option<TileCoord>,
    ) -> Result<CacheKey, CacheError> {
        Ok(self.deriver.derive(source, mtime_ms, options, tile)?.key)
    }

    /// Return the artifact for a request, rendering it at most once across
    /// concurrent callers.
    ///
    /// Invalid options fail before any store or renderer access. Render
    /// failures reach every waiter and are not cached.
    pub async fn get(
        &self,
        source: &Path,
        mtime_ms: i64,
        options: &GenerationOptions,
        tile: Option<TileCoord>,
    ) -> Result<Artifact, CacheError> {
        let derived = self.deriver.derive(source, mtime_ms, options, tile)?;
        let kind = derived.kind;

        if let Some(entry) = self.store.lookup(&derived.key).await {
            self.store.touch(&derived.key).await;
            debug!(key = %derived.key, kind = %kind, bytes = entry.size_bytes, "Cache hit");
            return Ok(Artifact {
                data: entry.data,
                kind,
                origin: ArtifactOrigin::CacheHit,
                persistence: Persistence::NotAttempted,
            });
        }

        let request = RenderRequest::from(&derived);
        let store = Arc::clone(&self.store);
        let renderer = Arc::clone(&self.renderer);
        let render_timeout = self.render_timeout;
        let key = derived.key.clone();

        let obtained = self
            .coordinator
            .obtain(&derived.key, move |cancel| {
                generate(store, renderer, key, request, render_timeout, cancel)
            })
            .await?;

        let generated = obtained.value;
        let origin = if obtained.coalesced {
            ArtifactOrigin::Coalesced
        } else if generated.from_store {
            ArtifactOrigin::CacheHit
        } else {
            ArtifactOrigin::Generated
        };

        Ok(Artifact {
            data: generated.data,
            kind,
            origin,
            persistence: generated.persistence,
        })
    }

    /// Log store and coordinator statistics.
    pub fn log_stats(&self) {
        let stats = self.store.stats();
        tracing::info!(
            kind = %self.kind(),
            entries = stats.entry_count,
            size_bytes = stats.size_bytes,
            capacity_bytes = stats.capacity_bytes,
            hit_rate = format!("{:.1}%", stats.hit_rate() * 100.0),
            evictions = stats.evictions,
            "Artifact store statistics"
        );
        self.coordinator.log_stats();
    }
}

/// Producer run once per generation, in its own task.
async fn generate(
    store: Arc<dyn ArtifactStore>,
    renderer: Arc<dyn Renderer>,
    key: CacheKey,
    request: RenderRequest,
    render_timeout: Option<Duration>,
    cancel: CancellationToken,
) -> Result<Generated, CacheError> {
    // An earlier generation may have stored it after our caller's lookup.
    if let Some(entry) = store.peek(&key).await {
        store.touch(&key).await;
        return Ok(Generated {
            data: entry.data,
            persistence: Persistence::NotAttempted,
            from_store: true,
        });
    }

    debug!(key = %key, source = %request.source.display(), kind = %request.kind, "Rendering");
    let render = renderer.render(request, cancel.clone());
    let rendered = tokio::select! {
        _ = cancel.cancelled() => Err(RenderError::Cancelled),
        result = with_timeout(render, render_timeout) => result,
    };
    let data = rendered.map_err(|e| {
        debug!(key = %key, error = %e, "Render failed");
        CacheError::from(e)
    })?;

    let persistence = match store.insert(key.clone(), data.clone()).await {
        Ok(()) => Persistence::Stored,
        Err(e) => {
            warn!(key = %key, error = %e, "Failed to persist artifact, returning it uncached");
            Persistence::Failed(e.to_string())
        }
    };

    Ok(Generated {
        data,
        persistence,
        from_store: false,
    })
}

async fn with_timeout<F>(render: F, limit: Option<Duration>) -> Result<Bytes, RenderError>
where
    F: std::future::Future<Output = Result<Bytes, RenderError>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, render)
            .await
            .unwrap_or(Err(RenderError::Timeout(limit))),
        None => render.await,
    }
}

/// Thumbnail request: source, its modification time and options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailRequest {
    pub source: PathBuf,
    /// Source modification time in epoch milliseconds.
    pub mtime_ms: i64,
    pub options: GenerationOptions,
}

impl ThumbnailRequest {
    pub fn new(source: impl Into<PathBuf>, mtime_ms: i64) -> Self {
        Self {
            source: source.into(),
            mtime_ms,
            options: GenerationOptions::default(),
        }
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }
}

/// Tile request: source, its modification time, z/x/y and options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileRequest {
    pub source: PathBuf,
    /// Source modification time in epoch milliseconds.
    pub mtime_ms: i64,
    pub tile: TileCoord,
    pub options: GenerationOptions,
}

impl TileRequest {
    pub fn new(source: impl Into<PathBuf>, mtime_ms: i64, tile: TileCoord) -> Self {
        Self {
            source: source.into(),
            mtime_ms,
            tile,
            options: GenerationOptions::default(),
        }
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }
}

/// Thumbnail cache.
pub struct ThumbnailCache {
    inner: ArtifactCache,
}

impl ThumbnailCache {
    pub fn new(
        defaults: RenderOptions,
        store: Arc<dyn ArtifactStore>,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        Self {
            inner: ArtifactCache::new(ArtifactKind::Thumbnail, defaults, store, renderer),
        }
    }

    pub fn with_render_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.inner = self.inner.with_render_timeout(timeout);
        self
    }

    pub async fn get(&self, request: &ThumbnailRequest) -> Result<Artifact, CacheError> {
        self.inner
            .get(&request.source, request.mtime_ms, &request.options, None)
            .await
    }

    pub fn artifacts(&self) -> &ArtifactCache {
        &self.inner
    }
}

/// Tile cache.
pub struct TileCache {
    inner: ArtifactCache,
}

impl TileCache {
    pub fn new(
        defaults: RenderOptions,
        store: Arc<dyn ArtifactStore>,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        Self {
            inner: ArtifactCache::new(ArtifactKind::Tile, defaults, store, renderer),
        }
    }

    pub fn with_render_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.inner = self.inner.with_render_timeout(timeout);
        self
    }

    pub async fn get(&self, request: &TileRequest) -> Result<Artifact, CacheError> {
        self.inner
            .get(
                &request.source,
                request.mtime_ms,
                &request.options,
                Some(request.tile),
            )
            .await
    }

    pub fn artifacts(&self) -> &ArtifactCache {
        &self.inner
    }
}
