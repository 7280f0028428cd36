// Request pipeline: cache -> registry -> provider -> renderer -> cache

use crate::cache::FeedCache;
use crate::client::{FetchError, ForecastClient, ForecastQuery};
use crate::clock::Clock;
use crate::feed::{FeedRenderer, RenderError};
use crate::registry::LocationRegistry;
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;

// Per-request failures; none of these outlive the request that hit them
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("No config with slug {slug}")]
    NotFound { slug: String },

    #[error("Unable to fetch forecast for {slug}: {source}")]
    Fetch {
        slug: String,
        #[source]
        source: FetchError,
    },

    #[error("Unable to generate feed for {slug}: {source}")]
    Render {
        slug: String,
        #[source]
        source: RenderError,
    },
}

impl FeedError {
    pub fn slug(&self) -> &str {
        match self {
            FeedError::NotFound { slug }
            | FeedError::Fetch { slug, .. }
            | FeedError::Render { slug, .. } => slug,
        }
    }

    /// Text safe to show a feed reader: the slug and what went wrong,
    /// without upstream or serializer details.
    pub fn public_message(&self) -> String {
        match self {
            FeedError::NotFound { slug } => format!("No config with slug {}", slug),
            FeedError::Fetch { slug, .. } => {
                format!("Unable to fetch forecast for slug {}", slug)
            }
            FeedError::Render { slug, .. } => format!("Unable to generate feed for slug {}", slug),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Cache,
    Upstream,
}

#[derive(Debug, Clone)]
pub struct FeedDocument {
    pub body: Bytes,
    pub origin: Origin,
}

/// Everything one feed request needs, built once at startup and shared
/// between request tasks.
pub struct FeedPipeline {
    registry: Arc<LocationRegistry>,
    client: Arc<dyn ForecastClient>,
    renderer: FeedRenderer,
    cache: Arc<dyn FeedCache>,
    clock: Arc<dyn Clock>,
}

impl FeedPipeline {
    pub fn new(
        registry: Arc<LocationRegistry>,
        client: Arc<dyn ForecastClient>,
        renderer: FeedRenderer,
        cache: Arc<dyn FeedCache>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            client,
            renderer,
            cache,
            clock,
        }
    }

    #[tracing::instrument(name = "feed", skip(self))]
    pub async fn feed(&self, slug: &str) -> Result<FeedDocument, FeedError> {
        if let Some(body) = self.cache.get(slug) {
            tracing::debug!("cache hit");
            return Ok(FeedDocument {
                body,
                origin: Origin::Cache,
            });
        }

        let Some(location) = self.registry.lookup(slug) else {
            tracing::warn!("no location configured");
            return Err(FeedError::NotFound {
                slug: slug.to_string(),
            });
        };

        let query = ForecastQuery {
            latitude: location.latitude.clone(),
            longitude: location.longitude.clone(),
            language: location.language.clone(),
            extended: true,
        };

        let record = self.client.fetch(&query).await.map_err(|source| {
            tracing::warn!(error = %source, "forecast fetch failed");
            FeedError::Fetch {
                slug: slug.to_string(),
                source,
            }
        })?;

        let now = self.clock.now();
        let document = self.renderer.render(slug, &record, now).map_err(|source| {
            tracing::error!(error = %source, "feed rendering failed");
            FeedError::Render {
                slug: slug.to_string(),
                source,
            }
        })?;

        let body = Bytes::from(document);
        if !self.cache.set(slug, body.clone()) {
            tracing::warn!("rendered feed not cached");
        }

        tracing::info!(
            locality = %record.locality_name,
            temp = record.temperature,
            bytes = body.len(),
            "rendered feed"
        );

        Ok(FeedDocument {
            body,
            origin: Origin::Upstream,
        })
    }
}
