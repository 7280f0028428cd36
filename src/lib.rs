// Weather forecasts served as Atom feeds, cached per slug

pub mod cache;
pub mod client;
pub mod clock;
pub mod config;
pub mod feed;
pub mod forecast;
pub mod logging;
pub mod pipeline;
pub mod registry;
pub mod server;

// Re-export key types for convenience
pub use cache::{spawn_janitor, CacheConfig, CacheStatsReport, ExpiringFeedCache, FeedCache};
pub use client::{
    ClientConfig, ClientError, FetchError, ForecastClient, ForecastQuery, YandexWeatherClient,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Cli, ConfigError, Settings};
pub use feed::{FeedRenderer, FeedSettings, RenderError};
pub use forecast::ForecastRecord;
pub use pipeline::{FeedDocument, FeedError, FeedPipeline, Origin};
pub use registry::{load_locations, parse_locations, Location, LocationRegistry};
pub use server::{router, serve, AppState};
