use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use weather_feed::{
    load_locations, logging, router, serve, spawn_janitor, AppState, Cli, Clock,
    ExpiringFeedCache, FeedCache, FeedPipeline, FeedRenderer, LocationRegistry, SystemClock,
    YandexWeatherClient,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.env {
        match cli.clone().into_settings() {
            Ok(settings) => println!("{}", settings),
            Err(err) => {
                // Show what was resolved even when it does not validate
                println!("{}", cli);
                eprintln!("invalid configuration: {}", err);
            }
        }
        return Ok(());
    }

    let (log_level, json_logs) = (cli.log_level.clone(), cli.json_logs);
    let settings = cli.into_settings().context("invalid configuration")?;

    logging::init(&log_level, json_logs);

    let locations = load_locations(&settings.feeds_path)
        .with_context(|| format!("loading {}", settings.feeds_path.display()))?;
    let registry = Arc::new(LocationRegistry::new(locations));
    let feed_count = registry.len();
    for location in registry.iter() {
        tracing::debug!(slug = %location.slug, name = %location.name, lang = %location.language, "feed configured");
    }
    if registry.is_empty() {
        tracing::warn!("no feeds configured, every request will be answered as unknown");
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let cache = Arc::new(ExpiringFeedCache::new(settings.cache.clone(), clock.clone()));
    let janitor = spawn_janitor(cache.clone(), settings.cache.cleanup_interval);

    let client = YandexWeatherClient::new(settings.client.clone())?;
    let renderer = FeedRenderer::new(settings.feed.clone())?;

    let pipeline = Arc::new(FeedPipeline::new(
        registry,
        Arc::new(client),
        renderer,
        cache.clone(),
        clock,
    ));

    tracing::info!(
        feeds = feed_count,
        ttl_secs = settings.cache.ttl.as_secs(),
        server_url = %settings.feed.server_url,
        "starting weather feed server"
    );

    serve(settings.addr, router(AppState { pipeline })).await?;

    janitor.abort();
    let stats = cache.stats();
    tracing::info!(
        hits = stats.hit_count,
        misses = stats.miss_count,
        items = stats.items_count,
        "server stopped"
    );

    Ok(())
}
