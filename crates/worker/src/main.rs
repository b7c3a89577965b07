//! Reelsmith worker: boots the store, the event bus, and the batch
//! scheduler, then renders submitted jobs until interrupted.

use std::sync::Arc;

use reelsmith_db::{create_pool, MIGRATOR};
use reelsmith_events::EventBus;
use reelsmith_ffmpeg::FfmpegRenderer;
use reelsmith_pipeline::CompositorPipeline;
use reelsmith_scheduler::{BatchScheduler, SchedulerConfig};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reelsmith=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite:reelsmith.db?mode=rwc".to_string());
    let ffmpeg_binary = std::env::var("FFMPEG_BIN").unwrap_or_else(|_| "ffmpeg".to_string());
    let config = SchedulerConfig::from_env();

    let pool = create_pool(&database_url).await?;
    MIGRATOR.run(&pool).await?;

    let bus = Arc::new(EventBus::default());
    let pipeline = Arc::new(CompositorPipeline::new(
        pool.clone(),
        FfmpegRenderer::new(ffmpeg_binary),
    ));
    let scheduler = BatchScheduler::new(pool, bus.clone(), pipeline, &config);
    scheduler.start();

    // Mirror every bus event into the log; a frontend subscribes the same way.
    let mut events = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => tracing::info!(kind = event.kind(), "Event"),
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Event subscriber lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    tracing::info!(
        max_concurrent = config.max_concurrent,
        "Reelsmith worker ready",
    );

    tokio::signal::ctrl_c().await?;
    scheduler.stop();
    tracing::info!("Shutdown complete");
    Ok(())
}
