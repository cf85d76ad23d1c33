pub mod processor;
pub mod schema;
pub mod storage;
pub mod tables;

pub use processor::{PipelineSummary, WarehouseProcessor};

use common::config::Settings;
use common::Result;
use tracing::info;

/// Runs the complete warehouse pipeline
pub async fn run_warehouse_pipeline(config_path: &str) -> Result<PipelineSummary> {
    // Load configuration
    let settings = Settings::new(config_path)?;

    let processor = WarehouseProcessor::new(&settings)?;
    let summary = processor.run().await?;

    info!(
        songs = summary.songs,
        artists = summary.artists,
        users = summary.users,
        time = summary.time,
        songplays = summary.songplays,
        "Warehouse build complete"
    );

    Ok(summary)
}
