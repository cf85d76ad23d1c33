mod dedup;
mod events;
mod ids;
mod songs;
mod songplays;
mod udf;
mod writer;

pub use events::LogEventProcessor;
pub use ids::{IdGenerator, PartitionedIdGenerator};
pub use songs::SongDimExtractor;
pub use songplays::FactBuilder;
pub use writer::{TableWriter, WrittenTable};

use std::sync::Arc;

use common::config::Settings;
use common::Result;
use datafusion::execution::context::SessionContext;
use tracing::info;

use crate::storage;
use crate::tables;

/// Per-table row counts for a completed run.
#[derive(Debug, Clone, Copy)]
pub struct PipelineSummary {
    pub songs: u64,
    pub artists: u64,
    pub users: u64,
    pub time: u64,
    pub songplays: u64,
}

/// Coordinates the staged star-schema build over one SessionContext. The
/// context is created here at run start and injected into every stage.
pub struct WarehouseProcessor {
    ctx: SessionContext,
    input_root: String,
    songs: SongDimExtractor,
    events: LogEventProcessor,
    facts: FactBuilder,
    writer: TableWriter,
}

impl WarehouseProcessor {
    pub fn new(settings: &Settings) -> Result<Self> {
        let ctx = SessionContext::new();
        storage::register_object_stores(&ctx, settings)?;

        let ids = Arc::new(PartitionedIdGenerator::new());
        let songs = SongDimExtractor::new(&ctx);
        let events = LogEventProcessor::new(&ctx);
        let facts = FactBuilder::new(&ctx, ids);
        let writer = TableWriter::new(&ctx, &settings.data.output_root);

        Ok(Self {
            ctx,
            input_root: settings.data.input_root.clone(),
            songs,
            events,
            facts,
            writer,
        })
    }

    /// Full run. Songs must be on storage before the log phase starts,
    /// since the fact join reads that table back from its written location.
    pub async fn run(&self) -> Result<PipelineSummary> {
        let (songs, artists) = self.process_song_data().await?;
        let (users, time, songplays) = self.process_log_data(&songs).await?;

        Ok(PipelineSummary {
            songs: songs.rows,
            artists: artists.rows,
            users: users.rows,
            time: time.rows,
            songplays: songplays.rows,
        })
    }

    /// Songs and artists dimensions. Returns the songs handle the fact join
    /// needs.
    pub async fn process_song_data(&self) -> Result<(WrittenTable, WrittenTable)> {
        info!(input_root = %self.input_root, "Processing song metadata");
        let raw = self.songs.read_raw(&self.input_root).await?;

        let songs_df = self.songs.songs(raw.clone())?;
        let songs = self.writer.write(songs_df, &tables::SONGS).await?;

        let artists_df = self.songs.artists(raw)?;
        let artists = self.writer.write(artists_df, &tables::ARTISTS).await?;

        Ok((songs, artists))
    }

    /// Users, time and songplays from the activity log. Users and time are
    /// independent of each other and written concurrently; songplays waits on
    /// the songs handle.
    pub async fn process_log_data(
        &self,
        songs: &WrittenTable,
    ) -> Result<(WrittenTable, WrittenTable, WrittenTable)> {
        info!(input_root = %self.input_root, "Processing activity logs");
        let raw = self.events.read_raw(&self.input_root).await?;
        let filtered = self.events.filter_next_song(raw)?;
        let events = self.events.decompose(filtered)?;

        let users_df = self.events.users(events.clone())?;
        let time_df = self.events.time(events.clone())?;
        let (users, time) = tokio::try_join!(
            self.writer.write(users_df, &tables::USERS),
            self.writer.write(time_df, &tables::TIME),
        )?;

        let facts_df = self.facts.build(events, songs).await?;
        let songplays = self.writer.write(facts_df, &tables::SONGPLAYS).await?;

        Ok((users, time, songplays))
    }

    /// The session context every stage runs against.
    pub fn session_context(&self) -> &SessionContext {
        &self.ctx
    }
}
