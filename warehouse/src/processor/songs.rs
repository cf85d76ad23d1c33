use common::Result;
use datafusion::dataframe::DataFrame;
use datafusion::execution::context::SessionContext;
use datafusion::prelude::NdJsonReadOptions;

use super::dedup::distinct_by_key;
use crate::schema::RAW_SONG_SCHEMA;

/// Song-metadata side of the pipeline: raw NDJSON in, songs and artists
/// dimensions out. Writing is the TableWriter's job.
pub struct SongDimExtractor {
    ctx: SessionContext,
}

impl SongDimExtractor {
    pub fn new(ctx: &SessionContext) -> Self {
        Self { ctx: ctx.clone() }
    }

    /// Reads every `.json` file under `<input_root>/song_data/`.
    pub async fn read_raw(&self, input_root: &str) -> Result<DataFrame> {
        let location = format!("{}/song_data/", input_root.trim_end_matches('/'));
        let options = NdJsonReadOptions::default().schema(&RAW_SONG_SCHEMA);

        let df = self.ctx.read_json(location, options).await?;
        Ok(df)
    }

    /// Songs dimension: one row per song_id.
    pub fn songs(&self, raw: DataFrame) -> Result<DataFrame> {
        distinct_by_key(raw, "song_id", &["song_id", "title", "artist_id", "year", "duration"])
    }

    /// Artists dimension: one row per artist_id.
    pub fn artists(&self, raw: DataFrame) -> Result<DataFrame> {
        distinct_by_key(
            raw,
            "artist_id",
            &[
                "artist_id",
                "artist_name",
                "artist_location",
                "artist_latitude",
                "artist_longitude",
            ],
        )
    }
}
