use std::sync::Arc;

use common::Result;
use datafusion::arrow::array::{ArrayRef, Int64Array};
use datafusion::arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::common::JoinType;
use datafusion::dataframe::DataFrame;
use datafusion::execution::context::SessionContext;
use datafusion::prelude::{col, ident, ParquetReadOptions};

use super::ids::IdGenerator;
use super::writer::WrittenTable;

/// Builds the songplays fact table. `build` takes the WrittenTable handle the
/// songs write returned: the join reads the dimension back from storage, so
/// fact derivation cannot run before that write completed.
pub struct FactBuilder {
    ctx: SessionContext,
    ids: Arc<dyn IdGenerator>,
}

impl FactBuilder {
    pub fn new(ctx: &SessionContext, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            ctx: ctx.clone(),
            ids,
        }
    }

    /// Inner-joins events to the songs dimension on the track title (log.song
    /// against songs.title; rows without a match are dropped) and stamps each
    /// surviving row with a songplay_id. The `year` column is the song's
    /// release year from the dimension side, while `month` is the event month.
    pub async fn build(&self, events: DataFrame, songs: &WrittenTable) -> Result<DataFrame> {
        let songs_dim = self.read_songs_dim(songs).await?;

        let joined = events.join(songs_dim, JoinType::Inner, &["song"], &["title"], None)?;
        let facts = joined.select(vec![
            col("start_timestamp"),
            ident("userId"),
            col("level"),
            col("song_id"),
            col("artist_id"),
            col("location"),
            ident("userAgent"),
            col("year"),
            col("month"),
        ])?;

        self.stamp_ids(facts).await
    }

    /// Re-reads the written songs dimension. `year` and `artist_id` live in
    /// the hive directory names and must be declared to come back as columns.
    async fn read_songs_dim(&self, songs: &WrittenTable) -> Result<DataFrame> {
        let options = ParquetReadOptions::default().table_partition_cols(vec![
            ("year".to_string(), DataType::Int64),
            ("artist_id".to_string(), DataType::Utf8),
        ]);

        let df = self.ctx.read_parquet(songs.location.as_str(), options).await?;
        Ok(df)
    }

    /// Prepends a songplay_id column to every collected batch and rebuilds a
    /// DataFrame. Batches are stamped in order, so ids never decrease within
    /// a run. An empty input still produces a valid empty table.
    async fn stamp_ids(&self, facts: DataFrame) -> Result<DataFrame> {
        let schema = Arc::new(facts.schema().as_arrow().clone());
        let stamped_schema = prepend_id_field(&schema);

        let batches = facts.collect().await?;
        let mut stamped = Vec::with_capacity(batches.len().max(1));
        for batch in batches {
            let ids = self.ids.next_block(batch.num_rows());
            let id_column: ArrayRef = Arc::new(Int64Array::from(ids));

            let mut columns = vec![id_column];
            columns.extend(batch.columns().iter().cloned());
            stamped.push(RecordBatch::try_new(stamped_schema.clone(), columns)?);
        }
        if stamped.is_empty() {
            stamped.push(RecordBatch::new_empty(stamped_schema));
        }

        let df = self.ctx.read_batches(stamped)?;
        Ok(df)
    }
}

fn prepend_id_field(schema: &SchemaRef) -> SchemaRef {
    let mut fields = vec![Field::new("songplay_id", DataType::Int64, false)];
    fields.extend(schema.fields().iter().map(|f| f.as_ref().clone()));
    Arc::new(Schema::new(fields))
}
