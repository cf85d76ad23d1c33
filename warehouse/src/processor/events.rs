use common::Result;
use datafusion::dataframe::DataFrame;
use datafusion::execution::context::SessionContext;
use datafusion::prelude::{col, lit, NdJsonReadOptions};

use super::dedup::distinct_by_key;
use super::udf;
use crate::schema::RAW_LOG_SCHEMA;

/// Log-event side of the pipeline: raw activity NDJSON in; filtered and
/// time-decomposed events out, plus the users and time projections.
pub struct LogEventProcessor {
    ctx: SessionContext,
}

impl LogEventProcessor {
    pub fn new(ctx: &SessionContext) -> Self {
        Self { ctx: ctx.clone() }
    }

    /// Reads every `.json` file under `<input_root>/log_data/`.
    pub async fn read_raw(&self, input_root: &str) -> Result<DataFrame> {
        let location = format!("{}/log_data/", input_root.trim_end_matches('/'));
        let options = NdJsonReadOptions::default().schema(&RAW_LOG_SCHEMA);

        let df = self.ctx.read_json(location, options).await?;
        Ok(df)
    }

    /// Keeps only song-play actions. Everything downstream of the log source,
    /// users included, is built from the filtered set.
    pub fn filter_next_song(&self, raw: DataFrame) -> Result<DataFrame> {
        let df = raw.filter(col("page").eq(lit("NextSong")))?;
        Ok(df)
    }

    /// Adds `start_timestamp` (formatted UTC event time) and `month`. The
    /// month is attached here because songplays partitioning needs it before
    /// the time projection exists.
    pub fn decompose(&self, filtered: DataFrame) -> Result<DataFrame> {
        let df = filtered
            .with_column("start_timestamp", udf::event_time_udf().call(vec![col("ts")]))?
            .with_column("month", udf::month_udf().call(vec![col("start_timestamp")]))?;
        Ok(df)
    }

    /// Users dimension: one row per userId.
    pub fn users(&self, events: DataFrame) -> Result<DataFrame> {
        distinct_by_key(
            events,
            "userId",
            &["userId", "firstName", "lastName", "gender", "level"],
        )
    }

    /// Time dimension: one row per event, calendar parts decomposed from the
    /// formatted event time. Shared timestamps stay duplicated.
    pub fn time(&self, events: DataFrame) -> Result<DataFrame> {
        let df = events.select(vec![
            col("start_timestamp"),
            udf::hour_udf().call(vec![col("start_timestamp")]).alias("hour"),
            udf::day_udf().call(vec![col("start_timestamp")]).alias("day"),
            udf::week_udf().call(vec![col("start_timestamp")]).alias("week"),
            udf::month_udf().call(vec![col("start_timestamp")]).alias("month"),
            udf::year_udf().call(vec![col("start_timestamp")]).alias("year"),
            udf::weekday_udf().call(vec![col("start_timestamp")]).alias("weekday"),
        ])?;
        Ok(df)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datafusion::arrow::array::{Int32Array, Int64Array, StringArray};
    use datafusion::arrow::datatypes::{DataType, Field, Schema};
    use datafusion::arrow::record_batch::RecordBatch;
    use std::sync::Arc;

    fn event_frame(ctx: &SessionContext) -> DataFrame {
        let schema = Arc::new(Schema::new(vec![
            Field::new("page", DataType::Utf8, true),
            Field::new("ts", DataType::Int64, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec![
                    Some("NextSong"),
                    Some("Help"),
                    Some("Home"),
                    None,
                ])),
                Arc::new(Int64Array::from(vec![
                    Some(1541440000000),
                    Some(1541440000000),
                    Some(1541440000000),
                    Some(1541440000000),
                ])),
            ],
        )
        .unwrap();
        ctx.read_batches(vec![batch]).unwrap()
    }

    #[tokio::test]
    async fn test_filter_keeps_only_next_song() {
        let ctx = SessionContext::new();
        let processor = LogEventProcessor::new(&ctx);

        let filtered = processor.filter_next_song(event_frame(&ctx)).unwrap();
        let batches = filtered.collect().await.unwrap();

        let rows: usize = batches.iter().map(|b| b.num_rows()).sum();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn test_decompose_adds_event_time_and_month() {
        let ctx = SessionContext::new();
        let processor = LogEventProcessor::new(&ctx);

        let filtered = processor.filter_next_song(event_frame(&ctx)).unwrap();
        let decomposed = processor.decompose(filtered).unwrap();
        let batches = decomposed.collect().await.unwrap();

        assert_eq!(batches.len(), 1);
        let batch = &batches[0];
        let start = batch
            .column_by_name("start_timestamp")
            .unwrap()
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        let month = batch
            .column_by_name("month")
            .unwrap()
            .as_any()
            .downcast_ref::<Int32Array>()
            .unwrap();

        assert_eq!(start.value(0), "2018-11-05 17:46:40");
        assert_eq!(month.value(0), 11);
    }
}
