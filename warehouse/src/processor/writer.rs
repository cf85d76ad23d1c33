use common::{Error, Result};
use datafusion::arrow::array::UInt64Array;
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::dataframe::{DataFrame, DataFrameWriteOptions};
use datafusion::execution::context::SessionContext;
use tracing::info;

use crate::storage;
use crate::tables::TableSpec;

/// Proof that a table finished writing. Fact derivation demands the songs
/// handle before it will run.
#[derive(Debug, Clone)]
pub struct WrittenTable {
    pub table: &'static str,
    pub location: String,
    pub rows: u64,
}

/// Persists DataFrames as hive-partitioned parquet under the output root.
pub struct TableWriter {
    ctx: SessionContext,
    output_root: String,
}

impl TableWriter {
    pub fn new(ctx: &SessionContext, output_root: &str) -> Self {
        Self {
            ctx: ctx.clone(),
            output_root: output_root.to_string(),
        }
    }

    /// Writes one table: refuses existing output, writes parquet partitioned
    /// by the table's partition keys, then verifies the engine-reported row
    /// count against a pre-write count so no rows are dropped silently.
    pub async fn write(&self, df: DataFrame, table: &TableSpec) -> Result<WrittenTable> {
        let location = table.location(&self.output_root);
        storage::ensure_location_empty(&self.ctx, table.name, &location).await?;

        let expected = df.clone().count().await? as u64;

        let options = DataFrameWriteOptions::new().with_partition_by(table.partition_columns());
        let report = df
            .write_parquet(&location, options, None)
            .await
            .map_err(|e| Error::WriteFailure {
                table: table.name.to_string(),
                detail: e.to_string(),
            })?;

        let rows = written_rows(&report);
        if rows != expected {
            return Err(Error::WriteFailure {
                table: table.name.to_string(),
                detail: format!("wrote {} of {} rows", rows, expected),
            });
        }

        info!(table = %table.name, rows, location = %location, "Table written");

        Ok(WrittenTable {
            table: table.name,
            location,
            rows,
        })
    }
}

/// Sums the `count` column of the batches `write_parquet` reports back.
fn written_rows(report: &[RecordBatch]) -> u64 {
    report
        .iter()
        .filter_map(|batch| batch.column_by_name("count"))
        .filter_map(|column| column.as_any().downcast_ref::<UInt64Array>())
        .map(|counts| counts.iter().flatten().sum::<u64>())
        .sum()
}
