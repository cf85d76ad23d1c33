use common::Result;
use datafusion::dataframe::DataFrame;
use datafusion::logical_expr::SortExpr;
use datafusion::prelude::{ident, Expr};

/// One row per key: DISTINCT ON the key with an ascending whole-row sort,
/// nulls last, so the lexicographically smallest row survives duplicate keys
/// regardless of input order.
pub fn distinct_by_key(df: DataFrame, key: &str, columns: &[&str]) -> Result<DataFrame> {
    let select: Vec<Expr> = columns.iter().map(|c| ident(*c)).collect();
    let sort: Vec<SortExpr> = std::iter::once(key)
        .chain(columns.iter().filter(|c| **c != key).copied())
        .map(|c| ident(c).sort(true, false))
        .collect();

    let df = df.distinct_on(vec![ident(key)], select, Some(sort))?;
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use datafusion::arrow::array::StringArray;
    use datafusion::arrow::datatypes::{DataType, Field, Schema};
    use datafusion::arrow::record_batch::RecordBatch;
    use datafusion::prelude::SessionContext;
    use std::sync::Arc;

    fn sample_frame(ctx: &SessionContext, ids: Vec<Option<&str>>, names: Vec<Option<&str>>) -> DataFrame {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, true),
            Field::new("name", DataType::Utf8, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(StringArray::from(names)),
            ],
        )
        .unwrap();
        ctx.read_batches(vec![batch]).unwrap()
    }

    async fn collect_pairs(df: DataFrame) -> Vec<(Option<String>, Option<String>)> {
        let df = df.sort(vec![ident("id").sort(true, false)]).unwrap();
        let batches = df.collect().await.unwrap();

        let mut rows = Vec::new();
        for batch in batches {
            let ids = batch
                .column(0)
                .as_any()
                .downcast_ref::<StringArray>()
                .unwrap();
            let names = batch
                .column(1)
                .as_any()
                .downcast_ref::<StringArray>()
                .unwrap();
            for i in 0..batch.num_rows() {
                let value = |arr: &StringArray| {
                    if arr.is_null(i) { None } else { Some(arr.value(i).to_string()) }
                };
                rows.push((value(ids), value(names)));
            }
        }
        rows
    }

    #[tokio::test]
    async fn test_smallest_row_survives_duplicate_keys() {
        let ctx = SessionContext::new();
        let df = sample_frame(
            &ctx,
            vec![Some("k2"), Some("k1"), Some("k1")],
            vec![Some("z"), Some("b"), Some("a")],
        );

        let rows = collect_pairs(distinct_by_key(df, "id", &["id", "name"]).unwrap()).await;

        assert_eq!(
            rows,
            vec![
                (Some("k1".to_string()), Some("a".to_string())),
                (Some("k2".to_string()), Some("z".to_string())),
            ]
        );
    }

    #[tokio::test]
    async fn test_null_attributes_sort_last() {
        let ctx = SessionContext::new();
        let df = sample_frame(
            &ctx,
            vec![Some("k1"), Some("k1")],
            vec![None, Some("b")],
        );

        let rows = collect_pairs(distinct_by_key(df, "id", &["id", "name"]).unwrap()).await;

        assert_eq!(rows, vec![(Some("k1".to_string()), Some("b".to_string()))]);
    }
}
