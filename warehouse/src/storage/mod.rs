use std::collections::HashSet;
use std::sync::Arc;

use common::config::Settings;
use common::{Error, Result};
use datafusion::datasource::listing::ListingTableUrl;
use datafusion::execution::context::SessionContext;
use futures::StreamExt;
use object_store::aws::AmazonS3Builder;
use tracing::info;
use url::Url;

/// Registers an S3 object store for every distinct bucket referenced by the
/// configured roots. Local filesystem roots need no registration.
pub fn register_object_stores(ctx: &SessionContext, settings: &Settings) -> Result<()> {
    let mut buckets = HashSet::new();
    for root in [&settings.data.input_root, &settings.data.output_root] {
        if let Some(bucket) = s3_bucket(root) {
            buckets.insert(bucket);
        }
    }

    if buckets.is_empty() {
        return Ok(());
    }

    let s3 = settings.s3.as_ref().ok_or_else(|| {
        Error::InvalidInput(
            "s3:// locations configured without an [s3] credentials section".to_string(),
        )
    })?;

    for bucket in buckets {
        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(&bucket)
            .with_region(&s3.region)
            .with_access_key_id(&s3.access_key)
            .with_secret_access_key(&s3.secret_key)
            .with_allow_http(s3.allow_http);
        if let Some(endpoint) = &s3.endpoint {
            builder = builder.with_endpoint(endpoint);
        }
        let store = builder.build()?;

        let url = Url::parse(&format!("s3://{}", bucket))?;
        ctx.runtime_env().register_object_store(&url, Arc::new(store));
        info!(bucket = %bucket, "Registered S3 object store");
    }

    Ok(())
}

fn s3_bucket(root: &str) -> Option<String> {
    let url = Url::parse(root).ok()?;
    if url.scheme() == "s3" {
        url.host_str().map(|h| h.to_string())
    } else {
        None
    }
}

/// Rerun guard: a table may only be written to a location holding no objects.
pub async fn ensure_location_empty(
    ctx: &SessionContext,
    table: &str,
    location: &str,
) -> Result<()> {
    let url = ListingTableUrl::parse(location)?;
    let store = ctx.runtime_env().object_store(&url)?;

    let mut entries = store.list(Some(url.prefix()));
    match entries.next().await {
        None => Ok(()),
        // A prefix that was never written lists as empty or not-found
        // depending on the store; both mean the location is free.
        Some(Err(object_store::Error::NotFound { .. })) => Ok(()),
        Some(Ok(_)) => Err(Error::OutputExists {
            table: table.to_string(),
            location: location.to_string(),
        }),
        Some(Err(e)) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_s3_bucket_extraction() {
        assert_eq!(s3_bucket("s3://warehouse/analytics/"), Some("warehouse".to_string()));
        assert_eq!(s3_bucket("s3://raw-data"), Some("raw-data".to_string()));
        assert_eq!(s3_bucket("/var/data/raw"), None);
        assert_eq!(s3_bucket("data/raw"), None);
        assert_eq!(s3_bucket("file:///var/data/raw"), None);
    }

    #[tokio::test]
    async fn test_ensure_location_empty() {
        let ctx = SessionContext::new();
        let dir = tempfile::tempdir().unwrap();
        let location = format!("{}/songs/", dir.path().display());

        // Nothing written yet, including the directory itself
        ensure_location_empty(&ctx, "songs", &location).await.unwrap();

        fs::create_dir_all(dir.path().join("songs")).unwrap();
        ensure_location_empty(&ctx, "songs", &location).await.unwrap();

        fs::write(dir.path().join("songs/part-0.parquet"), b"stub").unwrap();
        let err = ensure_location_empty(&ctx, "songs", &location)
            .await
            .unwrap_err();
        match err {
            Error::OutputExists { table, .. } => assert_eq!(table, "songs"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
