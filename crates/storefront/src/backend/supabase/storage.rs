//! Storage (`storage/v1`) object access.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::json;

use super::SupabaseClient;
use crate::backend::{BackendError, Caller, ObjectStore, UploadOptions};

#[async_trait]
impl ObjectStore for SupabaseClient {
    async fn upload(
        &self,
        caller: &Caller,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        options: UploadOptions,
    ) -> Result<(), BackendError> {
        let url = self.endpoint(&format!("storage/v1/object/{bucket}/{path}"))?;
        let size = bytes.len();
        self.send(
            self.request(Method::POST, url, caller)
                .header("Content-Type", content_type)
                .header(
                    "Cache-Control",
                    format!("max-age={}", options.cache_control_secs),
                )
                .header("x-upsert", options.upsert.to_string())
                .body(bytes),
        )
        .await?;
        tracing::info!(bucket, path, size, "Uploaded object");
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{}storage/v1/object/public/{bucket}/{path}",
            self.base_url()
        )
    }

    async fn remove(
        &self,
        caller: &Caller,
        bucket: &str,
        paths: &[String],
    ) -> Result<(), BackendError> {
        let url = self.endpoint(&format!("storage/v1/object/{bucket}"))?;
        self.send(
            self.request(Method::DELETE, url, caller)
                .json(&json!({ "prefixes": paths })),
        )
        .await?;
        tracing::info!(bucket, count = paths.len(), "Removed objects");
        Ok(())
    }
}
