//! PostgREST (`rest/v1`) table access.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use url::Url;

use super::SupabaseClient;
use crate::backend::{BackendError, Caller, Query, TableStore, TableSubscription};

const RETURN_REPRESENTATION: &str = "return=representation";
const MERGE_DUPLICATES: &str = "resolution=merge-duplicates,return=representation";

impl SupabaseClient {
    fn table_url(&self, table: &str, params: &[(String, String)]) -> Result<Url, BackendError> {
        let mut url = self.endpoint(&format!("rest/v1/{table}"))?;
        if !params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }
}

// Inserts return a one-element array.
fn single_row(rows: Vec<Value>, table: &str) -> Result<Value, BackendError> {
    rows.into_iter().next().ok_or_else(|| BackendError::Api {
        status: 200,
        message: format!("{table}: write returned no row"),
    })
}

#[async_trait]
impl TableStore for SupabaseClient {
    async fn select(
        &self,
        caller: &Caller,
        table: &str,
        query: &Query,
    ) -> Result<Vec<Value>, BackendError> {
        let url = self.table_url(table, &query.to_postgrest_params())?;
        tracing::debug!(table, url = %url, "PostgREST select");
        self.send_json(self.request(Method::GET, url, caller)).await
    }

    async fn insert(
        &self,
        caller: &Caller,
        table: &str,
        row: Value,
    ) -> Result<Value, BackendError> {
        let url = self.table_url(table, &[])?;
        let rows: Vec<Value> = self
            .send_json(
                self.request(Method::POST, url, caller)
                    .header("Prefer", RETURN_REPRESENTATION)
                    .json(&row),
            )
            .await?;
        single_row(rows, table)
    }

    async fn update(
        &self,
        caller: &Caller,
        table: &str,
        query: &Query,
        patch: Value,
    ) -> Result<Vec<Value>, BackendError> {
        if !query.has_filters() {
            return Err(BackendError::InvalidRequest(format!(
                "refusing to update every row of {table}"
            )));
        }
        let url = self.table_url(table, &query.to_filter_params())?;
        self.send_json(
            self.request(Method::PATCH, url, caller)
                .header("Prefer", RETURN_REPRESENTATION)
                .json(&patch),
        )
        .await
    }

    async fn upsert(
        &self,
        caller: &Caller,
        table: &str,
        row: Value,
    ) -> Result<Value, BackendError> {
        let url = self.table_url(table, &[])?;
        let rows: Vec<Value> = self
            .send_json(
                self.request(Method::POST, url, caller)
                    .header("Prefer", MERGE_DUPLICATES)
                    .json(&row),
            )
            .await?;
        single_row(rows, table)
    }

    async fn delete(
        &self,
        caller: &Caller,
        table: &str,
        query: &Query,
    ) -> Result<(), BackendError> {
        if !query.has_filters() {
            return Err(BackendError::InvalidRequest(format!(
                "refusing to delete every row of {table}"
            )));
        }
        let url = self.table_url(table, &query.to_filter_params())?;
        self.send(self.request(Method::DELETE, url, caller)).await?;
        Ok(())
    }

    fn subscribe(&self, table: &str) -> TableSubscription {
        self.changes().subscribe(table)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;
    use serde_json::json;

    use super::*;
    use crate::backend::ChangeFeed;
    use crate::config::SupabaseConfig;

    fn client() -> SupabaseClient {
        let config = SupabaseConfig {
            url: Url::parse("https://abcd.supabase.co").unwrap(),
            anon_key: SecretString::from("anon-key".to_string()),
            realtime: false,
        };
        SupabaseClient::new(&config, ChangeFeed::new()).unwrap()
    }

    #[test]
    fn test_table_url_encodes_query() {
        let query = Query::new()
            .eq("id", "a b")
            .order_by("created_at", false)
            .limit(1);
        let url = client()
            .table_url("products", &query.to_postgrest_params())
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://abcd.supabase.co/rest/v1/products?select=*&id=eq.a+b&order=created_at.desc&limit=1"
        );
    }

    #[test]
    fn test_table_url_without_params() {
        let url = client().table_url("main_content", &[]).unwrap();
        assert_eq!(url.as_str(), "https://abcd.supabase.co/rest/v1/main_content");
    }

    #[test]
    fn test_single_row() {
        assert_eq!(
            single_row(vec![json!({"id": 1})], "products").unwrap(),
            json!({"id": 1})
        );
        assert!(single_row(Vec::new(), "products").is_err());
    }
}
