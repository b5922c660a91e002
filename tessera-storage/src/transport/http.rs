//! Gateway transport over HTTP.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::sync::Mutex;
use std::time::Duration;
use tessera_core::{
    BatchRequest, Envelope, QueryRequest, Statement, StorageError, HEADER_BOOKMARK,
    HEADER_DB_NAME, HEADER_DB_TOKEN, PATH_BATCH, PATH_EXEC, PATH_FIRST, PATH_RAW, PATH_RUN,
};
use tracing::{debug, warn};

use super::{SqlClient, TransportKind};

/// POSTs each call to the gateway and carries the bookmark forward.
///
/// The bookmark from the last response is sent with the next request, so a
/// read issued after a write from this client observes that write.
pub struct HttpClient {
    client: Client,
    base_url: String,
    gateway_key: String,
    db_name: String,
    token: String,
    bookmark: Mutex<Option<String>>,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.base_url)
            .field("db_name", &self.db_name)
            .field("gateway_key", &"[REDACTED]")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl HttpClient {
    pub fn new(
        base_url: &str,
        gateway_key: &str,
        db_name: &str,
        token: &str,
        timeout: Duration,
    ) -> Result<Self, StorageError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StorageError::Io {
                reason: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            gateway_key: gateway_key.to_string(),
            db_name: db_name.to_string(),
            token: token.to_string(),
            bookmark: Mutex::new(None),
        })
    }

    fn current_bookmark(&self) -> Option<String> {
        self.bookmark.lock().ok().and_then(|b| b.clone())
    }

    fn store_bookmark(&self, value: String) {
        if let Ok(mut slot) = self.bookmark.lock() {
            *slot = Some(value);
        }
    }

    async fn post<B: Serialize + Sync>(&self, path: &str, body: &B) -> Envelope {
        let mut request = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.gateway_key)
            .header(HEADER_DB_NAME, &self.db_name)
            .header(HEADER_DB_TOKEN, &self.token)
            .json(body);
        if let Some(bookmark) = self.current_bookmark() {
            request = request.header(HEADER_BOOKMARK, bookmark);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(db = %self.db_name, path, error = %e, "Gateway request failed");
                return Envelope::failure(format!("request failed: {}", e));
            }
        };

        if let Some(bookmark) = response
            .headers()
            .get(HEADER_BOOKMARK)
            .and_then(|v| v.to_str().ok())
        {
            self.store_bookmark(bookmark.to_string());
        }

        let status = response.status();
        match response.json::<Envelope>().await {
            Ok(envelope) => {
                debug!(db = %self.db_name, path, %status, success = envelope.success, "Gateway response");
                envelope
            }
            Err(e) => Envelope::failure(format!("invalid gateway response ({}): {}", status, e)),
        }
    }
}

#[async_trait]
impl SqlClient for HttpClient {
    async fn query(&self, sql: &str, params: Vec<Value>) -> Envelope {
        self.post(PATH_RUN, &QueryRequest::new(sql, params)).await
    }

    async fn exec(&self, sql: &str) -> Envelope {
        self.post(PATH_EXEC, &QueryRequest::new(sql, Vec::new()))
            .await
    }

    async fn batch(&self, statements: Vec<Statement>) -> Envelope {
        self.post(PATH_BATCH, &BatchRequest { batch: statements })
            .await
    }

    async fn raw(&self, sql: &str, params: Vec<Value>, column_names: bool) -> Envelope {
        let mut request = QueryRequest::new(sql, params);
        request.column_names = Some(column_names);
        self.post(PATH_RAW, &request).await
    }

    async fn first(&self, sql: &str, params: Vec<Value>, column_name: Option<&str>) -> Envelope {
        let mut request = QueryRequest::new(sql, params);
        request.column_name = column_name.map(str::to_string);
        self.post(PATH_FIRST, &request).await
    }

    fn bookmark(&self) -> Option<String> {
        self.current_bookmark()
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Http
    }

    fn db_name(&self) -> &str {
        &self.db_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_gateway_resolves_to_failure() -> Result<(), StorageError> {
        // Port 9 (discard) on localhost is closed in test environments.
        let client = HttpClient::new(
            "http://127.0.0.1:9/",
            "key",
            "tenant-1",
            "tok",
            Duration::from_millis(500),
        )?;
        let envelope = client.query("SELECT 1", Vec::new()).await;
        assert!(!envelope.success);
        assert!(envelope
            .error_message()
            .map(|e| e.starts_with("request failed"))
            .unwrap_or(false));
        assert_eq!(client.bookmark(), None);
        Ok(())
    }
}
