use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{PipelineError, ensure_success};

const SERVICE: &str = "media";

/// Downloads source media and checks whether published artifacts are reachable.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, PipelineError>;

    /// Lightweight existence check; any failure counts as "not yet".
    async fn is_available(&self, url: &str) -> bool;
}

#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, PipelineError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| PipelineError::transport(SERVICE, err))?;
        let response = ensure_success(SERVICE, response).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|err| PipelineError::transport(SERVICE, err))?;
        Ok(bytes.to_vec())
    }

    async fn is_available(&self, url: &str) -> bool {
        match self.client.head(url).send().await {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                tracing::debug!(url, error = %err, "availability check failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::{Router, http::StatusCode, routing::get};

    use super::*;
    use crate::testing::spawn_server;

    #[tokio::test]
    async fn reachable_objects_are_fetched_and_missing_ones_are_not_available() {
        let router = Router::new()
            .route("/media/a.png", get(|| async { "png bytes" }))
            .route("/media/gone.png", get(|| async { StatusCode::NOT_FOUND }));
        let base = spawn_server(router).await;
        let fetcher = HttpFetcher::new();

        assert_eq!(fetcher.fetch(&format!("{base}/media/a.png")).await.unwrap(), b"png bytes");
        assert!(fetcher.is_available(&format!("{base}/media/a.png")).await);
        assert!(!fetcher.is_available(&format!("{base}/media/gone.png")).await);
        assert!(matches!(
            fetcher.fetch(&format!("{base}/media/gone.png")).await,
            Err(PipelineError::Upstream { status: Some(404), .. })
        ));
    }
}
