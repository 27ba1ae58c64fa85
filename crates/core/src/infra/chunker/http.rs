use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ChunkResponse, TokenizerError, TokenizerService};

/// ヘルスチェックのタイムアウト（失敗したらすぐにローカル分割へ）
pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(3);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// HTTP トークナイザーサービスのクライアント
pub struct HttpTokenizerService {
    client: reqwest::Client,
    base_url: String,
    health_timeout: Duration,
}

#[derive(Serialize)]
struct ChunkRequest<'a> {
    text: &'a str,
    max_tokens: usize,
}

#[derive(Serialize)]
struct TokenizeRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct TokenizeResponse {
    token_count: usize,
}

impl HttpTokenizerService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            health_timeout: HEALTH_TIMEOUT,
        }
    }

    pub fn with_health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json<B: Serialize + Sync, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, TokenizerError> {
        let response = self
            .client
            .post(self.url(path))
            .timeout(REQUEST_TIMEOUT)
            .json(body)
            .send()
            .await
            .map_err(|e| TokenizerError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TokenizerError::Http {
                status: status.as_u16(),
                message: body,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| TokenizerError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl TokenizerService for HttpTokenizerService {
    async fn health(&self) -> bool {
        match self
            .client
            .get(self.url("/health"))
            .timeout(self.health_timeout)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                log::debug!("トークナイザーのヘルスチェック失敗: {e}");
                false
            }
        }
    }

    async fn chunk(&self, text: &str, max_tokens: usize) -> Result<ChunkResponse, TokenizerError> {
        self.post_json("/chunk", &ChunkRequest { text, max_tokens })
            .await
    }

    async fn count_tokens(&self, text: &str) -> Result<usize, TokenizerError> {
        let response: TokenizeResponse = self.post_json("/tokenize", &TokenizeRequest { text }).await?;
        Ok(response.token_count)
    }

    fn name(&self) -> &str {
        "http"
    }
}
