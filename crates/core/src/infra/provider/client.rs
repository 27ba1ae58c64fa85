use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use super::registry::{self, Credentials, ProviderRegistry};
use super::sse;
use super::Translator;
use crate::domain::error::TranslateError;
use crate::domain::types::TranslationRequest;
use crate::infra::cancel::CancelToken;

/// Chat Completions 互換 API を使う翻訳クライアント
///
/// リクエスト全体のタイムアウトは設けない。打ち切りはキャンセルトークンで行う。
pub struct HttpTranslationClient {
    client: reqwest::Client,
    registry: ProviderRegistry,
    credentials: Credentials,
}

impl HttpTranslationClient {
    pub fn new(registry: ProviderRegistry, credentials: Credentials) -> Self {
        Self {
            client: reqwest::Client::new(),
            registry,
            credentials,
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }
}

fn transport(provider: &str, e: reqwest::Error) -> TranslateError {
    TranslateError::Transport {
        provider: provider.to_string(),
        detail: e.to_string(),
    }
}

#[async_trait]
impl Translator for HttpTranslationClient {
    async fn send(
        &self,
        request: TranslationRequest,
        tokens: Option<mpsc::UnboundedSender<String>>,
        cancel: &CancelToken,
    ) -> Result<String, TranslateError> {
        let resolved = self.registry.resolve(&request.model)?;
        let provider = resolved.spec.display_name;
        let api_key = self.credentials.key_for(resolved.spec)?;

        if cancel.is_cancelled() {
            return Err(TranslateError::Cancelled);
        }

        let body = registry::build_body(&resolved, &request);
        log::info!(
            "{provider} へ{}リクエスト送信 (model={})",
            if request.stream { "ストリーミング" } else { "" },
            resolved.wire_model
        );

        let pending = self
            .client
            .post(&resolved.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send();

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TranslateError::Cancelled),
            result = pending => result.map_err(|e| transport(provider, e))?,
        };

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = registry::extract_error_message(&text);
            log::error!("{provider} API エラー: {} - {message}", status.as_u16());
            return Err(TranslateError::Http {
                provider: provider.to_string(),
                status: status.as_u16(),
                message,
            });
        }

        if request.stream {
            return sse::decode_stream(response.bytes_stream(), provider, tokens.as_ref(), cancel)
                .await;
        }

        let text = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TranslateError::Cancelled),
            result = response.text() => result.map_err(|e| transport(provider, e))?,
        };
        let json: Value =
            serde_json::from_str(&text).map_err(|e| TranslateError::MalformedResponse {
                provider: provider.to_string(),
                detail: e.to_string(),
            })?;

        registry::extract_completion(&json).ok_or_else(|| TranslateError::MalformedResponse {
            provider: provider.to_string(),
            detail: "missing choices[0].message.content".to_string(),
        })
    }

    fn check(&self, model: &str) -> Result<(), TranslateError> {
        self.credentials.check(model)
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::cancel::cancel_pair;
    use crate::infra::provider::ProviderId;

    fn request(model: &str) -> TranslationRequest {
        TranslationRequest {
            prompt: "hello".into(),
            model: model.into(),
            temperature: 0.7,
            stream: false,
        }
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_network() {
        let client = HttpTranslationClient::new(ProviderRegistry::new(), Credentials::new());
        let err = client
            .send(request("deepseek-chat"), None, &CancelToken::never())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            TranslateError::ApiKeyMissing {
                provider: "DeepSeek".into()
            }
        );
    }

    #[tokio::test]
    async fn test_unknown_model_rejected() {
        let client = HttpTranslationClient::new(ProviderRegistry::new(), Credentials::new());
        let err = client
            .send(request("llama-3"), None, &CancelToken::never())
            .await
            .unwrap_err();
        assert!(matches!(err, TranslateError::UnsupportedModel(_)));
    }

    #[tokio::test]
    async fn test_already_cancelled_skips_request() {
        let creds = Credentials::new().with_key(ProviderId::DeepSeek, "sk-test");
        // 到達不能なエンドポイントでも Cancelled が先に返る
        let registry = ProviderRegistry::new()
            .with_endpoint(ProviderId::DeepSeek, "http://127.0.0.1:9/chat");
        let client = HttpTranslationClient::new(registry, creds);
        let (handle, token) = cancel_pair();
        handle.cancel();
        let err = client
            .send(request("deepseek-chat"), None, &token)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_check_uses_credentials() {
        let client = HttpTranslationClient::new(ProviderRegistry::new(), Credentials::new());
        assert!(client.check("grok-3").is_err());
        assert_eq!(client.name(), "http");
    }
}
