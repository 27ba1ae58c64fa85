use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::error::TranslateError;
use crate::domain::settings::{ApiKeys, TranslationSettings};
use crate::domain::types::{ChunkingBudget, TranslationRequest};

/// LLM プロバイダー
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderId {
    #[serde(rename = "xai")]
    Xai,
    #[serde(rename = "deepseek")]
    DeepSeek,
    #[serde(rename = "openrouter")]
    OpenRouter,
}

/// プロバイダーごとの固定設定
#[derive(Debug)]
pub struct ProviderSpec {
    pub id: ProviderId,
    pub display_name: &'static str,
    pub endpoint: &'static str,
    /// このプレフィックスで始まるモデルIDをこのプロバイダーに振り分ける
    pub model_prefix: &'static str,
    /// 送信時にモデルIDからプレフィックスを外すか
    pub strip_prefix: bool,
    pub max_output_tokens: u32,
    /// 未設定を示すキーの値
    pub key_placeholder: &'static str,
    pub default_chunk_tokens: usize,
}

/// 未知モデルのチャンク上限
pub const DEFAULT_CHUNK_TOKENS: usize = 6000;

/// プレフィックスの長い順（openrouter/deepseek/... を DeepSeek に誤判定しない）
pub static PROVIDERS: [ProviderSpec; 3] = [
    ProviderSpec {
        id: ProviderId::OpenRouter,
        display_name: "OpenRouter",
        endpoint: "https://openrouter.ai/api/v1/chat/completions",
        model_prefix: "openrouter/",
        strip_prefix: true,
        max_output_tokens: 16384,
        key_placeholder: "YOUR_OPENROUTER_API_KEY",
        default_chunk_tokens: 6000,
    },
    ProviderSpec {
        id: ProviderId::Xai,
        display_name: "xAI",
        endpoint: "https://api.x.ai/v1/chat/completions",
        model_prefix: "grok-",
        strip_prefix: false,
        max_output_tokens: 131072,
        key_placeholder: "YOUR_XAI_API_KEY",
        default_chunk_tokens: 22000,
    },
    ProviderSpec {
        id: ProviderId::DeepSeek,
        display_name: "DeepSeek",
        endpoint: "https://api.deepseek.com/chat/completions",
        model_prefix: "deepseek-",
        strip_prefix: false,
        max_output_tokens: 8192,
        key_placeholder: "YOUR_DEEPSEEK_API_KEY",
        default_chunk_tokens: 6000,
    },
];

impl ProviderId {
    pub fn spec(&self) -> &'static ProviderSpec {
        match self {
            Self::OpenRouter => &PROVIDERS[0],
            Self::Xai => &PROVIDERS[1],
            Self::DeepSeek => &PROVIDERS[2],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Xai => "xai",
            Self::DeepSeek => "deepseek",
            Self::OpenRouter => "openrouter",
        }
    }
}

/// モデルIDからプロバイダーを引く
pub fn provider_for_model(model: &str) -> Option<&'static ProviderSpec> {
    let model = model.trim();
    PROVIDERS
        .iter()
        .find(|p| model.starts_with(p.model_prefix) && model.len() > p.model_prefix.len())
}

/// 解決済みの送信先
#[derive(Debug, Clone)]
pub struct ResolvedModel {
    pub spec: &'static ProviderSpec,
    pub endpoint: String,
    /// リクエストボディに入れるモデル名
    pub wire_model: String,
}

/// エンドポイントの上書きを持つプロバイダー表
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    endpoints: HashMap<ProviderId, String>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// テストやプロキシ用にエンドポイントを差し替える
    pub fn with_endpoint(mut self, id: ProviderId, endpoint: impl Into<String>) -> Self {
        self.endpoints.insert(id, endpoint.into());
        self
    }

    pub fn resolve(&self, model: &str) -> Result<ResolvedModel, TranslateError> {
        let spec = provider_for_model(model)
            .ok_or_else(|| TranslateError::UnsupportedModel(model.to_string()))?;
        let model = model.trim();
        let wire_model = if spec.strip_prefix {
            model[spec.model_prefix.len()..].to_string()
        } else {
            model.to_string()
        };
        let endpoint = self
            .endpoints
            .get(&spec.id)
            .cloned()
            .unwrap_or_else(|| spec.endpoint.to_string());

        Ok(ResolvedModel {
            spec,
            endpoint,
            wire_model,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Chat Completions 互換のリクエストボディ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub stream: bool,
    pub max_tokens: u32,
}

pub fn build_body(resolved: &ResolvedModel, request: &TranslationRequest) -> ChatRequest {
    ChatRequest {
        model: resolved.wire_model.clone(),
        messages: vec![ChatMessage {
            role: "user".to_string(),
            content: request.prompt.clone(),
        }],
        temperature: request.temperature,
        stream: request.stream,
        max_tokens: resolved.spec.max_output_tokens,
    }
}

/// 非ストリーミング応答から本文を取り出す
pub fn extract_completion(body: &Value) -> Option<String> {
    body["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
}

/// エラー応答から表示用メッセージを取り出す
pub fn extract_error_message(body: &str) -> String {
    let raw = body.trim();
    if let Ok(json) = serde_json::from_str::<Value>(raw) {
        let candidates = [
            &json["error"]["message"],
            &json["error"],
            &json["message"],
            &json["detail"],
        ];
        for candidate in candidates {
            if let Some(msg) = candidate.as_str().filter(|m| !m.trim().is_empty()) {
                return msg.trim().to_string();
            }
        }
    }
    if raw.is_empty() {
        "Unknown error".to_string()
    } else {
        raw.to_string()
    }
}

/// プロバイダー別の API キー
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    keys: HashMap<ProviderId, String>,
}

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_keys(keys: &ApiKeys) -> Self {
        let mut credentials = Self::new();
        let pairs = [
            (ProviderId::Xai, &keys.xai),
            (ProviderId::DeepSeek, &keys.deepseek),
            (ProviderId::OpenRouter, &keys.openrouter),
        ];
        for (id, key) in pairs {
            if let Some(key) = key {
                credentials.keys.insert(id, key.clone());
            }
        }
        credentials
    }

    pub fn with_key(mut self, id: ProviderId, key: impl Into<String>) -> Self {
        self.keys.insert(id, key.into());
        self
    }

    /// 空・プレースホルダーのキーは未設定扱い
    pub fn key_for(&self, spec: &ProviderSpec) -> Result<&str, TranslateError> {
        self.keys
            .get(&spec.id)
            .map(|k| k.trim())
            .filter(|k| !k.is_empty() && *k != spec.key_placeholder)
            .ok_or_else(|| TranslateError::ApiKeyMissing {
                provider: spec.display_name.to_string(),
            })
    }

    /// モデルに必要なキーが揃っているか（実行前の警告用）
    pub fn check(&self, model: &str) -> Result<(), TranslateError> {
        let spec = provider_for_model(model)
            .ok_or_else(|| TranslateError::UnsupportedModel(model.to_string()))?;
        self.key_for(spec).map(|_| ())
    }
}

/// モデルのチャンク上限（設定の上書き > プロバイダー既定値）
pub fn chunk_budget(model: &str, settings: &TranslationSettings) -> ChunkingBudget {
    let max_tokens = settings
        .chunk_token_override(model)
        .or_else(|| provider_for_model(model).map(|p| p.default_chunk_tokens))
        .unwrap_or(DEFAULT_CHUNK_TOKENS);
    ChunkingBudget::new(max_tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(prompt: &str, stream: bool) -> TranslationRequest {
        TranslationRequest {
            prompt: prompt.to_string(),
            model: String::new(),
            temperature: 0.7,
            stream,
        }
    }

    #[test]
    fn test_deepseek_dispatch() {
        let resolved = ProviderRegistry::new().resolve("deepseek-chat").unwrap();
        assert_eq!(resolved.spec.id, ProviderId::DeepSeek);
        assert_eq!(resolved.endpoint, "https://api.deepseek.com/chat/completions");
        let body = build_body(&resolved, &request("p", false));
        assert_eq!(body.model, "deepseek-chat");
        assert_eq!(body.max_tokens, 8192);
    }

    #[test]
    fn test_grok_dispatch() {
        let resolved = ProviderRegistry::new().resolve("grok-3-mini").unwrap();
        assert_eq!(resolved.spec.id, ProviderId::Xai);
        let body = build_body(&resolved, &request("p", true));
        assert_eq!(body.max_tokens, 131072);
        assert!(body.stream);
    }

    #[test]
    fn test_openrouter_prefix_stripped() {
        let resolved = ProviderRegistry::new()
            .resolve("openrouter/deepseek/deepseek-r1")
            .unwrap();
        assert_eq!(resolved.spec.id, ProviderId::OpenRouter);
        assert_eq!(resolved.wire_model, "deepseek/deepseek-r1");

        let json = serde_json::to_value(build_body(&resolved, &request("hello", false))).unwrap();
        assert_eq!(json["model"], "deepseek/deepseek-r1");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "hello");
    }

    #[test]
    fn test_unknown_model_rejected() {
        let err = ProviderRegistry::new().resolve("gpt-4o").unwrap_err();
        assert_eq!(err, TranslateError::UnsupportedModel("gpt-4o".into()));
        assert!(provider_for_model("grok-").is_none());
    }

    #[test]
    fn test_endpoint_override() {
        let registry =
            ProviderRegistry::new().with_endpoint(ProviderId::Xai, "http://127.0.0.1:1/v1");
        assert_eq!(registry.resolve("grok-3").unwrap().endpoint, "http://127.0.0.1:1/v1");
        assert_eq!(
            registry.resolve("deepseek-chat").unwrap().endpoint,
            ProviderId::DeepSeek.spec().endpoint
        );
    }

    #[test]
    fn test_spec_lookup_matches_table() {
        for spec in &PROVIDERS {
            assert_eq!(spec.id.spec().model_prefix, spec.model_prefix);
        }
    }

    #[test]
    fn test_placeholder_key_is_missing() {
        let creds = Credentials::new()
            .with_key(ProviderId::Xai, "YOUR_XAI_API_KEY")
            .with_key(ProviderId::DeepSeek, "  ");
        assert!(matches!(
            creds.check("grok-3"),
            Err(TranslateError::ApiKeyMissing { .. })
        ));
        assert!(creds.check("deepseek-chat").is_err());
        assert!(creds.check("openrouter/x").is_err());

        let creds = creds.with_key(ProviderId::Xai, "xai-123");
        assert_eq!(creds.key_for(ProviderId::Xai.spec()).unwrap(), "xai-123");
    }

    #[test]
    fn test_credentials_from_settings_keys() {
        let keys = ApiKeys {
            xai: None,
            deepseek: Some("sk-1".into()),
            openrouter: None,
        };
        let creds = Credentials::from_keys(&keys);
        assert!(creds.check("deepseek-chat").is_ok());
        assert!(creds.check("grok-3").is_err());
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            extract_error_message(r#"{"error":{"message":"Invalid key"}}"#),
            "Invalid key"
        );
        assert_eq!(extract_error_message(r#"{"message":"Too many"}"#), "Too many");
        assert_eq!(extract_error_message(r#"{"detail":"Not found"}"#), "Not found");
        assert_eq!(extract_error_message(r#"{"error":"bad model"}"#), "bad model");
        assert_eq!(extract_error_message("Gateway Timeout"), "Gateway Timeout");
        assert_eq!(extract_error_message(""), "Unknown error");
    }

    #[test]
    fn test_extract_completion() {
        let body: Value =
            serde_json::from_str(r#"{"choices":[{"message":{"content":"Hi"}}]}"#).unwrap();
        assert_eq!(extract_completion(&body).as_deref(), Some("Hi"));
        let body: Value = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(extract_completion(&body).is_none());
    }

    #[test]
    fn test_chunk_budget() {
        let mut settings = TranslationSettings::default();
        assert_eq!(chunk_budget("grok-3", &settings).max_tokens, 22000);
        assert_eq!(chunk_budget("deepseek-chat", &settings).max_tokens, 6000);
        assert_eq!(chunk_budget("mystery", &settings).max_tokens, DEFAULT_CHUNK_TOKENS);
        settings.chunk_token_overrides.insert("grok-3".into(), 1000);
        assert_eq!(chunk_budget("grok-3", &settings).max_tokens, 1000);
    }
}
