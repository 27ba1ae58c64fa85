use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// 翻訳実行設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationSettings {
    /// 選択中のモデルID（例: "deepseek-chat", "grok-3"）
    pub model: String,
    /// サンプリング温度 [0, 2]
    pub temperature: f32,
    /// ストリーミング出力を使うか
    pub stream: bool,
    /// チャンク間要約を生成して後続チャンクに渡すか
    pub inter_chunk_summaries: bool,
    pub source_language: String,
    pub target_language: String,
    /// {glossary_terms} に人名系カテゴリのみ出力する
    pub glossary_characters_only: bool,
    /// 非人名系用語をチャンク原文に事前置換する（実験的）
    pub glossary_substitution: bool,
    /// ストリーム出力をまとめて反映する間隔（ミリ秒）
    pub flush_interval_ms: u64,
    /// モデルID -> チャンクのトークン上限
    pub chunk_token_overrides: HashMap<String, usize>,
    /// トークナイザーサービスのURL（None ならローカル分割のみ）
    pub tokenizer_url: Option<String>,
    pub api_keys: ApiKeys,
}

/// プロバイダー別 API キー
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiKeys {
    pub xai: Option<String>,
    pub deepseek: Option<String>,
    pub openrouter: Option<String>,
}

pub const DEFAULT_TOKENIZER_URL: &str = "http://localhost:5000";
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 100;
pub const MAX_TEMPERATURE: f32 = 2.0;

impl TranslationSettings {
    /// 範囲外の値を丸めた設定を返す
    pub fn normalized(mut self) -> Self {
        self.temperature = if self.temperature.is_finite() {
            self.temperature.clamp(0.0, MAX_TEMPERATURE)
        } else {
            Self::default().temperature
        };
        if self.flush_interval_ms == 0 {
            self.flush_interval_ms = DEFAULT_FLUSH_INTERVAL_MS;
        }
        if self.source_language.trim().is_empty() {
            self.source_language = Self::default().source_language;
        }
        if self.target_language.trim().is_empty() {
            self.target_language = Self::default().target_language;
        }
        self
    }

    /// モデル別のトークン上限上書きを取得
    pub fn chunk_token_override(&self, model: &str) -> Option<usize> {
        self.chunk_token_overrides
            .get(model)
            .copied()
            .filter(|v| *v > 0)
    }
}

impl Default for TranslationSettings {
    fn default() -> Self {
        Self {
            model: "deepseek-chat".to_string(),
            temperature: 0.7,
            stream: false,
            inter_chunk_summaries: false,
            source_language: "Japanese".to_string(),
            target_language: "English".to_string(),
            glossary_characters_only: false,
            glossary_substitution: false,
            flush_interval_ms: DEFAULT_FLUSH_INTERVAL_MS,
            chunk_token_overrides: HashMap::new(),
            tokenizer_url: None,
            api_keys: ApiKeys::default(),
        }
    }
}
