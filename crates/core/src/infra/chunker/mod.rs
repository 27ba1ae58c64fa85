pub mod http;
mod local;

pub use http::HttpTokenizerService;
pub use local::split_paragraphs;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::error::TranslateError;
use crate::domain::types::{Chunk, ChunkingBudget, CHARS_PER_TOKEN_ESTIMATE};

/// トークナイザーサービスのエラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenizerError {
    #[error("Tokenizer service unavailable: {0}")]
    Unavailable(String),
    #[error("Tokenizer service error: {status} - {message}")]
    Http { status: u16, message: String },
    #[error("Malformed tokenizer response: {0}")]
    Malformed(String),
}

/// `POST /chunk` のレスポンス
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkResponse {
    pub chunks: Vec<String>,
    #[serde(default)]
    pub chunk_count: usize,
    #[serde(default)]
    pub actual_total_tokens_in_chunks: usize,
    #[serde(default)]
    pub max_tokens_setting: Option<usize>,
}

/// トークン単位の分割・計数を行う外部サービス
#[async_trait]
pub trait TokenizerService: Send + Sync {
    /// 利用可能か（タイムアウト付き）
    async fn health(&self) -> bool;

    async fn chunk(&self, text: &str, max_tokens: usize) -> Result<ChunkResponse, TokenizerError>;

    async fn count_tokens(&self, text: &str) -> Result<usize, TokenizerError>;

    fn name(&self) -> &str;
}

/// 原文をチャンクに分ける
///
/// トークナイザーサービスが使えればその結果をそのまま使い、
/// 使えなければ段落単位のローカル分割に切り替える。
#[derive(Clone, Default)]
pub struct TextChunker {
    tokenizer: Option<Arc<dyn TokenizerService>>,
}

impl TextChunker {
    /// ローカル分割のみ
    pub fn local() -> Self {
        Self { tokenizer: None }
    }

    pub fn with_tokenizer(tokenizer: Arc<dyn TokenizerService>) -> Self {
        Self {
            tokenizer: Some(tokenizer),
        }
    }

    pub fn tokenizer(&self) -> Option<&Arc<dyn TokenizerService>> {
        self.tokenizer.as_ref()
    }

    pub async fn split(
        &self,
        text: &str,
        budget: ChunkingBudget,
    ) -> Result<Vec<Chunk>, TranslateError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }
        if budget.max_chars() == 0 {
            return Err(TranslateError::ChunkingSetup(format!(
                "invalid chunk budget: {} tokens",
                budget.max_tokens
            )));
        }

        if let Some(tokenizer) = &self.tokenizer {
            match self.split_remote(tokenizer.as_ref(), text, budget).await {
                Ok(chunks) => return Ok(chunks),
                Err(e) => {
                    log::warn!("トークナイザーを使えないためローカル分割に切り替えます: {e}");
                }
            }
        }

        let pieces = split_paragraphs(text, budget.max_chars());
        let chunks = finalize(pieces, trimmed, |piece| {
            Some(piece.chars().count().div_ceil(budget.chars_per_token.max(1)))
        });
        log::info!(
            "ローカル分割: {} チャンク (上限 {} 文字)",
            chunks.len(),
            budget.max_chars()
        );
        Ok(chunks)
    }

    async fn split_remote(
        &self,
        tokenizer: &dyn TokenizerService,
        text: &str,
        budget: ChunkingBudget,
    ) -> Result<Vec<Chunk>, TokenizerError> {
        if !tokenizer.health().await {
            return Err(TokenizerError::Unavailable(format!(
                "{} health check failed",
                tokenizer.name()
            )));
        }

        let response = tokenizer.chunk(text, budget.max_tokens).await?;
        let non_empty = response.chunks.iter().filter(|c| !c.trim().is_empty()).count();
        if non_empty == 0 {
            return Err(TokenizerError::Malformed("no chunks returned".to_string()));
        }

        let average = if response.actual_total_tokens_in_chunks > 0 {
            Some(response.actual_total_tokens_in_chunks / response.chunks.len().max(1))
        } else {
            None
        };
        let chunks = finalize(response.chunks, text.trim(), |_| average);
        log::info!(
            "トークナイザー分割: {} チャンク (合計 {} トークン)",
            chunks.len(),
            response.actual_total_tokens_in_chunks
        );
        Ok(chunks)
    }
}

/// 空チャンクを除いて番号を振る。全て消えた場合は原文全体を1チャンクにする。
fn finalize(
    pieces: Vec<String>,
    trimmed_input: &str,
    estimate: impl Fn(&str) -> Option<usize>,
) -> Vec<Chunk> {
    let mut texts: Vec<String> = pieces
        .into_iter()
        .filter(|p| !p.trim().is_empty())
        .collect();
    if texts.is_empty() && !trimmed_input.is_empty() {
        texts.push(trimmed_input.to_string());
    }

    texts
        .into_iter()
        .enumerate()
        .map(|(i, text)| Chunk {
            index: i + 1,
            estimated_tokens: estimate(&text),
            text,
        })
        .collect()
}

/// トークン数の概算（4文字 ≒ 1トークン）
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN_ESTIMATE)
}
