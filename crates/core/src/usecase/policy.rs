use async_trait::async_trait;
use serde::Serialize;

use crate::domain::error::TranslateError;

/// チャンク失敗時の判断
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkDecision {
    Continue,
    Abort,
}

/// 判断に渡す失敗の文脈
#[derive(Debug, Clone)]
pub struct ChunkErrorContext {
    pub run_id: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub provider: String,
    pub error: TranslateError,
}

/// チャンク失敗時に続行/中止を決める（UI の確認ダイアログやテストが実装する）
#[async_trait]
pub trait ChunkErrorPolicy: Send + Sync {
    async fn on_chunk_error(&self, ctx: &ChunkErrorContext) -> ChunkDecision;
}

/// 常に同じ判断を返すポリシー
#[derive(Debug, Clone, Copy)]
pub struct FixedPolicy(pub ChunkDecision);

impl FixedPolicy {
    pub fn always_continue() -> Self {
        Self(ChunkDecision::Continue)
    }

    pub fn always_abort() -> Self {
        Self(ChunkDecision::Abort)
    }
}

#[async_trait]
impl ChunkErrorPolicy for FixedPolicy {
    async fn on_chunk_error(&self, ctx: &ChunkErrorContext) -> ChunkDecision {
        log::debug!(
            "チャンク {}/{} の失敗に固定判断 {:?}",
            ctx.chunk_index,
            ctx.total_chunks,
            self.0
        );
        self.0
    }
}
