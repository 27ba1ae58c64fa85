use serde::Serialize;

use super::error::AppError;

/// バッチ翻訳の状態
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BatchPhase {
    Idle,
    Chunking,
    TranslatingChunk { index: usize },
    Summarizing { index: usize },
    Completed,
    Aborted,
    FailedSetup,
}

impl BatchPhase {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Idle => "idle",
            Self::Chunking => "chunking",
            Self::TranslatingChunk { .. } => "translating_chunk",
            Self::Summarizing { .. } => "summarizing",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
            Self::FailedSetup => "failed_setup",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Aborted | Self::FailedSetup)
    }
}

/// チャンク単位の要約（この実行内のみ）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkSummary {
    pub index: usize,
    pub text: String,
}

/// 1回のバッチ実行の状態。実行ごとに作られ、永続化しない。
#[derive(Debug, Clone, Serialize)]
pub struct BatchState {
    pub run_id: String,
    pub phase: BatchPhase,
    pub total_chunks: usize,
    pub current_chunk_index: usize,
    pub chunk_summaries: Vec<ChunkSummary>,
    pub overall_success: bool,
    pub aborted: bool,
    pub started_at: String,
    pub updated_at: String,
}

/// 状態遷移イベントペイロード
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateTransition {
    pub run_id: String,
    pub prev_state: String,
    pub new_state: BatchPhase,
}

impl BatchState {
    pub fn new(run_id: String, now: String) -> Self {
        Self {
            run_id,
            phase: BatchPhase::Idle,
            total_chunks: 0,
            current_chunk_index: 0,
            chunk_summaries: Vec::new(),
            overall_success: true,
            aborted: false,
            started_at: now.clone(),
            updated_at: now,
        }
    }

    fn transition(&mut self, new_state: BatchPhase, now: String) -> StateTransition {
        let prev = self.phase.as_str().to_string();
        self.phase = new_state;
        self.updated_at = now;
        StateTransition {
            run_id: self.run_id.clone(),
            prev_state: prev,
            new_state: self.phase.clone(),
        }
    }

    /// Idle → Chunking
    pub fn begin_chunking(&mut self, now: String) -> Result<StateTransition, AppError> {
        match &self.phase {
            BatchPhase::Idle => Ok(self.transition(BatchPhase::Chunking, now)),
            other => Err(AppError::invalid_state(format!(
                "begin_chunking は {} 状態では実行できません",
                other.as_str()
            ))),
        }
    }

    /// Chunking → TranslatingChunk(1)
    pub fn on_chunked(&mut self, total: usize, now: String) -> Result<StateTransition, AppError> {
        match &self.phase {
            BatchPhase::Chunking if total > 0 => {
                self.total_chunks = total;
                self.current_chunk_index = 1;
                Ok(self.transition(BatchPhase::TranslatingChunk { index: 1 }, now))
            }
            BatchPhase::Chunking => Err(AppError::invalid_state("チャンクが0件です")),
            other => Err(AppError::invalid_state(format!(
                "on_chunked は {} 状態では実行できません",
                other.as_str()
            ))),
        }
    }

    /// Chunking → FailedSetup
    pub fn fail_setup(&mut self, now: String) -> Result<StateTransition, AppError> {
        match &self.phase {
            BatchPhase::Chunking => {
                self.overall_success = false;
                Ok(self.transition(BatchPhase::FailedSetup, now))
            }
            other => Err(AppError::invalid_state(format!(
                "fail_setup は {} 状態では実行できません",
                other.as_str()
            ))),
        }
    }

    /// TranslatingChunk(i) → Summarizing(i)（後続チャンクがある場合のみ）
    pub fn begin_summary(&mut self, now: String) -> Result<StateTransition, AppError> {
        match self.phase {
            BatchPhase::TranslatingChunk { index } if index < self.total_chunks => {
                Ok(self.transition(BatchPhase::Summarizing { index }, now))
            }
            BatchPhase::TranslatingChunk { .. } => {
                Err(AppError::invalid_state("最終チャンクの後に要約は不要です"))
            }
            ref other => Err(AppError::invalid_state(format!(
                "begin_summary は {} 状態では実行できません",
                other.as_str()
            ))),
        }
    }

    /// TranslatingChunk(i) | Summarizing(i) → TranslatingChunk(i+1)
    pub fn next_chunk(&mut self, now: String) -> Result<StateTransition, AppError> {
        match self.phase {
            BatchPhase::TranslatingChunk { index } | BatchPhase::Summarizing { index }
                if index < self.total_chunks =>
            {
                self.current_chunk_index = index + 1;
                Ok(self.transition(BatchPhase::TranslatingChunk { index: index + 1 }, now))
            }
            ref other => Err(AppError::invalid_state(format!(
                "next_chunk は {} 状態では実行できません",
                other.as_str()
            ))),
        }
    }

    /// チャンク失敗後に続行した場合、成功フラグだけを落とす
    pub fn mark_chunk_failed(&mut self) {
        self.overall_success = false;
    }

    pub fn record_summary(&mut self, index: usize, text: String) {
        self.chunk_summaries.push(ChunkSummary { index, text });
    }

    /// TranslatingChunk(N) → Completed
    pub fn complete(&mut self, now: String) -> Result<StateTransition, AppError> {
        match self.phase {
            BatchPhase::TranslatingChunk { index } if index == self.total_chunks => {
                Ok(self.transition(BatchPhase::Completed, now))
            }
            ref other => Err(AppError::invalid_state(format!(
                "complete は {} 状態では実行できません",
                other.as_str()
            ))),
        }
    }

    /// 任意の非終端状態 → Aborted
    pub fn abort(&mut self, now: String) -> Result<StateTransition, AppError> {
        if self.phase.is_terminal() || self.phase == BatchPhase::Idle {
            return Err(AppError::invalid_state(format!(
                "abort は {} 状態では実行できません",
                self.phase.as_str()
            )));
        }
        self.aborted = true;
        self.overall_success = false;
        Ok(self.transition(BatchPhase::Aborted, now))
    }
}
