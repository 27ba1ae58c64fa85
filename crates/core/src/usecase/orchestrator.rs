use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use super::policy::{ChunkDecision, ChunkErrorContext, ChunkErrorPolicy};
use crate::domain::batch::{BatchState, StateTransition};
use crate::domain::error::{AppError, BatchError, TranslateError};
use crate::domain::settings::TranslationSettings;
use crate::domain::types::{Chunk, DocumentContext, TranslationRequest};
use crate::infra::cancel::{cancel_pair, CancelHandle, CancelToken};
use crate::infra::chunker::TextChunker;
use crate::infra::glossary::Glossary;
use crate::infra::metrics::{Metrics, PHASE_CHUNK, PHASE_SUMMARY};
use crate::infra::prompt::{self, PromptContext, DEFAULT_TEMPLATE, NONE_PROVIDED};
use crate::infra::provider::{chunk_budget, Translator};

/// 1回の実行に渡す入力
#[derive(Debug, Clone, Default)]
pub struct BatchInput {
    pub source_text: String,
    /// 空なら既定テンプレート
    pub template: String,
    pub context: DocumentContext,
    pub glossary: Glossary,
}

/// 実行結果の分類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchOutcome {
    Completed,
    CompletedWithErrors,
    Aborted,
    FailedSetup,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranslatedChunk {
    pub index: usize,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedChunk {
    pub index: usize,
    pub error: AppError,
}

/// 実行終了時のレポート
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub outcome: BatchOutcome,
    pub state: BatchState,
    /// 成功したチャンクの訳文（空行区切り）。中止・一部失敗でも保持する。
    pub output: String,
    pub translated: Vec<TranslatedChunk>,
    pub failed: Vec<FailedChunk>,
    /// 実行を終わらせたエラー（セットアップ失敗・キャンセル・中止の原因）
    pub error: Option<AppError>,
    pub elapsed_ms: u64,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.outcome == BatchOutcome::Completed
    }
}

/// 出力側（UI/CLI）へ送るイベント
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BatchEvent {
    StateChanged(StateTransition),
    ChunkStarted { index: usize, total: usize },
    /// 出力に追記するテキスト（ストリーミング時はまとめて送る）
    Output { index: usize, text: String },
    ChunkCompleted { index: usize, chars: usize },
    ChunkFailed { index: usize, error: AppError },
    SummaryReady { index: usize, summary: String },
    SummarySkipped { index: usize, reason: String },
    Finished(BatchReport),
}

/// チャンク間要約の温度: max(0.1, min(t - 0.2, 0.5))
pub fn summary_temperature(temperature: f32) -> f32 {
    (temperature - 0.2).min(0.5).max(0.1)
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// バッチ翻訳オーケストレーター
///
/// 同時に走る実行は1つだけ。チャンクは逐次処理し、実行ごとに新しいキャンセルトークンを使う。
pub struct BatchOrchestrator {
    translator: Arc<dyn Translator>,
    chunker: TextChunker,
    metrics: Arc<Metrics>,
    running: AtomicBool,
    active_cancel: Mutex<Option<CancelHandle>>,
}

struct RunGuard<'a> {
    orchestrator: &'a BatchOrchestrator,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.orchestrator.active_cancel.lock().take();
        self.orchestrator.running.store(false, Ordering::Release);
    }
}

impl BatchOrchestrator {
    pub fn new(translator: Arc<dyn Translator>, chunker: TextChunker) -> Self {
        Self {
            translator,
            chunker,
            metrics: Arc::new(Metrics::new()),
            running: AtomicBool::new(false),
            active_cancel: Mutex::new(None),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// 実行中の処理をキャンセルする。実行中でなければ false。
    pub fn cancel(&self) -> bool {
        match self.active_cancel.lock().as_ref() {
            Some(handle) => {
                log::info!("バッチ翻訳のキャンセルを要求");
                handle.cancel();
                true
            }
            None => false,
        }
    }

    fn acquire(&self) -> Result<(RunGuard<'_>, CancelToken), BatchError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(BatchError::AlreadyRunning);
        }
        let (handle, token) = cancel_pair();
        *self.active_cancel.lock() = Some(handle);
        Ok((RunGuard { orchestrator: self }, token))
    }

    /// 原文全体をチャンクに分けて順に翻訳する
    ///
    /// 実行中の呼び出しと空入力は開始前に拒否する。それ以外の失敗はレポートの outcome で返す。
    pub async fn run(
        &self,
        input: BatchInput,
        settings: &TranslationSettings,
        policy: &dyn ChunkErrorPolicy,
        events: Option<mpsc::UnboundedSender<BatchEvent>>,
    ) -> Result<BatchReport, BatchError> {
        let (_guard, cancel) = self.acquire()?;
        if input.source_text.trim().is_empty() {
            return Err(BatchError::EmptyInput);
        }

        let settings = settings.clone().normalized();
        self.metrics.inc_runs_started();
        log::info!(
            "バッチ翻訳開始 (model={}, stream={}, summaries={})",
            settings.model,
            settings.stream,
            settings.inter_chunk_summaries
        );

        let run = Run {
            orchestrator: self,
            state: BatchState::new(uuid::Uuid::new_v4().to_string(), now()),
            settings,
            cancel,
            events: Emitter { tx: events },
            translated: Vec::new(),
            failed: Vec::new(),
            started: Instant::now(),
        };
        Ok(run.execute(&input, policy).await)
    }
}

struct Emitter {
    tx: Option<mpsc::UnboundedSender<BatchEvent>>,
}

impl Emitter {
    fn emit(&self, event: BatchEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }

    fn is_active(&self) -> bool {
        self.tx.is_some()
    }
}

/// 1回分の実行状態
struct Run<'a> {
    orchestrator: &'a BatchOrchestrator,
    state: BatchState,
    settings: TranslationSettings,
    cancel: CancelToken,
    events: Emitter,
    translated: Vec<TranslatedChunk>,
    failed: Vec<FailedChunk>,
    started: Instant,
}

impl Run<'_> {
    async fn execute(mut self, input: &BatchInput, policy: &dyn ChunkErrorPolicy) -> BatchReport {
        self.transition(BatchState::begin_chunking);

        let chunks = match self.split(&input.source_text).await {
            Ok(chunks) if !chunks.is_empty() => chunks,
            Ok(_) => {
                return self.fail_setup(TranslateError::ChunkingSetup(
                    "no chunks were produced".to_string(),
                ))
            }
            Err(e) if e.is_cancelled() => return self.abort(Some(AppError::from(&e))),
            Err(e) => return self.fail_setup(e),
        };

        let total = chunks.len();
        self.transition(|s, now| s.on_chunked(total, now));

        let template = if input.template.trim().is_empty() {
            DEFAULT_TEMPLATE
        } else {
            input.template.as_str()
        };
        let glossary_terms = input
            .glossary
            .format_for_prompt(self.settings.glossary_characters_only);

        for chunk in &chunks {
            let index = chunk.index;
            if index > 1 {
                self.transition(BatchState::next_chunk);
            }
            if self.cancel.is_cancelled() {
                return self.abort(Some(AppError::from(&TranslateError::Cancelled)));
            }

            log::info!("チャンク {index}/{total} を翻訳中 ({} 文字)", chunk.text.chars().count());
            self.events.emit(BatchEvent::ChunkStarted { index, total });

            let request = self.chunk_request(chunk, input, template, &glossary_terms);
            let started = Instant::now();
            let translated = match self.translate(request, index).await {
                Ok(text) => text,
                Err(e) if e.is_cancelled() => return self.abort(Some(AppError::from(&e))),
                Err(e) => {
                    let error = AppError::from(&e);
                    log::error!("チャンク {index}/{total} の翻訳に失敗: {e}");
                    self.orchestrator.metrics.inc_chunks_failed();
                    self.state.mark_chunk_failed();
                    self.failed.push(FailedChunk {
                        index,
                        error: error.clone(),
                    });
                    self.events.emit(BatchEvent::ChunkFailed {
                        index,
                        error: error.clone(),
                    });

                    if index < total {
                        match self.decide(policy, index, total, e).await {
                            Some(ChunkDecision::Continue) => continue,
                            Some(ChunkDecision::Abort) => return self.abort(Some(error)),
                            None => {
                                return self.abort(Some(AppError::from(&TranslateError::Cancelled)))
                            }
                        }
                    }
                    continue;
                }
            };

            self.orchestrator
                .metrics
                .record_latency(PHASE_CHUNK, started.elapsed().as_millis() as u64);
            self.orchestrator.metrics.inc_chunks_translated();
            self.events.emit(BatchEvent::ChunkCompleted {
                index,
                chars: translated.chars().count(),
            });

            if self.settings.inter_chunk_summaries && index < total {
                if let Err(e) = self.summarize(index, &translated).await {
                    self.translated.push(TranslatedChunk {
                        index,
                        text: translated,
                    });
                    return self.abort(Some(AppError::from(&e)));
                }
            }
            self.translated.push(TranslatedChunk {
                index,
                text: translated,
            });
        }

        self.transition(BatchState::complete);
        let outcome = if self.state.overall_success {
            BatchOutcome::Completed
        } else {
            BatchOutcome::CompletedWithErrors
        };
        self.orchestrator.metrics.inc_runs_completed();
        self.finish(outcome, None)
    }

    fn transition<F>(&mut self, f: F)
    where
        F: FnOnce(&mut BatchState, String) -> Result<StateTransition, AppError>,
    {
        match f(&mut self.state, now()) {
            Ok(transition) => {
                log::debug!(
                    "状態遷移: {} -> {}",
                    transition.prev_state,
                    transition.new_state.as_str()
                );
                self.events.emit(BatchEvent::StateChanged(transition));
            }
            Err(e) => log::error!("状態遷移に失敗: {e}"),
        }
    }

    async fn split(&self, text: &str) -> Result<Vec<Chunk>, TranslateError> {
        let budget = chunk_budget(&self.settings.model, &self.settings);
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(TranslateError::Cancelled),
            result = self.orchestrator.chunker.split(text, budget) => result,
        }
    }

    fn chunk_request(
        &self,
        chunk: &Chunk,
        input: &BatchInput,
        template: &str,
        glossary_terms: &str,
    ) -> TranslationRequest {
        let source_text = if self.settings.glossary_substitution {
            input.glossary.apply_substitutions(&chunk.text)
        } else {
            chunk.text.clone()
        };
        let ctx = &input.context;
        let prompt_ctx = PromptContext {
            source_language: or_default(&ctx.source_language, &self.settings.source_language),
            target_language: or_default(&ctx.target_language, &self.settings.target_language),
            fandom_context: or_default(&ctx.fandom_context, NONE_PROVIDED),
            notes: or_default(&ctx.notes, NONE_PROVIDED),
            previous_chapter_summary: or_default(&ctx.previous_chapter_summary, NONE_PROVIDED),
            previous_chunk_summaries: prompt::format_chunk_summaries(&self.state.chunk_summaries),
            glossary_terms: glossary_terms.to_string(),
            source_text,
        };
        let assembled = prompt::assemble(template, &prompt_ctx);

        TranslationRequest {
            prompt: assembled.prompt,
            model: self.settings.model.clone(),
            temperature: self.settings.temperature,
            stream: self.settings.stream,
        }
    }

    /// 1チャンクを翻訳する。ストリーミング時はトークンを一定間隔でまとめて出力する。
    async fn translate(
        &self,
        request: TranslationRequest,
        index: usize,
    ) -> Result<String, TranslateError> {
        let translator = &self.orchestrator.translator;

        if !request.stream || !self.events.is_active() {
            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(TranslateError::Cancelled),
                result = translator.send(request, None, &self.cancel) => result,
            };
            let text = result?;
            self.events.emit(BatchEvent::Output {
                index,
                text: text.clone(),
            });
            return Ok(text);
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let send = translator.send(request, Some(tx), &self.cancel);
        tokio::pin!(send);

        // 最初の反映は1間隔後
        let period = Duration::from_millis(self.settings.flush_interval_ms);
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut buffer = String::new();

        let result = loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break Err(TranslateError::Cancelled),
                Some(token) = rx.recv() => buffer.push_str(&token),
                result = &mut send => break result,
                _ = ticker.tick() => self.flush(index, &mut buffer),
            }
        };

        // 完了時点で未反映のトークンを必ず出力する
        while let Ok(token) = rx.try_recv() {
            buffer.push_str(&token);
        }
        self.flush(index, &mut buffer);
        result
    }

    fn flush(&self, index: usize, buffer: &mut String) {
        if buffer.is_empty() {
            return;
        }
        self.events.emit(BatchEvent::Output {
            index,
            text: std::mem::take(buffer),
        });
    }

    /// 失敗時の判断を仰ぐ。待機中にキャンセルされたら None。
    async fn decide(
        &self,
        policy: &dyn ChunkErrorPolicy,
        index: usize,
        total: usize,
        error: TranslateError,
    ) -> Option<ChunkDecision> {
        let provider = match &error {
            TranslateError::Http { provider, .. }
            | TranslateError::MalformedResponse { provider, .. }
            | TranslateError::Transport { provider, .. }
            | TranslateError::ApiKeyMissing { provider } => provider.clone(),
            _ => self.settings.model.clone(),
        };
        let ctx = ChunkErrorContext {
            run_id: self.state.run_id.clone(),
            chunk_index: index,
            total_chunks: total,
            provider,
            error,
        };

        let decision = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            decision = policy.on_chunk_error(&ctx) => Some(decision),
        };
        if let Some(d) = decision {
            log::info!("チャンク {index}/{total} の失敗後の判断: {d:?}");
        }
        decision
    }

    /// チャンク間要約を作る。失敗は記録して読み飛ばし、キャンセルだけを返す。
    async fn summarize(&mut self, index: usize, translated: &str) -> Result<(), TranslateError> {
        self.transition(BatchState::begin_summary);

        let request = TranslationRequest {
            prompt: prompt::chunk_summary_prompt(translated),
            model: self.settings.model.clone(),
            temperature: summary_temperature(self.settings.temperature),
            stream: false,
        };
        let started = Instant::now();
        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(TranslateError::Cancelled),
            result = self.orchestrator.translator.send(request, None, &self.cancel) => result,
        };

        let metrics = &self.orchestrator.metrics;
        match result {
            Ok(summary) if !summary.trim().is_empty() => {
                let summary = summary.trim().to_string();
                metrics.record_latency(PHASE_SUMMARY, started.elapsed().as_millis() as u64);
                metrics.inc_summaries_generated();
                self.state.record_summary(index, summary.clone());
                self.events.emit(BatchEvent::SummaryReady { index, summary });
            }
            Ok(_) => self.skip_summary(index, "empty summary".to_string()),
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => self.skip_summary(index, e.to_string()),
        }
        Ok(())
    }

    fn skip_summary(&self, index: usize, reason: String) {
        log::warn!("チャンク {index} の要約をスキップ: {reason}");
        self.orchestrator.metrics.inc_summaries_skipped();
        self.events.emit(BatchEvent::SummarySkipped { index, reason });
    }

    fn fail_setup(mut self, error: TranslateError) -> BatchReport {
        log::error!("チャンク分割に失敗: {error}");
        self.transition(BatchState::fail_setup);
        self.finish(BatchOutcome::FailedSetup, Some(AppError::from(&error)))
    }

    fn abort(mut self, error: Option<AppError>) -> BatchReport {
        self.transition(BatchState::abort);
        self.orchestrator.metrics.inc_runs_aborted();
        self.finish(BatchOutcome::Aborted, error)
    }

    fn finish(self, outcome: BatchOutcome, error: Option<AppError>) -> BatchReport {
        let output = self
            .translated
            .iter()
            .map(|c| c.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");

        let report = BatchReport {
            outcome,
            state: self.state,
            output,
            translated: self.translated,
            failed: self.failed,
            error,
            elapsed_ms: self.started.elapsed().as_millis() as u64,
        };
        log::info!(
            "バッチ翻訳終了: {:?} (成功 {}/{} チャンク, {} ms)",
            report.outcome,
            report.translated.len(),
            report.state.total_chunks,
            report.elapsed_ms
        );
        self.events.emit(BatchEvent::Finished(report.clone()));
        report
    }
}

fn or_default(value: &str, default: &str) -> String {
    if value.trim().is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_temperature_clamped() {
        assert!((summary_temperature(0.7) - 0.5).abs() < 1e-6);
        assert!((summary_temperature(0.5) - 0.3).abs() < 1e-6);
        assert!((summary_temperature(0.0) - 0.1).abs() < 1e-6);
        assert!((summary_temperature(2.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_or_default() {
        assert_eq!(or_default("  ", NONE_PROVIDED), NONE_PROVIDED);
        assert_eq!(or_default("Naruto", NONE_PROVIDED), "Naruto");
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_value(BatchEvent::ChunkStarted { index: 2, total: 5 }).unwrap();
        assert_eq!(json, serde_json::json!({"type": "chunk_started", "index": 2, "total": 5}));

        let json = serde_json::to_value(BatchEvent::Output {
            index: 1,
            text: "Hello".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "output");
        assert_eq!(json["text"], "Hello");
    }

    #[test]
    fn test_outcome_serialization() {
        assert_eq!(
            serde_json::to_value(BatchOutcome::CompletedWithErrors).unwrap(),
            "completed_with_errors"
        );
    }
}
