use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use ft_core::domain::error::{AppError, BatchError, TranslateError};
use ft_core::domain::settings::{ApiKeys, TranslationSettings};
use ft_core::domain::types::{
    ChunkingBudget, DocumentContext, GlossaryCategory, GlossaryTerm, TextField,
};
use ft_core::infra::cancel::cancel_pair;
use ft_core::infra::chunker::{estimate_tokens, HttpTokenizerService, TextChunker, TokenizerService};
use ft_core::infra::glossary::Glossary;
use ft_core::infra::metrics::{Metrics, MetricsSummary};
use ft_core::infra::pricing::estimate_cost;
use ft_core::infra::provider::{
    chunk_budget, Credentials, EchoTranslator, HttpTranslationClient, ProviderRegistry, Translator,
};
use ft_core::infra::storage::Storage;
use ft_core::infra::word_count::text_stats;
use ft_core::usecase::chapter_summary::{append_summary_to_notes, generate_chapter_summary};
use ft_core::usecase::{BatchInput, BatchOrchestrator, BatchOutcome};

use crate::events;
use crate::policy::{OnErrorMode, PromptPolicy};

/// コマンドエラー型（終了コードに対応づけて一度だけ表示する）
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("{0}")]
    App(#[from] AppError),
    #[error("{0}")]
    Translate(#[from] TranslateError),
    #[error("{0}")]
    Batch(#[from] BatchError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("{0}")]
    InvalidArgument(String),
    #[error("Translation aborted: {0}")]
    Aborted(String),
    #[error("Chunking failed: {0}")]
    Setup(String),
}

impl CommandError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Aborted(_) => 130,
            Self::InvalidArgument(_) | Self::Config(_) => 2,
            _ => 1,
        }
    }
}

type CmdResult<T> = Result<T, CommandError>;

/// 全コマンド共通の実行文脈
pub struct Context {
    storage: Storage,
    project: String,
}

impl Context {
    pub fn open(db_path: &Path, project: String) -> CmdResult<Self> {
        let storage = Storage::open(&db_path.to_string_lossy())?;
        Ok(Self::new(storage, project))
    }

    fn new(storage: Storage, project: String) -> Self {
        let project = match project.trim() {
            "" => ft_core::infra::storage::DEFAULT_PROJECT.to_string(),
            name => name.to_string(),
        };
        Self { storage, project }
    }

    fn stored(&self, field: TextField) -> CmdResult<String> {
        Ok(self
            .storage
            .get_text(&self.project, field)?
            .unwrap_or_default())
    }

    fn store(&self, field: TextField, content: &str) -> CmdResult<()> {
        self.storage.set_text(&self.project, field, content, &now())?;
        Ok(())
    }

    /// 保存済み設定にモデル指定と環境変数の API キーを重ねる
    fn settings(&self, model: Option<String>) -> CmdResult<TranslationSettings> {
        let mut settings = self.storage.get_settings(&self.project)?;
        if let Some(model) = model {
            settings.model = model;
        }
        apply_env_keys(&mut settings.api_keys, |name| std::env::var(name).ok());
        Ok(settings.normalized())
    }
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// 環境変数の API キーを保存済みの値より優先する
fn apply_env_keys(keys: &mut ApiKeys, lookup: impl Fn(&str) -> Option<String>) {
    let slots = [
        ("XAI_API_KEY", &mut keys.xai),
        ("DEEPSEEK_API_KEY", &mut keys.deepseek),
        ("OPENROUTER_API_KEY", &mut keys.openrouter),
    ];
    for (name, slot) in slots {
        if let Some(value) = lookup(name).filter(|v| !v.trim().is_empty()) {
            log::debug!("{name} を使用します");
            *slot = Some(value.trim().to_string());
        }
    }
}

async fn read_input(input: Option<&Path>) -> CmdResult<String> {
    match input {
        Some(path) => Ok(tokio::fs::read_to_string(path).await?),
        None => {
            let mut text = String::new();
            tokio::io::stdin().read_to_string(&mut text).await?;
            Ok(text)
        }
    }
}

/// 原文を読む。入力指定がなく標準入力が端末なら保存済みの原文を使う。
async fn load_source(ctx: &Context, input: Option<&Path>) -> CmdResult<String> {
    if input.is_none() && std::io::stdin().is_terminal() {
        let stored = ctx.stored(TextField::Source)?;
        if stored.trim().is_empty() {
            return Err(CommandError::InvalidArgument(
                "No input: pass --input FILE, pipe text on stdin, or store it with `text set source`"
                    .to_string(),
            ));
        }
        log::info!("保存済みの原文を使用します");
        return Ok(stored);
    }

    let text = read_input(input).await?;
    if !text.trim().is_empty() {
        ctx.store(TextField::Source, &text)?;
    }
    Ok(text)
}

fn chunker_for(settings: &TranslationSettings) -> TextChunker {
    match &settings.tokenizer_url {
        Some(url) if !url.trim().is_empty() => {
            TextChunker::with_tokenizer(Arc::new(HttpTokenizerService::new(url.trim())))
        }
        _ => TextChunker::local(),
    }
}

fn http_client(settings: &TranslationSettings) -> HttpTranslationClient {
    HttpTranslationClient::new(
        ProviderRegistry::new(),
        Credentials::from_keys(&settings.api_keys),
    )
}

/// Ctrl-C で実行中のバッチを取り消す
fn spawn_interrupt(orchestrator: Arc<BatchOrchestrator>) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("中断要求を受け付けました。実行中のリクエストを取り消します");
            orchestrator.cancel();
        }
    })
}

fn print_metrics(summary: &MetricsSummary) {
    let avg = |v: Option<f64>| v.map(|ms| format!("{ms:.0} ms")).unwrap_or_else(|| "-".into());
    eprintln!(
        "Chunks: {} translated, {} failed | Summaries: {} generated, {} skipped | Avg latency: chunk {}, summary {}",
        summary.chunks_translated,
        summary.chunks_failed,
        summary.summaries_generated,
        summary.summaries_skipped,
        avg(summary.avg_latency_ms.chunk),
        avg(summary.avg_latency_ms.summary),
    );
}

// --- translate ---

pub struct TranslateOptions {
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub stream: bool,
    pub summaries: bool,
    pub on_error: OnErrorMode,
    pub dry_run: bool,
}

pub async fn translate(ctx: &Context, opts: TranslateOptions) -> CmdResult<()> {
    let source = load_source(ctx, opts.input.as_deref()).await?;

    let mut settings = ctx.settings(opts.model)?;
    if let Some(t) = opts.temperature {
        settings.temperature = t;
    }
    settings.stream |= opts.stream;
    settings.inter_chunk_summaries |= opts.summaries;
    let settings = settings.normalized();

    let translator: Arc<dyn Translator> = if opts.dry_run {
        log::info!("ドライラン: API は呼び出しません");
        Arc::new(EchoTranslator)
    } else {
        Arc::new(http_client(&settings))
    };
    translator.check(&settings.model)?;

    let input = BatchInput {
        source_text: source,
        template: ctx.stored(TextField::Prompt)?,
        context: DocumentContext {
            source_language: settings.source_language.clone(),
            target_language: settings.target_language.clone(),
            fandom_context: ctx.stored(TextField::Fandom)?,
            notes: ctx.stored(TextField::Notes)?,
            previous_chapter_summary: ctx.stored(TextField::ChapterSummary)?,
        },
        glossary: Glossary::new(ctx.storage.list_glossary(&ctx.project)?),
    };

    let metrics = Arc::new(Metrics::new());
    let orchestrator = Arc::new(
        BatchOrchestrator::new(translator, chunker_for(&settings)).with_metrics(metrics.clone()),
    );
    let interrupt = spawn_interrupt(orchestrator.clone());
    let (tx, rx) = mpsc::unbounded_channel();
    let renderer = tokio::spawn(events::render_until_closed(rx));
    let policy = PromptPolicy::new(opts.on_error);

    let result = orchestrator.run(input, &settings, &policy, Some(tx)).await;
    interrupt.abort();
    if let Err(e) = renderer.await {
        log::error!("出力タスクが異常終了しました: {e}");
    }
    let report = result?;

    if !report.output.is_empty() && !opts.dry_run {
        ctx.store(TextField::Output, &report.output)?;
    }
    if let Some(path) = &opts.output {
        tokio::fs::write(path, format!("{}\n", report.output)).await?;
        log::info!("翻訳結果を書き出しました: {}", path.display());
    }
    let output_stats = text_stats(&report.output);
    eprintln!(
        "Output: {} words, {} characters",
        output_stats.words, output_stats.chars
    );
    print_metrics(&metrics.summary());

    let reason = || {
        report
            .error
            .as_ref()
            .map(|e| e.message.clone())
            .unwrap_or_else(|| "unknown error".to_string())
    };
    match report.outcome {
        BatchOutcome::Completed => Ok(()),
        BatchOutcome::CompletedWithErrors => {
            log::warn!("{} チャンクの翻訳に失敗しました", report.failed.len());
            Ok(())
        }
        BatchOutcome::Aborted => Err(CommandError::Aborted(reason())),
        BatchOutcome::FailedSetup => Err(CommandError::Setup(reason())),
    }
}

// --- chunk / estimate / count ---

pub async fn chunk(
    ctx: &Context,
    input: Option<PathBuf>,
    model: Option<String>,
    max_tokens: Option<usize>,
) -> CmdResult<()> {
    let source = load_source(ctx, input.as_deref()).await?;
    let settings = ctx.settings(model)?;
    let budget = match max_tokens {
        Some(n) => ChunkingBudget::new(n),
        None => chunk_budget(&settings.model, &settings),
    };

    let chunks = chunker_for(&settings).split(&source, budget).await?;
    println!(
        "{}: {} chunk(s), up to {} tokens each",
        settings.model,
        chunks.len(),
        budget.max_tokens
    );
    for chunk in &chunks {
        let stats = text_stats(&chunk.text);
        println!(
            "Chunk {} of {}: {} words, {} characters, ~{} tokens",
            chunk.index,
            chunks.len(),
            stats.words,
            stats.chars,
            chunk
                .estimated_tokens
                .unwrap_or_else(|| estimate_tokens(&chunk.text))
        );
    }
    Ok(())
}

pub async fn estimate(ctx: &Context, input: Option<PathBuf>, model: Option<String>) -> CmdResult<()> {
    let source = load_source(ctx, input.as_deref()).await?;
    let settings = ctx.settings(model)?;

    let tokens = match &settings.tokenizer_url {
        Some(url) => match HttpTokenizerService::new(url.as_str()).count_tokens(&source).await {
            Ok(n) => n,
            Err(e) => {
                log::warn!("トークン数を取得できないため推定値を使います: {e}");
                estimate_tokens(&source)
            }
        },
        None => estimate_tokens(&source),
    };
    let budget = chunk_budget(&settings.model, &settings);
    let chunks = chunker_for(&settings).split(&source, budget).await?;

    println!("Model: {}", settings.model);
    println!("Input tokens: {tokens}");
    println!("Chunks: {} (up to {} tokens each)", chunks.len(), budget.max_tokens);
    // 訳文は原文と同程度の長さと見なす
    match estimate_cost(&settings.model, tokens, tokens) {
        Some(cost) => println!(
            "Estimated cost: ${:.4} (input ${:.4}, output ${:.4})",
            cost.total_cost, cost.input_cost, cost.output_cost
        ),
        None => println!("Estimated cost: no pricing data for {}", settings.model),
    }
    Ok(())
}

pub async fn count(input: Option<PathBuf>) -> CmdResult<()> {
    let text = read_input(input.as_deref()).await?;
    let stats = text_stats(&text);
    println!("{} words, {} characters", stats.words, stats.chars);
    Ok(())
}

// --- summarize ---

/// 要約対象の文章。入力指定がなく標準入力が端末なら保存済みの訳文を使う。
async fn summary_text(
    ctx: &Context,
    input: Option<&Path>,
    stdin_is_terminal: bool,
) -> CmdResult<String> {
    if input.is_some() || !stdin_is_terminal {
        return read_input(input).await;
    }
    let output = ctx.stored(TextField::Output)?;
    if output.trim().is_empty() {
        return Err(CommandError::InvalidArgument(
            "No translated output to summarize: run `translate` first or pass --input FILE"
                .to_string(),
        ));
    }
    Ok(output)
}

pub async fn summarize(
    ctx: &Context,
    input: Option<PathBuf>,
    model: Option<String>,
    append_to_notes: bool,
) -> CmdResult<()> {
    let text = summary_text(ctx, input.as_deref(), std::io::stdin().is_terminal()).await?;
    let settings = ctx.settings(model)?;
    let client = http_client(&settings);
    client.check(&settings.model)?;

    let (handle, token) = cancel_pair();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.cancel();
        }
    });
    let result = generate_chapter_summary(&client, &settings.model, &text, &token).await;
    interrupt.abort();
    let summary = result?;

    println!("{summary}");
    ctx.store(TextField::ChapterSummary, &summary)?;
    if append_to_notes {
        let notes = ctx.stored(TextField::Notes)?;
        if let Some(updated) = append_summary_to_notes(&notes, &summary) {
            ctx.store(TextField::Notes, &updated)?;
            log::info!("要約をメモ欄に追記しました");
        }
    }
    Ok(())
}

// --- config ---

const MASK: &str = "********";

pub fn config_show(ctx: &Context) -> CmdResult<()> {
    let settings = ctx.storage.get_settings(&ctx.project)?;
    let mut json = serde_json::to_value(&settings).map_err(|e| CommandError::Config(e.to_string()))?;
    if let Some(keys) = json.get_mut("api_keys").and_then(Value::as_object_mut) {
        for value in keys.values_mut() {
            if value.as_str().is_some_and(|k| !k.is_empty()) {
                *value = Value::String(MASK.to_string());
            }
        }
    }
    let pretty = serde_json::to_string_pretty(&json).map_err(|e| CommandError::Config(e.to_string()))?;
    println!("{pretty}");
    Ok(())
}

pub fn config_set(ctx: &Context, key: &str, raw: &str) -> CmdResult<()> {
    let current = ctx.storage.get_settings(&ctx.project)?;
    let updated = apply_setting(&current, key, raw)?;
    ctx.storage.save_settings(&ctx.project, &updated)?;
    log::info!("設定を更新しました: {key}");
    Ok(())
}

/// `key` に `raw` を設定した設定値を返す
///
/// 値は JSON として解釈し、失敗すれば文字列として扱う。
/// `chunk_token_overrides.<model>` のように2段目以降はそのままキーになる。
fn apply_setting(current: &TranslationSettings, key: &str, raw: &str) -> CmdResult<TranslationSettings> {
    let mut json = serde_json::to_value(current).map_err(|e| CommandError::Config(e.to_string()))?;
    let value = serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()));

    let (head, rest) = match key.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (key, None),
    };
    let root = json
        .as_object_mut()
        .ok_or_else(|| CommandError::Config("settings are not an object".to_string()))?;
    let slot = root
        .get_mut(head)
        .ok_or_else(|| CommandError::Config(format!("unknown setting `{head}`")))?;

    match rest {
        None => *slot = value,
        Some(rest) if !rest.is_empty() => {
            let object = slot
                .as_object_mut()
                .ok_or_else(|| CommandError::Config(format!("`{head}` has no nested keys")))?;
            object.insert(rest.to_string(), value);
        }
        Some(_) => return Err(CommandError::Config(format!("empty key after `{head}.`"))),
    }

    let settings: TranslationSettings =
        serde_json::from_value(json).map_err(|e| CommandError::Config(format!("{key}: {e}")))?;
    Ok(settings.normalized())
}

// --- text fields ---

fn parse_field(name: &str) -> CmdResult<TextField> {
    TextField::parse(name).ok_or_else(|| {
        CommandError::InvalidArgument(format!(
            "unknown field `{name}` (source, prompt, fandom, notes, output, summary)"
        ))
    })
}

pub fn text_get(ctx: &Context, field: &str) -> CmdResult<()> {
    let field = parse_field(field)?;
    if let Some(content) = ctx.storage.get_text(&ctx.project, field)? {
        println!("{content}");
    }
    Ok(())
}

pub async fn text_set(ctx: &Context, field: &str, file: Option<PathBuf>) -> CmdResult<()> {
    let field = parse_field(field)?;
    let content = read_input(file.as_deref()).await?;
    ctx.store(field, &content)?;
    let stats = text_stats(&content);
    log::info!("{} を保存しました ({} 文字)", field.key(), stats.chars);
    Ok(())
}

pub fn text_clear(ctx: &Context, field: &str) -> CmdResult<()> {
    let field = parse_field(field)?;
    if !ctx.storage.clear_text(&ctx.project, field)? {
        log::info!("{} は空です", field.key());
    }
    Ok(())
}

// --- glossary ---

pub fn glossary_list(ctx: &Context) -> CmdResult<()> {
    for term in ctx.storage.list_glossary(&ctx.project)? {
        println!(
            "{}\t{}\t{}: {}",
            term.id.as_deref().unwrap_or("-"),
            term.category.as_str(),
            term.source_term,
            term.target_translation
        );
    }
    Ok(())
}

pub fn glossary_add(
    ctx: &Context,
    source: String,
    target: String,
    category: &str,
    id: Option<String>,
) -> CmdResult<()> {
    let category = GlossaryCategory::parse(category).ok_or_else(|| {
        CommandError::InvalidArgument(format!("unknown glossary category `{category}`"))
    })?;
    if source.trim().is_empty() || target.trim().is_empty() {
        return Err(CommandError::InvalidArgument(
            "source term and translation must not be empty".to_string(),
        ));
    }

    let mut term = GlossaryTerm::new(source, target, category);
    term.id = id;
    let id = ctx.storage.upsert_glossary_term(&ctx.project, &term, &now())?;
    println!("{id}");
    Ok(())
}

pub fn glossary_remove(ctx: &Context, id: &str) -> CmdResult<()> {
    if ctx.storage.delete_glossary_term(&ctx.project, id)? {
        Ok(())
    } else {
        Err(CommandError::InvalidArgument(format!("no glossary term with id `{id}`")))
    }
}

pub fn glossary_clear(ctx: &Context) -> CmdResult<()> {
    let removed = ctx.storage.clear_glossary(&ctx.project)?;
    log::info!("用語を {removed} 件削除しました");
    Ok(())
}

// --- projects ---

pub fn projects(ctx: &Context, delete: Option<String>) -> CmdResult<()> {
    if let Some(name) = delete {
        let removed = ctx.storage.delete_project(&name)?;
        log::info!("プロジェクト {name} を削除しました ({removed} 件)");
        return Ok(());
    }
    for name in ctx.storage.list_projects()? {
        let marker = if name == ctx.project { "*" } else { " " };
        println!("{marker} {name}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> Context {
        Context::new(Storage::open_in_memory().unwrap(), "test".into())
    }

    #[test]
    fn test_env_keys_override_stored() {
        let mut keys = ApiKeys {
            xai: Some("stored-xai".into()),
            deepseek: Some("stored-deepseek".into()),
            openrouter: None,
        };
        apply_env_keys(&mut keys, |name| match name {
            "XAI_API_KEY" => Some(" env-xai ".into()),
            "DEEPSEEK_API_KEY" => Some("  ".into()),
            _ => None,
        });
        assert_eq!(keys.xai.as_deref(), Some("env-xai"));
        assert_eq!(keys.deepseek.as_deref(), Some("stored-deepseek"));
        assert_eq!(keys.openrouter, None);
    }

    #[test]
    fn test_apply_setting_scalar_and_nested() {
        let current = TranslationSettings::default();

        let s = apply_setting(&current, "model", "grok-3").unwrap();
        assert_eq!(s.model, "grok-3");

        let s = apply_setting(&current, "temperature", "1.2").unwrap();
        assert!((s.temperature - 1.2).abs() < 1e-6);

        let s = apply_setting(&current, "stream", "true").unwrap();
        assert!(s.stream);

        let s = apply_setting(&current, "api_keys.xai", "xai-123").unwrap();
        assert_eq!(s.api_keys.xai.as_deref(), Some("xai-123"));

        let s = apply_setting(&current, "chunk_token_overrides.grok-3.5", "9000").unwrap();
        assert_eq!(s.chunk_token_override("grok-3.5"), Some(9000));

        let s = apply_setting(&current, "tokenizer_url", "http://localhost:5000").unwrap();
        assert_eq!(s.tokenizer_url.as_deref(), Some("http://localhost:5000"));
    }

    #[test]
    fn test_apply_setting_rejects_bad_input() {
        let current = TranslationSettings::default();
        assert!(matches!(
            apply_setting(&current, "colour", "red"),
            Err(CommandError::Config(_))
        ));
        assert!(matches!(
            apply_setting(&current, "temperature", "hot"),
            Err(CommandError::Config(_))
        ));
        assert!(matches!(
            apply_setting(&current, "model.name", "x"),
            Err(CommandError::Config(_))
        ));
    }

    #[test]
    fn test_apply_setting_clamps_temperature() {
        let s = apply_setting(&TranslationSettings::default(), "temperature", "5").unwrap();
        assert_eq!(s.temperature, 2.0);
    }

    #[test]
    fn test_parse_field() {
        assert_eq!(parse_field("notes").unwrap(), TextField::Notes);
        assert!(matches!(
            parse_field("title"),
            Err(CommandError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_blank_project_uses_default() {
        let ctx = Context::new(Storage::open_in_memory().unwrap(), "  ".into());
        assert_eq!(ctx.project, "default");
    }

    #[test]
    fn test_config_set_persists() {
        let ctx = context();
        config_set(&ctx, "target_language", "German").unwrap();
        config_set(&ctx, "inter_chunk_summaries", "true").unwrap();

        let settings = ctx.storage.get_settings("test").unwrap();
        assert_eq!(settings.target_language, "German");
        assert!(settings.inter_chunk_summaries);
        assert_eq!(
            ctx.storage.get_settings("other").unwrap().target_language,
            "English"
        );
    }

    #[test]
    fn test_glossary_commands() {
        let ctx = context();
        glossary_add(&ctx, "ナルト".into(), "Naruto".into(), "characters", None).unwrap();
        assert!(matches!(
            glossary_add(&ctx, "x".into(), "y".into(), "weapons", None),
            Err(CommandError::InvalidArgument(_))
        ));
        assert!(matches!(
            glossary_add(&ctx, " ".into(), "y".into(), "other", None),
            Err(CommandError::InvalidArgument(_))
        ));

        let terms = ctx.storage.list_glossary("test").unwrap();
        assert_eq!(terms.len(), 1);
        let id = terms[0].id.clone().unwrap();
        glossary_remove(&ctx, &id).unwrap();
        assert!(glossary_remove(&ctx, &id).is_err());
    }

    #[tokio::test]
    async fn test_summary_defaults_to_translated_output() {
        let ctx = context();
        ctx.store(TextField::Source, "原文です。").unwrap();
        assert!(matches!(
            summary_text(&ctx, None, true).await,
            Err(CommandError::InvalidArgument(_))
        ));

        ctx.store(TextField::Output, "The translated chapter.").unwrap();
        assert_eq!(
            summary_text(&ctx, None, true).await.unwrap(),
            "The translated chapter."
        );
    }

    #[tokio::test]
    async fn test_summary_reads_input_file() {
        let ctx = context();
        ctx.store(TextField::Output, "stored output").unwrap();
        let path = std::env::temp_dir().join(format!("ft-summary-{}.txt", std::process::id()));
        std::fs::write(&path, "chapter from file").unwrap();

        let text = summary_text(&ctx, Some(&path), true).await.unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(text, "chapter from file");
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(CommandError::Aborted("x".into()).exit_code(), 130);
        assert_eq!(CommandError::Config("x".into()).exit_code(), 2);
        assert_eq!(CommandError::Batch(BatchError::EmptyInput).exit_code(), 1);
    }
}
