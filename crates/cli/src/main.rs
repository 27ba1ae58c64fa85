mod commands;
mod events;
mod policy;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use commands::{CommandError, Context};

/// LLM によるファンフィクション翻訳（チャンク分割 + バッチ翻訳）
#[derive(Debug, Parser)]
#[command(name = "fanfic-translate", version, about)]
struct Cli {
    /// SQLite データベースのパス（既定: データディレクトリ）
    #[arg(long, global = true, env = "FT_DB_PATH")]
    db: Option<PathBuf>,

    /// 設定・テキスト・用語集のスコープ
    #[arg(long, global = true, default_value = ft_core::infra::storage::DEFAULT_PROJECT)]
    project: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 原文をチャンクに分けて順に翻訳する
    Translate(TranslateArgs),
    /// チャンク分割の結果を表示する
    Chunk {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long)]
        model: Option<String>,
        /// チャンクのトークン上限（モデル既定値を上書き）
        #[arg(long)]
        max_tokens: Option<usize>,
    },
    /// トークン数と費用を見積もる
    Estimate {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long)]
        model: Option<String>,
    },
    /// 章全体の要約を生成する
    Summarize {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long)]
        model: Option<String>,
        /// 要約をメモ欄に追記する
        #[arg(long)]
        append_to_notes: bool,
    },
    /// 語数と文字数を数える
    Count {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// 設定の表示・変更
    #[command(subcommand)]
    Config(ConfigCommand),
    /// 保存済みテキスト欄の操作
    #[command(subcommand)]
    Text(TextCommand),
    /// 用語集の操作
    #[command(subcommand)]
    Glossary(GlossaryCommand),
    /// プロジェクト一覧
    Projects {
        /// 指定プロジェクトの保存内容をすべて削除する
        #[arg(long, value_name = "NAME")]
        delete: Option<String>,
    },
}

#[derive(Debug, Args)]
struct SourceArgs {
    /// 入力ファイル（省略時は標準入力）
    #[arg(long, short)]
    input: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct TranslateArgs {
    #[command(flatten)]
    source: SourceArgs,
    /// 翻訳結果の書き出し先
    #[arg(long, short)]
    output: Option<PathBuf>,
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    temperature: Option<f32>,
    /// ストリーミング出力
    #[arg(long)]
    stream: bool,
    /// チャンク間要約を有効にする
    #[arg(long)]
    summaries: bool,
    /// チャンク失敗時の扱い
    #[arg(long, value_enum, default_value_t = OnError::Ask)]
    on_error: OnError,
    /// API を呼ばずに組み立てたプロンプトを出力する
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OnError {
    Ask,
    Continue,
    Abort,
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// 現在の設定を JSON で表示する（API キーは伏せる）
    Show,
    /// `api_keys.xai` のようなドット区切りのキーに値を設定する
    Set { key: String, value: String },
}

#[derive(Debug, Subcommand)]
enum TextCommand {
    Get {
        field: String,
    },
    Set {
        field: String,
        /// 読み込むファイル（省略時は標準入力）
        #[arg(long, short)]
        file: Option<PathBuf>,
    },
    Clear {
        field: String,
    },
}

#[derive(Debug, Subcommand)]
enum GlossaryCommand {
    List,
    Add {
        source: String,
        target: String,
        #[arg(long, default_value = "other")]
        category: String,
        /// 既存の用語を更新する場合の ID
        #[arg(long)]
        id: Option<String>,
    },
    Remove {
        id: String,
    },
    Clear,
}

fn default_db_path() -> PathBuf {
    let dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fanfic-translate");
    if let Err(e) = std::fs::create_dir_all(&dir) {
        log::warn!("データディレクトリを作成できません: {e}");
    }
    dir.join("fanfic-translate.db")
}

async fn run(cli: Cli) -> Result<(), CommandError> {
    let db_path = cli.db.unwrap_or_else(default_db_path);
    log::debug!("DB: {}", db_path.display());
    let ctx = Context::open(&db_path, cli.project)?;

    match cli.command {
        Command::Translate(args) => {
            let on_error = match args.on_error {
                OnError::Ask => policy::OnErrorMode::Ask,
                OnError::Continue => policy::OnErrorMode::Continue,
                OnError::Abort => policy::OnErrorMode::Abort,
            };
            commands::translate(
                &ctx,
                commands::TranslateOptions {
                    input: args.source.input,
                    output: args.output,
                    model: args.model,
                    temperature: args.temperature,
                    stream: args.stream,
                    summaries: args.summaries,
                    on_error,
                    dry_run: args.dry_run,
                },
            )
            .await
        }
        Command::Chunk {
            source,
            model,
            max_tokens,
        } => commands::chunk(&ctx, source.input, model, max_tokens).await,
        Command::Estimate { source, model } => commands::estimate(&ctx, source.input, model).await,
        Command::Summarize {
            source,
            model,
            append_to_notes,
        } => commands::summarize(&ctx, source.input, model, append_to_notes).await,
        Command::Count { source } => commands::count(source.input).await,
        Command::Config(ConfigCommand::Show) => commands::config_show(&ctx),
        Command::Config(ConfigCommand::Set { key, value }) => {
            commands::config_set(&ctx, &key, &value)
        }
        Command::Text(TextCommand::Get { field }) => commands::text_get(&ctx, &field),
        Command::Text(TextCommand::Set { field, file }) => {
            commands::text_set(&ctx, &field, file).await
        }
        Command::Text(TextCommand::Clear { field }) => commands::text_clear(&ctx, &field),
        Command::Glossary(GlossaryCommand::List) => commands::glossary_list(&ctx),
        Command::Glossary(GlossaryCommand::Add {
            source,
            target,
            category,
            id,
        }) => commands::glossary_add(&ctx, source, target, &category, id),
        Command::Glossary(GlossaryCommand::Remove { id }) => commands::glossary_remove(&ctx, &id),
        Command::Glossary(GlossaryCommand::Clear) => commands::glossary_clear(&ctx),
        Command::Projects { delete } => commands::projects(&ctx, delete),
    }
}

#[tokio::main]
async fn main() {
    // stdout は翻訳結果専用、ログは stderr へ
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        log::error!("{e}");
        eprintln!("error: {e}");
        std::process::exit(e.exit_code());
    }
}
