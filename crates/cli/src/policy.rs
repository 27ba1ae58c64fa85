use std::io::{BufRead, IsTerminal, Write};

use async_trait::async_trait;

use ft_core::usecase::{ChunkDecision, ChunkErrorContext, ChunkErrorPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnErrorMode {
    Ask,
    Continue,
    Abort,
}

/// 端末で続行/中止を確認するポリシー
///
/// 標準入力が端末でない（原文をパイプで渡した）場合は確認できないので中止する。
pub struct PromptPolicy {
    mode: OnErrorMode,
}

impl PromptPolicy {
    pub fn new(mode: OnErrorMode) -> Self {
        Self { mode }
    }
}

#[async_trait]
impl ChunkErrorPolicy for PromptPolicy {
    async fn on_chunk_error(&self, ctx: &ChunkErrorContext) -> ChunkDecision {
        match self.mode {
            OnErrorMode::Continue => return ChunkDecision::Continue,
            OnErrorMode::Abort => return ChunkDecision::Abort,
            OnErrorMode::Ask => {}
        }

        if !std::io::stdin().is_terminal() {
            log::warn!("標準入力が端末ではないため確認できません。中止します");
            return ChunkDecision::Abort;
        }

        let question = format!(
            "Error translating chunk {} of {} ({}): {}\nContinue with the remaining chunks? [y/N] ",
            ctx.chunk_index, ctx.total_chunks, ctx.provider, ctx.error
        );
        let answer = tokio::task::spawn_blocking(move || ask(&question)).await;
        match answer {
            Ok(Some(line)) => parse_answer(&line),
            Ok(None) => ChunkDecision::Abort,
            Err(e) => {
                log::error!("確認入力の読み取りに失敗: {e}");
                ChunkDecision::Abort
            }
        }
    }
}

fn ask(question: &str) -> Option<String> {
    let mut stderr = std::io::stderr();
    let _ = write!(stderr, "{question}");
    let _ = stderr.flush();

    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line),
    }
}

/// y/yes のみ続行、それ以外は中止
fn parse_answer(line: &str) -> ChunkDecision {
    match line.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => ChunkDecision::Continue,
        _ => ChunkDecision::Abort,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ft_core::domain::error::TranslateError;

    fn ctx() -> ChunkErrorContext {
        ChunkErrorContext {
            run_id: "run".into(),
            chunk_index: 1,
            total_chunks: 2,
            provider: "xAI".into(),
            error: TranslateError::Cancelled,
        }
    }

    #[test]
    fn test_parse_answer() {
        assert_eq!(parse_answer("y\n"), ChunkDecision::Continue);
        assert_eq!(parse_answer(" YES "), ChunkDecision::Continue);
        assert_eq!(parse_answer("\n"), ChunkDecision::Abort);
        assert_eq!(parse_answer("no"), ChunkDecision::Abort);
    }

    #[tokio::test]
    async fn test_fixed_modes_do_not_prompt() {
        assert_eq!(
            PromptPolicy::new(OnErrorMode::Continue).on_chunk_error(&ctx()).await,
            ChunkDecision::Continue
        );
        assert_eq!(
            PromptPolicy::new(OnErrorMode::Abort).on_chunk_error(&ctx()).await,
            ChunkDecision::Abort
        );
    }
}
