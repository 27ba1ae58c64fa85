use crate::domain::error::AppError;
use crate::domain::types::TranslationRequest;
use crate::infra::cancel::CancelToken;
use crate::infra::prompt;
use crate::infra::provider::Translator;

/// 章要約の温度
pub const CHAPTER_SUMMARY_TEMPERATURE: f32 = 0.5;

/// メモ欄に追記する要約の見出し
pub const SUMMARY_HEADER: &str = "--- Previous Chapter Summary ---";

/// 章全体の要約を生成する（非ストリーミング）
pub async fn generate_chapter_summary(
    translator: &dyn Translator,
    model: &str,
    text: &str,
    cancel: &CancelToken,
) -> Result<String, AppError> {
    if text.trim().is_empty() {
        return Err(AppError::summary("Please enter text to summarize"));
    }

    let request = TranslationRequest {
        prompt: prompt::chapter_summary_prompt(text.trim()),
        model: model.to_string(),
        temperature: CHAPTER_SUMMARY_TEMPERATURE,
        stream: false,
    };

    let summary = translator
        .send(request, None, cancel)
        .await
        .map_err(|e| AppError::from(&e))?;
    let summary = summary.trim();
    if summary.is_empty() {
        return Err(AppError::summary("The model returned an empty summary"));
    }
    log::info!("章要約を生成しました ({} 文字)", summary.chars().count());
    Ok(summary.to_string())
}

/// 要約をメモの末尾に見出し付きで追記する
///
/// 既に見出しがあれば最後の見出し以降を置き換える。要約が空なら None。
pub fn append_summary_to_notes(notes: &str, summary: &str) -> Option<String> {
    let mut summary = summary.trim();
    if summary.is_empty() {
        return None;
    }
    if let Some(rest) = summary.strip_prefix(SUMMARY_HEADER) {
        summary = rest.trim();
    }
    let block = format!("{SUMMARY_HEADER}\n{summary}");

    let current = notes.trim();
    let head = match current.rfind(SUMMARY_HEADER) {
        Some(pos) => current[..pos].trim(),
        None => current,
    };

    if head.is_empty() {
        Some(block)
    } else {
        Some(format!("{head}\n\n{block}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::{ErrorCode, TranslateError};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use tokio::sync::mpsc;

    struct CannedTranslator {
        reply: Result<String, TranslateError>,
        seen: Mutex<Vec<TranslationRequest>>,
    }

    #[async_trait]
    impl Translator for CannedTranslator {
        async fn send(
            &self,
            request: TranslationRequest,
            _tokens: Option<mpsc::UnboundedSender<String>>,
            _cancel: &CancelToken,
        ) -> Result<String, TranslateError> {
            self.seen.lock().push(request);
            self.reply.clone()
        }

        fn name(&self) -> &str {
            "canned"
        }
    }

    fn canned(reply: Result<String, TranslateError>) -> CannedTranslator {
        CannedTranslator {
            reply,
            seen: Mutex::new(Vec::new()),
        }
    }

    #[tokio::test]
    async fn test_summary_request_shape() {
        let translator = canned(Ok("  They met at the gate.  ".into()));
        let summary =
            generate_chapter_summary(&translator, "grok-3", "chapter text", &CancelToken::never())
                .await
                .unwrap();
        assert_eq!(summary, "They met at the gate.");

        let seen = translator.seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].temperature, CHAPTER_SUMMARY_TEMPERATURE);
        assert!(!seen[0].stream);
        assert!(seen[0].prompt.contains("expert summarizer"));
        assert!(seen[0].prompt.ends_with("chapter text"));
    }

    #[tokio::test]
    async fn test_empty_text_rejected_without_request() {
        let translator = canned(Ok("x".into()));
        let err = generate_chapter_summary(&translator, "grok-3", "   ", &CancelToken::never())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Summary);
        assert!(translator.seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_translator_error_keeps_code() {
        let translator = canned(Err(TranslateError::ApiKeyMissing {
            provider: "xAI".into(),
        }));
        let err = generate_chapter_summary(&translator, "grok-3", "text", &CancelToken::never())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ApiKeyMissing);
    }

    #[tokio::test]
    async fn test_blank_reply_is_summary_error() {
        let translator = canned(Ok(" \n".into()));
        let err = generate_chapter_summary(&translator, "grok-3", "text", &CancelToken::never())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Summary);
    }

    #[test]
    fn test_append_to_empty_notes() {
        assert_eq!(
            append_summary_to_notes("", "They met.").as_deref(),
            Some("--- Previous Chapter Summary ---\nThey met.")
        );
    }

    #[test]
    fn test_append_after_existing_notes() {
        assert_eq!(
            append_summary_to_notes("Keep honorifics.\n", "They met.").as_deref(),
            Some("Keep honorifics.\n\n--- Previous Chapter Summary ---\nThey met.")
        );
    }

    #[test]
    fn test_append_replaces_previous_summary() {
        let notes = "Keep honorifics.\n\n--- Previous Chapter Summary ---\nOld summary.";
        assert_eq!(
            append_summary_to_notes(notes, "--- Previous Chapter Summary ---\nNew summary.")
                .as_deref(),
            Some("Keep honorifics.\n\n--- Previous Chapter Summary ---\nNew summary.")
        );
    }

    #[test]
    fn test_append_blank_summary_is_none() {
        assert_eq!(append_summary_to_notes("notes", "  "), None);
    }
}
