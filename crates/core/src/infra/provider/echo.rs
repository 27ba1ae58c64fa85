use async_trait::async_trait;
use tokio::sync::mpsc;

use super::Translator;
use crate::domain::error::TranslateError;
use crate::domain::types::TranslationRequest;
use crate::infra::cancel::CancelToken;

/// EchoTranslator: プロンプトをそのまま返す（ドライラン用）
pub struct EchoTranslator;

#[async_trait]
impl Translator for EchoTranslator {
    async fn send(
        &self,
        request: TranslationRequest,
        tokens: Option<mpsc::UnboundedSender<String>>,
        cancel: &CancelToken,
    ) -> Result<String, TranslateError> {
        if cancel.is_cancelled() {
            return Err(TranslateError::Cancelled);
        }
        if request.stream {
            if let Some(tx) = tokens {
                let _ = tx.send(request.prompt.clone());
            }
        }
        Ok(request.prompt)
    }

    fn name(&self) -> &str {
        "echo"
    }
}
