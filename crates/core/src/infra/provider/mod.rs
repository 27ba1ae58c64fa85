pub mod client;
mod echo;
pub mod registry;
pub mod sse;

pub use client::HttpTranslationClient;
pub use echo::EchoTranslator;
pub use registry::{chunk_budget, Credentials, ProviderId, ProviderRegistry};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::error::TranslateError;
use crate::domain::types::TranslationRequest;
use crate::infra::cancel::CancelToken;

/// 翻訳 trait（LLM プロバイダーやテスト用モックが実装する）
#[async_trait]
pub trait Translator: Send + Sync {
    /// プロンプトを送り、完成した応答全文を返す
    ///
    /// `request.stream` が真で `tokens` が与えられていれば、受信したトークンを順に送る。
    async fn send(
        &self,
        request: TranslationRequest,
        tokens: Option<mpsc::UnboundedSender<String>>,
        cancel: &CancelToken,
    ) -> Result<String, TranslateError>;

    /// モデルを使える状態か（キー未設定などを事前に検出する）
    fn check(&self, _model: &str) -> Result<(), TranslateError> {
        Ok(())
    }

    fn name(&self) -> &str;
}
