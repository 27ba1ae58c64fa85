use futures_util::{Stream, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::domain::error::TranslateError;
use crate::infra::cancel::CancelToken;

/// SSE 1行分の解釈結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    Token(String),
    Done,
}

/// ネットワーク読み込み単位をまたぐ行をバッファする SSE デコーダー
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    malformed_lines: usize,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 受信バイト列を追加し、改行まで揃った行のイベントを返す
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(event) = self.parse_line(&String::from_utf8_lossy(&line)) {
                events.push(event);
            }
        }
        events
    }

    /// ストリーム終端で改行の無い最終行を処理する
    pub fn finish(&mut self) -> Vec<SseEvent> {
        if self.buffer.is_empty() {
            return Vec::new();
        }
        let line = std::mem::take(&mut self.buffer);
        self.parse_line(&String::from_utf8_lossy(&line))
            .into_iter()
            .collect()
    }

    /// スキップした不正な JSON 行の数
    pub fn malformed_lines(&self) -> usize {
        self.malformed_lines
    }

    fn parse_line(&mut self, line: &str) -> Option<SseEvent> {
        let line = line.trim();
        let payload = line.strip_prefix("data:")?.trim();
        if payload.is_empty() {
            return None;
        }
        if payload == "[DONE]" {
            return Some(SseEvent::Done);
        }

        match serde_json::from_str::<Value>(payload) {
            Ok(json) => extract_content(&json)
                .filter(|t| !t.is_empty())
                .map(|t| SseEvent::Token(t.to_string())),
            Err(e) => {
                self.malformed_lines += 1;
                log::warn!("不正なストリーム行をスキップ: {e}");
                None
            }
        }
    }
}

/// `choices[0]` から delta.content / text / message.content の順で本文を取る
pub fn extract_content(json: &Value) -> Option<&str> {
    let choice = &json["choices"][0];
    choice["delta"]["content"]
        .as_str()
        .filter(|s| !s.is_empty())
        .or_else(|| choice["text"].as_str().filter(|s| !s.is_empty()))
        .or_else(|| choice["message"]["content"].as_str())
}

/// バイトストリームを読み切り、トークンを順に送りつつ全文を返す
///
/// キャンセルされた時点でストリームを破棄して `Cancelled` を返す。
pub async fn decode_stream<S, B, E>(
    stream: S,
    provider: &str,
    tokens: Option<&mpsc::UnboundedSender<String>>,
    cancel: &CancelToken,
) -> Result<String, TranslateError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let mut stream = std::pin::pin!(stream);
    let mut decoder = SseDecoder::new();
    let mut accumulated = String::new();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TranslateError::Cancelled),
            next = stream.next() => next,
        };

        let (events, exhausted) = match next {
            Some(Ok(bytes)) => (decoder.feed(bytes.as_ref()), false),
            Some(Err(e)) => {
                return Err(TranslateError::Transport {
                    provider: provider.to_string(),
                    detail: format!("stream read failed: {e}"),
                })
            }
            None => (decoder.finish(), true),
        };

        for event in events {
            match event {
                SseEvent::Token(text) => {
                    if let Some(tx) = tokens {
                        let _ = tx.send(text.clone());
                    }
                    accumulated.push_str(&text);
                }
                SseEvent::Done => {
                    log::debug!("{provider} ストリーム完了 ({} 文字)", accumulated.chars().count());
                    return Ok(accumulated);
                }
            }
        }

        if exhausted {
            return Ok(accumulated);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::cancel::cancel_pair;
    use futures_util::stream;

    fn delta(text: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({"choices": [{"delta": {"content": text}}]})
        )
    }

    fn ok_chunks(parts: Vec<String>) -> impl Stream<Item = Result<Vec<u8>, std::io::Error>> {
        stream::iter(parts.into_iter().map(|p| Ok(p.into_bytes())))
    }

    #[tokio::test]
    async fn test_tokens_accumulate_in_order() {
        let body = vec![
            delta("Hello"),
            delta(" "),
            delta("world"),
            "data: [DONE]\n\n".to_string(),
        ];
        let (tx, mut rx) = mpsc::unbounded_channel();
        let result = decode_stream(ok_chunks(body), "test", Some(&tx), &CancelToken::never())
            .await
            .unwrap();
        assert_eq!(result, "Hello world");

        drop(tx);
        let mut received = Vec::new();
        while let Some(token) = rx.recv().await {
            received.push(token);
        }
        assert_eq!(received, vec!["Hello", " ", "world"]);
    }

    #[tokio::test]
    async fn test_line_split_across_reads() {
        let line = delta("分割");
        let bytes = line.as_bytes();
        // UTF-8 の途中で切る
        let cut = line.find("分").unwrap() + 1;
        let parts = vec![bytes[..cut].to_vec(), bytes[cut..].to_vec()];
        let body = stream::iter(parts.into_iter().map(Ok::<_, std::io::Error>));
        let result = decode_stream(body, "test", None, &CancelToken::never())
            .await
            .unwrap();
        assert_eq!(result, "分割");
    }

    #[tokio::test]
    async fn test_malformed_line_is_skipped() {
        let body = vec![
            delta("a"),
            "data: {not json}\n".to_string(),
            ": keep-alive comment\n".to_string(),
            delta("b"),
        ];
        let result = decode_stream(ok_chunks(body), "test", None, &CancelToken::never())
            .await
            .unwrap();
        assert_eq!(result, "ab");
    }

    #[tokio::test]
    async fn test_stream_end_without_done_or_newline() {
        let last = format!(
            "data: {}",
            serde_json::json!({"choices": [{"text": "tail"}]})
        );
        let body = vec![delta("head "), last];
        let result = decode_stream(ok_chunks(body), "test", None, &CancelToken::never())
            .await
            .unwrap();
        assert_eq!(result, "head tail");
    }

    #[tokio::test]
    async fn test_data_after_done_is_ignored() {
        let body = vec![delta("x"), "data: [DONE]\n".to_string(), delta("y")];
        let result = decode_stream(ok_chunks(body), "test", None, &CancelToken::never())
            .await
            .unwrap();
        assert_eq!(result, "x");
    }

    #[tokio::test]
    async fn test_cancel_stops_pending_stream() {
        let (handle, token) = cancel_pair();
        let body = stream::iter(vec![Ok::<_, std::io::Error>(delta("first").into_bytes())])
            .chain(stream::pending());
        let task = tokio::spawn(async move { decode_stream(body, "test", None, &token).await });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        handle.cancel();
        let result = task.await.unwrap();
        assert_eq!(result, Err(TranslateError::Cancelled));
    }

    #[tokio::test]
    async fn test_read_error_is_transport_error() {
        let body = stream::iter(vec![
            Ok(delta("x").into_bytes()),
            Err(std::io::Error::other("reset")),
        ]);
        let err = decode_stream(body, "xAI", None, &CancelToken::never())
            .await
            .unwrap_err();
        assert!(matches!(err, TranslateError::Transport { .. }));
    }

    #[test]
    fn test_extract_content_shapes() {
        let delta: Value = serde_json::json!({"choices": [{"delta": {"content": "d"}}]});
        let text: Value = serde_json::json!({"choices": [{"text": "t"}]});
        let message: Value = serde_json::json!({"choices": [{"message": {"content": "m"}}]});
        let role_only: Value = serde_json::json!({"choices": [{"delta": {"role": "assistant"}}]});
        assert_eq!(extract_content(&delta), Some("d"));
        assert_eq!(extract_content(&text), Some("t"));
        assert_eq!(extract_content(&message), Some("m"));
        assert_eq!(extract_content(&role_only), None);
    }

    #[test]
    fn test_decoder_counts_malformed_lines() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"data: nope\n").is_empty());
        assert_eq!(decoder.malformed_lines(), 1);
        assert_eq!(decoder.feed(b"data: [DONE]\n"), vec![SseEvent::Done]);
    }
}
