use std::io::Write;

use tokio::sync::mpsc;

use ft_core::usecase::BatchEvent;

/// チャンク間の区切り
pub const CHUNK_SEPARATOR: &str = "\n\n";

/// バッチイベントを端末に描画する
///
/// 翻訳本文は `out`（stdout）へ、進捗やエラーは `err`（stderr）へ書く。
pub struct Renderer<O: Write, E: Write> {
    out: O,
    err: E,
    current: Option<usize>,
    /// 本文を書き出したチャンク
    written: usize,
}

impl<O: Write, E: Write> Renderer<O, E> {
    pub fn new(out: O, err: E) -> Self {
        Self {
            out,
            err,
            current: None,
            written: 0,
        }
    }

    pub fn handle(&mut self, event: &BatchEvent) -> std::io::Result<()> {
        match event {
            BatchEvent::StateChanged(t) => {
                log::debug!("[{}] {} -> {}", t.run_id, t.prev_state, t.new_state.as_str());
            }
            BatchEvent::ChunkStarted { index, total } => {
                writeln!(self.err, "Translating chunk {index} of {total}...")?;
            }
            BatchEvent::Output { index, text } => {
                if text.is_empty() {
                    return Ok(());
                }
                if self.current != Some(*index) {
                    if self.written > 0 {
                        write!(self.out, "{CHUNK_SEPARATOR}")?;
                    }
                    self.current = Some(*index);
                    self.written += 1;
                }
                write!(self.out, "{text}")?;
                self.out.flush()?;
            }
            BatchEvent::ChunkCompleted { index, chars } => {
                log::debug!("チャンク {index} 完了 ({chars} 文字)");
            }
            BatchEvent::ChunkFailed { index, error } => {
                // 途中まで表示した訳文は保存されないので印を付ける
                if self.current == Some(*index) {
                    write!(self.out, "\n{}", partial_marker(*index))?;
                    self.out.flush()?;
                }
                writeln!(self.err, "Chunk {index} failed [{:?}]: {}", error.code, error.message)?;
            }
            BatchEvent::SummaryReady { index, summary } => {
                log::debug!("チャンク {index} の要約: {summary}");
            }
            BatchEvent::SummarySkipped { index, reason } => {
                writeln!(self.err, "Summary for chunk {index} skipped: {reason}")?;
            }
            BatchEvent::Finished(report) => {
                if self.written > 0 {
                    writeln!(self.out)?;
                }
                self.out.flush()?;
                writeln!(
                    self.err,
                    "Finished: {:?} ({} translated, {} failed, {} ms)",
                    report.outcome,
                    report.translated.len(),
                    report.failed.len(),
                    report.elapsed_ms
                )?;
            }
        }
        Ok(())
    }
}

/// 失敗したチャンクの途中出力の後ろに付ける印
pub fn partial_marker(index: usize) -> String {
    format!("[chunk {index} failed: partial text above is not saved]")
}

/// イベントチャネルが閉じるまで描画を続ける
pub async fn render_until_closed(mut rx: mpsc::UnboundedReceiver<BatchEvent>) {
    let mut renderer = Renderer::new(std::io::stdout(), std::io::stderr());
    while let Some(event) = rx.recv().await {
        if let Err(e) = renderer.handle(&event) {
            log::error!("出力の書き込みに失敗: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(events: &[BatchEvent]) -> (String, String) {
        let mut out = Vec::new();
        let mut err = Vec::new();
        {
            let mut renderer = Renderer::new(&mut out, &mut err);
            for event in events {
                renderer.handle(event).unwrap();
            }
        }
        (
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    fn output(index: usize, text: &str) -> BatchEvent {
        BatchEvent::Output {
            index,
            text: text.into(),
        }
    }

    #[test]
    fn test_chunks_separated_by_blank_line() {
        let (out, _) = render(&[
            output(1, "Hel"),
            output(1, "lo."),
            output(2, "World."),
        ]);
        assert_eq!(out, "Hello.\n\nWorld.");
    }

    #[test]
    fn test_failed_chunk_leaves_no_gap() {
        let (out, err) = render(&[
            output(1, "One."),
            BatchEvent::ChunkStarted { index: 2, total: 3 },
            BatchEvent::ChunkFailed {
                index: 2,
                error: ft_core::domain::error::AppError::summary("boom"),
            },
            output(3, "Three."),
        ]);
        assert_eq!(out, "One.\n\nThree.");
        assert!(err.contains("Translating chunk 2 of 3"));
        assert!(err.contains("Chunk 2 failed"));
    }

    #[test]
    fn test_partial_stream_of_failed_chunk_is_marked() {
        let failed = BatchEvent::ChunkFailed {
            index: 2,
            error: ft_core::domain::error::AppError::summary("stream broke"),
        };
        let (out, _) = render(&[
            output(1, "One."),
            output(2, "Half a sen"),
            failed,
            output(3, "Three."),
        ]);
        assert_eq!(
            out,
            format!("One.\n\nHalf a sen\n{}\n\nThree.", partial_marker(2))
        );
    }

    #[test]
    fn test_empty_output_ignored() {
        let (out, _) = render(&[output(1, ""), output(2, "Two.")]);
        assert_eq!(out, "Two.");
    }
}
