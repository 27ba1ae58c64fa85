//! 文字数ベースのフォールバック分割

/// 段落区切りを尊重して `max_chars` 以下のチャンクに分ける
///
/// 空行で段落を区切り、段落を貪欲に詰める。単独で `max_chars` を超える段落だけは
/// 文字境界で機械的に切る。空チャンクは返さない。
pub fn split_paragraphs(text: &str, max_chars: usize) -> Vec<String> {
    let mut splitter = Splitter::new(max_chars.max(1));
    let mut paragraph: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !paragraph.is_empty() {
                splitter.push_paragraph(&paragraph.join("\n"));
                paragraph.clear();
            }
        } else {
            paragraph.push(line);
        }
    }
    if !paragraph.is_empty() {
        splitter.push_paragraph(&paragraph.join("\n"));
    }

    splitter.finish()
}

struct Splitter {
    max_chars: usize,
    chunks: Vec<String>,
    current: String,
    current_chars: usize,
}

const PARAGRAPH_SEPARATOR: &str = "\n\n";

impl Splitter {
    fn new(max_chars: usize) -> Self {
        Self {
            max_chars,
            chunks: Vec::new(),
            current: String::new(),
            current_chars: 0,
        }
    }

    fn push_paragraph(&mut self, paragraph: &str) {
        let len = paragraph.chars().count();
        let separator = if self.current_chars > 0 { 2 } else { 0 };

        if self.current_chars > 0 && self.current_chars + separator + len > self.max_chars {
            self.finalize_current();
        }

        if self.current_chars == 0 && len > self.max_chars {
            self.hard_split(paragraph);
            return;
        }

        if self.current_chars > 0 {
            self.current.push_str(PARAGRAPH_SEPARATOR);
            self.current_chars += 2;
        }
        self.current.push_str(paragraph);
        self.current_chars += len;
    }

    fn hard_split(&mut self, paragraph: &str) {
        let chars: Vec<char> = paragraph.chars().collect();
        for slice in chars.chunks(self.max_chars) {
            let piece: String = slice.iter().collect();
            self.push_chunk(&piece);
        }
    }

    fn finalize_current(&mut self) {
        if self.current_chars > 0 {
            let current = std::mem::take(&mut self.current);
            self.push_chunk(&current);
            self.current_chars = 0;
        }
    }

    fn push_chunk(&mut self, text: &str) {
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            self.chunks.push(trimmed.to_string());
        }
    }

    fn finish(mut self) -> Vec<String> {
        self.finalize_current();
        self.chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_paragraphs_fit() {
        let chunks = split_paragraphs("Para one.\n\nPara two.", 1000);
        assert_eq!(chunks, vec!["Para one.\n\nPara two."]);
    }

    #[test]
    fn test_paragraphs_split_when_combined_exceeds() {
        // 合計 9 + 2 + 9 = 20 文字
        let chunks = split_paragraphs("Para one.\n\nPara two.", 15);
        assert_eq!(chunks, vec!["Para one.", "Para two."]);
    }

    #[test]
    fn test_exact_fit_includes_separator() {
        assert_eq!(split_paragraphs("Para one.\n\nPara two.", 20).len(), 1);
        assert_eq!(split_paragraphs("Para one.\n\nPara two.", 19).len(), 2);
    }

    #[test]
    fn test_oversized_paragraph_hard_split() {
        let text = "a".repeat(10_000);
        let chunks = split_paragraphs(&text, 4000);
        let lens: Vec<usize> = chunks.iter().map(|c| c.chars().count()).collect();
        assert_eq!(lens, vec![4000, 4000, 2000]);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_oversized_paragraph_flushes_previous_chunk() {
        let big = "b".repeat(25);
        let text = format!("small\n\n{big}\n\ntail");
        let chunks = split_paragraphs(&text, 10);
        assert_eq!(
            chunks,
            vec!["small", "bbbbbbbbbb", "bbbbbbbbbb", "bbbbb", "tail"]
        );
    }

    #[test]
    fn test_lines_inside_paragraph_are_kept_together() {
        let text = "line one\nline two\n\n\n\nnext para";
        let chunks = split_paragraphs(text, 1000);
        assert_eq!(chunks, vec!["line one\nline two\n\nnext para"]);
    }

    #[test]
    fn test_crlf_and_whitespace_only_lines() {
        let text = "first\r\n   \r\nsecond\r\n";
        let chunks = split_paragraphs(text, 1000);
        assert_eq!(chunks, vec!["first\n\nsecond"]);
    }

    #[test]
    fn test_multibyte_hard_split_on_char_boundary() {
        let text = "あ".repeat(7);
        let chunks = split_paragraphs(&text, 3);
        assert_eq!(chunks, vec!["あああ", "あああ", "あ"]);
    }

    #[test]
    fn test_empty_and_blank_input() {
        assert!(split_paragraphs("", 100).is_empty());
        assert!(split_paragraphs("  \n\n \n", 100).is_empty());
    }

    #[test]
    fn test_budget_respected_for_regular_paragraphs() {
        let paragraphs: Vec<String> = (0..50).map(|i| format!("Paragraph number {i} here.")).collect();
        let text = paragraphs.join("\n\n");
        let chunks = split_paragraphs(&text, 80);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 80, "chunk too long: {chunk}");
        }
        // 区切りを戻すと元の本文になる
        assert_eq!(chunks.join("\n\n"), text);
    }

    #[test]
    fn test_deterministic() {
        let text = "alpha beta\n\ngamma delta\n\n".repeat(30);
        assert_eq!(split_paragraphs(&text, 50), split_paragraphs(&text, 50));
    }
}
