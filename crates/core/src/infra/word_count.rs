use serde::Serialize;

/// 語数・文字数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TextStats {
    pub words: usize,
    pub chars: usize,
}

/// 語数と文字数をまとめて数える
pub fn text_stats(text: &str) -> TextStats {
    TextStats {
        words: count_words(text),
        chars: text.chars().count(),
    }
}

/// CJK を考慮した語数カウント
///
/// CJK 文字を含み空白がなければ非空白文字数、CJK と空白が混在すれば全文字数、
/// それ以外は空白区切りの語数を返す。
pub fn count_words(text: &str) -> usize {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0;
    }

    let has_cjk = trimmed.chars().any(is_cjk);
    let has_spaces = trimmed.chars().any(char::is_whitespace);

    match (has_cjk, has_spaces) {
        (true, false) => trimmed.chars().filter(|c| !c.is_whitespace()).count(),
        (true, true) => text.chars().count(),
        _ => trimmed.split_whitespace().count(),
    }
}

fn is_cjk(ch: char) -> bool {
    matches!(ch,
        '\u{4E00}'..='\u{9FFF}'   // CJK 統合漢字
        | '\u{3000}'..='\u{303F}' // CJK 記号・句読点
        | '\u{3040}'..='\u{30FF}' // ひらがな・カタカナ
        | '\u{AC00}'..='\u{D7AF}' // ハングル
        | '\u{FF00}'..='\u{FFEF}' // 全角形
    )
}
