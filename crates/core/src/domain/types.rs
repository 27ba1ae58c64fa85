use serde::{Deserialize, Serialize};

/// 1始まりの原文チャンク
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub index: usize,
    pub text: String,
    /// トークナイザーサービス由来、またはフォールバック時の推定値
    pub estimated_tokens: Option<usize>,
}

/// 1文字あたりのトークン推定値（フォールバック分割用）
pub const CHARS_PER_TOKEN_ESTIMATE: usize = 4;

/// モデルごとのチャンクサイズ目標
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingBudget {
    pub max_tokens: usize,
    pub chars_per_token: usize,
}

impl ChunkingBudget {
    pub fn new(max_tokens: usize) -> Self {
        Self {
            max_tokens,
            chars_per_token: CHARS_PER_TOKEN_ESTIMATE,
        }
    }

    /// フォールバック分割で使う最大文字数
    pub fn max_chars(&self) -> usize {
        self.max_tokens.saturating_mul(self.chars_per_token)
    }
}

/// 1リクエスト分の翻訳要求（チャンク翻訳・要約の両方で使う）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranslationRequest {
    pub prompt: String,
    pub model: String,
    pub temperature: f32,
    pub stream: bool,
}

/// 用語集カテゴリ（閉じた列挙）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlossaryCategory {
    Characters,
    Locations,
    Techniques,
    Items,
    Concepts,
    Titles,
    Organizations,
    Other,
}

impl GlossaryCategory {
    /// プロンプト整形時の走査順
    pub const ALL: [GlossaryCategory; 8] = [
        Self::Characters,
        Self::Locations,
        Self::Techniques,
        Self::Items,
        Self::Concepts,
        Self::Titles,
        Self::Organizations,
        Self::Other,
    ];

    /// 人名系カテゴリか（事前置換の対象外）
    pub fn is_character(&self) -> bool {
        matches!(self, Self::Characters)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Characters => "characters",
            Self::Locations => "locations",
            Self::Techniques => "techniques",
            Self::Items => "items",
            Self::Concepts => "concepts",
            Self::Titles => "titles",
            Self::Organizations => "organizations",
            Self::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

/// 用語集エントリ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlossaryTerm {
    pub id: Option<String>,
    pub source_term: String,
    pub target_translation: String,
    pub category: GlossaryCategory,
}

impl GlossaryTerm {
    pub fn new(
        source_term: impl Into<String>,
        target_translation: impl Into<String>,
        category: GlossaryCategory,
    ) -> Self {
        Self {
            id: None,
            source_term: source_term.into(),
            target_translation: target_translation.into(),
            category,
        }
    }
}

/// 文書全体に共通するプロンプト文脈（全チャンクに同じ値を適用）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentContext {
    pub source_language: String,
    pub target_language: String,
    pub fandom_context: String,
    pub notes: String,
    /// ユーザーが与える前章の要約（実行中は固定）
    pub previous_chapter_summary: String,
}

/// 保存対象のテキスト欄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextField {
    Source,
    Prompt,
    Fandom,
    Notes,
    Output,
    ChapterSummary,
}

impl TextField {
    pub const ALL: [TextField; 6] = [
        Self::Source,
        Self::Prompt,
        Self::Fandom,
        Self::Notes,
        Self::Output,
        Self::ChapterSummary,
    ];

    /// ストレージ上のキー名
    pub fn key(&self) -> &'static str {
        match self {
            Self::Source => "translationContent",
            Self::Prompt => "promptContent",
            Self::Fandom => "fandomContent",
            Self::Notes => "notesContent",
            Self::Output => "outputContent",
            Self::ChapterSummary => "summaryContent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "source" => Some(Self::Source),
            "prompt" => Some(Self::Prompt),
            "fandom" => Some(Self::Fandom),
            "notes" => Some(Self::Notes),
            "output" => Some(Self::Output),
            "summary" | "chapter_summary" => Some(Self::ChapterSummary),
            _ => None,
        }
    }
}
