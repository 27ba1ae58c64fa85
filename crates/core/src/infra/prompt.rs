//! 翻訳プロンプトの組み立て
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::domain::batch::ChunkSummary;
use crate::infra::glossary::NO_GLOSSARY_TERMS;

/// 未入力欄に入れる既定値
pub const NONE_PROVIDED: &str = "None provided.";

/// 最初のチャンクの {previous_chunk_summaries}
pub const NO_PREVIOUS_CHUNKS: &str = "None (this is the first chunk of the text).";

/// 既定の翻訳プロンプトテンプレート
pub const DEFAULT_TEMPLATE: &str = "\
You are an expert fanfiction translator. Translate the following text from {source_language} to {target_language}.

**Fandom Context:**
{fandom_context}

**Previous Chapter Summary:**
{previous_chapter_summary}

**Summaries of Previous Parts of This Text:**
{previous_chunk_summaries}

**Glossary (use these translations consistently):**
{glossary_terms}

**Translator Notes/Instructions:**
{notes}

**Source Text:**
\"\"\"
{source_text}
\"\"\"

**Translation Guidelines:**
- Maintain the original tone, style, character voices, and nuances.
- Adapt cultural references appropriately for an English-speaking audience while preserving the original meaning.
- Ensure accuracy and fluency in the target language ({target_language}).
- Pay attention to any specific instructions mentioned in the Translator Notes.

**Begin Translation:**";

/// 要約用のシステム指示
pub const SUMMARIZER_INSTRUCTIONS: &str = "You are an expert summarizer. Create a concise summary of the provided text, focusing on key plot points, character interactions, and context useful for translating the next chapter or section.";

/// 認識するプレースホルダー
pub const PLACEHOLDERS: [&str; 8] = [
    "source_language",
    "target_language",
    "fandom_context",
    "notes",
    "source_text",
    "previous_chapter_summary",
    "previous_chunk_summaries",
    "glossary_terms",
];

static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([a-z_]+)\}").expect("placeholder regex"));

/// チャンクごとの置換値
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptContext {
    pub source_language: String,
    pub target_language: String,
    pub fandom_context: String,
    pub notes: String,
    pub source_text: String,
    pub previous_chapter_summary: String,
    pub previous_chunk_summaries: String,
    pub glossary_terms: String,
}

impl PromptContext {
    fn value_for(&self, placeholder: &str) -> Option<&str> {
        let value = match placeholder {
            "source_language" => &self.source_language,
            "target_language" => &self.target_language,
            "fandom_context" => &self.fandom_context,
            "notes" => &self.notes,
            "source_text" => &self.source_text,
            "previous_chapter_summary" => &self.previous_chapter_summary,
            "previous_chunk_summaries" => &self.previous_chunk_summaries,
            "glossary_terms" => &self.glossary_terms,
            _ => return None,
        };
        Some(value.as_str())
    }
}

/// 組み立て結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledPrompt {
    pub prompt: String,
    /// テンプレートに原文が入らず既定プロンプトに切り替えたか
    pub used_fallback: bool,
}

/// テンプレート中の既知プレースホルダーを一度だけ置換する
///
/// 置換後の値は再走査しないので、原文中の `{notes}` などはそのまま残る。
/// 未知のプレースホルダーも残す。
pub fn build(template: &str, ctx: &PromptContext) -> String {
    PLACEHOLDER_RE
        .replace_all(template, |caps: &Captures| match ctx.value_for(&caps[1]) {
            Some(value) => value.to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// テンプレートを置換し、原文が含まれなければ既定プロンプトに切り替える
pub fn assemble(template: &str, ctx: &PromptContext) -> AssembledPrompt {
    let built = build(template, ctx);
    if template.contains("{source_text}") && built.contains(ctx.source_text.as_str()) {
        return AssembledPrompt {
            prompt: built,
            used_fallback: false,
        };
    }

    log::warn!("テンプレートに {{source_text}} が無いため既定プロンプトを使用します");
    AssembledPrompt {
        prompt: fallback_prompt(ctx),
        used_fallback: true,
    }
}

fn is_provided(value: &str, default: &str) -> bool {
    let v = value.trim();
    !v.is_empty() && v != default
}

/// 原文・言語対・各文脈を必ず含む既定プロンプト
pub fn fallback_prompt(ctx: &PromptContext) -> String {
    let src = &ctx.source_language;
    let tgt = &ctx.target_language;

    let mut sections = vec![format!(
        "Faithfully translate the following text from {src} into {tgt}, ensuring the result reads naturally and authentically in the target language while preserving the spirit of the original."
    )];

    if is_provided(&ctx.fandom_context, NONE_PROVIDED) {
        sections.push(format!("--- Fandom Context ---\n{}", ctx.fandom_context));
    }
    if is_provided(&ctx.previous_chapter_summary, NONE_PROVIDED) {
        sections.push(format!(
            "--- Previous Chapter Summary ---\n{}",
            ctx.previous_chapter_summary
        ));
    }
    if is_provided(&ctx.previous_chunk_summaries, NO_PREVIOUS_CHUNKS) {
        sections.push(format!(
            "--- Summaries of Previous Parts ---\n{}",
            ctx.previous_chunk_summaries
        ));
    }
    if is_provided(&ctx.glossary_terms, NO_GLOSSARY_TERMS) {
        sections.push(format!("--- Glossary ---\n{}", ctx.glossary_terms));
    }
    if is_provided(&ctx.notes, NONE_PROVIDED) {
        sections.push(format!(
            "--- Translator Notes & Special Instructions ---\n{}",
            ctx.notes
        ));
    }

    sections.push(format!("--- Source Text ({src}) ---\n{}", ctx.source_text));
    sections.push(format!(
        "--- Translation Guidelines ---
- Preserve the original tone, narrative style, character voices, and subtle nuances.
- Adapt cultural references thoughtfully to ensure clarity and resonance for an {tgt}-speaking audience, without distorting the original intent.
- Ensure the translation is both accurate and fluent in {tgt}.
- Carefully follow any specific instructions provided in the Translator Notes.
- Begin the translation now."
    ));

    format!(
        "You are an expert fanfiction translator performing translation from {src} to {tgt}.\n\n{}",
        sections.join("\n\n")
    )
}

/// {previous_chunk_summaries} の値を作る
pub fn format_chunk_summaries(summaries: &[ChunkSummary]) -> String {
    if summaries.is_empty() {
        return NO_PREVIOUS_CHUNKS.to_string();
    }
    summaries
        .iter()
        .map(|s| format!("Chunk {} Summary: {}", s.index, s.text.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// チャンク間要約のプロンプト
pub fn chunk_summary_prompt(translated: &str) -> String {
    format!(
        "{SUMMARIZER_INSTRUCTIONS}\n\nSummarize the following translated passage in a few sentences. It will be given as context when translating the next part of the same text.\n\n{translated}"
    )
}

/// 章全体の要約プロンプト
pub fn chapter_summary_prompt(text: &str) -> String {
    format!("{SUMMARIZER_INSTRUCTIONS}\n\nPlease summarize the following text:\n\n{text}")
}
