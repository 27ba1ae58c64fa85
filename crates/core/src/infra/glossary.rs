use crate::domain::types::{GlossaryCategory, GlossaryTerm};

/// {glossary_terms} が空のときの値
pub const NO_GLOSSARY_TERMS: &str = "No glossary terms provided.";

/// 実行開始時点の用語集スナップショット（読み取り専用）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Glossary {
    terms: Vec<GlossaryTerm>,
}

impl Glossary {
    pub fn new(terms: Vec<GlossaryTerm>) -> Self {
        Self { terms }
    }

    pub fn terms(&self) -> &[GlossaryTerm] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// プロンプト用に `source: target` を1行ずつ並べる
    ///
    /// カテゴリはカテゴリ列挙順、同一カテゴリ内は登録順。
    /// `characters_only` のときは人名系カテゴリのみ出力する。
    pub fn format_for_prompt(&self, characters_only: bool) -> String {
        let mut lines = Vec::new();
        for category in GlossaryCategory::ALL {
            if characters_only && !category.is_character() {
                continue;
            }
            for term in self.terms.iter().filter(|t| t.category == category) {
                let source = term.source_term.trim();
                let target = term.target_translation.trim();
                if source.is_empty() || target.is_empty() {
                    continue;
                }
                lines.push(format!("{source}: {target}"));
            }
        }

        if lines.is_empty() {
            NO_GLOSSARY_TERMS.to_string()
        } else {
            lines.join("\n")
        }
    }

    /// 非人名系の用語を原文中で訳語に置き換える（実験的な事前置換）
    ///
    /// 長い用語から順に適用し、短い用語が長い用語の一部を先に潰さないようにする。
    pub fn apply_substitutions(&self, text: &str) -> String {
        let mut candidates: Vec<&GlossaryTerm> = self
            .terms
            .iter()
            .filter(|t| !t.category.is_character())
            .filter(|t| !t.source_term.trim().is_empty() && !t.target_translation.trim().is_empty())
            .collect();
        candidates.sort_by_key(|t| std::cmp::Reverse(t.source_term.trim().chars().count()));

        let mut result = text.to_string();
        for term in candidates {
            result = result.replace(term.source_term.trim(), term.target_translation.trim());
        }
        result
    }
}

impl From<Vec<GlossaryTerm>> for Glossary {
    fn from(terms: Vec<GlossaryTerm>) -> Self {
        Self::new(terms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::GlossaryCategory::*;

    fn sample() -> Glossary {
        Glossary::new(vec![
            GlossaryTerm::new("王都", "Royal Capital", Locations),
            GlossaryTerm::new("リン", "Rin", Characters),
            GlossaryTerm::new("聖剣", "Holy Sword", Items),
            GlossaryTerm::new("ユウ", "Yuu", Characters),
        ])
    }

    #[test]
    fn test_format_all_categories_in_category_order() {
        let formatted = sample().format_for_prompt(false);
        assert_eq!(
            formatted,
            "リン: Rin\nユウ: Yuu\n王都: Royal Capital\n聖剣: Holy Sword"
        );
    }

    #[test]
    fn test_format_characters_only() {
        let formatted = sample().format_for_prompt(true);
        assert_eq!(formatted, "リン: Rin\nユウ: Yuu");
    }

    #[test]
    fn test_format_empty_glossary() {
        assert_eq!(Glossary::default().format_for_prompt(false), NO_GLOSSARY_TERMS);
        let only_items = Glossary::new(vec![GlossaryTerm::new("聖剣", "Holy Sword", Items)]);
        assert_eq!(only_items.format_for_prompt(true), NO_GLOSSARY_TERMS);
    }

    #[test]
    fn test_format_skips_blank_terms() {
        let g = Glossary::new(vec![
            GlossaryTerm::new("  ", "x", Other),
            GlossaryTerm::new("剣", "sword", Items),
        ]);
        assert_eq!(g.format_for_prompt(false), "剣: sword");
    }

    #[test]
    fn test_substitution_skips_character_terms() {
        let text = "リンは王都で聖剣を抜いた。";
        assert_eq!(
            sample().apply_substitutions(text),
            "リンはRoyal CapitalでHoly Swordを抜いた。"
        );
    }

    #[test]
    fn test_substitution_prefers_longer_terms() {
        let g = Glossary::new(vec![
            GlossaryTerm::new("剣", "sword", Items),
            GlossaryTerm::new("聖剣", "Holy Sword", Items),
        ]);
        assert_eq!(g.apply_substitutions("聖剣と剣"), "Holy Swordとsword");
    }

    #[test]
    fn test_substitution_empty_text() {
        assert_eq!(sample().apply_substitutions(""), "");
    }
}
