//! Level inference
//!
//! Decides a catalog level from an item's name, tags and kit flag when the
//! caller did not supply one. The heuristics are an ordered rule list: the
//! first matching rule wins, and an item nothing matches falls back to
//! `Peça` with a classification warning. Matching is substring containment
//! over lowercase, accent-folded text.

use serde::Serialize;
use serde_json::Value;

use crate::models::{ItemDraft, ItemPayload, JsonMap, Level, TagKind};
use crate::text::fold;

/// Tag copied into `context` as a filter facet; never changes the level
pub const NAVAL_TAG: &str = "naval";

/// Tag that marks an assembly (engine block and friends)
pub const MOTOR_TAG: &str = "motor";

const KIT_KEYWORDS: &[&str] = &["kit"];

const PART_KEYWORDS: &[&str] = &[
    "pistão",
    "cabeçote",
    "virabrequim",
    "bomba",
    "bico",
    "anel",
    "junta",
    "parafuso",
    "porca",
    "arruela",
];

const SUBASSEMBLY_KEYWORDS: &[&str] = &[
    "trem de força",
    "chassis",
    "transmissão",
    "diferencial",
    "eixo",
];

const EQUIPMENT_KEYWORDS: &[&str] = &[
    "máquina",
    "empilhadeira",
    "escavadeira",
    "pá-carregadeira",
    "trator",
    "rolo",
    "guindaste",
    "retroescavadeira",
];

const ASSEMBLY_KEYWORDS: &[&str] = &["conjunto", "sistema", "módulo"];

/// What a rule looks at
#[derive(Debug, Clone, Copy)]
pub enum Matcher {
    /// Kit flag set, or the name contains one of the keywords
    KitFlagOrName(&'static [&'static str]),
    /// Name contains one of the keywords
    Name(&'static [&'static str]),
    /// Name or any tag contains one of the keywords, or the marker tag is present
    NameOrTags {
        keywords: &'static [&'static str],
        marker_tag: &'static str,
    },
}

/// One (predicate, outcome) pair of the inference table
#[derive(Debug, Clone, Copy)]
pub struct LevelRule {
    pub name: &'static str,
    pub matcher: Matcher,
    pub level: Level,
}

/// Inference table, evaluated top to bottom
pub const RULES: &[LevelRule] = &[
    LevelRule {
        name: "kit",
        matcher: Matcher::KitFlagOrName(KIT_KEYWORDS),
        level: Level::Kit,
    },
    LevelRule {
        name: "part-keyword",
        matcher: Matcher::Name(PART_KEYWORDS),
        level: Level::Peca,
    },
    LevelRule {
        name: "subassembly-keyword",
        matcher: Matcher::Name(SUBASSEMBLY_KEYWORDS),
        level: Level::Parte,
    },
    LevelRule {
        name: "equipment-keyword",
        matcher: Matcher::Name(EQUIPMENT_KEYWORDS),
        level: Level::Equipamento,
    },
    LevelRule {
        name: "assembly-keyword",
        matcher: Matcher::NameOrTags {
            keywords: ASSEMBLY_KEYWORDS,
            marker_tag: MOTOR_TAG,
        },
        level: Level::Conjunto,
    },
];

/// Level used when no rule matches
pub const FALLBACK_LEVEL: Level = Level::Peca;

/// Folded view of the item being classified
#[derive(Debug, Clone)]
pub struct Subject {
    name: String,
    tags: Vec<String>,
    is_kit: bool,
}

impl Subject {
    pub fn new<I, T>(name: &str, tags: I, is_kit: bool) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        Self {
            name: fold(name),
            tags: tags.into_iter().map(|t| fold(t.as_ref().trim())).collect(),
            is_kit,
        }
    }

    fn name_has_any(&self, keywords: &[&str]) -> bool {
        keywords.iter().any(|k| self.name.contains(&fold(k)))
    }

    fn tags_have_any(&self, keywords: &[&str]) -> bool {
        self.tags
            .iter()
            .any(|tag| keywords.iter().any(|k| tag.contains(&fold(k))))
    }

    fn has_tag(&self, tag: &str) -> bool {
        let tag = fold(tag);
        self.tags.iter().any(|t| *t == tag)
    }
}

impl Matcher {
    pub fn matches(&self, subject: &Subject) -> bool {
        match *self {
            Matcher::KitFlagOrName(keywords) => subject.is_kit || subject.name_has_any(keywords),
            Matcher::Name(keywords) => subject.name_has_any(keywords),
            Matcher::NameOrTags {
                keywords,
                marker_tag,
            } => {
                subject.name_has_any(keywords)
                    || subject.tags_have_any(keywords)
                    || subject.has_tag(marker_tag)
            }
        }
    }
}

/// Where an inferred level came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "rule", rename_all = "lowercase")]
pub enum InferenceSource {
    /// Caller supplied a valid level
    Explicit,
    /// A heuristic rule matched
    Rule(&'static str),
    /// Nothing matched; fallback level applied
    Fallback,
}

/// Result of [`infer_level`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LevelInference {
    pub level: Level,
    pub source: InferenceSource,
}

impl LevelInference {
    /// True when the level is a guess the caller should review
    pub fn is_uncertain(&self) -> bool {
        self.source == InferenceSource::Fallback
    }

    /// Classification-uncertainty notice for `name`, if any
    pub fn warning(&self, name: &str) -> Option<String> {
        self.is_uncertain().then(|| {
            format!(
                "could not classify '{}'; defaulted to {}",
                name, self.level
            )
        })
    }
}

/// Decide the level of an item
///
/// An explicit level always wins. Otherwise [`RULES`] are evaluated in order
/// and the first match decides; with no match the result is
/// [`FALLBACK_LEVEL`] flagged as uncertain. Never fails.
///
/// # Examples
/// ```
/// use pcat_common::classify::infer_level;
/// use pcat_common::Level;
///
/// let no_tags: [&str; 0] = [];
/// assert_eq!(infer_level("Kit motor completo", no_tags, None, false).level, Level::Kit);
/// assert_eq!(infer_level("Pistão 4D80", no_tags, None, false).level, Level::Peca);
/// assert_eq!(
///     infer_level("Pistão X", no_tags, Some(Level::Equipamento), false).level,
///     Level::Equipamento
/// );
/// ```
pub fn infer_level<I, T>(name: &str, tags: I, explicit: Option<Level>, is_kit: bool) -> LevelInference
where
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
{
    if let Some(level) = explicit {
        return LevelInference {
            level,
            source: InferenceSource::Explicit,
        };
    }

    let subject = Subject::new(name, tags, is_kit);
    RULES
        .iter()
        .find(|rule| rule.matcher.matches(&subject))
        .map(|rule| LevelInference {
            level: rule.level,
            source: InferenceSource::Rule(rule.name),
        })
        .unwrap_or(LevelInference {
            level: FALLBACK_LEVEL,
            source: InferenceSource::Fallback,
        })
}

/// Copy facet tags into `context` so they can be filtered on downstream
///
/// Only `naval` is a facet today. An existing `naval` entry is left untouched.
pub fn apply_facets<I, T>(tags: I, context: &mut JsonMap)
where
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
{
    let naval = tags.into_iter().any(|t| fold(t.as_ref().trim()) == NAVAL_TAG);
    if naval {
        context
            .entry(NAVAL_TAG.to_string())
            .or_insert(Value::Bool(true));
    }
}

impl ItemDraft {
    /// Settle the level and facets, producing what the store accepts
    pub fn resolve(self) -> (ItemPayload, LevelInference) {
        let inference = infer_level(&self.name, &self.tags, self.level, self.is_kit);
        let mut context = self.context;
        apply_facets(&self.tags, &mut context);

        let payload = ItemPayload {
            code: self.code,
            name: self.name,
            level: inference.level,
            context,
            attributes: self.attributes,
            tags: self.tags,
        };
        (payload, inference)
    }
}

/// Classification dimension assigned to a newly seen tag
pub fn tag_kind(tag: &str) -> TagKind {
    let folded = fold(tag.trim());
    if folded == NAVAL_TAG {
        return TagKind::Facet;
    }
    let structural = folded == MOTOR_TAG
        || ASSEMBLY_KEYWORDS.iter().any(|k| fold(k) == folded)
        || Level::ALL.iter().any(|l| fold(l.as_str()) == folded);
    if structural {
        TagKind::Structural
    } else {
        TagKind::Free
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_TAGS: [&str; 0] = [];

    #[test]
    fn test_reference_examples() {
        assert_eq!(infer_level("Kit motor completo", NO_TAGS, None, false).level, Level::Kit);
        assert_eq!(infer_level("Pistão 4D80", NO_TAGS, None, false).level, Level::Peca);
        assert_eq!(
            infer_level("Conjunto hidráulico", NO_TAGS, None, false).level,
            Level::Conjunto
        );
    }

    #[test]
    fn test_explicit_level_wins() {
        let inference = infer_level("Pistão X", NO_TAGS, Some(Level::Equipamento), false);
        assert_eq!(inference.level, Level::Equipamento);
        assert_eq!(inference.source, InferenceSource::Explicit);
    }

    #[test]
    fn test_kit_flag_beats_part_keyword() {
        let inference = infer_level("Junta do cabeçote", NO_TAGS, None, true);
        assert_eq!(inference.level, Level::Kit);
        assert_eq!(inference.source, InferenceSource::Rule("kit"));
    }

    #[test]
    fn test_rule_order_part_before_subassembly() {
        // "bomba" (part) and "eixo" (sub-assembly) both present
        let inference = infer_level("Bomba do eixo traseiro", NO_TAGS, None, false);
        assert_eq!(inference.level, Level::Peca);
    }

    #[test]
    fn test_matching_ignores_accents_and_case() {
        assert_eq!(infer_level("PISTAO std", NO_TAGS, None, false).level, Level::Peca);
        assert_eq!(infer_level("Transmissao ZF", NO_TAGS, None, false).level, Level::Parte);
        assert_eq!(infer_level("MAQUINA de solda", NO_TAGS, None, false).level, Level::Equipamento);
    }

    #[test]
    fn test_equipment_keywords() {
        assert_eq!(
            infer_level("Escavadeira 320D", NO_TAGS, None, false).level,
            Level::Equipamento
        );
        assert_eq!(
            infer_level("Pá-carregadeira 950", NO_TAGS, None, false).level,
            Level::Equipamento
        );
    }

    #[test]
    fn test_motor_tag_means_assembly() {
        let inference = infer_level("Cummins 6CT", ["motor"], None, false);
        assert_eq!(inference.level, Level::Conjunto);
    }

    #[test]
    fn test_assembly_keyword_in_tags() {
        let inference = infer_level("Hidráulico principal", ["Sistema hidráulico"], None, false);
        assert_eq!(inference.level, Level::Conjunto);
    }

    #[test]
    fn test_fallback_is_uncertain() {
        let inference = infer_level("Item 4711", NO_TAGS, None, false);
        assert_eq!(inference.level, Level::Peca);
        assert!(inference.is_uncertain());
        let warning = inference.warning("Item 4711").unwrap();
        assert!(warning.contains("Item 4711"));
        assert!(infer_level("Pistão", NO_TAGS, None, false).warning("Pistão").is_none());
    }

    #[test]
    fn test_naval_tag_does_not_change_level() {
        let with = infer_level("Item 1", ["naval"], None, false);
        let without = infer_level("Item 1", NO_TAGS, None, false);
        assert_eq!(with, without);
    }

    #[test]
    fn test_inference_is_deterministic() {
        for _ in 0..3 {
            assert_eq!(
                infer_level("Eixo cardã", ["motor"], None, false),
                infer_level("Eixo cardã", ["motor"], None, false)
            );
        }
    }

    #[test]
    fn test_apply_facets() {
        let mut context = JsonMap::new();
        apply_facets(["motor", " Naval "], &mut context);
        assert_eq!(context.get("naval"), Some(&Value::Bool(true)));

        let mut untouched = JsonMap::new();
        untouched.insert("naval".into(), Value::String("offshore".into()));
        apply_facets(["naval"], &mut untouched);
        assert_eq!(untouched.get("naval"), Some(&Value::String("offshore".into())));

        let mut empty = JsonMap::new();
        apply_facets(NO_TAGS, &mut empty);
        assert!(empty.is_empty());
    }

    #[test]
    fn test_tag_kind() {
        assert_eq!(tag_kind("naval"), TagKind::Facet);
        assert_eq!(tag_kind("Motor"), TagKind::Structural);
        assert_eq!(tag_kind("módulo"), TagKind::Structural);
        assert_eq!(tag_kind("Peça"), TagKind::Structural);
        assert_eq!(tag_kind("caterpillar"), TagKind::Free);
    }

    #[test]
    fn test_draft_resolve_infers_and_copies_facets() {
        let draft = ItemDraft {
            code: Some("GUI-7".into()),
            name: "Guindaste portuário".into(),
            tags: ["naval".to_string()].into_iter().collect(),
            ..Default::default()
        };
        let (payload, inference) = draft.resolve();
        assert_eq!(payload.level, Level::Equipamento);
        assert_eq!(inference.source, InferenceSource::Rule("equipment-keyword"));
        assert_eq!(payload.context.get("naval"), Some(&Value::Bool(true)));
        assert!(payload.tags.contains("naval"));
    }
}
