//! Changed-item classification
//!
//! The host keeps its own human-readable list of what a package changes
//! ("Emote: Golden Dance", "Sit", sometimes a raw game path). That list is
//! better than the file layout at naming *which* effect a package edits, but
//! rarely knows slot numbers.

use std::collections::{BTreeMap, BTreeSet};

use crate::catalog::{EffectCatalog, KeywordTrigger};
use crate::host::{ChangedItemKind, ChangedItemMeta};

use super::path::pose_evidence_for_path;
use super::record::{AnimationCategory, Classification};

/// Leading labels the host puts in front of item names
const ITEM_LABELS: &[&str] = &["emote:", "action:"];

const GROUND_WORDS: &[&str] = &["groundsit"];
const RECLINING_WORDS: &[&str] = &["doze", "dozing", "sleep", "sleeping", "recline", "reclining", "lying"];
const SEATED_WORDS: &[&str] = &["sit", "sitting", "seated", "chair", "chairsit"];
const IDLE_WORDS: &[&str] = &["idle", "cpose", "changepose"];

/// What one changed item contributed
#[derive(Debug, Clone, PartialEq, Eq)]
enum ItemEvidence {
    Structural(AnimationCategory, Option<u8>),
    Command(&'static str),
}

/// Outcome of changed-item classification
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangedItemReport {
    pub classification: Classification,
    /// Item names that contributed evidence
    pub matched_items: Vec<String>,
}

/// Classifies a package from the host's changed-item list.
pub struct ChangedItemClassifier;

impl ChangedItemClassifier {
    pub fn classify(items: &BTreeMap<String, ChangedItemMeta>) -> ChangedItemReport {
        let mut report = ChangedItemReport::default();
        let mut commands: Vec<String> = Vec::new();
        let mut per_category: BTreeMap<AnimationCategory, BTreeSet<u8>> = BTreeMap::new();
        let mut evidence: BTreeMap<AnimationCategory, usize> = BTreeMap::new();

        for (text, meta) in items {
            if matches!(meta.kind, ChangedItemKind::Equipment | ChangedItemKind::Customization) {
                continue;
            }
            let Some(found) = evidence_for_item(text) else {
                continue;
            };
            match found {
                ItemEvidence::Structural(category, slot) => {
                    let slots = per_category.entry(category).or_default();
                    if let Some(slot) = slot.filter(|_| category.is_pose()) {
                        slots.insert(slot);
                    }
                    *evidence.entry(category).or_default() += 1;
                }
                ItemEvidence::Command(command) => {
                    if !commands.iter().any(|c| c == command) {
                        commands.push(command.to_string());
                    }
                }
            }
            report.matched_items.push(text.clone());
        }

        let mut classification = Classification {
            affected_commands: commands,
            per_category_slots: per_category,
            ..Default::default()
        };
        classification.finalize(&evidence);
        report.classification = classification;
        report
    }
}

fn evidence_for_item(text: &str) -> Option<ItemEvidence> {
    if looks_like_path(text) {
        return pose_evidence_for_path(text)
            .map(|(category, slot)| ItemEvidence::Structural(category, slot));
    }

    let cleaned = clean_item_name(text);
    if cleaned.is_empty() {
        return None;
    }

    // Pose phrases first: the host uses "pose" both for a generic effect and
    // for pose slots, and a pose item must never be read as the effect.
    if let Some((category, slot)) = pose_phrase(&cleaned) {
        return Some(ItemEvidence::Structural(category, slot));
    }

    let command = EffectCatalog::resolve(&cleaned).or_else(|| {
        cleaned
            .starts_with('/')
            .then(|| EffectCatalog::canonical(&cleaned))
            .flatten()
    });
    if let Some(command) = command {
        return Some(match EffectCatalog::reserved_category(command) {
            Some(category) => ItemEvidence::Structural(category, None),
            None => ItemEvidence::Command(command),
        });
    }

    if let Some((_, command)) = EffectCatalog::longest_word_alias_in(&cleaned) {
        return Some(ItemEvidence::Command(command));
    }

    match EffectCatalog::keyword_in(&cleaned)? {
        KeywordTrigger::Command(command) => Some(ItemEvidence::Command(command)),
        KeywordTrigger::Structural(category) => Some(ItemEvidence::Structural(category, None)),
    }
}

/// A path separator plus a short alphanumeric extension on the last segment
fn looks_like_path(text: &str) -> bool {
    if !text.contains('/') && !text.contains('\\') {
        return false;
    }
    let last = text.rsplit(['/', '\\']).next().unwrap_or_default();
    match last.rsplit_once('.') {
        Some((stem, ext)) => {
            !stem.is_empty()
                && (1..=5).contains(&ext.len())
                && ext.bytes().all(|b| b.is_ascii_alphanumeric())
        }
        None => false,
    }
}

/// Strip host labels and normalize case
fn clean_item_name(text: &str) -> String {
    let mut cleaned = text.trim().to_lowercase();
    for label in ITEM_LABELS {
        if let Some(rest) = cleaned.strip_prefix(label) {
            cleaned = rest.trim().to_string();
            break;
        }
    }
    cleaned
}

/// First slot-looking number in the words: a bare number or a `pose`-style
/// word with trailing digits
fn slot_in_words(words: &[&str]) -> Option<u8> {
    words.iter().find_map(|w| {
        let digits_start = w.find(|c: char| c.is_ascii_digit())?;
        let (head, digits) = w.split_at(digits_start);
        let head_ok = head.is_empty() || head.ends_with("pose");
        (head_ok && digits.bytes().all(|b| b.is_ascii_digit()))
            .then(|| digits.parse::<u8>().ok())
            .flatten()
    })
}

/// Posture named by a plain-text item, if any
fn pose_phrase(cleaned: &str) -> Option<(AnimationCategory, Option<u8>)> {
    let words: Vec<&str> = cleaned
        .split(|c: char| !c.is_alphanumeric() && !matches!(c, '_' | '-' | '\''))
        .filter(|w| !w.is_empty())
        .collect();
    let has = |list: &[&str]| words.iter().any(|w| list.contains(w));
    let has_pair = |a: &str, b: &[&str]| {
        words
            .windows(2)
            .any(|pair| pair[0] == a && b.contains(&pair[1]))
    };
    let has_prefix = |prefix: &str| words.iter().any(|w| w.starts_with(prefix));
    let slot = slot_in_words(&words);

    let category = if has(GROUND_WORDS) || has_pair("ground", &["sit", "sitting"]) || has_prefix("j_pose") {
        AnimationCategory::GroundSeatedPose
    } else if has(RECLINING_WORDS) || has_pair("lie", &["down"]) || has_prefix("l_pose") {
        AnimationCategory::RecliningPose
    } else if has(SEATED_WORDS) || has_prefix("s_pose") {
        AnimationCategory::SeatedPose
    } else if has(IDLE_WORDS)
        || has_pair("change", &["pose"])
        || (words.iter().any(|w| w.starts_with("pose")) && slot.is_some())
    {
        AnimationCategory::IdlePose
    } else {
        return None;
    };
    Some((category, slot))
}
