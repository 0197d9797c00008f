//! Path-based classification
//!
//! Looks at the internal asset paths of one package and decides which
//! effect commands and pose slots it replaces. File layout is the only
//! reliable source for pose slot numbers, so this classifier owns slot
//! extraction; the changed-item text only corroborates.

use std::collections::{BTreeMap, BTreeSet};

use crate::catalog::EffectCatalog;

use super::record::{AnimationCategory, Classification};

/// Folder segments whose contents are combat/job animations, never effects
const EXCLUDED_SEGMENTS: &[&str] = &["weapon", "action", "ability", "battle", "job", "mount"];

/// Shared (non-stance) animation root. Other `bt_*` roots are weapon stances.
const COMMON_ROOT: &str = "bt_common";

const RESIDENT_FOLDER: &str = "resident";
const EMOTE_FOLDER: &str = "emote";

/// Animation-state suffixes stripped before stem lookups
const STATE_SUFFIXES: &[&str] = &[
    "_loop", "_start", "_end", "_st", "_sp", "_lp", "_in", "_out", "_idle",
];

/// Resident stems that replace movement rather than a pose
const LOCOMOTION_STEMS: &[&str] = &["move", "walk", "run", "jog", "sprint"];

/// Folder + filename-prefix convention for one posture category
struct PoseRule {
    category: AnimationCategory,
    /// Empty means the filename counts in any folder
    folders: &'static [&'static str],
    prefix: &'static str,
}

/// Prefixed rules are checked longest prefix first so `s_pose` never reads as `pose`.
const POSE_RULES: &[PoseRule] = &[
    PoseRule {
        category: AnimationCategory::SeatedPose,
        folders: &[EMOTE_FOLDER, RESIDENT_FOLDER],
        prefix: "s_pose",
    },
    PoseRule {
        category: AnimationCategory::GroundSeatedPose,
        folders: &[EMOTE_FOLDER, RESIDENT_FOLDER],
        prefix: "j_pose",
    },
    PoseRule {
        category: AnimationCategory::RecliningPose,
        folders: &[EMOTE_FOLDER, RESIDENT_FOLDER],
        prefix: "l_pose",
    },
    PoseRule {
        category: AnimationCategory::IdlePose,
        folders: &[],
        prefix: "pose",
    },
];

/// One asset path split into the pieces the rules look at
#[derive(Debug)]
struct AssetPath {
    folders: Vec<String>,
    /// File stem with animation-state suffixes removed
    base: String,
}

impl AssetPath {
    fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().replace('\\', "/").to_ascii_lowercase();
        let mut segments: Vec<String> = normalized
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        let file = segments.pop()?;
        let stem = match file.rsplit_once('.') {
            Some((stem, _ext)) => stem,
            None => file.as_str(),
        };
        Some(Self {
            folders: segments,
            base: strip_state_suffixes(stem).to_string(),
        })
    }

    fn in_folder(&self, folder: &str) -> bool {
        self.folders.iter().any(|f| f == folder)
    }

    fn is_excluded(&self) -> bool {
        self.folders.iter().any(|f| {
            EXCLUDED_SEGMENTS.contains(&f.as_str()) || (f.starts_with("bt_") && f != COMMON_ROOT)
        })
    }

    /// Immediately enclosing folder
    fn parent(&self) -> Option<&str> {
        self.folders.last().map(String::as_str)
    }
}

fn strip_state_suffixes(stem: &str) -> &str {
    let mut base = stem;
    loop {
        let Some(stripped) = STATE_SUFFIXES.iter().find_map(|s| base.strip_suffix(s)) else {
            return base;
        };
        if stripped.is_empty() {
            return base;
        }
        base = stripped;
    }
}

/// Parse the slot digits that directly follow a prefix.
///
/// Returns `None` when anything other than digits follows, `Some(None)` when
/// the digits do not fit a slot, and `Some(Some(0))` for no digits at all.
fn slot_after_prefix(rest: &str) -> Option<Option<u8>> {
    if !rest.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if rest.is_empty() {
        return Some(Some(0));
    }
    Some(rest.parse::<u8>().ok())
}

/// Pose / locomotion evidence for a single path (rules 2 and 3).
///
/// The slot is `None` when the category is affected but the slot is unknown.
fn structural_evidence(path: &AssetPath) -> Option<(AnimationCategory, Option<u8>)> {
    if path.base == "idle" {
        return Some((AnimationCategory::IdlePose, Some(0)));
    }
    if path.in_folder(RESIDENT_FOLDER) && LOCOMOTION_STEMS.iter().any(|s| path.base.starts_with(s)) {
        return Some((AnimationCategory::Locomotion, None));
    }

    for rule in POSE_RULES {
        if !rule.folders.is_empty() && !rule.folders.iter().any(|f| path.in_folder(f)) {
            continue;
        }
        let Some(rest) = path.base.strip_prefix(rule.prefix) else {
            continue;
        };
        // A bare `pose` under emote is the generic effect, not an idle slot
        if rule.category == AnimationCategory::IdlePose
            && rest.is_empty()
            && path.in_folder(EMOTE_FOLDER)
            && !path.in_folder(RESIDENT_FOLDER)
        {
            continue;
        }
        if let Some(slot) = slot_after_prefix(rest) {
            return Some((rule.category, slot));
        }
    }
    None
}

/// Pose evidence for a single path-like string, used for host changed items
/// that carry a file path.
pub fn pose_evidence_for_path(raw: &str) -> Option<(AnimationCategory, Option<u8>)> {
    let path = AssetPath::parse(raw)?;
    if path.is_excluded() {
        return None;
    }
    structural_evidence(&path)
}

/// Alias matched for an effect path, with the rule that matched it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Candidate {
    alias: &'static str,
    command: &'static str,
}

impl Candidate {
    fn lookup(alias: &str) -> Option<Self> {
        EffectCatalog::resolve_entry(alias).map(|(alias, command)| Self { alias, command })
    }
}

/// What a single path contributes
enum PathEvidence {
    Structural(AnimationCategory, Option<u8>),
    Effect(Candidate),
    Noise,
}

fn evidence_for(path: &AssetPath) -> PathEvidence {
    if let Some((category, slot)) = structural_evidence(path) {
        return PathEvidence::Structural(category, slot);
    }
    if !path.in_folder(EMOTE_FOLDER) {
        return PathEvidence::Noise;
    }
    match effect_candidate(path) {
        Some(candidate) => match EffectCatalog::reserved_category(candidate.command) {
            Some(category) => PathEvidence::Structural(category, None),
            None => PathEvidence::Effect(candidate),
        },
        None => PathEvidence::Noise,
    }
}

/// Effect resolution for one emote path (rule 4)
fn effect_candidate(path: &AssetPath) -> Option<Candidate> {
    // (a) numbered-variant folder
    if let Some(parent) = path.parent() {
        if parent != EMOTE_FOLDER && EffectCatalog::is_numbered(parent) {
            if let Some(c) = Candidate::lookup(parent) {
                return Some(c);
            }
        }
    }
    // (b) exact stem
    if let Some(c) = Candidate::lookup(&path.base) {
        return Some(c);
    }
    // (c) longest contained alias
    EffectCatalog::longest_alias_in(&path.base).map(|(alias, command)| Candidate { alias, command })
}

/// Order candidates most-specific first and collapse to commands.
///
/// A generic base alias is dropped when a numbered variant of the same family
/// was also seen; otherwise numbered beats plain and longer beats shorter.
fn rank_commands(mut candidates: Vec<Candidate>) -> Vec<String> {
    let numbered_families: BTreeSet<&str> = candidates
        .iter()
        .filter(|c| EffectCatalog::is_numbered(c.alias))
        .map(|c| EffectCatalog::family(c.alias))
        .collect();
    candidates.retain(|c| EffectCatalog::is_numbered(c.alias) || !numbered_families.contains(c.alias));

    candidates.sort_by(|a, b| {
        EffectCatalog::is_numbered(b.alias)
            .cmp(&EffectCatalog::is_numbered(a.alias))
            .then_with(|| b.alias.len().cmp(&a.alias.len()))
            .then_with(|| a.alias.cmp(b.alias))
    });

    let mut commands: Vec<String> = Vec::new();
    for c in candidates {
        if !commands.iter().any(|existing| existing == c.command) {
            commands.push(c.command.to_string());
        }
    }
    commands
}

/// Outcome of path classification, with the counts the decision was based on
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathReport {
    pub classification: Classification,
    /// Paths that contributed evidence, in input order
    pub matched_paths: Vec<String>,
    pub excluded_paths: usize,
    pub noise_paths: usize,
}

impl PathReport {
    pub fn evidence_paths(&self) -> usize {
        self.matched_paths.len()
    }
}

/// Classifies a package from its internal asset paths.
#[derive(Debug, Clone, Copy)]
pub struct PathClassifier {
    noise_ratio: u32,
}

impl Default for PathClassifier {
    fn default() -> Self {
        Self::new(stagehand_types::DEFAULT_NOISE_RATIO)
    }
}

impl PathClassifier {
    pub fn new(noise_ratio: u32) -> Self {
        Self { noise_ratio }
    }

    pub fn classify<S: AsRef<str>>(&self, paths: &[S]) -> PathReport {
        let mut report = PathReport::default();
        let mut candidates = Vec::new();
        let mut per_category: BTreeMap<AnimationCategory, BTreeSet<u8>> = BTreeMap::new();
        let mut evidence: BTreeMap<AnimationCategory, usize> = BTreeMap::new();

        for raw in paths {
            let raw = raw.as_ref();
            let Some(path) = AssetPath::parse(raw) else {
                continue;
            };
            if path.is_excluded() {
                report.excluded_paths += 1;
                continue;
            }

            match evidence_for(&path) {
                PathEvidence::Structural(category, slot) => {
                    let slots = per_category.entry(category).or_default();
                    if let Some(slot) = slot.filter(|_| category.is_pose()) {
                        slots.insert(slot);
                    }
                    *evidence.entry(category).or_default() += 1;
                    report.matched_paths.push(raw.to_string());
                }
                PathEvidence::Effect(candidate) => {
                    candidates.push(candidate);
                    *evidence.entry(AnimationCategory::Effect).or_default() += 1;
                    report.matched_paths.push(raw.to_string());
                }
                PathEvidence::Noise => report.noise_paths += 1,
            }
        }

        let evidence_count = report.evidence_paths();
        if evidence_count == 0 {
            return report;
        }
        if report.excluded_paths > evidence_count {
            tracing::trace!(
                excluded = report.excluded_paths,
                evidence = evidence_count,
                "Rejecting package dominated by weapon paths"
            );
            return report;
        }
        if report.noise_paths > self.noise_ratio as usize * evidence_count {
            tracing::trace!(
                noise = report.noise_paths,
                evidence = evidence_count,
                "Rejecting package dominated by unrelated paths"
            );
            return report;
        }

        let mut classification = Classification {
            affected_commands: rank_commands(candidates),
            per_category_slots: per_category,
            ..Default::default()
        };
        classification.finalize(&evidence);
        report.classification = classification;
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(paths: &[&str]) -> Classification {
        PathClassifier::default().classify(paths).classification
    }

    #[test]
    fn test_emote_path_is_effect() {
        let c = classify(&["bt_common/emote/dance04_loop.pap"]);
        assert_eq!(c.category, AnimationCategory::Effect);
        assert_eq!(c.affected_commands, vec!["/golddance".to_string()]);
        assert!(c.is_recognized);
        assert!(c.pose_slots.is_empty());
    }

    #[test]
    fn test_resident_pose_is_idle_slot() {
        let c = classify(&["bt_common/resident/pose02_loop.pap"]);
        assert_eq!(c.category, AnimationCategory::IdlePose);
        assert_eq!(c.pose_slots, BTreeSet::from([2]));
    }

    #[test]
    fn test_resident_idle_is_slot_zero() {
        let c = classify(&["chara/human/c0101/animation/a0001/bt_common/resident/idle.pap"]);
        assert_eq!(c.category, AnimationCategory::IdlePose);
        assert_eq!(c.pose_slots, BTreeSet::from([0]));
    }

    #[test]
    fn test_idle_and_pose_filenames_count_outside_resident() {
        let c = classify(&["bt_common/emote/idle.pap"]);
        assert!(c.is_recognized);
        assert_eq!(c.category, AnimationCategory::IdlePose);
        assert_eq!(c.pose_slots, BTreeSet::from([0]));

        let c = classify(&["chara/human/c0101/animation/a0001/bt_common/pose03.pap"]);
        assert_eq!(c.category, AnimationCategory::IdlePose);
        assert_eq!(c.pose_slots, BTreeSet::from([3]));

        let c = classify(&["bt_common/emote/pose01_loop.pap"]);
        assert_eq!(c.category, AnimationCategory::IdlePose);
        assert_eq!(c.pose_slots, BTreeSet::from([1]));
    }

    #[test]
    fn test_weapon_only_is_unrecognized() {
        let c = classify(&["bt_common/weapon/idle.pap"]);
        assert!(!c.is_recognized);
        assert_eq!(c.category, AnimationCategory::None);
    }

    #[test]
    fn test_stance_folders_are_excluded() {
        let report = PathClassifier::default().classify(&[
            "bt_2sw_emp/resident/idle.pap",
            "bt_2sw_emp/resident/pose01.pap",
            "bt_common/emote/clap.pap",
        ]);
        assert_eq!(report.excluded_paths, 2);
        // two weapon paths outnumber one effect path
        assert!(!report.classification.is_recognized);
    }

    #[test]
    fn test_seated_ground_and_reclining_prefixes() {
        let c = classify(&["bt_common/emote/s_pose03_loop.pap"]);
        assert_eq!(c.category, AnimationCategory::SeatedPose);
        assert_eq!(c.pose_slots, BTreeSet::from([3]));

        let c = classify(&["bt_common/emote/j_pose01_start.pap"]);
        assert_eq!(c.category, AnimationCategory::GroundSeatedPose);
        assert_eq!(c.pose_slots, BTreeSet::from([1]));

        let c = classify(&["bt_common/emote/l_pose.pap"]);
        assert_eq!(c.category, AnimationCategory::RecliningPose);
        assert_eq!(c.pose_slots, BTreeSet::from([0]));
    }

    #[test]
    fn test_mixed_categories_keep_every_slot_map() {
        let c = classify(&[
            "bt_common/resident/pose01.pap",
            "bt_common/emote/s_pose02_loop.pap",
            "bt_common/emote/s_pose04_loop.pap",
        ]);
        assert_eq!(c.category, AnimationCategory::SeatedPose);
        assert_eq!(c.pose_slots, BTreeSet::from([2, 4]));
        assert_eq!(
            c.per_category_slots.get(&AnimationCategory::IdlePose),
            Some(&BTreeSet::from([1]))
        );
    }

    #[test]
    fn test_numbered_folder_beats_generic_stem() {
        let c = classify(&["bt_common/emote/dance05/dance_loop.pap"]);
        assert_eq!(c.affected_commands, vec!["/balldance".to_string()]);
    }

    #[test]
    fn test_numbered_variant_drops_generic_family() {
        let c = classify(&[
            "bt_common/emote/dance.pap",
            "bt_common/emote/dance04_loop.pap",
        ]);
        assert_eq!(c.affected_commands, vec!["/golddance".to_string()]);
    }

    #[test]
    fn test_substring_match_for_unusual_stems() {
        let c = classify(&["bt_common/emote/custom_golddance_v2.pap"]);
        assert_eq!(c.affected_commands, vec!["/golddance".to_string()]);
    }

    #[test]
    fn test_bare_pose_under_emote_is_generic_effect() {
        let c = classify(&["bt_common/emote/pose.pap"]);
        assert_eq!(c.category, AnimationCategory::Effect);
        assert_eq!(c.affected_commands, vec!["/pose".to_string()]);
    }

    #[test]
    fn test_reserved_stem_becomes_pose_with_unknown_slot() {
        let c = classify(&["bt_common/emote/sit.pap"]);
        assert_eq!(c.category, AnimationCategory::SeatedPose);
        assert!(c.pose_slots.is_empty());
        assert!(c.affected_commands.is_empty());
        assert!(c.per_category_slots.contains_key(&AnimationCategory::SeatedPose));
    }

    #[test]
    fn test_locomotion_from_resident_move() {
        let c = classify(&["bt_common/resident/move_a.pap", "bt_common/resident/run_b.pap"]);
        assert_eq!(c.category, AnimationCategory::Locomotion);
        assert!(c.pose_slots.is_empty());
    }

    #[test]
    fn test_noise_rejection_respects_ratio() {
        let paths = [
            "bt_common/emote/clap.pap",
            "chara/equipment/e0001/texture/a.tex",
            "chara/equipment/e0001/texture/b.tex",
            "chara/equipment/e0001/texture/c.tex",
        ];
        assert!(!PathClassifier::new(2).classify(&paths).classification.is_recognized);
        assert!(PathClassifier::new(3).classify(&paths).classification.is_recognized);
    }

    #[test]
    fn test_state_suffix_stripping() {
        assert_eq!(strip_state_suffixes("dance04_loop"), "dance04");
        assert_eq!(strip_state_suffixes("s_pose01_start_lp"), "s_pose01");
        assert_eq!(strip_state_suffixes("_loop"), "_loop");
    }

    #[test]
    fn test_classification_is_deterministic() {
        let paths = [
            "bt_common/emote/dance02.pap",
            "bt_common/emote/clap_st.pap",
            "bt_common/resident/pose03.pap",
        ];
        assert_eq!(classify(&paths), classify(&paths));
    }
}
