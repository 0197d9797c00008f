//! Conflict resolution
//!
//! Two packages conflict when their footprints intersect: they replace a
//! common effect command, or the same structural category with overlapping
//! slots. An empty slot set means the slot is unknown and overlaps anything.

use std::collections::{BTreeMap, BTreeSet};

use stagehand_types::{Preset, StagehandConfig};

use crate::cache::CacheRecords;
use crate::catalog::EffectCatalog;
use crate::classify::{AnimationCategory, ClassificationRecord};

/// Everything a package (or preset) claims
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Footprint {
    /// Lower-cased canonical commands
    pub commands: BTreeSet<String>,
    pub structural: BTreeMap<AnimationCategory, BTreeSet<u8>>,
}

impl Footprint {
    pub fn from_record(record: &ClassificationRecord) -> Self {
        Self {
            commands: record
                .affected_commands
                .iter()
                .map(|c| c.to_lowercase())
                .collect(),
            structural: record.per_category_slots.clone(),
        }
    }

    /// Footprint of a configured command. Reserved posture commands claim
    /// their posture category at `pose_slot` (unknown when absent).
    pub fn from_command(command: &str, pose_slot: Option<u8>) -> Self {
        let canonical = EffectCatalog::normalize(command);

        let mut footprint = Self::default();
        match EffectCatalog::reserved_category(&canonical) {
            Some(category) => {
                footprint
                    .structural
                    .insert(category, pose_slot.into_iter().collect());
            }
            None => {
                footprint.commands.insert(canonical);
            }
        }
        footprint
    }

    /// What activating `preset` claims: the target package's classification
    /// when it has one, else the preset's own command
    pub fn for_preset(preset: &Preset, target: Option<&ClassificationRecord>) -> Self {
        match target {
            Some(record) if record.is_recognized => Self::from_record(record),
            _ => preset
                .command
                .as_deref()
                .map(|cmd| Self::from_command(cmd, preset.pose_slot))
                .unwrap_or_default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty() && self.structural.is_empty()
    }

    pub fn intersects(&self, other: &Footprint) -> bool {
        if self.commands.iter().any(|c| other.commands.contains(c)) {
            return true;
        }
        self.structural.iter().any(|(category, slots)| {
            other.structural.get(category).is_some_and(|theirs| {
                slots.is_empty() || theirs.is_empty() || !slots.is_disjoint(theirs)
            })
        })
    }
}

/// Finds the packages an activation has to suppress
pub struct ConflictResolver<'a> {
    config: &'a StagehandConfig,
}

impl<'a> ConflictResolver<'a> {
    pub fn new(config: &'a StagehandConfig) -> Self {
        Self { config }
    }

    /// Ids of packages whose footprint intersects `footprint`, sorted.
    ///
    /// `target` is never returned, nor are protected or unrecognized
    /// packages. `is_disabled` is consulted last, only for packages that
    /// would otherwise conflict, so permanently disabled ones are skipped.
    pub fn conflicts(
        &self,
        footprint: &Footprint,
        target: Option<&str>,
        records: &CacheRecords,
        is_disabled: impl Fn(&str) -> bool,
    ) -> Vec<String> {
        if footprint.is_empty() {
            return Vec::new();
        }
        records
            .iter()
            .filter(|(id, _)| Some(id.as_str()) != target)
            .filter(|(id, _)| !self.config.is_protected(id))
            .filter(|(_, record)| record.is_recognized)
            .filter(|(_, record)| footprint.intersects(&Footprint::from_record(record)))
            .filter(|(id, _)| !is_disabled(id.as_str()))
            .map(|(id, _)| id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Classification;
    use chrono::Utc;

    fn pose(category: AnimationCategory, slots: &[u8]) -> ClassificationRecord {
        let slots: BTreeSet<u8> = slots.iter().copied().collect();
        let classification = Classification {
            is_recognized: true,
            affected_commands: Vec::new(),
            category,
            pose_slots: slots.clone(),
            per_category_slots: [(category, slots)].into_iter().collect(),
        };
        ClassificationRecord::new("pose", classification, Utc::now())
    }

    fn effect(commands: &[&str]) -> ClassificationRecord {
        let classification = Classification {
            is_recognized: true,
            affected_commands: commands.iter().map(|c| c.to_string()).collect(),
            category: AnimationCategory::Effect,
            ..Default::default()
        };
        ClassificationRecord::new("effect", classification, Utc::now())
    }

    fn records(entries: Vec<(&str, ClassificationRecord)>) -> CacheRecords {
        entries
            .into_iter()
            .map(|(id, r)| (id.to_string(), r))
            .collect()
    }

    #[test]
    fn test_disjoint_slots_do_not_conflict() {
        let a = Footprint::from_record(&pose(AnimationCategory::SeatedPose, &[1]));
        let b = Footprint::from_record(&pose(AnimationCategory::SeatedPose, &[3]));
        assert!(!a.intersects(&b));
        assert!(!b.intersects(&a));
    }

    #[test]
    fn test_overlapping_slots_conflict_both_ways() {
        let a = Footprint::from_record(&pose(AnimationCategory::SeatedPose, &[2]));
        let b = Footprint::from_record(&pose(AnimationCategory::SeatedPose, &[2, 5]));
        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
    }

    #[test]
    fn test_unknown_slot_overlaps_any_slot() {
        let known = Footprint::from_record(&pose(AnimationCategory::SeatedPose, &[4]));
        let unknown = Footprint::from_record(&pose(AnimationCategory::SeatedPose, &[]));
        assert!(known.intersects(&unknown));
        assert!(unknown.intersects(&known));

        let other_category = Footprint::from_record(&pose(AnimationCategory::IdlePose, &[]));
        assert!(!known.intersects(&other_category));
    }

    #[test]
    fn test_commands_compare_case_insensitively() {
        let a = Footprint::from_record(&effect(&["/GoldDance"]));
        let b = Footprint::from_command("golddance", None);
        assert!(a.intersects(&b));
    }

    #[test]
    fn test_reserved_command_maps_to_pose_footprint() {
        let footprint = Footprint::from_command("/sit", Some(1));
        assert!(footprint.commands.is_empty());
        assert_eq!(
            footprint.structural.get(&AnimationCategory::SeatedPose),
            Some(&BTreeSet::from([1]))
        );
    }

    #[test]
    fn test_resolver_skips_target_protected_and_disabled() {
        let all = records(vec![
            ("target", effect(&["/clap"])),
            ("same", effect(&["/clap"])),
            ("protected", effect(&["/clap"])),
            ("disabled", effect(&["/clap"])),
            ("unrelated", effect(&["/wave"])),
        ]);
        let config = StagehandConfig {
            protected_packages: BTreeSet::from(["protected".to_string()]),
            ..Default::default()
        };
        let footprint = Footprint::from_record(&all["target"]);
        let found = ConflictResolver::new(&config).conflicts(
            &footprint,
            Some("target"),
            &all,
            |id| id == "disabled",
        );
        assert_eq!(found, vec!["same".to_string()]);
    }

    #[test]
    fn test_multi_category_package_checked_on_every_category() {
        let mut both = pose(AnimationCategory::IdlePose, &[1]);
        both.per_category_slots
            .insert(AnimationCategory::SeatedPose, BTreeSet::from([2]));
        let all = records(vec![("both", both)]);
        let footprint = Footprint::from_command("/sit", Some(2));
        let config = StagehandConfig::default();
        let found = ConflictResolver::new(&config).conflicts(&footprint, None, &all, |_| false);
        assert_eq!(found, vec!["both".to_string()]);
    }

    #[test]
    fn test_unrecognized_target_falls_back_to_command() {
        let preset = Preset::new("p", "P").with_package("pkg").with_command("/GoldDance");
        let unknown = ClassificationRecord::new("pkg", Classification::unrecognized(), Utc::now());
        let footprint = Footprint::for_preset(&preset, Some(&unknown));
        assert!(footprint.commands.contains("/golddance"));
    }
}
