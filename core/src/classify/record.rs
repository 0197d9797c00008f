use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Structural animation kind a package touches.
///
/// Declaration order doubles as the tie-break order when a package has equal
/// evidence for several structural categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum AnimationCategory {
    #[default]
    None,
    Effect,
    IdlePose,
    SeatedPose,
    GroundSeatedPose,
    RecliningPose,
    Locomotion,
}

impl AnimationCategory {
    pub const POSES: [AnimationCategory; 4] = [
        AnimationCategory::IdlePose,
        AnimationCategory::SeatedPose,
        AnimationCategory::GroundSeatedPose,
        AnimationCategory::RecliningPose,
    ];

    /// One of the four posture categories that use numbered slots
    pub fn is_pose(self) -> bool {
        Self::POSES.contains(&self)
    }

    /// Pose or locomotion: replaced by a redraw rather than a one-shot effect
    pub fn is_structural(self) -> bool {
        self.is_pose() || self == AnimationCategory::Locomotion
    }

    pub fn label(self) -> &'static str {
        match self {
            AnimationCategory::None => "none",
            AnimationCategory::Effect => "effect",
            AnimationCategory::IdlePose => "idle pose",
            AnimationCategory::SeatedPose => "seated pose",
            AnimationCategory::GroundSeatedPose => "ground-seated pose",
            AnimationCategory::RecliningPose => "reclining pose",
            AnimationCategory::Locomotion => "locomotion",
        }
    }
}

impl std::fmt::Display for AnimationCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of classifying one package, independent of when it was observed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub is_recognized: bool,
    /// Canonical commands, most specific first
    pub affected_commands: Vec<String>,
    pub category: AnimationCategory,
    /// Slots of the primary category (empty unless it is a pose category)
    pub pose_slots: BTreeSet<u8>,
    /// Every structural category touched. An empty slot set means the
    /// category is affected but the slot is unknown.
    pub per_category_slots: BTreeMap<AnimationCategory, BTreeSet<u8>>,
}

impl Classification {
    pub fn unrecognized() -> Self {
        Self::default()
    }

    /// True when neither commands nor structural categories were found
    pub fn is_empty(&self) -> bool {
        self.affected_commands.is_empty() && self.per_category_slots.is_empty()
    }

    /// Pick the primary category and derive `pose_slots` and `is_recognized`.
    ///
    /// `evidence` counts evidence paths per structural category; the category
    /// with the most evidence wins, ties going to the earlier variant.
    pub(crate) fn finalize(&mut self, evidence: &BTreeMap<AnimationCategory, usize>) {
        let primary = self
            .per_category_slots
            .keys()
            .copied()
            .max_by(|a, b| {
                let ea = evidence.get(a).copied().unwrap_or(0);
                let eb = evidence.get(b).copied().unwrap_or(0);
                ea.cmp(&eb).then_with(|| b.cmp(a))
            });

        self.category = match primary {
            Some(category) => category,
            None if !self.affected_commands.is_empty() => AnimationCategory::Effect,
            None => AnimationCategory::None,
        };
        self.pose_slots = if self.category.is_pose() {
            self.per_category_slots
                .get(&self.category)
                .cloned()
                .unwrap_or_default()
        } else {
            BTreeSet::new()
        };
        self.is_recognized = self.category != AnimationCategory::None;
    }
}

/// Cached classification for one package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRecord {
    pub display_name: String,
    pub is_recognized: bool,
    pub affected_commands: Vec<String>,
    pub category: AnimationCategory,
    pub pose_slots: BTreeSet<u8>,
    pub per_category_slots: BTreeMap<AnimationCategory, BTreeSet<u8>>,
    pub last_seen: DateTime<Utc>,
}

impl ClassificationRecord {
    pub fn new(
        display_name: impl Into<String>,
        classification: Classification,
        last_seen: DateTime<Utc>,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            is_recognized: classification.is_recognized,
            affected_commands: classification.affected_commands,
            category: classification.category,
            pose_slots: classification.pose_slots,
            per_category_slots: classification.per_category_slots,
            last_seen,
        }
    }

    /// The classification part of the record, without identity or timestamp
    pub fn classification(&self) -> Classification {
        Classification {
            is_recognized: self.is_recognized,
            affected_commands: self.affected_commands.clone(),
            category: self.category,
            pose_slots: self.pose_slots.clone(),
            per_category_slots: self.per_category_slots.clone(),
        }
    }
}
