use phf::phf_map;

use crate::classify::AnimationCategory;

/// What a free-text keyword points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordTrigger {
    Command(&'static str),
    Structural(AnimationCategory),
}

/// Posture commands -> the category they drive
pub(super) static RESERVED_COMMANDS: phf::Map<&'static str, AnimationCategory> = phf_map! {
    "/cpose" => AnimationCategory::IdlePose,
    "/sit" => AnimationCategory::SeatedPose,
    "/groundsit" => AnimationCategory::GroundSeatedPose,
    "/doze" => AnimationCategory::RecliningPose,
};

/// Substring triggers for host display text that is not an exact alias.
/// Kept to words that do not occur inside unrelated item names.
pub(super) static KEYWORD_TRIGGERS: phf::Map<&'static str, KeywordTrigger> = phf_map! {
    // effects
    "dance" => KeywordTrigger::Command("/dance"),
    "clap" => KeywordTrigger::Command("/clap"),
    "applau" => KeywordTrigger::Command("/clap"),
    "wave" => KeywordTrigger::Command("/wave"),
    "laugh" => KeywordTrigger::Command("/laugh"),
    "cheer" => KeywordTrigger::Command("/cheer"),
    "salute" => KeywordTrigger::Command("/salute"),
    "kneel" => KeywordTrigger::Command("/kneel"),
    "shrug" => KeywordTrigger::Command("/shrug"),
    "stretch" => KeywordTrigger::Command("/stretch"),
    "lookout" => KeywordTrigger::Command("/lookout"),
    "victory" => KeywordTrigger::Command("/vpose"),
    "pushup" => KeywordTrigger::Command("/pushups"),
    "squat" => KeywordTrigger::Command("/squats"),
    "situp" => KeywordTrigger::Command("/situps"),
    "kiss" => KeywordTrigger::Command("/blowkiss"),
    "photograph" => KeywordTrigger::Command("/photograph"),
    // gestures
    "think" => KeywordTrigger::Command("/think"),
    "panic" => KeywordTrigger::Command("/panic"),
    // locomotion
    "walk" => KeywordTrigger::Structural(AnimationCategory::Locomotion),
    "running" => KeywordTrigger::Structural(AnimationCategory::Locomotion),
    "sprint" => KeywordTrigger::Structural(AnimationCategory::Locomotion),
    "jog" => KeywordTrigger::Structural(AnimationCategory::Locomotion),
    "movement" => KeywordTrigger::Structural(AnimationCategory::Locomotion),
    "locomotion" => KeywordTrigger::Structural(AnimationCategory::Locomotion),
};
