use stagehand_types::Preset;

use crate::catalog::EffectCatalog;
use crate::classify::{AnimationCategory, ClassificationRecord};
use crate::host::AnimationSurface;

/// The single surface action an activation ends with
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfacePlan {
    PlayEffect(String),
    Pose { category: AnimationCategory, slot: u8 },
    Redraw,
    Nothing,
}

impl SurfacePlan {
    pub fn for_activation(preset: &Preset, target: Option<&ClassificationRecord>) -> Self {
        let command = preset
            .command
            .as_deref()
            .map(EffectCatalog::normalize)
            .filter(|c| !c.is_empty() && c != "/");
        let record = target.filter(|r| r.is_recognized);

        match record.map(|r| r.category) {
            Some(category) if category.is_pose() => Self::Pose {
                category,
                slot: preset
                    .pose_slot
                    .or_else(|| record.and_then(|r| r.pose_slots.first().copied()))
                    .unwrap_or(0),
            },
            Some(AnimationCategory::Locomotion) => Self::Redraw,
            Some(AnimationCategory::Effect) => command
                .filter(|c| !EffectCatalog::is_reserved(c))
                .or_else(|| record.and_then(|r| r.affected_commands.first().cloned()))
                .map(Self::PlayEffect)
                .unwrap_or(Self::Nothing),
            _ => match command {
                Some(cmd) => match EffectCatalog::reserved_category(&cmd) {
                    Some(category) => Self::Pose {
                        category,
                        slot: preset.pose_slot.unwrap_or(0),
                    },
                    None => Self::PlayEffect(cmd),
                },
                None => Self::Nothing,
            },
        }
    }

    /// Perform the plan. Runs on the main thread.
    pub fn run(self, surface: &mut dyn AnimationSurface) {
        match self {
            Self::PlayEffect(command) => surface.play_effect(&command),
            Self::Pose { category, slot } => {
                surface.set_pose_slot(category, slot);
                surface.request_redraw();
                if surface.current_posture() == Some(category) {
                    surface.cycle_pose_to_slot(slot);
                } else if let Some(command) = EffectCatalog::command_for_posture(category) {
                    surface.play_effect(command);
                }
            }
            Self::Redraw => surface.request_redraw(),
            Self::Nothing => {}
        }
    }
}
