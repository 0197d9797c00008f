use hashbrown::HashSet;

use super::record::{AnimationCategory, Classification};

/// Combine path and changed-item findings for one package.
///
/// Commands are unioned (path findings first, case-insensitive dedup). The
/// structural part comes from the path result when it found any category,
/// otherwise from the text result.
pub fn merge(path: &Classification, text: &Classification) -> Classification {
    let mut seen: HashSet<String> = HashSet::new();
    let affected_commands: Vec<String> = path
        .affected_commands
        .iter()
        .chain(text.affected_commands.iter())
        .filter(|cmd| seen.insert(cmd.to_lowercase()))
        .cloned()
        .collect();

    let structural = if !path.per_category_slots.is_empty() {
        Some(path)
    } else if !text.per_category_slots.is_empty() {
        Some(text)
    } else {
        None
    };

    let (category, pose_slots, per_category_slots) = match structural {
        Some(source) => (
            source.category,
            source.pose_slots.clone(),
            source.per_category_slots.clone(),
        ),
        None if !affected_commands.is_empty() => {
            (AnimationCategory::Effect, Default::default(), Default::default())
        }
        None => (AnimationCategory::None, Default::default(), Default::default()),
    };

    Classification {
        is_recognized: category != AnimationCategory::None,
        affected_commands,
        category,
        pose_slots,
        per_category_slots,
    }
}
