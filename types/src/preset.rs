//! Preset records.
//!
//! A preset binds a name to at most one package plus the command or pose slot
//! to trigger once that package has been made the winning one. Presets
//! without a package are "baseline" presets: activating one suppresses every
//! package that would otherwise replace the vanilla animation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Option group name -> selected option names
pub type OptionSelection = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preset {
    pub id: String,
    pub name: String,

    /// Host package identifier this preset makes active
    #[serde(default)]
    pub package: Option<String>,

    /// Effect command to play, also the fallback conflict key when the
    /// package yields no classification
    #[serde(default)]
    pub command: Option<String>,

    /// Pose slot to switch to for pose packages
    #[serde(default)]
    pub pose_slot: Option<u8>,

    /// Option overrides applied on top of the package's permanent options
    #[serde(default)]
    pub options: OptionSelection,

    #[serde(default, rename = "variant")]
    pub variants: Vec<PresetVariant>,
}

/// Named option set layered over the preset's own options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetVariant {
    pub name: String,
    #[serde(default)]
    pub options: OptionSelection,
}

impl Preset {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            package: None,
            command: None,
            pose_slot: None,
            options: OptionSelection::new(),
            variants: Vec::new(),
        }
    }

    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.package = Some(package.into());
        self
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn with_pose_slot(mut self, slot: u8) -> Self {
        self.pose_slot = Some(slot);
        self
    }

    pub fn variant(&self, name: &str) -> Option<&PresetVariant> {
        self.variants.iter().find(|v| v.name.eq_ignore_ascii_case(name))
    }
}

/// A collection of presets as stored in a `presets.toml` file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetBook {
    #[serde(default, rename = "preset")]
    pub presets: Vec<Preset>,
}

impl PresetBook {
    /// Find a preset by id, falling back to a case-insensitive name match
    pub fn find(&self, key: &str) -> Option<&Preset> {
        self.presets
            .iter()
            .find(|p| p.id == key)
            .or_else(|| self.presets.iter().find(|p| p.name.eq_ignore_ascii_case(key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_preset_book() {
        let toml = r#"
[[preset]]
id = "gold"
name = "Gold Dance"
package = "Fancy Gold Dance"
command = "/golddance"

[preset.options]
Speed = ["Fast"]

[[preset.variant]]
name = "Slow"
options = { Speed = ["Slow"] }

[[preset]]
id = "vanilla-sit"
name = "Vanilla Sit"
command = "/sit"
pose_slot = 2
"#;
        let book: PresetBook = toml::from_str(toml).unwrap();
        assert_eq!(book.presets.len(), 2);

        let gold = book.find("gold").unwrap();
        assert_eq!(gold.package.as_deref(), Some("Fancy Gold Dance"));
        assert_eq!(gold.options["Speed"], vec!["Fast".to_string()]);
        assert_eq!(gold.variant("slow").unwrap().options["Speed"], vec!["Slow".to_string()]);

        let sit = book.find("Vanilla Sit").unwrap();
        assert!(sit.package.is_none());
        assert_eq!(sit.pose_slot, Some(2));
    }
}
