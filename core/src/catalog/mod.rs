//! Effect catalog
//!
//! Static mapping from the many names an effect goes by (folder names, file
//! stems, engine identifiers, host display names) to the canonical command
//! used as the conflict key. The alias table is generated at build time from
//! `data/effect_aliases.csv`; keyword triggers and reserved posture commands
//! live in [`keywords`].
//!
//! All lookups expect lower-case input.

mod keywords;

pub use keywords::KeywordTrigger;

use crate::classify::AnimationCategory;

include!(concat!(env!("OUT_DIR"), "/effect_aliases.rs"));

/// Aliases shorter than this are only matched exactly, never as substrings
const MIN_SUBSTRING_ALIAS_LEN: usize = 4;

/// Read-only lookups over the alias, keyword and reserved tables.
pub struct EffectCatalog;

impl EffectCatalog {
    /// Resolve an alias exactly (case-insensitive input must already be lowered)
    pub fn resolve(alias: &str) -> Option<&'static str> {
        EFFECT_ALIASES.get(alias).copied()
    }

    /// Resolve an alias exactly, returning the static alias key alongside
    pub fn resolve_entry(alias: &str) -> Option<(&'static str, &'static str)> {
        EFFECT_ALIASES
            .get_entry(alias)
            .map(|(alias, command)| (*alias, *command))
    }

    /// Normalize a user-typed command (`/GoldDance`, `golddance`) to its
    /// canonical form, if the catalog knows it
    pub fn canonical(command: &str) -> Option<&'static str> {
        let lowered = command.trim().to_ascii_lowercase();
        let bare = lowered.trim_start_matches('/');
        if let Some(cmd) = Self::resolve(bare) {
            return Some(cmd);
        }
        let slashed = format!("/{bare}");
        EFFECT_ALIASES
            .values()
            .copied()
            .find(|cmd| *cmd == slashed)
    }

    /// Canonical form of a command when known, else the lower-cased input
    /// with a leading slash
    pub fn normalize(command: &str) -> String {
        let lowered = command.trim().to_lowercase();
        match Self::canonical(&lowered) {
            Some(cmd) => cmd.to_string(),
            None => format!("/{}", lowered.trim_start_matches('/')),
        }
    }

    /// Posture commands the engine issues itself; never user-assignable
    pub fn is_reserved(command: &str) -> bool {
        keywords::RESERVED_COMMANDS.contains_key(command)
    }

    /// Posture category a reserved command drives
    pub fn reserved_category(command: &str) -> Option<AnimationCategory> {
        keywords::RESERVED_COMMANDS.get(command).copied()
    }

    /// Command that puts the character into the given posture
    pub fn command_for_posture(category: AnimationCategory) -> Option<&'static str> {
        let mut commands: Vec<_> = keywords::RESERVED_COMMANDS
            .entries()
            .filter(|(_, c)| **c == category)
            .map(|(cmd, _)| *cmd)
            .collect();
        commands.sort_unstable();
        commands.into_iter().next()
    }

    /// Every canonical command a user may bind to a preset, sorted
    pub fn assignable_commands() -> Vec<&'static str> {
        let mut commands: Vec<_> = EFFECT_ALIASES
            .values()
            .copied()
            .filter(|cmd| !Self::is_reserved(cmd))
            .collect();
        commands.sort_unstable();
        commands.dedup();
        commands
    }

    /// Alias ends in a variant number (`dance04`)
    pub fn is_numbered(alias: &str) -> bool {
        alias.bytes().last().is_some_and(|b| b.is_ascii_digit())
    }

    /// Alias with its variant number stripped (`dance04` -> `dance`)
    pub fn family(alias: &str) -> &str {
        alias.trim_end_matches(|c: char| c.is_ascii_digit())
    }

    /// Longest alias contained in `text`, ignoring reserved and very short
    /// aliases. Ties resolve to the lexicographically smallest alias.
    pub fn longest_alias_in(text: &str) -> Option<(&'static str, &'static str)> {
        EFFECT_ALIASES
            .entries()
            .filter(|(alias, cmd)| {
                alias.len() >= MIN_SUBSTRING_ALIAS_LEN
                    && !Self::is_reserved(cmd)
                    && text.contains(**alias)
            })
            .map(|(alias, cmd)| (*alias, *cmd))
            .max_by(|(a, _), (b, _)| a.len().cmp(&b.len()).then_with(|| b.cmp(a)))
    }

    /// Like [`longest_alias_in`](Self::longest_alias_in), but the alias must
    /// stand as whole words in free text ("pose" does not match "purpose").
    pub fn longest_word_alias_in(text: &str) -> Option<(&'static str, &'static str)> {
        EFFECT_ALIASES
            .entries()
            .filter(|(alias, cmd)| {
                alias.len() >= MIN_SUBSTRING_ALIAS_LEN
                    && !Self::is_reserved(cmd)
                    && contains_words(text, alias)
            })
            .map(|(alias, cmd)| (*alias, *cmd))
            .max_by(|(a, _), (b, _)| a.len().cmp(&b.len()).then_with(|| b.cmp(a)))
    }

    /// Longest keyword trigger contained in `text`
    pub fn keyword_in(text: &str) -> Option<KeywordTrigger> {
        keywords::KEYWORD_TRIGGERS
            .entries()
            .filter(|(keyword, _)| text.contains(**keyword))
            .max_by(|(a, _), (b, _)| a.len().cmp(&b.len()).then_with(|| b.cmp(a)))
            .map(|(_, trigger)| *trigger)
    }
}

fn contains_words(text: &str, words: &str) -> bool {
    let is_word = |c: char| c.is_alphanumeric() || c == '\'';
    text.match_indices(words).any(|(start, _)| {
        let before = text[..start].chars().next_back();
        let after = text[start + words.len()..].chars().next();
        !before.is_some_and(is_word) && !after.is_some_and(is_word)
    })
}
