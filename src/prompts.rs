//! # Prompt Templates
//!
//! Named prompt templates with `{placeholder}` substitution.
//!
//! Built-in defaults cover every operation; the `prompts` section of the
//! settings file overrides or extends them by name. A lookup for a name that
//! is neither built in nor configured is a deployment defect and surfaces as
//! [`DjError::MissingTemplate`].
//!
//! Substitution only touches known placeholder keys, so literal JSON braces
//! inside a template (`{"track_name": ...}`) pass through unchanged.

use crate::error::{DjError, DjResult};
use std::collections::HashMap;

pub const AUTO_DJ: &str = "auto_dj";
pub const AUTO_DJ_BATCH: &str = "auto_dj_batch";
pub const RECOMMEND_NEXT_SONG: &str = "recommend_next_song";
pub const RECOMMEND_NEXT_TEN_SONGS: &str = "recommend_next_ten_songs";
pub const CREATE_PLAYLIST: &str = "create_playlist";
pub const THEME_BASED_PLAYLIST: &str = "theme_based_playlist";
pub const GENERATE_RADIO_INTRO: &str = "generate_radio_intro";
pub const DJ_COMMENTARY: &str = "dj_commentary";
pub const SONG_INSIGHTS: &str = "song_insights";
pub const MYSTERY_MODE: &str = "mystery_mode";

const DEFAULT_TEMPLATES: &[(&str, &str)] = &[
    (
        AUTO_DJ,
        "The song \"{song_name}\" by {artist_name} is playing. Pick one track that \
         should follow it on the radio. Reply with JSON only: \
         {\"track_name\": \"...\", \"artist_name\": \"...\"}",
    ),
    (
        AUTO_DJ_BATCH,
        "You are {host_name}, a radio DJ. \"{song_name}\" by {artist_name} is on air. \
         Choose the next 3 tracks for the show. Reply with a JSON array only, each item \
         {\"track_name\": \"...\", \"artist_name\": \"...\", \"intro\": \"one short spoken line\"}",
    ),
    (
        RECOMMEND_NEXT_SONG,
        "Recommend one song to play after \"{song_name}\" by {artist_name}. Reply with \
         JSON only: {\"track_name\": \"...\", \"artist_name\": \"...\"}",
    ),
    (
        RECOMMEND_NEXT_TEN_SONGS,
        "Recommend ten songs to play after \"{song_name}\" by {artist_name}. Reply as a \
         numbered list, one per line, formatted as: 1. Title by Artist",
    ),
    (
        CREATE_PLAYLIST,
        "Build a playlist of ten songs inspired by \"{song_name}\" by {artist_name}. \
         Reply as a numbered list, one per line, formatted as: 1. Title by Artist",
    ),
    (
        THEME_BASED_PLAYLIST,
        "Build a playlist of ten songs around the theme \"{theme}\". Reply as a numbered \
         list, one per line, formatted as: 1. Title by Artist",
    ),
    (
        GENERATE_RADIO_INTRO,
        "You are {host_name}, a late-night radio DJ. Write a two-sentence spoken intro \
         for \"{track_name}\" by {artist_name}. No stage directions.",
    ),
    (
        DJ_COMMENTARY,
        "You are {host_name}, a radio DJ. \"{last_song}\" just finished and \"{next_song}\" \
         is starting. Say one or two sentences bridging them.",
    ),
    (
        SONG_INSIGHTS,
        "Share three short, little-known facts about \"{song_name}\" by {artist_name}.",
    ),
    (
        MYSTERY_MODE,
        "\"{song_name}\" by {artist_name} is playing. Offer 5 options for the next track \
         and secretly pick the one you like best. Reply with JSON only: \
         {\"options\": [{\"track_name\": \"...\", \"artist_name\": \"...\"}], \
         \"selected_index\": <1-5>}",
    ),
];

/// Template table keyed by operation name.
#[derive(Debug, Clone)]
pub struct PromptTemplates {
    templates: HashMap<String, String>,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            templates: DEFAULT_TEMPLATES
                .iter()
                .map(|(name, body)| ((*name).to_string(), (*body).to_string()))
                .collect(),
        }
    }
}

impl PromptTemplates {
    /// A table with no templates at all.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            templates: HashMap::new(),
        }
    }

    /// Built-in defaults with `overrides` merged on top.
    ///
    /// An override whose body is empty removes the template, which makes the
    /// matching operation fail with [`DjError::MissingTemplate`] (or, for the
    /// mystery round, become a no-op).
    #[must_use]
    pub fn with_overrides(overrides: &HashMap<String, String>) -> Self {
        let mut table = Self::default();
        for (name, body) in overrides {
            if body.trim().is_empty() {
                table.templates.remove(name);
            } else {
                table.templates.insert(name.clone(), body.clone());
            }
        }
        table
    }

    pub fn insert(&mut self, name: impl Into<String>, body: impl Into<String>) {
        self.templates.insert(name.into(), body.into());
    }

    pub fn remove(&mut self, name: &str) {
        self.templates.remove(name);
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    /// Render template `name` with `vars` substituted for `{key}` placeholders.
    ///
    /// # Errors
    ///
    /// [`DjError::MissingTemplate`] when no template named `name` exists.
    pub fn render(&self, name: &str, vars: &[(&str, &str)]) -> DjResult<String> {
        let template = self
            .templates
            .get(name)
            .ok_or_else(|| DjError::MissingTemplate(name.to_string()))?;
        Ok(substitute(template, vars))
    }
}

fn substitute(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{key}}}"), value)
    })
}
