//! # Mystery Mode
//!
//! A guessing game layered over the queue: the model offers up to five
//! follow-up tracks and secretly picks one. The pick is pre-queued on the
//! catalog without being revealed; the listener may override it by choosing
//! an option, which then plays immediately.
//!
//! States: disabled, idle (enabled, no round), awaiting choice. A round is
//! created by [`MysteryModeManager::activate_round`] and ends with a
//! successful [`play_choice`](MysteryModeManager::play_choice), a toggle-off,
//! a new round or a failed one.

use crate::catalog::CatalogController;
use crate::model::{CancelFlag, ModelClient};
use crate::parser::parse_mystery;
use crate::prompts::{self, PromptTemplates};
use log::{debug, info, warn};
use std::sync::Arc;

/// One option of a mystery round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MysteryTrack {
    pub track_name: String,
    pub artist_name: String,
    /// Catalog identifier, `None` when the option did not resolve.
    pub uri: Option<String>,
}

pub struct MysteryModeManager {
    model: Arc<dyn ModelClient>,
    catalog: Arc<dyn CatalogController>,
    templates: PromptTemplates,
    enabled: bool,
    awaiting_choice: bool,
    choices: Vec<MysteryTrack>,
    selected_index: Option<usize>,
}

impl MysteryModeManager {
    #[must_use]
    pub fn new(
        model: Arc<dyn ModelClient>,
        catalog: Arc<dyn CatalogController>,
        templates: PromptTemplates,
    ) -> Self {
        Self {
            model,
            catalog,
            templates,
            enabled: false,
            awaiting_choice: false,
            choices: Vec::new(),
            selected_index: None,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// `true` while a round waits for the listener; numeric keys belong to it.
    #[must_use]
    pub fn awaiting_choice(&self) -> bool {
        self.awaiting_choice
    }

    #[must_use]
    pub fn choice_count(&self) -> usize {
        self.choices.len()
    }

    #[must_use]
    pub fn choices(&self) -> &[MysteryTrack] {
        &self.choices
    }

    /// Flip mystery mode; turning it off abandons any pending round.
    pub fn toggle(&mut self) -> bool {
        self.enabled = !self.enabled;
        if !self.enabled {
            self.clear_choices();
        }
        info!("Mystery mode {}", if self.enabled { "on" } else { "off" });
        self.enabled
    }

    pub fn clear_choices(&mut self) {
        self.choices.clear();
        self.selected_index = None;
        self.awaiting_choice = false;
    }

    /// Start a round for the track now playing.
    ///
    /// Returns display text listing the options, or `None` when mystery mode
    /// is off, no `mystery_mode` template is configured, or the model gave
    /// nothing usable. Any previous round is replaced.
    pub fn activate_round(
        &mut self,
        current_track: &str,
        current_artist: &str,
        cancel: Option<&CancelFlag>,
    ) -> Option<String> {
        if !self.enabled || !self.templates.contains(prompts::MYSTERY_MODE) {
            return None;
        }
        self.clear_choices();

        let prompt = self
            .templates
            .render(
                prompts::MYSTERY_MODE,
                &[("song_name", current_track), ("artist_name", current_artist)],
            )
            .ok()?;

        if let Some(cancel) = cancel {
            cancel.clear();
        }
        debug!("[mystery] Prompt:\n{prompt}");
        let response = match self.model.ask(&prompt, cancel) {
            Ok(text) => text,
            Err(e) => {
                warn!("Mystery mode: no response from model: {e}");
                return None;
            }
        };
        debug!("[mystery] Raw response:\n{response}");

        let Some(payload) = parse_mystery(&response) else {
            warn!("Mystery mode: response was not valid JSON");
            return None;
        };
        if payload.options.is_empty() {
            warn!("Mystery mode: model returned no usable options");
            return None;
        }

        self.choices = payload
            .options
            .into_iter()
            .map(|option| {
                let uri = match self.catalog.resolve(&option.track_name, &option.artist_name) {
                    Ok(uri) => uri,
                    Err(e) => {
                        warn!("Mystery mode: lookup failed for {option}: {e}");
                        None
                    }
                };
                MysteryTrack {
                    track_name: option.track_name,
                    artist_name: option.artist_name,
                    uri,
                }
            })
            .collect();

        self.selected_index = payload
            .selected_index
            .filter(|idx| *idx < self.choices.len());
        self.queue_secret_pick();

        self.awaiting_choice = true;
        Some(self.display_text())
    }

    fn queue_secret_pick(&self) {
        let Some(choice) = self.selected_index.and_then(|idx| self.choices.get(idx)) else {
            debug!("Mystery mode: no valid hidden pick this round");
            return;
        };
        match &choice.uri {
            Some(uri) => {
                if let Err(e) = self.catalog.enqueue(uri) {
                    warn!("Mystery mode: failed to queue hidden pick: {e}");
                }
            }
            None => warn!("Mystery mode: hidden pick is not in the catalog"),
        }
    }

    /// Play option `selection` (1-based) right away.
    ///
    /// An out-of-range or unavailable choice keeps the round open so the
    /// listener can pick again.
    pub fn play_choice(&mut self, selection: usize) -> (bool, String) {
        if !self.awaiting_choice {
            return (false, "No mystery selection pending.".to_string());
        }

        let Some(choice) = selection
            .checked_sub(1)
            .and_then(|idx| self.choices.get(idx))
            .cloned()
        else {
            return (false, "Invalid selection.".to_string());
        };

        let Some(uri) = choice.uri.as_deref() else {
            return (
                false,
                "Selected track is unavailable in the catalog.".to_string(),
            );
        };

        let outcome = match self.catalog.play_now(uri) {
            Ok(()) => (
                true,
                format!("Now playing {} by {}.", choice.track_name, choice.artist_name),
            ),
            Err(e) => {
                warn!("Mystery mode: failed to play {uri}: {e}");
                (false, format!("Could not play {}: {e}", choice.track_name))
            }
        };
        self.clear_choices();
        outcome
    }

    fn display_text(&self) -> String {
        let mut lines = vec!["Mystery Crate Picks".to_string()];
        for (idx, track) in self.choices.iter().enumerate() {
            let availability = if track.uri.is_some() { "" } else { " (unavailable)" };
            lines.push(format!(
                "{}. {} - {}{availability}",
                idx + 1,
                track.track_name,
                track.artist_name
            ));
        }
        lines.push(String::new());
        lines.push(format!(
            "Press 1-{} to choose the next track.",
            self.choices.len()
        ));
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{RecordingCatalog, ScriptedModel};

    const FIVE_OPTIONS: &str = r#"{
        "options": [
            {"track_name": "Song A", "artist_name": "Artist A"},
            {"track_name": "Song B", "artist_name": "Artist B"},
            {"track_name": "Song C", "artist_name": "Artist C"},
            {"track_name": "Song D", "artist_name": "Artist D"},
            {"track_name": "Song E", "artist_name": "Artist E"}
        ],
        "selected_index": 2
    }"#;

    fn enabled_manager(
        model: &Arc<ScriptedModel>,
        catalog: &Arc<RecordingCatalog>,
    ) -> MysteryModeManager {
        let mut mystery =
            MysteryModeManager::new(model.clone(), catalog.clone(), PromptTemplates::default());
        mystery.toggle();
        mystery
    }

    #[test]
    fn test_round_hides_and_queues_pick() {
        let model = Arc::new(ScriptedModel::new(&[FIVE_OPTIONS]));
        let catalog = Arc::new(RecordingCatalog::new());
        let mut mystery = enabled_manager(&model, &catalog);

        let display = mystery.activate_round("Now", "Artist", None).unwrap();
        for label in ["Song A", "Song B", "Song C", "Song D", "Song E"] {
            assert!(display.contains(label));
        }
        assert!(display.contains("1. Song A - Artist A"));
        assert!(!display.contains("selected_index"));
        assert!(mystery.awaiting_choice());
        assert_eq!(mystery.choice_count(), 5);
        assert_eq!(catalog.enqueued(), vec![RecordingCatalog::uri("Song B", "Artist B")]);
        assert!(catalog.played().is_empty());
    }

    #[test]
    fn test_play_choice_plays_selected_option() {
        let model = Arc::new(ScriptedModel::new(&[FIVE_OPTIONS]));
        let catalog = Arc::new(RecordingCatalog::new());
        let mut mystery = enabled_manager(&model, &catalog);
        mystery.activate_round("Now", "Artist", None).unwrap();

        let (ok, message) = mystery.play_choice(3);
        assert!(ok);
        assert!(message.contains("Song C"));
        assert_eq!(catalog.played(), vec![RecordingCatalog::uri("Song C", "Artist C")]);
        assert!(!mystery.awaiting_choice());
        assert_eq!(mystery.choice_count(), 0);
    }

    #[test]
    fn test_malformed_json_clears_round() {
        let model = Arc::new(ScriptedModel::new(&["not json"]));
        let catalog = Arc::new(RecordingCatalog::new());
        let mut mystery = enabled_manager(&model, &catalog);

        assert_eq!(mystery.activate_round("Now", "Artist", None), None);
        assert!(!mystery.awaiting_choice());
        assert_eq!(catalog.call_count(), 0);
    }

    #[test]
    fn test_disabled_or_untemplated_is_noop() {
        let model = Arc::new(ScriptedModel::new(&[FIVE_OPTIONS]));
        let catalog = Arc::new(RecordingCatalog::new());

        let mut disabled =
            MysteryModeManager::new(model.clone(), catalog.clone(), PromptTemplates::default());
        assert_eq!(disabled.activate_round("Now", "Artist", None), None);

        let mut templates = PromptTemplates::default();
        templates.remove(prompts::MYSTERY_MODE);
        let mut untemplated = MysteryModeManager::new(model.clone(), catalog.clone(), templates);
        untemplated.toggle();
        assert_eq!(untemplated.activate_round("Now", "Artist", None), None);

        assert_eq!(model.calls(), 0);
    }

    #[test]
    fn test_unresolved_options_are_kept_but_unavailable() {
        let model = Arc::new(ScriptedModel::new(&[FIVE_OPTIONS]));
        let catalog = Arc::new(RecordingCatalog::only(&[
            ("Song A", "Artist A"),
            ("Song C", "Artist C"),
        ]));
        let mut mystery = enabled_manager(&model, &catalog);

        let display = mystery.activate_round("Now", "Artist", None).unwrap();
        assert!(display.contains("2. Song B - Artist B (unavailable)"));
        assert!(!display.contains("1. Song A - Artist A (unavailable)"));
        // Hidden pick (B) did not resolve, so nothing is pre-queued
        assert!(catalog.enqueued().is_empty());

        let (ok, message) = mystery.play_choice(2);
        assert!(!ok);
        assert_eq!(message, "Selected track is unavailable in the catalog.");
        assert!(mystery.awaiting_choice());

        assert!(mystery.play_choice(1).0);
    }

    #[test]
    fn test_invalid_selection_keeps_round() {
        let model = Arc::new(ScriptedModel::new(&[FIVE_OPTIONS]));
        let catalog = Arc::new(RecordingCatalog::new());
        let mut mystery = enabled_manager(&model, &catalog);

        assert_eq!(
            mystery.play_choice(1),
            (false, "No mystery selection pending.".to_string())
        );

        mystery.activate_round("Now", "Artist", None).unwrap();
        assert_eq!(mystery.play_choice(0), (false, "Invalid selection.".to_string()));
        assert_eq!(mystery.play_choice(6), (false, "Invalid selection.".to_string()));
        assert!(mystery.awaiting_choice());
        assert!(catalog.played().is_empty());
    }

    #[test]
    fn test_out_of_range_pick_is_no_selection() {
        let response = r#"{"options": [
            {"track_name": "Song A", "artist_name": "Artist A"},
            {"track_name": "Song B", "artist_name": "Artist B"}
        ], "selected_index": 7}"#;
        let model = Arc::new(ScriptedModel::new(&[response]));
        let catalog = Arc::new(RecordingCatalog::new());
        let mut mystery = enabled_manager(&model, &catalog);

        let display = mystery.activate_round("Now", "Artist", None).unwrap();
        assert!(display.ends_with("Press 1-2 to choose the next track."));
        assert!(catalog.enqueued().is_empty());
    }

    #[test]
    fn test_zero_index_is_no_selection() {
        let response = r#"{"options": [
            {"track_name": "Song A", "artist_name": "Artist A"}
        ], "selected_index": 0}"#;
        let model = Arc::new(ScriptedModel::new(&[response]));
        let catalog = Arc::new(RecordingCatalog::new());
        let mut mystery = enabled_manager(&model, &catalog);

        mystery.activate_round("Now", "Artist", None).unwrap();
        assert!(catalog.enqueued().is_empty());
    }

    #[test]
    fn test_empty_options_and_toggle_off_clear() {
        let model = Arc::new(ScriptedModel::new(&[r#"{"options": []}"#, FIVE_OPTIONS]));
        let catalog = Arc::new(RecordingCatalog::new());
        let mut mystery = enabled_manager(&model, &catalog);

        assert_eq!(mystery.activate_round("Now", "Artist", None), None);
        assert!(!mystery.awaiting_choice());

        mystery.activate_round("Now", "Artist", None).unwrap();
        assert!(mystery.awaiting_choice());
        assert!(!mystery.toggle());
        assert!(!mystery.awaiting_choice());
        assert_eq!(mystery.choice_count(), 0);
    }

    #[test]
    fn test_play_failure_ends_round() {
        let model = Arc::new(ScriptedModel::new(&[FIVE_OPTIONS]));
        let catalog = Arc::new(RecordingCatalog::failing_play());
        let mut mystery = enabled_manager(&model, &catalog);
        mystery.activate_round("Now", "Artist", None).unwrap();

        let (ok, _) = mystery.play_choice(1);
        assert!(!ok);
        assert!(!mystery.awaiting_choice());
    }

    #[test]
    fn test_cancelled_round_returns_none() {
        let model = Arc::new(ScriptedModel::default());
        model.push_err(crate::model::ModelError::Cancelled);
        let catalog = Arc::new(RecordingCatalog::new());
        let mut mystery = enabled_manager(&model, &catalog);

        let cancel = CancelFlag::new();
        assert_eq!(mystery.activate_round("Now", "Artist", Some(&cancel)), None);
        assert_eq!(catalog.call_count(), 0);
    }
}
