//! Scripted model and recording catalog shared by the unit tests.

use crate::catalog::{CatalogController, CatalogError, Transport};
use crate::model::{CancelFlag, ModelClient, ModelError};
use crate::track::TrackRef;
use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

/// Returns queued responses in order, then `EmptyResponse` forever.
#[derive(Default)]
pub struct ScriptedModel {
    responses: Mutex<VecDeque<Result<String, ModelError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new(responses: &[&str]) -> Self {
        let model = Self::default();
        for text in responses {
            model.push(text);
        }
        model
    }

    pub fn push(&self, text: &str) {
        self.responses.lock().unwrap().push_back(Ok(text.to_string()));
    }

    pub fn push_err(&self, err: ModelError) {
        self.responses.lock().unwrap().push_back(Err(err));
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl ModelClient for ScriptedModel {
    fn ask(&self, prompt: &str, cancel: Option<&CancelFlag>) -> Result<String, ModelError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if cancel.is_some_and(CancelFlag::is_set) {
            return Err(ModelError::Cancelled);
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(ModelError::EmptyResponse))
    }
}

/// Resolves `(T, A)` to `uri:T:A` and records every call.
#[derive(Default)]
pub struct RecordingCatalog {
    /// `None` resolves everything.
    known: Option<HashSet<(String, String)>>,
    fail_enqueue: bool,
    fail_play: bool,
    pub resolved: Mutex<Vec<(String, String)>>,
    pub enqueued: Mutex<Vec<String>>,
    pub played: Mutex<Vec<String>>,
    pub current: Mutex<Option<TrackRef>>,
    pub transports: Mutex<Vec<Transport>>,
}

impl RecordingCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn only(tracks: &[(&str, &str)]) -> Self {
        Self {
            known: Some(
                tracks
                    .iter()
                    .map(|(t, a)| ((*t).to_string(), (*a).to_string()))
                    .collect(),
            ),
            ..Self::default()
        }
    }

    pub fn failing_enqueue() -> Self {
        Self {
            fail_enqueue: true,
            ..Self::default()
        }
    }

    pub fn failing_play() -> Self {
        Self {
            fail_play: true,
            ..Self::default()
        }
    }

    pub fn uri(track_name: &str, artist_name: &str) -> String {
        format!("uri:{track_name}:{artist_name}")
    }

    pub fn enqueued(&self) -> Vec<String> {
        self.enqueued.lock().unwrap().clone()
    }

    pub fn played(&self) -> Vec<String> {
        self.played.lock().unwrap().clone()
    }

    /// Resolve, enqueue and play calls combined.
    pub fn call_count(&self) -> usize {
        self.resolved.lock().unwrap().len()
            + self.enqueued.lock().unwrap().len()
            + self.played.lock().unwrap().len()
    }
}

impl CatalogController for RecordingCatalog {
    fn resolve(&self, track_name: &str, artist_name: &str) -> Result<Option<String>, CatalogError> {
        self.resolved
            .lock()
            .unwrap()
            .push((track_name.to_string(), artist_name.to_string()));
        let found = self.known.as_ref().map_or(true, |known| {
            known.contains(&(track_name.to_string(), artist_name.to_string()))
        });
        Ok(found.then(|| Self::uri(track_name, artist_name)))
    }

    fn enqueue(&self, identifier: &str) -> Result<(), CatalogError> {
        self.enqueued.lock().unwrap().push(identifier.to_string());
        if self.fail_enqueue {
            return Err(CatalogError::CommandFailed("enqueue refused".to_string()));
        }
        Ok(())
    }

    fn play_now(&self, identifier: &str) -> Result<(), CatalogError> {
        self.played.lock().unwrap().push(identifier.to_string());
        if self.fail_play {
            return Err(CatalogError::Unavailable("player offline".to_string()));
        }
        Ok(())
    }

    fn current_track(&self) -> Result<Option<TrackRef>, CatalogError> {
        Ok(self.current.lock().unwrap().clone())
    }

    fn transport(&self, action: Transport) -> Result<(), CatalogError> {
        self.transports.lock().unwrap().push(action);
        Ok(())
    }
}

/// JSON array of `count` batch items `S{i}` by `A{i}`.
pub fn batch_json(count: usize) -> String {
    let items: Vec<String> = (0..count)
        .map(|i| format!(r#"{{"track_name": "S{i}", "artist_name": "A{i}"}}"#))
        .collect();
    format!("[{}]", items.join(","))
}
