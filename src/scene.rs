//! Scene bindings and click dispatch
//!
//! The host scene supplies clickable model descriptors; tracks are
//! bound to models through an explicit mapping validated when the
//! dispatcher is built, not parsed out of element identifiers at click
//! time. The dispatcher owns the session and turns clicks into the
//! one-shot synchronized start or per-track mute toggles.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, StemloopError};
use crate::session::{AudioSession, TrackManifest};

/// A clickable 3D model element provided by the host scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneModel {
    /// Element identifier
    pub id: String,
    /// World position (x, y, z)
    pub position: [f32; 3],
}

impl SceneModel {
    pub fn new(id: impl Into<String>, position: [f32; 3]) -> Self {
        Self {
            id: id.into(),
            position,
        }
    }
}

/// Registered models plus the explicit model → track mapping
#[derive(Debug, Clone, Default)]
pub struct Scene {
    models: HashMap<String, SceneModel>,
    bindings: HashMap<String, String>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a clickable model
    pub fn add_model(&mut self, model: SceneModel) {
        self.models.insert(model.id.clone(), model);
    }

    /// Bind a model to a track name
    pub fn bind(&mut self, model_id: impl Into<String>, track: impl Into<String>) {
        self.bindings.insert(model_id.into(), track.into());
    }

    pub fn model(&self, model_id: &str) -> Option<&SceneModel> {
        self.models.get(model_id)
    }

    /// The track bound to a model, if any
    pub fn track_for_model(&self, model_id: &str) -> Option<&str> {
        self.bindings.get(model_id).map(String::as_str)
    }

    /// The model a track is bound to, if any
    pub fn model_for_track(&self, track: &str) -> Option<&SceneModel> {
        self.bindings
            .iter()
            .find(|(_, t)| t.as_str() == track)
            .and_then(|(model_id, _)| self.models.get(model_id))
    }

    /// Check the bindings against a manifest
    ///
    /// Every binding must reference a registered model and a manifest
    /// track, and every manifest track must be bound exactly once.
    /// Runs at dispatcher setup so click handling never sees an
    /// unmapped track.
    pub fn validate(&self, manifest: &TrackManifest) -> Result<()> {
        for (model_id, track) in &self.bindings {
            if !self.models.contains_key(model_id) {
                return Err(StemloopError::BindingInvalid {
                    reason: format!("binding references unregistered model '{}'", model_id),
                });
            }
            if !manifest.contains(track) {
                return Err(StemloopError::BindingInvalid {
                    reason: format!(
                        "model '{}' is bound to track '{}' which is not in the manifest",
                        model_id, track
                    ),
                });
            }
        }

        for name in manifest.names() {
            let bound = self.bindings.values().filter(|t| t.as_str() == name).count();
            if bound == 0 {
                return Err(StemloopError::BindingInvalid {
                    reason: format!("manifest track '{}' has no bound model", name),
                });
            }
            if bound > 1 {
                return Err(StemloopError::BindingInvalid {
                    reason: format!("manifest track '{}' is bound to {} models", name, bound),
                });
            }
        }

        Ok(())
    }
}

/// What a click did
#[derive(Debug, Clone, PartialEq)]
pub enum ClickOutcome {
    /// First click: synchronized playback began with this track audible
    Started { audible: String },
    /// Later click: the track's mute state flipped
    Toggled { track: String, gain: f32 },
}

/// Routes model clicks into the session
///
/// Owns the session and the scene. The first click overall starts
/// synchronized playback with the clicked track audible; every later
/// click toggles the clicked track's mute state.
pub struct ClickDispatcher {
    session: AudioSession,
    scene: Scene,
}

impl std::fmt::Debug for ClickDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClickDispatcher")
            .field("scene", &self.scene)
            .finish_non_exhaustive()
    }
}

impl ClickDispatcher {
    /// Build a dispatcher, validating the scene's bindings against the
    /// session manifest
    pub fn new(session: AudioSession, scene: Scene) -> Result<Self> {
        scene.validate(session.manifest())?;
        Ok(Self { session, scene })
    }

    pub fn session(&self) -> &AudioSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut AudioSession {
        &mut self.session
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Handle a click on a model element
    pub async fn handle_click(&mut self, model_id: &str) -> Result<ClickOutcome> {
        let track = self
            .scene
            .track_for_model(model_id)
            .ok_or_else(|| StemloopError::ModelNotBound {
                model_id: model_id.to_string(),
            })?
            .to_string();

        debug!(model = model_id, track = %track, "click");

        if !self.session.is_started() {
            self.session.start_all(&track, &self.scene).await?;
            Ok(ClickOutcome::Started { audible: track })
        } else {
            let gain = self.session.toggle_track(&track)?;
            Ok(ClickOutcome::Toggled { track, gain })
        }
    }
}
