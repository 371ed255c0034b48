//! Host collaborators.
//!
//! The overlay never touches the page, the network or storage itself.
//! Everything it needs from its surroundings comes through the traits in
//! this module, so tests and the CLI can supply fixed rectangles and
//! scripted answers.

use std::collections::HashMap;
use std::time::Duration;

use crate::clock::Clock;
use crate::preset::MeasurementPreset;
use crate::types::ImageBounds;

/// Read-only view of the displayed host image.
pub trait ImageGeometry {
    /// Current image bounds, or `None` if the image is not on screen.
    fn image_bounds(&self) -> Option<ImageBounds>;
}

impl ImageGeometry for ImageBounds {
    fn image_bounds(&self) -> Option<ImageBounds> {
        Some(*self)
    }
}

/// Everything the overlay asks of the host page.
pub trait OverlayHost: ImageGeometry + Clock {
    /// Suppress (or restore) other UI hover behaviour while the user is
    /// interacting with the overlay.
    fn suppress_hover(&mut self, suppressed: bool);

    /// Ask the user a yes/no question through a modal dialog.
    fn confirm(&mut self, message: &str) -> bool;

    /// Show a one-time, non-blocking notice.
    fn notify(&mut self, message: &str);
}

/// Key-value store for client-side preferences.
pub trait PreferenceStore {
    /// Read a stored value.
    fn get(&self, key: &str) -> Option<String>;

    /// Store a value, retained for roughly `ttl`.
    fn set(&mut self, key: &str, value: &str, ttl: Duration);
}

/// In-memory [`PreferenceStore`]. Retention is recorded but not enforced.
#[derive(Debug, Clone, Default)]
pub struct MemoryPreferences {
    values: HashMap<String, (String, Duration)>,
}

impl MemoryPreferences {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Retention requested for `key` on its last write.
    #[must_use]
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        self.values.get(key).map(|(_, ttl)| *ttl)
    }
}

impl PreferenceStore for MemoryPreferences {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).map(|(value, _)| value.clone())
    }

    fn set(&mut self, key: &str, value: &str, ttl: Duration) {
        self.values.insert(key.to_owned(), (value.to_owned(), ttl));
    }
}

/// Per-user persistence of saved presets.
///
/// The real implementation lives behind the host's network layer; the
/// overlay only produces and consumes [`MeasurementPreset`] records.
pub trait PresetStore {
    /// Save a preset for `owner`, returning it with its assigned id.
    fn create(&mut self, owner: &str, preset: MeasurementPreset) -> MeasurementPreset;

    /// All presets saved by `owner`, oldest first.
    fn list(&self, owner: &str) -> Vec<MeasurementPreset>;

    /// Delete a preset. Returns `true` if it existed.
    fn delete(&mut self, owner: &str, id: u64) -> bool;
}

/// In-memory [`PresetStore`].
#[derive(Debug, Clone, Default)]
pub struct MemoryPresetStore {
    next_id: u64,
    by_owner: HashMap<String, Vec<MeasurementPreset>>,
}

impl MemoryPresetStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl PresetStore for MemoryPresetStore {
    fn create(&mut self, owner: &str, mut preset: MeasurementPreset) -> MeasurementPreset {
        self.next_id += 1;
        preset.id = Some(self.next_id);
        self.by_owner
            .entry(owner.to_owned())
            .or_default()
            .push(preset.clone());
        preset
    }

    fn list(&self, owner: &str) -> Vec<MeasurementPreset> {
        self.by_owner.get(owner).cloned().unwrap_or_default()
    }

    fn delete(&mut self, owner: &str, id: u64) -> bool {
        let Some(presets) = self.by_owner.get_mut(owner) else {
            return false;
        };
        let before = presets.len();
        presets.retain(|p| p.id != Some(id));
        presets.len() != before
    }
}
