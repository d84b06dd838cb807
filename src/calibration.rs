//! Calibration profiles and the request flag that captures them.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::relative::{compute_vectors, RelativeVectorSet};
use crate::types::{AnchorSet, Point};

/// Reference state captured at calibration time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationProfile {
    pub id: String,
    pub anchors: AnchorSet,
    /// Face bounding box area, if the detector reported one.
    pub box_area: Option<f32>,
    pub relative_vectors: Vec<RelativeVectorSet>,
}

impl CalibrationProfile {
    /// Capture a profile from one frame's anchors and ordered markers.
    pub fn capture(
        id: impl Into<String>,
        anchors: AnchorSet,
        box_area: Option<f32>,
        markers: &[Point],
    ) -> Self {
        Self {
            id: id.into(),
            anchors,
            box_area,
            relative_vectors: compute_vectors(markers, &anchors),
        }
    }

    pub fn marker_count(&self) -> usize {
        self.relative_vectors.len()
    }

    /// Same profile under a different id.
    pub fn renamed(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

/// One-shot calibration request shared between the UI and the pipeline.
///
/// Clones share the same flag. [`take`](Self::take) clears the flag as it
/// reads it, so each request is consumed by at most one frame.
#[derive(Debug, Clone, Default)]
pub struct CalibrationTrigger {
    requested: Arc<AtomicBool>,
}

impl CalibrationTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::Release);
    }

    pub fn is_pending(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    pub fn take(&self) -> bool {
        self.requested.swap(false, Ordering::AcqRel)
    }
}

/// Named profiles held in memory, at most one of them active.
#[derive(Debug, Clone, Default)]
pub struct ProfileRegistry {
    profiles: BTreeMap<String, CalibrationProfile>,
    active: Option<String>,
}

impl ProfileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a profile. Replacing does not change which
    /// profile is active.
    pub fn insert(&mut self, profile: CalibrationProfile) {
        self.profiles.insert(profile.id.clone(), profile);
    }

    /// Insert a profile and make it the active one.
    pub fn activate(&mut self, profile: CalibrationProfile) {
        self.active = Some(profile.id.clone());
        self.insert(profile);
    }

    /// Select the active profile by id. Returns `false` for an unknown id,
    /// leaving the previous selection untouched.
    pub fn select(&mut self, id: &str) -> bool {
        if self.profiles.contains_key(id) {
            self.active = Some(id.to_string());
            true
        } else {
            false
        }
    }

    /// Remove a profile. Removing the active profile leaves none active.
    pub fn remove(&mut self, id: &str) -> Option<CalibrationProfile> {
        let removed = self.profiles.remove(id);
        if self.active.as_deref() == Some(id) {
            self.active = None;
        }
        removed
    }

    pub fn get(&self, id: &str) -> Option<&CalibrationProfile> {
        self.profiles.get(id)
    }

    pub fn active(&self) -> Option<&CalibrationProfile> {
        self.active.as_deref().and_then(|id| self.profiles.get(id))
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(id: &str) -> CalibrationProfile {
        let anchors = AnchorSet::new(
            Point::new(100.0, 100.0),
            Point::new(200.0, 100.0),
            Point::new(150.0, 150.0),
        );
        CalibrationProfile::capture(
            id,
            anchors,
            Some(10_000.0),
            &[Point::new(120.0, 80.0), Point::new(180.0, 80.0)],
        )
    }

    #[test]
    fn capture_stores_one_vector_set_per_marker() {
        let p = profile("a");
        assert_eq!(p.marker_count(), 2);
        assert_eq!(p.relative_vectors[0].from_left_eye, Point::new(20.0, -20.0));
    }

    #[test]
    fn trigger_is_consumed_once() {
        let ui = CalibrationTrigger::new();
        let pipeline = ui.clone();

        assert!(!pipeline.take());
        ui.request();
        assert!(pipeline.is_pending());
        assert!(pipeline.take());
        assert!(!pipeline.take());
        assert!(!ui.is_pending());
    }

    #[test]
    fn trigger_works_across_threads() {
        let trigger = CalibrationTrigger::new();
        let remote = trigger.clone();
        std::thread::spawn(move || remote.request()).join().unwrap();
        assert!(trigger.take());
    }

    #[test]
    fn registry_selects_and_removes() {
        let mut registry = ProfileRegistry::new();
        assert!(registry.active().is_none());

        registry.insert(profile("a"));
        registry.activate(profile("b"));
        assert_eq!(registry.active_id(), Some("b"));
        assert_eq!(registry.len(), 2);

        assert!(registry.select("a"));
        assert_eq!(registry.active().map(|p| p.id.as_str()), Some("a"));

        assert!(!registry.select("missing"));
        assert_eq!(registry.active_id(), Some("a"));

        registry.remove("a");
        assert!(registry.active().is_none());
        assert_eq!(registry.ids().collect::<Vec<_>>(), vec!["b"]);
    }

    #[test]
    fn profile_serializes_with_camel_case_keys() {
        let json = serde_json::to_value(profile("x")).unwrap();
        assert!(json.get("boxArea").is_some());
        assert!(json.get("relativeVectors").is_some());
        assert!(json["anchors"].get("leftEyeCenter").is_some());
    }
}
