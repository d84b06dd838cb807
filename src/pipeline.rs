//! The per-frame alignment pass.
//!
//! Each call to [`AlignmentPipeline::process`] takes one frame's landmark
//! payload and blob detections and returns a [`FrameReport`]. The pass is
//! synchronous and touches no shared state: the only thing it mutates is
//! the pipeline's own active profile, when the frame is a calibration
//! frame. Dispatching the report to a UI is left to the caller.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::alignment::{is_aligned, max_offset};
use crate::calibration::{CalibrationProfile, CalibrationTrigger};
use crate::candidates::{eye_level, order_markers, CandidateFilter};
use crate::config::PipelineConfig;
use crate::distance::{box_area_ratio, evaluate_distance, DistanceFeedback};
use crate::error::{Error, Result};
use crate::relative::project_vectors;
use crate::store::{KeyValueStore, ProfileStore};
use crate::tilt::{estimate_tilt, join_directions, TiltDirection};
use crate::types::{CandidateRect, FacialTriangle, LandmarkPayload, Orientation, Point};

/// Id given to profiles captured by the pipeline. Callers rename them
/// before persisting.
pub const CAPTURED_PROFILE_ID: &str = "current";

pub const NO_FACE_TEXT: &str = "No face detected. Improve lighting or position face well";

/// Everything the external detectors produced for one frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameInput {
    pub landmarks: LandmarkPayload,
    /// Blob rectangles in downscaled coordinates.
    pub candidates: Vec<CandidateRect>,
    pub orientation: Orientation,
}

/// Capture-quality feedback: is the frame usable, and is the face at the
/// calibrated distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureFeedback {
    Ok,
    NoFaceDetected,
    Distance(DistanceFeedback),
}

impl fmt::Display for CaptureFeedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureFeedback::Ok => Ok(()),
            CaptureFeedback::NoFaceDetected => f.write_str(NO_FACE_TEXT),
            CaptureFeedback::Distance(d) => write!(f, "{}", d),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlignmentFeedback {
    Aligned,
    /// The facial triangle matches but the markers are biased.
    TiltNeeded(Vec<TiltDirection>),
    Misaligned,
    /// A different number of markers than at calibration; tilt is not
    /// estimated.
    MarkerCountMismatch {
        triangle_aligned: bool,
        expected: usize,
        found: usize,
    },
}

impl fmt::Display for AlignmentFeedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlignmentFeedback::Aligned => f.write_str("All aligned"),
            AlignmentFeedback::TiltNeeded(directions) => write!(
                f,
                "Facial triangle aligned. Tilt helmet {}",
                join_directions(directions)
            ),
            AlignmentFeedback::Misaligned => f.write_str("Align facial triangle"),
            AlignmentFeedback::MarkerCountMismatch {
                triangle_aligned: true,
                ..
            } => f.write_str("Facial triangle aligned. Incorrect number of markers detected."),
            AlignmentFeedback::MarkerCountMismatch {
                triangle_aligned: false,
                ..
            } => f.write_str("Align facial triangle. Incorrect number of markers detected."),
        }
    }
}

/// The two strings a UI shows for a frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    /// Empty when the frame is fine.
    pub capture_quality: String,
    /// Empty when no comparison ran this frame.
    pub alignment: String,
}

/// Geometry for drawing; nothing here feeds back into the decisions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Overlay {
    pub triangle: Option<FacialTriangle>,
    pub calibrated_triangle: Option<FacialTriangle>,
    /// Surviving marker rectangles, full resolution, in marker order.
    pub marker_rects: Vec<CandidateRect>,
    pub markers: Vec<Point>,
    /// Per-anchor predictions of each calibrated marker on the live face.
    pub projected: Vec<[Point; 3]>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub capture: CaptureFeedback,
    /// `None` when there was no face or no active profile.
    pub alignment: Option<AlignmentFeedback>,
    /// Set on the frame that consumed a calibration request.
    pub calibrated: Option<CalibrationProfile>,
    /// The profile that was active before this frame calibrated.
    pub superseded: Option<CalibrationProfile>,
    pub overlay: Overlay,
}

impl FrameReport {
    fn no_face() -> Self {
        Self {
            capture: CaptureFeedback::NoFaceDetected,
            alignment: None,
            calibrated: None,
            superseded: None,
            overlay: Overlay::default(),
        }
    }

    pub fn feedback(&self) -> Feedback {
        Feedback {
            capture_quality: self.capture.to_string(),
            alignment: self
                .alignment
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
        }
    }
}

/// Per-frame alignment against an optional active calibration profile.
#[derive(Debug, Clone)]
pub struct AlignmentPipeline {
    config: PipelineConfig,
    filter: CandidateFilter,
    profile: Option<CalibrationProfile>,
}

impl AlignmentPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            filter: CandidateFilter::new(config.candidates.clone()),
            config,
            profile: None,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn profile(&self) -> Option<&CalibrationProfile> {
        self.profile.as_ref()
    }

    /// Replace the active profile, returning the previous one.
    pub fn set_profile(
        &mut self,
        profile: Option<CalibrationProfile>,
    ) -> Option<CalibrationProfile> {
        std::mem::replace(&mut self.profile, profile)
    }

    /// Process a frame, calibrating if the trigger has a pending request.
    ///
    /// The request is only consumed by a frame with a face, so a request
    /// made while the face is out of view waits for the next usable frame.
    pub fn process_with_trigger(
        &mut self,
        frame: &FrameInput,
        trigger: &CalibrationTrigger,
    ) -> FrameReport {
        let calibrate = frame.landmarks.anchors().is_some() && trigger.take();
        self.process(frame, calibrate)
    }

    pub fn process(&mut self, frame: &FrameInput, calibrate: bool) -> FrameReport {
        let Some(anchors) = frame.landmarks.anchors() else {
            tracing::debug!("no face in frame");
            return FrameReport::no_face();
        };
        let orientation = frame.orientation;
        let box_area = frame.landmarks.box_area();

        let level = eye_level(&anchors, orientation, self.config.candidates.eye_level_offset)
            .unwrap_or(0.0);
        let mut markers = self.filter.filter(&frame.candidates, orientation, level);
        order_markers(&mut markers, orientation);
        let points: Vec<Point> = markers.iter().map(|m| m.point).collect();

        let mut report = FrameReport {
            capture: CaptureFeedback::Ok,
            alignment: None,
            calibrated: None,
            superseded: None,
            overlay: Overlay {
                triangle: Some(anchors.triangle()),
                marker_rects: markers.iter().map(|m| m.rect).collect(),
                markers: points.clone(),
                ..Overlay::default()
            },
        };

        if calibrate {
            let profile =
                CalibrationProfile::capture(CAPTURED_PROFILE_ID, anchors, box_area, &points);
            tracing::info!(
                markers = profile.marker_count(),
                box_area = ?box_area,
                "captured calibration"
            );
            report.superseded = self.profile.replace(profile.clone());
            report.calibrated = Some(profile);
        }

        let Some(profile) = &self.profile else {
            return report;
        };

        let current = anchors.triangle();
        let calibrated = profile.anchors.triangle();
        let tolerance = self.config.triangle_tolerance_px;
        let triangle_aligned = is_aligned(&current, &calibrated, tolerance);
        if !triangle_aligned {
            tracing::debug!(
                offset_px = max_offset(&current, &calibrated),
                tolerance_px = tolerance,
                "facial triangle outside tolerance"
            );
        }

        report.alignment = match estimate_tilt(
            &points,
            &profile.relative_vectors,
            &anchors,
            &self.config.tilt_threshold,
        ) {
            Err(Error::MarkerCountMismatch { expected, found }) => {
                tracing::debug!(expected, found, "marker count differs from calibration");
                Some(AlignmentFeedback::MarkerCountMismatch {
                    triangle_aligned,
                    expected,
                    found,
                })
            }
            Err(e) => {
                tracing::error!(error = %e, "tilt estimation failed");
                None
            }
            Ok(_) if !triangle_aligned => Some(AlignmentFeedback::Misaligned),
            Ok(directions) if directions.is_empty() => Some(AlignmentFeedback::Aligned),
            Ok(directions) => Some(AlignmentFeedback::TiltNeeded(directions)),
        };

        let ratio = box_area
            .zip(profile.box_area)
            .and_then(|(current, calibrated)| box_area_ratio(current, calibrated));
        if let Some(ratio) = ratio {
            let distance = evaluate_distance(ratio, self.config.distance_threshold);
            if !distance.is_good() {
                report.capture = CaptureFeedback::Distance(distance);
            }
        }

        report.overlay.calibrated_triangle = Some(profile.anchors.triangle());
        report.overlay.projected = project_vectors(&profile.relative_vectors, &anchors);
        report
    }

    /// Persist the profile captured on `report`'s frame under `id`.
    ///
    /// On success the active profile and `report.calibrated` carry the new
    /// id. If the save fails, the profile that was active before the frame
    /// comes back, `report` is recomputed against it, and the error is
    /// returned. A report without a capture is left alone.
    pub fn commit_calibration<S: KeyValueStore>(
        &mut self,
        frame: &FrameInput,
        report: &mut FrameReport,
        id: &str,
        store: &mut ProfileStore<S>,
    ) -> Result<()> {
        let Some(captured) = report.calibrated.take() else {
            return Ok(());
        };
        let profile = captured.renamed(id);

        match store.save(&profile) {
            Ok(()) => {
                self.profile = Some(profile.clone());
                report.calibrated = Some(profile);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(profile = id, error = %e, "restoring previous calibration");
                self.profile = report.superseded.take();
                *report = self.process(frame, false);
                Err(e)
            }
        }
    }
}
