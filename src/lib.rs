//! # marker-fit
//!
//! Per-frame geometry for fitting a head-mounted device with colour markers.
//!
//! This crate provides:
//! - **Candidate filtering**: turn blob rectangles from a downscaled frame into
//!   an ordered list of marker points on the right side of the eye line
//! - **Relative vectors**: store markers as offsets from the eyes and lower
//!   nose, and predict where they should be on a face that has moved
//! - **Alignment checks**: compare the live eye/nose triangle against the
//!   calibrated one within a pixel tolerance
//! - **Feedback**: tilt directions from the averaged signed marker error, and
//!   distance directions from the face bounding box area
//!
//! Landmark detection, colour segmentation and drawing are done elsewhere.
//! This crate only sees their outputs: a [`LandmarkPayload`] and a list of
//! [`CandidateRect`]s per frame.
//!
//! ## Pipeline Overview
//!
//! 1. Read the anchors (eye centres, lower nose centre). No anchors means no
//!    face, and the frame stops here.
//! 2. Filter and order marker candidates against the eye line.
//! 3. On a calibration frame, store anchors, box area and relative vectors.
//! 4. With an active profile, check the facial triangle, estimate tilt when
//!    the marker count matches, and compare box areas.
//! 5. Return a [`FrameReport`] with two feedback strings and overlay geometry.
//!
//! ## Quick Start
//!
//! ```rust
//! use marker_fit::{
//!     AlignmentPipeline, CandidateRect, FrameInput, LandmarkPayload, Orientation,
//!     PipelineConfig, Point,
//! };
//!
//! let mut pipeline = AlignmentPipeline::new(PipelineConfig::default()).unwrap();
//!
//! let frame = FrameInput {
//!     landmarks: LandmarkPayload {
//!         left_eye_center: Some(Point::new(100.0, 100.0)),
//!         right_eye_center: Some(Point::new(200.0, 100.0)),
//!         nose_lower_center: Some(Point::new(150.0, 150.0)),
//!         bounding_box_area: Some(12_000.0),
//!         ..Default::default()
//!     },
//!     // Detections from a frame downscaled 4x.
//!     candidates: vec![
//!         CandidateRect::new(29.0, 19.0, 2.0, 2.0),
//!         CandidateRect::new(44.0, 19.0, 2.0, 2.0),
//!     ],
//!     orientation: Orientation::LandscapeRight,
//! };
//!
//! // Calibrate on the first frame, then compare later frames against it.
//! let report = pipeline.process(&frame, true);
//! assert!(report.calibrated.is_some());
//!
//! let report = pipeline.process(&frame, false);
//! assert_eq!(report.feedback().alignment, "All aligned");
//! ```
//!
//! ## Persisting Profiles
//!
//! [`ProfileStore`] writes profiles to any [`KeyValueStore`]. The crate
//! ships [`MemoryStore`] and [`JsonFileStore`]:
//!
//! ```rust
//! use marker_fit::{AnchorSet, CalibrationProfile, MemoryStore, Point, ProfileStore};
//!
//! let anchors = AnchorSet::new(
//!     Point::new(100.0, 100.0),
//!     Point::new(200.0, 100.0),
//!     Point::new(150.0, 150.0),
//! );
//! let profile = CalibrationProfile::capture("helmet", anchors, Some(12_000.0), &[]);
//!
//! let mut store = ProfileStore::new(MemoryStore::new());
//! store.save(&profile).unwrap();
//! assert_eq!(store.load("helmet").unwrap(), Some(profile));
//! ```

mod alignment;
mod calibration;
mod candidates;
mod config;
mod distance;
mod error;
mod geometry;
mod pipeline;
mod relative;
mod store;
mod tilt;
mod types;

pub use alignment::{is_aligned, max_offset};
pub use calibration::{CalibrationProfile, CalibrationTrigger, ProfileRegistry};
pub use candidates::{eye_level, order_markers, CandidateFilter, Marker};
pub use config::{
    CandidateConfig, PipelineConfig, TiltThreshold, DEFAULT_DISTANCE_THRESHOLD,
    DEFAULT_EYE_LEVEL_OFFSET, DEFAULT_MAX_CANDIDATE_AREA, DEFAULT_MAX_MARKERS,
    DEFAULT_MIN_CANDIDATE_AREA, DEFAULT_TILT_THRESHOLD_FRACTION, DEFAULT_TILT_THRESHOLD_PX,
    DEFAULT_TRIANGLE_TOLERANCE_PX, DEFAULT_UPSCALE_FACTOR,
};
pub use distance::{box_area_ratio, evaluate_distance, DistanceFeedback};
pub use error::{Error, Result};
pub use geometry::{centroid, distance, subtract};
pub use pipeline::{
    AlignmentFeedback, AlignmentPipeline, CaptureFeedback, Feedback, FrameInput, FrameReport,
    Overlay, CAPTURED_PROFILE_ID, NO_FACE_TEXT,
};
pub use relative::{compute_vectors, project_vectors, reconstruct_expected, RelativeVectorSet};
pub use store::{JsonFileStore, KeyValueStore, MemoryStore, ProfileStore};
pub use tilt::{estimate_tilt, join_directions, TiltDirection, TiltError};
pub use types::{AnchorSet, CandidateRect, FacialTriangle, LandmarkPayload, Orientation, Point};
