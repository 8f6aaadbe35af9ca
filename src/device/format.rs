//! Capture format negotiation

use super::types::{CameraFormat, FormatConstraints};
use std::cmp::Ordering;
use tracing::{debug, info};

/// Aspect ratios closer than this are treated as equal
const ASPECT_RATIO_TOLERANCE: f64 = 0.01;

/// Pick the format that best satisfies `constraints`.
///
/// Constraints are applied in priority order: matching aspect ratio first, then
/// the closest pixel count to the requested resolution, then support for the
/// requested frame rate. Remaining ties go to the higher maximum frame rate.
pub fn negotiate_format(
    formats: &[CameraFormat],
    constraints: &FormatConstraints,
) -> Option<CameraFormat> {
    let best = formats
        .iter()
        .min_by(|a, b| compare_formats(a, b, constraints))
        .copied();

    match &best {
        Some(format) => info!(
            resolution = %format.resolution,
            min_fps = format.min_fps,
            max_fps = format.max_fps,
            "Negotiated capture format"
        ),
        None => debug!("Device advertised no formats, nothing to negotiate"),
    }

    best
}

fn aspect_mismatch(format: &CameraFormat, constraints: &FormatConstraints) -> bool {
    (format.resolution.aspect_ratio() - constraints.aspect_ratio).abs() > ASPECT_RATIO_TOLERANCE
}

fn resolution_distance(format: &CameraFormat, constraints: &FormatConstraints) -> u64 {
    format
        .resolution
        .pixels()
        .abs_diff(constraints.resolution.pixels())
}

fn compare_formats(a: &CameraFormat, b: &CameraFormat, constraints: &FormatConstraints) -> Ordering {
    aspect_mismatch(a, constraints)
        .cmp(&aspect_mismatch(b, constraints))
        .then_with(|| resolution_distance(a, constraints).cmp(&resolution_distance(b, constraints)))
        .then_with(|| {
            (!a.supports_fps(constraints.fps)).cmp(&!b.supports_fps(constraints.fps))
        })
        .then_with(|| b.max_fps.cmp(&a.max_fps))
}
