use crate::model::Timeline;

const EPSILON: f64 = 1e-10;

/// Speech-unit boundary hints from forced alignment (start times in seconds).
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct AlignmentData {
    pub boundaries: Vec<f64>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PacingReport {
    pub valid: bool,
    pub issues: Vec<String>,
}

/// Extends any segment shorter than `min_duration` so it stays on screen for
/// at least that long. Ends are pushed forward; subsequent segments are not
/// shifted or compressed, so an extension can create an overlap with its
/// successor. That overlap is left in place for the transition planner,
/// which treats it as a crossfade window.
pub fn dead_zone_merge(timeline: &mut Timeline, min_duration: f64) {
    for seg in &mut timeline.segments {
        if seg.duration() < min_duration {
            tracing::debug!(
                segment = %seg.id,
                from = seg.duration(),
                to = min_duration,
                "extending dead-zone segment"
            );
            seg.end = seg.start + min_duration;
        }
    }
}

/// Applies the visibility floor. Alignment-aware snapping to speech-unit
/// boundaries is accepted structurally; the reference behavior only enforces
/// the floor.
pub fn syllable_snap(timeline: &mut Timeline, _alignment: &AlignmentData, min_visibility: f64) {
    for seg in &mut timeline.segments {
        if seg.duration() < min_visibility {
            seg.end = seg.start + min_visibility;
        }
    }
}

/// Pure acceptance gate. Must be re-run after any timeline transformation;
/// a segment fails if its duration is below the combined floor, with a small
/// tolerance for floating-point noise.
pub fn validate_pacing(timeline: &Timeline, min_duration: f64, min_visibility: f64) -> PacingReport {
    let floor = min_duration.max(min_visibility);
    let mut issues = Vec::new();

    for seg in &timeline.segments {
        if seg.duration() < floor - EPSILON {
            issues.push(format!(
                "segment '{}' duration {:.4}s is below the {:.4}s floor",
                seg.id,
                seg.duration(),
                floor
            ));
        }
    }

    PacingReport {
        valid: issues.is_empty(),
        issues,
    }
}
