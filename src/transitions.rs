use crate::{
    expr,
    model::Timeline,
};

/// Names ffmpeg's `xfade` transitions we emit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    Fade,
    Dissolve,
    WipeLeft,
    WipeRight,
}

impl TransitionKind {
    pub fn xfade_name(self) -> &'static str {
        match self {
            Self::Fade => "fade",
            Self::Dissolve => "dissolve",
            Self::WipeLeft => "wipeleft",
            Self::WipeRight => "wiperight",
        }
    }
}

/// Crossfade curve shapes for `acrossfade` (c1/c2).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioCurve {
    Tri,
    Qsin,
    Exp,
}

impl AudioCurve {
    pub fn curve_name(self) -> &'static str {
        match self {
            Self::Tri => "tri",
            Self::Qsin => "qsin",
            Self::Exp => "exp",
        }
    }
}

#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct TransitionPolicy {
    /// Overlaps below this are treated as hard cuts.
    pub min_overlap: f64,
    pub max_duration: f64,
    pub default_duration: f64,
    pub kind: TransitionKind,
    pub audio_curve: AudioCurve,
}

impl Default for TransitionPolicy {
    fn default() -> Self {
        Self {
            min_overlap: 0.1,
            max_duration: 0.5,
            default_duration: 0.25,
            kind: TransitionKind::Fade,
            audio_curve: AudioCurve::Tri,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlannedTransition {
    pub duration: f64,
    pub offset: f64,
    /// True when the segments did not truly overlap. The blend is cosmetic
    /// smoothing anchored near the cut point, not a representation of real
    /// overlap.
    pub hard_cut_smoothing: bool,
}

/// Plans the blend between one adjacent segment pair.
///
/// A real overlap gets a crossfade anchored to the tail of the overlap
/// window. Anything below `min_overlap` still receives a short smoothing
/// blend near the cut, so the output never shows a visible jump-cut.
pub fn plan_pair(policy: &TransitionPolicy, prev_end: f64, curr_start: f64) -> PlannedTransition {
    let overlap = (prev_end - curr_start).max(0.0);

    if overlap >= policy.min_overlap {
        let duration = policy.max_duration.min(overlap);
        let offset = curr_start.max(prev_end - duration);
        PlannedTransition {
            duration,
            offset,
            hard_cut_smoothing: false,
        }
    } else {
        let duration = policy.default_duration.min(policy.max_duration);
        let offset = (prev_end - duration).max(0.0);
        PlannedTransition {
            duration,
            offset,
            hard_cut_smoothing: true,
        }
    }
}

/// Plans the blend for every adjacent pair in timeline order.
pub fn plan_transitions(policy: &TransitionPolicy, timeline: &Timeline) -> Vec<PlannedTransition> {
    timeline
        .segments
        .windows(2)
        .map(|pair| plan_pair(policy, pair[0].end, pair[1].start))
        .collect()
}

/// `xfade` filter body for a planned video blend (two inputs, one output;
/// labels are the caller's concern).
pub fn xfade_filter(policy: &TransitionPolicy, plan: &PlannedTransition) -> String {
    format!(
        "xfade=transition={}:duration={}:offset={}",
        policy.kind.xfade_name(),
        expr::fmt(plan.duration, 3),
        expr::fmt(plan.offset, 3)
    )
}

/// `acrossfade` filter body for the parallel audio blend, emitted only when
/// both segments carry audio.
pub fn acrossfade_filter(policy: &TransitionPolicy, plan: &PlannedTransition) -> String {
    let curve = policy.audio_curve.curve_name();
    format!(
        "acrossfade=d={}:c1={curve}:c2={curve}",
        expr::fmt(plan.duration, 3)
    )
}
