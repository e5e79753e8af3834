use std::{collections::BTreeMap, path::PathBuf};

use crate::{
    error::{ReelError, ReelResult},
    transitions::TransitionPolicy,
};

/// Ordered shot list driving the filtergraph compiler.
///
/// Segments are absolute-time placements; the pacing normalizer may push a
/// segment's end forward but nothing ever reorders the list.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct Timeline {
    pub segments: Vec<Segment>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Segment {
    pub id: String,
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub section: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animation: Option<AnimationSpec>,
}

impl Segment {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Reference to an animation template plus its parameters.
///
/// `template_id` is resolved against the catalog at compile time; an unknown
/// id is skipped with a warning, never a hard failure.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct AnimationSpec {
    pub template_id: String,
    #[serde(default)]
    pub focus: Vec<String>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub params: serde_json::Value,
}

/// Maps focus-target ids to asset file paths.
pub type AssetManifest = BTreeMap<String, PathBuf>;

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Caption {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// One render invocation. Not persisted beyond the call except through the
/// checkpoint file.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct RenderJob {
    pub images: Vec<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narration_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bgm_file: Option<PathBuf>,
    #[serde(default)]
    pub captions: Vec<Caption>,
    pub output_dir: PathBuf,
    pub duration: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeline: Option<Timeline>,
    #[serde(default)]
    pub assets: AssetManifest,
}

#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct DuckingConfig {
    /// Sidechain trigger level, linear (0..1).
    pub threshold: f64,
    pub ratio: f64,
    pub attack_ms: f64,
    pub release_ms: f64,
}

impl Default for DuckingConfig {
    fn default() -> Self {
        // Gentle ratio and a long release keep bgm from audibly pumping
        // between narration phrases.
        Self {
            threshold: 0.05,
            ratio: 4.0,
            attack_ms: 20.0,
            release_ms: 600.0,
        }
    }
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct RenderOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_seconds: Option<f64>,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub burn_captions: bool,
    #[serde(default)]
    pub export_srt: bool,
    #[serde(default)]
    pub ducking: DuckingConfig,
    #[serde(default)]
    pub transition: TransitionPolicy,
    /// Shortest acceptable on-screen time for a timeline segment; anything
    /// under it is extended before compiling.
    pub min_segment_seconds: f64,
    pub min_visibility_seconds: f64,
    pub timeout_ms: u64,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            preview_seconds: None,
            dry_run: false,
            burn_captions: false,
            export_srt: false,
            ducking: DuckingConfig::default(),
            transition: TransitionPolicy::default(),
            min_segment_seconds: 1.0,
            min_visibility_seconds: 0.5,
            timeout_ms: 600_000,
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RenderResult {
    pub output_path: PathBuf,
    pub thumbnail_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption_path: Option<PathBuf>,
    pub metadata: RenderMetadata,
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RenderMetadata {
    pub duration: f64,
    pub fps: u32,
}

/// Per-status-line progress snapshot. Transient, never persisted as-is.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ProgressInfo {
    pub percent: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta_seconds: Option<f64>,
    pub speed: f64,
    pub frame: u64,
    pub time_seconds: f64,
}

impl Timeline {
    pub fn validate(&self) -> ReelResult<()> {
        let mut prev_start = f64::NEG_INFINITY;
        for seg in &self.segments {
            if seg.end <= seg.start {
                return Err(ReelError::validation(format!(
                    "segment '{}' has end <= start ({} <= {})",
                    seg.id, seg.end, seg.start
                )));
            }
            if seg.start < prev_start {
                return Err(ReelError::validation(format!(
                    "segment '{}' is out of time order",
                    seg.id
                )));
            }
            prev_start = seg.start;
        }
        Ok(())
    }
}

impl RenderJob {
    pub fn has_audio(&self) -> bool {
        self.audio_file.is_some() || self.narration_file.is_some() || self.bgm_file.is_some()
    }

    /// Fail-fast input check. Runs synchronously before any I/O or process
    /// is started; an invalid job produces zero side effects.
    pub fn validate(&self) -> ReelResult<()> {
        if self.images.is_empty() {
            return Err(ReelError::validation("No images provided for rendering"));
        }
        if !self.has_audio() {
            return Err(ReelError::validation("No audio source provided"));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(ReelError::validation("Output directory must not be empty"));
        }
        if self.duration <= 0.0 {
            return Err(ReelError::validation("Job duration must be > 0"));
        }
        if let Some(tl) = &self.timeline {
            tl.validate()?;
        }
        Ok(())
    }
}
