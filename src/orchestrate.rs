use std::{
    path::Path,
    time::Duration,
};

use crate::{
    checkpoint::{CheckpointStore, RenderStage},
    compile::{self, AudioMix, CompiledProgram},
    error::ReelResult,
    expr,
    model::{ProgressInfo, RenderJob, RenderMetadata, RenderOptions, RenderResult},
    pacing::{self, AlignmentData},
    srt,
    supervise::ProcessSupervisor,
};

pub const FPS: u32 = 30;
pub const FRAME_W: u32 = 1920;
pub const FRAME_H: u32 = 1080;

/// Drives one render job end to end: validate, compile, spawn the renderer,
/// extract a thumbnail, write caption sidecars, and keep the checkpoint file
/// current so an interrupted job can resume.
#[derive(Debug)]
pub struct RenderOrchestrator {
    ffmpeg: String,
    grace: Duration,
}

impl Default for RenderOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderOrchestrator {
    pub fn new() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            grace: Duration::from_secs(3),
        }
    }

    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            ffmpeg: binary.into(),
            ..Self::new()
        }
    }

    pub async fn render<F>(
        &self,
        job_id: &str,
        job: &RenderJob,
        options: &RenderOptions,
        mut on_progress: F,
    ) -> ReelResult<RenderResult>
    where
        F: FnMut(ProgressInfo),
    {
        job.validate()?;

        // Dry runs stop here: same validation, zero side effects, a stable
        // synthetic result.
        if options.dry_run {
            tracing::info!(job_id, "dry run, skipping execution");
            return Ok(RenderResult {
                output_path: job.output_dir.join("preview.mp4"),
                thumbnail_path: job.output_dir.join("thumbnail.jpg"),
                caption_path: None,
                metadata: RenderMetadata {
                    duration: 30.0,
                    fps: FPS,
                },
            });
        }

        tokio::fs::create_dir_all(&job.output_dir)
            .await
            .map_err(|e| {
                crate::error::ReelError::checkpoint(format!(
                    "failed to create {}: {e}",
                    job.output_dir.display()
                ))
            })?;

        let mut checkpoint = CheckpointStore::new(job_id, &job.output_dir);
        let resumed = checkpoint.load()?;
        if resumed {
            tracing::info!(
                job_id,
                stage = ?checkpoint.state().stage,
                "resuming from checkpoint"
            );
        } else {
            checkpoint.initialize()?;
        }

        let total_secs = effective_duration(job, options);
        let program = self.compile_job(job, options)?;
        if !checkpoint.is_stage_completed(RenderStage::Compiled) {
            checkpoint.update_stage(RenderStage::Compiled, 10)?;
        }

        let output_path = job.output_dir.join(if options.preview_seconds.is_some() {
            "preview.mp4"
        } else {
            "video.mp4"
        });

        let caption_path = if (options.export_srt || options.burn_captions)
            && !job.captions.is_empty()
        {
            Some(srt::write_srt(&job.captions, &job.output_dir)?)
        } else {
            None
        };

        if checkpoint.is_stage_completed(RenderStage::Rendered) && output_path.exists() {
            tracing::info!(job_id, "render stage already complete, skipping");
        } else {
            let args = build_render_args(
                &program,
                options,
                caption_path.as_deref().filter(|_| options.burn_captions),
                &output_path,
            );
            let mut supervisor = ProcessSupervisor::with_grace(self.grace);
            supervisor
                .run(&self.ffmpeg, &args, total_secs, options.timeout_ms, |p| {
                    on_progress(p)
                })
                .await?;
            let size = std::fs::metadata(&output_path).map(|m| m.len()).unwrap_or(0);
            let hash = crate::checkpoint::hash_file_sha256(&output_path).ok();
            checkpoint.update_stage(RenderStage::Rendered, 85)?;
            checkpoint.add_artifact("video", output_path.clone(), size, hash)?;
        }

        let thumbnail_path = job.output_dir.join("thumbnail.jpg");
        if checkpoint.is_stage_completed(RenderStage::ThumbnailExtracted)
            && thumbnail_path.exists()
        {
            tracing::info!(job_id, "thumbnail stage already complete, skipping");
        } else {
            let args = thumbnail_args(&output_path, &thumbnail_path);
            let mut supervisor = ProcessSupervisor::with_grace(self.grace);
            supervisor
                .run(&self.ffmpeg, &args, 0.0, options.timeout_ms, |_| {})
                .await?;
            checkpoint.update_stage(RenderStage::ThumbnailExtracted, 95)?;
        }

        checkpoint.mark_completed()?;
        checkpoint.cleanup()?;

        Ok(RenderResult {
            output_path,
            thumbnail_path,
            caption_path: caption_path.filter(|_| options.export_srt),
            metadata: RenderMetadata {
                duration: total_secs,
                fps: FPS,
            },
        })
    }

    /// Pure compilation half. A job with an authored timeline is pacing
    /// normalized, gated, then composed over its first image; a bare image
    /// list becomes a slideshow. In preview mode the slideshow keeps only
    /// enough shots to cover the window.
    pub fn compile_job(&self, job: &RenderJob, options: &RenderOptions) -> ReelResult<CompiledProgram> {
        let audio = AudioMix {
            primary: job.audio_file.clone(),
            narration: job.narration_file.clone(),
            bgm: job.bgm_file.clone(),
            ducking: options.ducking,
        };

        if let Some(timeline) = &job.timeline {
            let mut timeline = timeline.clone();
            pacing::dead_zone_merge(&mut timeline, options.min_segment_seconds);
            pacing::syllable_snap(
                &mut timeline,
                &AlignmentData::default(),
                options.min_visibility_seconds,
            );
            // The gate re-runs after every transformation; a timeline that
            // still carries a dead zone here never reaches the compiler.
            let report = pacing::validate_pacing(
                &timeline,
                options.min_segment_seconds,
                options.min_visibility_seconds,
            );
            if !report.valid {
                return Err(crate::error::ReelError::validation(report.issues.join("; ")));
            }
            compile::compile(&timeline, &job.assets, &job.images[0], FRAME_W, FRAME_H, &audio)
        } else {
            let per_image = job.duration / job.images.len() as f64;
            let keep = match options.preview_seconds {
                Some(preview) if preview < job.duration => {
                    ((preview / per_image).ceil() as usize).clamp(1, job.images.len())
                }
                _ => job.images.len(),
            };
            compile::compile_slideshow(
                &job.images[..keep],
                per_image,
                FRAME_W,
                FRAME_H,
                &audio,
                &options.transition,
            )
        }
    }
}

fn effective_duration(job: &RenderJob, options: &RenderOptions) -> f64 {
    match options.preview_seconds {
        Some(preview) => preview.min(job.duration),
        None => job.duration,
    }
}

/// Full ffmpeg argv for one render. Shared between full and preview mode;
/// preview adds a `-t` cap while full mode ends at the shortest stream.
pub fn build_render_args(
    program: &CompiledProgram,
    options: &RenderOptions,
    burn_srt: Option<&Path>,
    out_path: &Path,
) -> Vec<String> {
    let mut args = vec!["-y".to_string()];

    for input in &program.inputs {
        if input.loop_image {
            args.push("-loop".to_string());
            args.push("1".to_string());
            if let Some(duration) = input.duration {
                args.push("-t".to_string());
                args.push(expr::fmt(duration, 3));
            }
        }
        args.push("-i".to_string());
        args.push(input.path.to_string_lossy().into_owned());
    }

    let mut graph = program.filtergraph.clone();
    let mut video_label = program.output_label.clone();
    if let Some(srt_path) = burn_srt {
        let escaped = expr::escape_text(&srt_path.to_string_lossy());
        let burned = format!("{video_label}srt");
        graph = format!("{graph};[{video_label}]subtitles='{escaped}'[{burned}]");
        video_label = burned;
    }

    args.push("-filter_complex".to_string());
    args.push(graph);
    args.push("-map".to_string());
    args.push(format!("[{video_label}]"));

    if let Some(audio_label) = &program.audio_label {
        args.push("-map".to_string());
        args.push(format!("[{audio_label}]"));
        args.push("-c:a".to_string());
        args.push("aac".to_string());
        args.push("-b:a".to_string());
        args.push("192k".to_string());
    }

    args.push("-c:v".to_string());
    args.push("libx264".to_string());
    args.push("-pix_fmt".to_string());
    args.push("yuv420p".to_string());
    args.push("-r".to_string());
    args.push(FPS.to_string());

    match options.preview_seconds {
        Some(preview) => {
            args.push("-t".to_string());
            args.push(expr::fmt(preview, 3));
        }
        None => args.push("-shortest".to_string()),
    }

    args.push(out_path.to_string_lossy().into_owned());
    args
}

/// Argv for the short-lived thumbnail extraction process.
pub fn thumbnail_args(video_path: &Path, thumb_path: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-ss".to_string(),
        "1".to_string(),
        "-i".to_string(),
        video_path.to_string_lossy().into_owned(),
        "-frames:v".to_string(),
        "1".to_string(),
        "-q:v".to_string(),
        "2".to_string(),
        thumb_path.to_string_lossy().into_owned(),
    ]
}
