use std::path::{Path, PathBuf};

use crate::{
    error::{ReelError, ReelResult},
    model::Caption,
};

/// Seconds to an SRT timecode, `HH:MM:SS,mmm`.
pub fn format_timecode(secs: f64) -> String {
    let secs = secs.max(0.0);
    let total_millis = (secs * 1000.0).round() as u64;
    let hours = total_millis / 3_600_000;
    let minutes = (total_millis / 60_000) % 60;
    let seconds = (total_millis / 1000) % 60;
    let millis = total_millis % 1000;
    format!("{hours:02}:{minutes:02}:{seconds:02},{millis:03}")
}

/// Renders captions as a SubRip document. Cue numbering starts at 1 and
/// internal newlines in caption text collapse to spaces so each cue stays a
/// single line.
pub fn render_srt(captions: &[Caption]) -> String {
    let mut out = String::new();
    for (i, caption) in captions.iter().enumerate() {
        let text = caption
            .text
            .split(['\n', '\r'])
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        out.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            i + 1,
            format_timecode(caption.start),
            format_timecode(caption.end),
            text
        ));
    }
    out
}

/// Writes `captions.srt` into `dir` and reports its path.
pub fn write_srt(captions: &[Caption], dir: &Path) -> ReelResult<PathBuf> {
    let path = dir.join("captions.srt");
    std::fs::write(&path, render_srt(captions)).map_err(|e| {
        ReelError::checkpoint(format!("failed to write {}: {e}", path.display()))
    })?;
    tracing::debug!(path = %path.display(), cues = captions.len(), "caption file written");
    Ok(path)
}
