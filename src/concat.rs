use std::path::{Path, PathBuf};

use crate::{
    error::ReelResult,
    expr,
    labels::LabelAllocator,
    transitions::{self, PlannedTransition, TransitionPolicy},
};

/// Joining strategies for pre-rendered segment files.
///
/// `ListJoin` stream-copies via the concat demuxer: fast and lossless, but
/// no transitions. `FilterJoin` re-encodes through the n-input concat
/// filter, which tolerates mixed source parameters. For blended joins see
/// [`crossfade_join_args`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinStrategy {
    ListJoin,
    FilterJoin,
}

/// Writes a concat-demuxer manifest listing the segment files in order.
pub fn write_concat_manifest(segments: &[PathBuf], manifest_path: &Path) -> ReelResult<()> {
    use anyhow::Context as _;

    let mut text = String::from("ffconcat version 1.0\n");
    for path in segments {
        // The demuxer's quoting rule: single quotes close, escape, reopen.
        let escaped = path.to_string_lossy().replace('\'', "'\\''");
        text.push_str(&format!("file '{escaped}'\n"));
    }
    std::fs::write(manifest_path, text)
        .with_context(|| format!("write concat manifest '{}'", manifest_path.display()))?;
    Ok(())
}

/// argv for the lossless list join (stream copy, no re-encode).
pub fn list_join_args(manifest_path: &Path, out_path: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-f".to_string(),
        "concat".to_string(),
        "-safe".to_string(),
        "0".to_string(),
        "-i".to_string(),
        manifest_path.to_string_lossy().into_owned(),
        "-c".to_string(),
        "copy".to_string(),
        out_path.to_string_lossy().into_owned(),
    ]
}

/// argv for the filter join: all segments as inputs, merged through the
/// concat filter with uniform re-encoding.
pub fn filter_join_args(segments: &[PathBuf], out_path: &Path, with_audio: bool) -> Vec<String> {
    let n = segments.len();
    let mut args = vec!["-y".to_string()];
    for seg in segments {
        args.push("-i".to_string());
        args.push(seg.to_string_lossy().into_owned());
    }

    let mut pads = String::new();
    for i in 0..n {
        pads.push_str(&format!("[{i}:v]"));
        if with_audio {
            pads.push_str(&format!("[{i}:a]"));
        }
    }
    let a = if with_audio { 1 } else { 0 };
    let graph = if with_audio {
        format!("{pads}concat=n={n}:v=1:a={a}[outv][outa]")
    } else {
        format!("{pads}concat=n={n}:v=1:a={a}[outv]")
    };

    args.push("-filter_complex".to_string());
    args.push(graph);
    args.push("-map".to_string());
    args.push("[outv]".to_string());
    if with_audio {
        args.push("-map".to_string());
        args.push("[outa]".to_string());
        args.push("-c:a".to_string());
        args.push("aac".to_string());
    }
    args.push("-c:v".to_string());
    args.push("libx264".to_string());
    args.push("-pix_fmt".to_string());
    args.push("yuv420p".to_string());
    args.push(out_path.to_string_lossy().into_owned());
    args
}

/// Dispatches a join strategy to its argv builder. The list join writes its
/// manifest next to the output file.
pub fn join_args(
    strategy: JoinStrategy,
    segments: &[PathBuf],
    out_path: &Path,
    with_audio: bool,
) -> ReelResult<Vec<String>> {
    match strategy {
        JoinStrategy::ListJoin => {
            let manifest = out_path.with_extension("ffconcat");
            write_concat_manifest(segments, &manifest)?;
            Ok(list_join_args(&manifest, out_path))
        }
        JoinStrategy::FilterJoin => Ok(filter_join_args(segments, out_path, with_audio)),
    }
}

/// argv for the blended join: each planned transition crossfades adjacent
/// segment files with xfade, mirrored by acrossfade on audio when the
/// segments carry it. Offsets count on the joined stream, which is shorter
/// than the sum of the segments by the fade time already consumed.
pub fn crossfade_join_args(
    segments: &[PathBuf],
    durations: &[f64],
    policy: &TransitionPolicy,
    out_path: &Path,
    with_audio: bool,
) -> Vec<String> {
    if segments.len() < 2 {
        return filter_join_args(segments, out_path, with_audio);
    }

    let mut args = vec!["-y".to_string()];
    for seg in segments {
        args.push("-i".to_string());
        args.push(seg.to_string_lossy().into_owned());
    }

    let mut alloc = LabelAllocator::new();
    let mut graph = String::new();
    let mut video = "0:v".to_string();
    let mut audio = "0:a".to_string();
    let mut boundary = durations.first().copied().unwrap_or(0.0);
    let mut consumed = 0.0;

    for i in 1..segments.len() {
        let plan = transitions::plan_pair(policy, boundary, boundary);
        let shifted = PlannedTransition {
            offset: (plan.offset - consumed).max(0.0),
            ..plan
        };
        let next = alloc.next("v");
        if !graph.is_empty() {
            graph.push(';');
        }
        graph.push_str(&format!(
            "[{video}][{i}:v]{}[{next}]",
            transitions::xfade_filter(policy, &shifted)
        ));
        video = next;

        if with_audio {
            let next = alloc.next("a");
            graph.push(';');
            graph.push_str(&format!(
                "[{audio}][{i}:a]{}[{next}]",
                transitions::acrossfade_filter(policy, &plan)
            ));
            audio = next;
        }

        consumed += plan.duration;
        boundary += durations.get(i).copied().unwrap_or(0.0);
    }

    args.push("-filter_complex".to_string());
    args.push(graph);
    args.push("-map".to_string());
    args.push(format!("[{video}]"));
    if with_audio {
        args.push("-map".to_string());
        args.push(format!("[{audio}]"));
        args.push("-c:a".to_string());
        args.push("aac".to_string());
    }
    args.push("-c:v".to_string());
    args.push("libx264".to_string());
    args.push("-pix_fmt".to_string());
    args.push("yuv420p".to_string());
    args.push(out_path.to_string_lossy().into_owned());
    args
}

/// argv rendering a single shot (one still + filter chain) to an
/// intermediate file, so each shot can be cached and retried independently.
pub fn segment_args(
    image: &Path,
    duration: f64,
    filters: &[String],
    out_path: &Path,
) -> Vec<String> {
    let mut args = vec![
        "-y".to_string(),
        "-loop".to_string(),
        "1".to_string(),
        "-t".to_string(),
        expr::fmt(duration, 3),
        "-i".to_string(),
        image.to_string_lossy().into_owned(),
    ];
    if !filters.is_empty() {
        args.push("-vf".to_string());
        args.push(filters.join(","));
    }
    args.extend([
        "-c:v".to_string(),
        "libx264".to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-r".to_string(),
        "30".to_string(),
        out_path.to_string_lossy().into_owned(),
    ]);
    args
}
