use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    str::FromStr,
};

use crate::{
    error::{ReelError, ReelResult},
    expr,
    geometry::{self, Alignment, Area, FitMode},
    labels::LabelAllocator,
    model::{AnimationSpec, AssetManifest, DuckingConfig, Segment, Timeline},
    templates::{self, Expansion, TemplateId},
    transitions::{self, PlannedTransition, TransitionPolicy},
};

/// One ffmpeg input slot. Still images are looped for `duration` seconds;
/// audio files are passed through as-is.
#[derive(Clone, Debug, PartialEq)]
pub struct InputSpec {
    pub path: PathBuf,
    pub loop_image: bool,
    pub duration: Option<f64>,
}

impl InputSpec {
    pub fn image(path: impl Into<PathBuf>, duration: f64) -> Self {
        Self {
            path: path.into(),
            loop_image: true,
            duration: Some(duration),
        }
    }

    pub fn media(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            loop_image: false,
            duration: None,
        }
    }
}

/// One node of the composition program: consumed labels, a filter body, and
/// newly produced labels. The graph text is assembled only once, at the end,
/// from the typed list.
#[derive(Clone, Debug, PartialEq)]
pub struct Fragment {
    pub inputs: Vec<String>,
    pub body: String,
    pub outputs: Vec<String>,
}

impl Fragment {
    pub fn new(
        inputs: impl IntoIterator<Item = String>,
        body: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Self {
            inputs: inputs.into_iter().collect(),
            body: body.into(),
            outputs: vec![output.into()],
        }
    }

    fn render(&self) -> String {
        let mut out = String::new();
        for label in &self.inputs {
            out.push('[');
            out.push_str(label);
            out.push(']');
        }
        out.push_str(&self.body);
        for label in &self.outputs {
            out.push('[');
            out.push_str(label);
            out.push(']');
        }
        out
    }
}

/// Append-only fragment list with label bookkeeping.
///
/// Every consumed label must have been produced earlier or declared as an
/// external input (`N:v` / `N:a`), and no label is ever produced twice
/// within one compile session.
#[derive(Debug, Default)]
pub struct FilterProgram {
    fragments: Vec<Fragment>,
    produced: HashSet<String>,
    external: HashSet<String>,
}

impl FilterProgram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare_external(&mut self, label: impl Into<String>) {
        self.external.insert(label.into());
    }

    pub fn push(&mut self, fragment: Fragment) -> ReelResult<()> {
        for label in &fragment.inputs {
            if !self.produced.contains(label) && !self.external.contains(label) {
                return Err(ReelError::compile(format!(
                    "fragment consumes undefined label '{label}'"
                )));
            }
        }
        for label in &fragment.outputs {
            if !self.produced.insert(label.clone()) {
                return Err(ReelError::compile(format!(
                    "label '{label}' produced twice"
                )));
            }
        }
        self.fragments.push(fragment);
        Ok(())
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn serialize(&self) -> String {
        self.fragments
            .iter()
            .map(Fragment::render)
            .collect::<Vec<_>>()
            .join(";")
    }
}

/// Audio sources for one render, in their three roles.
#[derive(Clone, Debug, Default)]
pub struct AudioMix {
    pub primary: Option<PathBuf>,
    pub narration: Option<PathBuf>,
    pub bgm: Option<PathBuf>,
    pub ducking: DuckingConfig,
}

impl AudioMix {
    pub fn is_empty(&self) -> bool {
        self.primary.is_none() && self.narration.is_none() && self.bgm.is_none()
    }
}

#[derive(Clone, Debug)]
pub struct CompiledProgram {
    pub inputs: Vec<InputSpec>,
    pub filtergraph: String,
    pub output_label: String,
    pub audio_label: Option<String>,
}

/// Compiles a timeline into a filtergraph program.
///
/// The base image becomes input 0, scaled to frame size; each animated
/// segment then threads the running output label through its expansion.
/// Unknown template ids and unresolvable focus targets degrade to a warning
/// and a skipped effect, never a failed compile.
pub fn compile(
    timeline: &Timeline,
    manifest: &AssetManifest,
    base_image: &Path,
    frame_w: u32,
    frame_h: u32,
    audio: &AudioMix,
) -> ReelResult<CompiledProgram> {
    timeline.validate()?;

    let total = timeline.segments.last().map_or(0.0, |s| s.end);
    let mut alloc = LabelAllocator::new();
    let mut program = FilterProgram::new();
    let mut inputs = vec![InputSpec::image(base_image, total.max(1.0))];

    program.declare_external("0:v");
    let base_label = alloc.next("v");
    program.push(Fragment::new(
        ["0:v".to_string()],
        geometry::resolve_fit(FitMode::Contain, Alignment::Center, frame_w, frame_h),
        base_label.clone(),
    ))?;

    let mut current = base_label;

    for seg in &timeline.segments {
        let Some(spec) = &seg.animation else {
            continue;
        };

        let id = match TemplateId::from_str(&spec.template_id) {
            Ok(id) => id,
            Err(_) => {
                tracing::warn!(
                    segment = %seg.id,
                    template = %spec.template_id,
                    "unknown animation template, skipping effect"
                );
                continue;
            }
        };

        let window = (seg.start, seg.end);
        match templates::expand(id, spec, window, frame_w, frame_h)? {
            Expansion::Simple(body) => {
                let out = alloc.next("v");
                program.push(Fragment::new([current.clone()], body, out.clone()))?;
                current = out;
            }
            Expansion::Composite => {
                let built = match id {
                    TemplateId::SlideIn => build_slide_in(
                        &mut program, &mut alloc, &mut inputs, &current, seg, spec, manifest,
                        frame_w, frame_h,
                    ),
                    TemplateId::LowerThird => build_lower_third(
                        &mut program, &mut alloc, &current, seg, spec, frame_w, frame_h,
                    ),
                    TemplateId::SpotlightDim => build_spotlight_dim(
                        &mut program, &mut alloc, &current, seg, spec, frame_w, frame_h,
                    ),
                    TemplateId::FanCards => build_fan_cards(
                        &mut program, &mut alloc, &mut inputs, &current, seg, spec, manifest,
                        frame_w, frame_h,
                    ),
                    _ => unreachable!("only composite templates reach here"),
                };
                match built {
                    Ok(out) => current = out,
                    Err(err) => {
                        tracing::warn!(
                            segment = %seg.id,
                            template = id.name(),
                            %err,
                            "composite template failed to resolve, skipping effect"
                        );
                    }
                }
            }
        }
    }

    let audio_label = attach_audio(&mut program, &mut alloc, &mut inputs, audio)?;

    Ok(CompiledProgram {
        inputs,
        filtergraph: program.serialize(),
        output_label: current,
        audio_label,
    })
}

/// Compiles a plain slideshow: every image letterboxed to frame size, then
/// crossfaded into one stream per the transition policy. Used when a job
/// carries images but no authored timeline.
pub fn compile_slideshow(
    images: &[PathBuf],
    per_image_duration: f64,
    frame_w: u32,
    frame_h: u32,
    audio: &AudioMix,
    policy: &TransitionPolicy,
) -> ReelResult<CompiledProgram> {
    if images.is_empty() {
        return Err(ReelError::compile("slideshow needs at least one image"));
    }

    let mut alloc = LabelAllocator::new();
    let mut program = FilterProgram::new();
    let mut inputs = Vec::with_capacity(images.len());
    let fit = geometry::resolve_fit(FitMode::Contain, Alignment::Center, frame_w, frame_h);

    let mut scaled = Vec::with_capacity(images.len());
    for (idx, image) in images.iter().enumerate() {
        inputs.push(InputSpec::image(image, per_image_duration));
        let external = format!("{idx}:v");
        program.declare_external(external.clone());
        let label = alloc.next("v");
        program.push(Fragment::new([external], fit.clone(), label.clone()))?;
        scaled.push(label);
    }

    // Slides abut, so every pair takes the hard-cut smoothing branch of the
    // planner. xfade offsets count on the joined stream, which is shorter
    // than the sum of the slides by the fade time already consumed.
    let slots = Timeline {
        segments: (0..images.len())
            .map(|i| Segment {
                id: format!("slide{i}"),
                start: i as f64 * per_image_duration,
                end: (i + 1) as f64 * per_image_duration,
                section: String::new(),
                animation: None,
            })
            .collect(),
    };
    let plans = transitions::plan_transitions(policy, &slots);

    let mut output_label = scaled[0].clone();
    let mut consumed = 0.0;
    for (plan, label) in plans.iter().zip(scaled.iter().skip(1)) {
        let shifted = PlannedTransition {
            offset: (plan.offset - consumed).max(0.0),
            ..*plan
        };
        let next = alloc.next("v");
        program.push(Fragment {
            inputs: vec![output_label, label.clone()],
            body: transitions::xfade_filter(policy, &shifted),
            outputs: vec![next.clone()],
        })?;
        consumed += plan.duration;
        output_label = next;
    }

    let audio_label = attach_audio(&mut program, &mut alloc, &mut inputs, audio)?;

    Ok(CompiledProgram {
        inputs,
        filtergraph: program.serialize(),
        output_label,
        audio_label,
    })
}

/// Registers audio inputs and appends the mixing chain.
///
/// When bgm plays under a voice source, a sidechain compressor ducks it:
/// bgm level follows narration activity with a long release so the music
/// does not audibly breathe in narration pauses.
fn attach_audio(
    program: &mut FilterProgram,
    alloc: &mut LabelAllocator,
    inputs: &mut Vec<InputSpec>,
    audio: &AudioMix,
) -> ReelResult<Option<String>> {
    if audio.is_empty() {
        return Ok(None);
    }

    let mut register = |path: &PathBuf| {
        let idx = inputs.len();
        inputs.push(InputSpec::media(path));
        let label = format!("{idx}:a");
        program.declare_external(label.clone());
        label
    };

    let primary = audio.primary.as_ref().map(&mut register);
    let narration = audio.narration.as_ref().map(&mut register);
    let bgm = audio.bgm.as_ref().map(&mut register);

    let voice = narration.clone().or_else(|| primary.clone());

    let mut streams = Vec::new();
    if let Some(p) = primary {
        streams.push(p);
    }
    if let Some(n) = narration {
        streams.push(n);
    }
    if let Some(bgm_label) = bgm {
        match &voice {
            Some(voice_label) => {
                let d = &audio.ducking;
                let ducked = alloc.next("a");
                program.push(Fragment {
                    inputs: vec![bgm_label, voice_label.clone()],
                    body: format!(
                        "sidechaincompress=threshold={}:ratio={}:attack={}:release={}",
                        expr::fmt(d.threshold, 3),
                        expr::fmt(d.ratio, 1),
                        expr::fmt(d.attack_ms, 0),
                        expr::fmt(d.release_ms, 0)
                    ),
                    outputs: vec![ducked.clone()],
                })?;
                streams.push(ducked);
            }
            None => streams.push(bgm_label),
        }
    }

    let out = alloc.next("a");
    if streams.len() == 1 {
        program.push(Fragment::new([streams.remove(0)], "anull", out.clone()))?;
    } else {
        let n = streams.len();
        program.push(Fragment {
            inputs: streams,
            body: format!("amix=inputs={n}:duration=longest:dropout_transition=0"),
            outputs: vec![out.clone()],
        })?;
    }

    Ok(Some(out))
}

fn focus_path<'a>(
    spec: &AnimationSpec,
    manifest: &'a AssetManifest,
    which: usize,
) -> ReelResult<&'a PathBuf> {
    let key = spec.focus.get(which).ok_or_else(|| {
        ReelError::compile(format!("template needs focus target #{which}, none given"))
    })?;
    manifest
        .get(key)
        .ok_or_else(|| ReelError::compile(format!("focus target '{key}' not in asset manifest")))
}

/// Overlays a focus card sliding in from an edge, eased.
#[allow(clippy::too_many_arguments)]
fn build_slide_in(
    program: &mut FilterProgram,
    alloc: &mut LabelAllocator,
    inputs: &mut Vec<InputSpec>,
    current: &str,
    seg: &Segment,
    spec: &AnimationSpec,
    manifest: &AssetManifest,
    frame_w: u32,
    frame_h: u32,
) -> ReelResult<String> {
    let path = focus_path(spec, manifest, 0)?;
    let card_w = (templates::param_f64(&spec.params, "width", 0.35) * frame_w as f64) as i64;
    let y = templates::param_f64(&spec.params, "y", 0.1) * frame_h as f64;
    let slide_dur = templates::param_f64(&spec.params, "duration", 0.6).max(0.05);

    let idx = inputs.len();
    inputs.push(InputSpec::image(path, seg.end));
    let external = format!("{idx}:v");
    program.declare_external(external.clone());

    let card = alloc.next("ov");
    program.push(Fragment::new(
        [external],
        format!("scale={card_w}:-2"),
        card.clone(),
    ))?;

    let ease = expr::ease_out_cubic(seg.start, seg.start + slide_dur);
    let margin = 40.0;
    let x = match templates::param_str(&spec.params, "edge", "left") {
        "right" => expr::lerp(frame_w as f64, frame_w as f64 - card_w as f64 - margin, &ease),
        _ => expr::lerp(-(card_w as f64), margin, &ease),
    };

    let out = alloc.next("v");
    program.push(Fragment {
        inputs: vec![current.to_string(), card],
        body: format!(
            "overlay=x={x}:y={}:{}",
            expr::fmt(y, 0),
            expr::enable_between(seg.start, seg.end)
        ),
        outputs: vec![out.clone()],
    })?;
    Ok(out)
}

/// Boxed lower-third: background band plus alignment-anchored text, both
/// gated to the segment window, chained in one fragment.
fn build_lower_third(
    program: &mut FilterProgram,
    alloc: &mut LabelAllocator,
    current: &str,
    seg: &Segment,
    spec: &AnimationSpec,
    frame_w: u32,
    frame_h: u32,
) -> ReelResult<String> {
    let text = expr::escape_text(templates::param_str(&spec.params, "text", ""));
    let size = templates::param_f64(&spec.params, "size", 44.0) as i64;
    let band_h = 120i64;
    let band_y = frame_h as i64 - 160;
    let text_y = band_y + (band_h - size) / 2;

    let x = match templates::param_str(&spec.params, "align", "start") {
        "center" => "(w-text_w)/2".to_string(),
        "end" => "w-text_w-40".to_string(),
        _ => "40".to_string(),
    };

    let enable = expr::enable_between(seg.start, seg.end);
    let out = alloc.next("v");
    program.push(Fragment::new(
        [current.to_string()],
        format!(
            "drawbox=x=0:y={band_y}:w={frame_w}:h={band_h}:color=black@0.55:t=fill:{enable},\
             drawtext=text='{text}':x={x}:y={text_y}:fontsize={size}:fontcolor=white:{enable}"
        ),
        out.clone(),
    ))?;
    Ok(out)
}

/// Spotlight dim: the frame splits into keep/dim/spot branches; the dim
/// branch darkens and blurs (feathered mask), the spot branch crops the
/// focus area back out, and the lit composite overlays the original only
/// inside the segment window.
fn build_spotlight_dim(
    program: &mut FilterProgram,
    alloc: &mut LabelAllocator,
    current: &str,
    seg: &Segment,
    spec: &AnimationSpec,
    frame_w: u32,
    frame_h: u32,
) -> ReelResult<String> {
    let area = templates::param_area(&spec.params, "area").unwrap_or(Area::Relative {
        x: 0.25,
        y: 0.25,
        w: 0.5,
        h: 0.5,
    });
    let resolved = geometry::resolve_area(frame_w, frame_h, &area)?;
    let padding = templates::param_f64(&spec.params, "padding", 16.0) as i64;
    let spot = geometry::expand(resolved, padding, frame_w, frame_h);
    let dim = templates::param_f64(&spec.params, "dim", 0.35).clamp(0.0, 1.0);
    let feather = templates::param_f64(&spec.params, "feather", 8.0) as i64;

    let keep = alloc.next("v");
    let dim_in = alloc.next("v");
    let spot_in = alloc.next("v");
    program.push(Fragment {
        inputs: vec![current.to_string()],
        body: "split=3".to_string(),
        outputs: vec![keep.clone(), dim_in.clone(), spot_in.clone()],
    })?;

    let dimmed = alloc.next("v");
    program.push(Fragment::new(
        [dim_in],
        format!("eq=brightness=-{},boxblur={feather}", expr::fmt(dim, 2)),
        dimmed.clone(),
    ))?;

    let spot_label = alloc.next("v");
    program.push(Fragment::new(
        [spot_in],
        format!("crop={}:{}:{}:{}", spot.w, spot.h, spot.x, spot.y),
        spot_label.clone(),
    ))?;

    let lit = alloc.next("v");
    program.push(Fragment {
        inputs: vec![dimmed, spot_label],
        body: format!("overlay={}:{}", spot.x, spot.y),
        outputs: vec![lit.clone()],
    })?;

    let out = alloc.next("v");
    program.push(Fragment {
        inputs: vec![keep, lit],
        body: format!("overlay=0:0:{}", expr::enable_between(seg.start, seg.end)),
        outputs: vec![out.clone()],
    })?;
    Ok(out)
}

/// Fan-card arc: each focus card is pre-rotated by its arc angle, positioned
/// by trigonometry around a bottom-center pivot, and revealed with a
/// per-card stagger.
#[allow(clippy::too_many_arguments)]
fn build_fan_cards(
    program: &mut FilterProgram,
    alloc: &mut LabelAllocator,
    inputs: &mut Vec<InputSpec>,
    current: &str,
    seg: &Segment,
    spec: &AnimationSpec,
    manifest: &AssetManifest,
    frame_w: u32,
    frame_h: u32,
) -> ReelResult<String> {
    if spec.focus.is_empty() {
        return Err(ReelError::compile("fan_cards needs at least one focus target"));
    }

    // Resolve every card before emitting anything. Fragments pushed for a
    // partially resolved fan would consume the running label and leave the
    // program unmappable.
    let paths = (0..spec.focus.len())
        .map(|i| focus_path(spec, manifest, i))
        .collect::<ReelResult<Vec<_>>>()?;

    let radius = templates::param_f64(&spec.params, "radius", 260.0);
    let spread = templates::param_f64(&spec.params, "spread_deg", 60.0).to_radians();
    let stagger = templates::param_f64(&spec.params, "stagger", 0.25).max(0.0);
    let card_w = templates::param_f64(&spec.params, "card_width", 320.0) as i64;

    let n = spec.focus.len();
    let pivot_x = frame_w as f64 / 2.0;
    let pivot_y = frame_h as f64 + radius * 0.4;

    let mut out = current.to_string();
    for (i, path) in paths.into_iter().enumerate() {
        let idx = inputs.len();
        inputs.push(InputSpec::image(path, seg.end));
        let external = format!("{idx}:v");
        program.declare_external(external.clone());

        let angle = if n == 1 {
            0.0
        } else {
            -spread / 2.0 + spread * i as f64 / (n - 1) as f64
        };

        let card = alloc.next("card");
        program.push(Fragment::new(
            [external],
            format!(
                "scale={card_w}:-2,rotate={a}:c=none:ow=rotw({a}):oh=roth({a})",
                a = expr::fmt(angle, 4)
            ),
            card.clone(),
        ))?;

        let cx = pivot_x + radius * angle.sin();
        let cy = pivot_y - radius * angle.cos();
        let reveal_at = seg.start + stagger * i as f64;

        let next = alloc.next("v");
        program.push(Fragment {
            inputs: vec![out, card],
            body: format!(
                "overlay=x={}-w/2:y={}-h/2:{}",
                expr::fmt(cx, 0),
                expr::fmt(cy, 0),
                expr::enable_between(reveal_at.min(seg.end), seg.end)
            ),
            outputs: vec![next.clone()],
        })?;
        out = next;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Segment;

    fn seg(id: &str, start: f64, end: f64, animation: Option<AnimationSpec>) -> Segment {
        Segment {
            id: id.to_string(),
            start,
            end,
            section: String::new(),
            animation,
        }
    }

    fn anim(template: &str, focus: &[&str], params: serde_json::Value) -> AnimationSpec {
        AnimationSpec {
            template_id: template.to_string(),
            focus: focus.iter().map(|s| s.to_string()).collect(),
            params,
        }
    }

    #[test]
    fn program_rejects_undefined_input_labels() {
        let mut p = FilterProgram::new();
        let err = p
            .push(Fragment::new(["ghost".to_string()], "anull", "a0"))
            .unwrap_err();
        assert!(err.to_string().contains("undefined label 'ghost'"));
    }

    #[test]
    fn program_rejects_duplicate_output_labels() {
        let mut p = FilterProgram::new();
        p.declare_external("0:v");
        p.push(Fragment::new(["0:v".to_string()], "null", "v0")).unwrap();
        let err = p
            .push(Fragment::new(["v0".to_string()], "null", "v0"))
            .unwrap_err();
        assert!(err.to_string().contains("produced twice"));
    }

    #[test]
    fn serialization_happens_once_with_semicolon_joins() {
        let mut p = FilterProgram::new();
        p.declare_external("0:v");
        p.push(Fragment::new(["0:v".to_string()], "scale=10:10", "v0")).unwrap();
        p.push(Fragment::new(["v0".to_string()], "hflip", "v1")).unwrap();
        assert_eq!(p.serialize(), "[0:v]scale=10:10[v0];[v0]hflip[v1]");
    }

    #[test]
    fn compile_without_animations_passes_segments_through() {
        let tl = Timeline {
            segments: vec![seg("a", 0.0, 5.0, None), seg("b", 5.0, 10.0, None)],
        };
        let compiled = compile(
            &tl,
            &AssetManifest::new(),
            Path::new("base.png"),
            1920,
            1080,
            &AudioMix::default(),
        )
        .unwrap();
        assert_eq!(compiled.output_label, "v0");
        assert_eq!(compiled.inputs.len(), 1);
        assert!(compiled.filtergraph.starts_with("[0:v]scale=1920:1080"));
        assert!(compiled.audio_label.is_none());
    }

    #[test]
    fn simple_template_threads_the_output_label() {
        let tl = Timeline {
            segments: vec![seg(
                "a",
                0.0,
                5.0,
                Some(anim("fade", &[], serde_json::json!({ "mode": "in" }))),
            )],
        };
        let compiled = compile(
            &tl,
            &AssetManifest::new(),
            Path::new("base.png"),
            1280,
            720,
            &AudioMix::default(),
        )
        .unwrap();
        assert_eq!(compiled.output_label, "v1");
        assert!(compiled.filtergraph.contains("[v0]fade=t=in:st=0.000:d=0.500[v1]"));
    }

    #[test]
    fn unknown_template_is_skipped_not_fatal() {
        let tl = Timeline {
            segments: vec![seg(
                "a",
                0.0,
                5.0,
                Some(anim("wobble_matrix", &[], serde_json::Value::Null)),
            )],
        };
        let compiled = compile(
            &tl,
            &AssetManifest::new(),
            Path::new("base.png"),
            1280,
            720,
            &AudioMix::default(),
        )
        .unwrap();
        assert_eq!(compiled.output_label, "v0");
    }

    #[test]
    fn composite_with_missing_focus_is_skipped_not_fatal() {
        let tl = Timeline {
            segments: vec![seg(
                "a",
                0.0,
                5.0,
                Some(anim("slide_in", &["missing"], serde_json::Value::Null)),
            )],
        };
        let compiled = compile(
            &tl,
            &AssetManifest::new(),
            Path::new("base.png"),
            1280,
            720,
            &AudioMix::default(),
        )
        .unwrap();
        assert_eq!(compiled.output_label, "v0");
        assert_eq!(compiled.inputs.len(), 1);
    }

    #[test]
    fn spotlight_splits_dims_and_regates() {
        let tl = Timeline {
            segments: vec![seg(
                "a",
                2.0,
                6.0,
                Some(anim(
                    "spotlight_dim",
                    &[],
                    serde_json::json!({
                        "area": { "unit": "pixels", "x": 200, "y": 100, "w": 400, "h": 300 }
                    }),
                )),
            )],
        };
        let compiled = compile(
            &tl,
            &AssetManifest::new(),
            Path::new("base.png"),
            1920,
            1080,
            &AudioMix::default(),
        )
        .unwrap();
        let fg = &compiled.filtergraph;
        assert!(fg.contains("split=3"));
        assert!(fg.contains("eq=brightness=-0.35,boxblur=8"));
        assert!(fg.contains("crop=432:332:184:84"));
        assert!(fg.contains("overlay=0:0:enable='between(t,2.000,6.000)'"));
    }

    #[test]
    fn fan_cards_pre_rotate_and_stagger() {
        let mut manifest = AssetManifest::new();
        manifest.insert("c1".into(), PathBuf::from("card1.png"));
        manifest.insert("c2".into(), PathBuf::from("card2.png"));
        manifest.insert("c3".into(), PathBuf::from("card3.png"));

        let tl = Timeline {
            segments: vec![seg(
                "a",
                1.0,
                8.0,
                Some(anim(
                    "fan_cards",
                    &["c1", "c2", "c3"],
                    serde_json::json!({ "stagger": 0.5 }),
                )),
            )],
        };
        let compiled = compile(
            &tl,
            &manifest,
            Path::new("base.png"),
            1920,
            1080,
            &AudioMix::default(),
        )
        .unwrap();

        // Base plus three card inputs.
        assert_eq!(compiled.inputs.len(), 4);
        let fg = &compiled.filtergraph;
        assert!(fg.contains("rotate=-0.5236"));
        assert!(fg.contains("rotate=0.0000"));
        assert!(fg.contains("rotate=0.5236"));
        // Staggered reveals: 1.0, 1.5, 2.0.
        assert!(fg.contains("between(t,1.000,8.000)"));
        assert!(fg.contains("between(t,1.500,8.000)"));
        assert!(fg.contains("between(t,2.000,8.000)"));
    }

    #[test]
    fn ducking_fragment_appears_only_with_bgm_and_voice() {
        let tl = Timeline { segments: vec![seg("a", 0.0, 5.0, None)] };

        let both = AudioMix {
            narration: Some(PathBuf::from("voice.wav")),
            bgm: Some(PathBuf::from("music.mp3")),
            ..AudioMix::default()
        };
        let compiled = compile(&tl, &AssetManifest::new(), Path::new("b.png"), 1280, 720, &both)
            .unwrap();
        assert!(compiled.filtergraph.contains("sidechaincompress=threshold=0.050:ratio=4.0"));
        assert!(compiled.filtergraph.contains("amix=inputs=2"));
        assert_eq!(compiled.audio_label.as_deref(), Some("a1"));

        let bgm_only = AudioMix {
            bgm: Some(PathBuf::from("music.mp3")),
            ..AudioMix::default()
        };
        let compiled =
            compile(&tl, &AssetManifest::new(), Path::new("b.png"), 1280, 720, &bgm_only).unwrap();
        assert!(!compiled.filtergraph.contains("sidechaincompress"));
        assert!(compiled.filtergraph.contains("[1:a]anull[a0]"));
    }

    #[test]
    fn slideshow_crossfades_adjacent_slides() {
        let images = vec![
            PathBuf::from("s1.png"),
            PathBuf::from("s2.png"),
            PathBuf::from("s3.png"),
        ];
        let compiled = compile_slideshow(
            &images,
            10.0,
            1920,
            1080,
            &AudioMix::default(),
            &TransitionPolicy::default(),
        )
        .unwrap();
        assert_eq!(compiled.inputs.len(), 3);
        assert!(compiled.inputs.iter().all(|i| i.loop_image));
        // Abutting slides take the smoothing branch; the second offset is
        // shifted left by the fade already consumed.
        let fg = &compiled.filtergraph;
        assert!(fg.contains("xfade=transition=fade:duration=0.250:offset=9.750"));
        assert!(fg.contains("xfade=transition=fade:duration=0.250:offset=19.500"));
        assert_eq!(compiled.output_label, "v4");
    }

    #[test]
    fn single_image_slideshow_skips_crossfades() {
        let images = vec![PathBuf::from("s1.png")];
        let compiled = compile_slideshow(
            &images,
            30.0,
            1920,
            1080,
            &AudioMix::default(),
            &TransitionPolicy::default(),
        )
        .unwrap();
        assert!(!compiled.filtergraph.contains("xfade"));
        assert_eq!(compiled.output_label, "v0");
    }

    #[test]
    fn fan_cards_with_missing_later_focus_leaves_no_partial_fragments() {
        let mut manifest = AssetManifest::new();
        manifest.insert("c1".into(), PathBuf::from("card1.png"));

        let tl = Timeline {
            segments: vec![seg(
                "a",
                1.0,
                8.0,
                Some(anim("fan_cards", &["c1", "c2"], serde_json::Value::Null)),
            )],
        };
        let compiled = compile(
            &tl,
            &manifest,
            Path::new("base.png"),
            1920,
            1080,
            &AudioMix::default(),
        )
        .unwrap();

        // The effect is skipped whole: no card input, no card fragments, and
        // the final label is produced exactly once and consumed by nothing.
        assert_eq!(compiled.output_label, "v0");
        assert_eq!(compiled.inputs.len(), 1);
        assert!(!compiled.filtergraph.contains("rotate"));
        assert!(!compiled.filtergraph.contains("overlay"));
        let final_label = format!("[{}]", compiled.output_label);
        assert_eq!(compiled.filtergraph.matches(&final_label).count(), 1);
    }

    #[test]
    fn every_label_consumed_was_produced_or_external() {
        let mut manifest = AssetManifest::new();
        manifest.insert("c1".into(), PathBuf::from("card.png"));
        let tl = Timeline {
            segments: vec![
                seg("a", 0.0, 4.0, Some(anim("pan_zoom", &[], serde_json::Value::Null))),
                seg("b", 4.0, 8.0, Some(anim("slide_in", &["c1"], serde_json::Value::Null))),
                seg("c", 8.0, 12.0, Some(anim("lower_third", &[], serde_json::json!({ "text": "hi" })))),
            ],
        };
        // FilterProgram::push enforces the invariant; compiling without an
        // error is the assertion.
        let compiled = compile(
            &tl,
            &manifest,
            Path::new("base.png"),
            1920,
            1080,
            &AudioMix {
                primary: Some(PathBuf::from("v.wav")),
                ..AudioMix::default()
            },
        )
        .unwrap();
        assert_eq!(compiled.output_label, "v3");
        assert_eq!(compiled.audio_label.as_deref(), Some("a0"));
    }
}
