use std::str::FromStr;

use crate::{
    error::{ReelError, ReelResult},
    expr,
    geometry::{self, Area},
    model::AnimationSpec,
};

/// Closed set of animation templates.
///
/// Simple templates expand to one single-input filter string; composite
/// templates need synthesized auxiliary inputs or multiple fragments and are
/// special-cased by the compiler. That asymmetry is structural, so it stays
/// visible here instead of hiding behind a uniform interface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TemplateId {
    PanZoom,
    BoxHighlight,
    DrawText,
    Fade,
    SlideIn,
    LowerThird,
    SpotlightDim,
    FanCards,
}

impl FromStr for TemplateId {
    type Err = ReelError;

    fn from_str(s: &str) -> ReelResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pan_zoom" | "panzoom" | "ken_burns" => Ok(Self::PanZoom),
            "box_highlight" | "highlight" => Ok(Self::BoxHighlight),
            "draw_text" | "drawtext" | "text" => Ok(Self::DrawText),
            "fade" => Ok(Self::Fade),
            "slide_in" | "slidein" => Ok(Self::SlideIn),
            "lower_third" | "lowerthird" => Ok(Self::LowerThird),
            "spotlight_dim" | "spotlight" => Ok(Self::SpotlightDim),
            "fan_cards" | "fancards" | "card_fan" => Ok(Self::FanCards),
            other => Err(ReelError::compile(format!(
                "unknown animation template '{other}'"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamKind {
    Number,
    Text,
    Area,
    Choice,
}

/// Declared parameter schema entry, for validation and documentation.
#[derive(Clone, Copy, Debug)]
pub struct ParamSpec {
    pub key: &'static str,
    pub kind: ParamKind,
    pub default: &'static str,
}

impl TemplateId {
    pub fn name(self) -> &'static str {
        match self {
            Self::PanZoom => "pan_zoom",
            Self::BoxHighlight => "box_highlight",
            Self::DrawText => "draw_text",
            Self::Fade => "fade",
            Self::SlideIn => "slide_in",
            Self::LowerThird => "lower_third",
            Self::SpotlightDim => "spotlight_dim",
            Self::FanCards => "fan_cards",
        }
    }

    pub fn is_composite(self) -> bool {
        matches!(
            self,
            Self::SlideIn | Self::LowerThird | Self::SpotlightDim | Self::FanCards
        )
    }

    pub fn params(self) -> &'static [ParamSpec] {
        match self {
            Self::PanZoom => &[
                ParamSpec { key: "zoom", kind: ParamKind::Number, default: "1.15" },
                ParamSpec { key: "pan", kind: ParamKind::Choice, default: "center" },
            ],
            Self::BoxHighlight => &[
                ParamSpec { key: "area", kind: ParamKind::Area, default: "" },
                ParamSpec { key: "color", kind: ParamKind::Text, default: "yellow" },
                ParamSpec { key: "thickness", kind: ParamKind::Number, default: "6" },
                ParamSpec { key: "padding", kind: ParamKind::Number, default: "12" },
            ],
            Self::DrawText => &[
                ParamSpec { key: "text", kind: ParamKind::Text, default: "" },
                ParamSpec { key: "size", kind: ParamKind::Number, default: "48" },
                ParamSpec { key: "color", kind: ParamKind::Text, default: "white" },
                ParamSpec { key: "x", kind: ParamKind::Number, default: "0.5" },
                ParamSpec { key: "y", kind: ParamKind::Number, default: "0.85" },
            ],
            Self::Fade => &[
                ParamSpec { key: "mode", kind: ParamKind::Choice, default: "both" },
                ParamSpec { key: "duration", kind: ParamKind::Number, default: "0.5" },
            ],
            Self::SlideIn => &[
                ParamSpec { key: "edge", kind: ParamKind::Choice, default: "left" },
                ParamSpec { key: "width", kind: ParamKind::Number, default: "0.35" },
                ParamSpec { key: "y", kind: ParamKind::Number, default: "0.1" },
                ParamSpec { key: "duration", kind: ParamKind::Number, default: "0.6" },
            ],
            Self::LowerThird => &[
                ParamSpec { key: "text", kind: ParamKind::Text, default: "" },
                ParamSpec { key: "align", kind: ParamKind::Choice, default: "start" },
                ParamSpec { key: "size", kind: ParamKind::Number, default: "44" },
            ],
            Self::SpotlightDim => &[
                ParamSpec { key: "area", kind: ParamKind::Area, default: "" },
                ParamSpec { key: "dim", kind: ParamKind::Number, default: "0.35" },
                ParamSpec { key: "feather", kind: ParamKind::Number, default: "8" },
                ParamSpec { key: "padding", kind: ParamKind::Number, default: "16" },
            ],
            Self::FanCards => &[
                ParamSpec { key: "radius", kind: ParamKind::Number, default: "260" },
                ParamSpec { key: "spread_deg", kind: ParamKind::Number, default: "60" },
                ParamSpec { key: "stagger", kind: ParamKind::Number, default: "0.25" },
                ParamSpec { key: "card_width", kind: ParamKind::Number, default: "320" },
            ],
        }
    }
}

/// A resolved template expansion.
///
/// `Composite` is a structural sentinel: the compiler must route the segment
/// through the matching multi-fragment builder instead of the generic
/// single-filter path.
#[derive(Clone, Debug, PartialEq)]
pub enum Expansion {
    Simple(String),
    Composite,
}

pub(crate) fn param_f64(params: &serde_json::Value, key: &str, default: f64) -> f64 {
    params.get(key).and_then(|v| v.as_f64()).unwrap_or(default)
}

pub(crate) fn param_str<'a>(
    params: &'a serde_json::Value,
    key: &str,
    default: &'a str,
) -> &'a str {
    params.get(key).and_then(|v| v.as_str()).unwrap_or(default)
}

pub(crate) fn param_area(params: &serde_json::Value, key: &str) -> Option<Area> {
    params
        .get(key)
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
}

/// Expands a template into its single-filter form, or returns the
/// [`Expansion::Composite`] sentinel for templates the compiler handles
/// specially.
pub fn expand(
    id: TemplateId,
    spec: &AnimationSpec,
    window: (f64, f64),
    frame_w: u32,
    frame_h: u32,
) -> ReelResult<Expansion> {
    if id.is_composite() {
        return Ok(Expansion::Composite);
    }

    let (start, end) = window;
    let params = &spec.params;

    let body = match id {
        TemplateId::PanZoom => {
            let zoom = param_f64(params, "zoom", 1.15).clamp(1.0, 3.0);
            let progress = expr::ease_in_out_cubic(start, end);
            let x = match param_str(params, "pan", "center") {
                "left_to_right" | "ltr" => format!("(iw-ow)*({progress})"),
                "right_to_left" | "rtl" => format!("(iw-ow)*(1-({progress}))"),
                _ => "(iw-ow)/2".to_string(),
            };
            // Upscale to an even size, then animate the crop window back to
            // frame size. iw/ih inside crop refer to the upscaled extents.
            format!(
                "scale=ceil(iw*{z}/2)*2:ceil(ih*{z}/2)*2,crop={frame_w}:{frame_h}:{x}:(ih-oh)/2",
                z = expr::fmt(zoom, 3)
            )
        }
        TemplateId::BoxHighlight => {
            let area = param_area(params, "area").unwrap_or(Area::Relative {
                x: 0.25,
                y: 0.25,
                w: 0.5,
                h: 0.5,
            });
            let resolved = geometry::resolve_area(frame_w, frame_h, &area)?;
            let padding = param_f64(params, "padding", 12.0) as i64;
            let boxed = geometry::expand(resolved, padding, frame_w, frame_h);
            let color = param_str(params, "color", "yellow");
            let thickness = param_f64(params, "thickness", 6.0) as i64;
            format!(
                "drawbox=x={}:y={}:w={}:h={}:color={color}@0.9:t={thickness}:{}",
                boxed.x,
                boxed.y,
                boxed.w,
                boxed.h,
                expr::enable_between(start, end)
            )
        }
        TemplateId::DrawText => {
            let text = expr::escape_text(param_str(params, "text", ""));
            let size = param_f64(params, "size", 48.0) as i64;
            let color = param_str(params, "color", "white");
            let x = expr::fmt(param_f64(params, "x", 0.5) * frame_w as f64, 0);
            let y = expr::fmt(param_f64(params, "y", 0.85) * frame_h as f64, 0);
            format!(
                "drawtext=text='{text}':x={x}-text_w/2:y={y}:fontsize={size}:fontcolor={color}:{}",
                expr::enable_between(start, end)
            )
        }
        TemplateId::Fade => {
            let dur = param_f64(params, "duration", 0.5).max(0.01);
            let d = expr::fmt(dur, 3);
            match param_str(params, "mode", "both") {
                "in" => format!("fade=t=in:st={}:d={d}", expr::fmt(start, 3)),
                "out" => format!(
                    "fade=t=out:st={}:d={d}",
                    expr::fmt((end - dur).max(start), 3)
                ),
                _ => format!(
                    "fade=t=in:st={}:d={d},fade=t=out:st={}:d={d}",
                    expr::fmt(start, 3),
                    expr::fmt((end - dur).max(start), 3)
                ),
            }
        }
        TemplateId::SlideIn
        | TemplateId::LowerThird
        | TemplateId::SpotlightDim
        | TemplateId::FanCards => unreachable!("composite templates return the sentinel above"),
    };

    Ok(Expansion::Simple(body))
}
