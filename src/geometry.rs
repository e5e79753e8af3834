use crate::error::{ReelError, ReelResult};

/// A rectangular region of the frame, either in fractions of the frame or in
/// absolute pixels. Everything downstream works in pixels; call
/// [`resolve_area`] before use.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "unit", rename_all = "snake_case")]
pub enum Area {
    Relative { x: f64, y: f64, w: f64, h: f64 },
    Pixels { x: i64, y: i64, w: i64, h: i64 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelArea {
    pub x: i64,
    pub y: i64,
    pub w: i64,
    pub h: i64,
}

/// Scales a relative area by the frame dimensions and rounds to integer
/// pixels; pixel areas pass through. Resolved width/height must be positive.
pub fn resolve_area(frame_w: u32, frame_h: u32, area: &Area) -> ReelResult<PixelArea> {
    let px = match *area {
        Area::Pixels { x, y, w, h } => PixelArea { x, y, w, h },
        Area::Relative { x, y, w, h } => PixelArea {
            x: (x * frame_w as f64).round() as i64,
            y: (y * frame_h as f64).round() as i64,
            w: (w * frame_w as f64).round() as i64,
            h: (h * frame_h as f64).round() as i64,
        },
    };
    if px.w <= 0 || px.h <= 0 {
        return Err(ReelError::validation(format!(
            "area resolves to non-positive size {}x{}",
            px.w, px.h
        )));
    }
    Ok(px)
}

/// Grows an area by `padding` on every side, then clamps it into the frame:
/// x/y land in `[0, dim-1]` and w/h in `[2, dim-x]`. The returned area never
/// exceeds the frame no matter how large the padding is.
pub fn expand(area: PixelArea, padding: i64, frame_w: u32, frame_h: u32) -> PixelArea {
    let fw = frame_w as i64;
    let fh = frame_h as i64;

    let x = (area.x - padding).clamp(0, fw - 1);
    let y = (area.y - padding).clamp(0, fh - 1);
    let w = (area.w + 2 * padding).clamp(2, fw - x);
    let h = (area.h + 2 * padding).clamp(2, fh - y);

    PixelArea { x, y, w, h }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitMode {
    /// Letterbox into the target box, preserving aspect.
    Contain,
    /// Fill the target box, cropping the overflow.
    Cover,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    Center,
    Start,
    End,
}

impl Alignment {
    /// Anchor expression along one axis, in terms of the outer (`o`) and
    /// inner (`i`) extents of that axis.
    fn anchor(self, outer: &str, inner: &str) -> String {
        match self {
            Alignment::Start => "0".to_string(),
            Alignment::Center => format!("({outer}-{inner})/2"),
            Alignment::End => format!("{outer}-{inner}"),
        }
    }
}

/// Produces the scale + pad (contain) or scale + crop (cover) filter chain
/// that maps an arbitrary input into a `target_w` x `target_h` box.
///
/// For contain, alignment anchors the image inside the padding; for cover it
/// chooses which edge of the image is sacrificed by the crop.
pub fn resolve_fit(mode: FitMode, alignment: Alignment, target_w: u32, target_h: u32) -> String {
    match mode {
        FitMode::Contain => {
            let x = alignment.anchor("ow", "iw");
            let y = alignment.anchor("oh", "ih");
            format!(
                "scale={target_w}:{target_h}:force_original_aspect_ratio=decrease,\
                 pad={target_w}:{target_h}:{x}:{y}:black,setsar=1"
            )
        }
        FitMode::Cover => {
            let x = alignment.anchor("iw", "ow");
            let y = alignment.anchor("ih", "oh");
            format!(
                "scale={target_w}:{target_h}:force_original_aspect_ratio=increase,\
                 crop={target_w}:{target_h}:{x}:{y},setsar=1"
            )
        }
    }
}
