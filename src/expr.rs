//! Filter-expression synthesis helpers.
//!
//! Effects are compiled as formulas evaluated by ffmpeg once per output
//! frame; there is no keyframe primitive on the other side, so everything
//! animated must be expressed in `t`.

/// Fixed-precision numeric formatting.
///
/// A single wrong digit silently changes the compiled program's semantics,
/// so formatting must be deterministic across platforms and locales. Rust's
/// `format!` never localizes the decimal separator, which is the property we
/// rely on here.
pub fn fmt(n: f64, precision: usize) -> String {
    format!("{n:.precision$}")
}

/// Escapes text for a drawtext-style field value.
///
/// Order matters: backslash first, then the field delimiter, then quotes.
/// Escaping quotes before the delimiter would double-escape the backslashes
/// just introduced.
pub fn escape_text(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace(':', "\\:")
        .replace('\'', "\\'")
}

/// Time-gated boolean predicate: true while `start <= t <= end`.
pub fn enable_between(start: f64, end: f64) -> String {
    format!("enable='between(t,{},{})'", fmt(start, 3), fmt(end, 3))
}

/// Clamped 0..1 progress over `[t0, t1]`, eased with cubic ease-out.
pub fn ease_out_cubic(t0: f64, t1: f64) -> String {
    let span = t1 - t0;
    if span <= 0.0 {
        return "1".to_string();
    }
    format!(
        "(1-pow(1-clip((t-{})/{},0,1),3))",
        fmt(t0, 4),
        fmt(span, 4)
    )
}

/// Clamped 0..1 progress over `[t0, t1]`, eased with cubic ease-in-out.
pub fn ease_in_out_cubic(t0: f64, t1: f64) -> String {
    let span = t1 - t0;
    if span <= 0.0 {
        return "1".to_string();
    }
    let p = format!("clip((t-{})/{},0,1)", fmt(t0, 4), fmt(span, 4));
    format!("if(lt({p},0.5),4*pow({p},3),1-pow(-2*{p}+2,3)/2)")
}

/// Linear interpolation between two constants with an arbitrary blend
/// expression (usually one of the eased-progress expressions above).
pub fn lerp(a: f64, b: f64, blend_expr: &str) -> String {
    format!("({}+{}*({blend_expr}))", fmt(a, 4), fmt(b - a, 4))
}
