use crate::request::TransformRequest;

/// Renders the text prompt for a validated request.
///
/// Pure and deterministic: the same request always yields the same bytes.
pub fn build_prompt(request: &TransformRequest) -> String {
    let dims = request.dimensions();
    let style = request.style();
    let palette = request.palette();
    format!(
        "Redesign this room in a {style} interior style ({descriptor}). \
Room dimensions: {length} ft long x {width} ft wide x {height} ft ceiling height; \
keep the furniture scaled to this space. \
Color palette: {palette} ({colors}). \
Preserve the existing walls, windows, doors and camera angle. \
Photorealistic interior photography, natural daylight, high detail.",
        style = style.label(),
        descriptor = style.descriptor(),
        length = format_feet(dims.length),
        width = format_feet(dims.width),
        height = format_feet(dims.height),
        palette = palette.label(),
        colors = palette.colors(),
    )
}

fn format_feet(value: f64) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    format!("{rounded}")
}
