use crate::color::Rgb;
use crate::types::{CanvasPoint, CanvasSize};
use std::fmt::Write;

/// Marker appearance shared by every layer of one export.
#[derive(Debug, Clone, Copy)]
pub struct MarkerStyle {
    pub radius: f64,
    pub canvas: CanvasSize,
}

/// Render one layer as a standalone SVG document: one filled circle per
/// point on a `width` x `height` canvas.
pub fn render_layer_svg(
    layer_name: &str,
    points: &[CanvasPoint],
    color: Rgb,
    style: &MarkerStyle,
) -> String {
    let mut out = String::with_capacity(128 + points.len() * 64);
    let CanvasSize { width, height } = style.canvas;

    let _ = writeln!(out, r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    let _ = writeln!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{}" height="{}" viewBox="0 0 {} {}">"#,
        width, height, width, height,
    );
    let _ = writeln!(out, "  <title>{}</title>", xml_escape(layer_name));
    let _ = writeln!(out, r#"  <g fill="{}">"#, color);
    for p in points {
        let _ = writeln!(
            out,
            r#"    <circle cx="{:.3}" cy="{:.3}" r="{}" fill="{}"/>"#,
            p.x, p.y, style.radius, color,
        );
    }
    let _ = writeln!(out, "  </g>");
    let _ = writeln!(out, "</svg>");
    out
}

/// Escape the five XML special characters.
fn xml_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}
