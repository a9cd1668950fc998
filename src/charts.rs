//! SVG chart rendering for the marks endpoints.
//!
//! Both renderers are pure: a numeric sequence in, a self-contained SVG
//! document out. Callers are expected to reject empty input before rendering.

use std::fmt::Write;

pub const HISTOGRAM_BINS: usize = 15;
pub const CONTENT_TYPE: &str = "image/svg+xml";

const WIDTH: f64 = 960.0;
const HEIGHT: f64 = 480.0;
const MARGIN: f64 = 56.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bin {
    pub lo: f64,
    pub hi: f64,
    pub count: usize,
}

/// Split `[min, max]` into `bins` equal-width bins and count the values.
///
/// The last bin is closed on the right. When every value is equal the range
/// is widened to `[v - 0.5, v + 0.5]`.
pub fn histogram_bins(values: &[f64], bins: usize) -> Vec<Bin> {
    if values.is_empty() || bins == 0 {
        return Vec::new();
    }
    let mut lo = values.iter().copied().fold(f64::INFINITY, f64::min);
    let mut hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if lo == hi {
        lo -= 0.5;
        hi += 0.5;
    }
    let width = (hi - lo) / bins as f64;
    let mut out: Vec<Bin> = (0..bins)
        .map(|i| Bin { lo: lo + width * i as f64, hi: if i + 1 == bins { hi } else { lo + width * (i + 1) as f64 }, count: 0 })
        .collect();
    for v in values {
        let idx = (((v - lo) / width).floor() as usize).min(bins - 1);
        out[idx].count += 1;
    }
    out
}

fn open(doc: &mut String, title: &str, x_label: &str, y_label: &str) {
    let _ = write!(
        doc,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}" font-family="sans-serif">"#,
        w = WIDTH,
        h = HEIGHT
    );
    let _ = write!(doc, r#"<rect width="100%" height="100%" fill="white"/>"#);
    let _ = write!(doc, r#"<text x="{}" y="28" font-size="20" font-weight="bold" text-anchor="middle">{}</text>"#, WIDTH / 2.0, title);
    let _ = write!(doc, r#"<text x="{}" y="{}" font-size="13" text-anchor="middle">{}</text>"#, WIDTH / 2.0, HEIGHT - 12.0, x_label);
    let _ = write!(
        doc,
        r#"<text x="16" y="{y}" font-size="13" text-anchor="middle" transform="rotate(-90 16 {y})">{}</text>"#,
        y_label,
        y = HEIGHT / 2.0
    );
}

fn axes(doc: &mut String, y_max: f64) {
    let bottom = HEIGHT - MARGIN;
    let plot_h = HEIGHT - 2.0 * MARGIN;
    for step in 0..=4 {
        let frac = step as f64 / 4.0;
        let y = bottom - plot_h * frac;
        let _ = write!(doc, r##"<line x1="{m}" y1="{y:.1}" x2="{r}" y2="{y:.1}" stroke="#bbb" stroke-dasharray="4 3"/>"##, m = MARGIN, r = WIDTH - MARGIN);
        let _ = write!(doc, r#"<text x="{}" y="{:.1}" font-size="11" text-anchor="end">{:.1}</text>"#, MARGIN - 6.0, y + 4.0, y_max * frac);
    }
    let _ = write!(doc, r#"<line x1="{m}" y1="{b}" x2="{r}" y2="{b}" stroke="black"/>"#, m = MARGIN, b = bottom, r = WIDTH - MARGIN);
    let _ = write!(doc, r#"<line x1="{m}" y1="{t}" x2="{m}" y2="{b}" stroke="black"/>"#, m = MARGIN, t = MARGIN, b = bottom);
}

fn bar(doc: &mut String, x: f64, w: f64, value: f64, y_max: f64, fill: &str) {
    let plot_h = HEIGHT - 2.0 * MARGIN;
    let h = if y_max > 0.0 { plot_h * (value.max(0.0) / y_max) } else { 0.0 };
    let _ = write!(
        doc,
        r#"<rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" fill="{}" stroke="black" stroke-width="0.5"/>"#,
        x,
        HEIGHT - MARGIN - h,
        w,
        h,
        fill
    );
}

/// Bar chart of per-student marks, one bar per record in insertion order.
pub fn bar_chart_svg(marks: &[f64]) -> Vec<u8> {
    let mut doc = String::new();
    open(&mut doc, "Student Marks - Bar Chart", "Student Index", "Marks");
    let y_max = marks.iter().copied().fold(0.0, f64::max);
    axes(&mut doc, y_max);
    let slot = (WIDTH - 2.0 * MARGIN) / marks.len().max(1) as f64;
    for (i, m) in marks.iter().enumerate() {
        let x = MARGIN + slot * i as f64;
        bar(&mut doc, x + slot * 0.1, slot * 0.8, *m, y_max, "steelblue");
        // every fifth index is labelled, starting at 1
        if i % 5 == 0 {
            let _ = write!(doc, r#"<text x="{:.1}" y="{}" font-size="11" text-anchor="middle">{}</text>"#, x + slot / 2.0, HEIGHT - MARGIN + 16.0, i + 1);
        }
    }
    doc.push_str("</svg>");
    doc.into_bytes()
}

/// Histogram of the marks distribution over [`HISTOGRAM_BINS`] bins.
pub fn histogram_svg(marks: &[f64]) -> Vec<u8> {
    let bins = histogram_bins(marks, HISTOGRAM_BINS);
    let mut doc = String::new();
    open(&mut doc, "Marks Distribution - Histogram", "Marks", "Frequency");
    let y_max = bins.iter().map(|b| b.count).max().unwrap_or(0) as f64;
    axes(&mut doc, y_max);
    let slot = (WIDTH - 2.0 * MARGIN) / bins.len().max(1) as f64;
    for (i, b) in bins.iter().enumerate() {
        let x = MARGIN + slot * i as f64;
        bar(&mut doc, x, slot, b.count as f64, y_max, "coral");
        let _ = write!(doc, r#"<text x="{:.1}" y="{}" font-size="10" text-anchor="middle">{:.1}</text>"#, x, HEIGHT - MARGIN + 16.0, b.lo);
    }
    doc.push_str("</svg>");
    doc.into_bytes()
}
