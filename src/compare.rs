//! Histogram comparison: normalize a reference to the live event count and
//! decide which series is drawn first.
//!
//! The first-drawn series fixes the axis range, so the series with the larger
//! peak always goes first and the other is overlaid with `"same"`.

use serde::Serialize;

use crate::manifest::Entry;
use crate::object::{ObjectKind, RemoteObject, LINE_STYLE_DASHED, REFERENCE_LINE_COLOR};

pub const OPT_HIST: &str = "hist";
pub const OPT_SAME: &str = "same";
pub const OPT_COLZ: &str = "colz";
pub const OPT_LOGY: &str = "logy";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonResult {
    pub base: RemoteObject,
    pub overlay: Option<RemoteObject>,
    pub base_option: String,
    pub overlay_option: String,
    /// True when the scaled reference sets the axis range.
    pub reference_first: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Comparison {
    Overlay(ComparisonResult),
    Direct { object: RemoteObject, option: String },
    NotFound { name: String },
}

impl Comparison {
    pub fn direct(object: RemoteObject, option: &str) -> Self {
        Comparison::Direct {
            object,
            option: option.to_string(),
        }
    }

    pub fn outcome(&self) -> &'static str {
        match self {
            Comparison::Overlay(_) => "overlay",
            Comparison::Direct { .. } => "direct",
            Comparison::NotFound { .. } => "not_found",
        }
    }
}

/// Compare with no pass-through option for canvases and unknown objects.
pub fn compare(
    current: Option<RemoteObject>,
    reference: Option<RemoteObject>,
    name: &str,
) -> Comparison {
    compare_with(current, reference, name, "")
}

/// `passthrough` is the draw option used for objects that are neither 1D nor
/// 2D histograms (canvases are drawn the way they were published).
pub fn compare_with(
    current: Option<RemoteObject>,
    reference: Option<RemoteObject>,
    name: &str,
    passthrough: &str,
) -> Comparison {
    let Some(current) = current else {
        return Comparison::NotFound {
            name: name.to_string(),
        };
    };
    match current.kind {
        ObjectKind::Hist2D => Comparison::direct(current, OPT_COLZ),
        ObjectKind::Hist1D => match reference {
            Some(reference) if reference.entries != 0.0 => {
                Comparison::Overlay(overlay_1d(current, reference))
            }
            _ => Comparison::direct(current, OPT_HIST),
        },
        ObjectKind::Canvas | ObjectKind::Unknown => Comparison::direct(current, passthrough),
    }
}

/// Scale factor applied to the reference; `None` when it carries no entries.
pub fn scale_factor(current: &RemoteObject, reference: &RemoteObject) -> Option<f64> {
    if reference.entries == 0.0 {
        None
    } else {
        Some(current.entries / reference.entries)
    }
}

fn overlay_1d(current: RemoteObject, mut reference: RemoteObject) -> ComparisonResult {
    let factor = current.entries / reference.entries;
    // each series is scanned over its own cells; binnings may differ
    let max_current = current.max_bin_content();
    let mut max_reference = 0.0_f64;
    // the reference is a transient copy, rescale in place
    for i in 0..=reference.cell_count {
        let scaled = reference.bin_content(i) * factor;
        reference.set_bin_content(i, scaled);
        max_reference = max_reference.max(scaled);
    }
    reference.line_style = LINE_STYLE_DASHED;
    reference.line_color = REFERENCE_LINE_COLOR;
    reference.title = current.title.clone();

    if max_reference > max_current {
        ComparisonResult {
            base: reference,
            overlay: Some(current),
            base_option: OPT_HIST.to_string(),
            overlay_option: OPT_SAME.to_string(),
            reference_first: true,
        }
    } else {
        ComparisonResult {
            base: current,
            overlay: Some(reference),
            base_option: OPT_HIST.to_string(),
            overlay_option: OPT_SAME.to_string(),
            reference_first: false,
        }
    }
}

/// Apply the per-entry manifest options to a freshly fetched object.
///
/// `logy` switches the y axis to log scale; the histogram option and title
/// prefix target the canvas's primary histogram, or the object itself when it
/// is a bare histogram.
pub fn decorate(object: &mut RemoteObject, entry: &Entry) {
    if entry.draw_option.as_deref() == Some(OPT_LOGY) {
        object.log_y = true;
    }
    let target = if object.kind == ObjectKind::Canvas {
        match object.primary_primitive_mut() {
            Some(prim) => prim,
            None => return,
        }
    } else {
        object
    };
    if let Some(opt) = &entry.hist_option {
        target.option = opt.clone();
    }
    if let Some(prefix) = &entry.title_prefix {
        target.title = format!("{}: {}", prefix, target.title);
    }
}

/// Draw option for the object of an entry when it is drawn as published.
pub fn passthrough_option(entry: &Entry) -> &str {
    entry.draw_option.as_deref().unwrap_or("")
}
