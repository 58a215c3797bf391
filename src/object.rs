//! Typed view of the objects served by the monitoring containers.
//!
//! Containers hand out the JSON object encoding used by the monitoring HTTP
//! server (`_typename`, `fEntries`, `fArray`, ...). Only the fields the
//! comparator and the decorations touch are decoded; everything else is
//! ignored.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DashboardError, Result};

/// ROOT line style for dashed lines.
pub const LINE_STYLE_DASHED: i32 = 2;
/// ROOT palette index used for reference overlays (green).
pub const REFERENCE_LINE_COLOR: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Hist1D,
    Hist2D,
    Canvas,
    Unknown,
}

impl ObjectKind {
    pub fn from_typename(typename: &str) -> Self {
        if typename.starts_with("TH1") {
            ObjectKind::Hist1D
        } else if typename.starts_with("TH2") {
            ObjectKind::Hist2D
        } else if typename == "TCanvas" || typename == "TPad" {
            ObjectKind::Canvas
        } else {
            ObjectKind::Unknown
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteObject {
    pub kind: ObjectKind,
    pub typename: String,
    pub name: String,
    pub title: String,
    /// Number of fills (event count).
    pub entries: f64,
    /// Cell contents, under/overflow cells included.
    pub bins: Vec<f64>,
    /// Highest valid cell index is `cell_count - 1`; bin loops run to
    /// `cell_count` inclusive and read zero past the end.
    pub cell_count: usize,
    pub line_color: i32,
    pub line_style: i32,
    pub log_y: bool,
    pub option: String,
    pub primitives: Vec<RemoteObject>,
}

#[derive(Debug, Deserialize)]
struct RawList {
    #[serde(default)]
    arr: Vec<Value>,
    #[serde(default)]
    opt: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawObject {
    #[serde(rename = "_typename", default)]
    typename: String,
    #[serde(rename = "fName", default)]
    name: String,
    #[serde(rename = "fTitle", default)]
    title: String,
    #[serde(rename = "fEntries", default)]
    entries: f64,
    #[serde(rename = "fArray", default)]
    array: Vec<f64>,
    #[serde(rename = "fNcells")]
    ncells: Option<usize>,
    #[serde(rename = "fLineColor", default = "default_line_color")]
    line_color: i32,
    #[serde(rename = "fLineStyle", default = "default_line_style")]
    line_style: i32,
    #[serde(rename = "fLogy", default)]
    logy: i32,
    #[serde(rename = "fOption", default)]
    option: String,
    #[serde(rename = "fPrimitives")]
    primitives: Option<RawList>,
}

fn default_line_color() -> i32 {
    1
}

fn default_line_style() -> i32 {
    1
}

impl RemoteObject {
    pub fn from_json(value: &Value) -> Result<Self> {
        let raw: RawObject = serde_json::from_value(value.clone())
            .map_err(|e| DashboardError::parse("object", e.to_string()))?;
        let mut primitives = Vec::new();
        if let Some(list) = raw.primitives {
            for (i, item) in list.arr.iter().enumerate() {
                let mut prim = RemoteObject::from_json(item)?;
                // list options win over the primitive's own option
                if let Some(opt) = list.opt.get(i).filter(|o| !o.is_empty()) {
                    prim.option = opt.clone();
                }
                primitives.push(prim);
            }
        }
        let cell_count = raw.ncells.unwrap_or(raw.array.len());
        Ok(Self {
            kind: ObjectKind::from_typename(&raw.typename),
            typename: raw.typename,
            name: raw.name,
            title: raw.title,
            entries: raw.entries,
            bins: raw.array,
            cell_count,
            line_color: raw.line_color,
            line_style: raw.line_style,
            log_y: raw.logy != 0,
            option: raw.option,
            primitives,
        })
    }

    fn blank(kind: ObjectKind, typename: &str, title: &str) -> Self {
        Self {
            kind,
            typename: typename.to_string(),
            name: String::new(),
            title: title.to_string(),
            entries: 0.0,
            bins: Vec::new(),
            cell_count: 0,
            line_color: default_line_color(),
            line_style: default_line_style(),
            log_y: false,
            option: String::new(),
            primitives: Vec::new(),
        }
    }

    pub fn hist1d(title: &str, entries: f64, bins: Vec<f64>) -> Self {
        let mut h = Self::blank(ObjectKind::Hist1D, "TH1F", title);
        h.entries = entries;
        h.cell_count = bins.len();
        h.bins = bins;
        h
    }

    pub fn hist2d(title: &str, entries: f64, bins: Vec<f64>) -> Self {
        let mut h = Self::blank(ObjectKind::Hist2D, "TH2F", title);
        h.entries = entries;
        h.cell_count = bins.len();
        h.bins = bins;
        h
    }

    /// Canvas whose primary histogram sits behind a frame at index 1.
    pub fn canvas(title: &str, primary: RemoteObject) -> Self {
        let mut c = Self::blank(ObjectKind::Canvas, "TCanvas", title);
        c.primitives = vec![Self::blank(ObjectKind::Unknown, "TFrame", ""), primary];
        c
    }

    pub fn bin_content(&self, i: usize) -> f64 {
        self.bins.get(i).copied().unwrap_or(0.0)
    }

    pub fn set_bin_content(&mut self, i: usize, v: f64) {
        if let Some(slot) = self.bins.get_mut(i) {
            *slot = v;
        }
    }

    /// Largest content over cells `0..=cell_count`, never below zero.
    pub fn max_bin_content(&self) -> f64 {
        (0..=self.cell_count)
            .map(|i| self.bin_content(i))
            .fold(0.0, f64::max)
    }

    /// The histogram a canvas was drawn from, if any.
    pub fn primary_primitive_mut(&mut self) -> Option<&mut RemoteObject> {
        self.primitives.get_mut(1)
    }
}

/// Names of the sub-objects listed in a container directory document.
pub fn parse_folder_listing(value: &Value) -> Result<Vec<String>> {
    let arr = value
        .get("fFolders")
        .and_then(|f| f.get("arr"))
        .and_then(Value::as_array)
        .ok_or_else(|| DashboardError::parse("directory listing", "missing fFolders.arr"))?;
    Ok(arr
        .iter()
        .filter_map(|item| item.get("fName").and_then(Value::as_str))
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_from_typename() {
        assert_eq!(ObjectKind::from_typename("TH1F"), ObjectKind::Hist1D);
        assert_eq!(ObjectKind::from_typename("TH1D"), ObjectKind::Hist1D);
        assert_eq!(ObjectKind::from_typename("TH2F"), ObjectKind::Hist2D);
        assert_eq!(ObjectKind::from_typename("TCanvas"), ObjectKind::Canvas);
        assert_eq!(ObjectKind::from_typename("TProfile"), ObjectKind::Unknown);
    }

    #[test]
    fn test_decode_hist1d() {
        let v = json!({
            "_typename": "TH1F",
            "fName": "hits",
            "fTitle": "Hits per event",
            "fEntries": 200,
            "fNcells": 5,
            "fArray": [0, 1, 2, 3, 0],
            "fLineColor": 602
        });
        let h = RemoteObject::from_json(&v).unwrap();
        assert_eq!(h.kind, ObjectKind::Hist1D);
        assert_eq!(h.entries, 200.0);
        assert_eq!(h.cell_count, 5);
        assert_eq!(h.line_color, 602);
        assert_eq!(h.line_style, 1);
        assert_eq!(h.bin_content(3), 3.0);
        assert_eq!(h.bin_content(5), 0.0);
    }

    #[test]
    fn test_decode_canvas_primitives() {
        let v = json!({
            "_typename": "TCanvas",
            "fTitle": "c_hits",
            "fLogy": 0,
            "fPrimitives": {
                "_typename": "TList",
                "arr": [
                    {"_typename": "TFrame"},
                    {"_typename": "TH1F", "fTitle": "hits", "fEntries": 3, "fArray": [1, 1, 1]}
                ],
                "opt": ["", "hist"]
            }
        });
        let mut c = RemoteObject::from_json(&v).unwrap();
        assert_eq!(c.kind, ObjectKind::Canvas);
        assert!(!c.log_y);
        let prim = c.primary_primitive_mut().unwrap();
        assert_eq!(prim.kind, ObjectKind::Hist1D);
        assert_eq!(prim.option, "hist");
    }

    #[test]
    fn test_decode_rejects_non_object() {
        assert!(RemoteObject::from_json(&json!([1, 2, 3])).is_err());
    }

    #[test]
    fn test_out_of_range_write_ignored() {
        let mut h = RemoteObject::hist1d("h", 1.0, vec![1.0, 2.0]);
        h.set_bin_content(7, 9.0);
        assert_eq!(h.bins, vec![1.0, 2.0]);
        assert_eq!(h.max_bin_content(), 2.0);
    }

    #[test]
    fn test_folder_listing() {
        let v = json!({"fFolders": {"arr": [{"fName": "c_a"}, {"fName": "c_b"}, {"x": 1}]}});
        assert_eq!(parse_folder_listing(&v).unwrap(), vec!["c_a", "c_b"]);
        assert!(parse_folder_listing(&json!({})).is_err());
    }
}
