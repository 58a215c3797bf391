//! Path grammar shared by the whole dashboard.
//!
//! Object paths look like `DIR/c_name`: the `c_` prefix names the canvas the
//! histogram was published in, the bare `name` is the histogram itself, and
//! the reference copy lives under `ref/DIR/name`. Run numbers are read from
//! container file names such as `/data/dqm_e0012r001234.root`.

use std::fmt;

use serde::Serialize;

use crate::error::{DashboardError, Result};

const CANVAS_PREFIX: &str = "c_";
const REFERENCE_ROOT: &str = "ref";
const HISTORY_ROOT: &str = "/history";
/// Marks trend variants of a canvas; history images are named without it.
const TREND_MARKER: &str = "v_";

/// Object names may not contain brackets on the wire.
pub fn sanitize_name(name: &str) -> String {
    name.replace(['[', ']'], "_")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectPath {
    dir: String,
    name: String,
}

impl ObjectPath {
    pub fn parse(raw: &str) -> Self {
        let clean = sanitize_name(raw.trim_start_matches('/'));
        match clean.split_once('/') {
            Some((dir, name)) => Self {
                dir: dir.to_string(),
                name: name.to_string(),
            },
            None => Self {
                dir: String::new(),
                name: clean,
            },
        }
    }

    pub fn dir(&self) -> &str {
        &self.dir
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path as published, canvas prefix included.
    pub fn canvas_path(&self) -> String {
        join(&self.dir, &self.name)
    }

    /// Path of the bare histogram (canvas prefix stripped).
    pub fn histogram_path(&self) -> String {
        let name = self.name.strip_prefix(CANVAS_PREFIX).unwrap_or(&self.name);
        join(&self.dir, name)
    }

    pub fn reference_path(&self) -> String {
        format!("{}/{}", REFERENCE_ROOT, self.histogram_path())
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canvas_path())
    }
}

fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}

/// Run number in canonical form: decimal digits, no leading zeros.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RunIdentifier(String);

impl RunIdentifier {
    pub fn from_digits(digits: &str) -> Option<Self> {
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let trimmed = digits.trim_start_matches('0');
        let canonical = if trimmed.is_empty() { "0" } else { trimmed };
        Some(Self(canonical.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric value, if it fits.
    pub fn as_u64(&self) -> Option<u64> {
        self.0.parse().ok()
    }
}

impl fmt::Display for RunIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Find `r<digits>` in a container path and return the run number.
///
/// Separators are normalized and a leading `#` (fragment marker) dropped.
/// Segments are scanned from the last one back; within a segment only the
/// stem (text before the first `.`) is considered.
pub fn extract_run_number(path: &str) -> Result<RunIdentifier> {
    let normalized = path.replace('\\', "/");
    let normalized = normalized.trim_start_matches('#');
    normalized
        .rsplit('/')
        .filter(|seg| !seg.is_empty())
        .find_map(|seg| run_digits_in(seg.split('.').next().unwrap_or(seg)))
        .and_then(RunIdentifier::from_digits)
        .ok_or_else(|| DashboardError::MalformedPath(path.to_string()))
}

fn run_digits_in(stem: &str) -> Option<&str> {
    let bytes = stem.as_bytes();
    let mut found = None;
    for (i, b) in bytes.iter().enumerate() {
        if *b != b'r' {
            continue;
        }
        let start = i + 1;
        let end = bytes[start..]
            .iter()
            .position(|c| !c.is_ascii_digit())
            .map(|p| start + p)
            .unwrap_or(bytes.len());
        if end == start {
            continue;
        }
        let terminated = end == bytes.len() || !bytes[end].is_ascii_alphanumeric();
        if terminated {
            found = Some(&stem[start..end]);
        }
    }
    found
}

/// Menu id of a manifest: the file stem of its last segment.
pub fn menu_id(manifest_path: &str) -> String {
    let last = manifest_path
        .rsplit('/')
        .find(|s| !s.is_empty())
        .unwrap_or(manifest_path);
    last.split('.').next().unwrap_or(last).to_string()
}

/// Image of the archived trend plot for an object path:
/// `/history/<dirname>/<DIR>_<name>.png`, canvas prefix and the first trend
/// marker dropped from the name.
pub fn history_image_href(dirname: &str, path: &ObjectPath) -> String {
    let name = path.name().strip_prefix(CANVAS_PREFIX).unwrap_or(path.name());
    let name = name.replacen(TREND_MARKER, "", 1);
    let dirname = dirname.trim_matches('/');
    format!("{}/{}/{}_{}.png", HISTORY_ROOT, dirname, path.dir(), name)
}

/// Manifest paths are served from the site root.
pub fn normalize_manifest_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}
