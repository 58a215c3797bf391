//! Layout manifests: which objects go into which views, in which order.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{DashboardError, Result};

pub const DEFAULT_LAYOUT: &str = "grid3x4.css";
pub const DEFAULT_LIMIT: usize = 12;

/// Archived runs store these canvases without the detector suffix the live
/// server publishes.
pub const PAST_RUN_ALIASES: &[(&str, &str)] = &[
    ("TOP/c_hitsPerEvent_top", "TOP/c_hitsPerEvent"),
    ("BKLM/c_xvsz_bklm", "BKLM/c_xvsz"),
];

/// What to do when the primary container has no object for an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FallbackPolicy {
    PrimaryOnly,
    #[default]
    PrimaryThenSecondary,
}

impl FallbackPolicy {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "primary-only" => Ok(FallbackPolicy::PrimaryOnly),
            "primary-then-secondary" => Ok(FallbackPolicy::PrimaryThenSecondary),
            other => Err(DashboardError::parse(
                "manifest",
                format!("unknown fallback policy '{}'", other),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub path: String,
    pub view_id: String,
    pub draw_option: Option<String>,
    pub hist_option: Option<String>,
    pub title_prefix: Option<String>,
}

impl Entry {
    pub fn new(path: &str, view_id: &str) -> Self {
        Self {
            path: path.to_string(),
            view_id: view_id.to_string(),
            draw_option: None,
            hist_option: None,
            title_prefix: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Manifest {
    pub stylesheet: String,
    pub entries: Vec<Entry>,
    pub fallback: FallbackPolicy,
    /// Object-path substitutions applied before fetching.
    pub aliases: BTreeMap<String, String>,
}

fn non_empty(v: Option<&Value>) -> Result<Option<String>> {
    match v {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(DashboardError::parse(
            "manifest",
            format!("expected string field, got {}", other),
        )),
    }
}

fn parse_entry(idx: usize, raw: &Value) -> Result<Entry> {
    let fields = raw.as_array().ok_or_else(|| {
        DashboardError::parse("manifest", format!("entry {} is not an array", idx))
    })?;
    if fields.len() < 2 || fields.len() > 5 {
        return Err(DashboardError::parse(
            "manifest",
            format!("entry {} has {} fields, expected 2..=5", idx, fields.len()),
        ));
    }
    let missing = |what: &str| {
        DashboardError::parse("manifest", format!("entry {} has empty {}", idx, what))
    };
    let path = non_empty(fields.first())?.ok_or_else(|| missing("path"))?;
    let view_id = non_empty(fields.get(1))?.ok_or_else(|| missing("view id"))?;
    Ok(Entry {
        path,
        view_id,
        draw_option: non_empty(fields.get(2))?,
        hist_option: non_empty(fields.get(3))?,
        title_prefix: non_empty(fields.get(4))?,
    })
}

/// Decode a fetched manifest document.
pub fn parse_manifest(raw: &Value) -> Result<Manifest> {
    let histos = raw
        .get("histos")
        .ok_or_else(|| DashboardError::parse("manifest", "missing 'histos'"))?
        .as_array()
        .ok_or_else(|| DashboardError::parse("manifest", "'histos' is not an array"))?;

    let mut seen = HashSet::new();
    let mut entries = Vec::with_capacity(histos.len());
    for (idx, item) in histos.iter().enumerate() {
        let entry = parse_entry(idx, item)?;
        if !seen.insert(entry.view_id.clone()) {
            return Err(DashboardError::parse(
                "manifest",
                format!("duplicate view id '{}'", entry.view_id),
            ));
        }
        entries.push(entry);
    }

    let stylesheet = non_empty(raw.get("cssfile"))?.unwrap_or_else(|| DEFAULT_LAYOUT.to_string());
    let fallback = match non_empty(raw.get("fallback"))? {
        Some(s) => FallbackPolicy::parse(&s)?,
        None => FallbackPolicy::default(),
    };
    let mut aliases = BTreeMap::new();
    if let Some(map) = raw.get("aliases") {
        let map = map
            .as_object()
            .ok_or_else(|| DashboardError::parse("manifest", "'aliases' is not an object"))?;
        for (from, to) in map {
            let to = to.as_str().ok_or_else(|| {
                DashboardError::parse("manifest", format!("alias for '{}' is not a string", from))
            })?;
            aliases.insert(from.clone(), to.to_string());
        }
    }

    Ok(Manifest {
        stylesheet,
        entries,
        fallback,
        aliases,
    })
}

impl Manifest {
    /// Synthetic manifest for a container directory listing.
    ///
    /// Views are named `canvas01`, `canvas02`, ... in listing order.
    pub fn from_directory(
        dir: &str,
        names: &[String],
        layout: Option<&str>,
        limit: Option<usize>,
        prefix: Option<&str>,
    ) -> Self {
        let limit = limit.unwrap_or(DEFAULT_LIMIT);
        let entries = names
            .iter()
            .filter(|name| prefix.map_or(true, |p| name.starts_with(p)))
            .take(limit)
            .enumerate()
            .map(|(i, name)| {
                Entry::new(&format!("{}/{}", dir, name), &format!("canvas{:02}", i + 1))
            })
            .collect();
        Self {
            stylesheet: layout.unwrap_or(DEFAULT_LAYOUT).to_string(),
            entries,
            fallback: FallbackPolicy::default(),
            aliases: BTreeMap::new(),
        }
    }

    /// Object path to fetch for an entry, after alias substitution.
    pub fn resolve_path<'a>(&'a self, entry: &'a Entry) -> &'a str {
        self.aliases
            .get(&entry.path)
            .map(String::as_str)
            .unwrap_or(&entry.path)
    }

    /// Seed the archived-run aliases when the manifest declares none.
    pub fn with_past_run_aliases(mut self) -> Self {
        if self.aliases.is_empty() {
            self.aliases = PAST_RUN_ALIASES
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect();
        }
        self
    }

    /// sha256 of the canonical JSON form.
    pub fn fingerprint(&self) -> String {
        let canonical = serde_json::to_string(self).unwrap_or_default();
        hex::encode(Sha256::digest(canonical.as_bytes()))
    }
}
