//! Dashboard configuration: environment first, page URL parameters on top.

use std::time::Duration;

use serde::Serialize;
use url::Url;

use crate::error::{DashboardError, Result};
use crate::manifest::{DEFAULT_LAYOUT, DEFAULT_LIMIT};

pub const DEFAULT_REFRESH_MS: u64 = 20_000;

/// Live pages read canvases from the monitoring server as published;
/// past-run pages read bare histograms from archived containers and compare
/// them against a reference container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    Live,
    PastRun,
}

impl DisplayMode {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "live" => Ok(DisplayMode::Live),
            "pastrun" | "past-run" => Ok(DisplayMode::PastRun),
            other => Err(DashboardError::Config(format!("unknown mode '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardConfig {
    pub base_url: String,
    /// Display type (`hlt`, `reco`, ...): object prefix on the live server.
    pub display_type: Option<String>,
    pub mode: DisplayMode,
    pub refresh_ms: u64,
    pub manifest: Option<String>,
    pub directory: Option<String>,
    pub layout: String,
    pub limit: usize,
    pub prefix: Option<String>,
    pub root_container: Option<String>,
    pub reference_container: Option<String>,
    pub canvas_container: Option<String>,
    pub index: Option<String>,
    pub release: Option<String>,
    /// Set for history pages: the `/history/<dir>/` folder of trend images.
    pub history_dir: Option<String>,
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            display_type: None,
            mode: DisplayMode::Live,
            refresh_ms: DEFAULT_REFRESH_MS,
            manifest: None,
            directory: None,
            layout: DEFAULT_LAYOUT.to_string(),
            limit: DEFAULT_LIMIT,
            prefix: None,
            root_container: None,
            reference_container: None,
            canvas_container: None,
            index: None,
            release: None,
            history_dir: None,
        }
    }
}

impl DashboardConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let root_container = env_opt("DQM_ROOTFILE");
        let mode = env_opt("DQM_MODE")
            .and_then(|m| DisplayMode::parse(&m).ok())
            .unwrap_or(if root_container.is_some() {
                DisplayMode::PastRun
            } else {
                DisplayMode::Live
            });
        Self {
            base_url: env_opt("DQM_BASE_URL").unwrap_or(defaults.base_url),
            display_type: env_opt("DQM_TYPE"),
            mode,
            refresh_ms: env_parse("DQM_REFRESH_MS").unwrap_or(DEFAULT_REFRESH_MS),
            manifest: env_opt("DQM_JSONFILE"),
            directory: env_opt("DQM_DIRECTORY"),
            layout: env_opt("DQM_LAYOUT").unwrap_or(defaults.layout),
            limit: env_parse("DQM_LIMIT").unwrap_or(DEFAULT_LIMIT),
            prefix: env_opt("DQM_PREFIX"),
            root_container,
            reference_container: env_opt("DQM_REFFILE"),
            canvas_container: env_opt("DQM_CANVASFILE"),
            index: env_opt("DQM_INDEX"),
            release: env_opt("DQM_RELEASE"),
            history_dir: env_opt("DQM_HISTORY_DIR"),
        }
    }

    /// Layer navigation parameters from a page URL on top of this config.
    pub fn apply_query(&mut self, url: &Url) -> Result<()> {
        for (key, value) in url.query_pairs() {
            let value = value.into_owned();
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                "type" => self.display_type = Some(value),
                "jsonfile" => self.manifest = Some(value),
                "directory" => self.directory = Some(value),
                "layout" => self.layout = value,
                "limit" => {
                    self.limit = value.parse().map_err(|_| {
                        DashboardError::Config(format!("limit '{}' is not a number", value))
                    })?
                }
                "prefix" => self.prefix = Some(value),
                "rootfile" => {
                    self.root_container = Some(value);
                    self.mode = DisplayMode::PastRun;
                }
                "reffile" => self.reference_container = Some(value),
                "canvasfile" => self.canvas_container = Some(value),
                "index" => self.index = Some(value),
                "dirname" => self.history_dir = Some(value),
                // unknown parameters belong to the presentation layer
                _ => {}
            }
        }
        Ok(())
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.refresh_ms)
    }

    /// HTTP request limit: a tenth under the tick, so a hung request is
    /// given up before the next pass asks again.
    pub fn fetch_timeout(&self) -> Duration {
        (self.tick() * 9 / 10).max(Duration::from_millis(100))
    }

    pub fn validate(&self) -> Result<()> {
        if self.refresh_ms == 0 {
            return Err(DashboardError::Config("refresh interval must be positive".into()));
        }
        if self.limit == 0 {
            return Err(DashboardError::Config("entry limit must be positive".into()));
        }
        if self.mode == DisplayMode::PastRun && self.root_container.is_none() {
            return Err(DashboardError::Config("past-run mode needs a root container".into()));
        }
        Ok(())
    }
}
