//! Container wiring for a page: where current, reference and canvas objects come from.

use std::sync::Arc;
use std::time::Duration;

use crate::config::{DashboardConfig, DisplayMode};
use crate::error::{DashboardError, Result};
use crate::path::ObjectPath;
use crate::source::{DirObjectSource, HttpObjectSource, ObjectSource};

/// The containers a dashboard reads from, passed to every component.
#[derive(Clone)]
pub struct DashboardContext {
    pub root: Arc<dyn ObjectSource>,
    pub reference: Option<Arc<dyn ObjectSource>>,
    /// Secondary container holding the published canvases.
    pub canvas: Option<Arc<dyn ObjectSource>>,
    pub mode: DisplayMode,
}

impl DashboardContext {
    pub fn live(root: Arc<dyn ObjectSource>) -> Self {
        Self {
            root,
            reference: None,
            canvas: None,
            mode: DisplayMode::Live,
        }
    }

    pub fn past_run(
        root: Arc<dyn ObjectSource>,
        reference: Option<Arc<dyn ObjectSource>>,
        canvas: Option<Arc<dyn ObjectSource>>,
    ) -> Self {
        Self {
            root,
            reference,
            canvas,
            mode: DisplayMode::PastRun,
        }
    }

    /// Path to fetch from the root container for a manifest path.
    pub fn current_path(&self, path: &ObjectPath) -> String {
        match self.mode {
            DisplayMode::Live => path.canvas_path(),
            DisplayMode::PastRun => path.histogram_path(),
        }
    }

    pub fn from_config(cfg: &DashboardConfig) -> Result<Self> {
        let timeout = cfg.fetch_timeout();
        match cfg.mode {
            DisplayMode::Live => {
                let prefix = cfg.display_type.as_deref().unwrap_or("");
                let root =
                    HttpObjectSource::with_timeout("live", &cfg.base_url, prefix, timeout)?;
                Ok(Self::live(Arc::new(root)))
            }
            DisplayMode::PastRun => {
                let root_loc = cfg.root_container.as_deref().ok_or_else(|| {
                    DashboardError::Config("past-run mode needs a root container".into())
                })?;
                let root = open_container("root", root_loc, timeout)?;
                let reference = cfg
                    .reference_container
                    .as_deref()
                    .map(|loc| open_container("reference", loc, timeout))
                    .transpose()?;
                let canvas = cfg
                    .canvas_container
                    .as_deref()
                    .map(|loc| open_container("canvas", loc, timeout))
                    .transpose()?;
                Ok(Self::past_run(root, reference, canvas))
            }
        }
    }
}

/// URLs open over HTTP, anything else is an exported directory on disk.
pub fn open_container(
    label: &str,
    location: &str,
    timeout: Duration,
) -> Result<Arc<dyn ObjectSource>> {
    if location.starts_with("http://") || location.starts_with("https://") {
        Ok(Arc::new(HttpObjectSource::with_timeout(label, location, "", timeout)?))
    } else {
        Ok(Arc::new(DirObjectSource::new(label, location)))
    }
}
