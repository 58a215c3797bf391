//! Render capability and view-models.
//!
//! The engine never builds markup. It issues [`DrawCommand`]s against named
//! views through a [`Renderer`] and describes the page through [`PageView`];
//! a presentation layer turns both into pixels.

use std::io::Write;
use std::sync::Mutex;

use serde::Serialize;

use crate::compare::Comparison;
use crate::manifest::Manifest;
use crate::object::RemoteObject;
use crate::path::{history_image_href, ObjectPath};

pub trait Renderer: Send + Sync {
    /// Draw into a view, on top of what is there.
    fn draw(&self, view: &str, object: &RemoteObject, option: &str);
    /// Replace the content of a view.
    fn redraw(&self, view: &str, object: &RemoteObject, option: &str);
    fn clear(&self, view: &str);
    /// Inline placeholder text.
    fn show_text(&self, view: &str, text: &str);
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum DrawCommand {
    Draw { view: String, option: String, object: RemoteObject },
    Redraw { view: String, option: String, object: RemoteObject },
    Clear { view: String },
    Text { view: String, text: String },
}

impl DrawCommand {
    pub fn view(&self) -> &str {
        match self {
            DrawCommand::Draw { view, .. }
            | DrawCommand::Redraw { view, .. }
            | DrawCommand::Clear { view }
            | DrawCommand::Text { view, .. } => view,
        }
    }

    /// Object and option for draw/redraw commands.
    pub fn drawn(&self) -> Option<(&RemoteObject, &str)> {
        match self {
            DrawCommand::Draw { object, option, .. }
            | DrawCommand::Redraw { object, option, .. } => Some((object, option.as_str())),
            _ => None,
        }
    }
}

pub fn placeholder_text(name: &str) -> String {
    format!("Can not get {}", name)
}

/// Issue the draw sequence for one comparison outcome.
pub fn render_comparison(renderer: &dyn Renderer, view: &str, comparison: &Comparison) {
    match comparison {
        Comparison::Overlay(result) => {
            renderer.clear(view);
            renderer.draw(view, &result.base, &result.base_option);
            if let Some(overlay) = &result.overlay {
                renderer.draw(view, overlay, &result.overlay_option);
            }
        }
        Comparison::Direct { object, option } => renderer.redraw(view, object, option),
        Comparison::NotFound { name } => renderer.show_text(view, &placeholder_text(name)),
    }
}

// =============================================================================
// Renderers
// =============================================================================

/// Keeps every command in memory; what tests and embedding hosts read back.
#[derive(Default)]
pub struct RecordingRenderer {
    commands: Mutex<Vec<DrawCommand>>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, cmd: DrawCommand) {
        if let Ok(mut commands) = self.commands.lock() {
            commands.push(cmd);
        }
    }

    pub fn commands(&self) -> Vec<DrawCommand> {
        self.commands.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn commands_for(&self, view: &str) -> Vec<DrawCommand> {
        self.commands().into_iter().filter(|c| c.view() == view).collect()
    }

    pub fn take(&self) -> Vec<DrawCommand> {
        self.commands
            .lock()
            .map(|mut c| std::mem::take(&mut *c))
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.commands.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Renderer for RecordingRenderer {
    fn draw(&self, view: &str, object: &RemoteObject, option: &str) {
        self.push(DrawCommand::Draw {
            view: view.to_string(),
            option: option.to_string(),
            object: object.clone(),
        });
    }

    fn redraw(&self, view: &str, object: &RemoteObject, option: &str) {
        self.push(DrawCommand::Redraw {
            view: view.to_string(),
            option: option.to_string(),
            object: object.clone(),
        });
    }

    fn clear(&self, view: &str) {
        self.push(DrawCommand::Clear { view: view.to_string() });
    }

    fn show_text(&self, view: &str, text: &str) {
        self.push(DrawCommand::Text {
            view: view.to_string(),
            text: text.to_string(),
        });
    }
}

/// Streams commands as JSON lines on stdout for an external viewer.
#[derive(Default)]
pub struct JsonLinesRenderer {
    out: Mutex<()>,
}

impl JsonLinesRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    fn emit(&self, cmd: DrawCommand) {
        let Ok(line) = serde_json::to_string(&cmd) else {
            return;
        };
        // one writer at a time so lines never interleave
        if let Ok(_guard) = self.out.lock() {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            let _ = writeln!(lock, "{}", line);
            let _ = lock.flush();
        }
    }
}

impl Renderer for JsonLinesRenderer {
    fn draw(&self, view: &str, object: &RemoteObject, option: &str) {
        self.emit(DrawCommand::Draw {
            view: view.to_string(),
            option: option.to_string(),
            object: object.clone(),
        });
    }

    fn redraw(&self, view: &str, object: &RemoteObject, option: &str) {
        self.emit(DrawCommand::Redraw {
            view: view.to_string(),
            option: option.to_string(),
            object: object.clone(),
        });
    }

    fn clear(&self, view: &str) {
        self.emit(DrawCommand::Clear { view: view.to_string() });
    }

    fn show_text(&self, view: &str, text: &str) {
        self.emit(DrawCommand::Text {
            view: view.to_string(),
            text: text.to_string(),
        });
    }
}

// =============================================================================
// Page view-model
// =============================================================================

/// Live pages are drawn by the scheduler; history pages show static images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageKind {
    Live,
    History,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewSlot {
    pub id: String,
    /// Layout class; the stylesheet positions slots by their view id.
    pub class: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageView {
    pub kind: PageKind,
    pub stylesheet_href: String,
    pub slots: Vec<ViewSlot>,
    pub info: Option<String>,
}

impl PageView {
    /// One slot per manifest entry, in render order.
    pub fn scaffold(manifest: &Manifest) -> Self {
        Self::build(PageKind::Live, manifest, |_| None)
    }

    /// History page: every slot holds the archived trend image of its entry.
    pub fn history(manifest: &Manifest, dirname: &str) -> Self {
        Self::build(PageKind::History, manifest, |path| {
            Some(history_image_href(dirname, &ObjectPath::parse(path)))
        })
    }

    fn build(kind: PageKind, manifest: &Manifest, image: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            kind,
            stylesheet_href: format!("/css/{}", manifest.stylesheet),
            slots: manifest
                .entries
                .iter()
                .map(|e| ViewSlot {
                    id: e.view_id.clone(),
                    class: e.view_id.clone(),
                    image: image(manifest.resolve_path(e)),
                })
                .collect(),
            info: None,
        }
    }
}

/// Info line shown above the grid: page title plus the server's run summary.
pub fn info_line(page_title: &str, summary: &str, release: Option<&str>) -> String {
    let mut line = format!("{}     {}", page_title, summary);
    if let Some(release) = release {
        line.push_str(", Release ");
        line.push_str(release);
    }
    line
}
