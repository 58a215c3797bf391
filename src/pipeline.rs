//! Per-entry render chain: fetch current → fall back → fetch reference →
//! compare → draw.
//!
//! Every entry runs on its own; a failure in one never reaches another. The
//! cancel token is checked before any fetch starts and, under its lock,
//! around the draw itself.

use crate::cancel::CancelToken;
use crate::compare::{compare_with, decorate, passthrough_option, scale_factor, Comparison};
use crate::context::DashboardContext;
use crate::logging::{self, obj, v_str, Domain, Level};
use crate::manifest::{Entry, FallbackPolicy};
use crate::object::{ObjectKind, RemoteObject};
use crate::path::ObjectPath;
use crate::render::{info_line, render_comparison, Renderer};
use crate::source::ObjectSource;

pub const INFO_VIEW: &str = "info";
pub const INFO_OBJECT: &str = "DQMInfo/c_info";

/// Fetch one object; transport errors are logged and read as "not found".
pub async fn fetch_or_none(source: &dyn ObjectSource, path: &str) -> Option<RemoteObject> {
    match source.fetch(path).await {
        Ok(Some(obj)) => Some(obj),
        Ok(None) => {
            logging::log_fetch_miss(source.label(), path);
            None
        }
        Err(err) => {
            logging::log_fetch_error(source.label(), path, &err.to_string());
            None
        }
    }
}

/// Resolve what an entry should show. `None` means the token was cancelled
/// before any work was done.
pub async fn resolve_entry(
    ctx: &DashboardContext,
    entry: &Entry,
    object_path: &str,
    policy: FallbackPolicy,
    cancel: &CancelToken,
) -> Option<Comparison> {
    if cancel.is_cancelled() {
        return None;
    }
    let path = ObjectPath::parse(object_path);
    let current_path = ctx.current_path(&path);
    let current = fetch_or_none(ctx.root.as_ref(), &current_path).await;

    let Some(mut current) = current else {
        if let Some(canvas) = secondary(ctx, policy) {
            if let Some(mut obj) = fetch_or_none(canvas, &path.canvas_path()).await {
                decorate(&mut obj, entry);
                return Some(Comparison::direct(obj, passthrough_option(entry)));
            }
        }
        return Some(Comparison::NotFound {
            name: path.canvas_path(),
        });
    };
    decorate(&mut current, entry);

    let reference = match (&ctx.reference, current.kind) {
        (Some(source), ObjectKind::Hist1D) => {
            if cancel.is_cancelled() {
                return None;
            }
            fetch_or_none(source.as_ref(), &path.reference_path()).await
        }
        _ => None,
    };
    if let (Some(r), ObjectKind::Hist1D) = (&reference, current.kind) {
        if scale_factor(&current, r).is_none() {
            logging::log(
                Level::Debug,
                Domain::Compare,
                "empty_reference",
                obj(&[
                    ("view", v_str(&entry.view_id)),
                    ("path", v_str(&path.reference_path())),
                ]),
            );
        }
    }

    let name = path.canvas_path();
    let comparison = compare_with(Some(current), reference, &name, passthrough_option(entry));
    if let Comparison::Overlay(result) = &comparison {
        let (current, reference) = if result.reference_first {
            (result.overlay.as_ref(), Some(&result.base))
        } else {
            (Some(&result.base), result.overlay.as_ref())
        };
        if let (Some(c), Some(r)) = (current, reference) {
            let factor = if r.entries == 0.0 { 0.0 } else { c.entries / r.entries };
            logging::log_scale(
                &entry.view_id,
                factor,
                c.max_bin_content(),
                r.max_bin_content(),
                result.reference_first,
            );
        }
    }
    Some(comparison)
}

fn secondary(ctx: &DashboardContext, policy: FallbackPolicy) -> Option<&dyn ObjectSource> {
    match policy {
        FallbackPolicy::PrimaryOnly => None,
        FallbackPolicy::PrimaryThenSecondary => ctx.canvas.as_deref(),
    }
}

/// Resolve and draw one entry. Returns whether anything was drawn.
pub async fn render_entry(
    ctx: &DashboardContext,
    renderer: &dyn Renderer,
    entry: &Entry,
    object_path: &str,
    policy: FallbackPolicy,
    cancel: &CancelToken,
) -> bool {
    let Some(comparison) = resolve_entry(ctx, entry, object_path, policy, cancel).await else {
        logging::log_dropped_draw(&entry.view_id);
        return false;
    };
    let drawn =
        cancel.run_unless_cancelled(|| render_comparison(renderer, &entry.view_id, &comparison));
    if drawn {
        logging::log(
            Level::Trace,
            Domain::Render,
            "drawn",
            obj(&[
                ("view", v_str(&entry.view_id)),
                ("path", v_str(object_path)),
                ("outcome", v_str(comparison.outcome())),
            ]),
        );
    } else {
        logging::log_dropped_draw(&entry.view_id);
    }
    drawn
}

/// Refresh the info line from the server's run summary object.
pub async fn render_info(
    ctx: &DashboardContext,
    renderer: &dyn Renderer,
    page_title: &str,
    release: Option<&str>,
    cancel: &CancelToken,
) -> bool {
    if cancel.is_cancelled() {
        return false;
    }
    let Some(summary) = fetch_or_none(ctx.root.as_ref(), INFO_OBJECT).await else {
        return false;
    };
    let line = info_line(page_title, &summary.title, release);
    cancel.run_unless_cancelled(|| renderer.show_text(INFO_VIEW, &line))
}
