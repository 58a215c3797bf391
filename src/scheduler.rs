//! Periodic re-rendering of a manifest.
//!
//! One pass runs right away, then one per tick. Each pass spawns one task per
//! entry and does not wait for the previous pass: a slow container only delays
//! its own views.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::cancel::CancelToken;
use crate::context::DashboardContext;
use crate::logging::{self, obj, v_str, Domain, Level};
use crate::manifest::Manifest;
use crate::pipeline::{render_entry, render_info};
use crate::render::Renderer;

/// Title and release tag for the live info line.
#[derive(Debug, Clone)]
pub struct InfoLine {
    pub page_title: String,
    pub release: Option<String>,
}

pub struct RefreshScheduler {
    ctx: DashboardContext,
    renderer: Arc<dyn Renderer>,
    info: Option<InfoLine>,
}

/// Stops the scheduler when `stop` is called or the handle is dropped.
pub struct CancellationHandle {
    token: CancelToken,
    timer: JoinHandle<()>,
}

impl CancellationHandle {
    /// After this returns no draw is issued, including for fetches that were
    /// already in flight.
    pub fn stop(&self) {
        if !self.token.is_cancelled() {
            logging::log(Level::Info, Domain::Schedule, "stopped", obj(&[]));
        }
        self.token.cancel();
        self.timer.abort();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn token(&self) -> &CancelToken {
        &self.token
    }
}

impl Drop for CancellationHandle {
    fn drop(&mut self) {
        self.token.cancel();
        self.timer.abort();
    }
}

impl RefreshScheduler {
    pub fn new(ctx: DashboardContext, renderer: Arc<dyn Renderer>) -> Self {
        Self {
            ctx,
            renderer,
            info: None,
        }
    }

    pub fn with_info(mut self, info: InfoLine) -> Self {
        self.info = Some(info);
        self
    }

    pub fn start(&self, manifest: Arc<Manifest>, tick: Duration) -> CancellationHandle {
        let token = CancelToken::new();
        let tick = tick.max(Duration::from_millis(1));
        logging::log(
            Level::Info,
            Domain::Schedule,
            "started",
            obj(&[
                ("entries", json!(manifest.entries.len())),
                ("tick_ms", json!(tick.as_millis() as u64)),
                ("manifest", v_str(&manifest.fingerprint())),
            ]),
        );

        let ctx = self.ctx.clone();
        let renderer = self.renderer.clone();
        let info = self.info.clone();
        let loop_token = token.clone();
        let timer = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tick);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut pass: u64 = 0;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        pass += 1;
                        spawn_pass(pass, &ctx, &renderer, &manifest, info.as_ref(), &loop_token);
                    }
                    _ = loop_token.cancelled() => break,
                }
            }
        });

        CancellationHandle { token, timer }
    }
}

fn spawn_pass(
    pass: u64,
    ctx: &DashboardContext,
    renderer: &Arc<dyn Renderer>,
    manifest: &Arc<Manifest>,
    info: Option<&InfoLine>,
    token: &CancelToken,
) {
    logging::log(Level::Debug, Domain::Schedule, "pass", obj(&[("pass", json!(pass))]));
    for idx in 0..manifest.entries.len() {
        let ctx = ctx.clone();
        let renderer = renderer.clone();
        let manifest = manifest.clone();
        let token = token.clone();
        tokio::spawn(async move {
            let entry = &manifest.entries[idx];
            let path = manifest.resolve_path(entry);
            render_entry(&ctx, renderer.as_ref(), entry, path, manifest.fallback, &token).await;
        });
    }
    if let Some(info) = info.cloned() {
        let ctx = ctx.clone();
        let renderer = renderer.clone();
        let token = token.clone();
        tokio::spawn(async move {
            let release = info.release.as_deref();
            render_info(&ctx, renderer.as_ref(), &info.page_title, release, &token).await;
        });
    }
}
