use std::sync::Arc;

use anyhow::{Context, Result};
use dqmview::config::DashboardConfig;
use dqmview::dashboard::Dashboard;
use dqmview::logging::{self, obj, v_str, Domain, Level};
use dqmview::render::JsonLinesRenderer;
use serde_json::json;
use url::Url;

/// Usage: dqmview [page-url]
///
/// The optional page URL carries the same navigation parameters as the web
/// page (`?jsonfile=...`, `?directory=...&prefix=...`, `?rootfile=...`), and
/// `?jsonfile=...&dirname=...` opens the archived trend images instead.
/// Draw commands go to stdout as JSON lines, logs to stderr.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let mut cfg = DashboardConfig::from_env();
    if let Some(arg) = std::env::args().nth(1) {
        let url = Url::parse(&arg).with_context(|| format!("bad page url '{}'", arg))?;
        cfg.apply_query(&url)?;
    }
    cfg.validate()?;

    logging::log(
        Level::Info,
        Domain::System,
        "startup",
        obj(&[
            ("base_url", v_str(&cfg.base_url)),
            ("mode", json!(cfg.mode)),
            ("refresh_ms", json!(cfg.refresh_ms)),
        ]),
    );

    let renderer = Arc::new(JsonLinesRenderer::new());
    let mut dashboard = Dashboard::from_config(cfg, renderer)?;
    dashboard.open().await.context("opening dashboard")?;
    let Some(page) = dashboard.page() else {
        anyhow::bail!("nothing to show: set DQM_JSONFILE or DQM_DIRECTORY, or pass a page url");
    };
    println!("{}", serde_json::to_string(&json!({ "page": page.view }))?);
    println!("{}", serde_json::to_string(&json!({ "menu": dashboard.menu_view() }))?);

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    dashboard.stop();
    logging::log(Level::Info, Domain::System, "shutdown", obj(&[]));
    Ok(())
}
