//! End-to-end: archived containers on disk, menu navigation, overlay draws.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use dqmview::config::{DashboardConfig, DisplayMode};
use dqmview::context::DashboardContext;
use dqmview::dashboard::Dashboard;
use dqmview::render::{DrawCommand, RecordingRenderer};
use dqmview::source::{DirObjectSource, ObjectSource};
use serde_json::{json, Value};

fn write_json(path: &Path, value: &Value) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, serde_json::to_string(value).unwrap()).unwrap();
}

fn th1(title: &str, entries: f64, bins: &[f64]) -> Value {
    json!({
        "_typename": "TH1F",
        "fName": "hits",
        "fTitle": title,
        "fEntries": entries,
        "fNcells": bins.len(),
        "fArray": bins,
    })
}

struct Fixture {
    _tmp: tempfile::TempDir,
    rec: Arc<RecordingRenderer>,
    dash: Dashboard,
}

fn past_run_fixture() -> Fixture {
    let tmp = tempfile::tempdir().unwrap();
    let run_dir = tmp.path().join("e0012").join("r03021");
    let ref_dir = tmp.path().join("reference");
    let site = tmp.path().join("site");

    write_json(&run_dir.join("KLM/hits.json"), &th1("BKLM hits", 200.0, &[1.0, 1.0, 1.0]));
    write_json(&run_dir.join("KLM/flat.json"), &th1("flat", 100.0, &[5.0, 5.0, 5.0]));
    write_json(&ref_dir.join("ref/KLM/hits.json"), &th1("old hits", 100.0, &[1.0, 2.0, 3.0]));
    write_json(&ref_dir.join("ref/KLM/flat.json"), &th1("old flat", 100.0, &[1.0, 1.0, 1.0]));
    write_json(
        &site.join("json/klm.json"),
        &json!({
            "cssfile": "grid2x2.css",
            "histos": [
                ["KLM/c_hits", "v1"],
                ["KLM/c_flat", "v2"],
                ["KLM/c_gone", "v3"]
            ]
        }),
    );
    write_json(
        &site.join("index.json"),
        &json!({"items": [
            {"dir": "KLM", "items": [{"title": "Hits", "jsonfile": "json/klm.json"}]}
        ]}),
    );

    let root_loc = run_dir.to_string_lossy().to_string();
    let cfg = DashboardConfig {
        mode: DisplayMode::PastRun,
        root_container: Some(root_loc.clone()),
        refresh_ms: 60_000,
        ..Default::default()
    };
    let root: Arc<dyn ObjectSource> = Arc::new(DirObjectSource::new("root", &run_dir));
    let reference: Arc<dyn ObjectSource> = Arc::new(DirObjectSource::new("reference", &ref_dir));
    let pages: Arc<dyn ObjectSource> = Arc::new(DirObjectSource::new("pages", &site));
    let rec = Arc::new(RecordingRenderer::new());
    let ctx = DashboardContext::past_run(root, Some(reference), None);
    let dash = Dashboard::new(cfg, ctx, pages, rec.clone());
    Fixture { _tmp: tmp, rec, dash }
}

#[tokio::test]
async fn test_past_run_page_overlays_reference() {
    let mut f = past_run_fixture();
    f.dash.load_menu("/index.json").await.unwrap();
    f.dash.select("klm").await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    // reference peaks higher after scaling, so it sets the axis
    let v1 = f.rec.commands_for("v1");
    assert_eq!(v1.len(), 3);
    assert_eq!(v1[0], DrawCommand::Clear { view: "v1".into() });
    let (first, first_opt) = v1[1].drawn().unwrap();
    assert_eq!(first_opt, "hist");
    assert_eq!(first.bins, vec![2.0, 4.0, 6.0]);
    assert_eq!(first.title, "BKLM hits");
    assert_eq!(first.line_style, 2);
    assert_eq!(first.line_color, 3);
    let (second, second_opt) = v1[2].drawn().unwrap();
    assert_eq!(second_opt, "same");
    assert_eq!(second.bins, vec![1.0, 1.0, 1.0]);

    // current peaks higher, so it goes first
    let v2 = f.rec.commands_for("v2");
    let (first, first_opt) = v2[1].drawn().unwrap();
    assert_eq!(first_opt, "hist");
    assert_eq!(first.title, "flat");
    assert_eq!(v2[2].drawn().unwrap().0.bins, vec![1.0, 1.0, 1.0]);

    assert_eq!(
        f.rec.commands_for("v3"),
        vec![DrawCommand::Text {
            view: "v3".into(),
            text: "Can not get KLM/c_gone".into()
        }]
    );

    let menu = f.dash.menu_view();
    assert_eq!(menu.run_label.as_deref(), Some("Run: 3021"));
    assert_eq!(menu.sections[0].label.as_deref(), Some("KLM"));
    assert!(menu.sections[0].entries[0].active);
    f.dash.stop();
}

#[tokio::test]
async fn test_directory_listing_page() {
    let mut f = past_run_fixture();
    f.dash.load_directory("KLM").await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let page = f.dash.page().unwrap();
    let ids: Vec<_> = page.view.slots.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["canvas01", "canvas02"]);
    assert_eq!(page.manifest.entries[0].path, "KLM/flat");
    assert_eq!(f.rec.commands_for("canvas02").len(), 3);
    f.dash.stop();
}

#[tokio::test]
async fn test_missing_reference_container_file_draws_plain() {
    let mut f = past_run_fixture();
    let tmp = tempfile::tempdir().unwrap();
    let cfg = f.dash.config().clone();
    let root_dir = cfg.root_container.clone().unwrap();
    let root: Arc<dyn ObjectSource> = Arc::new(DirObjectSource::new("root", &root_dir));
    let empty_ref: Arc<dyn ObjectSource> = Arc::new(DirObjectSource::new("reference", tmp.path()));
    let pages: Arc<dyn ObjectSource> =
        Arc::new(DirObjectSource::new("pages", Path::new(&root_dir)));
    f.dash.stop();
    let ctx = DashboardContext::past_run(root, Some(empty_ref), None);
    f.dash = Dashboard::new(cfg, ctx, pages, f.rec.clone());

    f.dash.load_directory("KLM").await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    let cmds = f.rec.commands_for("canvas02");
    assert_eq!(cmds.len(), 1);
    let (obj, opt) = cmds[0].drawn().unwrap();
    assert_eq!(opt, "hist");
    assert_eq!(obj.title, "BKLM hits");
    f.dash.stop();
}
