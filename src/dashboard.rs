//! Dashboard controller: loads a page, scaffolds its views, keeps one
//! scheduler running for it and follows menu navigation.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::config::{DashboardConfig, DisplayMode};
use crate::context::DashboardContext;
use crate::error::{DashboardError, Result};
use crate::logging::{self, obj, v_str, Domain, Level};
use crate::manifest::{parse_manifest, Manifest};
use crate::menu::{build_menu, run_for_container, ActiveSelection, Menu, MenuView};
use crate::path::menu_id;
use crate::render::{PageKind, PageView, Renderer};
use crate::scheduler::{CancellationHandle, InfoLine, RefreshScheduler};
use crate::source::{HttpObjectSource, ObjectSource};

/// The page currently on screen.
pub struct LoadedPage {
    pub title: String,
    pub manifest: Arc<Manifest>,
    pub view: PageView,
}

pub struct Dashboard {
    cfg: DashboardConfig,
    ctx: DashboardContext,
    /// Serves manifests and the menu index.
    pages: Arc<dyn ObjectSource>,
    renderer: Arc<dyn Renderer>,
    menu: Menu,
    selection: ActiveSelection,
    page: Option<LoadedPage>,
    handle: Option<CancellationHandle>,
}

impl Dashboard {
    pub fn new(
        cfg: DashboardConfig,
        ctx: DashboardContext,
        pages: Arc<dyn ObjectSource>,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        Self {
            cfg,
            ctx,
            pages,
            renderer,
            menu: Menu::default(),
            selection: ActiveSelection::default(),
            page: None,
            handle: None,
        }
    }

    pub fn from_config(cfg: DashboardConfig, renderer: Arc<dyn Renderer>) -> Result<Self> {
        let ctx = DashboardContext::from_config(&cfg)?;
        let pages =
            HttpObjectSource::with_timeout("pages", &cfg.base_url, "", cfg.fetch_timeout())?;
        let pages: Arc<dyn ObjectSource> = Arc::new(pages);
        Ok(Self::new(cfg, ctx, pages, renderer))
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.cfg
    }

    pub fn page(&self) -> Option<&LoadedPage> {
        self.page.as_ref()
    }

    pub fn menu(&self) -> &Menu {
        &self.menu
    }

    pub fn selection(&self) -> &ActiveSelection {
        &self.selection
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().map_or(false, |h| !h.is_stopped())
    }

    async fn fetch_document(&self, path: &str) -> Result<Value> {
        self.pages
            .fetch_document(path)
            .await?
            .ok_or_else(|| DashboardError::NotFound(path.to_string()))
    }

    /// Open whatever the configuration points at: the menu index and either
    /// a directory listing or a manifest. Index and manifest are fetched
    /// together. A missing or broken index only costs the menu.
    pub async fn open(&mut self) -> Result<()> {
        let index_path = self.cfg.index.clone();
        let manifest_path = self.cfg.manifest.clone();
        let this = &*self;
        let (index, manifest) = futures_util::future::join(
            async {
                match &index_path {
                    Some(p) => this.fetch_document(p).await.map(Some),
                    None => Ok(None),
                }
            },
            async {
                match &manifest_path {
                    Some(p) if this.cfg.directory.is_none() => {
                        this.fetch_document(p).await.map(Some)
                    }
                    _ => Ok(None),
                }
            },
        )
        .await;

        let menu = index.and_then(|doc| doc.map(|d| self.install_menu(&d)).transpose());
        if let (Some(path), Err(err)) = (index_path.as_deref(), menu) {
            self.log_load_failure(path, err);
        }
        if let Some(dir) = self.cfg.directory.clone() {
            return self.load_directory(&dir).await;
        }
        let Some(path) = manifest_path else {
            return Ok(());
        };
        let doc = match manifest {
            Ok(Some(doc)) => doc,
            Ok(None) => return Ok(()),
            Err(err) => return Err(self.log_load_failure(&path, err)),
        };
        let manifest = self.parse_page(&path, &doc)?;
        let id = menu_id(&path);
        match self.cfg.history_dir.clone() {
            Some(dirname) => self.show_history(id.clone(), manifest, &dirname),
            None => self.show(id.clone(), manifest),
        }
        self.selection.select(&mut self.menu, &id);
        Ok(())
    }

    /// Fetch and build the navigation menu.
    pub async fn load_menu(&mut self, index_path: &str) -> Result<()> {
        let index = self.fetch_document(index_path).await?;
        self.install_menu(&index)
    }

    fn install_menu(&mut self, index: &Value) -> Result<()> {
        let mut menu = build_menu(index)?;
        if let Some(id) = self.selection.current() {
            menu.set_active(id);
        }
        logging::log(
            Level::Info,
            Domain::Menu,
            "menu_loaded",
            obj(&[
                ("sections", json!(menu.sections.len())),
                ("entries", json!(menu.entries().count())),
            ]),
        );
        self.menu = menu;
        Ok(())
    }

    fn log_load_failure(&self, path: &str, err: DashboardError) -> DashboardError {
        logging::log(
            Level::Error,
            Domain::Manifest,
            "load_failed",
            obj(&[
                ("path", v_str(path)),
                ("kind", v_str(err.kind())),
                ("error", v_str(&err.to_string())),
            ]),
        );
        err
    }

    /// Load a manifest and make it the live page. On any failure the
    /// previous page stays up and keeps refreshing.
    pub async fn load_manifest(&mut self, path: &str) -> Result<()> {
        let doc = self
            .fetch_document(path)
            .await
            .map_err(|e| self.log_load_failure(path, e))?;
        let manifest = self.parse_page(path, &doc)?;
        self.show(menu_id(path), manifest);
        Ok(())
    }

    /// History mode: show the archived trend image of every manifest entry
    /// from `/history/<dirname>/`. Nothing is fetched or redrawn afterwards.
    pub async fn load_history(&mut self, path: &str, dirname: &str) -> Result<()> {
        let doc = self
            .fetch_document(path)
            .await
            .map_err(|e| self.log_load_failure(path, e))?;
        let manifest = self.parse_page(path, &doc)?;
        self.show_history(menu_id(path), manifest, dirname);
        Ok(())
    }

    /// Past-run pages get the archive aliases unless the manifest has its own.
    fn parse_page(&self, path: &str, doc: &Value) -> Result<Manifest> {
        let manifest = parse_manifest(doc).map_err(|e| self.log_load_failure(path, e))?;
        Ok(match self.ctx.mode {
            DisplayMode::PastRun => manifest.with_past_run_aliases(),
            DisplayMode::Live => manifest,
        })
    }

    /// Directory mode: show the objects found under `dir` in the root
    /// container.
    pub async fn load_directory(&mut self, dir: &str) -> Result<()> {
        let names = self
            .ctx
            .root
            .list(dir)
            .await
            .map_err(|e| self.log_load_failure(dir, e))?
            .ok_or_else(|| {
                self.log_load_failure(dir, DashboardError::NotFound(dir.to_string()))
            })?;
        let manifest = Manifest::from_directory(
            dir,
            &names,
            Some(&self.cfg.layout),
            Some(self.cfg.limit),
            self.cfg.prefix.as_deref(),
        );
        self.show(dir.to_string(), manifest);
        Ok(())
    }

    /// Navigate to a menu entry.
    pub async fn select(&mut self, id: &str) -> Result<()> {
        let path = self
            .menu
            .find(id)
            .map(|e| e.manifest_path.clone())
            .ok_or_else(|| DashboardError::NotFound(format!("menu entry '{}'", id)))?;
        match self.cfg.history_dir.clone() {
            Some(dirname) => self.load_history(&path, &dirname).await?,
            None => self.load_manifest(&path).await?,
        }
        self.selection.select(&mut self.menu, id);
        logging::log(Level::Info, Domain::Menu, "selected", obj(&[("id", v_str(id))]));
        Ok(())
    }

    fn log_loaded(&self, title: &str, kind: PageKind, manifest: &Manifest) {
        logging::log(
            Level::Info,
            Domain::Manifest,
            "loaded",
            obj(&[
                ("title", v_str(title)),
                ("kind", json!(kind)),
                ("entries", json!(manifest.entries.len())),
                ("stylesheet", v_str(&manifest.stylesheet)),
                ("fingerprint", v_str(&manifest.fingerprint())),
            ]),
        );
    }

    fn show(&mut self, title: String, manifest: Manifest) {
        let manifest = Arc::new(manifest);
        self.log_loaded(&title, PageKind::Live, &manifest);
        self.stop();
        let mut scheduler = RefreshScheduler::new(self.ctx.clone(), self.renderer.clone());
        if self.ctx.mode == DisplayMode::Live {
            scheduler = scheduler.with_info(InfoLine {
                page_title: title.clone(),
                release: self.cfg.release.clone(),
            });
        }
        self.handle = Some(scheduler.start(manifest.clone(), self.cfg.tick()));
        self.page = Some(LoadedPage {
            title,
            view: PageView::scaffold(&manifest),
            manifest,
        });
    }

    fn show_history(&mut self, title: String, manifest: Manifest, dirname: &str) {
        self.log_loaded(&title, PageKind::History, &manifest);
        self.stop();
        self.page = Some(LoadedPage {
            title,
            view: PageView::history(&manifest, dirname),
            manifest: Arc::new(manifest),
        });
    }

    /// Menu column; past-run pages carry the run label of the root container.
    pub fn menu_view(&self) -> MenuView {
        let run = match (self.ctx.mode, self.cfg.root_container.as_deref()) {
            (DisplayMode::PastRun, Some(root)) => run_for_container(root),
            _ => None,
        };
        self.menu.view(run.as_ref())
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::RemoteObject;
    use crate::render::RecordingRenderer;
    use crate::source::MemoryObjectSource;
    use std::time::Duration;

    type Setup = (
        Arc<MemoryObjectSource>,
        Arc<MemoryObjectSource>,
        Arc<RecordingRenderer>,
        Dashboard,
    );

    fn setup() -> Setup {
        let root = Arc::new(MemoryObjectSource::new("live"));
        let pages = Arc::new(MemoryObjectSource::new("pages"));
        let rec = Arc::new(RecordingRenderer::new());
        pages.insert_document(
            "/json/klm.json",
            json!({"cssfile": "grid2x2.css", "histos": [["KLM/c_a", "v1"], ["KLM/c_b", "v2"]]}),
        );
        pages.insert_document("/json/broken.json", json!({"cssfile": "grid2x2.css"}));
        pages.insert_document(
            "/index.json",
            json!({"items": [
                {"title": "KLM", "jsonfile": "json/klm.json"},
                {"title": "Broken", "jsonfile": "json/broken.json"}
            ]}),
        );
        root.insert("KLM/c_a", RemoteObject::hist1d("a", 1.0, vec![1.0]));
        let cfg = DashboardConfig {
            refresh_ms: 20_000,
            ..Default::default()
        };
        let ctx = DashboardContext::live(root.clone());
        let dash = Dashboard::new(cfg, ctx, pages.clone(), rec.clone());
        (root, pages, rec, dash)
    }

    #[tokio::test(start_paused = true)]
    async fn test_select_loads_and_highlights() {
        let (_root, _pages, rec, mut dash) = setup();
        dash.load_menu("/index.json").await.unwrap();
        dash.select("klm").await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let page = dash.page().unwrap();
        assert_eq!(page.title, "klm");
        assert_eq!(page.view.stylesheet_href, "/css/grid2x2.css");
        assert_eq!(page.view.slots.len(), 2);
        assert_eq!(dash.menu().active().unwrap().id, "klm");
        assert_eq!(dash.selection().current(), Some("klm"));
        assert_eq!(rec.commands_for("v1").len(), 1);
        assert_eq!(rec.commands_for("v2").len(), 1);
        dash.stop();
        assert!(!dash.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_parse_failure_keeps_previous_page() {
        let (_root, _pages, rec, mut dash) = setup();
        dash.load_menu("/index.json").await.unwrap();
        dash.select("klm").await.unwrap();
        let err = dash.select("broken").await.unwrap_err();
        assert!(matches!(err, DashboardError::Parse { .. }));
        assert_eq!(dash.page().unwrap().title, "klm");
        assert_eq!(dash.menu().active().unwrap().id, "klm");
        assert!(dash.is_running());

        tokio::time::sleep(Duration::from_millis(20_500)).await;
        assert_eq!(rec.commands_for("v1").len(), 2);
        dash.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_entry_and_missing_manifest() {
        let (_root, _pages, _rec, mut dash) = setup();
        assert!(matches!(dash.select("nope").await, Err(DashboardError::NotFound(_))));
        assert!(matches!(
            dash.load_manifest("/json/none.json").await,
            Err(DashboardError::NotFound(_))
        ));
        assert!(dash.page().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_directory_mode() {
        let (root, _pages, rec, mut dash) = setup();
        root.insert("KLM/c_eff", RemoteObject::hist1d("eff", 1.0, vec![1.0]));
        dash.cfg.prefix = Some("c_a".into());
        dash.load_directory("KLM").await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let page = dash.page().unwrap();
        assert_eq!(page.manifest.entries.len(), 1);
        assert_eq!(page.view.slots[0].id, "canvas01");
        assert_eq!(page.view.stylesheet_href, "/css/grid3x4.css");
        assert_eq!(rec.commands_for("canvas01").len(), 1);
        assert!(dash.load_directory("NONE").await.is_err());
        dash.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_from_config() {
        let (_root, _pages, _rec, mut dash) = setup();
        dash.cfg.index = Some("/index.json".into());
        dash.cfg.manifest = Some("/json/klm.json".into());
        dash.open().await.unwrap();
        assert_eq!(dash.menu().entries().count(), 2);
        assert_eq!(dash.page().unwrap().title, "klm");
        assert_eq!(dash.menu().active().unwrap().id, "klm");
        assert_eq!(dash.menu_view().run_label, None);
        dash.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_without_index_still_loads_page() {
        let (_root, _pages, rec, mut dash) = setup();
        dash.cfg.index = Some("/missing_index.json".into());
        dash.cfg.manifest = Some("/json/klm.json".into());
        dash.open().await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(dash.page().unwrap().title, "klm");
        assert_eq!(dash.menu().entries().count(), 0);
        assert!(dash.is_running());
        assert_eq!(rec.commands_for("v1").len(), 1);
        dash.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_with_malformed_index_still_loads_page() {
        let (_root, pages, _rec, mut dash) = setup();
        pages.insert_document("/bad_index.json", json!({"items": "KLM"}));
        dash.cfg.index = Some("/bad_index.json".into());
        dash.cfg.manifest = Some("/json/klm.json".into());
        dash.open().await.unwrap();
        assert_eq!(dash.page().unwrap().title, "klm");
        dash.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_missing_manifest_fails() {
        let (_root, _pages, _rec, mut dash) = setup();
        dash.cfg.index = Some("/index.json".into());
        dash.cfg.manifest = Some("/json/none.json".into());
        assert!(matches!(dash.open().await, Err(DashboardError::NotFound(_))));
        assert_eq!(dash.menu().entries().count(), 2);
        assert!(dash.page().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_page_is_static() {
        let (_root, _pages, rec, mut dash) = setup();
        dash.cfg.history_dir = Some("KLM".into());
        dash.cfg.index = Some("/index.json".into());
        dash.cfg.manifest = Some("/json/klm.json".into());
        dash.open().await.unwrap();
        tokio::time::sleep(Duration::from_millis(45_000)).await;

        let page = dash.page().unwrap();
        assert_eq!(page.view.kind, PageKind::History);
        assert_eq!(page.view.slots[0].image.as_deref(), Some("/history/KLM/KLM_a.png"));
        assert_eq!(page.view.slots[1].image.as_deref(), Some("/history/KLM/KLM_b.png"));
        assert_eq!(dash.menu().active().unwrap().id, "klm");
        assert!(!dash.is_running());
        assert!(rec.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_page_stops_live_refresh() {
        let (_root, _pages, rec, mut dash) = setup();
        dash.load_manifest("/json/klm.json").await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(dash.is_running());
        dash.load_history("/json/klm.json", "KLM").await.unwrap();
        assert!(!dash.is_running());

        rec.take();
        tokio::time::sleep(Duration::from_millis(45_000)).await;
        assert!(rec.is_empty());
        assert!(dash.load_history("/json/broken.json", "KLM").await.is_err());
        assert_eq!(dash.page().unwrap().view.kind, PageKind::History);
    }

    #[tokio::test(start_paused = true)]
    async fn test_past_run_page_uses_archive_aliases() {
        let root = Arc::new(MemoryObjectSource::new("root"));
        let pages = Arc::new(MemoryObjectSource::new("pages"));
        let rec = Arc::new(RecordingRenderer::new());
        pages.insert_document(
            "/json/top.json",
            json!({"histos": [["TOP/c_hitsPerEvent_top", "v1"], ["BKLM/c_xvsz_bklm", "v2"]]}),
        );
        root.insert("TOP/hitsPerEvent", RemoteObject::hist1d("hits", 1.0, vec![1.0]));
        root.insert("BKLM/xvsz", RemoteObject::hist1d("xvsz", 1.0, vec![2.0]));
        let cfg = DashboardConfig {
            mode: DisplayMode::PastRun,
            root_container: Some("/data/e0012/r00456".into()),
            ..Default::default()
        };
        let ctx = DashboardContext::past_run(root, None, None);
        let mut dash = Dashboard::new(cfg, ctx, pages, rec.clone());
        dash.load_manifest("/json/top.json").await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(dash.page().unwrap().manifest.aliases.len(), 2);
        assert_eq!(rec.commands_for("v1")[0].drawn().unwrap().0.title, "hits");
        assert_eq!(rec.commands_for("v2")[0].drawn().unwrap().0.title, "xvsz");
        dash.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_page_keeps_published_names() {
        let (_root, pages, _rec, mut dash) = setup();
        let top = json!({"histos": [["TOP/c_hitsPerEvent_top", "v1"]]});
        pages.insert_document("/json/top.json", top);
        dash.load_manifest("/json/top.json").await.unwrap();
        assert!(dash.page().unwrap().manifest.aliases.is_empty());
        dash.stop();
    }

    #[test]
    fn test_past_run_menu_view_has_run_label() {
        let root = Arc::new(MemoryObjectSource::new("root"));
        let cfg = DashboardConfig {
            mode: DisplayMode::PastRun,
            root_container: Some("/data/e0012/r00456/dqm.root".into()),
            ..Default::default()
        };
        let dash = Dashboard::new(
            cfg,
            DashboardContext::past_run(root.clone(), None, None),
            root,
            Arc::new(RecordingRenderer::new()),
        );
        assert_eq!(dash.menu_view().run_label.as_deref(), Some("Run: 456"));
    }
}
