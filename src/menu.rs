//! Navigation menu built from the page index, and the active selection.

use serde::Serialize;
use serde_json::Value;

use crate::error::{DashboardError, Result};
use crate::logging::{self, obj, v_str, Domain, Level};
use crate::path::{extract_run_number, menu_id, normalize_manifest_path, RunIdentifier};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuEntry {
    pub id: String,
    pub title: String,
    pub manifest_path: String,
    pub group_label: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuSection {
    pub label: Option<String>,
    pub entries: Vec<MenuEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct Menu {
    pub sections: Vec<MenuSection>,
}

/// What the presentation layer renders for the menu column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuView {
    pub run_label: Option<String>,
    pub sections: Vec<MenuSection>,
}

fn str_field<'a>(item: &'a Value, key: &str, at: &str) -> Result<&'a str> {
    item.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| DashboardError::parse("menu index", format!("{}: missing '{}'", at, key)))
}

fn parse_item(item: &Value, group: Option<&str>, at: &str) -> Result<MenuEntry> {
    let title = str_field(item, "title", at)?;
    let jsonfile = str_field(item, "jsonfile", at)?;
    Ok(MenuEntry {
        id: menu_id(jsonfile),
        title: title.to_string(),
        manifest_path: normalize_manifest_path(jsonfile),
        group_label: group.map(str::to_string),
        active: false,
    })
}

/// Build the menu from an index document, keeping input order.
///
/// Consecutive ungrouped items share one unlabeled section; every `dir`
/// group gets its own labeled section.
pub fn build_menu(index: &Value) -> Result<Menu> {
    let items = index
        .get("items")
        .and_then(Value::as_array)
        .ok_or_else(|| DashboardError::parse("menu index", "missing 'items' array"))?;

    let mut sections: Vec<MenuSection> = Vec::new();
    for (i, item) in items.iter().enumerate() {
        let at = format!("item {}", i);
        if let Some(dir) = item.get("dir").and_then(Value::as_str) {
            let sub = item.get("items").and_then(Value::as_array).ok_or_else(|| {
                DashboardError::parse("menu index", format!("{}: group without items", at))
            })?;
            let entries = sub
                .iter()
                .enumerate()
                .map(|(j, s)| parse_item(s, Some(dir), &format!("{}.{}", at, j)))
                .collect::<Result<Vec<_>>>()?;
            sections.push(MenuSection {
                label: Some(dir.to_string()),
                entries,
            });
        } else {
            let entry = parse_item(item, None, &at)?;
            match sections.last_mut() {
                Some(last) if last.label.is_none() => last.entries.push(entry),
                _ => sections.push(MenuSection {
                    label: None,
                    entries: vec![entry],
                }),
            }
        }
    }
    Ok(Menu { sections })
}

/// Mark the first entry whose id matches active and every other inactive.
/// Returns whether an entry matched.
pub fn set_active(entries: &mut [MenuEntry], id: &str) -> bool {
    let mut matched = false;
    for entry in entries.iter_mut() {
        entry.active = !matched && entry.id == id;
        matched |= entry.active;
    }
    matched
}

impl Menu {
    pub fn entries(&self) -> impl Iterator<Item = &MenuEntry> {
        self.sections.iter().flat_map(|s| s.entries.iter())
    }

    pub fn find(&self, id: &str) -> Option<&MenuEntry> {
        self.entries().find(|e| e.id == id)
    }

    pub fn active(&self) -> Option<&MenuEntry> {
        self.entries().find(|e| e.active)
    }

    pub fn set_active(&mut self, id: &str) -> bool {
        let mut matched = false;
        for section in self.sections.iter_mut() {
            if matched {
                for e in section.entries.iter_mut() {
                    e.active = false;
                }
            } else {
                matched = set_active(&mut section.entries, id);
            }
        }
        matched
    }

    pub fn view(&self, run: Option<&RunIdentifier>) -> MenuView {
        MenuView {
            run_label: run.map(|r| format!("Run: {}", r)),
            sections: self.sections.clone(),
        }
    }
}

/// Run label source for the menu; a malformed path only drops the label.
pub fn run_for_container(path: &str) -> Option<RunIdentifier> {
    match extract_run_number(path) {
        Ok(run) => Some(run),
        Err(err) => {
            logging::log(
                Level::Warn,
                Domain::Menu,
                "run_label_omitted",
                obj(&[("path", v_str(path)), ("error", v_str(&err.to_string()))]),
            );
            None
        }
    }
}

/// The highlighted menu entry for a page session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveSelection {
    id: Option<String>,
}

impl ActiveSelection {
    pub fn current(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Navigate to `id`; the menu flags follow. An unknown id clears the
    /// selection.
    pub fn select(&mut self, menu: &mut Menu, id: &str) -> bool {
        let matched = menu.set_active(id);
        self.id = matched.then(|| id.to_string());
        matched
    }

    pub fn reset(&mut self, menu: &mut Menu) {
        self.id = None;
        for section in menu.sections.iter_mut() {
            for e in section.entries.iter_mut() {
                e.active = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn index() -> Value {
        json!({
            "items": [
                {"title": "Overview", "jsonfile": "json/overview.json"},
                {"title": "Info", "jsonfile": "json/info.json"},
                {"dir": "BKLM", "items": [
                    {"title": "Hits", "jsonfile": "json/bklm_hits.json"},
                    {"title": "Efficiency", "jsonfile": "/json/bklm_eff.json"}
                ]},
                {"title": "Trigger", "jsonfile": "json/trg.json"}
            ]
        })
    }

    #[test]
    fn test_build_menu_grouping_and_order() {
        let menu = build_menu(&index()).unwrap();
        assert_eq!(menu.sections.len(), 3);
        assert_eq!(menu.sections[0].label, None);
        assert_eq!(menu.sections[0].entries.len(), 2);
        assert_eq!(menu.sections[1].label.as_deref(), Some("BKLM"));
        assert_eq!(menu.sections[2].entries[0].id, "trg");
        let ids: Vec<_> = menu.entries().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["overview", "info", "bklm_hits", "bklm_eff", "trg"]);
        let eff = menu.find("bklm_eff").unwrap();
        assert_eq!(eff.manifest_path, "/json/bklm_eff.json");
        assert_eq!(eff.group_label.as_deref(), Some("BKLM"));
    }

    #[test]
    fn test_build_menu_errors() {
        assert!(build_menu(&json!({})).is_err());
        assert!(build_menu(&json!({"items": [{"title": "x"}]})).is_err());
        assert!(build_menu(&json!({"items": [{"dir": "x"}]})).is_err());
    }

    #[test]
    fn test_exactly_one_active() {
        let mut menu = build_menu(&index()).unwrap();
        assert!(menu.set_active("bklm_hits"));
        assert_eq!(menu.entries().filter(|e| e.active).count(), 1);
        assert!(menu.set_active("overview"));
        assert_eq!(menu.active().unwrap().id, "overview");
        assert_eq!(menu.entries().filter(|e| e.active).count(), 1);
        assert!(!menu.set_active("missing"));
        assert_eq!(menu.entries().filter(|e| e.active).count(), 0);
    }

    #[test]
    fn test_free_set_active_first_match_only() {
        let mut entries = vec![
            MenuEntry {
                id: "a".into(),
                title: "A".into(),
                manifest_path: "/a.json".into(),
                group_label: None,
                active: true,
            },
            MenuEntry {
                id: "b".into(),
                title: "B".into(),
                manifest_path: "/b.json".into(),
                group_label: None,
                active: false,
            },
            MenuEntry {
                id: "b".into(),
                title: "B again".into(),
                manifest_path: "/x/b.json".into(),
                group_label: None,
                active: false,
            },
        ];
        assert!(set_active(&mut entries, "b"));
        let flags: Vec<_> = entries.iter().map(|e| e.active).collect();
        assert_eq!(flags, vec![false, true, false]);
    }

    #[test]
    fn test_selection_and_view() {
        let mut menu = build_menu(&index()).unwrap();
        let mut sel = ActiveSelection::default();
        assert!(sel.select(&mut menu, "trg"));
        assert_eq!(sel.current(), Some("trg"));
        assert!(!sel.select(&mut menu, "nope"));
        assert_eq!(sel.current(), None);
        sel.select(&mut menu, "info");
        sel.reset(&mut menu);
        assert!(menu.active().is_none());

        let run = run_for_container("/data/r000123.root");
        assert_eq!(menu.view(run.as_ref()).run_label.as_deref(), Some("Run: 123"));
        assert_eq!(menu.view(run_for_container("/data/ref.root").as_ref()).run_label, None);
    }
}
