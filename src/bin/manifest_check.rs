//! Validate a page manifest offline.
//!
//! Usage:
//!   manifest_check <manifest.json> [--json]
//!
//! Prints the layout, every view with the object paths it will fetch, and the
//! fingerprint the dashboard logs when it loads the page.

use std::fs;

use dqmview::manifest::parse_manifest;
use dqmview::path::ObjectPath;
use serde_json::{json, Value};

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(path) = args.iter().find(|a| !a.starts_with("--")) else {
        eprintln!("usage: manifest_check <manifest.json> [--json]");
        std::process::exit(1);
    };
    let as_json = args.iter().any(|a| a == "--json");

    let raw = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(err) => {
            eprintln!("failed to read {}: {}", path, err);
            std::process::exit(2);
        }
    };
    let doc: Value = match serde_json::from_str(&raw) {
        Ok(v) => v,
        Err(err) => {
            eprintln!("{} is not JSON: {}", path, err);
            std::process::exit(3);
        }
    };
    let manifest = match parse_manifest(&doc) {
        Ok(m) => m,
        Err(err) => {
            eprintln!("{}: {}", path, err);
            std::process::exit(4);
        }
    };

    let views: Vec<Value> = manifest
        .entries
        .iter()
        .map(|e| {
            let object = ObjectPath::parse(manifest.resolve_path(e));
            json!({
                "view": e.view_id,
                "live": object.canvas_path(),
                "histogram": object.histogram_path(),
                "reference": object.reference_path(),
                "draw_option": e.draw_option,
            })
        })
        .collect();

    if as_json {
        let payload = json!({
            "stylesheet": manifest.stylesheet,
            "fallback": manifest.fallback,
            "fingerprint": manifest.fingerprint(),
            "views": views,
        });
        match serde_json::to_string_pretty(&payload) {
            Ok(s) => println!("{}", s),
            Err(err) => {
                eprintln!("failed to encode report: {}", err);
                std::process::exit(5);
            }
        }
        return;
    }

    println!("layout      {}", manifest.stylesheet);
    println!("fingerprint {}", manifest.fingerprint());
    for v in &views {
        println!(
            "{:<12} {}",
            v["view"].as_str().unwrap_or(""),
            v["live"].as_str().unwrap_or("")
        );
    }
    println!("{} views ok", views.len());
}
