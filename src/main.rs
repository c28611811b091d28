//! # Stepbook CLI
//!
//! Usage:
//!   stepbook book.json -o laid-out.json
//!   stepbook book.json --sizes sizes.json -o laid-out.json
//!   cat book.json | stepbook > laid-out.json
//!
//! Lays out every page flagged as needing layout and writes the updated
//! envelope. Sizes come from a JSON table (see `StaticSizes`); without one,
//! every image measures 100×100.

use std::env;
use std::fs;
use std::io::{self, Read};
use std::process;

use stepbook::model::Size;
use stepbook::provider::{Memoized, StaticSizes};
use stepbook::LayoutEngine;

fn main() {
    env_logger::init();
    let args: Vec<String> = env::args().collect();

    let flag = |name: &str| {
        args.windows(2)
            .find(|w| w[0] == name)
            .map(|w| w[1].clone())
    };

    // Read input
    let input = if args.len() > 1 && !args[1].starts_with('-') {
        fs::read_to_string(&args[1])
    } else {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf).map(|_| buf)
    };
    let input = input.unwrap_or_else(|e| fail(&format!("Failed to read input: {e}")));

    // Size table
    let sizes = match flag("--sizes") {
        Some(path) => {
            let json = fs::read_to_string(&path)
                .unwrap_or_else(|e| fail(&format!("Failed to read {path}: {e}")));
            serde_json::from_str::<StaticSizes>(&json)
                .unwrap_or_else(|e| fail(&format!("Failed to parse {path}: {e}")))
        }
        None => StaticSizes {
            default_step_image: Some(Size::new(100.0, 100.0)),
            default_part_image: Some(Size::new(100.0, 100.0)),
            ..Default::default()
        },
    };

    let mut envelope = match stepbook::load_json(&input) {
        Ok(envelope) => envelope,
        Err(e) => fail(&format!("✗ {e}")),
    };

    let provider = Memoized::new(sizes);
    let engine = LayoutEngine::new(&provider);
    let pages = match engine.layout_pending(&mut envelope.state) {
        Ok(pages) => pages,
        Err(e) => fail(&format!("✗ Layout failed: {e}")),
    };

    let json = match envelope.to_json() {
        Ok(json) => json,
        Err(e) => fail(&format!("✗ Failed to serialize document: {e}")),
    };
    match flag("-o") {
        Some(path) => {
            if let Err(e) = fs::write(&path, &json) {
                fail(&format!("✗ Failed to write {path}: {e}"));
            }
            eprintln!(
                "✓ Written {} pages ({} measurements) to {}",
                pages,
                provider.cached(),
                path
            );
        }
        None => println!("{json}"),
    }
}

fn fail(message: &str) -> ! {
    eprintln!("{message}");
    process::exit(1);
}
