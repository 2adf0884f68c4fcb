//! `userstream classify` — count the records of a capture by kind.
//!
//! Classification only; nothing is decoded or dispatched, so a record with
//! missing fields still counts under its kind.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::Path;
use userstream_core::EventClassifier;

/// Key used for lines that are not JSON.
const INVALID: &str = "invalid_json";

pub fn run(path: &Path, as_json: bool) -> Result<()> {
    let capture = std::fs::read_to_string(path)
        .with_context(|| format!("read capture '{}'", path.display()))?;
    let counts = classify(&capture);

    if as_json {
        println!("{}", serde_json::to_string_pretty(&counts)?);
    } else {
        let total: u64 = counts.values().sum();
        println!("{} records in {}", total, path.display());
        for (kind, count) in &counts {
            println!("  {kind:<32} {count}");
        }
    }
    Ok(())
}

fn classify(capture: &str) -> BTreeMap<&'static str, u64> {
    let classifier = EventClassifier::new();
    let mut counts = BTreeMap::new();
    for line in capture.lines().filter(|l| !l.trim().is_empty()) {
        let key = match classifier.classify_line(line) {
            Ok(classified) => classified.kind.as_str(),
            Err(_) => INVALID,
        };
        *counts.entry(key).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_by_kind() {
        let capture = "{\"friends\":[1]}\n\n{\"limit\":{\"track\":1}}\n{\"friends\":[]}\nnope\n{\"x\":1}\n";
        let counts = classify(capture);
        assert_eq!(counts.get("friend_list"), Some(&2));
        assert_eq!(counts.get("track_limitation_notice"), Some(&1));
        assert_eq!(counts.get("unknown"), Some(&1));
        assert_eq!(counts.get(INVALID), Some(&1));
    }
}
