//! CLI output formatting.
//!
//! # Information-First Display
//!
//! Each image leads with its positional index and the reference the author
//! wrote, followed by indented context: content key, then one line per
//! variant with its cache status.
//!
//! ```text
//! 001 posts/hero.jpg (2000x1000)
//!     Key: b94d27b9934d3e08a52e
//!     320px webp: encoded
//!     1280px webp: on disk
//!     320px jpeg: encoded
//!     1280px jpeg: on disk
//! 002 posts/broken.jpg
//!     Error: image "posts/broken.jpg" could not be encoded: ...
//!
//! Materialized 1 image, 1 failed (2 encoded, 2 on disk)
//! ```
//!
//! # Architecture
//!
//! `format_*` functions return `Vec<String>` for testability; `print_*`
//! wrappers write to stdout. Format functions are pure.

use crate::cache::StatsSnapshot;
use crate::materialize::MaterializeError;
use crate::types::{RenderSet, VariantStatus};

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn status_label(status: VariantStatus) -> &'static str {
    match status {
        VariantStatus::Existing => "on disk",
        VariantStatus::Encoded => "encoded",
    }
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

/// Lines describing one materialized image.
pub fn format_render_set(index: usize, reference: &str, set: &RenderSet) -> Vec<String> {
    let (w, h) = set.source_dimensions;
    let mut lines = vec![
        format!("{} {} ({}x{})", format_index(index), reference, w, h),
        format!("{}Key: {}", indent(1), set.key),
    ];
    for artifact in set.artifacts() {
        lines.push(format!(
            "{}{}px {}: {}",
            indent(1),
            artifact.width,
            artifact.format,
            status_label(artifact.status)
        ));
    }
    lines
}

/// Lines describing an image that failed.
pub fn format_failure(index: usize, reference: &str, err: &MaterializeError) -> Vec<String> {
    vec![
        format!("{} {}", format_index(index), reference),
        format!("{}Error: {}", indent(1), err),
    ]
}

/// Closing summary of a `warm` run.
pub fn format_summary(succeeded: usize, failed: usize, stats: &StatsSnapshot) -> String {
    let mut line = format!("Materialized {}", plural(succeeded, "image"));
    if failed > 0 {
        line.push_str(&format!(", {failed} failed"));
    }
    format!("{line} ({stats})")
}

pub fn print_render_set(index: usize, reference: &str, set: &RenderSet) {
    for line in format_render_set(index, reference, set) {
        println!("{}", line);
    }
}

pub fn print_failure(index: usize, reference: &str, err: &MaterializeError) {
    for line in format_failure(index, reference, err) {
        println!("{}", line);
    }
}

pub fn print_summary(succeeded: usize, failed: usize, stats: &StatsSnapshot) {
    println!();
    println!("{}", format_summary(succeeded, failed, stats));
}
