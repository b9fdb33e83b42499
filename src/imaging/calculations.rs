//! Pure calculation functions for variant widths and responsive descriptors.
//!
//! All functions here are pure and testable without any I/O or images.

use super::params::WidthPolicy;

/// Calculate which widths to render for a source image.
///
/// # Arguments
/// * `source_width` - Width of the decoded source in pixels
/// * `policy` - Responsive ladder or single fixed width
/// * `ladder` - Ascending widths used in responsive mode
/// * `max_fixed` - Cap for the single width in fixed mode
///
/// # Returns
/// * Ascending, de-duplicated widths
///
/// Fixed mode yields `min(source_width, max_fixed)`. Responsive mode yields
/// the ladder, except that rungs wider than the source are dropped (no
/// upscaling) and replaced by the source width itself.
pub fn calculate_widths(
    source_width: u32,
    policy: WidthPolicy,
    ladder: &[u32],
    max_fixed: u32,
) -> Vec<u32> {
    match policy {
        WidthPolicy::Fixed => vec![source_width.min(max_fixed)],
        WidthPolicy::Responsive => {
            let mut widths: Vec<u32> = ladder
                .iter()
                .copied()
                .filter(|&w| w <= source_width)
                .collect();

            if widths.len() < ladder.len() || widths.is_empty() {
                widths.push(source_width);
            }

            widths.sort_unstable();
            widths.dedup();
            widths
        }
    }
}

/// Output height for a target width, preserving the source aspect ratio.
///
/// Never returns 0 so extreme panoramas still produce a valid image.
pub fn scaled_height(source: (u32, u32), width: u32) -> u32 {
    let (src_w, src_h) = source;
    if src_w == 0 {
        return 1;
    }
    let h = (src_h as f64 * width as f64 / src_w as f64).round() as u32;
    h.max(1)
}

/// Build a `sizes` attribute from ascending widths.
///
/// Every width but the widest becomes `(max-width: Wpx) (W - gutter)px`; the
/// widest is the unconditional default. A single width is just `Wpx`.
///
/// ```text
/// [320, 800, 1280], gutter 40
///   → "(max-width: 320px) 280px, (max-width: 800px) 760px, 1280px"
/// ```
pub fn sizes_attribute(widths: &[u32], gutter: u32) -> String {
    let Some((&widest, rest)) = widths.split_last() else {
        return String::new();
    };

    let mut parts: Vec<String> = rest
        .iter()
        .map(|&w| format!("(max-width: {w}px) {}px", w.saturating_sub(gutter).max(1)))
        .collect();
    parts.push(format!("{widest}px"));
    parts.join(", ")
}

/// Build a `srcset` attribute from `(url, width)` pairs, in the given order.
pub fn srcset_attribute<'a>(entries: impl IntoIterator<Item = (&'a str, u32)>) -> String {
    entries
        .into_iter()
        .map(|(url, width)| format!("{url} {width}w"))
        .collect::<Vec<_>>()
        .join(", ")
}
