//! `<picture>` markup.
//!
//! Production markup is built for a lazy-loading script that swaps
//! `data-src`/`data-srcset`/`data-sizes` into place once the image scrolls
//! into view. Until then the `<img>` shows the inline blur placeholder. A
//! `<noscript>` copy with eager attributes serves readers without scripts.
//!
//! All attribute values go through maud, which escapes them.

use crate::types::RenderSet;
use maud::{Markup, html};

/// Class the lazy-loading script looks for.
pub const LAZY_CLASS: &str = "lazyload";

fn non_empty(class: &str) -> Option<&str> {
    Some(class.trim()).filter(|c| !c.is_empty())
}

/// Pass-through markup used outside production: the original reference,
/// untouched.
pub fn development(src: &str, alt: &str, class: &str) -> Markup {
    html! {
        picture {
            img src=(src) alt=(alt) class=[non_empty(class)];
        }
    }
}

/// Full lazy-loading markup for a materialized image.
pub fn production(set: &RenderSet, alt: &str, class: &str) -> Markup {
    let fallback = set.fallback();
    let widest = fallback.and_then(|f| f.widest());
    let srcset = fallback.map(|f| f.srcset.as_str());
    let lazy_class = match non_empty(class) {
        Some(c) => format!("{LAZY_CLASS} {c}"),
        None => LAZY_CLASS.to_string(),
    };

    html! {
        picture {
            @for source in set.sources() {
                source type=(source.format.mime_type())
                    data-srcset=(source.srcset)
                    data-sizes=(set.sizes);
            }
            img class=(lazy_class)
                src=(set.placeholder.data_url)
                data-src=[widest.map(|a| a.url.as_str())]
                data-srcset=[srcset]
                data-sizes=(set.sizes)
                alt=(alt)
                width=[widest.map(|a| a.width)]
                height=[widest.map(|a| a.height)];
        }
        noscript {
            picture {
                @for source in set.sources() {
                    source type=(source.format.mime_type())
                        srcset=(source.srcset)
                        sizes=(set.sizes);
                }
                img src=[widest.map(|a| a.url.as_str())]
                    srcset=[srcset]
                    sizes=(set.sizes)
                    alt=(alt)
                    class=[non_empty(class)]
                    width=[widest.map(|a| a.width)]
                    height=[widest.map(|a| a.height)];
            }
        }
    }
}
