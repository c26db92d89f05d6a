//! SVG recoloring
//!
//! A lexical patch over the raw markup, not an XML rewrite. Three independent
//! rules run in a fixed order and each replaces every match; text outside the
//! matches is left byte-identical. Lookalike text anywhere in the document is
//! rewritten too.

use regex::Regex;
use std::sync::LazyLock;

static FILL_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r##"(?i)fill\s*=\s*"#[0-9a-f]{3,6}""##).expect("fill attribute pattern")
});

static FILL_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)fill\s*:\s*#[0-9a-f]{3,6}").expect("fill style pattern")
});

static STOP_COLOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)stop-color\s*:\s*#[0-9a-f]{3,6}").expect("stop-color pattern")
});

/// Replace fill and gradient stop colors in `svg` with `color`
pub fn recolor_svg(svg: &str, color: &str) -> String {
    let attribute = format!("fill=\"{color}\"");
    let style = format!("fill:{color}");
    let stop = format!("stop-color:{color}");

    // NoExpand: a `$` in the caller's color must stay literal
    let svg = FILL_ATTRIBUTE.replace_all(svg, regex::NoExpand(&attribute));
    let svg = FILL_STYLE.replace_all(&svg, regex::NoExpand(&style));
    let svg = STOP_COLOR.replace_all(&svg, regex::NoExpand(&stop));
    svg.into_owned()
}
