//! Color parameter normalization

/// Normalize the raw `color` query value.
///
/// Blank input means no recolor was requested and yields `None`. Anything else
/// is returned with a leading `#`, added only when missing. Hex digits are not
/// validated; the value is inserted into the SVG as-is.
pub fn normalize_color(raw: Option<&str>) -> Option<String> {
    let raw = raw?;
    if raw.trim().is_empty() {
        return None;
    }
    if raw.starts_with('#') {
        Some(raw.to_string())
    } else {
        Some(format!("#{raw}"))
    }
}
