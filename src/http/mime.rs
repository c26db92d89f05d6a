//! MIME type detection module
//!
//! Maps icon file extensions to the Content-Type sent downstream.

/// Get MIME Content-Type based on file extension (case-insensitive)
pub fn get_content_type(extension: Option<&str>) -> &'static str {
    match extension.map(str::to_ascii_lowercase).as_deref() {
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Content-Type for the extension of the last path segment of `url`
pub fn content_type_for_url(url: &str) -> &'static str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let segment = path.rsplit('/').next().unwrap_or(path);
    get_content_type(segment.rsplit_once('.').map(|(_, ext)| ext))
}
