//! Asset reference parsing
//!
//! Turns a decoded request path into the filename, format and variant
//! information the router needs to build upstream URLs.

use regex::Regex;
use std::sync::LazyLock;

use super::error::IconError;

static EXTENSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.(\w+)$").expect("extension pattern"));

static IMAGE_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(png|webp|svg)$").expect("image suffix pattern"));

/// Image formats served from the upstream repository
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetFormat {
    Svg,
    Png,
    Webp,
}

impl AssetFormat {
    /// Case-insensitive lookup of a bare extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "svg" => Some(Self::Svg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::Webp),
            _ => None,
        }
    }

    /// Upstream sub-folder holding this format
    pub const fn folder(self) -> &'static str {
        match self {
            Self::Svg => "svg",
            Self::Png => "png",
            Self::Webp => "webp",
        }
    }
}

/// Pre-made theme variant encoded in the filename
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Light,
    Dark,
}

/// Parsed form of an inbound icon path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetReference {
    /// Path with a single leading `/` removed
    pub filename: String,
    pub format: AssetFormat,
    /// Filename minus one trailing `.png|.webp|.svg`
    pub base_name: String,
    pub variant: Option<Variant>,
}

impl AssetReference {
    /// Parse a percent-decoded request path
    pub fn parse(path: &str) -> Result<Self, IconError> {
        let ext = EXTENSION
            .captures(path)
            .and_then(|caps| caps.get(1))
            .ok_or(IconError::NoExtension)?;
        let format = AssetFormat::from_extension(ext.as_str()).ok_or(IconError::UnsupportedFormat)?;

        let filename = path.strip_prefix('/').unwrap_or(path).to_string();
        let lower = filename.to_lowercase();
        let variant = if lower.ends_with("-light.svg") {
            Some(Variant::Light)
        } else if lower.ends_with("-dark.svg") {
            Some(Variant::Dark)
        } else {
            None
        };
        let base_name = IMAGE_SUFFIX.replace(&filename, "").into_owned();

        Ok(Self {
            filename,
            format,
            base_name,
            variant,
        })
    }

    pub const fn is_variant(&self) -> bool {
        self.variant.is_some()
    }
}
