//! Icon request routing
//!
//! Decides, per request, which upstream asset to fetch and whether to recolor
//! it. The flow is a small state machine:
//!
//! ```text
//! Start -> ExternalCheck -> ExternalServe                          -> Respond | NotFound
//!                        -> LocalParse -> VariantFetch             -> Respond | NotFound
//!                                      -> ColorFetchWithFallback   -> Respond | PlainFetch
//!                                      -> PlainFetch               -> Respond | NotFound
//! ```
//!
//! ExternalCheck fires for an `external=` query value or, when that is absent,
//! for a path that is itself an absolute `http(s)` URL (`/https://host/a.svg`).
//! The query value takes precedence.
//!
//! At most two upstream fetches happen per request and they are strictly
//! sequential: the plain asset is only requested after the `-light.svg`
//! candidate failed.

use hyper::body::Bytes;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use super::asset::{AssetFormat, AssetReference};
use super::color::normalize_color;
use super::error::IconError;
use super::fetcher::Fetch;
use super::recolor::recolor_svg;
use crate::http::mime;
use crate::logger;

const SVG_CONTENT_TYPE: &str = "image/svg+xml";

/// Characters re-encoded when a decoded filename segment goes back into a URL
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Inbound request as seen by the router
#[derive(Debug, Clone, Copy, Default)]
pub struct IconRequest<'a> {
    /// Percent-decoded request path, leading `/` included
    pub path: &'a str,
    /// Raw `color` query value
    pub color: Option<&'a str>,
    /// Raw `external` query value
    pub external: Option<&'a str>,
}

impl<'a> IconRequest<'a> {
    /// External URL to proxy: the `external` value, else a path that is an absolute http(s) URL
    pub fn external_target(&self) -> Option<&'a str> {
        self.external.or_else(|| {
            let candidate = self.path.strip_prefix('/').unwrap_or(self.path);
            let is_absolute_http = candidate.starts_with("http")
                && url::Url::parse(candidate)
                    .is_ok_and(|url| matches!(url.scheme(), "http" | "https"));
            is_absolute_http.then_some(candidate)
        })
    }
}

/// Terminal branch a request ended in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    External,
    Variant,
    Colorized,
    /// `-light.svg` candidate missing, plain svg served uncolored
    Fallback,
    Plain,
    /// Rejected while parsing, before any upstream call
    Rejected,
}

impl Branch {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::External => "external",
            Self::Variant => "variant",
            Self::Colorized => "colorized",
            Self::Fallback => "fallback",
            Self::Plain => "plain",
            Self::Rejected => "rejected",
        }
    }
}

/// Body and content type ready to be written out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconAsset {
    pub body: Bytes,
    pub content_type: &'static str,
}

/// Router outcome: the branch taken and the asset or the 404 reason
#[derive(Debug)]
pub struct IconReply {
    pub branch: Branch,
    pub outcome: Result<IconAsset, IconError>,
}

impl IconReply {
    const fn new(branch: Branch, outcome: Result<IconAsset, IconError>) -> Self {
        Self { branch, outcome }
    }
}

/// Router over an upstream icon repository
///
/// Holds the shared fetcher handle; one instance serves every request.
#[derive(Debug)]
pub struct IconRouter<F> {
    fetcher: F,
    cdn_root: String,
}

impl<F: Fetch> IconRouter<F> {
    pub fn new(fetcher: F, cdn_root: &str) -> Self {
        Self {
            fetcher,
            cdn_root: cdn_root.trim_end_matches('/').to_string(),
        }
    }

    /// Run one request through the state machine
    pub async fn route(&self, request: &IconRequest<'_>) -> IconReply {
        let color = normalize_color(request.color);

        // ExternalCheck
        if let Some(target) = request.external_target() {
            let outcome = self.serve_external(target, color.as_deref()).await;
            return IconReply::new(Branch::External, outcome);
        }

        // LocalParse
        let asset = match AssetReference::parse(request.path) {
            Ok(asset) => asset,
            Err(e) => return IconReply::new(Branch::Rejected, Err(e)),
        };

        // VariantFetch: suffix requests win over any color
        if asset.is_variant() {
            let url = self.upstream_url(AssetFormat::Svg, &asset.filename);
            return IconReply::new(Branch::Variant, self.pipe(&url).await);
        }

        let main_url = self.upstream_url(asset.format, &asset.filename);
        match (asset.format, color) {
            (AssetFormat::Svg, Some(color)) => {
                self.colorize_with_fallback(&asset, &main_url, &color).await
            }
            _ => IconReply::new(Branch::Plain, self.pipe(&main_url).await),
        }
    }

    /// ExternalServe: proxy an arbitrary absolute `.svg` URL
    async fn serve_external(
        &self,
        target: &str,
        color: Option<&str>,
    ) -> Result<IconAsset, IconError> {
        let url = match url::Url::parse(target) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => url,
            _ => {
                logger::log_warning(&format!("Rejected external URL '{target}'"));
                return Err(IconError::InvalidExternalTarget);
            }
        };
        if !url.path().to_ascii_lowercase().ends_with(".svg") {
            return Err(IconError::InvalidExternalTarget);
        }

        let body = self.fetcher.get(url.as_str()).await.map_err(|e| {
            logger::log_upstream_failure(url.as_str(), &e);
            IconError::InvalidExternalTarget
        })?;

        let body = match color {
            Some(color) => recolor_bytes(&body, color),
            None => body,
        };
        Ok(IconAsset {
            body,
            content_type: SVG_CONTENT_TYPE,
        })
    }

    /// ColorFetchWithFallback: try `<base>-light.svg`, else the plain asset uncolored
    async fn colorize_with_fallback(
        &self,
        asset: &AssetReference,
        main_url: &str,
        color: &str,
    ) -> IconReply {
        let light = format!("{}-light.svg", asset.base_name);
        let candidate = self.upstream_url(AssetFormat::Svg, &light);

        match self.fetcher.get(&candidate).await {
            Ok(body) => IconReply::new(
                Branch::Colorized,
                Ok(IconAsset {
                    body: recolor_bytes(&body, color),
                    content_type: SVG_CONTENT_TYPE,
                }),
            ),
            Err(e) => {
                logger::log_fallback(&candidate, &e, main_url);
                IconReply::new(Branch::Fallback, self.pipe(main_url).await)
            }
        }
    }

    /// Fetch `url` and pass the body through with the type of the URL's extension
    async fn pipe(&self, url: &str) -> Result<IconAsset, IconError> {
        match self.fetcher.get(url).await {
            Ok(body) => Ok(IconAsset {
                body,
                content_type: mime::content_type_for_url(url),
            }),
            Err(e) => {
                logger::log_upstream_failure(url, &e);
                Err(IconError::UpstreamUnavailable)
            }
        }
    }

    fn upstream_url(&self, format: AssetFormat, filename: &str) -> String {
        let encoded = filename
            .split('/')
            .map(|segment| utf8_percent_encode(segment, PATH_SEGMENT).to_string())
            .collect::<Vec<_>>()
            .join("/");
        format!("{}/{}/{}", self.cdn_root, format.folder(), encoded)
    }
}

fn recolor_bytes(body: &Bytes, color: &str) -> Bytes {
    let svg = String::from_utf8_lossy(body);
    Bytes::from(recolor_svg(&svg, color))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::icon::fetcher::FetchError;
    use std::collections::HashMap;
    use std::future::Future;
    use std::sync::Mutex;

    const ROOT: &str = "https://cdn.test/icons";
    const SVG: &str = r##"<svg><stop style="stop-color:#FFF"/><path fill="#abcdef" style="fill : #abc"/></svg>"##;
    const SVG_RECOLORED: &str = r##"<svg><stop style="stop-color:#123456"/><path fill="#123456" style="fill:#123456"/></svg>"##;

    /// In-memory upstream that records every requested URL
    #[derive(Default)]
    struct StaticUpstream {
        files: HashMap<String, Bytes>,
        requested: Mutex<Vec<String>>,
    }

    impl StaticUpstream {
        fn with(mut self, url: &str, body: &str) -> Self {
            self.files
                .insert(url.to_string(), Bytes::from(body.to_string()));
            self
        }
    }

    impl Fetch for &StaticUpstream {
        fn get(&self, url: &str) -> impl Future<Output = Result<Bytes, FetchError>> + Send {
            self.requested.lock().unwrap().push(url.to_string());
            let found = self.files.get(url).cloned();
            async move { found.ok_or(FetchError::Status(404)) }
        }
    }

    fn router(upstream: &StaticUpstream) -> IconRouter<&StaticUpstream> {
        IconRouter::new(upstream, &format!("{ROOT}/"))
    }

    fn request<'a>(path: &'a str, color: Option<&'a str>) -> IconRequest<'a> {
        IconRequest {
            path,
            color,
            external: None,
        }
    }

    fn requested(upstream: &StaticUpstream) -> Vec<String> {
        upstream.requested.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn test_unsupported_format_rejected_without_fetch() {
        let upstream = StaticUpstream::default();
        let reply = router(&upstream).route(&request("/icons/foo.txt", None)).await;
        assert_eq!(reply.branch, Branch::Rejected);
        assert_eq!(reply.outcome, Err(IconError::UnsupportedFormat));
        assert_eq!(reply.outcome.unwrap_err().reason(), "Format not supported");
        assert!(requested(&upstream).is_empty());
    }

    #[tokio::test]
    async fn test_missing_extension_is_file_not_found() {
        let upstream = StaticUpstream::default();
        let reply = router(&upstream).route(&request("/icons/foo", Some("fff"))).await;
        assert_eq!(reply.outcome, Err(IconError::NoExtension));
        assert_eq!(reply.outcome.unwrap_err().reason(), "File not found");
        assert!(requested(&upstream).is_empty());
    }

    #[tokio::test]
    async fn test_variant_ignores_color() {
        let upstream = StaticUpstream::default()
            .with(&format!("{ROOT}/svg/plex-light.svg"), SVG)
            .with(&format!("{ROOT}/svg/plex-dark.svg"), "dark");
        let router = router(&upstream);

        let reply = router.route(&request("/plex-light.svg", Some("123456"))).await;
        assert_eq!(reply.branch, Branch::Variant);
        let asset = reply.outcome.unwrap();
        assert_eq!(asset.body, Bytes::from(SVG));
        assert_eq!(asset.content_type, "image/svg+xml");

        let reply = router.route(&request("/plex-dark.svg", Some("123456"))).await;
        assert_eq!(reply.outcome.unwrap().body, Bytes::from("dark"));
        assert_eq!(
            requested(&upstream),
            vec![
                format!("{ROOT}/svg/plex-light.svg"),
                format!("{ROOT}/svg/plex-dark.svg")
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_variant_is_not_found() {
        let upstream = StaticUpstream::default();
        let reply = router(&upstream).route(&request("/plex-dark.svg", None)).await;
        assert_eq!(reply.branch, Branch::Variant);
        assert_eq!(reply.outcome, Err(IconError::UpstreamUnavailable));
    }

    #[tokio::test]
    async fn test_colorized_from_light_candidate() {
        let upstream = StaticUpstream::default()
            .with(&format!("{ROOT}/svg/plex-light.svg"), SVG)
            .with(&format!("{ROOT}/svg/plex.svg"), "plain");
        let reply = router(&upstream).route(&request("/plex.svg", Some("123456"))).await;

        assert_eq!(reply.branch, Branch::Colorized);
        let asset = reply.outcome.unwrap();
        assert_eq!(asset.body, Bytes::from(SVG_RECOLORED));
        assert_eq!(asset.content_type, "image/svg+xml");
        assert_eq!(requested(&upstream), vec![format!("{ROOT}/svg/plex-light.svg")]);
    }

    #[tokio::test]
    async fn test_color_with_hash_prefix() {
        let upstream = StaticUpstream::default().with(&format!("{ROOT}/svg/plex-light.svg"), SVG);
        let reply = router(&upstream).route(&request("/plex.svg", Some("#123456"))).await;
        assert_eq!(reply.outcome.unwrap().body, Bytes::from(SVG_RECOLORED));
    }

    #[tokio::test]
    async fn test_fallback_serves_plain_svg_uncolored() {
        let upstream = StaticUpstream::default().with(&format!("{ROOT}/svg/plex.svg"), SVG);
        let reply = router(&upstream).route(&request("/plex.svg", Some("123456"))).await;

        assert_eq!(reply.branch, Branch::Fallback);
        assert_eq!(reply.outcome.unwrap().body, Bytes::from(SVG));
        // Fallback only after the light candidate failed
        assert_eq!(
            requested(&upstream),
            vec![
                format!("{ROOT}/svg/plex-light.svg"),
                format!("{ROOT}/svg/plex.svg")
            ]
        );
    }

    #[tokio::test]
    async fn test_fallback_missing_is_not_found() {
        let upstream = StaticUpstream::default();
        let reply = router(&upstream).route(&request("/plex.svg", Some("123456"))).await;
        assert_eq!(reply.branch, Branch::Fallback);
        assert_eq!(reply.outcome, Err(IconError::UpstreamUnavailable));
    }

    #[tokio::test]
    async fn test_svg_without_color_is_plain() {
        let upstream = StaticUpstream::default().with(&format!("{ROOT}/svg/plex.svg"), SVG);
        let reply = router(&upstream).route(&request("/plex.svg", Some("  "))).await;
        assert_eq!(reply.branch, Branch::Plain);
        assert_eq!(reply.outcome.unwrap().body, Bytes::from(SVG));
        assert_eq!(requested(&upstream), vec![format!("{ROOT}/svg/plex.svg")]);
    }

    #[tokio::test]
    async fn test_raster_ignores_color() {
        let upstream = StaticUpstream::default()
            .with(&format!("{ROOT}/png/plex.png"), "png-bytes")
            .with(&format!("{ROOT}/webp/plex.webp"), "webp-bytes");
        let router = router(&upstream);

        let reply = router.route(&request("/plex.png", Some("123456"))).await;
        assert_eq!(reply.branch, Branch::Plain);
        let asset = reply.outcome.unwrap();
        assert_eq!(asset.body, Bytes::from("png-bytes"));
        assert_eq!(asset.content_type, "image/png");

        let asset = router
            .route(&request("/plex.webp", Some("123456")))
            .await
            .outcome
            .unwrap();
        assert_eq!(asset.content_type, "image/webp");
    }

    #[tokio::test]
    async fn test_uppercase_extension_keeps_filename() {
        let upstream = StaticUpstream::default().with(&format!("{ROOT}/png/Plex.PNG"), "png-bytes");
        let asset = router(&upstream)
            .route(&request("/Plex.PNG", None))
            .await
            .outcome
            .unwrap();
        assert_eq!(asset.content_type, "image/png");
    }

    #[tokio::test]
    async fn test_external_recolored() {
        let upstream = StaticUpstream::default().with("https://host.test/a.svg", SVG);
        let reply = router(&upstream)
            .route(&IconRequest {
                path: "/",
                color: Some("123456"),
                external: Some("https://host.test/a.svg"),
            })
            .await;
        assert_eq!(reply.branch, Branch::External);
        let asset = reply.outcome.unwrap();
        assert_eq!(asset.body, Bytes::from(SVG_RECOLORED));
        assert_eq!(asset.content_type, "image/svg+xml");
    }

    #[tokio::test]
    async fn test_external_without_color_passes_through() {
        let upstream = StaticUpstream::default().with("https://host.test/A.SVG?v=2", SVG);
        let asset = router(&upstream)
            .route(&IconRequest {
                path: "/whatever.png",
                color: None,
                external: Some("https://host.test/A.SVG?v=2"),
            })
            .await
            .outcome
            .unwrap();
        assert_eq!(asset.body, Bytes::from(SVG));
        assert_eq!(asset.content_type, "image/svg+xml");
    }

    #[tokio::test]
    async fn test_external_non_svg_rejected() {
        let upstream = StaticUpstream::default().with("https://host.test/a.png", "png");
        let reply = router(&upstream)
            .route(&IconRequest {
                path: "/",
                color: Some("abc"),
                external: Some("https://host.test/a.png"),
            })
            .await;
        assert_eq!(reply.outcome, Err(IconError::InvalidExternalTarget));
        assert_eq!(reply.outcome.unwrap_err().reason(), "Invalid external SVG");
    }

    #[tokio::test]
    async fn test_external_failure_and_malformed_rejected() {
        let upstream = StaticUpstream::default();
        let router = router(&upstream);
        for target in ["https://host.test/missing.svg", "ftp://host.test/a.svg", "a.svg", ""] {
            let reply = router
                .route(&IconRequest {
                    path: "/",
                    color: None,
                    external: Some(target),
                })
                .await;
            assert_eq!(reply.outcome, Err(IconError::InvalidExternalTarget), "{target}");
        }
        assert_eq!(requested(&upstream), vec!["https://host.test/missing.svg".to_string()]);
    }

    #[tokio::test]
    async fn test_external_from_path() {
        let upstream = StaticUpstream::default().with("https://host.test/a.svg", SVG);
        let reply = router(&upstream)
            .route(&request("/https://host.test/a.svg", Some("123456")))
            .await;
        assert_eq!(reply.branch, Branch::External);
        assert_eq!(reply.outcome.unwrap().body, Bytes::from(SVG_RECOLORED));
        // No CDN lookups for the URL-shaped path
        assert_eq!(requested(&upstream), vec!["https://host.test/a.svg".to_string()]);
    }

    #[tokio::test]
    async fn test_external_path_non_svg_rejected() {
        let upstream = StaticUpstream::default();
        let reply = router(&upstream)
            .route(&request("/http://host.test/a.png", None))
            .await;
        assert_eq!(reply.branch, Branch::External);
        assert_eq!(reply.outcome, Err(IconError::InvalidExternalTarget));
        assert!(requested(&upstream).is_empty());
    }

    #[test]
    fn test_external_target_precedence() {
        let both = IconRequest {
            path: "/https://path.test/a.svg",
            color: None,
            external: Some("https://query.test/b.svg"),
        };
        assert_eq!(both.external_target(), Some("https://query.test/b.svg"));

        let path_only = request("/https://path.test/a.svg", None);
        assert_eq!(path_only.external_target(), Some("https://path.test/a.svg"));

        // Not absolute http(s): stays a local asset path
        assert_eq!(request("/httpd-logo.svg", None).external_target(), None);
        assert_eq!(request("/ftp://host/a.svg", None).external_target(), None);
        assert_eq!(request("/icons/http.svg", None).external_target(), None);
    }

    #[tokio::test]
    async fn test_filename_reencoded_for_upstream() {
        let upstream = StaticUpstream::default()
            .with(&format!("{ROOT}/png/a%3Fb%20c.png"), "png-bytes");
        let asset = router(&upstream)
            .route(&request("/a?b c.png", None))
            .await
            .outcome
            .unwrap();
        assert_eq!(asset.content_type, "image/png");
        assert_eq!(requested(&upstream), vec![format!("{ROOT}/png/a%3Fb%20c.png")]);
    }
}
