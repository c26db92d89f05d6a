//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: method validation, the liveness
//! root, query/path decoding and dispatch into the icon router.

use crate::config::{AppState, HttpConfig};
use crate::http;
use crate::icon::{Fetch, IconRequest, IconRouter};
use crate::logger::{self, AccessLogEntry};
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Method, Request, Response};
use percent_encoding::percent_decode_str;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

/// Decoded request information needed for icon routing
#[derive(Debug, Default)]
pub struct RequestContext {
    /// Percent-decoded path
    pub path: String,
    pub color: Option<String>,
    pub external: Option<String>,
    pub is_head: bool,
}

impl RequestContext {
    /// Decode the path and pick `color` / `external` out of the query string
    ///
    /// The first occurrence of each parameter wins.
    pub fn from_parts(raw_path: &str, query: Option<&str>, is_head: bool) -> Self {
        let mut color = None;
        let mut external = None;
        for (key, value) in url::form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
            match key.as_ref() {
                "color" if color.is_none() => color = Some(value.into_owned()),
                "external" if external.is_none() => external = Some(value.into_owned()),
                _ => {}
            }
        }

        Self {
            path: percent_decode_str(raw_path).decode_utf8_lossy().into_owned(),
            color,
            external,
            is_head,
        }
    }
}

/// Main entry point for HTTP request handling
pub async fn handle_request(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let started = Instant::now();
    let method = req.method();
    let uri = req.uri();

    let (response, branch) = match check_http_method(method, state.config.http.enable_cors) {
        Some(resp) => (resp, None),
        None => {
            let ctx = RequestContext::from_parts(uri.path(), uri.query(), *method == Method::HEAD);
            let (resp, branch) = respond(&ctx, &state.icons, &state.config.http).await;
            (resp, Some(branch))
        }
    };

    if state.cached_access_log.load(Ordering::Relaxed) {
        let mut entry = AccessLogEntry::new(
            peer_addr.ip().to_string(),
            method.to_string(),
            uri.path().to_string(),
        );
        entry.query = uri.query().map(ToString::to_string);
        entry.http_version = version_label(req.version()).to_string();
        entry.status = response.status().as_u16();
        entry.body_bytes = content_length(&response);
        entry.referer = header_value(&req, "referer");
        entry.user_agent = header_value(&req, "user-agent");
        entry.branch = branch.unwrap_or("-");
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

/// Build the response for a GET/HEAD request; also returns the branch label
pub async fn respond<F: Fetch>(
    ctx: &RequestContext,
    icons: &IconRouter<F>,
    http_config: &HttpConfig,
) -> (Response<Full<Bytes>>, &'static str) {
    if ctx.external.is_none() && ctx.path == "/" {
        let resp = http::build_text_response(&http_config.liveness_text, ctx.is_head, http_config);
        return (resp, "root");
    }

    let request = IconRequest {
        path: &ctx.path,
        color: ctx.color.as_deref(),
        external: ctx.external.as_deref(),
    };
    let reply = icons.route(&request).await;
    let resp = match reply.outcome {
        Ok(asset) => {
            http::build_asset_response(asset.body, asset.content_type, ctx.is_head, http_config)
        }
        Err(e) => http::build_404_response(&e.reason(), http_config),
    };
    (resp, reply.branch.as_str())
}

/// Check HTTP method and return appropriate response for non-GET/HEAD methods
fn check_http_method(method: &Method, enable_cors: bool) -> Option<Response<Full<Bytes>>> {
    match *method {
        Method::GET | Method::HEAD => None,
        Method::OPTIONS => Some(http::build_options_response(enable_cors)),
        _ => {
            logger::log_warning(&format!("Method not allowed: {method}"));
            Some(http::build_405_response())
        }
    }
}

fn header_value<B>(req: &Request<B>, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}

fn content_length(resp: &Response<Full<Bytes>>) -> usize {
    resp.headers()
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}

const fn version_label(version: hyper::Version) -> &'static str {
    match version {
        hyper::Version::HTTP_10 => "1.0",
        hyper::Version::HTTP_2 => "2",
        _ => "1.1",
    }
}
