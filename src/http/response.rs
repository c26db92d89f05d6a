//! HTTP response building module
//!
//! Provides builders for the gateway's responses, decoupled from icon logic.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::http::response::Builder;
use hyper::Response;

use crate::config::HttpConfig;

/// Common headers for every gateway response
fn base_builder(status: u16, http: &HttpConfig) -> Builder {
    let builder = Response::builder()
        .status(status)
        .header("Server", http.server_name.as_str());
    if http.enable_cors {
        builder.header("Access-Control-Allow-Origin", "*")
    } else {
        builder
    }
}

/// Build 200 response carrying icon bytes
pub fn build_asset_response(
    data: Bytes,
    content_type: &str,
    is_head: bool,
    http: &HttpConfig,
) -> Response<Full<Bytes>> {
    let content_length = data.len();
    let body = if is_head { Bytes::new() } else { data };

    base_builder(200, http)
        .header("Content-Type", content_type)
        .header("Content-Length", content_length)
        .body(Full::new(body))
        .unwrap_or_else(|e| {
            log_build_error("200", &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// Build 200 plain text response
pub fn build_text_response(text: &str, is_head: bool, http: &HttpConfig) -> Response<Full<Bytes>> {
    let content_length = text.len();
    let body = if is_head {
        Bytes::new()
    } else {
        Bytes::from(text.to_string())
    };

    base_builder(200, http)
        .header("Content-Type", "text/plain; charset=utf-8")
        .header("Content-Length", content_length)
        .body(Full::new(body))
        .unwrap_or_else(|e| {
            log_build_error("200", &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// Build 404 Not Found response with a short reason
pub fn build_404_response(reason: &str, http: &HttpConfig) -> Response<Full<Bytes>> {
    base_builder(404, http)
        .header("Content-Type", "text/plain; charset=utf-8")
        .body(Full::new(Bytes::from(reason.to_string())))
        .unwrap_or_else(|e| {
            log_build_error("404", &e);
            Response::new(Full::new(Bytes::from("404 Not Found")))
        })
}

/// Build 405 Method Not Allowed response
pub fn build_405_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(405)
        .header("Content-Type", "text/plain")
        .header("Allow", "GET, HEAD, OPTIONS")
        .body(Full::new(Bytes::from("405 Method Not Allowed")))
        .unwrap_or_else(|e| {
            log_build_error("405", &e);
            Response::new(Full::new(Bytes::from("405 Method Not Allowed")))
        })
}

/// Build OPTIONS response (preflight request)
pub fn build_options_response(enable_cors: bool) -> Response<Full<Bytes>> {
    let mut builder = Response::builder()
        .status(204)
        .header("Allow", "GET, HEAD, OPTIONS");

    if enable_cors {
        builder = builder
            .header("Access-Control-Allow-Origin", "*")
            .header("Access-Control-Allow-Methods", "GET, HEAD, OPTIONS")
            .header("Access-Control-Max-Age", "86400");
    }

    builder.body(Full::new(Bytes::new())).unwrap_or_else(|e| {
        log_build_error("OPTIONS", &e);
        Response::new(Full::new(Bytes::new()))
    })
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}
