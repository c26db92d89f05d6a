//! HTTP protocol layer module
//!
//! Content-Type resolution and response builders, decoupled from icon logic.

pub mod mime;
pub mod response;

pub use response::{
    build_404_response, build_405_response, build_asset_response, build_options_response,
    build_text_response,
};
