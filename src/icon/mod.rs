//! Icon gateway core
//!
//! Request interpretation and SVG recoloring, independent of the HTTP server.

pub mod asset;
pub mod color;
pub mod error;
pub mod fetcher;
pub mod recolor;
pub mod router;

pub use fetcher::{Fetch, HttpFetcher};
pub use router::{IconRequest, IconRouter};
