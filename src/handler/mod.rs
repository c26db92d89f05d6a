//! Request handler module
//!
//! Turns hyper requests into icon gateway responses.

pub mod router;

// Re-export main entry point
pub use router::handle_request;
