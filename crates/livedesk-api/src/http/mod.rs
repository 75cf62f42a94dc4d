//! REST API layer: router, handlers, extractors, envelope responses.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod response;
pub mod router;
