//! HTTP protocol layer module
//!
//! Response builders, MIME detection and static file validators, decoupled
//! from the project handlers.

pub mod cache;
pub mod mime;
pub mod response;

// Re-export commonly used types
pub use response::{
    apply_cors, build_304_response, build_404_response, build_413_response,
    build_file_response, build_options_response, json_response, text_response, HttpResponse,
};
