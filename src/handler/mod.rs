//! Request handler module
//!
//! Routing dispatch, the project API and static file serving.

pub mod form;
pub mod projects;
pub mod router;
pub mod static_files;

// Re-export main entry point
pub use router::handle_request;
