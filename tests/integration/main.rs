//! Integration tests for Site-Mirror
//!
//! Crawl behaviour is exercised through a scripted render backend; the HTTP
//! backend and the axum router are exercised end-to-end against wiremock
//! servers and temporary directories.

mod crawl_tests;
mod http_backend_tests;
mod server_tests;
