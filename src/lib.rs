//! Feed relay library.
//!
//! Resilient access to a paginated scraping API, response normalization,
//! heuristic deduplication and a Telegram front-end on top.

/// Telegram command handlers and reply rendering.
pub mod bot;
/// Configuration management.
pub mod config;
/// Pagination, normalization and deduplication of feed pages.
pub mod feed;
/// User references, user lists and post media.
pub mod profiles;
/// HTTP client for the scraping API.
pub mod upstream;
/// Utility functions.
pub mod utils;
