/// Command parsing and handlers
pub mod handlers;
/// Common messaging utilities (split long messages)
pub mod messaging;
/// Resilient messaging with automatic retry for Telegram API operations
pub mod resilient;
/// Reply rendering for profiles, user lists and feeds
pub mod views;
