// Stateful behaviour behind the commands and the gateway event handlers
pub mod afk;
pub mod ayumi;
pub mod custom_prompt;
pub mod immersion_store;
pub mod log_sessions;
pub mod news_feed;
pub mod novels;
