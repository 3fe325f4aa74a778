// Shared helpers: configuration, formatting, time windows and rendering
pub mod config;
pub mod emojis;
pub mod formatters;
pub mod periods;
pub mod points;
pub mod streak;
pub mod visualizations;
