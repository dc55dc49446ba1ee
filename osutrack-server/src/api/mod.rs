//! HTTP API handlers

pub mod config;
pub mod health;
pub mod library;
pub mod players;
pub mod recommend;
pub mod songs;
pub mod tasks;

pub use config::config_routes;
pub use health::health_routes;
pub use library::library_routes;
pub use players::player_routes;
pub use recommend::recommend_routes;
pub use songs::song_routes;
pub use tasks::task_routes;
