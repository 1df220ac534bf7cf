pub mod app;
pub mod cache;
pub mod clean;
pub mod config;
pub mod errors;
pub mod fetch;
pub mod font;
pub mod handlers;
pub mod join;
pub mod models;
pub mod pages;
pub mod render;
pub mod state;
pub mod stats;
pub mod ui;

pub use app::router;
pub use config::DashboardConfig;
pub use state::AppState;
