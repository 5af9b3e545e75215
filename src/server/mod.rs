//! HTTP server

pub mod config;
pub mod listener;
pub mod routes;

pub use config::ServerConfig;
pub use listener::HubServer;
pub use routes::router;
