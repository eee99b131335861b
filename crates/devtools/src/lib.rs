pub mod api;
pub mod collection_items;
pub mod config;
pub mod moves;
pub mod permission;
pub mod server;
pub mod storage;
pub mod sync;
pub mod telemetry;
pub mod testing;

pub use config::ServerConfig;
pub use server::DevToolsServer;
