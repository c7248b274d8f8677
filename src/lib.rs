pub mod config;
pub mod dispatch;
pub mod docs;
pub mod extract;
pub mod library;
pub mod server;
pub mod store;
pub mod webhook;
