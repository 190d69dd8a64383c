//! Player/parent onboarding for the recruiting platform: profile store,
//! step resolution, the parent-to-player link flow, and the HTTP and MCP
//! surfaces over them.

pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod onboarding;
pub mod router;
pub mod server;
pub mod session;
pub mod store;
