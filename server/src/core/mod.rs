//! Core application infrastructure

pub mod cli;
pub mod config;
pub mod constants;
pub mod reporter;
pub mod shutdown;

pub use crate::app::CoreApp;
pub use cli::{CliConfig, Commands};
pub use config::{AppConfig, IngestConfig, ServerConfig};
pub use reporter::{Reporter, RequestContext, TracingReporter};
pub use shutdown::ShutdownService;
