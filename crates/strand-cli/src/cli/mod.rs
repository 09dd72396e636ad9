pub mod commands;
pub mod config;
pub mod render;

pub use commands::{resolve_user, CliCommand, OutputFormat, Session};
pub use config::{CliConfig, Credentials};
pub use render::{render_json, time_ago, Render};
