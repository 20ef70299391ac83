//! Configuration sources, lowest precedence first.

pub mod user_file;
pub mod workspace_file;
pub mod environment;
