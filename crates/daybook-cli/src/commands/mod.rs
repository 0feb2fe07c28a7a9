mod auth_cmd;
pub(crate) mod common;
mod config_cmd;
mod fields;
mod sync_cmd;

pub use auth_cmd::run_auth;
pub use config_cmd::run_config;
pub use fields::{run_get, run_set};
pub use sync_cmd::{run_status, run_sync};
