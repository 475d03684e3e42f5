pub mod admin;
pub mod api;
pub mod auth;
pub mod init;
pub mod internal;
pub mod invalid_req;

pub use admin::AdminError;
pub use api::ApiError;
pub use init::{ConfigError, InitError};
