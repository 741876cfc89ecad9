/// Purge Hub - moderation and account erasure service
///
/// Admin authorization, account bans, the report queue, the email ban
/// ledger and the cascading account deletion workflow, served over HTTP.

pub mod account;
pub mod admin;
pub mod api;
pub mod auth;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod events;
pub mod jobs;
pub mod server;

pub use config::ServerConfig;
pub use context::AppContext;
pub use error::{HubError, HubResult};
