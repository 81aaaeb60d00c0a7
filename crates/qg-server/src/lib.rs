//! HTTP surface over the C10 pipeline (§6): a thin axum app plus the
//! ambient config/provider/error wiring it needs. Kept as a library so
//! both this crate's own binary and `qg-cli`'s `serve` subcommand can
//! embed it without duplicating setup.

mod app;
mod config;
mod error;
mod providers;
mod routes;
mod serve;

pub use app::build_router;
pub use config::{app_env, load_settings, ApplicationSettings, MetadataSettings, Settings};
pub use error::ApiError;
pub use providers::{FileMetadataProvider, FileRoleProvider};
pub use routes::{AppState, QueryRequest};
pub use serve::run;
