pub mod bolt;
pub mod config;
pub mod context;
pub mod error;
pub mod middleware;
pub mod request;
pub mod response;
pub mod router;
pub mod service;
pub mod utils;
pub mod validation;

pub use crate::bolt::Bolt as Bolt;
pub use crate::config::AppConfig as AppConfig;
