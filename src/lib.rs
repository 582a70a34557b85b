#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod api;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod feed;
pub mod history;
pub mod normalize;
pub mod reports;
pub mod sensor;
pub mod telemetry;
pub mod toast;
pub mod types;

pub type Result<T> = std::result::Result<T, error::Error>;
