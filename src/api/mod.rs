pub(crate) mod client;
pub(crate) mod models;
pub(crate) mod ops;
pub mod snapshot;

pub use client::ApiClient;
pub use models::unwrap_list;
pub use snapshot::{load_history_snapshot, load_reports};
