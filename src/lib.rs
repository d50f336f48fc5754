pub mod api;
pub mod app;
pub mod errors;
pub mod fetch;
pub mod handlers;
pub mod models;
pub mod state;
pub mod storage;
pub mod totals;
pub mod ui;
pub mod venmo;

pub use api::{ApiClient, resolve_api_base_url};
pub use app::router;
pub use state::AppState;
pub use storage::{FileCredentialStore, resolve_data_path};
