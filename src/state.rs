use crate::api::ApiClient;
use crate::storage::CredentialStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub api: ApiClient,
    pub members: Arc<dyn CredentialStore>,
}

impl AppState {
    pub fn new(api: ApiClient, members: Arc<dyn CredentialStore>) -> Self {
        Self { api, members }
    }
}
