use bill_viewer::{ApiClient, AppState, FileCredentialStore, resolve_api_base_url, resolve_data_path, router};
use std::{env, net::SocketAddr, sync::Arc};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let data_path = resolve_data_path();
    if let Some(parent) = data_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let members = Arc::new(FileCredentialStore::open(data_path));

    let base_url = resolve_api_base_url();
    info!("bill backend at {base_url}");
    let state = AppState::new(ApiClient::new(base_url), members);
    let app = router(state);

    let port = env::var("PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(3000);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!("listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
