use axum::Json;
use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::routing::{get, post};
use once_cell::sync::Lazy;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

struct TestStack {
    base_url: String,
    child: Child,
}

impl Drop for TestStack {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

static TEST_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));
static STACK: Lazy<Mutex<Option<Arc<TestStack>>>> = Lazy::new(|| Mutex::new(None));

#[cfg(unix)]
mod cleanup {
    use std::sync::Once;
    use std::sync::atomic::{AtomicI32, Ordering};

    static REGISTER: Once = Once::new();
    static PID: AtomicI32 = AtomicI32::new(0);

    pub fn register(pid: u32) {
        REGISTER.call_once(|| {
            PID.store(pid as i32, Ordering::SeqCst);
            unsafe {
                libc::atexit(on_exit);
            }
        });
    }

    extern "C" fn on_exit() {
        let pid = PID.load(Ordering::SeqCst);
        if pid > 0 {
            unsafe {
                libc::kill(pid, libc::SIGTERM);
            }
        }
    }
}

// ---- mock bill backend ----

const GOOD_TOKEN: &str = "tok";

#[derive(Debug, Deserialize)]
struct TokenQuery {
    t: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JoinBody {
    display_name: String,
}

fn token_ok(query: &TokenQuery) -> bool {
    query.t.as_deref() == Some(GOOD_TOKEN)
}

fn bill_json(id: i64, name: &str, shares: &[(i64, &str, f64)]) -> Value {
    let share_values: Vec<Value> = shares
        .iter()
        .map(|(share_id, person, total)| {
            json!({
                "id": share_id,
                "person_name": person,
                "items": [
                    { "name": "Entree", "amount": total - 10.0, "is_shared": false },
                    { "name": "Appetizer", "amount": 10.0, "is_shared": true },
                ],
                "subtotal": total,
                "tax_share": 0.0,
                "tip_share": 0.0,
                "total": total,
            })
        })
        .collect();
    let total: f64 = shares.iter().map(|(_, _, t)| t).sum();
    json!({
        "id": id,
        "name": name,
        "subtotal": total,
        "tax": 0.0,
        "tip_amount": 0.0,
        "tip_percentage": 0.0,
        "total": total,
        "date": "2025-06-14",
        "payment_methods": [
            { "name": "Venmo", "identifier": "@kruski-ko" },
            { "name": "Zelle", "identifier": "555-0100" },
        ],
        "items": [
            { "id": 1, "name": "Entree", "price": total - 10.0 },
            { "id": 2, "name": "Appetizer", "price": 10.0 },
        ],
        "person_shares": share_values,
    })
}

async fn mock_bill(
    Path(id): Path<i64>,
    Query(query): Query<TokenQuery>,
) -> (StatusCode, Json<Value>) {
    if !token_ok(&query) {
        return (StatusCode::FORBIDDEN, Json(json!({})));
    }
    match id {
        1 => (
            StatusCode::OK,
            Json(bill_json(1, "Team Dinner", &[(1, "Alice", 60.0), (2, "Bob", 40.0)])),
        ),
        _ => (StatusCode::NOT_FOUND, Json(json!({}))),
    }
}

async fn mock_tab(
    Path(id): Path<i64>,
    Query(query): Query<TokenQuery>,
) -> (StatusCode, Json<Value>) {
    if !token_ok(&query) {
        return (StatusCode::FORBIDDEN, Json(json!({})));
    }
    match id {
        1 => (
            StatusCode::OK,
            Json(json!({
                "id": 1,
                "name": "Lake Weekend",
                "description": "Cabin trip",
                "bills": [
                    bill_json(10, "Groceries", &[(1, "Alice", 60.0), (2, "Bob", 40.0)]),
                    bill_json(11, "Boat Rental", &[(3, "alice", 30.0), (4, "Bob", 20.0)]),
                ],
                "total_amount": 150.0,
                "finalized": false,
                "finalized_at": null,
                "created_at": "2025-06-13T09:00:00Z",
            })),
        ),
        2 => (
            StatusCode::OK,
            Json(json!({
                "id": 2,
                "name": "Ski Trip",
                "description": "",
                "bills": [bill_json(20, "Lift Tickets", &[(1, "Carol", 80.0)])],
                "total_amount": 80.0,
                "finalized": true,
                "finalized_at": "2025-03-01T12:00:00Z",
                "created_at": "2025-02-01T12:00:00Z",
            })),
        ),
        _ => (StatusCode::NOT_FOUND, Json(json!({}))),
    }
}

// Tab 1 answers 500 here so the page must degrade to an empty gallery.
async fn mock_images(Path(id): Path<i64>) -> (StatusCode, Json<Value>) {
    match id {
        2 => (
            StatusCode::OK,
            Json(json!([{
                "id": 1,
                "tab_id": 2,
                "filename": "receipt.jpg",
                "url": "/api/images/1",
                "size": 1024,
                "mime_type": "image/jpeg",
                "processed": true,
                "uploaded_by": "Carol",
                "created_at": "2025-02-02T12:00:00Z",
            }])),
        ),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({}))),
    }
}

async fn mock_settlements(Path(id): Path<i64>) -> Json<Value> {
    match id {
        2 => Json(json!([
            {
                "id": 1,
                "tab_id": 2,
                "person_name": "Carol",
                "amount": 55.0,
                "paid": true,
                "created_at": "2025-03-01T12:00:00Z",
            },
            {
                "id": 2,
                "tab_id": 2,
                "person_name": "Dan",
                "amount": 25.0,
                "paid": false,
                "created_at": "2025-03-01T12:00:00Z",
            },
        ])),
        _ => Json(json!([])),
    }
}

async fn mock_members(Path(id): Path<i64>) -> Json<Value> {
    match id {
        1 => Json(json!([{
            "id": 1,
            "tab_id": 1,
            "display_name": "Kruski",
            "role": "creator",
            "joined_at": "2025-06-13T09:00:00Z",
        }])),
        _ => Json(json!([])),
    }
}

async fn mock_join(
    Path(id): Path<i64>,
    Query(query): Query<TokenQuery>,
    Json(body): Json<JoinBody>,
) -> (StatusCode, Json<Value>) {
    if !token_ok(&query) {
        return (StatusCode::FORBIDDEN, Json(json!({})));
    }
    if body.display_name == "fail" {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({})));
    }
    (
        StatusCode::OK,
        Json(json!({
            "member_id": 99,
            "tab_id": id,
            "member_token": "member-secret",
            "display_name": body.display_name,
            "role": "member",
        })),
    )
}

fn spawn_mock_backend() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind backend port");
    let port = listener.local_addr().unwrap().port();
    listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("backend runtime");
        runtime.block_on(async move {
            let app = axum::Router::new()
                .route("/api/bills/:id", get(mock_bill))
                .route("/api/tabs/:id", get(mock_tab))
                .route("/api/tabs/:id/images", get(mock_images))
                .route("/api/tabs/:id/settlements", get(mock_settlements))
                .route("/api/tabs/:id/members", get(mock_members))
                .route("/api/tabs/:id/join", post(mock_join));
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            axum::serve(listener, app).await.unwrap();
        });
    });

    port
}

// ---- viewer under test ----

fn pick_free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind random port");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

fn unique_data_path() -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let mut path = std::env::temp_dir();
    path.push(format!("bill_viewer_http_{}_{}.json", std::process::id(), nanos));
    path.to_string_lossy().to_string()
}

async fn wait_until_ready(base_url: &str) {
    let client = Client::new();
    let deadline = Instant::now() + Duration::from_secs(3);
    loop {
        if let Ok(resp) = client.get(base_url.to_string()).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        if Instant::now() > deadline {
            panic!("server did not become ready");
        }
        sleep(Duration::from_millis(100)).await;
    }
}

async fn spawn_stack() -> TestStack {
    let backend_port = spawn_mock_backend();
    let port = pick_free_port();
    let data_path = unique_data_path();
    let child = Command::new(env!("CARGO_BIN_EXE_bill_viewer"))
        .env("PORT", port.to_string())
        .env("API_BASE_URL", format!("http://127.0.0.1:{backend_port}"))
        .env("APP_DATA_PATH", data_path)
        .env("RUST_LOG", "info")
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .expect("failed to spawn viewer");

    #[cfg(unix)]
    cleanup::register(child.id());

    let base_url = format!("http://127.0.0.1:{port}");
    wait_until_ready(&base_url).await;

    TestStack { base_url, child }
}

async fn shared_stack() -> Arc<TestStack> {
    let mut guard = STACK.lock().await;
    if let Some(stack) = guard.as_ref() {
        return Arc::clone(stack);
    }
    let stack = Arc::new(spawn_stack().await);
    *guard = Some(Arc::clone(&stack));
    stack
}

async fn get_page(path: &str) -> (reqwest::StatusCode, String) {
    let stack = shared_stack().await;
    let response = Client::new()
        .get(format!("{}{path}", stack.base_url))
        .send()
        .await
        .unwrap();
    let status = response.status();
    (status, response.text().await.unwrap())
}

// ---- tests ----

#[tokio::test]
async fn http_bill_page_renders_shares_and_venmo_links() {
    let _guard = TEST_LOCK.lock().await;
    let (status, body) = get_page("/b/1?t=tok").await;

    assert!(status.is_success());
    assert!(body.contains("Team Dinner"));
    assert!(body.contains("Alice"));
    assert!(body.contains("Bob"));
    assert!(body.contains("$100.00"));
    assert!(body.contains("venmo://paycharge?txn=pay&amp;recipients=kruski-ko"));
    assert!(body.contains("note=Split%20bill%20-%20Alice"));
    assert!(body.contains("(shared)"));
}

#[tokio::test]
async fn http_missing_token_is_guarded_before_any_fetch() {
    let _guard = TEST_LOCK.lock().await;
    let (status, body) = get_page("/b/1").await;

    assert!(status.is_success());
    assert!(body.contains("Access Token Required"));
}

#[tokio::test]
async fn http_invalid_token_renders_distinct_error() {
    let _guard = TEST_LOCK.lock().await;
    let (_, body) = get_page("/b/1?t=wrong").await;
    assert!(body.contains("Invalid Access Token"));
    assert!(!body.contains("Not Found"));
}

#[tokio::test]
async fn http_unknown_bill_renders_not_found() {
    let _guard = TEST_LOCK.lock().await;
    let (_, body) = get_page("/b/999?t=tok").await;
    assert!(body.contains("Bill Not Found"));
}

#[tokio::test]
async fn http_tab_page_aggregates_person_totals() {
    let _guard = TEST_LOCK.lock().await;
    let (status, body) = get_page("/t/1?t=tok").await;

    assert!(status.is_success());
    assert!(body.contains("Lake Weekend"));
    assert!(body.contains("Per Person Totals"));
    // "Alice" and "alice" merge across the two bills.
    assert!(body.contains("$90.00"));
    assert!(body.contains("2 bills"));
    assert!(body.contains("$60.00"));
    // The images endpoint answers 500 for this tab; the page renders anyway.
    assert!(!body.contains("processed"));
    // Member list from the members endpoint.
    assert!(body.contains("Kruski"));
}

#[tokio::test]
async fn http_finalized_tab_shows_settlements_and_gallery() {
    let _guard = TEST_LOCK.lock().await;
    let (_, body) = get_page("/t/2?t=tok").await;

    assert!(body.contains("Settlements"));
    assert!(body.contains("1/2 paid"));
    assert!(body.contains("Dan"));
    assert!(!body.contains("Per Person Totals"));
    assert!(body.contains("1/1 processed"));
    assert!(body.contains("/api/images/1"));
}

#[tokio::test]
async fn http_join_persists_credential_across_reloads() {
    let _guard = TEST_LOCK.lock().await;
    let stack = shared_stack().await;
    let client = Client::new();

    let response = client
        .post(format!("{}/t/1/join?t=tok", stack.base_url))
        .form(&[("display_name", "Zoe")])
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    assert!(response.text().await.unwrap().contains("Joined as Zoe"));

    // A later page load reads the cached credential instead of the form.
    let (_, body) = get_page("/t/1?t=tok").await;
    assert!(body.contains("Joined as Zoe"));
}

#[tokio::test]
async fn http_join_failure_surfaces_inline_error() {
    let _guard = TEST_LOCK.lock().await;
    let stack = shared_stack().await;
    let client = Client::new();

    let response = client
        .post(format!("{}/t/2/join?t=tok", stack.base_url))
        .form(&[("display_name", "fail")])
        .send()
        .await
        .unwrap();
    let body = response.text().await.unwrap();
    assert!(body.contains("Failed to join. Please try again."));
    // The rest of the page is untouched by the failure.
    assert!(body.contains("Ski Trip"));
}

#[tokio::test]
async fn http_join_validates_display_name_length() {
    let _guard = TEST_LOCK.lock().await;
    let stack = shared_stack().await;
    let client = Client::new();

    let long_name = "x".repeat(31);
    let response = client
        .post(format!("{}/t/2/join?t=tok", stack.base_url))
        .form(&[("display_name", long_name.as_str())])
        .send()
        .await
        .unwrap();
    let body = response.text().await.unwrap();
    assert!(body.contains("Name must be 1-30 characters"));
}
