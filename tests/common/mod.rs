use std::collections::HashMap;
use std::env;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request};
use axum::Router;
use chrono::Utc;
use diesel::connection::SimpleConnection;
use http_body_util::BodyExt;
use once_cell::sync::Lazy;
use order_gateway::config::AppConfig;
use order_gateway::db::{self, PgPool};
use order_gateway::orders::notifier::Notifier;
use order_gateway::orders::repository::{CreatedOrder, OrderRepository, OrderStatus};
use order_gateway::orders::{Order, UploadedFile};
use order_gateway::routes;
use order_gateway::state::AppState;
use order_gateway::storage::ObjectStorage;
use serde_json::Value;
use tokio::sync::{Mutex, MutexGuard};
use tower::util::ServiceExt;
use uuid::Uuid;

pub const TEST_TOKEN: &str = "test-upload-token";

static DB_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// Migrated Postgres database with an empty `orders` table, held exclusively
/// by one test at a time.
#[allow(dead_code)]
pub struct TestDatabase {
    pub pool: PgPool,
    _guard: MutexGuard<'static, ()>,
}

/// Connects to `TEST_DATABASE_URL`; `None` when it is not set.
#[allow(dead_code)]
pub async fn test_database() -> Result<Option<TestDatabase>> {
    let Ok(database_url) = env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set; skipping order store test");
        return Ok(None);
    };

    let guard = DB_LOCK.lock().await;
    let pool = db::init_pool_with_size(&database_url, 2)?;
    let prepare_pool = pool.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        db::run_migrations(&prepare_pool)?;
        let mut conn = prepare_pool
            .get()
            .map_err(|err| anyhow!("failed to get cleanup connection: {err}"))?;
        conn.batch_execute("TRUNCATE TABLE orders")
            .context("failed to truncate orders")?;
        Ok(())
    })
    .await
    .context("database preparation task panicked")??;

    Ok(Some(TestDatabase {
        pool,
        _guard: guard,
    }))
}

#[allow(dead_code)]
#[derive(Clone)]
pub struct StoredObject {
    pub key: String,
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub content_disposition: Option<String>,
}

/// In-memory object store; keys containing `fail_on` are refused and keys
/// containing the `stall_on` fragment are held back for the given delay.
#[derive(Default)]
pub struct FakeStorage {
    objects: Mutex<HashMap<String, StoredObject>>,
    fail_on: Option<String>,
    stall_on: Option<(String, Duration)>,
    put_calls: AtomicUsize,
}

impl FakeStorage {
    pub fn failing_on(fragment: &str) -> Self {
        Self {
            fail_on: Some(fragment.to_string()),
            ..Self::default()
        }
    }

    #[allow(dead_code)]
    pub fn stalling_on(mut self, fragment: &str, delay: Duration) -> Self {
        self.stall_on = Some((fragment.to_string(), delay));
        self
    }

    #[allow(dead_code)]
    pub async fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().await.get(key).cloned()
    }

    #[allow(dead_code)]
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    #[allow(dead_code)]
    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<String>,
        content_disposition: Option<String>,
    ) -> Result<()> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        if let Some((fragment, delay)) = &self.stall_on {
            if key.contains(fragment.as_str()) {
                tokio::time::sleep(*delay).await;
            }
        }
        if let Some(fragment) = &self.fail_on {
            if key.contains(fragment.as_str()) {
                bail!("simulated storage outage for {key}");
            }
        }
        let stored = StoredObject {
            key: key.to_string(),
            bytes,
            content_type,
            content_disposition,
        };
        self.objects.lock().await.insert(stored.key.clone(), stored);
        Ok(())
    }

    async fn object_url(&self, key: &str) -> Result<String> {
        Ok(format!("https://fake-storage/{key}"))
    }
}

#[allow(dead_code)]
#[derive(Clone)]
pub struct RecordedOrder {
    pub record_id: String,
    pub order: Order,
    pub files: Vec<UploadedFile>,
    pub status: String,
}

#[derive(Default)]
pub struct FakeOrderRepository {
    orders: Mutex<Vec<RecordedOrder>>,
    fail: bool,
    create_calls: AtomicUsize,
}

impl FakeOrderRepository {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    #[allow(dead_code)]
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    #[allow(dead_code)]
    pub async fn orders(&self) -> Vec<RecordedOrder> {
        self.orders.lock().await.clone()
    }

    #[allow(dead_code)]
    pub async fn seed(&self, order_id: &str, status: &str, files: usize) {
        let order = Order {
            order_id: order_id.to_string(),
            name: "Seeded Customer".to_string(),
            email: "seeded@example.com".to_string(),
            phone: None,
            description: None,
            submitted_at: Utc::now().date_naive(),
        };
        let files = (0..files)
            .map(|index| UploadedFile {
                original_name: format!("seed-{index}.pdf"),
                sanitized_name: format!("seed-{index}.pdf"),
                storage_key: format!("{order_id}_{index}_seed-{index}.pdf"),
                folder_path: String::new(),
                remote_id: String::new(),
                url: String::new(),
                thumbnail_url: None,
                size_bytes: 0,
                content_type: None,
            })
            .collect();
        self.orders.lock().await.push(RecordedOrder {
            record_id: Uuid::new_v4().to_string(),
            order,
            files,
            status: status.to_string(),
        });
    }
}

#[async_trait]
impl OrderRepository for FakeOrderRepository {
    async fn create_order(&self, order: &Order, files: &[UploadedFile]) -> Result<CreatedOrder> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            bail!("simulated order store outage");
        }
        let record_id = Uuid::new_v4().to_string();
        self.orders.lock().await.push(RecordedOrder {
            record_id: record_id.clone(),
            order: order.clone(),
            files: files.to_vec(),
            status: "pending".to_string(),
        });
        Ok(CreatedOrder { record_id })
    }

    async fn find_order(&self, order_id: &str) -> Result<Option<OrderStatus>> {
        let orders = self.orders.lock().await;
        Ok(orders
            .iter()
            .find(|recorded| recorded.order.order_id == order_id)
            .map(|recorded| {
                let stamp = recorded
                    .order
                    .submitted_at
                    .and_hms_opt(0, 0, 0)
                    .map(|dt| dt.and_utc().to_rfc3339())
                    .unwrap_or_default();
                OrderStatus {
                    order_id: recorded.order.order_id.clone(),
                    status: recorded.status.clone(),
                    submitted_at: recorded.order.submitted_at,
                    created_at: stamp.clone(),
                    updated_at: stamp,
                    files_count: Some(recorded.files.len()),
                }
            }))
    }
}

#[derive(Default)]
pub struct FakeNotifier {
    sent: Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl FakeNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// `(order_id, folder_path)` for every notification attempted.
    #[allow(dead_code)]
    pub async fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn notify(&self, order: &Order, folder_path: &str) -> Result<()> {
        self.sent
            .lock()
            .await
            .push((order.order_id.clone(), folder_path.to_string()));
        if self.fail {
            return Err(anyhow!("simulated mail relay rejection"));
        }
        Ok(())
    }
}

pub struct TestOptions {
    pub storage: Option<FakeStorage>,
    pub orders: Option<FakeOrderRepository>,
    pub notifier: Option<FakeNotifier>,
    pub rate_limit_max: u32,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            storage: Some(FakeStorage::default()),
            orders: Some(FakeOrderRepository::default()),
            notifier: Some(FakeNotifier::default()),
            rate_limit_max: 1_000,
        }
    }
}

pub struct TestApp {
    router: Router,
    storage: Option<Arc<FakeStorage>>,
    orders: Option<Arc<FakeOrderRepository>>,
    notifier: Option<Arc<FakeNotifier>>,
}

pub fn test_config(rate_limit_max: u32) -> AppConfig {
    AppConfig {
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        upload_api_token: TEST_TOKEN.to_string(),
        cors_allowed_origin: None,
        storage_namespace: "uploads".to_string(),
        storage_public_base_url: None,
        storage: None,
        database: None,
        smtp: None,
        upload_rate_limit_max: rate_limit_max,
        upload_rate_limit_window_secs: 900,
    }
}

#[allow(dead_code)]
impl TestApp {
    pub fn new() -> Self {
        Self::with(TestOptions::default())
    }

    pub fn with(options: TestOptions) -> Self {
        let storage = options.storage.map(Arc::new);
        let orders = options.orders.map(Arc::new);
        let notifier = options.notifier.map(Arc::new);

        let state = AppState::new(
            test_config(options.rate_limit_max),
            storage.clone().map(|s| s as Arc<dyn ObjectStorage>),
            orders.clone().map(|o| o as Arc<dyn OrderRepository>),
            notifier.clone().map(|n| n as Arc<dyn Notifier>),
        );

        Self {
            router: routes::create_router(state),
            storage,
            orders,
            notifier,
        }
    }

    pub fn storage(&self) -> Arc<FakeStorage> {
        self.storage.clone().expect("storage configured")
    }

    pub fn orders(&self) -> Arc<FakeOrderRepository> {
        self.orders.clone().expect("order store configured")
    }

    pub fn notifier(&self) -> Arc<FakeNotifier> {
        self.notifier.clone().expect("notifier configured")
    }

    pub async fn get(&self, path: &str) -> Result<hyper::Response<Body>> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(path)
            .body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn upload(
        &self,
        form: MultipartForm,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let (content_type, body) = form.finish();
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/api/upload")
            .header("content-type", content_type)
            .header("x-forwarded-for", "203.0.113.10");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::from(body))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }
}

/// Hand-built `multipart/form-data` body.
pub struct MultipartForm {
    boundary: String,
    body: Vec<u8>,
}

#[allow(dead_code)]
impl MultipartForm {
    pub fn new() -> Self {
        Self {
            boundary: format!("boundary-{}", Uuid::new_v4()),
            body: Vec::new(),
        }
    }

    /// The customer fields every valid order carries.
    pub fn customer(name: &str, email: &str) -> Self {
        Self::new().text("nome", name).text("email", email)
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body
            .extend(format!("--{}\r\n", self.boundary).as_bytes());
        self.body.extend(
            format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
        );
        self.body.extend(value.as_bytes());
        self.body.extend(b"\r\n");
        self
    }

    pub fn file(mut self, filename: &str, content_type: &str, data: &[u8]) -> Self {
        self.body
            .extend(format!("--{}\r\n", self.boundary).as_bytes());
        self.body.extend(
            format!(
                "Content-Disposition: form-data; name=\"ficheiros\"; filename=\"{filename}\"\r\n"
            )
            .as_bytes(),
        );
        self.body
            .extend(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
        self.body.extend(data);
        self.body.extend(b"\r\n");
        self
    }

    pub fn pdf(self, filename: &str, size: usize) -> Self {
        let mut data = b"%PDF-1.7\n".to_vec();
        data.resize(size.max(data.len()), b'0');
        self.file(filename, "application/pdf", &data)
    }

    fn finish(mut self) -> (String, Vec<u8>) {
        self.body
            .extend(format!("--{}--\r\n", self.boundary).as_bytes());
        (
            format!("multipart/form-data; boundary={}", self.boundary),
            self.body,
        )
    }
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body
        .collect()
        .await
        .map_err(|err| anyhow!("failed to read response body: {err}"))?;
    Ok(collected.to_bytes().to_vec())
}

pub async fn body_json(response: hyper::Response<Body>) -> Result<Value> {
    let body = body_to_vec(response.into_body()).await?;
    Ok(serde_json::from_slice(&body)?)
}

#[allow(dead_code)]
pub fn is_order_id(value: &str) -> bool {
    value.len() >= 17 && value.bytes().all(|b| b.is_ascii_digit())
}
