// tests/common/mod.rs
#![allow(dead_code)] // Allow unused code in this common test module

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fulfillment::{
  AdminOrderNotification, CompletedOrderEmail, ContextData, Customer, CustomizationProcessingEmail, DesignFile,
  DesignFileCatalog, DesignFileQuery, FulfillmentConfig, FulfillmentError, FulfillmentOrchestrator, FulfillmentResult,
  GrantOutcome, GrantStore, MemoryDesignFileCatalog, MemoryGrantStore, MemoryOrderStore, Notifier, Order, OrderDesignFile,
  OrderItem, PipelineControl, PipelineError, RetryPolicy,
};
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::{
  atomic::{AtomicBool, AtomicUsize, Ordering},
  Arc,
};
use std::time::Duration;
use tracing::Level;
use uuid::Uuid;

// --- Pipeline engine fixtures ---
#[derive(Clone, Debug, Default)]
pub struct TestContext {
  pub counter: i32,
  pub message: String,
  pub steps_executed: Vec<String>,
  pub should_stop_at: Option<String>,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum TestError {
  #[error("Pipeline engine error: {0}")]
  Engine(String), // Stored as Debug text for Eq comparison

  #[error("Test handler failed: {0}")]
  Handler(String),
}

pub type TestFuture = Pin<Box<dyn Future<Output = Result<PipelineControl, TestError>> + Send>>;

impl From<PipelineError> for TestError {
  fn from(pe: PipelineError) -> Self {
    TestError::Engine(format!("{:?}", pe))
  }
}

pub fn create_simple_handler(
  step_name: &'static str,
  message_to_append: &'static str,
) -> impl Fn(ContextData<TestContext>) -> TestFuture + Send + Sync + 'static {
  move |ctx: ContextData<TestContext>| -> TestFuture {
    let step_name_owned = step_name.to_string();
    Box::pin(async move {
      let mut guard = ctx.write();
      guard.counter += 1;
      guard.message.push_str(message_to_append);
      guard.steps_executed.push(step_name_owned.clone());
      tracing::debug!(target: "test_handlers", step = %step_name_owned, "executed, counter: {}, message: '{}'", guard.counter, guard.message);
      if let Some(stop_step) = &guard.should_stop_at {
        if stop_step == step_name_owned.as_str() {
          return Ok(PipelineControl::Stop);
        }
      }
      Ok(PipelineControl::Continue)
    })
  }
}

pub fn create_failing_handler(
  step_name: &'static str,
  error_message: &'static str,
) -> impl Fn(ContextData<TestContext>) -> TestFuture + Send + Sync + 'static {
  move |ctx: ContextData<TestContext>| -> TestFuture {
    let step_name_owned = step_name.to_string();
    let error_message_owned = error_message.to_string();
    Box::pin(async move {
      ctx.write().steps_executed.push(step_name_owned.clone());
      tracing::warn!(target: "test_handlers", step = %step_name_owned, "failing with: '{}'", error_message_owned);
      Err(TestError::Handler(error_message_owned))
    })
  }
}

// --- Helper for Tracing Setup (call once per test run if needed) ---
use once_cell::sync::Lazy;
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

pub static HANDLER_EXEC_COUNTER: Lazy<Arc<AtomicUsize>> = Lazy::new(|| Arc::new(AtomicUsize::new(0)));

pub fn reset_counters() {
  HANDLER_EXEC_COUNTER.store(0, Ordering::SeqCst);
}

// --- Domain fixtures ---
pub fn customer() -> Customer {
  Customer {
    id: Uuid::new_v4(),
    name: "Riley Buyer".to_string(),
    email: "riley@example.com".to_string(),
  }
}

pub fn order_with(items: Vec<OrderItem>) -> Order {
  Order::new(format!("ORD-{}", &Uuid::new_v4().simple().to_string()[..8]), customer(), items, Utc::now())
}

fn design_file(product_id: &str, hex: Option<&str>, is_for_order: bool, is_active: bool) -> DesignFile {
  let id = Uuid::new_v4();
  DesignFile {
    id,
    product_id: product_id.to_string(),
    file_name: format!("{}-{}.svg", product_id, &id.simple().to_string()[..6]),
    file_url: format!("https://cdn.example.com/designs/{}.svg", id),
    file_type: "image/svg+xml".to_string(),
    file_size: 48_000,
    is_color_variant: hex.is_some(),
    color_variant_hex: hex.map(str::to_string),
    is_for_order,
    is_active,
    created_at: Utc::now(),
  }
}

pub fn general_file(product_id: &str) -> DesignFile {
  design_file(product_id, None, false, true)
}

pub fn variant_file(product_id: &str, hex: &str) -> DesignFile {
  design_file(product_id, Some(hex), false, true)
}

pub fn order_specific_file(product_id: &str, hex: Option<&str>) -> DesignFile {
  design_file(product_id, hex, true, true)
}

pub fn inactive_file(product_id: &str) -> DesignFile {
  design_file(product_id, None, false, false)
}

/// Short timeouts and near-zero backoff so failure paths finish quickly.
pub fn fast_config() -> FulfillmentConfig {
  let quick = RetryPolicy {
    max_attempts: 3,
    base_delay: Duration::from_millis(1),
    max_delay: Duration::from_millis(5),
  };
  FulfillmentConfig {
    download_base_url: "https://shop.example.com".to_string(),
    notify_timeout: Duration::from_millis(50),
    notify_retry: quick.clone(),
    persistence_retry: quick,
    ..FulfillmentConfig::default()
  }
}

// --- Notifiers ---
#[derive(Default)]
pub struct RecordingNotifier {
  pub completed: Mutex<Vec<(String, CompletedOrderEmail)>>,
  pub processing: Mutex<Vec<(String, CustomizationProcessingEmail)>>,
  pub admin: Mutex<Vec<AdminOrderNotification>>,
  pub fail: AtomicBool,
}

impl RecordingNotifier {
  pub fn failing() -> Self {
    let n = Self::default();
    n.fail.store(true, Ordering::SeqCst);
    n
  }

  pub fn completed_count(&self) -> usize {
    self.completed.lock().len()
  }

  pub fn processing_count(&self) -> usize {
    self.processing.lock().len()
  }

  pub fn admin_count(&self) -> usize {
    self.admin.lock().len()
  }

  fn check(&self) -> anyhow::Result<()> {
    if self.fail.load(Ordering::SeqCst) {
      anyhow::bail!("smtp relay refused connection");
    }
    Ok(())
  }
}

#[async_trait]
impl Notifier for RecordingNotifier {
  async fn send_completed_order_email(&self, customer_email: &str, email: &CompletedOrderEmail) -> anyhow::Result<()> {
    self.check()?;
    self.completed.lock().push((customer_email.to_string(), email.clone()));
    Ok(())
  }

  async fn send_customization_processing_email(
    &self,
    customer_email: &str,
    email: &CustomizationProcessingEmail,
  ) -> anyhow::Result<()> {
    self.check()?;
    self.processing.lock().push((customer_email.to_string(), email.clone()));
    Ok(())
  }

  async fn send_admin_new_order_notification(&self, notification: &AdminOrderNotification) -> anyhow::Result<()> {
    self.check()?;
    self.admin.lock().push(notification.clone());
    Ok(())
  }
}

// --- Failing collaborators ---

/// Serves `healthy_lookups` queries from `inner`, then fails every lookup.
pub struct FlakyCatalog {
  pub inner: MemoryDesignFileCatalog,
  pub healthy_lookups: usize,
  pub calls: AtomicUsize,
}

impl FlakyCatalog {
  pub fn new(files: Vec<DesignFile>, healthy_lookups: usize) -> Self {
    Self {
      inner: MemoryDesignFileCatalog::with_files(files),
      healthy_lookups,
      calls: AtomicUsize::new(0),
    }
  }
}

#[async_trait]
impl DesignFileCatalog for FlakyCatalog {
  async fn find_files(&self, query: &DesignFileQuery) -> FulfillmentResult<Vec<DesignFile>> {
    let n = self.calls.fetch_add(1, Ordering::SeqCst);
    if n >= self.healthy_lookups {
      return Err(FulfillmentError::CatalogLookup {
        product_id: query.product_id().to_string(),
        source: anyhow::anyhow!("catalog replica unreachable"),
      });
    }
    self.inner.find_files(query).await
  }

  async fn file_by_id(&self, design_file_id: Uuid) -> FulfillmentResult<Option<DesignFile>> {
    self.inner.file_by_id(design_file_id).await
  }
}

/// Wraps a memory grant store; writes fail while `down` is set.
#[derive(Default)]
pub struct SwitchableGrantStore {
  pub inner: MemoryGrantStore,
  pub down: AtomicBool,
}

#[async_trait]
impl GrantStore for SwitchableGrantStore {
  async fn grant_access(&self, order_id: Uuid, design_file_id: Uuid, now: DateTime<Utc>) -> FulfillmentResult<GrantOutcome> {
    if self.down.load(Ordering::SeqCst) {
      return Err(FulfillmentError::persistence(anyhow::anyhow!("grant table locked")));
    }
    self.inner.grant_access(order_id, design_file_id, now).await
  }

  async fn grants_for_order(&self, order_id: Uuid) -> FulfillmentResult<Vec<OrderDesignFile>> {
    self.inner.grants_for_order(order_id).await
  }

  async fn record_download(
    &self,
    order_id: Uuid,
    design_file_id: Uuid,
    now: DateTime<Utc>,
  ) -> FulfillmentResult<OrderDesignFile> {
    self.inner.record_download(order_id, design_file_id, now).await
  }
}

// --- Orchestrator harness ---
pub struct Harness {
  pub orders: Arc<MemoryOrderStore>,
  pub catalog: Arc<MemoryDesignFileCatalog>,
  pub grants: Arc<MemoryGrantStore>,
  pub notifier: Arc<RecordingNotifier>,
  pub orchestrator: FulfillmentOrchestrator,
}

impl Harness {
  pub fn new(files: Vec<DesignFile>) -> Self {
    Self::with_notifier(files, RecordingNotifier::default())
  }

  pub fn with_notifier(files: Vec<DesignFile>, notifier: RecordingNotifier) -> Self {
    let orders = Arc::new(MemoryOrderStore::new());
    let catalog = Arc::new(MemoryDesignFileCatalog::with_files(files));
    let grants = Arc::new(MemoryGrantStore::new());
    let notifier = Arc::new(notifier);
    let orchestrator = FulfillmentOrchestrator::new(
      orders.clone(),
      catalog.clone(),
      grants.clone(),
      notifier.clone(),
      fast_config(),
    );
    Self {
      orders,
      catalog,
      grants,
      notifier,
      orchestrator,
    }
  }

  /// Stores `order` and returns its id.
  pub fn place(&self, order: Order) -> Uuid {
    let id = order.id;
    self.orders.insert(order);
    id
  }

  pub fn order(&self, order_id: Uuid) -> Order {
    self.orders.get(order_id).expect("order seeded by test")
  }
}
