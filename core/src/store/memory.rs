// fulfillment/src/store/memory.rs

use crate::error::{FulfillmentError, FulfillmentResult};
use crate::model::{DesignFile, DesignFileQuery, Order, OrderDesignFile};
use crate::store::{DesignFileCatalog, GrantOutcome, GrantStore, OrderStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::instrument;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct MemoryOrderStore {
  orders: RwLock<HashMap<Uuid, Order>>,
}

impl MemoryOrderStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Seeds an order, overwriting any previous copy with the same id.
  pub fn insert(&self, order: Order) {
    self.orders.write().insert(order.id, order);
  }

  pub fn get(&self, order_id: Uuid) -> Option<Order> {
    self.orders.read().get(&order_id).cloned()
  }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
  async fn load(&self, order_id: Uuid) -> FulfillmentResult<Order> {
    self.get(order_id).ok_or(FulfillmentError::OrderNotFound { order_id })
  }

  #[instrument(name = "MemoryOrderStore::save", skip_all, fields(order_id = %order.id, version = order.version))]
  async fn save(&self, order: &Order) -> FulfillmentResult<Order> {
    let mut orders = self.orders.write();
    let stored = orders
      .get_mut(&order.id)
      .ok_or(FulfillmentError::OrderNotFound { order_id: order.id })?;
    if stored.version != order.version {
      return Err(FulfillmentError::VersionConflict {
        order_id: order.id,
        expected: order.version,
      });
    }
    let mut next = order.clone();
    next.version += 1;
    *stored = next.clone();
    Ok(next)
  }
}

#[derive(Debug, Default)]
pub struct MemoryDesignFileCatalog {
  files: RwLock<Vec<DesignFile>>,
  lookups: AtomicUsize,
}

impl MemoryDesignFileCatalog {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_files(files: Vec<DesignFile>) -> Self {
    Self {
      files: RwLock::new(files),
      lookups: AtomicUsize::new(0),
    }
  }

  pub fn add(&self, file: DesignFile) {
    self.files.write().push(file);
  }

  /// Number of `find_files` calls served so far.
  pub fn lookups(&self) -> usize {
    self.lookups.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl DesignFileCatalog for MemoryDesignFileCatalog {
  async fn find_files(&self, query: &DesignFileQuery) -> FulfillmentResult<Vec<DesignFile>> {
    self.lookups.fetch_add(1, Ordering::SeqCst);
    Ok(self.files.read().iter().filter(|f| f.matches(query)).cloned().collect())
  }

  async fn file_by_id(&self, design_file_id: Uuid) -> FulfillmentResult<Option<DesignFile>> {
    Ok(self.files.read().iter().find(|f| f.id == design_file_id).cloned())
  }
}

#[derive(Debug, Default)]
pub struct MemoryGrantStore {
  grants: RwLock<HashMap<(Uuid, Uuid), OrderDesignFile>>,
}

impl MemoryGrantStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.grants.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

#[async_trait]
impl GrantStore for MemoryGrantStore {
  async fn grant_access(&self, order_id: Uuid, design_file_id: Uuid, now: DateTime<Utc>) -> FulfillmentResult<GrantOutcome> {
    let mut grants = self.grants.write();
    if grants.contains_key(&(order_id, design_file_id)) {
      return Ok(GrantOutcome::AlreadyGranted);
    }
    grants.insert((order_id, design_file_id), OrderDesignFile::new(order_id, design_file_id, now));
    Ok(GrantOutcome::Created)
  }

  async fn grants_for_order(&self, order_id: Uuid) -> FulfillmentResult<Vec<OrderDesignFile>> {
    let mut found: Vec<_> = self
      .grants
      .read()
      .values()
      .filter(|g| g.order_id == order_id)
      .cloned()
      .collect();
    found.sort_by_key(|g| g.granted_at);
    Ok(found)
  }

  async fn record_download(
    &self,
    order_id: Uuid,
    design_file_id: Uuid,
    now: DateTime<Utc>,
  ) -> FulfillmentResult<OrderDesignFile> {
    let mut grants = self.grants.write();
    match grants.get_mut(&(order_id, design_file_id)) {
      Some(grant) if grant.is_active => {
        grant.download_count += 1;
        grant.last_downloaded_at = Some(now);
        Ok(grant.clone())
      }
      _ => Err(FulfillmentError::GrantNotFound {
        order_id,
        design_file_id,
      }),
    }
  }
}
