// fulfillment/src/resolver.rs

//! Decides, per line item and then per order, whether existing catalog files
//! can be delivered right away or a designer has to step in.

use crate::error::FulfillmentResult;
use crate::model::{ColorSelection, DesignFile, DesignFileQuery, Order, OrderItem};
use crate::store::DesignFileCatalog;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, instrument};
use uuid::Uuid;

/// Why an item resolved the way it did. `Display` is the delivery note shown
/// to customers and admins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolutionReason {
  GeneralFilesAvailable { file_count: usize },
  ColorVariantsAvailable { colors: Vec<String> },
  RealCustomization,
  MissingColorVariants { colors: Vec<String> },
  NoFilesAvailable,
  CatalogUnavailable,
}

impl fmt::Display for ResolutionReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ResolutionReason::GeneralFilesAvailable { file_count } => {
        write!(f, "Auto-delivered: {} design file(s) available", file_count)
      }
      ResolutionReason::ColorVariantsAvailable { colors } => {
        write!(f, "Auto-delivered: color variant files for {}", colors.join(", "))
      }
      ResolutionReason::RealCustomization => f.write_str("Requires custom work: customer supplied customization"),
      ResolutionReason::MissingColorVariants { colors } => {
        write!(f, "Awaiting customization: no design files for color(s) {}", colors.join(", "))
      }
      ResolutionReason::NoFilesAvailable => f.write_str("Awaiting customization: no files available"),
      ResolutionReason::CatalogUnavailable => {
        f.write_str("Awaiting customization: design file catalog unavailable, needs manual review")
      }
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemVerdict {
  AutoDeliverable { files: Vec<DesignFile> },
  AwaitingCustomization,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemResolution {
  pub index: usize,
  pub product_id: String,
  pub product_name: String,
  pub verdict: ItemVerdict,
  pub reason: ResolutionReason,
}

impl ItemResolution {
  pub fn is_auto_deliverable(&self) -> bool {
    matches!(self.verdict, ItemVerdict::AutoDeliverable { .. })
  }

  pub fn files(&self) -> &[DesignFile] {
    match &self.verdict {
      ItemVerdict::AutoDeliverable { files } => files,
      ItemVerdict::AwaitingCustomization => &[],
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryKind {
  AutoDelivery,
  CustomWork,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryVerdict {
  pub kind: DeliveryKind,
  pub requires_custom_work: bool,
  pub items: Vec<ItemResolution>,
}

impl DeliveryVerdict {
  pub fn deliverable(&self) -> impl Iterator<Item = &ItemResolution> {
    self.items.iter().filter(|i| i.is_auto_deliverable())
  }

  pub fn awaiting(&self) -> impl Iterator<Item = &ItemResolution> {
    self.items.iter().filter(|i| !i.is_auto_deliverable())
  }
}

/// Folds per-item results into the order verdict.
///
/// An empty order resolves to custom work so nothing is marked complete by
/// accident.
pub fn aggregate(items: Vec<ItemResolution>) -> DeliveryVerdict {
  let deliverable = items.iter().filter(|i| i.is_auto_deliverable()).count();
  let (kind, requires_custom_work) = if items.is_empty() || deliverable == 0 {
    (DeliveryKind::CustomWork, true)
  } else if deliverable == items.len() {
    (DeliveryKind::AutoDelivery, false)
  } else {
    (DeliveryKind::AutoDelivery, true)
  };
  DeliveryVerdict {
    kind,
    requires_custom_work,
    items,
  }
}

#[derive(Clone)]
pub struct DeliveryResolver {
  catalog: Arc<dyn DesignFileCatalog>,
}

impl DeliveryResolver {
  pub fn new(catalog: Arc<dyn DesignFileCatalog>) -> Self {
    Self { catalog }
  }

  /// Classifies every item of `order`. Never fails: a catalog error sends the
  /// item that hit it, and every item after it, to custom work.
  #[instrument(name = "DeliveryResolver::classify", skip_all, fields(order_id = %order.id, order_number = %order.order_number))]
  pub async fn classify(&self, order: &Order) -> DeliveryVerdict {
    let mut resolved = Vec::with_capacity(order.items.len());
    let mut catalog_down = false;

    for (index, item) in order.items.iter().enumerate() {
      let (verdict, reason) = if catalog_down {
        (ItemVerdict::AwaitingCustomization, ResolutionReason::CatalogUnavailable)
      } else {
        match self.resolve_item(item).await {
          Ok(outcome) => outcome,
          Err(e) => {
            error!(
              item_index = index,
              product_id = %item.product_id,
              error = %e,
              "Design file lookup failed; remaining items go to manual review."
            );
            catalog_down = true;
            (ItemVerdict::AwaitingCustomization, ResolutionReason::CatalogUnavailable)
          }
        }
      };
      debug!(item_index = index, reason = %reason, "Item classified.");
      resolved.push(ItemResolution {
        index,
        product_id: item.product_id.clone(),
        product_name: item.product_name.clone(),
        verdict,
        reason,
      });
    }

    aggregate(resolved)
  }

  async fn resolve_item(&self, item: &OrderItem) -> FulfillmentResult<(ItemVerdict, ResolutionReason)> {
    // The purchase-time snapshot decides; the live product is never consulted.
    if item.enable_customizations && item.has_real_customization() {
      return Ok((ItemVerdict::AwaitingCustomization, ResolutionReason::RealCustomization));
    }

    let colors = item.selected_colors();
    if colors.is_empty() {
      self.resolve_general(&item.product_id).await
    } else {
      self.resolve_colors(&item.product_id, colors).await
    }
  }

  async fn resolve_general(&self, product_id: &str) -> FulfillmentResult<(ItemVerdict, ResolutionReason)> {
    let files = self.catalog.find_files(&DesignFileQuery::general(product_id)).await?;
    if files.is_empty() {
      return Ok((ItemVerdict::AwaitingCustomization, ResolutionReason::NoFilesAvailable));
    }
    let file_count = files.len();
    Ok((
      ItemVerdict::AutoDeliverable { files },
      ResolutionReason::GeneralFilesAvailable { file_count },
    ))
  }

  // Every selected color needs at least one file; otherwise nothing ships.
  async fn resolve_colors(
    &self,
    product_id: &str,
    colors: &[ColorSelection],
  ) -> FulfillmentResult<(ItemVerdict, ResolutionReason)> {
    let mut files: Vec<DesignFile> = Vec::new();
    let mut seen: HashSet<Uuid> = HashSet::new();
    let mut missing = Vec::new();

    for color in colors {
      let matched = self
        .catalog
        .find_files(&DesignFileQuery::color_variant(product_id, &color.hex))
        .await?;
      if matched.is_empty() {
        missing.push(color.name.clone());
        continue;
      }
      for file in matched {
        if seen.insert(file.id) {
          files.push(file);
        }
      }
    }

    if !missing.is_empty() {
      return Ok((
        ItemVerdict::AwaitingCustomization,
        ResolutionReason::MissingColorVariants { colors: missing },
      ));
    }
    Ok((
      ItemVerdict::AutoDeliverable { files },
      ResolutionReason::ColorVariantsAvailable {
        colors: colors.iter().map(|c| c.name.clone()).collect(),
      },
    ))
  }
}
