// fulfillment/src/model/customization.rs

use serde::{Deserialize, Serialize};

/// A predefined color option picked by the customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorSelection {
  pub name: String,
  pub hex: String,
}

impl ColorSelection {
  pub fn new(name: impl Into<String>, hex: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      hex: hex.into(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextChange {
  pub label: String,
  pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedImage {
  pub url: String,
  #[serde(default)]
  pub file_name: Option<String>,
}

/// Everything a customer attached to a line item at checkout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customizations {
  #[serde(default)]
  pub colors: Vec<ColorSelection>,
  #[serde(default)]
  pub text_changes: Vec<TextChange>,
  #[serde(default)]
  pub uploaded_images: Vec<UploadedImage>,
  #[serde(default)]
  pub uploaded_logo: Option<String>,
  #[serde(default)]
  pub notes: Option<String>,
}

impl Customizations {
  /// True when the customer asked for work beyond picking existing variants:
  /// text changes, uploaded images, a logo, or free-text notes.
  ///
  /// Color selections alone never count.
  pub fn has_real_customization(&self) -> bool {
    !self.text_changes.is_empty()
      || !self.uploaded_images.is_empty()
      || not_blank(self.uploaded_logo.as_deref())
      || not_blank(self.notes.as_deref())
  }

  pub fn with_colors(colors: Vec<ColorSelection>) -> Self {
    Self {
      colors,
      ..Default::default()
    }
  }

  pub fn with_notes(notes: impl Into<String>) -> Self {
    Self {
      notes: Some(notes.into()),
      ..Default::default()
    }
  }
}

fn not_blank(value: Option<&str>) -> bool {
  value.map_or(false, |v| !v.trim().is_empty())
}
