//! Raw wire types for the PostgREST backend.
//!
//! Rows arrive with a dynamic shape (embedded join payloads); projection
//! into the typed entities happens here, once, so no caller ever deals
//! with the raw shape.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::types::{Category, Product};

/// Embedded category reference produced by
/// `select=*,category:categories(name)`.
#[derive(Debug, Deserialize)]
pub struct ApiCategoryRef {
  pub name: String,
}

/// Raw product row as returned by the backend.
#[derive(Debug, Deserialize)]
pub struct ApiProductRow {
  pub id: i64,
  pub title: String,
  #[serde(default)]
  pub description: String,
  pub price: f64,
  #[serde(default)]
  pub image_url: String,
  pub category_id: Option<i64>,
  /// Join payload; flattened into `category_name` on projection.
  #[serde(default)]
  pub category: Option<ApiCategoryRef>,
  pub created_at: DateTime<Utc>,
}

impl ApiProductRow {
  pub fn into_product(self) -> Product {
    Product {
      id: self.id,
      title: self.title,
      description: self.description,
      price: self.price,
      image_url: self.image_url,
      category_id: self.category_id,
      category_name: self.category.map(|c| c.name),
      created_at: self.created_at,
    }
  }
}

/// Raw category row as returned by the backend.
#[derive(Debug, Deserialize)]
pub struct ApiCategoryRow {
  pub id: i64,
  pub name: String,
}

impl ApiCategoryRow {
  pub fn into_category(self) -> Category {
    Category {
      id: self.id,
      name: self.name,
    }
  }
}

/// Error body shape returned by the backend on failed calls.
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
  #[serde(default)]
  pub message: Option<String>,
  #[serde(default)]
  pub details: Option<String>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_project_row_with_embedded_category() {
    let json = r#"{
      "id": 3,
      "title": "Keyboard",
      "description": "Mechanical",
      "price": 59.9,
      "image_url": "https://img.example/kb.png",
      "category_id": 7,
      "category": {"name": "Peripherals"},
      "created_at": "2024-05-01T12:00:00Z"
    }"#;

    let row: ApiProductRow = serde_json::from_str(json).unwrap();
    let product = row.into_product();
    assert_eq!(product.id, 3);
    assert_eq!(product.category_id, Some(7));
    assert_eq!(product.category_name.as_deref(), Some("Peripherals"));
  }

  #[test]
  fn test_project_row_without_category() {
    let json = r#"{
      "id": 4,
      "title": "Mug",
      "price": 9.5,
      "category_id": null,
      "category": null,
      "created_at": "2024-05-02T08:30:00Z"
    }"#;

    let row: ApiProductRow = serde_json::from_str(json).unwrap();
    let product = row.into_product();
    assert_eq!(product.category_name, None);
    assert_eq!(product.description, "");
  }
}
