//! Catalog entities and input payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// A catalog product.
///
/// `category_name` is resolved at read time by the backend join and
/// projected once at the record access boundary; the UI never re-resolves
/// it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
  pub id: i64,
  pub title: String,
  pub description: String,
  pub price: f64,
  pub image_url: String,
  pub category_id: Option<i64>,
  pub category_name: Option<String>,
  pub created_at: DateTime<Utc>,
}

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
  pub id: i64,
  pub name: String,
}

/// One page of records plus the authoritative totals reported by the read.
#[derive(Debug, Clone, PartialEq)]
pub struct PageResult<T> {
  pub records: Vec<T>,
  pub total_count: u64,
  pub total_pages: u32,
}

impl<T> PageResult<T> {
  /// Build a page, recomputing `total_pages` from the row count this read
  /// reported. The count is never carried over from a previous page.
  pub fn new(records: Vec<T>, total_count: u64, page_size: u32) -> Self {
    let total_pages = if page_size == 0 {
      0
    } else {
      total_count.div_ceil(u64::from(page_size)) as u32
    };
    Self {
      records,
      total_count,
      total_pages,
    }
  }
}

/// Fields for creating or updating a product. Serialized field names match
/// the backend columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProductInput {
  pub title: String,
  pub description: String,
  pub price: f64,
  pub image_url: String,
  pub category_id: Option<i64>,
}

impl ProductInput {
  /// All field-level problems with this input, in field order. Used by the
  /// form to surface errors inline next to each field.
  pub fn field_errors(&self) -> Vec<StoreError> {
    let mut errors = Vec::new();
    if self.title.trim().is_empty() {
      errors.push(StoreError::validation("title", "title is required"));
    }
    if self.description.trim().is_empty() {
      errors.push(StoreError::validation("description", "description is required"));
    }
    if !(self.price > 0.0) {
      errors.push(StoreError::validation(
        "price",
        "price must be a positive number",
      ));
    }
    if self.image_url.trim().is_empty() {
      errors.push(StoreError::validation("image_url", "image URL is required"));
    }
    if self.category_id.is_none() {
      errors.push(StoreError::validation("category_id", "category is required"));
    }
    errors
  }

  /// Reject invalid input before any backend call is made.
  pub fn validate(&self) -> Result<(), StoreError> {
    match self.field_errors().into_iter().next() {
      Some(error) => Err(error),
      None => Ok(()),
    }
  }
}

/// Fields for creating or updating a category.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategoryInput {
  pub name: String,
}

impl CategoryInput {
  pub fn field_errors(&self) -> Vec<StoreError> {
    if self.name.trim().is_empty() {
      vec![StoreError::validation("name", "name is required")]
    } else {
      Vec::new()
    }
  }

  pub fn validate(&self) -> Result<(), StoreError> {
    match self.field_errors().into_iter().next() {
      Some(error) => Err(error),
      None => Ok(()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_total_pages_rounds_up() {
    let page: PageResult<u32> = PageResult::new(vec![], 25, 12);
    assert_eq!(page.total_pages, 3);

    let page: PageResult<u32> = PageResult::new(vec![], 24, 12);
    assert_eq!(page.total_pages, 2);

    let page: PageResult<u32> = PageResult::new(vec![], 0, 12);
    assert_eq!(page.total_pages, 0);

    let page: PageResult<u32> = PageResult::new(vec![], 1, 3);
    assert_eq!(page.total_pages, 1);
  }

  #[test]
  fn test_product_input_validation() {
    let input = ProductInput {
      title: "Keyboard".into(),
      description: "A mechanical keyboard".into(),
      price: 59.9,
      image_url: "https://img.example/kb.png".into(),
      category_id: Some(1),
    };
    assert!(input.validate().is_ok());

    let input = ProductInput {
      title: "  ".into(),
      price: 10.0,
      ..input
    };
    let error = input.validate().unwrap_err();
    assert_eq!(error, StoreError::validation("title", "title is required"));
  }

  #[test]
  fn test_product_input_rejects_non_positive_price() {
    let input = ProductInput {
      title: "Keyboard".into(),
      description: "desc".into(),
      price: 0.0,
      image_url: "https://img".into(),
      category_id: Some(1),
    };
    let errors = input.field_errors();
    assert_eq!(errors.len(), 1);
    assert!(matches!(
      &errors[0],
      StoreError::Validation { field: "price", .. }
    ));
  }

  #[test]
  fn test_category_input_requires_name() {
    assert!(CategoryInput { name: "Books".into() }.validate().is_ok());
    assert!(CategoryInput { name: "".into() }.validate().is_err());
  }
}
