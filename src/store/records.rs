//! Record access boundary.

use async_trait::async_trait;

use super::params::ListParams;
use super::types::{Category, CategoryInput, Product, ProductInput};
use crate::error::StoreError;

/// Namespace for product query keys and invalidation.
pub const PRODUCTS: &str = "products";
/// Namespace for category query keys and invalidation.
pub const CATEGORIES: &str = "categories";

/// Narrow interface to the remote relational backend.
///
/// Implementations perform the raw reads/writes and project raw rows into
/// typed entities (category names come from the list/detail join, resolved
/// once at this boundary). They also re-check required-field presence as a
/// second line of defense behind caller-side validation.
///
/// `get_*`, `update_*`, and `delete_*` fail with `StoreError::NotFound`
/// when the id does not resolve, distinctly from generic backend failures,
/// so callers can show a not-found notice instead of a generic one.
#[async_trait]
pub trait RecordStore: Send + Sync {
  /// List one page of products, newest first, optionally filtered by
  /// category. Returns the records plus the total row count for the
  /// filter.
  async fn list_products(&self, params: ListParams) -> Result<(Vec<Product>, u64), StoreError>;

  async fn get_product(&self, id: i64) -> Result<Product, StoreError>;

  async fn create_product(&self, input: ProductInput) -> Result<Product, StoreError>;

  async fn update_product(&self, id: i64, input: ProductInput) -> Result<Product, StoreError>;

  async fn delete_product(&self, id: i64) -> Result<(), StoreError>;

  /// List all categories, sorted by name ascending.
  async fn list_categories(&self) -> Result<Vec<Category>, StoreError>;

  async fn get_category(&self, id: i64) -> Result<Category, StoreError>;

  async fn create_category(&self, input: CategoryInput) -> Result<Category, StoreError>;

  async fn update_category(&self, id: i64, input: CategoryInput) -> Result<Category, StoreError>;

  async fn delete_category(&self, id: i64) -> Result<(), StoreError>;
}

/// Required-field presence check shared by store implementations.
pub(crate) fn require_product_fields(input: &ProductInput) -> Result<(), StoreError> {
  if input.title.trim().is_empty() {
    return Err(StoreError::validation("title", "title is required"));
  }
  if !(input.price > 0.0) {
    return Err(StoreError::validation(
      "price",
      "price must be a positive number",
    ));
  }
  Ok(())
}

/// Required-field presence check shared by store implementations.
pub(crate) fn require_category_fields(input: &CategoryInput) -> Result<(), StoreError> {
  if input.name.trim().is_empty() {
    return Err(StoreError::validation("name", "name is required"));
  }
  Ok(())
}
