//! Cache keys and payloads for catalog queries.

use super::records::{CATEGORIES, PRODUCTS};
use super::types::{Category, PageResult, Product};
use crate::cache::CacheKey;

/// Query key types for catalog reads.
///
/// Two reads with identical parameters hash to the same key and therefore
/// share one cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CatalogKey {
  /// One page of products, optionally filtered by category
  ProductPage {
    page: u32,
    page_size: u32,
    category: Option<i64>,
  },
  /// A single product by id
  Product { id: i64 },
  /// The full category list
  Categories,
  /// A single category by id
  Category { id: i64 },
}

impl CacheKey for CatalogKey {
  fn namespace(&self) -> &'static str {
    match self {
      Self::ProductPage { .. } | Self::Product { .. } => PRODUCTS,
      Self::Categories | Self::Category { .. } => CATEGORIES,
    }
  }

  fn description(&self) -> String {
    match self {
      Self::ProductPage {
        page,
        page_size,
        category,
      } => match category {
        Some(category) => format!(
          "products page {} (size {}, category {})",
          page, page_size, category
        ),
        None => format!("products page {} (size {})", page, page_size),
      },
      Self::Product { id } => format!("product {}", id),
      Self::Categories => "all categories".to_string(),
      Self::Category { id } => format!("category {}", id),
    }
  }
}

/// Payload stored in the query cache, one variant per key shape.
#[derive(Debug, Clone)]
pub enum CatalogValue {
  ProductPage(PageResult<Product>),
  Product(Product),
  Categories(Vec<Category>),
  Category(Category),
}

impl CatalogValue {
  pub fn as_product_page(&self) -> Option<&PageResult<Product>> {
    match self {
      Self::ProductPage(page) => Some(page),
      _ => None,
    }
  }

  pub fn as_product(&self) -> Option<&Product> {
    match self {
      Self::Product(product) => Some(product),
      _ => None,
    }
  }

  pub fn as_categories(&self) -> Option<&[Category]> {
    match self {
      Self::Categories(categories) => Some(categories),
      _ => None,
    }
  }

  pub fn as_category(&self) -> Option<&Category> {
    match self {
      Self::Category(category) => Some(category),
      _ => None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_namespaces() {
    let key = CatalogKey::ProductPage {
      page: 1,
      page_size: 12,
      category: None,
    };
    assert_eq!(key.namespace(), "products");
    assert_eq!(CatalogKey::Product { id: 3 }.namespace(), "products");
    assert_eq!(CatalogKey::Categories.namespace(), "categories");
    assert_eq!(CatalogKey::Category { id: 3 }.namespace(), "categories");
  }

  #[test]
  fn test_keys_differing_in_any_parameter_are_distinct() {
    let base = CatalogKey::ProductPage {
      page: 1,
      page_size: 12,
      category: None,
    };
    assert_eq!(
      base,
      CatalogKey::ProductPage {
        page: 1,
        page_size: 12,
        category: None,
      }
    );
    assert_ne!(
      base,
      CatalogKey::ProductPage {
        page: 2,
        page_size: 12,
        category: None,
      }
    );
    assert_ne!(
      base,
      CatalogKey::ProductPage {
        page: 1,
        page_size: 3,
        category: None,
      }
    );
    assert_ne!(
      base,
      CatalogKey::ProductPage {
        page: 1,
        page_size: 12,
        category: Some(7),
      }
    );
  }
}
