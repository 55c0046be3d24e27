//! In-memory record store used by tests.
//!
//! Behaves like the real backend: ids are assigned on insert, products
//! list newest first, categories list by name, and the category display
//! name is resolved by a join at read time. Per-operation call counters
//! let tests assert on de-duplication and on validation happening before
//! any backend call.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use super::params::ListParams;
use super::records::{require_category_fields, require_product_fields, RecordStore};
use super::types::{Category, CategoryInput, Product, ProductInput};
use crate::error::StoreError;

#[derive(Default)]
struct State {
  products: Vec<Product>,
  categories: Vec<Category>,
  next_id: i64,
}

#[derive(Default)]
pub struct InMemoryStore {
  state: Mutex<State>,
  list_product_calls: AtomicU32,
  list_category_calls: AtomicU32,
  write_calls: AtomicU32,
}

impl InMemoryStore {
  pub fn new() -> Self {
    Self {
      state: Mutex::new(State {
        next_id: 1,
        ..State::default()
      }),
      ..Self::default()
    }
  }

  pub fn list_product_calls(&self) -> u32 {
    self.list_product_calls.load(Ordering::SeqCst)
  }

  pub fn list_category_calls(&self) -> u32 {
    self.list_category_calls.load(Ordering::SeqCst)
  }

  pub fn write_calls(&self) -> u32 {
    self.write_calls.load(Ordering::SeqCst)
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, State> {
    self.state.lock().unwrap()
  }
}

fn resolve_category_name(categories: &[Category], id: Option<i64>) -> Option<String> {
  id.and_then(|id| categories.iter().find(|c| c.id == id))
    .map(|c| c.name.clone())
}

#[async_trait]
impl RecordStore for InMemoryStore {
  async fn list_products(&self, params: ListParams) -> Result<(Vec<Product>, u64), StoreError> {
    self.list_product_calls.fetch_add(1, Ordering::SeqCst);
    let state = self.lock();

    let mut matching: Vec<Product> = state
      .products
      .iter()
      .filter(|p| params.category.is_none() || p.category_id == params.category)
      .cloned()
      .collect();
    // Newest first; ids break ties between same-instant inserts.
    matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

    let total = matching.len() as u64;
    let page: Vec<Product> = matching
      .into_iter()
      .skip(params.offset as usize)
      .take(params.limit as usize)
      .collect();
    Ok((page, total))
  }

  async fn get_product(&self, id: i64) -> Result<Product, StoreError> {
    let state = self.lock();
    state
      .products
      .iter()
      .find(|p| p.id == id)
      .cloned()
      .ok_or_else(|| StoreError::not_found("products", id))
  }

  async fn create_product(&self, input: ProductInput) -> Result<Product, StoreError> {
    self.write_calls.fetch_add(1, Ordering::SeqCst);
    require_product_fields(&input)?;

    let mut state = self.lock();
    let id = state.next_id;
    state.next_id += 1;
    let product = Product {
      id,
      title: input.title,
      description: input.description,
      price: input.price,
      image_url: input.image_url,
      category_id: input.category_id,
      category_name: resolve_category_name(&state.categories, input.category_id),
      created_at: Utc::now(),
    };
    state.products.push(product.clone());
    Ok(product)
  }

  async fn update_product(&self, id: i64, input: ProductInput) -> Result<Product, StoreError> {
    self.write_calls.fetch_add(1, Ordering::SeqCst);
    require_product_fields(&input)?;

    let mut state = self.lock();
    let category_name = resolve_category_name(&state.categories, input.category_id);
    let product = state
      .products
      .iter_mut()
      .find(|p| p.id == id)
      .ok_or_else(|| StoreError::not_found("products", id))?;
    product.title = input.title;
    product.description = input.description;
    product.price = input.price;
    product.image_url = input.image_url;
    product.category_id = input.category_id;
    product.category_name = category_name;
    Ok(product.clone())
  }

  async fn delete_product(&self, id: i64) -> Result<(), StoreError> {
    self.write_calls.fetch_add(1, Ordering::SeqCst);
    let mut state = self.lock();
    let index = state
      .products
      .iter()
      .position(|p| p.id == id)
      .ok_or_else(|| StoreError::not_found("products", id))?;
    state.products.remove(index);
    Ok(())
  }

  async fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
    self.list_category_calls.fetch_add(1, Ordering::SeqCst);
    let state = self.lock();
    let mut categories = state.categories.clone();
    categories.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(categories)
  }

  async fn get_category(&self, id: i64) -> Result<Category, StoreError> {
    let state = self.lock();
    state
      .categories
      .iter()
      .find(|c| c.id == id)
      .cloned()
      .ok_or_else(|| StoreError::not_found("categories", id))
  }

  async fn create_category(&self, input: CategoryInput) -> Result<Category, StoreError> {
    self.write_calls.fetch_add(1, Ordering::SeqCst);
    require_category_fields(&input)?;

    let mut state = self.lock();
    let id = state.next_id;
    state.next_id += 1;
    let category = Category {
      id,
      name: input.name,
    };
    state.categories.push(category.clone());
    Ok(category)
  }

  async fn update_category(&self, id: i64, input: CategoryInput) -> Result<Category, StoreError> {
    self.write_calls.fetch_add(1, Ordering::SeqCst);
    require_category_fields(&input)?;

    let mut state = self.lock();
    let category = state
      .categories
      .iter_mut()
      .find(|c| c.id == id)
      .ok_or_else(|| StoreError::not_found("categories", id))?;
    category.name = input.name;
    Ok(category.clone())
  }

  async fn delete_category(&self, id: i64) -> Result<(), StoreError> {
    self.write_calls.fetch_add(1, Ordering::SeqCst);
    let mut state = self.lock();
    let index = state
      .categories
      .iter()
      .position(|c| c.id == id)
      .ok_or_else(|| StoreError::not_found("categories", id))?;
    state.categories.remove(index);
    Ok(())
  }
}
