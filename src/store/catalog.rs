//! Catalog client: record access with transparent query caching.

use std::sync::Arc;

use super::keys::{CatalogKey, CatalogValue};
use super::params;
use super::records::{RecordStore, CATEGORIES, PRODUCTS};
use super::types::{Category, CategoryInput, PageResult, Product, ProductInput};
use crate::cache::{MutationExecutor, QueryClient, QuerySnapshot};
use crate::error::StoreError;

/// Client for catalog reads and writes.
///
/// Reads go through the shared query cache, so identical concurrent reads
/// collapse into one backend call and views can subscribe to transitions.
/// Writes go through a mutation executor per collection: every confirmed
/// write invalidates its owning namespace, nothing more, nothing less.
#[derive(Clone)]
pub struct CatalogClient {
  store: Arc<dyn RecordStore>,
  queries: QueryClient<CatalogKey, CatalogValue>,
  product_mutations: MutationExecutor<CatalogKey, CatalogValue>,
  category_mutations: MutationExecutor<CatalogKey, CatalogValue>,
}

impl CatalogClient {
  pub fn new(store: Arc<dyn RecordStore>) -> Self {
    let queries = QueryClient::new();
    let product_mutations = MutationExecutor::new(queries.clone(), PRODUCTS);
    let category_mutations = MutationExecutor::new(queries.clone(), CATEGORIES);
    Self {
      store,
      queries,
      product_mutations,
      category_mutations,
    }
  }

  /// The underlying query cache, for subscriptions and snapshot peeks.
  pub fn queries(&self) -> &QueryClient<CatalogKey, CatalogValue> {
    &self.queries
  }

  /// Read one page of products. Page size comes from the caller; it is
  /// never fixed here.
  pub fn product_page(
    &self,
    page: u32,
    page_size: u32,
    category: Option<i64>,
  ) -> QuerySnapshot<CatalogValue> {
    let key = CatalogKey::ProductPage {
      page,
      page_size,
      category,
    };
    let store = Arc::clone(&self.store);
    self.queries.read(&key, move || {
      let store = Arc::clone(&store);
      async move {
        let params = params::resolve(page, page_size, category);
        let (records, total) = store.list_products(params).await?;
        Ok(CatalogValue::ProductPage(PageResult::new(
          records, total, page_size,
        )))
      }
    })
  }

  pub fn product(&self, id: i64) -> QuerySnapshot<CatalogValue> {
    let key = CatalogKey::Product { id };
    let store = Arc::clone(&self.store);
    self.queries.read(&key, move || {
      let store = Arc::clone(&store);
      async move { store.get_product(id).await.map(CatalogValue::Product) }
    })
  }

  pub fn categories(&self) -> QuerySnapshot<CatalogValue> {
    let store = Arc::clone(&self.store);
    self.queries.read(&CatalogKey::Categories, move || {
      let store = Arc::clone(&store);
      async move {
        store
          .list_categories()
          .await
          .map(CatalogValue::Categories)
      }
    })
  }

  pub fn category(&self, id: i64) -> QuerySnapshot<CatalogValue> {
    let key = CatalogKey::Category { id };
    let store = Arc::clone(&self.store);
    self.queries.read(&key, move || {
      let store = Arc::clone(&store);
      async move { store.get_category(id).await.map(CatalogValue::Category) }
    })
  }

  /// Create a product. Invalid input is rejected before any backend call.
  pub async fn create_product(&self, input: ProductInput) -> Result<Product, StoreError> {
    input.validate()?;
    let store = Arc::clone(&self.store);
    self
      .product_mutations
      .execute(|| async move { store.create_product(input).await })
      .await
  }

  /// Update a product in place. Invalid input is rejected before any
  /// backend call.
  pub async fn update_product(
    &self,
    id: i64,
    input: ProductInput,
  ) -> Result<Product, StoreError> {
    input.validate()?;
    let store = Arc::clone(&self.store);
    self
      .product_mutations
      .execute(|| async move { store.update_product(id, input).await })
      .await
  }

  pub async fn delete_product(&self, id: i64) -> Result<(), StoreError> {
    let store = Arc::clone(&self.store);
    self
      .product_mutations
      .execute(|| async move { store.delete_product(id).await })
      .await
  }

  pub async fn create_category(&self, input: CategoryInput) -> Result<Category, StoreError> {
    input.validate()?;
    let store = Arc::clone(&self.store);
    self
      .category_mutations
      .execute(|| async move { store.create_category(input).await })
      .await
  }

  pub async fn update_category(
    &self,
    id: i64,
    input: CategoryInput,
  ) -> Result<Category, StoreError> {
    input.validate()?;
    let store = Arc::clone(&self.store);
    self
      .category_mutations
      .execute(|| async move { store.update_category(id, input).await })
      .await
  }

  pub async fn delete_category(&self, id: i64) -> Result<(), StoreError> {
    let store = Arc::clone(&self.store);
    self
      .category_mutations
      .execute(|| async move { store.delete_category(id).await })
      .await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::QueryStatus;
  use crate::store::memory::InMemoryStore;
  use std::time::Duration;

  fn product_input(title: &str, category: Option<i64>) -> ProductInput {
    ProductInput {
      title: title.into(),
      description: format!("{} description", title),
      price: 10.0,
      image_url: "https://img.example/p.png".into(),
      category_id: category,
    }
  }

  fn client() -> (CatalogClient, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    (CatalogClient::new(store.clone()), store)
  }

  async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
  }

  fn page_key(page: u32, page_size: u32, category: Option<i64>) -> CatalogKey {
    CatalogKey::ProductPage {
      page,
      page_size,
      category,
    }
  }

  #[tokio::test]
  async fn test_page_boundary_25_records_12_per_page() {
    let (catalog, store) = client();
    for i in 0..25 {
      store
        .create_product(product_input(&format!("Product {}", i), None))
        .await
        .unwrap();
    }

    catalog.product_page(3, 12, None);
    settle().await;

    let snapshot = catalog.queries().get(&page_key(3, 12, None)).unwrap();
    assert_eq!(snapshot.status, QueryStatus::Success);
    let page = snapshot.data.unwrap();
    let page = page.as_product_page().unwrap();
    assert_eq!(page.total_count, 25);
    assert_eq!(page.total_pages, 3);
    assert_eq!(page.records.len(), 1);
  }

  #[tokio::test]
  async fn test_identical_reads_share_one_backend_call() {
    let (catalog, store) = client();
    store
      .create_product(product_input("Only", None))
      .await
      .unwrap();

    catalog.product_page(1, 12, None);
    catalog.product_page(1, 12, None);
    settle().await;

    assert_eq!(store.list_product_calls(), 1);
  }

  #[tokio::test]
  async fn test_create_then_list_includes_new_record_once() {
    let (catalog, store) = client();
    let category = store
      .create_category(CategoryInput {
        name: "Stationery".into(),
      })
      .await
      .unwrap();
    store
      .create_product(product_input("Pencil", Some(category.id)))
      .await
      .unwrap();

    catalog.product_page(1, 12, None);
    settle().await;

    let created = catalog
      .create_product(product_input("Notebook", Some(category.id)))
      .await
      .unwrap();

    // The write invalidated the products namespace, so this read fetches
    // fresh instead of serving the cached page.
    catalog.product_page(1, 12, None);
    settle().await;

    let snapshot = catalog.queries().get(&page_key(1, 12, None)).unwrap();
    let page = snapshot.data.unwrap();
    let page = page.as_product_page().unwrap();
    assert_eq!(page.total_count, 2);
    let hits = page
      .records
      .iter()
      .filter(|p| p.id == created.id)
      .count();
    assert_eq!(hits, 1);
  }

  #[tokio::test]
  async fn test_category_reads_share_one_backend_call() {
    let (catalog, store) = client();
    store
      .create_category(CategoryInput {
        name: "Books".into(),
      })
      .await
      .unwrap();

    catalog.categories();
    catalog.categories();
    settle().await;
    catalog.categories();

    assert_eq!(store.list_category_calls(), 1);
  }

  #[tokio::test]
  async fn test_created_category_is_listed_once_sorted_by_name() {
    let (catalog, store) = client();
    store
      .create_category(CategoryInput {
        name: "Games".into(),
      })
      .await
      .unwrap();

    catalog.categories();
    settle().await;

    let books = catalog
      .create_category(CategoryInput {
        name: "Books".into(),
      })
      .await
      .unwrap();

    catalog.categories();
    settle().await;

    let snapshot = catalog.queries().get(&CatalogKey::Categories).unwrap();
    let categories = snapshot.data.unwrap();
    let categories = categories.as_categories().unwrap().to_vec();
    let names: Vec<&str> = categories.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Books", "Games"]);
    let hits = categories.iter().filter(|c| c.id == books.id).count();
    assert_eq!(hits, 1);
  }

  #[tokio::test]
  async fn test_delete_refreshes_subscribed_page() {
    let (catalog, store) = client();
    let mut ids = Vec::new();
    for i in 0..3 {
      let product = store
        .create_product(product_input(&format!("Product {}", i), None))
        .await
        .unwrap();
      ids.push(product.id);
    }

    let key = page_key(1, 12, None);
    let subscription = catalog.queries().subscribe(&key, |_| {});
    catalog.product_page(1, 12, None);
    settle().await;

    let snapshot = catalog.queries().get(&key).unwrap();
    let before = snapshot.data.unwrap();
    let before = before.as_product_page().unwrap().clone();
    assert_eq!(before.total_count, 3);
    let doomed = ids[1];
    assert!(before.records.iter().any(|p| p.id == doomed));

    catalog.delete_product(doomed).await.unwrap();
    // Subscribed entry refetches on invalidation without another read call.
    settle().await;

    let snapshot = catalog.queries().get(&key).unwrap();
    assert_eq!(snapshot.status, QueryStatus::Success);
    let after = snapshot.data.unwrap();
    let after = after.as_product_page().unwrap().clone();
    assert_eq!(after.total_count, before.total_count - 1);
    assert!(!after.records.iter().any(|p| p.id == doomed));

    catalog.queries().unsubscribe(subscription);
  }

  #[tokio::test]
  async fn test_update_with_empty_title_is_rejected_before_backend_call() {
    let (catalog, store) = client();

    let result = catalog
      .update_product(
        5,
        ProductInput {
          title: "".into(),
          description: "still here".into(),
          price: 10.0,
          image_url: "https://img.example/p.png".into(),
          category_id: Some(1),
        },
      )
      .await;

    assert_eq!(
      result,
      Err(StoreError::validation("title", "title is required"))
    );
    assert_eq!(store.write_calls(), 0);
  }

  #[tokio::test]
  async fn test_missing_record_surfaces_not_found() {
    let (catalog, _store) = client();

    let result = catalog.delete_product(999).await;
    assert!(matches!(result, Err(ref e) if e.is_not_found()));

    let result = catalog
      .update_category(
        999,
        CategoryInput {
          name: "Renamed".into(),
        },
      )
      .await;
    assert!(matches!(result, Err(ref e) if e.is_not_found()));
  }

  #[tokio::test]
  async fn test_product_detail_resolves_category_name() {
    let (catalog, store) = client();
    let category = store
      .create_category(CategoryInput {
        name: "Peripherals".into(),
      })
      .await
      .unwrap();
    let product = store
      .create_product(product_input("Keyboard", Some(category.id)))
      .await
      .unwrap();

    catalog.product(product.id);
    settle().await;

    let snapshot = catalog
      .queries()
      .get(&CatalogKey::Product { id: product.id })
      .unwrap();
    let detail = snapshot.data.unwrap();
    let detail = detail.as_product().unwrap().clone();
    assert_eq!(detail.category_name.as_deref(), Some("Peripherals"));
  }
}
