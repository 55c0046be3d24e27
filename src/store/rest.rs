//! PostgREST implementation of the record access interface.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Response;
use tracing::debug;
use url::Url;

use super::api_types::{ApiCategoryRow, ApiErrorBody, ApiProductRow};
use super::params::ListParams;
use super::records::{require_category_fields, require_product_fields, RecordStore};
use super::types::{Category, CategoryInput, Product, ProductInput};
use crate::config::Config;
use crate::error::StoreError;

/// Projection used for every product read: all columns plus the category
/// display name via the embedded join.
const PRODUCT_SELECT: &str = "*,category:categories(name)";

/// Record store backed by a PostgREST-style REST API.
pub struct RestStore {
  http: reqwest::Client,
  base: Url,
}

impl RestStore {
  pub fn new(config: &Config) -> Result<Self> {
    let api_key = Config::get_api_key()?;

    let mut base = Url::parse(&config.backend.url)
      .map_err(|e| eyre!("Invalid backend URL {}: {}", config.backend.url, e))?;
    // Url::join replaces the last path segment unless the base ends in '/'.
    if !base.path().ends_with('/') {
      base.set_path(&format!("{}/", base.path()));
    }

    let mut headers = HeaderMap::new();
    let mut key_value = HeaderValue::from_str(&api_key)
      .map_err(|e| eyre!("API key is not a valid header value: {}", e))?;
    key_value.set_sensitive(true);
    headers.insert("apikey", key_value);
    let mut bearer = HeaderValue::from_str(&format!("Bearer {}", api_key))
      .map_err(|e| eyre!("API key is not a valid header value: {}", e))?;
    bearer.set_sensitive(true);
    headers.insert(reqwest::header::AUTHORIZATION, bearer);

    let http = reqwest::Client::builder()
      .default_headers(headers)
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { http, base })
  }

  fn endpoint(&self, collection: &str) -> Result<Url, StoreError> {
    self.base.join(collection).map_err(StoreError::backend)
  }

  /// Turn a non-success response into a backend error carrying the
  /// server-reported message when one is present.
  async fn check(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
      return Ok(response);
    }

    let body: Option<ApiErrorBody> = response.json().await.ok();
    let message = body
      .and_then(|b| b.message.or(b.details))
      .unwrap_or_else(|| "request failed".to_string());
    Err(StoreError::Backend(format!("{}: {}", status, message)))
  }
}

/// Extract the total row count from a `Content-Range` header such as
/// `0-11/25` (or `*/0` for an empty range).
fn content_range_total(headers: &HeaderMap) -> Result<u64, StoreError> {
  headers
    .get(reqwest::header::CONTENT_RANGE)
    .and_then(|value| value.to_str().ok())
    .and_then(|value| value.rsplit('/').next())
    .and_then(|total| total.parse().ok())
    .ok_or_else(|| StoreError::backend("backend did not report a row count"))
}

#[async_trait]
impl RecordStore for RestStore {
  async fn list_products(&self, params: ListParams) -> Result<(Vec<Product>, u64), StoreError> {
    let mut request = self
      .http
      .get(self.endpoint("products")?)
      .query(&[("select", PRODUCT_SELECT), ("order", "created_at.desc")])
      .query(&[
        ("limit", params.limit.to_string()),
        ("offset", params.offset.to_string()),
      ])
      .header("Prefer", "count=exact");

    if let Some(category) = params.category {
      request = request.query(&[("category_id", format!("eq.{}", category))]);
    }

    debug!(offset = params.offset, limit = params.limit, category = ?params.category, "listing products");
    let response = request.send().await.map_err(StoreError::backend)?;
    let response = Self::check(response).await?;

    let total = content_range_total(response.headers())?;
    let rows: Vec<ApiProductRow> = response.json().await.map_err(StoreError::backend)?;
    Ok((rows.into_iter().map(ApiProductRow::into_product).collect(), total))
  }

  async fn get_product(&self, id: i64) -> Result<Product, StoreError> {
    let response = self
      .http
      .get(self.endpoint("products")?)
      .query(&[("select", PRODUCT_SELECT)])
      .query(&[("id", format!("eq.{}", id))])
      .send()
      .await
      .map_err(StoreError::backend)?;
    let response = Self::check(response).await?;

    let mut rows: Vec<ApiProductRow> = response.json().await.map_err(StoreError::backend)?;
    match rows.pop() {
      Some(row) => Ok(row.into_product()),
      None => Err(StoreError::not_found("products", id)),
    }
  }

  async fn create_product(&self, input: ProductInput) -> Result<Product, StoreError> {
    require_product_fields(&input)?;

    let response = self
      .http
      .post(self.endpoint("products")?)
      .query(&[("select", PRODUCT_SELECT)])
      .header("Prefer", "return=representation")
      .json(&input)
      .send()
      .await
      .map_err(StoreError::backend)?;
    let response = Self::check(response).await?;

    let mut rows: Vec<ApiProductRow> = response.json().await.map_err(StoreError::backend)?;
    rows
      .pop()
      .map(ApiProductRow::into_product)
      .ok_or_else(|| StoreError::backend("create returned no record"))
  }

  async fn update_product(&self, id: i64, input: ProductInput) -> Result<Product, StoreError> {
    require_product_fields(&input)?;

    let response = self
      .http
      .patch(self.endpoint("products")?)
      .query(&[("select", PRODUCT_SELECT)])
      .query(&[("id", format!("eq.{}", id))])
      .header("Prefer", "return=representation")
      .json(&input)
      .send()
      .await
      .map_err(StoreError::backend)?;
    let response = Self::check(response).await?;

    let mut rows: Vec<ApiProductRow> = response.json().await.map_err(StoreError::backend)?;
    match rows.pop() {
      Some(row) => Ok(row.into_product()),
      // An empty representation means the filter matched nothing.
      None => Err(StoreError::not_found("products", id)),
    }
  }

  async fn delete_product(&self, id: i64) -> Result<(), StoreError> {
    let response = self
      .http
      .delete(self.endpoint("products")?)
      .query(&[("id", format!("eq.{}", id))])
      .header("Prefer", "return=representation")
      .send()
      .await
      .map_err(StoreError::backend)?;
    let response = Self::check(response).await?;

    let rows: Vec<serde_json::Value> = response.json().await.map_err(StoreError::backend)?;
    if rows.is_empty() {
      return Err(StoreError::not_found("products", id));
    }
    Ok(())
  }

  async fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
    let response = self
      .http
      .get(self.endpoint("categories")?)
      .query(&[("select", "*"), ("order", "name.asc")])
      .send()
      .await
      .map_err(StoreError::backend)?;
    let response = Self::check(response).await?;

    let rows: Vec<ApiCategoryRow> = response.json().await.map_err(StoreError::backend)?;
    Ok(rows.into_iter().map(ApiCategoryRow::into_category).collect())
  }

  async fn get_category(&self, id: i64) -> Result<Category, StoreError> {
    let response = self
      .http
      .get(self.endpoint("categories")?)
      .query(&[("id", format!("eq.{}", id))])
      .send()
      .await
      .map_err(StoreError::backend)?;
    let response = Self::check(response).await?;

    let mut rows: Vec<ApiCategoryRow> = response.json().await.map_err(StoreError::backend)?;
    match rows.pop() {
      Some(row) => Ok(row.into_category()),
      None => Err(StoreError::not_found("categories", id)),
    }
  }

  async fn create_category(&self, input: CategoryInput) -> Result<Category, StoreError> {
    require_category_fields(&input)?;

    let response = self
      .http
      .post(self.endpoint("categories")?)
      .header("Prefer", "return=representation")
      .json(&input)
      .send()
      .await
      .map_err(StoreError::backend)?;
    let response = Self::check(response).await?;

    let mut rows: Vec<ApiCategoryRow> = response.json().await.map_err(StoreError::backend)?;
    rows
      .pop()
      .map(ApiCategoryRow::into_category)
      .ok_or_else(|| StoreError::backend("create returned no record"))
  }

  async fn update_category(&self, id: i64, input: CategoryInput) -> Result<Category, StoreError> {
    require_category_fields(&input)?;

    let response = self
      .http
      .patch(self.endpoint("categories")?)
      .query(&[("id", format!("eq.{}", id))])
      .header("Prefer", "return=representation")
      .json(&input)
      .send()
      .await
      .map_err(StoreError::backend)?;
    let response = Self::check(response).await?;

    let mut rows: Vec<ApiCategoryRow> = response.json().await.map_err(StoreError::backend)?;
    match rows.pop() {
      Some(row) => Ok(row.into_category()),
      None => Err(StoreError::not_found("categories", id)),
    }
  }

  async fn delete_category(&self, id: i64) -> Result<(), StoreError> {
    let response = self
      .http
      .delete(self.endpoint("categories")?)
      .query(&[("id", format!("eq.{}", id))])
      .header("Prefer", "return=representation")
      .send()
      .await
      .map_err(StoreError::backend)?;
    let response = Self::check(response).await?;

    let rows: Vec<serde_json::Value> = response.json().await.map_err(StoreError::backend)?;
    if rows.is_empty() {
      return Err(StoreError::not_found("categories", id));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn headers_with_range(value: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
      reqwest::header::CONTENT_RANGE,
      HeaderValue::from_str(value).unwrap(),
    );
    headers
  }

  #[test]
  fn test_content_range_total() {
    assert_eq!(content_range_total(&headers_with_range("0-11/25")).unwrap(), 25);
    assert_eq!(content_range_total(&headers_with_range("*/0")).unwrap(), 0);
  }

  #[test]
  fn test_content_range_missing_is_an_error() {
    let headers = HeaderMap::new();
    assert!(content_range_total(&headers).is_err());

    let headers = headers_with_range("0-11/*");
    assert!(content_range_total(&headers).is_err());
  }
}
