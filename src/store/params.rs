//! Pagination and filter parameter resolution.

/// Concrete read parameters for a product list call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListParams {
  pub offset: u32,
  pub limit: u32,
  /// Filter to one category when set; no filter otherwise.
  pub category: Option<i64>,
}

/// Derive offset/limit/filter from a 1-based page number.
///
/// Page 0 is clamped to 1 so the offset can never underflow. The resolver
/// is stateless: resetting to page 1 when the effective filter changes is
/// the caller's documented responsibility.
pub fn resolve(page: u32, page_size: u32, category: Option<i64>) -> ListParams {
  let page = page.max(1);
  ListParams {
    offset: (page - 1) * page_size,
    limit: page_size,
    category,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_offset_is_zero_based_from_one_based_pages() {
    assert_eq!(resolve(1, 12, None).offset, 0);
    assert_eq!(resolve(2, 12, None).offset, 12);
    assert_eq!(resolve(3, 12, None).offset, 24);
    assert_eq!(resolve(1, 3, None).limit, 3);
  }

  #[test]
  fn test_page_zero_is_clamped() {
    let params = resolve(0, 12, None);
    assert_eq!(params.offset, 0);
    assert_eq!(params.limit, 12);
  }

  #[test]
  fn test_filter_passes_through() {
    assert_eq!(resolve(2, 12, Some(7)).category, Some(7));
    assert_eq!(resolve(2, 12, None).category, None);
  }
}
