use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// One-line pagination summary, e.g. `Page 2/3 - 25 items`.
pub fn page_line(page: u32, total_pages: u32, total_count: u64) -> String {
  let item_word = if total_count == 1 { "item" } else { "items" };
  format!(
    "Page {}/{} - {} {}",
    page,
    total_pages.max(1),
    total_count,
    item_word
  )
}

pub fn draw_page_line(frame: &mut Frame, area: Rect, page: u32, total_pages: u32, total_count: u64) {
  let paragraph = Paragraph::new(page_line(page, total_pages, total_count))
    .style(Style::default().fg(Color::DarkGray))
    .alignment(Alignment::Center);
  frame.render_widget(paragraph, area);
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_page_line_formatting() {
    assert_eq!(page_line(2, 3, 25), "Page 2/3 - 25 items");
    assert_eq!(page_line(1, 1, 1), "Page 1/1 - 1 item");
  }

  #[test]
  fn test_empty_result_still_shows_one_page() {
    assert_eq!(page_line(1, 0, 0), "Page 1/1 - 0 items");
  }
}
