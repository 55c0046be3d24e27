use crate::app::{App, ProductListState};
use crate::store::types::Product;
use crate::ui::components::pagination;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

pub fn draw_products(frame: &mut Frame, area: Rect, app: &App, state: &ProductListState) {
  let snapshot = app.snapshot(&app.product_page_key(state));

  let filter_label = state.category.and_then(|id| {
    app
      .cached_categories()
      .iter()
      .find(|c| c.id == id)
      .map(|c| c.name.clone())
  });

  let loading = snapshot.as_ref().is_some_and(|s| s.is_loading());
  let suffix = if loading { " (loading...)" } else { "" };
  let title = match filter_label {
    Some(name) => format!(" Products [{}]{} ", name, suffix),
    None => format!(" Products{} ", suffix),
  };

  let block = Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue));

  // An error replaces the listing; retry is manual.
  if let Some(error) = snapshot.as_ref().and_then(|s| s.error.as_ref()) {
    let paragraph = Paragraph::new(format!(
      "Failed to load products: {}\nPress r to retry.",
      error
    ))
    .block(block)
    .style(Style::default().fg(Color::Red));
    frame.render_widget(paragraph, area);
    return;
  }

  let page = snapshot
    .as_ref()
    .and_then(|s| s.data.as_ref())
    .and_then(|v| v.as_product_page());

  let page = match page {
    Some(page) => page,
    None => {
      let paragraph = Paragraph::new("Loading products...")
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }
  };

  if page.records.is_empty() {
    let paragraph = Paragraph::new("No products found.")
      .block(block)
      .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
    return;
  }

  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([Constraint::Min(1), Constraint::Length(1)])
    .split(area);

  let items: Vec<ListItem> = page.records.iter().map(product_line).collect();

  let list = List::new(items)
    .block(block)
    .highlight_style(
      Style::default()
        .bg(Color::DarkGray)
        .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("> ");

  let mut list_state = ListState::default();
  list_state.select(Some(state.selected.min(page.records.len() - 1)));

  frame.render_stateful_widget(list, chunks[0], &mut list_state);
  pagination::draw_page_line(
    frame,
    chunks[1],
    state.page,
    page.total_pages,
    page.total_count,
  );
}

fn product_line(product: &Product) -> ListItem<'static> {
  let category = product
    .category_name
    .clone()
    .unwrap_or_else(|| "No category".to_string());

  let line = Line::from(vec![
    Span::styled(
      format!("{:>5}", product.id),
      Style::default().fg(Color::DarkGray),
    ),
    Span::raw(" "),
    Span::raw(format!("{:<32}", truncate(&product.title, 32))),
    Span::raw(" "),
    Span::styled(
      format!("{:<16}", truncate(&category, 16)),
      Style::default().fg(Color::Cyan),
    ),
    Span::raw(" "),
    Span::styled(
      format!("$ {:>9.2}", product.price),
      Style::default().fg(Color::Green),
    ),
  ]);
  ListItem::new(line)
}

pub(super) fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let cut: String = s.chars().take(max_len.saturating_sub(1)).collect();
    format!("{}~", cut)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_truncate() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("exactly ten", 11), "exactly ten");
    assert_eq!(truncate("a much longer string", 8), "a much ~");
  }
}
