use crate::app::App;
use crate::ui::views::products::truncate;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

/// Featured products: the first page at the small featured page size.
pub fn draw_home(frame: &mut Frame, area: Rect, app: &App, selected: usize) {
  let snapshot = app.snapshot(&app.featured_key());

  let loading = snapshot.as_ref().is_some_and(|s| s.is_loading());
  let title = if loading {
    format!(" {} - Featured (loading...) ", app.title())
  } else {
    format!(" {} - Featured ", app.title())
  };

  let block = Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Magenta));

  if let Some(error) = snapshot.as_ref().and_then(|s| s.error.as_ref()) {
    let paragraph = Paragraph::new(format!("Failed to load featured products: {}", error))
      .block(block)
      .style(Style::default().fg(Color::Red));
    frame.render_widget(paragraph, area);
    return;
  }

  let page = snapshot
    .as_ref()
    .and_then(|s| s.data.as_ref())
    .and_then(|v| v.as_product_page());

  let records = match page {
    Some(page) if !page.records.is_empty() => &page.records,
    Some(_) => {
      let paragraph = Paragraph::new("No products yet. Press a to add one.")
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }
    None => {
      let paragraph = Paragraph::new("Loading featured products...")
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }
  };

  let items: Vec<ListItem> = records
    .iter()
    .map(|product| {
      let line = Line::from(vec![
        Span::styled(
          format!("{:<32}", truncate(&product.title, 32)),
          Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::raw(format!("{:<40}", truncate(&product.description, 40))),
        Span::raw(" "),
        Span::styled(
          format!("$ {:>9.2}", product.price),
          Style::default().fg(Color::Green),
        ),
      ]);
      ListItem::new(line)
    })
    .collect();

  let list = List::new(items)
    .block(block)
    .highlight_style(
      Style::default()
        .bg(Color::DarkGray)
        .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("> ");

  let mut list_state = ListState::default();
  list_state.select(Some(selected.min(records.len() - 1)));

  frame.render_stateful_widget(list, area, &mut list_state);
}
