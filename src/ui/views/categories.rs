use crate::app::App;
use crate::store::keys::CatalogKey;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

pub fn draw_categories(frame: &mut Frame, area: Rect, app: &App, selected: usize) {
  let snapshot = app.snapshot(&CatalogKey::Categories);

  let loading = snapshot.as_ref().is_some_and(|s| s.is_loading());
  let categories = app.cached_categories();

  let title = if loading {
    " Categories (loading...) ".to_string()
  } else {
    format!(" Categories ({}) ", categories.len())
  };

  let block = Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue));

  if let Some(error) = snapshot.as_ref().and_then(|s| s.error.as_ref()) {
    let paragraph = Paragraph::new(format!(
      "Failed to load categories: {}\nPress r to retry.",
      error
    ))
    .block(block)
    .style(Style::default().fg(Color::Red));
    frame.render_widget(paragraph, area);
    return;
  }

  if categories.is_empty() {
    let content = if loading {
      "Loading categories..."
    } else {
      "No categories yet. Press a to add one."
    };
    let paragraph = Paragraph::new(content)
      .block(block)
      .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
    return;
  }

  let items: Vec<ListItem> = categories
    .iter()
    .map(|category| {
      let line = Line::from(vec![
        Span::styled(
          format!("{:>5}", category.id),
          Style::default().fg(Color::DarkGray),
        ),
        Span::raw(" "),
        Span::raw(category.name.clone()),
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
  list_state.select(Some(selected.min(categories.len() - 1)));

  frame.render_stateful_widget(list, area, &mut list_state);
}
