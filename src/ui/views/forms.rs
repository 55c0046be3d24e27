use crate::app::{App, CategoryFormState, ProductField, ProductFormState};
use crate::error::StoreError;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};

pub fn draw_product_form(frame: &mut Frame, area: Rect, app: &App, form: &ProductFormState) {
  let title = if form.editing.is_some() {
    " Edit Product "
  } else {
    " New Product "
  };
  let block = Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue));

  let categories = app.cached_categories();
  let category_label = form
    .category_id
    .and_then(|id| categories.iter().find(|c| c.id == id))
    .map(|c| c.name.clone())
    .unwrap_or_else(|| "none (Left/Right to pick)".to_string());

  let mut lines: Vec<Line> = Vec::new();
  if !form.loaded {
    lines.push(Line::from(Span::styled(
      "Loading product...",
      Style::default().fg(Color::DarkGray),
    )));
    lines.push(Line::from(""));
  }

  let focused = form.focused_field();
  push_field(
    &mut lines,
    "Title",
    form.title.value(),
    focused == ProductField::Title,
    form.error_for("title"),
  );
  push_field(
    &mut lines,
    "Description",
    form.description.value(),
    focused == ProductField::Description,
    form.error_for("description"),
  );
  push_field(
    &mut lines,
    "Price",
    form.price.value(),
    focused == ProductField::Price,
    form.error_for("price"),
  );
  push_field(
    &mut lines,
    "Image URL",
    form.image_url.value(),
    focused == ProductField::ImageUrl,
    form.error_for("image_url"),
  );
  push_field(
    &mut lines,
    "Category",
    &category_label,
    focused == ProductField::Category,
    form.error_for("category_id"),
  );

  if form.pending {
    lines.push(Line::from(Span::styled(
      "Saving...",
      Style::default().fg(Color::Yellow),
    )));
  }

  frame.render_widget(Paragraph::new(lines).block(block), area);
}

pub fn draw_category_form(frame: &mut Frame, area: Rect, form: &CategoryFormState) {
  let title = if form.editing.is_some() {
    " Edit Category "
  } else {
    " New Category "
  };
  let block = Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue));

  let mut lines: Vec<Line> = Vec::new();
  push_field(&mut lines, "Name", form.name.value(), true, form.error_for("name"));

  if form.pending {
    lines.push(Line::from(Span::styled(
      "Saving...",
      Style::default().fg(Color::Yellow),
    )));
  }

  frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn push_field(
  lines: &mut Vec<Line>,
  label: &str,
  value: &str,
  focused: bool,
  error: Option<&StoreError>,
) {
  let label_style = if focused {
    Style::default()
      .fg(Color::Yellow)
      .add_modifier(Modifier::BOLD)
  } else {
    Style::default().fg(Color::Cyan)
  };
  let marker = if focused { "> " } else { "  " };

  lines.push(Line::from(vec![
    Span::styled(format!("{}{:<12}", marker, label), label_style),
    Span::raw(value.to_string()),
  ]));

  if let Some(error) = error {
    lines.push(Line::from(Span::styled(
      format!("    {}", error),
      Style::default().fg(Color::Red),
    )));
  }
  lines.push(Line::from(""));
}
