pub mod components;
mod views;

use crate::app::{App, Mode, NoticeKind, ViewState};
use crate::commands;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Main draw function
pub fn draw(frame: &mut Frame, app: &App) {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Min(1),    // Main content
      Constraint::Length(1), // Status bar
    ])
    .split(frame.area());

  // Draw current view
  if let Some(view) = app.current_view() {
    match view {
      ViewState::Home { selected } => {
        views::home::draw_home(frame, chunks[0], app, *selected);
      }
      ViewState::Products(state) => {
        views::products::draw_products(frame, chunks[0], app, state);
      }
      ViewState::Categories { selected } => {
        views::categories::draw_categories(frame, chunks[0], app, *selected);
      }
      ViewState::ProductForm(form) => {
        views::forms::draw_product_form(frame, chunks[0], app, form);
      }
      ViewState::CategoryForm(form) => {
        views::forms::draw_category_form(frame, chunks[0], form);
      }
    }
  }

  // Draw status bar
  draw_status_bar(frame, chunks[1], app);
}

fn draw_status_bar(frame: &mut Frame, area: Rect, app: &App) {
  // A notice takes precedence over key hints
  if let Some(notice) = app.notice() {
    let style = match notice.kind {
      NoticeKind::Info => Style::default().fg(Color::Green),
      NoticeKind::Warn => Style::default().fg(Color::Yellow),
      NoticeKind::Error => Style::default().fg(Color::Red),
    };
    frame.render_widget(Paragraph::new(format!(" {}", notice.text)).style(style), area);
    return;
  }

  let (content, style) = match app.mode() {
    Mode::Normal => {
      let hint = match app.current_view() {
        Some(ViewState::Home { .. }) => {
          " :command  j/k:nav  Enter:all products  a:add  Ctrl-C:quit"
        }
        Some(ViewState::Products(_)) => {
          " :command  j/k:nav  Left/Right:page  f:filter  a:add  e:edit  d:delete  r:refresh  q:back"
        }
        Some(ViewState::Categories { .. }) => {
          " :command  j/k:nav  a:add  e:edit  d:delete  r:refresh  q:back"
        }
        _ => " Tab:next field  Enter:save  Esc:cancel",
      };
      (hint.to_string(), Style::default().fg(Color::DarkGray))
    }
    Mode::Command => {
      let suggestions = commands::get_suggestions(app.command_input());
      let mut content = format!(":{}", app.command_input());
      if !suggestions.is_empty() {
        let names: Vec<String> = suggestions
          .iter()
          .enumerate()
          .map(|(i, cmd)| {
            if i == app.selected_suggestion() {
              format!("[{}]", cmd.name)
            } else {
              cmd.name.to_string()
            }
          })
          .collect();
        content.push_str(&format!("  ({})", names.join(" ")));
      }
      (content, Style::default().fg(Color::Yellow))
    }
  };

  frame.render_widget(Paragraph::new(content).style(style), area);
}
