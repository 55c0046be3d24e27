use crate::cache::{QuerySnapshot, Subscription};
use crate::commands;
use crate::config::Config;
use crate::error::StoreError;
use crate::event::{Event, EventHandler, MutationOutcome};
use crate::store::catalog::CatalogClient;
use crate::store::keys::{CatalogKey, CatalogValue};
use crate::store::records::{CATEGORIES, PRODUCTS};
use crate::store::rest::RestStore;
use crate::store::types::{Category, CategoryInput, Product, ProductInput};
use crate::ui;
use crate::ui::components::input::TextInput;
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Input mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
  Normal,
  Command,
}

/// Severity of a status notice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
  Info,
  Warn,
  Error,
}

/// Transient notice shown in the status bar until the next key press
#[derive(Debug, Clone)]
pub struct Notice {
  pub text: String,
  pub kind: NoticeKind,
}

impl Notice {
  fn info(text: impl Into<String>) -> Self {
    Self {
      text: text.into(),
      kind: NoticeKind::Info,
    }
  }

  fn warn(text: impl Into<String>) -> Self {
    Self {
      text: text.into(),
      kind: NoticeKind::Warn,
    }
  }

  fn error(text: impl Into<String>) -> Self {
    Self {
      text: text.into(),
      kind: NoticeKind::Error,
    }
  }
}

/// State of the paginated product listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductListState {
  pub page: u32,
  pub category: Option<i64>,
  pub selected: usize,
}

impl ProductListState {
  pub fn new() -> Self {
    Self {
      page: 1,
      category: None,
      selected: 0,
    }
  }

  /// Change the category filter. Any change resets to page 1: an offset
  /// computed under the old filter is meaningless under the new one.
  pub fn set_category(&mut self, category: Option<i64>) {
    if self.category != category {
      self.category = category;
      self.page = 1;
      self.selected = 0;
    }
  }
}

impl Default for ProductListState {
  fn default() -> Self {
    Self::new()
  }
}

/// Fields of the product form, in focus order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductField {
  Title,
  Description,
  Price,
  ImageUrl,
  Category,
}

const PRODUCT_FIELDS: [ProductField; 5] = [
  ProductField::Title,
  ProductField::Description,
  ProductField::Price,
  ProductField::ImageUrl,
  ProductField::Category,
];

/// State of the product create/edit form.
#[derive(Debug, Clone, Default)]
pub struct ProductFormState {
  pub editing: Option<i64>,
  pub title: TextInput,
  pub description: TextInput,
  pub price: TextInput,
  pub image_url: TextInput,
  pub category_id: Option<i64>,
  pub focused: usize,
  pub errors: Vec<StoreError>,
  pub pending: bool,
  /// For edits: whether the fetched product has been copied into the
  /// fields yet. Creates start out loaded.
  pub loaded: bool,
}

impl ProductFormState {
  pub fn create() -> Self {
    Self {
      loaded: true,
      ..Self::default()
    }
  }

  pub fn edit(id: i64) -> Self {
    Self {
      editing: Some(id),
      ..Self::default()
    }
  }

  pub fn focused_field(&self) -> ProductField {
    PRODUCT_FIELDS[self.focused % PRODUCT_FIELDS.len()]
  }

  pub fn focus_next(&mut self) {
    self.focused = (self.focused + 1) % PRODUCT_FIELDS.len();
  }

  pub fn focus_prev(&mut self) {
    self.focused = (self.focused + PRODUCT_FIELDS.len() - 1) % PRODUCT_FIELDS.len();
  }

  /// Copy a fetched product into the fields. Only done once so user edits
  /// are not clobbered by a refetch.
  pub fn fill_from(&mut self, product: &Product) {
    self.title.set_value(product.title.clone());
    self.description.set_value(product.description.clone());
    self.price.set_value(product.price.to_string());
    self.image_url.set_value(product.image_url.clone());
    self.category_id = product.category_id;
    self.loaded = true;
  }

  /// The input payload as currently entered. A price that doesn't parse
  /// comes out as 0 and fails validation as non-positive.
  pub fn input(&self) -> ProductInput {
    ProductInput {
      title: self.title.value().trim().to_string(),
      description: self.description.value().trim().to_string(),
      price: self.price.value().trim().parse().unwrap_or(0.0),
      image_url: self.image_url.value().trim().to_string(),
      category_id: self.category_id,
    }
  }

  pub fn error_for(&self, field: &'static str) -> Option<&StoreError> {
    self.errors.iter().find(
      |error| matches!(error, StoreError::Validation { field: f, .. } if *f == field),
    )
  }

  pub fn focused_input(&mut self) -> Option<&mut TextInput> {
    match self.focused_field() {
      ProductField::Title => Some(&mut self.title),
      ProductField::Description => Some(&mut self.description),
      ProductField::Price => Some(&mut self.price),
      ProductField::ImageUrl => Some(&mut self.image_url),
      ProductField::Category => None,
    }
  }

  /// Step the category picker through "no category" plus each category.
  pub fn cycle_category(&mut self, categories: &[Category], direction: i64) {
    let mut options: Vec<Option<i64>> = vec![None];
    options.extend(categories.iter().map(|c| Some(c.id)));
    let position = options
      .iter()
      .position(|option| *option == self.category_id)
      .unwrap_or(0) as i64;
    let count = options.len() as i64;
    let next = (position + direction).rem_euclid(count) as usize;
    self.category_id = options[next];
  }
}

/// State of the category create/edit form.
#[derive(Debug, Clone, Default)]
pub struct CategoryFormState {
  pub editing: Option<i64>,
  pub name: TextInput,
  pub errors: Vec<StoreError>,
  pub pending: bool,
}

impl CategoryFormState {
  pub fn create() -> Self {
    Self::default()
  }

  pub fn edit(category: &Category) -> Self {
    let mut form = Self {
      editing: Some(category.id),
      ..Self::default()
    };
    form.name.set_value(category.name.clone());
    form
  }

  pub fn input(&self) -> CategoryInput {
    CategoryInput {
      name: self.name.value().trim().to_string(),
    }
  }

  pub fn error_for(&self, field: &'static str) -> Option<&StoreError> {
    self.errors.iter().find(
      |error| matches!(error, StoreError::Validation { field: f, .. } if *f == field),
    )
  }
}

/// View state - each variant owns its data
#[derive(Debug)]
pub enum ViewState {
  // Root views (set via : commands)
  Home { selected: usize },
  Products(ProductListState),
  Categories { selected: usize },

  // Form views (pushed via a/e)
  ProductForm(ProductFormState),
  CategoryForm(CategoryFormState),
}

/// Main application state
pub struct App {
  /// Navigation stack - root is always at index 0
  view_stack: Vec<ViewState>,

  /// Current input mode
  mode: Mode,

  /// Command input buffer (after pressing :)
  command_input: String,

  /// Selected autocomplete suggestion index
  selected_suggestion: usize,

  /// Transient status notice
  notice: Option<Notice>,

  /// Application configuration
  config: Config,

  /// Catalog client (record store + query cache)
  catalog: CatalogClient,

  /// Active cache subscriptions for the current view
  subscriptions: Vec<Subscription<CatalogKey>>,

  /// Event sender for async tasks
  event_tx: mpsc::UnboundedSender<Event>,

  /// Whether to quit
  should_quit: bool,
}

impl App {
  pub fn new(config: Config) -> Result<Self> {
    let store = RestStore::new(&config)?;
    let catalog = CatalogClient::new(Arc::new(store));
    let (tx, _rx) = mpsc::unbounded_channel();

    Ok(Self {
      view_stack: vec![ViewState::Home { selected: 0 }],
      mode: Mode::Normal,
      command_input: String::new(),
      selected_suggestion: 0,
      notice: None,
      config,
      catalog,
      subscriptions: Vec::new(),
      event_tx: tx,
      should_quit: false,
    })
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    // Create event handler
    let mut events = EventHandler::new(Duration::from_millis(250));
    self.event_tx = events.sender();

    // Initial data load for the root view
    self.refresh_current();

    // Main loop
    while !self.should_quit {
      // Draw UI
      terminal.draw(|frame| ui::draw(frame, self))?;

      // Handle events
      if let Some(event) = events.next().await {
        self.handle_event(event);
      }
    }

    // Cleanup terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
  }

  // ==========================================================================
  // Accessors for the UI layer
  // ==========================================================================

  pub fn current_view(&self) -> Option<&ViewState> {
    self.view_stack.last()
  }

  pub fn mode(&self) -> &Mode {
    &self.mode
  }

  pub fn command_input(&self) -> &str {
    &self.command_input
  }

  pub fn selected_suggestion(&self) -> usize {
    self.selected_suggestion
  }

  pub fn notice(&self) -> Option<&Notice> {
    self.notice.as_ref()
  }

  pub fn title(&self) -> &str {
    self.config.title.as_deref().unwrap_or("vitrine")
  }

  pub fn snapshot(&self, key: &CatalogKey) -> Option<QuerySnapshot<CatalogValue>> {
    self.catalog.queries().get(key)
  }

  pub fn featured_key(&self) -> CatalogKey {
    CatalogKey::ProductPage {
      page: 1,
      page_size: self.config.featured_page_size,
      category: None,
    }
  }

  pub fn product_page_key(&self, state: &ProductListState) -> CatalogKey {
    CatalogKey::ProductPage {
      page: state.page,
      page_size: self.config.page_size,
      category: state.category,
    }
  }

  /// Categories from the cache, for the filter and the form picker.
  pub fn cached_categories(&self) -> Vec<Category> {
    self
      .snapshot(&CatalogKey::Categories)
      .and_then(|snapshot| snapshot.data)
      .and_then(|value| match value {
        CatalogValue::Categories(categories) => Some(categories),
        _ => None,
      })
      .unwrap_or_default()
  }

  // ==========================================================================
  // View wiring
  // ==========================================================================

  /// Re-point subscriptions and reads at whatever the current view needs.
  ///
  /// Called whenever the view stack or view parameters change. Old
  /// subscriptions are torn down first so fetches for keys nobody watches
  /// anymore get discarded.
  fn refresh_current(&mut self) {
    for subscription in std::mem::take(&mut self.subscriptions) {
      self.catalog.queries().unsubscribe(subscription);
    }

    let keys: Vec<CatalogKey> = match self.view_stack.last() {
      Some(ViewState::Home { .. }) => vec![self.featured_key()],
      Some(ViewState::Products(state)) => {
        vec![self.product_page_key(state), CatalogKey::Categories]
      }
      Some(ViewState::Categories { .. }) => vec![CatalogKey::Categories],
      Some(ViewState::ProductForm(form)) => {
        let mut keys = vec![CatalogKey::Categories];
        if let Some(id) = form.editing {
          keys.push(CatalogKey::Product { id });
        }
        keys
      }
      Some(ViewState::CategoryForm(_)) => Vec::new(),
      None => Vec::new(),
    };

    for key in keys {
      self.watch_and_read(key);
    }
  }

  fn watch_and_read(&mut self, key: CatalogKey) {
    let tx = self.event_tx.clone();
    let notify_key = key.clone();
    let subscription = self.catalog.queries().subscribe(&key, move |_| {
      let _ = tx.send(Event::Query(notify_key.clone()));
    });
    self.subscriptions.push(subscription);
    self.read(&key);
  }

  /// Issue the read for a key. The cache decides whether a fetch actually
  /// happens.
  fn read(&self, key: &CatalogKey) {
    match *key {
      CatalogKey::ProductPage {
        page,
        page_size,
        category,
      } => {
        self.catalog.product_page(page, page_size, category);
      }
      CatalogKey::Product { id } => {
        self.catalog.product(id);
      }
      CatalogKey::Categories => {
        self.catalog.categories();
      }
      CatalogKey::Category { id } => {
        self.catalog.category(id);
      }
    }
  }

  // ==========================================================================
  // Event handling
  // ==========================================================================

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => {
        self.notice = None;
        self.handle_key(key);
      }
      Event::Tick => {} // UI refresh happens automatically
      Event::Query(key) => self.handle_query_event(key),
      Event::Mutation(outcome) => self.handle_mutation_event(outcome),
    }
  }

  fn handle_query_event(&mut self, key: CatalogKey) {
    match key {
      CatalogKey::ProductPage { .. } => self.clamp_product_page(),
      CatalogKey::Product { id } => self.fill_product_form(id),
      _ => {}
    }
  }

  /// After a refetch the total page count may have shrunk below the page
  /// we're on (e.g. the last record of the last page was deleted).
  fn clamp_product_page(&mut self) {
    let total_pages = match self.current_total_pages() {
      Some(total) => total.max(1),
      None => return,
    };
    let mut changed = false;
    if let Some(ViewState::Products(state)) = self.view_stack.last_mut() {
      if state.page > total_pages {
        state.page = total_pages;
        state.selected = 0;
        changed = true;
      }
    }
    if changed {
      self.refresh_current();
    }
  }

  fn current_total_pages(&self) -> Option<u32> {
    let state = match self.view_stack.last() {
      Some(ViewState::Products(state)) => state,
      _ => return None,
    };
    let snapshot = self.snapshot(&self.product_page_key(state))?;
    if !snapshot.is_success() {
      return None;
    }
    snapshot
      .data
      .as_ref()
      .and_then(|value| value.as_product_page())
      .map(|page| page.total_pages)
  }

  fn fill_product_form(&mut self, id: i64) {
    let product = self
      .snapshot(&CatalogKey::Product { id })
      .and_then(|snapshot| snapshot.data)
      .and_then(|value| match value {
        CatalogValue::Product(product) => Some(product),
        _ => None,
      });
    let product = match product {
      Some(product) => product,
      None => return,
    };
    if let Some(ViewState::ProductForm(form)) = self.view_stack.last_mut() {
      if form.editing == Some(id) && !form.loaded {
        form.fill_from(&product);
      }
    }
  }

  fn handle_mutation_event(&mut self, outcome: MutationOutcome) {
    if let Some(view) = self.view_stack.last_mut() {
      match view {
        ViewState::ProductForm(form) => form.pending = false,
        ViewState::CategoryForm(form) => form.pending = false,
        _ => {}
      }
    }

    match outcome.result {
      Ok(()) => {
        self.notice = Some(Notice::info(outcome.action));
        if matches!(
          self.view_stack.last(),
          Some(ViewState::ProductForm(_) | ViewState::CategoryForm(_))
        ) {
          self.pop_view();
        }
      }
      Err(error) if error.is_not_found() => {
        // The record is gone; any cached read mentioning it is stale.
        self.catalog.queries().invalidate_namespace(outcome.namespace);
        self.notice = Some(Notice::warn(error.to_string()));
      }
      Err(error) => {
        self.notice = Some(Notice::error(error.to_string()));
      }
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if self.mode == Mode::Command {
      self.handle_command_mode_key(key);
      return;
    }
    let in_product_form = matches!(self.view_stack.last(), Some(ViewState::ProductForm(_)));
    let in_category_form = matches!(self.view_stack.last(), Some(ViewState::CategoryForm(_)));
    if in_product_form {
      self.handle_product_form_key(key);
    } else if in_category_form {
      self.handle_category_form_key(key);
    } else {
      self.handle_list_key(key);
    }
  }

  fn handle_list_key(&mut self, key: KeyEvent) {
    match key.code {
      // Quit / back
      KeyCode::Char('q') => self.pop_view(),
      KeyCode::Esc => {
        if self.view_stack.len() > 1 {
          self.view_stack.pop();
          self.refresh_current();
        }
      }
      KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
        self.should_quit = true;
      }

      // Navigation
      KeyCode::Up | KeyCode::Char('k') => self.move_selection(-1),
      KeyCode::Down | KeyCode::Char('j') => self.move_selection(1),
      KeyCode::Left => self.change_page(-1),
      KeyCode::Right => self.change_page(1),

      // Actions
      KeyCode::Char('f') => self.cycle_filter(),
      KeyCode::Char('r') => self.refresh_view_namespace(),
      KeyCode::Char('a') => self.open_create_form(),
      KeyCode::Enter | KeyCode::Char('e') => {
        if matches!(self.view_stack.last(), Some(ViewState::Home { .. })) {
          self.show_products();
        } else {
          self.open_edit_form();
        }
      }
      KeyCode::Char('d') => self.delete_selected(),

      // Mode switch
      KeyCode::Char(':') => {
        self.mode = Mode::Command;
        self.command_input.clear();
        self.selected_suggestion = 0;
      }

      _ => {}
    }
  }

  fn handle_command_mode_key(&mut self, key: KeyEvent) {
    match key.code {
      KeyCode::Esc => {
        self.mode = Mode::Normal;
        self.command_input.clear();
        self.selected_suggestion = 0;
      }
      KeyCode::Enter => {
        self.execute_command();
        self.mode = Mode::Normal;
        self.selected_suggestion = 0;
      }
      KeyCode::Tab | KeyCode::Down => {
        // Navigate autocomplete suggestions
        let suggestions = commands::get_suggestions(&self.command_input);
        if !suggestions.is_empty() {
          self.selected_suggestion = (self.selected_suggestion + 1) % suggestions.len();
        }
      }
      KeyCode::BackTab | KeyCode::Up => {
        // Navigate autocomplete suggestions backwards
        let suggestions = commands::get_suggestions(&self.command_input);
        if !suggestions.is_empty() {
          self.selected_suggestion = if self.selected_suggestion == 0 {
            suggestions.len() - 1
          } else {
            self.selected_suggestion - 1
          };
        }
      }
      KeyCode::Backspace => {
        self.command_input.pop();
        self.selected_suggestion = 0; // Reset selection on input change
      }
      KeyCode::Char(c) => {
        self.command_input.push(c);
        self.selected_suggestion = 0; // Reset selection on input change
      }
      _ => {}
    }
  }

  fn handle_product_form_key(&mut self, key: KeyEvent) {
    let categories = self.cached_categories();
    let mut cancel = false;
    let mut submit = false;
    let mut quit = false;

    if let Some(ViewState::ProductForm(form)) = self.view_stack.last_mut() {
      match key.code {
        KeyCode::Esc => cancel = true,
        KeyCode::Enter => submit = true,
        KeyCode::Tab | KeyCode::Down => form.focus_next(),
        KeyCode::BackTab | KeyCode::Up => form.focus_prev(),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => quit = true,
        KeyCode::Left if form.focused_field() == ProductField::Category => {
          form.cycle_category(&categories, -1);
        }
        KeyCode::Right if form.focused_field() == ProductField::Category => {
          form.cycle_category(&categories, 1);
        }
        _ => {
          if let Some(input) = form.focused_input() {
            input.handle_key(key);
          }
        }
      }
    }

    if quit {
      self.should_quit = true;
    } else if cancel {
      self.pop_view();
    } else if submit {
      self.submit_product_form();
    }
  }

  fn handle_category_form_key(&mut self, key: KeyEvent) {
    let mut cancel = false;
    let mut submit = false;
    let mut quit = false;

    if let Some(ViewState::CategoryForm(form)) = self.view_stack.last_mut() {
      match key.code {
        KeyCode::Esc => cancel = true,
        KeyCode::Enter => submit = true,
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => quit = true,
        _ => {
          form.name.handle_key(key);
        }
      }
    }

    if quit {
      self.should_quit = true;
    } else if cancel {
      self.pop_view();
    } else if submit {
      self.submit_category_form();
    }
  }

  fn execute_command(&mut self) {
    // Get the command to execute - either from selected suggestion or direct input
    let suggestions = commands::get_suggestions(&self.command_input);
    let cmd = if !suggestions.is_empty() && self.selected_suggestion < suggestions.len() {
      suggestions[self.selected_suggestion].name.to_string()
    } else {
      self.command_input.trim().to_lowercase()
    };

    match cmd.as_str() {
      "home" => {
        self.view_stack = vec![ViewState::Home { selected: 0 }];
        self.refresh_current();
      }
      "products" => self.show_products(),
      "categories" => {
        self.view_stack = vec![ViewState::Categories { selected: 0 }];
        self.refresh_current();
      }
      "quit" => {
        self.should_quit = true;
      }
      _ => {
        self.notice = Some(Notice::warn(format!("Unknown command: {}", cmd)));
      }
    }
    self.command_input.clear();
  }

  fn show_products(&mut self) {
    self.view_stack = vec![ViewState::Products(ProductListState::new())];
    self.refresh_current();
  }

  fn pop_view(&mut self) {
    if self.view_stack.len() > 1 {
      self.view_stack.pop();
      self.refresh_current();
    } else {
      self.should_quit = true;
    }
  }

  // ==========================================================================
  // List actions
  // ==========================================================================

  fn current_list_len(&self) -> usize {
    match self.view_stack.last() {
      Some(ViewState::Home { .. }) => self.page_records_len(&self.featured_key()),
      Some(ViewState::Products(state)) => self.page_records_len(&self.product_page_key(state)),
      Some(ViewState::Categories { .. }) => self.cached_categories().len(),
      _ => 0,
    }
  }

  fn page_records_len(&self, key: &CatalogKey) -> usize {
    self
      .snapshot(key)
      .and_then(|snapshot| snapshot.data)
      .and_then(|value| value.as_product_page().map(|page| page.records.len()))
      .unwrap_or(0)
  }

  fn selected_product(&self, state: &ProductListState) -> Option<Product> {
    self
      .snapshot(&self.product_page_key(state))
      .and_then(|snapshot| snapshot.data)
      .and_then(|value| {
        value
          .as_product_page()
          .and_then(|page| page.records.get(state.selected).cloned())
      })
  }

  fn move_selection(&mut self, delta: i64) {
    let len = self.current_list_len();
    if len == 0 {
      return;
    }
    let selected = match self.view_stack.last_mut() {
      Some(ViewState::Home { selected }) => selected,
      Some(ViewState::Categories { selected }) => selected,
      Some(ViewState::Products(state)) => &mut state.selected,
      _ => return,
    };
    *selected = (*selected as i64 + delta).clamp(0, len as i64 - 1) as usize;
  }

  fn change_page(&mut self, delta: i32) {
    let total_pages = self.current_total_pages().unwrap_or(u32::MAX).max(1);
    let mut changed = false;
    if let Some(ViewState::Products(state)) = self.view_stack.last_mut() {
      let next = (state.page as i64 + i64::from(delta)).clamp(1, i64::from(total_pages)) as u32;
      if next != state.page {
        state.page = next;
        state.selected = 0;
        changed = true;
      }
    }
    if changed {
      self.refresh_current();
    }
  }

  fn cycle_filter(&mut self) {
    let categories = self.cached_categories();
    let mut changed = false;
    if let Some(ViewState::Products(state)) = self.view_stack.last_mut() {
      let next = next_filter(state.category, &categories);
      changed = next != state.category;
      state.set_category(next);
    }
    if changed {
      self.refresh_current();
    }
  }

  /// Manual refresh: mark everything under the current view's collection
  /// stale.
  fn refresh_view_namespace(&mut self) {
    let namespace = match self.view_stack.last() {
      Some(ViewState::Home { .. }) | Some(ViewState::Products(_)) => PRODUCTS,
      Some(ViewState::Categories { .. }) => CATEGORIES,
      _ => return,
    };
    self.catalog.queries().invalidate_namespace(namespace);
  }

  fn open_create_form(&mut self) {
    let next = match self.view_stack.last() {
      Some(ViewState::Home { .. }) | Some(ViewState::Products(_)) => {
        Some(ViewState::ProductForm(ProductFormState::create()))
      }
      Some(ViewState::Categories { .. }) => {
        Some(ViewState::CategoryForm(CategoryFormState::create()))
      }
      _ => None,
    };
    if let Some(view) = next {
      self.view_stack.push(view);
      self.refresh_current();
    }
  }

  fn open_edit_form(&mut self) {
    let next = match self.view_stack.last() {
      Some(ViewState::Products(state)) => self
        .selected_product(state)
        .map(|product| ViewState::ProductForm(ProductFormState::edit(product.id))),
      Some(ViewState::Categories { selected }) => self
        .cached_categories()
        .get(*selected)
        .map(|category| ViewState::CategoryForm(CategoryFormState::edit(category))),
      _ => None,
    };
    if let Some(view) = next {
      self.view_stack.push(view);
      self.refresh_current();
    }
  }

  fn delete_selected(&mut self) {
    match self.view_stack.last() {
      Some(ViewState::Products(state)) => {
        if let Some(product) = self.selected_product(state) {
          self.spawn_mutation("Product deleted", PRODUCTS, {
            let catalog = self.catalog.clone();
            let id = product.id;
            async move { catalog.delete_product(id).await }
          });
        }
      }
      Some(ViewState::Categories { selected }) => {
        if let Some(category) = self.cached_categories().get(*selected) {
          self.spawn_mutation("Category deleted", CATEGORIES, {
            let catalog = self.catalog.clone();
            let id = category.id;
            async move { catalog.delete_category(id).await }
          });
        }
      }
      _ => {}
    }
  }

  // ==========================================================================
  // Mutations
  // ==========================================================================

  fn spawn_mutation<F>(&self, action: &'static str, namespace: &'static str, operation: F)
  where
    F: std::future::Future<Output = Result<(), StoreError>> + Send + 'static,
  {
    let tx = self.event_tx.clone();
    tokio::spawn(async move {
      let result = operation.await;
      let _ = tx.send(Event::Mutation(MutationOutcome {
        action,
        namespace,
        result,
      }));
    });
  }

  fn submit_product_form(&mut self) {
    let (input, editing) = {
      let form = match self.view_stack.last_mut() {
        Some(ViewState::ProductForm(form)) => form,
        _ => return,
      };
      // Pending guard: no duplicate submissions while a write is in flight.
      if form.pending || !form.loaded {
        return;
      }
      let input = form.input();
      form.errors = input.field_errors();
      if !form.errors.is_empty() {
        return;
      }
      form.pending = true;
      (input, form.editing)
    };

    let catalog = self.catalog.clone();
    match editing {
      Some(id) => self.spawn_mutation("Product updated", PRODUCTS, async move {
        catalog.update_product(id, input).await.map(|_| ())
      }),
      None => self.spawn_mutation("Product created", PRODUCTS, async move {
        catalog.create_product(input).await.map(|_| ())
      }),
    }
  }

  fn submit_category_form(&mut self) {
    let (input, editing) = {
      let form = match self.view_stack.last_mut() {
        Some(ViewState::CategoryForm(form)) => form,
        _ => return,
      };
      if form.pending {
        return;
      }
      let input = form.input();
      form.errors = input.field_errors();
      if !form.errors.is_empty() {
        return;
      }
      form.pending = true;
      (input, form.editing)
    };

    let catalog = self.catalog.clone();
    match editing {
      Some(id) => self.spawn_mutation("Category updated", CATEGORIES, async move {
        catalog.update_category(id, input).await.map(|_| ())
      }),
      None => self.spawn_mutation("Category created", CATEGORIES, async move {
        catalog.create_category(input).await.map(|_| ())
      }),
    }
  }
}

/// Step the product list filter through "all categories" plus each
/// category in turn.
fn next_filter(current: Option<i64>, categories: &[Category]) -> Option<i64> {
  let mut options: Vec<Option<i64>> = vec![None];
  options.extend(categories.iter().map(|c| Some(c.id)));
  let position = options
    .iter()
    .position(|option| *option == current)
    .unwrap_or(0);
  options[(position + 1) % options.len()]
}

#[cfg(test)]
mod tests {
  use super::*;

  fn category(id: i64, name: &str) -> Category {
    Category {
      id,
      name: name.into(),
    }
  }

  #[test]
  fn test_changing_filter_resets_to_page_one() {
    let mut state = ProductListState::new();
    state.page = 2;
    state.selected = 4;

    state.set_category(Some(7));
    assert_eq!(state.page, 1);
    assert_eq!(state.selected, 0);
    assert_eq!(state.category, Some(7));
  }

  #[test]
  fn test_unchanged_filter_keeps_page() {
    let mut state = ProductListState::new();
    state.page = 2;
    state.set_category(None);
    assert_eq!(state.page, 2);
  }

  #[test]
  fn test_filter_cycles_through_all_and_back() {
    let categories = vec![category(1, "Books"), category(2, "Games")];
    assert_eq!(next_filter(None, &categories), Some(1));
    assert_eq!(next_filter(Some(1), &categories), Some(2));
    assert_eq!(next_filter(Some(2), &categories), None);
    // No categories: the only option is "all".
    assert_eq!(next_filter(None, &[]), None);
  }

  #[test]
  fn test_product_form_price_parsing() {
    let mut form = ProductFormState::create();
    form.title.set_value("Keyboard");
    form.description.set_value("Mechanical");
    form.price.set_value("59.9");
    form.image_url.set_value("https://img.example/kb.png");
    form.category_id = Some(1);

    let input = form.input();
    assert_eq!(input.price, 59.9);
    assert!(input.field_errors().is_empty());

    form.price.set_value("not a number");
    let input = form.input();
    assert_eq!(input.price, 0.0);
    assert!(input
      .field_errors()
      .iter()
      .any(|e| matches!(e, StoreError::Validation { field: "price", .. })));
  }

  #[test]
  fn test_product_form_error_lookup() {
    let mut form = ProductFormState::create();
    form.errors = form.input().field_errors();
    assert!(form.error_for("title").is_some());
    assert!(form.error_for("nonexistent").is_none());
  }

  #[test]
  fn test_product_form_focus_wraps() {
    let mut form = ProductFormState::create();
    assert_eq!(form.focused_field(), ProductField::Title);
    for _ in 0..PRODUCT_FIELDS.len() {
      form.focus_next();
    }
    assert_eq!(form.focused_field(), ProductField::Title);
    form.focus_prev();
    assert_eq!(form.focused_field(), ProductField::Category);
  }

  #[test]
  fn test_category_picker_cycles() {
    let categories = vec![category(1, "Books"), category(2, "Games")];
    let mut form = ProductFormState::create();
    assert_eq!(form.category_id, None);
    form.cycle_category(&categories, 1);
    assert_eq!(form.category_id, Some(1));
    form.cycle_category(&categories, 1);
    assert_eq!(form.category_id, Some(2));
    form.cycle_category(&categories, 1);
    assert_eq!(form.category_id, None);
    form.cycle_category(&categories, -1);
    assert_eq!(form.category_id, Some(2));
  }
}
