use std::fs;
use std::sync::mpsc;
use std::time::Instant;

use arboard::Clipboard;
use ratatui::crossterm::event::KeyEvent;
use tracing::{info, trace, warn};

use crate::columns::{ColumnDef, ColumnRegistry};
use crate::csv;
use crate::domain::{CMDMode, HELP_TEXT, Message, TdeConfig, TdeError};
use crate::inputter::{InputResult, Inputter};
use crate::persist::Persistence;
use crate::rows::{Row, RowStore, Value, synthesize_id};
use crate::ui::{CMDLINE_HEIGH, COLUMN_WIDTH_MARGIN, SCROLLBAR_WIDTH, TABLE_HEADER_HEIGHT};
use crate::view::{SortDirection, View, ViewQuery, compute_view};

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy)]
enum Modus {
    TABLE,
    POPUP,
    CMDINPUT,
}

// One rendered column of the current page, in display order.
#[derive(Clone)]
pub struct ColumnView {
    pub name: String,
    pub width: usize,
    pub data: Vec<String>,
}

impl ColumnView {
    fn empty() -> Self {
        ColumnView {
            name: "".to_string(),
            width: 0,
            data: Vec::new(),
        }
    }
}

#[derive(Default, Clone, Debug)]
pub struct UILayout {
    pub width: usize,
    pub height: usize,
    pub table_width: usize,
    pub table_height: usize,
    pub index_width: usize,
    pub index_height: usize,
    pub statusline_width: usize,
    pub statusline_height: usize,
}

impl UILayout {
    pub fn from_values(index_width: usize, ui_width: usize, ui_height: usize) -> Self {
        let table_width = ui_width.saturating_sub(SCROLLBAR_WIDTH + index_width);
        let table_height = ui_height.saturating_sub(CMDLINE_HEIGH + TABLE_HEADER_HEIGHT);

        let layout = UILayout {
            width: ui_width,
            height: ui_height,
            table_width,
            table_height,
            index_width,
            index_height: table_height,
            statusline_width: ui_width,
            statusline_height: CMDLINE_HEIGH,
        };
        trace!("Build UILayout: {:?}", layout);
        layout
    }
}

// Everything the UI needs to render one frame.
pub struct UIData {
    pub name: String,
    pub table: Vec<ColumnView>,
    pub index: ColumnView,
    pub nrows: usize,
    pub selected_row: usize,
    pub selected_column: usize,
    pub abs_selected_row: usize,
    pub show_popup: bool,
    pub popup_message: String,
    pub layout: UILayout,
    pub last_update: Instant,
    pub cmdinput: InputResult,
    pub cmd_mode: Option<CMDMode>,
    pub active_cmdinput: bool,
    pub status_message: String,
    pub last_status_message_update: Instant,
}

impl UIData {
    pub fn empty() -> Self {
        UIData {
            name: String::new(),
            table: Vec::new(),
            index: ColumnView::empty(),
            nrows: 0,
            selected_row: 0,
            selected_column: 0,
            abs_selected_row: 0,
            show_popup: false,
            popup_message: String::new(),
            layout: UILayout::default(),
            last_update: Instant::now(),
            cmdinput: InputResult::default(),
            cmd_mode: None,
            active_cmdinput: false,
            status_message: String::new(),
            last_status_message_update: Instant::now(),
        }
    }
}

pub struct Model {
    config: TdeConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    rows: RowStore,
    registry: ColumnRegistry,
    query: ViewQuery,
    page: View,
    curser_row: usize,
    curser_column: usize,
    seed_rx: Option<mpsc::Receiver<Vec<Row>>>,
    last_update: Instant,
    uilayout: UILayout,
    uidata: UIData,
    clipboard: Option<Clipboard>,
    input: Inputter,
    cmd_mode: Option<CMDMode>,
    last_input: InputResult,
    active_cmdinput: bool,
    status_message: String,
    last_status_message_update: Instant,
}

impl Model {
    pub fn init(
        config: &TdeConfig,
        row_persistence: Box<dyn Persistence>,
        column_persistence: Box<dyn Persistence>,
        ui_width: usize,
        ui_height: usize,
    ) -> Result<Self, TdeError> {
        let rows = RowStore::init(row_persistence);
        let registry = ColumnRegistry::init(column_persistence);
        let query = ViewQuery::default().page_size(config.page_size);

        let mut model = Self {
            config: config.clone(),
            status: Status::READY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            rows,
            registry,
            query,
            page: View {
                items: Vec::new(),
                total_count: 0,
            },
            curser_row: 0,
            curser_column: 0,
            seed_rx: None,
            last_update: Instant::now(),
            uilayout: UILayout::from_values(0, ui_width, ui_height),
            uidata: UIData::empty(),
            clipboard: Clipboard::new().ok(),
            input: Inputter::default(),
            cmd_mode: None,
            last_input: InputResult::default(),
            active_cmdinput: false,
            status_message: "Started tde!".to_string(),
            last_status_message_update: Instant::now(),
        };
        model.input.set_width(model.uilayout.statusline_width);
        model.refresh();
        Ok(model)
    }

    // The fetch thread reports here. Polled on every update tick.
    pub fn attach_seed(&mut self, rx: mpsc::Receiver<Vec<Row>>) {
        self.seed_rx = Some(rx);
        self.set_status_message("Fetching seed data ...");
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    pub fn raw_keyevents(&self) -> bool {
        self.active_cmdinput
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), TdeError> {
        self.poll_seed()?;

        if let Some(msg) = message {
            match self.modus {
                Modus::TABLE => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveUp => self.move_selection_up(),
                    Message::MoveDown => self.move_selection_down(),
                    Message::MoveLeft => self.move_selection_left(),
                    Message::MoveRight => self.move_selection_right(),
                    Message::MoveBeginning => self.move_selection_beginning(),
                    Message::MoveEnd => self.move_selection_end(),
                    Message::PageNext => self.page_next(),
                    Message::PagePrev => self.page_prev(),
                    Message::SortAscending => self.sort_current(SortDirection::Ascending),
                    Message::SortDescending => self.sort_current(SortDirection::Descending),
                    Message::Search => self.enter_cmd_mode(CMDMode::SearchTable),
                    Message::EditCell => self.start_edit(),
                    Message::AddRow => self.add_row()?,
                    Message::DeleteRow => self.delete_row()?,
                    Message::AddColumn => self.enter_cmd_mode(CMDMode::AddColumn),
                    Message::HideColumn => self.hide_current_column()?,
                    Message::ToggleColumn => self.enter_cmd_mode(CMDMode::ToggleColumn),
                    Message::MoveColumnLeft => self.move_column(-1)?,
                    Message::MoveColumnRight => self.move_column(1)?,
                    Message::ImportCsv => self.enter_cmd_mode(CMDMode::ImportPath),
                    Message::ExportCsv => self.enter_cmd_mode(CMDMode::ExportPath),
                    Message::CopyCell => self.copy_cell(),
                    Message::CopyRow => self.copy_row(),
                    Message::Help => self.show_help(),
                    Message::Exit => self.clear_search(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    Message::RawKey(_) => (),
                },
                Modus::POPUP => match msg {
                    Message::Quit => self.quit(),
                    Message::Exit | Message::Help => self.close_popup(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
                Modus::CMDINPUT => {
                    if let Message::RawKey(key) = msg {
                        self.raw_input(key)?;
                    }
                }
            }
        }

        self.last_update = Instant::now();
        Ok(())
    }

    // ---------------------- view bookkeeping ---------------------- //

    // Recomputes the page from the store snapshot and the query, keeps
    // page index and cursers inside the shrunken bounds.
    fn refresh(&mut self) {
        let mut view = compute_view(self.rows.rows(), &self.query);
        let npages = std::cmp::max(1, view.total_count.div_ceil(self.query.page_size));
        if self.query.page_index >= npages {
            self.query.page_index = npages - 1;
            view = compute_view(self.rows.rows(), &self.query);
        }
        self.page = view;

        if self.curser_row >= self.page.items.len() {
            self.curser_row = self.page.items.len().saturating_sub(1);
        }
        let nvisible = self.registry.visible_keys().len();
        if self.curser_column >= nvisible {
            self.curser_column = nvisible.saturating_sub(1);
        }
        self.update_uidata();
    }

    fn update_uidata(&mut self) {
        let visible: Vec<&ColumnDef> = self
            .registry
            .columns()
            .iter()
            .filter(|c| c.visible)
            .collect();

        let mut table = Vec::with_capacity(visible.len());
        for def in &visible {
            let data: Vec<String> = self
                .page
                .items
                .iter()
                .map(|row| Self::cell_display(row.get(&def.key)))
                .collect();
            let content_width = data
                .iter()
                .map(|s| s.chars().count())
                .max()
                .unwrap_or(0)
                .max(def.label.chars().count());
            table.push(ColumnView {
                name: def.label.clone(),
                width: std::cmp::min(
                    content_width + COLUMN_WIDTH_MARGIN,
                    self.config.max_column_width,
                ),
                data,
            });
        }

        let begin = self.query.page_index * self.query.page_size;
        let index_data: Vec<String> = (0..self.page.items.len())
            .map(|i| (begin + i + 1).to_string())
            .collect();
        let index_width = index_data.last().map(|s| s.len()).unwrap_or(3);
        let index = ColumnView {
            name: "".to_string(),
            width: index_width,
            data: index_data,
        };

        self.uilayout = UILayout::from_values(index.width, self.uilayout.width, self.uilayout.height);

        let npages = std::cmp::max(1, self.page.total_count.div_ceil(self.query.page_size));
        let mut name = format!(
            "tde [{} rows] page {}/{}",
            self.page.total_count,
            self.query.page_index + 1,
            npages
        );
        if let Some(key) = &self.query.sort_key {
            let direction = match self.query.sort_direction {
                SortDirection::Ascending => "asc",
                SortDirection::Descending => "desc",
            };
            name.push_str(&format!(" sort {} {}", key, direction));
        }
        if !self.query.search_text.is_empty() {
            name.push_str(&format!(" filter \"{}\"", self.query.search_text));
        }

        self.uidata = UIData {
            name,
            table,
            index,
            nrows: self.page.total_count,
            selected_row: self.curser_row,
            selected_column: self.curser_column,
            abs_selected_row: begin + self.curser_row,
            show_popup: self.uidata.show_popup,
            popup_message: self.uidata.popup_message.clone(),
            layout: self.uilayout.clone(),
            last_update: Instant::now(),
            cmdinput: self.last_input.clone(),
            cmd_mode: self.cmd_mode,
            active_cmdinput: self.active_cmdinput,
            status_message: self.status_message.clone(),
            last_status_message_update: self.last_status_message_update,
        };
    }

    fn cell_display(value: Option<&Value>) -> String {
        match value {
            Some(v) => v.to_string().replace("\r\n", " ↵ ").replace('\n', " ↵ "),
            None => String::from("∅"),
        }
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.last_status_message_update = Instant::now();
        self.uidata.status_message = self.status_message.clone();
        self.uidata.last_status_message_update = self.last_status_message_update;
        self.uidata.last_update = Instant::now();
    }

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.uilayout.width, width, self.uilayout.height, height
        );
        self.uilayout = UILayout::from_values(self.uidata.index.width, width, height);
        self.input.set_width(self.uilayout.statusline_width);
        self.refresh();
    }

    // ----------------------- selection state ---------------------- //

    fn current_key(&self) -> Option<String> {
        self.registry.visible_keys().get(self.curser_column).cloned()
    }

    fn current_row(&self) -> Option<&Row> {
        self.page.items.get(self.curser_row)
    }

    fn current_cell_text(&self) -> Option<String> {
        let key = self.current_key()?;
        let row = self.current_row()?;
        Some(row.get(&key).map(|v| v.to_string()).unwrap_or_default())
    }

    fn move_selection_up(&mut self) {
        if self.curser_row > 0 {
            self.curser_row -= 1;
            self.update_uidata();
        } else if self.query.page_index > 0 {
            self.query.page_index -= 1;
            self.refresh();
            self.curser_row = self.page.items.len().saturating_sub(1);
            self.update_uidata();
        }
    }

    fn move_selection_down(&mut self) {
        if self.curser_row + 1 < self.page.items.len() {
            self.curser_row += 1;
            self.update_uidata();
        } else if (self.query.page_index + 1) * self.query.page_size < self.page.total_count {
            self.query.page_index += 1;
            self.curser_row = 0;
            self.refresh();
        }
    }

    fn move_selection_left(&mut self) {
        self.curser_column = self.curser_column.saturating_sub(1);
        self.update_uidata();
    }

    fn move_selection_right(&mut self) {
        if self.curser_column + 1 < self.registry.visible_keys().len() {
            self.curser_column += 1;
            self.update_uidata();
        }
    }

    fn move_selection_beginning(&mut self) {
        self.curser_row = 0;
        self.update_uidata();
    }

    fn move_selection_end(&mut self) {
        self.curser_row = self.page.items.len().saturating_sub(1);
        self.update_uidata();
    }

    fn page_next(&mut self) {
        self.query.page_index += 1;
        // refresh clamps back when we ran past the last page
        self.refresh();
    }

    fn page_prev(&mut self) {
        self.query.page_index = self.query.page_index.saturating_sub(1);
        self.refresh();
    }

    // Same column and direction again clears the sort.
    fn sort_current(&mut self, direction: SortDirection) {
        let Some(key) = self.current_key() else {
            return;
        };
        if self.query.sort_key.as_deref() == Some(key.as_str())
            && self.query.sort_direction == direction
        {
            self.query.sort_key = None;
            self.set_status_message("Sort cleared");
        } else {
            let label = match direction {
                SortDirection::Ascending => "ascending",
                SortDirection::Descending => "descending",
            };
            self.set_status_message(format!("Sorted by {} {}", key, label));
            self.query.sort_key = Some(key);
            self.query.sort_direction = direction;
        }
        self.refresh();
    }

    fn clear_search(&mut self) {
        if !self.query.search_text.is_empty() {
            self.query.search_text.clear();
            self.query.page_index = 0;
            self.set_status_message("Search cleared");
            self.refresh();
        }
    }

    // ------------------------ data mutation ----------------------- //

    fn add_row(&mut self) -> Result<(), TdeError> {
        let mut row = Row::new(synthesize_id(self.rows.rows().len()), "", "");
        row.set("age", Value::Int(0));
        row.set("role", Value::from("Viewer"));
        let id = row.id().to_string();

        let mut rows = self.rows.rows().to_vec();
        rows.push(row);
        self.rows.replace_all(rows)?;
        self.set_status_message(format!("Added row {}", id));
        self.refresh();
        Ok(())
    }

    fn delete_row(&mut self) -> Result<(), TdeError> {
        let Some(id) = self.current_row().map(|r| r.id().to_string()) else {
            return Ok(());
        };
        self.rows.delete(&id)?;
        self.set_status_message(format!("Deleted row {}", id));
        self.refresh();
        Ok(())
    }

    fn start_edit(&mut self) {
        let Some(text) = self.current_cell_text() else {
            return;
        };
        self.enter_cmd_mode(CMDMode::EditCell);
        self.input.set(&text);
        self.last_input = self.input.get();
        self.uidata.cmdinput = self.last_input.clone();
    }

    // A numeric cell only accepts numeric replacements, everything else
    // becomes a string verbatim.
    fn apply_edit(&mut self, input: &str) -> Result<(), TdeError> {
        let Some(key) = self.current_key() else {
            return Ok(());
        };
        let Some(row) = self.current_row() else {
            return Ok(());
        };
        let mut row = row.clone();

        let value = match row.get(&key) {
            Some(v) if v.is_numeric() => parse_numeric(input)
                .ok_or_else(|| TdeError::InvalidEdit(format!("\"{}\" is not a number", input)))?,
            _ => Value::Str(input.to_string()),
        };
        row.set(key.clone(), value);
        self.rows.update(row)?;
        self.set_status_message(format!("Updated {}", key));
        self.refresh();
        Ok(())
    }

    fn hide_current_column(&mut self) -> Result<(), TdeError> {
        let Some(key) = self.current_key() else {
            return Ok(());
        };
        self.registry.toggle_visibility(&key)?;
        self.set_status_message(format!("Hid column {}", key));
        self.refresh();
        Ok(())
    }

    fn add_column(&mut self, input: &str) -> Result<(), TdeError> {
        let (key, label) = match input.split_once(',') {
            Some((key, label)) => (key.trim().to_string(), label.trim().to_string()),
            None => (input.trim().to_string(), capitalize(input.trim())),
        };
        if key.is_empty() {
            self.set_status_message("Column key missing");
            return Ok(());
        }
        self.registry.add(ColumnDef::new(key.clone(), label))?;
        self.set_status_message(format!("Added column {}", key));
        self.refresh();
        Ok(())
    }

    // Swaps the current column with its registry neighbour. A hidden
    // neighbour swallows one press without a visible change.
    fn move_column(&mut self, step: i64) -> Result<(), TdeError> {
        let Some(key) = self.current_key() else {
            return Ok(());
        };
        let mut order = self.registry.columns().to_vec();
        let Some(pos) = order.iter().position(|c| c.key == key) else {
            return Ok(());
        };
        let target = if step < 0 {
            pos.checked_sub(1)
        } else if pos + 1 < order.len() {
            Some(pos + 1)
        } else {
            None
        };
        let Some(target) = target else {
            return Ok(());
        };
        order.swap(pos, target);
        self.registry.reorder(order)?;

        if let Some(new_pos) = self.registry.visible_keys().iter().position(|k| *k == key) {
            self.curser_column = new_pos;
        }
        self.refresh();
        Ok(())
    }

    // ------------------------ file boundary ----------------------- //

    pub fn import_csv(&mut self, path: &str) -> Result<(), TdeError> {
        let expanded = match shellexpand::full(path) {
            Ok(p) => p.into_owned(),
            Err(e) => {
                self.set_status_message(format!("Bad path: {}", e));
                return Ok(());
            }
        };
        let text = match fs::read_to_string(&expanded) {
            Ok(text) => text,
            Err(e) => {
                self.set_status_message(format!("Import failed: {}", e));
                return Ok(());
            }
        };

        let outcome = csv::parse(&text);
        for problem in &outcome.errors {
            warn!("{}: {}", expanded, problem);
        }
        let nrows = outcome.rows.len();
        let nproblems = outcome.errors.len();

        // Register columns the import brought along so they show up
        let mut keys: Vec<String> = outcome
            .rows
            .iter()
            .flat_map(|row| row.keys().cloned())
            .collect();
        keys.sort();
        keys.dedup();
        for key in keys {
            self.registry.add(ColumnDef::new(key.clone(), capitalize(&key)))?;
        }

        self.rows.replace_all(outcome.rows)?;
        self.query.page_index = 0;
        info!("Imported {} rows ({} problems) from {}", nrows, nproblems, expanded);
        if nproblems == 0 {
            self.set_status_message(format!("Imported {} rows", nrows));
        } else {
            self.set_status_message(format!(
                "Imported {} rows, {} problems (see log)",
                nrows, nproblems
            ));
        }
        self.refresh();
        Ok(())
    }

    pub fn export_csv(&mut self, path: &str) -> Result<(), TdeError> {
        let path = if path.trim().is_empty() {
            "export.csv"
        } else {
            path.trim()
        };
        let expanded = match shellexpand::full(path) {
            Ok(p) => p.into_owned(),
            Err(e) => {
                self.set_status_message(format!("Bad path: {}", e));
                return Ok(());
            }
        };
        let text = csv::serialize(self.rows.rows(), &self.registry.visible_keys());
        match fs::write(&expanded, text) {
            Ok(_) => {
                info!("Exported {} rows to {}", self.rows.rows().len(), expanded);
                self.set_status_message(format!("Exported to {}", expanded));
            }
            Err(e) => self.set_status_message(format!("Export failed: {}", e)),
        }
        Ok(())
    }

    fn poll_seed(&mut self) -> Result<(), TdeError> {
        let Some(rx) = &self.seed_rx else {
            return Ok(());
        };
        match rx.try_recv() {
            Ok(rows) => {
                let nrows = rows.len();
                self.rows.replace_all(rows)?;
                self.seed_rx = None;
                self.set_status_message(format!("Seeded {} rows", nrows));
                self.refresh();
            }
            Err(mpsc::TryRecvError::Empty) => {}
            Err(mpsc::TryRecvError::Disconnected) => {
                self.seed_rx = None;
                self.set_status_message("Seed fetch failed (see log)");
            }
        }
        Ok(())
    }

    // ------------------------- clipboard -------------------------- //

    fn copy_cell(&mut self) {
        let Some(text) = self.current_cell_text() else {
            return;
        };
        self.copy_to_clipboard(text);
    }

    // The row goes out as one CSV line of the visible columns.
    fn copy_row(&mut self) {
        let Some(row) = self.current_row() else {
            return;
        };
        let line: Vec<String> = self
            .registry
            .visible_keys()
            .iter()
            .map(|key| {
                let value = row.get(key).map(|v| v.to_string()).unwrap_or_default();
                csv::escape_field(&value)
            })
            .collect();
        self.copy_to_clipboard(line.join(","));
    }

    fn copy_to_clipboard(&mut self, text: String) {
        match self.clipboard.as_mut() {
            Some(clipboard) => match clipboard.set_text(text) {
                Ok(_) => self.set_status_message("Copied"),
                Err(e) => {
                    trace!("Error copying to clipboard: {:?}", e);
                    self.set_status_message("Copy failed");
                }
            },
            None => self.set_status_message("Clipboard unavailable"),
        }
    }

    // ----------------------- modus handling ----------------------- //

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
        self.uidata.popup_message = HELP_TEXT.to_string();
        self.uidata.show_popup = true;
        self.uidata.last_update = Instant::now();
    }

    fn close_popup(&mut self) {
        self.modus = self.previous_modus;
        self.previous_modus = Modus::POPUP;
        self.uidata.show_popup = false;
        self.uidata.last_update = Instant::now();
    }

    fn enter_cmd_mode(&mut self, mode: CMDMode) {
        trace!("Entering command mode {:?} ...", mode);
        self.previous_modus = self.modus;
        self.modus = Modus::CMDINPUT;
        self.cmd_mode = Some(mode);

        self.active_cmdinput = true;
        self.input.clear();
        self.last_input = self.input.get();

        self.uidata.cmdinput = self.last_input.clone();
        self.uidata.cmd_mode = self.cmd_mode;
        self.uidata.active_cmdinput = self.active_cmdinput;
        self.uidata.last_update = Instant::now();
    }

    fn leave_cmd_mode(&mut self) {
        self.active_cmdinput = false;
        self.modus = self.previous_modus;
        self.previous_modus = Modus::CMDINPUT;
        self.cmd_mode = None;

        self.uidata.active_cmdinput = self.active_cmdinput;
        self.uidata.cmd_mode = self.cmd_mode;
        self.uidata.last_update = Instant::now();
    }

    fn raw_input(&mut self, key: KeyEvent) -> Result<(), TdeError> {
        if self.active_cmdinput {
            self.last_input = self.input.read(key);
            if self.last_input.finished {
                if self.last_input.canceled {
                    self.leave_cmd_mode();
                } else {
                    self.handle_cmd_input()?;
                }
            }
            self.uidata.cmdinput = self.last_input.clone();
            self.uidata.cmd_mode = self.cmd_mode;
            self.uidata.active_cmdinput = self.active_cmdinput;
            self.uidata.last_update = Instant::now();
        }
        Ok(())
    }

    fn handle_cmd_input(&mut self) -> Result<(), TdeError> {
        trace!("Handle cmd input {}", self.last_input.input);
        let cmd_input = self.last_input.input.clone();
        let mode = self.cmd_mode;
        self.leave_cmd_mode();

        match mode {
            Some(CMDMode::SearchTable) => {
                self.query.search_text = cmd_input;
                self.query.page_index = 0;
                self.refresh();
                self.set_status_message(format!("Found {} matches", self.page.total_count));
            }
            Some(CMDMode::EditCell) => match self.apply_edit(&cmd_input) {
                Ok(_) => {}
                Err(TdeError::InvalidEdit(reason)) => {
                    // Keep the prompt open with the rejected input
                    self.set_status_message(reason);
                    self.enter_cmd_mode(CMDMode::EditCell);
                    self.input.set(&cmd_input);
                    self.last_input = self.input.get();
                }
                Err(e) => return Err(e),
            },
            Some(CMDMode::AddColumn) => self.add_column(&cmd_input)?,
            Some(CMDMode::ToggleColumn) => {
                let key = cmd_input.trim();
                if !key.is_empty() {
                    self.registry.toggle_visibility(key)?;
                    self.set_status_message(format!("Toggled column {}", key));
                    self.refresh();
                }
            }
            Some(CMDMode::ImportPath) => self.import_csv(&cmd_input)?,
            Some(CMDMode::ExportPath) => self.export_csv(&cmd_input)?,
            None => {
                info!("Cmd mode is none!");
            }
        }
        Ok(())
    }
}

fn parse_numeric(input: &str) -> Option<Value> {
    let trimmed = input.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return Some(Value::Int(i));
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .map(Value::Num)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::MemStore;
    use ratatui::crossterm::event::KeyCode;

    fn test_model(config: &TdeConfig) -> Model {
        Model::init(
            config,
            Box::new(MemStore::default()),
            Box::new(MemStore::default()),
            80,
            24,
        )
        .unwrap()
    }

    fn default_model() -> Model {
        test_model(&TdeConfig::default())
    }

    fn type_line(model: &mut Model, s: &str) {
        for c in s.chars() {
            model
                .update(Some(Message::RawKey(KeyEvent::from(KeyCode::Char(c)))))
                .unwrap();
        }
    }

    fn press_enter(model: &mut Model) {
        model
            .update(Some(Message::RawKey(KeyEvent::from(KeyCode::Enter))))
            .unwrap();
    }

    #[test]
    fn init_shows_the_default_snapshot() {
        let model = default_model();
        let uidata = model.get_uidata();
        assert_eq!(uidata.nrows, 3);
        assert!(uidata.name.contains("page 1/1"));
        assert_eq!(uidata.table.len(), 5);
        assert_eq!(uidata.table[1].name, "Name");
        assert_eq!(uidata.table[1].data[0], "Alice Johnson");
    }

    #[test]
    fn add_row_appends_with_defaults() {
        let mut model = default_model();
        model.update(Some(Message::AddRow)).unwrap();
        assert_eq!(model.rows.rows().len(), 4);
        let added = model.rows.rows().last().unwrap();
        assert_eq!(added.get("role"), Some(&Value::from("Viewer")));
        assert_eq!(added.get("age"), Some(&Value::Int(0)));
        assert!(!added.id().is_empty());
    }

    #[test]
    fn delete_row_removes_the_row_under_the_curser() {
        let mut model = default_model();
        model.update(Some(Message::MoveDown)).unwrap();
        model.update(Some(Message::DeleteRow)).unwrap();
        let ids: Vec<&str> = model.rows.rows().iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[test]
    fn sort_cycles_through_asc_desc_clear() {
        let mut model = default_model();
        // Curser starts on the id column
        model.update(Some(Message::SortAscending)).unwrap();
        assert_eq!(model.query.sort_key.as_deref(), Some("id"));
        assert_eq!(model.query.sort_direction, SortDirection::Ascending);

        model.update(Some(Message::SortDescending)).unwrap();
        assert_eq!(model.query.sort_direction, SortDirection::Descending);

        model.update(Some(Message::SortDescending)).unwrap();
        assert_eq!(model.query.sort_key, None);
    }

    #[test]
    fn edit_rejects_non_numeric_replacement() {
        let mut model = default_model();
        model.curser_column = 3; // age
        let err = model.apply_edit("not a number");
        assert!(matches!(err, Err(TdeError::InvalidEdit(_))));
        assert_eq!(model.rows.rows()[0].get("age"), Some(&Value::Int(34)));
    }

    #[test]
    fn edit_commits_a_numeric_replacement() {
        let mut model = default_model();
        model.curser_column = 3; // age
        model.apply_edit("52").unwrap();
        assert_eq!(model.rows.rows()[0].get("age"), Some(&Value::Int(52)));
        model.apply_edit("52.5").unwrap();
        assert_eq!(model.rows.rows()[0].get("age"), Some(&Value::Num(52.5)));
    }

    #[test]
    fn edit_string_cells_verbatim() {
        let mut model = default_model();
        model.curser_column = 1; // name
        model.apply_edit("Alicia").unwrap();
        assert_eq!(model.rows.rows()[0].get("name"), Some(&Value::from("Alicia")));
    }

    #[test]
    fn rejected_edit_keeps_the_prompt_open() {
        let mut model = default_model();
        model.curser_column = 3; // age
        model.update(Some(Message::EditCell)).unwrap();
        assert!(model.raw_keyevents());
        // Wipe the prefilled value, type garbage
        for _ in 0..2 {
            model
                .update(Some(Message::RawKey(KeyEvent::from(KeyCode::Backspace))))
                .unwrap();
        }
        type_line(&mut model, "xy");
        press_enter(&mut model);
        assert!(model.raw_keyevents());
        assert_eq!(model.get_uidata().cmdinput.input, "xy");
        assert_eq!(model.rows.rows()[0].get("age"), Some(&Value::Int(34)));
    }

    #[test]
    fn search_via_prompt_filters_the_view() {
        let mut model = default_model();
        model.update(Some(Message::Search)).unwrap();
        assert!(model.raw_keyevents());
        type_line(&mut model, "bob");
        press_enter(&mut model);
        assert!(!model.raw_keyevents());
        assert_eq!(model.get_uidata().nrows, 1);
        assert_eq!(model.get_uidata().table[1].data, vec!["Bob Smith"]);
    }

    #[test]
    fn escape_cancels_a_prompt_without_effect() {
        let mut model = default_model();
        model.update(Some(Message::Search)).unwrap();
        type_line(&mut model, "bob");
        model
            .update(Some(Message::RawKey(KeyEvent::from(KeyCode::Esc))))
            .unwrap();
        assert!(!model.raw_keyevents());
        assert_eq!(model.get_uidata().nrows, 3);
    }

    #[test]
    fn exit_clears_an_active_search() {
        let mut model = default_model();
        model.update(Some(Message::Search)).unwrap();
        type_line(&mut model, "bob");
        press_enter(&mut model);
        assert_eq!(model.get_uidata().nrows, 1);
        model.update(Some(Message::Exit)).unwrap();
        assert_eq!(model.get_uidata().nrows, 3);
    }

    #[test]
    fn pagination_moves_and_clamps() {
        let config = TdeConfig::default().page_size(2);
        let mut model = test_model(&config);
        assert!(model.get_uidata().name.contains("page 1/2"));
        model.update(Some(Message::PageNext)).unwrap();
        assert_eq!(model.get_uidata().table[0].data.len(), 1);
        // Past the end stays on the last page
        model.update(Some(Message::PageNext)).unwrap();
        assert!(model.get_uidata().name.contains("page 2/2"));
        model.update(Some(Message::PagePrev)).unwrap();
        assert!(model.get_uidata().name.contains("page 1/2"));
    }

    #[test]
    fn move_down_crosses_the_page_boundary() {
        let config = TdeConfig::default().page_size(2);
        let mut model = test_model(&config);
        model.update(Some(Message::MoveDown)).unwrap();
        model.update(Some(Message::MoveDown)).unwrap();
        assert!(model.get_uidata().name.contains("page 2/2"));
        assert_eq!(model.get_uidata().selected_row, 0);
        model.update(Some(Message::MoveUp)).unwrap();
        assert!(model.get_uidata().name.contains("page 1/2"));
        assert_eq!(model.get_uidata().selected_row, 1);
    }

    #[test]
    fn hide_column_shifts_the_visible_set() {
        let mut model = default_model();
        model.update(Some(Message::HideColumn)).unwrap();
        assert_eq!(
            model.registry.visible_keys(),
            vec!["name", "email", "age", "role"]
        );
        assert_eq!(model.get_uidata().table[0].name, "Name");
    }

    #[test]
    fn move_column_right_swaps_neighbours() {
        let mut model = default_model();
        model.update(Some(Message::MoveColumnRight)).unwrap();
        assert_eq!(
            model.registry.visible_keys(),
            vec!["name", "id", "email", "age", "role"]
        );
        // The curser follows the moved column
        assert_eq!(model.get_uidata().selected_column, 1);
        model.update(Some(Message::MoveColumnLeft)).unwrap();
        assert_eq!(
            model.registry.visible_keys(),
            vec!["id", "name", "email", "age", "role"]
        );
        assert_eq!(model.get_uidata().selected_column, 0);
    }

    #[test]
    fn add_column_via_prompt() {
        let mut model = default_model();
        model.update(Some(Message::AddColumn)).unwrap();
        type_line(&mut model, "city,Home City");
        press_enter(&mut model);
        let last = model.registry.columns().last().unwrap().clone();
        assert_eq!(last.key, "city");
        assert_eq!(last.label, "Home City");

        model.update(Some(Message::AddColumn)).unwrap();
        type_line(&mut model, "team");
        press_enter(&mut model);
        assert_eq!(model.registry.columns().last().unwrap().label, "Team");
    }

    #[test]
    fn import_replaces_rows_and_registers_new_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("people.csv");
        std::fs::write(&path, "name,email,city\nZoe,z@x.com,Berlin\n").unwrap();

        let mut model = default_model();
        model.import_csv(path.to_str().unwrap()).unwrap();
        assert_eq!(model.rows.rows().len(), 1);
        assert_eq!(model.rows.rows()[0].get("city"), Some(&Value::from("Berlin")));
        assert!(model.registry.columns().iter().any(|c| c.key == "city"));
    }

    #[test]
    fn import_of_a_missing_file_keeps_the_data() {
        let mut model = default_model();
        model.import_csv("/no/such/file.csv").unwrap();
        assert_eq!(model.rows.rows().len(), 3);
        assert!(model.get_uidata().status_message.contains("Import failed"));
    }

    #[test]
    fn export_writes_visible_columns_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");

        let mut model = default_model();
        model.registry.toggle_visibility("age").unwrap();
        model.export_csv(path.to_str().unwrap()).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("id,name,email,role\n"));
        assert!(text.contains("Alice Johnson"));
    }

    #[test]
    fn seed_delivery_replaces_the_rows() {
        let mut model = default_model();
        let (tx, rx) = mpsc::channel();
        model.attach_seed(rx);
        tx.send(vec![Row::new("s1", "Seeded", "s@x.com")]).unwrap();
        model.update(None).unwrap();
        assert_eq!(model.rows.rows().len(), 1);
        assert_eq!(model.rows.rows()[0].id(), "s1");
        // Later ticks no longer poll
        model.update(None).unwrap();
        assert_eq!(model.rows.rows().len(), 1);
    }

    #[test]
    fn dropped_seed_sender_is_reported_once() {
        let mut model = default_model();
        let (tx, rx) = mpsc::channel::<Vec<Row>>();
        model.attach_seed(rx);
        drop(tx);
        model.update(None).unwrap();
        assert!(model.get_uidata().status_message.contains("Seed fetch failed"));
        assert_eq!(model.rows.rows().len(), 3);
    }

    #[test]
    fn help_popup_opens_and_closes() {
        let mut model = default_model();
        model.update(Some(Message::Help)).unwrap();
        assert!(model.get_uidata().show_popup);
        // Movement is ignored while the popup is open
        model.update(Some(Message::MoveDown)).unwrap();
        assert_eq!(model.get_uidata().selected_row, 0);
        model.update(Some(Message::Exit)).unwrap();
        assert!(!model.get_uidata().show_popup);
    }

    #[test]
    fn quit_flips_the_status() {
        let mut model = default_model();
        model.update(Some(Message::Quit)).unwrap();
        assert_eq!(model.status, Status::QUITTING);
    }

    #[test]
    fn parse_numeric_accepts_ints_and_floats() {
        assert_eq!(parse_numeric("42"), Some(Value::Int(42)));
        assert_eq!(parse_numeric(" 1.5 "), Some(Value::Num(1.5)));
        assert_eq!(parse_numeric("abc"), None);
        assert_eq!(parse_numeric(""), None);
        assert_eq!(parse_numeric("NaN"), None);
    }
}
