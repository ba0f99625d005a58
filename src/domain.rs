use std::io::Error;
use std::path::PathBuf;

use derive_setters::Setters;
use ratatui::crossterm::event::KeyEvent;

// Crate wide error type. New failure sources get their own variant
// and a From impl so `?` works at the call sites.
#[derive(Debug)]
pub enum TdeError {
    IoError(Error),
    JsonError(serde_json::Error),
    FetchError(reqwest::Error),
    PersistFailed(String),
    LoadingFailed(String),
    InvalidEdit(String),
    FileNotFound,
    PermissionDenied,
}

impl From<Error> for TdeError {
    fn from(err: Error) -> Self {
        TdeError::IoError(err)
    }
}

impl From<serde_json::Error> for TdeError {
    fn from(err: serde_json::Error) -> Self {
        TdeError::JsonError(err)
    }
}

impl From<reqwest::Error> for TdeError {
    fn from(err: reqwest::Error) -> Self {
        TdeError::FetchError(err)
    }
}

// Messages the controller maps key events to. The model interprets
// them depending on its current modus.
#[derive(Debug)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    MoveBeginning,
    MoveEnd,
    PageNext,
    PagePrev,
    SortAscending,
    SortDescending,
    Search,
    EditCell,
    AddRow,
    DeleteRow,
    AddColumn,
    HideColumn,
    ToggleColumn,
    MoveColumnLeft,
    MoveColumnRight,
    ImportCsv,
    ExportCsv,
    CopyCell,
    CopyRow,
    Help,
    Exit,
    Resize(usize, usize),
    RawKey(KeyEvent),
}

// What the command line input is currently collecting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CMDMode {
    SearchTable,
    EditCell,
    AddColumn,
    ToggleColumn,
    ImportPath,
    ExportPath,
}

#[derive(Debug, Clone, Setters)]
pub struct TdeConfig {
    pub event_poll_time: u64,
    pub page_size: usize,
    pub max_column_width: usize,
    pub data_dir: PathBuf,
    pub seed_url: String,
}

impl Default for TdeConfig {
    fn default() -> Self {
        TdeConfig {
            event_poll_time: 100,
            page_size: 10,
            max_column_width: 32,
            data_dir: PathBuf::from("~/.local/share/tde"),
            seed_url: "https://jsonplaceholder.typicode.com/users".to_string(),
        }
    }
}

pub const HELP_TEXT: &str = "tde - tabular data editor

Movement
  h/j/k/l, arrows   move curser
  g / G             first / last row of page
  [ / ]             previous / next page

Data
  e, Enter          edit current cell
  a                 add row
  d                 delete current row
  s / S             sort by current column asc/desc (again to clear)
  /                 search all fields

Columns
  C                 add column (key[,label])
  v                 hide current column
  V                 toggle column by key
  < / >             move current column left / right

Files
  i                 import CSV file
  x                 export visible columns as CSV

Misc
  y / Y             copy cell / row (CSV escaped)
  ?                 this help
  Esc               close popup / clear search
  q                 quit
";
