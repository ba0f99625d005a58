use std::time::Duration;

use ratatui::crossterm::event::{self, Event, KeyCode};
use tracing::trace;

use crate::domain::{Message, TdeConfig, TdeError};
use crate::model::Model;

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(cfg: &TdeConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
        }
    }

    // While a prompt is active keys go to the model untranslated, the
    // line editor needs the raw events.
    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, TdeError> {
        if event::poll(Duration::from_millis(self.event_poll_time))? {
            match event::read()? {
                Event::Key(key) if key.kind == event::KeyEventKind::Press => {
                    if model.raw_keyevents() {
                        return Ok(Some(Message::RawKey(key)));
                    }
                    return Ok(self.handle_key(key));
                }
                Event::Resize(width, height) => {
                    return Ok(Some(Message::Resize(width as usize, height as usize)));
                }
                _ => {}
            }
        }
        Ok(None)
    }

    // Uppercase letters arrive as Char with SHIFT set, matching on the
    // code alone covers both.
    fn handle_key(&self, key: event::KeyEvent) -> Option<Message> {
        let message = match key.code {
            KeyCode::Char('q') => Some(Message::Quit),
            KeyCode::Char('h') | KeyCode::Left => Some(Message::MoveLeft),
            KeyCode::Char('j') | KeyCode::Down => Some(Message::MoveDown),
            KeyCode::Char('k') | KeyCode::Up => Some(Message::MoveUp),
            KeyCode::Char('l') | KeyCode::Right => Some(Message::MoveRight),
            KeyCode::Char('g') => Some(Message::MoveBeginning),
            KeyCode::Char('G') => Some(Message::MoveEnd),
            KeyCode::Char('[') => Some(Message::PagePrev),
            KeyCode::Char(']') => Some(Message::PageNext),
            KeyCode::Char('s') => Some(Message::SortAscending),
            KeyCode::Char('S') => Some(Message::SortDescending),
            KeyCode::Char('/') => Some(Message::Search),
            KeyCode::Char('e') | KeyCode::Enter => Some(Message::EditCell),
            KeyCode::Char('a') => Some(Message::AddRow),
            KeyCode::Char('d') => Some(Message::DeleteRow),
            KeyCode::Char('C') => Some(Message::AddColumn),
            KeyCode::Char('v') => Some(Message::HideColumn),
            KeyCode::Char('V') => Some(Message::ToggleColumn),
            KeyCode::Char('<') => Some(Message::MoveColumnLeft),
            KeyCode::Char('>') => Some(Message::MoveColumnRight),
            KeyCode::Char('i') => Some(Message::ImportCsv),
            KeyCode::Char('x') => Some(Message::ExportCsv),
            KeyCode::Char('y') => Some(Message::CopyCell),
            KeyCode::Char('Y') => Some(Message::CopyRow),
            KeyCode::Char('?') => Some(Message::Help),
            KeyCode::Esc => Some(Message::Exit),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}
