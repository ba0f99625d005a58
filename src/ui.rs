use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Position, Rect};
use ratatui::style::Stylize;
use ratatui::text::{Line, Text};
use ratatui::widgets::{
    Block, Clear, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState,
};

use crate::domain::CMDMode;
use crate::model::UIData;

pub const CMDLINE_HEIGH: usize = 1;
// Title line plus the column label line
pub const TABLE_HEADER_HEIGHT: usize = 2;
pub const SCROLLBAR_WIDTH: usize = 1;
pub const COLUMN_WIDTH_MARGIN: usize = 1;

// Renders one frame from the UIData snapshot. The model owns all
// state, nothing here mutates.
pub fn draw(uidata: &UIData, frame: &mut Frame) {
    let area = frame.area();
    let [title_area, label_area, table_area, status_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(CMDLINE_HEIGH as u16),
    ])
    .areas(area);

    frame.render_widget(
        Paragraph::new(Line::from(uidata.name.clone().bold())),
        title_area,
    );

    let body_width = area.width.saturating_sub(SCROLLBAR_WIDTH as u16);
    draw_labels(uidata, frame, Rect { width: body_width, ..label_area });
    draw_columns(uidata, frame, Rect { width: body_width, ..table_area });
    draw_scrollbar(uidata, frame, table_area);
    draw_statusline(uidata, frame, status_area);

    if uidata.show_popup {
        draw_popup(uidata, frame, area);
    }
}

// Index column first, one chunk per visible column, filler at the end.
fn column_chunks(uidata: &UIData, area: Rect) -> Vec<Rect> {
    let mut constraints = vec![Constraint::Length(uidata.index.width as u16 + 1)];
    for column in &uidata.table {
        constraints.push(Constraint::Length(column.width as u16 + 1));
    }
    constraints.push(Constraint::Min(0));
    Layout::horizontal(constraints).split(area).to_vec()
}

fn draw_labels(uidata: &UIData, frame: &mut Frame, area: Rect) {
    let chunks = column_chunks(uidata, area);
    for (cidx, column) in uidata.table.iter().enumerate() {
        let label = if cidx == uidata.selected_column {
            Line::from(column.name.clone().bold().underlined())
        } else {
            Line::from(column.name.clone().bold())
        };
        frame.render_widget(Paragraph::new(label), chunks[cidx + 1]);
    }
}

fn draw_columns(uidata: &UIData, frame: &mut Frame, area: Rect) {
    let chunks = column_chunks(uidata, area);

    let index_lines: Vec<Line> = uidata
        .index
        .data
        .iter()
        .map(|s| Line::from(s.clone().dim()))
        .collect();
    frame.render_widget(Paragraph::new(Text::from(index_lines)), chunks[0]);

    for (cidx, column) in uidata.table.iter().enumerate() {
        let lines: Vec<Line> = column
            .data
            .iter()
            .enumerate()
            .map(|(ridx, cell)| {
                if ridx == uidata.selected_row && cidx == uidata.selected_column {
                    Line::from(cell.clone().reversed())
                } else {
                    Line::from(cell.clone())
                }
            })
            .collect();
        frame.render_widget(Paragraph::new(Text::from(lines)), chunks[cidx + 1]);
    }
}

fn draw_scrollbar(uidata: &UIData, frame: &mut Frame, table_area: Rect) {
    if uidata.nrows == 0 {
        return;
    }
    let area = Rect {
        x: table_area.right().saturating_sub(SCROLLBAR_WIDTH as u16),
        y: table_area.y,
        width: SCROLLBAR_WIDTH as u16,
        height: table_area.height,
    };
    let mut state = ScrollbarState::new(uidata.nrows).position(uidata.abs_selected_row);
    frame.render_stateful_widget(
        Scrollbar::new(ScrollbarOrientation::VerticalRight),
        area,
        &mut state,
    );
}

fn draw_statusline(uidata: &UIData, frame: &mut Frame, area: Rect) {
    if uidata.active_cmdinput {
        let prefix = prompt(uidata.cmd_mode);
        let line = format!("{}{}", prefix, uidata.cmdinput.input);
        frame.render_widget(Paragraph::new(Line::from(line)), area);
        let x = area.x + (prefix.chars().count() + uidata.cmdinput.curser_pos) as u16;
        frame.set_cursor_position(Position::new(x.min(area.right().saturating_sub(1)), area.y));
    } else {
        frame.render_widget(
            Paragraph::new(Line::from(uidata.status_message.clone().dim())),
            area,
        );
    }
}

fn draw_popup(uidata: &UIData, frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(70, 80, area);
    frame.render_widget(Clear, popup_area);
    frame.render_widget(
        Paragraph::new(uidata.popup_message.clone())
            .block(Block::bordered().title(" tde ".bold())),
        popup_area,
    );
}

pub fn prompt(mode: Option<CMDMode>) -> &'static str {
    match mode {
        Some(CMDMode::SearchTable) => "/",
        Some(CMDMode::EditCell) => "edit: ",
        Some(CMDMode::AddColumn) => "add column (key[,label]): ",
        Some(CMDMode::ToggleColumn) => "toggle column: ",
        Some(CMDMode::ImportPath) => "import file: ",
        Some(CMDMode::ExportPath) => "export file: ",
        None => "",
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let [_, mid, _] = Layout::vertical([
        Constraint::Percentage((100 - percent_y) / 2),
        Constraint::Percentage(percent_y),
        Constraint::Percentage((100 - percent_y) / 2),
    ])
    .areas(area);
    let [_, rect, _] = Layout::horizontal([
        Constraint::Percentage((100 - percent_x) / 2),
        Constraint::Percentage(percent_x),
        Constraint::Percentage((100 - percent_x) / 2),
    ])
    .areas(mid);
    rect
}
