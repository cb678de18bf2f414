//! UI rendering for the debugger.
//!
//! ```text
//! ┌ ip acc r1..r8 ───────── steps · state ┐
//! ├ code around ip ────┬ memory (8/row) ──┤
//! └ status ──────────────────── keys ─────┘
//! ```

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph, List, ListItem},
    style::{Color, Style, Modifier},
};
use crate::cpu::registers::{ACC, IP};
use super::app::DebuggerApp;

/// Bytes per memory row.
const ROW_WIDTH: usize = 8;

const KEYS: &str = " s step · r run · p pause · b break · x reset · ↑↓ scroll · q quit ";

/// Main draw function.
pub fn draw(frame: &mut Frame, app: &DebuggerApp) {
    let [regs, body, status] = Layout::vertical([
        Constraint::Length(4),
        Constraint::Min(8),
        Constraint::Length(3),
    ])
    .areas(frame.area());

    // Disassembly needs ~30 columns, a memory row is 6 + 3 * ROW_WIDTH
    let [code, memory] = Layout::horizontal([
        Constraint::Min(30),
        Constraint::Length((6 + 3 * ROW_WIDTH + 2) as u16),
    ])
    .areas(body);

    draw_registers(frame, regs, app);
    draw_disassembly(frame, code, app);
    draw_memory(frame, memory, app);
    draw_status(frame, status, app);
}

fn panel(title: String, color: Color) -> Block<'static> {
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color))
}

fn dim_if_zero(value: u16) -> Style {
    if value == 0 {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().fg(Color::White)
    }
}

/// `ip` and `acc` on the first row, the general registers on the second.
fn draw_registers(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let cell = |name: &str, value: u16, name_style: Style| {
        [
            Span::styled(format!("{}=", name), name_style),
            Span::styled(format!("{:04X}  ", value), dim_if_zero(value)),
        ]
    };

    let mut special = Vec::new();
    let mut general = Vec::new();
    for reg in app.cpu.dump_registers() {
        if reg.name == IP || reg.name == ACC {
            special.extend(cell(reg.name, reg.value, Style::default().fg(Color::Yellow)));
        } else {
            general.extend(cell(reg.name, reg.value, Style::default().fg(Color::Green)));
        }
    }

    let state = if app.finished() {
        "finished"
    } else if app.running {
        "running"
    } else {
        "stopped"
    };
    let title = format!(" Registers · {} steps · {} ", app.cpu.steps, state);

    let paragraph = Paragraph::new(vec![Line::from(special), Line::from(general)])
        .block(panel(title, Color::Green));

    frame.render_widget(paragraph, area);
}

fn draw_disassembly(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let rows = (area.height as usize).saturating_sub(2);

    let items: Vec<ListItem> = app
        .get_disassembly(rows)
        .into_iter()
        .map(|(addr, text, at_ip)| {
            let has_bp = app.breakpoints.contains(&addr);
            let marker = match (at_ip, has_bp) {
                (true, true) => "●▶",
                (true, false) => " ▶",
                (false, true) => "● ",
                (false, false) => "  ",
            };

            let style = if at_ip {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else if has_bp {
                Style::default().fg(Color::Red)
            } else {
                Style::default()
            };

            ListItem::new(format!("{} {:04X}  {}", marker, addr, text)).style(style)
        })
        .collect();

    frame.render_widget(List::new(items).block(panel(" Code ".into(), Color::Cyan)), area);
}

/// Hex rows starting at the scroll offset; the byte under `ip` is highlighted.
fn draw_memory(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let rows = (area.height as usize).saturating_sub(2);
    let mem = app.cpu.memory();
    let ip = app.cpu.ip() as usize;

    let items: Vec<ListItem> = (app.mem_scroll..app.mem_scroll + rows)
        .map(|row| row * ROW_WIDTH)
        .take_while(|&start| start < mem.len())
        .map(|start| {
            let mut spans = vec![Span::styled(
                format!("{:04X} ", start),
                Style::default().fg(Color::Magenta),
            )];
            spans.extend(mem.dump(start, ROW_WIDTH).iter().enumerate().map(|(i, byte)| {
                let style = if start + i == ip {
                    Style::default().fg(Color::Black).bg(Color::Yellow)
                } else {
                    dim_if_zero(*byte as u16)
                };
                Span::styled(format!("{:02X} ", byte), style)
            }));
            ListItem::new(Line::from(spans))
        })
        .collect();

    let title = format!(" Memory · {} bytes ", mem.len());
    frame.render_widget(List::new(items).block(panel(title, Color::Magenta)), area);
}

/// Last action on the left, key bindings in the border.
fn draw_status(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let block = panel(" Status ".into(), Color::DarkGray)
        .title_bottom(Line::from(KEYS).right_aligned());

    frame.render_widget(Paragraph::new(app.status.as_str()).block(block), area);
}
