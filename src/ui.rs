/*
 * This file is part of Legionfan.
 *
 * Copyright (C) 2025 Legionfan contributors
 *
 * Legionfan is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Legionfan is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Legionfan. If not, see <https://www.gnu.org/licenses/>.
 */

use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::prelude::*;
use ratatui::widgets::{Block, BorderType, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};

use crate::app::{App, PARAM_ITEMS, SETTING_ITEMS};
use crate::curves::{CurveKind, CurvePoint, MAX_TEMP, MIN_RPM, MIN_TEMP};
use crate::editor::Viewport;

/// Terminal cells are coarse, so hits and drags use cell-sized tolerances.
const CELL_HIT_RADIUS: f64 = 2.0;
const CELL_DRAG_THRESHOLD: f64 = 1.0;

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

struct Areas {
    header: Rect,
    graph: Rect,
    side: Rect,
    status: Rect,
}

fn areas(size: Rect) -> Areas {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(8), Constraint::Length(3)])
        .split(size);
    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(68), Constraint::Percentage(32)])
        .split(rows[1]);
    Areas {
        header: rows[0],
        graph: body[0],
        side: body[1],
        status: rows[2],
    }
}

fn graph_block(kind: CurveKind) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .title(format!(" {} curve (Tab to switch) ", kind.label()))
}

/// Cell grid of the curve chart for a given terminal size. Shared with the
/// mouse handling so clicks land on the points as drawn.
pub fn chart_viewport(screen: Rect, max_rpm: i32) -> Viewport {
    let inner = graph_block(CurveKind::Cpu).inner(areas(screen).graph);
    let mut vp = Viewport::new(
        inner.x as f64,
        inner.y as f64,
        inner.width.saturating_sub(1).max(1) as f64,
        inner.height.saturating_sub(1).max(1) as f64,
        max_rpm,
    );
    vp.hit_radius = CELL_HIT_RADIUS;
    vp.drag_threshold = CELL_DRAG_THRESHOLD;
    vp
}

fn cell_of(vp: &Viewport, point: CurvePoint) -> (usize, usize) {
    let (x, y) = vp.to_screen(point);
    (
        (x - vp.left).round().max(0.0) as usize,
        (y - vp.top).round().max(0.0) as usize,
    )
}

fn draw_graph(f: &mut Frame, app: &App, area: Rect) {
    let block = graph_block(app.curve);
    let inner = block.inner(area);
    f.render_widget(block, area);
    let cols = inner.width as usize;
    let rows = inner.height as usize;
    if cols < 4 || rows < 3 {
        return;
    }
    let vp = chart_viewport(f.area(), app.max_rpm());
    let blank = (' ', Style::default());
    let mut grid = vec![vec![blank; cols]; rows];

    // stepped level lines, inactive curve first so the active one wins
    for (kind, style) in [
        (app.curve.other(), Style::default().fg(Color::DarkGray)),
        (app.curve, Style::default().fg(Color::Cyan)),
    ] {
        let ch = if kind == app.curve { '━' } else { '·' };
        for x in 0..cols {
            let (temp, _) = vp.to_value(vp.left + x as f64, vp.top);
            let temp = temp.clamp(MIN_TEMP, MAX_TEMP);
            let rpm = app.profile.target_rpm(kind, temp);
            let (_, y) = cell_of(&vp, CurvePoint::new(temp, rpm));
            if let Some(cell) = grid.get_mut(y).and_then(|r| r.get_mut(x)) {
                *cell = (ch, style);
            }
        }
    }

    // live temperature of the edited curve's sensor
    if let Some(r) = app.readings {
        let temp = match app.curve {
            CurveKind::Cpu => r.cpu_temp,
            CurveKind::Gpu => r.gpu_temp,
        };
        if (MIN_TEMP..=MAX_TEMP).contains(&temp) {
            let (x, _) = cell_of(&vp, CurvePoint::new(temp, MIN_RPM));
            for row in grid.iter_mut() {
                if let Some(cell) = row.get_mut(x) {
                    if cell.0 == ' ' {
                        *cell = ('┊', Style::default().fg(Color::Red));
                    }
                }
            }
        }
    }

    for (i, p) in app.profile.points(app.curve).into_iter().enumerate() {
        let (x, y) = cell_of(&vp, p);
        let style = if i == app.selected {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD | Modifier::REVERSED)
        } else {
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
        };
        if let Some(cell) = grid.get_mut(y).and_then(|r| r.get_mut(x)) {
            *cell = ('●', style);
        }
    }

    let lines: Vec<Line> = grid
        .into_iter()
        .map(|row| {
            Line::from(
                row.into_iter()
                    .map(|(ch, style)| Span::styled(ch.to_string(), style))
                    .collect::<Vec<_>>(),
            )
        })
        .collect();
    f.render_widget(Paragraph::new(lines), inner);
}

fn draw_side(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(9), Constraint::Min(6)])
        .split(area);

    let mut lines: Vec<Line> = Vec::new();
    match app.readings {
        Some(r) => {
            lines.push(Line::from(format!("CPU temp:  {:>4} °C", r.cpu_temp)));
            if app.settings.show_gpu_temp {
                lines.push(Line::from(format!("GPU temp:  {:>4} °C", r.gpu_temp)));
            }
            lines.push(Line::from(format!("VRM temp:  {:>4} °C", r.vrm_temp)));
            lines.push(Line::from(format!("Fan 1:     {:>4} RPM", r.fan1_rpm)));
            lines.push(Line::from(format!("Fan 2:     {:>4} RPM", r.fan2_rpm)));
            let target = app.profile.target_rpm(CurveKind::Cpu, r.cpu_temp);
            lines.push(Line::from(format!("Target:    {:>4} RPM", target)));
        }
        None => lines.push(Line::from(Span::styled(
            "Sensors unavailable (EC access needs root)",
            Style::default().fg(Color::DarkGray),
        ))),
    }
    lines.push(Line::from(format!("Power mode: {}", app.mode.label())));
    let sensors = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).border_type(BorderType::Rounded).title(" Sensors "));
    f.render_widget(sensors, chunks[0]);

    let down = app.profile.ramp_down(app.curve);
    let mut items: Vec<ListItem> = Vec::new();
    items.push(ListItem::new(Span::styled(
        "  #   up  down    RPM",
        Style::default().fg(Color::Gray),
    )));
    for (i, (p, d)) in app.profile.points(app.curve).into_iter().zip(down).enumerate() {
        let sel = if i == app.selected { "> " } else { "  " };
        items.push(ListItem::new(format!("{}{}  {:>3}  {:>4}  {:>5}", sel, i + 1, p.temp, d, p.rpm)));
    }
    items.push(ListItem::new(""));
    items.push(ListItem::new(format!(
        "hyst {}  accel {}  decel {}  gen {}",
        app.profile.hysteresis(),
        app.profile.acceleration,
        app.profile.deceleration,
        app.profile.legion_gen
    )));
    let mut state = ListState::default();
    state.select(Some(app.selected + 1));
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).border_type(BorderType::Rounded).title(" Points "))
        .highlight_style(Style::default().fg(Color::Yellow));
    f.render_stateful_widget(list, chunks[1], &mut state);
}

pub fn ui(f: &mut Frame, app: &App) {
    let size = f.area();
    let a = areas(size);

    let mut title = format!(
        " Legionfan | {} profile | {} mode | {} points",
        app.active,
        app.mode.label(),
        app.profile.point_count()
    );
    if app.settings.lock_points {
        title.push_str(" | locked");
    }
    if app.settings.unlock_max_rpm {
        title.push_str(" | max 5000 RPM");
    }
    if app.dirty {
        title.push_str(" | * unsaved");
    }
    let header = Paragraph::new(title)
        .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .block(Block::default().borders(Borders::ALL).border_type(BorderType::Rounded));
    f.render_widget(header, a.header);

    draw_graph(f, app, a.graph);
    draw_side(f, app, a.side);

    let status = Paragraph::new(app.status.as_str())
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).border_type(BorderType::Rounded));
    f.render_widget(status, a.status);

    if app.show_point_popup {
        draw_point_popup(f, app, size);
    }
    if app.show_settings_popup {
        draw_toggle_popup(
            f,
            size,
            " Options ",
            SETTING_ITEMS
                .iter()
                .enumerate()
                .map(|(i, name)| format!("[{}] {}", if app.setting_value(i) { 'x' } else { ' ' }, name))
                .collect(),
            app.settings_idx,
            "↑/↓ select  |  Space toggle  |  Esc close",
        );
    }
    if app.show_params_popup {
        draw_toggle_popup(
            f,
            size,
            " Profile parameters ",
            PARAM_ITEMS
                .iter()
                .enumerate()
                .map(|(i, name)| format!("{: <20} {:>3}", name, app.param_value(i)))
                .collect(),
            app.params_idx,
            "↑/↓ select  |  ←/→ adjust  |  Esc close",
        );
    }
    if app.show_quit_confirm {
        draw_message(f, size, " Unsaved changes ", "s: save and quit  |  q: quit without saving  |  Esc: stay", Color::Yellow);
    }
    if app.show_first_run_popup {
        draw_message(f, size, " Warning ", app.first_run_text(), Color::Red);
    }
    if app.show_warning_popup {
        draw_message(f, size, " Notice ", &app.warning_message, Color::Yellow);
    }
}

fn draw_point_popup(f: &mut Frame, app: &App, size: Rect) {
    let area = centered_rect(40, 30, size);
    let Some(target) = app.point_target else { return };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .title(format!(" {} point {} ", target.kind.label(), target.index + 1));
    let inner = block.inner(area);
    f.render_widget(Clear, area);
    f.render_widget(block, area);

    let field = |label: &str, value: &str, active: bool, enabled: bool| {
        let style = if !enabled {
            Style::default().fg(Color::DarkGray)
        } else if active {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        Line::from(Span::styled(format!("{: <14}{}", label, value), style))
    };
    let rpm_enabled = target.kind == CurveKind::Cpu;
    let lines = vec![
        field("Temperature:", &app.point_temp_input, app.point_field == 0, true),
        field("RPM:", &app.point_rpm_input, app.point_field == 1, rpm_enabled),
        Line::from(""),
        Line::from(Span::styled(
            "Tab field  |  Enter apply  |  Esc cancel",
            Style::default().fg(Color::Gray),
        )),
    ];
    f.render_widget(Paragraph::new(lines), inner);
}

fn draw_toggle_popup(f: &mut Frame, size: Rect, title: &str, rows: Vec<String>, selected: usize, help: &str) {
    let area = centered_rect(50, 40, size);
    let block = Block::default().borders(Borders::ALL).border_type(BorderType::Rounded).title(title.to_string());
    let inner = block.inner(area);
    f.render_widget(Clear, area);
    f.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(inner);
    let items: Vec<ListItem> = rows
        .into_iter()
        .enumerate()
        .map(|(i, row)| ListItem::new(format!("{}{}", if i == selected { "> " } else { "  " }, row)))
        .collect();
    let mut state = ListState::default();
    state.select(Some(selected));
    let list = List::new(items).highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));
    f.render_stateful_widget(list, chunks[0], &mut state);
    let help = Paragraph::new(help.to_string()).alignment(Alignment::Center).style(Style::default().fg(Color::Gray));
    f.render_widget(help, chunks[1]);
}

fn draw_message(f: &mut Frame, size: Rect, title: &str, text: &str, color: Color) {
    let area = centered_rect(60, 30, size);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(color))
        .title(title.to_string());
    f.render_widget(Clear, area);
    let p = Paragraph::new(text.to_string())
        .wrap(Wrap { trim: false })
        .alignment(Alignment::Center)
        .block(block);
    f.render_widget(p, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chart_viewport_maps_corners() {
        let vp = chart_viewport(Rect::new(0, 0, 120, 40), 4400);
        let (x0, y0) = vp.to_screen(CurvePoint::new(MIN_TEMP, MIN_RPM));
        let (x1, y1) = vp.to_screen(CurvePoint::new(MAX_TEMP, 4400));
        assert!(x0 < x1);
        assert!(y0 > y1);
        // both corners lie inside the graph block
        let graph = areas(Rect::new(0, 0, 120, 40)).graph;
        assert!(x0 >= graph.x as f64 && x1 < (graph.x + graph.width) as f64);
        assert!(y1 >= graph.y as f64 && y0 < (graph.y + graph.height) as f64);
    }

    #[test]
    fn test_cell_hit_round_trip() {
        let vp = chart_viewport(Rect::new(0, 0, 120, 40), 4400);
        let profile = crate::curves::FanProfile::default();
        let p = profile.point(CurveKind::Cpu, 2).unwrap();
        let (x, y) = vp.to_screen(p);
        assert_eq!(vp.hit_test(&profile, CurveKind::Cpu, x.round(), y.round()), Some(2));
    }

    #[test]
    fn test_renders_header_and_points() {
        use crate::autostart::Autostart;
        use crate::fancontrol::MockHelperProcess;
        use crate::power::{MockPowerModeControl, PowerMode};
        use crate::profiles::ProfileStore;
        use crate::settings::MemorySettingsStore;
        use ratatui::backend::TestBackend;
        use ratatui::Terminal;

        let dir = tempfile::TempDir::new().unwrap();
        let mut power = MockPowerModeControl::new();
        power.expect_power_mode().returning(|| Ok(PowerMode::Quiet));
        let mut app = App::new(
            Box::new(MemorySettingsStore::new()),
            Box::new(power),
            None,
            Box::new(MockHelperProcess::new()),
            ProfileStore::new(dir.path()),
            Autostart::new(dir.path()),
        );
        app.show_first_run_popup = false;

        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        terminal.draw(|f| ui(f, &app)).unwrap();
        let text: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect();
        assert!(text.contains("quiet profile"));
        assert!(text.contains("Quiet mode"));
        assert_eq!(text.matches('●').count(), 5);
        assert!(text.contains("Sensors unavailable"));
    }
}
