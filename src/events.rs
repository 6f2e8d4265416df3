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

use crossterm::event::{KeyCode, KeyEvent, MouseButton, MouseEvent, MouseEventKind};

use crate::app::{App, PARAM_ITEMS, SETTING_ITEMS};
use crate::curves::CurveKind;
use crate::profiles::Profile;

/// Main event handler that processes keyboard input. Returns true to quit.
pub fn handle_key_event(app: &mut App, key_event: KeyEvent) -> anyhow::Result<bool> {
    let KeyEvent { code, .. } = key_event;

    // Popups take every key while open
    if let Some(quit) = handle_popup_events(app, code)? {
        return Ok(quit);
    }

    handle_global_events(app, code)
}

/// `Some(quit)` when a popup consumed the key.
fn handle_popup_events(app: &mut App, code: KeyCode) -> anyhow::Result<Option<bool>> {
    if app.show_warning_popup {
        if matches!(code, KeyCode::Esc | KeyCode::Enter) {
            app.show_warning_popup = false;
            app.warning_message.clear();
        }
        return Ok(Some(false));
    }

    if app.show_first_run_popup {
        match code {
            KeyCode::Enter => app.acknowledge_first_run(),
            KeyCode::Char('q') => return Ok(Some(true)),
            _ => {}
        }
        return Ok(Some(false));
    }

    if app.show_quit_confirm {
        match code {
            KeyCode::Char('s') => {
                app.save();
                app.stop_helper();
                return Ok(Some(true));
            }
            KeyCode::Char('q') => {
                app.stop_helper();
                return Ok(Some(true));
            }
            KeyCode::Esc => app.show_quit_confirm = false,
            _ => {}
        }
        return Ok(Some(false));
    }

    if app.show_point_popup {
        handle_point_popup(app, code);
        return Ok(Some(false));
    }

    if app.show_settings_popup {
        match code {
            KeyCode::Esc | KeyCode::Char('o') => app.show_settings_popup = false,
            KeyCode::Up => app.settings_idx = app.settings_idx.saturating_sub(1),
            KeyCode::Down => {
                if app.settings_idx + 1 < SETTING_ITEMS.len() {
                    app.settings_idx += 1;
                }
            }
            KeyCode::Char(' ') | KeyCode::Enter => app.toggle_setting(app.settings_idx),
            _ => {}
        }
        return Ok(Some(false));
    }

    if app.show_params_popup {
        match code {
            KeyCode::Esc | KeyCode::Char('p') => app.show_params_popup = false,
            KeyCode::Up => app.params_idx = app.params_idx.saturating_sub(1),
            KeyCode::Down => {
                if app.params_idx + 1 < PARAM_ITEMS.len() {
                    app.params_idx += 1;
                }
            }
            KeyCode::Left | KeyCode::Char('-') => app.adjust_param(app.params_idx, -1),
            KeyCode::Right | KeyCode::Char('+') => app.adjust_param(app.params_idx, 1),
            _ => {}
        }
        return Ok(Some(false));
    }

    Ok(None)
}

/// Two numeric fields; the RPM field is skipped for GPU points.
fn handle_point_popup(app: &mut App, code: KeyCode) {
    let rpm_editable = app
        .point_target
        .map(|p| p.kind == CurveKind::Cpu)
        .unwrap_or(false);
    match code {
        KeyCode::Esc => app.close_point_popup(),
        KeyCode::Enter => app.apply_point_popup(),
        KeyCode::Tab | KeyCode::Up | KeyCode::Down => {
            if rpm_editable {
                app.point_field = 1 - app.point_field;
            }
        }
        KeyCode::Backspace => {
            active_input(app).pop();
        }
        KeyCode::Char(c) if c.is_ascii_digit() => {
            let input = active_input(app);
            if input.len() < 5 {
                input.push(c);
            }
        }
        _ => {}
    }
}

fn active_input(app: &mut App) -> &mut String {
    if app.point_field == 0 {
        &mut app.point_temp_input
    } else {
        &mut app.point_rpm_input
    }
}

fn handle_global_events(app: &mut App, code: KeyCode) -> anyhow::Result<bool> {
    match code {
        KeyCode::Char('q') | KeyCode::Esc => {
            if app.dirty {
                app.show_quit_confirm = true;
            } else {
                app.stop_helper();
                return Ok(true);
            }
        }
        KeyCode::Tab => app.toggle_curve(),
        KeyCode::Left | KeyCode::Char('[') => app.select_prev(),
        KeyCode::Right | KeyCode::Char(']') => app.select_next(),
        KeyCode::Up => app.nudge(0, 1),
        KeyCode::Down => app.nudge(0, -1),
        KeyCode::Char(',') => app.nudge(-1, 0),
        KeyCode::Char('.') => app.nudge(1, 0),
        KeyCode::Enter => app.open_point_popup(app.selected_ref()),
        KeyCode::Char('a') | KeyCode::Insert => app.insert_point(),
        KeyCode::Char('x') | KeyCode::Delete | KeyCode::Backspace => app.remove_point(),
        KeyCode::Char('e') => app.even_out(),
        KeyCode::Char('s') => app.save(),
        KeyCode::Char('l') => app.reload(),
        KeyCode::Char('r') => app.restart_helper(),
        KeyCode::Char('1') => app.select_profile(Profile::Quiet),
        KeyCode::Char('2') => app.select_profile(Profile::Balanced),
        KeyCode::Char('3') => app.select_profile(Profile::Performance),
        KeyCode::Char('o') => {
            app.settings_idx = 0;
            app.show_settings_popup = true;
        }
        KeyCode::Char('p') => {
            app.params_idx = 0;
            app.show_params_popup = true;
        }
        _ => {}
    }
    Ok(false)
}

/// Left button drives the drag session; popups swallow the mouse.
pub fn handle_mouse_event(app: &mut App, mouse: MouseEvent) {
    if app.show_point_popup
        || app.show_settings_popup
        || app.show_params_popup
        || app.show_warning_popup
        || app.show_first_run_popup
        || app.show_quit_confirm
    {
        return;
    }
    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => app.mouse_down(mouse.column, mouse.row),
        MouseEventKind::Drag(MouseButton::Left) => app.mouse_drag(mouse.column, mouse.row),
        MouseEventKind::Up(MouseButton::Left) => app.mouse_up(),
        _ => {}
    }
}
