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

//! Legionfan - fan curve editor for Legion laptops
//!
//! This library provides the curve model and file codec used by the
//! FanControl helper, the interactive point editor, and the glue to the
//! embedded controller, the ACPI power mode and the helper process.

pub mod error;
pub mod curves;
pub mod codec;
pub mod editor;
pub mod settings;
pub mod profiles;
pub mod power;
pub mod ec;
pub mod fancontrol;
pub mod autostart;
pub mod logger;
pub mod service;
pub mod cli;
pub mod app;
pub mod events;
pub mod ui;
