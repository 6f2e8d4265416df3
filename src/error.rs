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

//! Error type shared by the curve model, the editor and the collaborators.
//!
//! Parse problems in curve files never show up here: the codec recovers
//! them per key. Everything else is surfaced to the caller untouched.

use std::io;
use std::path::PathBuf;

/// Result type alias using FanError
pub type Result<T> = std::result::Result<T, FanError>;

#[derive(thiserror::Error, Debug)]
pub enum FanError {
    // ============================================================================
    // I/O
    // ============================================================================
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: io::Error,
    },

    // ============================================================================
    // Curve editing
    // ============================================================================
    #[error("A curve can have at most {max} points")]
    LimitExceeded { max: usize },

    #[error("A curve needs at least {min} points")]
    MinimumRequired { min: usize },

    #[error("Point index {index} out of range (curve has {len} points)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Curve points are locked")]
    PointsLocked,

    #[error("Curve validation failed: {0}")]
    InvalidCurve(String),

    // ============================================================================
    // Collaborators
    // ============================================================================
    #[error("Power mode error: {0}")]
    PowerMode(String),

    #[error("Embedded controller error: {0}")]
    Ec(String),

    #[error("Fan control helper error: {0}")]
    Helper(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl FanError {
    pub fn file_read(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    pub fn file_write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::FileWrite {
            path: path.into(),
            source,
        }
    }

    pub fn power_mode(msg: impl Into<String>) -> Self {
        Self::PowerMode(msg.into())
    }

    pub fn ec(msg: impl Into<String>) -> Self {
        Self::Ec(msg.into())
    }

    pub fn helper(msg: impl Into<String>) -> Self {
        Self::Helper(msg.into())
    }

    pub fn settings(msg: impl Into<String>) -> Self {
        Self::Settings(msg.into())
    }

    /// True for the point-count and lock refusals the UI shows as a notice.
    pub fn is_edit_refusal(&self) -> bool {
        matches!(
            self,
            Self::LimitExceeded { .. } | Self::MinimumRequired { .. } | Self::PointsLocked
        )
    }
}
