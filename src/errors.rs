//! Copyright © 2025-2026 Wenze Wei. All Rights Reserved.
//!
//! This file is part of Zimod.
//! The Zimod project belongs to the Dunimd Team.
//!
//! Licensed under the Apache License, Version 2.0 (the "License");
//! You may not use this file except in compliance with the License.
//! You may obtain a copy of the License at
//!
//!     http://www.apache.org/licenses/LICENSE-2.0
//!
//! Unless required by applicable law or agreed to in writing, software
//! distributed under the License is distributed on an "AS IS" BASIS,
//! WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//! See the License for the specific language governing permissions and
//! limitations under the License.

//! # Zimod Error Module
//!
//! This module defines the error types used throughout the Zimod engine for
//! consistent error handling and reporting.
//!
//! ## Error Categories
//!
//! - **Parse**: A module descriptor could not be read. The module is skipped,
//!   the engine keeps going.
//! - **CyclicDependency**: No deployment order exists. Fatal to initialization.
//! - **MissingDependency**: A module names a provider that is not deployed.
//!   Fatal to that module's context only, and cascades to its dependents.
//! - **ArchiveIo**: Materializing an archive failed. Fatal to the one context
//!   being constructed.
//! - **InvalidSharingPolicy**: A resource (or its parent) has no usable sharing
//!   policy. Fatal to that one resource's resolution.
//! - **Lifecycle**: A module install/teardown hook failed.
//! - **InvalidState**: An operation was called in the wrong engine state.
//!
//! ## Usage
//!
//! ```rust
//! use zimod::errors::{Result, ZiError};
//!
//! fn example(name: &str) -> Result<()> {
//!     if name.is_empty() {
//!         return Err(ZiError::validation("module name cannot be empty"));
//!     }
//!     Ok(())
//! }
//! ```

use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use zip::result::ZipError;

/// Convenience result type used throughout Zimod.
pub type Result<T> = std::result::Result<T, ZiError>;

/// Canonical error enumeration for Zimod.
#[derive(Debug, Error, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum ZiError {
    /// Errors originating from filesystem IO.
    #[error("io error: {0}")]
    Io(String),

    /// Wrapper for serde-style serialization issues.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Errors originating from ZIP file operations.
    #[error("zip error: {0}")]
    Zip(String),

    /// A hide pattern failed to compile.
    #[error("regex error: {0}")]
    Regex(String),

    /// A module descriptor is missing or malformed.
    #[error("cannot parse descriptor of '{archive}': {message}")]
    Parse { archive: String, message: String },

    /// The module dependency graph has no valid deployment order.
    #[error("cyclic module dependency: {}", cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    /// A module's provider has no deployed descriptor or failed to load.
    #[error("module '{module}' uses code of '{provider}', which is not deployed")]
    MissingDependency { module: String, provider: String },

    /// A module name with no descriptor was asked for.
    #[error("module '{module}' is not deployed")]
    UnknownModule { module: String },

    /// Materializing an archive into a working area failed.
    #[error("cannot materialize archive '{archive}': {message}")]
    ArchiveIo { archive: String, message: String },

    /// The sharing policy combination of a resource and its parent is unusable.
    #[error("invalid sharing policy for resource '{resource}': own=[{own}], parent=[{parent}]")]
    InvalidSharingPolicy {
        resource: String,
        own: String,
        parent: String,
    },

    /// A module lifecycle hook failed.
    #[error("module '{module}' failed during {phase}: {message}")]
    Lifecycle {
        module: String,
        phase: String,
        message: String,
    },

    /// An operation was called while the engine was in the wrong state.
    #[error("cannot {operation} while engine is {state}")]
    InvalidState { operation: String, state: String },

    /// Validation errors triggered by invalid parameters or inputs.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Catch-all variant for unexpected situations.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<io::Error> for ZiError {
    fn from(err: io::Error) -> Self {
        ZiError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ZiError {
    fn from(err: serde_json::Error) -> Self {
        ZiError::Serde(err.to_string())
    }
}

impl From<serde_yaml::Error> for ZiError {
    fn from(err: serde_yaml::Error) -> Self {
        ZiError::Serde(err.to_string())
    }
}

impl From<ZipError> for ZiError {
    fn from(err: ZipError) -> Self {
        ZiError::Zip(err.to_string())
    }
}

impl From<regex::Error> for ZiError {
    fn from(err: regex::Error) -> Self {
        ZiError::Regex(err.to_string())
    }
}

impl ZiError {
    /// Helper to construct simple validation errors.
    pub fn validation<T: Into<String>>(message: T) -> Self {
        ZiError::Validation {
            message: message.into(),
        }
    }

    /// Helper to construct descriptor parse errors.
    pub fn parse(archive: impl Into<String>, message: impl Into<String>) -> Self {
        ZiError::Parse {
            archive: archive.into(),
            message: message.into(),
        }
    }

    pub fn missing_dependency(module: impl Into<String>, provider: impl Into<String>) -> Self {
        ZiError::MissingDependency {
            module: module.into(),
            provider: provider.into(),
        }
    }

    pub fn unknown_module(module: impl Into<String>) -> Self {
        ZiError::UnknownModule {
            module: module.into(),
        }
    }

    /// Helper to construct archive materialization errors.
    pub fn archive_io(archive: impl Into<String>, message: impl Into<String>) -> Self {
        ZiError::ArchiveIo {
            archive: archive.into(),
            message: message.into(),
        }
    }

    pub fn lifecycle(
        module: impl Into<String>,
        phase: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        ZiError::Lifecycle {
            module: module.into(),
            phase: phase.into(),
            message: message.into(),
        }
    }

    pub fn invalid_state(operation: impl Into<String>, state: impl Into<String>) -> Self {
        ZiError::InvalidState {
            operation: operation.into(),
            state: state.into(),
        }
    }

    /// Helper to construct internal errors.
    pub fn internal<T: Into<String>>(message: T) -> Self {
        ZiError::Internal(message.into())
    }

    /// Lock poisoning means another thread panicked mid-update.
    pub(crate) fn poisoned(what: &str) -> Self {
        ZiError::Internal(format!("{} lock poisoned", what))
    }
}
