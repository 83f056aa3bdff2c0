// src/error.rs
//! Error handling for the whole crate.
//!
//! The culling core itself has no recoverable error states (overflow degrades
//! silently); errors come from the edges: configuration, light upload capacity,
//! arena budget, resize-generation misuse and GPU setup.

use std::fmt;
use thiserror::Error;

/// Main error type. Send + Sync + 'static so it crosses rayon and GPU callbacks.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// I/O errors (config files).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization of configuration.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// More point lights were submitted than the light buffer holds.
    #[error("light capacity exceeded: {requested} lights requested, maximum is {max}")]
    LightCapacity { requested: usize, max: usize },

    /// Zero-sized or otherwise unusable render resolution.
    #[error("invalid resolution {width}x{height}")]
    InvalidResolution { width: u32, height: u32 },

    /// The render-target arena ran out of budget.
    #[error("arena exhausted allocating `{label}`: {requested} bytes requested, {available} available")]
    ArenaExhausted {
        label: String,
        requested: u64,
        available: u64,
    },

    /// A resource from an older resize generation was used.
    #[error("stale resource `{label}`: generation {found}, current is {current}")]
    StaleGeneration {
        label: String,
        found: u64,
        current: u64,
    },

    /// A frame pass was requested before the first resize established buffers.
    #[error("tiled renderer is not ready: {0}")]
    NotReady(&'static str),

    /// Adapter / device acquisition failures.
    #[error("GPU error: {0}")]
    Gpu(String),

    /// Simple custom message.
    #[error("{0}")]
    Custom(String),

    /// Context chaining.
    #[error("{message}: {source}")]
    WithContext {
        message: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create a custom error message.
    #[inline]
    pub fn custom<S: Into<String>>(msg: S) -> Self {
        Self::Custom(msg.into())
    }

    /// Formatted custom error, used by `bail!`.
    #[inline]
    pub fn format(args: fmt::Arguments) -> Self {
        Self::Custom(fmt::format(args))
    }

    /// Wrap this error with a context message.
    #[inline]
    pub fn context<C: Into<String>>(self, context: C) -> Self {
        Self::WithContext {
            message: context.into(),
            source: Box::new(self),
        }
    }

    #[inline]
    pub fn msg(msg: &'static str) -> Self {
        Self::Custom(msg.into())
    }

    #[inline]
    pub fn is_io(&self) -> bool {
        matches!(self, Error::Io(_))
    }

    /// True for errors that signal a caller-side contract violation rather than
    /// an environmental failure.
    #[inline]
    pub fn is_contract_violation(&self) -> bool {
        match self {
            Error::StaleGeneration { .. } | Error::NotReady(_) => true,
            Error::WithContext { source, .. } => source.is_contract_violation(),
            _ => false,
        }
    }
}

/// Convenient `Result` alias, `crate::Result<T>` everywhere.
pub type Result<T> = std::result::Result<T, Error>;
