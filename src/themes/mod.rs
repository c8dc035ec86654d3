//! CSS themes
//!
//! A theme is a `*.theme.css` or `*.css` file in the theme directory,
//! optionally starting with a metadata header:
//!
//! ```css
//! /**
//!  * @name Midnight
//!  * @version 1.0.0
//!  */
//! ```
//!
//! At most one theme is active at a time.

mod manager;
mod sink;

pub use manager::{ThemeChange, ThemeManager, ThemeRecord};
pub use sink::{MemoryStyleSink, StyleSink};

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ThemeError {
    #[error("Theme file not found")]
    NotFound,

    #[error("invalid theme name '{0}'")]
    InvalidName(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("style sink rejected theme: {0}")]
    Sink(String),
}
