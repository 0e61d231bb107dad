//! Fatal error taxonomy.
//!
//! Everything in here aborts the run with a non-zero exit. Degraded
//! conditions (a dead search backend, no hero image, too few sources) never
//! produce one of these; they are logged and replaced with a fallback.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FatalError {
    /// No API key available although a generator call is required.
    #[error("missing API credential: set {0} or pass --api-key")]
    MissingCredential(&'static str),

    /// A template, index, config or draft file that the run depends on.
    #[error("required file not found: {}", .0.display())]
    MissingFile(PathBuf),

    /// The index has no feed markers and no `<body>` tag to synthesize them after.
    #[error("no feed insertion point: index document has neither feed markers nor a <body> tag")]
    NoInsertionPoint,

    /// Card insertion produced a byte-identical index.
    #[error("index document unchanged after card insertion")]
    UnchangedIndex,

    #[error("no free article filename for stem {0}")]
    SlugExhausted(String),
}
