//! Read-only structural validation over the spec graph: the eight fixed
//! checks plus the dependency-regression check, producing a typed report
//! rather than a free-text summary.
//!
//! Never mutates the graph or anything on disk; the `validate` CLI
//! subcommand in `workflow-cli` uses [`report::IntegrityReport::has_errors`]
//! to decide its exit code.

mod checks;
/// Report and finding types.
pub mod report;

pub use checks::validate;
pub use report::{Check, Finding, IntegrityReport, Severity};
