//! Output formatting for run results.
//!
//! - [`summary`] - The final summary printed after a run

mod summary;

pub use summary::{print_summary, summary_lines};
