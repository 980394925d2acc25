//! Form snapshots as JSON-like trees.
//!
//! - [`Tree`]: the value model, with date leaves and shareable containers
//! - [`deep_copy`]: structural copy that keeps baselines and live edits apart
//! - [`revive_dates`]: turns stored ISO-8601 text back into date leaves

mod copy;
mod dates;
mod value;

pub use copy::{deep_copy, try_deep_copy, MAX_TREE_DEPTH};
pub use dates::{format_iso_date_time, parse_iso_date_time, revive_dates};
pub(crate) use value::numbers_equal;
pub use value::{Tree, TreeMap};
