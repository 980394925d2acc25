//! Change detection between form snapshots.
//!
//! [`ChangeDetector`] walks the baseline's top-level fields, applies the
//! [`DiffConfig`] exclusion and allowlist rules, and asks a
//! [`StructuralDiffer`] whether each field changed. String changes are
//! additionally described character by character through a [`TextDiffer`].
//!
//! # Example
//!
//! ```ignore
//! let config = DiffConfig::new().exclude(["updatedAt"]);
//! let report = check_differences(&baseline, &edited, &config);
//! if report.is_materially_changed() {
//!     store.save(&id, "users", &edited);
//! }
//! ```

mod config;
mod detector;
mod structural;
mod text;

pub use config::DiffConfig;
pub use detector::{check_differences, ChangeDetector, ChangeReport, Explanation};
pub use structural::{Delta, DeltaMap, ObjectDiffer, StructuralDiffer};
pub use text::{CharDiffer, TextChange, TextChangeKind, TextDiffer, MAX_EDIT_DISTANCE};
