//! Small types shared by every manager.

use std::collections::BTreeMap;

/// Free-form string metadata attached to entities.
///
/// Ordered so that content-addressed identifiers and debug output are stable.
pub type Metadata = BTreeMap<String, String>;

/// Returns the trimmed value, or `None` if nothing is left.
pub(crate) fn non_empty(s: &str) -> Option<&str> {
    let t = s.trim();
    (!t.is_empty()).then_some(t)
}
