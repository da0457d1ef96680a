//! Named state listing and deletion rules

use crate::backend::{BackendError, BackendResult};
use crate::paths::state_name_from_entry;

/// The canonical state name, always reported by listings
pub const DEFAULT_STATE_NAME: &str = "default";

/// Turn a listing response body into sorted state names
///
/// Entries are separated by commas and/or whitespace. Only entries naming a
/// state document are kept. The result is sorted, free of duplicates, and
/// contains the default name exactly once.
pub fn parse_listing(body: &str) -> Vec<String> {
    let mut names: Vec<String> = body
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|entry| !entry.is_empty())
        .filter_map(state_name_from_entry)
        .map(str::to_string)
        .collect();

    names.sort();
    names.dedup();
    ensure_default(&mut names);
    names
}

/// Insert the default name into an already sorted list if it is missing
fn ensure_default(names: &mut Vec<String>) {
    if let Err(position) = names.binary_search_by(|name| name.as_str().cmp(DEFAULT_STATE_NAME)) {
        names.insert(position, DEFAULT_STATE_NAME.to_string());
    }
}

/// Check that a named state may be deleted
pub fn check_deletable(name: &str) -> BackendResult<()> {
    if name.is_empty() {
        return Err(BackendError::invalid_name("state name must not be empty"));
    }
    if name == DEFAULT_STATE_NAME {
        return Err(BackendError::invalid_name(format!(
            "can't delete the {} state",
            DEFAULT_STATE_NAME
        )));
    }
    Ok(())
}
