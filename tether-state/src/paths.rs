//! URL derivation for named states

/// Suffix of state document resources
pub const STATE_SUFFIX: &str = ".state";

/// Suffix of lock resources
pub const LOCK_SUFFIX: &str = ".lock";

/// URL of the state document for `name` under `base`
///
/// Plain concatenation; callers supply a base without a trailing slash.
pub fn state_path(base: &str, name: &str) -> String {
    format!("{}/{}{}", base, name, STATE_SUFFIX)
}

/// URL of the lock resource for `name` under `base`
pub fn lock_path(base: &str, name: &str) -> String {
    format!("{}/{}{}", base, name, LOCK_SUFFIX)
}

/// Split a state document URL back into its base and name
pub fn parse_state_path(url: &str) -> Option<(&str, &str)> {
    let (base, file) = url.rsplit_once('/')?;
    let name = file.strip_suffix(STATE_SUFFIX)?;
    if name.is_empty() {
        return None;
    }
    Some((base, name))
}

/// Extract a state name from one entry of a listing response
///
/// Takes the last path segment and returns its stem when the extension is
/// exactly the state suffix.
pub fn state_name_from_entry(entry: &str) -> Option<&str> {
    let file = entry.rsplit('/').next().unwrap_or(entry);
    let dot = file.rfind('.')?;
    let (stem, extension) = file.split_at(dot);
    (extension == STATE_SUFFIX && !stem.is_empty()).then_some(stem)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://state.example.com/teams/infra";

    #[test]
    fn test_state_and_lock_paths() {
        assert_eq!(
            state_path(BASE, "prod"),
            "https://state.example.com/teams/infra/prod.state"
        );
        assert_eq!(
            lock_path(BASE, "prod"),
            "https://state.example.com/teams/infra/prod.lock"
        );
    }

    #[test]
    fn test_paths_never_collide() {
        let names = ["default", "prod", "staging", "a", "a.b", "prod-1", "prod.lock"];
        let mut urls = Vec::new();
        for name in names {
            urls.push(state_path(BASE, name));
            urls.push(lock_path(BASE, name));
        }
        let total = urls.len();
        urls.sort();
        urls.dedup();
        assert_eq!(urls.len(), total);
    }

    #[test]
    fn test_parse_state_path_round_trip() {
        for name in ["default", "prod", "team.prod", "x"] {
            let url = state_path(BASE, name);
            assert_eq!(parse_state_path(&url), Some((BASE, name)));
        }
    }

    #[test]
    fn test_parse_state_path_rejects_other_resources() {
        assert_eq!(parse_state_path(&lock_path(BASE, "prod")), None);
        assert_eq!(parse_state_path("https://example.com/.state"), None);
        assert_eq!(parse_state_path("prod.state"), None);
    }

    #[test]
    fn test_state_name_from_entry() {
        assert_eq!(state_name_from_entry("prod.state"), Some("prod"));
        assert_eq!(state_name_from_entry("states/dev/prod.state"), Some("prod"));
        assert_eq!(state_name_from_entry("team.prod.state"), Some("team.prod"));
        assert_eq!(state_name_from_entry("prod.lock"), None);
        assert_eq!(state_name_from_entry("prod.state.bak"), None);
        assert_eq!(state_name_from_entry("prod"), None);
        assert_eq!(state_name_from_entry(".state"), None);
    }
}
