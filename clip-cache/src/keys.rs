//! Key naming helpers.
//!
//! Keys are `category:id` strings. The store accepts any string; these only
//! keep consumers consistent so that prefix invalidation lines up.

pub const SEPARATOR: char = ':';
pub const DASHBOARD: &str = "dashboard";

pub fn compose(category: &str, id: impl std::fmt::Display) -> String {
    format!("{category}{SEPARATOR}{id}")
}

/// `dashboard:<role>:<userId>`
pub fn dashboard(role: &str, user_id: &str) -> String {
    compose(&compose(DASHBOARD, role), user_id)
}

/// Prefix covering every dashboard entry for `role`.
pub fn dashboard_prefix(role: &str) -> String {
    format!("{DASHBOARD}{SEPARATOR}{role}{SEPARATOR}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dashboard_key() {
        assert_eq!(dashboard("CREATOR", "u1"), "dashboard:CREATOR:u1");
        assert!(dashboard("CREATOR", "u1").starts_with(&dashboard_prefix("CREATOR")));
        assert!(!dashboard("CLIPPER", "u1").starts_with(&dashboard_prefix("CREATOR")));
    }

    #[test]
    fn test_compose() {
        assert_eq!(compose("campaign", 42), "campaign:42");
    }
}
