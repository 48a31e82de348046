use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// A delivered stock item, as it should be shown to the customer.
///
/// Most stock items are `login:password` pairs. Anything that does not split cleanly into a non-empty login and a
/// non-empty password (license keys, gift card codes, malformed entries) is shown as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Credential {
    Pair { login: String, password: String },
    Raw(String),
}

impl Credential {
    /// Never fails. Only the first `:` separates login from password, so passwords may contain colons.
    pub fn parse(item: &str) -> Self {
        match item.trim().split_once(':') {
            Some((login, password)) if !login.trim().is_empty() && !password.trim().is_empty() => {
                Credential::Pair { login: login.trim().to_string(), password: password.trim().to_string() }
            },
            _ => Credential::Raw(item.to_string()),
        }
    }
}

impl Display for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::Pair { login, password } => write!(f, "Login: {login} Password: {password}"),
            Credential::Raw(s) => write!(f, "{s}"),
        }
    }
}
