//! Sender address parsing and identity keys (RFC 5322 §3.4).

/// A parsed email address.
///
/// # Examples
/// - `"Billing Team <billing@shop.example>"` → `display_name = "Billing Team"`, `address = "billing@shop.example"`
/// - `"user@example.com"` → `display_name = ""`, `address = "user@example.com"`
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct EmailAddress {
    /// Human-readable display name (may be empty).
    pub display_name: String,
    /// The bare email address (`user@domain`).
    pub address: String,
}

impl EmailAddress {
    pub fn new(display_name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            address: address.into(),
        }
    }

    /// Parse a single address from a `From:` header value.
    ///
    /// Accepts `user@domain`, `<user@domain>`, `Name <user@domain>` and
    /// `"Quoted, Name" <user@domain>`. Anything else is kept verbatim as
    /// the address.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let (Some(open), Some(close)) = (trimmed.rfind('<'), trimmed.rfind('>')) {
            if close > open {
                let name = trimmed[..open].trim().trim_matches('"').trim();
                return Self::new(name, trimmed[open + 1..close].trim());
            }
        }
        Self::new("", trimmed)
    }

    /// `true` if no address is present.
    pub fn is_empty(&self) -> bool {
        self.address.trim().is_empty()
    }

    /// Lower-cased bare address.
    pub fn normalized(&self) -> String {
        self.address.trim().to_lowercase()
    }

    /// Part before the last `@`, if the address has one.
    pub fn local_part(&self) -> Option<&str> {
        self.address.rsplit_once('@').map(|(local, _)| local)
    }

    /// Lower-cased part after the last `@`, if the address has one.
    pub fn domain(&self) -> Option<String> {
        self.address
            .rsplit_once('@')
            .map(|(_, domain)| domain.trim().to_lowercase())
            .filter(|d| !d.is_empty())
    }

    /// Keys used for sender overlap: the full address and its domain.
    pub fn identity_keys(&self) -> Vec<String> {
        if self.is_empty() {
            return Vec::new();
        }
        let mut keys = vec![self.normalized()];
        if let Some(domain) = self.domain() {
            keys.push(domain);
        }
        keys
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.display_name.is_empty() {
            write!(f, "{}", self.address)
        } else {
            write!(f, "{} <{}>", self.display_name, self.address)
        }
    }
}
