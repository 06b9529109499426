use super::record::ConfigRecord;

/// Prefix of service-assigned configuration ids
pub const PROPERTY_ID_PREFIX: &str = "prp_";

/// What a caller handed us to identify a configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupKey {
    ById(String),
    ByName(String),
    ByHostname(String),
    /// A record the caller already holds; resolved without touching the cache
    Resolved(ConfigRecord),
}

impl LookupKey {
    /// The raw lookup string, if this key is not already a record
    pub fn raw(&self) -> Option<&str> {
        match self {
            LookupKey::ById(s) | LookupKey::ByName(s) | LookupKey::ByHostname(s) => Some(s),
            LookupKey::Resolved(_) => None,
        }
    }
}

impl From<&str> for LookupKey {
    fn from(s: &str) -> Self {
        if is_property_id(s) {
            LookupKey::ById(s.to_string())
        } else {
            LookupKey::ByName(s.to_string())
        }
    }
}

impl From<String> for LookupKey {
    fn from(s: String) -> Self {
        LookupKey::from(s.as_str())
    }
}

impl From<ConfigRecord> for LookupKey {
    fn from(record: ConfigRecord) -> Self {
        LookupKey::Resolved(record)
    }
}

impl From<&ConfigRecord> for LookupKey {
    fn from(record: &ConfigRecord) -> Self {
        LookupKey::Resolved(record.clone())
    }
}

impl std::fmt::Display for LookupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LookupKey::ById(s) => write!(f, "id:{}", s),
            LookupKey::ByName(s) => write!(f, "name:{}", s),
            LookupKey::ByHostname(s) => write!(f, "host:{}", s),
            LookupKey::Resolved(r) => write!(f, "record:{}", r.id),
        }
    }
}

/// Whether `s` has the shape of a service-assigned configuration id
pub fn is_property_id(s: &str) -> bool {
    s.strip_prefix(PROPERTY_ID_PREFIX)
        .map(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or(false)
}

/// Normalize a configuration name for indexing
///
/// Every character outside `[A-Za-z0-9_-]` becomes `_`, so
/// `"my example.com"` and `"my_example_com"` index identically.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
