//! Service paths and link parsing

use propctl_core::ConfigRecord;
use url::form_urlencoded;

/// A service-relative path with ordered query parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiPath {
    base: String,
    query: Vec<(&'static str, String)>,
}

impl ApiPath {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            query: Vec::new(),
        }
    }

    pub fn param(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.query.push((name, value.into()));
        self
    }

    /// Scope the call to the record's contract and group
    pub fn scoped(self, record: &ConfigRecord) -> Self {
        self.param("contractId", record.contract_id.clone())
            .param("groupId", record.group_id.clone())
    }

    /// Render, appending `accountSwitchKey` when one is configured
    ///
    /// Values are form-encoded; names are fixed identifiers and go out as is.
    pub fn build(&self, account_switch_key: Option<&str>) -> String {
        let mut out = self.base.clone();
        let params = self
            .query
            .iter()
            .map(|(k, v)| (*k, v.as_str()))
            .chain(account_switch_key.map(|key| ("accountSwitchKey", key)));
        for (i, (name, value)) in params.enumerate() {
            out.push(if i == 0 { '?' } else { '&' });
            out.push_str(name);
            out.push('=');
            out.extend(form_urlencoded::byte_serialize(value.as_bytes()));
        }
        out
    }
}

pub fn property(id: &str) -> ApiPath {
    ApiPath::new(format!("/papi/v1/properties/{}", id))
}

pub fn versions(id: &str) -> ApiPath {
    ApiPath::new(format!("/papi/v1/properties/{}/versions", id))
}

pub fn rules(id: &str, version: u32) -> ApiPath {
    ApiPath::new(format!("/papi/v1/properties/{}/versions/{}/rules", id, version))
}

pub fn hostnames(id: &str, version: u32) -> ApiPath {
    ApiPath::new(format!(
        "/papi/v1/properties/{}/versions/{}/hostnames",
        id, version
    ))
}

pub fn activations(id: &str) -> ApiPath {
    ApiPath::new(format!("/papi/v1/properties/{}/activations", id))
}

pub fn activation(id: &str, activation_id: &str) -> ApiPath {
    ApiPath::new(format!(
        "/papi/v1/properties/{}/activations/{}",
        id, activation_id
    ))
}

/// The path segment that follows `collection` in a resource link
///
/// `link_segment("/papi/v1/properties/prp_1/activations/atv_9?x=y", "activations")`
/// is `Some("atv_9")`.
pub fn link_segment<'a>(link: &'a str, collection: &str) -> Option<&'a str> {
    let path = link.split('?').next()?;
    let mut parts = path.split('/');
    parts.find(|p| *p == collection)?;
    parts.next().filter(|s| !s.is_empty())
}
