pub mod activation;
pub mod document;
pub mod lookup;
pub mod record;
pub mod rule;

pub use activation::{ActivationJob, ActivationOutcome, ActivationStatus, ActivationType};
pub use document::RuleTreeDocument;
pub use lookup::{is_property_id, sanitize_name, LookupKey};
pub use record::{ConfigRecord, Network, VersionSelector};
pub use rule::{
    CriteriaMustSatisfy, Directive, DirectiveSlot, RuleNode, RulePath, Variable, ROOT_RULE_UUID,
};
