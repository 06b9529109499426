use std::collections::BTreeMap;

use super::digest::content_hash;
use crate::model::{Directive, DirectiveSlot, RuleNode, RulePath};
use crate::traversal::walk;

/// One advanced directive found in a tree, with the rules it is nested in
///
/// Built transiently during reconciliation and never stored.
#[derive(Debug, Clone)]
pub struct AdvancedMetadataEntry<'a> {
    pub content_hash: String,
    pub payload: String,
    pub directive: &'a Directive,
    pub slot: DirectiveSlot,
    /// Path of the rule that owns the directive
    pub owner_path: RulePath,
    /// Enclosing rules below the root, ending with the owner
    pub ancestor_chain: Vec<&'a RuleNode>,
}

impl<'a> AdvancedMetadataEntry<'a> {
    pub fn depth(&self) -> usize {
        self.ancestor_chain.len()
    }
}

/// Every advanced directive under `root`, grouped by content hash
///
/// Within a group, entries appear in document order (pre-order over rules,
/// behaviors before criteria).
pub fn collect_advanced(root: &RuleNode) -> BTreeMap<String, Vec<AdvancedMetadataEntry<'_>>> {
    let mut groups: BTreeMap<String, Vec<AdvancedMetadataEntry<'_>>> = BTreeMap::new();

    for visit in walk(root) {
        for (slot, directive) in visit.node.directives() {
            let Some(payload) = directive.advanced_payload() else {
                continue;
            };
            let hash = content_hash(&payload);
            groups
                .entry(hash.clone())
                .or_default()
                .push(AdvancedMetadataEntry {
                    content_hash: hash,
                    payload,
                    directive,
                    slot,
                    owner_path: visit.path.clone(),
                    ancestor_chain: visit.chain_below_root(),
                });
        }
    }

    groups
}
