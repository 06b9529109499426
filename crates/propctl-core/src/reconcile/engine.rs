//! Identity-token restoration between two rule trees.
//!
//! ## Matching
//!
//! 1. Collect advanced directives of both trees, grouped by content hash.
//! 2. For each new entry, take the first unconsumed old entry in the same
//!    group whose ancestor chain has the same length.
//! 3. Copy the old entry's uuids onto the new chain, position by position,
//!    and onto the directive. The old entry is consumed.
//! 4. No candidate at that depth is an error naming the payload.
//!
//! Nothing else in the new tree is touched.

use std::collections::HashMap;

use super::metadata::collect_advanced;
use crate::errors::{Result, RuleTreeError};
use crate::model::{DirectiveSlot, RuleNode, RulePath};

/// Restore identity tokens from `old` onto the advanced metadata of `new`
///
/// # Errors
///
/// - `UnmatchedAdvancedMetadata` when a payload of `new` has no
///   equal-depth counterpart left in `old`
/// - `ConflictingAdvancedMetadata` when two matches would give one rule of
///   `new` different uuids, or one uuid to two rules of `new`
pub fn reconcile(old: &RuleNode, new: RuleNode) -> Result<RuleNode> {
    reconcile_counted(old, new).map(|(tree, _)| tree)
}

/// Like [`reconcile`], also returning how many advanced directives were matched
///
/// # Errors
///
/// See [`reconcile`].
pub fn reconcile_counted(old: &RuleNode, mut new: RuleNode) -> Result<(RuleNode, usize)> {
    let plan = plan_assignments(old, &new)?;
    let matched = plan.directive_matches;

    for (path, uuid) in plan.nodes {
        new.node_at_mut(&path)?.assign_uuid(uuid)?;
    }
    for ((path, slot), uuid) in plan.directives {
        let owner = new.node_at_mut(&path)?;
        if let Some(directive) = owner.directive_mut(slot) {
            directive.uuid = Some(uuid);
        }
    }

    tracing::debug!(matched, "advanced metadata reconciled");
    Ok((new, matched))
}

#[derive(Default)]
struct Plan {
    nodes: HashMap<RulePath, String>,
    owners: HashMap<String, RulePath>,
    directives: HashMap<(RulePath, DirectiveSlot), String>,
    directive_matches: usize,
}

impl Plan {
    fn assign_node(&mut self, path: RulePath, uuid: &str, rule_name: &str) -> Result<()> {
        if let Some(existing) = self.nodes.get(&path) {
            if existing != uuid {
                return Err(RuleTreeError::ConflictingAdvancedMetadata {
                    rule_name: rule_name.to_string(),
                    detail: format!("matched both {} and {}", existing, uuid),
                });
            }
            return Ok(());
        }
        // uuids are unique within a tree
        if let Some(owner) = self.owners.get(uuid) {
            return Err(RuleTreeError::ConflictingAdvancedMetadata {
                rule_name: rule_name.to_string(),
                detail: format!("{} is already assigned to the rule at {}", uuid, owner),
            });
        }
        self.owners.insert(uuid.to_string(), path.clone());
        self.nodes.insert(path, uuid.to_string());
        Ok(())
    }
}

fn plan_assignments(old: &RuleNode, new: &RuleNode) -> Result<Plan> {
    let mut old_groups = collect_advanced(old);
    let new_groups = collect_advanced(new);
    let mut plan = Plan::default();

    for (hash, new_entries) in &new_groups {
        for entry in new_entries {
            let depth = entry.depth();
            let candidate = old_groups.get_mut(hash).and_then(|candidates| {
                candidates
                    .iter()
                    .position(|c| c.depth() == depth)
                    .map(|pos| candidates.remove(pos))
            });
            let Some(matched) = candidate else {
                return Err(RuleTreeError::UnmatchedAdvancedMetadata {
                    content_hash: hash.clone(),
                    payload: entry.payload.clone(),
                    depth,
                });
            };

            for (k, (old_rule, new_rule)) in matched
                .ancestor_chain
                .iter()
                .zip(entry.ancestor_chain.iter())
                .enumerate()
            {
                if let Some(uuid) = old_rule.uuid.as_deref() {
                    plan.assign_node(entry.owner_path.prefix(k + 1), uuid, &new_rule.name)?;
                }
            }
            if let Some(uuid) = matched.directive.uuid.as_deref() {
                plan.directives
                    .insert((entry.owner_path.clone(), entry.slot), uuid.to_string());
            }
            plan.directive_matches += 1;
        }
    }

    Ok(plan)
}
