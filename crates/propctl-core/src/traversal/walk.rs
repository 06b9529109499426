use crate::model::{RuleNode, RulePath};

/// One visited rule with the rules enclosing it
#[derive(Debug, Clone)]
pub struct WalkEntry<'a> {
    pub node: &'a RuleNode,
    /// Enclosing rules from the root down to the direct parent
    pub ancestors: Vec<&'a RuleNode>,
    pub path: RulePath,
}

impl<'a> WalkEntry<'a> {
    /// Number of rules above this one
    pub fn depth(&self) -> usize {
        self.path.depth()
    }

    /// The rules a directive on this node is nested in, root excluded,
    /// ending with the node itself
    pub fn chain_below_root(&self) -> Vec<&'a RuleNode> {
        self.ancestors
            .iter()
            .skip(1)
            .copied()
            .chain((self.depth() > 0).then_some(self.node))
            .collect()
    }
}

/// Lazy depth-first pre-order traversal of a rule tree
///
/// Yields every rule exactly once, parents before children and siblings in
/// order. Consuming the iterator never touches the tree.
pub struct Walk<'a> {
    stack: Vec<WalkEntry<'a>>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = WalkEntry<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.stack.pop()?;

        let mut ancestors = entry.ancestors.clone();
        ancestors.push(entry.node);
        for (i, child) in entry.node.children.iter().enumerate().rev() {
            self.stack.push(WalkEntry {
                node: child,
                ancestors: ancestors.clone(),
                path: entry.path.child(i),
            });
        }

        Some(entry)
    }
}

/// Walk `root` and everything below it
pub fn walk(root: &RuleNode) -> Walk<'_> {
    Walk {
        stack: vec![WalkEntry {
            node: root,
            ancestors: Vec::new(),
            path: RulePath::root(),
        }],
    }
}
