use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{Result, RuleTreeError};

/// Identity token carried by the root rule; never renamed
pub const ROOT_RULE_UUID: &str = "default";

/// Directive names whose payload is opaque and identity-tracked
const ADVANCED_DIRECTIVES: &[&str] = &["advanced", "matchAdvanced"];

/// Option keys that make up an opaque payload, in concatenation order
const ADVANCED_PAYLOAD_KEYS: &[&str] = &["xml", "openXml", "closeXml"];

/// How the criteria of a rule combine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CriteriaMustSatisfy {
    All,
    Any,
}

/// A behavior or a criterion
///
/// Fields the engine does not interpret are kept in `extra` so a tree
/// survives a read/write round trip unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Directive {
    pub name: String,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub options: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_uuid: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Directive {
    /// Create a directive with no options
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: Map::new(),
            uuid: None,
            template_uuid: None,
            extra: Map::new(),
        }
    }

    /// Builder-style option setter
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Whether this is an `advanced` behavior or a `matchAdvanced` criterion
    pub fn is_advanced(&self) -> bool {
        ADVANCED_DIRECTIVES.contains(&self.name.as_str())
    }

    /// Concatenated opaque payload (`xml` + `openXml` + `closeXml`, missing
    /// parts empty), or `None` for ordinary directives
    pub fn advanced_payload(&self) -> Option<String> {
        if !self.is_advanced() {
            return None;
        }
        let payload = ADVANCED_PAYLOAD_KEYS
            .iter()
            .map(|key| self.options.get(*key).and_then(Value::as_str).unwrap_or(""))
            .collect::<String>();
        Some(payload)
    }
}

/// A user-defined variable declared on the root rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    pub name: String,

    #[serde(default)]
    pub value: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub hidden: bool,

    #[serde(default)]
    pub sensitive: bool,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One rule of the tree
///
/// Order of `children`, `behaviors` and `criteria` is significant; every
/// helper here preserves it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleNode {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<RuleNode>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub behaviors: Vec<Directive>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub criteria: Vec<Directive>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criteria_must_satisfy: Option<CriteriaMustSatisfy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Map<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<Vec<Variable>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RuleNode {
    /// Create an empty rule
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uuid: None,
            children: Vec::new(),
            behaviors: Vec::new(),
            criteria: Vec::new(),
            criteria_must_satisfy: None,
            options: None,
            comments: None,
            variables: None,
            extra: Map::new(),
        }
    }

    /// Create an empty root rule
    pub fn root() -> Self {
        let mut node = Self::new(ROOT_RULE_UUID);
        node.uuid = Some(ROOT_RULE_UUID.to_string());
        node
    }

    /// Whether this node carries the root identity token
    pub fn is_root_rule(&self) -> bool {
        self.uuid.as_deref() == Some(ROOT_RULE_UUID)
    }

    /// Set the identity token of this node
    ///
    /// # Errors
    ///
    /// `RootUuidImmutable` when this is the root rule and `uuid` differs
    /// from `"default"`.
    pub fn assign_uuid(&mut self, uuid: impl Into<String>) -> Result<()> {
        let uuid = uuid.into();
        if self.is_root_rule() && uuid != ROOT_RULE_UUID {
            return Err(RuleTreeError::RootUuidImmutable { attempted: uuid });
        }
        self.uuid = Some(uuid);
        Ok(())
    }

    /// First behavior with the given name
    pub fn behavior(&self, name: &str) -> Option<&Directive> {
        self.behaviors.iter().find(|b| b.name == name)
    }

    /// Mutable access to the first behavior with the given name
    pub fn behavior_mut(&mut self, name: &str) -> Option<&mut Directive> {
        self.behaviors.iter_mut().find(|b| b.name == name)
    }

    /// Replace the first behavior with the same name in place, or append.
    /// Returns the replaced behavior.
    pub fn upsert_behavior(&mut self, directive: Directive) -> Option<Directive> {
        match self.behavior_mut(&directive.name) {
            Some(existing) => Some(std::mem::replace(existing, directive)),
            None => {
                self.behaviors.push(directive);
                None
            }
        }
    }

    /// Remove the first behavior with the given name
    pub fn remove_behavior(&mut self, name: &str) -> Option<Directive> {
        let index = self.behaviors.iter().position(|b| b.name == name)?;
        Some(self.behaviors.remove(index))
    }

    /// First direct child with the given name
    pub fn child(&self, name: &str) -> Option<&RuleNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Mutable access to the first direct child with the given name
    pub fn child_mut(&mut self, name: &str) -> Option<&mut RuleNode> {
        self.children.iter_mut().find(|c| c.name == name)
    }

    /// Append a child rule; returns its path segment
    pub fn add_child(&mut self, child: RuleNode) -> usize {
        self.children.push(child);
        self.children.len() - 1
    }

    /// Every rule below this one, depth-first pre-order
    pub fn descendants(&self) -> Vec<&RuleNode> {
        crate::traversal::walk(self)
            .skip(1)
            .map(|entry| entry.node)
            .collect()
    }

    /// The rule addressed by `path`, relative to this one
    pub fn node_at(&self, path: &RulePath) -> Option<&RuleNode> {
        path.indices()
            .iter()
            .try_fold(self, |node, &i| node.children.get(i))
    }

    /// Mutable access to the rule addressed by `path`
    ///
    /// # Errors
    ///
    /// `PathNotFound` if any segment is out of range.
    pub fn node_at_mut(&mut self, path: &RulePath) -> Result<&mut RuleNode> {
        let mut node = self;
        for &i in path.indices() {
            node = node
                .children
                .get_mut(i)
                .ok_or_else(|| RuleTreeError::PathNotFound {
                    path: path.to_string(),
                })?;
        }
        Ok(node)
    }

    /// Behaviors followed by criteria, each tagged with its slot
    pub fn directives(&self) -> impl Iterator<Item = (DirectiveSlot, &Directive)> {
        self.behaviors
            .iter()
            .enumerate()
            .map(|(i, d)| (DirectiveSlot::Behavior(i), d))
            .chain(
                self.criteria
                    .iter()
                    .enumerate()
                    .map(|(i, d)| (DirectiveSlot::Criterion(i), d)),
            )
    }

    /// Mutable access to the directive in `slot`
    pub fn directive_mut(&mut self, slot: DirectiveSlot) -> Option<&mut Directive> {
        match slot {
            DirectiveSlot::Behavior(i) => self.behaviors.get_mut(i),
            DirectiveSlot::Criterion(i) => self.criteria.get_mut(i),
        }
    }
}

/// Position of a directive inside its owning rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectiveSlot {
    Behavior(usize),
    Criterion(usize),
}

/// Child-index path from the root to a rule; the empty path is the root
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct RulePath(Vec<usize>);

impl RulePath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Path of the `index`-th child of this rule
    pub fn child(&self, index: usize) -> Self {
        let mut indices = self.0.clone();
        indices.push(index);
        Self(indices)
    }

    /// Number of segments (0 for the root)
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    /// The path of the ancestor at `depth` (1 = child of the root)
    pub fn prefix(&self, depth: usize) -> Self {
        Self(self.0[..depth.min(self.0.len())].to_vec())
    }
}

impl From<Vec<usize>> for RulePath {
    fn from(indices: Vec<usize>) -> Self {
        Self(indices)
    }
}

impl std::fmt::Display for RulePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for i in &self.0 {
            write!(f, "/{}", i)?;
        }
        Ok(())
    }
}
