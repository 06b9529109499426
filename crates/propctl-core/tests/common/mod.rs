use propctl_core::{Directive, RuleNode};

/// An `advanced` behavior with the given payload and identity
#[allow(dead_code)]
pub fn advanced(xml: &str, uuid: Option<&str>) -> Directive {
    let mut d = Directive::new("advanced").with_option("xml", xml);
    d.uuid = uuid.map(str::to_string);
    d
}

/// A `matchAdvanced` criterion with the given payload and identity
#[allow(dead_code)]
pub fn match_advanced(open: &str, close: &str, uuid: Option<&str>) -> Directive {
    let mut d = Directive::new("matchAdvanced")
        .with_option("openXml", open)
        .with_option("closeXml", close);
    d.uuid = uuid.map(str::to_string);
    d
}

/// A named rule with an optional identity
#[allow(dead_code)]
pub fn rule(name: &str, uuid: Option<&str>) -> RuleNode {
    let mut r = RuleNode::new(name);
    r.uuid = uuid.map(str::to_string);
    r
}

/// root > outer > inner, with `directive` on `inner`
#[allow(dead_code)]
pub fn depth_two_tree(
    outer_uuid: Option<&str>,
    inner_uuid: Option<&str>,
    directive: Directive,
) -> RuleNode {
    let mut root = RuleNode::root();
    root.behaviors
        .push(Directive::new("origin").with_option("hostname", "origin.example.com"));
    let mut outer = rule("Performance", outer_uuid);
    let mut inner = rule("Compressible Objects", inner_uuid);
    inner.behaviors.push(directive);
    outer.add_child(inner);
    root.add_child(outer);
    root
}
