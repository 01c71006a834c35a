//! Access rule index.
//!
//! The index maps request patterns to the access attributes the authorization decision
//! point requires. It is compiled once per chain from the declared intercept rules,
//! immutable afterwards, and queried on every request reaching the authorization stage.
//!
//! Lookup is first-match-wins with method precedence: rules declared for the request's
//! method are consulted before method-agnostic rules, and within each group the first
//! declared match decides. At compile time a later rule with an identical pattern,
//! method and syntax fully shadows the earlier one, replacing its attributes.

use http::Method;

use crate::matcher::PathMatcher;

/// An opaque authorization requirement attached to a matched request pattern.
///
/// The index never interprets attributes; evaluation belongs to the external decision
/// component. Literal tokens (role names) and boolean expression strings are kept
/// distinct so the decision component knows which evaluator to route them to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigAttribute {
    Literal(String),
    Expression(String),
}

impl ConfigAttribute {
    pub fn value(&self) -> &str {
        match self {
            ConfigAttribute::Literal(s) | ConfigAttribute::Expression(s) => s,
        }
    }

    pub fn is_expression(&self) -> bool {
        matches!(self, ConfigAttribute::Expression(_))
    }
}

/// One compiled intercept rule.
#[derive(Debug, Clone)]
pub struct AccessRule {
    pub matcher: PathMatcher,
    pub method: Option<Method>,
    pub attributes: Vec<ConfigAttribute>,
}

/// Ordered, immutable sequence of compiled access rules.
#[derive(Debug, Default)]
pub struct AccessRuleIndex {
    rules: Vec<AccessRule>,
}

impl AccessRuleIndex {
    /// Compile an index from rules in declaration order.
    ///
    /// A later rule fully shadows an earlier one only when pattern, syntax and method
    /// are all identical; the earlier rule's attributes are replaced in place.
    pub fn from_rules(rules: Vec<AccessRule>) -> Self {
        let mut compiled: Vec<AccessRule> = Vec::with_capacity(rules.len());
        for rule in rules {
            let shadowed = compiled
                .iter_mut()
                .find(|r| r.matcher.same_key(&rule.matcher) && r.method == rule.method);
            match shadowed {
                Some(existing) => existing.attributes = rule.attributes,
                None => compiled.push(rule),
            }
        }
        AccessRuleIndex { rules: compiled }
    }

    /// The attributes of the first rule matching the request.
    ///
    /// Rules declared for the request's method take precedence over method-agnostic
    /// ones; within each group declaration order decides. Returns an empty set when no
    /// rule matches; the caller decides what an empty requirement set means.
    pub fn attributes_for(&self, path: &str, method: &Method) -> Vec<ConfigAttribute> {
        let method_specific = self
            .rules
            .iter()
            .filter(|r| r.method.as_ref() == Some(method))
            .find(|r| r.matcher.matches(path));
        if let Some(rule) = method_specific {
            return rule.attributes.clone();
        }
        self.rules
            .iter()
            .filter(|r| r.method.is_none())
            .find(|r| r.matcher.matches(path))
            .map(|r| r.attributes.clone())
            .unwrap_or_default()
    }

    pub fn rules(&self) -> &[AccessRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
