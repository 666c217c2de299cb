//! Type substitution: exact replacements and ordered predicate rules.
//!
//! The registry is populated during plugin setup, before any scanning
//! starts, and consulted exactly once per model, immediately before its node
//! is created. Every downstream consumer observes only the substituted
//! model.

use log::debug;
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::model::{CanonicalKey, Model};

type RulePredicate = Box<dyn Fn(&Model) -> bool>;
type RuleFactory = Box<dyn Fn(&Model) -> Model>;

/// A predicate/factory substitution rule. Rules are tried in registration
/// order; the first matching predicate wins.
pub struct MappingRule {
    pub name: String,
    predicate: RulePredicate,
    factory: RuleFactory,
}

impl MappingRule {
    pub fn new(
        name: impl Into<String>,
        predicate: impl Fn(&Model) -> bool + 'static,
        factory: impl Fn(&Model) -> Model + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            predicate: Box::new(predicate),
            factory: Box::new(factory),
        }
    }
}

/// Registry of type substitutions for one run.
#[derive(Default)]
pub struct MappingRegistry {
    replacements: HashMap<CanonicalKey, Model>,
    rules: Vec<MappingRule>,
}

impl MappingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an exact replacement for a canonical identity.
    ///
    /// # Errors
    ///
    /// Fails with `ConflictingMapping` if the identity already has a
    /// replacement; two plugins silently fighting over one type would make
    /// the output depend on setup order.
    pub fn replace_exact(&mut self, key: CanonicalKey, replacement: Model) -> Result<()> {
        if self.replacements.contains_key(&key) {
            return Err(Error::ConflictingMapping(key.to_string()));
        }
        debug!("Registered exact replacement for `{}`", key);
        self.replacements.insert(key, replacement);
        Ok(())
    }

    /// Appends a predicate rule. Rule order is evaluation order.
    pub fn add_rule(&mut self, rule: MappingRule) {
        debug!("Registered mapping rule `{}`", rule.name);
        self.rules.push(rule);
    }

    /// Substitutes a model, once.
    ///
    /// The exact replace-map is checked first; on a hit the rule set is
    /// never consulted. The returned model is not itself re-substituted.
    pub fn apply(&self, model: Model) -> Model {
        if let Some(replacement) = self.replacements.get(&model.key()) {
            debug!("Exact replacement hit for `{}`", model.key());
            return replacement.clone();
        }
        for rule in &self.rules {
            if (rule.predicate)(&model) {
                debug!("Mapping rule `{}` matched `{}`", rule.name, model.key());
                return (rule.factory)(&model);
            }
        }
        model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClassKind, ClassModel, SignatureModel};

    fn class(name: &str) -> Model {
        Model::Class(ClassModel {
            name: name.to_string(),
            kind: ClassKind::Object,
            markers: vec![],
            supertype: None,
            type_params: vec![],
            fields: vec![],
            methods: vec![],
        })
    }

    fn signature(name: &str) -> Model {
        Model::Signature(SignatureModel::named(name))
    }

    #[test]
    fn test_exact_replacement_wins_over_rules() {
        let mut registry = MappingRegistry::new();
        registry
            .replace_exact(class("Uuid").key(), signature("string"))
            .unwrap();
        // A rule that would also match Uuid, mapping it elsewhere.
        registry.add_rule(MappingRule::new(
            "catch-all",
            |_| true,
            |_| signature("wrong"),
        ));

        let substituted = registry.apply(class("Uuid"));
        assert_eq!(substituted, signature("string"));
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let mut registry = MappingRegistry::new();
        registry.add_rule(MappingRule::new(
            "first",
            |m| matches!(m, Model::Class(c) if c.name == "Target"),
            |_| signature("first"),
        ));
        registry.add_rule(MappingRule::new(
            "second",
            |m| matches!(m, Model::Class(c) if c.name == "Target"),
            |_| signature("second"),
        ));

        assert_eq!(registry.apply(class("Target")), signature("first"));
    }

    #[test]
    fn test_no_match_returns_original() {
        let mut registry = MappingRegistry::new();
        registry.add_rule(MappingRule::new(
            "narrow",
            |m| matches!(m, Model::Class(c) if c.name == "Other"),
            |_| signature("other"),
        ));

        let original = class("Untouched");
        assert_eq!(registry.apply(original.clone()), original);
    }

    #[test]
    fn test_conflicting_exact_replacement_rejected() {
        let mut registry = MappingRegistry::new();
        registry
            .replace_exact(class("Uuid").key(), signature("string"))
            .unwrap();
        let result = registry.replace_exact(class("Uuid").key(), signature("integer"));
        assert!(matches!(result, Err(Error::ConflictingMapping(_))));
    }
}
