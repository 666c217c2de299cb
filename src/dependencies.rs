//! Breadth-first dependency scan: from the root endpoint set to the full
//! node tree.
//!
//! Every canonical identity is expanded exactly once per run; a second
//! encounter produces a reference node with no children, which keeps the
//! scan terminating on cyclic entity graphs. Roots are visited in name
//! order so the output does not depend on filesystem iteration order.

use log::{debug, info};
use std::collections::{HashSet, VecDeque};

use crate::config::ParserConfig;
use crate::document::{Operation, Schema, Tag};
use crate::error::{Error, Result};
use crate::model::{scalar_type, ClassKind, ClassModel, FieldModel, Model};
use crate::node::{Fragment, Node, NodeDependencies, NodeId, NodePath};
use crate::pipeline::{Plugin, SharedStorage};
use crate::registry::MappingRegistry;
use crate::universe::SourceUniverse;

/// The structural position a queued model was discovered in. Two class
/// models get different fragments depending on whether they were reached as
/// an endpoint or as a referenced entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Endpoint,
    Entity,
    Method,
    Field,
    Parameter,
}

struct WorkItem {
    model: Model,
    parent: NodeId,
    role: Role,
}

/// Builds the node tree for one run.
pub struct DependencyScanner<'a> {
    config: &'a ParserConfig,
}

impl<'a> DependencyScanner<'a> {
    pub fn new(config: &'a ParserConfig) -> Self {
        Self { config }
    }

    /// Scans from the configured roots and returns the synthetic root node.
    ///
    /// # Errors
    ///
    /// * [`Error::UnresolvedType`] when an explicit root or a referenced type
    ///   is not present in the universe.
    /// * [`Error::UnsupportedOrigin`] when a referenced type is a union or
    ///   trait declaration, or an `extends` chain revisits a name.
    pub fn scan(
        &self,
        universe: &mut SourceUniverse,
        plugins: &[&dyn Plugin],
        storage: &mut SharedStorage,
    ) -> Result<NodeId> {
        let mut roots = match &self.config.roots {
            Some(explicit) => explicit.clone(),
            None => universe.endpoint_names(&self.config.endpoint_marker),
        };
        roots.sort();
        roots.dedup();
        info!("Scanning {} root endpoint(s): {:?}", roots.len(), roots);

        let root_id = storage.arena.insert(Node::new(
            Model::Class(ClassModel::empty("<root>")),
            Fragment::Root,
        ));
        let root_path = NodePath::root(root_id, "<root>");
        let mut paths: Vec<NodePath> = vec![root_path];

        let mut queue: VecDeque<WorkItem> = VecDeque::new();
        for name in &roots {
            let class = universe.resolve_class(name)?.ok_or_else(|| Error::UnresolvedType {
                referrer: "<root>".to_string(),
                missing: name.clone(),
            })?;
            queue.push_back(WorkItem {
                model: Model::Class(class),
                parent: root_id,
                role: Role::Endpoint,
            });
        }

        while let Some(item) = queue.pop_front() {
            let mut model = storage.mappings.apply(item.model);
            let parent_path = paths[item.parent.0].clone();
            for plugin in plugins {
                model = plugin.resolve(model, Some(&parent_path))?;
            }

            let key = model.key();
            if let Some(&target) = storage.seen.get(&key) {
                debug!("Re-encountered {}, inserting reference", model.label());
                let target_label = storage.arena.node(target).model.label();
                let node = storage.arena.insert(Node::reference(model, target_label));
                storage.arena.add_child(item.parent, node);
                paths.push(parent_path.child(node, storage.arena.node(node).model.label()));
                continue;
            }

            let label = model.label();
            let (fragment, mut deps) =
                self.expand(universe, &model, item.role, &storage.mappings)?;
            for plugin in plugins {
                deps = plugin.scan(deps, &model)?;
            }

            let node = storage.arena.insert(Node::new(model, fragment));
            storage.seen.insert(key, node);
            storage.arena.add_child(item.parent, node);
            paths.push(parent_path.child(node, label));

            for child in deps.children {
                let role = match &child {
                    Model::Method(_) => Role::Method,
                    Model::Field(_) => Role::Field,
                    Model::Parameter(_) => Role::Parameter,
                    Model::Class(_) | Model::Signature(_) => Role::Entity,
                };
                queue.push_back(WorkItem {
                    model: child,
                    parent: node,
                    role,
                });
            }
            // Extra dependencies are referenced entities; they hang off the
            // root so operation subtrees stay flat.
            for extra in deps.extras {
                queue.push_back(WorkItem {
                    model: extra,
                    parent: root_id,
                    role: Role::Entity,
                });
            }
        }

        Ok(root_id)
    }

    /// Computes the skeleton fragment and structural dependencies of one
    /// freshly discovered model.
    fn expand(
        &self,
        universe: &mut SourceUniverse,
        model: &Model,
        role: Role,
        mappings: &MappingRegistry,
    ) -> Result<(Fragment, NodeDependencies)> {
        match (model, role) {
            (Model::Class(class), Role::Endpoint) => {
                let fragment = Fragment::Tag(Tag {
                    name: class.name.clone(),
                    description: None,
                });
                let children = class
                    .methods
                    .iter()
                    .cloned()
                    .map(Model::Method)
                    .collect();
                Ok((fragment, NodeDependencies { children, extras: vec![] }))
            }
            (Model::Class(class), _) => self.expand_entity(universe, class, mappings),
            (Model::Method(method), _) => {
                let fragment = Fragment::Operation {
                    path: format!("/{}/{}", method.enclosing, method.name),
                    operation: Operation {
                        summary: None,
                        tags: Vec::new(),
                        operation_id: None,
                        request_body: None,
                        responses: Default::default(),
                    },
                };
                let children: Vec<Model> = method
                    .parameters
                    .iter()
                    .cloned()
                    .map(Model::Parameter)
                    .collect();
                let mut extras = Vec::new();
                for parameter in &method.parameters {
                    self.referenced_entities(universe, model, &parameter.signature.referenced_names(), &mut extras)?;
                }
                if let Some(ret) = &method.return_signature {
                    self.referenced_entities(universe, model, &ret.referenced_names(), &mut extras)?;
                }
                Ok((fragment, NodeDependencies { children, extras }))
            }
            (Model::Field(field), _) => {
                let fragment = Fragment::Property {
                    name: field.name.clone(),
                    schema: Schema::default(),
                    required: true,
                };
                let mut extras = Vec::new();
                self.referenced_entities(universe, model, &field.signature.referenced_names(), &mut extras)?;
                Ok((fragment, NodeDependencies { children: vec![], extras }))
            }
            (Model::Parameter(parameter), _) => {
                let fragment = Fragment::Property {
                    name: parameter.name.clone(),
                    schema: Schema::default(),
                    required: true,
                };
                // Parameter types were already pulled in by the enclosing
                // method, so parameters carry no extras of their own.
                Ok((fragment, NodeDependencies { children: vec![], extras: vec![] }))
            }
            (Model::Signature(sig), _) => Err(Error::UnresolvedType {
                referrer: "<scanner>".to_string(),
                missing: sig.serialize(),
            }),
        }
    }

    /// Expands an entity class: folds exposed supertype members into the
    /// subclass, turns an unexposed supertype into an `allOf` reference.
    fn expand_entity(
        &self,
        universe: &mut SourceUniverse,
        class: &ClassModel,
        mappings: &MappingRegistry,
    ) -> Result<(Fragment, NodeDependencies)> {
        if let ClassKind::Enumeration { .. } = class.kind {
            let fragment = Fragment::Schema {
                name: class.name.clone(),
                schema: Schema::default(),
            };
            return Ok((fragment, NodeDependencies { children: vec![], extras: vec![] }));
        }

        let (fields, unexposed_base) = self.folded_fields(universe, class)?;

        let mut schema = Schema::object();
        let mut extras = Vec::new();
        if let Some(base_name) = unexposed_base {
            schema.all_of = Some(vec![Schema::reference(&base_name)]);
            let base = universe.resolve_class(&base_name)?.ok_or_else(|| {
                Error::UnresolvedType {
                    referrer: class.name.clone(),
                    missing: base_name.clone(),
                }
            })?;
            extras.push(Model::Class(base));
        }

        let mut children = Vec::new();
        for field in &fields {
            // Substitute before collecting references, so rewritten external
            // types never surface as unresolved entities.
            let as_model = mappings.apply(Model::Field(field.clone()));
            if let Model::Field(mapped) = &as_model {
                self.referenced_entities(
                    universe,
                    &as_model,
                    &mapped.signature.referenced_names(),
                    &mut extras,
                )?;
            }
            children.push(as_model);
        }

        let fragment = Fragment::Schema {
            name: class.name.clone(),
            schema,
        };
        Ok((fragment, NodeDependencies { children, extras }))
    }

    /// Collects the member fields of `class`, ascending the supertype chain
    /// while bases carry the exposed marker. Base fields come first; a
    /// same-named subclass field overrides the inherited one in place.
    /// Returns the first unexposed base, if any.
    fn folded_fields(
        &self,
        universe: &mut SourceUniverse,
        class: &ClassModel,
    ) -> Result<(Vec<FieldModel>, Option<String>)> {
        let mut chain = vec![class.clone()];
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(class.name.clone());
        let mut next_base = class.supertype.clone();
        let mut unexposed = None;
        while let Some(base_name) = next_base {
            if !visited.insert(base_name.clone()) {
                return Err(Error::UnsupportedOrigin(format!(
                    "`{}` has a cyclic supertype chain through `{}`",
                    class.name, base_name
                )));
            }
            let base = universe.resolve_class(&base_name)?.ok_or_else(|| {
                Error::UnresolvedType {
                    referrer: class.name.clone(),
                    missing: base_name.clone(),
                }
            })?;
            if base
                .markers
                .iter()
                .any(|m| m.name == self.config.exposed_marker)
            {
                next_base = base.supertype.clone();
                chain.push(base);
            } else {
                unexposed = Some(base_name);
                break;
            }
        }

        let mut fields: Vec<FieldModel> = Vec::new();
        for member in chain.iter().rev() {
            for field in &member.fields {
                // Inherited fields adopt the subclass identity so each
                // folding class owns a distinct property node.
                let mut field = field.clone();
                field.enclosing = class.name.clone();
                if let Some(existing) = fields.iter_mut().find(|f| f.name == field.name) {
                    *existing = field;
                } else {
                    fields.push(field);
                }
            }
        }
        Ok((fields, unexposed))
    }

    /// Resolves every non-scalar named type in `names` and appends the
    /// resulting class models to `extras`.
    fn referenced_entities(
        &self,
        universe: &mut SourceUniverse,
        referrer: &Model,
        names: &[&str],
        extras: &mut Vec<Model>,
    ) -> Result<()> {
        for name in names {
            if scalar_type(name).is_some() || *name == "unit" {
                continue;
            }
            let class = universe.resolve_class(name)?.ok_or_else(|| {
                Error::UnresolvedType {
                    referrer: referrer.label(),
                    missing: (*name).to_string(),
                }
            })?;
            extras.push(Model::Class(class));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ParsedFile;
    use std::path::PathBuf;

    fn universe_from(code: &str) -> SourceUniverse {
        let syntax_tree = syn::parse_file(code).unwrap();
        SourceUniverse::from_files(vec![ParsedFile {
            path: PathBuf::from("test.rs"),
            syntax_tree,
        }])
    }

    fn scan(code: &str) -> (SharedStorage, NodeId) {
        let config = ParserConfig::default();
        let mut universe = universe_from(code);
        let mut storage = SharedStorage::new(&config).unwrap();
        let scanner = DependencyScanner::new(&config);
        let root = scanner.scan(&mut universe, &[], &mut storage).unwrap();
        (storage, root)
    }

    fn labels(storage: &SharedStorage, id: NodeId) -> Vec<String> {
        storage
            .arena
            .node(id)
            .children
            .iter()
            .map(|&c| storage.arena.node(c).model.label())
            .collect()
    }

    #[test]
    fn test_endpoint_methods_become_children() {
        let (storage, root) = scan(
            r#"
            #[endpoint]
            pub struct OrderEndpoint;
            impl OrderEndpoint {
                pub fn list(&self) -> Vec<Order> { vec![] }
            }
            pub struct Order { pub id: u64 }
            "#,
        );
        let top = labels(&storage, root);
        assert!(top.contains(&"OrderEndpoint".to_string()));
        assert!(top.contains(&"Order".to_string()));

        let endpoint = storage.arena.node(root).children[0];
        assert_eq!(labels(&storage, endpoint), vec!["OrderEndpoint.list"]);
    }

    #[test]
    fn test_reencounter_becomes_reference() {
        let (storage, root) = scan(
            r#"
            #[endpoint]
            pub struct Api;
            impl Api {
                pub fn a(&self) -> Order { unimplemented!() }
                pub fn b(&self) -> Order { unimplemented!() }
            }
            pub struct Order { pub id: u64 }
            "#,
        );
        let order_nodes: Vec<bool> = (0..storage.arena.len())
            .map(NodeId)
            .filter(|&id| storage.arena.node(id).model.label() == "Order")
            .map(|id| storage.arena.node(id).is_reference)
            .collect();
        assert_eq!(order_nodes.len(), 2);
        assert_eq!(order_nodes.iter().filter(|r| !**r).count(), 1);
        let _ = root;
    }

    #[test]
    fn test_cyclic_entities_terminate() {
        let (storage, _) = scan(
            r#"
            #[endpoint]
            pub struct Api;
            impl Api {
                pub fn get(&self) -> A { unimplemented!() }
            }
            pub struct A { pub b: Option<Box<B>> }
            pub struct B { pub a: Option<Box<A>> }
            "#,
        );
        // One materialized node each for A and B, plus references.
        let expanded: Vec<String> = (0..storage.arena.len())
            .map(NodeId)
            .filter(|&id| !storage.arena.node(id).is_reference)
            .map(|id| storage.arena.node(id).model.label())
            .collect();
        assert_eq!(expanded.iter().filter(|l| *l == "A").count(), 1);
        assert_eq!(expanded.iter().filter(|l| *l == "B").count(), 1);
    }

    #[test]
    fn test_exposed_supertype_fields_fold_base_first() {
        let (storage, _) = scan(
            r#"
            #[endpoint]
            pub struct Api;
            impl Api {
                pub fn get(&self) -> Dog { unimplemented!() }
            }
            #[extends(Animal)]
            pub struct Dog { pub breed: String }
            #[exposed]
            pub struct Animal { pub name: String }
            "#,
        );
        let dog = (0..storage.arena.len())
            .map(NodeId)
            .find(|&id| storage.arena.node(id).model.label() == "Dog")
            .unwrap();
        let props = labels(&storage, dog);
        assert_eq!(props, vec!["Dog.name", "Dog.breed"]);
    }

    #[test]
    fn test_cyclic_supertype_chain_is_an_error() {
        let config = ParserConfig::default();
        let mut universe = universe_from(
            r#"
            #[endpoint]
            pub struct Api;
            impl Api {
                pub fn get(&self) -> A { unimplemented!() }
            }
            #[exposed]
            #[extends(B)]
            pub struct A { pub left: String }
            #[exposed]
            #[extends(A)]
            pub struct B { pub right: String }
            "#,
        );
        let mut storage = SharedStorage::new(&config).unwrap();
        let scanner = DependencyScanner::new(&config);
        match scanner.scan(&mut universe, &[], &mut storage) {
            Err(Error::UnsupportedOrigin(msg)) => {
                assert!(msg.contains("cyclic supertype chain"), "{}", msg);
            }
            other => panic!("expected a fatal error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_trait_object_field_needs_no_entity_resolution() {
        let (storage, _) = scan(
            r#"
            #[endpoint]
            pub struct Api;
            impl Api {
                pub fn get(&self) -> Holder { unimplemented!() }
            }
            pub struct Holder { pub value: Box<dyn Printable> }
            pub trait Printable {}
            "#,
        );
        let holder = (0..storage.arena.len())
            .map(NodeId)
            .find(|&id| storage.arena.node(id).model.label() == "Holder")
            .unwrap();
        assert_eq!(labels(&storage, holder), vec!["Holder.value"]);
        // The bound trait never materializes as a node of its own.
        assert!(!(0..storage.arena.len())
            .map(NodeId)
            .any(|id| storage.arena.node(id).model.label() == "Printable"));
    }

    #[test]
    fn test_unexposed_supertype_becomes_all_of() {
        let (storage, _) = scan(
            r#"
            #[endpoint]
            pub struct Api;
            impl Api {
                pub fn get(&self) -> Dog { unimplemented!() }
            }
            #[extends(Animal)]
            pub struct Dog { pub breed: String }
            pub struct Animal { pub name: String }
            "#,
        );
        let dog = (0..storage.arena.len())
            .map(NodeId)
            .find(|&id| {
                storage.arena.node(id).model.label() == "Dog"
                    && !storage.arena.node(id).is_reference
            })
            .unwrap();
        match &storage.arena.node(dog).fragment {
            Fragment::Schema { schema, .. } => {
                let all_of = schema.all_of.as_ref().unwrap();
                assert_eq!(
                    all_of[0].reference.as_deref(),
                    Some("#/components/schemas/Animal")
                );
            }
            other => panic!("expected schema fragment, got {:?}", other),
        }
        // The base is expanded as its own entity.
        assert!((0..storage.arena.len())
            .map(NodeId)
            .any(|id| storage.arena.node(id).model.label() == "Animal"
                && !storage.arena.node(id).is_reference));
    }

    #[test]
    fn test_unresolved_reference_is_an_error() {
        let config = ParserConfig::default();
        let mut universe = universe_from(
            r#"
            #[endpoint]
            pub struct Api;
            impl Api {
                pub fn get(&self) -> Missing { unimplemented!() }
            }
            "#,
        );
        let mut storage = SharedStorage::new(&config).unwrap();
        let scanner = DependencyScanner::new(&config);
        match scanner.scan(&mut universe, &[], &mut storage) {
            Err(Error::UnresolvedType { referrer, missing }) => {
                assert_eq!(referrer, "Api.get");
                assert_eq!(missing, "Missing");
            }
            other => panic!("expected unresolved type, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_explicit_roots_override_marker_scan() {
        let config = ParserConfig {
            roots: Some(vec!["Plain".to_string()]),
            ..Default::default()
        };
        let mut universe = universe_from(
            r#"
            pub struct Plain;
            impl Plain {
                pub fn ping(&self) {}
            }
            "#,
        );
        let mut storage = SharedStorage::new(&config).unwrap();
        let scanner = DependencyScanner::new(&config);
        let root = scanner.scan(&mut universe, &[], &mut storage).unwrap();
        assert_eq!(storage.arena.node(root).children.len(), 1);
    }

    #[test]
    fn test_roots_visit_in_name_order() {
        let (storage, root) = scan(
            r#"
            #[endpoint]
            pub struct Zulu;
            #[endpoint]
            pub struct Alpha;
            "#,
        );
        assert_eq!(labels(&storage, root), vec!["Alpha", "Zulu"]);
    }
}
