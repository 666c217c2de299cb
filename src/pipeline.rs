//! Plugin pipeline and the parser orchestrator.
//!
//! Plugins are sorted once at the start of a run and then invoked in three
//! phases: `setup` before scanning, `resolve`/`scan` while the dependency
//! graph is built, and `enter`/`exit` while the finished node tree is walked.
//! `exit` hooks run in reverse plugin order so that wrap/unwrap pairs nest.

use log::{debug, info};
use std::collections::{HashMap, HashSet};

use crate::config::ParserConfig;
use crate::dependencies::DependencyScanner;
use crate::document::{ApiDocument, DocumentBuilder};
use crate::error::{Error, Result};
use crate::model::{CanonicalKey, Model};
use crate::node::{NodeArena, NodeDependencies, NodeId, NodePath};
use crate::nullability::NullabilityResolver;
use crate::registry::MappingRegistry;
use crate::universe::SourceUniverse;

/// Mutable state shared by every plugin during one parser run.
///
/// A fresh storage is created per run, so plugins never observe state from a
/// previous invocation of the same parser.
pub struct SharedStorage {
    /// The node tree being built and walked.
    pub arena: NodeArena,
    /// The document under construction.
    pub document: DocumentBuilder,
    /// Type substitutions registered during setup.
    pub mappings: MappingRegistry,
    /// Resolver for nullability markers.
    pub nullability: NullabilityResolver,
    /// Canonical keys already materialized as nodes.
    pub seen: HashMap<CanonicalKey, NodeId>,
}

impl SharedStorage {
    pub fn new(config: &ParserConfig) -> Result<Self> {
        Ok(Self {
            arena: NodeArena::new(),
            document: DocumentBuilder::new(config.info.clone()),
            mappings: MappingRegistry::new(),
            nullability: NullabilityResolver::new(config.matchers.clone())?,
            seen: HashMap::new(),
        })
    }
}

/// A pipeline stage. All hooks have default no-op implementations, so a
/// plugin only implements the phases it cares about.
pub trait Plugin {
    /// Unique name within one parser.
    fn name(&self) -> &str;

    /// Sort weight. Lower priorities run earlier; ties keep registration
    /// order.
    fn priority(&self) -> i32 {
        0
    }

    /// Names of plugins that must be sorted before this one. Declaring a
    /// dependency that does not precede the plugin is a setup error.
    fn must_run_after(&self) -> Vec<String> {
        vec![]
    }

    /// Whether this plugin substitutes models. Substitution plugins must all
    /// sort before any non-substitution plugin.
    fn substitution(&self) -> bool {
        false
    }

    /// Called once before scanning. Plugins register mappings here.
    fn setup(&self, _registry: &mut MappingRegistry, _config: &ParserConfig) -> Result<()> {
        Ok(())
    }

    /// Called for each model right before a node is created for it. The
    /// returned model is what gets materialized.
    fn resolve(&self, model: Model, _parent: Option<&NodePath>) -> Result<Model> {
        Ok(model)
    }

    /// Called after the structural dependencies of a node have been computed,
    /// letting a plugin add or drop dependencies.
    fn scan(&self, deps: NodeDependencies, _model: &Model) -> Result<NodeDependencies> {
        Ok(deps)
    }

    /// Tree walk, parent before children.
    fn enter(&self, _path: &NodePath, _storage: &mut SharedStorage) -> Result<()> {
        Ok(())
    }

    /// Tree walk, children before parent. Runs in reverse plugin order.
    fn exit(&self, _path: &NodePath, _storage: &mut SharedStorage) -> Result<()> {
        Ok(())
    }
}

/// A plugin that delegates to an ordered group of children.
///
/// The group sorts as a single unit under the composite's own priority;
/// children keep their given order. Ordering constraints between children are
/// checked at construction time, and constraints on plugins outside the group
/// surface through [`CompositePlugin::must_run_after`].
pub struct CompositePlugin {
    name: String,
    priority: i32,
    children: Vec<Box<dyn Plugin>>,
}

impl CompositePlugin {
    /// # Errors
    ///
    /// Returns [`Error::PluginOrdering`] when a child requires another child
    /// that does not precede it in `children`.
    pub fn new(name: &str, priority: i32, children: Vec<Box<dyn Plugin>>) -> Result<Self> {
        let mut preceding: HashSet<String> = HashSet::new();
        let names: HashSet<String> = children.iter().map(|c| c.name().to_string()).collect();
        for child in &children {
            for dep in child.must_run_after() {
                if names.contains(&dep) && !preceding.contains(&dep) {
                    return Err(Error::PluginOrdering {
                        plugin: child.name().to_string(),
                        dependency: dep,
                    });
                }
            }
            preceding.insert(child.name().to_string());
        }
        Ok(Self {
            name: name.to_string(),
            priority,
            children,
        })
    }
}

impl Plugin for CompositePlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn must_run_after(&self) -> Vec<String> {
        // Constraints satisfied inside the group are not re-exported.
        let names: HashSet<String> = self.children.iter().map(|c| c.name().to_string()).collect();
        self.children
            .iter()
            .flat_map(|c| c.must_run_after())
            .filter(|dep| !names.contains(dep))
            .collect()
    }

    fn substitution(&self) -> bool {
        !self.children.is_empty() && self.children.iter().all(|c| c.substitution())
    }

    fn setup(&self, registry: &mut MappingRegistry, config: &ParserConfig) -> Result<()> {
        for child in &self.children {
            child.setup(registry, config)?;
        }
        Ok(())
    }

    fn resolve(&self, model: Model, parent: Option<&NodePath>) -> Result<Model> {
        let mut model = model;
        for child in &self.children {
            model = child.resolve(model, parent)?;
        }
        Ok(model)
    }

    fn scan(&self, deps: NodeDependencies, model: &Model) -> Result<NodeDependencies> {
        let mut deps = deps;
        for child in &self.children {
            deps = child.scan(deps, model)?;
        }
        Ok(deps)
    }

    fn enter(&self, path: &NodePath, storage: &mut SharedStorage) -> Result<()> {
        for child in &self.children {
            child.enter(path, storage)?;
        }
        Ok(())
    }

    fn exit(&self, path: &NodePath, storage: &mut SharedStorage) -> Result<()> {
        for child in self.children.iter().rev() {
            child.exit(path, storage)?;
        }
        Ok(())
    }
}

/// Orchestrates one or more parse runs over a source universe.
pub struct EndpointParser {
    config: ParserConfig,
    plugins: Vec<Box<dyn Plugin>>,
}

impl EndpointParser {
    pub fn new(config: ParserConfig) -> Self {
        Self {
            config,
            plugins: Vec::new(),
        }
    }

    /// Registers a plugin. Order of registration breaks priority ties.
    pub fn add_plugin(&mut self, plugin: Box<dyn Plugin>) -> &mut Self {
        self.plugins.push(plugin);
        self
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Sorts the registered plugins and validates the ordering constraints.
    ///
    /// # Errors
    ///
    /// * [`Error::DuplicatePlugin`] when two plugins share a name.
    /// * [`Error::PluginOrdering`] when a `must_run_after` dependency does not
    ///   precede its dependent, or a non-substitution plugin sorts before a
    ///   substitution plugin.
    fn sorted_plugins(&self) -> Result<Vec<&dyn Plugin>> {
        let mut sorted: Vec<&dyn Plugin> = self.plugins.iter().map(|p| p.as_ref()).collect();
        // Stable: registration order decides ties.
        sorted.sort_by_key(|p| p.priority());

        let mut seen_names: HashSet<&str> = HashSet::new();
        for plugin in &sorted {
            if !seen_names.insert(plugin.name()) {
                return Err(Error::DuplicatePlugin(plugin.name().to_string()));
            }
        }

        let mut preceding: HashSet<String> = HashSet::new();
        for plugin in &sorted {
            for dep in plugin.must_run_after() {
                if !preceding.contains(&dep) {
                    return Err(Error::PluginOrdering {
                        plugin: plugin.name().to_string(),
                        dependency: dep,
                    });
                }
            }
            preceding.insert(plugin.name().to_string());
        }

        // Every substitution plugin must sort before every builder plugin,
        // otherwise a builder could observe pre-substitution models.
        let mut first_builder: Option<&str> = None;
        for plugin in &sorted {
            if plugin.substitution() {
                if let Some(builder) = first_builder {
                    return Err(Error::PluginOrdering {
                        plugin: builder.to_string(),
                        dependency: plugin.name().to_string(),
                    });
                }
            } else if first_builder.is_none() {
                first_builder = Some(plugin.name());
            }
        }

        Ok(sorted)
    }

    /// Runs the full pipeline and produces the document.
    ///
    /// # Errors
    ///
    /// Propagates plugin validation errors, unresolved type references, and
    /// any error raised by a plugin hook.
    pub fn parse(&self, universe: &mut SourceUniverse) -> Result<ApiDocument> {
        self.config.validate()?;
        let plugins = self.sorted_plugins()?;
        info!(
            "Starting parse with {} plugin(s): {}",
            plugins.len(),
            plugins
                .iter()
                .map(|p| p.name())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let mut storage = SharedStorage::new(&self.config)?;
        for plugin in &plugins {
            debug!("Setting up plugin '{}'", plugin.name());
            plugin.setup(&mut storage.mappings, &self.config)?;
        }

        let scanner = DependencyScanner::new(&self.config);
        let root = scanner.scan(universe, &plugins, &mut storage)?;
        debug!("Dependency scan produced {} node(s)", storage.arena.len());

        let root_path = NodePath::root(root, storage.arena.node(root).model.label());
        Self::walk(&plugins, &root_path, &mut storage)?;

        Ok(storage.document.finish())
    }

    fn walk(plugins: &[&dyn Plugin], path: &NodePath, storage: &mut SharedStorage) -> Result<()> {
        for plugin in plugins {
            plugin.enter(path, storage)?;
        }
        let children = storage.arena.node(path.node_id()).children.clone();
        for child in children {
            let label = storage.arena.node(child).model.label();
            let child_path = path.child(child, label);
            Self::walk(plugins, &child_path, storage)?;
        }
        for plugin in plugins.iter().rev() {
            plugin.exit(path, storage)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct NamedPlugin {
        name: String,
        priority: i32,
        after: Vec<String>,
        substitution: bool,
        log: Option<Rc<RefCell<Vec<String>>>>,
    }

    impl NamedPlugin {
        fn new(name: &str, priority: i32) -> Self {
            Self {
                name: name.to_string(),
                priority,
                after: vec![],
                substitution: false,
                log: None,
            }
        }
    }

    impl Plugin for NamedPlugin {
        fn name(&self) -> &str {
            &self.name
        }
        fn priority(&self) -> i32 {
            self.priority
        }
        fn must_run_after(&self) -> Vec<String> {
            self.after.clone()
        }
        fn substitution(&self) -> bool {
            self.substitution
        }
        fn enter(&self, _path: &NodePath, _storage: &mut SharedStorage) -> Result<()> {
            if let Some(log) = &self.log {
                log.borrow_mut().push(format!("enter:{}", self.name));
            }
            Ok(())
        }
        fn exit(&self, _path: &NodePath, _storage: &mut SharedStorage) -> Result<()> {
            if let Some(log) = &self.log {
                log.borrow_mut().push(format!("exit:{}", self.name));
            }
            Ok(())
        }
    }

    #[test]
    fn test_duplicate_plugin_rejected() {
        let mut parser = EndpointParser::new(ParserConfig::default());
        parser.add_plugin(Box::new(NamedPlugin::new("alpha", 0)));
        parser.add_plugin(Box::new(NamedPlugin::new("alpha", 5)));
        match parser.sorted_plugins() {
            Err(Error::DuplicatePlugin(name)) => assert_eq!(name, "alpha"),
            other => panic!("expected duplicate plugin error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_priority_sort_is_stable() {
        let mut parser = EndpointParser::new(ParserConfig::default());
        parser.add_plugin(Box::new(NamedPlugin::new("second", 0)));
        parser.add_plugin(Box::new(NamedPlugin::new("third", 0)));
        parser.add_plugin(Box::new(NamedPlugin::new("first", -5)));
        let sorted = parser.sorted_plugins().unwrap();
        let names: Vec<&str> = sorted.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_unsatisfied_ordering_constraint() {
        let mut parser = EndpointParser::new(ParserConfig::default());
        let mut late = NamedPlugin::new("late", 0);
        late.after = vec!["early".to_string()];
        parser.add_plugin(Box::new(late));
        parser.add_plugin(Box::new(NamedPlugin::new("early", 10)));
        match parser.sorted_plugins() {
            Err(Error::PluginOrdering { plugin, dependency }) => {
                assert_eq!(plugin, "late");
                assert_eq!(dependency, "early");
            }
            other => panic!("expected ordering error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_substitution_must_precede_builders() {
        let mut parser = EndpointParser::new(ParserConfig::default());
        parser.add_plugin(Box::new(NamedPlugin::new("builder", -10)));
        let mut sub = NamedPlugin::new("rewrite", 0);
        sub.substitution = true;
        parser.add_plugin(Box::new(sub));
        match parser.sorted_plugins() {
            Err(Error::PluginOrdering { plugin, dependency }) => {
                assert_eq!(plugin, "builder");
                assert_eq!(dependency, "rewrite");
            }
            other => panic!("expected ordering error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_composite_validates_children_at_construction() {
        let mut needy = NamedPlugin::new("needy", 0);
        needy.after = vec!["provider".to_string()];
        let result = CompositePlugin::new(
            "group",
            0,
            vec![Box::new(needy), Box::new(NamedPlugin::new("provider", 0))],
        );
        assert!(matches!(result, Err(Error::PluginOrdering { .. })));
    }

    #[test]
    fn test_composite_reexports_external_constraints() {
        let mut needy = NamedPlugin::new("needy", 0);
        needy.after = vec!["outsider".to_string(), "sibling".to_string()];
        let composite = CompositePlugin::new(
            "group",
            0,
            vec![Box::new(NamedPlugin::new("sibling", 0)), Box::new(needy)],
        )
        .unwrap();
        assert_eq!(composite.must_run_after(), vec!["outsider".to_string()]);
    }

    #[test]
    fn test_composite_exit_runs_in_reverse() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut a = NamedPlugin::new("a", 0);
        a.log = Some(Rc::clone(&log));
        let mut b = NamedPlugin::new("b", 0);
        b.log = Some(Rc::clone(&log));
        let composite = CompositePlugin::new("group", 0, vec![Box::new(a), Box::new(b)]).unwrap();

        let config = ParserConfig::default();
        let mut storage = SharedStorage::new(&config).unwrap();
        let root = storage.arena.insert(crate::node::Node::new(
            Model::Class(crate::model::ClassModel::empty("<root>")),
            crate::node::Fragment::Root,
        ));
        let path = NodePath::root(root, "<root>".to_string());
        composite.enter(&path, &mut storage).unwrap();
        composite.exit(&path, &mut storage).unwrap();
        assert_eq!(
            *log.borrow(),
            vec!["enter:a", "enter:b", "exit:b", "exit:a"]
        );
    }
}
