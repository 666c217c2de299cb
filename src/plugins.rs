//! Built-in pipeline plugins.
//!
//! `TransferTypesPlugin` rewrites well-known external types into scalar
//! signatures before anything else sees them, `MarkerSanityPlugin` rejects
//! contradictory nullability markers, and `BackbonePlugin` assembles the
//! actual document.

use log::debug;

use crate::config::ParserConfig;
use crate::document::{MediaType, RequestBody, Response, Schema};
use crate::error::{Error, Result};
use crate::model::{scalar_type, ClassKind, Marker, Model, Polarity, SignatureModel};
use crate::node::{Fragment, NodePath};
use crate::pipeline::{Plugin, SharedStorage};
use crate::registry::{MappingRegistry, MappingRule};

const JSON_CONTENT: &str = "application/json";

/// Maps a signature onto its schema shape.
pub fn schema_for_signature(sig: &SignatureModel) -> Schema {
    match sig {
        SignatureModel::Named { name, .. } => {
            if let Some(scalar) = scalar_type(name) {
                Schema::scalar(scalar)
            } else if name == "unit" {
                Schema::untyped()
            } else {
                Schema::reference(name)
            }
        }
        SignatureModel::Array(inner) => Schema::array(schema_for_signature(inner)),
        SignatureModel::Optional(inner) => {
            let mut schema = schema_for_signature(inner);
            schema.nullable = Some(true);
            schema
        }
        SignatureModel::Map { value, .. } => Schema::map_of(schema_for_signature(value)),
        // Type variables and wildcards have no concrete shape; a wildcard
        // bound names a trait, which is never emitted as a schema.
        SignatureModel::TypeVar(_) | SignatureModel::Wildcard { .. } => Schema::untyped(),
    }
}

/// Markers visible at a node: its own, plus every ancestor's, nearest first.
fn visible_markers(path: &NodePath, storage: &SharedStorage) -> Vec<Marker> {
    let mut markers = Vec::new();
    let mut current = Some(path);
    while let Some(p) = current {
        markers.extend(
            storage
                .arena
                .node(p.node_id())
                .model
                .markers()
                .iter()
                .cloned(),
        );
        current = p.parent();
    }
    markers
}

/// The document assembler. Builds tags, operations and schemas from the node
/// tree; every other plugin runs before or after this one.
pub struct BackbonePlugin;

pub const BACKBONE_NAME: &str = "backbone";

impl Plugin for BackbonePlugin {
    fn name(&self) -> &str {
        BACKBONE_NAME
    }

    fn enter(&self, path: &NodePath, storage: &mut SharedStorage) -> Result<()> {
        let entry = storage.arena.node(path.node_id());
        if entry.is_reference {
            return Ok(());
        }
        let model = entry.model.clone();
        match entry.fragment.clone() {
            Fragment::Operation { .. } => {
                let Model::Method(method) = &model else {
                    return Ok(());
                };
                let summary = format!("Invokes {}.{}", method.enclosing, method.name);
                let operation_id = format!("{}_{}", method.enclosing, method.name);
                let tag = method.enclosing.clone();
                let response = match &method.return_signature {
                    Some(sig) => {
                        let mut schema = schema_for_signature(sig);
                        if sig.is_optional() {
                            schema.nullable = Some(true);
                        }
                        Response {
                            description: "Success".to_string(),
                            content: Some(
                                [(JSON_CONTENT.to_string(), MediaType { schema })]
                                    .into_iter()
                                    .collect(),
                            ),
                        }
                    }
                    None => Response {
                        description: "Success".to_string(),
                        content: None,
                    },
                };
                if let Fragment::Operation { operation, .. } =
                    &mut storage.arena.node_mut(path.node_id()).fragment
                {
                    operation.summary = Some(summary);
                    operation.operation_id = Some(operation_id);
                    operation.tags = vec![tag];
                    operation.responses.insert("200".to_string(), response);
                }
            }
            Fragment::Property { .. } => {
                let signature = match &model {
                    Model::Field(f) => f.signature.clone(),
                    Model::Parameter(p) => p.signature.clone(),
                    _ => return Ok(()),
                };
                let markers = visible_markers(path, storage);
                let nullable = signature.is_optional()
                    || storage.nullability.resolve(&markers) == Polarity::Nullable;
                let schema = schema_for_signature(&signature);
                if let Fragment::Property {
                    schema: slot,
                    required,
                    ..
                } = &mut storage.arena.node_mut(path.node_id()).fragment
                {
                    *slot = schema;
                    *required = !nullable;
                }
            }
            Fragment::Schema { .. } => {
                let Model::Class(class) = &model else {
                    return Ok(());
                };
                if let ClassKind::Enumeration { variants } = &class.kind {
                    let enum_schema = Schema::enumeration(variants.clone());
                    if let Fragment::Schema { schema, .. } =
                        &mut storage.arena.node_mut(path.node_id()).fragment
                    {
                        *schema = enum_schema;
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn exit(&self, path: &NodePath, storage: &mut SharedStorage) -> Result<()> {
        let node = storage.arena.node(path.node_id());
        if node.is_reference {
            return Ok(());
        }
        match node.fragment.clone() {
            Fragment::Tag(tag) => {
                debug!("Emitting tag '{}'", tag.name);
                storage.document.add_tag(tag);
            }
            Fragment::Operation { path: route, mut operation } => {
                let mut body = Schema::object();
                let mut required = Vec::new();
                for &child in &storage.arena.node(path.node_id()).children {
                    if let Fragment::Property {
                        name,
                        schema,
                        required: is_required,
                    } = &storage.arena.node(child).fragment
                    {
                        if let Some(props) = &mut body.properties {
                            props.insert(name.clone(), schema.clone());
                        }
                        if *is_required {
                            required.push(name.clone());
                        }
                    }
                }
                let has_params = body
                    .properties
                    .as_ref()
                    .map(|p| !p.is_empty())
                    .unwrap_or(false);
                if has_params {
                    if !required.is_empty() {
                        body.required = Some(required);
                    }
                    operation.request_body = Some(RequestBody {
                        required: true,
                        content: [(JSON_CONTENT.to_string(), MediaType { schema: body })]
                            .into_iter()
                            .collect(),
                    });
                }
                debug!("Emitting operation {}", route);
                storage.document.add_operation(route, operation);
            }
            Fragment::Schema { name, mut schema } => {
                if schema.enum_values.is_none() {
                    let mut properties = indexmap::IndexMap::new();
                    let mut required = Vec::new();
                    for &child in &storage.arena.node(path.node_id()).children {
                        if let Fragment::Property {
                            name: prop,
                            schema: prop_schema,
                            required: is_required,
                        } = &storage.arena.node(child).fragment
                        {
                            properties.insert(prop.clone(), prop_schema.clone());
                            if *is_required {
                                required.push(prop.clone());
                            }
                        }
                    }
                    if let Some(base_refs) = schema.all_of.take() {
                        // Subclass of an unexposed base: the own members go
                        // into a second allOf branch next to the base ref.
                        let mut own = Schema::object();
                        own.properties = Some(properties);
                        if !required.is_empty() {
                            own.required = Some(required);
                        }
                        let mut branches = base_refs;
                        branches.push(own);
                        schema = Schema {
                            all_of: Some(branches),
                            ..Default::default()
                        };
                    } else {
                        schema.properties = Some(properties);
                        if !required.is_empty() {
                            schema.required = Some(required);
                        }
                    }
                }
                debug!("Emitting schema '{}'", name);
                storage.document.add_schema(name, schema);
            }
            _ => {}
        }
        Ok(())
    }
}

/// Rewrites well-known external types into their wire representation before
/// the scan materializes nodes, so they never surface as unresolved entities.
pub struct TransferTypesPlugin;

impl TransferTypesPlugin {
    fn transfer_name(name: &str) -> Option<&'static str> {
        match name {
            "Uuid" | "DateTime" | "NaiveDate" | "NaiveDateTime" | "Duration" => Some("string"),
            "Decimal" => Some("f64"),
            _ => None,
        }
    }

    fn rewrite(sig: &SignatureModel) -> SignatureModel {
        match sig {
            SignatureModel::Named { name, args } => match Self::transfer_name(name) {
                Some(replacement) => SignatureModel::named(replacement),
                None => SignatureModel::Named {
                    name: name.clone(),
                    args: args.iter().map(Self::rewrite).collect(),
                },
            },
            SignatureModel::Array(inner) => {
                SignatureModel::Array(Box::new(Self::rewrite(inner)))
            }
            SignatureModel::Optional(inner) => {
                SignatureModel::Optional(Box::new(Self::rewrite(inner)))
            }
            SignatureModel::Map { key, value } => SignatureModel::Map {
                key: Box::new(Self::rewrite(key)),
                value: Box::new(Self::rewrite(value)),
            },
            SignatureModel::TypeVar(_) => sig.clone(),
            SignatureModel::Wildcard { bound } => SignatureModel::Wildcard {
                bound: bound.as_ref().map(|b| Box::new(Self::rewrite(b))),
            },
        }
    }

    fn needs_rewrite(sig: &SignatureModel) -> bool {
        sig.referenced_names()
            .iter()
            .any(|name| Self::transfer_name(name).is_some())
    }
}

impl Plugin for TransferTypesPlugin {
    fn name(&self) -> &str {
        "transfer-types"
    }

    fn priority(&self) -> i32 {
        -100
    }

    fn substitution(&self) -> bool {
        true
    }

    fn setup(&self, registry: &mut MappingRegistry, _config: &ParserConfig) -> Result<()> {
        registry.add_rule(MappingRule::new(
            "transfer-types",
            |model| match model {
                Model::Method(m) => {
                    m.return_signature
                        .as_ref()
                        .map(Self::needs_rewrite)
                        .unwrap_or(false)
                        || m.parameters.iter().any(|p| Self::needs_rewrite(&p.signature))
                }
                Model::Field(f) => Self::needs_rewrite(&f.signature),
                Model::Parameter(p) => Self::needs_rewrite(&p.signature),
                _ => false,
            },
            |model| match model {
                Model::Method(m) => {
                    let mut m = m.clone();
                    m.return_signature = m.return_signature.as_ref().map(Self::rewrite);
                    for p in &mut m.parameters {
                        p.signature = Self::rewrite(&p.signature);
                    }
                    Model::Method(m)
                }
                Model::Field(f) => {
                    let mut f = f.clone();
                    f.signature = Self::rewrite(&f.signature);
                    Model::Field(f)
                }
                Model::Parameter(p) => {
                    let mut p = p.clone();
                    p.signature = Self::rewrite(&p.signature);
                    Model::Parameter(p)
                }
                other => other.clone(),
            },
        ));
        Ok(())
    }
}

/// Fails the run when a model carries markers that resolve to both polarities
/// at the same strength, instead of silently picking one.
pub struct MarkerSanityPlugin;

impl Plugin for MarkerSanityPlugin {
    fn name(&self) -> &str {
        "marker-sanity"
    }

    fn priority(&self) -> i32 {
        -10
    }

    fn enter(&self, path: &NodePath, storage: &mut SharedStorage) -> Result<()> {
        let node = storage.arena.node(path.node_id());
        if node.is_reference {
            return Ok(());
        }
        if storage.nullability.conflicting(node.model.markers()) {
            return Err(Error::Validation {
                message: format!(
                    "conflicting nullability markers on {}",
                    node.model.label()
                ),
                chain: path.chain(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn named(name: &str) -> SignatureModel {
        SignatureModel::named(name)
    }

    #[test]
    fn test_schema_for_scalar_signature() {
        let schema = schema_for_signature(&named("i32"));
        assert_eq!(schema.schema_type.as_deref(), Some("integer"));
        assert_eq!(schema.format.as_deref(), Some("int32"));
    }

    #[test]
    fn test_schema_for_entity_reference() {
        let schema = schema_for_signature(&named("Order"));
        assert_eq!(
            schema.reference.as_deref(),
            Some("#/components/schemas/Order")
        );
    }

    #[test]
    fn test_schema_for_optional_array() {
        let sig = SignatureModel::Optional(Box::new(SignatureModel::Array(Box::new(named(
            "String",
        )))));
        let schema = schema_for_signature(&sig);
        assert_eq!(schema.schema_type.as_deref(), Some("array"));
        assert_eq!(schema.nullable, Some(true));
        assert_eq!(
            schema.items.as_ref().unwrap().schema_type.as_deref(),
            Some("string")
        );
    }

    #[test]
    fn test_schema_for_map_uses_value_shape() {
        let sig = SignatureModel::Map {
            key: Box::new(named("String")),
            value: Box::new(named("Order")),
        };
        let schema = schema_for_signature(&sig);
        assert_eq!(schema.schema_type.as_deref(), Some("object"));
        assert!(schema
            .additional_properties
            .as_ref()
            .unwrap()
            .reference
            .is_some());
    }

    #[test]
    fn test_schema_for_bounded_wildcard_is_untyped() {
        let sig = SignatureModel::Wildcard {
            bound: Some(Box::new(named("Printable"))),
        };
        let schema = schema_for_signature(&sig);
        assert_eq!(schema.schema_type.as_deref(), Some("object"));
        assert!(schema.reference.is_none());
        assert!(schema.properties.is_none());
    }

    #[test]
    fn test_transfer_rewrites_nested_occurrences() {
        let sig = SignatureModel::Array(Box::new(SignatureModel::Map {
            key: Box::new(named("String")),
            value: Box::new(named("Uuid")),
        }));
        let rewritten = TransferTypesPlugin::rewrite(&sig);
        assert_eq!(rewritten.serialize(), "array<map<String,string>>");
    }

    #[test]
    fn test_transfer_leaves_domain_types_alone() {
        let sig = named("Order");
        assert!(!TransferTypesPlugin::needs_rewrite(&sig));
        assert_eq!(TransferTypesPlugin::rewrite(&sig), sig);
    }
}
