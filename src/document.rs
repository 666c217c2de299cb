//! The output document and its single-run builder.
//!
//! The builder is mutated by plugins during traversal and is never visible
//! outside the run; only [`DocumentBuilder::finish`], called by the
//! orchestrator after a fully successful traversal, produces the immutable
//! [`ApiDocument`]. All sections preserve insertion order so unchanged input
//! serializes to byte-identical output.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::model::Scalar;

/// Document metadata section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Info {
    pub title: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Default for Info {
    fn default() -> Self {
        Self {
            title: "Generated API".to_string(),
            version: "1.0.0".to_string(),
            description: Some("API document generated from endpoint markers".to_string()),
        }
    }
}

/// An endpoint tag entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Operations under a single path. Endpoint invocations are always POST.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post: Option<Operation>,
}

/// A single callable operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tags: Vec<String>,
    #[serde(rename = "operationId", skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(rename = "requestBody", skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,
    pub responses: IndexMap<String, Response>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestBody {
    pub required: bool,
    pub content: IndexMap<String, MediaType>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaType {
    pub schema: Schema,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<IndexMap<String, MediaType>>,
}

/// A schema object: entity definitions, properties and inline shapes share
/// this one recursive form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schema {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<IndexMap<String, Schema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
    #[serde(
        rename = "additionalProperties",
        skip_serializing_if = "Option::is_none"
    )]
    pub additional_properties: Option<Box<Schema>>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    #[serde(rename = "$ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(rename = "allOf", skip_serializing_if = "Option::is_none")]
    pub all_of: Option<Vec<Schema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
}

impl Schema {
    pub fn object() -> Self {
        Schema {
            schema_type: Some("object".to_string()),
            properties: Some(IndexMap::new()),
            ..Default::default()
        }
    }

    /// A schema with no constraints, for shapes the model cannot express.
    pub fn untyped() -> Self {
        Schema {
            schema_type: Some("object".to_string()),
            ..Default::default()
        }
    }

    pub fn scalar(scalar: Scalar) -> Self {
        Schema {
            schema_type: Some(scalar.schema_type.to_string()),
            format: scalar.format.map(|f| f.to_string()),
            ..Default::default()
        }
    }

    pub fn reference(name: &str) -> Self {
        Schema {
            reference: Some(format!("#/components/schemas/{}", name)),
            ..Default::default()
        }
    }

    pub fn array(items: Schema) -> Self {
        Schema {
            schema_type: Some("array".to_string()),
            items: Some(Box::new(items)),
            ..Default::default()
        }
    }

    /// A string-keyed map with homogeneous values.
    pub fn map_of(values: Schema) -> Self {
        Schema {
            schema_type: Some("object".to_string()),
            additional_properties: Some(Box::new(values)),
            ..Default::default()
        }
    }

    pub fn enumeration(variants: Vec<String>) -> Self {
        Schema {
            schema_type: Some("string".to_string()),
            enum_values: Some(variants),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Components {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schemas: Option<IndexMap<String, Schema>>,
}

/// The finished, immutable document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiDocument {
    pub openapi: String,
    pub info: Info,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tags: Vec<Tag>,
    pub paths: IndexMap<String, PathItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<Components>,
}

/// Accumulates the document during one run.
pub struct DocumentBuilder {
    info: Info,
    tags: Vec<Tag>,
    paths: IndexMap<String, PathItem>,
    schemas: IndexMap<String, Schema>,
}

impl DocumentBuilder {
    pub fn new(info: Info) -> Self {
        Self {
            info,
            tags: Vec::new(),
            paths: IndexMap::new(),
            schemas: IndexMap::new(),
        }
    }

    pub fn add_tag(&mut self, tag: Tag) {
        self.tags.push(tag);
    }

    /// Registers an operation under its path. Paths are unique per run; a
    /// duplicate insertion keeps the first entry.
    pub fn add_operation(&mut self, path: String, operation: Operation) {
        self.paths
            .entry(path)
            .or_insert(PathItem { post: None })
            .post
            .get_or_insert(operation);
    }

    pub fn add_schema(&mut self, name: String, schema: Schema) {
        self.schemas.entry(name).or_insert(schema);
    }

    /// Consumes the builder into the immutable document. Only the
    /// orchestrator calls this, and only after the root exit completed
    /// without error.
    pub fn finish(self) -> ApiDocument {
        let components = if self.schemas.is_empty() {
            None
        } else {
            Some(Components { schemas: Some(self.schemas) })
        };
        ApiDocument {
            openapi: "3.0.1".to_string(),
            info: self.info,
            tags: self.tags,
            paths: self.paths,
            components,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::scalar_type;

    #[test]
    fn test_finish_without_schemas_omits_components() {
        let builder = DocumentBuilder::new(Info::default());
        let doc = builder.finish();
        assert_eq!(doc.openapi, "3.0.1");
        assert!(doc.components.is_none());
        assert!(doc.paths.is_empty());
    }

    #[test]
    fn test_schema_insertion_order_is_preserved() {
        let mut builder = DocumentBuilder::new(Info::default());
        builder.add_schema("Zeta".to_string(), Schema::object());
        builder.add_schema("Alpha".to_string(), Schema::object());
        builder.add_schema("Mid".to_string(), Schema::object());

        let doc = builder.finish();
        let schemas = doc.components.unwrap().schemas.unwrap();
        let names: Vec<&String> = schemas.keys().collect();
        assert_eq!(names, vec!["Zeta", "Alpha", "Mid"]);
    }

    #[test]
    fn test_duplicate_schema_keeps_first() {
        let mut builder = DocumentBuilder::new(Info::default());
        let mut first = Schema::object();
        first
            .properties
            .as_mut()
            .unwrap()
            .insert("id".to_string(), Schema::scalar(scalar_type("u64").unwrap()));
        builder.add_schema("Order".to_string(), first);
        builder.add_schema("Order".to_string(), Schema::untyped());

        let doc = builder.finish();
        let schemas = doc.components.unwrap().schemas.unwrap();
        assert!(schemas["Order"].properties.is_some());
    }

    #[test]
    fn test_reference_schema_shape() {
        let schema = Schema::reference("Order");
        assert_eq!(schema.reference.as_deref(), Some("#/components/schemas/Order"));
        assert!(schema.schema_type.is_none());
    }

    #[test]
    fn test_serialized_key_names() {
        let schema = Schema::array(Schema::reference("Order"));
        let json = serde_json::to_value(&schema).unwrap();
        assert_eq!(json["type"], "array");
        assert_eq!(json["items"]["$ref"], "#/components/schemas/Order");

        let map = Schema::map_of(Schema::scalar(scalar_type("String").unwrap()));
        let json = serde_json::to_value(&map).unwrap();
        assert_eq!(json["additionalProperties"]["type"], "string");
    }

    #[test]
    fn test_operation_path_entry() {
        let mut builder = DocumentBuilder::new(Info::default());
        builder.add_operation(
            "/Foo/bar".to_string(),
            Operation {
                summary: None,
                tags: vec!["Foo".to_string()],
                operation_id: Some("Foo_bar".to_string()),
                request_body: None,
                responses: IndexMap::new(),
            },
        );
        let doc = builder.finish();
        assert!(doc.paths.contains_key("/Foo/bar"));
        assert!(doc.paths["/Foo/bar"].post.is_some());
    }
}
