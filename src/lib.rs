//! Endpoint OpenAPI Generator - OpenAPI documents from endpoint-marked Rust classes.
//!
//! This library statically analyzes Rust source code for structs carrying an
//! endpoint marker attribute, models their public methods as RPC-style
//! operations, resolves every entity type those operations transitively
//! reference, and emits a versioned OpenAPI document. Document assembly runs
//! through an ordered plugin pipeline, so the output can be extended or
//! rewritten without touching the scanning core.
//!
//! # Architecture
//!
//! The pipeline stages, in execution order:
//!
//! 1. [`scanner`] - Recursively scans the project directory for Rust files
//! 2. [`parser`] - Parses source files into syntax trees
//! 3. [`universe`] - Indexes declarations and resolves them into canonical models
//! 4. [`dependencies`] - Walks the transitive dependency graph from the roots
//! 5. [`pipeline`] / [`plugins`] - Ordered plugins assemble the document
//! 6. [`serializer`] - Serializes the document to YAML or JSON
//!
//! Supporting modules: [`model`] (canonical type models and signatures),
//! [`node`] (the traversal tree), [`registry`] (type substitution),
//! [`nullability`] (marker-driven nullability resolution), [`document`] (the
//! output form), [`config`] and [`error`].
//!
//! # Example Usage
//!
//! ```no_run
//! use openapi_from_endpoints::{
//!     config::ParserConfig,
//!     parser::AstParser,
//!     pipeline::EndpointParser,
//!     plugins::{BackbonePlugin, MarkerSanityPlugin, TransferTypesPlugin},
//!     scanner::ProjectScanner,
//!     serializer::serialize_yaml,
//!     universe::SourceUniverse,
//! };
//! use std::path::PathBuf;
//!
//! // Scan and parse the project
//! let scanner = ProjectScanner::new(PathBuf::from("./my-project"));
//! let scan_result = scanner.scan().unwrap();
//! let parse_results = AstParser::parse_files(&scan_result.sources);
//! let parsed_files: Vec<_> = parse_results.into_iter().filter_map(Result::ok).collect();
//!
//! // Build the type universe and run the pipeline
//! let mut universe = SourceUniverse::from_files(parsed_files);
//! let mut parser = EndpointParser::new(ParserConfig::default());
//! parser
//!     .add_plugin(Box::new(TransferTypesPlugin))
//!     .add_plugin(Box::new(MarkerSanityPlugin))
//!     .add_plugin(Box::new(BackbonePlugin));
//! let document = parser.parse(&mut universe).unwrap();
//!
//! // Serialize to YAML
//! let yaml = serialize_yaml(&document).unwrap();
//! println!("{}", yaml);
//! ```
//!
//! # Command-Line Interface
//!
//! For command-line usage, see the [`cli`] module which provides a complete
//! CLI application.

pub mod cli;
pub mod config;
pub mod dependencies;
pub mod document;
pub mod error;
pub mod model;
pub mod node;
pub mod nullability;
pub mod parser;
pub mod pipeline;
pub mod plugins;
pub mod registry;
pub mod scanner;
pub mod serializer;
pub mod universe;
