//! Endpoint OpenAPI Generator - command-line entry point.
//!
//! Scans a Rust project for endpoint-marked classes and generates an OpenAPI
//! document describing their callable operations and the entity types they
//! expose.
//!
//! # Usage
//!
//! ```bash
//! openapi-from-endpoints [OPTIONS] <PROJECT_PATH>
//! ```
//!
//! # Examples
//!
//! Generate YAML documentation:
//! ```bash
//! openapi-from-endpoints ./my-project -o openapi.yaml
//! ```
//!
//! Generate JSON documentation:
//! ```bash
//! openapi-from-endpoints ./my-project -f json -o openapi.json
//! ```

use anyhow::Result;
use clap::Parser;
use log::info;

use openapi_from_endpoints::cli;

fn main() -> Result<()> {
    // Parse args first so the verbose flag can pick the log level, then
    // validate after the logger is up.
    let parsed = cli::CliArgs::parse();

    let log_level = if parsed.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    info!("Endpoint OpenAPI Generator starting...");

    let args = cli::parse_args_from_parsed(parsed)?;
    cli::run(args)?;

    info!("Document generation completed successfully");

    Ok(())
}
