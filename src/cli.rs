use anyhow::Result;
use clap::{Parser, ValueEnum};
use log::{debug, info, warn};
use std::path::PathBuf;

/// Endpoint OpenAPI Generator - Generate OpenAPI documents from marked endpoint classes
#[derive(Parser, Debug)]
#[command(name = "openapi-from-endpoints")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to the Rust project directory
    #[arg(value_name = "PROJECT_PATH")]
    pub project_path: PathBuf,

    /// Output format (yaml or json)
    #[arg(short = 'f', long = "format", value_enum, default_value = "yaml")]
    pub output_format: OutputFormat,

    /// Output file path (if not specified, outputs to stdout)
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output_path: Option<PathBuf>,

    /// Configuration file (JSON or YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_path: Option<PathBuf>,

    /// Endpoint marker attribute name (overrides the config file)
    #[arg(long = "marker", value_name = "NAME")]
    pub endpoint_marker: Option<String>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

/// Output format options
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// YAML format
    Yaml,
    /// JSON format
    Json,
}

/// Parse command line arguments
pub fn parse_args() -> Result<CliArgs> {
    let args = CliArgs::parse();
    parse_args_from_parsed(args)
}

/// Validate and log already-parsed arguments
pub fn parse_args_from_parsed(args: CliArgs) -> Result<CliArgs> {
    debug!("Parsed arguments: {:?}", args);

    if !args.project_path.exists() {
        anyhow::bail!(
            "Project path does not exist: {}",
            args.project_path.display()
        );
    }
    if !args.project_path.is_dir() {
        anyhow::bail!(
            "Project path is not a directory: {}",
            args.project_path.display()
        );
    }
    if let Some(config) = &args.config_path {
        if !config.is_file() {
            anyhow::bail!("Configuration file does not exist: {}", config.display());
        }
    }

    info!("Project path: {}", args.project_path.display());
    info!("Output format: {:?}", args.output_format);
    if let Some(ref output) = args.output_path {
        info!("Output file: {}", output.display());
    } else {
        info!("Output: stdout");
    }

    Ok(args)
}

/// Run the main workflow
pub fn run(args: CliArgs) -> Result<()> {
    use crate::config::ParserConfig;
    use crate::parser::AstParser;
    use crate::pipeline::EndpointParser;
    use crate::plugins::{BackbonePlugin, MarkerSanityPlugin, TransferTypesPlugin};
    use crate::scanner::ProjectScanner;
    use crate::serializer::{serialize_json, serialize_yaml, write_to_file};
    use crate::universe::SourceUniverse;

    info!("Starting document generation...");

    // Step 1: Scan the project for Rust files
    info!("Scanning project directory...");
    let scanner = ProjectScanner::new(args.project_path.clone());
    let scan_result = scanner.scan()?;

    info!("Found {} Rust files", scan_result.sources.len());
    for warning in &scan_result.warnings {
        warn!("{}", warning);
    }
    if scan_result.sources.is_empty() {
        anyhow::bail!("No Rust files found in the project directory");
    }

    // Step 2: Parse the files into syntax trees
    info!("Parsing Rust files...");
    let parse_results = AstParser::parse_files(&scan_result.sources);
    let parsed_files: Vec<_> = parse_results.into_iter().filter_map(|r| r.ok()).collect();
    if parsed_files.is_empty() {
        anyhow::bail!("No Rust files could be parsed");
    }

    // Step 3: Build the type universe
    let mut universe = SourceUniverse::from_files(parsed_files);

    // Step 4: Load and finalize the configuration
    let mut config = match &args.config_path {
        Some(path) => ParserConfig::from_file(path)?,
        None => ParserConfig::default(),
    };
    if let Some(marker) = &args.endpoint_marker {
        config.endpoint_marker = marker.clone();
    }

    // Step 5: Run the plugin pipeline
    info!("Resolving endpoints and entities...");
    let mut parser = EndpointParser::new(config);
    parser
        .add_plugin(Box::new(TransferTypesPlugin))
        .add_plugin(Box::new(MarkerSanityPlugin))
        .add_plugin(Box::new(BackbonePlugin));
    let document = parser.parse(&mut universe)?;

    info!(
        "Generated document with {} path(s) and {} tag(s)",
        document.paths.len(),
        document.tags.len()
    );

    // Step 6: Serialize and write the output
    let output = match args.output_format {
        OutputFormat::Yaml => serialize_yaml(&document)?,
        OutputFormat::Json => serialize_json(&document)?,
    };
    match &args.output_path {
        Some(path) => {
            write_to_file(&output, path)?;
            info!("Document written to {}", path.display());
        }
        None => println!("{}", output),
    }

    Ok(())
}
