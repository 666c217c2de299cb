use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Parser turning source files into `syn` syntax trees.
///
/// The trees are the raw material the type universe is built from; nothing
/// downstream touches the filesystem again after this stage.
pub struct AstParser;

/// A successfully parsed source file.
#[derive(Debug)]
pub struct ParsedFile {
    pub path: PathBuf,
    pub syntax_tree: syn::File,
}

impl AstParser {
    /// Parses one source file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or contains invalid Rust syntax.
    pub fn parse_file(path: &Path) -> Result<ParsedFile> {
        debug!("Parsing file: {}", path.display());

        let content = fs::read_to_string(path).map_err(|e| Error::ParseError {
            file: path.to_path_buf(),
            message: format!("failed to read file: {}", e),
        })?;

        let syntax_tree = syn::parse_file(&content).map_err(|e| Error::ParseError {
            file: path.to_path_buf(),
            message: e.to_string(),
        })?;

        Ok(ParsedFile {
            path: path.to_path_buf(),
            syntax_tree,
        })
    }

    /// Parses a batch of files, keeping per-file outcomes.
    ///
    /// A syntax error in one file does not stop the batch; the caller decides
    /// whether partial input is acceptable for the run.
    pub fn parse_files(paths: &[PathBuf]) -> Vec<Result<ParsedFile>> {
        debug!("Parsing {} files", paths.len());

        let results: Vec<Result<ParsedFile>> = paths
            .iter()
            .map(|path| match Self::parse_file(path) {
                Ok(parsed) => Ok(parsed),
                Err(e) => {
                    warn!("Failed to parse {}: {}", path.display(), e);
                    Err(e)
                }
            })
            .collect();

        let ok = results.iter().filter(|r| r.is_ok()).count();
        debug!("Parsing complete: {} succeeded, {} failed", ok, results.len() - ok);

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_temp_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let file_path = dir.path().join(name);
        fs::write(&file_path, content).unwrap();
        file_path
    }

    #[test]
    fn test_parse_valid_file() {
        let temp_dir = TempDir::new().unwrap();
        let code = r#"
            #[endpoint]
            pub struct OrderEndpoint;

            pub struct Order {
                pub id: u64,
            }
        "#;
        let path = create_temp_file(&temp_dir, "valid.rs", code);

        let parsed = AstParser::parse_file(&path).unwrap();
        assert_eq!(parsed.path, path);
        assert_eq!(parsed.syntax_tree.items.len(), 2);
    }

    #[test]
    fn test_parse_invalid_syntax() {
        let temp_dir = TempDir::new().unwrap();
        let path = create_temp_file(&temp_dir, "broken.rs", "pub struct Broken {");

        let result = AstParser::parse_file(&path);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("broken.rs"));
    }

    #[test]
    fn test_parse_missing_file() {
        let result = AstParser::parse_file(Path::new("/nonexistent/missing.rs"));
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_files_mixed_batch() {
        let temp_dir = TempDir::new().unwrap();
        let good = create_temp_file(&temp_dir, "good.rs", "pub struct Fine;");
        let bad = create_temp_file(&temp_dir, "bad.rs", "fn broken( {");

        let results = AstParser::parse_files(&[good, bad]);
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
    }

    #[test]
    fn test_parse_empty_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = create_temp_file(&temp_dir, "empty.rs", "");

        let parsed = AstParser::parse_file(&path).unwrap();
        assert!(parsed.syntax_tree.items.is_empty());
    }
}
