use log::warn;
use std::path::PathBuf;
use walkdir::WalkDir;

use crate::error::Result;

/// Recursive source scanner over a project location set.
///
/// Walks the configured root directories and collects every `.rs` file,
/// skipping build output (`target`) and hidden directories. Inaccessible
/// entries are recorded as warnings; they never abort the scan.
pub struct ProjectScanner {
    roots: Vec<PathBuf>,
}

/// Result of a scan over the location set.
pub struct ScanResult {
    /// Discovered `.rs` files, in walk order.
    pub sources: Vec<PathBuf>,
    /// Messages for entries that could not be accessed.
    pub warnings: Vec<String>,
}

impl ProjectScanner {
    /// Creates a scanner over a single project root.
    pub fn new(root: PathBuf) -> Self {
        Self { roots: vec![root] }
    }

    /// Creates a scanner over several roots (a classpath-like location set).
    pub fn with_roots(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    /// Walks all roots and collects source files.
    ///
    /// # Errors
    ///
    /// Never fails for individual unreadable entries; those become warnings.
    pub fn scan(&self) -> Result<ScanResult> {
        let mut sources = Vec::new();
        let mut warnings = Vec::new();

        for root in &self.roots {
            for entry in WalkDir::new(root).into_iter().filter_entry(|e| {
                if e.path() == root {
                    return true;
                }
                let name = e.file_name().to_string_lossy();
                !name.starts_with('.') && name != "target"
            }) {
                match entry {
                    Ok(entry) => {
                        let path = entry.path();
                        if path.is_file()
                            && path.extension().and_then(|s| s.to_str()) == Some("rs")
                        {
                            sources.push(path.to_path_buf());
                        }
                    }
                    Err(e) => {
                        let warning = format!("failed to access path: {}", e);
                        warn!("{}", warning);
                        warnings.push(warning);
                    }
                }
            }
        }

        Ok(ScanResult { sources, warnings })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_scan_collects_rust_sources_only() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::write(root.join("endpoints.rs"), "pub struct Foo;").unwrap();
        fs::write(root.join("entities.rs"), "pub struct Baz;").unwrap();
        fs::write(root.join("notes.md"), "# notes").unwrap();

        let scanner = ProjectScanner::new(root.to_path_buf());
        let result = scanner.scan().unwrap();

        assert_eq!(result.sources.len(), 2);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_scan_skips_target_and_hidden_directories() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::create_dir(root.join("target")).unwrap();
        fs::write(root.join("target/generated.rs"), "pub struct Skip;").unwrap();
        fs::create_dir(root.join(".git")).unwrap();
        fs::write(root.join(".git/hook.rs"), "pub struct Skip;").unwrap();
        fs::write(root.join("main.rs"), "fn main() {}").unwrap();

        let scanner = ProjectScanner::new(root.to_path_buf());
        let result = scanner.scan().unwrap();

        assert_eq!(result.sources.len(), 1);
        assert_eq!(
            result.sources[0].file_name().unwrap().to_string_lossy(),
            "main.rs"
        );
    }

    #[test]
    fn test_scan_multiple_roots() {
        let dir_a = TempDir::new().unwrap();
        let dir_b = TempDir::new().unwrap();
        fs::write(dir_a.path().join("a.rs"), "pub struct A;").unwrap();
        fs::write(dir_b.path().join("b.rs"), "pub struct B;").unwrap();

        let scanner = ProjectScanner::with_roots(vec![
            dir_a.path().to_path_buf(),
            dir_b.path().to_path_buf(),
        ]);
        let result = scanner.scan().unwrap();

        assert_eq!(result.sources.len(), 2);
    }

    #[test]
    fn test_scan_nested_directories() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::create_dir_all(root.join("src/api")).unwrap();
        fs::write(root.join("src/lib.rs"), "").unwrap();
        fs::write(root.join("src/api/orders.rs"), "pub struct Order;").unwrap();

        let scanner = ProjectScanner::new(root.to_path_buf());
        let result = scanner.scan().unwrap();

        assert_eq!(result.sources.len(), 2);
    }

    #[test]
    fn test_scan_empty_root() {
        let temp_dir = TempDir::new().unwrap();
        let scanner = ProjectScanner::new(temp_dir.path().to_path_buf());
        let result = scanner.scan().unwrap();

        assert!(result.sources.is_empty());
        assert!(result.warnings.is_empty());
    }
}
