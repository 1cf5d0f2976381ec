//! Recipe discovery from the file system.

use crate::error::TrainingResult;
use crate::recipe::parse_package_directive;
use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipeEntry {
    pub path: PathBuf,
    /// Value of the `# @package` directive, if the file has one.
    pub package: Option<String>,
}

fn is_yaml(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "yaml" || ext == "yml")
}

/// Every `*.yaml`/`*.yml` file under `dir`, sorted by path.
///
/// Unreadable files are logged and skipped; contents are not parsed beyond
/// the package directive.
pub fn discover_recipes(dir: &Path) -> TrainingResult<Vec<RecipeEntry>> {
    if !dir.is_dir() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("recipe directory not found: {}", dir.display()),
        )
        .into());
    }

    let mut entries = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true).into_iter().filter_map(Result::ok) {
        let path = entry.path();
        if !entry.file_type().is_file() || !is_yaml(path) {
            continue;
        }
        match std::fs::read_to_string(path) {
            Ok(text) => entries.push(RecipeEntry { path: path.to_path_buf(), package: parse_package_directive(&text) }),
            Err(e) => tracing::debug!(path = %path.display(), error = %e, "skipping unreadable recipe"),
        }
    }
    entries.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(entries)
}
