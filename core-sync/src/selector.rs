//! Selection of the files a cycle should externalize.

use bridge_traits::vcs::FileChangeRecord;

/// Filters change records by extension allow-list and optional path prefix.
#[derive(Debug, Clone)]
pub struct ChangeSelector {
    allowed_extensions: Vec<String>,
    scope: Option<String>,
}

impl ChangeSelector {
    /// `allowed_extensions` are compared without leading dot and case-sensitively.
    pub fn new(allowed_extensions: Vec<String>, scope: Option<String>) -> Self {
        Self {
            allowed_extensions,
            scope: scope.filter(|s| !s.is_empty()),
        }
    }

    pub fn is_eligible(&self, path: &str) -> bool {
        let extension_allowed = extension(path)
            .is_some_and(|ext| self.allowed_extensions.iter().any(|allowed| allowed == ext));

        // Plain string prefix: scope `images` also matches `images2/a.png`.
        let in_scope = self
            .scope
            .as_deref()
            .map_or(true, |scope| path.starts_with(scope));

        extension_allowed && in_scope
    }

    /// Eligible records in input order.
    pub fn select(&self, records: &[FileChangeRecord]) -> Vec<FileChangeRecord> {
        records
            .iter()
            .filter(|record| self.is_eligible(&record.path))
            .cloned()
            .collect()
    }
}

/// Suffix after the last dot of the file name, ignoring a leading dot.
fn extension(path: &str) -> Option<&str> {
    let name = path.rsplit('/').next().unwrap_or(path);
    let stem_len = name.trim_start_matches('.').len();
    let name = &name[name.len() - stem_len..];
    name.rfind('.').map(|index| &name[index + 1..])
}

/// Convenience wrapper around [`ChangeSelector::select`].
pub fn select(
    records: &[FileChangeRecord],
    allowed_extensions: &[String],
    scope: Option<&str>,
) -> Vec<FileChangeRecord> {
    ChangeSelector::new(allowed_extensions.to_vec(), scope.map(str::to_string)).select(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(paths: &[&str]) -> Vec<FileChangeRecord> {
        paths.iter().map(|p| FileChangeRecord::new(*p)).collect()
    }

    fn paths(records: &[FileChangeRecord]) -> Vec<&str> {
        records.iter().map(|r| r.path.as_str()).collect()
    }

    fn exts(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_extension_filter_keeps_order() {
        let input = records(&["survey.gpkg", "images/img2.jpg", "img1.png", "notes.txt"]);
        let selected = select(&input, &exts(&["png", "jpg"]), None);
        assert_eq!(paths(&selected), vec!["images/img2.jpg", "img1.png"]);
    }

    #[test]
    fn test_extension_match_is_case_sensitive() {
        let input = records(&["a.PNG", "b.png"]);
        assert_eq!(paths(&select(&input, &exts(&["png"]), None)), vec!["b.png"]);
    }

    #[test]
    fn test_files_without_extension_are_skipped() {
        let input = records(&["README", ".png", "dir.png/file", "archive.tar.png"]);
        assert_eq!(
            paths(&select(&input, &exts(&["png"]), None)),
            vec!["archive.tar.png"]
        );
    }

    #[test]
    fn test_scope_is_plain_string_prefix() {
        let input = records(&["images/a.png", "images2/b.png", "other/images/c.png", "d.png"]);
        let selected = select(&input, &exts(&["png"]), Some("images"));
        assert_eq!(paths(&selected), vec!["images/a.png", "images2/b.png"]);
    }

    #[test]
    fn test_empty_scope_means_no_scope() {
        let input = records(&["a.png", "sub/b.png"]);
        assert_eq!(select(&input, &exts(&["png"]), Some("")).len(), 2);
    }

    #[test]
    fn test_extension_helper() {
        assert_eq!(extension("images/img2.jpg"), Some("jpg"));
        assert_eq!(extension(".hidden"), None);
        assert_eq!(extension("..hidden.png"), Some("png"));
        assert_eq!(extension("trailing."), Some(""));
    }
}
