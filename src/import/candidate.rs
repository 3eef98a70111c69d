//! Candidate presentations and their on-disk locations.
//!
//! A candidate is one metadata row whose presentation has not been imported
//! yet. Every path the importer touches is derived from the four identifying
//! fields, so two candidates can only share a path if they share a row.

use std::path::{Path, PathBuf};

/// Name of the archive tree created under the root path.
pub const BACKUP_DIR: &str = "backup";

/// One expected presentation file and the row it should become.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CandidateInfo {
    pub publication_id: i32,
    pub component_id: i32,
    pub template_id: i32,
    pub output_format: String,
}

impl CandidateInfo {
    pub fn new(
        publication_id: i32,
        component_id: i32,
        template_id: i32,
        output_format: impl Into<String>,
    ) -> Self {
        Self {
            publication_id,
            component_id,
            template_id,
            output_format: output_format.into(),
        }
    }

    /// File extension for the output format.
    ///
    /// HTML and unknown formats map to an empty extension; those files are
    /// still looked up, with a bare trailing dot in their name.
    pub fn extension(&self) -> &'static str {
        match self.output_format.as_str() {
            "Plain Text" => "txt",
            "XML Document" | "XML Fragment" => "xml",
            _ => "",
        }
    }

    /// `dcp<template>_<component>.<extension>`
    pub fn filename(&self) -> String {
        format!(
            "dcp{}_{}.{}",
            self.template_id,
            self.component_id,
            self.extension()
        )
    }

    /// Forward-slash relative path of the source file, as written to the journal.
    pub fn relative_path(&self) -> String {
        format!(
            "pub{}/dcp/{}/{}",
            self.publication_id,
            self.extension(),
            self.filename()
        )
    }

    /// Location of the source file under `root`.
    pub fn file_path(&self, root: &Path) -> PathBuf {
        join_relative(root.to_path_buf(), &self.relative_path())
    }

    /// Location of the archived file under `root/backup`.
    pub fn backup_path(&self, root: &Path) -> PathBuf {
        join_relative(root.join(BACKUP_DIR), &self.relative_path())
    }
}

impl From<(i32, i32, i32, String)> for CandidateInfo {
    fn from(row: (i32, i32, i32, String)) -> Self {
        let (publication_id, component_id, template_id, output_format) = row;
        Self {
            publication_id,
            component_id,
            template_id,
            output_format,
        }
    }
}

// Empty segments (the extension directory of HTML output) collapse away.
fn join_relative(mut base: PathBuf, relative: &str) -> PathBuf {
    for segment in relative.split('/').filter(|s| !s.is_empty()) {
        base.push(segment);
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn candidate(format: &str) -> CandidateInfo {
        CandidateInfo::new(1, 7, 5, format)
    }

    #[test]
    fn extension_mapping_is_exact() {
        assert_eq!(candidate("Plain Text").extension(), "txt");
        assert_eq!(candidate("XML Document").extension(), "xml");
        assert_eq!(candidate("XML Fragment").extension(), "xml");
        assert_eq!(candidate("HTML").extension(), "");
        assert_eq!(candidate("Unknown").extension(), "");
        assert_eq!(candidate("plain text").extension(), "");
    }

    #[test]
    fn filename_keeps_trailing_dot_for_empty_extension() {
        assert_eq!(candidate("HTML").filename(), "dcp5_7.");
        assert_eq!(candidate("Plain Text").filename(), "dcp5_7.txt");
    }

    #[test]
    fn relative_path_layout() {
        assert_eq!(
            candidate("XML Document").relative_path(),
            "pub1/dcp/xml/dcp5_7.xml"
        );
        assert_eq!(candidate("HTML").relative_path(), "pub1/dcp//dcp5_7.");
    }

    #[test]
    fn file_and_backup_paths_share_the_relative_layout() {
        let root = Path::new("/data/dcp");
        let c = candidate("XML Fragment");

        assert_eq!(
            c.file_path(root),
            Path::new("/data/dcp/pub1/dcp/xml/dcp5_7.xml")
        );
        assert_eq!(
            c.backup_path(root),
            Path::new("/data/dcp/backup/pub1/dcp/xml/dcp5_7.xml")
        );
        assert_eq!(
            candidate("HTML").file_path(root),
            Path::new("/data/dcp/pub1/dcp/dcp5_7.")
        );
    }

    #[test]
    fn distinct_triples_never_collide() {
        let mut seen = HashSet::new();
        for publication in 1..6 {
            for component in 1..12 {
                for template in 1..12 {
                    let c = CandidateInfo::new(publication, component, template, "Plain Text");
                    assert!(
                        seen.insert(c.relative_path()),
                        "collision for {:?}",
                        c
                    );
                }
            }
        }
    }

    #[test]
    fn builds_from_query_row() {
        let c = CandidateInfo::from((3, 14, 15, "HTML".to_string()));
        assert_eq!(c, CandidateInfo::new(3, 14, 15, "HTML"));
    }
}
