use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::utils::find_json_files;

const BUNDLED_CORPUS: &str = include_str!("../data/vacuum-knowledge.json");

/// Errors raised while loading the knowledge corpus.
///
/// Every variant is fatal: a record that cannot be read is never skipped.
#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("knowledge path not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corpus {origin} is not a JSON array of records: {source}")]
    NotAnArray {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("record {index} in {origin} is malformed: {source}")]
    Malformed {
        origin: String,
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("record {index} in {origin} has an empty `{field}`")]
    EmptyField {
        origin: String,
        index: usize,
        field: &'static str,
    },
}

/// One fault scenario from the knowledge base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeItem {
    pub issue: String,
    pub causes: Vec<String>,
    pub actions: Vec<String>,
}

impl KnowledgeItem {
    pub fn new(
        issue: impl Into<String>,
        causes: impl IntoIterator<Item = impl Into<String>>,
        actions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            issue: issue.into(),
            causes: causes.into_iter().map(Into::into).collect(),
            actions: actions.into_iter().map(Into::into).collect(),
        }
    }

    /// Flattened text used both for indexing and as the retrieved snippet.
    pub fn chunk_text(&self) -> String {
        format!(
            "Issue: {}\nCauses: {}\nActions: {}\n",
            self.issue,
            self.causes.join(", "),
            self.actions.join(", ")
        )
    }
}

/// Parses a JSON array of knowledge records, rejecting the whole corpus on the
/// first malformed record.
pub fn parse_corpus(json: &str) -> Result<Vec<KnowledgeItem>, CorpusError> {
    parse_records(json, "<inline>")
}

/// The vacuum pump knowledge base compiled into the binary.
pub fn bundled_corpus() -> Result<Vec<KnowledgeItem>, CorpusError> {
    parse_records(BUNDLED_CORPUS, "<bundled>")
}

/// Loads a corpus from a JSON file, or from every `.json` file under a
/// directory (sorted by path, records concatenated).
pub fn load_corpus(path: impl AsRef<Path>) -> Result<Vec<KnowledgeItem>, CorpusError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(CorpusError::NotFound(path.to_path_buf()));
    }

    let files = if path.is_dir() {
        find_json_files(path).map_err(|source| CorpusError::Io {
            path: path.to_path_buf(),
            source,
        })?
    } else {
        vec![path.to_path_buf()]
    };

    let mut items = Vec::new();
    for file in files {
        let content = fs::read_to_string(&file).map_err(|source| CorpusError::Io {
            path: file.clone(),
            source,
        })?;
        let records = parse_records(&content, &file.display().to_string())?;
        debug!("Loaded {} knowledge records from {}", records.len(), file.display());
        items.extend(records);
    }

    info!("Knowledge corpus loaded: {} records from {}", items.len(), path.display());
    Ok(items)
}

fn parse_records(json: &str, origin: &str) -> Result<Vec<KnowledgeItem>, CorpusError> {
    // Decode record by record so errors can name the offending index
    let raw: Vec<serde_json::Value> =
        serde_json::from_str(json).map_err(|source| CorpusError::NotAnArray {
            origin: origin.to_string(),
            source,
        })?;

    raw.into_iter()
        .enumerate()
        .map(|(index, value)| {
            let item: KnowledgeItem =
                serde_json::from_value(value).map_err(|source| CorpusError::Malformed {
                    origin: origin.to_string(),
                    index,
                    source,
                })?;
            if item.issue.trim().is_empty() {
                return Err(CorpusError::EmptyField {
                    origin: origin.to_string(),
                    index,
                    field: "issue",
                });
            }
            Ok(item)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_chunk_text_format() {
        let item = KnowledgeItem::new(
            "Pump overheating",
            ["blocked filter", "low coolant"],
            ["clean filter", "check coolant"],
        );
        assert_eq!(
            item.chunk_text(),
            "Issue: Pump overheating\nCauses: blocked filter, low coolant\nActions: clean filter, check coolant\n"
        );
    }

    #[test]
    fn test_parse_corpus_accepts_valid_records() {
        let json = r#"[
            {"issue": "Low oil", "causes": ["oil leak"], "actions": ["refill oil"]},
            {"issue": "Pump not running", "causes": [], "actions": ["check power supply"]}
        ]"#;
        let items = parse_corpus(json).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].issue, "Low oil");
        assert!(items[1].causes.is_empty());
    }

    #[test]
    fn test_parse_corpus_rejects_missing_field() {
        let json = r#"[
            {"issue": "Low oil", "causes": ["oil leak"], "actions": ["refill oil"]},
            {"issue": "Noise", "causes": ["worn bearing"]}
        ]"#;
        match parse_corpus(json) {
            Err(CorpusError::Malformed { index, source, .. }) => {
                assert_eq!(index, 1);
                assert!(source.to_string().contains("actions"));
            }
            other => panic!("expected malformed record error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_corpus_rejects_blank_issue() {
        let json = r#"[{"issue": "  ", "causes": ["x"], "actions": ["y"]}]"#;
        assert!(matches!(
            parse_corpus(json),
            Err(CorpusError::EmptyField { index: 0, field: "issue", .. })
        ));
    }

    #[test]
    fn test_parse_corpus_rejects_non_array() {
        let json = r#"{"issue": "Low oil"}"#;
        assert!(matches!(parse_corpus(json), Err(CorpusError::NotAnArray { .. })));
    }

    #[test]
    fn test_parse_corpus_empty_array() {
        assert!(parse_corpus("[]").unwrap().is_empty());
    }

    #[test]
    fn test_bundled_corpus_is_valid() {
        let items = bundled_corpus().unwrap();
        assert!(!items.is_empty());
        assert!(items.iter().all(|item| !item.issue.trim().is_empty()));
    }

    #[test]
    fn test_load_corpus_from_directory() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let nested = dir.path().join("nested");
        fs::create_dir(&nested)?;

        let mut first = File::create(dir.path().join("a.json"))?;
        writeln!(
            first,
            r#"[{{"issue": "Low oil", "causes": ["oil leak"], "actions": ["refill oil"]}}]"#
        )?;
        let mut second = File::create(nested.join("b.json"))?;
        writeln!(
            second,
            r#"[{{"issue": "Overload", "causes": ["seized rotor"], "actions": ["inspect rotor"]}}]"#
        )?;
        File::create(dir.path().join("notes.txt"))?;

        let items = load_corpus(dir.path())?;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].issue, "Low oil");
        assert_eq!(items[1].issue, "Overload");
        Ok(())
    }

    #[test]
    fn test_load_corpus_missing_path() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("absent.json");
        assert!(matches!(load_corpus(&missing), Err(CorpusError::NotFound(_))));
    }

    #[test]
    fn test_load_corpus_reports_file_of_bad_record() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("broken.json");
        fs::write(&path, r#"[{"causes": [], "actions": []}]"#)?;

        let err = load_corpus(&path).unwrap_err();
        assert!(err.to_string().contains("broken.json"));
        assert!(err.to_string().contains("record 0"));
        Ok(())
    }
}
