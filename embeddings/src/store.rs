//! In-memory store of precomputed article embeddings.

use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::Embedding;
use crate::error::{EmbeddingError, ParseLocation, Result};
use crate::literal::{embedding_from_value, parse_embedding, parse_literal};

/// One embedded section of an article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    /// Article the section belongs to.
    pub article_uuid: String,

    /// Identifier of this section, e.g. `<article>_embedding-3`.
    pub embedding_uuid: String,

    /// The section text handed to the model as context.
    pub text: String,

    /// The embedding vector.
    pub embedding: Embedding,
}

impl EmbeddingRecord {
    /// Create a new record.
    pub fn new(
        article_uuid: impl Into<String>,
        embedding_uuid: impl Into<String>,
        text: impl Into<String>,
        embedding: Embedding,
    ) -> Self {
        Self {
            article_uuid: article_uuid.into(),
            embedding_uuid: embedding_uuid.into(),
            text: text.into(),
            embedding,
        }
    }
}

/// Row layout of the `article_embeddings.csv` export.
#[derive(Debug, Deserialize)]
struct CsvRow {
    article_uuid: String,
    embedding_uuid: String,
    text: String,
    embedding: String,
}

/// Ordered collection of embedding records sharing one dimension.
///
/// Records keep their load order; ranking relies on it to break ties.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingStore {
    records: Vec<EmbeddingRecord>,
    dimension: Option<usize>,
}

impl EmbeddingStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from records, checking that all dimensions agree.
    pub fn from_records(records: impl IntoIterator<Item = EmbeddingRecord>) -> Result<Self> {
        let mut store = Self::new();
        for record in records {
            store.push(record)?;
        }
        Ok(store)
    }

    /// Append a record.
    pub fn push(&mut self, record: EmbeddingRecord) -> Result<()> {
        let actual = record.embedding.len();
        match self.dimension {
            Some(expected) if expected != actual => {
                return Err(EmbeddingError::DimensionMismatch { expected, actual });
            }
            Some(_) => {}
            None => self.dimension = Some(actual),
        }
        debug!("Added record {} to store", record.embedding_uuid);
        self.records.push(record);
        Ok(())
    }

    /// Load a store from a foreign list literal of record dicts.
    ///
    /// Any malformed record aborts the whole load.
    pub fn from_literal(input: &str) -> Result<Self> {
        let value = parse_literal(input)?;
        let Value::Array(items) = value else {
            return Err(EmbeddingError::parse(0, "expected a list of records"));
        };

        let mut store = Self::new();
        for (i, item) in items.iter().enumerate() {
            store.push(record_from_value(i, item)?)?;
        }

        info!("Loaded {} records from literal", store.len());
        Ok(store)
    }

    /// Load a store from CSV with `article_uuid,embedding_uuid,text,embedding` columns.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut store = Self::new();
        for (index, row) in csv_reader.deserialize().enumerate() {
            let row: CsvRow = row?;
            let embedding = parse_embedding(&row.embedding).map_err(|e| e.in_record(index))?;
            store.push(EmbeddingRecord {
                article_uuid: row.article_uuid,
                embedding_uuid: row.embedding_uuid,
                text: row.text,
                embedding,
            })?;
        }

        info!("Loaded {} records from csv", store.len());
        Ok(store)
    }

    /// Load a store from a JSON array of records.
    pub fn from_json(json: &str) -> Result<Self> {
        let records: Vec<EmbeddingRecord> = serde_json::from_str(json)?;
        let store = Self::from_records(records)?;
        info!("Loaded {} records from json", store.len());
        Ok(store)
    }

    /// Serialize the store to a JSON array of records.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.records)?)
    }

    /// Load a store from disk, picking the format by file extension.
    ///
    /// `.csv` and `.json` are read as such; anything else is treated as a
    /// foreign list literal. Content that is not valid UTF-8 is a parse error
    /// at the first invalid byte.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        debug!("Loading embedding store from {}", path.display());
        let content = String::from_utf8(tokio::fs::read(path).await?).map_err(|e| {
            EmbeddingError::parse(e.utf8_error().valid_up_to(), "store is not valid UTF-8")
        })?;
        match extension.as_deref() {
            Some("csv") => Self::from_csv_reader(content.as_bytes()),
            Some("json") => Self::from_json(&content),
            _ => Self::from_literal(&content),
        }
    }

    /// Write the store to disk as JSON.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, self.to_json()?).await?;
        debug!("Saved {} records to {}", self.len(), path.display());
        Ok(())
    }

    /// All records in load order.
    pub fn records(&self) -> &[EmbeddingRecord] {
        &self.records
    }

    /// Consume the store, returning its records.
    pub fn into_records(self) -> Vec<EmbeddingRecord> {
        self.records
    }

    /// Dimension shared by all records, if any record is present.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// Get the number of records in the store.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn record_from_value(index: usize, value: &Value) -> Result<EmbeddingRecord> {
    Ok(EmbeddingRecord {
        article_uuid: string_field(index, value, "article_uuid")?,
        embedding_uuid: string_field(index, value, "embedding_uuid")?,
        text: string_field(index, value, "text")?,
        embedding: embedding_from_value(field(index, value, "embedding")?)
            .map_err(|e| e.in_record(index))?,
    })
}

fn field<'a>(index: usize, value: &'a Value, name: &str) -> Result<&'a Value> {
    value.get(name).ok_or_else(|| {
        EmbeddingError::parse_at(ParseLocation::Record(index), format!("missing `{name}`"))
    })
}

fn string_field(index: usize, value: &Value, name: &str) -> Result<String> {
    match field(index, value, name)? {
        Value::String(s) => Ok(s.clone()),
        other => Err(EmbeddingError::parse_at(
            ParseLocation::Record(index),
            format!("field `{name}` is not a string: {other}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const LITERAL: &str = r#"[{'article_uuid': 'a1', 'embedding_uuid': 'a1_embedding-0', 'text': "Rates rose by a quarter point", 'embedding': '[0.1, 0.2, 0.3]'}, {'article_uuid': 'a1', 'embedding_uuid': 'a1_embedding-1', 'text': 'Markets fell', 'embedding': [0.3, 0.2, 0.1]}]"#;

    #[test]
    fn test_from_literal() {
        let store = EmbeddingStore::from_literal(LITERAL).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.dimension(), Some(3));
        assert_eq!(store.records()[0].text, "Rates rose by a quarter point");
        assert_eq!(store.records()[0].embedding, vec![0.1, 0.2, 0.3]);
        assert_eq!(store.records()[1].embedding_uuid, "a1_embedding-1");
    }

    #[test]
    fn test_from_literal_aborts_on_bad_record() {
        let input = "[{'article_uuid': 'a', 'embedding_uuid': 'e', 'text': 't', 'embedding': '[0.1]'}, \
                     {'article_uuid': 'b', 'embedding_uuid': 'f', 'text': 'u', 'embedding': '[None]'}]";
        assert!(matches!(
            EmbeddingStore::from_literal(input),
            Err(EmbeddingError::Parse {
                location: ParseLocation::Record(1),
                ..
            })
        ));
    }

    #[test]
    fn test_from_literal_missing_field() {
        let err = EmbeddingStore::from_literal("[{'article_uuid': 'a'}]").unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::Parse {
                location: ParseLocation::Record(0),
                ..
            }
        ));
    }

    #[test]
    fn test_csv_bad_embedding_names_the_row() {
        let csv = "article_uuid,embedding_uuid,text,embedding\n\
                   a1,a1_embedding-0,Oil,\"[1.0, 0.0]\"\n\
                   a2,a2_embedding-0,Gas,\"[1.0, oops]\"\n";
        assert!(matches!(
            EmbeddingStore::from_csv_reader(csv.as_bytes()),
            Err(EmbeddingError::Parse {
                location: ParseLocation::Record(1),
                ..
            })
        ));
    }

    #[test]
    fn test_from_literal_rejects_mixed_dimensions() {
        let input = "[{'article_uuid': 'a', 'embedding_uuid': 'e', 'text': 't', 'embedding': [1.0, 0.0]}, \
                     {'article_uuid': 'a', 'embedding_uuid': 'f', 'text': 'u', 'embedding': [1.0]}]";
        assert!(matches!(
            EmbeddingStore::from_literal(input),
            Err(EmbeddingError::DimensionMismatch {
                expected: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_from_csv_reader() {
        let csv = "article_uuid,embedding_uuid,text,embedding\n\
                   a1,a1_embedding-0,\"Inflation, again\",\"[1.0, 0.0]\"\n\
                   a2,a2_embedding-0,Oil,\"[0.0, 1.0]\"\n";
        let store = EmbeddingStore::from_csv_reader(csv.as_bytes()).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.records()[0].text, "Inflation, again");
        assert_eq!(store.records()[1].embedding, vec![0.0, 1.0]);
    }

    #[tokio::test]
    async fn test_save_and_load_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store/embeddings.json");

        let store = EmbeddingStore::from_literal(LITERAL).unwrap();
        store.save(&path).await.unwrap();

        let loaded = EmbeddingStore::load(&path).await.unwrap();
        assert_eq!(loaded.records(), store.records());
    }

    #[tokio::test]
    async fn test_load_rejects_invalid_utf8() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("embeddings.txt");

        let mut content =
            b"[{'article_uuid': 'a', 'embedding_uuid': 'e', 'text': 'caf".to_vec();
        let bad_byte = content.len();
        content.push(0xE9);
        content.extend_from_slice(b"', 'embedding': [1.0]}]");
        tokio::fs::write(&path, &content).await.unwrap();

        let err = EmbeddingStore::load(&path).await.unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::Parse {
                location: ParseLocation::Offset(offset),
                ..
            } if offset == bad_byte
        ));

        let json_path = dir.path().join("embeddings.json");
        tokio::fs::write(&json_path, b"[{\"text\": \"caf\xE9\"}]")
            .await
            .unwrap();
        assert!(matches!(
            EmbeddingStore::load(&json_path).await,
            Err(EmbeddingError::Parse { .. })
        ));
    }

    #[tokio::test]
    async fn test_load_picks_literal_for_unknown_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("embeddings.txt");
        tokio::fs::write(&path, LITERAL).await.unwrap();

        let store = EmbeddingStore::load(&path).await.unwrap();
        assert_eq!(store.len(), 2);
    }
}
