//! Recency filtering of store records by article publication date.

use std::collections::HashMap;
use std::io::Read;

use chrono::{Duration, NaiveDateTime};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::Result;
use crate::store::EmbeddingRecord;

/// Timestamp format of the `date_added` column.
pub const DATE_ADDED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Deserialize)]
struct ArticleRow {
    #[serde(rename = "UUID")]
    uuid: String,
    date_added: String,
}

/// Read article publication dates from an `articles.csv` export.
///
/// Only the `UUID` and `date_added` columns are used. Rows with an
/// unparseable date are skipped with a warning.
pub fn load_publication_dates<R: Read>(reader: R) -> Result<HashMap<String, NaiveDateTime>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut dates = HashMap::new();

    for row in csv_reader.deserialize() {
        let row: ArticleRow = row?;
        match NaiveDateTime::parse_from_str(&row.date_added, DATE_ADDED_FORMAT) {
            Ok(date) => {
                dates.insert(row.uuid, date);
            }
            Err(e) => warn!(
                "Article {} has an invalid date {:?}: {e}",
                row.uuid, row.date_added
            ),
        }
    }

    debug!("Loaded publication dates for {} articles", dates.len());
    Ok(dates)
}

/// Keep only records whose article was added within `days` of `now`.
///
/// Records of articles without a known publication date are dropped.
pub fn filter_recent(
    records: impl IntoIterator<Item = EmbeddingRecord>,
    published: &HashMap<String, NaiveDateTime>,
    days: i64,
    now: NaiveDateTime,
) -> Vec<EmbeddingRecord> {
    let threshold = now - Duration::days(days);

    records
        .into_iter()
        .filter(|record| match published.get(&record.article_uuid) {
            Some(date_added) => *date_added >= threshold,
            None => {
                warn!(
                    "Article {} not found in publication dates",
                    record.article_uuid
                );
                false
            }
        })
        .collect()
}
