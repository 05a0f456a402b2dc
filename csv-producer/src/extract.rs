use std::collections::BTreeMap;
use std::io::Cursor;

use csv::{ReaderBuilder, StringRecord, StringRecordsIntoIter};
use encoding_rs::WINDOWS_1252;

use crate::{error::ExtractError, normalize::normalize, schema::SchemaFilter};

/// One source line, keyed by canonical field name. `None` marks an empty or missing cell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedRow(BTreeMap<String, Option<String>>);

impl NormalizedRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Option<String>) {
        self.0.insert(name.into(), value);
    }

    /// `None` if the field is absent, `Some(None)` if it is present but empty
    pub fn get(&self, name: &str) -> Option<&Option<String>> {
        self.0.get(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K, V> FromIterator<(K, Option<V>)> for NormalizedRow
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, Option<V>)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.map(Into::into)))
                .collect(),
        )
    }
}

/// Reads delimited files into schema-conformant rows.
#[derive(Debug, Clone)]
pub struct RowExtractor {
    filter: SchemaFilter,
    delimiter: u8,
}

impl RowExtractor {
    pub fn new(filter: SchemaFilter, delimiter: u8) -> Self {
        Self { filter, delimiter }
    }

    /// Decodes `content` as windows-1252 and returns its data rows lazily, in file order.
    ///
    /// The first record is the header row. Rows are never rejected: a row with no accepted
    /// columns comes out empty, short rows leave their trailing fields as `None`. A syntax
    /// error is yielded once and ends the sequence.
    pub fn extract(&self, content: &[u8]) -> Rows {
        let (decoded, _) = WINDOWS_1252.decode_without_bom_handling(content);

        let mut reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .flexible(true)
            .from_reader(Cursor::new(decoded.into_owned().into_bytes()));

        let (columns, pending_error) = match reader.headers() {
            Ok(headers) => (self.columns(headers), None),
            Err(e) => (Vec::new(), Some(e)),
        };

        Rows {
            records: reader.into_records(),
            columns,
            pending_error,
            finished: false,
        }
    }

    // Canonical name per header position, `None` for columns the schema drops
    fn columns(&self, headers: &StringRecord) -> Vec<Option<String>> {
        headers
            .iter()
            .map(|header| {
                let name = normalize(header).to_lowercase();
                self.filter.is_accepted(&name).then_some(name)
            })
            .collect()
    }
}

pub struct Rows {
    records: StringRecordsIntoIter<Cursor<Vec<u8>>>,
    columns: Vec<Option<String>>,
    pending_error: Option<csv::Error>,
    finished: bool,
}

impl Rows {
    fn normalize_record(&self, record: &StringRecord) -> NormalizedRow {
        let mut row = NormalizedRow::new();
        for (idx, column) in self.columns.iter().enumerate() {
            let Some(name) = column else {
                continue;
            };
            let value = record
                .get(idx)
                .filter(|v| !v.is_empty())
                .map(str::to_string);
            row.insert(name.as_str(), value);
        }
        row
    }
}

impl Iterator for Rows {
    type Item = Result<NormalizedRow, ExtractError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        if let Some(e) = self.pending_error.take() {
            self.finished = true;
            return Some(Err(e.into()));
        }
        match self.records.next()? {
            Ok(record) => Some(Ok(self.normalize_record(&record))),
            Err(e) => {
                self.finished = true;
                Some(Err(e.into()))
            }
        }
    }
}
