//! Source file readers
//!
//! Loading reads a whole file into memory as text cells. It is strict about
//! record shape: a delimited record whose field count differs from the header
//! fails the file. Counting is lenient and counts every record it can frame,
//! so a file the loader rejects still contributes to the local row total.

use std::fmt;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::Deserializer as _;
use serde::de::{IgnoredAny, MapAccess, SeqAccess, Visitor};
use tracing::debug;

use super::IngestError;

/// Layout of a source file, decided by its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// Delimited text with a header row
    Delimited(u8),
    /// A JSON array of objects, or a single object
    Json,
    /// One JSON object per line
    JsonLines,
}

impl SourceFormat {
    /// Detect the format of a file
    ///
    /// `.tsv` files are always tab-delimited; other delimited files use
    /// `delimiter`.
    pub fn detect(path: &Path, delimiter: u8) -> Result<Self, IngestError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match extension.as_str() {
            "csv" | "txt" => Ok(SourceFormat::Delimited(delimiter)),
            "tsv" => Ok(SourceFormat::Delimited(b'\t')),
            "json" => Ok(SourceFormat::Json),
            "jsonl" | "ndjson" => Ok(SourceFormat::JsonLines),
            _ => Err(IngestError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Raw contents of one source file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceTable {
    /// Header row as written in the file
    pub headers: Vec<String>,
    /// Data rows, each aligned with `headers`
    pub rows: Vec<Vec<String>>,
}

impl SourceTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Keep only the given header positions, in that order
    pub fn project(self, positions: &[usize]) -> Vec<Vec<String>> {
        self.rows
            .into_iter()
            .map(|mut row| {
                positions
                    .iter()
                    .map(|&p| row.get_mut(p).map(std::mem::take).unwrap_or_default())
                    .collect()
            })
            .collect()
    }
}

fn io_error(path: &Path, source: std::io::Error) -> IngestError {
    IngestError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn csv_error(path: &Path, source: csv::Error) -> IngestError {
    IngestError::Csv {
        path: path.to_path_buf(),
        source,
    }
}

fn json_error(path: &Path, record: usize, message: impl Into<String>) -> IngestError {
    IngestError::Json {
        path: path.to_path_buf(),
        record,
        message: message.into(),
    }
}

fn delimited_reader(
    path: &Path,
    delimiter: u8,
    flexible: bool,
) -> Result<csv::Reader<File>, IngestError> {
    let file = File::open(path).map_err(|e| io_error(path, e))?;
    Ok(csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(flexible)
        .from_reader(file))
}

/// Read a whole source file
pub fn read_file(path: &Path, delimiter: u8) -> Result<SourceTable, IngestError> {
    match SourceFormat::detect(path, delimiter)? {
        SourceFormat::Delimited(d) => read_delimited(path, d),
        SourceFormat::Json => read_json(path),
        SourceFormat::JsonLines => read_json_lines(path),
    }
}

fn read_delimited(path: &Path, delimiter: u8) -> Result<SourceTable, IngestError> {
    let mut reader = delimited_reader(path, delimiter, false)?;
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| csv_error(path, e))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| csv_error(path, e))?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(SourceTable { headers, rows })
}

fn json_cell(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Collects objects into a table whose header is the union of keys, in
/// first-seen order
#[derive(Default)]
struct ObjectCollector {
    table: SourceTable,
    objects: Vec<serde_json::Map<String, serde_json::Value>>,
}

impl ObjectCollector {
    fn push(
        &mut self,
        path: &Path,
        record: usize,
        value: serde_json::Value,
    ) -> Result<(), IngestError> {
        match value {
            serde_json::Value::Object(object) => {
                for key in object.keys() {
                    if !self.table.headers.contains(key) {
                        self.table.headers.push(key.clone());
                    }
                }
                self.objects.push(object);
                Ok(())
            }
            other => Err(json_error(
                path,
                record,
                format!("expected an object, found {}", json_kind(&other)),
            )),
        }
    }

    fn finish(mut self) -> SourceTable {
        let headers = &self.table.headers;
        self.table.rows = self
            .objects
            .iter()
            .map(|object| {
                headers
                    .iter()
                    .map(|h| object.get(h).map(json_cell).unwrap_or_default())
                    .collect()
            })
            .collect();
        self.table
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

fn read_json(path: &Path) -> Result<SourceTable, IngestError> {
    let content = fs::read_to_string(path).map_err(|e| io_error(path, e))?;
    let value: serde_json::Value =
        serde_json::from_str(&content).map_err(|e| json_error(path, 0, e.to_string()))?;

    let mut collector = ObjectCollector::default();
    match value {
        serde_json::Value::Array(items) => {
            for (index, item) in items.into_iter().enumerate() {
                collector.push(path, index, item)?;
            }
        }
        other => collector.push(path, 0, other)?,
    }
    Ok(collector.finish())
}

fn read_json_lines(path: &Path) -> Result<SourceTable, IngestError> {
    let file = File::open(path).map_err(|e| io_error(path, e))?;
    let mut collector = ObjectCollector::default();

    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| io_error(path, e))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let value = serde_json::from_str(trimmed).map_err(|e| json_error(path, index, e.to_string()))?;
        collector.push(path, index, value)?;
    }
    Ok(collector.finish())
}

/// Read only the header row
pub fn read_headers(path: &Path, delimiter: u8) -> Result<Vec<String>, IngestError> {
    match SourceFormat::detect(path, delimiter)? {
        SourceFormat::Delimited(d) => Ok(delimited_reader(path, d, true)?
            .headers()
            .map_err(|e| csv_error(path, e))?
            .iter()
            .map(str::to_string)
            .collect()),
        SourceFormat::Json | SourceFormat::JsonLines => Ok(read_file(path, delimiter)?.headers),
    }
}

/// Count data records without validating their shape
pub fn count_records(path: &Path, delimiter: u8) -> Result<u64, IngestError> {
    match SourceFormat::detect(path, delimiter)? {
        SourceFormat::Delimited(d) => {
            let mut reader = delimited_reader(path, d, true)?;
            let mut record = csv::ByteRecord::new();
            let mut count = 0u64;
            while reader
                .read_byte_record(&mut record)
                .map_err(|e| csv_error(path, e))?
            {
                count += 1;
            }
            Ok(count)
        }
        SourceFormat::Json => {
            let file = File::open(path).map_err(|e| io_error(path, e))?;
            let mut de = serde_json::Deserializer::from_reader(BufReader::new(file));
            let mut count = 0u64;
            if let Err(e) = (&mut de).deserialize_any(ElementCounter(&mut count)) {
                debug!("{}: counted {} record(s) before: {}", path.display(), count, e);
            }
            Ok(count)
        }
        SourceFormat::JsonLines => {
            let file = File::open(path).map_err(|e| io_error(path, e))?;
            let mut count = 0u64;
            for line in BufReader::new(file).lines() {
                if !line.map_err(|e| io_error(path, e))?.trim().is_empty() {
                    count += 1;
                }
            }
            Ok(count)
        }
    }
}

/// Counts top-level array elements up to the first one that fails to parse.
/// A top-level object is one record.
struct ElementCounter<'a>(&'a mut u64);

impl<'de> Visitor<'de> for ElementCounter<'_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a JSON array or object")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<(), A::Error> {
        while seq.next_element::<IgnoredAny>()?.is_some() {
            *self.0 += 1;
        }
        Ok(())
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<(), A::Error> {
        *self.0 += 1;
        while map.next_entry::<IgnoredAny, IgnoredAny>()?.is_some() {}
        Ok(())
    }
}

/// Paths in lexicographic order
pub fn sorted(mut paths: Vec<PathBuf>) -> Vec<PathBuf> {
    paths.sort();
    paths.dedup();
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        write!(file, "{}", content).unwrap();
        path
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(
            SourceFormat::detect(Path::new("a.CSV"), b';').unwrap(),
            SourceFormat::Delimited(b';')
        );
        assert_eq!(
            SourceFormat::detect(Path::new("a.tsv"), b',').unwrap(),
            SourceFormat::Delimited(b'\t')
        );
        assert_eq!(
            SourceFormat::detect(Path::new("a.ndjson"), b',').unwrap(),
            SourceFormat::JsonLines
        );
        assert!(SourceFormat::detect(Path::new("a.parquet"), b',').is_err());
    }

    #[test]
    fn test_read_csv() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "t.csv", "id,label\n1,x\n2,\"y, z\"\n");

        let table = read_file(&path, b',').unwrap();
        assert_eq!(table.headers, vec!["id", "label"]);
        assert_eq!(table.rows, vec![vec!["1", "x"], vec!["2", "y, z"]]);
        assert_eq!(count_records(&path, b',').unwrap(), 2);
    }

    #[test]
    fn test_ragged_csv_fails_load_but_counts() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "t.csv", "id,label\n1,x\n2\n3,z,extra\n");

        let err = read_file(&path, b',').unwrap_err();
        assert!(matches!(err, IngestError::Csv { .. }));
        assert_eq!(count_records(&path, b',').unwrap(), 3);
    }

    #[test]
    fn test_read_tsv() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "t.tsv", "id\tlabel\n1\tx, y\n");
        let table = read_file(&path, b',').unwrap();
        assert_eq!(table.rows, vec![vec!["1", "x, y"]]);
    }

    #[test]
    fn test_read_json_array_and_object() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "t.json",
            r#"[{"id": 1, "label": "x"}, {"id": 2, "extra": true, "label": null}]"#,
        );
        let table = read_file(&path, b',').unwrap();
        assert_eq!(table.headers, vec!["id", "label", "extra"]);
        assert_eq!(table.rows[0], vec!["1", "x", ""]);
        assert_eq!(table.rows[1], vec!["2", "", "true"]);
        assert_eq!(count_records(&path, b',').unwrap(), 2);

        let single = write(&dir, "one.json", r#"{"id": 9}"#);
        assert_eq!(read_file(&single, b',').unwrap().len(), 1);

        let truncated = write(&dir, "truncated.json", r#"[{"id": 1}, {"id": 2}, {"id": 3, "lab"#);
        assert!(read_file(&truncated, b',').is_err());
        assert_eq!(count_records(&truncated, b',').unwrap(), 2);

        let garbage = write(&dir, "garbage.json", "not json at all");
        assert_eq!(count_records(&garbage, b',').unwrap(), 0);

        let scalar = write(&dir, "bad.json", "[1, 2]");
        assert!(matches!(
            read_file(&scalar, b',').unwrap_err(),
            IngestError::Json { record: 0, .. }
        ));
    }

    #[test]
    fn test_read_json_lines_skips_blank_lines() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "t.jsonl", "{\"id\": 1}\n\n{\"id\": 2}\n");
        let table = read_file(&path, b',').unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(count_records(&path, b',').unwrap(), 2);

        let broken = write(&dir, "broken.jsonl", "{\"id\": 1}\n{not json\n");
        assert!(read_file(&broken, b',').is_err());
        assert_eq!(count_records(&broken, b',').unwrap(), 2);
    }

    #[test]
    fn test_project_reorders_columns() {
        let table = SourceTable {
            headers: vec!["a".into(), "b".into(), "c".into()],
            rows: vec![vec!["1".into(), "2".into(), "3".into()]],
        };
        assert_eq!(table.project(&[2, 0]), vec![vec!["3", "1"]]);
    }

    #[test]
    fn test_read_headers_only() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "t.csv", "\u{feff}User_Id,View_Date\n");
        let headers = read_headers(&path, b',').unwrap();
        assert_eq!(headers.len(), 2);
        assert_eq!(count_records(&path, b',').unwrap(), 0);
    }
}
