//! File list (CSV) row source
//!
//! A submitter uploads a CSV next to the objects it lists. The first column holds
//! file names relative to the CSV's own folder; every other column is per-file
//! metadata. The CSV is fetched through the same [`RemoteStore`] as the objects.

use tracing::{debug, error};

use crate::app::layout::RemoteObjectRef;
use crate::app::remote::RemoteStore;
use crate::constants::metadata::COLUMN_KEYS;
use crate::errors::{RowsError, RowsResult};

/// One object to transfer plus the metadata fields to merge after it arrives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRow {
    /// Line of the record in the CSV (1-based, header is line 1)
    pub line: usize,
    /// `"subfolder/filename.ext"` relative to the remote root
    pub relative_path: String,
    /// Metadata key and value pairs in column order
    pub fields: Vec<(String, String)>,
}

impl BatchRow {
    /// Create a row from a relative path and metadata fields
    pub fn new(relative_path: impl Into<String>, fields: Vec<(String, String)>) -> Self {
        Self {
            line: 0,
            relative_path: relative_path.into(),
            fields,
        }
    }
}

/// A CSV of files stored in the remote store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileList {
    remote: RemoteObjectRef,
}

impl FileList {
    /// Model the CSV at `relative_csv` (`"folder/list.csv"`) under the remote root
    pub fn new(remote_folder: impl Into<String>, relative_csv: impl Into<String>) -> Self {
        Self {
            remote: RemoteObjectRef::new(remote_folder, relative_csv),
        }
    }

    /// Full remote path of the CSV
    pub fn remote_path(&self) -> String {
        self.remote.full_path()
    }

    /// Folder of the CSV relative to the remote root
    pub fn submission_agreement_folder(&self) -> String {
        self.remote.submission_agreement_folder()
    }

    /// Fetch and parse the CSV
    pub async fn load<S: RemoteStore>(&self, store: &S) -> RowsResult<Vec<BatchRow>> {
        let path = self.remote_path();
        let bytes = store.download_bytes(&path).await.map_err(|source| {
            error!("Failed to fetch file list {}: {}", path, source);
            RowsError::Fetch {
                path: path.clone(),
                source,
            }
        })?;
        let text = String::from_utf8(bytes).map_err(|_| RowsError::Encoding { path: path.clone() })?;

        let rows = self.parse(&text)?;
        debug!("Loaded {} rows from {}", rows.len(), path);
        Ok(rows)
    }

    /// Parse CSV text into rows, prefixing each file name with the CSV's folder
    pub fn parse(&self, text: &str) -> RowsResult<Vec<BatchRow>> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut records = parse_records(text)?.into_iter();

        let (_, header) = records.next().ok_or_else(|| RowsError::Empty {
            path: self.remote_path(),
        })?;
        let keys: Vec<String> = header.iter().skip(1).map(|name| metadata_key(name)).collect();

        let folder = self.submission_agreement_folder();
        records
            .map(|(line, record)| {
                if record.len() > header.len() {
                    return Err(RowsError::InvalidFormat {
                        line,
                        reason: format!(
                            "expected {} fields, found {}",
                            header.len(),
                            record.len()
                        ),
                    });
                }
                let mut values = record.into_iter();
                let file_name = values.next().unwrap_or_default();
                if file_name.trim().is_empty() {
                    return Err(RowsError::InvalidFormat {
                        line,
                        reason: "missing file name".to_string(),
                    });
                }

                let relative_path = if folder.is_empty() {
                    file_name
                } else {
                    format!("{}/{}", folder, file_name)
                };
                let fields = keys
                    .iter()
                    .cloned()
                    .zip(values.chain(std::iter::repeat(String::new())))
                    .collect();

                Ok(BatchRow {
                    line,
                    relative_path,
                    fields,
                })
            })
            .collect()
    }
}

/// Metadata key for a CSV column header
pub fn metadata_key(column: &str) -> String {
    let column = column.trim();
    COLUMN_KEYS
        .iter()
        .find(|(name, _)| *name == column)
        .map_or_else(|| column.to_string(), |(_, key)| key.to_string())
}

/// Split CSV text into records, each tagged with the line it starts on
///
/// Handles quoted fields with embedded commas, doubled quotes and line breaks.
/// Blank lines are skipped.
fn parse_records(text: &str) -> RowsResult<Vec<(usize, Vec<String>)>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut line = 1;
    let mut record_line = 1;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    field.push(c);
                }
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' if field.is_empty() => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                if !is_blank(&record) {
                    records.push((record_line, std::mem::take(&mut record)));
                }
                record.clear();
                line += 1;
                record_line = line;
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(RowsError::InvalidFormat {
            line: record_line,
            reason: "unterminated quoted field".to_string(),
        });
    }
    record.push(field);
    if !is_blank(&record) {
        records.push((record_line, record));
    }
    Ok(records)
}

fn is_blank(record: &[String]) -> bool {
    record.len() == 1 && record[0].trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::remote::InMemoryStore;

    fn file_list() -> FileList {
        FileList::new("/foldername/", "testfolder/files.csv")
    }

    #[test]
    fn test_rows_are_prefixed_with_csv_folder() {
        let csv = "filename,beginning_year,ending_year,description\n\
                   report.pdf,1990,1995,Annual reports\n\
                   photo 1.jpg,2001,2001,Campus photo\n";
        let rows = file_list().parse(csv).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].relative_path, "testfolder/report.pdf");
        assert_eq!(rows[0].line, 2);
        assert_eq!(rows[1].relative_path, "testfolder/photo 1.jpg");
        assert_eq!(
            rows[0].fields,
            vec![
                ("Beginning Year".to_string(), "1990".to_string()),
                ("Ending Year".to_string(), "1995".to_string()),
                ("Description".to_string(), "Annual reports".to_string()),
            ]
        );
    }

    #[test]
    fn test_quoted_fields() {
        let csv = "filename,description,notes\r\n\
                   \"a, b.pdf\",\"He said \"\"hi\"\"\",\"two\nlines\"\r\n\
                   c.pdf,plain,\r\n";
        let rows = file_list().parse(csv).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].relative_path, "testfolder/a, b.pdf");
        assert_eq!(rows[0].fields[0].1, "He said \"hi\"");
        assert_eq!(rows[0].fields[1], ("notes".to_string(), "two\nlines".to_string()));
        assert_eq!(rows[1].line, 4);
        assert_eq!(rows[1].fields[1].1, "");
    }

    #[test]
    fn test_short_rows_are_padded_and_blank_lines_skipped() {
        let csv = "\u{feff}filename,description\n\nonly.pdf\n";
        let rows = file_list().parse(csv).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].line, 3);
        assert_eq!(
            rows[0].fields,
            vec![("Description".to_string(), String::new())]
        );
    }

    #[test]
    fn test_invalid_rows() {
        let too_many = "filename,description\na.pdf,x,y\n";
        assert!(matches!(
            file_list().parse(too_many),
            Err(RowsError::InvalidFormat { line: 2, .. })
        ));

        let no_name = "filename,description\n,x\n";
        assert!(matches!(
            file_list().parse(no_name),
            Err(RowsError::InvalidFormat { line: 2, .. })
        ));

        let unterminated = "filename\n\"a.pdf\n";
        assert!(matches!(
            file_list().parse(unterminated),
            Err(RowsError::InvalidFormat { .. })
        ));

        assert!(matches!(file_list().parse(""), Err(RowsError::Empty { .. })));
    }

    #[test]
    fn test_metadata_key_mapping() {
        assert_eq!(metadata_key("beginning_year"), "Beginning Year");
        assert_eq!(metadata_key(" description "), "Description");
        assert_eq!(metadata_key("Rights"), "Rights");
    }

    #[tokio::test]
    async fn test_load_from_store() {
        let store = InMemoryStore::new();
        store.insert(
            "/foldername/testfolder/files.csv",
            b"filename,description\na.pdf,first\n".to_vec(),
        );

        let list = file_list();
        assert_eq!(list.remote_path(), "/foldername/testfolder/files.csv");
        let rows = list.load(&store).await.unwrap();
        assert_eq!(rows[0].relative_path, "testfolder/a.pdf");

        store.insert("/foldername/testfolder/files.csv", vec![0xff, 0xfe, 0x00]);
        assert!(matches!(
            list.load(&store).await,
            Err(RowsError::Encoding { .. })
        ));
    }

    #[tokio::test]
    async fn test_load_missing_csv() {
        let store = InMemoryStore::new();
        assert!(matches!(
            file_list().load(&store).await,
            Err(RowsError::Fetch { .. })
        ));
    }
}
