//! Append-only CSV master dataset
//!
//! The file carries a UTF-8 byte-order mark and the fixed [`FIELDNAMES`]
//! header. When an existing file was written with a different header it is
//! rotated to a timestamped sibling instead of being appended to, so no
//! column is ever silently lost.

use crate::output::record::{LeadRow, FIELDNAMES};
use crate::Result;
use chrono::{DateTime, Local};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Single writer over the output CSV
pub struct CsvSink {
    path: PathBuf,
    writer: csv::Writer<File>,
    rotated_to: Option<PathBuf>,
    rows_written: usize,
}

impl CsvSink {
    /// Opens the output file, writing a header or rotating as needed
    ///
    /// * missing or empty file: created with a fresh header
    /// * header differs from [`FIELDNAMES`] (or cannot be read): the file is
    ///   renamed to `<stem>_OLD_<YYYYmmdd_HHMMSS>.<ext>` and a fresh one started
    /// * same header: opened for append
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut rotated_to = None;
        let fresh = match read_existing_header(path) {
            None => true,
            Some(Ok(header)) if header == FIELDNAMES => false,
            Some(found) => {
                let target = rotated_name(path, Local::now());
                std::fs::rename(path, &target)?;
                match found {
                    Ok(_) => tracing::warn!(
                        "[CSV] Header differs from the current schema. Old file rotated to: {}",
                        target.display()
                    ),
                    Err(e) => tracing::warn!(
                        "[CSV] Unreadable header ({}). Old file rotated to: {}",
                        e,
                        target.display()
                    ),
                }
                rotated_to = Some(target);
                true
            }
        };

        let writer = if fresh {
            let mut file = File::create(path)?;
            file.write_all(UTF8_BOM)?;
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(file);
            writer.write_record(FIELDNAMES)?;
            writer.flush()?;
            writer
        } else {
            let file = OpenOptions::new().append(true).open(path)?;
            csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(file)
        };

        Ok(Self {
            path: path.to_path_buf(),
            writer,
            rotated_to,
            rows_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where the previous file went, if opening rotated it
    pub fn rotated_to(&self) -> Option<&Path> {
        self.rotated_to.as_deref()
    }

    /// Number of rows appended through this sink
    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    /// Appends one lead row
    ///
    /// The row is buffered; call [`CsvSink::flush`] to make it durable.
    pub fn append(&mut self, row: &LeadRow) -> Result<()> {
        self.writer.write_record(row.to_record())?;
        self.rows_written += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Flushes and closes the file
    pub fn close(mut self) -> Result<()> {
        self.flush()?;
        let file = self
            .writer
            .into_inner()
            .map_err(|e| std::io::Error::new(e.error().kind(), e.error().to_string()))?;
        file.sync_all()?;
        Ok(())
    }
}

/// Opens a file for reading, skipping a leading UTF-8 byte-order mark
fn open_without_bom(path: &Path) -> std::io::Result<BufReader<File>> {
    let mut reader = BufReader::new(File::open(path)?);
    if reader.fill_buf()?.starts_with(UTF8_BOM) {
        reader.consume(UTF8_BOM.len());
    }
    Ok(reader)
}

/// Reads the header of an existing CSV file
///
/// # Returns
///
/// * `None` - The file does not exist, is empty or holds no record (a bare BOM)
/// * `Some(Ok(header))` - The first record
/// * `Some(Err(_))` - The file exists but its header could not be read
pub fn read_existing_header(path: &Path) -> Option<Result<Vec<String>>> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.len() > 0 => {}
        _ => return None,
    }

    let read = || -> Result<Option<Vec<String>>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(open_without_bom(path)?);
        let mut record = csv::StringRecord::new();
        if !reader.read_record(&mut record)? {
            return Ok(None);
        }
        Ok(Some(record.iter().map(str::to_string).collect()))
    };

    read().transpose()
}

/// Builds the rotation target `<stem>_OLD_<YYYYmmdd_HHMMSS>.<ext>`
///
/// A numeric suffix is added if a file with that name already exists.
pub fn rotated_name(path: &Path, now: DateTime<Local>) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let stamp = now.format("%Y%m%d_%H%M%S");

    let mut candidate = path.with_file_name(format!("{}_OLD_{}{}", stem, stamp, ext));
    let mut n = 1;
    while candidate.exists() {
        candidate = path.with_file_name(format!("{}_OLD_{}_{}{}", stem, stamp, n, ext));
        n += 1;
    }
    candidate
}

/// Reads `(domain, last_seen)` pairs from an existing output file
///
/// Columns are located by header name, so files written with an older
/// schema still seed the ledger. Cells are decoded lossily because the
/// operator edits the file by hand; a record that cannot be parsed at all is
/// skipped with a warning and the rest are kept. A missing file yields no rows.
pub fn read_ledger_rows(path: &Path) -> Result<Vec<(String, String)>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(open_without_bom(path)?);

    let headers = reader.byte_headers()?.clone();
    let Some(domain_idx) = headers.iter().position(|h| h == b"domain") else {
        return Ok(Vec::new());
    };
    let last_seen_idx = headers.iter().position(|h| h == b"last_seen");

    let mut rows = Vec::new();
    for record in reader.byte_records() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("[DOMAINS] Skipping unreadable row in {}: {}", path.display(), e);
                continue;
            }
        };
        let domain = String::from_utf8_lossy(record.get(domain_idx).unwrap_or_default());
        let domain = domain.trim();
        if domain.is_empty() {
            continue;
        }
        let last_seen = last_seen_idx
            .and_then(|i| record.get(i))
            .map(String::from_utf8_lossy)
            .unwrap_or_default();
        rows.push((domain.to_string(), last_seen.trim().to_string()));
    }

    Ok(rows)
}

/// Counts data rows in an output file (0 if it does not exist)
pub fn count_rows(path: &Path) -> Result<usize> {
    if !path.exists() {
        return Ok(0);
    }
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(open_without_bom(path)?);
    let mut record = csv::ByteRecord::new();
    let mut count = 0;
    while reader.read_byte_record(&mut record)? {
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::record::HttpStatus;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn sample_row(domain: &str) -> LeadRow {
        LeadRow {
            query: "club de golf site:.cl".to_string(),
            country: "cl".to_string(),
            category: "club de golf".to_string(),
            domain: domain.to_string(),
            homepage_url: format!("https://www.{}/", domain),
            http_status: HttpStatus::Code(200),
            duration_ms: 87,
            emails_all: vec![format!("contacto@{}", domain), format!("socios@{}", domain)],
            email_best: format!("contacto@{}", domain),
            phones: vec!["+56 2 2345 6789".to_string()],
            priority: 3,
            last_seen: "2024-05-01T09:00:00-04:00".to_string(),
            email_sent: "No".to_string(),
        }
    }

    fn csv_files(dir: &TempDir) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_fresh_file_gets_bom_and_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("leads.csv");

        let sink = CsvSink::open(&path).unwrap();
        assert!(sink.rotated_to().is_none());
        sink.close().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        let text = String::from_utf8(bytes[3..].to_vec()).unwrap();
        assert_eq!(text.lines().next().unwrap(), FIELDNAMES.join(","));
    }

    #[test]
    fn test_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("out").join("leads.csv");
        CsvSink::open(&path).unwrap().close().unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_append_keeps_single_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("leads.csv");

        let mut sink = CsvSink::open(&path).unwrap();
        sink.append(&sample_row("golfclub.cl")).unwrap();
        sink.close().unwrap();

        let mut sink = CsvSink::open(&path).unwrap();
        assert!(sink.rotated_to().is_none());
        sink.append(&sample_row("otroclub.cl")).unwrap();
        assert_eq!(sink.rows_written(), 1);
        sink.close().unwrap();

        assert_eq!(count_rows(&path).unwrap(), 2);
        let header = read_existing_header(&path).unwrap().unwrap();
        assert_eq!(header, FIELDNAMES);
        assert_eq!(csv_files(&dir), vec!["leads.csv"]);
    }

    #[test]
    fn test_rows_are_rectangular() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("leads.csv");

        let mut sink = CsvSink::open(&path).unwrap();
        let mut row = sample_row("golfclub.cl");
        row.phones.clear();
        sink.append(&row).unwrap();
        sink.close().unwrap();

        let mut reader = csv::Reader::from_reader(open_without_bom(&path).unwrap());
        for record in reader.records() {
            let record = record.unwrap();
            assert_eq!(record.len(), FIELDNAMES.len());
            assert_eq!(&record[9], "");
            assert_eq!(&record[7], "contacto@golfclub.cl, socios@golfclub.cl");
        }
    }

    #[test]
    fn test_schema_drift_rotates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("leads.csv");
        std::fs::write(
            &path,
            "\u{feff}query,domain,email\nuniversidad site:.ar,uba.ar,info@uba.ar\n",
        )
        .unwrap();

        let sink = CsvSink::open(&path).unwrap();
        let rotated = sink.rotated_to().unwrap().to_path_buf();
        sink.close().unwrap();

        // The old content moved to a timestamped sibling
        let name = rotated.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("leads_OLD_"));
        assert!(name.ends_with(".csv"));
        let old = std::fs::read_to_string(&rotated).unwrap();
        assert!(old.contains("uba.ar"));

        // The new file has the current header and no data rows
        assert_eq!(read_existing_header(&path).unwrap().unwrap(), FIELDNAMES);
        assert_eq!(count_rows(&path).unwrap(), 0);
        assert_eq!(csv_files(&dir).len(), 2);
    }

    #[test]
    fn test_empty_file_gets_fresh_header_without_rotation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("leads.csv");
        std::fs::write(&path, "").unwrap();

        let sink = CsvSink::open(&path).unwrap();
        assert!(sink.rotated_to().is_none());
        sink.close().unwrap();
        assert_eq!(csv_files(&dir), vec!["leads.csv"]);
    }

    #[test]
    fn test_rotated_name_format() {
        let now = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let dir = TempDir::new().unwrap();
        let name = rotated_name(&dir.path().join("latam_leads.csv"), now);
        assert_eq!(
            name.file_name().unwrap().to_string_lossy(),
            "latam_leads_OLD_20240309_140507.csv"
        );

        std::fs::write(&name, "x").unwrap();
        let second = rotated_name(&dir.path().join("latam_leads.csv"), now);
        assert_eq!(
            second.file_name().unwrap().to_string_lossy(),
            "latam_leads_OLD_20240309_140507_1.csv"
        );
    }

    #[test]
    fn test_read_ledger_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("leads.csv");

        let mut sink = CsvSink::open(&path).unwrap();
        sink.append(&sample_row("golfclub.cl")).unwrap();
        sink.append(&sample_row("otroclub.cl")).unwrap();
        sink.close().unwrap();

        let rows = read_ledger_rows(&path).unwrap();
        assert_eq!(
            rows,
            vec![
                (
                    "golfclub.cl".to_string(),
                    "2024-05-01T09:00:00-04:00".to_string()
                ),
                (
                    "otroclub.cl".to_string(),
                    "2024-05-01T09:00:00-04:00".to_string()
                ),
            ]
        );
    }

    #[test]
    fn test_read_ledger_rows_from_older_schema() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("old.csv");
        std::fs::write(&path, "domain,email\nuba.ar,info@uba.ar\n,\n").unwrap();

        let rows = read_ledger_rows(&path).unwrap();
        assert_eq!(rows, vec![("uba.ar".to_string(), String::new())]);
    }

    #[test]
    fn test_read_ledger_rows_survives_hand_edited_cells() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("leads.csv");

        let mut content = UTF8_BOM.to_vec();
        content.extend_from_slice(FIELDNAMES.join(",").as_bytes());
        content.extend_from_slice(
            b"\nuniversidad site:.ar,ar,universidad,uba.ar,https://www.uba.ar/,200,10,\
              info@uba.ar,info@uba.ar,,1,2024-05-01T09:00:00-03:00,No\n",
        );
        // email_sent saved as Latin-1 "S\xed" by a spreadsheet
        content.extend_from_slice(
            b"universidad site:.cl,cl,universidad,uchile.cl,https://uchile.cl/,200,10,\
              info@uchile.cl,info@uchile.cl,,2,2024-05-02T09:00:00-04:00,S\xed\n",
        );
        std::fs::write(&path, content).unwrap();

        let rows = read_ledger_rows(&path).unwrap();
        assert_eq!(
            rows,
            vec![
                ("uba.ar".to_string(), "2024-05-01T09:00:00-03:00".to_string()),
                ("uchile.cl".to_string(), "2024-05-02T09:00:00-04:00".to_string()),
            ]
        );
        assert_eq!(count_rows(&path).unwrap(), 2);

        // The header is intact, so the file is appended to rather than rotated
        let sink = CsvSink::open(&path).unwrap();
        assert!(sink.rotated_to().is_none());
    }

    #[test]
    fn test_bom_only_file_gets_fresh_header_without_rotation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("leads.csv");
        std::fs::write(&path, UTF8_BOM).unwrap();

        assert!(read_existing_header(&path).is_none());
        let sink = CsvSink::open(&path).unwrap();
        assert!(sink.rotated_to().is_none());
        sink.close().unwrap();

        assert_eq!(csv_files(&dir), vec!["leads.csv"]);
        assert_eq!(read_existing_header(&path).unwrap().unwrap(), FIELDNAMES);
    }

    #[test]
    fn test_read_ledger_rows_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(read_ledger_rows(&dir.path().join("none.csv"))
            .unwrap()
            .is_empty());
    }
}
