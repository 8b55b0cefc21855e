// CSV import/export for rate card tables

use std::io::Read;
use std::path::{Path, PathBuf};

use log::{debug, info};
use ratecard_enrich::model::{SourceRow, Table};

use crate::error::IoError;

/// How a header marker is compared with a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MarkerMatch {
    /// Trimmed cell equals the marker.
    Exact,
    /// Trimmed cell contains the marker.
    Contains,
}

/// Text that must appear in the real header row, each marker in some cell.
#[derive(Debug, Clone)]
pub struct HeaderMarkers {
    markers: Vec<String>,
    mode: MarkerMatch,
}

impl HeaderMarkers {
    /// Column names that must each be a whole header cell, e.g. `Role`.
    ///
    /// A banner such as "Roles x Rates" does not match `Role`.
    pub fn columns<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_mode(markers, MarkerMatch::Exact)
    }

    /// Title text found anywhere inside a header cell, e.g.
    /// `Department / Category` in "Department / Category (all)".
    pub fn contains<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_mode(markers, MarkerMatch::Contains)
    }

    fn with_mode<I, S>(markers: I, mode: MarkerMatch) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            markers: markers.into_iter().map(|m| m.into().trim().to_string()).collect(),
            mode,
        }
    }

    pub fn matches(&self, row: &[String]) -> bool {
        self.markers.iter().all(|marker| {
            row.iter().any(|cell| {
                let cell = cell.trim();
                match self.mode {
                    MarkerMatch::Exact => cell == marker,
                    MarkerMatch::Contains => cell.contains(marker.as_str()),
                }
            })
        })
    }

    pub fn as_slice(&self) -> &[String] {
        &self.markers
    }
}

/// Read a delimited file, skip banner rows above the header, and return
/// the data rows keyed by header name.
pub fn read_table(path: &Path, markers: &HeaderMarkers) -> Result<Table, IoError> {
    if !path.exists() {
        return Err(IoError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let content = read_file_as_utf8(path)?;
    let delimiter = sniff_delimiter(&content);
    let rows = parse_records(&content, delimiter).map_err(|source| IoError::Csv {
        path: path.to_path_buf(),
        source,
    })?;

    let table = table_from_records(rows, markers).ok_or_else(|| IoError::HeaderNotFound {
        path: path.to_path_buf(),
        markers: markers.as_slice().to_vec(),
    })?;

    info!(
        "loaded {} data rows from {} ({} columns)",
        table.rows.len(),
        path.display(),
        table.headers.len()
    );
    Ok(table)
}

/// Index of the first record matching `markers`.
pub fn find_header_row(records: &[Vec<String>], markers: &HeaderMarkers) -> Option<usize> {
    records.iter().position(|row| markers.matches(row))
}

fn table_from_records(records: Vec<Vec<String>>, markers: &HeaderMarkers) -> Option<Table> {
    let header_idx = find_header_row(&records, markers)?;
    debug!("header row found on line {}", header_idx + 1);

    let mut records = records.into_iter().skip(header_idx);
    let headers: Vec<String> = records
        .next()?
        .into_iter()
        .map(|h| h.trim().to_string())
        .collect();

    let rows = records
        .filter(|record| record.iter().any(|cell| !cell.trim().is_empty()))
        .map(|record| {
            // Short rows are padded, surplus cells dropped
            SourceRow::from_pairs(
                headers
                    .iter()
                    .enumerate()
                    .map(|(i, h)| (h.clone(), record.get(i).cloned().unwrap_or_default())),
            )
        })
        .collect();

    Some(Table::new(headers, rows))
}

fn parse_records(content: &str, delimiter: u8) -> Result<Vec<Vec<String>>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    reader
        .records()
        .map(|r| r.map(|record| record.iter().map(str::to_string).collect()))
        .collect()
}

/// Detect the most likely field delimiter by checking consistency across the first few lines.
///
/// For each candidate (tab, semicolon, comma, pipe), count fields per line. The delimiter
/// that produces the most consistent field count (>1 field) wins.
fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b'\t', b';', b',', b'|'];
    let sample_lines: Vec<&str> = content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(10)
        .collect();

    if sample_lines.is_empty() {
        return b',';
    }

    let mut best = b',';
    let mut best_score = 0u64;

    for &delim in candidates {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        // Banner rows vary in width, so score by the most common field count
        let mut target = 0usize;
        let mut consistent = 0u64;
        for &c in &counts {
            if c <= 1 {
                continue;
            }
            let n = counts.iter().filter(|&&x| x == c).count() as u64;
            if n > consistent || (n == consistent && c > target) {
                consistent = n;
                target = c;
            }
        }
        if target == 0 {
            continue;
        }

        // Higher field count breaks ties: more columns, more likely the real delimiter
        let score = consistent * target as u64;
        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

/// Read file and convert to UTF-8 if needed (handles Windows-1252, Latin-1, etc.)
pub fn read_file_as_utf8(path: &Path) -> Result<String, IoError> {
    let read_err = |source| IoError::Read {
        path: path.to_path_buf(),
        source,
    };
    let mut file = std::fs::File::open(path).map_err(read_err)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(read_err)?;

    // Try UTF-8 first; on failure, recover the buffer from the error
    let text = match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => {
            let bytes = e.into_bytes();
            // Fall back to Windows-1252 (common for Excel-exported CSVs)
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            decoded.into_owned()
        }
    };

    Ok(text
        .strip_prefix('\u{feff}')
        .map(str::to_string)
        .unwrap_or(text))
}

/// Write `table` as CSV. The file only appears once fully written.
pub fn write_table(table: &Table, path: &Path) -> Result<(), IoError> {
    commit_staged(path, |tmp| write_records(table, tmp).map_err(|e| e.to_string()))?;
    info!("wrote {} rows to {}", table.rows.len(), path.display());
    Ok(())
}

fn write_records(table: &Table, tmp: &Path) -> Result<(), csv::Error> {
    let mut writer = csv::WriterBuilder::new().from_path(tmp)?;
    writer.write_record(&table.headers)?;
    for record in table.records() {
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Run `write` against a staging file next to `path`, then rename it into
/// place. On any failure the staging file is removed.
fn commit_staged<F>(path: &Path, write: F) -> Result<(), IoError>
where
    F: FnOnce(&Path) -> Result<(), String>,
{
    let tmp = staging_path(path);
    write(&tmp)
        .and_then(|()| std::fs::rename(&tmp, path).map_err(|e| e.to_string()))
        .map_err(|message| {
            let _ = std::fs::remove_file(&tmp);
            IoError::Write {
                path: path.to_path_buf(),
                message,
            }
        })
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn role_region() -> HeaderMarkers {
        HeaderMarkers::columns(["Role", "Region"])
    }

    #[test]
    fn test_header_found_below_banner() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("master.csv");
        fs::write(
            &path,
            "Global Rate Card,,\nDraft - do not circulate,,\nRole,Region,Rate_low\nDesigner,UK-LON,£100\n",
        )
        .unwrap();

        let table = read_table(&path, &role_region()).unwrap();
        assert_eq!(table.headers, vec!["Role", "Region", "Rate_low"]);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].value("Rate_low"), "£100");
    }

    #[test]
    fn test_banner_containing_marker_text_is_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("truth.csv");
        fs::write(
            &path,
            "Roles x Rates reconciliation,,\nCategory | Function,Role,Rate_low\nCreative,Designer,50\n",
        )
        .unwrap();

        let table = read_table(&path, &HeaderMarkers::columns(["Role"])).unwrap();
        assert_eq!(table.headers, vec!["Category | Function", "Role", "Rate_low"]);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].value("Role"), "Designer");
    }

    #[test]
    fn test_banner_naming_every_marker_is_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("master.csv");
        fs::write(
            &path,
            "Global Role/Region rate card,,\nRole,Region,Rate_low\nDesigner,UK-LON,100\n",
        )
        .unwrap();

        let table = read_table(&path, &role_region()).unwrap();
        assert_eq!(table.headers, vec!["Role", "Region", "Rate_low"]);
        assert_eq!(table.rows.len(), 1);
    }

    #[test]
    fn test_column_marker_needs_whole_cell() {
        let markers = HeaderMarkers::columns(["Role"]);
        let longer = vec!["Role Family".to_string(), "Rate".to_string()];
        let padded = vec![" Role ".to_string(), "Rate".to_string()];
        assert!(!markers.matches(&longer));
        assert!(markers.matches(&padded));
        assert_eq!(find_header_row(&[longer], &markers), None);
    }

    #[test]
    fn test_only_longer_column_names_is_header_not_found() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("families.csv");
        fs::write(&path, "Role Family,Regional Lead\nDesign,UK\n").unwrap();

        let err = read_table(&path, &role_region()).unwrap_err();
        assert!(matches!(err, IoError::HeaderNotFound { .. }));
    }

    #[test]
    fn test_marker_matches_inside_cell() {
        let markers = HeaderMarkers::contains(["Department / Category"]);
        let records = vec![
            vec!["Rates".to_string(), "".to_string()],
            vec!["Department / Category (all)".to_string(), "United Kingdom".to_string()],
        ];
        assert_eq!(find_header_row(&records, &markers), Some(1));
    }

    #[test]
    fn test_missing_header_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        fs::write(&path, "Name,Place\nDesigner,UK-LON\n").unwrap();

        let err = read_table(&path, &role_region()).unwrap_err();
        assert!(matches!(err, IoError::HeaderNotFound { .. }));
        assert!(err.to_string().contains("Role, Region"));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let err = read_table(&dir.path().join("nope.csv"), &role_region()).unwrap_err();
        assert!(matches!(err, IoError::NotFound { .. }));
    }

    #[test]
    fn test_short_rows_padded_and_blank_rows_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ragged.csv");
        fs::write(&path, "Role,Region,Notes\nDesigner,UK-LON\n,,\nPlanner,EU-ES,ok,extra\n").unwrap();

        let table = read_table(&path, &role_region()).unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].value("Notes"), "");
        assert_eq!(table.rows[1].value("Notes"), "ok");
        assert_eq!(table.rows[1].len(), 3);
    }

    #[test]
    fn test_bom_and_windows_1252() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cp1252.csv");
        // 0xA3 is '£' in Windows-1252
        let mut bytes = b"Role,Region,Rate_low\nDesigner,UK-LON,".to_vec();
        bytes.push(0xA3);
        bytes.extend_from_slice(b"90\n");
        fs::write(&path, bytes).unwrap();
        let table = read_table(&path, &role_region()).unwrap();
        assert_eq!(table.rows[0].value("Rate_low"), "£90");

        let bom = dir.path().join("bom.csv");
        fs::write(&bom, "\u{feff}Role,Region\nDesigner,UK-LON\n").unwrap();
        let table = read_table(&bom, &role_region()).unwrap();
        assert_eq!(table.headers[0], "Role");
    }

    #[test]
    fn test_sniff_semicolon_delimiter() {
        let content = "Role;Region;Rate_low\nDesigner;UK-LON;100\nPlanner;EU-ES;80\n";
        assert_eq!(sniff_delimiter(content), b';');
    }

    #[test]
    fn test_sniff_comma_with_banner() {
        let content = "Rate card export\n\nRole,Region,Rate_low\nDesigner,UK-LON,\"1,200\"\n";
        assert_eq!(sniff_delimiter(content), b',');
    }

    #[test]
    fn test_sniff_tab_delimiter() {
        let content = "Role\tRegion\tRate_low\nDesigner\tUK-LON\t100\n";
        assert_eq!(sniff_delimiter(content), b'\t');
    }

    #[test]
    fn test_failed_write_leaves_no_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");

        let err = commit_staged(&path, |tmp| {
            fs::write(tmp, "Role,Notes\nhalf a ro").unwrap();
            Err("disk full".to_string())
        })
        .unwrap_err();

        assert!(matches!(err, IoError::Write { .. }));
        assert!(!path.exists());
        assert!(!staging_path(&path).exists());
    }

    #[test]
    fn test_failed_rename_removes_staging_file() {
        let dir = tempdir().unwrap();
        // a non-empty directory cannot be replaced by a file
        let path = dir.path().join("out.csv");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep.txt"), "x").unwrap();
        let table = Table::new(vec!["Role".into()], vec![SourceRow::from_pairs([("Role", "Designer")])]);

        assert!(write_table(&table, &path).is_err());
        assert!(!staging_path(&path).exists());
        assert!(path.is_dir());
    }

    #[test]
    fn test_write_table_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let table = Table::new(
            vec!["Role".into(), "Notes".into()],
            vec![SourceRow::from_pairs([("Role", "Designer"), ("Notes", "a | b, c")])],
        );

        write_table(&table, &path).unwrap();
        assert!(!staging_path(&path).exists());

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "Role,Notes\nDesigner,\"a | b, c\"\n");

        let back = read_table(&path, &HeaderMarkers::columns(["Role"])).unwrap();
        assert_eq!(back, table);
    }
}
