//! # Reference Dataset Loading
//!
//! This module is the only place that touches the historical transaction table.
//! It reads a delimited text file into an immutable, column-named `ndarray`
//! matrix that the feature reconstructor derives its medians from.
//!
//! - Tolerant Parsing: the file may be comma- or semicolon-delimited. The comma
//!   reading is tried first and the semicolon reading is only attempted when the
//!   first one produces no usable table.
//! - Malformed Rows: rows with too many fields or with a token that is not a
//!   number are skipped and counted rather than failing the load. Short rows and
//!   empty fields are kept, with the missing values stored as NaN.
//! - Compression: `.gz` files are gunzipped and `.zip` archives are read from
//!   their first file entry.
//! - Deduplication: exact duplicate rows are collapsed to their first occurrence.

use ahash::AHashSet;
use flate2::read::MultiGzDecoder;
use ndarray::parallel::prelude::*;
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use zip::ZipArchive;

/// Name of the label column. It never contributes to feature medians.
pub const LABEL_COLUMN: &str = "Class";

/// Delimiters tried, in order, when loading a reference dataset from disk.
pub const SUPPORTED_DELIMITERS: [u8; 2] = [b',', b';'];

/// A comprehensive error type for reference dataset loading failures.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Failed to open '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Error from the underlying CSV reader: {0}")]
    Csv(#[from] csv::Error),
    #[error("The reference dataset is empty; a header row is required.")]
    MissingHeader,
    #[error(
        "The header row has only {found} column(s). The file is probably not separated by this delimiter."
    )]
    TooFewColumns { found: usize },
    #[error("The header has no 'Class' label column.")]
    MissingLabelColumn,
    #[error("Failed to read zip archive '{path}': {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
    #[error("No usable data rows were found ({skipped} malformed rows were skipped).")]
    NoUsableRows { skipped: usize },
    #[error(
        "The reference dataset '{path}' could not be read with either ',' or ';' as the delimiter. Last error: {last}"
    )]
    Unreadable {
        path: PathBuf,
        #[source]
        last: Box<DataError>,
    },
}

/// The immutable historical transaction table.
#[derive(Debug, Clone)]
pub struct ReferenceDataset {
    columns: Vec<String>,
    /// Shape: [n_rows, n_columns], in header order.
    values: Array2<f64>,
    skipped_rows: usize,
    duplicate_rows: usize,
}

impl ReferenceDataset {
    /// Loads a dataset from disk, trying every supported delimiter in turn.
    ///
    /// Files ending in `.gz` are decompressed on the fly, and `.zip` archives are
    /// read from their first file entry.
    pub fn load(path: &Path) -> Result<Self, DataError> {
        log::info!("Loading reference dataset from '{}'", path.display());

        let mut last_error = None;
        for delimiter in SUPPORTED_DELIMITERS {
            let attempt = open_source(path).and_then(|reader| Self::from_reader(reader, delimiter));
            match attempt {
                Ok(dataset) => {
                    log::info!(
                        "Loaded {} unique rows x {} columns (delimiter '{}', {} malformed rows skipped, {} duplicates removed)",
                        dataset.n_rows(),
                        dataset.columns.len(),
                        delimiter as char,
                        dataset.skipped_rows,
                        dataset.duplicate_rows
                    );
                    return Ok(dataset);
                }
                Err(err) => {
                    log::debug!(
                        "Reading '{}' with delimiter '{}' failed: {err}",
                        path.display(),
                        delimiter as char
                    );
                    // A too-narrow header only says the delimiter was wrong.
                    if last_error.is_none() || !matches!(err, DataError::TooFewColumns { .. }) {
                        last_error = Some(err);
                    }
                }
            }
        }

        Err(DataError::Unreadable {
            path: path.to_path_buf(),
            last: Box::new(last_error.unwrap_or(DataError::MissingHeader)),
        })
    }

    /// Parses a dataset with a single, fixed delimiter.
    pub fn from_reader<R: Read>(reader: R, delimiter: u8) -> Result<Self, DataError> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let header = rdr.byte_headers()?.clone();
        if header.is_empty() {
            return Err(DataError::MissingHeader);
        }
        if header.len() < 2 {
            return Err(DataError::TooFewColumns {
                found: header.len(),
            });
        }
        let columns: Vec<String> = header.iter().map(decode_latin1).collect();
        if !columns.iter().any(|c| c == LABEL_COLUMN) {
            return Err(DataError::MissingLabelColumn);
        }
        let width = columns.len();

        let mut flat: Vec<f64> = Vec::new();
        let mut seen: AHashSet<Box<[u64]>> = AHashSet::new();
        let mut row = Vec::with_capacity(width);
        let mut skipped_rows = 0usize;
        let mut duplicate_rows = 0usize;
        let mut record = csv::ByteRecord::new();

        while rdr.read_byte_record(&mut record)? {
            if record.len() > width {
                skipped_rows += 1;
                continue;
            }

            row.clear();
            if !parse_fields(&record, &mut row) {
                skipped_rows += 1;
                continue;
            }
            row.resize(width, f64::NAN);

            let key: Box<[u64]> = row.iter().map(|&v| canonical_bits(v)).collect();
            if !seen.insert(key) {
                duplicate_rows += 1;
                continue;
            }
            flat.extend_from_slice(&row);
        }

        if skipped_rows > 0 {
            log::warn!("Skipped {skipped_rows} malformed rows in the reference dataset");
        }

        let n_rows = flat.len() / width;
        if n_rows == 0 {
            return Err(DataError::NoUsableRows {
                skipped: skipped_rows,
            });
        }

        let values = Array2::from_shape_vec((n_rows, width), flat)
            .expect("row buffer length is a multiple of the header width");

        Ok(Self {
            columns,
            values,
            skipped_rows,
            duplicate_rows,
        })
    }

    /// Column names in header order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    /// Number of rows dropped for having too many fields or a non-numeric token.
    pub fn skipped_rows(&self) -> usize {
        self.skipped_rows
    }

    /// Number of exact duplicate rows collapsed during loading.
    pub fn duplicate_rows(&self) -> usize {
        self.duplicate_rows
    }

    /// Index of a column by exact name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Medians of every column, in header order. Columns are reduced in parallel.
    pub fn column_medians(&self) -> Vec<f64> {
        self.values
            .axis_iter(Axis(1))
            .into_par_iter()
            .map(median)
            .collect()
    }
}

/// Median of a column, ignoring missing values.
///
/// An even number of observations averages the two middle values. A column with
/// no observed values has a NaN median.
pub fn median(column: ArrayView1<'_, f64>) -> f64 {
    let mut observed: Vec<f64> = column.iter().copied().filter(|v| !v.is_nan()).collect();
    if observed.is_empty() {
        return f64::NAN;
    }
    observed.sort_unstable_by(|a, b| a.total_cmp(b));

    let mid = observed.len() / 2;
    if observed.len() % 2 == 0 {
        (observed[mid - 1] + observed[mid]) / 2.0
    } else {
        observed[mid]
    }
}

fn open_source(path: &Path) -> Result<Box<dyn Read>, DataError> {
    let file = File::open(path).map_err(|source| DataError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let reader: Box<dyn Read> = match path.extension().and_then(|ext| ext.to_str()) {
        Some("gz") => Box::new(MultiGzDecoder::new(BufReader::new(file))),
        Some("zip") => Box::new(Cursor::new(read_first_zip_entry(path, file)?)),
        _ => Box::new(BufReader::new(file)),
    };
    Ok(reader)
}

/// Contents of the first file entry of a zip archive.
fn read_first_zip_entry(path: &Path, file: File) -> Result<Vec<u8>, DataError> {
    let archive_error = |source| DataError::Archive {
        path: path.to_path_buf(),
        source,
    };
    let mut archive = ZipArchive::new(BufReader::new(file)).map_err(archive_error)?;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(archive_error)?;
        if !entry.is_file() {
            continue;
        }
        log::debug!("Reading '{}' from '{}'", entry.name(), path.display());
        let mut bytes = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
        entry
            .read_to_end(&mut bytes)
            .map_err(|source| DataError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        return Ok(bytes);
    }

    Err(archive_error(zip::result::ZipError::FileNotFound))
}

/// Header cells are ISO-8859-1; every byte maps to the code point of the same value.
fn decode_latin1(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| b as char)
        .collect::<String>()
        .trim()
        .to_string()
}

/// Parses every field of a record into `row`. Returns `false` on the first
/// token that is neither empty nor a number.
fn parse_fields(record: &csv::ByteRecord, row: &mut Vec<f64>) -> bool {
    for field in record.iter() {
        let token = field.trim_ascii();
        if token.is_empty() {
            row.push(f64::NAN);
            continue;
        }
        match lexical_core::parse::<f64>(token) {
            Ok(value) => row.push(value),
            Err(_) => return false,
        }
    }
    true
}

/// Bit pattern used for duplicate detection. All NaNs compare equal, as do
/// `0.0` and `-0.0`.
fn canonical_bits(value: f64) -> u64 {
    if value.is_nan() {
        f64::NAN.to_bits()
    } else if value == 0.0 {
        0.0f64.to_bits()
    } else {
        value.to_bits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use ndarray::array;
    use std::io::Write;
    use tempfile::{Builder, NamedTempFile};
    use zip::CompressionMethod;
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    fn create_test_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("tempfile");
        write!(file, "{content}").expect("write fixture");
        file.flush().expect("flush fixture");
        file
    }

    #[test]
    fn test_comma_separated_dataset_loads() {
        let file = create_test_file("Time,V1,Amount,Class\n0,1.5,10,0\n1,-2.0,20,1\n");
        let dataset = ReferenceDataset::load(file.path()).unwrap();

        assert_eq!(dataset.columns(), &["Time", "V1", "Amount", "Class"]);
        assert_eq!(dataset.n_rows(), 2);
        assert_abs_diff_eq!(dataset.values()[[1, 1]], -2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_semicolon_fallback() {
        let file = create_test_file("Time;V1;Amount;Class\n0;1.5;10;0\n1;2.5;20;1\n");
        let dataset = ReferenceDataset::load(file.path()).unwrap();

        assert_eq!(dataset.columns().len(), 4);
        assert_eq!(dataset.n_rows(), 2);
        assert_abs_diff_eq!(dataset.values()[[0, 2]], 10.0, epsilon = 1e-12);
    }

    #[test]
    fn test_malformed_rows_are_skipped() {
        let content = "V1,V2,Class\n1,2,0\n1,2,3,4\nabc,2,0\n3,4,1\n";
        let dataset = ReferenceDataset::from_reader(content.as_bytes(), b',').unwrap();

        assert_eq!(dataset.n_rows(), 2);
        assert_eq!(dataset.skipped_rows(), 2);
    }

    #[test]
    fn test_short_rows_are_padded_with_missing_values() {
        let content = "V1,V2,Class\n1,2,0\n5\n3,4,1\n";
        let dataset = ReferenceDataset::from_reader(content.as_bytes(), b',').unwrap();

        assert_eq!(dataset.n_rows(), 3);
        assert_eq!(dataset.skipped_rows(), 0);
        assert_abs_diff_eq!(dataset.values()[[1, 0]], 5.0, epsilon = 1e-12);
        assert!(dataset.values()[[1, 1]].is_nan());
        assert!(dataset.values()[[1, 2]].is_nan());

        let medians = dataset.column_medians();
        assert_abs_diff_eq!(medians[0], 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(medians[1], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_missing_label_column_is_rejected() {
        let content = "Time,V1,V2,Amount\n0,1.0,2.0,5.0\n";
        let err = ReferenceDataset::from_reader(content.as_bytes(), b',').unwrap_err();
        assert!(matches!(err, DataError::MissingLabelColumn));

        let file = create_test_file(content);
        match ReferenceDataset::load(file.path()).unwrap_err() {
            DataError::Unreadable { last, .. } => {
                assert!(matches!(*last, DataError::MissingLabelColumn));
            }
            other => panic!("Expected Unreadable error, got {other:?}"),
        }
    }

    #[test]
    fn test_zip_archive_reads_first_file_entry() {
        let mut file = Builder::new().suffix(".csv.zip").tempfile().expect("tempfile");
        {
            let mut writer = ZipWriter::new(&mut file);
            let options =
                SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
            writer.add_directory("data/", options).expect("add directory");
            writer
                .start_file("data/creditcard.csv", options)
                .expect("start zip entry");
            writer
                .write_all(b"V1,Amount,Class\n1,10,0\n3,30,0\n5,50,1\n")
                .expect("write zip entry");
            writer.finish().expect("finish zip");
        }
        file.flush().expect("flush fixture");

        let dataset = ReferenceDataset::load(file.path()).unwrap();
        assert_eq!(dataset.columns(), &["V1", "Amount", "Class"]);
        assert_eq!(dataset.n_rows(), 3);
        assert_abs_diff_eq!(dataset.column_medians()[1], 30.0, epsilon = 1e-12);
    }

    #[test]
    fn test_corrupt_zip_archive_is_unreadable() {
        let mut file = Builder::new().suffix(".zip").tempfile().expect("tempfile");
        file.write_all(b"V1,Amount,Class\n1,10,0\n").expect("write fixture");
        file.flush().expect("flush fixture");

        match ReferenceDataset::load(file.path()).unwrap_err() {
            DataError::Unreadable { last, .. } => {
                assert!(matches!(*last, DataError::Archive { .. }));
            }
            other => panic!("Expected Unreadable error, got {other:?}"),
        }
    }

    #[test]
    fn test_quoted_fields_and_latin1_header() {
        let mut bytes = b"\"V1\",\"Gr\xf6\xdfe\",\"Class\"\n".to_vec();
        bytes.extend_from_slice(b"1.0,2.0,\"0\"\n");
        let dataset = ReferenceDataset::from_reader(bytes.as_slice(), b',').unwrap();

        assert_eq!(dataset.columns()[1], "Größe");
        assert_abs_diff_eq!(dataset.values()[[0, 2]], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_exact_duplicates_collapse() {
        let content = "V1,V2,Class\n1,2,0\n1,2,0\n1,2,1\n1,2,0\n";
        let dataset = ReferenceDataset::from_reader(content.as_bytes(), b',').unwrap();

        assert_eq!(dataset.n_rows(), 2);
        assert_eq!(dataset.duplicate_rows(), 2);
    }

    #[test]
    fn test_empty_fields_are_missing_values() {
        let content = "V1,V2,Class\n1,,0\n3,4,0\n";
        let dataset = ReferenceDataset::from_reader(content.as_bytes(), b',').unwrap();

        assert!(dataset.values()[[0, 1]].is_nan());
        let medians = dataset.column_medians();
        assert_abs_diff_eq!(medians[1], 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_unreadable_file_reports_both_attempts() {
        let err = ReferenceDataset::load(Path::new("/nonexistent/creditcard.csv")).unwrap_err();
        match err {
            DataError::Unreadable { path, last } => {
                assert_eq!(path, PathBuf::from("/nonexistent/creditcard.csv"));
                assert!(matches!(*last, DataError::Io { .. }));
            }
            other => panic!("Expected Unreadable error, got {other:?}"),
        }
    }

    #[test]
    fn test_single_column_file_is_unreadable() {
        let file = create_test_file("just one column\n1\n2\n");
        let err = ReferenceDataset::load(file.path()).unwrap_err();
        match err {
            DataError::Unreadable { last, .. } => {
                assert!(matches!(*last, DataError::TooFewColumns { found: 1 }));
            }
            other => panic!("Expected Unreadable error, got {other:?}"),
        }
    }

    #[test]
    fn test_header_only_file_has_no_rows() {
        let err = ReferenceDataset::from_reader("V1,V2,Class\n".as_bytes(), b',').unwrap_err();
        assert!(matches!(err, DataError::NoUsableRows { skipped: 0 }));
    }

    #[test]
    fn test_gzip_dataset_is_decompressed() {
        let mut file = Builder::new().suffix(".csv.gz").tempfile().expect("tempfile");
        {
            let mut encoder = GzEncoder::new(&mut file, Compression::default());
            encoder
                .write_all(b"V1,Amount,Class\n1,10,0\n3,30,0\n")
                .expect("compress fixture");
            encoder.finish().expect("finish gzip");
        }
        file.flush().expect("flush fixture");

        let dataset = ReferenceDataset::load(file.path()).unwrap();
        assert_eq!(dataset.n_rows(), 2);
        assert_eq!(dataset.column_index("Amount"), Some(1));
    }

    #[test]
    fn test_median_odd_even_and_missing() {
        assert_abs_diff_eq!(median(array![3.0, 1.0, 2.0].view()), 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(median(array![4.0, 1.0, 3.0, 2.0].view()), 2.5, epsilon = 1e-12);
        assert_abs_diff_eq!(
            median(array![f64::NAN, 5.0, 1.0].view()),
            3.0,
            epsilon = 1e-12
        );
        assert!(median(array![f64::NAN, f64::NAN].view()).is_nan());
    }

    #[test]
    fn test_column_medians_preserve_header_order() {
        let content = "A,B,Class\n1,10,0\n2,30,1\n3,20,0\n";
        let dataset = ReferenceDataset::from_reader(content.as_bytes(), b',').unwrap();
        let medians = dataset.column_medians();

        assert_eq!(medians.len(), 3);
        assert_abs_diff_eq!(medians[0], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(medians[1], 20.0, epsilon = 1e-12);
        assert_abs_diff_eq!(medians[2], 0.0, epsilon = 1e-12);
    }
}
