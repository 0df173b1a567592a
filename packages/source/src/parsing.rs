//! Payload decoding and schema validation.
//!
//! Each table kind has a fixed set of required columns. Headers are matched
//! after folding case, accents and punctuation, so `Code.département`,
//! `code_departement` and `CODE DEPARTEMENT` all name the same column. A
//! missing column or an undecodable value fails the whole table; nothing
//! here drops rows.

use std::{borrow::Cow, io::Cursor, io::Read as _};

use calamine::{Data, Reader as _, Xlsx, XlsxError, open_workbook_from_rs};
use crimes_france_geography_models::GeographyMetadata;
use crimes_france_source_models::{GeographyTable, OffenseRecord, OffenseTable, Table, TableId};

use crate::{
    SourceError,
    config::{Compression, TableFormat, TableSource},
};

/// Gzip magic bytes.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// How many leading spreadsheet rows are searched for the header row.
const HEADER_SEARCH_ROWS: usize = 10;

/// Values the agency uses for withheld counts.
const UNPUBLISHED_MARKERS: &[&str] = &["", "na", "n/a", "nd"];

/// Column layout of an offense table.
#[derive(Debug, Clone, Copy)]
struct OffenseSchema {
    /// Accepted names for the geography code column, preferred first.
    code: &'static [&'static str],
}

const MAIN_SCHEMA: OffenseSchema = OffenseSchema {
    code: &["CODGEO_2023", "CODGEO"],
};

const DEPARTMENT_SCHEMA: OffenseSchema = OffenseSchema {
    code: &["Code.département", "Code.departement", "DEP"],
};

const YEAR_COLUMN: &str = "annee";
const CATEGORY_COLUMN: &str = "classe";
const COUNT_COLUMN: &str = "faits";
const POPULATION_COLUMN: &str = "POP";

const GEO_CODE_COLUMN: &str = "CODGEO";
const GEO_NAME_COLUMN: &str = "LIBGEO";
const GEO_DEPARTMENT_COLUMN: &str = "DEP";
const GEO_DEPARTMENT_NAME_COLUMN: &str = "LIBDEP";

/// Decodes the payload of `table` according to its configured format.
///
/// # Errors
///
/// Returns [`SourceError`] if the payload cannot be decompressed or does not
/// match the table's schema.
pub fn decode_table(table: TableId, source: &TableSource, bytes: &[u8]) -> Result<Table, SourceError> {
    match (table, source.format) {
        (TableId::Main | TableId::Department, TableFormat::Csv) => {
            let csv = decompress(bytes, source.compression)?;
            decode_offense_table(table, &csv, source.delimiter_byte()?).map(Table::Offenses)
        }
        (TableId::CommuneMetadata, TableFormat::Xlsx) => {
            let sheet = source.sheet.as_deref().ok_or_else(|| SourceError::Config {
                message: "commune_metadata: xlsx source needs a `sheet`".to_string(),
            })?;
            decode_geography_xlsx(bytes, sheet).map(Table::Geography)
        }
        (TableId::CommuneMetadata, TableFormat::Csv) => {
            let csv = decompress(bytes, source.compression)?;
            decode_geography_csv(&csv, source.delimiter_byte()?).map(Table::Geography)
        }
        (TableId::Main | TableId::Department, TableFormat::Xlsx) => Err(SourceError::Config {
            message: format!("{table}: offense tables must be csv"),
        }),
    }
}

/// Gunzips `bytes` when configured to, or when no compression is configured
/// and the payload starts with the gzip magic bytes.
///
/// # Errors
///
/// Returns [`SourceError::Schema`] if the payload is not valid gzip.
pub fn decompress(bytes: &[u8], compression: Option<Compression>) -> Result<Cow<'_, [u8]>, SourceError> {
    let gzipped = match compression {
        Some(Compression::Gzip) => true,
        Some(Compression::Plain) => false,
        None => bytes.starts_with(&GZIP_MAGIC),
    };
    if !gzipped {
        return Ok(Cow::Borrowed(bytes));
    }

    let mut decoder = flate2::read::GzDecoder::new(bytes);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| SourceError::Schema {
            message: format!("gzip decompression failed: {e}"),
        })?;
    log::debug!(
        "Decompressed {} bytes to {}",
        bytes.len(),
        decompressed.len()
    );
    Ok(Cow::Owned(decompressed))
}

/// Folds text for loose comparison: lower case, accents removed, and
/// everything but letters and digits dropped.
///
/// Used for header matching and for commune name search.
#[must_use]
pub fn fold_text(name: &str) -> String {
    name.chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'à' | 'á' | 'â' | 'ä' | 'ã' => 'a',
            'ç' => 'c',
            'è' | 'é' | 'ê' | 'ë' => 'e',
            'ì' | 'í' | 'î' | 'ï' => 'i',
            'ò' | 'ó' | 'ô' | 'ö' => 'o',
            'ù' | 'ú' | 'û' | 'ü' => 'u',
            'ÿ' => 'y',
            other => other,
        })
        .filter(char::is_ascii_alphanumeric)
        .collect()
}

/// Folded header row with positional lookup.
struct Header {
    folded: Vec<String>,
    raw: Vec<String>,
}

impl Header {
    fn new<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let raw: Vec<String> = names
            .into_iter()
            .map(|n| n.trim().trim_start_matches('\u{feff}').to_string())
            .collect();
        let folded = raw.iter().map(|n| fold_text(n)).collect();
        Self { folded, raw }
    }

    fn position(&self, name: &str) -> Option<usize> {
        let folded = fold_text(name);
        self.folded.iter().position(|h| *h == folded)
    }

    fn any_position(&self, names: &[&str]) -> Option<usize> {
        names.iter().find_map(|n| self.position(n))
    }

    fn require(&self, table: TableId, names: &[&str], delimiter: Option<u8>) -> Result<usize, SourceError> {
        self.any_position(names).ok_or_else(|| {
            let mut message = format!(
                "{table}: missing required column {} (found: {})",
                names.join(" / "),
                self.raw.join(", ")
            );
            if let Some(delimiter) = delimiter
                && self.raw.len() == 1
            {
                message.push_str(&format!(
                    "; only one column was found, the delimiter is probably not {:?}",
                    char::from(delimiter)
                ));
            }
            SourceError::Schema { message }
        })
    }
}

/// Decodes the main or department table from (already decompressed) CSV.
///
/// # Errors
///
/// Returns [`SourceError::Schema`] if a required column is missing or a
/// value cannot be decoded, and [`SourceError::Csv`] if the CSV itself is
/// malformed.
pub fn decode_offense_table(table: TableId, csv: &[u8], delimiter: u8) -> Result<OffenseTable, SourceError> {
    let schema = match table {
        TableId::Main => MAIN_SCHEMA,
        TableId::Department => DEPARTMENT_SCHEMA,
        TableId::CommuneMetadata => {
            return Err(SourceError::Config {
                message: "commune_metadata is not an offense table".to_string(),
            });
        }
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .quote(b'"')
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(csv);

    let header = Header::new(reader.headers()?.iter());
    let code_idx = header.require(table, schema.code, Some(delimiter))?;
    let year_idx = header.require(table, &[YEAR_COLUMN], Some(delimiter))?;
    let category_idx = header.require(table, &[CATEGORY_COLUMN], Some(delimiter))?;
    let count_idx = header.require(table, &[COUNT_COLUMN], Some(delimiter))?;
    let population_idx = header.require(table, &[POPULATION_COLUMN], Some(delimiter))?;

    let mut records = Vec::new();
    for (i, row) in reader.records().enumerate() {
        let row = row?;
        // Header is line 1.
        let line = i + 2;
        let field = |idx: usize| row.get(idx).unwrap_or("");

        let code = field(code_idx);
        if code.is_empty() {
            return Err(schema_error(table, line, "empty geography code"));
        }
        let year = parse_year(field(year_idx)).map_err(|e| schema_error(table, line, &e))?;
        let category = field(category_idx);
        if category.is_empty() {
            return Err(schema_error(table, line, "empty classe"));
        }
        let count = parse_count(field(count_idx)).map_err(|e| schema_error(table, line, &e))?;
        let population =
            parse_count(field(population_idx)).map_err(|e| schema_error(table, line, &e))?;

        records.push(OffenseRecord {
            geography_code: code.to_string(),
            department_code: (table == TableId::Department).then(|| code.to_string()),
            year,
            category: category.to_string(),
            offense_count: count.unwrap_or(0),
            published: count.is_some(),
            population,
        });
    }

    log::info!("{table}: decoded {} rows", records.len());
    Ok(OffenseTable { table, records })
}

/// Decodes the commune metadata sheet of an xlsx workbook.
///
/// The header row is the first of the leading rows that names a `CODGEO`
/// column.
///
/// # Errors
///
/// Returns [`SourceError::Spreadsheet`] if the workbook or sheet cannot be
/// read and [`SourceError::Schema`] if a required column is missing.
pub fn decode_geography_xlsx(bytes: &[u8], sheet: &str) -> Result<GeographyTable, SourceError> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes)).map_err(
        |e: XlsxError| SourceError::Spreadsheet {
            message: e.to_string(),
        },
    )?;
    let range = workbook
        .worksheet_range(sheet)
        .map_err(|e| SourceError::Spreadsheet {
            message: format!("sheet {sheet:?}: {e}"),
        })?;

    let rows: Vec<Vec<String>> = range
        .rows()
        .map(|row| row.iter().map(cell_text).collect())
        .collect();

    let header_idx = rows
        .iter()
        .take(HEADER_SEARCH_ROWS)
        .position(|row| row.iter().any(|c| fold_text(c) == fold_text(GEO_CODE_COLUMN)))
        .ok_or_else(|| SourceError::Schema {
            message: format!(
                "{}: no {GEO_CODE_COLUMN} header in the first {HEADER_SEARCH_ROWS} rows of sheet {sheet:?}",
                TableId::CommuneMetadata
            ),
        })?;

    let header = Header::new(rows[header_idx].iter().map(String::as_str));
    decode_geography_rows(
        &header,
        rows[header_idx + 1..].iter().map(|r| r.iter().map(String::as_str).collect()),
        header_idx + 2,
        None,
    )
}

/// Decodes the commune metadata table from CSV.
///
/// # Errors
///
/// Returns [`SourceError::Schema`] if a required column is missing and
/// [`SourceError::Csv`] if the CSV itself is malformed.
pub fn decode_geography_csv(csv: &[u8], delimiter: u8) -> Result<GeographyTable, SourceError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(csv);

    let header = Header::new(reader.headers()?.iter());
    let rows = reader.records().collect::<Result<Vec<_>, _>>()?;
    decode_geography_rows(
        &header,
        rows.iter().map(|r| r.iter().collect()),
        2,
        Some(delimiter),
    )
}

fn decode_geography_rows<'a>(
    header: &Header,
    rows: impl Iterator<Item = Vec<&'a str>>,
    first_line: usize,
    delimiter: Option<u8>,
) -> Result<GeographyTable, SourceError> {
    let table = TableId::CommuneMetadata;
    let code_idx = header.require(table, &[GEO_CODE_COLUMN], delimiter)?;
    let name_idx = header.require(table, &[GEO_NAME_COLUMN], delimiter)?;
    let department_idx = header.require(table, &[GEO_DEPARTMENT_COLUMN], delimiter)?;
    let department_name_idx = header.position(GEO_DEPARTMENT_NAME_COLUMN);

    let mut entries = Vec::new();
    for (i, row) in rows.enumerate() {
        let field = |idx: usize| row.get(idx).map_or("", |v| v.trim());
        let code = field(code_idx);
        // Trailing blank rows are common in the workbook.
        if code.is_empty() && row.iter().all(|v| v.trim().is_empty()) {
            continue;
        }
        if code.is_empty() {
            return Err(schema_error(table, first_line + i, "empty CODGEO"));
        }

        entries.push(GeographyMetadata {
            geography_code: code.to_string(),
            geography_name: field(name_idx).to_string(),
            department_code: field(department_idx).to_string(),
            department_name: department_name_idx.map(field).unwrap_or_default().to_string(),
        });
    }

    log::info!("{table}: decoded {} rows", entries.len());
    Ok(GeographyTable { entries })
}

#[allow(clippy::cast_possible_truncation)]
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if is_integral(*f) && f.abs() < 1e15 => (*f as i64).to_string(),
        other => other.to_string(),
    }
}

fn is_integral(value: f64) -> bool {
    value.is_finite() && value.fract().abs() < f64::EPSILON
}

fn schema_error(table: TableId, line: usize, message: &str) -> SourceError {
    SourceError::Schema {
        message: format!("{table}: line {line}: {message}"),
    }
}

/// Parses a published year, either two-digit or four-digit. Two-digit years
/// are kept as published; the key normalizer makes them four-digit.
fn parse_year(raw: &str) -> Result<i32, String> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_suffix(".0").unwrap_or(trimmed);
    trimmed
        .parse::<i32>()
        .ok()
        .filter(|y| (0..=99).contains(y) || (1900..=2100).contains(y))
        .ok_or_else(|| format!("invalid annee {raw:?}"))
}

/// Parses a non-negative count. Withheld values yield `None`.
///
/// Integral floats (`"12.0"`, `"12,0"`) are accepted since some exports
/// write counts in decimal form.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn parse_count(raw: &str) -> Result<Option<u64>, String> {
    let trimmed = raw.trim();
    if UNPUBLISHED_MARKERS.contains(&trimmed.to_ascii_lowercase().as_str()) {
        return Ok(None);
    }
    if let Ok(value) = trimmed.parse::<u64>() {
        return Ok(Some(value));
    }
    trimmed
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| *v >= 0.0 && is_integral(*v))
        .map(|v| Some(v as u64))
        .ok_or_else(|| format!("invalid count {raw:?}"))
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::*;

    const MAIN_CSV: &str = "\
\"CODGEO_2023\";\"annee\";\"classe\";\"unité.de.compte\";\"valeur.publiee\";\"faits\";\"POP\"
\"01001\";\"16\";\"Coups et blessures volontaires\";\"victime\";\"diff\";\"3\";\"767\"
\"01001\";\"16\";\"Vols avec armes\";\"infraction\";\"ndiff\";\"NA\";\"767\"
\"2A004\";\"22\";\"Cambriolages de logement\";\"infraction\";\"diff\";\"120\";\"\"
";

    fn gzip(bytes: &[u8]) -> Vec<u8> {
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(bytes).unwrap();
        encoder.finish().unwrap()
    }

    fn csv_source() -> TableSource {
        TableSource {
            url: "https://example.org/main".to_string(),
            file: None,
            format: TableFormat::Csv,
            delimiter: Some(';'),
            compression: None,
            sheet: None,
        }
    }

    #[test]
    fn decodes_main_table() {
        let table = decode_offense_table(TableId::Main, MAIN_CSV.as_bytes(), b';').unwrap();
        assert_eq!(table.table, TableId::Main);
        assert_eq!(table.records.len(), 3);

        let first = &table.records[0];
        assert_eq!(first.geography_code, "01001");
        assert_eq!(first.department_code, None);
        assert_eq!(first.year, 16);
        assert_eq!(first.offense_count, 3);
        assert!(first.published);
        assert_eq!(first.population, Some(767));

        let withheld = &table.records[1];
        assert_eq!(withheld.offense_count, 0);
        assert!(!withheld.published);

        assert_eq!(table.records[2].population, None);
    }

    #[test]
    fn detects_gzip_by_magic_bytes() {
        let compressed = gzip(MAIN_CSV.as_bytes());
        let table = decode_table(TableId::Main, &csv_source(), &compressed).unwrap();
        assert_eq!(table.len(), 3);

        let plain = decode_table(TableId::Main, &csv_source(), MAIN_CSV.as_bytes()).unwrap();
        assert_eq!(plain, table);
    }

    #[test]
    fn corrupt_gzip_is_a_decoding_error() {
        let mut source = csv_source();
        source.compression = Some(Compression::Gzip);
        let err = decode_table(TableId::Main, &source, b"not gzip").unwrap_err();
        assert!(matches!(err, SourceError::Schema { .. }));
        assert!(!err.is_transport());
    }

    #[test]
    fn department_table_headers_fold_accents() {
        let csv = "Code.département;annee;classe;faits;POP\n2A;21;Vols avec armes;4;158507\n";
        let table = decode_offense_table(TableId::Department, csv.as_bytes(), b';').unwrap();
        assert_eq!(table.records[0].geography_code, "2A");
        assert_eq!(table.records[0].department_code.as_deref(), Some("2A"));
        assert_eq!(table.records[0].year, 21);
    }

    #[test]
    fn wrong_delimiter_is_reported() {
        let err = decode_offense_table(TableId::Main, MAIN_CSV.as_bytes(), b',').unwrap_err();
        let SourceError::Schema { message } = err else {
            panic!("expected schema error, got {err:?}");
        };
        assert!(message.contains("CODGEO_2023"), "{message}");
        assert!(message.contains("delimiter"), "{message}");
    }

    #[test]
    fn missing_column_is_a_schema_error() {
        let csv = "CODGEO_2023;annee;classe;POP\n01001;16;Vols avec armes;767\n";
        let err = decode_offense_table(TableId::Main, csv.as_bytes(), b';').unwrap_err();
        let SourceError::Schema { message } = err else {
            panic!("expected schema error, got {err:?}");
        };
        assert!(message.contains("faits"), "{message}");
        assert!(!message.contains("delimiter"), "{message}");
    }

    #[test]
    fn undecodable_value_fails_the_table() {
        let csv = "CODGEO_2023;annee;classe;faits;POP\n01001;16;Vols avec armes;-2;767\n";
        let err = decode_offense_table(TableId::Main, csv.as_bytes(), b';').unwrap_err();
        let SourceError::Schema { message } = err else {
            panic!("expected schema error, got {err:?}");
        };
        assert!(message.contains("line 2"), "{message}");
    }

    #[test]
    fn decodes_geography_csv_without_department_names() {
        let csv = "CODGEO,LIBGEO,DEP\n13022,Cassis,13\n,,\n";
        let table = decode_geography_csv(csv.as_bytes(), b',').unwrap();
        assert_eq!(table.entries.len(), 1);
        assert_eq!(table.entries[0].geography_name, "Cassis");
        assert_eq!(table.entries[0].department_code, "13");
        assert_eq!(table.entries[0].department_name, "");
    }

    #[test]
    fn invalid_workbook_is_a_spreadsheet_error() {
        let err = decode_geography_xlsx(b"PK not really a zip", "zonages supracommunaux").unwrap_err();
        assert!(matches!(err, SourceError::Spreadsheet { .. }));
    }

    #[test]
    fn folds_headers() {
        assert_eq!(fold_text("Code.département"), "codedepartement");
        assert_eq!(fold_text(" CODGEO_2023 "), "codgeo2023");
        assert_eq!(fold_text("unité.de.compte"), "unitedecompte");
    }

    #[test]
    fn parses_years() {
        assert_eq!(parse_year("16"), Ok(16));
        assert_eq!(parse_year("2016"), Ok(2016));
        assert!(parse_year("216").is_err());
        assert!(parse_year("seize").is_err());
    }

    #[test]
    fn parses_counts() {
        assert_eq!(parse_count("12"), Ok(Some(12)));
        assert_eq!(parse_count("12.0"), Ok(Some(12)));
        assert_eq!(parse_count("12,0"), Ok(Some(12)));
        assert_eq!(parse_count("NA"), Ok(None));
        assert_eq!(parse_count(""), Ok(None));
        assert!(parse_count("1.5").is_err());
        assert!(parse_count("-1").is_err());
    }
}
