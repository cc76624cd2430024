use crate::error::{EncoderError, Result};
use crate::matrices::{PSI_BLAST_ORDER, RESIDUE_INDEX};
use ndarray::Array2;
use statrs::statistics::Statistics;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};

/// Row count every encoded peptide is zero-padded to
pub const MAX_ENCODED_LEN: usize = 420;

/// Supported static encoding schemes
///
/// Resolved from scheme names at the call boundary; an unrecognized name is a
/// typed `UnknownScheme` error rather than a diagnostic print.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncodingScheme {
    /// Standardized substitution-matrix row per residue
    Blosum,
    /// Standardized physicochemical property vector per residue
    Properties,
    /// VHSE descriptor vector per residue
    Vhse,
}

impl EncodingScheme {
    /// Resolves a scheme name
    ///
    /// # Errors
    /// * Returns `EncoderError::UnknownScheme` for unrecognized names
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "blosum" => Ok(EncodingScheme::Blosum),
            "allProperties" | "properties" => Ok(EncodingScheme::Properties),
            "vhse" => Ok(EncodingScheme::Vhse),
            _ => Err(EncoderError::UnknownScheme(name.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            EncodingScheme::Blosum => "blosum",
            EncodingScheme::Properties => "allProperties",
            EncodingScheme::Vhse => "vhse",
        }
    }
}

/// A fixed-width numeric feature vector per residue
#[derive(Debug, Clone)]
pub struct EncodingTable {
    rows: HashMap<char, Vec<f64>>,
    width: usize,
}

/// Splits a table line on its separator, comma for CSV-style files and
/// whitespace otherwise
fn split_fields(line: &str) -> Vec<String> {
    if line.contains(',') {
        line.split(',').map(|f| f.trim().to_string()).collect()
    } else {
        line.split_whitespace().map(|f| f.to_string()).collect()
    }
}

fn table_lines(filename: &str) -> Result<Vec<Vec<String>>> {
    let file = File::open(filename)?;
    let reader = BufReader::new(file);

    let mut lines = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        lines.push(split_fields(line));
    }

    if lines.len() < 2 {
        return Err(EncoderError::invalid_file_format(
            "Encoding table needs a header and at least one data row",
        ));
    }

    Ok(lines)
}

fn parse_value(token: &str) -> Result<f64> {
    token.parse::<f64>().map_err(|e| {
        EncoderError::invalid_file_format(format!("Invalid table value '{}': {}", token, e))
    })
}

/// Single-character tokens in a header row, with their token positions
fn residue_columns(header: &[String]) -> HashMap<char, usize> {
    let mut columns = HashMap::new();
    for (position, token) in header.iter().enumerate() {
        let mut chars = token.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            if RESIDUE_INDEX.contains_key(&c) {
                columns.insert(c, position);
            }
        }
    }
    columns
}

impl EncodingTable {
    /// Builds a table from residue feature vectors
    ///
    /// # Errors
    /// * Returns `EncoderError::InvalidInput` if the map is empty or the
    ///   vectors have unequal widths
    pub fn new(rows: HashMap<char, Vec<f64>>) -> Result<Self> {
        let width = rows
            .values()
            .next()
            .ok_or_else(|| EncoderError::InvalidInput("Empty encoding table".into()))?
            .len();

        if rows.values().any(|row| row.len() != width) {
            return Err(EncoderError::InvalidInput(
                "Encoding table rows have unequal widths".into(),
            ));
        }

        Ok(EncodingTable { rows, width })
    }

    /// Reads a residue-by-residue matrix whose rows and columns are both
    /// labelled with residue letters (BLOSUM layout).
    ///
    /// Columns are reordered into canonical residue order; rows for
    /// non-canonical symbols (B, Z, X, *) are dropped.
    ///
    /// # Errors
    /// * Returns `EncoderError::Io` if the file cannot be opened or read
    /// * Returns `EncoderError::InvalidFileFormat` if a value does not parse
    ///   or any canonical residue is missing from the header or rows
    pub fn from_square_matrix_file(filename: &str) -> Result<Self> {
        let lines = table_lines(filename)?;
        let columns = residue_columns(&lines[0]);

        let mut rows = HashMap::new();
        for fields in &lines[1..] {
            let label = match fields.first().map(|f| f.as_str()) {
                Some(label) if label.chars().count() == 1 => label.chars().next().unwrap(),
                _ => continue,
            };
            if !RESIDUE_INDEX.contains_key(&label) {
                continue;
            }

            let mut vector = Vec::with_capacity(PSI_BLAST_ORDER.len());
            for symbol in PSI_BLAST_ORDER {
                let position = columns.get(&symbol).ok_or_else(|| {
                    EncoderError::invalid_file_format(format!(
                        "Matrix header lacks residue '{}'",
                        symbol
                    ))
                })?;
                // row fields carry the row label in front of the header columns
                let token = fields.get(position + 1).ok_or_else(|| {
                    EncoderError::invalid_file_format(format!(
                        "Matrix row '{}' is shorter than its header",
                        label
                    ))
                })?;
                vector.push(parse_value(token)?);
            }
            rows.insert(label, vector);
        }

        for symbol in PSI_BLAST_ORDER {
            if !rows.contains_key(&symbol) {
                return Err(EncoderError::invalid_file_format(format!(
                    "Matrix lacks a row for residue '{}'",
                    symbol
                )));
            }
        }

        EncodingTable::new(rows)
    }

    /// Reads a property table whose columns are labelled with residue letters
    /// and whose rows are properties (aaIndex / VHSE layout).
    ///
    /// Rows may carry a leading property label; both labelled and unlabelled
    /// headers are accepted.
    ///
    /// # Errors
    /// * Returns `EncoderError::Io` if the file cannot be opened or read
    /// * Returns `EncoderError::InvalidFileFormat` if a value does not parse,
    ///   a canonical residue column is missing, or a row does not align with
    ///   the header
    pub fn from_property_file(filename: &str) -> Result<Self> {
        let lines = table_lines(filename)?;
        let header = &lines[0];
        let columns = residue_columns(header);

        for symbol in PSI_BLAST_ORDER {
            if !columns.contains_key(&symbol) {
                return Err(EncoderError::invalid_file_format(format!(
                    "Property table lacks a column for residue '{}'",
                    symbol
                )));
            }
        }

        let mut rows: HashMap<char, Vec<f64>> =
            PSI_BLAST_ORDER.iter().map(|&c| (c, Vec::new())).collect();

        for fields in &lines[1..] {
            let offset = match fields.len().checked_sub(header.len()) {
                Some(offset @ (0 | 1)) => offset,
                _ => {
                    return Err(EncoderError::invalid_file_format(format!(
                        "Property row with {} fields does not align with a {}-column header",
                        fields.len(),
                        header.len()
                    )))
                }
            };

            for symbol in PSI_BLAST_ORDER {
                let position = columns[&symbol] + offset;
                let value = parse_value(&fields[position])?;
                rows.get_mut(&symbol).unwrap().push(value);
            }
        }

        EncodingTable::new(rows)
    }

    /// Z-scores each feature dimension across the residues, using the
    /// population standard deviation
    pub fn standardize(&mut self) {
        for feature in 0..self.width {
            let values: Vec<f64> = self.rows.values().map(|row| row[feature]).collect();
            let mean = Statistics::mean(&values);
            let std = Statistics::population_std_dev(&values);
            if std == 0.0 {
                continue;
            }
            for row in self.rows.values_mut() {
                row[feature] = (row[feature] - mean) / std;
            }
        }
    }

    /// Feature vector width
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn row(&self, residue: char) -> Option<&[f64]> {
        self.rows.get(&residue).map(|row| row.as_slice())
    }
}

/// Encodes peptides into fixed-shape numeric matrices from static reference
/// tables.
///
/// Each residue maps to the concatenation of its per-scheme feature vectors;
/// the rows are zero-padded to a fixed frame height. Per-peptide failures are
/// returned as per-item results so the caller decides between
/// aggregate-and-continue and fail-fast.
#[derive(Debug, Clone)]
pub struct PeptideEncoder {
    tables: HashMap<EncodingScheme, EncodingTable>,
    max_len: usize,
}

impl Default for PeptideEncoder {
    fn default() -> Self {
        PeptideEncoder::new()
    }
}

impl PeptideEncoder {
    pub fn new() -> Self {
        PeptideEncoder {
            tables: HashMap::new(),
            max_len: MAX_ENCODED_LEN,
        }
    }

    /// Registers the reference table backing a scheme
    pub fn with_table(mut self, scheme: EncodingScheme, table: EncodingTable) -> Self {
        self.tables.insert(scheme, table);
        self
    }

    /// Overrides the padded frame height (default `MAX_ENCODED_LEN`)
    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }

    fn table(&self, scheme: EncodingScheme) -> Result<&EncodingTable> {
        self.tables.get(&scheme).ok_or_else(|| {
            EncoderError::invalid_parameter(
                "scheme",
                scheme.name(),
                "no reference table loaded for this scheme",
            )
        })
    }

    /// Width of one encoded residue row under the given schemes
    ///
    /// # Errors
    /// * Returns `EncoderError::InvalidInput` if no schemes are given
    /// * Returns `EncoderError::InvalidParameter` for a scheme without a table
    pub fn row_width(&self, schemes: &[EncodingScheme]) -> Result<usize> {
        if schemes.is_empty() {
            return Err(EncoderError::InvalidInput(
                "No encoding schemes given".into(),
            ));
        }

        let mut width = 0;
        for &scheme in schemes {
            width += self.table(scheme)?.width();
        }
        Ok(width)
    }

    /// Encodes one peptide into a `(max_len, row_width)` matrix.
    ///
    /// `bias` appends one all-ones row after the residue rows, before the
    /// zero padding.
    ///
    /// # Errors
    /// * Returns `EncoderError::InvalidParameter` for a scheme without a table
    /// * Returns `EncoderError::InvalidSequence` for a residue missing from a
    ///   table
    /// * Returns `EncoderError::InvalidInput` if the encoded rows exceed the
    ///   padded frame height
    pub fn encode_peptide(
        &self,
        peptide: &str,
        schemes: &[EncodingScheme],
        bias: bool,
    ) -> Result<Array2<f64>> {
        let width = self.row_width(schemes)?;
        let residues: Vec<char> = peptide.chars().collect();

        let rows_needed = residues.len() + usize::from(bias);
        if rows_needed > self.max_len {
            return Err(EncoderError::InvalidInput(format!(
                "Encoded peptide needs {} rows, exceeding the {}-row frame",
                rows_needed, self.max_len
            )));
        }

        let mut flat = Vec::with_capacity(self.max_len * width);
        for (position, &residue) in residues.iter().enumerate() {
            for &scheme in schemes {
                let table = self.table(scheme)?;
                let row = table.row(residue).ok_or_else(|| {
                    EncoderError::invalid_sequence(
                        position,
                        format!("no {} entry for residue '{}'", scheme.name(), residue),
                    )
                })?;
                flat.extend_from_slice(row);
            }
        }

        if bias {
            flat.extend(std::iter::repeat(1.0).take(width));
        }
        flat.resize(self.max_len * width, 0.0);

        Array2::from_shape_vec((self.max_len, width), flat)
            .map_err(|e| EncoderError::DataError(e.to_string()))
    }

    /// Encodes a peptide set, one typed result per peptide
    pub fn encode_peptides(
        &self,
        peptides: &[String],
        schemes: &[EncodingScheme],
        bias: bool,
    ) -> Vec<Result<Array2<f64>>> {
        peptides
            .iter()
            .map(|peptide| self.encode_peptide(peptide, schemes, bias))
            .collect()
    }
}
