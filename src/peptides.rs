use crate::error::{EncoderError, Result};
use polars::prelude::*;
use std::fs::File;
use std::io::{BufRead, BufReader};

/// Reads peptides and target values from a whitespace-separated text file
/// into a Polars DataFrame.
///
/// Each line holds an amino-acid sequence followed by a numeric target
/// (e.g. a log-transformed IC50 binding value). Blank lines and `#` comments
/// are skipped. The frame is sorted by target, descending.
///
/// # Arguments
/// * `filename` - Path to the peptide/target file to read
///
/// # Returns
/// * `Result<DataFrame>` - A DataFrame with two columns:
///   - "peptide": The sequences in uppercase
///   - "target": The corresponding target values
///
/// # Errors
/// * Returns `EncoderError::InvalidFileFormat` if a line has no target value
///   or the target does not parse, or if no peptides are found
/// * Returns `EncoderError::DataError` if DataFrame creation fails
/// * Returns `EncoderError::Io` for file reading issues
pub fn load_peptide_target(filename: &str) -> Result<DataFrame> {
    let file = File::open(filename)?;
    let reader = BufReader::new(file);

    let mut peptides: Vec<String> = Vec::new();
    let mut targets: Vec<f64> = Vec::new();

    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut fields = line.split_whitespace();
        let peptide = fields.next();
        let target = fields.next();
        match (peptide, target) {
            (Some(peptide), Some(target)) => {
                let target: f64 = target.parse().map_err(|e| {
                    EncoderError::invalid_file_format(format!(
                        "Invalid target value '{}': {}",
                        target, e
                    ))
                })?;
                peptides.push(peptide.to_uppercase());
                targets.push(target);
            }
            _ => {
                return Err(EncoderError::invalid_file_format(format!(
                    "Expected 'peptide target' fields, found '{}'",
                    line
                )))
            }
        }
    }

    if peptides.is_empty() {
        return Err(EncoderError::invalid_file_format("No peptides found"));
    }

    let df = DataFrame::new(vec![
        Column::new("peptide".into(), peptides),
        Column::new("target".into(), targets),
    ])
    .map_err(|e| EncoderError::DataError(e.to_string()))?;

    let df = df
        .sort(
            ["target"],
            SortMultipleOptions::default().with_order_descending(true),
        )
        .map_err(|e| EncoderError::DataError(e.to_string()))?;

    Ok(df)
}

/// Reads a plain peptide list from a text file, one peptide per line.
///
/// Only the first whitespace-separated token of each line is kept, so
/// peptide/target files are accepted too. Sequences are uppercased.
///
/// # Errors
/// * Returns `EncoderError::InvalidFileFormat` if no peptides are found
/// * Returns `EncoderError::Io` for file reading issues
pub fn read_peptides(filename: &str) -> Result<Vec<String>> {
    let file = File::open(filename)?;
    let reader = BufReader::new(file);

    let mut peptides = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(token) = line.split_whitespace().next() {
            peptides.push(token.to_uppercase());
        }
    }

    if peptides.is_empty() {
        return Err(EncoderError::invalid_file_format("No peptides found"));
    }

    Ok(peptides)
}

/// Extracts the "peptide" column of a DataFrame as owned strings.
///
/// # Errors
/// * Returns `EncoderError::DataError` if the column is missing or not a
///   string column
pub fn peptide_column(df: &DataFrame) -> Result<Vec<String>> {
    let peptides = df
        .column("peptide")
        .map_err(|e| EncoderError::DataError(e.to_string()))?
        .str()
        .map_err(|e| EncoderError::DataError(e.to_string()))?;

    Ok(peptides
        .into_iter()
        .map(|p| p.unwrap_or_default().to_string())
        .collect())
}

/// Checks that every peptide in the set shares the length of the first one
/// and returns that length.
///
/// # Errors
/// * Returns `EncoderError::EmptyPeptideSet` for an empty set
/// * Returns `EncoderError::LengthMismatch` naming the first offending
///   peptide index
pub fn validate_equal_length(peptides: &[String]) -> Result<usize> {
    let first = peptides.first().ok_or(EncoderError::EmptyPeptideSet)?;
    let expected = first.chars().count();

    for (index, peptide) in peptides.iter().enumerate() {
        let found = peptide.chars().count();
        if found != expected {
            return Err(EncoderError::LengthMismatch {
                index,
                expected,
                found,
            });
        }
    }

    Ok(expected)
}
