use crate::error::{EncoderError, Result};
use log::warn;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};

/// Residue column order of the PSI-BLAST matrix format
pub const PSI_BLAST_ORDER: [char; 20] = [
    'A', 'R', 'N', 'D', 'C', 'Q', 'E', 'G', 'H', 'I', 'L', 'K', 'M', 'F', 'P', 'S', 'T', 'W', 'Y',
    'V',
];

/// Index of each canonical residue in `PSI_BLAST_ORDER`
pub static RESIDUE_INDEX: phf::Map<char, usize> = phf::phf_map! {
    'A' => 0,
    'R' => 1,
    'N' => 2,
    'D' => 3,
    'C' => 4,
    'Q' => 5,
    'E' => 6,
    'G' => 7,
    'H' => 8,
    'I' => 9,
    'L' => 10,
    'K' => 11,
    'M' => 12,
    'F' => 13,
    'P' => 14,
    'S' => 15,
    'T' => 16,
    'W' => 17,
    'Y' => 18,
    'V' => 19,
};

/// Reads non-empty, non-comment lines from a flat reference-data file
fn data_lines(filename: &str) -> Result<Vec<String>> {
    let file = File::open(filename)?;
    let reader = BufReader::new(file);

    let mut lines = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        lines.push(line.to_string());
    }

    Ok(lines)
}

/// Ordered set of residue symbols
///
/// Defines the column order of every internal profile matrix. The output
/// file order is fixed separately by `PSI_BLAST_ORDER`.
#[derive(Debug, Clone)]
pub struct Alphabet {
    symbols: Vec<char>,
    index: HashMap<char, usize>,
}

impl Alphabet {
    /// Builds an alphabet from an ordered list of symbols
    ///
    /// # Errors
    /// * Returns `EncoderError::InvalidInput` if the list is empty or contains duplicates
    pub fn new(symbols: Vec<char>) -> Result<Self> {
        if symbols.is_empty() {
            return Err(EncoderError::InvalidInput("Empty alphabet".into()));
        }

        let mut index = HashMap::new();
        for (i, &symbol) in symbols.iter().enumerate() {
            if index.insert(symbol, i).is_some() {
                return Err(EncoderError::InvalidInput(format!(
                    "Duplicate symbol '{}' in alphabet",
                    symbol
                )));
            }
        }

        Ok(Alphabet { symbols, index })
    }

    /// The 20 canonical amino acids in PSI-BLAST order
    pub fn canonical() -> Self {
        // canonical symbols are distinct, construction cannot fail
        Alphabet::new(PSI_BLAST_ORDER.to_vec()).unwrap()
    }

    /// Reads an alphabet from a flat file of whitespace-separated single-character symbols
    ///
    /// # Errors
    /// * Returns `EncoderError::Io` if the file cannot be opened or read
    /// * Returns `EncoderError::InvalidFileFormat` if a token is not a single character
    pub fn from_file(filename: &str) -> Result<Self> {
        let mut symbols = Vec::new();
        for line in data_lines(filename)? {
            for token in line.split_whitespace() {
                let mut chars = token.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => symbols.push(c),
                    _ => {
                        return Err(EncoderError::invalid_file_format(format!(
                            "Alphabet token '{}' is not a single symbol",
                            token
                        )))
                    }
                }
            }
        }
        Alphabet::new(symbols)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn symbols(&self) -> &[char] {
        &self.symbols
    }

    pub fn contains(&self, symbol: char) -> bool {
        self.index.contains_key(&symbol)
    }

    pub fn index_of(&self, symbol: char) -> Option<usize> {
        self.index.get(&symbol).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = char> + '_ {
        self.symbols.iter().copied()
    }
}

/// Baseline expected frequency of each residue absent positional signal
#[derive(Debug, Clone)]
pub struct Background {
    freqs: HashMap<char, f64>,
}

impl Background {
    /// Reads background frequencies from a flat file, one float per alphabet
    /// symbol in alphabet order
    ///
    /// Logs a warning if the frequencies do not sum to 1 within 1e-3.
    ///
    /// # Errors
    /// * Returns `EncoderError::Io` if the file cannot be opened or read
    /// * Returns `EncoderError::InvalidFileFormat` if a value does not parse
    ///   or the value count differs from the alphabet size
    pub fn from_file(filename: &str, alphabet: &Alphabet) -> Result<Self> {
        let mut values = Vec::new();
        for line in data_lines(filename)? {
            for token in line.split_whitespace() {
                let value: f64 = token.parse().map_err(|e| {
                    EncoderError::invalid_file_format(format!(
                        "Invalid background frequency '{}': {}",
                        token, e
                    ))
                })?;
                values.push(value);
            }
        }

        if values.len() != alphabet.len() {
            return Err(EncoderError::invalid_file_format(format!(
                "Expected {} background frequencies, found {}",
                alphabet.len(),
                values.len()
            )));
        }

        let total: f64 = values.iter().sum();
        if (total - 1.0).abs() > 1e-3 {
            warn!("background frequencies sum to {:.4}, expected 1.0", total);
        }

        let freqs = alphabet.iter().zip(values).collect();
        Ok(Background { freqs })
    }

    /// Uniform background over the alphabet
    pub fn uniform(alphabet: &Alphabet) -> Self {
        let p = 1.0 / alphabet.len() as f64;
        let freqs = alphabet.iter().map(|c| (c, p)).collect();
        Background { freqs }
    }

    pub fn freq(&self, symbol: char) -> Option<f64> {
        self.freqs.get(&symbol).copied()
    }
}

/// Residue-pair similarity probabilities used as the pseudocount source
///
/// Rows are keyed by the observed residue and are normalized over target
/// residues, so `prob(target, observed)` reads the observed residue's row.
#[derive(Debug, Clone)]
pub struct SubstitutionMatrix {
    rows: HashMap<char, HashMap<char, f64>>,
}

impl SubstitutionMatrix {
    /// Builds a substitution matrix from per-observed-symbol rows in alphabet order
    ///
    /// # Errors
    /// * Returns `EncoderError::InvalidFileFormat` if the row or column count
    ///   differs from the alphabet size
    pub fn from_rows(alphabet: &Alphabet, raw: Vec<Vec<f64>>) -> Result<Self> {
        if raw.len() != alphabet.len() {
            return Err(EncoderError::invalid_file_format(format!(
                "Expected {} substitution rows, found {}",
                alphabet.len(),
                raw.len()
            )));
        }

        let mut rows = HashMap::new();
        for (observed, row) in alphabet.iter().zip(raw) {
            if row.len() != alphabet.len() {
                return Err(EncoderError::invalid_file_format(format!(
                    "Substitution row for '{}' has {} values, expected {}",
                    observed,
                    row.len(),
                    alphabet.len()
                )));
            }

            let total: f64 = row.iter().sum();
            if (total - 1.0).abs() > 1e-3 {
                warn!(
                    "substitution row for '{}' sums to {:.4}, expected 1.0",
                    observed, total
                );
            }

            rows.insert(observed, alphabet.iter().zip(row).collect());
        }

        Ok(SubstitutionMatrix { rows })
    }

    /// Reads a row-normalized substitution frequency matrix from a flat file,
    /// one row of floats per alphabet symbol in alphabet order
    ///
    /// # Errors
    /// * Returns `EncoderError::Io` if the file cannot be opened or read
    /// * Returns `EncoderError::InvalidFileFormat` if a value does not parse
    ///   or the matrix is not square over the alphabet
    pub fn from_file(filename: &str, alphabet: &Alphabet) -> Result<Self> {
        let mut raw = Vec::new();
        for line in data_lines(filename)? {
            let row: Vec<f64> = line
                .split_whitespace()
                .map(|token| {
                    token.parse::<f64>().map_err(|e| {
                        EncoderError::invalid_file_format(format!(
                            "Invalid substitution value '{}': {}",
                            token, e
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            raw.push(row);
        }
        SubstitutionMatrix::from_rows(alphabet, raw)
    }

    /// Uniform similarity over the alphabet, every pair at 1/|A|
    pub fn uniform(alphabet: &Alphabet) -> Self {
        let p = 1.0 / alphabet.len() as f64;
        let rows = alphabet
            .iter()
            .map(|observed| (observed, alphabet.iter().map(|target| (target, p)).collect()))
            .collect();
        SubstitutionMatrix { rows }
    }

    /// Similarity mass redistributed from `observed` onto `target`
    pub fn prob(&self, target: char, observed: char) -> Option<f64> {
        self.rows.get(&observed)?.get(&target).copied()
    }
}
