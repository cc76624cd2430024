use crate::error::{EncoderError, Result};
use crate::matrices::{Alphabet, Background, SubstitutionMatrix, PSI_BLAST_ORDER};
use crate::peptides::validate_equal_length;
use crate::types::{ProfileFrame, ProfileMatrix};
use log::debug;
use polars::prelude::*;
use std::fs;

/// Pseudocount blending weight in the combined-frequency stage
const BETA: f64 = 50.0;

/// Allocates a position-indexed profile with every (position, symbol) entry at 0.0
fn initialize_matrix(length: usize, alphabet: &Alphabet) -> ProfileMatrix {
    (0..length)
        .map(|_| alphabet.iter().map(|symbol| (symbol, 0.0)).collect())
        .collect()
}

/// Builds position-specific scoring matrices from equal-length peptide sets.
///
/// The reference tables are borrowed immutable configuration: an ordered
/// alphabet, background frequencies and a row-normalized substitution
/// matrix. Each build walks a fixed stage order (counts, sequence weights,
/// observed frequencies, pseudo frequencies, combined frequencies, log-odds)
/// and every stage is derived from the previous one.
pub struct PssmBuilder<'a> {
    alphabet: &'a Alphabet,
    background: &'a Background,
    substitution: &'a SubstitutionMatrix,
    beta: f64,
    sequence_weighting: bool,
}

impl<'a> PssmBuilder<'a> {
    pub fn new(
        alphabet: &'a Alphabet,
        background: &'a Background,
        substitution: &'a SubstitutionMatrix,
    ) -> Self {
        PssmBuilder {
            alphabet,
            background,
            substitution,
            beta: BETA,
            sequence_weighting: true,
        }
    }

    /// Overrides the pseudocount blending weight (default 50.0)
    pub fn with_beta(mut self, beta: f64) -> Self {
        self.beta = beta;
        self
    }

    /// Disables clustering-free sequence weighting; every peptide then
    /// contributes weight 1 and neff equals the set size
    pub fn with_sequence_weighting(mut self, enabled: bool) -> Self {
        self.sequence_weighting = enabled;
        self
    }

    /// Builds the log-odds scoring matrix for a peptide set.
    ///
    /// # Errors
    /// * `EncoderError::EmptyPeptideSet` for an empty set
    /// * `EncoderError::LengthMismatch` if a peptide's length differs from
    ///   the first peptide's, naming the offending index
    /// * `EncoderError::InvalidSequence` if a peptide holds a residue outside
    ///   the alphabet
    /// * `EncoderError::ZeroPositionWeight` if the total weight mass at a
    ///   position is zero during frequency normalization
    pub fn build(&self, peptides: &[String]) -> Result<Pssm> {
        Ok(self.build_stages(peptides)?.pssm)
    }

    /// Builds the profile and writes it in PSI-BLAST format.
    ///
    /// The write is the single side effect and happens only after every
    /// stage has completed, so a failing build leaves no partial file.
    pub fn build_to_file(&self, peptides: &[String], filename: &str) -> Result<Pssm> {
        let pssm = self.build(peptides)?;
        pssm.write_psi_blast(filename)?;
        Ok(pssm)
    }

    /// Builds the profile keeping every intermediate stage.
    ///
    /// See [`PssmBuilder::build`] for the errors.
    pub fn build_stages(&self, peptides: &[String]) -> Result<BuildStages> {
        let length = validate_equal_length(peptides)?;
        let residues = self.validate_residues(peptides)?;

        let counts = self.count_matrix(&residues, length);
        let (weights, neff) = self.sequence_weights(&residues, &counts, length);
        debug!("sequence weighting done, neff = {:.4}", neff);

        let observed = self.observed_frequencies(&residues, &weights, length)?;
        let pseudo = self.pseudo_frequencies(&observed, length)?;
        let combined = self.combined_frequencies(&observed, &pseudo, neff, length)?;
        let scores = self.log_odds(&combined, length)?;

        Ok(BuildStages {
            counts,
            weights,
            neff,
            observed,
            pseudo,
            combined,
            pssm: Pssm {
                symbols: self.alphabet.symbols().to_vec(),
                scores,
            },
        })
    }

    /// Checks every residue against the alphabet and splits peptides into
    /// per-position symbols
    fn validate_residues(&self, peptides: &[String]) -> Result<Vec<Vec<char>>> {
        peptides
            .iter()
            .enumerate()
            .map(|(index, peptide)| {
                let symbols: Vec<char> = peptide.chars().collect();
                for &symbol in &symbols {
                    if !self.alphabet.contains(symbol) {
                        return Err(EncoderError::invalid_sequence(
                            index,
                            format!("residue '{}' is not in the alphabet", symbol),
                        ));
                    }
                }
                Ok(symbols)
            })
            .collect()
    }

    /// Count matrix: occurrences of each symbol at each position
    fn count_matrix(&self, residues: &[Vec<char>], length: usize) -> ProfileMatrix {
        let mut counts = initialize_matrix(length, self.alphabet);
        for position in 0..length {
            for peptide in residues {
                *counts[position].get_mut(&peptide[position]).unwrap() += 1.0;
            }
        }
        counts
    }

    /// Per-peptide sequence weights and the retained neff scalar.
    ///
    /// The weight of a peptide is sum over positions of 1/(r*s), with r the
    /// number of distinct symbols observed at the position and s the count of
    /// the peptide's own symbol. neff is recomputed for every peptide and
    /// only the last computed value is carried into the blending stage,
    /// matching the reference implementation.
    fn sequence_weights(
        &self,
        residues: &[Vec<char>],
        counts: &ProfileMatrix,
        length: usize,
    ) -> (Vec<f64>, f64) {
        let mut weights = vec![0.0; residues.len()];
        let mut neff = 0.0;

        for (i, peptide) in residues.iter().enumerate() {
            if self.sequence_weighting {
                let mut w = 0.0;
                neff = 0.0;
                for position in 0..length {
                    let r = counts[position]
                        .values()
                        .filter(|&&count| count != 0.0)
                        .count() as f64;
                    let s = counts[position][&peptide[position]];
                    w += 1.0 / (r * s);
                    neff += r;
                }
                neff /= length as f64;
                weights[i] = w;
            } else {
                weights[i] = 1.0;
                neff = residues.len() as f64;
            }
        }

        (weights, neff)
    }

    /// Observed frequencies: weighted symbol mass normalized per position
    fn observed_frequencies(
        &self,
        residues: &[Vec<char>],
        weights: &[f64],
        length: usize,
    ) -> Result<ProfileMatrix> {
        let mut observed = initialize_matrix(length, self.alphabet);

        for position in 0..length {
            let mut n = 0.0;
            for (i, peptide) in residues.iter().enumerate() {
                *observed[position].get_mut(&peptide[position]).unwrap() += weights[i];
                n += weights[i];
            }

            // 0.0/0.0 is a silent NaN in float arithmetic, so the zero check
            // has to happen before the division
            if n == 0.0 {
                return Err(EncoderError::ZeroPositionWeight { position });
            }

            for value in observed[position].values_mut() {
                *value /= n;
            }
        }

        Ok(observed)
    }

    /// Pseudo frequencies: observed mass redistributed through the
    /// substitution matrix
    fn pseudo_frequencies(&self, observed: &ProfileMatrix, length: usize) -> Result<ProfileMatrix> {
        let mut pseudo = initialize_matrix(length, self.alphabet);

        for position in 0..length {
            for target in self.alphabet.iter() {
                let mut mass = 0.0;
                for source in self.alphabet.iter() {
                    let prob = self.substitution.prob(target, source).ok_or_else(|| {
                        EncoderError::DataError(format!(
                            "Substitution matrix lacks pair ({}, {})",
                            target, source
                        ))
                    })?;
                    mass += observed[position][&source] * prob;
                }
                *pseudo[position].get_mut(&target).unwrap() = mass;
            }
        }

        Ok(pseudo)
    }

    /// Combined frequencies: (alpha*f + beta*g) / (alpha + beta) with
    /// alpha = neff - 1, the single retained scalar, at every position
    fn combined_frequencies(
        &self,
        observed: &ProfileMatrix,
        pseudo: &ProfileMatrix,
        neff: f64,
        length: usize,
    ) -> Result<ProfileMatrix> {
        let alpha = neff - 1.0;
        let denominator = alpha + self.beta;
        if denominator == 0.0 {
            return Err(EncoderError::invalid_parameter(
                "beta",
                self.beta,
                "alpha + beta is zero in the combined-frequency stage",
            ));
        }

        let mut combined = initialize_matrix(length, self.alphabet);
        for position in 0..length {
            for symbol in self.alphabet.iter() {
                let blended = (alpha * observed[position][&symbol]
                    + self.beta * pseudo[position][&symbol])
                    / denominator;
                *combined[position].get_mut(&symbol).unwrap() = blended;
            }
        }

        Ok(combined)
    }

    /// Log-odds scores: 2*log2(p/background), zero where p is zero
    fn log_odds(&self, combined: &ProfileMatrix, length: usize) -> Result<ProfileMatrix> {
        let mut scores = initialize_matrix(length, self.alphabet);

        for position in 0..length {
            for symbol in self.alphabet.iter() {
                let p = combined[position][&symbol];
                let score = if p > 0.0 {
                    let bg = self.background.freq(symbol).ok_or_else(|| {
                        EncoderError::DataError(format!(
                            "No background frequency for '{}'",
                            symbol
                        ))
                    })?;
                    if bg <= 0.0 {
                        return Err(EncoderError::DataError(format!(
                            "Background frequency for '{}' is not positive",
                            symbol
                        )));
                    }
                    2.0 * (p / bg).log2()
                } else {
                    0.0
                };
                *scores[position].get_mut(&symbol).unwrap() = score;
            }
        }

        Ok(scores)
    }
}

/// Every stage of a profile build, each matrix immutable once computed and
/// derived strictly from the previous one
#[derive(Debug, Clone)]
pub struct BuildStages {
    pub counts: ProfileMatrix,
    pub weights: Vec<f64>,
    pub neff: f64,
    pub observed: ProfileMatrix,
    pub pseudo: ProfileMatrix,
    pub combined: ProfileMatrix,
    pub pssm: Pssm,
}

/// A computed position-specific scoring matrix
#[derive(Debug, Clone)]
pub struct Pssm {
    symbols: Vec<char>,
    scores: ProfileMatrix,
}

impl Pssm {
    /// Number of sequence positions
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Residue symbols in the builder's alphabet order
    pub fn symbols(&self) -> &[char] {
        &self.symbols
    }

    /// Score of a symbol at a position
    pub fn get(&self, position: usize, symbol: char) -> Option<f64> {
        self.scores.get(position)?.get(&symbol).copied()
    }

    /// The full position-indexed score matrix
    pub fn matrix(&self) -> &ProfileMatrix {
        &self.scores
    }

    /// Scores a candidate peptide against the profile, summing the per-position
    /// log-odds of its residues.
    ///
    /// # Errors
    /// * Returns `EncoderError::InvalidInput` if the peptide length differs
    ///   from the profile length
    /// * Returns `EncoderError::InvalidSequence` for residues the profile
    ///   does not cover
    pub fn score(&self, peptide: &str) -> Result<f64> {
        let residues: Vec<char> = peptide.chars().collect();
        if residues.len() != self.len() {
            return Err(EncoderError::InvalidInput(format!(
                "Peptide length {} does not match profile length {}",
                residues.len(),
                self.len()
            )));
        }

        let mut total = 0.0;
        for (position, symbol) in residues.into_iter().enumerate() {
            let score = self.get(position, symbol).ok_or_else(|| {
                EncoderError::invalid_sequence(
                    position,
                    format!("residue '{}' is not covered by the profile", symbol),
                )
            })?;
            total += score;
        }

        Ok(total)
    }

    /// Tabular view of the profile: one f64 column per residue symbol in the
    /// profile's own alphabet order, one row per position.
    ///
    /// # Errors
    /// * Returns `EncoderError::DataError` if DataFrame creation fails
    pub fn to_frame(&self) -> Result<ProfileFrame> {
        let columns: Vec<Column> = self
            .symbols
            .iter()
            .map(|&symbol| {
                let values: Vec<f64> = self
                    .scores
                    .iter()
                    .map(|row| row.get(&symbol).copied().unwrap_or(0.0))
                    .collect();
                Column::new(symbol.to_string().into(), values)
            })
            .collect();

        DataFrame::new(columns).map_err(|e| EncoderError::DataError(e.to_string()))
    }

    /// Writes the profile in PSI-BLAST tabular format.
    ///
    /// The header row holds the 20 canonical residues in fixed order and each
    /// position row holds the scores remapped by symbol into that order,
    /// formatted to 4 decimals. The whole body is composed first and written
    /// with a single filesystem call, so a failing profile leaves no partial
    /// file behind.
    ///
    /// # Errors
    /// * Returns `EncoderError::DataError` if the profile lacks one of the
    ///   canonical residues
    /// * Returns `EncoderError::Io` for file writing issues
    pub fn write_psi_blast(&self, filename: &str) -> Result<()> {
        let header: Vec<String> = PSI_BLAST_ORDER.iter().map(|c| c.to_string()).collect();

        let mut body = String::new();
        body.push_str(&header.join("\t"));
        body.push('\n');

        for (position, row) in self.scores.iter().enumerate() {
            let scores: Vec<String> = PSI_BLAST_ORDER
                .iter()
                .map(|symbol| {
                    row.get(symbol).map(|v| format!("{:.4}", v)).ok_or_else(|| {
                        EncoderError::DataError(format!(
                            "Profile position {} has no score for '{}'",
                            position, symbol
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            body.push_str(&scores.join("\t"));
            body.push('\n');
        }

        fs::write(filename, body)?;
        Ok(())
    }
}
