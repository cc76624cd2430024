use crate::error::{EncoderError, Result};
use ndarray::{s, Array1, Array2, Axis};

/// A sequence-embedding collaborator.
///
/// Implementations return one fixed-width vector per residue; the model
/// behind the trait is opaque to the pipeline, which applies the same
/// post-processing (padding, optional mean-pooling) regardless of source.
pub trait SequenceEmbedder {
    /// Width of each per-residue vector
    fn embedding_dim(&self) -> usize;

    /// Per-residue vectors for a sequence, shape `(sequence_length, embedding_dim)`
    fn embed(&self, sequence: &str) -> Result<Array2<f64>>;
}

/// Zero-pads a matrix with extra rows up to `length`.
///
/// # Errors
/// * Returns `EncoderError::InvalidInput` if the matrix already has more rows
pub fn pad_rows(matrix: &Array2<f64>, length: usize) -> Result<Array2<f64>> {
    let (rows, cols) = matrix.dim();
    if rows > length {
        return Err(EncoderError::InvalidInput(format!(
            "Cannot pad {} rows down to {}",
            rows, length
        )));
    }

    let mut padded = Array2::zeros((length, cols));
    padded.slice_mut(s![..rows, ..]).assign(matrix);
    Ok(padded)
}

/// Column-wise mean over the residue axis.
///
/// # Errors
/// * Returns `EncoderError::InvalidInput` for an empty matrix
pub fn mean_pool(matrix: &Array2<f64>) -> Result<Array1<f64>> {
    matrix
        .mean_axis(Axis(0))
        .ok_or_else(|| EncoderError::InvalidInput("Cannot pool an empty embedding".into()))
}

/// Checks the collaborator honored its shape contract before post-processing
fn checked_embed<E: SequenceEmbedder + ?Sized>(embedder: &E, peptide: &str) -> Result<Array2<f64>> {
    let embedded = embedder.embed(peptide)?;
    let (rows, cols) = embedded.dim();

    let residues = peptide.chars().count();
    if rows != residues || cols != embedder.embedding_dim() {
        return Err(EncoderError::DataError(format!(
            "Embedder returned shape ({}, {}) for a {}-residue peptide, expected ({}, {})",
            rows,
            cols,
            residues,
            residues,
            embedder.embedding_dim()
        )));
    }

    Ok(embedded)
}

/// Embeds a peptide and zero-pads the result to `max_len` rows
pub fn embed_padded<E: SequenceEmbedder + ?Sized>(
    embedder: &E,
    peptide: &str,
    max_len: usize,
) -> Result<Array2<f64>> {
    let embedded = checked_embed(embedder, peptide)?;
    pad_rows(&embedded, max_len)
}

/// Embeds a peptide and mean-pools the residue vectors into one
pub fn embed_pooled<E: SequenceEmbedder + ?Sized>(
    embedder: &E,
    peptide: &str,
) -> Result<Array1<f64>> {
    let embedded = checked_embed(embedder, peptide)?;
    mean_pool(&embedded)
}

/// Embeds a whole peptide set as one batched call, one typed result per
/// peptide and no partial-result visibility inside an item
pub fn embed_all<E: SequenceEmbedder + ?Sized>(
    embedder: &E,
    peptides: &[String],
    max_len: usize,
) -> Vec<Result<Array2<f64>>> {
    peptides
        .iter()
        .map(|peptide| embed_padded(embedder, peptide, max_len))
        .collect()
}
