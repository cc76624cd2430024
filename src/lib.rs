//! Peptide feature encoding, PSSM construction and binding-model training in Rust

pub mod embedding;
pub mod encoding;
pub mod error;
pub mod matrices;
pub mod peptides;
pub mod pssm;
pub mod training;
pub mod types;
