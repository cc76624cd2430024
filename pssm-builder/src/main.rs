use clap::Parser;
use log::warn;
use pep_binding_rs::error::EncoderError;
use pep_binding_rs::matrices::{Alphabet, Background, SubstitutionMatrix};
use pep_binding_rs::peptides::read_peptides;
use pep_binding_rs::pssm::PssmBuilder;
use polars::prelude::*;
use rayon::prelude::*;
use std::fs;
use std::path::Path;

#[derive(thiserror::Error, Debug)]
pub enum BuilderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("Profile error: {0}")]
    Encoder(#[from] EncoderError),
}

#[derive(Parser)]
#[command(
    name = "pssm-builder",
    about = "Builds position-specific scoring matrices from aligned peptide sets",
    long_about = "A tool for deriving log-odds scoring matrices from equal-length peptide sets. \
                  It weights the sequences by positional diversity, blends the observed residue \
                  frequencies with substitution-matrix pseudocounts, and writes the resulting \
                  profile in PSI-BLAST tabular format. Candidate peptides can optionally be \
                  scored against the freshly built profile.",
    version,
    after_help = "Example usage:\n    \
                  pssm-builder binders.txt alphabet bg.freq.fmt blosum62.freq_rownorm pssm.tab\n    \
                  pssm-builder binders.txt alphabet bg.freq.fmt blosum62.freq_rownorm pssm.tab --score candidates.txt",
    color = clap::ColorChoice::Always
)]
#[derive(Debug)]
struct Args {
    /// Path to the peptide set file, one peptide per line
    /// (a trailing target value per line is accepted and ignored)
    #[arg(value_name = "PEPTIDE_FILE")]
    peptide_file: String,

    /// Path to the alphabet file of whitespace-separated residue symbols
    #[arg(value_name = "ALPHABET_FILE")]
    alphabet_file: String,

    /// Path to the background-frequency file, one float per alphabet symbol
    #[arg(value_name = "BACKGROUND_FILE")]
    background_file: String,

    /// Path to the row-normalized substitution-frequency matrix file
    #[arg(value_name = "SUBSTITUTION_FILE")]
    substitution_file: String,

    /// Path for the output matrix in PSI-BLAST tabular format
    /// Will create output directory if it doesn't exist
    #[arg(value_name = "OUTPUT_FILE")]
    output_file: String,

    /// Pseudocount blending weight
    #[arg(long, default_value = "50.0")]
    beta: f64,

    /// Give every peptide weight 1 instead of weighting by positional diversity
    #[arg(long)]
    no_weighting: bool,

    /// Optional peptide file to score against the built profile
    #[arg(long, value_name = "SCORE_FILE")]
    score: Option<String>,
}

fn score_candidates(pssm: &pep_binding_rs::pssm::Pssm, filename: &str) -> Result<DataFrame, BuilderError> {
    let candidates = read_peptides(filename)?;
    println!("{} candidate peptides to score", candidates.len());

    let scores: Vec<Result<f64, EncoderError>> =
        candidates.par_iter().map(|peptide| pssm.score(peptide)).collect();

    // aggregate-and-continue: failed candidates are reported and dropped
    let mut peptides: Vec<String> = Vec::new();
    let mut kept: Vec<f64> = Vec::new();
    for (peptide, score) in candidates.into_iter().zip(scores) {
        match score {
            Ok(score) => {
                peptides.push(peptide);
                kept.push(score);
            }
            Err(e) => warn!("skipping candidate '{}': {}", peptide, e),
        }
    }

    let df = DataFrame::new(vec![
        Column::new("peptide".into(), peptides),
        Column::new("score".into(), kept),
    ])?;

    Ok(df)
}

fn main() -> Result<(), BuilderError> {
    env_logger::init();
    let start_time = std::time::Instant::now();

    let args = Args::parse();

    // Create output directory if it doesn't exist
    if let Some(parent) = Path::new(&args.output_file).parent() {
        fs::create_dir_all(parent)?;
    }

    let alphabet = Alphabet::from_file(&args.alphabet_file)?;
    let background = Background::from_file(&args.background_file, &alphabet)?;
    let substitution = SubstitutionMatrix::from_file(&args.substitution_file, &alphabet)?;

    let peptides = read_peptides(&args.peptide_file)?;
    println!("{} peptides loaded", peptides.len());

    let pssm = PssmBuilder::new(&alphabet, &background, &substitution)
        .with_beta(args.beta)
        .with_sequence_weighting(!args.no_weighting)
        .build(&peptides)?;

    pssm.write_psi_blast(&args.output_file)?;
    println!(
        "{}-position profile written to {}",
        pssm.len(),
        args.output_file
    );

    if let Some(score_file) = &args.score {
        let results_df = score_candidates(&pssm, score_file)?;
        println!("{:?}", results_df);
    }

    let elapsed = start_time.elapsed();
    println!(
        "Total execution time: {:.4} seconds",
        elapsed.as_secs_f64()
    );

    Ok(())
}
