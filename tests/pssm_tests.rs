use pep_binding_rs::error::EncoderError;
use pep_binding_rs::matrices::{Alphabet, Background, SubstitutionMatrix, PSI_BLAST_ORDER};
use pep_binding_rs::pssm::PssmBuilder;

const TOLERANCE: f64 = 1e-6;

/// Substitution table favoring identity: 0.9 on the diagonal, the rest split
/// evenly, rows normalized
fn diagonal_substitution(alphabet: &Alphabet) -> SubstitutionMatrix {
    let n = alphabet.len();
    let off = 0.1 / (n - 1) as f64;
    let rows: Vec<Vec<f64>> = (0..n)
        .map(|i| (0..n).map(|j| if i == j { 0.9 } else { off }).collect())
        .collect();
    SubstitutionMatrix::from_rows(alphabet, rows).unwrap()
}

fn peptides(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|p| p.to_string()).collect()
}

#[test]
fn test_identical_peptides_favor_observed_symbol() {
    let alphabet = Alphabet::canonical();
    let background = Background::uniform(&alphabet);
    let substitution = diagonal_substitution(&alphabet);
    let builder = PssmBuilder::new(&alphabet, &background, &substitution);

    let stages = builder
        .build_stages(&peptides(&["LLDYQ", "LLDYQ", "LLDYQ"]))
        .unwrap();

    let observed = "LLDYQ";
    for (position, symbol) in observed.chars().enumerate() {
        // all count mass on the observed symbol
        assert_eq!(stages.counts[position][&symbol], 3.0);
        let count_sum: f64 = stages.counts[position].values().sum();
        assert_eq!(count_sum, 3.0);

        // the log-odds row favors the observed symbol
        let best = stages.pssm.get(position, symbol).unwrap();
        for other in alphabet.iter() {
            assert!(best >= stages.pssm.get(position, other).unwrap());
        }
    }
}

#[test]
fn test_frequency_rows_sum_to_one() {
    let alphabet = Alphabet::canonical();
    let background = Background::uniform(&alphabet);
    let substitution = diagonal_substitution(&alphabet);
    let builder = PssmBuilder::new(&alphabet, &background, &substitution);

    let stages = builder
        .build_stages(&peptides(&["ALDYQ", "ARNYF", "GLDWQ", "ALNYQ"]))
        .unwrap();

    for position in 0..5 {
        let observed_sum: f64 = stages.observed[position].values().sum();
        assert!((observed_sum - 1.0).abs() < TOLERANCE);

        let pseudo_sum: f64 = stages.pseudo[position].values().sum();
        assert!((pseudo_sum - 1.0).abs() < TOLERANCE);

        let combined_sum: f64 = stages.combined[position].values().sum();
        assert!((combined_sum - 1.0).abs() < TOLERANCE);
    }
}

#[test]
fn test_counts_weights_and_neff() {
    let alphabet = Alphabet::canonical();
    let background = Background::uniform(&alphabet);
    let substitution = diagonal_substitution(&alphabet);
    let builder = PssmBuilder::new(&alphabet, &background, &substitution);

    let stages = builder.build_stages(&peptides(&["AA", "AR", "AA"])).unwrap();

    assert_eq!(stages.counts[0][&'A'], 3.0);
    assert_eq!(stages.counts[1][&'A'], 2.0);
    assert_eq!(stages.counts[1][&'R'], 1.0);

    // position 0 sees 1 distinct symbol, position 1 sees 2: neff = (1+2)/2
    assert!((stages.neff - 1.5).abs() < TOLERANCE);

    // w("AA") = 1/(1*3) + 1/(2*2), w("AR") = 1/(1*3) + 1/(2*1)
    assert!((stages.weights[0] - (1.0 / 3.0 + 0.25)).abs() < TOLERANCE);
    assert!((stages.weights[1] - (1.0 / 3.0 + 0.5)).abs() < TOLERANCE);
    assert!((stages.weights[2] - stages.weights[0]).abs() < TOLERANCE);

    // the build is deterministic
    let again = builder.build_stages(&peptides(&["AA", "AR", "AA"])).unwrap();
    assert!((again.neff - stages.neff).abs() < TOLERANCE);
    for position in 0..2 {
        for symbol in alphabet.iter() {
            assert_eq!(
                stages.pssm.get(position, symbol).unwrap(),
                again.pssm.get(position, symbol).unwrap()
            );
        }
    }
}

#[test]
fn test_disabled_weighting_uses_set_size_as_neff() {
    let alphabet = Alphabet::canonical();
    let background = Background::uniform(&alphabet);
    let substitution = diagonal_substitution(&alphabet);
    let builder = PssmBuilder::new(&alphabet, &background, &substitution)
        .with_sequence_weighting(false);

    let stages = builder.build_stages(&peptides(&["AA", "AR", "AA"])).unwrap();

    assert_eq!(stages.weights, vec![1.0, 1.0, 1.0]);
    assert!((stages.neff - 3.0).abs() < TOLERANCE);
}

#[test]
fn test_length_mismatch_fails_without_output() {
    let alphabet = Alphabet::canonical();
    let background = Background::uniform(&alphabet);
    let substitution = diagonal_substitution(&alphabet);
    let builder = PssmBuilder::new(&alphabet, &background, &substitution);

    let path = "tests/data/mismatch_out.tab";
    let result = builder.build_to_file(&peptides(&["AAA", "AA"]), path);

    match result {
        Err(EncoderError::LengthMismatch {
            index,
            expected,
            found,
        }) => {
            assert_eq!(index, 1);
            assert_eq!(expected, 3);
            assert_eq!(found, 2);
        }
        other => panic!("expected LengthMismatch, got {:?}", other.map(|_| ())),
    }
    assert!(!std::path::Path::new(path).exists());
}

#[test]
fn test_empty_set_is_rejected() {
    let alphabet = Alphabet::canonical();
    let background = Background::uniform(&alphabet);
    let substitution = diagonal_substitution(&alphabet);
    let builder = PssmBuilder::new(&alphabet, &background, &substitution);

    assert!(matches!(
        builder.build(&[]),
        Err(EncoderError::EmptyPeptideSet)
    ));
}

#[test]
fn test_unknown_residue_is_rejected() {
    let alphabet = Alphabet::canonical();
    let background = Background::uniform(&alphabet);
    let substitution = diagonal_substitution(&alphabet);
    let builder = PssmBuilder::new(&alphabet, &background, &substitution);

    let result = builder.build(&peptides(&["AA", "AB"]));
    assert!(matches!(
        result,
        Err(EncoderError::InvalidSequence { position: 1, .. })
    ));
}

#[test]
fn test_psi_blast_round_trip() {
    let alphabet = Alphabet::canonical();
    let background = Background::uniform(&alphabet);
    let substitution = diagonal_substitution(&alphabet);
    let builder = PssmBuilder::new(&alphabet, &background, &substitution);

    let pssm = builder
        .build(&peptides(&["ALDYQ", "ARNYF", "GLDWQ", "ALNYQ"]))
        .unwrap();

    let path = "tests/data/round_trip.tab";
    pssm.write_psi_blast(path).unwrap();

    let contents = std::fs::read_to_string(path).unwrap();
    let mut lines = contents.lines();

    let header: Vec<&str> = lines.next().unwrap().split('\t').collect();
    let expected_header: Vec<String> =
        PSI_BLAST_ORDER.iter().map(|c| c.to_string()).collect();
    assert_eq!(header, expected_header);

    let mut positions = 0;
    for (position, line) in lines.enumerate() {
        let values: Vec<f64> = line
            .split('\t')
            .map(|v| v.parse::<f64>().unwrap())
            .collect();
        assert_eq!(values.len(), 20);

        for (&symbol, &value) in PSI_BLAST_ORDER.iter().zip(values.iter()) {
            let original = pssm.get(position, symbol).unwrap();
            // 4-decimal rounding error bound
            assert!((original - value).abs() <= 1e-4);
        }
        positions += 1;
    }
    assert_eq!(positions, pssm.len());

    // clean up
    std::fs::remove_file(path).unwrap();
}

#[test]
fn test_scoring_prefers_training_consensus() {
    let alphabet = Alphabet::canonical();
    let background = Background::uniform(&alphabet);
    let substitution = diagonal_substitution(&alphabet);
    let builder = PssmBuilder::new(&alphabet, &background, &substitution);

    let pssm = builder
        .build(&peptides(&["ALDYQ", "ALDYF", "ALDWQ"]))
        .unwrap();

    let consensus = pssm.score("ALDYQ").unwrap();
    let unrelated = pssm.score("KKKKK").unwrap();
    assert!(consensus > unrelated);

    // a candidate of the wrong length is rejected
    assert!(pssm.score("ALD").is_err());
}

#[test]
fn test_profile_frame_shape() {
    let alphabet = Alphabet::canonical();
    let background = Background::uniform(&alphabet);
    let substitution = diagonal_substitution(&alphabet);
    let builder = PssmBuilder::new(&alphabet, &background, &substitution);

    let pssm = builder.build(&peptides(&["AA", "AR", "AA"])).unwrap();
    let df = pssm.to_frame().unwrap();

    assert_eq!(df.height(), 2);
    assert_eq!(df.width(), 20);
}
