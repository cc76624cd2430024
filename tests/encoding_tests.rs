use pep_binding_rs::encoding::{EncodingScheme, EncodingTable, PeptideEncoder};
use pep_binding_rs::error::EncoderError;
use pep_binding_rs::matrices::PSI_BLAST_ORDER;
use std::collections::HashMap;

const TOLERANCE: f64 = 1e-9;

/// Width-2 table: each canonical residue maps to [canonical index, 1.0]
fn index_table() -> EncodingTable {
    let rows: HashMap<char, Vec<f64>> = PSI_BLAST_ORDER
        .iter()
        .enumerate()
        .map(|(i, &c)| (c, vec![i as f64, 1.0]))
        .collect();
    EncodingTable::new(rows).unwrap()
}

#[test]
fn test_scheme_names_resolve() {
    assert_eq!(
        EncodingScheme::from_name("blosum").unwrap(),
        EncodingScheme::Blosum
    );
    assert_eq!(
        EncodingScheme::from_name("allProperties").unwrap(),
        EncodingScheme::Properties
    );
    assert_eq!(
        EncodingScheme::from_name("vhse").unwrap(),
        EncodingScheme::Vhse
    );

    match EncodingScheme::from_name("sparse") {
        Err(EncoderError::UnknownScheme(name)) => assert_eq!(name, "sparse"),
        other => panic!("expected UnknownScheme, got {:?}", other),
    }
}

#[test]
fn test_encode_peptide_shape_and_padding() {
    let encoder = PeptideEncoder::new()
        .with_table(EncodingScheme::Blosum, index_table())
        .with_max_len(6);

    let encoded = encoder
        .encode_peptide("AR", &[EncodingScheme::Blosum], false)
        .unwrap();

    assert_eq!(encoded.dim(), (6, 2));
    assert_eq!(encoded[[0, 0]], 0.0); // A
    assert_eq!(encoded[[0, 1]], 1.0);
    assert_eq!(encoded[[1, 0]], 1.0); // R
    assert_eq!(encoded[[1, 1]], 1.0);

    // zero rows after the residues
    for row in 2..6 {
        assert_eq!(encoded[[row, 0]], 0.0);
        assert_eq!(encoded[[row, 1]], 0.0);
    }
}

#[test]
fn test_bias_row_precedes_padding() {
    let encoder = PeptideEncoder::new()
        .with_table(EncodingScheme::Blosum, index_table())
        .with_max_len(5);

    let encoded = encoder
        .encode_peptide("AR", &[EncodingScheme::Blosum], true)
        .unwrap();

    assert_eq!(encoded[[2, 0]], 1.0);
    assert_eq!(encoded[[2, 1]], 1.0);
    assert_eq!(encoded[[3, 0]], 0.0);
}

#[test]
fn test_schemes_concatenate_per_residue() {
    let encoder = PeptideEncoder::new()
        .with_table(EncodingScheme::Blosum, index_table())
        .with_table(EncodingScheme::Vhse, index_table())
        .with_max_len(4);

    let schemes = [EncodingScheme::Blosum, EncodingScheme::Vhse];
    assert_eq!(encoder.row_width(&schemes).unwrap(), 4);

    let encoded = encoder.encode_peptide("V", &schemes, false).unwrap();
    assert_eq!(encoded.dim(), (4, 4));
    assert_eq!(encoded[[0, 0]], 19.0);
    assert_eq!(encoded[[0, 2]], 19.0);
}

#[test]
fn test_missing_table_is_a_configuration_error() {
    let encoder = PeptideEncoder::new().with_table(EncodingScheme::Blosum, index_table());

    let result = encoder.encode_peptide("AR", &[EncodingScheme::Vhse], false);
    assert!(matches!(
        result,
        Err(EncoderError::InvalidParameter { .. })
    ));
}

#[test]
fn test_per_item_results() {
    let encoder = PeptideEncoder::new()
        .with_table(EncodingScheme::Blosum, index_table())
        .with_max_len(4);

    let set = vec!["AR".to_string(), "AX".to_string()];
    let results = encoder.encode_peptides(&set, &[EncodingScheme::Blosum], false);

    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    assert!(matches!(
        results[1],
        Err(EncoderError::InvalidSequence { position: 1, .. })
    ));
}

#[test]
fn test_oversized_peptide_is_rejected() {
    let encoder = PeptideEncoder::new()
        .with_table(EncodingScheme::Blosum, index_table())
        .with_max_len(3);

    // 3 residues + bias row exceeds the 3-row frame
    let result = encoder.encode_peptide("ARN", &[EncodingScheme::Blosum], true);
    assert!(matches!(result, Err(EncoderError::InvalidInput(_))));
}

#[test]
fn test_standardize_centers_each_feature() {
    let mut table = index_table();
    table.standardize();

    for feature in 0..table.width() {
        let values: Vec<f64> = PSI_BLAST_ORDER
            .iter()
            .map(|&c| table.row(c).unwrap()[feature])
            .collect();
        let mean: f64 = values.iter().sum::<f64>() / values.len() as f64;
        assert!(mean.abs() < TOLERANCE);
    }

    // index feature has unit population variance after standardization
    let variance: f64 = PSI_BLAST_ORDER
        .iter()
        .map(|&c| table.row(c).unwrap()[0].powi(2))
        .sum::<f64>()
        / 20.0;
    assert!((variance - 1.0).abs() < 1e-6);

    // the constant feature is left untouched
    assert_eq!(table.row('A').unwrap()[1], 1.0);
}

#[test]
fn test_square_matrix_file_reorders_columns() {
    let path = "tests/data/square_matrix.txt";
    let mut contents = String::from("# test matrix\n");
    contents.push_str(
        &PSI_BLAST_ORDER
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(" "),
    );
    contents.push('\n');
    for (i, symbol) in PSI_BLAST_ORDER.iter().enumerate() {
        let row: Vec<String> = (0..20).map(|j| format!("{}", (i + j) as f64)).collect();
        contents.push_str(&format!("{} {}\n", symbol, row.join(" ")));
    }
    // ambiguity rows are dropped
    contents.push_str("B 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0\n");
    std::fs::write(path, contents).unwrap();

    let table = EncodingTable::from_square_matrix_file(path).unwrap();
    assert_eq!(table.width(), 20);
    assert_eq!(table.row('A').unwrap()[1], 1.0);
    assert_eq!(table.row('R').unwrap()[0], 1.0);
    assert_eq!(table.row('V').unwrap()[19], 38.0);
    assert!(table.row('B').is_none());

    // clean up
    std::fs::remove_file(path).unwrap();
}

#[test]
fn test_property_file_with_row_labels() {
    let path = "tests/data/properties.txt";
    let mut contents = String::from("property,");
    contents.push_str(
        &PSI_BLAST_ORDER
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(","),
    );
    contents.push('\n');
    for (p, name) in ["hydrophobicity", "volume"].iter().enumerate() {
        let row: Vec<String> = (0..20).map(|j| format!("{}", (p * 100 + j) as f64)).collect();
        contents.push_str(&format!("{},{}\n", name, row.join(",")));
    }
    std::fs::write(path, contents).unwrap();

    let table = EncodingTable::from_property_file(path).unwrap();
    assert_eq!(table.width(), 2);
    assert_eq!(table.row('A').unwrap(), &[0.0, 100.0]);
    assert_eq!(table.row('V').unwrap(), &[19.0, 119.0]);

    // clean up
    std::fs::remove_file(path).unwrap();
}

#[test]
fn test_property_file_whitespace_layout() {
    let path = "tests/data/vhse.txt";
    let mut contents = String::new();
    contents.push_str(
        &PSI_BLAST_ORDER
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(" "),
    );
    contents.push('\n');
    let row: Vec<String> = (0..20).map(|j| format!("{:.2}", j as f64 / 10.0)).collect();
    contents.push_str(&row.join(" "));
    contents.push('\n');
    std::fs::write(path, contents).unwrap();

    let table = EncodingTable::from_property_file(path).unwrap();
    assert_eq!(table.width(), 1);
    assert!((table.row('N').unwrap()[0] - 0.2).abs() < TOLERANCE);

    // clean up
    std::fs::remove_file(path).unwrap();
}
