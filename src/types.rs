use polars::prelude::*;
use std::collections::HashMap;

/// One profile position: residue symbol mapped to a real value
pub type ProfileColumn = HashMap<char, f64>;

/// A position-indexed profile, one column per sequence position
pub type ProfileMatrix = Vec<ProfileColumn>;

/// Tabular view of a profile, one f64 column per residue symbol
pub type ProfileFrame = DataFrame;
