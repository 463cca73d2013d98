//! Feature artifact persistence
//!
//! Spectrogram matrices are written as pickle streams so the training
//! stack can load them with a plain `pickle.load`.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use ndarray::Array2;

use crate::error::{Error, Result};

fn pickle_err(e: serde_pickle::Error) -> Error {
    Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

/// Save a feature matrix as a pickle file.
pub fn save_features(path: &Path, features: &Array2<f32>) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_pickle::to_writer(&mut writer, features, Default::default()).map_err(pickle_err)
}

/// Load a feature matrix written by [`save_features`].
pub fn load_features(path: &Path) -> Result<Array2<f32>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    serde_pickle::from_reader(reader, Default::default()).map_err(pickle_err)
}
