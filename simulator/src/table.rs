//! Per-channel result tables.
//!
//! One row per wavelength bin. The channel builder creates the bin columns;
//! signal propagation and the noise model append further columns as a target
//! is observed. Column order is insertion order.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Well-known column names.
pub mod columns {
    pub const WAVELENGTH: &str = "Wavelength";
    pub const BANDWIDTH: &str = "Bandwidth";
    pub const LEFT_BIN_EDGE: &str = "LeftBinEdge";
    pub const RIGHT_BIN_EDGE: &str = "RightBinEdge";
    pub const QE: &str = "QE";
    pub const TR: &str = "TR";
    pub const SKY_TR: &str = "sky TR";
    pub const WINDOW_SIZE: &str = "WindowSize";
    pub const INSTRUMENT_SIGNAL: &str = "instrument_signal";
    pub const INSTRUMENT_MAX_SIGNAL: &str = "instrument_MaxSignal_inPixel";
    pub const STAR_FLUX: &str = "starFlux";
    pub const STAR_SIGNAL: &str = "starSignal";
    pub const STAR_SIGNAL_IN_APERTURE: &str = "star_signal_inAperture";
    pub const STAR_MAX_SIGNAL: &str = "star_MaxSignal_inPixel";
    pub const MAX_SIGNAL_IN_PIXEL: &str = "MaxSignal_inPixel";
    pub const SATURATION_TIME: &str = "saturation_time";
    pub const FRAME_TIME: &str = "frameTime";
    pub const DARK_CURRENT_NOISE: &str = "darkcurrent_noise";
    pub const READ_NOISE: &str = "read_noise";
    pub const TOTAL_NOISE: &str = "total_noise";
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TableError {
    #[error("column '{name}' has {got} rows, table has {expected}")]
    LengthMismatch {
        name: String,
        expected: usize,
        got: usize,
    },
    #[error("column '{0}' not found")]
    MissingColumn(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<f64>,
}

/// Wavelength-binned table of one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelTable {
    #[serde(rename = "chName")]
    pub ch_name: String,
    columns: Vec<Column>,
}

impl ChannelTable {
    pub fn new(ch_name: &str) -> Self {
        Self {
            ch_name: ch_name.to_string(),
            columns: Vec::new(),
        }
    }

    /// Number of rows, fixed by the first column inserted.
    pub fn len(&self) -> usize {
        self.columns.first().map(|c| c.values.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert a column, replacing any existing one with the same name.
    pub fn set_column(&mut self, name: &str, values: Vec<f64>) -> Result<(), TableError> {
        if !self.columns.is_empty() && values.len() != self.len() {
            return Err(TableError::LengthMismatch {
                name: name.to_string(),
                expected: self.len(),
                got: values.len(),
            });
        }
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(column) => column.values = values,
            None => self.columns.push(Column {
                name: name.to_string(),
                values,
            }),
        }
        Ok(())
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    /// Like [`column`](Self::column) but missing columns are an error.
    pub fn require(&self, name: &str) -> Result<&[f64], TableError> {
        self.column(name)
            .ok_or_else(|| TableError::MissingColumn(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Append every column of `other` (same row count).
    pub fn hstack(&mut self, other: ChannelTable) -> Result<(), TableError> {
        for column in other.columns {
            self.set_column(&column.name, column.values)?;
        }
        Ok(())
    }

    /// Element-wise sum of every column whose name contains `pattern`.
    pub fn sum_matching(&self, pattern: &str) -> Vec<f64> {
        let mut total = vec![0.0; self.len()];
        for column in self.columns.iter().filter(|c| c.name.contains(pattern)) {
            total
                .iter_mut()
                .zip(&column.values)
                .for_each(|(t, v)| *t += v);
        }
        total
    }

    /// (left, right) edges of each bin.
    pub fn bin_edges(&self) -> Result<Vec<(f64, f64)>, TableError> {
        let left = self.require(columns::LEFT_BIN_EDGE)?;
        let right = self.require(columns::RIGHT_BIN_EDGE)?;
        Ok(left.iter().copied().zip(right.iter().copied()).collect())
    }
}
