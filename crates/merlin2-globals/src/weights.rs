use crate::{Error, Result};
use std::ops::{Index, IndexMut};

pub use num_complex::Complex64;

/// A dense tap-weight matrix, `taps` rows by `lines` columns.
///
/// Weights are complex baseband coefficients in `[-1.0, 1.0]` per component.
/// The driver quantizes them to 8-bit magnitudes on write and reports the
/// quantized values back.
#[derive(Debug, Clone, PartialEq)]
pub struct Weights {
    taps: usize,
    lines: usize,
    data: Vec<Complex64>,
}

impl Weights {
    pub fn zeros(taps: usize, lines: usize) -> Self {
        Self {
            taps,
            lines,
            data: vec![Complex64::new(0.0, 0.0); taps * lines],
        }
    }

    /// Builds a matrix from row-major data. The length must be `taps * lines`.
    pub fn from_vec(taps: usize, lines: usize, data: Vec<Complex64>) -> Result<Self> {
        if data.len() != taps * lines {
            return Err(Error::Argument("weight data length must be taps * lines"));
        }
        Ok(Self { taps, lines, data })
    }

    pub fn taps(&self) -> usize {
        self.taps
    }

    pub fn lines(&self) -> usize {
        self.lines
    }

    /// Largest absolute difference over all real and imaginary components.
    pub fn max_component_error(&self, other: &Self) -> f64 {
        self.data
            .iter()
            .zip(other.data.iter())
            .flat_map(|(a, b)| [(a.re - b.re).abs(), (a.im - b.im).abs()])
            .fold(0.0, f64::max)
    }
}

impl Index<(usize, usize)> for Weights {
    type Output = Complex64;

    fn index(&self, (tap, line): (usize, usize)) -> &Complex64 {
        &self.data[tap * self.lines + line]
    }
}

impl IndexMut<(usize, usize)> for Weights {
    fn index_mut(&mut self, (tap, line): (usize, usize)) -> &mut Complex64 {
        &mut self.data[tap * self.lines + line]
    }
}
