use crate::error::{AbsesError, Result};
use serde_derive::{Deserialize, Serialize};
use std::ops::{Add, Index, IndexMut, Mul, Sub};

/**
A stack of `bands` grids of `height` × `width` floats, stored band-major and
row-major inside each band. Missing values are NaN.
 */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Raster {
    bands: usize,
    height: usize,
    width: usize,
    data: Vec<f64>,
}

impl Raster {
    pub fn filled(height: usize, width: usize, value: f64) -> Raster {
        Raster {
            bands: 1,
            height,
            width,
            data: vec![value; height * width],
        }
    }

    pub fn zeros(height: usize, width: usize) -> Raster {
        Raster::filled(height, width, 0.)
    }

    pub fn from_vec(height: usize, width: usize, data: Vec<f64>) -> Result<Raster> {
        if data.len() != height * width {
            return Err(AbsesError::Shape(format!(
                "Cannot shape {} values into ({}, {}).",
                data.len(),
                height,
                width
            )));
        }
        Ok(Raster {
            bands: 1,
            height,
            width,
            data,
        })
    }

    /// Stack single-band rasters of equal shape.
    pub fn stack(rasters: Vec<Raster>) -> Result<Raster> {
        let (height, width) = match rasters.first() {
            Some(r) => r.shape2d(),
            None => return Err(AbsesError::Shape("Cannot stack zero rasters.".to_string())),
        };
        let mut data = Vec::with_capacity(rasters.len() * height * width);
        let bands = rasters.len();
        for r in rasters {
            if r.shape2d() != (height, width) {
                return Err(AbsesError::Shape(format!(
                    "Cannot stack {:?} onto ({}, {}).",
                    r.shape2d(),
                    height,
                    width
                )));
            }
            data.extend(r.data);
        }
        Ok(Raster {
            bands,
            height,
            width,
            data,
        })
    }

    pub fn shape2d(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    pub fn shape3d(&self) -> (usize, usize, usize) {
        (self.bands, self.height, self.width)
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }

    /// A single band as its own raster.
    pub fn band(&self, i: usize) -> Option<Raster> {
        let n = self.height * self.width;
        self.data.get(i * n..(i + 1) * n).map(|slice| Raster {
            bands: 1,
            height: self.height,
            width: self.width,
            data: slice.to_vec(),
        })
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row < self.height && col < self.width {
            Some(self.data[row * self.width + col])
        } else {
            None
        }
    }

    pub fn map<F: Fn(f64) -> f64>(&self, f: F) -> Raster {
        Raster {
            data: self.data.iter().map(|x| f(*x)).collect(),
            ..*self
        }
    }

    /// Sum over all non-NaN values.
    pub fn sum(&self) -> f64 {
        self.data.iter().filter(|x| !x.is_nan()).sum()
    }

    pub fn mean(&self) -> Option<f64> {
        let valid: Vec<f64> = self.data.iter().copied().filter(|x| !x.is_nan()).collect();
        if valid.is_empty() {
            None
        } else {
            Some(valid.iter().sum::<f64>() / valid.len() as f64)
        }
    }

    fn zip_with<F: Fn(f64, f64) -> f64>(self, other: Raster, f: F) -> Raster {
        assert_eq!(self.shape3d(), other.shape3d(), "raster shapes differ");
        Raster {
            data: self.data.iter().zip(other.data.iter()).map(|(a, b)| f(*a, *b)).collect(),
            ..self
        }
    }
}

impl Index<(usize, usize)> for Raster {
    type Output = f64;

    fn index(&self, (row, col): (usize, usize)) -> &f64 {
        &self.data[row * self.width + col]
    }
}

impl IndexMut<(usize, usize)> for Raster {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut f64 {
        &mut self.data[row * self.width + col]
    }
}

impl Mul<f64> for Raster {
    type Output = Raster;

    fn mul(self, factor: f64) -> Raster {
        self.map(|x| x * factor)
    }
}

impl Add<f64> for Raster {
    type Output = Raster;

    fn add(self, offset: f64) -> Raster {
        self.map(|x| x + offset)
    }
}

/// Cell-wise sum. Panics if the shapes differ.
impl Add for Raster {
    type Output = Raster;

    fn add(self, other: Raster) -> Raster {
        self.zip_with(other, |a, b| a + b)
    }
}

/// Cell-wise difference. Panics if the shapes differ.
impl Sub for Raster {
    type Output = Raster;

    fn sub(self, other: Raster) -> Raster {
        self.zip_with(other, |a, b| a - b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arithmetic_and_reductions() {
        let r = Raster::from_vec(2, 2, vec![1., 2., f64::NAN, 4.]).unwrap();
        assert_eq!(r.sum(), 7.);
        assert_eq!(r.mean(), Some(7. / 3.));
        let doubled = r.clone() * 2.;
        assert_eq!(doubled[(1, 1)], 8.);
        let diff = doubled - r;
        assert_eq!(diff.get(0, 1), Some(2.));
        assert!(Raster::from_vec(2, 3, vec![0.; 5]).is_err());
    }

    #[test]
    fn test_stack_and_band() {
        let a = Raster::filled(1, 2, 1.);
        let b = Raster::filled(1, 2, 2.);
        let s = Raster::stack(vec![a, b.clone()]).unwrap();
        assert_eq!(s.shape3d(), (2, 1, 2));
        assert_eq!(s.band(1), Some(b));
        assert!(Raster::stack(vec![Raster::zeros(1, 2), Raster::zeros(2, 1)]).is_err());
    }
}
