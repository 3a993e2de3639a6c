use serde::{Deserialize, Serialize};

use crate::PitwallError;

/// Savitzky-Golay filter: least squares polynomial fit over a sliding odd-sized window.
///
/// Interior samples are computed with the convolution coefficients of the centered fit.
/// The first and last `window_length / 2` samples are evaluated on a polynomial fitted to
/// the first and last full window respectively.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct SavitzkyGolay {
    pub window_length: usize,
    pub poly_order: usize,
}

impl SavitzkyGolay {
    pub fn new(window_length: usize, poly_order: usize) -> Result<Self, PitwallError> {
        let filter = Self {
            window_length,
            poly_order,
        };
        filter.validate()?;
        Ok(filter)
    }

    fn validate(&self) -> Result<(), PitwallError> {
        if self.window_length % 2 == 0 {
            return Err(PitwallError::InvalidSmoothingWindow {
                reason: format!("window length {} must be odd", self.window_length),
            });
        }
        if self.poly_order >= self.window_length {
            return Err(PitwallError::InvalidSmoothingWindow {
                reason: format!(
                    "polynomial order {} must be less than window length {}",
                    self.poly_order, self.window_length
                ),
            });
        }
        Ok(())
    }

    pub fn smooth(&self, values: &[f64]) -> Result<Vec<f64>, PitwallError> {
        self.validate()?;
        if values.len() < self.window_length {
            return Err(PitwallError::InsufficientSamples {
                required: self.window_length,
                actual: values.len(),
            });
        }

        let half = self.window_length / 2;
        let coefficients = self.center_coefficients()?;
        let mut output = vec![0.; values.len()];

        for i in half..values.len() - half {
            output[i] = values[i - half..=i + half]
                .iter()
                .zip(&coefficients)
                .map(|(v, c)| v * c)
                .sum();
        }

        // edges are evaluated on a fit of the whole first and last window
        let head = fit_polynomial(&values[..self.window_length], self.poly_order)?;
        for (i, out) in output.iter_mut().enumerate().take(half) {
            *out = evaluate(&head, self.scaled_offset(i));
        }
        let tail_start = values.len() - self.window_length;
        let tail = fit_polynomial(&values[tail_start..], self.poly_order)?;
        for i in values.len() - half..values.len() {
            output[i] = evaluate(&tail, self.scaled_offset(i - tail_start));
        }

        Ok(output)
    }

    /// Position of the `index`-th window sample in the [-1, 1] fitting coordinates
    fn scaled_offset(&self, index: usize) -> f64 {
        let half = (self.window_length / 2) as f64;
        if half == 0. {
            return 0.;
        }
        (index as f64 - half) / half
    }

    /// Weights that evaluate the centered least squares polynomial at the window center
    fn center_coefficients(&self) -> Result<Vec<f64>, PitwallError> {
        let offsets: Vec<f64> = (0..self.window_length)
            .map(|i| self.scaled_offset(i))
            .collect();
        let normal = normal_matrix(&offsets, self.poly_order);
        let mut unit = vec![0.; self.poly_order + 1];
        unit[0] = 1.;
        let solution = solve(normal, unit)?;
        Ok(offsets
            .iter()
            .map(|u| evaluate(&solution, *u))
            .collect())
    }
}

/// Fit a polynomial over a window sampled at evenly spaced offsets in [-1, 1]
fn fit_polynomial(window: &[f64], poly_order: usize) -> Result<Vec<f64>, PitwallError> {
    let half = (window.len() / 2) as f64;
    let offsets: Vec<f64> = (0..window.len())
        .map(|i| if half == 0. { 0. } else { (i as f64 - half) / half })
        .collect();
    let normal = normal_matrix(&offsets, poly_order);
    let rhs: Vec<f64> = (0..=poly_order)
        .map(|k| {
            offsets
                .iter()
                .zip(window)
                .map(|(u, v)| u.powi(k as i32) * v)
                .sum()
        })
        .collect();
    solve(normal, rhs)
}

fn normal_matrix(offsets: &[f64], poly_order: usize) -> Vec<Vec<f64>> {
    (0..=poly_order)
        .map(|row| {
            (0..=poly_order)
                .map(|col| offsets.iter().map(|u| u.powi((row + col) as i32)).sum())
                .collect()
        })
        .collect()
}

fn evaluate(coefficients: &[f64], u: f64) -> f64 {
    coefficients.iter().rev().fold(0., |acc, c| acc * u + c)
}

/// Gaussian elimination with partial pivoting on a small dense system
fn solve(mut matrix: Vec<Vec<f64>>, mut rhs: Vec<f64>) -> Result<Vec<f64>, PitwallError> {
    let n = rhs.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|a, b| matrix[*a][col].abs().total_cmp(&matrix[*b][col].abs()))
            .unwrap_or(col);
        if matrix[pivot][col].abs() < f64::EPSILON {
            return Err(PitwallError::InvalidSmoothingWindow {
                reason: "least squares system is singular".to_string(),
            });
        }
        matrix.swap(col, pivot);
        rhs.swap(col, pivot);

        for row in col + 1..n {
            let factor = matrix[row][col] / matrix[col][col];
            for k in col..n {
                matrix[row][k] -= factor * matrix[col][k];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut solution = vec![0.; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| matrix[row][k] * solution[k]).sum();
        solution[row] = (rhs[row] - tail) / matrix[row][row];
    }
    Ok(solution)
}

/// Sample-to-sample derivative with central differences inside and one-sided differences
/// at both ends.
pub fn gradient(values: &[f64]) -> Result<Vec<f64>, PitwallError> {
    let n = values.len();
    if n < 2 {
        return Err(PitwallError::InsufficientSamples {
            required: 2,
            actual: n,
        });
    }
    let mut output = Vec::with_capacity(n);
    output.push(values[1] - values[0]);
    for i in 1..n - 1 {
        output.push((values[i + 1] - values[i - 1]) / 2.);
    }
    output.push(values[n - 1] - values[n - 2]);
    Ok(output)
}
