use crate::PitwallError;

/// Domain steps smaller than this are rounding noise and treated as a plateau
const DOMAIN_TOLERANCE: f64 = 1e-9;

/// Piecewise linear interpolant over a non-decreasing domain, extrapolating linearly past
/// both edges.
///
/// Runs of equal domain values collapse onto the last sample of the run, so a car standing
/// still maps distance 0 to the moment it starts moving.
#[derive(Clone, Debug)]
pub struct LinearInterpolator {
    xs: Vec<f64>,
    ys: Vec<f64>,
}

impl LinearInterpolator {
    pub fn new(xs: &[f64], ys: &[f64]) -> Result<Self, PitwallError> {
        if xs.len() != ys.len() {
            return Err(PitwallError::InvalidLapGeometry {
                reason: format!(
                    "domain has {} values but channel has {}",
                    xs.len(),
                    ys.len()
                ),
            });
        }

        let mut knots_x: Vec<f64> = Vec::with_capacity(xs.len());
        let mut knots_y: Vec<f64> = Vec::with_capacity(ys.len());
        for (&x, &y) in xs.iter().zip(ys) {
            match knots_x.last() {
                Some(&last) if x < last - DOMAIN_TOLERANCE => {
                    return Err(PitwallError::InvalidLapGeometry {
                        reason: format!("domain decreases from {last} to {x}"),
                    });
                }
                Some(&last) if x <= last + DOMAIN_TOLERANCE => {
                    if let Some(prev_y) = knots_y.last_mut() {
                        *prev_y = y;
                    }
                }
                _ => {
                    knots_x.push(x);
                    knots_y.push(y);
                }
            }
        }

        if knots_x.len() < 2 {
            return Err(PitwallError::InvalidLapGeometry {
                reason: "at least two distinct domain values are needed".to_string(),
            });
        }

        Ok(Self {
            xs: knots_x,
            ys: knots_y,
        })
    }

    pub fn evaluate(&self, x: f64) -> f64 {
        let upper = self
            .xs
            .partition_point(|knot| *knot <= x)
            .clamp(1, self.xs.len() - 1);
        let (x0, x1) = (self.xs[upper - 1], self.xs[upper]);
        let (y0, y1) = (self.ys[upper - 1], self.ys[upper]);
        y0 + (x - x0) * (y1 - y0) / (x1 - x0)
    }
}
