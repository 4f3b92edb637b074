//! Running statistics used to score predictions against targets.

/// Variances below this are treated as zero.
pub const EPSILON: f64 = f64::EPSILON;

/// Running mean and sample variance (Welford's method).
#[derive(Clone, Debug, Default)]
pub struct MeanVariance {
    count: usize,
    mean: f64,
    m2: f64,
}

impl MeanVariance {
    pub fn new() -> MeanVariance {
        MeanVariance::default()
    }

    pub fn add(&mut self, x: f64) {
        self.count += 1;
        if self.count == 1 {
            self.mean = x;
            self.m2 = 0.0;
        } else {
            let old_mean = self.mean;
            self.mean = old_mean + (x - old_mean) / self.count as f64;
            self.m2 += (x - old_mean) * (x - self.mean);
        }
    }

    pub fn reset(&mut self) {
        *self = MeanVariance::default();
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Mean of the samples seen so far, `0` if there are none.
    pub fn mean(&self) -> f64 {
        if self.count > 0 {
            self.mean
        } else {
            0.0
        }
    }

    /// Sample variance, `0` with fewer than two samples.
    pub fn variance(&self) -> f64 {
        if self.count > 1 {
            self.m2 / (self.count - 1) as f64
        } else {
            0.0
        }
    }

    pub fn stddev(&self) -> f64 {
        self.variance().sqrt()
    }
}

/// Running covariance of `(x, y)` pairs.
#[derive(Clone, Debug, Default)]
pub struct Covariance {
    count: usize,
    x_mean: f64,
    y_mean: f64,
    comoment: f64,
}

impl Covariance {
    pub fn new() -> Covariance {
        Covariance::default()
    }

    pub fn add(&mut self, x: f64, y: f64) {
        self.count += 1;
        let n = self.count as f64;
        self.x_mean += (x - self.x_mean) / n;
        let dy = y - self.y_mean;
        self.y_mean += dy / n;
        // (x - mean_x after update) * (y - mean_y before update)
        self.comoment += (x - self.x_mean) * dy;
    }

    pub fn reset(&mut self) {
        *self = Covariance::default();
    }

    /// Population covariance, `0` if there are no samples.
    pub fn covariance(&self) -> f64 {
        if self.count > 0 {
            self.comoment / self.count as f64
        } else {
            0.0
        }
    }

    /// Sample covariance, `0` with fewer than two samples.
    pub fn sample_covariance(&self) -> f64 {
        if self.count > 1 {
            self.comoment / (self.count - 1) as f64
        } else {
            0.0
        }
    }
}

/// Accumulating statistic used as a fitness score.
///
/// Higher values mean a better fit.
pub trait FitnessStatistic {
    /// Accumulates one `(x, y)` pair.
    fn add(&mut self, x: f64, y: f64);

    /// Returns the statistic over all accumulated pairs.
    fn compute(&self) -> f64;

    /// Clears accumulated state.
    fn reset(&mut self);

    /// Resets, accumulates the paired slices and computes.
    /// Extra elements of the longer slice are ignored.
    fn calculate(&mut self, xs: &[f64], ys: &[f64]) -> f64 {
        self.reset();
        for (&x, &y) in xs.iter().zip(ys.iter()) {
            self.add(x, y);
        }
        self.compute()
    }
}

/// Squared Pearson correlation coefficient.
///
/// # Examples
/// ```
/// # use evonnet::statistics::{FitnessStatistic, RSquared};
/// let mut r2 = RSquared::new();
/// assert_eq!(r2.calculate(&[1.0, 2.0, 3.0], &[5.0, 5.0, 5.0]), 0.0);
/// ```
#[derive(Clone, Debug, Default)]
pub struct RSquared {
    x: MeanVariance,
    y: MeanVariance,
    xy: Covariance,
}

impl RSquared {
    pub fn new() -> RSquared {
        RSquared::default()
    }
}

impl FitnessStatistic for RSquared {
    fn add(&mut self, x: f64, y: f64) {
        self.x.add(x);
        self.y.add(y);
        self.xy.add(x, y);
    }

    /// Returns `0` when either series has (near) zero variance.
    fn compute(&self) -> f64 {
        let x_var = self.x.variance();
        let y_var = self.y.variance();
        if x_var < EPSILON || y_var < EPSILON {
            return 0.0;
        }
        let cov = self.xy.sample_covariance();
        cov * cov / (x_var * y_var)
    }

    fn reset(&mut self) {
        self.x.reset();
        self.y.reset();
        self.xy.reset();
    }
}

/// Least-squares affine map from predictions onto targets: `target ≈ alpha + beta * prediction`.
#[derive(Clone, Debug)]
pub struct LinearScaling {
    target: MeanVariance,
    prediction: MeanVariance,
    covariance: Covariance,
    alpha: f64,
    beta: f64,
}

impl Default for LinearScaling {
    fn default() -> Self {
        LinearScaling {
            target: MeanVariance::default(),
            prediction: MeanVariance::default(),
            covariance: Covariance::default(),
            alpha: 0.0,
            beta: 1.0,
        }
    }
}

impl LinearScaling {
    pub fn new() -> LinearScaling {
        LinearScaling::default()
    }

    pub fn add(&mut self, prediction: f64, target: f64) {
        self.target.add(target);
        self.prediction.add(prediction);
        self.covariance.add(prediction, target);

        let variance = self.prediction.variance();
        self.beta = if variance < EPSILON {
            1.0
        } else {
            self.covariance.sample_covariance() / variance
        };
        self.alpha = self.target.mean() - self.beta * self.prediction.mean();
    }

    pub fn reset(&mut self) {
        *self = LinearScaling::default();
    }

    /// Additive offset.
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Multiplicative factor.
    pub fn beta(&self) -> f64 {
        self.beta
    }

    pub fn apply(&self, prediction: f64) -> f64 {
        self.alpha + self.beta * prediction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn mean_variance() {
        let mut mv = MeanVariance::new();
        assert_eq!(mv.mean(), 0.0);
        assert_eq!(mv.variance(), 0.0);

        for x in &[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            mv.add(*x);
        }
        assert_relative_eq!(mv.mean(), 5.0);
        assert_relative_eq!(mv.variance(), 32.0 / 7.0, epsilon = 1e-12);

        mv.reset();
        assert_eq!(mv.count(), 0);
        mv.add(3.0);
        assert_eq!(mv.mean(), 3.0);
        assert_eq!(mv.variance(), 0.0);
    }

    #[test]
    fn covariance() {
        let mut cov = Covariance::new();
        for (x, y) in &[(1.0, 2.0), (2.0, 4.0), (3.0, 6.0)] {
            cov.add(*x, *y);
        }
        // x mean 2, y mean 4, sum of products of deviations = 4
        assert_relative_eq!(cov.covariance(), 4.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(cov.sample_covariance(), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn r_squared_of_identical_series_is_one() {
        let targets = [1.0, 2.0, 3.0, 4.0];
        let mut r2 = RSquared::new();
        assert_relative_eq!(r2.calculate(&targets, &targets), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn r_squared_with_constant_predictions_is_zero() {
        let targets = [1.0, 2.0, 3.0, 4.0];
        let predictions = [2.5; 4];
        let mut r2 = RSquared::new();
        let value = r2.calculate(&targets, &predictions);
        assert_eq!(value, 0.0);
        assert!(!value.is_nan());
    }

    #[test]
    fn r_squared_is_scale_invariant() {
        let targets = [1.0, 3.0, 2.0, 5.0, 4.0];
        let predictions: Vec<f64> = targets.iter().map(|t| -3.0 * t + 10.0).collect();
        let mut r2 = RSquared::new();
        assert_relative_eq!(r2.calculate(&targets, &predictions), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn r_squared_resets_between_calculations() {
        let mut r2 = RSquared::new();
        r2.calculate(&[1.0, 2.0, 3.0], &[3.0, 1.0, 2.0]);
        assert_relative_eq!(
            r2.calculate(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]),
            1.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn linear_scaling_recovers_affine_map() {
        let mut scaling = LinearScaling::new();
        for p in &[0.0, 1.0, 2.0, 3.0] {
            scaling.add(*p, 1.5 + 2.0 * p);
        }
        assert_relative_eq!(scaling.alpha(), 1.5, epsilon = 1e-12);
        assert_relative_eq!(scaling.beta(), 2.0, epsilon = 1e-12);
        assert_relative_eq!(scaling.apply(10.0), 21.5, epsilon = 1e-12);
    }

    #[test]
    fn linear_scaling_of_constant_predictions() {
        let mut scaling = LinearScaling::new();
        for t in &[1.0, 2.0, 3.0] {
            scaling.add(0.5, *t);
        }
        assert_eq!(scaling.beta(), 1.0);
        assert_relative_eq!(scaling.alpha(), 1.5, epsilon = 1e-12);
    }
}
