//! Per-arm ridge-regression state.
//!
//! Each arm keeps `Ainv`, the inverse of `A = I + Σ x·xᵀ`, and `b = Σ r·x`.
//! `Ainv` is maintained incrementally with the Sherman–Morrison identity so
//! no update ever inverts a matrix.

use ndarray::{Array1, Array2, ArrayView1, Axis};

/// Ridge-regression state for one arm
#[derive(Debug, Clone, PartialEq)]
pub struct ArmState {
    pub(crate) a_inv: Array2<f64>,
    pub(crate) b: Array1<f64>,
}

impl ArmState {
    /// Fresh arm: identity prior, zero reward sum
    pub fn new(d: usize) -> Self {
        Self {
            a_inv: Array2::eye(d),
            b: Array1::zeros(d),
        }
    }

    pub fn dim(&self) -> usize {
        self.b.len()
    }

    pub fn a_inv(&self) -> &Array2<f64> {
        &self.a_inv
    }

    pub fn b(&self) -> &Array1<f64> {
        &self.b
    }

    /// Current coefficient estimate `Ainv · b`
    pub fn theta(&self) -> Array1<f64> {
        self.a_inv.dot(&self.b)
    }

    /// Upper confidence bound `θ·x + alpha * sqrt(xᵀ·Ainv·x)`
    ///
    /// `x` must already have length `dim()`.
    pub fn ucb(&self, x: ArrayView1<'_, f64>, alpha: f64) -> f64 {
        let mean = self.theta().dot(&x);
        // Round-off can push the quadratic form a hair below zero
        let variance = x.dot(&self.a_inv.dot(&x)).max(0.0);
        mean + alpha * variance.sqrt()
    }

    /// Rank-1 update with context `x` and `reward`
    ///
    /// `x` must already have length `dim()`.
    pub fn update(&mut self, x: ArrayView1<'_, f64>, reward: f64) {
        self.b.scaled_add(reward, &x);

        let a_x = self.a_inv.dot(&x);
        let x_a = x.dot(&self.a_inv);
        let denominator = 1.0 + x.dot(&a_x);

        let outer = a_x
            .view()
            .insert_axis(Axis(1))
            .dot(&x_a.view().insert_axis(Axis(0)));
        self.a_inv.scaled_add(-1.0 / denominator, &outer);

        self.symmetrize();
    }

    /// Average `Ainv` with its transpose to cancel accumulated asymmetry
    fn symmetrize(&mut self) {
        self.a_inv = (&self.a_inv + &self.a_inv.t()) * 0.5;
    }

    /// True when this arm is still at its prior (`I`, `0`)
    pub fn is_untrained(&self) -> bool {
        self.b.iter().all(|v| *v == 0.0) && self.a_inv == Array2::<f64>::eye(self.dim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn max_abs_diff(a: &Array2<f64>, b: &Array2<f64>) -> f64 {
        (a - b).iter().fold(0.0_f64, |acc, v| acc.max(v.abs()))
    }

    #[test]
    fn test_new_arm_is_prior() {
        let arm = ArmState::new(4);
        assert_eq!(arm.a_inv(), &Array2::<f64>::eye(4));
        assert!(arm.b().iter().all(|v| *v == 0.0));
        assert!(arm.is_untrained());
    }

    #[test]
    fn test_single_update_matches_exact_inverse() {
        // A = I + x·xᵀ with x = [1, 2]  =>  A = [[2, 2], [2, 5]], det = 6
        let mut arm = ArmState::new(2);
        let x = array![1.0, 2.0];
        arm.update(x.view(), 1.0);

        let expected = array![[5.0 / 6.0, -2.0 / 6.0], [-2.0 / 6.0, 2.0 / 6.0]];
        assert!(max_abs_diff(arm.a_inv(), &expected) < 1e-12);
        assert_eq!(arm.b(), &array![1.0, 2.0]);
        assert!(!arm.is_untrained());
    }

    #[test]
    fn test_update_keeps_symmetry() {
        let mut arm = ArmState::new(3);
        let contexts = [
            array![0.3, 0.9, 1.0],
            array![0.7, 0.1, 1.0],
            array![0.5, 0.5, 0.2],
        ];
        for (i, x) in contexts.iter().cycle().take(60).enumerate() {
            arm.update(x.view(), (i % 2) as f64);
        }

        let transposed = arm.a_inv().t().to_owned();
        assert_eq!(arm.a_inv(), &transposed);
    }

    #[test]
    fn test_ucb_of_fresh_arm_is_exploration_only() {
        let arm = ArmState::new(3);
        let x = array![3.0, 0.0, 4.0];
        // theta = 0, sqrt(xᵀ I x) = 5
        assert!((arm.ucb(x.view(), 0.5) - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_theta_after_update() {
        let mut arm = ArmState::new(2);
        arm.update(array![1.0, 0.0].view(), 1.0);
        // A = diag(2, 1), b = [1, 0]  =>  theta = [0.5, 0]
        let theta = arm.theta();
        assert!((theta[0] - 0.5).abs() < 1e-12);
        assert!(theta[1].abs() < 1e-12);
    }
}
