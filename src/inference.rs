//! Per-agent belief estimation from noisy speed observations.

/// The latent driving intentions tracked for each agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Intention {
    Conservative,
    Normal,
    Aggressive,
}

impl Intention {
    /// All intentions, in belief-vector order.
    pub const ALL: [Intention; 3] = [
        Intention::Conservative,
        Intention::Normal,
        Intention::Aggressive,
    ];

    /// The cruising speed this intention settles at, as a fraction
    /// of the agent's maximum speed.
    fn nominal_speed(self, max_speed: f64) -> f64 {
        match self {
            Intention::Conservative => 0.4 * max_speed,
            Intention::Normal => 0.7 * max_speed,
            Intention::Aggressive => max_speed,
        }
    }
}

/// A marginal belief over one agent's intention, updated from that
/// agent's observed speed each tick.
#[derive(Clone, Debug)]
pub struct MarginalInference {
    /// The slot of the observed agent in the simulation's agent list.
    index: usize,
    /// The agent's maximum speed, fixed at construction.
    max_speed: f64,
    /// Belief weights, kept normalised; one entry per [Intention].
    beliefs: [f64; 3],
}

impl MarginalInference {
    /// Creates an estimator for the agent in the given slot with a
    /// uniform prior.
    pub(crate) fn new(index: usize, max_speed: f64) -> Self {
        Self {
            index,
            max_speed,
            beliefs: [1.0 / 3.0; 3],
        }
    }

    /// The slot of the observed agent.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The current belief weights, one per [Intention].
    pub fn beliefs(&self) -> &[f64; 3] {
        &self.beliefs
    }

    /// Folds one observed speed magnitude into the belief.
    ///
    /// Each intention's likelihood is a Gaussian of the observation
    /// around that intention's nominal speed; the posterior is the
    /// renormalised product with the current belief.
    pub fn observe(&mut self, speed: f64) {
        let sigma = 0.25 * self.max_speed;
        for (belief, intention) in self.beliefs.iter_mut().zip(Intention::ALL) {
            let err = speed - intention.nominal_speed(self.max_speed);
            *belief *= (-err * err / (2.0 * sigma * sigma)).exp();
        }

        let total: f64 = self.beliefs.iter().sum();
        if total > f64::MIN_POSITIVE {
            for belief in &mut self.beliefs {
                *belief /= total;
            }
        } else {
            // All likelihoods underflowed; fall back to the prior.
            self.beliefs = [1.0 / 3.0; 3];
        }
    }

    /// The index into [Intention::ALL] of the most probable intention.
    pub fn most_likely(&self) -> usize {
        self.beliefs
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(idx, _)| idx)
            .unwrap_or(1)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn beliefs_stay_normalised() {
        let mut inf = MarginalInference::new(0, 3.0);
        for speed in [1.0, 2.5, 3.0, 0.5] {
            inf.observe(speed);
            assert_approx_eq!(inf.beliefs().iter().sum::<f64>(), 1.0, 1e-9);
        }
    }

    #[test]
    fn fast_driver_looks_aggressive() {
        let mut inf = MarginalInference::new(0, 3.0);
        for _ in 0..5 {
            inf.observe(3.0);
        }
        assert_eq!(Intention::ALL[inf.most_likely()], Intention::Aggressive);
    }

    #[test]
    fn slow_driver_looks_conservative() {
        let mut inf = MarginalInference::new(0, 3.0);
        for _ in 0..5 {
            inf.observe(1.0);
        }
        assert_eq!(Intention::ALL[inf.most_likely()], Intention::Conservative);
    }
}
