//! Algorithm markets choose which available algorithm runs next.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

use cl_types::{AlgorithmId, Trial};

use crate::pool::AlgorithmProfile;

pub trait AlgorithmMarket: Send {
    /// Pick the next algorithm among `available` (registration order).
    /// Returning `None` leaves the schedule idle for one cycle.
    fn next_algorithm(&mut self, available: &[AlgorithmProfile]) -> Option<AlgorithmId>;

    /// Observe every resolved trial, vetoed ones included.
    fn trial_scored(&mut self, _trial: &Trial) {}

    fn reset(&mut self) {}
}

/// Serves the available algorithm that has waited longest, ties going to
/// the earliest registered. Newly available algorithms go first.
#[derive(Debug, Default)]
pub struct RoundRobinMarket {
    tick: u64,
    last_served: HashMap<AlgorithmId, u64>,
}

impl RoundRobinMarket {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AlgorithmMarket for RoundRobinMarket {
    fn next_algorithm(&mut self, available: &[AlgorithmProfile]) -> Option<AlgorithmId> {
        let chosen = available
            .iter()
            .min_by_key(|p| self.last_served.get(&p.id).copied().unwrap_or(0))?
            .id;
        self.tick += 1;
        self.last_served.insert(chosen, self.tick);
        Some(chosen)
    }

    fn reset(&mut self) {
        self.tick = 0;
        self.last_served.clear();
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Ledger {
    evaluations: usize,
    improvement: f64,
}

/// Weighted random choice: an algorithm's weight grows with its global
/// rating and with the satisfaction improvement it has delivered per
/// evaluation during this run.
#[derive(Debug)]
pub struct RatedMarket {
    seed: u64,
    rng: StdRng,
    /// Multiplier applied to improvement-per-evaluation.
    reward: f64,
    best_satisfaction: Option<f64>,
    ledgers: HashMap<AlgorithmId, Ledger>,
}

impl RatedMarket {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: StdRng::seed_from_u64(seed),
            reward: 50.0,
            best_satisfaction: None,
            ledgers: HashMap::new(),
        }
    }

    pub fn with_reward(mut self, reward: f64) -> Self {
        self.reward = reward.max(0.0);
        self
    }

    /// Current selection weight of `profile`.
    pub fn weight(&self, profile: &AlgorithmProfile) -> f64 {
        let base = 1.0 + f64::from(profile.global_rating);
        let efficiency = self
            .ledgers
            .get(&profile.id)
            .filter(|l| l.evaluations > 0)
            .map_or(0.0, |l| l.improvement / l.evaluations as f64);
        base * (1.0 + self.reward * efficiency)
    }
}

impl AlgorithmMarket for RatedMarket {
    fn next_algorithm(&mut self, available: &[AlgorithmProfile]) -> Option<AlgorithmId> {
        let weights: Vec<f64> = available.iter().map(|p| self.weight(p)).collect();
        let total: f64 = weights.iter().sum();
        if available.is_empty() || total <= 0.0 {
            return None;
        }

        let mut pick = self.rng.random::<f64>() * total;
        for (profile, weight) in available.iter().zip(&weights) {
            if pick < *weight {
                return Some(profile.id);
            }
            pick -= weight;
        }
        available.last().map(|p| p.id)
    }

    fn trial_scored(&mut self, trial: &Trial) {
        let Some(tag) = trial.algorithm().filter(|tag| !tag.is_initial()) else {
            if trial.is_scored() {
                self.best_satisfaction = Some(
                    self.best_satisfaction
                        .map_or(trial.satisfaction(), |b| b.max(trial.satisfaction())),
                );
            }
            return;
        };

        let ledger = self.ledgers.entry(tag.id).or_default();
        ledger.evaluations += 1;
        if !trial.is_scored() {
            return;
        }
        let satisfaction = trial.satisfaction();
        match self.best_satisfaction {
            Some(best) if satisfaction > best => {
                ledger.improvement += satisfaction - best;
                self.best_satisfaction = Some(satisfaction);
            }
            None => self.best_satisfaction = Some(satisfaction),
            _ => {}
        }
    }

    fn reset(&mut self) {
        self.rng = StdRng::seed_from_u64(self.seed);
        self.best_satisfaction = None;
        self.ledgers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{echo_problem, evaluated};
    use cl_types::AlgorithmTag;
    use uuid::Uuid;

    fn profile(label: &str, global_rating: u8) -> AlgorithmProfile {
        AlgorithmProfile {
            id: Uuid::new_v4(),
            label: label.to_string(),
            global_rating,
            local_rating: 5,
            min_evaluations_per_run: 1,
            max_evaluations_per_run: usize::MAX,
        }
    }

    #[test]
    fn round_robin_cycles_in_registration_order() {
        let mut market = RoundRobinMarket::new();
        let pool = vec![profile("a", 5), profile("b", 5), profile("c", 5)];

        let picks: Vec<_> = (0..6)
            .map(|_| market.next_algorithm(&pool).unwrap())
            .collect();
        let ids: Vec<_> = pool.iter().map(|p| p.id).collect();
        assert_eq!(picks, [ids.clone(), ids].concat());
        assert!(market.next_algorithm(&[]).is_none());
    }

    #[test]
    fn round_robin_serves_newcomers_first() {
        let mut market = RoundRobinMarket::new();
        let a = profile("a", 5);
        let b = profile("b", 5);
        assert_eq!(market.next_algorithm(&[a.clone()]), Some(a.id));
        assert_eq!(market.next_algorithm(&[a.clone()]), Some(a.id));
        assert_eq!(market.next_algorithm(&[a.clone(), b.clone()]), Some(b.id));
        assert_eq!(market.next_algorithm(&[a.clone(), b]), Some(a.id));
    }

    #[test]
    fn rated_market_is_reproducible() {
        let pool = vec![profile("a", 2), profile("b", 8)];
        let mut first = RatedMarket::new(7);
        let mut second = RatedMarket::new(7);
        for _ in 0..20 {
            assert_eq!(first.next_algorithm(&pool), second.next_algorithm(&pool));
        }
    }

    #[test]
    fn rated_market_rewards_improvement() {
        let problem = echo_problem();
        let winner = profile("winner", 5);
        let loser = profile("loser", 5);
        let mut market = RatedMarket::new(1);

        market.trial_scored(&evaluated(&problem, 5.0, Some(AlgorithmTag::initial())));
        market.trial_scored(&evaluated(&problem, 8.0, Some(loser.tag())));
        market.trial_scored(&evaluated(&problem, 3.0, Some(winner.tag())));

        assert!(market.weight(&winner) > market.weight(&loser));
        assert_eq!(market.weight(&loser), 6.0);

        market.reset();
        assert_eq!(market.weight(&winner), 6.0);
    }
}
