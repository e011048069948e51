//! LOS/NLOS channel condition resolution.
//!
//! A condition is drawn once per node pair by comparing a uniform draw
//! against a scenario-specific LOS probability of the 2-D distance (and, for
//! UMa, the lower endpoint height). Conditions are cached under a reciprocal
//! key and regenerated only when the configured update period has elapsed in
//! simulated time.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::config::Scenario;
use crate::geometry::Node;

/// Line-of-sight state of a node pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LosState {
    Los,
    Nlos,
}

/// Outdoor-to-indoor state of a node pair. The stochastic model itself only
/// distinguishes LOS/NLOS; the O2I state selects the penetration-loss regime
/// in the companion large-scale loss model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum O2iState {
    #[default]
    Outdoor,
    Indoor,
}

/// An immutable condition snapshot. Regeneration replaces the cache entry,
/// it never mutates one in place.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelCondition {
    pub los: LosState,
    pub o2i: O2iState,
    /// Simulated time at which this condition was drawn, seconds.
    pub generated_at_s: f64,
}

impl ChannelCondition {
    pub fn is_los(&self) -> bool {
        self.los == LosState::Los
    }
}

/// Reciprocal cache key over two stable identities: Cantor pairing of the
/// sorted pair, so `pair_key(a, b) == pair_key(b, a)`.
pub fn pair_key(a: u32, b: u32) -> u64 {
    let x1 = a.min(b) as u64;
    let x2 = a.max(b) as u64;
    ((x1 + x2) * (x1 + x2 + 1)) / 2 + x2
}

/// Per-pair LOS/NLOS resolver with time-based cache invalidation.
pub struct ConditionModel {
    scenario: Scenario,
    /// Zero means conditions are drawn once and never refreshed.
    update_period_s: f64,
    uniform: ChaCha8Rng,
    cache: HashMap<u64, ChannelCondition>,
}

impl ConditionModel {
    /// Number of stream seeds consumed by the resolver.
    pub const STREAMS_CONSUMED: u64 = 1;

    pub fn new(scenario: Scenario, update_period_s: f64, stream: u64) -> Self {
        Self {
            scenario,
            update_period_s,
            uniform: ChaCha8Rng::seed_from_u64(stream),
            cache: HashMap::new(),
        }
    }

    /// Resolve the condition for a node pair at simulated time `now_s`,
    /// drawing a fresh one if none is cached or the cached one went stale.
    pub fn condition(&mut self, a: &Node, b: &Node, now_s: f64) -> ChannelCondition {
        let key = pair_key(a.id, b.id);

        if let Some(cached) = self.cache.get(&key) {
            let stale =
                self.update_period_s > 0.0 && now_s - cached.generated_at_s > self.update_period_s;
            if !stale {
                return *cached;
            }
        }

        let cond = self.compute(a, b, now_s);
        debug!(
            key,
            los = cond.is_los(),
            now_s,
            "channel condition (re)generated"
        );
        self.cache.insert(key, cond);
        cond
    }

    fn compute(&mut self, a: &Node, b: &Node, now_s: f64) -> ChannelCondition {
        let p_los = self.p_los(a, b);
        let p_ref: f64 = self.uniform.gen();
        let los = if p_ref <= p_los {
            LosState::Los
        } else {
            LosState::Nlos
        };
        ChannelCondition {
            los,
            o2i: O2iState::Outdoor,
            generated_at_s: now_s,
        }
    }

    /// Scenario LOS probability as a function of 2-D distance (UMa also uses
    /// the lower endpoint height).
    pub fn p_los(&self, a: &Node, b: &Node) -> f64 {
        let d = a.position.distance_2d(&b.position);
        assert!(d > 0.0, "co-located endpoints: zero 2-D distance between nodes {} and {}", a.id, b.id);

        match self.scenario {
            Scenario::RMa => {
                if d <= 10.0 {
                    1.0
                } else {
                    (-(d - 10.0) / 1000.0).exp()
                }
            }
            Scenario::UMa => {
                let h_ut = a.position.z.min(b.position.z);
                if h_ut > 23.0 {
                    warn!(h_ut, "UMa LOS probability expects endpoint heights below 23 m");
                }
                if d <= 20.0 {
                    1.0
                } else {
                    let c = if h_ut <= 13.0 {
                        0.0
                    } else {
                        let g_2d = 1.25e-6 * d.powi(3) * (-d / 150.0).exp();
                        ((h_ut - 13.0) / 10.0).powf(1.5) * g_2d
                    };
                    (((20.0 / d) * (1.0 - (-d / 160.0).exp()) + (-d / 160.0).exp()) * (1.0 + c))
                        .powi(2)
                }
            }
            Scenario::UMi => {
                if d <= 22.0 {
                    1.0
                } else {
                    ((22.0 / d) * (1.0 - 22.0 / d) + (-d / 100.0).exp()).powi(2)
                }
            }
            Scenario::InH => {
                if d <= 1.2 {
                    1.0
                } else if d < 6.5 {
                    (-(d - 1.2) / 4.7).exp()
                } else {
                    (-(d - 6.5) / 32.6).exp() * 0.32
                }
            }
            Scenario::InF => (2.38 * (-d.powf(0.16) / 0.91).exp()).min(1.0),
        }
    }
}
