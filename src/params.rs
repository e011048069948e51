//! Statistical parameter tables and the generated channel-parameter record.
//!
//! Tables hold one calibration value at 28 GHz and one at 140 GHz for each
//! constant; `calibrated` interpolates linearly between them and clamps
//! outside the range, so a table lookup is exact at or below 28 GHz and at
//! or above 140 GHz.

use crate::condition::ChannelCondition;

const FREQ_LOWER_GHZ: f64 = 28.0;
const FREQ_UPPER_GHZ: f64 = 140.0;

/// Linear interpolation of a table constant between the two calibration
/// frequencies, clamped outside [28, 140] GHz.
pub fn calibrated(val_low: f64, val_high: f64, freq_ghz: f64) -> f64 {
    if freq_ghz <= FREQ_LOWER_GHZ {
        val_low
    } else if freq_ghz >= FREQ_UPPER_GHZ {
        val_high
    } else {
        freq_ghz * (val_high - val_low) / (FREQ_UPPER_GHZ - FREQ_LOWER_GHZ)
            + (5.0 * val_low - val_high) / 4.0
    }
}

/// Distribution family for the per-subpath angular offset around its lobe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AngleSpread {
    #[default]
    Gaussian,
    Laplacian,
}

/// Scenario- and condition-specific constants, already interpolated to the
/// operating frequency. Derived per call; never cached.
#[derive(Debug, Clone, Default)]
pub struct ParamsTable {
    pub los: bool,

    /// Upper bound for the discrete-uniform time-cluster count (outdoor).
    pub max_time_clusters: f64,
    /// Poisson mean for the time-cluster count (indoor).
    pub lambda_c: f64,
    /// Upper bound for the discrete-uniform subpath count (outdoor < 100 GHz).
    pub max_subpaths: f64,
    /// Mean of the exponential subpath count (indoor or >= 100 GHz).
    pub mu_s: f64,
    /// Bernoulli gate probability for multi-subpath clusters (indoor).
    pub beta_s: f64,
    /// Mean number of AoD / AoA spatial lobes.
    pub mu_aod: f64,
    pub mu_aoa: f64,

    /// Intra-cluster delay: exponential mean (ns) or gamma shape/scale.
    pub mu_rho: f64,
    pub alpha_rho: f64,
    pub beta_rho: f64,
    /// Exponent span for the outdoor sub-100-GHz delay spacing law.
    pub x_max: f64,

    /// Cluster excess delay: exponential mean (ns) or gamma shape/scale.
    pub mu_tau: f64,
    pub alpha_tau: f64,
    pub beta_tau: f64,
    /// Minimum inter-cluster void interval, ns.
    pub min_void_interval_ns: f64,

    /// Per-cluster shadowing sigma (dB) and power decay constant (ns).
    pub sigma_cluster_db: f64,
    pub cluster_gamma_ns: f64,
    /// Per-subpath shadowing sigma (dB) and power decay constant (ns).
    pub sigma_subpath_db: f64,
    pub subpath_gamma_ns: f64,

    /// Lobe elevation statistics, degrees.
    pub mean_zod_deg: f64,
    pub sigma_zod_deg: f64,
    pub mean_zoa_deg: f64,
    pub sigma_zoa_deg: f64,

    /// Per-subpath angular offsets around the lobe mean, degrees.
    pub aod_azimuth_spread_deg: f64,
    pub aod_azimuth_spread: AngleSpread,
    pub aod_elevation_spread_deg: f64,
    pub aod_elevation_spread: AngleSpread,
    pub aoa_azimuth_spread_deg: f64,
    pub aoa_azimuth_spread: AngleSpread,
    pub aoa_elevation_spread_deg: f64,
    pub aoa_elevation_spread: AngleSpread,

    /// Cross-polarization discrimination statistics, dB.
    pub xpd_mean_db: f64,
    pub xpd_sd_db: f64,
}

impl ParamsTable {
    /// Build the table for a (scenario, condition) pair at the operating
    /// frequency.
    pub fn for_condition(
        scenario: crate::config::Scenario,
        condition: &ChannelCondition,
        frequency_hz: f64,
    ) -> ParamsTable {
        use crate::config::Scenario::*;
        let f = frequency_hz / 1e9;
        let los = condition.is_los();
        let cal = |lo: f64, hi: f64| calibrated(lo, hi, f);

        let mut t = ParamsTable {
            los,
            // XPD statistics do not depend on the scenario.
            xpd_mean_db: if los { 11.5 + f * 0.10 } else { 5.5 + f * 0.13 },
            xpd_sd_db: 1.6,
            ..ParamsTable::default()
        };

        match (scenario, los) {
            (UMi, true) | (UMa, true) => {
                t.max_time_clusters = cal(6.0, 5.0);
                t.max_subpaths = 30.0;
                t.mu_s = 1.8;
                t.mu_aod = cal(1.9, 1.4);
                t.mu_aoa = cal(1.8, 1.2);
                t.x_max = 0.2;
                t.mu_rho = 30.0;
                t.mu_tau = cal(123.0, 80.0);
                t.min_void_interval_ns = 25.0;
                t.sigma_cluster_db = cal(1.0, 5.34);
                t.cluster_gamma_ns = cal(25.9, 40.0);
                t.sigma_subpath_db = cal(6.0, 3.48);
                t.subpath_gamma_ns = cal(16.9, 20.0);
                t.mean_zod_deg = cal(-12.6, -3.2);
                t.sigma_zod_deg = cal(5.9, 1.2);
                t.aod_azimuth_spread_deg = cal(8.5, 4.3);
                t.aod_azimuth_spread = AngleSpread::Gaussian;
                t.aod_elevation_spread_deg = cal(2.5, 0.1);
                t.aod_elevation_spread = AngleSpread::Gaussian;
                t.mean_zoa_deg = cal(10.8, 2.0);
                t.sigma_zoa_deg = cal(5.3, 2.9);
                t.aoa_azimuth_spread_deg = cal(10.5, 7.3);
                t.aoa_azimuth_spread = AngleSpread::Gaussian;
                t.aoa_elevation_spread_deg = cal(11.5, 3.2);
                t.aoa_elevation_spread = AngleSpread::Laplacian;
            }
            (UMi, false) | (UMa, false) => {
                t.max_time_clusters = cal(6.0, 3.0);
                t.max_subpaths = 30.0;
                t.mu_s = 3.0;
                t.mu_aod = cal(1.5, 1.3);
                t.mu_aoa = cal(2.1, 2.1);
                t.x_max = 0.5;
                t.mu_rho = 33.0;
                t.mu_tau = cal(83.0, 58.0);
                t.min_void_interval_ns = 25.0;
                t.sigma_cluster_db = cal(3.0, 4.68);
                t.cluster_gamma_ns = cal(51.0, 49.0);
                t.sigma_subpath_db = cal(6.0, 3.48);
                t.subpath_gamma_ns = cal(15.5, 20.0);
                t.mean_zod_deg = cal(-4.9, -1.6);
                t.sigma_zod_deg = cal(4.5, 0.5);
                t.aod_azimuth_spread_deg = cal(11.0, 5.0);
                t.aod_azimuth_spread = AngleSpread::Gaussian;
                t.aod_elevation_spread_deg = cal(3.0, 2.3);
                t.aod_elevation_spread = AngleSpread::Gaussian;
                t.mean_zoa_deg = cal(3.6, 1.6);
                t.sigma_zoa_deg = cal(4.8, 2.0);
                t.aoa_azimuth_spread_deg = cal(7.5, 7.5);
                t.aoa_azimuth_spread = AngleSpread::Gaussian;
                t.aoa_elevation_spread_deg = cal(6.0, 0.0);
                t.aoa_elevation_spread = AngleSpread::Laplacian;
            }
            (RMa, true) => {
                t.max_time_clusters = cal(1.0, 1.0).round();
                t.max_subpaths = cal(2.0, 2.0).round();
                t.mu_aod = cal(1.0, 1.0).round();
                t.mu_aoa = cal(1.0, 1.0).round();
                t.x_max = 0.2;
                t.mu_rho = 30.0;
                t.mu_tau = cal(123.0, 80.0);
                t.min_void_interval_ns = 25.0;
                t.sigma_cluster_db = cal(1.0, 5.34);
                t.cluster_gamma_ns = cal(25.9, 40.0);
                t.sigma_subpath_db = cal(6.0, 3.48);
                t.subpath_gamma_ns = cal(16.9, 20.0);
                t.mean_zod_deg = cal(-12.6, -3.2);
                t.sigma_zod_deg = cal(5.9, 1.2);
                t.aod_azimuth_spread_deg = cal(8.5, 4.3);
                t.aod_azimuth_spread = AngleSpread::Gaussian;
                t.aod_elevation_spread_deg = cal(2.5, 0.1);
                t.aod_elevation_spread = AngleSpread::Gaussian;
                t.mean_zoa_deg = cal(10.8, 2.0);
                t.sigma_zoa_deg = cal(5.3, 2.9);
                t.aoa_azimuth_spread_deg = cal(10.5, 7.3);
                t.aoa_azimuth_spread = AngleSpread::Gaussian;
                t.aoa_elevation_spread_deg = cal(11.5, 3.2);
                t.aoa_elevation_spread = AngleSpread::Laplacian;
            }
            (RMa, false) => {
                t.max_time_clusters = cal(1.0, 1.0).round();
                t.max_subpaths = cal(2.0, 2.0).round();
                t.mu_aod = cal(1.0, 1.0).round();
                t.mu_aoa = cal(1.0, 1.0).round();
                t.x_max = 0.5;
                t.mu_rho = 33.0;
                t.mu_tau = cal(83.0, 58.0);
                t.min_void_interval_ns = 25.0;
                t.sigma_cluster_db = cal(3.0, 4.68);
                t.cluster_gamma_ns = cal(51.0, 49.0);
                t.sigma_subpath_db = cal(6.0, 3.48);
                t.subpath_gamma_ns = cal(15.5, 20.0);
                t.mean_zod_deg = cal(-4.9, -1.6);
                t.sigma_zod_deg = cal(4.5, 0.5);
                t.aod_azimuth_spread_deg = cal(11.0, 5.0);
                t.aod_azimuth_spread = AngleSpread::Gaussian;
                t.aod_elevation_spread_deg = cal(3.0, 2.3);
                t.aod_elevation_spread = AngleSpread::Gaussian;
                t.mean_zoa_deg = cal(3.6, 1.6);
                t.sigma_zoa_deg = cal(4.8, 2.0);
                t.aoa_azimuth_spread_deg = cal(7.5, 7.5);
                t.aoa_azimuth_spread = AngleSpread::Gaussian;
                t.aoa_elevation_spread_deg = cal(6.0, 0.0);
                t.aoa_elevation_spread = AngleSpread::Laplacian;
            }
            (InH, true) => {
                t.mu_aod = cal(3.0, 2.0).round();
                t.mu_aoa = cal(3.0, 2.0).round();
                t.lambda_c = cal(3.6, 0.9);
                t.beta_s = cal(0.7, 1.0);
                t.mu_s = cal(3.7, 1.4);
                t.mu_rho = cal(3.4, 1.1);
                t.mu_tau = cal(17.3, 14.6);
                t.min_void_interval_ns = 6.0;
                t.sigma_cluster_db = cal(10.0, 9.0);
                t.cluster_gamma_ns = cal(20.7, 18.2);
                t.sigma_subpath_db = cal(5.0, 5.0);
                t.subpath_gamma_ns = cal(2.0, 2.0);
                t.mean_zod_deg = cal(-7.3, -6.8);
                t.sigma_zod_deg = cal(3.8, 4.9);
                t.aod_azimuth_spread_deg = cal(20.6, 4.8);
                t.aod_azimuth_spread = AngleSpread::Gaussian;
                t.aod_elevation_spread_deg = cal(15.7, 4.3);
                t.aod_elevation_spread = AngleSpread::Gaussian;
                t.mean_zoa_deg = cal(7.4, 7.4);
                t.sigma_zoa_deg = cal(3.8, 4.5);
                t.aoa_azimuth_spread_deg = cal(17.7, 4.7);
                t.aoa_azimuth_spread = AngleSpread::Gaussian;
                t.aoa_elevation_spread_deg = cal(14.4, 4.4);
                t.aoa_elevation_spread = AngleSpread::Gaussian;
            }
            (InH, false) => {
                t.mu_aod = cal(3.0, 3.0).round();
                t.mu_aoa = cal(3.0, 2.0).round();
                t.lambda_c = cal(5.1, 1.8);
                t.beta_s = cal(0.7, 1.0);
                t.mu_s = cal(5.3, 1.2);
                t.mu_rho = cal(22.7, 2.7);
                t.mu_tau = cal(10.9, 21.0);
                t.min_void_interval_ns = 6.0;
                t.sigma_cluster_db = cal(10.0, 10.0);
                t.cluster_gamma_ns = cal(23.6, 16.1);
                t.sigma_subpath_db = cal(6.0, 6.0);
                t.subpath_gamma_ns = cal(9.2, 2.4);
                t.mean_zod_deg = cal(-5.5, -2.5);
                t.sigma_zod_deg = cal(2.9, 2.7);
                t.aod_azimuth_spread_deg = cal(27.1, 4.8);
                t.aod_azimuth_spread = AngleSpread::Gaussian;
                t.aod_elevation_spread_deg = cal(16.2, 2.8);
                t.aod_elevation_spread = AngleSpread::Gaussian;
                t.mean_zoa_deg = cal(5.5, 4.8);
                t.sigma_zoa_deg = cal(2.9, 2.8);
                t.aoa_azimuth_spread_deg = cal(20.3, 6.6);
                t.aoa_azimuth_spread = AngleSpread::Gaussian;
                t.aoa_elevation_spread_deg = cal(15.0, 4.5);
                t.aoa_elevation_spread = AngleSpread::Gaussian;
            }
            (InF, true) => {
                t.mu_aod = 1.8;
                t.mu_aoa = 1.9;
                t.lambda_c = 2.4;
                t.beta_s = 1.0;
                t.mu_s = 2.6;
                t.alpha_tau = 0.7;
                t.beta_tau = 26.9;
                t.alpha_rho = 1.2;
                t.beta_rho = 16.3;
                t.min_void_interval_ns = 8.0;
                t.sigma_cluster_db = 10.0;
                t.cluster_gamma_ns = 16.2;
                t.sigma_subpath_db = 13.0;
                t.subpath_gamma_ns = 4.7;
                t.mean_zod_deg = -4.0;
                t.sigma_zod_deg = 4.3;
                t.aod_azimuth_spread_deg = 6.7;
                t.aod_azimuth_spread = AngleSpread::Laplacian;
                t.aod_elevation_spread_deg = 3.0;
                t.aod_elevation_spread = AngleSpread::Gaussian;
                t.mean_zoa_deg = 4.0;
                t.sigma_zoa_deg = 4.3;
                t.aoa_azimuth_spread_deg = 11.7;
                t.aoa_azimuth_spread = AngleSpread::Laplacian;
                t.aoa_elevation_spread_deg = 2.3;
                t.aoa_elevation_spread = AngleSpread::Gaussian;
            }
            (InF, false) => {
                t.mu_aod = 1.8;
                t.mu_aoa = 2.5;
                t.lambda_c = 2.0;
                t.beta_s = 1.0;
                t.mu_s = 7.0;
                t.alpha_tau = 0.8;
                t.beta_tau = 13.9;
                t.alpha_rho = 1.6;
                t.beta_rho = 9.0;
                t.min_void_interval_ns = 8.0;
                t.sigma_cluster_db = 6.0;
                t.cluster_gamma_ns = 18.7;
                t.sigma_subpath_db = 11.0;
                t.subpath_gamma_ns = 7.3;
                t.mean_zod_deg = -3.0;
                t.sigma_zod_deg = 3.5;
                t.aod_azimuth_spread_deg = 9.3;
                t.aod_azimuth_spread = AngleSpread::Laplacian;
                t.aod_elevation_spread_deg = 4.5;
                t.aod_elevation_spread = AngleSpread::Gaussian;
                t.mean_zoa_deg = 3.0;
                t.sigma_zoa_deg = 3.5;
                t.aoa_azimuth_spread_deg = 14.1;
                t.aoa_azimuth_spread = AngleSpread::Laplacian;
                t.aoa_elevation_spread_deg = 3.2;
                t.aoa_elevation_spread = AngleSpread::Gaussian;
            }
        }
        t
    }
}

/// One retained multipath component: the row format of the assembled power
/// spectrum. Angles are in the model's local measurement convention (azimuth
/// from the y axis, elevation from the horizontal plane), degrees.
#[derive(Debug, Clone, PartialEq)]
pub struct Subpath {
    pub delay_ns: f64,
    /// Linear power share (all retained subpaths of a pair sum to <= 1).
    pub power: f64,
    /// Co-polarized (VV) phase, radians.
    pub phase: f64,
    pub aod_az_deg: f64,
    pub zod_deg: f64,
    pub aoa_az_deg: f64,
    pub zoa_deg: f64,
    pub aod_lobe: u32,
    pub aoa_lobe: u32,
}

/// Per-subpath cross-polarization discrimination triple, dB.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Xpd {
    pub hh_db: f64,
    pub vh_db: f64,
    pub hv_db: f64,
}

/// Retained-subpath angles converted to the global coordinate convention,
/// radians.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RayAngles {
    pub aoa: Vec<f64>,
    pub zoa: Vec<f64>,
    pub aod: Vec<f64>,
    pub zod: Vec<f64>,
}

/// The full stochastic multipath description of one node pair.
///
/// Immutable once generated; the owning cache replaces whole records on
/// regeneration. `node_pair` records the direction the record was generated
/// in so consumers can detect a reversed request and swap departure/arrival
/// roles.
#[derive(Debug, Clone)]
pub struct ChannelParams {
    pub generated_at_s: f64,
    pub node_pair: (u32, u32),
    /// Snapshot of the condition this record was generated under.
    pub condition: ChannelCondition,

    pub num_time_clusters: usize,
    pub num_aod_lobes: usize,
    pub num_aoa_lobes: usize,
    pub subpaths_per_cluster: Vec<usize>,
    /// Intra-cluster subpath delays, ns, sorted ascending with minimum 0.
    pub intra_cluster_delays_ns: Vec<Vec<f64>>,
    /// Cluster excess delays, ns, sorted ascending with first cluster at 0.
    pub cluster_excess_delays_ns: Vec<f64>,
    /// Normalized cluster powers (sum to 1).
    pub cluster_powers: Vec<f64>,
    /// Subpath powers per cluster (sum to the cluster's power).
    pub subpath_powers: Vec<Vec<f64>>,
    /// Four polarization phases (VV, VH, HV, HH) per raw subpath, radians.
    pub subpath_phases: Vec<[f64; 4]>,

    /// Retained rows after bandwidth merging and weak-subpath pruning.
    pub spectrum: Vec<Subpath>,
    /// One XPD triple per retained subpath.
    pub xpd_db: Vec<Xpd>,
    /// Retained-subpath angles in the global convention, radians.
    pub angles: RayAngles,
    /// Retained-subpath absolute delays, ns.
    pub delays_ns: Vec<f64>,
}

impl ChannelParams {
    /// Number of subpaths surviving merge and pruning.
    pub fn total_subpaths(&self) -> usize {
        self.spectrum.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{ChannelCondition, LosState, O2iState};
    use crate::config::Scenario;

    fn cond(los: bool) -> ChannelCondition {
        ChannelCondition {
            los: if los { LosState::Los } else { LosState::Nlos },
            o2i: O2iState::Outdoor,
            generated_at_s: 0.0,
        }
    }

    #[test]
    fn test_calibrated_exact_at_lower_point() {
        assert_eq!(calibrated(6.0, 5.0, 28.0), 6.0);
        assert_eq!(calibrated(6.0, 5.0, 10.0), 6.0);
        assert_eq!(calibrated(-12.6, -3.2, 0.5), -12.6);
    }

    #[test]
    fn test_calibrated_exact_at_upper_point() {
        assert_eq!(calibrated(6.0, 5.0, 140.0), 5.0);
        assert_eq!(calibrated(6.0, 5.0, 150.0), 5.0);
    }

    #[test]
    fn test_calibrated_interpolates_between() {
        // Midpoint of the calibration range
        let mid = calibrated(0.0, 112.0, 84.0);
        assert!((mid - 56.0).abs() < 1e-9, "midpoint interpolation {mid}");
        // Continuity at the edges
        assert!((calibrated(6.0, 5.0, 28.0 + 1e-9) - 6.0).abs() < 1e-6);
        assert!((calibrated(6.0, 5.0, 140.0 - 1e-9) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_xpd_depends_on_condition_not_scenario() {
        let f = 28.0e9;
        let los_umi = ParamsTable::for_condition(Scenario::UMi, &cond(true), f);
        let los_inf = ParamsTable::for_condition(Scenario::InF, &cond(true), f);
        assert_eq!(los_umi.xpd_mean_db, los_inf.xpd_mean_db);
        assert!((los_umi.xpd_mean_db - (11.5 + 2.8)).abs() < 1e-9);

        let nlos = ParamsTable::for_condition(Scenario::UMi, &cond(false), f);
        assert!((nlos.xpd_mean_db - (5.5 + 28.0 * 0.13)).abs() < 1e-9);
        assert_eq!(nlos.xpd_sd_db, 1.6);
    }

    #[test]
    fn test_umi_and_uma_share_los_table() {
        let f = 73.0e9;
        let umi = ParamsTable::for_condition(Scenario::UMi, &cond(true), f);
        let uma = ParamsTable::for_condition(Scenario::UMa, &cond(true), f);
        assert_eq!(umi.mu_tau, uma.mu_tau);
        assert_eq!(umi.cluster_gamma_ns, uma.cluster_gamma_ns);
        assert_eq!(umi.max_time_clusters, uma.max_time_clusters);
    }

    #[test]
    fn test_rma_is_single_lobe_single_cluster() {
        for los in [true, false] {
            let t = ParamsTable::for_condition(Scenario::RMa, &cond(los), 60.0e9);
            assert_eq!(t.max_time_clusters, 1.0);
            assert_eq!(t.max_subpaths, 2.0);
            assert_eq!(t.mu_aod, 1.0);
            assert_eq!(t.mu_aoa, 1.0);
        }
    }

    #[test]
    fn test_inf_uses_gamma_delay_laws() {
        let t = ParamsTable::for_condition(Scenario::InF, &cond(false), 28.0e9);
        assert!(t.alpha_rho > 0.0 && t.beta_rho > 0.0);
        assert!(t.alpha_tau > 0.0 && t.beta_tau > 0.0);
        assert_eq!(t.aoa_azimuth_spread, AngleSpread::Laplacian);
        assert_eq!(t.aoa_elevation_spread, AngleSpread::Gaussian);
        assert!(!t.los);
    }

    #[test]
    fn test_los_flag_tracks_condition() {
        // The flag feeding the LOS power swap and alignment comes from the
        // resolved condition for every scenario.
        for scenario in [
            Scenario::RMa,
            Scenario::UMa,
            Scenario::UMi,
            Scenario::InH,
            Scenario::InF,
        ] {
            assert!(ParamsTable::for_condition(scenario, &cond(true), 28.0e9).los);
            assert!(!ParamsTable::for_condition(scenario, &cond(false), 28.0e9).los);
        }
    }

    #[test]
    fn test_outdoor_tables_interpolate_with_frequency() {
        let lo = ParamsTable::for_condition(Scenario::UMi, &cond(true), 28.0e9);
        let hi = ParamsTable::for_condition(Scenario::UMi, &cond(true), 140.0e9);
        let mid = ParamsTable::for_condition(Scenario::UMi, &cond(true), 84.0e9);
        assert_eq!(lo.mu_tau, 123.0);
        assert_eq!(hi.mu_tau, 80.0);
        assert!(mid.mu_tau < lo.mu_tau && mid.mu_tau > hi.mu_tau);
    }
}
