//! The stochastic channel model: per-pair parameter generation and per
//! antenna-pair matrix synthesis, with lazily regenerated caches.
//!
//! Generation runs a fixed pipeline per node pair: cluster/lobe counts,
//! subpath counts, intra-cluster delays, polarization phases, cluster excess
//! delays, cluster and subpath powers, absolute propagation times, lobe
//! mapping and angles, power-spectrum assembly, bandwidth-resolution merging,
//! LOS alignment, weak-subpath pruning, XPD assignment and coordinate
//! conversion. Every random draw comes from the model's named streams, so a
//! run is reproducible from its assigned stream number alone.

use std::collections::HashMap;

use tracing::debug;

use crate::antenna::AntennaArray;
use crate::condition::{pair_key, ChannelCondition, ConditionModel};
use crate::config::{ChannelConfig, ChannelError, Scenario};
use crate::geometry::{wrap_to_360, Node};
use crate::matrix::{self, ChannelMatrix};
use crate::params::{AngleSpread, ChannelParams, ParamsTable, RayAngles, Subpath, Xpd};
use crate::rng::RandomStreams;
use num_complex::Complex64;
use std::f64::consts::PI;

const SPEED_OF_LIGHT: f64 = 3.0e8;

/// Azimuth/elevation draw for one subpath, tagged with its spatial lobe.
struct LobeAngle {
    lobe: u32,
    azimuth_deg: f64,
    elevation_deg: f64,
}

/// Channel model with per-node-pair parameter cache and per-antenna-pair
/// matrix cache. Owns the condition resolver.
pub struct ChannelModel {
    config: ChannelConfig,
    condition_model: ConditionModel,
    streams: RandomStreams,
    params_cache: HashMap<u64, ChannelParams>,
    matrix_cache: HashMap<u64, ChannelMatrix>,
}

impl ChannelModel {
    /// Stream seeds consumed by the model and its condition resolver.
    pub const STREAMS_CONSUMED: u64 =
        ConditionModel::STREAMS_CONSUMED + RandomStreams::STREAMS_CONSUMED;

    /// Build a model for one simulation run. Frequency and bandwidth are
    /// validated here, before anything can be generated.
    pub fn new(config: ChannelConfig, stream: u64) -> Result<Self, ChannelError> {
        config.validate()?;
        Ok(Self {
            condition_model: ConditionModel::new(
                config.scenario,
                config.update_period_s,
                stream,
            ),
            streams: RandomStreams::assign(stream + ConditionModel::STREAMS_CONSUMED),
            config,
            params_cache: HashMap::new(),
            matrix_cache: HashMap::new(),
        })
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Resolve the LOS/NLOS condition for a node pair.
    pub fn condition(&mut self, a: &Node, b: &Node, now_s: f64) -> ChannelCondition {
        self.condition_model.condition(a, b, now_s)
    }

    /// The cached channel parameters for a node pair, if any have been
    /// generated. Querying an unseen pair is not an error.
    pub fn params(&self, a: &Node, b: &Node) -> Option<&ChannelParams> {
        self.params_cache.get(&pair_key(a.id, b.id))
    }

    /// The channel matrix for an antenna pair, regenerating parameters and
    /// matrix as needed.
    pub fn channel(
        &mut self,
        a: &Node,
        b: &Node,
        a_array: &AntennaArray,
        b_array: &AntennaArray,
        now_s: f64,
    ) -> &ChannelMatrix {
        self.channel_and_params(a, b, a_array, b_array, now_s).0
    }

    /// Like [`channel`](Self::channel) but also returns the parameter record
    /// the matrix was built from.
    pub fn channel_and_params(
        &mut self,
        a: &Node,
        b: &Node,
        a_array: &AntennaArray,
        b_array: &AntennaArray,
        now_s: f64,
    ) -> (&ChannelMatrix, &ChannelParams) {
        let params_key = pair_key(a.id, b.id);
        let matrix_key = pair_key(a_array.id(), b_array.id());

        let condition = self.condition_model.condition(a, b, now_s);
        let table =
            ParamsTable::for_condition(self.config.scenario, &condition, self.config.frequency_hz);

        let regen_params = match self.params_cache.get(&params_key) {
            Some(p) => self.params_need_update(p, &condition, now_s),
            None => true,
        };
        if regen_params {
            let params = self.generate_channel_params(&condition, &table, a, b, now_s);
            debug!(
                pair = ?params.node_pair,
                subpaths = params.total_subpaths(),
                los = condition.is_los(),
                "channel parameters (re)generated"
            );
            self.params_cache.insert(params_key, params);
        }

        let params = self
            .params_cache
            .get(&params_key)
            .expect("just generated or cached");

        let regen_matrix = match self.matrix_cache.get(&matrix_key) {
            Some(m) => params.generated_at_s > m.generated_at_s,
            None => true,
        };
        if regen_matrix {
            // Flip departure/arrival roles when the cached record was
            // generated in the opposite direction.
            let same_direction = params.node_pair == (a.id, b.id);
            let rays = if same_direction {
                params.angles.clone()
            } else {
                RayAngles {
                    aoa: params.angles.aod.clone(),
                    zoa: params.angles.zod.clone(),
                    aod: params.angles.aoa.clone(),
                    zod: params.angles.zoa.clone(),
                }
            };
            let m = matrix::build(params, table.los, a, b, a_array, b_array, &rays, now_s);
            debug!(
                antenna_pair = ?m.antenna_pair,
                dims = ?(m.tensor.rows(), m.tensor.cols(), m.tensor.pages()),
                "channel matrix rebuilt"
            );
            self.matrix_cache.insert(matrix_key, m);
        }

        (
            self.matrix_cache.get(&matrix_key).expect("just built"),
            params,
        )
    }

    fn params_need_update(
        &self,
        params: &ChannelParams,
        condition: &ChannelCondition,
        now_s: f64,
    ) -> bool {
        if params.condition.los != condition.los || params.condition.o2i != condition.o2i {
            return true;
        }
        self.config.update_period_s > 0.0
            && now_s - params.generated_at_s > self.config.update_period_s
    }

    // ------------------------------------------------------------------
    // Generation pipeline
    // ------------------------------------------------------------------

    fn generate_channel_params(
        &mut self,
        condition: &ChannelCondition,
        table: &ParamsTable,
        a: &Node,
        b: &Node,
        now_s: f64,
    ) -> ChannelParams {
        let distance_2d = a.position.distance_2d(&b.position);
        // Measurement dynamic range below the strongest subpath.
        let dynamic_range_db = if distance_2d <= 500.0 { 190.0 } else { 220.0 };

        let drawn_clusters = self.number_of_time_clusters(table);
        let num_aod_lobes = self.number_of_spatial_lobes(table.mu_aod);
        let num_aoa_lobes = self.number_of_spatial_lobes(table.mu_aoa);
        let subpaths_per_cluster = self.subpaths_per_cluster(drawn_clusters, table);
        // The subpath vector is authoritative: a single-cluster indoor draw
        // is promoted to two clusters.
        let num_time_clusters = subpaths_per_cluster.len();
        let total_raw: usize = subpaths_per_cluster.iter().sum();

        let intra_cluster_delays = self.intra_cluster_delays(&subpaths_per_cluster, table);
        let subpath_phases = self.subpath_phases(total_raw);
        let cluster_excess_delays = self.cluster_excess_delays(&intra_cluster_delays, table);
        let cluster_powers = self.cluster_powers(&cluster_excess_delays, table);
        let subpath_powers =
            self.subpath_powers(&intra_cluster_delays, &cluster_powers, table);
        let absolute_delays =
            absolute_propagation_times(distance_2d, &cluster_excess_delays, &intra_cluster_delays);

        let aod_angles = self.subpath_lobe_angles(
            num_aod_lobes,
            &subpaths_per_cluster,
            table.mean_zod_deg,
            table.sigma_zod_deg,
            table.aod_azimuth_spread_deg,
            table.aod_azimuth_spread,
            table.aod_elevation_spread_deg,
            table.aod_elevation_spread,
        );
        let aoa_angles = self.subpath_lobe_angles(
            num_aoa_lobes,
            &subpaths_per_cluster,
            table.mean_zoa_deg,
            table.sigma_zoa_deg,
            table.aoa_azimuth_spread_deg,
            table.aoa_azimuth_spread,
            table.aoa_elevation_spread_deg,
            table.aoa_elevation_spread,
        );

        let raw_spectrum = assemble_power_spectrum(
            &subpaths_per_cluster,
            &absolute_delays,
            &subpath_powers,
            &subpath_phases,
            &aod_angles,
            &aoa_angles,
        );

        let mut spectrum = merge_by_bandwidth(raw_spectrum, self.config.rf_bandwidth_hz);
        if table.los {
            align_los(&mut spectrum);
        }
        let spectrum = prune_weak(spectrum, dynamic_range_db);
        debug!(
            raw = total_raw,
            retained = spectrum.len(),
            "subpaths after bandwidth merge and pruning"
        );

        let xpd_db = self.xpd_per_subpath(spectrum.len(), table);
        let angles = to_global_coordinates(&spectrum);
        let delays_ns = spectrum.iter().map(|s| s.delay_ns).collect();

        ChannelParams {
            generated_at_s: now_s,
            node_pair: (a.id, b.id),
            condition: *condition,
            num_time_clusters,
            num_aod_lobes,
            num_aoa_lobes,
            subpaths_per_cluster,
            intra_cluster_delays_ns: intra_cluster_delays,
            cluster_excess_delays_ns: cluster_excess_delays,
            cluster_powers,
            subpath_powers,
            subpath_phases,
            spectrum,
            xpd_db,
            angles,
            delays_ns,
        }
    }

    /// Step 1a: number of time clusters.
    fn number_of_time_clusters(&mut self, table: &ParamsTable) -> usize {
        if self.config.scenario.is_indoor() {
            self.streams.poisson(table.lambda_c) as usize + 1
        } else {
            self.streams
                .discrete_uniform(1, table.max_time_clusters as u32) as usize
        }
    }

    /// Step 1b: number of spatial lobes for one side.
    fn number_of_spatial_lobes(&mut self, mu: f64) -> usize {
        match self.config.scenario {
            Scenario::InH => self.streams.discrete_uniform(1, mu as u32) as usize,
            Scenario::InF => self.streams.poisson(mu) as usize + 1,
            Scenario::RMa => 1,
            Scenario::UMi | Scenario::UMa => (self.streams.poisson(mu) as usize).clamp(1, 5),
        }
    }

    fn exponential_subpath_count(&mut self, mu_s: f64) -> usize {
        self.streams.exponential(mu_s).round() as usize + 1
    }

    /// Step 1c: subpaths in each time cluster.
    fn subpaths_per_cluster(&mut self, drawn_clusters: usize, table: &ParamsTable) -> Vec<usize> {
        let freq_ghz = self.config.frequency_hz / 1e9;
        let mut counts = Vec::with_capacity(drawn_clusters + 1);

        if self.config.scenario.is_indoor() {
            for _ in 0..drawn_clusters {
                let multi = drawn_clusters == 1 || self.streams.bernoulli(table.beta_s);
                counts.push(if multi {
                    self.exponential_subpath_count(table.mu_s)
                } else {
                    1
                });
            }
            // A single-cluster indoor draw always carries a second cluster.
            if drawn_clusters == 1 {
                counts.push(self.exponential_subpath_count(table.mu_s));
            }
        } else if freq_ghz < 100.0 || self.config.scenario == Scenario::RMa {
            for _ in 0..drawn_clusters {
                counts
                    .push(self.streams.discrete_uniform(1, table.max_subpaths as u32) as usize);
            }
        } else {
            for _ in 0..drawn_clusters {
                counts.push(self.exponential_subpath_count(table.mu_s));
            }
        }
        counts
    }

    /// Step 2: intra-cluster subpath delays (ns), zero-based and sorted per
    /// cluster.
    fn intra_cluster_delays(
        &mut self,
        subpaths_per_cluster: &[usize],
        table: &ParamsTable,
    ) -> Vec<Vec<f64>> {
        let freq_ghz = self.config.frequency_hz / 1e9;
        let scenario = self.config.scenario;
        let mut clusters = Vec::with_capacity(subpaths_per_cluster.len());

        for &count in subpaths_per_cluster {
            let mut delays = Vec::with_capacity(count);
            for j in 0..count {
                let delay = match scenario {
                    Scenario::InH => self.streams.exponential(table.mu_rho),
                    Scenario::InF => self.streams.gamma(table.alpha_rho, table.beta_rho),
                    _ if freq_ghz < 100.0 => {
                        // Below 100 GHz outdoor subpaths sit on the delay
                        // resolution grid of the sounder bandwidth.
                        (2.0 / self.config.rf_bandwidth_hz) * 1e9 * (j + 1) as f64
                    }
                    _ => self.streams.exponential(table.mu_rho),
                };
                delays.push(delay);
            }

            let min = delays.iter().cloned().fold(f64::INFINITY, f64::min);
            for d in &mut delays {
                *d -= min;
            }
            delays.sort_by(|x, y| x.partial_cmp(y).unwrap());

            if !scenario.is_indoor() && freq_ghz < 100.0 {
                let x = table.x_max * self.streams.uniform();
                for d in &mut delays {
                    *d = d.powf(1.0 + x);
                }
            }
            clusters.push(delays);
        }
        clusters
    }

    /// Step 3: four polarization phases per subpath, uniform over the full
    /// circle.
    fn subpath_phases(&mut self, total_subpaths: usize) -> Vec<[f64; 4]> {
        (0..total_subpaths)
            .map(|_| {
                let mut phases = [0.0; 4];
                for p in &mut phases {
                    *p = self.streams.uniform_range(-PI, PI);
                }
                phases
            })
            .collect()
    }

    /// Step 4: cluster excess delays (ns); first cluster at 0, each
    /// successor past the previous cluster's last subpath plus the void
    /// interval.
    fn cluster_excess_delays(
        &mut self,
        intra_cluster_delays: &[Vec<f64>],
        table: &ParamsTable,
    ) -> Vec<f64> {
        let num_clusters = intra_cluster_delays.len();
        let mut prime = Vec::with_capacity(num_clusters);
        for _ in 0..num_clusters {
            let d = if self.config.scenario == Scenario::InF {
                self.streams.gamma(table.alpha_tau, table.beta_tau)
            } else {
                self.streams.exponential(table.mu_tau)
            };
            prime.push(d);
        }
        let min = prime.iter().cloned().fold(f64::INFINITY, f64::min);
        for d in &mut prime {
            *d -= min;
        }
        prime.sort_by(|x, y| x.partial_cmp(y).unwrap());

        let mut tau = vec![0.0];
        let mut last_subpath = intra_cluster_delays[0].last().copied().unwrap_or(0.0);
        for i in 1..num_clusters {
            let delay = prime[i] + last_subpath + table.min_void_interval_ns;
            tau.push(delay);
            last_subpath = delay + intra_cluster_delays[i].last().copied().unwrap_or(0.0);
        }
        tau
    }

    /// Step 5: shadowed exponential cluster powers, normalized to sum to 1.
    fn cluster_powers(&mut self, cluster_excess_delays: &[f64], table: &ParamsTable) -> Vec<f64> {
        let raw: Vec<f64> = cluster_excess_delays
            .iter()
            .map(|&tau| {
                let shadowing = table.sigma_cluster_db * self.streams.standard_normal();
                (-tau / table.cluster_gamma_ns).exp() * 10f64.powf(shadowing / 10.0)
            })
            .collect();
        let sum: f64 = raw.iter().sum();
        raw.iter().map(|p| p / sum).collect()
    }

    /// Step 6: shadowed exponential subpath powers, normalized to each
    /// cluster's share. Under LOS the first subpath of the first cluster is
    /// swapped to carry that cluster's maximum.
    fn subpath_powers(
        &mut self,
        intra_cluster_delays: &[Vec<f64>],
        cluster_powers: &[f64],
        table: &ParamsTable,
    ) -> Vec<Vec<f64>> {
        let mut powers = Vec::with_capacity(intra_cluster_delays.len());
        for (i, delays) in intra_cluster_delays.iter().enumerate() {
            let mut raw: Vec<f64> = delays
                .iter()
                .map(|&rho| {
                    let shadowing = table.sigma_subpath_db * self.streams.standard_normal();
                    (-rho / table.subpath_gamma_ns).exp() * 10f64.powf(shadowing / 10.0)
                })
                .collect();

            if i == 0 && table.los {
                let strongest = raw
                    .iter()
                    .enumerate()
                    .max_by(|x, y| x.1.partial_cmp(y.1).unwrap())
                    .map(|(idx, _)| idx)
                    .unwrap();
                raw.swap(0, strongest);
            }

            let sum: f64 = raw.iter().sum();
            powers.push(raw.iter().map(|p| p / sum * cluster_powers[i]).collect());
        }
        powers
    }

    /// Step 8: lobe means and per-subpath angle draws for one side
    /// (departure or arrival).
    #[allow(clippy::too_many_arguments)]
    fn subpath_lobe_angles(
        &mut self,
        num_lobes: usize,
        subpaths_per_cluster: &[usize],
        mean_elevation_deg: f64,
        sigma_elevation_deg: f64,
        azimuth_spread_deg: f64,
        azimuth_spread: AngleSpread,
        elevation_spread_deg: f64,
        elevation_spread: AngleSpread,
    ) -> Vec<LobeAngle> {
        // Equal azimuth sector per lobe; lobe means drawn once.
        let mut lobe_mean_azimuth = Vec::with_capacity(num_lobes);
        let mut lobe_mean_elevation = Vec::with_capacity(num_lobes);
        for lobe in 0..num_lobes {
            let az_min = 360.0 * lobe as f64 / num_lobes as f64;
            let az_max = 360.0 * (lobe + 1) as f64 / num_lobes as f64;
            lobe_mean_elevation
                .push(mean_elevation_deg + sigma_elevation_deg * self.streams.standard_normal());
            lobe_mean_azimuth.push(az_min + (az_max - az_min) * self.streams.uniform());
        }

        let total: usize = subpaths_per_cluster.iter().sum();
        let mut out = Vec::with_capacity(total);
        for &count in subpaths_per_cluster {
            for _ in 0..count {
                let lobe = self.streams.discrete_uniform(1, num_lobes as u32);
                let mean_az = lobe_mean_azimuth[(lobe - 1) as usize];
                let mean_el = lobe_mean_elevation[(lobe - 1) as usize];
                let delta_az = self.angular_offset(azimuth_spread_deg, azimuth_spread);
                let delta_el = self.angular_offset(elevation_spread_deg, elevation_spread);
                out.push(LobeAngle {
                    lobe,
                    azimuth_deg: wrap_to_360(mean_az + delta_az),
                    elevation_deg: (mean_el + delta_el).clamp(-60.0, 60.0),
                });
            }
        }
        out
    }

    fn angular_offset(&mut self, spread_deg: f64, spread: AngleSpread) -> f64 {
        match spread {
            AngleSpread::Gaussian => spread_deg * self.streams.standard_normal(),
            AngleSpread::Laplacian => {
                let z = self.streams.uniform() - 0.5;
                let b = spread_deg / 2.0f64.sqrt();
                -b * z.signum() * (1.0 - 2.0 * z.abs()).ln()
            }
        }
    }

    /// Step 12: one XPD triple per retained subpath, dB.
    fn xpd_per_subpath(&mut self, total_subpaths: usize, table: &ParamsTable) -> Vec<Xpd> {
        (0..total_subpaths)
            .map(|_| Xpd {
                hh_db: self.streams.standard_normal() * table.xpd_sd_db,
                vh_db: table.xpd_mean_db,
                hv_db: table.xpd_mean_db + self.streams.standard_normal() * table.xpd_sd_db,
            })
            .collect()
    }
}

/// Step 7: absolute propagation time of every subpath (ns).
fn absolute_propagation_times(
    distance_2d: f64,
    cluster_excess_delays: &[f64],
    intra_cluster_delays: &[Vec<f64>],
) -> Vec<Vec<f64>> {
    let propagation_ns = distance_2d / SPEED_OF_LIGHT * 1e9;
    intra_cluster_delays
        .iter()
        .zip(cluster_excess_delays)
        .map(|(delays, &tau)| delays.iter().map(|&rho| propagation_ns + tau + rho).collect())
        .collect()
}

/// Step 9: one spectrum row per subpath, in cluster-major (ascending delay)
/// order.
fn assemble_power_spectrum(
    subpaths_per_cluster: &[usize],
    absolute_delays: &[Vec<f64>],
    subpath_powers: &[Vec<f64>],
    subpath_phases: &[[f64; 4]],
    aod_angles: &[LobeAngle],
    aoa_angles: &[LobeAngle],
) -> Vec<Subpath> {
    let mut rows = Vec::with_capacity(subpath_phases.len());
    let mut n = 0;
    for (i, &count) in subpaths_per_cluster.iter().enumerate() {
        for j in 0..count {
            rows.push(Subpath {
                delay_ns: absolute_delays[i][j],
                power: subpath_powers[i][j],
                phase: subpath_phases[n][0],
                aod_az_deg: aod_angles[n].azimuth_deg,
                zod_deg: aod_angles[n].elevation_deg,
                aoa_az_deg: aoa_angles[n].azimuth_deg,
                zoa_deg: aoa_angles[n].elevation_deg,
                aod_lobe: aod_angles[n].lobe,
                aoa_lobe: aoa_angles[n].lobe,
            });
            n += 1;
        }
    }
    rows
}

/// Step 10a: merge subpaths closer than the delay resolution `2/B` into one
/// representative row by coherent amplitude summation.
fn merge_by_bandwidth(rows: Vec<Subpath>, rf_bandwidth_hz: f64) -> Vec<Subpath> {
    let resolution_ns = (2.0 / rf_bandwidth_hz) * 1e9;
    let mut merged = Vec::with_capacity(rows.len());
    let mut i = 0;
    while i < rows.len() {
        let boundary = rows[i].delay_ns + resolution_ns;
        let mut sum = Complex64::new(0.0, 0.0);
        let mut j = i;
        while j < rows.len() && rows[j].delay_ns <= boundary {
            sum += Complex64::from_polar(rows[j].power.sqrt(), rows[j].phase);
            j += 1;
        }
        let mut representative = rows[i].clone();
        representative.power = sum.norm_sqr();
        merged.push(representative);
        i = j;
    }
    merged
}

/// Step 11: under LOS, rotate every arrival angle so the first subpath's
/// AoA is the exact reverse bearing of its AoD and its ZoA mirrors the ZoD;
/// ZoA is folded back into [-90, 90] degrees.
fn align_los(rows: &mut [Subpath]) {
    if rows.is_empty() {
        return;
    }
    let aod0 = rows[0].aod_az_deg;
    let reverse_bearing = if aod0 - 180.0 > 0.0 {
        aod0 - 180.0
    } else {
        aod0 + 180.0
    };
    let azimuth_offset = rows[0].aoa_az_deg - reverse_bearing;
    for row in rows.iter_mut() {
        row.aoa_az_deg = wrap_to_360(row.aoa_az_deg - azimuth_offset);
    }

    let mirrored_zoa = -rows[0].zod_deg;
    let elevation_offset = rows[0].zoa_deg - mirrored_zoa;
    for row in rows.iter_mut() {
        row.zoa_deg -= elevation_offset;
        if row.zoa_deg > 90.0 {
            row.zoa_deg = 180.0 - row.zoa_deg;
        } else if row.zoa_deg < -90.0 {
            row.zoa_deg = -180.0 - row.zoa_deg;
        }
    }
}

/// Step 10b: discard subpaths more than the dynamic range below the
/// strongest one. The strongest subpath always survives.
fn prune_weak(rows: Vec<Subpath>, dynamic_range_db: f64) -> Vec<Subpath> {
    let max_power = rows.iter().map(|r| r.power).fold(0.0, f64::max);
    let threshold_db = 10.0 * max_power.log10() - dynamic_range_db;
    rows.into_iter()
        .filter(|r| 10.0 * r.power.log10() > threshold_db)
        .collect()
}

/// Step 13: convert local measurement angles (azimuth from y, elevation from
/// the horizontal plane) to the global convention (azimuth from x, zenith
/// from z), in radians.
fn to_global_coordinates(rows: &[Subpath]) -> RayAngles {
    RayAngles {
        aoa: rows
            .iter()
            .map(|r| wrap_to_360(90.0 - r.aoa_az_deg).to_radians())
            .collect(),
        zoa: rows.iter().map(|r| (90.0 - r.zoa_deg).to_radians()).collect(),
        aod: rows
            .iter()
            .map(|r| wrap_to_360(90.0 - r.aod_az_deg).to_radians())
            .collect(),
        zod: rows.iter().map(|r| (90.0 - r.zod_deg).to_radians()).collect(),
    }
}
