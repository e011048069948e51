//! Channel matrix synthesis: one complex coefficient per
//! (rx element, tx element, subpath) triple.

use num_complex::Complex64;

use crate::antenna::AntennaArray;
use crate::geometry::{Angles, Node};
use crate::params::{ChannelParams, RayAngles};

/// Dense complex tensor indexed [row][col][page] =
/// [rx element][tx element][subpath].
#[derive(Debug, Clone, PartialEq)]
pub struct Complex3D {
    rows: usize,
    cols: usize,
    pages: usize,
    data: Vec<Complex64>,
}

impl Complex3D {
    pub fn new(rows: usize, cols: usize, pages: usize) -> Self {
        Self {
            rows,
            cols,
            pages,
            data: vec![Complex64::new(0.0, 0.0); rows * cols * pages],
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn pages(&self) -> usize {
        self.pages
    }

    #[inline]
    fn index(&self, row: usize, col: usize, page: usize) -> usize {
        debug_assert!(row < self.rows && col < self.cols && page < self.pages);
        page * self.rows * self.cols + row * self.cols + col
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize, page: usize) -> Complex64 {
        self.data[self.index(row, col, page)]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, page: usize, value: Complex64) {
        let i = self.index(row, col, page);
        self.data[i] = value;
    }

    /// Project the tensor onto beamforming vectors: for each page `n`,
    /// `sum_r sum_c u_w[r] * H[r][c][n] * s_w[c]`.
    pub fn project(&self, u_w: &[Complex64], s_w: &[Complex64]) -> Vec<Complex64> {
        assert_eq!(u_w.len(), self.rows, "rx beamforming vector length mismatch");
        assert_eq!(s_w.len(), self.cols, "tx beamforming vector length mismatch");
        let mut out = Vec::with_capacity(self.pages);
        for page in 0..self.pages {
            let mut acc = Complex64::new(0.0, 0.0);
            for row in 0..self.rows {
                for col in 0..self.cols {
                    acc += u_w[row] * self.get(row, col, page) * s_w[col];
                }
            }
            out.push(acc);
        }
        out
    }
}

/// The synthesized channel for one antenna pair.
///
/// `node_pair` and `antenna_pair` record the direction of generation so a
/// request in the reverse direction can swap departure/arrival roles instead
/// of regenerating.
#[derive(Debug, Clone)]
pub struct ChannelMatrix {
    pub tensor: Complex3D,
    pub generated_at_s: f64,
    pub node_pair: (u32, u32),
    pub antenna_pair: (u32, u32),
}

impl ChannelMatrix {
    /// Whether a request for antenna pair (a, b) runs against the direction
    /// this matrix was generated in.
    pub fn is_reverse(&self, a_antenna_id: u32, b_antenna_id: u32) -> bool {
        if self.antenna_pair == (a_antenna_id, b_antenna_id) {
            false
        } else if self.antenna_pair == (b_antenna_id, a_antenna_id) {
            true
        } else {
            panic!(
                "antenna pair ({a_antenna_id}, {b_antenna_id}) does not match matrix pair {:?}",
                self.antenna_pair
            );
        }
    }
}

fn db_to_pow(db: f64) -> f64 {
    10.0f64.powf(db * 0.10)
}

/// Synthesize the coefficient tensor for the (s -> u) antenna pair.
///
/// `rays` must already be ordered for this direction (swapped by the caller
/// if the parameter record was generated the other way round). Under LOS the
/// first subpath ignores its generated angles and uses the exact geometric
/// bearing between the endpoints for both steering and field patterns.
#[allow(clippy::too_many_arguments)]
pub fn build(
    params: &ChannelParams,
    los: bool,
    s_node: &Node,
    u_node: &Node,
    s_array: &AntennaArray,
    u_array: &AntennaArray,
    rays: &RayAngles,
    now_s: f64,
) -> ChannelMatrix {
    let u_size = u_array.num_elements();
    let s_size = s_array.num_elements();
    let total = params.total_subpaths();
    let mut tensor = Complex3D::new(u_size, s_size, total);

    // Geometric bearings used for the LOS ray.
    let s_angle = Angles::from_points(&u_node.position, &s_node.position);
    let u_angle = Angles::from_points(&s_node.position, &u_node.position);

    for u_index in 0..u_size {
        for s_index in 0..s_size {
            for n in 0..total {
                let (rx_az, rx_incl, tx_az, tx_incl) = if los && n == 0 {
                    (
                        u_angle.azimuth,
                        u_angle.inclination,
                        s_angle.azimuth,
                        s_angle.inclination,
                    )
                } else {
                    (rays.aoa[n], rays.zoa[n], rays.aod[n], rays.zod[n])
                };

                let rx_phase = u_array.steering_phase(u_index, rx_az, rx_incl);
                let tx_phase = s_array.steering_phase(s_index, tx_az, tx_incl);
                let (rx_field_phi, rx_field_theta) =
                    u_array.element_field_pattern(&Angles::new(rx_az, rx_incl));
                let (tx_field_phi, tx_field_theta) =
                    s_array.element_field_pattern(&Angles::new(tx_az, tx_incl));

                let phases = &params.subpath_phases[n];
                let xpd = &params.xpd_db[n];

                // Four polarization terms; cross-polarized ones are damped
                // by 1/sqrt(XPD).
                let ray = (Complex64::from_polar(1.0, phases[0]) * (rx_field_theta * tx_field_theta)
                    + Complex64::from_polar(
                        (1.0 / db_to_pow(xpd.vh_db)).sqrt(),
                        phases[1],
                    ) * (rx_field_theta * tx_field_phi)
                    + Complex64::from_polar(
                        (1.0 / db_to_pow(xpd.hv_db)).sqrt(),
                        phases[2],
                    ) * (rx_field_phi * tx_field_theta)
                    + Complex64::from_polar(
                        (1.0 / db_to_pow(xpd.hh_db)).sqrt(),
                        phases[3],
                    ) * (rx_field_phi * tx_field_phi))
                    * Complex64::from_polar(1.0, rx_phase)
                    * Complex64::from_polar(1.0, tx_phase)
                    * params.spectrum[n].power.sqrt();

                tensor.set(u_index, s_index, n, ray);
            }
        }
    }

    ChannelMatrix {
        tensor,
        generated_at_s: now_s,
        node_pair: (s_node.id, u_node.id),
        antenna_pair: (s_array.id(), u_array.id()),
    }
}
