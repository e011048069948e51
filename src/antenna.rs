//! Phased antenna array description.
//!
//! Element offsets are stored in wavelength units so array steering phases
//! are simply `2*pi * (r_hat . element_offset)`. The element itself is an
//! isotropic radiator with a polarization slant angle: slant 0 is a purely
//! vertically polarized element, slant pi/2 purely horizontal, anything in
//! between splits the field between the theta and phi components.

use num_complex::Complex64;
use std::f64::consts::PI;

use crate::geometry::{direction_cosines, Angles, Vec3};

/// A planar phased array with a stable identity and a beamforming vector.
#[derive(Debug, Clone)]
pub struct AntennaArray {
    id: u32,
    /// Element offsets from the array reference point, wavelength units.
    elements: Vec<Vec3>,
    /// Complex per-element weights, one per element.
    beamforming: Vec<Complex64>,
    polarization_slant_rad: f64,
}

impl AntennaArray {
    /// A uniform planar array in the y-z plane: `rows` vertical by `cols`
    /// horizontal elements at the given spacing (wavelengths). The
    /// beamforming vector starts as uniform weights with unit total power.
    pub fn uniform_planar(id: u32, rows: usize, cols: usize, spacing_wl: f64) -> Self {
        assert!(rows > 0 && cols > 0, "array must have at least one element");
        let mut elements = Vec::with_capacity(rows * cols);
        for row in 0..rows {
            for col in 0..cols {
                elements.push(Vec3::new(
                    0.0,
                    col as f64 * spacing_wl,
                    row as f64 * spacing_wl,
                ));
            }
        }
        let n = elements.len();
        let w = Complex64::new(1.0 / (n as f64).sqrt(), 0.0);
        Self {
            id,
            elements,
            beamforming: vec![w; n],
            polarization_slant_rad: 0.0,
        }
    }

    /// Rotate the element polarization away from vertical.
    pub fn with_polarization_slant(mut self, slant_rad: f64) -> Self {
        self.polarization_slant_rad = slant_rad;
        self
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn num_elements(&self) -> usize {
        self.elements.len()
    }

    pub fn element_location(&self, index: usize) -> Vec3 {
        self.elements[index]
    }

    /// Field pattern (phi component, theta component) of one element toward
    /// the given direction. Isotropic in direction; the slant angle fixes
    /// the split between polarizations.
    pub fn element_field_pattern(&self, _toward: &Angles) -> (f64, f64) {
        (
            self.polarization_slant_rad.sin(),
            self.polarization_slant_rad.cos(),
        )
    }

    pub fn beamforming_vector(&self) -> &[Complex64] {
        &self.beamforming
    }

    /// Replace the beamforming vector. Length must match the element count.
    pub fn set_beamforming_vector(&mut self, weights: Vec<Complex64>) {
        assert_eq!(
            weights.len(),
            self.elements.len(),
            "beamforming vector length must equal the element count"
        );
        self.beamforming = weights;
    }

    /// Point the beamforming vector at a (azimuth, inclination) direction:
    /// conjugate steering weights normalized to unit total power.
    pub fn steer_towards(&mut self, azimuth_rad: f64, inclination_rad: f64) {
        let dir = direction_cosines(azimuth_rad, inclination_rad);
        let norm = 1.0 / (self.elements.len() as f64).sqrt();
        self.beamforming = self
            .elements
            .iter()
            .map(|loc| {
                let phase = 2.0 * PI * (dir.x * loc.x + dir.y * loc.y + dir.z * loc.z);
                Complex64::from_polar(norm, -phase)
            })
            .collect();
    }

    /// Array steering phase of one element toward a direction, radians.
    pub fn steering_phase(&self, index: usize, azimuth_rad: f64, inclination_rad: f64) -> f64 {
        let dir = direction_cosines(azimuth_rad, inclination_rad);
        let loc = self.elements[index];
        2.0 * PI * (dir.x * loc.x + dir.y * loc.y + dir.z * loc.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upa_element_count_and_layout() {
        let arr = AntennaArray::uniform_planar(1, 2, 4, 0.5);
        assert_eq!(arr.num_elements(), 8);
        // First element at the origin, x stays zero
        assert_eq!(arr.element_location(0), Vec3::new(0.0, 0.0, 0.0));
        for i in 0..8 {
            assert_eq!(arr.element_location(i).x, 0.0);
        }
        // Second row offset vertically
        assert_eq!(arr.element_location(4).z, 0.5);
    }

    #[test]
    fn test_default_beamforming_has_unit_power() {
        let arr = AntennaArray::uniform_planar(1, 4, 4, 0.5);
        let power: f64 = arr.beamforming_vector().iter().map(|w| w.norm_sqr()).sum();
        assert!((power - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_steering_keeps_unit_power() {
        let mut arr = AntennaArray::uniform_planar(1, 4, 4, 0.5);
        arr.steer_towards(0.8, 1.3);
        let power: f64 = arr.beamforming_vector().iter().map(|w| w.norm_sqr()).sum();
        assert!((power - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_steering_aligns_phases() {
        // Weights steered at a direction must cancel the array phase in that
        // direction: sum w_i * e^{j phase_i} has magnitude sqrt(N).
        let mut arr = AntennaArray::uniform_planar(1, 1, 8, 0.5);
        let (az, incl) = (0.4, 1.2);
        arr.steer_towards(az, incl);
        let sum: Complex64 = (0..arr.num_elements())
            .map(|i| {
                arr.beamforming_vector()[i] * Complex64::from_polar(1.0, arr.steering_phase(i, az, incl))
            })
            .sum();
        assert!((sum.norm() - (8.0f64).sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_vertical_element_has_pure_theta_pattern() {
        let arr = AntennaArray::uniform_planar(1, 1, 1, 0.5);
        let (phi, theta) = arr.element_field_pattern(&Angles::new(0.3, 1.0));
        assert_eq!(phi, 0.0);
        assert_eq!(theta, 1.0);
    }

    #[test]
    fn test_slanted_element_splits_power() {
        let arr = AntennaArray::uniform_planar(1, 1, 1, 0.5).with_polarization_slant(PI / 4.0);
        let (phi, theta) = arr.element_field_pattern(&Angles::new(0.0, 1.0));
        assert!((phi * phi + theta * theta - 1.0).abs() < 1e-12);
        assert!((phi - theta).abs() < 1e-12);
    }

    #[test]
    #[should_panic(expected = "beamforming vector length")]
    fn test_wrong_beamforming_length_panics() {
        let mut arr = AntennaArray::uniform_planar(1, 2, 2, 0.5);
        arr.set_beamforming_vector(vec![Complex64::new(1.0, 0.0); 3]);
    }
}
