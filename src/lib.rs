//! Statistically realistic, time-varying multipath channel for link-level
//! wireless simulation.
//!
//! The model generates a full stochastic multipath description between two
//! antenna-equipped endpoints and turns it into received power spectra, in
//! layered stages:
//!
//! 1. [`condition::ConditionModel`] resolves LOS/NLOS per node pair from a
//!    scenario-specific probability law, cached reciprocally.
//! 2. [`model::ChannelModel`] expands a (scenario, condition) parameter
//!    table into time clusters, subpaths, delays, powers, phases, angles and
//!    cross-polarization ratios, then synthesizes the complex coefficient
//!    tensor for an antenna pair.
//! 3. [`spectrum::SpectrumGainModel`] projects the tensor onto the current
//!    beamforming vectors (cached long term) and applies Doppler and
//!    delay-phase gain per frequency sub-band.
//!
//! Everything is synchronous, in-memory computation meant to be driven from
//! a single-threaded event scheduler; simulated time enters as an explicit
//! argument. All randomness flows through named ChaCha streams assigned once
//! per run, so a realization is reproducible from its stream number.

pub mod antenna;
pub mod condition;
pub mod config;
pub mod geometry;
pub mod matrix;
pub mod model;
pub mod params;
pub mod rng;
pub mod spectrum;

pub use antenna::AntennaArray;
pub use condition::{pair_key, ChannelCondition, ConditionModel, LosState, O2iState};
pub use config::{ChannelConfig, ChannelError, O2iLossType, Scenario};
pub use geometry::{Angles, Node, Vec3};
pub use matrix::{ChannelMatrix, Complex3D};
pub use model::ChannelModel;
pub use params::{ChannelParams, ParamsTable, Subpath, Xpd};
pub use rng::RandomStreams;
pub use spectrum::{PowerSpectrum, SpectrumGainModel};
