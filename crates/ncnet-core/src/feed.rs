//! External input event generators
//!
//! Four closed kinds of input. Each generator turns a pair of seeded streams
//! into an ascending sequence of event times (ms) that are strictly positive
//! and earlier than the simulation horizon.

use core::fmt;
use core::str::FromStr;
use std::collections::BTreeMap;

use rand::Rng;
use rand_distr::{Distribution as _, Normal};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{NetError, Result};
use crate::gid::Gid;
use crate::population::{CellType, Location, Receptor};
use crate::rng::{FeedRng, FeedSeeds, FeedStreams, RandomStreamFactory};

/// Number of draws of a Gaussian feed
pub const GAUSSIAN_DRAWS: usize = 50;

/// Window of a randomized rhythmic start time (ms)
pub const RANDOM_START_WINDOW: (f64, f64) = (25.0, 125.0);

/// Offset of each event of a doublet from its cycle centre (ms)
pub const DOUBLET_OFFSET: f64 = 5.0;

/// Tag naming a feed kind in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedKindTag {
    /// Periodic bursts
    Rhythmic,
    /// Transient evoked volley
    Evoked,
    /// Gaussian cloud of events
    Gaussian,
    /// Homogeneous Poisson process
    Poisson,
}

impl FeedKindTag {
    /// Configuration name
    pub const fn name(self) -> &'static str {
        match self {
            FeedKindTag::Rhythmic => "rhythmic",
            FeedKindTag::Evoked => "evoked",
            FeedKindTag::Gaussian => "gaussian",
            FeedKindTag::Poisson => "poisson",
        }
    }
}

impl fmt::Display for FeedKindTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FeedKindTag {
    type Err = NetError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "rhythmic" => Ok(FeedKindTag::Rhythmic),
            "evoked" => Ok(FeedKindTag::Evoked),
            "gaussian" => Ok(FeedKindTag::Gaussian),
            "poisson" => Ok(FeedKindTag::Poisson),
            other => Err(NetError::UnknownFeedKind {
                tag: other.to_string(),
            }),
        }
    }
}

/// Sampling of rhythmic cycle times
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Distribution {
    /// Jitter around periodic cycle centres
    #[default]
    Normal,
    /// Uniform over the active window
    Uniform,
}

/// Synaptic weights of an input on one target type
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ReceptorWeights {
    /// AMPA weight
    pub ampa: f64,
    /// NMDA weight
    pub nmda: f64,
}

impl ReceptorWeights {
    /// Create receptor weights
    pub const fn new(ampa: f64, nmda: f64) -> Self {
        Self { ampa, nmda }
    }

    /// True when the input cannot drive its target
    pub fn is_silent(&self) -> bool {
        self.ampa == 0.0 && self.nmda == 0.0
    }
}

/// Parameters of a rhythmic feed
#[derive(Debug, Clone, PartialEq)]
pub struct RhythmicParams {
    /// Fixed start time (ms)
    pub start: f64,
    /// Draw the start uniformly from [`RANDOM_START_WINDOW`]
    pub randomize_start: bool,
    /// Jitter of the start time, drawn from the start stream
    pub start_stdev: f64,
    /// End of the active window (ms)
    pub stop: f64,
    /// Burst frequency (Hz)
    pub frequency: f64,
    /// Jitter of each event around its cycle centre (ms)
    pub stdev: f64,
    /// Events per cycle, 1 or 2
    pub events_per_cycle: u32,
    /// Jittered copies per cycle centre
    pub repeats: u32,
    /// Cycle time sampling
    pub distribution: Distribution,
}

impl Default for RhythmicParams {
    fn default() -> Self {
        Self {
            start: 1000.0,
            randomize_start: false,
            start_stdev: 0.0,
            stop: 250.0,
            frequency: 10.0,
            stdev: 20.0,
            events_per_cycle: 2,
            repeats: 10,
            distribution: Distribution::Normal,
        }
    }
}

impl RhythmicParams {
    /// Validate parameters
    pub fn validate(&self) -> Result<()> {
        check_finite("start", self.start)?;
        check_finite("stop", self.stop)?;
        check_non_negative("frequency", self.frequency)?;
        check_non_negative("stdev", self.stdev)?;
        check_non_negative("start_stdev", self.start_stdev)?;
        if !(1..=2).contains(&self.events_per_cycle) {
            return Err(NetError::invalid_parameter(
                "events_per_cycle",
                self.events_per_cycle.to_string(),
                "1 or 2",
            ));
        }
        Ok(())
    }

    fn generate(&self, streams: &mut FeedStreams, horizon: f64) -> Result<Vec<f64>> {
        let start = if self.randomize_start {
            let (low, high) = RANDOM_START_WINDOW;
            streams.events.gen_range(low..high)
        } else if self.start_stdev > 0.0 {
            normal(self.start, self.start_stdev)?.sample(&mut streams.start)
        } else {
            self.start
        };
        let stop = self.stop.min(horizon);

        if self.frequency == 0.0 || stop <= start {
            return Ok(Vec::new());
        }

        let centres: Vec<f64> = match self.distribution {
            Distribution::Normal => {
                let period = 1000.0 / self.frequency;
                let cycles = ((stop - start) / period).ceil() as usize;
                let grid = (0..cycles).map(|i| start + i as f64 * period);
                if self.stdev != 0.0 {
                    let jitter = normal(0.0, self.stdev)?;
                    let repeats = self.repeats as usize;
                    grid.flat_map(|c| std::iter::repeat(c).take(repeats))
                        .map(|c| c + jitter.sample(&mut streams.events))
                        .collect()
                } else {
                    grid.collect()
                }
            }
            Distribution::Uniform => {
                let draws = (f64::from(self.repeats) * self.frequency * (stop - start) / 1000.0)
                    as usize;
                (0..draws)
                    .map(|_| streams.events.gen_range(start..stop))
                    .collect()
            }
        };

        let events = if self.events_per_cycle == 2 {
            centres
                .iter()
                .map(|t| t - DOUBLET_OFFSET)
                .chain(centres.iter().map(|t| t + DOUBLET_OFFSET))
                .collect()
        } else {
            centres
        };
        Ok(finish(events, horizon))
    }
}

/// Parameters of an evoked feed for one target type
#[derive(Debug, Clone, PartialEq)]
pub struct EvokedParams {
    /// Mean event time in trial 0 (ms)
    pub mean: f64,
    /// Spread of event times (ms)
    pub sigma: f64,
    /// Events per instance
    pub numspikes: u32,
    /// Shift of the mean per trial (ms)
    pub increment: f64,
    /// Share one stream across every target gid
    pub synchronous: bool,
}

impl EvokedParams {
    /// Validate parameters
    pub fn validate(&self) -> Result<()> {
        check_finite("mean", self.mean)?;
        check_finite("increment", self.increment)?;
        check_non_negative("sigma", self.sigma)
    }

    fn generate(&self, streams: &mut FeedStreams, trial: u32, horizon: f64) -> Result<Vec<f64>> {
        let mean = self.mean + f64::from(trial) * self.increment;
        let events = normal_draws(&mut streams.events, mean, self.sigma, self.numspikes as usize)?;
        Ok(finish(events, horizon))
    }
}

/// Parameters of a Gaussian feed for one target type
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianParams {
    /// Mean event time (ms)
    pub mean: f64,
    /// Spread of event times (ms)
    pub sigma: f64,
    /// Weights onto the target type
    pub weights: ReceptorWeights,
}

impl GaussianParams {
    /// Validate parameters
    pub fn validate(&self) -> Result<()> {
        check_finite("mean", self.mean)?;
        check_non_negative("sigma", self.sigma)
    }

    fn generate(&self, streams: &mut FeedStreams, horizon: f64) -> Result<Vec<f64>> {
        if self.weights.is_silent() {
            return Ok(Vec::new());
        }
        let events = normal_draws(&mut streams.events, self.mean, self.sigma, GAUSSIAN_DRAWS)?;
        Ok(finish(events, horizon))
    }
}

/// Parameters of a Poisson feed for one target type
#[derive(Debug, Clone, PartialEq)]
pub struct PoissonParams {
    /// Rate (Hz)
    pub rate: f64,
    /// Window start (ms)
    pub start: f64,
    /// Window end (ms)
    pub stop: f64,
    /// Weights onto the target type
    pub weights: ReceptorWeights,
}

impl PoissonParams {
    /// Validate parameters
    pub fn validate(&self) -> Result<()> {
        check_finite("start", self.start)?;
        check_finite("stop", self.stop)?;
        check_non_negative("rate", self.rate)
    }

    fn generate(&self, streams: &mut FeedStreams, horizon: f64) -> Vec<f64> {
        if self.weights.is_silent() || self.rate == 0.0 {
            return Vec::new();
        }
        let end = self.stop.min(horizon);
        let mut events = Vec::new();
        let mut t = self.start;
        loop {
            let u: f64 = streams.events.gen();
            t += -1000.0 * (1.0 - u).ln() / self.rate;
            if t >= end {
                break;
            }
            events.push(t);
        }
        finish(events, horizon)
    }
}

/// A feed kind with parameters resolved for one target type
#[derive(Debug, Clone, PartialEq)]
pub enum FeedKind {
    /// Periodic bursts
    Rhythmic(RhythmicParams),
    /// Transient evoked volley
    Evoked(EvokedParams),
    /// Gaussian cloud of events
    Gaussian(GaussianParams),
    /// Homogeneous Poisson process
    Poisson(PoissonParams),
}

impl FeedKind {
    /// Tag of this kind
    pub fn tag(&self) -> FeedKindTag {
        match self {
            FeedKind::Rhythmic(_) => FeedKindTag::Rhythmic,
            FeedKind::Evoked(_) => FeedKindTag::Evoked,
            FeedKind::Gaussian(_) => FeedKindTag::Gaussian,
            FeedKind::Poisson(_) => FeedKindTag::Poisson,
        }
    }

    /// Validate parameters
    pub fn validate(&self) -> Result<()> {
        match self {
            FeedKind::Rhythmic(p) => p.validate(),
            FeedKind::Evoked(p) => p.validate(),
            FeedKind::Gaussian(p) => p.validate(),
            FeedKind::Poisson(p) => p.validate(),
        }
    }

    /// Seeds of the instance at `gid`
    pub fn seeds(&self, factory: &RandomStreamFactory, seedcore: u64, gid: Gid) -> FeedSeeds {
        match self {
            FeedKind::Rhythmic(_) => factory.rhythmic(seedcore, gid),
            FeedKind::Evoked(p) => factory.evoked(seedcore, gid, p.synchronous),
            FeedKind::Gaussian(_) | FeedKind::Poisson(_) => factory.per_gid(seedcore, gid),
        }
    }

    /// Generate the events of one instance
    pub fn generate(&self, seeds: FeedSeeds, trial: u32, horizon: f64) -> Result<Vec<f64>> {
        let mut streams = seeds.streams();
        match self {
            FeedKind::Rhythmic(p) => p.generate(&mut streams, horizon),
            FeedKind::Evoked(p) => p.generate(&mut streams, trial, horizon),
            FeedKind::Gaussian(p) => p.generate(&mut streams, horizon),
            FeedKind::Poisson(p) => Ok(p.generate(&mut streams, horizon)),
        }
    }
}

const AMPA_ONLY: &[Receptor] = &[Receptor::Ampa];
const AMPA_NMDA: &[Receptor] = &[Receptor::Ampa, Receptor::Nmda];

/// Event parameters of a configured input
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvents {
    /// One parameter set for every instance
    Shared(FeedKind),
    /// Parameters resolved per target cell type
    PerTarget(BTreeMap<CellType, FeedKind>),
}

/// Connection parameters of an input onto one target type
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeedTarget {
    /// Weights at zero distance
    pub weights: ReceptorWeights,
    /// Delay at zero distance (ms)
    pub delay: f64,
}

/// A configured external input, resolved against the simulation horizon
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSpec {
    /// Population name of the input
    pub name: String,
    /// Kind of the input
    pub tag: FeedKindTag,
    /// Seed core of every stream of the input
    pub seedcore: u64,
    /// Spatial length constant of its projections
    pub lamtha: f64,
    /// Dendritic location it targets
    pub location: Location,
    /// Event parameters
    pub events: FeedEvents,
    /// Target cell types it projects onto
    pub targets: BTreeMap<CellType, FeedTarget>,
}

impl FeedSpec {
    /// Receptors the input drives
    pub fn receptors(&self) -> &'static [Receptor] {
        match self.tag {
            FeedKindTag::Gaussian => AMPA_ONLY,
            _ => AMPA_NMDA,
        }
    }

    /// True for the legacy shared ongoing inputs
    pub fn is_shared(&self) -> bool {
        matches!(self.events, FeedEvents::Shared(_))
    }

    /// Event parameters for an instance driving a cell of `cell_type`
    ///
    /// Shared inputs have no owning cell and always resolve.
    pub fn kind_for(&self, cell_type: Option<CellType>) -> Option<&FeedKind> {
        match (&self.events, cell_type) {
            (FeedEvents::Shared(kind), _) => Some(kind),
            (FeedEvents::PerTarget(kinds), Some(cell_type)) => kinds.get(&cell_type),
            (FeedEvents::PerTarget(_), None) => None,
        }
    }

    /// Validate the input
    pub fn validate(&self) -> Result<()> {
        if self.lamtha.is_nan() || self.lamtha <= 0.0 {
            return Err(NetError::invalid_parameter(
                format!("{}.lamtha", self.name),
                self.lamtha.to_string(),
                "> 0.0",
            ));
        }
        for (cell_type, target) in &self.targets {
            if target.delay.is_nan() || target.delay <= 0.0 {
                return Err(NetError::invalid_parameter(
                    format!("{}.{}.delay", self.name, cell_type),
                    target.delay.to_string(),
                    "> 0.0",
                ));
            }
        }
        match &self.events {
            FeedEvents::Shared(kind) => kind.validate(),
            FeedEvents::PerTarget(kinds) => kinds.values().try_for_each(FeedKind::validate),
        }
    }
}

fn normal(mean: f64, stdev: f64) -> Result<Normal<f64>> {
    Normal::new(mean, stdev)
        .map_err(|e| NetError::invalid_parameter("stdev", stdev.to_string(), e.to_string()))
}

// A zero spread is a fixed burst of `count` coincident events.
fn normal_draws(rng: &mut FeedRng, mean: f64, sigma: f64, count: usize) -> Result<Vec<f64>> {
    if sigma == 0.0 {
        return Ok(vec![mean; count]);
    }
    let dist = normal(mean, sigma)?;
    Ok((0..count).map(|_| dist.sample(rng)).collect())
}

fn finish(mut events: Vec<f64>, horizon: f64) -> Vec<f64> {
    events.retain(|&t| t > 0.0 && t < horizon);
    events.sort_by(f64::total_cmp);
    events
}

fn check_finite(parameter: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(NetError::invalid_parameter(parameter, value.to_string(), "finite"))
    }
}

fn check_non_negative(parameter: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(NetError::invalid_parameter(parameter, value.to_string(), ">= 0.0"))
    }
}
