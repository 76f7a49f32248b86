//! Network configuration
//!
//! Defaults reproduce the inactive parameter set of the laminar column
//! model: every weight is zero and every ongoing input starts beyond the
//! end of the simulation.

use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{NetError, Result};
use crate::feed::{
    Distribution, EvokedParams, FeedEvents, FeedKind, FeedKindTag, FeedSpec, FeedTarget,
    GaussianParams, PoissonParams, ReceptorWeights, RhythmicParams,
};
use crate::layout::GridSize;
use crate::population::{CellType, Location};
use crate::rng::TrialSeedPolicy;
use crate::wiring::SynapticWeights;

/// Per-target-type parameters of an input
///
/// `sigma` is the spread of evoked and Gaussian inputs, `mean` the centre
/// of Gaussian inputs and `rate` the Poisson rate (Hz).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FeedTargetConfig {
    /// AMPA weight
    pub ampa: f64,
    /// NMDA weight
    pub nmda: f64,
    /// Delay at zero distance (ms)
    pub delay: f64,
    /// Spread of event times (ms)
    pub sigma: f64,
    /// Centre of Gaussian event times (ms)
    pub mean: f64,
    /// Poisson rate (Hz)
    pub rate: f64,
}

impl Default for FeedTargetConfig {
    fn default() -> Self {
        Self {
            ampa: 0.0,
            nmda: 0.0,
            delay: 1.0,
            sigma: 0.0,
            mean: 0.0,
            rate: 0.0,
        }
    }
}

impl FeedTargetConfig {
    fn with_delay(delay: f64) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    fn weights(&self) -> ReceptorWeights {
        ReceptorWeights::new(self.ampa, self.nmda)
    }
}

/// One configured external input
///
/// Fields that do not apply to the input's kind are ignored.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FeedConfig {
    /// Population name; per-cell inputs must be unique
    pub name: String,
    /// Kind tag: `rhythmic`, `evoked`, `gaussian` or `poisson`
    pub kind: String,
    /// Dendritic location
    pub location: Location,
    /// Seed core of its streams
    pub seedcore: u64,
    /// Spatial length constant
    pub lamtha: f64,
    /// Rhythmic start or Poisson window start (ms)
    pub start: f64,
    /// Rhythmic stop or Poisson window end (ms); simulation stop if absent
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub stop: Option<f64>,
    /// Randomize the rhythmic start
    pub randomize_start: bool,
    /// Jitter of the rhythmic start (ms)
    pub start_stdev: f64,
    /// Rhythmic frequency (Hz)
    pub frequency: f64,
    /// Rhythmic jitter (ms)
    pub stdev: f64,
    /// Rhythmic events per cycle
    pub events_per_cycle: u32,
    /// Rhythmic copies per cycle
    pub repeats: u32,
    /// Rhythmic sampling
    pub distribution: Distribution,
    /// Evoked mean time (ms)
    pub mean: f64,
    /// Evoked events per instance
    pub numspikes: u32,
    /// Evoked mean shift per trial (ms)
    pub increment: f64,
    /// Evoked inputs share one stream across cells
    pub synchronous: bool,
    /// Target cell types and their parameters
    pub targets: BTreeMap<CellType, FeedTargetConfig>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        let rhythmic = RhythmicParams::default();
        Self {
            name: String::new(),
            kind: String::new(),
            location: Location::Proximal,
            seedcore: 0,
            lamtha: 100.0,
            start: 0.0,
            stop: None,
            randomize_start: false,
            start_stdev: 0.0,
            frequency: rhythmic.frequency,
            stdev: rhythmic.stdev,
            events_per_cycle: rhythmic.events_per_cycle,
            repeats: rhythmic.repeats,
            distribution: rhythmic.distribution,
            mean: 0.0,
            numspikes: 1,
            increment: 0.0,
            synchronous: false,
            targets: BTreeMap::new(),
        }
    }
}

impl FeedConfig {
    /// Kind of this input
    pub fn tag(&self) -> Result<FeedKindTag> {
        self.kind.parse()
    }

    /// Resolve against the simulation stop
    ///
    /// Returns `None` for a rhythmic input that starts at or after `tstop`;
    /// such an input is not instantiated at all.
    pub fn resolve(&self, tstop: f64) -> Result<Option<FeedSpec>> {
        let tag = self.tag()?;
        if self.name.is_empty() {
            return Err(NetError::invalid_config(format!(
                "{} input without a name",
                tag
            )));
        }

        let events = match tag {
            FeedKindTag::Rhythmic => {
                if !self.randomize_start && self.start >= tstop {
                    log::debug!("Input {} starts after tstop and is skipped", self.name);
                    return Ok(None);
                }
                FeedEvents::Shared(FeedKind::Rhythmic(RhythmicParams {
                    start: self.start,
                    randomize_start: self.randomize_start,
                    start_stdev: self.start_stdev,
                    stop: self.stop.unwrap_or(tstop).min(tstop),
                    frequency: self.frequency,
                    stdev: self.stdev,
                    events_per_cycle: self.events_per_cycle,
                    repeats: self.repeats,
                    distribution: self.distribution,
                }))
            }
            FeedKindTag::Evoked => self.per_target(|t| {
                FeedKind::Evoked(EvokedParams {
                    mean: self.mean,
                    sigma: t.sigma,
                    numspikes: self.numspikes,
                    increment: self.increment,
                    synchronous: self.synchronous,
                })
            }),
            FeedKindTag::Gaussian => self.per_target(|t| {
                FeedKind::Gaussian(GaussianParams {
                    mean: t.mean,
                    sigma: t.sigma,
                    weights: t.weights(),
                })
            }),
            FeedKindTag::Poisson => {
                // 0 and -1 are legacy spellings of "until the end"
                let stop = match self.stop {
                    None => tstop,
                    Some(stop) if stop == 0.0 || stop == -1.0 => tstop,
                    Some(stop) => stop,
                };
                self.per_target(|t| {
                    FeedKind::Poisson(PoissonParams {
                        rate: t.rate,
                        start: self.start,
                        stop,
                        weights: t.weights(),
                    })
                })
            }
        };

        let targets = self
            .targets
            .iter()
            .map(|(&cell_type, t)| {
                (
                    cell_type,
                    FeedTarget {
                        weights: t.weights(),
                        delay: t.delay,
                    },
                )
            })
            .collect();

        let spec = FeedSpec {
            name: self.name.clone(),
            tag,
            seedcore: self.seedcore,
            lamtha: self.lamtha,
            location: self.location,
            events,
            targets,
        };
        spec.validate()?;
        Ok(Some(spec))
    }

    fn per_target<F>(&self, resolve: F) -> FeedEvents
    where
        F: Fn(&FeedTargetConfig) -> FeedKind,
    {
        FeedEvents::PerTarget(
            self.targets
                .iter()
                .map(|(&cell_type, t)| (cell_type, resolve(t)))
                .collect(),
        )
    }
}

/// Complete configuration of a network run
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct NetworkConfig {
    /// Simulation stop, the horizon of every input (ms)
    pub tstop: f64,
    /// Spike detection threshold copied into every edge
    pub threshold: f64,
    /// Number of trials
    pub trials: u32,
    /// Number of workers
    pub ranks: usize,
    /// Derivation of the per-trial seed offset
    pub seed_policy: TrialSeedPolicy,
    /// Pyramidal grid extent
    pub grid: GridSize,
    /// Local projection weights
    pub weights: SynapticWeights,
    /// External inputs
    pub feeds: Vec<FeedConfig>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            tstop: 250.0,
            threshold: 0.0,
            trials: 1,
            ranks: 1,
            seed_policy: TrialSeedPolicy::Stride,
            grid: GridSize::default(),
            weights: SynapticWeights::default(),
            feeds: default_feeds(),
        }
    }
}

impl NetworkConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !self.tstop.is_finite() || self.tstop <= 0.0 {
            return Err(NetError::invalid_parameter(
                "tstop",
                self.tstop.to_string(),
                "finite and > 0.0",
            ));
        }
        if self.trials == 0 {
            return Err(NetError::invalid_parameter("trials", "0", ">= 1"));
        }
        if self.ranks == 0 {
            return Err(NetError::invalid_parameter("ranks", "0", ">= 1"));
        }
        self.grid.validate()?;
        self.weights.validate()?;
        self.feed_specs()?;
        Ok(())
    }

    /// Resolved inputs, skipping rhythmic inputs that never start
    pub fn feed_specs(&self) -> Result<Vec<FeedSpec>> {
        let mut specs = Vec::with_capacity(self.feeds.len());
        for feed in &self.feeds {
            if let Some(spec) = feed.resolve(self.tstop)? {
                specs.push(spec);
            }
        }
        Ok(specs)
    }

    /// Parse and validate a TOML document
    #[cfg(feature = "serde")]
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source).map_err(|e| NetError::invalid_config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Render as a TOML document
    #[cfg(feature = "serde")]
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| NetError::invalid_config(e.to_string()))
    }
}

fn default_feeds() -> Vec<FeedConfig> {
    use CellType::*;

    let rhythmic = RhythmicParams::default();
    let ongoing = |name: &str, location, delay_l2, delay_l5, types: &[CellType]| FeedConfig {
        name: name.to_string(),
        kind: FeedKindTag::Rhythmic.name().to_string(),
        location,
        start: rhythmic.start,
        stop: Some(rhythmic.stop),
        targets: types
            .iter()
            .map(|&t| {
                let delay = if t.is_layer5() { delay_l5 } else { delay_l2 };
                (t, FeedTargetConfig::with_delay(delay))
            })
            .collect(),
        ..Default::default()
    };

    let gauss = |delay, sigma| FeedTargetConfig {
        delay,
        mean: 2000.0,
        sigma,
        ..Default::default()
    };

    vec![
        ongoing(
            "input_prox",
            Location::Proximal,
            0.1,
            1.0,
            &[L2Basket, L2Pyramidal, L5Basket, L5Pyramidal],
        ),
        ongoing(
            "input_dist",
            Location::Distal,
            5.0,
            5.0,
            &[L2Basket, L2Pyramidal, L5Pyramidal],
        ),
        FeedConfig {
            name: "extgauss".to_string(),
            kind: FeedKindTag::Gaussian.name().to_string(),
            targets: [
                (L2Basket, gauss(1.0, 3.6)),
                (L2Pyramidal, gauss(0.1, 3.6)),
                (L5Basket, gauss(1.0, 2.0)),
                (L5Pyramidal, gauss(1.0, 4.8)),
            ]
            .into_iter()
            .collect(),
            ..Default::default()
        },
        FeedConfig {
            name: "extpois".to_string(),
            kind: FeedKindTag::Poisson.name().to_string(),
            targets: [
                (L2Basket, FeedTargetConfig::with_delay(1.0)),
                (L2Pyramidal, FeedTargetConfig::with_delay(0.1)),
                (L5Basket, FeedTargetConfig::with_delay(1.0)),
                (L5Pyramidal, FeedTargetConfig::with_delay(1.0)),
            ]
            .into_iter()
            .collect(),
            ..Default::default()
        },
    ]
}
