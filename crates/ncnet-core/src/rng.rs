//! Reproducible random streams for external inputs
//!
//! Every stream is a fresh generator seeded from the feed's seed core, the
//! trial offset shared by all ranks and, for most kinds, the gid of the feed
//! instance. Nothing here depends on how many ranks participate.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::comm::Communicator;
use crate::error::Result;
use crate::gid::Gid;

/// Stream generator used for all feeds
pub type FeedRng = ChaCha8Rng;

/// Offset between consecutive trials under the stride policy
pub const TRIAL_SEED_STRIDE: u64 = 1000;

/// How the root derives the per-trial seed offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum TrialSeedPolicy {
    /// `trial * TRIAL_SEED_STRIDE`, reproducible across runs
    #[default]
    Stride,
    /// Drawn from the root's entropy source, differs between runs
    Entropy,
}

impl TrialSeedPolicy {
    /// Offset for a trial as computed on the root
    pub fn derive(self, trial: u32) -> u64 {
        match self {
            TrialSeedPolicy::Stride => u64::from(trial) * TRIAL_SEED_STRIDE,
            TrialSeedPolicy::Entropy => u64::from(rand::thread_rng().gen::<u32>()),
        }
    }
}

/// Seeds of one feed instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedSeeds {
    /// Seed of the event-time stream
    pub events: u64,
    /// Seed of the start-time stream
    pub start: u64,
}

impl FeedSeeds {
    /// Both streams from the same seed
    pub const fn shared(seed: u64) -> Self {
        Self {
            events: seed,
            start: seed,
        }
    }

    /// Fresh generators for these seeds
    pub fn streams(&self) -> FeedStreams {
        FeedStreams {
            events: FeedRng::seed_from_u64(self.events),
            start: FeedRng::seed_from_u64(self.start),
        }
    }
}

/// Generators handed to a feed generator
#[derive(Debug, Clone)]
pub struct FeedStreams {
    /// Event-time stream
    pub events: FeedRng,
    /// Start-time stream, decoupled from the events
    pub start: FeedRng,
}

/// Derives feed seeds for one trial
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RandomStreamFactory {
    trial: u32,
    offset: u64,
}

impl RandomStreamFactory {
    /// Factory with an explicit offset
    pub const fn new(trial: u32, offset: u64) -> Self {
        Self { trial, offset }
    }

    /// Agree on the offset of a trial across all ranks
    ///
    /// The root derives the offset, broadcasts it and every rank waits at a
    /// barrier before returning, so no rank seeds trial feeds early.
    pub fn for_trial<C>(comm: &C, policy: TrialSeedPolicy, trial: u32) -> Result<Self>
    where
        C: Communicator + ?Sized,
    {
        let proposed = if comm.is_root() { policy.derive(trial) } else { 0 };
        let offset = comm.broadcast_u64(proposed)?;
        comm.barrier()?;
        log::debug!(
            "Rank {} seeded trial {} with offset {}",
            comm.rank(),
            trial,
            offset
        );
        Ok(Self::new(trial, offset))
    }

    /// Trial index
    pub fn trial(&self) -> u32 {
        self.trial
    }

    /// Offset shared by all ranks
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// `seedcore + offset`
    pub fn base_seed(&self, seedcore: u64) -> u64 {
        seedcore.wrapping_add(self.offset)
    }

    /// `seedcore + offset + gid`
    pub fn gid_seed(&self, seedcore: u64, gid: Gid) -> u64 {
        self.base_seed(seedcore).wrapping_add(gid.as_u64())
    }

    /// Rhythmic feeds: events per gid, start time shared
    pub fn rhythmic(&self, seedcore: u64, gid: Gid) -> FeedSeeds {
        FeedSeeds {
            events: self.gid_seed(seedcore, gid),
            start: self.base_seed(seedcore),
        }
    }

    /// Evoked feeds: shared across gids when synchronous
    pub fn evoked(&self, seedcore: u64, gid: Gid, synchronous: bool) -> FeedSeeds {
        if synchronous {
            FeedSeeds::shared(self.base_seed(seedcore))
        } else {
            FeedSeeds::shared(self.gid_seed(seedcore, gid))
        }
    }

    /// Gaussian and Poisson feeds: per gid
    pub fn per_gid(&self, seedcore: u64, gid: Gid) -> FeedSeeds {
        FeedSeeds::shared(self.gid_seed(seedcore, gid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::{LocalCluster, SingleProcess};

    #[test]
    fn test_stride_policy() {
        assert_eq!(TrialSeedPolicy::Stride.derive(0), 0);
        assert_eq!(TrialSeedPolicy::Stride.derive(3), 3000);
    }

    #[test]
    fn test_seed_derivation() {
        let factory = RandomStreamFactory::new(2, 2000);
        let gid = Gid::new(17);
        assert_eq!(factory.rhythmic(5, gid), FeedSeeds { events: 2022, start: 2005 });
        assert_eq!(factory.evoked(5, gid, true), FeedSeeds::shared(2005));
        assert_eq!(factory.evoked(5, gid, false), FeedSeeds::shared(2022));
        assert_eq!(factory.per_gid(5, gid), FeedSeeds::shared(2022));
    }

    #[test]
    fn test_streams_are_reproducible() {
        let seeds = FeedSeeds::shared(99);
        let a: Vec<u32> = {
            let mut s = seeds.streams();
            (0..8).map(|_| s.events.gen()).collect()
        };
        let b: Vec<u32> = {
            let mut s = seeds.streams();
            (0..8).map(|_| s.events.gen()).collect()
        };
        assert_eq!(a, b);
    }

    #[test]
    fn test_for_trial_single_process() {
        let factory =
            RandomStreamFactory::for_trial(&SingleProcess, TrialSeedPolicy::Stride, 4).unwrap();
        assert_eq!(factory.offset(), 4000);
        assert_eq!(factory.trial(), 4);
    }

    #[test]
    fn test_entropy_offset_is_agreed() {
        let offsets = LocalCluster::run(3, |comm| {
            RandomStreamFactory::for_trial(&comm, TrialSeedPolicy::Entropy, 1)
                .map(|f| f.offset())
        })
        .unwrap();
        assert!(offsets.iter().all(|&o| o == offsets[0]));
    }
}
