//! Global identifier allocation

use core::fmt;
use core::ops::Range;
use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{NetError, Result};
use crate::feed::FeedSpec;
use crate::layout::SpatialLayout;
use crate::population::{CellType, Population};

/// Global identifier of a cell or external input
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Gid(u32);

impl Gid {
    /// Create a gid from its raw value
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw value
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Raw value widened for seed arithmetic
    pub const fn as_u64(self) -> u64 {
        self.0 as u64
    }
}

impl From<u32> for Gid {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Display for Gid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Dense gid ranges for every population
///
/// Ranges are contiguous, non-overlapping and laid out in the canonical
/// population order regardless of the order they were requested in.
#[derive(Debug, Clone, PartialEq)]
pub struct GidSpace {
    ranges: Vec<(Population, Range<u32>)>,
    starts: BTreeMap<u32, usize>,
    total: u32,
}

impl GidSpace {
    /// Allocate ranges from (population, size) pairs
    ///
    /// Sizes are signed so that a negative request can be reported instead of
    /// wrapping.
    pub fn allocate<I>(sizes: I) -> Result<Self>
    where
        I: IntoIterator<Item = (Population, i64)>,
    {
        let mut sorted: BTreeMap<Population, u32> = BTreeMap::new();
        for (population, size) in sizes {
            if size < 0 {
                return Err(NetError::invalid_parameter(
                    format!("size of {}", population),
                    size.to_string(),
                    ">= 0",
                ));
            }
            let size = u32::try_from(size).map_err(|_| {
                NetError::invalid_parameter(
                    format!("size of {}", population),
                    size.to_string(),
                    format!("<= {}", u32::MAX),
                )
            })?;
            if sorted.contains_key(&population) {
                return Err(NetError::DuplicatePopulation {
                    name: population.name().to_string(),
                });
            }
            sorted.insert(population, size);
        }

        let mut ranges = Vec::with_capacity(sorted.len());
        let mut starts = BTreeMap::new();
        let mut next: u32 = 0;
        for (population, size) in sorted {
            let end = next.checked_add(size).ok_or_else(|| {
                NetError::invalid_config("total number of gids exceeds the u32 range")
            })?;
            if size > 0 {
                starts.insert(next, ranges.len());
            }
            ranges.push((population, next..end));
            next = end;
        }

        Ok(Self {
            ranges,
            starts,
            total: next,
        })
    }

    /// Allocate the gid space of a network
    ///
    /// Cell populations take their sizes from the layout, the shared input
    /// takes one gid per rhythmic feed instance and each per-cell input kind
    /// takes one gid per cell.
    pub fn for_network<S: AsRef<str>>(
        layout: &SpatialLayout,
        extinput_count: usize,
        unique_names: &[S],
    ) -> Result<Self> {
        let n_cells = layout.total_cells() as i64;
        let mut sizes: Vec<(Population, i64)> = CellType::ALL
            .iter()
            .map(|&t| (Population::Cell(t), layout.count(t) as i64))
            .collect();
        sizes.push((Population::ExtInput, extinput_count as i64));
        for name in unique_names {
            let population = Population::from_name(name.as_ref());
            if !population.is_input() || population == Population::ExtInput {
                return Err(NetError::DuplicatePopulation {
                    name: name.as_ref().to_string(),
                });
            }
            sizes.push((population, n_cells));
        }
        Self::allocate(sizes)
    }

    /// Allocate the gid space for a set of resolved inputs
    ///
    /// Shared inputs take one gid each in the order given; every other input
    /// becomes a per-cell population.
    pub fn for_feeds(layout: &SpatialLayout, specs: &[FeedSpec]) -> Result<Self> {
        let shared = specs.iter().filter(|s| s.is_shared()).count();
        let unique: Vec<&str> = specs
            .iter()
            .filter(|s| !s.is_shared())
            .map(|s| s.name.as_str())
            .collect();
        Self::for_network(layout, shared, &unique)
    }

    /// Total number of gids
    pub fn total(&self) -> u32 {
        self.total
    }

    /// Number of cell gids
    pub fn cell_count(&self) -> u32 {
        self.ranges
            .iter()
            .filter(|(p, _)| !p.is_input())
            .map(|(_, r)| r.len() as u32)
            .sum()
    }

    /// Populations and their ranges, in gid order
    pub fn populations(&self) -> impl Iterator<Item = (&Population, Range<u32>)> + '_ {
        self.ranges.iter().map(|(p, r)| (p, r.clone()))
    }

    /// Range of a population
    pub fn range(&self, population: &Population) -> Option<Range<u32>> {
        self.ranges
            .iter()
            .find(|(p, _)| p == population)
            .map(|(_, r)| r.clone())
    }

    /// Gid of a population member
    pub fn gid(&self, population: &Population, index: usize) -> Option<Gid> {
        let range = self.range(population)?;
        let raw = range.start.checked_add(u32::try_from(index).ok()?)?;
        range.contains(&raw).then_some(Gid(raw))
    }

    /// Names of the per-cell input populations in gid order
    pub fn unique_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.ranges.iter().filter_map(|(p, _)| match p {
            Population::Unique(name) => Some(name.as_str()),
            _ => None,
        })
    }

    /// Population and local index of a gid
    pub fn locate(&self, gid: Gid) -> Result<(&Population, usize)> {
        let out_of_range = || NetError::GidOutOfRange {
            gid,
            total: self.total,
        };
        let (_, &slot) = self
            .starts
            .range(..=gid.raw())
            .next_back()
            .ok_or_else(out_of_range)?;
        let (population, range) = &self.ranges[slot];
        if range.contains(&gid.raw()) {
            Ok((population, (gid.raw() - range.start) as usize))
        } else {
            Err(out_of_range())
        }
    }

    /// Population a gid belongs to
    pub fn gid_to_population(&self, gid: Gid) -> Result<&Population> {
        self.locate(gid).map(|(population, _)| population)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::GridSize;

    fn small_space() -> GidSpace {
        GidSpace::allocate(vec![
            (Population::Unique("extpois".into()), 7),
            (Population::Cell(CellType::L2Pyramidal), 2),
            (Population::ExtInput, 0),
            (Population::Cell(CellType::L2Basket), 1),
            (Population::Cell(CellType::L5Pyramidal), 2),
            (Population::Cell(CellType::L5Basket), 2),
            (Population::Unique("evprox1".into()), 7),
        ])
        .unwrap()
    }

    #[test]
    fn test_canonical_order() {
        let space = small_space();
        let names: Vec<_> = space.populations().map(|(p, _)| p.name().to_string()).collect();
        assert_eq!(
            names,
            vec![
                "L2_basket",
                "L2_pyramidal",
                "L5_basket",
                "L5_pyramidal",
                "extinput",
                "evprox1",
                "extpois"
            ]
        );
        assert_eq!(space.range(&Population::Cell(CellType::L2Basket)), Some(0..1));
        assert_eq!(space.range(&Population::Unique("evprox1".into())), Some(7..14));
        assert_eq!(space.total(), 21);
        assert_eq!(space.cell_count(), 7);
    }

    #[test]
    fn test_locate_round_trip() {
        let space = small_space();
        for (population, range) in space.populations() {
            for (index, raw) in range.enumerate() {
                let gid = space.gid(population, index).unwrap();
                assert_eq!(gid.raw(), raw);
                let (found, local) = space.locate(gid).unwrap();
                assert_eq!(found, population);
                assert_eq!(local, index);
            }
        }
    }

    #[test]
    fn test_empty_population_never_matches() {
        let space = small_space();
        // extinput is empty and starts where evprox1 starts
        assert_eq!(
            space.gid_to_population(Gid::new(7)).unwrap(),
            &Population::Unique("evprox1".into())
        );
        assert!(space.gid(&Population::ExtInput, 0).is_none());
    }

    #[test]
    fn test_lookup_out_of_range() {
        let space = small_space();
        let err = space.locate(Gid::new(21)).unwrap_err();
        assert!(err.is_lookup());
    }

    #[test]
    fn test_negative_size_rejected() {
        let err = GidSpace::allocate(vec![(Population::ExtInput, -1)]).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_duplicate_rejected() {
        let err = GidSpace::allocate(vec![
            (Population::Unique("extgauss".into()), 3),
            (Population::Unique("extgauss".into()), 3),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            NetError::DuplicatePopulation {
                name: "extgauss".into()
            }
        );
    }

    #[test]
    fn test_for_network() {
        let layout = SpatialLayout::new(GridSize::new(3, 3).unwrap()).unwrap();
        let space = GidSpace::for_network(&layout, 2, &["extgauss", "evdist1"]).unwrap();
        // 3 + 9 + 3 + 9 cells
        assert_eq!(space.cell_count(), 24);
        assert_eq!(space.range(&Population::ExtInput), Some(24..26));
        assert_eq!(space.range(&Population::Unique("evdist1".into())), Some(26..50));
        assert_eq!(space.range(&Population::Unique("extgauss".into())), Some(50..74));
        let names: Vec<_> = space.unique_names().collect();
        assert_eq!(names, vec!["evdist1", "extgauss"]);
    }

    #[test]
    fn test_for_network_rejects_reserved_names() {
        let layout = SpatialLayout::new(GridSize::new(3, 3).unwrap()).unwrap();
        assert!(GidSpace::for_network(&layout, 0, &["L2_basket"]).is_err());
        assert!(GidSpace::for_network(&layout, 0, &["extinput"]).is_err());
    }
}
