//! Assignment of gids to worker ranks
//!
//! Cells are dealt round-robin over ranks. Every per-cell input lives on the
//! rank of the cell it drives, and the shared ongoing inputs are dealt
//! round-robin over their own local index. No communication is needed: every
//! rank computes the same partition from the same gid space.

use crate::error::{NetError, Result};
use crate::gid::{Gid, GidSpace};
use crate::population::Population;

/// A local cell together with the per-cell inputs co-located with it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellGroup {
    /// Gid of the cell
    pub cell: Gid,
    /// Gids of its private inputs, in per-cell input name order
    pub feeds: Vec<Gid>,
}

/// Gids owned by one rank
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankPartition {
    rank: usize,
    size: usize,
    groups: Vec<CellGroup>,
    extinputs: Vec<Gid>,
    owned: Vec<Gid>,
}

impl RankPartition {
    /// Compute the partition for `rank` out of `size` ranks
    pub fn new(space: &GidSpace, rank: usize, size: usize) -> Result<Self> {
        validate_rank(rank, size)?;

        let n_cells = space.cell_count();
        let unique_starts: Vec<u32> = space
            .populations()
            .filter(|(p, _)| matches!(p, Population::Unique(_)))
            .map(|(_, r)| r.start)
            .collect();

        let groups: Vec<CellGroup> = (rank as u32..n_cells)
            .step_by(size)
            .map(|cell| CellGroup {
                cell: Gid::new(cell),
                feeds: unique_starts.iter().map(|start| Gid::new(cell + start)).collect(),
            })
            .collect();

        let extinputs: Vec<Gid> = space
            .range(&Population::ExtInput)
            .map(|range| {
                range
                    .skip(rank)
                    .step_by(size)
                    .map(Gid::new)
                    .collect()
            })
            .unwrap_or_default();

        let mut owned: Vec<Gid> = groups
            .iter()
            .flat_map(|g| std::iter::once(g.cell).chain(g.feeds.iter().copied()))
            .chain(extinputs.iter().copied())
            .collect();
        owned.sort_unstable();

        log::debug!(
            "Rank {}/{} owns {} cells, {} shared inputs, {} gids",
            rank,
            size,
            groups.len(),
            extinputs.len(),
            owned.len()
        );

        Ok(Self {
            rank,
            size,
            groups,
            extinputs,
            owned,
        })
    }

    /// Rank this partition belongs to
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Number of ranks
    pub fn size(&self) -> usize {
        self.size
    }

    /// Owned gids in ascending order
    pub fn owned_gids(&self) -> &[Gid] {
        &self.owned
    }

    /// Owned cells, each followed by its co-located private inputs
    pub fn groups(&self) -> &[CellGroup] {
        &self.groups
    }

    /// Owned shared ongoing inputs
    pub fn extinputs(&self) -> &[Gid] {
        &self.extinputs
    }

    /// Owned gids in per-cell grouping order, shared inputs last
    pub fn grouped_gids(&self) -> Vec<Gid> {
        self.groups
            .iter()
            .flat_map(|g| std::iter::once(g.cell).chain(g.feeds.iter().copied()))
            .chain(self.extinputs.iter().copied())
            .collect()
    }

    /// True if this rank owns the gid
    pub fn owns(&self, gid: Gid) -> bool {
        self.owned.binary_search(&gid).is_ok()
    }
}

/// Rank that owns a gid
pub fn rank_of(space: &GidSpace, gid: Gid, size: usize) -> Result<usize> {
    validate_rank(0, size)?;
    let (population, index) = space.locate(gid)?;
    let key = match population {
        Population::Cell(_) => gid.raw() as usize,
        // index of a per-cell input is the gid of its cell
        Population::Unique(_) | Population::ExtInput => index,
    };
    Ok(key % size)
}

fn validate_rank(rank: usize, size: usize) -> Result<()> {
    if size == 0 {
        return Err(NetError::invalid_parameter("ranks", "0", ">= 1"));
    }
    if rank >= size {
        return Err(NetError::invalid_parameter(
            "rank",
            rank.to_string(),
            format!("< {}", size),
        ));
    }
    Ok(())
}
