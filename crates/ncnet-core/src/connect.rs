//! Incoming edges of local target cells
//!
//! Every edge carries a weight and delay resolved from the distance between
//! source and target through the Gaussian kernel
//! `weight = w * exp(-d^2 / lamtha^2)`, `delay = delta / exp(-d^2 / lamtha^2)`.
//! Weight falls off and delay grows with distance.

use std::collections::BTreeMap;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{NetError, Result};
use crate::feed::ReceptorWeights;
use crate::gid::{Gid, GidSpace};
use crate::layout::{in_plane_distance, Position, SpatialLayout};
use crate::population::{CellType, Location, Population, Receptor, SynapseSite};
use crate::wiring::WiringTable;

/// Distance-dependent weight and delay of one projection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SynapticKernel {
    /// Weight at zero distance
    pub weight: f64,
    /// Delay at zero distance (ms)
    pub delay: f64,
    /// Spatial length constant
    pub lamtha: f64,
}

impl SynapticKernel {
    /// Create a kernel with validation
    pub fn new(weight: f64, delay: f64, lamtha: f64) -> Result<Self> {
        if lamtha.is_nan() || lamtha <= 0.0 {
            return Err(NetError::invalid_parameter("lamtha", lamtha.to_string(), "> 0.0"));
        }
        if delay.is_nan() || delay <= 0.0 {
            return Err(NetError::invalid_parameter("delay", delay.to_string(), "> 0.0"));
        }
        Ok(Self {
            weight,
            delay,
            lamtha,
        })
    }

    /// Weight and delay at distance `d`
    pub fn at(&self, d: f64) -> (f64, f64) {
        let falloff = (-(d * d) / (self.lamtha * self.lamtha)).exp();
        (self.weight * falloff, self.delay / falloff)
    }
}

/// Synapse on a specific cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AttachmentPoint {
    /// Target cell
    pub gid: Gid,
    /// Synapse on the target cell
    pub site: SynapseSite,
}

/// A resolved connection
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Edge {
    /// Presynaptic gid
    pub source: Gid,
    /// Postsynaptic attachment point
    pub target: AttachmentPoint,
    /// Resolved weight
    pub weight: f64,
    /// Resolved delay (ms)
    pub delay: f64,
    /// Spike detection threshold of the source
    pub threshold: f64,
}

/// Incoming edges of one target cell, grouped per synapse site
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncomingEdges {
    by_site: BTreeMap<SynapseSite, Vec<Edge>>,
}

impl IncomingEdges {
    /// Append an edge to its site's list
    pub fn push(&mut self, edge: Edge) {
        self.by_site.entry(edge.target.site).or_default().push(edge);
    }

    /// Edges onto one site, in creation order
    pub fn site(&self, site: &SynapseSite) -> &[Edge] {
        self.by_site.get(site).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Sites with at least one edge
    pub fn sites(&self) -> impl Iterator<Item = &SynapseSite> + '_ {
        self.by_site.keys()
    }

    /// All edges, site by site
    pub fn iter(&self) -> impl Iterator<Item = &Edge> + '_ {
        self.by_site.values().flatten()
    }

    /// Total number of edges
    pub fn len(&self) -> usize {
        self.by_site.values().map(Vec::len).sum()
    }

    /// True when no edge was created
    pub fn is_empty(&self) -> bool {
        self.by_site.is_empty()
    }
}

/// An external input projecting onto one cell
#[derive(Debug, Clone, PartialEq)]
pub struct InputProjection {
    /// Gid of the input instance
    pub source: Gid,
    /// Position of the input
    pub position: Position,
    /// Weights onto the target type
    pub weights: ReceptorWeights,
    /// Delay at zero distance (ms)
    pub delay: f64,
    /// Spatial length constant
    pub lamtha: f64,
    /// Dendritic location of the input
    pub location: Location,
    /// Receptors the input drives
    pub receptors: &'static [Receptor],
}

impl InputProjection {
    fn weight(&self, receptor: Receptor) -> f64 {
        match receptor {
            Receptor::Ampa => self.weights.ampa,
            Receptor::Nmda => self.weights.nmda,
            Receptor::GabaA | Receptor::GabaB => 0.0,
        }
    }
}

/// A cell owned by this rank
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalCell {
    /// Gid of the cell
    pub gid: Gid,
    /// Type of the cell
    pub cell_type: CellType,
    /// Position of the cell
    pub position: Position,
}

/// Builds incoming edges from the wiring table and the layout
#[derive(Debug, Clone, Copy)]
pub struct ConnectionBuilder<'a> {
    table: &'a WiringTable,
    layout: &'a SpatialLayout,
    space: &'a GidSpace,
    threshold: f64,
}

impl<'a> ConnectionBuilder<'a> {
    /// Create a builder
    pub fn new(
        table: &'a WiringTable,
        layout: &'a SpatialLayout,
        space: &'a GidSpace,
        threshold: f64,
    ) -> Self {
        Self {
            table,
            layout,
            space,
            threshold,
        }
    }

    /// Resolve a local cell from its gid
    pub fn local_cell(&self, gid: Gid) -> Result<LocalCell> {
        let (population, index) = self.space.locate(gid)?;
        let cell_type = population.cell_type().ok_or_else(|| {
            NetError::invalid_config(format!("gid {} of {} is not a cell", gid, population))
        })?;
        let position = self
            .layout
            .position(cell_type, index)
            .ok_or(NetError::GidOutOfRange {
                gid,
                total: self.space.total(),
            })?;
        Ok(LocalCell {
            gid,
            cell_type,
            position,
        })
    }

    /// Edges from every cell population onto `target`
    ///
    /// Rules are visited in table order and sources in ascending gid order.
    /// Zero-weight edges are still created.
    pub fn cell_edges(&self, target: &LocalCell) -> Result<IncomingEdges> {
        let mut edges = IncomingEdges::default();
        for rule in self.table.rules_into(target.cell_type) {
            let kernel = SynapticKernel::new(rule.weight, rule.delay, rule.lamtha)?;
            let sources = self
                .space
                .range(&Population::Cell(rule.source))
                .unwrap_or(0..0);
            let positions = self.layout.positions(rule.source);
            for (raw, source_pos) in sources.zip(positions) {
                let source = Gid::new(raw);
                if !rule.allow_self && source == target.gid {
                    continue;
                }
                let d = in_plane_distance(&target.position, source_pos);
                let (weight, delay) = kernel.at(d);
                for site in rule.sites() {
                    edges.push(Edge {
                        source,
                        target: AttachmentPoint {
                            gid: target.gid,
                            site,
                        },
                        weight,
                        delay,
                        threshold: self.threshold,
                    });
                }
            }
        }
        Ok(edges)
    }

    /// Add the edges of an external input onto `target`
    pub fn connect_input(
        &self,
        target: &LocalCell,
        input: &InputProjection,
        edges: &mut IncomingEdges,
    ) -> Result<()> {
        let d = in_plane_distance(&target.position, &input.position);
        for &receptor in input.receptors {
            let kernel = SynapticKernel::new(input.weight(receptor), input.delay, input.lamtha)?;
            let (weight, delay) = kernel.at(d);
            for site in input.location.sites(target.cell_type, receptor) {
                edges.push(Edge {
                    source: input.source,
                    target: AttachmentPoint {
                        gid: target.gid,
                        site,
                    },
                    weight,
                    delay,
                    threshold: self.threshold,
                });
            }
        }
        Ok(())
    }

    /// Cell-to-cell edges of many targets
    #[cfg(feature = "parallel")]
    pub fn cell_edges_all(&self, targets: &[LocalCell]) -> Result<Vec<IncomingEdges>> {
        targets.par_iter().map(|t| self.cell_edges(t)).collect()
    }

    /// Cell-to-cell edges of many targets
    #[cfg(not(feature = "parallel"))]
    pub fn cell_edges_all(&self, targets: &[LocalCell]) -> Result<Vec<IncomingEdges>> {
        targets.iter().map(|t| self.cell_edges(t)).collect()
    }
}
