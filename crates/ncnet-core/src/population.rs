//! Closed sets of populations, receptors and attachment sections

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{NetError, Result};

/// Biological cell type of a population
///
/// Variant order is the declared gid concatenation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub enum CellType {
    /// Layer 2/3 inhibitory basket cells
    L2Basket,
    /// Layer 2/3 excitatory pyramidal cells
    L2Pyramidal,
    /// Layer 5 inhibitory basket cells
    L5Basket,
    /// Layer 5 excitatory pyramidal cells
    L5Pyramidal,
}

impl CellType {
    /// All cell types in declared order
    pub const ALL: [CellType; 4] = [
        CellType::L2Basket,
        CellType::L2Pyramidal,
        CellType::L5Basket,
        CellType::L5Pyramidal,
    ];

    /// Canonical population name
    pub const fn name(self) -> &'static str {
        match self {
            CellType::L2Basket => "L2_basket",
            CellType::L2Pyramidal => "L2_pyramidal",
            CellType::L5Basket => "L5_basket",
            CellType::L5Pyramidal => "L5_pyramidal",
        }
    }

    /// Excitatory grid population
    pub const fn is_pyramidal(self) -> bool {
        matches!(self, CellType::L2Pyramidal | CellType::L5Pyramidal)
    }

    /// Deep layer population
    pub const fn is_layer5(self) -> bool {
        matches!(self, CellType::L5Basket | CellType::L5Pyramidal)
    }
}

impl fmt::Display for CellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CellType {
    type Err = NetError;

    fn from_str(s: &str) -> Result<Self> {
        CellType::ALL
            .into_iter()
            .find(|cell_type| cell_type.name() == s)
            .ok_or_else(|| NetError::invalid_config(format!("unknown cell type '{}'", s)))
    }
}

impl TryFrom<String> for CellType {
    type Error = NetError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<CellType> for String {
    fn from(value: CellType) -> Self {
        value.name().to_string()
    }
}

/// A named gid population
///
/// The derived ordering is the gid concatenation order: cell populations in
/// declared order, then the shared ongoing input, then per-cell inputs sorted
/// by name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Population {
    /// One of the four cell populations
    Cell(CellType),
    /// Legacy shared ongoing (rhythmic) input
    ExtInput,
    /// Per-cell private input, one instance for every cell
    Unique(String),
}

impl Population {
    /// Name of the shared ongoing input population
    pub const EXTINPUT: &'static str = "extinput";

    /// Resolve a population from its canonical name
    pub fn from_name(name: &str) -> Self {
        if name == Self::EXTINPUT {
            return Population::ExtInput;
        }
        match name.parse::<CellType>() {
            Ok(cell_type) => Population::Cell(cell_type),
            Err(_) => Population::Unique(name.to_string()),
        }
    }

    /// Canonical name
    pub fn name(&self) -> &str {
        match self {
            Population::Cell(cell_type) => cell_type.name(),
            Population::ExtInput => Self::EXTINPUT,
            Population::Unique(name) => name,
        }
    }

    /// Cell type, if this is a cell population
    pub fn cell_type(&self) -> Option<CellType> {
        match self {
            Population::Cell(cell_type) => Some(*cell_type),
            _ => None,
        }
    }

    /// True for populations made of external inputs
    pub fn is_input(&self) -> bool {
        !matches!(self, Population::Cell(_))
    }
}

impl fmt::Display for Population {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Synaptic receptor type
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Receptor {
    /// Fast excitatory
    Ampa,
    /// Slow excitatory
    Nmda,
    /// Fast inhibitory
    GabaA,
    /// Slow inhibitory
    GabaB,
}

impl fmt::Display for Receptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Receptor::Ampa => "ampa",
            Receptor::Nmda => "nmda",
            Receptor::GabaA => "gabaa",
            Receptor::GabaB => "gabab",
        };
        f.write_str(name)
    }
}

/// Compartment of a target cell that carries a synapse
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Section {
    /// Cell body
    Soma,
    /// Apical oblique dendrite
    ApicalOblique,
    /// Second basal dendrite
    Basal2,
    /// Third basal dendrite
    Basal3,
    /// Apical tuft
    ApicalTuft,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Section::Soma => "soma",
            Section::ApicalOblique => "apical_oblique",
            Section::Basal2 => "basal_2",
            Section::Basal3 => "basal_3",
            Section::ApicalTuft => "apical_tuft",
        };
        f.write_str(name)
    }
}

/// A receptor on a section: one synapse placeholder on the solver side
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SynapseSite {
    /// Section carrying the synapse
    pub section: Section,
    /// Receptor type of the synapse
    pub receptor: Receptor,
}

impl SynapseSite {
    /// Create a new synapse site
    pub const fn new(section: Section, receptor: Receptor) -> Self {
        Self { section, receptor }
    }
}

impl fmt::Display for SynapseSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.section, self.receptor)
    }
}

/// Dendritic location targeted by an external input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Location {
    /// Basal and oblique dendrites
    #[default]
    Proximal,
    /// Apical tuft
    Distal,
}

impl Location {
    /// Sites an input at this location reaches on a cell of the given type
    ///
    /// Basket cells receive every external input on the soma.
    pub fn sites(self, cell_type: CellType, receptor: Receptor) -> Vec<SynapseSite> {
        if !cell_type.is_pyramidal() {
            return vec![SynapseSite::new(Section::Soma, receptor)];
        }
        match self {
            Location::Proximal => vec![
                SynapseSite::new(Section::Basal2, receptor),
                SynapseSite::new(Section::Basal3, receptor),
                SynapseSite::new(Section::ApicalOblique, receptor),
            ],
            Location::Distal => vec![SynapseSite::new(Section::ApicalTuft, receptor)],
        }
    }
}
