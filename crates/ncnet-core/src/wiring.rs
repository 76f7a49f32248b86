//! Projection rules between cell populations

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{NetError, Result};
use crate::population::{CellType, Receptor, Section, SynapseSite};

/// Base synaptic delay of every local projection (ms)
pub const BASE_DELAY: f64 = 1.0;

/// Maximal conductances of the local projections
///
/// Projections with a single receptor carry a single weight.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SynapticWeights {
    /// L2 pyramidal to L2 pyramidal, AMPA
    pub l2pyr_l2pyr_ampa: f64,
    /// L2 pyramidal to L2 pyramidal, NMDA
    pub l2pyr_l2pyr_nmda: f64,
    /// L2 basket to L2 pyramidal, GABAA
    pub l2basket_l2pyr_gabaa: f64,
    /// L2 basket to L2 pyramidal, GABAB
    pub l2basket_l2pyr_gabab: f64,
    /// L2 pyramidal to L2 basket
    pub l2pyr_l2basket: f64,
    /// L2 basket to L2 basket
    pub l2basket_l2basket: f64,
    /// L5 pyramidal to L5 pyramidal, AMPA
    pub l5pyr_l5pyr_ampa: f64,
    /// L5 pyramidal to L5 pyramidal, NMDA
    pub l5pyr_l5pyr_nmda: f64,
    /// L2 pyramidal to L5 pyramidal
    pub l2pyr_l5pyr: f64,
    /// L2 basket to L5 pyramidal
    pub l2basket_l5pyr: f64,
    /// L5 basket to L5 pyramidal, GABAA
    pub l5basket_l5pyr_gabaa: f64,
    /// L5 basket to L5 pyramidal, GABAB
    pub l5basket_l5pyr_gabab: f64,
    /// L5 basket to L5 basket
    pub l5basket_l5basket: f64,
    /// L5 pyramidal to L5 basket
    pub l5pyr_l5basket: f64,
    /// L2 pyramidal to L5 basket
    pub l2pyr_l5basket: f64,
}

impl SynapticWeights {
    /// Validate weights
    pub fn validate(&self) -> Result<()> {
        let named = [
            ("l2pyr_l2pyr_ampa", self.l2pyr_l2pyr_ampa),
            ("l2pyr_l2pyr_nmda", self.l2pyr_l2pyr_nmda),
            ("l2basket_l2pyr_gabaa", self.l2basket_l2pyr_gabaa),
            ("l2basket_l2pyr_gabab", self.l2basket_l2pyr_gabab),
            ("l2pyr_l2basket", self.l2pyr_l2basket),
            ("l2basket_l2basket", self.l2basket_l2basket),
            ("l5pyr_l5pyr_ampa", self.l5pyr_l5pyr_ampa),
            ("l5pyr_l5pyr_nmda", self.l5pyr_l5pyr_nmda),
            ("l2pyr_l5pyr", self.l2pyr_l5pyr),
            ("l2basket_l5pyr", self.l2basket_l5pyr),
            ("l5basket_l5pyr_gabaa", self.l5basket_l5pyr_gabaa),
            ("l5basket_l5pyr_gabab", self.l5basket_l5pyr_gabab),
            ("l5basket_l5basket", self.l5basket_l5basket),
            ("l5pyr_l5basket", self.l5pyr_l5basket),
            ("l2pyr_l5basket", self.l2pyr_l5basket),
        ];
        for (name, value) in named {
            if !value.is_finite() || value < 0.0 {
                return Err(NetError::invalid_parameter(
                    format!("weights.{}", name),
                    value.to_string(),
                    ">= 0.0",
                ));
            }
        }
        Ok(())
    }
}

/// One projection from a source population onto a target population
#[derive(Debug, Clone, PartialEq)]
pub struct WiringRule {
    /// Presynaptic population
    pub source: CellType,
    /// Postsynaptic population
    pub target: CellType,
    /// Receptor of every synapse of this rule
    pub receptor: Receptor,
    /// Weight at zero distance
    pub weight: f64,
    /// Delay at zero distance (ms)
    pub delay: f64,
    /// Spatial length constant
    pub lamtha: f64,
    /// Whether a cell may connect to itself
    pub allow_self: bool,
    /// Target sections, each an independent edge
    pub sections: &'static [Section],
}

impl WiringRule {
    /// Synapse sites this rule attaches to
    pub fn sites(&self) -> impl Iterator<Item = SynapseSite> + '_ {
        self.sections
            .iter()
            .map(move |&section| SynapseSite::new(section, self.receptor))
    }
}

const DENDRITES: &[Section] = &[Section::ApicalOblique, Section::Basal2, Section::Basal3];
const INTERLAMINAR: &[Section] = &[
    Section::Basal2,
    Section::Basal3,
    Section::ApicalTuft,
    Section::ApicalOblique,
];
const SOMA: &[Section] = &[Section::Soma];
const TUFT: &[Section] = &[Section::ApicalTuft];

/// Closed table of projections
#[derive(Debug, Clone, PartialEq)]
pub struct WiringTable {
    rules: Vec<WiringRule>,
}

impl WiringTable {
    /// The laminar column projections with the given weights
    pub fn standard(weights: &SynapticWeights) -> Self {
        use CellType::*;
        use Receptor::*;

        let rule = |source, target, receptor, weight, lamtha, allow_self, sections| WiringRule {
            source,
            target,
            receptor,
            weight,
            delay: BASE_DELAY,
            lamtha,
            allow_self,
            sections,
        };

        let rules = vec![
            // onto L2 pyramidal
            rule(L2Pyramidal, L2Pyramidal, Ampa, weights.l2pyr_l2pyr_ampa, 3.0, false, DENDRITES),
            rule(L2Pyramidal, L2Pyramidal, Nmda, weights.l2pyr_l2pyr_nmda, 3.0, false, DENDRITES),
            rule(L2Basket, L2Pyramidal, GabaA, weights.l2basket_l2pyr_gabaa, 50.0, true, SOMA),
            rule(L2Basket, L2Pyramidal, GabaB, weights.l2basket_l2pyr_gabab, 50.0, true, SOMA),
            // onto L5 pyramidal
            rule(L5Pyramidal, L5Pyramidal, Ampa, weights.l5pyr_l5pyr_ampa, 3.0, false, DENDRITES),
            rule(L5Pyramidal, L5Pyramidal, Nmda, weights.l5pyr_l5pyr_nmda, 3.0, false, DENDRITES),
            rule(L5Basket, L5Pyramidal, GabaA, weights.l5basket_l5pyr_gabaa, 70.0, true, SOMA),
            rule(L5Basket, L5Pyramidal, GabaB, weights.l5basket_l5pyr_gabab, 70.0, true, SOMA),
            rule(L2Pyramidal, L5Pyramidal, Ampa, weights.l2pyr_l5pyr, 3.0, true, INTERLAMINAR),
            rule(L2Basket, L5Pyramidal, GabaA, weights.l2basket_l5pyr, 50.0, true, TUFT),
            // onto L2 basket
            rule(L2Pyramidal, L2Basket, Ampa, weights.l2pyr_l2basket, 3.0, true, SOMA),
            rule(L2Basket, L2Basket, GabaA, weights.l2basket_l2basket, 20.0, true, SOMA),
            // onto L5 basket
            rule(L5Basket, L5Basket, GabaA, weights.l5basket_l5basket, 20.0, false, SOMA),
            rule(L5Pyramidal, L5Basket, Ampa, weights.l5pyr_l5basket, 3.0, true, SOMA),
            rule(L2Pyramidal, L5Basket, Ampa, weights.l2pyr_l5basket, 3.0, true, SOMA),
        ];

        Self { rules }
    }

    /// All rules in table order
    pub fn rules(&self) -> &[WiringRule] {
        &self.rules
    }

    /// Rules projecting onto a target population, in table order
    pub fn rules_into(&self, target: CellType) -> impl Iterator<Item = &WiringRule> + '_ {
        self.rules.iter().filter(move |r| r.target == target)
    }

    /// Rule for a (source, target, receptor) key
    pub fn get(&self, source: CellType, target: CellType, receptor: Receptor) -> Option<&WiringRule> {
        self.rules
            .iter()
            .find(|r| r.source == source && r.target == target && r.receptor == receptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_keys_are_unique() {
        let table = WiringTable::standard(&SynapticWeights::default());
        assert_eq!(table.rules().len(), 15);
        for (i, a) in table.rules().iter().enumerate() {
            for b in &table.rules()[i + 1..] {
                assert!(
                    (a.source, a.target, a.receptor) != (b.source, b.target, b.receptor),
                    "duplicate rule {:?}",
                    a
                );
            }
        }
    }

    #[test]
    fn test_self_connection_policy() {
        let table = WiringTable::standard(&SynapticWeights::default());
        use CellType::*;
        assert!(!table.get(L2Pyramidal, L2Pyramidal, Receptor::Ampa).unwrap().allow_self);
        assert!(!table.get(L5Pyramidal, L5Pyramidal, Receptor::Nmda).unwrap().allow_self);
        assert!(table.get(L2Basket, L2Basket, Receptor::GabaA).unwrap().allow_self);
        assert!(!table.get(L5Basket, L5Basket, Receptor::GabaA).unwrap().allow_self);
    }

    #[test]
    fn test_weights_and_sites() {
        let weights = SynapticWeights {
            l2pyr_l5pyr: 0.25,
            l2basket_l5pyr: 0.5,
            ..Default::default()
        };
        let table = WiringTable::standard(&weights);
        let rule = table
            .get(CellType::L2Pyramidal, CellType::L5Pyramidal, Receptor::Ampa)
            .unwrap();
        assert_eq!(rule.weight, 0.25);
        assert_eq!(rule.lamtha, 3.0);
        assert_eq!(rule.sites().count(), 4);

        let rule = table
            .get(CellType::L2Basket, CellType::L5Pyramidal, Receptor::GabaA)
            .unwrap();
        assert_eq!(rule.weight, 0.5);
        assert_eq!(
            rule.sites().collect::<Vec<_>>(),
            vec![SynapseSite::new(Section::ApicalTuft, Receptor::GabaA)]
        );
        assert!(table
            .get(CellType::L2Basket, CellType::L5Pyramidal, Receptor::GabaB)
            .is_none());
    }

    #[test]
    fn test_rules_into() {
        let table = WiringTable::standard(&SynapticWeights::default());
        assert_eq!(table.rules_into(CellType::L5Pyramidal).count(), 6);
        assert_eq!(table.rules_into(CellType::L2Basket).count(), 2);
        assert!(table.rules_into(CellType::L5Basket).all(|r| r.sections == SOMA));
    }

    #[test]
    fn test_negative_weight_rejected() {
        let weights = SynapticWeights {
            l5pyr_l5basket: -1.0,
            ..Default::default()
        };
        assert!(weights.validate().is_err());
    }
}
