//! Wave-family activation patterns ("chromosomes")
//!
//! A chromosome records which wave families carry data at a storm peak. The
//! set of all non-empty patterns is enumerated once, in a fixed order, and each
//! pattern receives a [`ChromosomeId`]. Probabilities and correlation entries
//! are keyed by that id rather than by an implicit array position.

use crate::errors::{EmulatorError, EmulatorResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest number of wave families a chromosome set can be built for.
pub const MAX_FAMILIES: usize = 16;

/// Stable identifier of a chromosome within a [`ChromosomeSet`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChromosomeId(pub usize);

impl fmt::Display for ChromosomeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chromosome {
    pub id: ChromosomeId,
    /// One gene per wave family, `true` where the family is active.
    pub genes: Vec<bool>,
}

impl Chromosome {
    /// Number of active families.
    pub fn weight(&self) -> usize {
        self.genes.iter().filter(|g| **g).count()
    }

    /// Indices of the active families, in family order.
    pub fn active_families(&self) -> Vec<usize> {
        active_positions(&self.genes)
    }

    /// Whether `genes` has every family of this chromosome active.
    pub fn is_covered_by(&self, genes: &[bool]) -> bool {
        self.genes
            .iter()
            .zip(genes.iter())
            .all(|(mine, other)| !*mine || *other)
    }
}

pub(crate) fn active_positions(genes: &[bool]) -> Vec<usize> {
    genes
        .iter()
        .enumerate()
        .filter_map(|(i, g)| if *g { Some(i) } else { None })
        .collect()
}

/// All 2^F - 1 non-empty activation patterns over F families.
///
/// Patterns are ordered by weight (number of active families) and, within a
/// weight class, lexicographically with the first family most significant:
/// for three families the order is `100, 010, 001, 110, 101, 011, 111`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChromosomeSet {
    n_families: usize,
    chromosomes: Vec<Chromosome>,
}

impl ChromosomeSet {
    pub fn enumerate(n_families: usize) -> EmulatorResult<Self> {
        if n_families == 0 || n_families > MAX_FAMILIES {
            return Err(EmulatorError::InvalidInput(format!(
                "Chromosomes need between 1 and {} families, got {}",
                MAX_FAMILIES, n_families
            )));
        }

        let mut patterns: Vec<Vec<bool>> = (1u32..(1u32 << n_families))
            .map(|mask| {
                (0..n_families)
                    .map(|i| mask & (1 << (n_families - 1 - i)) != 0)
                    .collect()
            })
            .collect();
        // Within a weight class a larger mask has its genes further left
        patterns.sort_by(|a, b| {
            let wa = a.iter().filter(|g| **g).count();
            let wb = b.iter().filter(|g| **g).count();
            wa.cmp(&wb).then_with(|| b.cmp(a))
        });

        let chromosomes = patterns
            .into_iter()
            .enumerate()
            .map(|(i, genes)| Chromosome {
                id: ChromosomeId(i),
                genes,
            })
            .collect();

        Ok(Self {
            n_families,
            chromosomes,
        })
    }

    pub fn n_families(&self) -> usize {
        self.n_families
    }

    pub fn len(&self) -> usize {
        self.chromosomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chromosomes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Chromosome> {
        self.chromosomes.iter()
    }

    pub fn get(&self, id: ChromosomeId) -> EmulatorResult<&Chromosome> {
        self.chromosomes
            .get(id.0)
            .filter(|c| c.id == id)
            .ok_or_else(|| EmulatorError::Lookup(format!("Unknown chromosome {}", id)))
    }

    /// Find the id of an activation pattern.
    ///
    /// Returns `None` for the all-inactive pattern or a length mismatch.
    pub fn position(&self, genes: &[bool]) -> Option<ChromosomeId> {
        if genes.len() != self.n_families {
            return None;
        }
        self.chromosomes
            .iter()
            .find(|c| c.genes.as_slice() == genes)
            .map(|c| c.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bits(s: &str) -> Vec<bool> {
        s.chars().map(|c| c == '1').collect()
    }

    #[test]
    fn three_families_order() {
        let set = ChromosomeSet::enumerate(3).unwrap();
        let expected = ["100", "010", "001", "110", "101", "011", "111"];
        assert_eq!(set.len(), 7);
        for (chromosome, pattern) in set.iter().zip(expected.iter()) {
            assert_eq!(chromosome.genes, bits(pattern));
        }
    }

    #[test]
    fn weight_classes_have_binomial_counts() {
        for n in 1..=6 {
            let set = ChromosomeSet::enumerate(n).unwrap();
            assert_eq!(set.len(), (1 << n) - 1);

            let mut counts = vec![0usize; n + 1];
            for c in set.iter() {
                counts[c.weight()] += 1;
            }
            assert_eq!(counts[0], 0);

            // Pascal's triangle row n
            let mut binom = 1usize;
            for (k, count) in counts.iter().enumerate().skip(1) {
                binom = binom * (n - k + 1) / k;
                assert_eq!(*count, binom, "n={} weight={}", n, k);
            }
        }
    }

    #[test]
    fn patterns_are_distinct_and_ids_match_positions() {
        let set = ChromosomeSet::enumerate(4).unwrap();
        for (i, c) in set.iter().enumerate() {
            assert_eq!(c.id, ChromosomeId(i));
            assert_eq!(set.position(&c.genes), Some(c.id));
            assert!(c.weight() > 0);
        }
        let mut genes: Vec<_> = set.iter().map(|c| c.genes.clone()).collect();
        genes.sort();
        genes.dedup();
        assert_eq!(genes.len(), 15);
    }

    #[test]
    fn enumeration_is_deterministic() {
        assert_eq!(
            ChromosomeSet::enumerate(5).unwrap(),
            ChromosomeSet::enumerate(5).unwrap()
        );
    }

    #[test]
    fn empty_pattern_has_no_position() {
        let set = ChromosomeSet::enumerate(3).unwrap();
        assert_eq!(set.position(&bits("000")), None);
        assert_eq!(set.position(&bits("10")), None);
    }

    #[test]
    fn coverage_and_active_families() {
        let set = ChromosomeSet::enumerate(3).unwrap();
        let c = set.get(set.position(&bits("101")).unwrap()).unwrap();
        assert_eq!(c.active_families(), vec![0, 2]);
        assert!(c.is_covered_by(&bits("111")));
        assert!(c.is_covered_by(&bits("101")));
        assert!(!c.is_covered_by(&bits("100")));
    }

    #[test]
    fn invalid_family_counts() {
        assert!(ChromosomeSet::enumerate(0).is_err());
        assert!(ChromosomeSet::enumerate(MAX_FAMILIES + 1).is_err());
        let set = ChromosomeSet::enumerate(2).unwrap();
        assert!(set.get(ChromosomeId(3)).is_err());
    }
}
