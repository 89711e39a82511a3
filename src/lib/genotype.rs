//! Genotypes as fixed-cardinality allele multisets, and their enumeration.

use std::fmt;

use ahash::AHashMap;
use itertools::Itertools;

use crate::allele::Allele;
use crate::sample::SampleObservations;

/// An unordered multiset of alleles of cardinality equal to the sample's
/// ploidy.
///
/// Stored as sorted (allele, multiplicity) pairs so that equality and
/// hashing are multiset equality regardless of construction order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Genotype {
    ploidy: u32,
    counts: Vec<(Allele, u32)>,
}

impl Genotype {
    /// Builds a genotype from its constituent alleles (with repetition).
    #[must_use]
    pub fn new(alleles: impl IntoIterator<Item = Allele>) -> Self {
        let mut sorted: Vec<Allele> = alleles.into_iter().collect();
        sorted.sort();
        let mut counts: Vec<(Allele, u32)> = Vec::new();
        for allele in sorted {
            match counts.last_mut() {
                Some((last, n)) if *last == allele => *n += 1,
                _ => counts.push((allele, 1)),
            }
        }
        let ploidy = counts.iter().map(|(_, n)| n).sum();
        Self { ploidy, counts }
    }

    /// The homozygous genotype for one allele at the given ploidy.
    #[must_use]
    pub fn homozygote(ploidy: u32, allele: Allele) -> Self {
        Self { ploidy, counts: vec![(allele, ploidy)] }
    }

    /// Number of allele copies in the multiset.
    #[must_use]
    pub fn ploidy(&self) -> u32 {
        self.ploidy
    }

    /// True when all allele copies are the same allele.
    #[must_use]
    pub fn is_homozygous(&self) -> bool {
        self.counts.len() == 1
    }

    /// Multiplicity of the given allele in the multiset (0 when absent).
    #[must_use]
    pub fn allele_count(&self, allele: &Allele) -> u32 {
        self.counts
            .iter()
            .find(|(a, _)| a == allele)
            .map_or(0, |(_, n)| *n)
    }

    /// True when the allele appears in the multiset.
    #[must_use]
    pub fn contains(&self, allele: &Allele) -> bool {
        self.allele_count(allele) > 0
    }

    /// Iterates over (allele, multiplicity) pairs in allele order.
    pub fn alleles(&self) -> impl Iterator<Item = (&Allele, u32)> {
        self.counts.iter().map(|(a, n)| (a, *n))
    }

    /// Iterates over the distinct alleles in the multiset.
    pub fn unique_alleles(&self) -> impl Iterator<Item = &Allele> {
        self.counts.iter().map(|(a, _)| a)
    }

    /// The first (lowest-ordered) allele of the multiset.
    ///
    /// For homozygotes this is the single constituent allele.
    #[must_use]
    pub fn first_allele(&self) -> &Allele {
        &self.counts[0].0
    }

    /// True when the sample has at least one observation supporting at
    /// least one allele of this genotype.
    #[must_use]
    pub fn has_any_support(&self, sample: &SampleObservations<'_>) -> bool {
        self.unique_alleles().any(|a| sample.has_observation_of(a))
    }

    /// True when the sample has at least one observation supporting every
    /// allele of this genotype.
    #[must_use]
    pub fn has_full_support(&self, sample: &SampleObservations<'_>) -> bool {
        self.unique_alleles().all(|a| sample.has_observation_of(a))
    }
}

impl fmt::Display for Genotype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (allele, count) in &self.counts {
            for _ in 0..*count {
                if !first {
                    write!(f, "/")?;
                }
                write!(f, "{allele}")?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Enumerates every multiset of size `ploidy` over the candidate alleles.
///
/// For `k` candidates at ploidy `p` this yields exactly C(k+p−1, p) unique
/// genotypes.
#[must_use]
pub fn enumerate_genotypes(ploidy: u32, candidates: &[Allele]) -> Vec<Genotype> {
    (0..candidates.len())
        .combinations_with_replacement(ploidy as usize)
        .map(|indices| Genotype::new(indices.into_iter().map(|i| candidates[i].clone())))
        .collect()
}

/// Per-site genotype cache keyed by ploidy.
///
/// Sites with mixed-ploidy cohorts enumerate each distinct ploidy once.
#[derive(Debug, Default)]
pub struct GenotypePool {
    by_ploidy: AHashMap<u32, Vec<Genotype>>,
}

impl GenotypePool {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns (enumerating on first use) all genotypes at the ploidy.
    pub fn genotypes(&mut self, ploidy: u32, candidates: &[Allele]) -> &[Genotype] {
        self.by_ploidy
            .entry(ploidy)
            .or_insert_with(|| enumerate_genotypes(ploidy, candidates))
    }
}
