//! The three additive log-prior terms scored on each genotype combination:
//! genotypes given allele frequencies (Hardy-Weinberg), allele frequencies
//! under a neutral-diffusion model (Ewens sampling formula), and observation
//! counts given genotypes (binomial, with optional strand balance).
//!
//! Every term is independently toggleable; a disabled term contributes 0 in
//! log space.

use std::collections::BTreeMap;

use statrs::function::gamma::ln_gamma;

use crate::allele::Allele;
use crate::config::CallerConfig;
use crate::genotype::Genotype;
use crate::sample::SampleObservations;

/// ln(n!)
fn ln_factorial(n: u32) -> f64 {
    ln_gamma(f64::from(n) + 1.0)
}

/// ln of the number of distinct orderings of a multiset:
/// total! / Π countᵢ!
fn ln_multiset_permutations(total: u32, counts: impl Iterator<Item = u32>) -> f64 {
    counts.fold(ln_factorial(total), |acc, c| acc - ln_factorial(c))
}

/// ln C(n, k)
fn ln_choose(n: u32, k: u32) -> f64 {
    ln_factorial(n) - ln_factorial(k) - ln_factorial(n - k)
}

/// ln Binomial(k; n, p), with the 0·ln(0) := 0 convention at the support
/// boundaries.
fn ln_binomial_pmf(k: u32, n: u32, p: f64) -> f64 {
    if p <= 0.0 {
        return if k == 0 { 0.0 } else { f64::NEG_INFINITY };
    }
    if p >= 1.0 {
        return if k == n { 0.0 } else { f64::NEG_INFINITY };
    }
    ln_choose(n, k) + f64::from(k) * p.ln() + f64::from(n - k) * (1.0 - p).ln()
}

/// Which prior terms are active, and under what population assumptions.
#[derive(Debug, Clone, Copy)]
pub struct PriorOptions {
    /// Treat all samples as one pool for the genotype-frequency term
    pub pooled: bool,
    /// Score the Hardy-Weinberg genotype term
    pub hwe: bool,
    /// Score the binomial observation-count term
    pub binomial: bool,
    /// Score the strand allele-balance term
    pub allele_balance: bool,
    /// θ for the neutral-diffusion allele-frequency term
    pub theta: f64,
}

impl PriorOptions {
    /// Prior configuration for the main combo search.
    #[must_use]
    pub fn from_config(config: &CallerConfig) -> Self {
        Self {
            pooled: config.pooled,
            hwe: config.hwe_priors,
            binomial: config.obs_binomial_priors,
            allele_balance: config.allele_balance_priors,
            theta: config.diffusion_prior_scalar,
        }
    }

    /// Prior configuration for the marginalization pass, which always acts
    /// as if pooled with HWE priors on to maximize neighborhood breadth.
    #[must_use]
    pub fn for_marginalization(config: &CallerConfig) -> Self {
        Self { pooled: true, hwe: true, ..Self::from_config(config) }
    }
}

/// Site-wide observed support per candidate allele, used by the
/// observation-count prior terms.
#[derive(Debug)]
pub struct ObservedCounts {
    support: BTreeMap<Allele, (u32, u32)>,
    /// Total observation count at the site, over all alleles
    pub coverage: u32,
}

impl ObservedCounts {
    /// Tallies support and forward-strand support for each candidate allele
    /// over all samples with data.
    #[must_use]
    pub fn tally(samples: &[SampleObservations<'_>], candidates: &[Allele]) -> Self {
        let mut support: BTreeMap<Allele, (u32, u32)> = BTreeMap::new();
        let mut coverage = 0;
        for sample in samples {
            coverage += sample.coverage();
            for allele in candidates {
                let entry = support.entry(allele.clone()).or_insert((0, 0));
                entry.0 += sample.support(allele);
                entry.1 += sample.forward_support(allele);
            }
        }
        Self { support, coverage }
    }

    /// Observations supporting the allele, across samples.
    #[must_use]
    pub fn support(&self, allele: &Allele) -> u32 {
        self.support.get(allele).map_or(0, |(n, _)| *n)
    }

    /// Forward-strand observations supporting the allele, across samples.
    #[must_use]
    pub fn forward_support(&self, allele: &Allele) -> u32 {
        self.support.get(allele).map_or(0, |(_, f)| *f)
    }
}

/// log P(genotype assignment | allele-count vector) under Hardy-Weinberg in
/// a single panmictic population.
///
/// The probability that the combo's specific partition of the pooled allele
/// counts across samples arises: Π_s perms(genotype_s) / perms(pool).
/// Pooled mode collapses the partition, and the term is uniform (0).
#[must_use]
pub fn ln_genotypes_given_frequencies<'a>(
    genotypes: impl Iterator<Item = &'a Genotype>,
    combo_counts: &[(Allele, u32)],
    pooled: bool,
) -> f64 {
    if pooled {
        return 0.0;
    }
    let total: u32 = combo_counts.iter().map(|(_, n)| *n).sum();
    let per_sample: f64 = genotypes
        .map(|g| ln_multiset_permutations(g.ploidy(), g.alleles().map(|(_, n)| n)))
        .sum();
    per_sample - ln_multiset_permutations(total, combo_counts.iter().map(|(_, n)| *n))
}

/// log P(allele-count vector) under the Ewens sampling formula, the
/// finite-sample form of the neutral-diffusion prior: the expected number of
/// alleles present in i copies is θ/i, with the standard corrections at the
/// singleton and near-fixed edges of the spectrum.
#[must_use]
pub fn ln_allele_frequency_prior(combo_counts: &[(Allele, u32)], theta: f64) -> f64 {
    let m: u32 = combo_counts.iter().map(|(_, n)| *n).sum();
    if m == 0 {
        return 0.0;
    }
    // frequency spectrum: a_j = number of alleles present in j copies
    let mut spectrum: BTreeMap<u32, u32> = BTreeMap::new();
    for (_, n) in combo_counts {
        if *n > 0 {
            *spectrum.entry(*n).or_insert(0) += 1;
        }
    }
    let mut p = ln_factorial(m);
    for h in 0..m {
        p -= (theta + f64::from(h)).ln();
    }
    for (&j, &a_j) in &spectrum {
        p += f64::from(a_j) * (theta.ln() - f64::from(j).ln());
        p -= ln_factorial(a_j);
    }
    p
}

/// log P(genotype | allele frequencies) for one sample under Hardy-Weinberg:
/// the multinomial over the genotype's allele multiplicities. Alleles with
/// zero frequency make the genotype impossible.
///
/// Used by the expectation-maximization search to fold re-estimated
/// frequencies into per-sample genotype rankings.
#[must_use]
pub fn ln_genotype_given_allele_frequencies(
    genotype: &Genotype,
    frequencies: &BTreeMap<Allele, f64>,
) -> f64 {
    let mut p =
        ln_multiset_permutations(genotype.ploidy(), genotype.alleles().map(|(_, n)| n));
    for (allele, multiplicity) in genotype.alleles() {
        let frequency = frequencies.get(allele).copied().unwrap_or(0.0);
        if frequency <= 0.0 {
            return f64::NEG_INFINITY;
        }
        p += f64::from(multiplicity) * frequency.ln();
    }
    p
}

/// log P(observed support | combo allele counts): for each allele carried by
/// the combo, its supporting-read count versus the total count of
/// observations supporting combo alleles is scored under a binomial with
/// success probability count/total-ploidy. Observations of alleles outside
/// the combo carry no information about its internal balance, so they are
/// excluded from the trial count. When `allele_balance` is set,
/// forward-strand support is additionally scored against an even split.
#[must_use]
pub fn ln_observation_prior(
    combo_counts: &[(Allele, u32)],
    observed: &ObservedCounts,
    allele_balance: bool,
) -> f64 {
    let total_ploidy: u32 = combo_counts.iter().map(|(_, n)| *n).sum();
    let combo_support: u32 = combo_counts
        .iter()
        .filter(|(_, n)| *n > 0)
        .map(|(allele, _)| observed.support(allele))
        .sum();
    if total_ploidy == 0 || combo_support == 0 {
        return 0.0;
    }
    let mut p = 0.0;
    for (allele, count) in combo_counts {
        if *count == 0 {
            continue;
        }
        let expected = f64::from(*count) / f64::from(total_ploidy);
        let support = observed.support(allele);
        p += ln_binomial_pmf(support, combo_support, expected);
        if allele_balance && support > 0 {
            p += ln_binomial_pmf(observed.forward_support(allele), support, 0.5);
        }
    }
    p
}
