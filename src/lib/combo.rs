//! Joint genotype combinations across samples, with their priors.
//!
//! A [`GenotypeCombo`] assigns one scored genotype to every sample with
//! data, identified by stable entry indices into the per-sample likelihood
//! lists. The choice vector is ordered by the input sample order, which
//! makes it the combo's dedup identity and keeps tie-breaking deterministic.

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use ahash::AHashSet;

use crate::allele::Allele;
use crate::genotype::Genotype;
use crate::likelihood::SampleLikelihoods;
use crate::priors::{
    ln_allele_frequency_prior, ln_genotypes_given_frequencies, ln_observation_prior,
    ObservedCounts, PriorOptions,
};

/// A joint assignment of one genotype to each sample at a site.
#[derive(Debug, Clone)]
pub struct GenotypeCombo {
    choices: Vec<usize>,
    /// Σ over samples of log P(reads | chosen genotype)
    pub log_likelihood: f64,
    /// log P(genotypes | allele frequencies), Hardy-Weinberg term
    pub ln_prior_genotypes: f64,
    /// log P(allele frequencies), neutral-diffusion term
    pub ln_prior_frequencies: f64,
    /// log P(observation counts | genotypes), binomial/balance term
    pub ln_prior_observations: f64,
}

impl GenotypeCombo {
    /// Builds a combo from per-sample entry choices, scoring its summed data
    /// likelihood and all active prior terms.
    #[must_use]
    pub fn from_choices(
        choices: Vec<usize>,
        samples: &[SampleLikelihoods],
        observed: &ObservedCounts,
        priors: &PriorOptions,
    ) -> Self {
        debug_assert_eq!(choices.len(), samples.len());
        let log_likelihood = choices
            .iter()
            .zip(samples)
            .map(|(&entry, sample)| sample.entry(entry).log_likelihood)
            .sum();

        let counts = tally_alleles(&choices, samples);
        let ln_prior_genotypes = if priors.hwe {
            let genotypes = choices
                .iter()
                .zip(samples)
                .map(|(&entry, sample)| &sample.entry(entry).genotype);
            ln_genotypes_given_frequencies(genotypes, &counts, priors.pooled)
        } else {
            0.0
        };
        let ln_prior_frequencies = ln_allele_frequency_prior(&counts, priors.theta);
        let ln_prior_observations = if priors.binomial {
            ln_observation_prior(&counts, observed, priors.allele_balance)
        } else {
            0.0
        };

        Self {
            choices,
            log_likelihood,
            ln_prior_genotypes,
            ln_prior_frequencies,
            ln_prior_observations,
        }
    }

    /// Per-sample chosen entry indices, in input sample order.
    #[must_use]
    pub fn choices(&self) -> &[usize] {
        &self.choices
    }

    /// The genotype this combo assigns to sample `index`.
    #[must_use]
    pub fn genotype<'a>(&self, samples: &'a [SampleLikelihoods], index: usize) -> &'a Genotype {
        &samples[index].entry(self.choices[index]).genotype
    }

    /// Total log prior across the three terms.
    #[must_use]
    pub fn ln_prior(&self) -> f64 {
        self.ln_prior_genotypes + self.ln_prior_frequencies + self.ln_prior_observations
    }

    /// Unnormalized log posterior: data likelihood plus prior.
    #[must_use]
    pub fn ln_posterior(&self) -> f64 {
        self.log_likelihood + self.ln_prior()
    }

    /// Allele-count vector over the combo's genotypes (only alleles the
    /// combo actually carries; counts sum to Σ sample ploidies).
    #[must_use]
    pub fn allele_counts(&self, samples: &[SampleLikelihoods]) -> Vec<(Allele, u32)> {
        tally_alleles(&self.choices, samples)
    }

    /// True when every sample is homozygous for one and the same allele:
    /// the combos that carry no between-sample variation.
    #[must_use]
    pub fn is_monomorphic(&self, samples: &[SampleLikelihoods]) -> bool {
        let mut shared: Option<&Allele> = None;
        for (index, &entry) in self.choices.iter().enumerate() {
            let genotype = &samples[index].entry(entry).genotype;
            if !genotype.is_homozygous() {
                return false;
            }
            let allele = genotype.first_allele();
            match shared {
                None => shared = Some(allele),
                Some(existing) if existing == allele => {}
                Some(_) => return false,
            }
        }
        true
    }
}

impl PartialEq for GenotypeCombo {
    fn eq(&self, other: &Self) -> bool {
        self.choices == other.choices
    }
}

impl Eq for GenotypeCombo {}

impl Hash for GenotypeCombo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.choices.hash(state);
    }
}

fn tally_alleles(choices: &[usize], samples: &[SampleLikelihoods]) -> Vec<(Allele, u32)> {
    let mut counts: BTreeMap<Allele, u32> = BTreeMap::new();
    for (&entry, sample) in choices.iter().zip(samples) {
        for (allele, multiplicity) in sample.entry(entry).genotype.alleles() {
            *counts.entry(allele.clone()).or_insert(0) += multiplicity;
        }
    }
    counts.into_iter().collect()
}

/// Sorts combos by descending posterior (stable, so insertion order breaks
/// ties) and removes duplicate choice vectors, keeping the first occurrence.
pub fn sort_and_dedup(combos: &mut Vec<GenotypeCombo>) {
    combos.sort_by(|a, b| b.ln_posterior().total_cmp(&a.ln_posterior()));
    let mut seen: AHashSet<Vec<usize>> = AHashSet::with_capacity(combos.len());
    combos.retain(|combo| seen.insert(combo.choices.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CallerConfig;
    use crate::genotype::enumerate_genotypes;
    use crate::sample::{test_support, SampleObservations};

    struct Fixture {
        samples: Vec<SampleLikelihoods>,
        observed: ObservedCounts,
    }

    /// Two diploid samples over {A, C}: X all-reference, Y balanced het.
    fn fixture() -> Fixture {
        let reference = Allele::reference("A");
        let alt = Allele::snp("C");
        let candidates = vec![reference.clone(), alt.clone()];
        let genotypes = enumerate_genotypes(2, &candidates);

        let x = test_support::sample_with("X", &reference, None, 20, 30);
        let y = test_support::sample_with("Y", &reference, Some((&alt, 10, 30)), 10, 30);
        let pileups = vec![x, y];
        let grouped: Vec<SampleObservations<'_>> =
            pileups.iter().map(SampleObservations::from_pileup).collect();

        let config = CallerConfig::default();
        let samples: Vec<SampleLikelihoods> = grouped
            .iter()
            .filter_map(|s| SampleLikelihoods::build(s, &genotypes, &config))
            .collect();
        let observed = ObservedCounts::tally(&grouped, &candidates);
        Fixture { samples, observed }
    }

    fn default_priors() -> PriorOptions {
        PriorOptions {
            pooled: false,
            hwe: true,
            binomial: true,
            allele_balance: false,
            theta: 0.001,
        }
    }

    #[test]
    fn test_combo_sums_likelihoods_and_counts() {
        let Fixture { samples, observed } = fixture();
        let priors = default_priors();
        let choices: Vec<usize> = samples.iter().map(|s| s.top()).collect();
        let combo = GenotypeCombo::from_choices(choices, &samples, &observed, &priors);

        let expected_ll: f64 =
            samples.iter().map(|s| s.top_entry().log_likelihood).sum();
        assert!((combo.log_likelihood - expected_ll).abs() < 1e-12);

        // one entry per sample, allele counts sum to total ploidy
        assert_eq!(combo.choices().len(), samples.len());
        let counts = combo.allele_counts(&samples);
        let total: u32 = counts.iter().map(|(_, n)| n).sum();
        assert_eq!(total, samples.iter().map(|s| s.ploidy).sum::<u32>());

        assert!((combo.ln_posterior() - (combo.log_likelihood + combo.ln_prior())).abs()
            < 1e-12);
    }

    #[test]
    fn test_monomorphism() {
        let Fixture { samples, observed } = fixture();
        let priors = default_priors();
        let reference = Allele::reference("A");
        let alt = Allele::snp("C");

        let hom_ref: Vec<usize> = samples
            .iter()
            .map(|s| s.homozygous_entry(&reference).unwrap())
            .collect();
        let combo = GenotypeCombo::from_choices(hom_ref, &samples, &observed, &priors);
        assert!(combo.is_monomorphic(&samples));

        // X hom-ref, Y hom-alt: all homozygous but not monomorphic
        let mixed = vec![
            samples[0].homozygous_entry(&reference).unwrap(),
            samples[1].homozygous_entry(&alt).unwrap(),
        ];
        let combo = GenotypeCombo::from_choices(mixed, &samples, &observed, &priors);
        assert!(!combo.is_monomorphic(&samples));

        // best combo for Y is the het, not monomorphic
        let best: Vec<usize> = samples.iter().map(|s| s.top()).collect();
        let combo = GenotypeCombo::from_choices(best, &samples, &observed, &priors);
        assert!(!combo.is_monomorphic(&samples));
    }

    #[test]
    fn test_sort_and_dedup() {
        let Fixture { samples, observed } = fixture();
        let priors = default_priors();

        let best: Vec<usize> = samples.iter().map(|s| s.top()).collect();
        let alt_choice = vec![best[0], (best[1] + 1) % samples[1].len()];

        let mut combos = vec![
            GenotypeCombo::from_choices(alt_choice.clone(), &samples, &observed, &priors),
            GenotypeCombo::from_choices(best.clone(), &samples, &observed, &priors),
            GenotypeCombo::from_choices(best.clone(), &samples, &observed, &priors),
        ];
        sort_and_dedup(&mut combos);
        assert_eq!(combos.len(), 2);
        // descending posterior
        assert!(combos[0].ln_posterior() >= combos[1].ln_posterior());
        assert_eq!(combos[0].choices(), best.as_slice());
    }
}
