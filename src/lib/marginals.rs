//! Iterative resampling of the joint posterior into per-sample marginal
//! genotype posteriors.
//!
//! Starting from the best combo (re-scored under pooled, HWE-on priors to
//! maximize neighborhood breadth), each iteration integrates the posterior
//! over the local single-sample-change neighborhood, writes the resulting
//! marginal log-posteriors into every (sample, genotype) entry, and re-ranks
//! each sample's list by marginal. Iteration stops when no sample's top
//! genotype changes, or at the configured cap.

use crate::combo::{sort_and_dedup, GenotypeCombo};
use crate::likelihood::SampleLikelihoods;
use crate::phred::{ln_sum_exp, ln_sum_exp_all};
use crate::priors::{ObservedCounts, PriorOptions};
use crate::search::{local_combos, SearchBounds};

/// Runs the marginalization pass. On return every scored entry carries its
/// marginal log-posterior and each sample's ranking is marginal-ordered, so
/// the per-sample top entry is the genotype call and its marginal gives the
/// genotype quality.
pub fn marginalize(
    samples: &mut [SampleLikelihoods],
    best: &GenotypeCombo,
    observed: &ObservedCounts,
    priors: &PriorOptions,
    bounds: &SearchBounds,
    max_iterations: usize,
) {
    let mut seed =
        GenotypeCombo::from_choices(best.choices().to_vec(), samples, observed, priors);

    for _ in 0..max_iterations {
        let mut combos = local_combos(&seed, samples, observed, priors, bounds);
        sort_and_dedup(&mut combos);

        let posteriors: Vec<f64> = combos.iter().map(GenotypeCombo::ln_posterior).collect();
        let normalizer = ln_sum_exp_all(&posteriors);
        if normalizer.is_infinite() {
            // total underflow: no usable neighborhood, leave marginals as-is
            return;
        }

        for (sample_index, sample) in samples.iter_mut().enumerate() {
            let mut marginals = vec![f64::NEG_INFINITY; sample.len()];
            for combo in &combos {
                let entry = combo.choices()[sample_index];
                marginals[entry] =
                    ln_sum_exp(marginals[entry], combo.ln_posterior() - normalizer);
            }
            for (entry, marginal) in marginals.into_iter().enumerate() {
                sample.set_marginal(entry, marginal);
            }
        }

        let mut changed = false;
        for sample in samples.iter_mut() {
            changed |= sample.sort_by_marginal();
        }
        if !changed {
            break;
        }

        let choices: Vec<usize> = samples.iter().map(SampleLikelihoods::top).collect();
        seed = GenotypeCombo::from_choices(choices, samples, observed, priors);
    }
}
