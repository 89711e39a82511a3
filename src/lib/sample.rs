//! Per-site pileup input and per-sample observation grouping.
//!
//! The ingester hands the core one [`SitePileup`] per reference position.
//! The core groups each sample's observations by allele-equivalence key into
//! [`SampleObservations`], borrowing the observations read-only for the
//! duration of the site.

use std::collections::BTreeMap;

use crate::allele::{Allele, AlleleKind, Observation, Strand};
use crate::config::CallerConfig;
use crate::errors::FgvarError;
use crate::reference::ReferenceContext;

/// Base quality assigned to the synthetic reference observation.
const REF_SAMPLE_BASE_QUALITY: u8 = 60;

/// Mapping quality assigned to the synthetic reference observation.
const REF_SAMPLE_MAPPING_QUALITY: u8 = 60;

/// One sample's observations at a site, as produced by the ingester.
#[derive(Debug, Clone)]
pub struct SamplePileup {
    /// Sample name
    pub name: String,
    /// Number of allele copies this sample carries
    pub ploidy: u32,
    /// All read observations for this sample at the site
    pub observations: Vec<Observation>,
}

/// Everything the ingester provides for one reference position.
#[derive(Debug, Clone)]
pub struct SitePileup {
    /// Sequence (chromosome/contig) name
    pub sequence: String,
    /// 0-based reference position
    pub position: u64,
    /// Reference base at the position
    pub reference_base: char,
    /// Whether the position falls inside the configured target regions
    pub in_target: bool,
    /// Per-sample observations, in the ingester's sample order
    pub samples: Vec<SamplePileup>,
    /// Optional reference sequence window around the site, for repeat
    /// annotation
    pub reference_context: Option<ReferenceContext>,
}

impl SitePileup {
    /// Validates the malformed-input contract: the reference base must be in
    /// ACGTN, no sample may declare ploidy zero, and every observation must
    /// carry a base string. The caller reports the first violation once and
    /// skips the site.
    pub fn validate(&self) -> Result<(), FgvarError> {
        if !matches!(self.reference_base, 'A' | 'C' | 'G' | 'T' | 'N') {
            return Err(FgvarError::InvalidReferenceBase {
                base: self.reference_base,
                sequence: self.sequence.clone(),
                position: self.position,
            });
        }
        for sample in &self.samples {
            if sample.ploidy == 0 {
                return Err(FgvarError::ZeroPloidy {
                    sample: sample.name.clone(),
                    sequence: self.sequence.clone(),
                    position: self.position,
                });
            }
            for obs in &sample.observations {
                obs.validate(&self.sequence, self.position, &sample.name)?;
            }
        }
        Ok(())
    }

    /// Total observation count across all samples.
    #[must_use]
    pub fn coverage(&self) -> u32 {
        self.samples.iter().map(|s| s.observations.len() as u32).sum()
    }

    /// The reference allele for this site.
    #[must_use]
    pub fn reference_allele(&self) -> Allele {
        Allele::reference(self.reference_base.to_string())
    }
}

/// A sample's observations grouped by allele-equivalence key.
///
/// Invariant: the total observation count over all groups equals the
/// sample's coverage at the site.
#[derive(Debug)]
pub struct SampleObservations<'a> {
    /// Sample name
    pub name: &'a str,
    /// Sample ploidy
    pub ploidy: u32,
    groups: BTreeMap<Allele, Vec<&'a Observation>>,
}

impl<'a> SampleObservations<'a> {
    /// Groups a sample's observations by allele key.
    #[must_use]
    pub fn from_pileup(pileup: &'a SamplePileup) -> Self {
        let mut groups: BTreeMap<Allele, Vec<&'a Observation>> = BTreeMap::new();
        for obs in &pileup.observations {
            groups.entry(obs.allele.clone()).or_default().push(obs);
        }
        Self { name: &pileup.name, ploidy: pileup.ploidy, groups }
    }

    /// Total observation count for the sample.
    #[must_use]
    pub fn coverage(&self) -> u32 {
        self.groups.values().map(|g| g.len() as u32).sum()
    }

    /// Number of observations supporting the given allele.
    #[must_use]
    pub fn support(&self, allele: &Allele) -> u32 {
        self.groups.get(allele).map_or(0, |g| g.len() as u32)
    }

    /// Number of forward-strand observations supporting the given allele.
    #[must_use]
    pub fn forward_support(&self, allele: &Allele) -> u32 {
        self.groups
            .get(allele)
            .map_or(0, |g| g.iter().filter(|o| o.strand == Strand::Forward).count() as u32)
    }

    /// Iterates over (allele, observations) groups in allele order.
    pub fn groups(&self) -> impl Iterator<Item = (&Allele, &[&'a Observation])> {
        self.groups.iter().map(|(a, g)| (a, g.as_slice()))
    }

    /// Iterates over all observations in allele-group order.
    pub fn observations(&self) -> impl Iterator<Item = &'a Observation> + '_ {
        self.groups.values().flat_map(|g| g.iter().copied())
    }

    /// True when the sample has at least one observation of the allele.
    #[must_use]
    pub fn has_observation_of(&self, allele: &Allele) -> bool {
        self.groups.contains_key(allele)
    }
}

/// Site-wide observation counts per allele key, over all samples.
#[must_use]
pub fn group_alleles<'a>(
    samples: &'a [SampleObservations<'a>],
) -> BTreeMap<&'a Allele, u32> {
    let mut groups: BTreeMap<&'a Allele, u32> = BTreeMap::new();
    for sample in samples {
        for (allele, obs) in sample.groups() {
            *groups.entry(allele).or_insert(0) += obs.len() as u32;
        }
    }
    groups
}

/// Tests whether any alternate allele clears both the minimum supporting
/// observation count and the minimum fraction of site coverage.
#[must_use]
pub fn sufficient_alternate_observations(
    groups: &BTreeMap<&Allele, u32>,
    coverage: u32,
    min_alt_count: u32,
    min_alt_fraction: f64,
) -> bool {
    if coverage == 0 {
        return false;
    }
    groups.iter().any(|(allele, &count)| {
        !allele.is_reference()
            && count >= min_alt_count
            && f64::from(count) / f64::from(coverage) >= min_alt_fraction
    })
}

/// Selects the candidate allele set used to enumerate genotypes.
///
/// The reference allele always leads the list. Each alternate must be of a
/// kind enabled in configuration and must clear both per-allele thresholds.
/// Returns `None` when no alternate survives: a single-element candidate set
/// carries no evidence of variation and the site is skipped.
#[must_use]
pub fn candidate_alleles(
    groups: &BTreeMap<&Allele, u32>,
    coverage: u32,
    reference_allele: &Allele,
    config: &CallerConfig,
) -> Option<Vec<Allele>> {
    let mut candidates = vec![reference_allele.clone()];
    for (allele, &count) in groups {
        let allowed = match allele.kind {
            AlleleKind::Reference => false, // already present
            AlleleKind::Snp => config.allow_snps,
            AlleleKind::Mnp => config.allow_mnps,
            AlleleKind::Insertion | AlleleKind::Deletion => config.allow_indels,
            AlleleKind::Complex | AlleleKind::Genotype => false,
        };
        if !allowed {
            continue;
        }
        if count < config.min_alt_count {
            continue;
        }
        if coverage == 0 || f64::from(count) / f64::from(coverage) < config.min_alt_fraction {
            continue;
        }
        candidates.push((*allele).clone());
    }
    if candidates.len() <= 1 { None } else { Some(candidates) }
}

/// Builds the synthetic reference pseudo-sample used when `use_ref_allele`
/// is set: a diploid sample named after the sequence, carrying
/// `observation_count` high-quality observations of the reference allele.
/// With it, a lone sample deviating from the reference registers as
/// between-sample variation. The observation count should match typical
/// per-sample coverage so the observation-balance prior compares like with
/// like.
#[must_use]
pub fn reference_sample(
    sequence: &str,
    reference_allele: &Allele,
    observation_count: u32,
) -> SamplePileup {
    let observations = (0..observation_count.max(1))
        .map(|i| Observation {
            allele: reference_allele.clone(),
            base_quality: REF_SAMPLE_BASE_QUALITY,
            mapping_quality: REF_SAMPLE_MAPPING_QUALITY,
            strand: if i % 2 == 0 { Strand::Forward } else { Strand::Reverse },
            read_id: format!("{sequence}.ref.{i}"),
            read_group: "reference".to_string(),
        })
        .collect();
    SamplePileup { name: sequence.to_string(), ploidy: 2, observations }
}
