#![deny(unsafe_code)]
// Clippy lint configuration for CI
// These lints are allowed because:
// - cast_*: numeric conversions between counts and probabilities are
//   intentional throughout
// - missing_errors_doc / missing_panics_doc: documentation improvements
//   tracked separately
// - module_name_repetitions: domain types are clearer with full names
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::struct_excessive_bools,
    clippy::uninlined_format_args
)]

//! # fgvar - Bayesian short-variant calling core
//!
//! Given per-sample read observations at a single reference position, this
//! library decides whether the site carries variation across samples and, if
//! so, reports the most probable joint assignment of genotypes to all
//! samples, a site-level variation probability, and per-sample marginal
//! genotype qualities.
//!
//! ## Pipeline
//!
//! Each site flows through [`caller::SiteCaller::call_site`]:
//!
//! 1. **Filter** - reject non-ACGT references, off-target positions, and
//!    low-coverage or alternate-free pileups
//! 2. **Group** - bucket observations by allele-equivalence key
//!    ([`sample`]) and pick candidate genotype alleles
//! 3. **Enumerate** - build all allele multisets per ploidy ([`genotype`])
//! 4. **Score** - compute log P(reads | genotype) per sample
//!    ([`likelihood`])
//! 5. **Search** - explore joint genotype combinations by banded
//!    enumeration or expectation-maximization ([`search`]) with
//!    Hardy-Weinberg, neutral-diffusion, and observation-balance priors
//!    ([`priors`])
//! 6. **Decide** - normalize posteriors, compute p(variant), select the
//!    reported combination ([`caller`], [`report`])
//! 7. **Marginalize** - resample the posterior into per-sample marginal
//!    genotype qualities ([`marginals`])
//!
//! All probabilities are held in log space; see [`phred`] for the
//! compensated log-sum-exp the normalization relies on.
//!
//! ## Quick start
//!
//! ```
//! use fgvar_lib::allele::{Allele, Observation, Strand};
//! use fgvar_lib::caller::{SiteCaller, SiteOutcome};
//! use fgvar_lib::config::CallerConfig;
//! use fgvar_lib::sample::{SamplePileup, SitePileup};
//!
//! # fn main() -> fgvar_lib::errors::Result<()> {
//! let reference = Allele::reference("A");
//! let alt = Allele::snp("G");
//! let observations = (0..30)
//!     .map(|i| Observation {
//!         allele: if i % 2 == 0 { reference.clone() } else { alt.clone() },
//!         base_quality: 30,
//!         mapping_quality: 60,
//!         strand: Strand::Forward,
//!         read_id: format!("read{i}"),
//!         read_group: "rg1".to_string(),
//!     })
//!     .collect();
//!
//! let site = SitePileup {
//!     sequence: "chr1".to_string(),
//!     position: 1000,
//!     reference_base: 'A',
//!     in_target: true,
//!     samples: vec![SamplePileup {
//!         name: "sample1".to_string(),
//!         ploidy: 2,
//!         observations,
//!     }],
//!     reference_context: None,
//! };
//!
//! let caller = SiteCaller::new(CallerConfig::default())?;
//! match caller.call_site(&site) {
//!     SiteOutcome::Variant(call) => assert!(call.p_variant > 0.99),
//!     other => panic!("expected a variant call, got {other:?}"),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Scope
//!
//! Alignment ingestion, reference sequence access, realignment, haplotype
//! assembly, phasing, and multi-site inference live outside this crate; the
//! [`tabular`] adapters realize the external contracts for testing and the
//! bundled CLI.

pub mod allele;
pub mod caller;
pub mod combo;
pub mod config;
pub mod errors;
pub mod genotype;
pub mod likelihood;
pub mod logging;
pub mod marginals;
pub mod metrics;
pub mod phred;
pub mod priors;
pub mod progress;
pub mod reference;
pub mod report;
pub mod sample;
pub mod search;
pub mod tabular;

// Re-export the decision surface for convenient access
pub use caller::{SiteCaller, SiteOutcome, SkipReason};
pub use config::CallerConfig;
pub use report::{FailedAllele, SiteCall};
