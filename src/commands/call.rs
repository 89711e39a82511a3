//! Call short variants from a per-site observation table.
//!
//! Reads the tab-separated observation stream produced by an alignment
//! ingester, runs the per-site Bayesian decision pipeline over every site,
//! and writes VCF-style decision records for sites whose variation
//! probability clears the threshold. Rejected sites can be routed to a
//! BED-style failed-site sink.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use fgvar_lib::caller::{SiteCaller, SiteOutcome};
use fgvar_lib::config::CallerConfig;
use fgvar_lib::logging::OperationTimer;
use fgvar_lib::metrics::{log_run_summary, RunMetrics};
use fgvar_lib::progress::ProgressTracker;
use fgvar_lib::report::vcf_header;
use fgvar_lib::tabular::{SiteReader, TargetMap};
use log::info;

use crate::commands::command::Command;
use crate::commands::common::{is_stdio_path, IoOptions};

/// Call short variants from per-site read observations.
#[derive(Debug, Parser)]
#[command(
    name = "call",
    about = "\x1b[36mCall short variants from a per-site observation table\x1b[0m",
    long_about = r#"
Call short variants from a per-site observation table.

Each input row is one read observation (sequence, 0-based position, reference
base, sample, ploidy, allele kind, bases, base quality, mapping quality,
strand, read id, read group); rows for the same site must be contiguous. For
every site the caller groups observations into alleles, scores per-sample
genotype likelihoods, searches joint genotype combinations under population
priors, and reports the site when the probability of variation across samples
reaches the threshold.

Example usage:
  fgvar call -i observations.tsv -o calls.vcf
  fgvar call -i observations.tsv -t targets.bed --failed failed.bed --pvar 0.5
  fgvar call -i - --use-ref-allele --theta 0.01 > calls.vcf
"#
)]
pub struct Call {
    /// Input/output options
    #[command(flatten)]
    pub io: IoOptions,

    /// Consider SNP alleles as genotype candidates
    #[arg(long = "allow-snps", default_value = "true")]
    pub allow_snps: bool,

    /// Consider insertion/deletion alleles as genotype candidates
    #[arg(long = "allow-indels", default_value = "true")]
    pub allow_indels: bool,

    /// Consider MNP alleles as genotype candidates
    #[arg(long = "allow-mnps", default_value = "true")]
    pub allow_mnps: bool,

    /// Include the reference as a synthetic high-quality sample
    #[arg(long = "use-ref-allele")]
    pub use_ref_allele: bool,

    /// Skip sites with total coverage below this
    #[arg(long = "min-coverage", default_value = "0")]
    pub min_coverage: u32,

    /// Minimum observations supporting an alternate allele
    #[arg(short = 'C', long = "min-alt-count", default_value = "2")]
    pub min_alt_count: u32,

    /// Minimum fraction of coverage supporting an alternate allele
    #[arg(short = 'F', long = "min-alt-fraction", default_value = "0.0")]
    pub min_alt_fraction: f64,

    /// Read-dependence factor discounting repeat observations from one
    /// read-group cluster (1.0 = fully independent)
    #[arg(short = 'D', long = "read-dependence-factor", default_value = "0.9")]
    pub read_dependence_factor: f64,

    /// Fold mapping quality into per-observation error probability
    #[arg(long = "use-mapping-quality")]
    pub use_mapping_quality: bool,

    /// Score only genotypes whose alleles all have sample support
    #[arg(long = "exclude-partially-observed-genotypes")]
    pub exclude_partially_observed_genotypes: bool,

    /// Score only genotypes with at least one supported allele
    #[arg(long = "exclude-unobserved-genotypes")]
    pub exclude_unobserved_genotypes: bool,

    /// Phred likelihood gap below which a sample is a variant candidate
    /// for banded search (0 = every sample)
    #[arg(long = "genotype-variant-threshold", default_value = "0.0")]
    pub genotype_variant_threshold: f64,

    /// Treat all samples as one pool for the genotype-frequency prior
    #[arg(long = "pooled")]
    pub pooled: bool,

    /// Let any sample vary in banded search
    #[arg(long = "permute")]
    pub permute: bool,

    /// Hardy-Weinberg genotype prior term
    #[arg(long = "hwe-priors", default_value = "true")]
    pub hwe_priors: bool,

    /// Binomial observation-count prior term
    #[arg(long = "binomial-obs-priors", default_value = "true")]
    pub obs_binomial_priors: bool,

    /// Strand allele-balance prior term
    #[arg(long = "allele-balance-priors")]
    pub allele_balance_priors: bool,

    /// θ in the neutral-diffusion allele-frequency prior
    #[arg(short = 'T', long = "theta", default_value = "0.001")]
    pub diffusion_prior_scalar: f64,

    /// Banded search: maximum samples varied per combination
    #[arg(short = 'W', long = "bandwidth", default_value = "2")]
    pub bandwidth: usize,

    /// Banded search: per-sample genotype depth for varied samples
    #[arg(short = 'B', long = "band-depth", default_value = "2")]
    pub band_depth: usize,

    /// Cap on generated combinations per search step
    #[arg(long = "combo-step-max", default_value = "10000")]
    pub genotype_combo_step_max: usize,

    /// Per-sample depth bound for local combination enumeration
    #[arg(long = "local-depth", default_value = "6")]
    pub local_depth: usize,

    /// Use expectation-maximization search instead of one banded pass
    #[arg(long = "em")]
    pub expectation_maximization: bool,

    /// Iteration cap for the EM search
    #[arg(long = "em-max-iterations", default_value = "3")]
    pub expectation_maximization_max_iterations: usize,

    /// Compute per-sample marginal genotype qualities
    #[arg(long = "calculate-marginals", default_value = "true")]
    pub calculate_marginals: bool,

    /// Iteration cap for the marginalization pass
    #[arg(long = "genotyping-max-iterations", default_value = "10")]
    pub genotyping_max_iterations: usize,

    /// Report the site as variant iff p(variant) >= this threshold
    #[arg(short = 'P', long = "pvar", default_value = "0.0001")]
    pub p_variant_threshold: f64,

    /// Emit one record per alternate allele instead of one combined record
    #[arg(long = "report-all-alternates")]
    pub report_all_alternates: bool,

    /// Attach reference motif repeat counts to emitted records
    #[arg(long = "show-reference-repeats")]
    pub show_reference_repeats: bool,
}

impl Call {
    fn config(&self) -> CallerConfig {
        CallerConfig {
            allow_snps: self.allow_snps,
            allow_indels: self.allow_indels,
            allow_mnps: self.allow_mnps,
            use_ref_allele: self.use_ref_allele,
            min_coverage: self.min_coverage,
            min_alt_count: self.min_alt_count,
            min_alt_fraction: self.min_alt_fraction,
            read_dependence_factor: self.read_dependence_factor,
            use_mapping_quality: self.use_mapping_quality,
            exclude_partially_observed_genotypes: self.exclude_partially_observed_genotypes,
            exclude_unobserved_genotypes: self.exclude_unobserved_genotypes,
            genotype_variant_threshold: self.genotype_variant_threshold,
            pooled: self.pooled,
            permute: self.permute,
            hwe_priors: self.hwe_priors,
            obs_binomial_priors: self.obs_binomial_priors,
            allele_balance_priors: self.allele_balance_priors,
            diffusion_prior_scalar: self.diffusion_prior_scalar,
            bandwidth: self.bandwidth,
            band_depth: self.band_depth,
            genotype_combo_step_max: self.genotype_combo_step_max,
            local_depth: self.local_depth,
            expectation_maximization: self.expectation_maximization,
            expectation_maximization_max_iterations: self
                .expectation_maximization_max_iterations,
            calculate_marginals: self.calculate_marginals,
            genotyping_max_iterations: self.genotyping_max_iterations,
            p_variant_threshold: self.p_variant_threshold,
            report_all_alternates: self.report_all_alternates,
            show_reference_repeats: self.show_reference_repeats,
        }
    }
}

fn open_input(path: &Path) -> Result<Box<dyn BufRead>> {
    if is_stdio_path(path) {
        Ok(Box::new(BufReader::new(io::stdin())))
    } else {
        let file = File::open(path)
            .with_context(|| format!("opening input {}", path.display()))?;
        Ok(Box::new(BufReader::new(file)))
    }
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    match path {
        Some(path) if !is_stdio_path(path) => {
            let file = File::create(path)
                .with_context(|| format!("creating output {}", path.display()))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        _ => Ok(Box::new(BufWriter::new(io::stdout()))),
    }
}

impl Command for Call {
    fn execute(&self, command_line: &str) -> Result<()> {
        self.io.validate()?;
        let caller = SiteCaller::new(self.config())?;

        info!("Starting call");
        info!("Input: {}", self.io.input.display());
        if let Some(targets) = &self.io.targets {
            info!("Targets: {}", targets.display());
        }
        if let Some(failed) = &self.io.failed {
            info!("Failed-site sink: {}", failed.display());
        }

        let targets = match &self.io.targets {
            Some(path) => {
                let reader = BufReader::new(
                    File::open(path)
                        .with_context(|| format!("opening targets {}", path.display()))?,
                );
                Some(TargetMap::from_bed(reader)?)
            }
            None => None,
        };

        let input = open_input(&self.io.input)?;
        let mut output = open_output(self.io.output.as_deref())?;
        let mut failed_sink = match &self.io.failed {
            Some(path) => Some(BufWriter::new(
                File::create(path)
                    .with_context(|| format!("creating failed sink {}", path.display()))?,
            )),
            None => None,
        };

        let timer = OperationTimer::new("Calling variants");
        let progress = ProgressTracker::new("Processed sites").with_interval(100_000);
        let mut metrics = RunMetrics::new();
        let mut header_written = false;
        let report_all = self.report_all_alternates;

        for site in SiteReader::new(input, targets) {
            let site = site?;
            if !header_written {
                let names: Vec<String> =
                    site.samples.iter().map(|s| s.name.clone()).collect();
                output.write_all(format!("##commandline={command_line}\n").as_bytes())?;
                output.write_all(vcf_header(crate::version::VERSION, &names).as_bytes())?;
                header_written = true;
            }

            let outcome = caller.call_site(&site);
            metrics.record(&outcome);
            progress.add(1);

            match &outcome {
                SiteOutcome::Variant(call) => {
                    for record in call.records(report_all) {
                        writeln!(output, "{record}")?;
                    }
                }
                SiteOutcome::NoVariant { failed, .. } => {
                    if let Some(sink) = failed_sink.as_mut() {
                        for record in failed {
                            writeln!(sink, "{record}")?;
                        }
                    }
                }
                SiteOutcome::Skipped(_) => {}
            }
        }

        output.flush()?;
        if let Some(sink) = failed_sink.as_mut() {
            sink.flush()?;
        }
        progress.log_final();
        timer.log_completion(metrics.total_sites);
        log_run_summary(&metrics);

        if let Some(path) = &self.io.stats {
            let stats = serde_json::to_string_pretty(&metrics)?;
            std::fs::write(path, stats)
                .with_context(|| format!("writing stats {}", path.display()))?;
        }
        Ok(())
    }
}
