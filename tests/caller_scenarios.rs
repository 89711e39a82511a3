//! End-to-end scenarios for the per-site decision pipeline.
//!
//! Run with: `cargo test --test caller_scenarios`

use fgvar_lib::allele::{Allele, Observation, Strand};
use fgvar_lib::caller::{SiteCaller, SiteOutcome, SkipReason};
use fgvar_lib::config::CallerConfig;
use fgvar_lib::sample::{SamplePileup, SitePileup};

/// Builds one observation with alternating strand per read index.
fn observation(allele: &Allele, base_quality: u8, index: usize, sample: &str) -> Observation {
    Observation {
        allele: allele.clone(),
        base_quality,
        mapping_quality: 60,
        strand: if index % 2 == 0 { Strand::Forward } else { Strand::Reverse },
        read_id: format!("{sample}.r{index}"),
        read_group: format!("{sample}.rg"),
    }
}

/// Builds a diploid sample with the given reference/alternate observation mix.
fn sample(name: &str, observations: Vec<Observation>) -> SamplePileup {
    SamplePileup { name: name.to_string(), ploidy: 2, observations }
}

fn mixed_sample(
    name: &str,
    reference: &Allele,
    n_ref: usize,
    alt: &Allele,
    n_alt: usize,
    alt_quality: u8,
) -> SamplePileup {
    let mut observations: Vec<Observation> = (0..n_ref)
        .map(|i| observation(reference, 30, i, name))
        .collect();
    observations.extend((0..n_alt).map(|i| observation(alt, alt_quality, n_ref + i, name)));
    sample(name, observations)
}

fn site(samples: Vec<SamplePileup>) -> SitePileup {
    SitePileup {
        sequence: "chr1".to_string(),
        position: 999,
        reference_base: 'A',
        in_target: true,
        samples,
        reference_context: None,
    }
}

fn call(config: CallerConfig, site: &SitePileup) -> SiteOutcome {
    SiteCaller::new(config).unwrap().call_site(site)
}

#[test]
fn single_sample_homozygous_reference_site_is_skipped() {
    // 20 reference observations, no alternates: nothing to evaluate
    let reference = Allele::reference("A");
    let s = site(vec![mixed_sample("S1", &reference, 20, &Allele::snp("G"), 0, 30)]);
    let outcome = call(CallerConfig::default(), &s);
    assert!(matches!(
        outcome,
        SiteOutcome::Skipped(SkipReason::InsufficientAlternates)
    ));
}

#[test]
fn clear_heterozygous_snp_is_called() {
    // 15 A + 15 G at Q30/MQ60
    let reference = Allele::reference("A");
    let alt = Allele::snp("G");
    let s = site(vec![mixed_sample("S1", &reference, 15, &alt, 15, 30)]);

    let SiteOutcome::Variant(result) = call(CallerConfig::default(), &s) else {
        panic!("expected a variant call");
    };
    assert!(result.p_variant > 0.99, "p(variant) = {}", result.p_variant);
    assert_eq!(result.alternates.len(), 1);
    assert_eq!(result.alternates[0].0, alt);
    assert_eq!(result.coverage, 30);

    let genotype = &result.samples[0].genotype;
    assert!(genotype.contains(&reference) && genotype.contains(&alt));
    let gq = result.samples[0].genotype_quality.expect("marginals are on by default");
    assert!(gq > 40.0, "GQ = {gq}");
}

#[test]
fn clear_homozygous_alt_is_called_against_the_reference() {
    // 20 G observations; the reference pseudo-sample supplies the
    // between-sample contrast
    let reference = Allele::reference("A");
    let alt = Allele::snp("G");
    let s = site(vec![mixed_sample("S1", &reference, 0, &alt, 20, 30)]);

    let mut config = CallerConfig::default();
    config.use_ref_allele = true;
    let SiteOutcome::Variant(result) = call(config, &s) else {
        panic!("expected a variant call");
    };
    assert!(result.p_variant > 0.99, "p(variant) = {}", result.p_variant);
    assert_eq!(result.alternates[0].0, alt);

    let genotype = &result.samples[0].genotype;
    assert!(genotype.is_homozygous());
    assert_eq!(genotype.first_allele(), &alt);
}

#[test]
fn low_quality_noise_stays_below_threshold() {
    // 2 G at Q5 among 40 A at Q30, PVL = 0.5
    let reference = Allele::reference("A");
    let alt = Allele::snp("G");
    let s = site(vec![mixed_sample("S1", &reference, 40, &alt, 2, 5)]);

    let mut config = CallerConfig::default();
    config.p_variant_threshold = 0.5;
    let SiteOutcome::NoVariant { p_variant, failed } = call(config, &s) else {
        panic!("expected a sub-threshold outcome");
    };
    assert!(p_variant < 0.5, "p(variant) = {p_variant}");
    // one failed-site record per non-reference candidate
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].allele, alt);
    assert_eq!(failed[0].position, 999);
}

#[test]
fn two_sample_site_calls_the_het_carrier() {
    // X: 20 A; Y: 10 A + 10 C; HWE priors on
    let reference = Allele::reference("A");
    let alt = Allele::snp("C");
    let s = site(vec![
        mixed_sample("X", &reference, 20, &alt, 0, 30),
        mixed_sample("Y", &reference, 10, &alt, 10, 30),
    ]);

    let SiteOutcome::Variant(result) = call(CallerConfig::default(), &s) else {
        panic!("expected a variant call");
    };
    assert!(result.p_variant > 0.99, "p(variant) = {}", result.p_variant);
    assert_eq!(result.alternates[0].0, alt);

    let x = &result.samples[0];
    assert_eq!(x.name, "X");
    assert!(x.genotype.is_homozygous());
    assert_eq!(x.genotype.first_allele(), &reference);

    let y = &result.samples[1];
    assert_eq!(y.name, "Y");
    assert!(y.genotype.contains(&reference) && y.genotype.contains(&alt));
}

#[test]
fn shared_homozygous_alt_is_not_between_sample_variation() {
    // three samples all 20 G: every sample agrees, so p(variant) is near
    // zero even though all differ from the reference
    let reference = Allele::reference("A");
    let alt = Allele::snp("G");
    let s = site(vec![
        mixed_sample("S1", &reference, 0, &alt, 20, 30),
        mixed_sample("S2", &reference, 0, &alt, 20, 30),
        mixed_sample("S3", &reference, 0, &alt, 20, 30),
    ]);

    let SiteOutcome::NoVariant { p_variant, .. } = call(CallerConfig::default(), &s)
    else {
        panic!("expected a non-variant outcome");
    };
    assert!(p_variant < 0.01, "p(variant) = {p_variant}");
}

#[test]
fn variation_probability_vanishes_with_reference_depth() {
    // fixed weak alternate evidence, growing reference depth: p(variant)
    // must decay toward zero
    let reference = Allele::reference("A");
    let alt = Allele::snp("G");

    let mut config = CallerConfig::default();
    config.hwe_priors = false;
    config.obs_binomial_priors = false;
    config.p_variant_threshold = 1.0; // always land in the NoVariant arm

    let mut previous = 1.0_f64;
    for n_ref in [10_usize, 20, 40, 80] {
        let s = site(vec![mixed_sample("S1", &reference, n_ref, &alt, 2, 10)]);
        let SiteOutcome::NoVariant { p_variant, .. } = call(config.clone(), &s) else {
            panic!("expected a sub-threshold outcome");
        };
        assert!(
            p_variant <= previous + 1e-12,
            "p(variant) rose from {previous} to {p_variant} at depth {n_ref}"
        );
        previous = p_variant;
    }
    assert!(previous < 1e-3, "p(variant) = {previous} at depth 80");
}

#[test]
fn em_and_banded_agree_on_clear_sites() {
    let reference = Allele::reference("A");
    let alt = Allele::snp("C");
    let samples = || {
        vec![
            mixed_sample("X", &reference, 20, &alt, 0, 30),
            mixed_sample("Y", &reference, 10, &alt, 10, 30),
        ]
    };

    let banded = call(CallerConfig::default(), &site(samples()));
    let mut em_config = CallerConfig::default();
    em_config.expectation_maximization = true;
    let em = call(em_config, &site(samples()));

    let (SiteOutcome::Variant(banded), SiteOutcome::Variant(em)) = (banded, em) else {
        panic!("expected variant calls from both strategies");
    };
    assert_eq!(banded.samples[0].genotype, em.samples[0].genotype);
    assert_eq!(banded.samples[1].genotype, em.samples[1].genotype);
    assert!((banded.p_variant - em.p_variant).abs() < 1e-6);
}

#[test]
fn mapping_quality_folding_tempers_confidence() {
    let reference = Allele::reference("A");
    let alt = Allele::snp("G");
    let build = || {
        let mut s = site(vec![mixed_sample("S1", &reference, 15, &alt, 15, 30)]);
        for obs in &mut s.samples[0].observations {
            obs.mapping_quality = 5;
        }
        s
    };

    let plain = call(CallerConfig::default(), &build());
    let mut config = CallerConfig::default();
    config.use_mapping_quality = true;
    let folded = call(config, &build());

    let (SiteOutcome::Variant(plain), SiteOutcome::Variant(folded)) = (plain, folded)
    else {
        panic!("expected variant calls");
    };
    let plain_gq = plain.samples[0].genotype_quality.unwrap();
    let folded_gq = folded.samples[0].genotype_quality.unwrap();
    assert!(folded_gq < plain_gq, "folded {folded_gq} !< plain {plain_gq}");
}
