//! Round-trips through the tabular ingester contract: observation table in,
//! decision records out.

use std::fs::File;
use std::io::{BufReader, Write};

use fgvar_lib::caller::{SiteCaller, SiteOutcome};
use fgvar_lib::config::CallerConfig;
use fgvar_lib::report::vcf_header;
use fgvar_lib::tabular::{SiteReader, TargetMap};

/// One observation row for the table.
fn row(
    sequence: &str,
    position: u64,
    reference: char,
    sample: &str,
    kind: &str,
    bases: &str,
    base_quality: u8,
    index: usize,
) -> String {
    let strand = if index % 2 == 0 { '+' } else { '-' };
    format!(
        "{sequence}\t{position}\t{reference}\t{sample}\t2\t{kind}\t{bases}\t\
         {base_quality}\t60\t{strand}\t{sample}.r{index}\t{sample}.rg\n"
    )
}

fn het_site_table() -> String {
    let mut table = String::from("# fgvar observation table\n");
    for i in 0..15 {
        table.push_str(&row("chr1", 99, 'A', "S1", "ref", "A", 30, i));
    }
    for i in 15..30 {
        table.push_str(&row("chr1", 99, 'A', "S1", "snp", "G", 30, i));
    }
    // a second, boring site
    for i in 0..10 {
        table.push_str(&row("chr1", 200, 'C', "S1", "ref", "C", 30, i));
    }
    table
}

#[test]
fn table_round_trip_calls_the_het_site() {
    let dir = tempfile::tempdir().unwrap();
    let table_path = dir.path().join("observations.tsv");
    File::create(&table_path)
        .unwrap()
        .write_all(het_site_table().as_bytes())
        .unwrap();

    let reader = BufReader::new(File::open(&table_path).unwrap());
    let caller = SiteCaller::new(CallerConfig::default()).unwrap();

    let mut records: Vec<String> = Vec::new();
    let mut outcomes = 0;
    for site in SiteReader::new(reader, None) {
        let site = site.unwrap();
        outcomes += 1;
        if let SiteOutcome::Variant(call) = caller.call_site(&site) {
            records.extend(call.records(false));
        }
    }
    assert_eq!(outcomes, 2);
    assert_eq!(records.len(), 1);

    let fields: Vec<&str> = records[0].split('\t').collect();
    assert_eq!(fields[0], "chr1");
    assert_eq!(fields[1], "100"); // emitted 1-based
    assert_eq!(fields[3], "A");
    assert_eq!(fields[4], "G");
    assert!(fields[9].starts_with("0/1:"));
}

#[test]
fn targets_bed_gates_sites() {
    let dir = tempfile::tempdir().unwrap();
    let bed_path = dir.path().join("targets.bed");
    // targets exclude chr1:99
    File::create(&bed_path)
        .unwrap()
        .write_all(b"chr1\t150\t300\n")
        .unwrap();

    let targets = TargetMap::from_bed(BufReader::new(File::open(&bed_path).unwrap())).unwrap();
    let reader = std::io::Cursor::new(het_site_table());
    let sites: Vec<_> = SiteReader::new(reader, Some(targets))
        .map(|s| s.unwrap())
        .collect();
    assert!(!sites[0].in_target);
    assert!(sites[1].in_target);

    let caller = SiteCaller::new(CallerConfig::default()).unwrap();
    assert!(matches!(
        caller.call_site(&sites[0]),
        SiteOutcome::Skipped(fgvar_lib::caller::SkipReason::OutsideTargets)
    ));
}

#[test]
fn header_lists_samples_from_the_first_site() {
    let reader = std::io::Cursor::new(het_site_table());
    let first = SiteReader::new(reader, None).next().unwrap().unwrap();
    let names: Vec<String> = first.samples.iter().map(|s| s.name.clone()).collect();
    let header = vcf_header("0.3.1", &names);
    assert!(header.lines().last().unwrap().ends_with("FORMAT\tS1"));
}
