//! Decision records emitted for accepted and rejected sites.
//!
//! Accepted sites serialize to one VCF-style line (or one line per
//! alternate under `report_all_alternates`); rejected sites with a
//! configured failed-site sink serialize to BED-style interval records, one
//! per non-reference candidate allele.

use std::collections::BTreeMap;
use std::fmt;

use crate::allele::Allele;
use crate::genotype::Genotype;

/// One sample's genotype call within a site decision.
#[derive(Debug, Clone)]
pub struct SampleCall {
    /// Sample name
    pub name: String,
    /// Called genotype
    pub genotype: Genotype,
    /// Phred-scaled genotype quality (from the marginal posterior when
    /// marginals were computed, otherwise unreported)
    pub genotype_quality: Option<f64>,
    /// The sample's coverage at the site
    pub coverage: u32,
}

/// The decision record for an accepted (variant) site.
#[derive(Debug, Clone)]
pub struct SiteCall {
    /// Sequence name
    pub sequence: String,
    /// 0-based site position
    pub position: u64,
    /// Reference base at the site
    pub reference_base: char,
    /// Unique non-reference alleles of the chosen combo with their combo
    /// allele counts, in descending count order
    pub alternates: Vec<(Allele, u32)>,
    /// Probability of variation across samples at the site
    pub p_variant: f64,
    /// Total site coverage
    pub coverage: u32,
    /// Whether the best overall combo was itself heterozygous-containing
    pub best_overall_is_het: bool,
    /// Per-sample genotype calls, in input sample order
    pub samples: Vec<SampleCall>,
    /// Observation counts per allele group at the site
    pub allele_groups: Vec<(Allele, u32)>,
    /// Reference motif repeat annotation, when requested
    pub repeats: BTreeMap<String, u32>,
}

impl SiteCall {
    /// Phred-scaled site quality: −10·log10 p(no-variant).
    #[must_use]
    pub fn quality(&self) -> f64 {
        crate::phred::prob_to_phred(1.0 - self.p_variant)
    }

    /// The VCF-style genotype index of an allele: 0 for reference, 1-based
    /// rank within the alternates otherwise.
    fn allele_index(&self, allele: &Allele) -> Option<usize> {
        if allele.is_reference() {
            return Some(0);
        }
        self.alternates.iter().position(|(a, _)| a == allele).map(|i| i + 1)
    }

    /// Formats a genotype as slash-joined allele indices (`0/1`-style).
    fn format_genotype(&self, genotype: &Genotype) -> String {
        let mut indices: Vec<String> = Vec::with_capacity(genotype.ploidy() as usize);
        for (allele, multiplicity) in genotype.alleles() {
            let index = self
                .allele_index(allele)
                .map_or_else(|| ".".to_string(), |i| i.to_string());
            for _ in 0..multiplicity {
                indices.push(index.clone());
            }
        }
        indices.join("/")
    }

    fn info_field(&self, alternates: &[(Allele, u32)]) -> String {
        let mut info = format!(
            "NS={};DP={};PVAR={:.6}",
            self.samples.len(),
            self.coverage,
            self.p_variant
        );
        let counts: Vec<String> =
            alternates.iter().map(|(_, n)| n.to_string()).collect();
        if !counts.is_empty() {
            info.push_str(";AC=");
            info.push_str(&counts.join(","));
        }
        info.push_str(if self.best_overall_is_het { ";BESTHET" } else { "" });
        if !self.repeats.is_empty() {
            let repeats: Vec<String> = self
                .repeats
                .iter()
                .map(|(motif, count)| format!("{motif}:{count}"))
                .collect();
            info.push_str(";RPT=");
            info.push_str(&repeats.join(","));
        }
        if !self.allele_groups.is_empty() {
            let groups: Vec<String> = self
                .allele_groups
                .iter()
                .map(|(allele, count)| format!("{allele}|{count}"))
                .collect();
            info.push_str(";GRP=");
            info.push_str(&groups.join(","));
        }
        info
    }

    fn format_line(&self, alternates: &[(Allele, u32)]) -> String {
        let alt_field = if alternates.is_empty() {
            ".".to_string()
        } else {
            alternates
                .iter()
                .map(|(a, _)| a.to_string())
                .collect::<Vec<_>>()
                .join(",")
        };
        let mut line = format!(
            "{}\t{}\t.\t{}\t{}\t{:.2}\t.\t{}\tGT:GQ:DP",
            self.sequence,
            self.position + 1,
            self.reference_base,
            alt_field,
            self.quality(),
            self.info_field(alternates),
        );
        for sample in &self.samples {
            let gq = sample
                .genotype_quality
                .map_or_else(|| ".".to_string(), |q| format!("{q:.2}"));
            line.push_str(&format!(
                "\t{}:{}:{}",
                self.format_genotype(&sample.genotype),
                gq,
                sample.coverage
            ));
        }
        line
    }

    /// Serializes the call: one combined record, or one record per
    /// alternate when `report_all` is set.
    #[must_use]
    pub fn records(&self, report_all: bool) -> Vec<String> {
        if report_all && self.alternates.len() > 1 {
            self.alternates
                .iter()
                .map(|alt| self.format_line(std::slice::from_ref(alt)))
                .collect()
        } else {
            vec![self.format_line(&self.alternates)]
        }
    }
}

impl fmt::Display for SiteCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_line(&self.alternates))
    }
}

/// Renders the output header: format meta-lines plus the column line with
/// one trailing column per sample.
#[must_use]
pub fn vcf_header(version: &str, sample_names: &[String]) -> String {
    let mut header = String::new();
    header.push_str("##fileformat=VCFv4.2\n");
    header.push_str(&format!("##source=fgvar v{version}\n"));
    header.push_str(
        "##INFO=<ID=NS,Number=1,Type=Integer,Description=\"Number of samples with data\">\n",
    );
    header.push_str("##INFO=<ID=DP,Number=1,Type=Integer,Description=\"Total depth\">\n");
    header.push_str(
        "##INFO=<ID=PVAR,Number=1,Type=Float,Description=\"Probability of variation\">\n",
    );
    header.push_str(
        "##INFO=<ID=AC,Number=A,Type=Integer,Description=\"Allele count in genotypes\">\n",
    );
    header.push_str(
        "##INFO=<ID=BESTHET,Number=0,Type=Flag,Description=\"Best overall combination \
         is heterozygous\">\n",
    );
    header.push_str(
        "##INFO=<ID=RPT,Number=.,Type=String,Description=\"Reference repeat motifs\">\n",
    );
    header.push_str(
        "##INFO=<ID=GRP,Number=.,Type=String,Description=\"Observation counts per allele \
         group\">\n",
    );
    header.push_str("##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">\n");
    header.push_str(
        "##FORMAT=<ID=GQ,Number=1,Type=Float,Description=\"Genotype quality\">\n",
    );
    header.push_str("##FORMAT=<ID=DP,Number=1,Type=Integer,Description=\"Read depth\">\n");
    header.push_str("#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT");
    for name in sample_names {
        header.push('\t');
        header.push_str(name);
    }
    header.push('\n');
    header
}

/// A rejected candidate allele, emitted to the failed-site sink as a
/// BED-style interval record.
#[derive(Debug, Clone)]
pub struct FailedAllele {
    /// Sequence name
    pub sequence: String,
    /// 0-based site position
    pub position: u64,
    /// The candidate allele that failed to call
    pub allele: Allele,
}

impl fmt::Display for FailedAllele {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}",
            self.sequence,
            self.position,
            self.position + u64::from(self.allele.length),
            self.allele
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call() -> SiteCall {
        let reference = Allele::reference("A");
        let alt = Allele::snp("G");
        SiteCall {
            sequence: "chr1".to_string(),
            position: 99,
            reference_base: 'A',
            alternates: vec![(alt.clone(), 1)],
            p_variant: 0.999,
            coverage: 30,
            best_overall_is_het: true,
            samples: vec![SampleCall {
                name: "S1".to_string(),
                genotype: Genotype::new(vec![reference, alt]),
                genotype_quality: Some(42.5),
                coverage: 30,
            }],
            allele_groups: vec![],
            repeats: BTreeMap::new(),
        }
    }

    #[test]
    fn test_vcf_line_shape() {
        let line = call().to_string();
        let fields: Vec<&str> = line.split('\t').collect();
        assert_eq!(fields[0], "chr1");
        assert_eq!(fields[1], "100"); // 1-based
        assert_eq!(fields[3], "A");
        assert_eq!(fields[4], "G");
        assert_eq!(fields[8], "GT:GQ:DP");
        assert_eq!(fields[9], "0/1:42.50:30");
        assert!(fields[7].contains("PVAR=0.999"));
        assert!(fields[7].contains("BESTHET"));
    }

    #[test]
    fn test_site_quality_is_phred_of_no_variant() {
        let c = call();
        assert!((c.quality() - 30.0).abs() < 1e-6);
    }

    #[test]
    fn test_report_all_alternates() {
        let mut c = call();
        c.alternates.push((Allele::snp("T"), 1));
        let combined = c.records(false);
        assert_eq!(combined.len(), 1);
        assert!(combined[0].contains("G,T"));

        let split = c.records(true);
        assert_eq!(split.len(), 2);
        assert!(split[0].contains("\tG\t"));
        assert!(split[1].contains("\tT\t"));
    }

    #[test]
    fn test_genotype_outside_alternates_is_no_call() {
        let c = call();
        let foreign = Genotype::homozygote(2, Allele::snp("T"));
        assert_eq!(c.format_genotype(&foreign), "./.");
    }

    #[test]
    fn test_header_columns() {
        let header = vcf_header("0.3.1", &["S1".to_string(), "S2".to_string()]);
        assert!(header.starts_with("##fileformat=VCFv4.2\n"));
        let columns = header.lines().last().unwrap();
        assert!(columns.ends_with("FORMAT\tS1\tS2"));
    }

    #[test]
    fn test_failed_allele_bed_record() {
        let failed = FailedAllele {
            sequence: "chr2".to_string(),
            position: 50,
            allele: Allele::new(crate::allele::AlleleKind::Deletion, "ACG", 3),
        };
        assert_eq!(failed.to_string(), "chr2\t50\t53\tD3");
    }
}
