//! Allele and read-observation types.
//!
//! An [`Allele`] is the small value type shared by observations, candidate
//! genotype alleles, and reported alternates. Two alleles are equivalent when
//! kind, base string, and length all match; that equivalence is the grouping
//! key used everywhere downstream, so equality and hashing are derived from
//! exactly those three fields.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::errors::FgvarError;

/// The kind of sequence variation an allele represents.
///
/// `Genotype` marks synthetic alleles built for genotype enumeration rather
/// than observed on a read (e.g. the four nucleotide alleles used when
/// genotyping against a fixed alphabet).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum AlleleKind {
    /// Matches the reference base(s)
    Reference,
    /// Single-nucleotide substitution
    Snp,
    /// Multi-nucleotide substitution
    Mnp,
    /// Inserted sequence relative to the reference
    Insertion,
    /// Deleted sequence relative to the reference
    Deletion,
    /// Composite event that is none of the simple kinds
    Complex,
    /// Synthetic allele used only for genotype construction
    Genotype,
}

impl AlleleKind {
    /// Returns true for the alternate kinds that the candidate-kind
    /// configuration filters (`allow_snps` / `allow_mnps` / `allow_indels`).
    #[must_use]
    pub fn is_indel(self) -> bool {
        matches!(self, AlleleKind::Insertion | AlleleKind::Deletion)
    }
}

impl FromStr for AlleleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ref" | "reference" => Ok(AlleleKind::Reference),
            "snp" => Ok(AlleleKind::Snp),
            "mnp" => Ok(AlleleKind::Mnp),
            "ins" | "insertion" => Ok(AlleleKind::Insertion),
            "del" | "deletion" => Ok(AlleleKind::Deletion),
            "complex" => Ok(AlleleKind::Complex),
            other => Err(format!("unknown allele kind '{other}'")),
        }
    }
}

/// A specific sequence variant observable at a site.
///
/// Alleles are cheap values: genotypes copy them rather than borrow, and the
/// derived ordering (reference first, then by kind/bases/length) gives every
/// per-site collection a deterministic iteration order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Allele {
    /// What kind of variation this is
    pub kind: AlleleKind,
    /// The allele's base string (deleted bases for deletions)
    pub bases: String,
    /// Reference-coordinate length of the event
    pub length: u32,
}

impl Allele {
    /// Creates an allele of an arbitrary kind.
    #[must_use]
    pub fn new(kind: AlleleKind, bases: impl Into<String>, length: u32) -> Self {
        Self { kind, bases: bases.into(), length }
    }

    /// Creates the reference allele for a site with the given base string.
    #[must_use]
    pub fn reference(bases: impl Into<String>) -> Self {
        let bases = bases.into();
        let length = bases.len() as u32;
        Self { kind: AlleleKind::Reference, bases, length }
    }

    /// Creates a single-nucleotide substitution allele.
    #[must_use]
    pub fn snp(bases: impl Into<String>) -> Self {
        Self { kind: AlleleKind::Snp, bases: bases.into(), length: 1 }
    }

    /// True when this allele matches the reference.
    #[must_use]
    pub fn is_reference(&self) -> bool {
        self.kind == AlleleKind::Reference
    }
}

impl fmt::Display for Allele {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            AlleleKind::Insertion => write!(f, "I{}", self.bases),
            AlleleKind::Deletion => write!(f, "D{}", self.length),
            _ => write!(f, "{}", self.bases),
        }
    }
}

/// Strand of the read supporting an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Strand {
    /// Forward strand
    Forward,
    /// Reverse strand
    Reverse,
}

impl Strand {
    /// Parses `+`/`-` strand notation.
    pub fn from_char(c: char) -> Result<Self, String> {
        match c {
            '+' => Ok(Strand::Forward),
            '-' => Ok(Strand::Reverse),
            other => Err(format!("unknown strand '{other}'")),
        }
    }
}

/// One read's support for an allele at a site.
///
/// Observations are created by the ingester and borrowed read-only by the
/// core for the duration of the site.
#[derive(Debug, Clone)]
pub struct Observation {
    /// The allele this read supports
    pub allele: Allele,
    /// Phred-scaled base quality of the call
    pub base_quality: u8,
    /// Phred-scaled mapping quality of the read
    pub mapping_quality: u8,
    /// Strand of the supporting read
    pub strand: Strand,
    /// Identifier of the supporting read
    pub read_id: String,
    /// Read group (library/run cluster) of the supporting read
    pub read_group: String,
}

impl Observation {
    /// Checks that the observation is scorable, per the malformed-input
    /// contract: an observation with no base string cannot be grouped.
    pub fn validate(
        &self,
        sequence: &str,
        position: u64,
        sample: &str,
    ) -> Result<(), FgvarError> {
        if self.allele.bases.is_empty() {
            return Err(FgvarError::MalformedObservation {
                sequence: sequence.to_string(),
                position,
                sample: sample.to_string(),
                reason: "empty base string".to_string(),
            });
        }
        Ok(())
    }
}
