//! Tab-separated adapters for the ingester contract: a per-observation site
//! table reader and a BED target-region filter.
//!
//! The observation table carries one row per read observation:
//!
//! ```text
//! sequence  position  ref  sample  ploidy  kind  bases  bq  mq  strand  read  read_group
//! ```
//!
//! Positions are 0-based. Rows for the same (sequence, position) must be
//! contiguous; `#`-prefixed lines are comments. This adapter exists for
//! testing and demonstration of the core; it is not an alignment front-end.

use std::io::BufRead;

use ahash::AHashMap;

use crate::allele::{Allele, AlleleKind, Observation, Strand};
use crate::errors::{FgvarError, Result};
use crate::sample::{SamplePileup, SitePileup};

/// Column count of the observation table.
const OBSERVATION_COLUMNS: usize = 12;

fn record_error(line: usize, reason: impl Into<String>) -> FgvarError {
    FgvarError::InvalidRecord {
        file_type: "observation table".to_string(),
        line,
        reason: reason.into(),
    }
}

#[derive(Debug)]
struct ObservationRow {
    sequence: String,
    position: u64,
    reference_base: char,
    sample: String,
    ploidy: u32,
    observation: Observation,
}

fn parse_row(line: &str, line_number: usize) -> Result<ObservationRow> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() != OBSERVATION_COLUMNS {
        return Err(record_error(
            line_number,
            format!("expected {OBSERVATION_COLUMNS} columns, found {}", fields.len()),
        ));
    }
    let position: u64 = fields[1]
        .parse()
        .map_err(|_| record_error(line_number, format!("bad position '{}'", fields[1])))?;
    let mut ref_chars = fields[2].chars();
    let reference_base = ref_chars
        .next()
        .filter(|_| ref_chars.next().is_none())
        .ok_or_else(|| record_error(line_number, "reference base must be one character"))?;
    let ploidy: u32 = fields[4]
        .parse()
        .map_err(|_| record_error(line_number, format!("bad ploidy '{}'", fields[4])))?;
    let kind: AlleleKind = fields[5]
        .parse()
        .map_err(|reason: String| record_error(line_number, reason))?;
    let bases = fields[6].to_string();
    let length = match kind {
        AlleleKind::Snp => 1,
        _ => bases.len() as u32,
    };
    let base_quality: u8 = fields[7]
        .parse()
        .map_err(|_| record_error(line_number, format!("bad base quality '{}'", fields[7])))?;
    let mapping_quality: u8 = fields[8].parse().map_err(|_| {
        record_error(line_number, format!("bad mapping quality '{}'", fields[8]))
    })?;
    let strand_char = fields[9]
        .chars()
        .next()
        .ok_or_else(|| record_error(line_number, "missing strand"))?;
    let strand = Strand::from_char(strand_char)
        .map_err(|reason| record_error(line_number, reason))?;

    Ok(ObservationRow {
        sequence: fields[0].to_string(),
        position,
        reference_base,
        sample: fields[3].to_string(),
        ploidy,
        observation: Observation {
            allele: Allele::new(kind, bases, length),
            base_quality,
            mapping_quality,
            strand,
            read_id: fields[10].to_string(),
            read_group: fields[11].to_string(),
        },
    })
}

/// Streaming reader yielding one [`SitePileup`] per contiguous
/// (sequence, position) row group, in input order.
pub struct SiteReader<R: BufRead> {
    input: R,
    pending: Option<ObservationRow>,
    line_number: usize,
    targets: Option<TargetMap>,
}

impl<R: BufRead> SiteReader<R> {
    /// Creates a reader; when a target map is supplied, each emitted site's
    /// `in_target` flag reflects membership, otherwise every site is
    /// in-target.
    pub fn new(input: R, targets: Option<TargetMap>) -> Self {
        Self { input, pending: None, line_number: 0, targets }
    }

    fn next_row(&mut self) -> Result<Option<ObservationRow>> {
        let mut line = String::new();
        loop {
            line.clear();
            if self.input.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            self.line_number += 1;
            let trimmed = line.trim_end_matches(['\n', '\r']);
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            return parse_row(trimmed, self.line_number).map(Some);
        }
    }

    fn build_site(&self, rows: Vec<ObservationRow>) -> SitePileup {
        let sequence = rows[0].sequence.clone();
        let position = rows[0].position;
        let reference_base = rows[0].reference_base;
        let in_target = self
            .targets
            .as_ref()
            .map_or(true, |targets| targets.contains(&sequence, position));

        // samples in first-appearance order
        let mut index: AHashMap<String, usize> = AHashMap::new();
        let mut samples: Vec<SamplePileup> = Vec::new();
        for row in rows {
            let slot = *index.entry(row.sample.clone()).or_insert_with(|| {
                samples.push(SamplePileup {
                    name: row.sample.clone(),
                    ploidy: row.ploidy,
                    observations: Vec::new(),
                });
                samples.len() - 1
            });
            samples[slot].observations.push(row.observation);
        }

        SitePileup {
            sequence,
            position,
            reference_base,
            in_target,
            samples,
            reference_context: None,
        }
    }
}

impl<R: BufRead> Iterator for SiteReader<R> {
    type Item = Result<SitePileup>;

    fn next(&mut self) -> Option<Self::Item> {
        let first = match self.pending.take() {
            Some(row) => row,
            None => match self.next_row() {
                Ok(Some(row)) => row,
                Ok(None) => return None,
                Err(error) => return Some(Err(error)),
            },
        };

        let mut rows = vec![first];
        loop {
            match self.next_row() {
                Ok(Some(row)) => {
                    if row.sequence == rows[0].sequence && row.position == rows[0].position {
                        rows.push(row);
                    } else {
                        self.pending = Some(row);
                        break;
                    }
                }
                Ok(None) => break,
                Err(error) => return Some(Err(error)),
            }
        }
        Some(Ok(self.build_site(rows)))
    }
}

/// Target regions parsed from BED, queried by site position.
#[derive(Debug, Default)]
pub struct TargetMap {
    intervals: AHashMap<String, Vec<(u64, u64)>>,
}

impl TargetMap {
    /// Parses BED records (sequence, start, end; half-open, 0-based) and
    /// sorts each sequence's intervals for lookup.
    pub fn from_bed<R: BufRead>(input: R) -> Result<Self> {
        let mut intervals: AHashMap<String, Vec<(u64, u64)>> = AHashMap::new();
        for (index, line) in input.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = trimmed.split('\t').collect();
            if fields.len() < 3 {
                return Err(FgvarError::InvalidRecord {
                    file_type: "targets BED".to_string(),
                    line: index + 1,
                    reason: "expected at least 3 columns".to_string(),
                });
            }
            let parse = |s: &str| -> Result<u64> {
                s.parse().map_err(|_| FgvarError::InvalidRecord {
                    file_type: "targets BED".to_string(),
                    line: index + 1,
                    reason: format!("bad coordinate '{s}'"),
                })
            };
            let start = parse(fields[1])?;
            let end = parse(fields[2])?;
            intervals.entry(fields[0].to_string()).or_default().push((start, end));
        }
        for ranges in intervals.values_mut() {
            ranges.sort_unstable();
        }
        Ok(Self { intervals })
    }

    /// True when the position falls inside any target interval for the
    /// sequence.
    #[must_use]
    pub fn contains(&self, sequence: &str, position: u64) -> bool {
        let Some(ranges) = self.intervals.get(sequence) else {
            return false;
        };
        // last interval starting at or before the position
        let index = ranges.partition_point(|(start, _)| *start <= position);
        index > 0 && position < ranges[index - 1].1
    }
}
