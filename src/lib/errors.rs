//! Custom error types for fgvar operations.

use thiserror::Error;

/// Result type alias for fgvar operations
pub type Result<T> = std::result::Result<T, FgvarError>;

/// Error type for fgvar operations
#[derive(Error, Debug)]
pub enum FgvarError {
    /// Invalid parameter value provided
    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// The parameter name
        parameter: String,
        /// Explanation of why it's invalid
        reason: String,
    },

    /// A read observation that cannot be scored
    #[error("Malformed observation at {sequence}:{position} in sample '{sample}': {reason}")]
    MalformedObservation {
        /// Sequence name of the site
        sequence: String,
        /// 0-based position of the site
        position: u64,
        /// Sample the observation belongs to
        sample: String,
        /// Explanation of the problem
        reason: String,
    },

    /// A sample declared with ploidy zero
    #[error("Sample '{sample}' has declared ploidy 0 at {sequence}:{position}")]
    ZeroPloidy {
        /// The sample name
        sample: String,
        /// Sequence name of the site
        sequence: String,
        /// 0-based position of the site
        position: u64,
    },

    /// Reference base outside the ACGTN alphabet
    #[error("Reference base '{base}' at {sequence}:{position} is not one of A/C/G/T/N")]
    InvalidReferenceBase {
        /// The offending base
        base: char,
        /// Sequence name of the site
        sequence: String,
        /// 0-based position of the site
        position: u64,
    },

    /// Input record that could not be parsed
    #[error("Invalid {file_type} record at line {line}: {reason}")]
    InvalidRecord {
        /// Type of input (e.g. "observation table", "targets BED")
        file_type: String,
        /// 1-based line number
        line: usize,
        /// Explanation of the problem
        reason: String,
    },

    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_parameter() {
        let error = FgvarError::InvalidParameter {
            parameter: "min-coverage".to_string(),
            reason: "must be >= 0".to_string(),
        };
        let msg = format!("{error}");
        assert!(msg.contains("Invalid parameter 'min-coverage'"));
        assert!(msg.contains("must be >= 0"));
    }

    #[test]
    fn test_malformed_observation() {
        let error = FgvarError::MalformedObservation {
            sequence: "chr1".to_string(),
            position: 999,
            sample: "NA12878".to_string(),
            reason: "empty base string".to_string(),
        };
        let msg = format!("{error}");
        assert!(msg.contains("chr1:999"));
        assert!(msg.contains("NA12878"));
        assert!(msg.contains("empty base string"));
    }

    #[test]
    fn test_zero_ploidy() {
        let error = FgvarError::ZeroPloidy {
            sample: "S1".to_string(),
            sequence: "chr2".to_string(),
            position: 5,
        };
        assert!(format!("{error}").contains("ploidy 0"));
    }

    #[test]
    fn test_invalid_reference_base() {
        let error = FgvarError::InvalidReferenceBase {
            base: 'R',
            sequence: "chr1".to_string(),
            position: 10,
        };
        assert!(format!("{error}").contains("'R'"));
    }
}
