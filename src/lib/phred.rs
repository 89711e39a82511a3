//! Phred score utilities and log-space probability calculations.
//!
//! All probabilities inside the caller are held as natural-log values; this
//! module is the single home for conversions and for the compensated
//! log-sum-exp used to normalize posteriors over large combination lists.
//!
//! Key references:
//! - Equation (7) and (10) from <https://cran.r-project.org/web/packages/Rmpfr/vignettes/log1mexp-note.pdf>

use std::f64::consts::LN_10;

/// Natural log of 2, used as threshold in `ln_one_minus_exp` (Equation 7)
const LN_TWO: f64 = std::f64::consts::LN_2;

/// Smallest error probability representable in reported qualities.
///
/// Reported site and genotype qualities are clamped at the phred equivalent
/// of this floor rather than the `u8` range used for observation qualities.
pub const MIN_REPORTABLE_PROB: f64 = 1e-255;

/// Largest phred value a reported quality can take (−10·log10 of the floor).
pub const MAX_REPORTABLE_PHRED: f64 = 2550.0;

/// Phred score type for observation (base/mapping) qualities
pub type PhredScore = u8;

/// Log probability type (natural log)
pub type LogProbability = f64;

/// Converts an observation Phred score to a log probability of error.
///
/// Phred score Q relates to error probability P by: Q = -10 * log10(P),
/// so ln(P) = -Q * ln(10) / 10.
///
/// # Examples
/// ```
/// use fgvar_lib::phred::phred_to_ln_error_prob;
///
/// // Q10 corresponds to 10% error rate
/// assert!((phred_to_ln_error_prob(10) - 0.1_f64.ln()).abs() < 1e-10);
///
/// // Q30 corresponds to 0.1% error rate
/// assert!((phred_to_ln_error_prob(30) - 0.001_f64.ln()).abs() < 1e-10);
/// ```
#[inline]
#[must_use]
pub fn phred_to_ln_error_prob(phred: PhredScore) -> LogProbability {
    -f64::from(phred) * LN_10 / 10.0
}

/// Converts an observation Phred score to a log probability of being correct.
///
/// Computed as ln(1 - e^(ln error)) via [`ln_one_minus_exp`] so that high
/// quality scores do not lose precision.
#[inline]
#[must_use]
pub fn phred_to_ln_correct_prob(phred: PhredScore) -> LogProbability {
    ln_one_minus_exp(phred_to_ln_error_prob(phred))
}

/// Converts a linear probability to a (float) phred score.
///
/// Used for emitted qualities (site QUAL, genotype GQ) where the value can be
/// far beyond the `u8` observation range. Probabilities at or below
/// [`MIN_REPORTABLE_PROB`] clamp to [`MAX_REPORTABLE_PHRED`]; probabilities
/// at or above one clamp to zero.
///
/// # Examples
/// ```
/// use fgvar_lib::phred::{prob_to_phred, MAX_REPORTABLE_PHRED};
///
/// assert!((prob_to_phred(0.01) - 20.0).abs() < 1e-9);
/// assert_eq!(prob_to_phred(0.0), MAX_REPORTABLE_PHRED);
/// assert_eq!(prob_to_phred(1.0), 0.0);
/// ```
#[inline]
#[must_use]
pub fn prob_to_phred(prob: f64) -> f64 {
    if prob <= MIN_REPORTABLE_PROB {
        return MAX_REPORTABLE_PHRED;
    }
    if prob >= 1.0 {
        return 0.0;
    }
    (-10.0 * prob.log10()).min(MAX_REPORTABLE_PHRED)
}

/// Converts a natural-log probability to a (float) phred score with the same
/// clamping as [`prob_to_phred`].
#[inline]
#[must_use]
pub fn ln_prob_to_phred(ln_prob: LogProbability) -> f64 {
    if ln_prob <= MIN_REPORTABLE_PROB.ln() {
        return MAX_REPORTABLE_PHRED;
    }
    if ln_prob >= 0.0 {
        return 0.0;
    }
    (-10.0 * ln_prob / LN_10).min(MAX_REPORTABLE_PHRED)
}

/// Precise computation of log(1 + exp(x)).
///
/// Implements Equation (10) from the Rmpfr log1mexp note. Thresholds:
/// - x <= -37:   exp(x) is so small that log(1 + exp(x)) ≈ exp(x)
/// - x <= 18:    use log1p(exp(x)) for precision
/// - x <= 33.3:  use x + exp(-x) approximation
/// - x > 33.3:   exp(-x) is negligible, so log(1 + exp(x)) ≈ x
#[inline]
fn log1pexp(x: f64) -> f64 {
    if x <= -37.0 {
        x.exp()
    } else if x <= 18.0 {
        x.exp().ln_1p()
    } else if x <= 33.3 {
        x + (-x).exp()
    } else {
        x
    }
}

/// Computes ln(1 - e^x) for x < 0 in a numerically stable way.
///
/// Implements Equation (7) from the Rmpfr log1mexp note. For x >= -ln(2),
/// e^x is close to 1 and ln(-expm1(x)) avoids catastrophic cancellation;
/// below that threshold ln1p(-exp(x)) is stable.
#[inline]
#[must_use]
pub fn ln_one_minus_exp(x: f64) -> f64 {
    if x >= 0.0 {
        f64::NEG_INFINITY
    } else if x >= -LN_TWO {
        (-x.exp_m1()).ln()
    } else {
        (-x.exp()).ln_1p()
    }
}

/// Computes log(exp(a) - exp(b)), the safe log-space subtraction.
///
/// Returns −∞ (log of zero) when the difference is zero or would be
/// negative to within floating-point tolerance, rather than NaN.
#[inline]
#[must_use]
pub fn ln_sub_exp(a: f64, b: f64) -> f64 {
    if b.is_infinite() && b < 0.0 {
        return a;
    }
    if b >= a {
        return f64::NEG_INFINITY;
    }
    a + ln_one_minus_exp(b - a)
}

/// Computes log(a + b) given log(a) and log(b).
///
/// log(a + b) = log(a) + log1pexp(log(b) - log(a)), evaluated with the
/// larger argument as the base to keep the exponent non-positive.
#[must_use]
pub fn ln_sum_exp(ln_a: LogProbability, ln_b: LogProbability) -> LogProbability {
    if ln_a.is_infinite() && ln_a < 0.0 {
        return ln_b;
    }
    if ln_b.is_infinite() && ln_b < 0.0 {
        return ln_a;
    }
    let (lo, hi) = if ln_b < ln_a { (ln_b, ln_a) } else { (ln_a, ln_b) };
    hi + log1pexp(lo - hi)
}

/// Computes log(sum(exp(values))) over an array of log probabilities.
///
/// This is the posterior normalizer. Uses the standard max-shift together
/// with Kahan-compensated accumulation of the shifted exponentials:
/// combination lists can run to thousands of entries whose posteriors span
/// hundreds of orders of magnitude, and naive summation loses the small
/// terms that the no-variant probability depends on.
///
/// # Examples
/// ```
/// use fgvar_lib::phred::ln_sum_exp_all;
///
/// let values = vec![0.1_f64.ln(), 0.2_f64.ln(), 0.3_f64.ln()];
/// assert!((ln_sum_exp_all(&values) - 0.6_f64.ln()).abs() < 1e-12);
///
/// assert!(ln_sum_exp_all(&[]).is_infinite());
/// ```
#[must_use]
pub fn ln_sum_exp_all(values: &[LogProbability]) -> LogProbability {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max.is_infinite() {
        // empty input, or every term is log(0)
        return f64::NEG_INFINITY;
    }
    // Kahan-compensated sum of exp(v - max)
    let mut sum = 0.0_f64;
    let mut comp = 0.0_f64;
    for v in values {
        let term = (v - max).exp();
        let y = term - comp;
        let t = sum + y;
        comp = (t - sum) - y;
        sum = t;
    }
    max + sum.ln()
}

/// Probability that at least one of two independent error processes fires.
///
/// Given ln(e1) and ln(e2) returns ln(e1 + e2 - e1*e2). Used to fold a
/// mapping error probability into a base-call error probability: the
/// observation is wrong if the base call erred or the read is mismapped.
#[must_use]
pub fn ln_error_prob_either(ln_e1: LogProbability, ln_e2: LogProbability) -> LogProbability {
    let (lo, hi) = if ln_e1 < ln_e2 { (ln_e1, ln_e2) } else { (ln_e2, ln_e1) };
    // When one error dominates by ~400x the union is the larger error.
    if hi - lo >= 6.0 {
        return hi;
    }
    ln_sub_exp(ln_sum_exp(lo, hi), lo + hi)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phred_to_ln_error() {
        assert!((phred_to_ln_error_prob(10) - 0.1_f64.ln()).abs() < 1e-10);
        assert!((phred_to_ln_error_prob(20) - 0.01_f64.ln()).abs() < 1e-10);
        assert!((phred_to_ln_error_prob(30) - 0.001_f64.ln()).abs() < 1e-10);
    }

    #[test]
    fn test_phred_to_ln_correct() {
        assert!((phred_to_ln_correct_prob(30).exp() - 0.999).abs() < 1e-9);
        assert!((phred_to_ln_correct_prob(10).exp() - 0.9).abs() < 1e-9);
        // Q0: error = 1.0, correct = 0
        assert!(phred_to_ln_correct_prob(0).is_infinite());
    }

    #[test]
    fn test_prob_to_phred_clamping() {
        assert!((prob_to_phred(0.001) - 30.0).abs() < 1e-9);
        assert_eq!(prob_to_phred(0.0), MAX_REPORTABLE_PHRED);
        assert_eq!(prob_to_phred(1e-300), MAX_REPORTABLE_PHRED);
        assert_eq!(prob_to_phred(2.0), 0.0);
        // just above the floor still converts
        let q = prob_to_phred(1e-250);
        assert!((q - 2500.0).abs() < 1e-6);
    }

    #[test]
    fn test_ln_prob_to_phred_matches_linear() {
        for p in [0.5_f64, 0.1, 1e-3, 1e-30, 1e-100] {
            assert!((ln_prob_to_phred(p.ln()) - prob_to_phred(p)).abs() < 1e-6);
        }
        assert_eq!(ln_prob_to_phred(f64::NEG_INFINITY), MAX_REPORTABLE_PHRED);
    }

    #[test]
    fn test_ln_sum_exp_pairwise() {
        let result = ln_sum_exp(0.1_f64.ln(), 0.2_f64.ln());
        assert!((result - 0.3_f64.ln()).abs() < 1e-10);

        assert_eq!(ln_sum_exp(f64::NEG_INFINITY, 10.0), 10.0);
        assert_eq!(ln_sum_exp(10.0, f64::NEG_INFINITY), 10.0);

        // very small + small = small
        let result = ln_sum_exp(-718.394_775, -8.404_216);
        assert!((result - (-8.404_216)).abs() < 1e-5);
    }

    #[test]
    fn test_ln_sum_exp_all_basic() {
        let values = vec![0.1_f64.ln(), 0.2_f64.ln(), 0.3_f64.ln()];
        assert!((ln_sum_exp_all(&values) - 0.6_f64.ln()).abs() < 1e-12);

        assert!(ln_sum_exp_all(&[]).is_infinite());
        assert!(ln_sum_exp_all(&[f64::NEG_INFINITY, f64::NEG_INFINITY]).is_infinite());

        let single = ln_sum_exp_all(&[0.5_f64.ln()]);
        assert!((single - 0.5_f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_ln_sum_exp_all_wide_magnitudes() {
        // one dominant term plus many negligible ones must not lose the tail
        let mut values = vec![0.0_f64]; // ln(1)
        values.extend(std::iter::repeat(1e-9_f64.ln()).take(1000));
        let expected = (1.0_f64 + 1000.0 * 1e-9).ln();
        assert!((ln_sum_exp_all(&values) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_ln_sum_exp_all_normalizes_to_one() {
        // posteriors normalized by the result must sum to 1
        let values = vec![-1.5, -2.0, -30.0, -0.5, -700.0];
        let z = ln_sum_exp_all(&values);
        let total: f64 = values.iter().map(|v| (v - z).exp()).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_ln_sub_exp() {
        let q10 = phred_to_ln_error_prob(10); // ln(0.1)
        let q20 = phred_to_ln_error_prob(20); // ln(0.01)

        let result = ln_sub_exp(q10, q20);
        assert!((result.exp() - 0.09).abs() < 1e-9);

        // equal arguments -> log(0)
        assert!(ln_sub_exp(q10, q10).is_infinite() && ln_sub_exp(q10, q10) < 0.0);
        // subtracting log(0) is identity
        assert_eq!(ln_sub_exp(q10, f64::NEG_INFINITY), q10);
        // larger subtrahend -> log(0), not NaN
        assert!(ln_sub_exp(q20, q10).is_infinite());
    }

    #[test]
    fn test_ln_one_minus_exp() {
        assert!((ln_one_minus_exp(0.1_f64.ln()).exp() - 0.9).abs() < 1e-9);
        assert!((ln_one_minus_exp(0.99_f64.ln()).exp() - 0.01).abs() < 1e-9);
        assert!((ln_one_minus_exp(f64::NEG_INFINITY) - 0.0).abs() < 1e-12);
        assert!(ln_one_minus_exp(0.0).is_infinite());
        assert!(ln_one_minus_exp(1.0).is_infinite());
    }

    #[test]
    fn test_ln_error_prob_either() {
        // e1 + e2 - e1*e2 for comparable magnitudes
        let result = ln_error_prob_either(0.1_f64.ln(), 0.2_f64.ln());
        let expected = 0.1 + 0.2 - 0.1 * 0.2;
        assert!((result.exp() - expected).abs() < 1e-10);

        // dominated case collapses to the larger error
        let result = ln_error_prob_either(1e-6_f64.ln(), 0.5_f64.ln());
        assert!((result - 0.5_f64.ln()).abs() < 1e-2);

        // symmetric
        let a = ln_error_prob_either(0.01_f64.ln(), 0.03_f64.ln());
        let b = ln_error_prob_either(0.03_f64.ln(), 0.01_f64.ln());
        assert!((a - b).abs() < 1e-12);
    }

    #[test]
    fn test_log1pexp_thresholds() {
        assert!((log1pexp(-50.0) - (-50.0_f64).exp()).abs() < 1e-12);
        assert!((log1pexp(0.0) - 2.0_f64.ln()).abs() < 1e-12);
        assert!((log1pexp(25.0) - (25.0 + (-25.0_f64).exp())).abs() < 1e-12);
        assert!((log1pexp(100.0) - 100.0).abs() < 1e-12);
    }
}
