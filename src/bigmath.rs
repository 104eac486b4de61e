//! Arbitrary-precision arithmetic for the factoring pipeline.
//!
//! Everything here is exact `BigInt` arithmetic; there are no floating-point
//! shortcuts anywhere. The probabilistic pieces (Miller-Rabin, the probable
//! prime stepper) are only ever used to skip work cheaply; primality claims
//! that reach the user are always backed by exact trial division or by the
//! reconciliation product check.

use num_bigint::{BigInt, Sign};
use num_integer::Integer;
use num_traits::{One, Signed, Zero};
use rand::Rng;
use thiserror::Error;

/// Miller-Rabin rounds used for probable-prime checks. A composite slips
/// through with probability at most 4^-10.
const PRIME_CONFIDENCE: u32 = 10;

/// Failures surfaced by the range search and the reconciliation step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MathError {
    /// The requested search range violates `1 <= low <= high` or `n >= 2`.
    #[error("invalid range: require 1 <= low <= high and n >= 2")]
    InvalidRange,
    /// The combined partial factors do not reconstruct the target.
    #[error("partial factors do not reconstruct the target")]
    Inconsistent,
}

/// Returns the largest `r` such that `r * r <= n`, or zero for negative `n`.
///
/// Binary search over `[1, (n >> 5) + 8]`, narrowing until the bounds cross.
pub fn integer_sqrt(n: &BigInt) -> BigInt {
    if n.is_negative() {
        return BigInt::zero();
    }
    let mut a = BigInt::one();
    let mut b: BigInt = (n >> 5) + BigInt::from(8);
    while b >= a {
        let mid: BigInt = (&a + &b) >> 1;
        if &mid * &mid > *n {
            b = mid - 1u32;
        } else {
            a = mid + 1u32;
        }
    }
    a - 1u32
}

/// Miller-Rabin probabilistic primality test.
pub fn is_probably_prime(n: &BigInt, rounds: u32) -> bool {
    let one = BigInt::one();
    let two = BigInt::from(2);
    let three = BigInt::from(3);

    if *n < two {
        return false;
    }
    if *n == two || *n == three {
        return true;
    }
    if n.is_even() {
        return false;
    }

    // Write n-1 as 2^r * d with d odd.
    let n_minus_1 = n - &one;
    let mut d = n_minus_1.clone();
    let mut r: u32 = 0;
    while d.is_even() {
        d >>= 1u32;
        r += 1;
    }

    let mut rng = rand::thread_rng();

    'witness: for _ in 0..rounds {
        // Random witness in [2, n-2], by rejection sampling.
        let a = loop {
            let (_, bytes) = n.to_bytes_be();
            let mut random_bytes = vec![0u8; bytes.len()];
            rng.fill(&mut random_bytes[..]);
            let a = BigInt::from_bytes_be(Sign::Plus, &random_bytes) % n;
            if a >= two && a <= &n_minus_1 - &one {
                break a;
            }
        };

        let mut x = a.modpow(&d, n);
        if x == one || x == n_minus_1 {
            continue 'witness;
        }

        for _ in 0..r - 1 {
            x = x.modpow(&two, n);
            if x == n_minus_1 {
                continue 'witness;
            }
        }

        return false;
    }

    true
}

/// Smallest probable prime strictly greater than `x`.
///
/// This is the candidate stepper for the trial-division scans: it skips most
/// composites outright, and the callers never rely on its answers alone.
pub fn next_probable_prime(x: &BigInt) -> BigInt {
    let two = BigInt::from(2);
    if *x < two {
        return two;
    }
    let mut candidate = x + 1u32;
    if candidate.is_even() {
        candidate += 1u32;
    }
    while !is_probably_prime(&candidate, PRIME_CONFIDENCE) {
        candidate += 2u32;
    }
    candidate
}

/// Exact primality check.
///
/// A Miller-Rabin pre-check cheaply rejects most composites before exact
/// trial division by every probable prime in `3..=sqrt(x)` confirms the
/// answer. `2` is prime; `1` is rejected by the pre-check.
pub fn is_prime(x: &BigInt) -> bool {
    if !is_probably_prime(x, PRIME_CONFIDENCE) {
        return false;
    }
    if *x == BigInt::from(2) {
        return true;
    }
    let root = integer_sqrt(x);
    let mut i = BigInt::from(3);
    while i <= root {
        if (x % &i).is_zero() {
            return false;
        }
        i = next_probable_prime(&i);
    }
    true
}

/// Finds every prime factor of `n` within `[low, high]`, repeated factors
/// appearing once per multiplicity.
///
/// `high` is clamped to `sqrt(n)` since no smallest remaining factor can
/// exceed it. Fails when `low < 1`, `low > high` or `n < 2`.
pub fn factors_in_range(n: &BigInt, low: &BigInt, high: &BigInt) -> Result<Vec<BigInt>, MathError> {
    let one = BigInt::one();
    let two = BigInt::from(2);
    if *low < one || low > high || *n < two {
        return Err(MathError::InvalidRange);
    }

    let root = integer_sqrt(n);
    let high = if *high > root { root } else { high.clone() };

    let mut factors = Vec::new();
    let mut residual = n.clone();
    let mut x = low.clone();
    while x <= high {
        if is_prime(&x) {
            // Divide x out to full multiplicity before moving on.
            while (&residual % &x).is_zero() {
                factors.push(x.clone());
                residual /= &x;
            }
            if residual.is_one() {
                break;
            }
        }
        x = next_probable_prime(&x);
    }

    Ok(factors)
}

/// Completes and verifies the union of all workers' partial factors for `n`.
///
/// If the product of `factors` already equals `n` the set is complete and is
/// returned unchanged. Since no worker searches above `sqrt(n)`, at most one
/// prime factor can be missing; if the residual `n / product` is that prime,
/// it is appended. Anything else means the partial results are inconsistent.
pub fn reconcile(factors: Vec<BigInt>, n: &BigInt) -> Result<Vec<BigInt>, MathError> {
    let product: BigInt = factors.iter().fold(BigInt::one(), |acc, f| acc * f);
    if product == *n {
        return Ok(factors);
    }
    if product > *n || !(n % &product).is_zero() {
        return Err(MathError::Inconsistent);
    }

    let missing = n / &product;
    if is_probably_prime(&missing, PRIME_CONFIDENCE) && &missing * &product == *n {
        let mut factors = factors;
        factors.push(missing);
        Ok(factors)
    } else {
        Err(MathError::Inconsistent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn big(n: i64) -> BigInt {
        BigInt::from(n)
    }

    fn bigs(values: &[i64]) -> Vec<BigInt> {
        values.iter().map(|&v| BigInt::from(v)).collect()
    }

    #[test]
    fn test_integer_sqrt_property() {
        for n in 0..=500i64 {
            let n = big(n);
            let r = integer_sqrt(&n);
            assert!(&r * &r <= n, "sqrt({}) = {} overshoots", n, r);
            let r1 = &r + 1u32;
            assert!(&r1 * &r1 > n, "sqrt({}) = {} undershoots", n, r);
        }
    }

    #[test]
    fn test_integer_sqrt_exact_squares() {
        assert_eq!(integer_sqrt(&big(0)), big(0));
        assert_eq!(integer_sqrt(&big(1)), big(1));
        assert_eq!(integer_sqrt(&big(100)), big(10));
        assert_eq!(integer_sqrt(&big(99)), big(9));
        let n: BigInt = "100000000000000000000000000000000".parse().unwrap();
        let r: BigInt = "10000000000000000".parse().unwrap();
        assert_eq!(integer_sqrt(&n), r);
        assert_eq!(integer_sqrt(&(&n - 1u32)), &r - 1u32);
    }

    #[test]
    fn test_integer_sqrt_negative_is_zero() {
        assert_eq!(integer_sqrt(&big(-1)), big(0));
        assert_eq!(integer_sqrt(&big(-1_000_000)), big(0));
    }

    #[test]
    fn test_is_probably_prime() {
        assert!(is_probably_prime(&big(2), 20));
        assert!(is_probably_prime(&big(7), 20));
        assert!(is_probably_prime(&big(104_729), 20));
        assert!(!is_probably_prime(&big(1), 20));
        assert!(!is_probably_prime(&big(100), 20));
        assert!(!is_probably_prime(&big(1_289_783), 20)); // 11 * 37 * 3169
        // Carmichael numbers fool Fermat but not Miller-Rabin.
        assert!(!is_probably_prime(&big(561), 20));
    }

    #[test]
    fn test_next_probable_prime() {
        assert_eq!(next_probable_prime(&big(0)), big(2));
        assert_eq!(next_probable_prime(&big(1)), big(2));
        assert_eq!(next_probable_prime(&big(2)), big(3));
        assert_eq!(next_probable_prime(&big(3)), big(5));
        assert_eq!(next_probable_prime(&big(7)), big(11));
        assert_eq!(next_probable_prime(&big(113)), big(127));
    }

    #[test]
    fn test_is_prime() {
        assert!(!is_prime(&big(1)));
        assert!(is_prime(&big(2)));
        assert!(is_prime(&big(3)));
        assert!(is_prime(&big(43)));
        assert!(is_prime(&big(113)));
        assert!(!is_prime(&big(4)));
        assert!(!is_prime(&big(91))); // 7 * 13
        assert!(!is_prime(&big(18306)));
    }

    #[test]
    fn test_factors_in_range_full() {
        let factors = factors_in_range(&big(18306), &big(1), &big(135)).unwrap();
        assert_eq!(factors, bigs(&[2, 3, 3, 3, 3, 113]));
    }

    #[test]
    fn test_factors_in_range_clamps_high() {
        // sqrt(100) = 10, so the scan must stop there and still find
        // the full multiplicity of 2 and 5.
        let factors = factors_in_range(&big(100), &big(1), &big(1_000_000)).unwrap();
        assert_eq!(factors, bigs(&[2, 2, 5, 5]));
    }

    #[test]
    fn test_factors_in_range_partitioned_union() {
        // Disjoint contiguous ranges over [1, sqrt(18306)] find the same
        // multiset as one full scan.
        let n = big(18306);
        let mut union = Vec::new();
        for (low, high) in [(1, 45), (46, 90), (91, 135)] {
            union.extend(factors_in_range(&n, &big(low), &big(high)).unwrap());
        }
        union.sort();
        assert_eq!(union, bigs(&[2, 3, 3, 3, 3, 113]));
    }

    #[test]
    fn test_factors_in_range_rejects_bad_input() {
        assert_eq!(
            factors_in_range(&big(100), &big(0), &big(10)),
            Err(MathError::InvalidRange)
        );
        assert_eq!(
            factors_in_range(&big(100), &big(10), &big(5)),
            Err(MathError::InvalidRange)
        );
        assert_eq!(
            factors_in_range(&big(1), &big(1), &big(10)),
            Err(MathError::InvalidRange)
        );
    }

    #[test]
    fn test_factors_in_range_above_sqrt_is_empty() {
        // [11, 20] clamps to sqrt(100) = 10, below low: nothing to find.
        let factors = factors_in_range(&big(100), &big(11), &big(20)).unwrap();
        assert!(factors.is_empty());
    }

    #[test]
    fn test_reconcile_complete_is_unchanged() {
        let n = big(18306);
        let complete = bigs(&[2, 3, 3, 3, 3, 113]);
        let once = reconcile(complete.clone(), &n).unwrap();
        assert_eq!(once, complete);
        // Idempotent.
        let twice = reconcile(once.clone(), &n).unwrap();
        assert_eq!(twice, complete);
    }

    #[test]
    fn test_reconcile_appends_missing_large_factor() {
        // sqrt(15) = 3, so only 3 is found below the root; 5 is recovered.
        let factors = reconcile(bigs(&[3]), &big(15)).unwrap();
        assert_eq!(factors, bigs(&[3, 5]));
    }

    #[test]
    fn test_reconcile_prime_target_from_empty() {
        // A prime target yields no partial factors below its root; the
        // target itself is the one missing factor.
        let n = big(104_729);
        let factors = reconcile(Vec::new(), &n).unwrap();
        assert_eq!(factors, vec![n]);
    }

    #[test]
    fn test_reconcile_composite_with_factor_above_root() {
        // 1289783 = 11 * 37 * 3169, and 3169 > sqrt(1289783) = 1135, so
        // only {11, 37} can be found by the range scans.
        let factors = reconcile(bigs(&[11, 37]), &big(1_289_783)).unwrap();
        assert_eq!(factors, bigs(&[11, 37, 3169]));
    }

    #[test]
    fn test_reconcile_rejects_inconsistent() {
        // Product exceeds n.
        assert_eq!(
            reconcile(bigs(&[7, 7]), &big(10)),
            Err(MathError::Inconsistent)
        );
        // Product does not divide n.
        assert_eq!(
            reconcile(bigs(&[4]), &big(10)),
            Err(MathError::Inconsistent)
        );
        // Residual is composite, so a factor below the root was missed.
        assert_eq!(
            reconcile(bigs(&[2]), &big(180)),
            Err(MathError::Inconsistent)
        );
    }
}
