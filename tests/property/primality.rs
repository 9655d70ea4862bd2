//! Property tests for the primality oracle.

use proptest::prelude::*;

use primecount_rs::primality::is_prime;

/// Trial division over every candidate divisor. Slow but obviously right.
fn is_prime_naive(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    let mut d = 2u64;
    while d.checked_mul(d).map_or(false, |sq| sq <= n) {
        if n % d == 0 {
            return false;
        }
        d += 1;
    }
    true
}

/// Mid-sized primes whose pairwise products still fit in a u64.
const PRIMES: [u64; 8] = [
    104_729,
    1_299_709,
    15_485_863,
    179_424_673,
    2_147_483_647,
    4_294_967_291,
    1_000_000_007,
    1_000_000_009,
];

proptest! {
    #[test]
    fn matches_naive_trial_division(n in 0u64..2_000_000) {
        prop_assert_eq!(is_prime(n), is_prime_naive(n));
    }

    #[test]
    fn matches_naive_on_wide_odd_values(n in 1u64..4_000_000_000) {
        // Odd-only keeps the naive check affordable at larger magnitudes.
        let candidate = n | 1;
        prop_assert_eq!(is_prime(candidate), is_prime_naive(candidate));
    }

    #[test]
    fn semiprimes_are_rejected(a in 0usize..PRIMES.len(), b in 0usize..PRIMES.len()) {
        if let Some(product) = PRIMES[a].checked_mul(PRIMES[b]) {
            prop_assert!(!is_prime(product), "{} * {} reported prime", PRIMES[a], PRIMES[b]);
        }
    }

    #[test]
    fn even_values_above_two_are_composite(n in 2u64..u64::MAX / 2) {
        prop_assert!(!is_prime(n * 2));
    }

    #[test]
    fn known_primes_stay_prime_after_scaling(i in 0usize..PRIMES.len()) {
        prop_assert!(is_prime(PRIMES[i]));
    }
}
