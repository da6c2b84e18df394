//! Best rational approximation with bounded numerator and denominator

/// `numerator / denominator`, not necessarily reduced
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Rational {
    pub numerator: u32,
    pub denominator: u32,
}

impl Rational {
    /// `0 / 1`
    pub const ZERO: Rational = Rational { numerator: 0, denominator: 1 };
}

/// Closest fraction to `given_numerator / given_denominator` with
/// `numerator <= max_numerator` and `denominator <= max_denominator`.
///
/// Walks the continued fraction expansion of the input, keeping the last two
/// convergents `h(n) = a(n)·h(n-1) + h(n-2)`, `k(n) = a(n)·k(n-1) + k(n-2)`.
/// Stops when the remainder hits zero (exact) or when the next convergent no
/// longer fits; in the latter case the largest semi-convergent that still fits
/// is returned if it beats the previous convergent.
///
/// A zero denominator on input yields `0 / 1`, as does a zero numerator.
/// A zero `max_denominator` is treated as 1.
pub fn approximate(
    given_numerator: u32,
    given_denominator: u32,
    max_numerator: u32,
    max_denominator: u32,
) -> Rational {
    if given_denominator == 0 {
        return Rational::ZERO;
    }

    let max_n = max_numerator as u64;
    let max_d = max_denominator.max(1) as u64;

    let mut n = given_numerator as u64;
    let mut d = given_denominator as u64;

    // (n0/d0, n1/d1) are the two most recent convergents
    let (mut n0, mut d0) = (0u64, 1u64);
    let (mut n1, mut d1) = (1u64, 0u64);

    while d != 0 {
        let dp = d;
        let a = n / d;
        d = n % d;
        n = dp;

        let n2 = n0 + a * n1;
        let d2 = d0 + a * d1;

        if n2 > max_n || d2 > max_d {
            let mut t = u64::MAX;
            if d1 != 0 {
                t = (max_d - d0) / d1;
            }
            if n1 != 0 {
                t = t.min(max_n.saturating_sub(n0) / n1);
            }

            // with n1 == 0 every semi-convergent has numerator n0
            let fits = n1 != 0 || n0 <= max_n;

            // semi-convergent wins over the previous convergent when t > a/2,
            // on t == a/2 compare the remainders
            if fits && (d1 == 0 || 2 * t > a || (2 * t == a && d0 * dp > d1 * d)) {
                n1 = n0 + t * n1;
                d1 = d0 + t * d1;
            }
            break;
        }

        n0 = n1;
        n1 = n2;
        d0 = d1;
        d1 = d2;
    }

    Rational {
        numerator: n1 as u32,
        denominator: d1 as u32,
    }
}
