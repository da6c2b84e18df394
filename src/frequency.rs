//! Frequency calculations

use crate::{constants::*, errors::*, rational, register::{Pll, RDiv}};


/// Multisynth divide ratio `int + num/den`, shared by the PLL feedback
/// (`a + b/c`) and output (`A + B/C`) dividers.
#[derive(Debug,Copy,Clone,PartialEq,Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Divider {
    pub int: u32,
    pub num: u32,
    pub den: u32,
}

impl Divider {
    /// Checked divider, `0 < den <= 2^20 - 1` and `num < den`.
    /// `int` must keep P1 inside its 18 bits (4..=2048).
    pub fn new(int: u32, num: u32, den: u32) -> Result<Self, Error> {
        if den == 0 || den > FRAC_DENOM_MAX || num >= den || !(4..=2048).contains(&int) {
            return Err(Argument::Divider.into());
        }
        Ok(Divider { int, num, den })
    }

    /// Integer divider, fraction `0 / (2^20 - 1)`
    #[inline]
    pub const fn integer(int: u32) -> Self {
        Divider { int, num: 0, den: FRAC_DENOM_MAX }
    }

    /// Closest divider to `numerator / denominator`.
    ///
    /// The fractional part goes through the rational approximator and is then
    /// scaled up so the denominator fills the 20 bit field as far as an
    /// integer multiple allows; `4/5` becomes `838860/1048575`.
    pub fn approximate(numerator: u32, denominator: u32) -> Self {
        if denominator == 0 {
            return Divider::integer(0);
        }
        let mut int = numerator / denominator;
        let rem = numerator % denominator;

        let r = rational::approximate(rem, denominator, FRAC_DENOM_MAX, FRAC_DENOM_MAX);
        if r.numerator >= r.denominator {
            // rounded up to the next integer
            int += 1;
            return Divider::integer(int);
        }

        let scale = FRAC_DENOM_MAX / r.denominator;
        Divider {
            int,
            num: r.numerator * scale,
            den: r.denominator * scale,
        }
    }

    /// Register encoding
    /// P1 = 128·int + ⌊128·num/den⌋ − 512
    /// P2 = 128·num − den·⌊128·num/den⌋
    /// P3 = den
    pub fn params(self: &Self) -> (u32, u32, u32) {
        let num = self.num as u64;
        let den = (self.den as u64).max(1);
        let f = 128 * num / den;
        let p1 = (128 * self.int as u64 + f).saturating_sub(512);
        let p2 = 128 * num - den * f;
        (p1 as u32, p2 as u32, self.den)
    }

    /// Decodes a register triple, exact inverse of `params` for valid dividers.
    /// An unprogrammed block decodes with `den == 0`.
    pub fn from_params(p1: u32, p2: u32, p3: u32) -> Self {
        let p = p1 + 512;
        let f = p & 0x7F;
        Divider {
            int: p >> 7,
            num: ((p2 as u64 + p3 as u64 * f as u64) / 128) as u32,
            den: p3,
        }
    }

    /// Integer mode is only legal for even integer ratios
    #[inline]
    pub fn is_even_integer(self: &Self) -> bool {
        self.num == 0 && self.int % 2 == 0
    }

    /// Fraction well formed and `a` in the PLL feedback range
    pub fn fits_feedback(self: &Self) -> bool {
        self.fraction_ok() && (PLL_MULT_MIN..=PLL_MULT_MAX).contains(&self.int)
    }

    /// Fraction well formed and `A` in the output multisynth range
    pub fn fits_multisynth(self: &Self) -> bool {
        self.fraction_ok() && (MS_DIV_MIN..=MS_DIV_MAX).contains(&self.int)
    }

    /// `crystal_hz·(a + b/c)` inside 600..=900 MHz, compared without rounding
    pub fn vco_in_range(self: &Self, crystal_hz: u32) -> bool {
        let vco_scaled = crystal_hz as u128 * self.scaled();
        let den = self.den as u128;
        self.den != 0
            && vco_scaled >= VCO_FREQ_MIN as u128 * den
            && vco_scaled <= VCO_FREQ_MAX as u128 * den
    }

    #[inline]
    fn fraction_ok(self: &Self) -> bool {
        self.den != 0 && self.den <= FRAC_DENOM_MAX && self.num < self.den
    }

    /// `int·den + num`, the ratio over `den`
    #[inline]
    fn scaled(self: &Self) -> u128 {
        self.int as u128 * self.den as u128 + self.num as u128
    }
}


/// Parameters for one output: PLL, both dividers and the R divider
#[derive(Debug,Copy,Clone,PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrequencyPlan {
    pub pll: Pll,
    pub crystal_hz: u32,
    /// PLL feedback `a + b/c`
    pub feedback: Divider,
    /// Output multisynth `A + B/C`
    pub output: Divider,
    pub r_div: RDiv,
    /// Output frequency the committed integers produce
    pub achieved_hz: f64,
}

impl FrequencyPlan {
    /// Plan from explicit parameters, every range is checked.
    /// VCO exactly at either end of 600..=900 MHz is legal.
    pub fn new(
        pll: Pll,
        crystal_hz: u32,
        feedback: Divider,
        output: Divider,
        r_div: RDiv,
    ) -> Result<Self, Error> {
        check_plan(crystal_hz, &feedback, &output)?;

        let vco_scaled = crystal_hz as u128 * feedback.scaled();
        let den = feedback.den as u128;

        // f = xtal·(a·c + b)·C / (c·(A·C + B)·R)
        let n = vco_scaled * output.den as u128;
        let d = den * output.scaled() * r_div.divisor() as u128;

        Ok(FrequencyPlan {
            pll,
            crystal_hz,
            feedback,
            output,
            r_div,
            achieved_hz: ratio(n, d),
        })
    }

    /// Repeats the checks of `new`, for plans put together field by field
    pub fn validate(self: &Self) -> Result<(), Error> {
        check_plan(self.crystal_hz, &self.feedback, &self.output)
    }

    /// PLL VCO frequency
    pub fn vco_hz(self: &Self) -> f64 {
        ratio(
            self.crystal_hz as u128 * self.feedback.scaled(),
            self.feedback.den as u128,
        )
    }
}


/// Finds PLL and output parameters for `target_hz`, the PLL is dedicated to
/// this output and free to move anywhere in the VCO range.
///
/// R dividers are tried smallest first; the first one that admits an integer
/// output divider with the VCO in range wins. Among its candidates the plan
/// prefers an exact feedback fraction, then an even output divider (integer
/// mode capable), then the VCO closest to the middle of the range from below,
/// then the smallest `a`. Smallest `a` alone would settle every target on
/// the lowest legal VCO (20 MHz from 25 MHz on 600 MHz), so it only breaks
/// ties left by the earlier keys; 20 MHz ends up on `a = 28 + 838860/1048575`,
/// 720 MHz and `A = 36`.
pub fn plan(target_hz: u32, crystal_hz: u32, pll: Pll) -> Result<FrequencyPlan, Error> {
    check_crystal(crystal_hz)?;
    if !(OUT_FREQ_MIN..=OUT_FREQ_MAX).contains(&(target_hz as u64)) {
        log::debug!("plan {} Hz: out of range", target_hz);
        return Err(Error::UnachievableFrequency);
    }

    for r in RDiv::ALL.iter().copied() {
        let step = target_hz as u64 * r.divisor() as u64;
        if step * MS_DIV_MIN as u64 > VCO_FREQ_MAX {
            break;
        }

        let lo = ((VCO_FREQ_MIN + step - 1) / step).max(MS_DIV_MIN as u64);
        let hi = (VCO_FREQ_MAX / step).min(MS_DIV_MAX as u64);

        let best = (lo..=hi)
            .filter_map(|div| {
                let vco = step * div;
                let feedback = Divider::approximate(vco as u32, crystal_hz);
                // rejects rounding that lands the committed VCO out of range
                let p = FrequencyPlan::new(pll, crystal_hz, feedback, Divider::integer(div as u32), r).ok()?;
                let exact = crystal_hz as u128 * feedback.scaled() == vco as u128 * feedback.den as u128;
                let above = vco > VCO_FREQ_CENTRE;
                let distance = if above { vco - VCO_FREQ_CENTRE } else { VCO_FREQ_CENTRE - vco };
                Some(((!exact, div % 2 == 1, above, distance, feedback.int), p))
            })
            .min_by_key(|c| c.0);

        if let Some((_, p)) = best {
            log::debug!(
                "plan {} Hz: PLL {:?} a={}+{}/{} A={} R={} -> {} Hz",
                target_hz, pll, p.feedback.int, p.feedback.num, p.feedback.den,
                p.output.int, r.divisor(), p.achieved_hz
            );
            return Ok(p);
        }
    }

    log::debug!("plan {} Hz: unachievable", target_hz);
    Err(Error::UnachievableFrequency)
}

/// Plans an output against a PLL already running at `vco_hz`, as when two
/// outputs share one PLL. The output divider goes fractional where needed.
pub fn plan_with_vco(target_hz: u32, crystal_hz: u32, pll: Pll, vco_hz: u32) -> Result<FrequencyPlan, Error> {
    check_crystal(crystal_hz)?;
    (if !(VCO_FREQ_MIN..=VCO_FREQ_MAX).contains(&(vco_hz as u64)) { Err(Argument::Vco) } else { Ok(()) })?;
    if target_hz == 0 {
        return Err(Error::UnachievableFrequency);
    }

    let feedback = Divider::approximate(vco_hz, crystal_hz);

    for r in RDiv::ALL.iter().copied() {
        let step = target_hz as u64 * r.divisor() as u64;
        if step * MS_DIV_MIN as u64 > vco_hz as u64 {
            break;
        }
        let output = Divider::approximate(vco_hz, step as u32);
        if output.fits_multisynth() {
            let p = FrequencyPlan::new(pll, crystal_hz, feedback, output, r)?;
            log::debug!(
                "plan {} Hz on VCO {} Hz: A={}+{}/{} R={} -> {} Hz",
                target_hz, vco_hz, output.int, output.num, output.den, r.divisor(), p.achieved_hz
            );
            return Ok(p);
        }
    }

    Err(Error::UnachievableFrequency)
}


fn check_plan(crystal_hz: u32, feedback: &Divider, output: &Divider) -> Result<(), Error> {
    check_crystal(crystal_hz)?;
    (if !feedback.fits_feedback() || !output.fits_multisynth() { Err(Argument::Divider) } else { Ok(()) })?;
    (if !feedback.vco_in_range(crystal_hz) { Err(Argument::Vco) } else { Ok(()) })?;
    Ok(())
}

fn check_crystal(crystal_hz: u32) -> Result<(), Error> {
    if (XTAL_FREQ_MIN..=XTAL_FREQ_MAX).contains(&crystal_hz) {
        Ok(())
    } else {
        Err(Argument::CrystalFrequency.into())
    }
}

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// `n / d` reduced first so exact ratios come out exact
fn ratio(n: u128, d: u128) -> f64 {
    let g = gcd(n, d).max(1);
    (n / g) as f64 / (d / g) as f64
}


#[cfg(test)]
mod tests {
    use super::*;

    const XTAL: u32 = 25_000_000;

    #[test]
    fn twenty_megahertz() {
        let p = plan(20_000_000, XTAL, Pll::A).unwrap();
        assert_eq!(p.feedback, Divider { int: 28, num: 838_860, den: 1_048_575 });
        assert_eq!(p.output, Divider { int: 36, num: 0, den: 1_048_575 });
        assert_eq!(p.r_div, RDiv::Div1);
        assert_eq!(p.pll, Pll::A);
        assert_eq!(p.vco_hz(), 720_000_000.0);
        assert_eq!(p.achieved_hz, 20_000_000.0);
    }

    #[test]
    fn explicit_plan_at_vco_floor() {
        let p = FrequencyPlan::new(
            Pll::A,
            XTAL,
            Divider::new(24, 0, 1_048_575).unwrap(),
            Divider::new(90, 0, 1_048_575).unwrap(),
            RDiv::Div4,
        )
        .unwrap();

        let fb = p.feedback;
        assert_eq!(
            XTAL as u64 * (fb.int as u64 * fb.den as u64 + fb.num as u64),
            VCO_FREQ_MIN * fb.den as u64
        );
        assert_eq!(p.vco_hz(), 600_000_000.0);
        assert!((p.achieved_hz - 600_000_000.0 / 360.0).abs() < 1e-6);
        assert!((p.achieved_hz - 1_666_666.67).abs() < 0.01);
    }

    #[test]
    fn explicit_plan_rejects_out_of_range() {
        let ms = Divider::integer(90);
        // 23·25 MHz = 575 MHz
        assert_eq!(
            FrequencyPlan::new(Pll::A, XTAL, Divider::integer(23), ms, RDiv::Div1),
            Err(Error::InvalidArgument(Argument::Vco))
        );
        // 36 + 1/2 -> 912.5 MHz
        assert_eq!(
            FrequencyPlan::new(Pll::B, XTAL, Divider::new(36, 1, 2).unwrap(), ms, RDiv::Div1),
            Err(Error::InvalidArgument(Argument::Vco))
        );
        assert_eq!(
            FrequencyPlan::new(Pll::A, XTAL, Divider::integer(91), ms, RDiv::Div1),
            Err(Error::InvalidArgument(Argument::Divider))
        );
        assert_eq!(
            FrequencyPlan::new(Pll::A, XTAL, Divider::integer(30), Divider::integer(5), RDiv::Div1),
            Err(Error::InvalidArgument(Argument::Divider))
        );
        assert_eq!(
            FrequencyPlan::new(Pll::A, 10_000_000, Divider::integer(30), ms, RDiv::Div1),
            Err(Error::InvalidArgument(Argument::CrystalFrequency))
        );
    }

    #[test]
    fn deterministic() {
        for t in [20_000_000u32, 10_000_000, 14_318_180, 1_000, 3_333_333].iter().copied() {
            assert_eq!(plan(t, XTAL, Pll::B), plan(t, XTAL, Pll::B));
        }
    }

    #[test]
    fn sweep_within_tolerance() {
        let mut t: u64 = 8_000;
        let mut n = 0;
        while t <= 150_000_000 {
            let p = plan(t as u32, XTAL, Pll::A).unwrap_or_else(|e| panic!("{} Hz: {:?}", t, e));
            let err = (p.achieved_hz - t as f64).abs() / t as f64;
            assert!(err < 1e-7, "{} Hz: achieved {} Hz", t, p.achieved_hz);

            assert!(p.feedback.fits_feedback());
            assert!(p.output.fits_multisynth());
            let vco = p.vco_hz();
            assert!(vco >= 600e6 && vco <= 900e6, "{} Hz: VCO {}", t, vco);

            t = t * 137 / 100 + 7;
            n += 1;
        }
        assert!(n > 20);

        let p = plan(150_000_000, XTAL, Pll::A).unwrap();
        assert_eq!((p.output.int, p.r_div), (6, RDiv::Div1));
        assert_eq!(p.achieved_hz, 150_000_000.0);
    }

    #[test]
    fn low_targets_use_r_divider() {
        let p = plan(8_000, XTAL, Pll::A).unwrap();
        assert!(p.r_div.divisor() > 1);
        assert_eq!(p.achieved_hz, 8_000.0);
    }

    #[test]
    fn unachievable() {
        for t in [0u32, 1, 2_000, 160_000_000, u32::MAX].iter().copied() {
            assert_eq!(plan(t, XTAL, Pll::A), Err(Error::UnachievableFrequency), "{} Hz", t);
        }
        assert_eq!(plan(1_000_000, 0, Pll::A), Err(Error::InvalidArgument(Argument::CrystalFrequency)));
    }

    #[test]
    fn shared_vco() {
        let p = plan_with_vco(7_000_000, XTAL, Pll::B, 900_000_000).unwrap();
        assert_eq!(p.feedback, Divider::integer(36));
        assert_eq!(p.output.int, 128);
        assert_eq!(p.output.num * 7, p.output.den * 4);
        assert_eq!(p.achieved_hz, 7_000_000.0);

        assert_eq!(plan_with_vco(120_000_000, XTAL, Pll::A, 600_000_000), Err(Error::UnachievableFrequency));
        assert_eq!(
            plan_with_vco(1_000_000, XTAL, Pll::A, 950_000_000),
            Err(Error::InvalidArgument(Argument::Vco))
        );
    }

    #[test]
    fn divider_params() {
        let d = Divider::new(28, 838_860, 1_048_575).unwrap();
        assert_eq!(d.params(), (3174, 419_430, 1_048_575));
        assert_eq!(Divider::integer(36).params(), (128 * 36 - 512, 0, 1_048_575));

        for &int in [6u32, 15, 36, 90, 1800].iter() {
            for &(num, den) in [(0u32, 1u32), (1, 2), (1, 3), (4, 5), (838_860, 1_048_575), (1_048_574, 1_048_575), (99, 1000)].iter() {
                let d = Divider::new(int, num, den).unwrap();
                let (p1, p2, p3) = d.params();
                assert_eq!(Divider::from_params(p1, p2, p3), d);
                assert!(p1 < 1 << 18 && p2 < 1 << 20 && p3 < 1 << 20);
            }
        }
    }

    #[test]
    fn divider_checks() {
        let bad = Err(Error::InvalidArgument(Argument::Divider));
        assert_eq!(Divider::new(28, 0, 0), bad);
        assert_eq!(Divider::new(28, 5, 5), bad);
        assert_eq!(Divider::new(28, 0, 1 << 20), bad);
        assert_eq!(Divider::new(3, 0, 1), bad);
        assert!(Divider::new(28, 0, 1).is_ok());
    }

    #[test]
    fn divider_approximation() {
        assert_eq!(Divider::approximate(720_000_000, XTAL), Divider { int: 28, num: 838_860, den: 1_048_575 });
        assert_eq!(Divider::approximate(600_000_000, XTAL), Divider::integer(24));
        // rounds up into the integer part
        assert_eq!(Divider::approximate(999_999_999, 1_000_000_000), Divider::integer(1));
        assert!(Divider::integer(36).is_even_integer());
        assert!(!Divider::integer(35).is_even_integer());
        assert!(!Divider::new(36, 1, 2).unwrap().is_even_integer());
    }
}
