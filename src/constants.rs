//! Constants

/// Default I2C address (ADDR pin low)
pub const DEFAULT_ADDRESS: u8 = 0x60;

/// Minimum allowed crystal frequency
pub const XTAL_FREQ_MIN: u32 = 25_000_000;

/// Maximum allowed crystal frequency
pub const XTAL_FREQ_MAX: u32 = 27_000_000;

/// Crystal fitted on most boards
pub const XTAL_FREQ_DEFAULT: u32 = 25_000_000;

/// PLL VCO, min frequency
pub const VCO_FREQ_MIN: u64 = 600_000_000;

/// PLL VCO, max frequency
pub const VCO_FREQ_MAX: u64 = 900_000_000;

/// Middle of the VCO range, the planner keeps the VCO at or just below it
pub const VCO_FREQ_CENTRE: u64 = (VCO_FREQ_MIN + VCO_FREQ_MAX) / 2;

/// Feedback multisynth integer part `a`, min
pub const PLL_MULT_MIN: u32 = 15;

/// Feedback multisynth integer part `a`, max
pub const PLL_MULT_MAX: u32 = 90;

/// Output multisynth integer part `A`, min
pub const MS_DIV_MIN: u32 = 6;

/// Output multisynth integer part `A`, max
pub const MS_DIV_MAX: u32 = 1800;

/// Fractional denominator `c` is a 20 bit field
pub const FRAC_DENOM_MAX: u32 = 0x000F_FFFF;

/// Largest output R divider
pub const R_DIV_MAX: u32 = 128;

/// Maximum output frequency
/// 900 MHz VCO and the smallest output divider
pub const OUT_FREQ_MAX: u64 = VCO_FREQ_MAX / MS_DIV_MIN as u64;

/// Minimum output frequency
/// 600 MHz VCO, the largest output divider and divide-by-128
pub const OUT_FREQ_MIN: u64 = VCO_FREQ_MIN / (MS_DIV_MAX as u64 * R_DIV_MAX as u64);

/// Maximum 7 bit initial phase offset, in quarter VCO periods
pub const PHASE_OFFSET_MAX: u8 = 0x7F;

/// Number of status reads before giving up on SYS_INIT / PLL reset
pub const POLL_ATTEMPTS_DEFAULT: u32 = 100;

/// Pause between status reads
pub const POLL_INTERVAL_US_DEFAULT: u16 = 1_000;
