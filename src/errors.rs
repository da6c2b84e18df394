//! Errors

use core::fmt;

/// Argument rejected before anything was written to the chip
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Argument {
    /// Clock output index, 0..=2
    Clock,
    /// PLL index, 0 (A) or 1 (B)
    Pll,
    /// Output R divider, a power of two up to 128
    RDiv,
    /// `int + num/den` divider triple out of range
    Divider,
    /// Initial phase offset wider than 7 bits
    PhaseOffset,
    /// Crystal frequency outside of the supported range
    CrystalFrequency,
    /// Reserved crystal load setting
    CrystalLoad,
    /// VCO frequency outside of 600..=900 MHz
    Vco,
}

/// Status poll that ran out of attempts
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Poll {
    /// SYS_INIT never cleared after power up
    SystemInit,
    /// PLL reset bits never self-cleared
    PllReset,
}

/// Driver error
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Bus transaction failed while accessing `register`
    Transport { register: u8 },
    /// Out of range argument
    InvalidArgument(Argument),
    /// No legal PLL / multisynth combination reaches the target
    UnachievableFrequency,
    /// Device kept reporting busy
    DeviceNotResponding(Poll),
    /// Configuration attempted before bring-up finished
    NotReady,
}

impl From<Argument> for Error {
    #[inline]
    fn from(a: Argument) -> Self {
        Error::InvalidArgument(a)
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Argument::Clock => "clock index",
            Argument::Pll => "PLL index",
            Argument::RDiv => "R divider",
            Argument::Divider => "divider parameters",
            Argument::PhaseOffset => "phase offset",
            Argument::CrystalFrequency => "crystal frequency",
            Argument::CrystalLoad => "crystal load",
            Argument::Vco => "VCO frequency",
        };
        f.write_str(s)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Transport { register } => write!(f, "transport error at register {}", register),
            Error::InvalidArgument(a) => write!(f, "invalid argument: {}", a),
            Error::UnachievableFrequency => write!(f, "unachievable frequency"),
            Error::DeviceNotResponding(Poll::SystemInit) => {
                write!(f, "device not responding: system init (register 0)")
            }
            Error::DeviceNotResponding(Poll::PllReset) => {
                write!(f, "device not responding: PLL reset (register 177)")
            }
            Error::NotReady => write!(f, "device not initialized"),
        }
    }
}
