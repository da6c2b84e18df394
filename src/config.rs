//! Device configuration

use crate::{constants::*, errors::*, register::CrystalLoad};


/// Bring-up settings
#[derive(Debug,Copy,Clone,PartialEq,Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// 7 bit I2C address
    pub address: u8,
    /// Crystal frequency, Hz
    pub crystal_hz: u32,
    /// Internal crystal load capacitance
    pub crystal_load: CrystalLoad,
    /// Status reads before a poll gives up
    pub poll_attempts: u32,
    /// Pause between status reads, µs
    pub poll_interval_us: u16,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            address: DEFAULT_ADDRESS,
            crystal_hz: XTAL_FREQ_DEFAULT,
            crystal_load: CrystalLoad::Load10pF,
            poll_attempts: POLL_ATTEMPTS_DEFAULT,
            poll_interval_us: POLL_INTERVAL_US_DEFAULT,
        }
    }
}

impl Config {
    pub fn address(mut self: Self, address: u8) -> Self {
        self.address = address;
        self
    }

    pub fn crystal_hz(mut self: Self, hz: u32) -> Self {
        self.crystal_hz = hz;
        self
    }

    pub fn crystal_load(mut self: Self, load: CrystalLoad) -> Self {
        self.crystal_load = load;
        self
    }

    /// At least one read is always made
    pub fn poll_attempts(mut self: Self, n: u32) -> Self {
        self.poll_attempts = n.max(1);
        self
    }

    pub fn poll_interval_us(mut self: Self, us: u16) -> Self {
        self.poll_interval_us = us;
        self
    }

    /// Checks the settings the chip cannot take
    pub fn validate(self: &Self) -> Result<(), Error> {
        (if !(XTAL_FREQ_MIN..=XTAL_FREQ_MAX).contains(&self.crystal_hz) { Err(Argument::CrystalFrequency) } else { Ok(()) })?;
        (if self.crystal_load == CrystalLoad::Reserved { Err(Argument::CrystalLoad) } else { Ok(()) })?;
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = Config::default();
        assert_eq!(c.address, 0x60);
        assert_eq!(c.crystal_hz, 25_000_000);
        assert_eq!(c.crystal_load, CrystalLoad::Load10pF);
        assert_eq!(c.poll_attempts, 100);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn chained() {
        let c = Config::default()
            .address(0x61)
            .crystal_hz(27_000_000)
            .crystal_load(CrystalLoad::Load8pF)
            .poll_attempts(0)
            .poll_interval_us(10);
        assert_eq!((c.address, c.crystal_hz, c.poll_attempts, c.poll_interval_us), (0x61, 27_000_000, 1, 10));
        assert!(c.validate().is_ok());
    }

    #[test]
    fn rejects() {
        assert_eq!(
            Config::default().crystal_hz(24_999_999).validate(),
            Err(Error::InvalidArgument(Argument::CrystalFrequency))
        );
        assert_eq!(
            Config::default().crystal_load(CrystalLoad::Reserved).validate(),
            Err(Error::InvalidArgument(Argument::CrystalLoad))
        );
    }
}
