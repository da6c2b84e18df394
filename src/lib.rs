#![cfg_attr(not(test), no_std)]

//! [Si5351A](https://www.skyworksinc.com/en/Products/Timing/CMOS-Clock-Generators/Si5351A-B-GT)
//! I2C clock generator driver.
//!
//! Two PLLs (A, B) multiply the crystal up to a 600..=900 MHz VCO, three
//! output multisynths divide a VCO back down, each followed by a power of
//! two R divider.
//!
//! ```ignore
//! let mut clk = Si5351a::new(i2c, Config::default());
//! clk.reset(&mut delay)?;
//! let plan = clk.set_frequency(Clock::Clk0, 10_000_000, Pll::A, &mut delay)?;
//! clk.set_power(Clock::Clk0, ClockPower::PoweredUp)?;
//! clk.set_output_enabled(Clock::Clk0, true)?;
//! ```

pub mod constants;
pub mod errors;
pub mod rational;
pub mod register;
pub mod bus;
pub mod config;
pub mod frequency;
pub mod device;

pub use config::Config;
pub use device::{Flags, Si5351a, State};
pub use errors::Error;
pub use frequency::{Divider, FrequencyPlan};
pub use register::{Clock, Pll, RDiv};
