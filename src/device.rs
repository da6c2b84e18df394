//! Si5351A controller

use embedded_hal::blocking::{
    delay::DelayUs,
    i2c::{Read, Write},
};

use crate::bus::RegisterBus;
use crate::config::Config;
use crate::constants::*;
use crate::errors::*;
use crate::frequency::{self, Divider, FrequencyPlan};
use crate::register::*;


/// Bring-up progress, `reset` walks through these in order
#[derive(Debug,Copy,Clone,PartialEq,Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    Uninitialized,
    /// Waiting for SYS_INIT to clear
    PollingBusy,
    ReadingShadow,
    AssertingReset,
    /// Waiting for both PLL reset bits to self-clear
    PollingResetCleared,
    ApplyingDefaults,
    /// Configuration allowed
    Ready,
}


/// Interrupt sources, laid out the same in the status, sticky and mask registers
#[derive(Debug,Copy,Clone,PartialEq,Eq,Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Flags {
    pub sys_init: bool,
    pub loss_of_lock_b: bool,
    pub loss_of_lock_a: bool,
    pub loss_of_signal: bool,
}

impl Flags {
    /// Decodes any of the three interrupt registers
    pub fn from_reg<R>(r: Reg<R>) -> Self {
        Flags {
            sys_init: r.bit(SYS_INIT_BIT),
            loss_of_lock_b: r.bit(lol_bit(Pll::B)),
            loss_of_lock_a: r.bit(lol_bit(Pll::A)),
            loss_of_signal: r.bit(LOS_BIT),
        }
    }

    #[inline]
    pub fn loss_of_lock(self: &Self, pll: Pll) -> bool {
        match pll {
            Pll::A => self.loss_of_lock_a,
            Pll::B => self.loss_of_lock_b,
        }
    }
}


/// Si5351A on an I2C bus.
///
/// The controller owns the register image; two controllers on one chip
/// address would overwrite each other's settings.
pub struct Si5351a<I2C> {
    regs: RegisterBus<I2C>,
    config: Config,
    state: State,
}

impl<I2C> Si5351a<I2C>
where I2C: Write + Read,
{
    /// Creates the driver, nothing is sent until `reset`.
    pub fn new(i2c: I2C, config: Config) -> Self {
        Si5351a {
            regs: RegisterBus::new(i2c, config.address),
            config,
            state: State::Uninitialized,
        }
    }

    #[inline]
    pub fn state(self: &Self) -> State {
        self.state
    }

    #[inline]
    pub fn config(self: &Self) -> &Config {
        &self.config
    }

    /// Register image as last read or written
    #[inline]
    pub fn registers(self: &Self) -> &RegisterImage {
        self.regs.image()
    }

    /// Gives the I2C bus back
    pub fn release(self: Self) -> I2C {
        self.regs.release()
    }

    /// Brings the chip up: waits out the power-up self-test, reads the
    /// register image, resets both PLLs and applies the defaults.
    /// All outputs are left powered down and disabled.
    ///
    /// Blocking call, may be repeated from any state.
    pub fn reset<Delay>(self: &mut Self, delay: &mut Delay) -> Result<(), Error>
    where Delay: DelayUs<u16>,
    {
        self.config.validate()?;

        self.enter(State::PollingBusy);
        self.wait(delay, Poll::SystemInit, Self::poll_system_init)?;

        self.enter(State::ReadingShadow);
        self.regs.read_all()?;

        self.enter(State::AssertingReset);
        self.regs.request_pll_reset(&Pll::ALL)?;

        self.enter(State::PollingResetCleared);
        self.wait(delay, Poll::PllReset, Self::poll_pll_reset)?;

        self.enter(State::ApplyingDefaults);
        self.apply_defaults()?;

        self.enter(State::Ready);
        Ok(())
    }

    /// One SYS_INIT check
    pub fn poll_system_init(self: &mut Self) -> nb::Result<(), Error> {
        self.regs.read_block(Block::DEVICE_STATUS)?;
        match self.regs.image().sys_init() {
            SysInit::Ready => Ok(()),
            SysInit::Initializing => Err(nb::Error::WouldBlock),
        }
    }

    /// One check of the PLL reset bits
    pub fn poll_pll_reset(self: &mut Self) -> nb::Result<(), Error> {
        self.regs.read_block(Block::PLL_RESET)?;
        let img = self.regs.image();
        if Pll::ALL.iter().any(|p| img.pll_reset_pending(*p)) {
            Err(nb::Error::WouldBlock)
        } else {
            Ok(())
        }
    }

    fn wait<Delay, F>(self: &mut Self, delay: &mut Delay, what: Poll, mut poll: F) -> Result<(), Error>
    where Delay: DelayUs<u16>,
          F: FnMut(&mut Self) -> nb::Result<(), Error>,
    {
        let attempts = self.config.poll_attempts.max(1);
        for n in 1..=attempts {
            match poll(self) {
                Ok(()) => return Ok(()),
                Err(nb::Error::Other(e)) => return Err(e),
                Err(nb::Error::WouldBlock) => {
                    if n < attempts {
                        delay.delay_us(self.config.poll_interval_us);
                    }
                }
            }
        }
        log::warn!("{:?} poll gave up after {} attempts", what, attempts);
        Err(Error::DeviceNotResponding(what))
    }

    fn apply_defaults(self: &mut Self) -> Result<(), Error> {
        let regs = &mut self.regs;

        regs.modify(Block::OEB_PIN_ENABLE_CONTROL, |r| {
            for clk in Clock::ALL.iter() { r.set_oeb_pin_enabled(*clk, false); }
        })?;
        regs.modify(Block::OUTPUT_ENABLE_CONTROL, |r| {
            for clk in Clock::ALL.iter() { r.set_output_enabled(*clk, false); }
        })?;
        regs.modify(Block::INTERRUPT_STATUS_MASK, |r| {
            for pll in Pll::ALL.iter() { r.set_interrupt_masked(*pll, true); }
        })?;
        regs.modify(Block::CLOCK_CONTROL_ALL, |r| {
            for clk in Clock::ALL.iter() {
                r.update_clock_control(*clk, |c| c.set(ClockPower::PoweredDown));
            }
        })?;
        regs.modify(Block::PLL_INPUT_SOURCE, |r| {
            for pll in Pll::ALL.iter() { r.set_pll_input_source(*pll, PllSource::Crystal); }
        })?;
        let load = self.config.crystal_load;
        regs.set_crystal_load(load)?;
        regs.modify(Block::CLOCK_CONTROL_ALL, |r| {
            for clk in Clock::ALL.iter() {
                r.update_clock_control(*clk, |c| {
                    c.set(ClockPower::PoweredDown)
                     .set(MultiSynthMode::Fractional)
                     .set(Polarity::Normal)
                     .set(ClockSource::MultiSynth)
                     .set(Drive::Drive6mA)
                });
            }
        })?;
        regs.modify(Block::CLK_DISABLE_STATE, |r| {
            for clk in Clock::ALL.iter() { r.set_disable_state(*clk, DisableState::HighImpedance); }
        })?;
        Ok(())
    }

    fn enter(self: &mut Self, next: State) {
        log::debug!("state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    #[inline]
    fn ready(self: &Self) -> Result<(), Error> {
        if self.state == State::Ready { Ok(()) } else { Err(Error::NotReady) }
    }

    /// Device status register, read fresh
    pub fn status(self: &mut Self) -> Result<Flags, Error> {
        let status: Reg<DeviceStatus> = Reg::new(self.regs.read_register(addr::DEVICE_STATUS)?);
        Ok(Flags::from_reg(status))
    }

    /// True while the chip is still running its power-up self-test
    pub fn is_busy(self: &mut Self) -> Result<bool, Error> {
        Ok(self.status()?.sys_init)
    }

    /// Live LOL flag for `pll`, nothing is written
    pub fn loss_of_lock(self: &mut Self, pll: Pll) -> Result<bool, Error> {
        Ok(self.status()?.loss_of_lock(pll))
    }

    /// REVID as loaded into the image during bring-up
    pub fn revision(self: &Self) -> u8 {
        self.registers().revision().0
    }

    /// Sticky interrupt flags, latched until cleared
    pub fn sticky(self: &mut Self) -> Result<Flags, Error> {
        self.regs.read_block(Block::INTERRUPT_STATUS_STICKY)?;
        Ok(Flags::from_reg(self.registers().interrupt_sticky))
    }

    pub fn clear_loss_of_lock_sticky(self: &mut Self, pll: Pll) -> Result<(), Error> {
        self.ready()?;
        self.regs.read_block(Block::INTERRUPT_STATUS_STICKY)?;
        self.regs.clear_loss_of_lock_sticky(pll)
    }

    pub fn set_interrupt_mask(self: &mut Self, pll: Pll, masked: bool) -> Result<(), Error> {
        self.ready()?;
        self.regs.set_interrupt_masked(pll, masked)
    }

    /// Output enable, OEB register
    pub fn set_output_enabled(self: &mut Self, clk: Clock, on: bool) -> Result<(), Error> {
        self.ready()?;
        self.regs.set_output_enabled(clk, on)
    }

    /// Whether the OEB pin gates the output
    pub fn set_oeb_pin_enabled(self: &mut Self, clk: Clock, enabled: bool) -> Result<(), Error> {
        self.ready()?;
        self.regs.set_oeb_pin_enabled(clk, enabled)
    }

    pub fn set_power(self: &mut Self, clk: Clock, power: ClockPower) -> Result<(), Error> {
        self.ready()?;
        self.regs.update_clock_control(clk, |c| c.set(power))
    }

    pub fn set_source(self: &mut Self, clk: Clock, src: ClockSource) -> Result<(), Error> {
        self.ready()?;
        self.regs.update_clock_control(clk, |c| c.set(src))
    }

    /// PLL feeding the output multisynth
    pub fn set_pll(self: &mut Self, clk: Clock, pll: Pll) -> Result<(), Error> {
        self.ready()?;
        self.regs.update_clock_control(clk, |c| c.set(pll))
    }

    pub fn set_multisynth_mode(self: &mut Self, clk: Clock, mode: MultiSynthMode) -> Result<(), Error> {
        self.ready()?;
        self.regs.update_clock_control(clk, |c| c.set(mode))
    }

    pub fn set_polarity(self: &mut Self, clk: Clock, polarity: Polarity) -> Result<(), Error> {
        self.ready()?;
        self.regs.update_clock_control(clk, |c| c.set(polarity))
    }

    pub fn set_drive(self: &mut Self, clk: Clock, drive: Drive) -> Result<(), Error> {
        self.ready()?;
        self.regs.update_clock_control(clk, |c| c.set(drive))
    }

    pub fn set_disable_state(self: &mut Self, clk: Clock, state: DisableState) -> Result<(), Error> {
        self.ready()?;
        self.regs.set_disable_state(clk, state)
    }

    /// Initial phase offset, 0..=127 quarter VCO periods
    pub fn set_phase_offset(self: &mut Self, clk: Clock, offset: u8) -> Result<(), Error> {
        self.ready()?;
        (if offset > PHASE_OFFSET_MAX { Err(Argument::PhaseOffset) } else { Ok(()) })?;
        self.regs.set_phase_offset(clk, PhaseOffset(offset))
    }

    pub fn set_r_div(self: &mut Self, clk: Clock, rdiv: RDiv) -> Result<(), Error> {
        self.ready()?;
        self.regs.set_r_div(clk, rdiv)
    }

    /// Output multisynth `A + B/C` with its R divider, `A` in 6..=1800
    pub fn set_multisynth(self: &mut Self, clk: Clock, d: Divider, rdiv: RDiv) -> Result<(), Error> {
        self.ready()?;
        (if !d.fits_multisynth() { Err(Argument::Divider) } else { Ok(()) })?;
        self.regs.set_multisynth(clk, d, rdiv)
    }

    /// PLL feedback `a + b/c`, `a` in 15..=90 and the VCO in range.
    /// Takes effect after `pll_reset`.
    pub fn set_pll_feedback(self: &mut Self, pll: Pll, d: Divider) -> Result<(), Error> {
        self.ready()?;
        (if !d.fits_feedback() { Err(Argument::Divider) } else { Ok(()) })?;
        (if !d.vco_in_range(self.config.crystal_hz) { Err(Argument::Vco) } else { Ok(()) })?;
        self.regs.set_feedback(pll, d)
    }

    pub fn set_crystal_load(self: &mut Self, load: CrystalLoad) -> Result<(), Error> {
        self.ready()?;
        (if load == CrystalLoad::Reserved { Err(Argument::CrystalLoad) } else { Ok(()) })?;
        self.regs.set_crystal_load(load)
    }

    /// Spread spectrum registers 149..=161, written as is
    pub fn set_spread_spectrum_raw(self: &mut Self, raw: [u8; 13]) -> Result<(), Error> {
        self.ready()?;
        self.regs.set_spread_spectrum(raw)
    }

    /// Resets one PLL and waits for the reset bit to self-clear
    pub fn pll_reset<Delay>(self: &mut Self, pll: Pll, delay: &mut Delay) -> Result<(), Error>
    where Delay: DelayUs<u16>,
    {
        self.ready()?;
        self.regs.request_pll_reset(&[pll])?;
        self.wait(delay, Poll::PllReset, Self::poll_pll_reset)
    }

    /// Programs `plan` onto `clk`: PLL feedback, output multisynth and
    /// R divider, PLL selection and multisynth mode, then resets the PLL.
    /// Power and output enable are left alone.
    pub fn apply_plan<Delay>(self: &mut Self, clk: Clock, plan: &FrequencyPlan, delay: &mut Delay) -> Result<(), Error>
    where Delay: DelayUs<u16>,
    {
        self.ready()?;
        (if plan.crystal_hz != self.config.crystal_hz { Err(Argument::CrystalFrequency) } else { Ok(()) })?;
        plan.validate()?;

        let mode = if plan.output.is_even_integer() {
            MultiSynthMode::Integer
        } else {
            MultiSynthMode::Fractional
        };

        self.regs.set_feedback(plan.pll, plan.feedback)?;
        self.regs.set_multisynth(clk, plan.output, plan.r_div)?;
        self.regs.update_clock_control(clk, |c| c.set(plan.pll).set(mode))?;
        self.pll_reset(plan.pll, delay)?;

        log::debug!("{:?} -> {} Hz", clk, plan.achieved_hz);
        Ok(())
    }

    /// Plans `target_hz` on a dedicated `pll` and applies it to `clk`
    pub fn set_frequency<Delay>(
        self: &mut Self,
        clk: Clock,
        target_hz: u32,
        pll: Pll,
        delay: &mut Delay,
    ) -> Result<FrequencyPlan, Error>
    where Delay: DelayUs<u16>,
    {
        self.ready()?;
        let plan = frequency::plan(target_hz, self.config.crystal_hz, pll)?;
        self.apply_plan(clk, &plan, delay)?;
        Ok(plan)
    }
}
