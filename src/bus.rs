//! Register transport

use embedded_hal::blocking::i2c::{Read, Write};

use crate::errors::*;
use crate::frequency::Divider;
use crate::register::*;


/// Register image kept in step with the chip over I2C.
///
/// Every mutator stages its change on a copy of the image, writes the
/// covering register block as one transaction and keeps the copy only when
/// the write went through.
pub struct RegisterBus<I2C> {
    i2c: I2C,
    address: u8,
    image: RegisterImage,
}

impl<I2C> RegisterBus<I2C>
where I2C: Write + Read,
{
    /// Zeroed image, no bus traffic
    pub fn new(i2c: I2C, address: u8) -> Self {
        RegisterBus { i2c, address, image: RegisterImage::default() }
    }

    #[inline]
    pub fn image(self: &Self) -> &RegisterImage {
        &self.image
    }

    /// Gives the I2C bus back
    pub fn release(self: Self) -> I2C {
        self.i2c
    }

    /// Reads `block` with one auto-increment read into the image
    pub fn read_block(self: &mut Self, block: Block) -> Result<(), Error> {
        let mut buf = [0u8; BLOCK_LEN_MAX];
        let data = &mut buf[..(block.len as usize).min(BLOCK_LEN_MAX)];
        read(&mut self.i2c, self.address, block.start, data)?;
        self.image.load(block.start, data);
        Ok(())
    }

    /// Reads one register without touching the image
    pub fn read_register(self: &mut Self, addr: u8) -> Result<u8, Error> {
        let mut b = [0u8];
        read(&mut self.i2c, self.address, addr, &mut b)?;
        Ok(b[0])
    }

    /// Reads every mirrored register
    pub fn read_all(self: &mut Self) -> Result<(), Error> {
        for b in Block::SHADOW.iter() {
            self.read_block(*b)?;
        }
        Ok(())
    }

    /// Stage, write `block`, commit
    pub fn modify<F>(self: &mut Self, block: Block, f: F) -> Result<(), Error>
    where F: FnOnce(&mut RegisterImage)
    {
        let mut staged = self.image;
        f(&mut staged);

        let mut buf = [0u8; BLOCK_LEN_MAX + 1];
        let bytes = staged.encode(block, &mut buf);
        log::trace!("i2c {:#04x} write [{}] {:02x?}", self.address, block.start, &bytes[1..]);
        self.i2c.write(self.address, bytes).map_err(|_| {
            log::trace!("i2c {:#04x} write [{}] failed", self.address, block.start);
            Error::Transport { register: block.start }
        })?;

        self.image = staged;
        Ok(())
    }

    pub fn set_output_enabled(self: &mut Self, clk: Clock, on: bool) -> Result<(), Error> {
        self.modify(Block::OUTPUT_ENABLE_CONTROL, |r| r.set_output_enabled(clk, on))
    }

    pub fn set_oeb_pin_enabled(self: &mut Self, clk: Clock, enabled: bool) -> Result<(), Error> {
        self.modify(Block::OEB_PIN_ENABLE_CONTROL, |r| r.set_oeb_pin_enabled(clk, enabled))
    }

    pub fn update_clock_control<F>(self: &mut Self, clk: Clock, f: F) -> Result<(), Error>
    where F: FnOnce(Reg<ClockControl>) -> Reg<ClockControl>
    {
        self.modify(Block::clock_control(clk), |r| r.update_clock_control(clk, f))
    }

    pub fn set_disable_state(self: &mut Self, clk: Clock, state: DisableState) -> Result<(), Error> {
        self.modify(Block::CLK_DISABLE_STATE, |r| r.set_disable_state(clk, state))
    }

    pub fn set_interrupt_masked(self: &mut Self, pll: Pll, masked: bool) -> Result<(), Error> {
        self.modify(Block::INTERRUPT_STATUS_MASK, |r| r.set_interrupt_masked(pll, masked))
    }

    /// All 8 feedback registers in one write
    pub fn set_feedback(self: &mut Self, pll: Pll, d: Divider) -> Result<(), Error> {
        self.modify(Block::feedback(pll), |r| r.set_feedback(pll, d))
    }

    /// All 8 multisynth registers, R divider included, in one write
    pub fn set_multisynth(self: &mut Self, clk: Clock, d: Divider, rdiv: RDiv) -> Result<(), Error> {
        self.modify(Block::multisynth(clk), |r| r.set_multisynth(clk, d, rdiv))
    }

    pub fn set_r_div(self: &mut Self, clk: Clock, rdiv: RDiv) -> Result<(), Error> {
        self.modify(Block::multisynth(clk), |r| r.set_r_div(clk, rdiv))
    }

    pub fn set_phase_offset(self: &mut Self, clk: Clock, offset: PhaseOffset) -> Result<(), Error> {
        self.modify(Block::phase_offset(clk), |r| r.set_phase_offset(clk, offset))
    }

    pub fn set_crystal_load(self: &mut Self, load: CrystalLoad) -> Result<(), Error> {
        self.modify(Block::CRYSTAL_LOAD, |r| r.set_crystal_load(load))
    }

    pub fn set_spread_spectrum(self: &mut Self, raw: [u8; 13]) -> Result<(), Error> {
        self.modify(Block::SPREAD_SPECTRUM, |r| r.spread_spectrum = raw)
    }

    /// Sets the reset bits of `plls`, the chip clears them once done
    pub fn request_pll_reset(self: &mut Self, plls: &[Pll]) -> Result<(), Error> {
        self.modify(Block::PLL_RESET, |r| {
            for p in plls.iter() {
                r.set_pll_reset(*p, true);
            }
        })
    }

    /// Sticky bits clear on writing 0
    pub fn clear_loss_of_lock_sticky(self: &mut Self, pll: Pll) -> Result<(), Error> {
        self.modify(Block::INTERRUPT_STATUS_STICKY, |r| r.clear_loss_of_lock_sticky(pll))
    }
}

/// Register pointer write followed by a read
fn read<I2C>(i2c: &mut I2C, address: u8, start: u8, data: &mut [u8]) -> Result<(), Error>
where I2C: Write + Read,
{
    i2c.write(address, &[start])
        .map_err(|_| Error::Transport { register: start })?;
    i2c.read(address, data)
        .map_err(|_| Error::Transport { register: start })?;
    log::trace!("i2c {:#04x} read [{}] {:02x?}", address, start, data);
    Ok(())
}
