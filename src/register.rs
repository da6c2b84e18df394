//! Si5351A registers

use core::convert::TryFrom;
use core::marker::PhantomData;

use crate::errors::*;
use crate::frequency::Divider;

/// Register kind marker types
macro_rules! gen_register_marker {
    ($(#[$meta:meta])* $r:ident) => {
        $(#[$meta])*
        #[derive(Debug,Copy,Clone,PartialEq,Eq)]
        pub struct $r {}
    }
}

gen_register_marker!(
    /// Register 0, device status (read only)
    DeviceStatus
);
gen_register_marker!(
    /// Register 1, interrupt status sticky bits
    InterruptStatusSticky
);
gen_register_marker!(
    /// Register 2, interrupt status mask
    InterruptStatusMask
);
gen_register_marker!(
    /// Register 3, output enable control (1 = disabled)
    OutputEnableControl
);
gen_register_marker!(
    /// Register 9, OEB pin enable control (1 = pin ignored)
    OebPinEnableControl
);
gen_register_marker!(
    /// Register 15, PLL input source
    PllInputSource
);
gen_register_marker!(
    /// Registers 16..=18, CLKx control
    ClockControl
);
gen_register_marker!(
    /// Register 24, CLK0..2 disable state
    ClockDisableState
);
gen_register_marker!(
    /// Registers 165..=167, CLKx initial phase offset
    ClockPhaseOffset
);
gen_register_marker!(
    /// Register 177, PLL reset
    PllReset
);
gen_register_marker!(
    /// Register 183, crystal internal load capacitance
    CrystalLoadCapacitance
);


/// Single 8 bit register
#[derive(Debug,Copy,Clone,PartialEq,Eq)]
pub struct Reg<R> {
    /// Register byte
    pub w: u8,
    phantom: PhantomData<R>,
}

impl<R> Default for Reg<R> {
    #[inline]
    fn default() -> Self { Reg::new(0) }
}

/// Bit operations on register bytes
impl<R> Reg<R> {
    #[inline]
    pub fn new(w: u8) -> Self {
        Reg { w, phantom: PhantomData }
    }

    #[inline]
    pub fn get<F>(self: &Self) -> F
    where F: Sized + BitField<R>
    {
        F::from_bits(self.bits(F::offset(), F::num_bits()))
    }

    #[inline]
    pub fn set<F>(self: Self, f: F) -> Self
    where F: Sized + BitField<R> + Into<u8>
    {
        self.with_bits(F::offset(), F::num_bits(), f.into())
    }

    /// Raw `num_bits` wide field at `offset`, for fields repeated per clock or PLL
    #[inline]
    pub fn bits(self: &Self, offset: u8, num_bits: u8) -> u8 {
        (self.w >> offset) & mask(num_bits)
    }

    #[inline]
    pub fn with_bits(mut self: Self, offset: u8, num_bits: u8, v: u8) -> Self {
        let m = mask(num_bits) << offset;
        self.w = (self.w & !m) | ((v << offset) & m);
        self
    }

    #[inline]
    pub fn bit(self: &Self, n: u8) -> bool {
        self.bits(n, 1) != 0
    }

    #[inline]
    pub fn with_bit(self: Self, n: u8, on: bool) -> Self {
        self.with_bits(n, 1, on as u8)
    }
}

#[inline]
fn mask(num_bits: u8) -> u8 {
    ((1u16 << num_bits) - 1) as u8
}


/// Bit field within an 8 bit register
pub trait BitField<R> {
    /// Number of bits in the bit field
    fn num_bits() -> u8;

    /// Offset from 0
    fn offset() -> u8;

    #[inline]
    fn mask() -> u8 {
        mask(Self::num_bits())
    }

    /// Decodes the field bits, already shifted down to bit 0.
    /// Not a `From<u8>`: that would also give an infallible `TryFrom<u8>`.
    fn from_bits(bits: u8) -> Self where Self: Sized;
}

/// Generate BitField implementation
macro_rules! gen_bitfield_impl {
    ($r:ty, $n:ident, $nb:tt, $off:expr, |$x:ident| $decode:expr) => {
        impl BitField<$r> for $n {
            #[inline] fn num_bits() -> u8 { $nb }
            #[inline] fn offset() -> u8 { $off }
            #[inline] fn from_bits($x: u8) -> Self { $decode }
        }
    }
}

/// Small bitfield-encoded numbers boilerplate
macro_rules! gen_bitfield_struct {
    ($(#[$meta:meta])* $r:ty, $n:ident, $nb:tt, $off:expr) => {
        $(#[$meta])*
        #[derive(Debug,Copy,Clone,PartialEq,Eq)]
        #[cfg_attr(feature = "defmt", derive(defmt::Format))]
        pub struct $n(pub u8);

        gen_bitfield_impl!($r, $n, $nb, $off, |x| $n(x));

        impl From<$n> for u8 { #[inline] fn from(f: $n) -> u8 { f.0 } }
    };
}

/// Enum-encoded bitfields, variants must cover every value of the field
macro_rules! gen_bitfield_enum {
    (@first $n:ident, $first:ident $(, $rest:ident)*) => { $n::$first };
    ($(#[$meta:meta])* $r:ty, $n:ident, $nb:tt, $off:expr, {
        $($(#[$vmeta:meta])* $v:ident = $val:literal),+ $(,)?
    }) => {
        $(#[$meta])*
        #[derive(Debug,Copy,Clone,PartialEq,Eq)]
        #[cfg_attr(feature = "defmt", derive(defmt::Format))]
        pub enum $n {
            $($(#[$vmeta])* $v = $val),+
        }

        gen_bitfield_impl!($r, $n, $nb, $off, |x| {
            $( if x == $val { return $n::$v; } )+
            gen_bitfield_enum!(@first $n, $($v),+)
        });

        impl From<$n> for u8 { #[inline] fn from(f: $n) -> u8 { f as u8 } }
    };
}


/// SYS_INIT position in registers 0, 1 and 2
pub const SYS_INIT_BIT: u8 = 7;
/// LOS position in registers 0, 1 and 2
pub const LOS_BIT: u8 = 4;

gen_bitfield_enum!(
    /// SYS_INIT (bit 7) is set while the device is initializing
    /// after power up; no register should be trusted until it clears.
    DeviceStatus, SysInit, 1, SYS_INIT_BIT, {
        Ready = 0,
        Initializing = 1,
    }
);

gen_bitfield_struct!(
    /// REVID, device revision (bits 1:0)
    DeviceStatus, RevisionId, 2, 0
);


/// Clock output
#[derive(Debug,Copy,Clone,PartialEq,Eq,PartialOrd,Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Clock {
    Clk0,
    Clk1,
    Clk2,
}

impl Clock {
    /// All outputs of the Si5351A
    pub const ALL: [Clock; 3] = [Clock::Clk0, Clock::Clk1, Clock::Clk2];

    #[inline]
    pub fn index(self) -> usize { self as usize }
}

impl TryFrom<u8> for Clock {
    type Error = Error;

    fn try_from(i: u8) -> Result<Self, Error> {
        Clock::ALL.get(i as usize).copied().ok_or(Error::InvalidArgument(Argument::Clock))
    }
}


gen_bitfield_enum!(
    /// MSx_SRC (bit 5), PLL feeding the output multisynth.
    /// Also used to select a PLL anywhere else in the driver.
    ClockControl, Pll, 1, 5, {
        A = 0,
        B = 1,
    }
);

impl Pll {
    /// Both PLLs
    pub const ALL: [Pll; 2] = [Pll::A, Pll::B];

    #[inline]
    pub fn index(self) -> usize { self as usize }
}

impl TryFrom<u8> for Pll {
    type Error = Error;

    fn try_from(i: u8) -> Result<Self, Error> {
        Pll::ALL.get(i as usize).copied().ok_or(Error::InvalidArgument(Argument::Pll))
    }
}

gen_bitfield_enum!(
    /// CLKx_PDN (bit 7), output driver power down
    ClockControl, ClockPower, 1, 7, {
        PoweredUp = 0,
        PoweredDown = 1,
    }
);

gen_bitfield_enum!(
    /// MSx_INT (bit 6). Integer mode gives lower jitter but only for even
    /// integer divide ratios with no fractional part.
    ClockControl, MultiSynthMode, 1, 6, {
        Fractional = 0,
        Integer = 1,
    }
);

gen_bitfield_enum!(
    /// CLKx_INV (bit 4), output polarity
    ClockControl, Polarity, 1, 4, {
        Normal = 0,
        Inverted = 1,
    }
);

gen_bitfield_enum!(
    /// CLKx_SRC (bits 3:2), input of the output stage.
    /// CLKIN only exists on the Si5351C.
    ClockControl, ClockSource, 2, 2, {
        Crystal = 0b00,
        Clkin = 0b01,
        /// MultiSynth 0, CLK0 output shares its divider
        MultiSynth0 = 0b10,
        /// Own MultiSynth
        MultiSynth = 0b11,
    }
);

gen_bitfield_enum!(
    /// CLKx_IDRV (bits 1:0), output drive strength
    ClockControl, Drive, 2, 0, {
        Drive2mA = 0b00,
        Drive4mA = 0b01,
        Drive6mA = 0b10,
        Drive8mA = 0b11,
    }
);

gen_bitfield_enum!(
    /// PLLx_SRC, input of a PLL. The Si5351A only has the crystal.
    PllInputSource, PllSource, 1, 2, {
        Crystal = 0,
        Clkin = 1,
    }
);

gen_bitfield_enum!(
    /// CLKx_DIS_STATE, output level while the output is disabled
    ClockDisableState, DisableState, 2, 0, {
        Low = 0b00,
        High = 0b01,
        HighImpedance = 0b10,
        NeverDisabled = 0b11,
    }
);

gen_bitfield_struct!(
    /// CLKx_PHOFF (bits 6:0), initial phase offset in units of a quarter
    /// VCO period
    ClockPhaseOffset, PhaseOffset, 7, 0
);

gen_bitfield_enum!(
    /// XTAL_CL (bits 7:6), internal crystal load capacitance
    CrystalLoadCapacitance, CrystalLoad, 2, 6, {
        Reserved = 0b00,
        Load6pF = 0b01,
        Load8pF = 0b10,
        Load10pF = 0b11,
    }
);


/// Output R divider, `R_DIV` (bits 6:4 of the third multisynth register)
#[derive(Debug,Copy,Clone,PartialEq,Eq,PartialOrd,Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RDiv {
    Div1,
    Div2,
    Div4,
    Div8,
    Div16,
    Div32,
    Div64,
    Div128,
}

impl RDiv {
    /// Smallest first
    pub const ALL: [RDiv; 8] = [
        RDiv::Div1, RDiv::Div2, RDiv::Div4, RDiv::Div8,
        RDiv::Div16, RDiv::Div32, RDiv::Div64, RDiv::Div128,
    ];

    /// Divide ratio
    #[inline]
    pub fn divisor(self) -> u32 { 1 << (self as u32) }

    #[inline]
    pub fn from_bits(b: u8) -> Self { RDiv::ALL[(b & 0x07) as usize] }

    #[inline]
    pub fn bits(self) -> u8 { self as u8 }
}

impl TryFrom<u32> for RDiv {
    type Error = Error;

    /// From the divide ratio (1, 2, 4, ... 128)
    fn try_from(divisor: u32) -> Result<Self, Error> {
        RDiv::ALL.iter()
            .copied()
            .find(|r| r.divisor() == divisor)
            .ok_or(Error::InvalidArgument(Argument::RDiv))
    }
}


/// One 8 register multisynth parameter block (PLL feedback or output).
///
/// | offset | bits                                      |
/// |--------|-------------------------------------------|
/// | 0      | P3\[15:8\]                                |
/// | 1      | P3\[7:0\]                                 |
/// | 2      | R_DIV\[6:4\] DIVBY4\[3:2\] P1\[17:16\]    |
/// | 3      | P1\[15:8\]                                |
/// | 4      | P1\[7:0\]                                 |
/// | 5      | P3\[19:16\] (7:4) P2\[19:16\] (3:0)       |
/// | 6      | P2\[15:8\]                                |
/// | 7      | P2\[7:0\]                                 |
///
/// R_DIV and DIVBY4 only exist for the output multisynths, the bits are
/// reserved in the PLL blocks.
#[derive(Debug,Copy,Clone,PartialEq,Eq,Default)]
pub struct SynthParams {
    pub w: [u8; 8],
}

impl SynthParams {
    /// P1, 18 bits
    #[inline]
    pub fn p1(self: &Self) -> u32 {
        ((self.w[2] & 0x03) as u32) << 16
            | (self.w[3] as u32) << 8
            | self.w[4] as u32
    }

    #[inline]
    pub fn set_p1(mut self: Self, p1: u32) -> Self {
        self.w[2] = (self.w[2] & !0x03) | ((p1 >> 16) & 0x03) as u8;
        self.w[3] = (p1 >> 8) as u8;
        self.w[4] = p1 as u8;
        self
    }

    /// P2, 20 bits
    #[inline]
    pub fn p2(self: &Self) -> u32 {
        ((self.w[5] & 0x0F) as u32) << 16
            | (self.w[6] as u32) << 8
            | self.w[7] as u32
    }

    #[inline]
    pub fn set_p2(mut self: Self, p2: u32) -> Self {
        self.w[5] = (self.w[5] & 0xF0) | ((p2 >> 16) & 0x0F) as u8;
        self.w[6] = (p2 >> 8) as u8;
        self.w[7] = p2 as u8;
        self
    }

    /// P3, 20 bits
    #[inline]
    pub fn p3(self: &Self) -> u32 {
        ((self.w[5] >> 4) as u32) << 16
            | (self.w[0] as u32) << 8
            | self.w[1] as u32
    }

    #[inline]
    pub fn set_p3(mut self: Self, p3: u32) -> Self {
        self.w[5] = (self.w[5] & 0x0F) | (((p3 >> 16) & 0x0F) as u8) << 4;
        self.w[0] = (p3 >> 8) as u8;
        self.w[1] = p3 as u8;
        self
    }

    #[inline]
    pub fn r_div(self: &Self) -> RDiv {
        RDiv::from_bits(self.w[2] >> 4)
    }

    #[inline]
    pub fn set_r_div(mut self: Self, r: RDiv) -> Self {
        self.w[2] = (self.w[2] & !0x70) | (r.bits() << 4);
        self
    }

    /// DIVBY4 (bits 3:2), only 0b11 with an integer divide by 4
    #[inline]
    pub fn divby4(self: &Self) -> u8 {
        (self.w[2] >> 2) & 0x03
    }

    #[inline]
    pub fn set_divby4(mut self: Self, v: u8) -> Self {
        self.w[2] = (self.w[2] & !0x0C) | ((v & 0x03) << 2);
        self
    }

    /// `a + b/c` this block encodes
    #[inline]
    pub fn divider(self: &Self) -> Divider {
        Divider::from_params(self.p1(), self.p2(), self.p3())
    }

    #[inline]
    pub fn set_divider(self: Self, d: Divider) -> Self {
        let (p1, p2, p3) = d.params();
        self.set_p1(p1).set_p2(p2).set_p3(p3)
    }
}


/// Register addresses
pub mod addr {
    pub const DEVICE_STATUS: u8 = 0;
    pub const INTERRUPT_STATUS_STICKY: u8 = 1;
    pub const INTERRUPT_STATUS_MASK: u8 = 2;
    pub const OUTPUT_ENABLE_CONTROL: u8 = 3;
    pub const OEB_PIN_ENABLE_CONTROL: u8 = 9;
    pub const PLL_INPUT_SOURCE: u8 = 15;
    pub const CLK0_CONTROL: u8 = 16;
    pub const CLK_DISABLE_STATE: u8 = 24;
    pub const MSNA_PARAMS: u8 = 26;
    pub const MS0_PARAMS: u8 = 42;
    pub const SYNTH_PARAMS_LEN: u8 = 8;
    pub const SPREAD_SPECTRUM: u8 = 149;
    pub const SPREAD_SPECTRUM_LEN: u8 = 13;
    pub const CLK0_PHASE_OFFSET: u8 = 165;
    pub const PLL_RESET: u8 = 177;
    pub const CRYSTAL_LOAD: u8 = 183;
}

/// Contiguous run of registers, moved over the bus in one transaction
#[derive(Debug,Copy,Clone,PartialEq,Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Block {
    pub start: u8,
    pub len: u8,
}

/// Longest block the driver moves at once
pub const BLOCK_LEN_MAX: usize = 40;

impl Block {
    pub const DEVICE_STATUS: Block = Block::new(addr::DEVICE_STATUS, 1);
    pub const INTERRUPT_STATUS_STICKY: Block = Block::new(addr::INTERRUPT_STATUS_STICKY, 1);
    pub const INTERRUPT_STATUS_MASK: Block = Block::new(addr::INTERRUPT_STATUS_MASK, 1);
    pub const OUTPUT_ENABLE_CONTROL: Block = Block::new(addr::OUTPUT_ENABLE_CONTROL, 1);
    pub const OEB_PIN_ENABLE_CONTROL: Block = Block::new(addr::OEB_PIN_ENABLE_CONTROL, 1);
    pub const PLL_INPUT_SOURCE: Block = Block::new(addr::PLL_INPUT_SOURCE, 1);
    pub const CLOCK_CONTROL_ALL: Block = Block::new(addr::CLK0_CONTROL, 3);
    pub const CLK_DISABLE_STATE: Block = Block::new(addr::CLK_DISABLE_STATE, 1);
    pub const SPREAD_SPECTRUM: Block = Block::new(addr::SPREAD_SPECTRUM, addr::SPREAD_SPECTRUM_LEN);
    pub const PLL_RESET: Block = Block::new(addr::PLL_RESET, 1);
    pub const CRYSTAL_LOAD: Block = Block::new(addr::CRYSTAL_LOAD, 1);

    /// Everything the shadow mirrors, batched into auto-increment reads
    pub const SHADOW: [Block; 9] = [
        Block::new(addr::DEVICE_STATUS, 4),
        Block::OEB_PIN_ENABLE_CONTROL,
        Block::new(addr::PLL_INPUT_SOURCE, 4),
        Block::CLK_DISABLE_STATE,
        Block::new(addr::MSNA_PARAMS, 5 * addr::SYNTH_PARAMS_LEN),
        Block::SPREAD_SPECTRUM,
        Block::new(addr::CLK0_PHASE_OFFSET, 3),
        Block::PLL_RESET,
        Block::CRYSTAL_LOAD,
    ];

    #[inline]
    pub const fn new(start: u8, len: u8) -> Self {
        Block { start, len }
    }

    #[inline]
    pub fn clock_control(clk: Clock) -> Self {
        Block::new(addr::CLK0_CONTROL + clk.index() as u8, 1)
    }

    #[inline]
    pub fn phase_offset(clk: Clock) -> Self {
        Block::new(addr::CLK0_PHASE_OFFSET + clk.index() as u8, 1)
    }

    /// PLL feedback multisynth, MSNA / MSNB
    #[inline]
    pub fn feedback(pll: Pll) -> Self {
        Block::new(addr::MSNA_PARAMS + addr::SYNTH_PARAMS_LEN * pll.index() as u8, addr::SYNTH_PARAMS_LEN)
    }

    /// Output multisynth, MS0..MS2
    #[inline]
    pub fn multisynth(clk: Clock) -> Self {
        Block::new(addr::MS0_PARAMS + addr::SYNTH_PARAMS_LEN * clk.index() as u8, addr::SYNTH_PARAMS_LEN)
    }

    #[inline]
    pub fn end(self: &Self) -> u16 {
        self.start as u16 + self.len as u16
    }

    #[inline]
    pub fn addrs(self: &Self) -> core::ops::Range<u16> {
        self.start as u16..self.end()
    }
}


/// In-memory mirror of every register the driver touches.
/// Defaults to all bits 0.
#[derive(Debug,Copy,Clone,PartialEq,Eq,Default)]
pub struct RegisterImage {
    pub device_status: Reg<DeviceStatus>,
    pub interrupt_sticky: Reg<InterruptStatusSticky>,
    pub interrupt_mask: Reg<InterruptStatusMask>,
    pub output_enable: Reg<OutputEnableControl>,
    pub oeb_pin_enable: Reg<OebPinEnableControl>,
    pub pll_input_source: Reg<PllInputSource>,
    pub clock_control: [Reg<ClockControl>; 3],
    pub disable_state: Reg<ClockDisableState>,
    pub feedback: [SynthParams; 2],
    pub multisynth: [SynthParams; 3],
    pub spread_spectrum: [u8; 13],
    pub phase_offset: [Reg<ClockPhaseOffset>; 3],
    pub pll_reset: Reg<PllReset>,
    pub crystal_load: Reg<CrystalLoadCapacitance>,
}

/// Bit of a per-PLL loss of lock flag in registers 0, 1 and 2
#[inline]
pub fn lol_bit(pll: Pll) -> u8 { 5 + pll.index() as u8 }

impl RegisterImage {

    /// Mirrored byte at register `addr`
    pub fn byte(self: &Self, addr: u8) -> Option<u8> {
        let b = match addr {
            0 => self.device_status.w,
            1 => self.interrupt_sticky.w,
            2 => self.interrupt_mask.w,
            3 => self.output_enable.w,
            9 => self.oeb_pin_enable.w,
            15 => self.pll_input_source.w,
            16..=18 => self.clock_control[(addr - 16) as usize].w,
            24 => self.disable_state.w,
            26..=41 => {
                let o = (addr - 26) as usize;
                self.feedback[o / 8].w[o % 8]
            }
            42..=65 => {
                let o = (addr - 42) as usize;
                self.multisynth[o / 8].w[o % 8]
            }
            149..=161 => self.spread_spectrum[(addr - 149) as usize],
            165..=167 => self.phase_offset[(addr - 165) as usize].w,
            177 => self.pll_reset.w,
            183 => self.crystal_load.w,
            _ => return None,
        };
        Some(b)
    }

    fn byte_mut(self: &mut Self, addr: u8) -> Option<&mut u8> {
        let b = match addr {
            0 => &mut self.device_status.w,
            1 => &mut self.interrupt_sticky.w,
            2 => &mut self.interrupt_mask.w,
            3 => &mut self.output_enable.w,
            9 => &mut self.oeb_pin_enable.w,
            15 => &mut self.pll_input_source.w,
            16..=18 => &mut self.clock_control[(addr - 16) as usize].w,
            24 => &mut self.disable_state.w,
            26..=41 => {
                let o = (addr - 26) as usize;
                &mut self.feedback[o / 8].w[o % 8]
            }
            42..=65 => {
                let o = (addr - 42) as usize;
                &mut self.multisynth[o / 8].w[o % 8]
            }
            149..=161 => &mut self.spread_spectrum[(addr - 149) as usize],
            165..=167 => &mut self.phase_offset[(addr - 165) as usize].w,
            177 => &mut self.pll_reset.w,
            183 => &mut self.crystal_load.w,
            _ => return None,
        };
        Some(b)
    }

    /// Store bytes read from the chip starting at register `start`.
    /// Addresses the image does not mirror are skipped.
    pub fn load(self: &mut Self, start: u8, bytes: &[u8]) {
        for (a, b) in (start as u16..).zip(bytes.iter()) {
            if let Ok(a) = u8::try_from(a) {
                if let Some(slot) = self.byte_mut(a) {
                    *slot = *b;
                }
            }
        }
    }

    /// Serialize `block` as a bus write: register address followed by data.
    /// Unmirrored addresses inside the block are sent as 0.
    pub fn encode<'a>(self: &Self, block: Block, buf: &'a mut [u8; BLOCK_LEN_MAX + 1]) -> &'a [u8] {
        let len = (block.len as usize).min(BLOCK_LEN_MAX);
        buf[0] = block.start;
        for (i, a) in block.addrs().take(len).enumerate() {
            buf[i + 1] = u8::try_from(a).ok().and_then(|a| self.byte(a)).unwrap_or(0);
        }
        &buf[..len + 1]
    }

    // Status

    #[inline]
    pub fn sys_init(self: &Self) -> SysInit {
        self.device_status.get()
    }

    #[inline]
    pub fn revision(self: &Self) -> RevisionId {
        self.device_status.get()
    }

    /// LOL_A / LOL_B, PLL lost lock
    #[inline]
    pub fn loss_of_lock(self: &Self, pll: Pll) -> bool {
        self.device_status.bit(lol_bit(pll))
    }

    /// LOS, crystal / CLKIN loss of signal
    #[inline]
    pub fn loss_of_signal(self: &Self) -> bool {
        self.device_status.bit(LOS_BIT)
    }

    /// LOL_x_STKY
    #[inline]
    pub fn loss_of_lock_sticky(self: &Self, pll: Pll) -> bool {
        self.interrupt_sticky.bit(lol_bit(pll))
    }

    #[inline]
    pub fn clear_loss_of_lock_sticky(self: &mut Self, pll: Pll) {
        self.interrupt_sticky = self.interrupt_sticky.with_bit(lol_bit(pll), false);
    }

    // Interrupts

    /// LOL_x_MASK
    #[inline]
    pub fn interrupt_masked(self: &Self, pll: Pll) -> bool {
        self.interrupt_mask.bit(lol_bit(pll))
    }

    #[inline]
    pub fn set_interrupt_masked(self: &mut Self, pll: Pll, masked: bool) {
        self.interrupt_mask = self.interrupt_mask.with_bit(lol_bit(pll), masked);
    }

    // Output enable

    #[inline]
    pub fn output_enabled(self: &Self, clk: Clock) -> bool {
        !self.output_enable.bit(clk.index() as u8)
    }

    #[inline]
    pub fn set_output_enabled(self: &mut Self, clk: Clock, on: bool) {
        self.output_enable = self.output_enable.with_bit(clk.index() as u8, !on);
    }

    /// True when the OEB pin gates this output
    #[inline]
    pub fn oeb_pin_enabled(self: &Self, clk: Clock) -> bool {
        !self.oeb_pin_enable.bit(clk.index() as u8)
    }

    #[inline]
    pub fn set_oeb_pin_enabled(self: &mut Self, clk: Clock, enabled: bool) {
        self.oeb_pin_enable = self.oeb_pin_enable.with_bit(clk.index() as u8, !enabled);
    }

    // PLL source

    #[inline]
    pub fn pll_input_source(self: &Self, pll: Pll) -> PllSource {
        PllSource::from_bits(self.pll_input_source.bits(PllSource::offset() + pll.index() as u8, 1))
    }

    #[inline]
    pub fn set_pll_input_source(self: &mut Self, pll: Pll, src: PllSource) {
        self.pll_input_source =
            self.pll_input_source.with_bits(PllSource::offset() + pll.index() as u8, 1, src.into());
    }

    // Clock control

    #[inline]
    pub fn clock_control(self: &Self, clk: Clock) -> Reg<ClockControl> {
        self.clock_control[clk.index()]
    }

    #[inline]
    pub fn update_clock_control<F>(self: &mut Self, clk: Clock, f: F)
    where F: FnOnce(Reg<ClockControl>) -> Reg<ClockControl>
    {
        let r = &mut self.clock_control[clk.index()];
        *r = f(*r);
    }

    // Disable state

    #[inline]
    pub fn disable_state(self: &Self, clk: Clock) -> DisableState {
        DisableState::from_bits(self.disable_state.bits(2 * clk.index() as u8, DisableState::num_bits()))
    }

    #[inline]
    pub fn set_disable_state(self: &mut Self, clk: Clock, state: DisableState) {
        self.disable_state =
            self.disable_state.with_bits(2 * clk.index() as u8, DisableState::num_bits(), state.into());
    }

    // Multisynths

    #[inline]
    pub fn feedback(self: &Self, pll: Pll) -> SynthParams {
        self.feedback[pll.index()]
    }

    #[inline]
    pub fn set_feedback(self: &mut Self, pll: Pll, d: Divider) {
        let p = &mut self.feedback[pll.index()];
        *p = p.set_divider(d);
    }

    #[inline]
    pub fn multisynth(self: &Self, clk: Clock) -> SynthParams {
        self.multisynth[clk.index()]
    }

    /// Output divider and R divider; DIVBY4 is cleared, dividers below 6 are not used
    #[inline]
    pub fn set_multisynth(self: &mut Self, clk: Clock, d: Divider, r: RDiv) {
        let p = &mut self.multisynth[clk.index()];
        *p = p.set_divider(d).set_divby4(0).set_r_div(r);
    }

    #[inline]
    pub fn set_r_div(self: &mut Self, clk: Clock, r: RDiv) {
        let p = &mut self.multisynth[clk.index()];
        *p = p.set_r_div(r);
    }

    // Phase offset

    #[inline]
    pub fn phase_offset(self: &Self, clk: Clock) -> PhaseOffset {
        self.phase_offset[clk.index()].get()
    }

    #[inline]
    pub fn set_phase_offset(self: &mut Self, clk: Clock, offset: PhaseOffset) {
        let r = &mut self.phase_offset[clk.index()];
        *r = r.set(offset);
    }

    // PLL reset

    /// PLLx_RST, bit 5 for A and bit 7 for B
    #[inline]
    pub fn pll_reset_pending(self: &Self, pll: Pll) -> bool {
        self.pll_reset.bit(5 + 2 * pll.index() as u8)
    }

    #[inline]
    pub fn set_pll_reset(self: &mut Self, pll: Pll, on: bool) {
        self.pll_reset = self.pll_reset.with_bit(5 + 2 * pll.index() as u8, on);
    }

    // Crystal

    #[inline]
    pub fn crystal_load(self: &Self) -> CrystalLoad {
        self.crystal_load.get()
    }

    #[inline]
    pub fn set_crystal_load(self: &mut Self, load: CrystalLoad) {
        self.crystal_load = self.crystal_load.set(load);
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    const FIELD_20: [u32; 9] = [0, 1, 0x0F, 0xFF, 0x100, 0x5_5555, 0xA_AAAA, 0xF_0000, 0xF_FFFF];

    #[test]
    fn synth_params_fields_roundtrip() {
        for v in FIELD_20.iter().copied().chain((0..0x10_0000).step_by(4099)) {
            let p = SynthParams { w: [0xA5; 8] };
            let p1 = v & 0x3_FFFF;

            let q = p.set_p1(p1);
            assert_eq!(q.p1(), p1);
            assert_eq!((q.p2(), q.p3(), q.r_div(), q.divby4()), (p.p2(), p.p3(), p.r_div(), p.divby4()));

            let q = p.set_p2(v);
            assert_eq!(q.p2(), v);
            assert_eq!((q.p1(), q.p3()), (p.p1(), p.p3()));

            let q = p.set_p3(v);
            assert_eq!(q.p3(), v);
            assert_eq!((q.p1(), q.p2()), (p.p1(), p.p2()));
        }
    }

    #[test]
    fn synth_params_layout() {
        // a = 28, b/c = 838860/1048575 -> P1 = 3174, P2 = 419430, P3 = 1048575
        let p = SynthParams::default()
            .set_p1(3174)
            .set_p2(419_430)
            .set_p3(1_048_575)
            .set_r_div(RDiv::Div4);
        assert_eq!(p.w, [0xFF, 0xFF, 0x20, 0x0C, 0x66, 0xF6, 0x66, 0x66]);
        assert_eq!(p.r_div(), RDiv::Div4);
    }

    #[test]
    fn r_div_roundtrip() {
        let p = SynthParams { w: [0xFF; 8] };
        for r in RDiv::ALL.iter().copied() {
            let q = p.set_r_div(r);
            assert_eq!(q.r_div(), r);
            assert_eq!(q.p1(), p.p1());
            assert_eq!(q.w[2] & 0x80, 0x80);
        }
        assert_eq!(RDiv::try_from(64u32), Ok(RDiv::Div64));
        assert_eq!(RDiv::Div128.divisor(), 128);
        assert_eq!(RDiv::try_from(3u32), Err(Error::InvalidArgument(Argument::RDiv)));
        assert_eq!(RDiv::try_from(256u32), Err(Error::InvalidArgument(Argument::RDiv)));
    }

    #[test]
    fn clock_control_fields() {
        let r = Reg::<ClockControl>::default()
            .set(ClockPower::PoweredDown)
            .set(ClockSource::MultiSynth)
            .set(Drive::Drive6mA);
        assert_eq!(r.w, 0x8E);

        let r = r.set(Pll::B).set(Polarity::Inverted).set(MultiSynthMode::Integer);
        assert_eq!(r.w, 0xFE);
        assert_eq!(r.get::<Pll>(), Pll::B);
        assert_eq!(r.get::<Drive>(), Drive::Drive6mA);
        assert_eq!(r.get::<ClockSource>(), ClockSource::MultiSynth);

        let r = r.set(ClockPower::PoweredUp).set(Drive::Drive2mA);
        assert_eq!(r.w, 0x7C);
    }

    #[test]
    fn indexed_fields_roundtrip() {
        let mut img = RegisterImage::default();
        for clk in Clock::ALL.iter().copied() {
            for s in [DisableState::Low, DisableState::High, DisableState::HighImpedance, DisableState::NeverDisabled].iter().copied() {
                img.set_disable_state(clk, s);
                assert_eq!(img.disable_state(clk), s);
            }
            img.set_output_enabled(clk, true);
            assert!(img.output_enabled(clk));
            img.set_oeb_pin_enabled(clk, false);
            assert!(!img.oeb_pin_enabled(clk));
            for v in 0..=0x7F {
                img.set_phase_offset(clk, PhaseOffset(v));
                assert_eq!(img.phase_offset(clk), PhaseOffset(v));
            }
        }
        assert_eq!(img.disable_state.w, 0x3F);
        assert_eq!(img.output_enable.w, 0x00);
        assert_eq!(img.oeb_pin_enable.w, 0x07);

        let mut img = RegisterImage::default();
        for clk in Clock::ALL.iter().copied() {
            img.set_disable_state(clk, DisableState::HighImpedance);
        }
        assert_eq!(img.disable_state.w, 0x2A);
    }

    #[test]
    fn pll_flag_bits() {
        let mut img = RegisterImage::default();
        img.set_pll_reset(Pll::A, true);
        assert_eq!(img.pll_reset.w, 0x20);
        img.set_pll_reset(Pll::B, true);
        assert_eq!(img.pll_reset.w, 0xA0);
        assert!(img.pll_reset_pending(Pll::A) && img.pll_reset_pending(Pll::B));

        img.set_interrupt_masked(Pll::A, true);
        img.set_interrupt_masked(Pll::B, true);
        assert_eq!(img.interrupt_mask.w, 0x60);

        img.load(0, &[0x50]);
        assert!(img.loss_of_lock(Pll::B));
        assert!(!img.loss_of_lock(Pll::A));
        assert!(img.loss_of_signal());
        assert_eq!(img.sys_init(), SysInit::Ready);

        img.load(1, &[0x20]);
        assert!(img.loss_of_lock_sticky(Pll::A));
        img.clear_loss_of_lock_sticky(Pll::A);
        assert_eq!(img.interrupt_sticky.w, 0);

        img.set_pll_input_source(Pll::B, PllSource::Clkin);
        assert_eq!(img.pll_input_source.w, 0x08);
        assert_eq!(img.pll_input_source(Pll::A), PllSource::Crystal);
        assert_eq!(img.pll_input_source(Pll::B), PllSource::Clkin);
    }

    #[test]
    fn crystal_load_keeps_reserved_bits() {
        let mut img = RegisterImage::default();
        img.load(183, &[0xD2]);
        assert_eq!(img.crystal_load(), CrystalLoad::Load10pF);
        img.set_crystal_load(CrystalLoad::Load6pF);
        assert_eq!(img.crystal_load.w, 0x52);
    }

    #[test]
    fn load_and_encode_blocks() {
        let mut img = RegisterImage::default();
        let bytes: [u8; 40] = {
            let mut b = [0u8; 40];
            for (i, x) in b.iter_mut().enumerate() {
                *x = i as u8 + 1;
            }
            b
        };
        img.load(26, &bytes);
        assert_eq!(img.feedback(Pll::A).w, [1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(img.feedback(Pll::B).w[0], 9);
        assert_eq!(img.multisynth(Clock::Clk2).w[7], 40);

        let mut buf = [0u8; BLOCK_LEN_MAX + 1];
        assert_eq!(img.encode(Block::multisynth(Clock::Clk1), &mut buf), &[50, 25, 26, 27, 28, 29, 30, 31, 32]);
        assert_eq!(img.encode(Block::feedback(Pll::B), &mut buf)[0], 34);

        // 4..=8 are not mirrored
        img.load(0, &[0x80, 0x11, 0x22, 0x33, 0x44]);
        assert_eq!(img.sys_init(), SysInit::Initializing);
        assert_eq!(img.byte(3), Some(0x33));
        assert_eq!(img.byte(4), None);
        assert_eq!(img.byte(200), None);
    }

    #[test]
    fn shadow_covers_every_mirrored_register() {
        let covered = |a: u8| Block::SHADOW.iter().any(|b| b.addrs().any(|x| x == a as u16));
        for a in 0..=255u8 {
            assert_eq!(RegisterImage::default().byte(a).is_some(), covered(a), "register {}", a);
        }
    }

    #[test]
    fn index_conversions() {
        assert_eq!(Clock::try_from(2u8), Ok(Clock::Clk2));
        assert_eq!(Clock::try_from(3u8), Err(Error::InvalidArgument(Argument::Clock)));
        assert_eq!(Pll::try_from(1u8), Ok(Pll::B));
        assert_eq!(Pll::try_from(2u8), Err(Error::InvalidArgument(Argument::Pll)));
        for i in 2..=u8::MAX {
            assert_eq!(Pll::try_from(i), Err(Error::InvalidArgument(Argument::Pll)));
        }
    }

    #[test]
    fn field_decode_is_masked() {
        // decode only ever sees the field bits
        assert_eq!(Reg::<ClockControl>::new(0xDF).get::<Pll>(), Pll::A);
        assert_eq!(Reg::<ClockControl>::new(0x20).get::<Pll>(), Pll::B);
        assert_eq!(<Pll as BitField<ClockControl>>::from_bits(1), Pll::B);
        assert_eq!(Reg::<DeviceStatus>::new(0x80).get::<SysInit>(), SysInit::Initializing);
        assert_eq!(SysInit::offset(), SYS_INIT_BIT);
    }
}
