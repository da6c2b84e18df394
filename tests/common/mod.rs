//! In-memory Si5351A for driving the controller in tests

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use embedded_hal::blocking::{
    delay::DelayUs,
    i2c::{Read, Write},
};

/// One bus transaction as the chip saw it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Txn {
    /// Register pointer plus data
    Write { start: u8, data: Vec<u8> },
    /// Auto-increment read from the last pointer
    Read { start: u8, len: usize },
}

#[derive(Debug)]
pub struct Chip {
    pub mem: [u8; 256],
    pub address: u8,
    pointer: u8,
    pub log: Vec<Txn>,
    /// Status reads that still report SYS_INIT
    pub busy_reads: usize,
    /// PLL reset bits never self-clear
    pub reset_stuck: bool,
    /// Every data write fails
    pub fail_writes: bool,
    /// Every read fails
    pub fail_reads: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeError {
    Nack,
    Io,
}

/// Shared handle, the test keeps one clone to inspect the chip
#[derive(Debug, Clone)]
pub struct FakeChip(pub Rc<RefCell<Chip>>);

impl FakeChip {
    pub fn new() -> Self {
        let mut mem = [0u8; 256];
        mem[183] = 0xD2;
        FakeChip(Rc::new(RefCell::new(Chip {
            mem,
            address: 0x60,
            pointer: 0,
            log: Vec::new(),
            busy_reads: 0,
            reset_stuck: false,
            fail_writes: false,
            fail_reads: false,
        })))
    }

    pub fn reg(&self, addr: u8) -> u8 {
        self.0.borrow().mem[addr as usize]
    }

    pub fn regs(&self, start: u8, len: usize) -> Vec<u8> {
        self.0.borrow().mem[start as usize..start as usize + len].to_vec()
    }

    pub fn log(&self) -> Vec<Txn> {
        self.0.borrow().log.clone()
    }

    pub fn clear_log(&self) {
        self.0.borrow_mut().log.clear();
    }

    pub fn writes(&self) -> Vec<(u8, Vec<u8>)> {
        self.log()
            .into_iter()
            .filter_map(|t| match t {
                Txn::Write { start, data } => Some((start, data)),
                Txn::Read { .. } => None,
            })
            .collect()
    }

    pub fn reads(&self) -> Vec<(u8, usize)> {
        self.log()
            .into_iter()
            .filter_map(|t| match t {
                Txn::Read { start, len } => Some((start, len)),
                Txn::Write { .. } => None,
            })
            .collect()
    }

    pub fn set(&self, f: impl FnOnce(&mut Chip)) {
        f(&mut self.0.borrow_mut())
    }
}

impl Write for FakeChip {
    type Error = FakeError;

    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), FakeError> {
        let mut c = self.0.borrow_mut();
        if address != c.address {
            return Err(FakeError::Nack);
        }
        let (start, data) = match bytes.split_first() {
            Some((s, d)) => (*s, d),
            None => return Ok(()),
        };
        c.pointer = start;
        if data.is_empty() {
            return Ok(());
        }
        if c.fail_writes {
            return Err(FakeError::Io);
        }

        c.log.push(Txn::Write { start, data: data.to_vec() });
        for (i, b) in data.iter().enumerate() {
            let a = start as usize + i;
            let v = match a {
                // self-clearing reset bits
                177 if !c.reset_stuck => b & !0xA0,
                // sticky bits clear on 0, never set by software
                1 => c.mem[1] & b,
                _ => *b,
            };
            c.mem[a] = v;
        }
        Ok(())
    }
}

impl Read for FakeChip {
    type Error = FakeError;

    fn read(&mut self, address: u8, buffer: &mut [u8]) -> Result<(), FakeError> {
        let mut c = self.0.borrow_mut();
        if address != c.address {
            return Err(FakeError::Nack);
        }
        if c.fail_reads {
            return Err(FakeError::Io);
        }

        let start = c.pointer;
        c.log.push(Txn::Read { start, len: buffer.len() });
        for (i, b) in buffer.iter_mut().enumerate() {
            let a = start as usize + i;
            *b = c.mem[a];
            if a == 0 && c.busy_reads > 0 {
                *b |= 0x80;
            }
        }
        if start == 0 && c.busy_reads > 0 {
            c.busy_reads -= 1;
        }
        Ok(())
    }
}

/// `DelayUs` that only counts
#[derive(Debug, Default)]
pub struct CountingDelay {
    pub calls: u32,
    pub total_us: u32,
}

impl DelayUs<u16> for CountingDelay {
    fn delay_us(&mut self, us: u16) {
        self.calls += 1;
        self.total_us += us as u32;
    }
}

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
