//! Programs one Si5351A output from Linux over i2c-dev.
//!
//! Without `--freq` the PLL and multisynth parameters are taken as given;
//! the defaults put 1.666 MHz on CLK0 from a 600 MHz VCO.

use core::convert::TryFrom;
use std::process;

use anyhow::{anyhow, bail, Context};
use clap::Parser;
use linux_embedded_hal::{Delay, I2cdev};
use log::LevelFilter;

use si5351a::{
    constants::{DEFAULT_ADDRESS, FRAC_DENOM_MAX, XTAL_FREQ_DEFAULT},
    frequency,
    register::{ClockPower, ClockSource, MultiSynthMode, Polarity},
    Clock, Config, Divider, FrequencyPlan, Pll, RDiv, Si5351a,
};

#[derive(Parser, Debug)]
#[command(name = "si5351ctl", version, about = "Si5351A clock output setup")]
struct Cli {
    /// Clock output, 0..=2
    #[arg(short = 'k', long, default_value_t = 0)]
    clock: u8,

    /// PLL, 0 = A, 1 = B
    #[arg(short = 'p', long, default_value_t = 0)]
    pll: u8,

    /// PLL integer part a (15..=90)
    #[arg(short = 'a', default_value_t = 24)]
    pll_int: u32,

    /// PLL fraction numerator b
    #[arg(short = 'b', default_value_t = 0)]
    pll_num: u32,

    /// PLL fraction denominator c
    #[arg(short = 'c', default_value_t = FRAC_DENOM_MAX)]
    pll_den: u32,

    /// Multisynth integer part A (6..=1800)
    #[arg(short = 'A', default_value_t = 90)]
    ms_int: u32,

    /// Multisynth fraction numerator B
    #[arg(short = 'B', default_value_t = 0)]
    ms_num: u32,

    /// Multisynth fraction denominator C
    #[arg(short = 'C', default_value_t = FRAC_DENOM_MAX)]
    ms_den: u32,

    /// Output R divider, 1, 2, 4 ... 128
    #[arg(short = 'r', long = "rdiv", default_value_t = 4)]
    r_div: u32,

    /// Plan the dividers for this output frequency (Hz) instead
    #[arg(short = 'f', long)]
    freq: Option<u32>,

    /// Integer multisynth mode, even integer divider only
    #[arg(short = 'i', long)]
    integer: bool,

    /// Invert the output
    #[arg(short = 'n', long)]
    invert: bool,

    /// Route the crystal straight to the output
    #[arg(short = 'x', long)]
    xtal: bool,

    /// Log every bus transaction
    #[arg(short = 'v', long)]
    verbose: bool,

    /// I2C device
    #[arg(long, default_value = "/dev/i2c-1")]
    bus: String,

    /// I2C address
    #[arg(long, default_value_t = DEFAULT_ADDRESS)]
    address: u8,

    /// Crystal frequency, Hz
    #[arg(long, default_value_t = XTAL_FREQ_DEFAULT)]
    xtal_hz: u32,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            process::exit(if e.use_stderr() { 1 } else { 0 });
        }
    };

    env_logger::Builder::new()
        .filter_level(if cli.verbose { LevelFilter::Trace } else { LevelFilter::Warn })
        .parse_default_env()
        .init();

    if let Err(e) = run(&cli) {
        eprintln!("si5351ctl: {:#}", e);
        process::exit(1);
    }
}

/// Driver errors carry no `std::error::Error` impl
fn dev(e: si5351a::Error) -> anyhow::Error {
    anyhow!("{}", e)
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let clock = Clock::try_from(cli.clock).map_err(dev)?;
    let pll = Pll::try_from(cli.pll).map_err(dev)?;
    let config = Config::default().address(cli.address).crystal_hz(cli.xtal_hz);
    config.validate().map_err(dev)?;

    let plan = match cli.freq {
        Some(hz) => frequency::plan(hz, cli.xtal_hz, pll).map_err(dev).context("planning")?,
        None => {
            let r_div = RDiv::try_from(cli.r_div).map_err(dev)?;
            let feedback = Divider::new(cli.pll_int, cli.pll_num, cli.pll_den).map_err(dev).context("PLL")?;
            let output = Divider::new(cli.ms_int, cli.ms_num, cli.ms_den).map_err(dev).context("multisynth")?;
            FrequencyPlan::new(pll, cli.xtal_hz, feedback, output, r_div).map_err(dev)?
        }
    };
    if cli.integer && !plan.output.is_even_integer() {
        bail!("integer mode needs an even integer multisynth divider, got {}", plan.output.int);
    }

    let i2c = I2cdev::new(&cli.bus).with_context(|| format!("opening {}", cli.bus))?;
    let mut delay = Delay;
    let mut si = Si5351a::new(i2c, config);

    si.reset(&mut delay).map_err(dev).context("bring-up")?;
    si.apply_plan(clock, &plan, &mut delay).map_err(dev)?;
    si.set_multisynth_mode(clock, if cli.integer { MultiSynthMode::Integer } else { MultiSynthMode::Fractional })
        .map_err(dev)?;
    si.set_source(clock, if cli.xtal { ClockSource::Crystal } else { ClockSource::MultiSynth })
        .map_err(dev)?;
    si.set_polarity(clock, if cli.invert { Polarity::Inverted } else { Polarity::Normal })
        .map_err(dev)?;
    si.set_power(clock, ClockPower::PoweredUp).map_err(dev)?;
    si.set_output_enabled(clock, true).map_err(dev)?;
    si.set_oeb_pin_enabled(clock, false).map_err(dev)?;

    println!(
        "CLK{} PLL {:?}: a={}+{}/{} A={}+{}/{} R={} VCO {:.0} Hz -> {:.3} Hz",
        clock.index(),
        plan.pll,
        plan.feedback.int, plan.feedback.num, plan.feedback.den,
        plan.output.int, plan.output.num, plan.output.den,
        plan.r_div.divisor(),
        plan.vco_hz(),
        if cli.xtal { cli.xtal_hz as f64 } else { plan.achieved_hz },
    );
    Ok(())
}
