// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct AppConfig {
    #[allow(dead_code)]
    name: String,
    #[allow(dead_code)]
    board: String,
    clocks: Clocks,
    tick: Timer,
    capture: Capture,
    trigger: Trigger,
    serial: BTreeMap<String, Serial>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Clocks {
    iclk: u32,
    pclka: u32,
    pclkb: u32,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Timer {
    cmt: u8,
    rate: u32,
    level: u8,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Capture {
    cmt: u8,
    rate: u32,
    level: u8,
    samples: u16,
}

#[derive(Copy, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Pins {
    First,
    Second,
    Third,
}

impl Pins {
    fn path(self) -> &'static str {
        match self {
            Pins::First => "PinOption::First",
            Pins::Second => "PinOption::Second",
            Pins::Third => "PinOption::Third",
        }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Trigger {
    irq: u8,
    pins: Pins,
    level: u8,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Serial {
    channel: u8,
    baud: u32,
    level: u8,
    recv_fifo: usize,
    send_fifo: usize,
}

fn check_level(what: &str, level: u8) -> Result<()> {
    if level > 15 {
        bail!("{what}: interrupt level {level} is above 15");
    }
    Ok(())
}

fn check_serial(name: &str, s: &Serial) -> Result<()> {
    if !matches!(s.channel, 0..=7 | 12) {
        bail!("serial.{name}: no SCI{} on this part", s.channel);
    }
    if s.baud == 0 {
        bail!("serial.{name}: baud must be nonzero");
    }
    check_level(&format!("serial.{name}"), s.level)?;
    // putch throttles at 7/8 full, which needs a few slots to mean anything.
    if s.recv_fifo < 2 || s.send_fifo < 8 {
        bail!("serial.{name}: FIFOs too small");
    }
    Ok(())
}

fn check(config: &AppConfig) -> Result<()> {
    let c = &config.clocks;
    if c.pclka > c.iclk || c.pclkb > c.pclka {
        bail!("peripheral clocks must not run faster than ICLK");
    }
    check_level("tick", config.tick.level)?;
    check_level("capture", config.capture.level)?;
    check_level("trigger", config.trigger.level)?;
    if config.tick.rate == 0 || config.capture.rate == 0 {
        bail!("timer rates must be nonzero");
    }
    let timers = [("tick", config.tick.cmt), ("capture", config.capture.cmt)];
    for (what, cmt) in timers {
        if cmt > 3 {
            bail!("{what}: no CMT{cmt} on this part");
        }
    }
    if config.tick.cmt == config.capture.cmt {
        bail!("tick and capture can't share CMT{}", config.tick.cmt);
    }
    if !(1..=1024).contains(&config.capture.samples) {
        bail!(
            "capture.samples must be 1..=1024, got {}",
            config.capture.samples
        );
    }
    if config.trigger.irq > 15 {
        bail!("trigger.irq {} is not an IRQ line", config.trigger.irq);
    }
    for name in ["debug", "main"] {
        let s = config
            .serial
            .get(name)
            .with_context(|| format!("missing [serial.{name}]"))?;
        check_serial(name, s)?;
    }
    Ok(())
}

fn write_serial(out: &mut impl Write, name: &str, s: &Serial) -> Result<()> {
    let upper = name.to_uppercase();
    writeln!(out, "pub const {upper}_SCI: u8 = {};", s.channel)?;
    writeln!(out, "pub const {upper}_BAUD: u32 = {};", s.baud)?;
    writeln!(out, "pub const {upper}_LEVEL: u8 = {};", s.level)?;
    writeln!(out, "pub const {upper}_RECV_FIFO: usize = {};", s.recv_fifo)?;
    writeln!(out, "pub const {upper}_SEND_FIFO: usize = {};", s.send_fifo)?;
    Ok(())
}

fn generate(config: &AppConfig, out: &mut impl Write) -> Result<()> {
    writeln!(out, "// Generated from app.toml by build.rs.")?;
    writeln!(out, "use drv_rx_sys_api::PinOption;")?;
    writeln!(out, "pub const PCLKB: u32 = {};", config.clocks.pclkb)?;
    writeln!(out, "pub const TICK_CMT: u8 = {};", config.tick.cmt)?;
    writeln!(out, "pub const TICK_RATE: u32 = {};", config.tick.rate)?;
    writeln!(out, "pub const TICK_LEVEL: u8 = {};", config.tick.level)?;
    writeln!(out, "pub const CAPTURE_CMT: u8 = {};", config.capture.cmt)?;
    writeln!(out, "pub const CAPTURE_RATE: u32 = {};", config.capture.rate)?;
    writeln!(out, "pub const CAPTURE_LEVEL: u8 = {};", config.capture.level)?;
    writeln!(out, "pub const SAMPLES: u16 = {};", config.capture.samples)?;
    writeln!(out, "pub const TRIGGER_IRQ: u8 = {};", config.trigger.irq)?;
    writeln!(
        out,
        "pub const TRIGGER_PINS: PinOption = {};",
        config.trigger.pins.path()
    )?;
    writeln!(out, "pub const TRIGGER_LEVEL: u8 = {};", config.trigger.level)?;
    for name in ["debug", "main"] {
        write_serial(out, name, &config.serial[name])?;
    }
    Ok(())
}

fn main() -> Result<()> {
    let dir = PathBuf::from(std::env::var("CARGO_MANIFEST_DIR")?);
    let path = dir.join("app.toml");
    println!("cargo:rerun-if-changed={}", path.display());

    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("reading {}", path.display()))?;
    let config: AppConfig = toml::from_str(&text)
        .with_context(|| format!("parsing {}", path.display()))?;
    check(&config)?;

    let out = PathBuf::from(std::env::var("OUT_DIR")?).join("config.rs");
    let mut file = std::fs::File::create(&out)
        .with_context(|| format!("creating {}", out.display()))?;
    generate(&config, &mut file)?;
    Ok(())
}
