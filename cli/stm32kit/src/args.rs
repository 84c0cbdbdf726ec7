//! Pin-request arguments shared by `describe`, `new` and `regenerate`.

use anyhow::{bail, Context, Result};
use clap::Args;
use stm32kit_profile::pin::{Level, PinMode};
use stm32kit_profile::{PinRequest, PinSpec};

#[derive(Args, Debug, Default, Clone)]
pub struct PinArgs {
    /// Rename the board's LED alias
    #[arg(long, value_name = "NAME")]
    pub led_alias: Option<String>,

    /// Name a pin, e.g. `SENSOR_EN=PB0:output` (repeatable)
    #[arg(long = "pin", value_name = "NAME=PIN[:MODE]")]
    pub pins: Vec<String>,

    /// Auto-name every unreserved pin as P<port><number>
    #[arg(long)]
    pub populate_all: bool,
}

impl PinArgs {
    pub fn is_empty(&self) -> bool {
        self.led_alias.is_none() && self.pins.is_empty() && !self.populate_all
    }

    pub fn to_request(&self) -> Result<PinRequest> {
        let mut request = PinRequest {
            led_alias: self.led_alias.clone(),
            populate_all: self.populate_all,
            ..PinRequest::default()
        };
        for arg in &self.pins {
            request.pins.push(parse_pin(arg).with_context(|| format!("invalid --pin '{arg}'"))?);
        }
        Ok(request)
    }

    /// `None` when no pin argument was given, so the recorded request is kept.
    pub fn to_request_if_given(&self) -> Result<Option<PinRequest>> {
        if self.is_empty() {
            Ok(None)
        } else {
            self.to_request().map(Some)
        }
    }
}

/// Parse `NAME=P<port><n>[:MODE]`.
pub fn parse_pin(arg: &str) -> Result<PinSpec> {
    let Some((name, rest)) = arg.split_once('=') else {
        bail!("expected NAME=PIN");
    };
    let (pin, mode) = match rest.split_once(':') {
        Some((pin, mode)) => (pin, Some(mode)),
        None => (rest, None),
    };
    let pin = pin.trim().to_ascii_uppercase();
    let mut chars = pin.chars();
    let (Some('P'), Some(port)) = (chars.next(), chars.next()) else {
        bail!("pin must look like PB7");
    };
    let number: u8 = chars
        .as_str()
        .parse()
        .with_context(|| format!("'{}' is not a pin number", chars.as_str()))?;

    let mut spec = PinSpec::new(name.trim(), port, number);
    match mode.map(str::trim) {
        None | Some("input") => {}
        Some("output") => spec = spec.with_mode(PinMode::Output),
        Some("output-high") => {
            spec = spec.with_mode(PinMode::Output);
            spec.initial = Level::High;
        }
        Some("analog") => spec = spec.with_mode(PinMode::Analog),
        Some(other) => bail!("unknown mode '{other}' (expected input, output, output-high or analog)"),
    }
    Ok(spec)
}
