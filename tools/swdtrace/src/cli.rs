use clap::{Parser, ValueEnum};
use clio::Input;
use swdtrace_common::SignalRole;
use swdtrace_decode::{DecodeConfig, DirectionMode, ParityConvention};

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Use the `rnw` signal when captured, otherwise infer from ACK and host activity
    Auto,
    /// Treat every frame as a read
    Read,
    /// Treat every frame as a write
    Write,
}

impl From<Mode> for DirectionMode {
    fn from(value: Mode) -> Self {
        match value {
            Mode::Auto => DirectionMode::Auto,
            Mode::Read => DirectionMode::Read,
            Mode::Write => DirectionMode::Write,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum Parity {
    /// Parity bit is set for an odd number of ones in DATA
    Direct,
    /// Parity bit is set for an even number of ones in DATA
    Inverted,
}

impl From<Parity> for ParityConvention {
    fn from(value: Parity) -> Self {
        match value {
            Parity::Direct => ParityConvention::Direct,
            Parity::Inverted => ParityConvention::Inverted,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// One summary line per frame
    Text,
    /// A single XML document covering every input
    Xml,
}

/// SWD frame decoder for VCD captures
#[derive(Parser, Debug)]
pub struct Args {
    /// VCD files, each one decoded independently
    #[arg(value_parser, required = true)]
    pub input: Vec<Input>,

    /// Explicit role mapping `role=full.signal.name`
    ///
    /// Roles: sck, rst_n, rnw, mosi, swdio, tb_en, tb_val. Roles without a
    /// mapping are looked up by their default name suffix (`.sck`, `.swdio`, ...).
    #[arg(long = "map")]
    pub map: Vec<String>,

    #[arg(long, value_enum, default_value_t = Mode::Auto)]
    pub mode: Mode,

    #[arg(long, value_enum, default_value_t = Parity::Direct)]
    pub parity: Parity,

    /// Candidate frame starts tried after each reset
    #[arg(
        long,
        env = "SWDTRACE_MAX_SHIFT",
        default_value_t = 32,
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..)
    )]
    pub max_shift: usize,

    /// Lowest alignment score accepted as a frame (max 15)
    #[arg(long, env = "SWDTRACE_MIN_SCORE", default_value_t = 8)]
    pub min_score: u32,

    /// Offset added to clock edges before sampling, in trace time units
    #[arg(long, default_value_t = 1)]
    pub epsilon: u64,

    /// Host output transitions in the data phase above which a frame is a write
    #[arg(long, default_value_t = 2)]
    pub activity_threshold: usize,

    /// Only build cycles and lanes, do not look for frames
    #[arg(long, default_value_t = false)]
    pub raw_only: bool,

    /// Prefix frames with their time range
    #[arg(long = "ts", default_value_t = false)]
    pub ts: bool,

    #[arg(long, value_enum, default_value_t = Format::Text)]
    pub format: Format,
}

impl Args {
    pub fn decode_config(&self) -> DecodeConfig {
        DecodeConfig {
            sample_epsilon: self.epsilon,
            max_shift: self.max_shift,
            min_score: self.min_score,
            direction: self.mode.into(),
            write_activity_threshold: self.activity_threshold,
            parity: self.parity.into(),
        }
    }

    /// Valid `--map` entries, bad ones are reported and dropped
    pub fn role_mapping(&self) -> Vec<(SignalRole, String)> {
        self.map
            .iter()
            .filter_map(|entry| match parse_mapping(entry) {
                Ok(mapping) => Some(mapping),
                Err(err) => {
                    log::warn!("Ignoring --map {entry}: {err}");
                    None
                }
            })
            .collect()
    }
}

fn parse_mapping(entry: &str) -> Result<(SignalRole, String), String> {
    let Some((role, name)) = entry.split_once('=') else {
        return Err("expected role=name".to_owned());
    };
    let role = role.trim().parse::<SignalRole>().map_err(|err| err.to_string())?;
    let name = name.trim();
    if name.is_empty() {
        return Err("empty signal name".to_owned());
    }
    Ok((role, name.to_owned()))
}
