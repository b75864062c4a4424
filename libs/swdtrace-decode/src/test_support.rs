use swdtrace_common::{Cycle, CycleList, Level, Time, Timeline};

use crate::fields::decompose_lsb_first;
use crate::TraceSignals;

pub const PERIOD: Time = 10;
pub const HALF_PERIOD: Time = PERIOD / 2;
const FIRST_RISE: Time = 20;
const SETUP: Time = 3;

/// Reset rising edge placed before the first clock cycle
pub const RESET_AT: Time = 15;

/// ACK bits in wire order
pub const OK: [Level; 3] = [Level::One, Level::Zero, Level::Zero];
pub const WAIT: [Level; 3] = [Level::Zero, Level::One, Level::Zero];
pub const FAULT: [Level; 3] = [Level::Zero, Level::Zero, Level::One];

/// DP write to SELECT (A=0b10), well formed
pub const WRITE_DP_SELECT: u8 = 0b1011_0001;
/// AP read of DRW (A=0b11), well formed
pub const READ_AP_DRW: u8 = 0b1001_1111;

pub fn rise(k: usize) -> Time {
    FIRST_RISE + PERIOD * k as Time
}

pub fn clock(n: usize) -> Timeline {
    std::iter::once((0, Level::Zero))
        .chain((0..n).flat_map(|k| [(rise(k), Level::One), (rise(k) + HALF_PERIOD, Level::Zero)]))
        .collect()
}

pub fn cycle_list(n: usize) -> CycleList {
    CycleList::new(
        (0..n)
            .map(|k| Cycle {
                rise: rise(k),
                fall: rise(k) + HALF_PERIOD,
            })
            .collect(),
    )
}

/// One level per cycle, set up before that cycle's rising edge, so both
/// sampling points of the cycle see the same value
pub fn per_cycle(levels: &[Level]) -> Timeline {
    levels
        .iter()
        .enumerate()
        .map(|(k, level)| (rise(k) - SETUP, *level))
        .collect()
}

fn flip(level: Level) -> Level {
    match level {
        Level::Zero => Level::One,
        Level::One => Level::Zero,
        other => other,
    }
}

/// Changes on both edges of every cycle: `X` at the edge instant, then the
/// settled level one time unit later
pub fn on_edges(at_rise: &[Level], at_fall: &[Level]) -> Timeline {
    at_rise
        .iter()
        .zip(at_fall)
        .enumerate()
        .flat_map(|(k, (high, low))| {
            let fall = rise(k) + HALF_PERIOD;
            [
                (rise(k), Level::X),
                (rise(k) + 1, *high),
                (fall, Level::X),
                (fall + 1, *low),
            ]
        })
        .collect()
}

pub fn constant(level: Level) -> Timeline {
    [(0, level)].into_iter().collect()
}

/// Builds host output and bus levels cycle by cycle.
///
/// Cycle `k` rises at [`rise`] and falls half a period later.
#[derive(Clone, Debug, Default)]
pub struct Bench {
    pub host: Vec<Level>,
    pub bus: Vec<Level>,
}

impl Bench {
    pub fn new() -> Self {
        Self::default()
    }

    /// Host keeps the line high, nobody turns it around
    pub fn idle(mut self, cycles: usize) -> Self {
        self.host.extend(std::iter::repeat(Level::One).take(cycles));
        self.bus.extend(std::iter::repeat(Level::One).take(cycles));
        self
    }

    fn header(request: u8) -> Vec<Level> {
        let mut host = vec![Level::Zero; 2];
        host.extend(decompose_lsb_first(u32::from(request), 8));
        host
    }

    fn parity(data: u32, parity: Option<Level>) -> Level {
        parity.unwrap_or(Level::from(data.count_ones() % 2 == 1))
    }

    pub fn write_frame(mut self, request: u8, ack: [Level; 3], data: u32, parity: Option<Level>) -> Self {
        let mut host = Self::header(request);
        host.extend([Level::Zero; 5]);
        host.extend(decompose_lsb_first(data, 32));
        host.push(Self::parity(data, parity));

        let mut bus = host[..10].to_vec();
        bus.push(Level::Z);
        bus.extend(ack);
        bus.push(Level::Z);
        bus.extend_from_slice(&host[15..]);

        self.host.extend(host);
        self.bus.extend(bus);
        self
    }

    pub fn read_frame(mut self, request: u8, ack: [Level; 3], data: u32, parity: Option<Level>) -> Self {
        let mut host = Self::header(request);
        host.extend([Level::Zero; 38]);

        let mut bus = host[..10].to_vec();
        bus.push(Level::Z);
        bus.extend(ack);
        bus.extend(decompose_lsb_first(data, 32));
        bus.push(Self::parity(data, parity));
        bus.push(Level::Z);

        self.host.extend(host);
        self.bus.extend(bus);
        self
    }

    /// Clock, host output and bus, plus a reset released at `reset` when given
    pub fn signals(&self, reset: Option<Time>) -> TraceSignals {
        let reset: Timeline = reset
            .map(|ts| [(0, Level::Zero), (ts, Level::One)].into_iter().collect())
            .unwrap_or_default();
        TraceSignals {
            clock: clock(self.bus.len()),
            reset,
            host_output: per_cycle(&self.host),
            bus: per_cycle(&self.bus),
            ..Default::default()
        }
    }

    /// Like [`Bench::signals`], but host output only holds its level between
    /// the rising and the falling edge and the bus only after the falling
    /// edge; the other half of each cycle carries the inverted level.
    pub fn signals_on_edges(&self) -> TraceSignals {
        let inverted = |levels: &[Level]| levels.iter().copied().map(flip).collect::<Vec<_>>();
        TraceSignals {
            clock: clock(self.bus.len()),
            host_output: on_edges(&self.host, &inverted(&self.host)),
            bus: on_edges(&inverted(&self.bus), &self.bus),
            ..Default::default()
        }
    }
}
