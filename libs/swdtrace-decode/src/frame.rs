use std::ops::Range;

use swdtrace_common::{swd::FRAME_CYCLES, CycleList, Level, Time, Timeline};

use crate::TraceSignals;

/// Cycle offsets of each field, relative to the first cycle of the frame
pub mod layout {
    use std::ops::Range;

    pub const PAD: Range<usize> = 0..2;
    pub const REQUEST: Range<usize> = 2..10;
    pub const TA1: usize = 10;
    pub const ACK: Range<usize> = 11..14;

    pub const READ_DATA: Range<usize> = 14..46;
    pub const READ_PARITY: usize = 46;
    pub const READ_TAIL: usize = 47;

    pub const WRITE_TA2: usize = 14;
    pub const WRITE_DATA: Range<usize> = 15..47;
    pub const WRITE_PARITY: usize = 47;
}

/// Transfer direction of one frame
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

impl Direction {
    /// Level of an RnW wire for this direction
    pub fn rnw(&self) -> Level {
        match self {
            Direction::Read => Level::One,
            Direction::Write => Level::Zero,
        }
    }
}

/// Named stretch of a frame, for annotating a rendered waveform
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Zone {
    Pad,
    Request,
    Ta1,
    Ack,
    Ta2,
    Data,
    Parity,
    Tail,
}

impl Zone {
    pub fn label(&self) -> &'static str {
        match self {
            Zone::Pad => "PAD",
            Zone::Request => "REQ",
            Zone::Ta1 => "TA1",
            Zone::Ack => "ACK",
            Zone::Ta2 => "TA2",
            Zone::Data => "DATA",
            Zone::Parity => "PAR",
            Zone::Tail => "TAIL",
        }
    }

    /// Zones of a frame in order, as half-open cycle offset ranges
    pub fn layout(direction: Direction) -> [(Zone, Range<usize>); 7] {
        use self::layout::*;
        let pad = (Zone::Pad, PAD);
        let request = (Zone::Request, REQUEST);
        let ta1 = (Zone::Ta1, TA1..TA1 + 1);
        let ack = (Zone::Ack, ACK);
        match direction {
            Direction::Read => [
                pad,
                request,
                ta1,
                ack,
                (Zone::Data, READ_DATA),
                (Zone::Parity, READ_PARITY..READ_PARITY + 1),
                (Zone::Tail, READ_TAIL..READ_TAIL + 1),
            ],
            Direction::Write => [
                pad,
                request,
                ta1,
                ack,
                (Zone::Ta2, WRITE_TA2..WRITE_TA2 + 1),
                (Zone::Data, WRITE_DATA),
                (Zone::Parity, WRITE_PARITY..WRITE_PARITY + 1),
            ],
        }
    }
}

/// A 48-cycle window into a [`CycleList`] plus the signals sampled through it.
///
/// Only constructible when the whole window exists, so every offset in
/// `0..48` is addressable.
#[derive(Copy, Clone)]
pub struct FrameView<'a> {
    cycles: &'a CycleList,
    signals: &'a TraceSignals,
    epsilon: Time,
    start: usize,
}

impl<'a> FrameView<'a> {
    pub fn new(
        cycles: &'a CycleList,
        signals: &'a TraceSignals,
        epsilon: Time,
        start: usize,
    ) -> Option<Self> {
        let end = start.checked_add(FRAME_CYCLES)?;
        if end > cycles.len() {
            return None;
        }
        Some(Self {
            cycles,
            signals,
            epsilon,
            start,
        })
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn signals(&self) -> &'a TraceSignals {
        self.signals
    }

    pub fn rise(&self, offset: usize) -> Time {
        self.cycles[self.start + offset].rise
    }

    pub fn fall(&self, offset: usize) -> Time {
        self.cycles[self.start + offset].fall
    }

    /// Boundary before cycle `offset`; `48` is the falling edge closing the frame
    pub fn edge(&self, offset: usize) -> Time {
        if offset < FRAME_CYCLES {
            self.rise(offset)
        } else {
            self.fall(FRAME_CYCLES - 1)
        }
    }

    /// Sampling instant for host-driven bits
    pub fn host_sample_ts(&self, offset: usize) -> Time {
        self.rise(offset).saturating_add(self.epsilon)
    }

    /// Sampling instant for target-driven bits
    pub fn target_sample_ts(&self, offset: usize) -> Time {
        self.fall(offset).saturating_add(self.epsilon)
    }

    pub fn host_bit(&self, offset: usize) -> Level {
        self.signals
            .host_output
            .value_at(self.host_sample_ts(offset))
    }

    pub fn bus_at_fall(&self, offset: usize) -> Level {
        self.signals.bus.value_at(self.target_sample_ts(offset))
    }

    /// Target enable after the falling edge, `None` without an enable signal
    pub fn target_enable_at_fall(&self, offset: usize) -> Option<Level> {
        optional(&self.signals.target_enable)
            .map(|enable| enable.value_at(self.target_sample_ts(offset)))
    }

    /// Target-driven bit as seen on the bus.
    ///
    /// When the bus does not show a clean level but the testbench reports it is
    /// driving a defined value, that value is used instead.
    pub fn target_bit(&self, offset: usize) -> Level {
        let ts = self.target_sample_ts(offset);
        let bus = self.signals.bus.value_at(ts);
        if bus.is_defined() {
            return bus;
        }
        let (Some(enable), Some(value)) = (
            optional(&self.signals.target_enable),
            optional(&self.signals.target_value),
        ) else {
            return bus;
        };
        if enable.value_at(ts) == Level::One {
            let driven = value.value_at(ts);
            if driven.is_defined() {
                return driven;
            }
        }
        bus
    }

    pub fn host_bits(&self, offsets: Range<usize>) -> Vec<Level> {
        offsets.map(|offset| self.host_bit(offset)).collect()
    }

    pub fn target_bits(&self, offsets: Range<usize>) -> Vec<Level> {
        offsets.map(|offset| self.target_bit(offset)).collect()
    }
}

/// Absent roles are carried as empty timelines
pub(crate) fn optional(timeline: &Timeline) -> Option<&Timeline> {
    (!timeline.is_empty()).then_some(timeline)
}
