use std::fmt::Display;

use swdtrace_common::{swd::Ack, Level};

use crate::frame::Direction;

/// How the transmitted parity bit relates to the population count of the data word
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ParityConvention {
    /// Parity bit equals popcount mod 2
    #[default]
    Direct,
    /// Parity bit equals the complement of popcount mod 2
    Inverted,
}

impl ParityConvention {
    pub fn expected(&self, data: u32) -> bool {
        let odd = data.count_ones() & 1 == 1;
        match self {
            ParityConvention::Direct => odd,
            ParityConvention::Inverted => !odd,
        }
    }
}

/// Outcome of comparing the captured parity bit with the data word
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ParityCheck {
    Ok,
    /// Everything was defined but the bit disagrees
    Mismatch,
    /// ACK was not OK, or the data word or parity bit was not defined
    Undefined,
}

impl ParityCheck {
    pub fn evaluate(
        convention: ParityConvention,
        ack: Option<Ack>,
        data: Option<u32>,
        parity_bit: Level,
    ) -> Self {
        let (Some(Ack::Ok), Some(data), Some(bit)) = (ack, data, parity_bit.as_bit()) else {
            return ParityCheck::Undefined;
        };
        if convention.expected(data) == bit {
            ParityCheck::Ok
        } else {
            ParityCheck::Mismatch
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ParityCheck::Ok => "OK",
            ParityCheck::Mismatch => "ERR",
            ParityCheck::Undefined => "?",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    ReadOk,
    ReadWaitFault,
    ReadUnrecognized,
    WriteOk,
    WriteWaitFault,
    WriteUnrecognized,
}

impl Verdict {
    pub fn new(direction: Direction, ack: Option<Ack>) -> Self {
        match (direction, ack) {
            (Direction::Read, Some(Ack::Ok)) => Verdict::ReadOk,
            (Direction::Read, Some(Ack::Wait | Ack::Fault)) => Verdict::ReadWaitFault,
            (Direction::Read, None) => Verdict::ReadUnrecognized,
            (Direction::Write, Some(Ack::Ok)) => Verdict::WriteOk,
            (Direction::Write, Some(Ack::Wait | Ack::Fault)) => Verdict::WriteWaitFault,
            (Direction::Write, None) => Verdict::WriteUnrecognized,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Verdict::ReadOk | Verdict::WriteOk)
    }
}

impl Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Verdict::ReadOk => "READ_OK",
            Verdict::ReadWaitFault => "READ_WAIT/FAULT",
            Verdict::ReadUnrecognized => "READ(?)",
            Verdict::WriteOk => "WRITE_OK",
            Verdict::WriteWaitFault => "WRITE_WAIT/FAULT",
            Verdict::WriteUnrecognized => "WRITE(?)",
        })
    }
}
