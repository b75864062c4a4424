use bilge::prelude::*;

/// Cycles in one frame, PAD through PARITY/TAIL
pub const FRAME_CYCLES: usize = 48;

/// SWD packet request, as shifted out LSB-first by the host
#[bitsize(8)]
#[derive(FromBits, Copy, Clone, DebugBits, PartialEq, Eq)]
pub struct RequestHeader {
    pub start: bool,
    pub apndp: bool,
    pub rnw: bool,
    /// A[3:2]
    pub a: u2,
    pub parity: bool,
    pub stop: bool,
    pub park: bool,
}

impl RequestHeader {
    /// Even parity over APnDP, RnW, A2 and A3
    pub fn parity_ok(&self) -> bool {
        let a = self.a().value();
        let ones = self.apndp() as u8 + self.rnw() as u8 + (a & 1) + (a >> 1);
        self.parity() == (ones & 1 == 1)
    }

    /// Start set, stop clear, park set and parity matching
    pub fn is_well_formed(&self) -> bool {
        self.start() && !self.stop() && self.park() && self.parity_ok()
    }

    /// Register address as seen by the DP/AP (`A[3:2] << 2`)
    pub fn address(&self) -> u8 {
        self.a().value() << 2
    }
}

/// `R:AP[0xc]` style, the way accesses are listed in decoder output
impl std::fmt::Display for RequestHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rw = if self.rnw() { 'R' } else { 'W' };
        let port = if self.apndp() { "AP" } else { "DP" };
        write!(f, "{rw}:{port}[{:#x}]", self.address())
    }
}

/// Target acknowledge, bit 0 is the first one on the wire
#[bitsize(3)]
#[derive(TryFromBits, Copy, Clone, Debug, PartialEq, Eq)]
pub enum Ack {
    Ok = 0b001,
    Wait = 0b010,
    Fault = 0b100,
}

impl Ack {
    /// `None` for any of the five unassigned patterns
    pub fn from_bits(bits: u8) -> Option<Self> {
        Self::try_from(u3::new(bits & 0b111)).ok()
    }
}
