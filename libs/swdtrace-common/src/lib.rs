pub mod swd;

use std::{fmt::Display, str::FromStr};

/// Trace time in the units of the source file's timescale
pub type Time = u64;

/// 4-state logic level of a 1-bit wire
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Level {
    Zero,
    One,
    #[default]
    X,
    Z,
}

impl Level {
    /// Normalizes a captured value literal.
    ///
    /// `0`, `1`, `x`/`X`, `z`/`Z` map to themselves, a single-bit vector literal
    /// (`b0`, `B1`, `bz`, ...) maps to its bit. Anything else collapses to `X`.
    pub fn from_literal(literal: &str) -> Self {
        match literal {
            "0" => Self::Zero,
            "1" => Self::One,
            "x" | "X" => Self::X,
            "z" | "Z" => Self::Z,
            _ => match literal.strip_prefix(|c: char| c == 'b' || c == 'B') {
                Some(bit) if bit.len() == 1 => Self::from_literal(bit),
                _ => Self::X,
            },
        }
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, Self::Zero | Self::One)
    }

    pub fn as_bit(&self) -> Option<bool> {
        match self {
            Self::Zero => Some(false),
            Self::One => Some(true),
            Self::X | Self::Z => None,
        }
    }

    /// `0`/`1` stay, `Z` and `X` become `X`
    pub fn driven(&self) -> Self {
        if self.is_defined() {
            *self
        } else {
            Self::X
        }
    }

    pub fn as_char(&self) -> char {
        match self {
            Self::Zero => '0',
            Self::One => '1',
            Self::X => 'X',
            Self::Z => 'Z',
        }
    }
}

impl From<bool> for Level {
    fn from(value: bool) -> Self {
        if value {
            Self::One
        } else {
            Self::Zero
        }
    }
}

impl Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Event {
    pub ts: Time,
    pub level: Level,
}

impl From<(Time, Level)> for Event {
    fn from((ts, level): (Time, Level)) -> Self {
        Self { ts, level }
    }
}

/// Level changes of one wire, ordered by time. Immutable once built.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Timeline {
    events: Vec<Event>,
}

impl Timeline {
    /// Level reported before the first event
    pub const BASELINE: Level = Level::Zero;

    pub fn new(mut events: Vec<Event>) -> Self {
        // Stable, so same-timestamp events keep their capture order
        events.sort_by_key(|event| event.ts);
        Self { events }
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Level of the most recent event with `event.ts <= ts`, [`Self::BASELINE`] if none
    pub fn value_at(&self, ts: Time) -> Level {
        let after = self.events.partition_point(|event| event.ts <= ts);
        match after.checked_sub(1) {
            Some(index) => self.events[index].level,
            None => Self::BASELINE,
        }
    }

    pub fn change_times(&self) -> impl Iterator<Item = Time> + '_ {
        self.events.iter().map(|event| event.ts)
    }

    /// Timestamps where the level becomes `1` from anything else.
    ///
    /// The very first event counts as a rise when it is `1`.
    pub fn rising_edges(&self) -> Vec<Time> {
        let mut edges = Vec::new();
        let mut last = None;
        for event in self.events.iter() {
            if event.level == Level::One && last != Some(Level::One) {
                edges.push(event.ts);
            }
            last = Some(event.level);
        }
        edges
    }

    /// Number of level changes with a timestamp in `[from, to]`
    pub fn transitions_within(&self, from: Time, to: Time) -> usize {
        let mut last = self.value_at(from.saturating_sub(1));
        let mut count = 0;
        for event in self
            .events
            .iter()
            .skip_while(|event| event.ts < from)
            .take_while(|event| event.ts <= to)
        {
            if event.level != last {
                count += 1;
                last = event.level;
            }
        }
        count
    }
}

impl FromIterator<Event> for Timeline {
    fn from_iter<T: IntoIterator<Item = Event>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl FromIterator<(Time, Level)> for Timeline {
    fn from_iter<T: IntoIterator<Item = (Time, Level)>>(iter: T) -> Self {
        iter.into_iter().map(Event::from).collect()
    }
}

/// One clock period between a rising edge and the falling edge that closes it
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Cycle {
    pub rise: Time,
    pub fall: Time,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CycleList {
    cycles: Vec<Cycle>,
}

impl CycleList {
    pub fn new(cycles: Vec<Cycle>) -> Self {
        Self { cycles }
    }

    pub fn len(&self) -> usize {
        self.cycles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cycles.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Cycle> {
        self.cycles.iter()
    }

    pub fn as_slice(&self) -> &[Cycle] {
        &self.cycles
    }

    /// Index of the first cycle rising strictly after `ts`
    pub fn first_rising_after(&self, ts: Time) -> Option<usize> {
        let index = self.cycles.partition_point(|cycle| cycle.rise <= ts);
        (index < self.cycles.len()).then_some(index)
    }
}

impl std::ops::Index<usize> for CycleList {
    type Output = Cycle;

    fn index(&self, index: usize) -> &Self::Output {
        &self.cycles[index]
    }
}

/// Logical wire a trace signal plays in the protocol
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SignalRole {
    /// SCK
    Clock,
    /// Active-low reset, frames are searched after its rising edges
    Reset,
    /// 1 = read, 0 = write
    Direction,
    /// What the host intends to put on the wire (MOSI)
    HostOutput,
    /// The observed bidirectional data line (SWDIO)
    Bus,
    /// Testbench-side output enable
    TargetEnable,
    /// Testbench-side output value
    TargetValue,
}

impl SignalRole {
    pub const ALL: [Self; 7] = [
        Self::Clock,
        Self::Reset,
        Self::Direction,
        Self::HostOutput,
        Self::Bus,
        Self::TargetEnable,
        Self::TargetValue,
    ];

    /// Short name used in role mappings (`sck=top.dut.sck`)
    pub fn key(&self) -> &'static str {
        match self {
            Self::Clock => "sck",
            Self::Reset => "rst_n",
            Self::Direction => "rnw",
            Self::HostOutput => "mosi",
            Self::Bus => "swdio",
            Self::TargetEnable => "tb_en",
            Self::TargetValue => "tb_val",
        }
    }

    /// Signal name suffix picked when no explicit mapping is given
    pub fn default_suffix(&self) -> &'static str {
        match self {
            Self::Clock => ".sck",
            Self::Reset => ".rst_n",
            Self::Direction => ".rnw",
            Self::HostOutput => ".mosi",
            Self::Bus => ".swdio",
            Self::TargetEnable => ".tb_swdio_en",
            Self::TargetValue => ".tb_swdio_val",
        }
    }
}

impl Display for SignalRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl Display for UnknownRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown signal role `{}`", self.0)
    }
}

impl std::error::Error for UnknownRole {}

impl FromStr for SignalRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|role| role.key() == s)
            .ok_or_else(|| UnknownRole(s.to_owned()))
    }
}
