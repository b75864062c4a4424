use swdtrace_common::{swd::FRAME_CYCLES, Event, Level, Time, Timeline};

use crate::frame::{layout, Direction, FrameView};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Owner {
    Host,
    Target,
    Released,
}

/// Who drives the bus during cycle `offset` of a frame.
///
/// Inferred only from the offset, the decoded direction and whether the
/// acknowledge was OK. Used when no target enable exists; the enable-based
/// lanes in [`crate::lanes`] are never mixed with it.
pub fn owner_at(offset: usize, direction: Direction, ack_ok: bool) -> Owner {
    if offset < layout::TA1 {
        Owner::Host
    } else if offset < layout::ACK.end || offset >= FRAME_CYCLES || !ack_ok {
        Owner::Released
    } else {
        match direction {
            Direction::Read => Owner::Target,
            Direction::Write if offset == layout::WRITE_TA2 => Owner::Released,
            Direction::Write => Owner::Host,
        }
    }
}

/// Host and target drive lanes of one frame, attributed by [`owner_at`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttributedLanes {
    pub host: Timeline,
    pub target: Timeline,
}

impl AttributedLanes {
    /// Both lanes start at the frame's first rising edge and end released (`Z`)
    /// at its closing falling edge. Host-owned cycles show the bus after the
    /// rising edge, target-owned ones the bus after the falling edge.
    pub fn from_offsets(view: &FrameView, direction: Direction, ack_ok: bool) -> Self {
        let bus = &view.signals().bus;
        let mut host = Vec::with_capacity(FRAME_CYCLES + 1);
        let mut target = Vec::with_capacity(FRAME_CYCLES + 1);
        for offset in 0..FRAME_CYCLES {
            let ts = view.edge(offset);
            let (host_level, target_level) = match owner_at(offset, direction, ack_ok) {
                Owner::Host => (bus.value_at(view.host_sample_ts(offset)).driven(), Level::Z),
                Owner::Target => (Level::Z, bus.value_at(view.target_sample_ts(offset)).driven()),
                Owner::Released => (Level::Z, Level::Z),
            };
            push_change(&mut host, ts, host_level);
            push_change(&mut target, ts, target_level);
        }
        let end = view.edge(FRAME_CYCLES);
        push_change(&mut host, end, Level::Z);
        push_change(&mut target, end, Level::Z);
        Self {
            host: Timeline::new(host),
            target: Timeline::new(target),
        }
    }
}

fn push_change(events: &mut Vec<Event>, ts: Time, level: Level) {
    if events.last().map(|event| event.level) != Some(level) {
        events.push(Event { ts, level });
    }
}
