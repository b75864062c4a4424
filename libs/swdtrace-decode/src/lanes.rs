use std::collections::BTreeSet;

use swdtrace_common::{CycleList, Event, Level, Time, Timeline};

use crate::{config::DecodeConfig, frame::optional, TraceSignals};

/// Clock edge a sample-hold lane latches on
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LaneKind {
    Clock,
    Reset,
    Direction,
    HostDrive,
    HostSample,
    TargetDrive,
    TargetSample,
}

impl LaneKind {
    pub fn label(&self) -> &'static str {
        match self {
            LaneKind::Clock => "clk (SCK)",
            LaneKind::Reset => "rst_n",
            LaneKind::Direction => "rnw (1=READ)",
            LaneKind::HostDrive => "host_drive (to SWDIO)",
            LaneKind::HostSample => "host_sample (SWDIO @posedge)",
            LaneKind::TargetDrive => "target_drive (TB)",
            LaneKind::TargetSample => "target_sample (SWDIO @negedge)",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Lane {
    pub kind: LaneKind,
    pub timeline: Timeline,
}

/// Builds the synthetic "who drives the wire" and "what got latched" timelines
#[derive(Copy, Clone, Debug)]
pub struct LaneEngine {
    epsilon: Time,
}

impl LaneEngine {
    pub fn new(config: &DecodeConfig) -> Self {
        Self {
            epsilon: config.sample_epsilon,
        }
    }

    /// `value` while `enable` is `1`, `Z` otherwise. Empty unless both inputs exist.
    pub fn target_drive(&self, enable: &Timeline, value: &Timeline) -> Timeline {
        if enable.is_empty() || value.is_empty() {
            return Timeline::default();
        }
        step_lane(change_times(&[enable, value]), |ts| {
            if enable.value_at(ts) == Level::One {
                value.value_at(ts).driven()
            } else {
                Level::Z
            }
        })
    }

    /// What the host is putting on the wire.
    ///
    /// `Z` while the target enable reads `1` or while the bus floats, the host
    /// output otherwise. Empty unless both the host output and the bus exist.
    pub fn host_drive_on_wire(
        &self,
        host_output: &Timeline,
        bus: &Timeline,
        enable: Option<&Timeline>,
    ) -> Timeline {
        if host_output.is_empty() || bus.is_empty() {
            return Timeline::default();
        }
        let mut inputs = vec![host_output, bus];
        inputs.extend(enable);
        step_lane(change_times(&inputs), |ts| {
            if enable.is_some_and(|enable| enable.value_at(ts) == Level::One) {
                return Level::Z;
            }
            match bus.value_at(ts) {
                Level::Z => Level::Z,
                _ => host_output.value_at(ts).driven(),
            }
        })
    }

    /// Value of `signal` just after each `edge`, held until the next edge changes it
    pub fn sample_hold(&self, cycles: &CycleList, signal: &Timeline, edge: Edge) -> Timeline {
        if cycles.is_empty() || signal.is_empty() {
            return Timeline::default();
        }
        let mut events = Vec::new();
        let mut last = None;
        for cycle in cycles.iter() {
            let ts = match edge {
                Edge::Rising => cycle.rise,
                Edge::Falling => cycle.fall,
            };
            let level = signal.value_at(ts.saturating_add(self.epsilon));
            if last != Some(level) {
                events.push(Event { ts, level });
                last = Some(level);
            }
        }
        Timeline::new(events)
    }

    /// Raw clock/reset/direction followed by the four derived lanes
    pub fn standard_lanes(&self, signals: &TraceSignals, cycles: &CycleList) -> Vec<Lane> {
        let lane = |kind, timeline| Lane { kind, timeline };
        vec![
            lane(LaneKind::Clock, signals.clock.clone()),
            lane(LaneKind::Reset, signals.reset.clone()),
            lane(LaneKind::Direction, signals.direction.clone()),
            lane(
                LaneKind::HostDrive,
                self.host_drive_on_wire(
                    &signals.host_output,
                    &signals.bus,
                    optional(&signals.target_enable),
                ),
            ),
            lane(
                LaneKind::HostSample,
                self.sample_hold(cycles, &signals.bus, Edge::Rising),
            ),
            lane(
                LaneKind::TargetDrive,
                self.target_drive(&signals.target_enable, &signals.target_value),
            ),
            lane(
                LaneKind::TargetSample,
                self.sample_hold(cycles, &signals.bus, Edge::Falling),
            ),
        ]
    }
}

/// Sorted union of the change instants of all inputs
fn change_times(inputs: &[&Timeline]) -> BTreeSet<Time> {
    inputs
        .iter()
        .flat_map(|timeline| timeline.change_times())
        .collect()
}

/// Evaluates `level_at` at every instant and keeps only the changes
fn step_lane(times: BTreeSet<Time>, level_at: impl Fn(Time) -> Level) -> Timeline {
    let mut events = Vec::new();
    let mut last = None;
    for ts in times {
        let level = level_at(ts);
        if last != Some(level) {
            events.push(Event { ts, level });
            last = Some(level);
        }
    }
    Timeline::new(events)
}
