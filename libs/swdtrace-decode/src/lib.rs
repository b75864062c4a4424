pub mod align;
pub mod config;
pub mod cycles;
pub mod fields;
pub mod frame;
pub mod lanes;
pub mod ownership;
pub mod verdict;

#[cfg(test)]
mod test_support;

use swdtrace_common::{swd::FRAME_CYCLES, CycleList, SignalRole, Time, Timeline};

pub use align::{AlignOutcome, Alignment, Anchor, FrameAligner, Rejection};
pub use config::{DecodeConfig, DirectionMode, ParityConvention};
pub use fields::{AckBits, DecodedFrame, DirectionSource, FieldDecoder};
pub use frame::{Direction, FrameView, Zone};
pub use lanes::{Lane, LaneEngine, LaneKind};
pub use ownership::{AttributedLanes, Owner};
pub use verdict::{ParityCheck, Verdict};

use crate::{cycles::build_cycles, frame::optional};

/// Every timeline of one trace, by role. Absent roles are empty.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TraceSignals {
    pub clock: Timeline,
    pub reset: Timeline,
    pub direction: Timeline,
    pub host_output: Timeline,
    pub bus: Timeline,
    pub target_enable: Timeline,
    pub target_value: Timeline,
}

impl TraceSignals {
    pub fn with(mut self, role: SignalRole, timeline: Timeline) -> Self {
        *self.role_mut(role) = timeline;
        self
    }

    pub fn role(&self, role: SignalRole) -> &Timeline {
        match role {
            SignalRole::Clock => &self.clock,
            SignalRole::Reset => &self.reset,
            SignalRole::Direction => &self.direction,
            SignalRole::HostOutput => &self.host_output,
            SignalRole::Bus => &self.bus,
            SignalRole::TargetEnable => &self.target_enable,
            SignalRole::TargetValue => &self.target_value,
        }
    }

    pub fn role_mut(&mut self, role: SignalRole) -> &mut Timeline {
        match role {
            SignalRole::Clock => &mut self.clock,
            SignalRole::Reset => &mut self.reset,
            SignalRole::Direction => &mut self.direction,
            SignalRole::HostOutput => &mut self.host_output,
            SignalRole::Bus => &mut self.bus,
            SignalRole::TargetEnable => &mut self.target_enable,
            SignalRole::TargetValue => &mut self.target_value,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InsufficientReason {
    MissingSignal(SignalRole),
    /// The whole trace is shorter than one frame
    IncompleteCycles { available: usize },
}

/// Trace-level result, consumed by whatever renders the trace
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TraceStatus {
    Insufficient(InsufficientReason),
    /// Nothing to annotate, only raw and derived lanes are meaningful
    NoFrameFound,
    Decoded(Vec<FrameRecord>),
}

/// Time span of one zone of a decoded frame
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ZoneSpan {
    pub zone: Zone,
    pub from: Time,
    pub to: Time,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameRecord {
    pub alignment: Alignment,
    /// First rising edge of the frame
    pub start: Time,
    /// Falling edge of its last cycle
    pub end: Time,
    pub zones: Vec<ZoneSpan>,
    pub frame: DecodedFrame,
    /// Offset-based attribution, only built when the trace has no target enable
    pub attribution: Option<AttributedLanes>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceReport {
    pub cycles: CycleList,
    pub lanes: Vec<Lane>,
    /// One per anchor, in anchor order. Empty unless alignment ran.
    pub outcomes: Vec<AlignOutcome>,
    pub status: TraceStatus,
}

impl TraceReport {
    pub fn frames(&self) -> &[FrameRecord] {
        match &self.status {
            TraceStatus::Decoded(frames) => frames,
            _ => &[],
        }
    }
}

/// Decodes whole traces. Holds no state between calls.
#[derive(Copy, Clone, Debug)]
pub struct TraceDecoder {
    config: DecodeConfig,
    lanes: LaneEngine,
    aligner: FrameAligner,
    fields: FieldDecoder,
}

impl TraceDecoder {
    pub fn new(config: DecodeConfig) -> Self {
        Self {
            lanes: LaneEngine::new(&config),
            aligner: FrameAligner::new(&config),
            fields: FieldDecoder::new(&config),
            config,
        }
    }

    pub fn config(&self) -> &DecodeConfig {
        &self.config
    }

    /// Cycles and the standard lanes, without looking for frames
    pub fn lanes(&self, signals: &TraceSignals) -> (CycleList, Vec<Lane>) {
        let cycles = build_cycles(&signals.clock);
        log::debug!("{} clock cycles", cycles.len());
        let lanes = self.lanes.standard_lanes(signals, &cycles);
        (cycles, lanes)
    }

    pub fn decode(&self, signals: &TraceSignals) -> TraceReport {
        let (cycles, lanes) = self.lanes(signals);
        let report = |outcomes, status| TraceReport {
            cycles: cycles.clone(),
            lanes: lanes.clone(),
            outcomes,
            status,
        };

        for role in [SignalRole::Clock, SignalRole::Bus] {
            if signals.role(role).is_empty() {
                log::warn!("No {role} signal, trace not decodable");
                return report(
                    Vec::new(),
                    TraceStatus::Insufficient(InsufficientReason::MissingSignal(role)),
                );
            }
        }
        if cycles.len() < FRAME_CYCLES {
            log::warn!(
                "Only {} clock cycles, a frame needs {FRAME_CYCLES}",
                cycles.len()
            );
            return report(
                Vec::new(),
                TraceStatus::Insufficient(InsufficientReason::IncompleteCycles {
                    available: cycles.len(),
                }),
            );
        }

        let outcomes: Vec<_> = Anchor::from_reset(&signals.reset)
            .into_iter()
            .map(|anchor| self.aligner.align(&cycles, signals, anchor))
            .collect();

        let mut frames: Vec<FrameRecord> = Vec::new();
        for outcome in outcomes.iter() {
            let alignment = match outcome {
                AlignOutcome::Accepted(alignment) => *alignment,
                AlignOutcome::Rejected(rejection) => {
                    log::debug!("Anchor rejected: {rejection}");
                    continue;
                }
            };
            if frames
                .iter()
                .any(|frame| frame.alignment.start_index == alignment.start_index)
            {
                log::debug!(
                    "{}: frame at cycle {} already decoded",
                    alignment.anchor,
                    alignment.start_index
                );
                continue;
            }
            let Some(view) = FrameView::new(&cycles, signals, self.config.sample_epsilon, alignment.start_index)
            else {
                continue;
            };
            let record = self.record(&view, alignment);
            log::info!(
                "{}: frame at cycle {} (score {}) {}",
                alignment.anchor,
                alignment.start_index,
                alignment.score,
                record.frame.verdict
            );
            frames.push(record);
        }

        let status = if frames.is_empty() {
            TraceStatus::NoFrameFound
        } else {
            TraceStatus::Decoded(frames)
        };
        report(outcomes, status)
    }

    fn record(&self, view: &FrameView, alignment: Alignment) -> FrameRecord {
        let frame = self.fields.decode(view);
        log::debug!(
            "Direction {:?} from {:?}",
            frame.direction,
            frame.direction_source
        );
        let zones = Zone::layout(frame.direction)
            .into_iter()
            .map(|(zone, offsets)| ZoneSpan {
                zone,
                from: view.edge(offsets.start),
                to: view.edge(offsets.end),
            })
            .collect();
        let attribution = optional(&view.signals().target_enable)
            .is_none()
            .then(|| AttributedLanes::from_offsets(view, frame.direction, frame.ack.is_ok()));
        FrameRecord {
            alignment,
            start: view.edge(0),
            end: view.edge(FRAME_CYCLES),
            zones,
            frame,
            attribution,
        }
    }
}
