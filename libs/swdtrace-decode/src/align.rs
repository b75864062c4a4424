use std::fmt::Display;

use swdtrace_common::{swd::FRAME_CYCLES, CycleList, Level, Time, Timeline};

use crate::{
    config::DecodeConfig,
    fields::AckBits,
    frame::{layout, FrameView},
    TraceSignals,
};

/// Point after which a frame is searched for
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Anchor {
    /// No usable reset, search from the first cycle
    TraceStart,
    /// Rising edge of the reset signal
    Reset(Time),
}

impl Anchor {
    /// One anchor per reset rising edge, or a single [`Anchor::TraceStart`] without any
    pub fn from_reset(reset: &Timeline) -> Vec<Self> {
        let edges = reset.rising_edges();
        if edges.is_empty() {
            vec![Anchor::TraceStart]
        } else {
            edges.into_iter().map(Anchor::Reset).collect()
        }
    }
}

impl Display for Anchor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Anchor::TraceStart => f.write_str("trace start"),
            Anchor::Reset(ts) => write!(f, "reset@{ts}"),
        }
    }
}

/// Best-scoring frame start found after an anchor
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Alignment {
    pub anchor: Anchor,
    pub start_index: usize,
    pub score: u32,
    pub ack: AckBits,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Rejection {
    /// No cycle rises after the anchor
    NoCycleAfterReset,
    /// Fewer than 48 cycles follow the anchor
    IncompleteCycles { available: usize },
    /// A full frame fits but the shift limit allows no candidate
    NoCandidate,
    /// The best candidate stayed under the minimum score
    BelowThreshold { best: Alignment },
}

impl Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::NoCycleAfterReset => f.write_str("no clock cycle after anchor"),
            Rejection::IncompleteCycles { available } => {
                write!(f, "only {available} cycles after anchor, {FRAME_CYCLES} needed")
            }
            Rejection::NoCandidate => f.write_str("no candidate start within shift limit"),
            Rejection::BelowThreshold { best } => write!(
                f,
                "best score {} at cycle {} (ack={}) below threshold",
                best.score, best.start_index, best.ack
            ),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AlignOutcome {
    Accepted(Alignment),
    Rejected(Rejection),
}

/// Scores candidate frame starts after each anchor and keeps the best one
#[derive(Copy, Clone, Debug)]
pub struct FrameAligner {
    max_shift: usize,
    min_score: u32,
    epsilon: Time,
}

impl FrameAligner {
    pub const START_BIT_SCORE: u32 = 1;
    pub const TURNAROUND_SCORE: u32 = 2;
    pub const TURNAROUND_ENABLE_SCORE: u32 = 1;
    pub const ACK_SCORE: u32 = 8;
    pub const ACK_BIT_SCORE: u32 = 1;

    pub fn new(config: &DecodeConfig) -> Self {
        Self {
            max_shift: config.max_shift,
            min_score: config.min_score,
            epsilon: config.sample_epsilon,
        }
    }

    /// How much a window looks like the start of a real frame
    pub fn score(&self, view: &FrameView) -> (u32, AckBits) {
        let mut score = 0;
        for offset in layout::PAD {
            if view.host_bit(offset) == Level::Zero {
                score += Self::START_BIT_SCORE;
            }
        }
        if view.bus_at_fall(layout::TA1) == Level::Z {
            score += Self::TURNAROUND_SCORE;
        } else if view.target_enable_at_fall(layout::TA1) == Some(Level::Zero) {
            score += Self::TURNAROUND_ENABLE_SCORE;
        }
        let ack = AckBits::sample(view);
        if ack.ack().is_some() {
            score += Self::ACK_SCORE;
        }
        score += Self::ACK_BIT_SCORE * ack.defined_count() as u32;
        (score, ack)
    }

    pub fn align(&self, cycles: &CycleList, signals: &TraceSignals, anchor: Anchor) -> AlignOutcome {
        let base = match anchor {
            Anchor::TraceStart => (!cycles.is_empty()).then_some(0),
            Anchor::Reset(ts) => cycles.first_rising_after(ts),
        };
        let Some(base) = base else {
            return AlignOutcome::Rejected(Rejection::NoCycleAfterReset);
        };
        log::debug!("{anchor}: first cycle {base}");

        // Earliest candidate wins ties
        let best = (0..self.max_shift)
            .map_while(|shift| FrameView::new(cycles, signals, self.epsilon, base + shift))
            .map(|view| {
                let (score, ack) = self.score(&view);
                log::trace!("{anchor}: cycle {} scores {score} (ack={ack})", view.start());
                Alignment {
                    anchor,
                    start_index: view.start(),
                    score,
                    ack,
                }
            })
            .fold(None, |best: Option<Alignment>, candidate| match best {
                Some(best) if best.score >= candidate.score => Some(best),
                _ => Some(candidate),
            });

        match best {
            None if base + FRAME_CYCLES <= cycles.len() => {
                AlignOutcome::Rejected(Rejection::NoCandidate)
            }
            None => AlignOutcome::Rejected(Rejection::IncompleteCycles {
                available: cycles.len() - base,
            }),
            Some(best) if best.score >= self.min_score => AlignOutcome::Accepted(best),
            Some(best) => AlignOutcome::Rejected(Rejection::BelowThreshold { best }),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{cycles::build_cycles, test_support::*};

    fn aligner(config: DecodeConfig) -> FrameAligner {
        FrameAligner::new(&config)
    }

    #[test]
    fn anchors_from_reset() {
        let reset: Timeline = [(0, Level::Zero), (15, Level::One), (100, Level::Zero), (200, Level::One)]
            .into_iter()
            .collect();
        assert_eq!(
            Anchor::from_reset(&reset),
            vec![Anchor::Reset(15), Anchor::Reset(200)]
        );
        assert_eq!(Anchor::from_reset(&Timeline::default()), vec![Anchor::TraceStart]);
    }

    #[test]
    fn clean_frame_scores_maximum() {
        let signals = Bench::new()
            .write_frame(WRITE_DP_SELECT, OK, 0xDEADBEEF, None)
            .idle(2)
            .signals(None);
        let cycles = build_cycles(&signals.clock);
        let view = FrameView::new(&cycles, &signals, 1, 0).unwrap();
        let (score, ack) = aligner(DecodeConfig::default()).score(&view);
        assert_eq!(score, 15);
        assert_eq!(ack.to_string(), "001");
    }

    #[test]
    fn finds_frame_after_idle_cycles() {
        let signals = Bench::new()
            .idle(3)
            .write_frame(WRITE_DP_SELECT, OK, 0xDEADBEEF, None)
            .idle(4)
            .signals(Some(RESET_AT));
        let cycles = build_cycles(&signals.clock);
        let outcome = aligner(DecodeConfig::default()).align(&cycles, &signals, Anchor::Reset(RESET_AT));
        let AlignOutcome::Accepted(alignment) = outcome else {
            panic!("{outcome:?}");
        };
        assert_eq!(alignment.start_index, 3);
        assert_eq!(alignment.score, 15);
        assert_eq!(alignment.ack.to_string(), "001");
    }

    #[test]
    fn alignment_is_deterministic() {
        let signals = Bench::new()
            .idle(5)
            .read_frame(READ_AP_DRW, FAULT, 0, None)
            .idle(5)
            .signals(Some(RESET_AT));
        let cycles = build_cycles(&signals.clock);
        let aligner = aligner(DecodeConfig::default());
        let first = aligner.align(&cycles, &signals, Anchor::Reset(RESET_AT));
        for _ in 0..3 {
            assert_eq!(aligner.align(&cycles, &signals, Anchor::Reset(RESET_AT)), first);
        }
        let AlignOutcome::Accepted(alignment) = first else {
            panic!("{first:?}");
        };
        assert_eq!(alignment.start_index, 5);
        assert_eq!(alignment.ack.to_string(), "100");
    }

    #[test]
    fn shift_limit_bounds_search() {
        let signals = Bench::new()
            .idle(3)
            .write_frame(WRITE_DP_SELECT, OK, 0xDEADBEEF, None)
            .idle(4)
            .signals(Some(RESET_AT));
        let cycles = build_cycles(&signals.clock);
        let config = DecodeConfig {
            max_shift: 3,
            ..Default::default()
        };
        let outcome = aligner(config).align(&cycles, &signals, Anchor::Reset(RESET_AT));
        assert!(matches!(
            outcome,
            AlignOutcome::Rejected(Rejection::BelowThreshold { best }) if best.start_index < 3
        ));
    }

    #[test]
    fn too_few_cycles_after_reset() {
        let bench = Bench::new().idle(40).idle(30);
        let signals = bench.signals(Some(rise(40) - 2));
        let cycles = build_cycles(&signals.clock);
        assert_eq!(cycles.len(), 70);
        let outcome = aligner(DecodeConfig::default()).align(&cycles, &signals, Anchor::Reset(rise(40) - 2));
        assert_eq!(
            outcome,
            AlignOutcome::Rejected(Rejection::IncompleteCycles { available: 30 })
        );
    }

    #[test]
    fn zero_shift_has_no_candidate() {
        let signals = Bench::new().idle(100).signals(None);
        let cycles = build_cycles(&signals.clock);
        let config = DecodeConfig {
            max_shift: 0,
            ..Default::default()
        };
        let outcome = aligner(config).align(&cycles, &signals, Anchor::TraceStart);
        assert_eq!(outcome, AlignOutcome::Rejected(Rejection::NoCandidate));
    }

    #[test]
    fn reset_after_last_cycle() {
        let signals = Bench::new().idle(50).signals(None);
        let cycles = build_cycles(&signals.clock);
        let outcome = aligner(DecodeConfig::default()).align(&cycles, &signals, Anchor::Reset(rise(60)));
        assert_eq!(outcome, AlignOutcome::Rejected(Rejection::NoCycleAfterReset));
    }

    #[test]
    fn idle_bus_from_trace_start_is_rejected() {
        let signals = Bench::new().idle(60).signals(None);
        let cycles = build_cycles(&signals.clock);
        let outcome = aligner(DecodeConfig::default()).align(&cycles, &signals, Anchor::TraceStart);
        let AlignOutcome::Rejected(Rejection::BelowThreshold { best }) = outcome else {
            panic!("{outcome:?}");
        };
        assert_eq!(best.start_index, 0);
        assert_eq!(best.score, 3);
    }

    #[test]
    fn target_enable_confirms_turnaround() {
        // Bus never floats, but the testbench is not driving during TA1
        let bench = Bench::new()
            .write_frame(WRITE_DP_SELECT, OK, 0xDEADBEEF, None)
            .idle(2);
        let mut bus = bench.bus.clone();
        bus[layout::TA1] = Level::One;
        let mut enable = vec![Level::Zero; bus.len()];
        enable[layout::ACK].fill(Level::One);
        let signals = TraceSignals {
            bus: per_cycle(&bus),
            target_enable: per_cycle(&enable),
            ..bench.signals(None)
        };
        let cycles = build_cycles(&signals.clock);
        let view = FrameView::new(&cycles, &signals, 1, 0).unwrap();
        let (score, _) = aligner(DecodeConfig::default()).score(&view);
        assert_eq!(score, 14);
    }
}
