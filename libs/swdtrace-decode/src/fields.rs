use std::fmt::Display;

use swdtrace_common::{
    swd::{Ack, RequestHeader},
    Level,
};

use crate::{
    config::{DecodeConfig, DirectionMode, ParityConvention},
    frame::{layout, optional, Direction, FrameView},
    verdict::{ParityCheck, Verdict},
};

/// Composes up to 32 bits, first element is bit 0.
///
/// `None` if any bit is `X`/`Z`; undefined bits are never replaced by a default.
pub fn compose_lsb_first(bits: &[Level]) -> Option<u32> {
    if bits.len() > 32 {
        return None;
    }
    bits.iter()
        .enumerate()
        .try_fold(0u32, |value, (index, bit)| {
            bit.as_bit().map(|bit| value | (u32::from(bit) << index))
        })
}

/// Splits `value` into `width` bits, bit 0 first
pub fn decompose_lsb_first(value: u32, width: usize) -> Vec<Level> {
    (0..width.min(32))
        .map(|index| Level::from(value >> index & 1 == 1))
        .collect()
}

/// The three ACK bits in wire order (`bits[0]` is sampled first)
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AckBits(pub [Level; 3]);

impl AckBits {
    pub fn sample(view: &FrameView) -> Self {
        let mut bits = [Level::X; 3];
        for (bit, offset) in bits.iter_mut().zip(layout::ACK) {
            *bit = view.target_bit(offset);
        }
        Self(bits)
    }

    /// Recognized acknowledge, `None` for undefined bits or unassigned patterns
    pub fn ack(&self) -> Option<Ack> {
        compose_lsb_first(&self.0).and_then(|bits| Ack::from_bits(bits as u8))
    }

    pub fn is_ok(&self) -> bool {
        self.ack() == Some(Ack::Ok)
    }

    pub fn defined_count(&self) -> usize {
        self.0.iter().filter(|bit| bit.is_defined()).count()
    }
}

/// `b2 b1 b0`, undefined bits shown as `X`
impl Display for AckBits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for bit in self.0.iter().rev() {
            write!(f, "{}", bit.driven())?;
        }
        Ok(())
    }
}

/// Where the direction of a frame came from
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DirectionSource {
    Override,
    Signal,
    Heuristic,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedFrame {
    pub direction: Direction,
    pub direction_source: DirectionSource,
    /// Request byte, LSB first on the wire
    pub request: Option<u8>,
    pub ack: AckBits,
    /// Only present with an OK acknowledge and all 32 bits defined
    pub data: Option<u32>,
    /// `0`, `1` or `X`; `X` whenever the acknowledge was not OK
    pub parity_bit: Level,
    pub parity: ParityCheck,
    /// Trailing target-driven cycle of a read
    pub tail: Option<Level>,
    pub verdict: Verdict,
}

impl DecodedFrame {
    pub fn parity_ok(&self) -> bool {
        self.parity == ParityCheck::Ok
    }

    pub fn request_header(&self) -> Option<RequestHeader> {
        self.request.map(RequestHeader::from)
    }
}

/// Extracts REQUEST/ACK/DATA/PARITY from a frame window
#[derive(Copy, Clone, Debug)]
pub struct FieldDecoder {
    direction: DirectionMode,
    write_activity_threshold: usize,
    parity: ParityConvention,
}

impl FieldDecoder {
    pub fn new(config: &DecodeConfig) -> Self {
        Self {
            direction: config.direction,
            write_activity_threshold: config.write_activity_threshold,
            parity: config.parity,
        }
    }

    pub fn request(&self, view: &FrameView) -> Option<u8> {
        compose_lsb_first(&view.host_bits(layout::REQUEST)).map(|value| value as u8)
    }

    /// Caller override, then the direction signal at the first cycle, then ACK and host activity
    pub fn resolve_direction(&self, view: &FrameView, ack: &AckBits) -> (Direction, DirectionSource) {
        match self.direction {
            DirectionMode::Read => return (Direction::Read, DirectionSource::Override),
            DirectionMode::Write => return (Direction::Write, DirectionSource::Override),
            DirectionMode::Auto => {}
        }

        let signals = view.signals();
        if let Some(rnw) = optional(&signals.direction) {
            match rnw.value_at(view.host_sample_ts(0)) {
                Level::One => return (Direction::Read, DirectionSource::Signal),
                Level::Zero => return (Direction::Write, DirectionSource::Signal),
                level => log::debug!(
                    "Direction signal is {level} at cycle {}, falling back to heuristic",
                    view.start()
                ),
            }
        }

        if !ack.is_ok() {
            return (Direction::Read, DirectionSource::Heuristic);
        }
        let activity = signals.host_output.transitions_within(
            view.rise(layout::WRITE_TA2),
            view.fall(layout::WRITE_PARITY),
        );
        log::trace!("Host output activity in data window: {activity}");
        if activity > self.write_activity_threshold {
            (Direction::Write, DirectionSource::Heuristic)
        } else {
            (Direction::Read, DirectionSource::Heuristic)
        }
    }

    pub fn decode(&self, view: &FrameView) -> DecodedFrame {
        let request = self.request(view);
        let ack = AckBits::sample(view);
        let (direction, direction_source) = self.resolve_direction(view, &ack);

        let (data_bits, parity_bit, tail) = match direction {
            Direction::Read => (
                view.target_bits(layout::READ_DATA),
                view.target_bit(layout::READ_PARITY),
                Some(view.target_bit(layout::READ_TAIL)),
            ),
            Direction::Write => (
                view.host_bits(layout::WRITE_DATA),
                view.host_bit(layout::WRITE_PARITY),
                None,
            ),
        };

        let acknowledged = ack.ack();
        let ack_ok = acknowledged == Some(Ack::Ok);
        let data = compose_lsb_first(&data_bits).filter(|_| ack_ok);
        let parity_bit = if ack_ok { parity_bit.driven() } else { Level::X };
        let parity = ParityCheck::evaluate(self.parity, acknowledged, data, parity_bit);

        DecodedFrame {
            direction,
            direction_source,
            request,
            ack,
            data,
            parity_bit,
            parity,
            tail,
            verdict: Verdict::new(direction, acknowledged),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{cycles::build_cycles, test_support::*, TraceSignals};
    use swdtrace_common::SignalRole;

    #[test]
    fn lsb_first_round_trip() {
        for value in [0u32, 1, 0x8000_0000, 0xDEADBEEF, 0x5BA0_2477, u32::MAX] {
            let bits = decompose_lsb_first(value, 32);
            assert_eq!(bits[0], Level::from(value & 1 == 1));
            assert_eq!(compose_lsb_first(&bits), Some(value));
        }
    }

    #[test]
    fn undefined_bit_spoils_composition() {
        let mut bits = decompose_lsb_first(0xA5, 8);
        assert_eq!(compose_lsb_first(&bits), Some(0xA5));
        bits[3] = Level::Z;
        assert_eq!(compose_lsb_first(&bits), None);
        bits[3] = Level::X;
        assert_eq!(compose_lsb_first(&bits), None);
    }

    #[test]
    fn ack_code_is_printed_msb_first() {
        let ack = AckBits([Level::One, Level::Zero, Level::Zero]);
        assert_eq!(ack.to_string(), "001");
        assert_eq!(ack.ack(), Some(Ack::Ok));
        let ack = AckBits([Level::Zero, Level::Zero, Level::One]);
        assert_eq!(ack.to_string(), "100");
        assert_eq!(ack.ack(), Some(Ack::Fault));
        let ack = AckBits([Level::Zero, Level::Zero, Level::Z]);
        assert_eq!(ack.to_string(), "X00");
        assert_eq!(ack.ack(), None);
        assert_eq!(ack.defined_count(), 2);
    }

    fn decode(signals: &TraceSignals, config: DecodeConfig) -> DecodedFrame {
        let cycles = build_cycles(&signals.clock);
        let view = FrameView::new(&cycles, signals, config.sample_epsilon, 0).unwrap();
        FieldDecoder::new(&config).decode(&view)
    }

    #[test]
    fn clean_write() {
        let bench = Bench::new().write_frame(WRITE_DP_SELECT, OK, 0xDEADBEEF, None).idle(2);
        let frame = decode(&bench.signals(None), DecodeConfig::default());
        assert_eq!(frame.direction, Direction::Write);
        assert_eq!(frame.direction_source, DirectionSource::Heuristic);
        assert_eq!(frame.request, Some(WRITE_DP_SELECT));
        assert!(frame.request_header().unwrap().is_well_formed());
        assert_eq!(frame.ack.to_string(), "001");
        assert_eq!(frame.data, Some(0xDEADBEEF));
        assert_eq!(frame.parity_bit, Level::Zero);
        assert!(frame.parity_ok());
        assert_eq!(frame.tail, None);
        assert_eq!(frame.verdict, Verdict::WriteOk);
    }

    #[test]
    fn clean_read() {
        let bench = Bench::new().read_frame(READ_AP_DRW, OK, 0x5BA0_2477, None).idle(2);
        let frame = decode(&bench.signals(None), DecodeConfig::default());
        assert_eq!(frame.direction, Direction::Read);
        assert_eq!(frame.data, Some(0x5BA0_2477));
        assert!(frame.parity_ok());
        assert_eq!(frame.tail, Some(Level::Z));
        assert_eq!(frame.verdict, Verdict::ReadOk);
    }

    #[test]
    fn wrong_parity_is_a_mismatch() {
        let bench = Bench::new()
            .write_frame(WRITE_DP_SELECT, OK, 0xDEADBEEF, Some(Level::One))
            .idle(2);
        let frame = decode(&bench.signals(None), DecodeConfig::default());
        assert_eq!(frame.data, Some(0xDEADBEEF));
        assert_eq!(frame.parity, ParityCheck::Mismatch);
        assert!(!frame.parity_ok());
        assert_eq!(frame.verdict, Verdict::WriteOk);
    }

    #[test]
    fn inverted_parity_convention() {
        let bench = Bench::new()
            .write_frame(WRITE_DP_SELECT, OK, 0xDEADBEEF, Some(Level::One))
            .idle(2);
        let config = DecodeConfig {
            parity: ParityConvention::Inverted,
            ..Default::default()
        };
        assert!(decode(&bench.signals(None), config).parity_ok());
    }

    #[test]
    fn undefined_ack() {
        let bench = Bench::new()
            .write_frame(WRITE_DP_SELECT, [Level::Zero, Level::Zero, Level::X], 0xDEADBEEF, None)
            .idle(2);
        let frame = decode(&bench.signals(None), DecodeConfig::default());
        assert_eq!(frame.ack.to_string(), "X00");
        assert_eq!(frame.data, None);
        assert_eq!(frame.parity_bit, Level::X);
        assert_eq!(frame.parity, ParityCheck::Undefined);
        assert!(!frame.parity_ok());
        // No recognizable ACK means the heuristic assumes a read
        assert_eq!(frame.verdict, Verdict::ReadUnrecognized);
    }

    #[test]
    fn wait_reports_no_data() {
        let bench = Bench::new().read_frame(READ_AP_DRW, WAIT, 0x1234, None).idle(2);
        let frame = decode(&bench.signals(None), DecodeConfig::default());
        assert_eq!(frame.ack.to_string(), "010");
        assert_eq!(frame.data, None);
        assert_eq!(frame.verdict, Verdict::ReadWaitFault);
    }

    #[test]
    fn override_beats_direction_signal() {
        let bench = Bench::new().write_frame(WRITE_DP_SELECT, OK, 0xDEADBEEF, None).idle(2);
        let signals = bench.signals(None).with(SignalRole::Direction, constant(Level::One));
        let frame = decode(&signals, DecodeConfig::default());
        assert_eq!(frame.direction, Direction::Read);
        assert_eq!(frame.direction_source, DirectionSource::Signal);

        let config = DecodeConfig {
            direction: DirectionMode::Write,
            ..Default::default()
        };
        let frame = decode(&signals, config);
        assert_eq!(frame.direction, Direction::Write);
        assert_eq!(frame.direction_source, DirectionSource::Override);
        assert_eq!(frame.data, Some(0xDEADBEEF));
    }

    #[test]
    fn host_bits_follow_rising_edge_target_bits_follow_falling_edge() {
        let bench = Bench::new().write_frame(WRITE_DP_SELECT, OK, 0xDEADBEEF, None).idle(2);
        let frame = decode(&bench.signals_on_edges(), DecodeConfig::default());
        assert_eq!(frame.request, Some(WRITE_DP_SELECT));
        assert_eq!(frame.ack.to_string(), "001");
        assert_eq!(frame.data, Some(0xDEADBEEF));
        assert!(frame.parity_ok());

        // Host output toggles every half cycle, so only the override gives a read
        let bench = Bench::new().read_frame(READ_AP_DRW, OK, 0x5BA0_2477, None).idle(2);
        let config = DecodeConfig {
            direction: DirectionMode::Read,
            ..Default::default()
        };
        let frame = decode(&bench.signals_on_edges(), config);
        assert_eq!(frame.request, Some(READ_AP_DRW));
        assert_eq!(frame.ack.to_string(), "001");
        assert_eq!(frame.data, Some(0x5BA0_2477));
        assert!(frame.parity_ok());
    }

    #[test]
    fn sampling_on_the_edge_instant_sees_the_transition() {
        let bench = Bench::new().write_frame(WRITE_DP_SELECT, OK, 0xDEADBEEF, None).idle(2);
        let config = DecodeConfig {
            sample_epsilon: 0,
            ..Default::default()
        };
        let frame = decode(&bench.signals_on_edges(), config);
        assert_eq!(frame.request, None);
        assert_eq!(frame.ack.to_string(), "XXX");
        assert_eq!(frame.data, None);
        assert_eq!(frame.verdict, Verdict::ReadUnrecognized);
    }

    /// OK read whose host output pulses high during the data phase
    fn read_with_host_activity(high: &[std::ops::Range<usize>]) -> TraceSignals {
        let mut bench = Bench::new().read_frame(READ_AP_DRW, OK, 0x5BA0_2477, None).idle(2);
        for range in high {
            bench.host[range.clone()].fill(Level::One);
        }
        bench.signals(None)
    }

    #[test]
    fn activity_at_threshold_is_a_read() {
        let config = DecodeConfig {
            write_activity_threshold: 2,
            ..Default::default()
        };
        let signals = read_with_host_activity(&[20..21]);
        assert_eq!(
            signals
                .host_output
                .transitions_within(rise(layout::WRITE_TA2), rise(layout::WRITE_PARITY) + HALF_PERIOD),
            2
        );
        let frame = decode(&signals, config);
        assert_eq!(frame.direction, Direction::Read);
        assert_eq!(frame.direction_source, DirectionSource::Heuristic);
        assert_eq!(frame.data, Some(0x5BA0_2477));
    }

    #[test]
    fn activity_above_threshold_is_a_write() {
        let config = DecodeConfig {
            write_activity_threshold: 2,
            ..Default::default()
        };
        // High from cycle 40 on, straight into the idle tail
        let signals = read_with_host_activity(&[20..21, 40..48]);
        assert_eq!(
            signals
                .host_output
                .transitions_within(rise(layout::WRITE_TA2), rise(layout::WRITE_PARITY) + HALF_PERIOD),
            3
        );
        let frame = decode(&signals, config);
        assert_eq!(frame.direction, Direction::Write);
        assert_eq!(frame.direction_source, DirectionSource::Heuristic);
    }

    #[test]
    fn undefined_direction_signal_falls_back_to_heuristic() {
        let bench = Bench::new().write_frame(WRITE_DP_SELECT, OK, 0xDEADBEEF, None).idle(2);
        let signals = bench.signals(None).with(SignalRole::Direction, constant(Level::X));
        let frame = decode(&signals, DecodeConfig::default());
        assert_eq!(frame.direction, Direction::Write);
        assert_eq!(frame.direction_source, DirectionSource::Heuristic);
    }
}
