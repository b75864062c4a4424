use swdtrace_common::Time;

pub use crate::verdict::ParityConvention;

/// How the frame direction is chosen
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum DirectionMode {
    /// Direction signal if present, otherwise inferred from ACK and host activity
    #[default]
    Auto,
    Read,
    Write,
}

/// Tunables of the whole engine. Built once and handed to [`crate::TraceDecoder::new`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DecodeConfig {
    /// Added to every clock edge before sampling, keeps samples off the instant of change
    pub sample_epsilon: Time,
    /// Candidate start offsets tried after each reset
    pub max_shift: usize,
    /// Lowest alignment score accepted as a frame
    pub min_score: u32,
    pub direction: DirectionMode,
    /// Host-output transitions in the data window above which an unlabelled frame is a write
    pub write_activity_threshold: usize,
    pub parity: ParityConvention,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            sample_epsilon: 1,
            max_shift: 32,
            min_score: 8,
            direction: DirectionMode::Auto,
            write_activity_threshold: 2,
            parity: ParityConvention::Direct,
        }
    }
}
