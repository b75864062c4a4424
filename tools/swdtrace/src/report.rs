use serde::Serialize;
use swdtrace_common::{Level, SignalRole};
use swdtrace_decode::{
    Anchor, FrameRecord, InsufficientReason, Lane, TraceReport, TraceStatus,
};

/// What happened to one input trace
pub enum Outcome {
    /// Frames were not searched for
    RawOnly { cycles: usize, lanes: Vec<Lane> },
    Decoded(TraceReport),
}

impl Outcome {
    pub fn lanes(&self) -> &[Lane] {
        match self {
            Outcome::RawOnly { lanes, .. } => lanes,
            Outcome::Decoded(report) => &report.lanes,
        }
    }

    pub fn cycles(&self) -> usize {
        match self {
            Outcome::RawOnly { cycles, .. } => *cycles,
            Outcome::Decoded(report) => report.cycles.len(),
        }
    }

    pub fn frames(&self) -> &[FrameRecord] {
        match self {
            Outcome::RawOnly { .. } => &[],
            Outcome::Decoded(report) => report.frames(),
        }
    }

    pub fn status(&self) -> String {
        match self {
            Outcome::RawOnly { .. } => "raw only".to_owned(),
            Outcome::Decoded(report) => match &report.status {
                TraceStatus::Insufficient(InsufficientReason::MissingSignal(role)) => {
                    format!("insufficient: no {role} signal")
                }
                TraceStatus::Insufficient(InsufficientReason::IncompleteCycles { available }) => {
                    format!("insufficient: {available} cycles")
                }
                TraceStatus::NoFrameFound => "no frame found".to_owned(),
                TraceStatus::Decoded(frames) => format!("{} frame(s)", frames.len()),
            },
        }
    }
}

/// `RNW=0 REQ=0xb1 ACK=001 WRITE_OK DATA=0xdeadbeef PAR=0/OK`
pub fn summary_line(record: &FrameRecord, ts: bool) -> String {
    let frame = &record.frame;
    let mut line = String::new();
    if ts {
        line.push_str(&format!("{}-{}:", record.start, record.end));
    }
    let request = frame
        .request
        .map(|request| format!("{request:#04x}"))
        .unwrap_or_else(|| "0x??".to_owned());
    let data = frame
        .data
        .map(|data| format!("{data:#010x}"))
        .unwrap_or_else(|| "0x????????".to_owned());
    line.push_str(&format!(
        "RNW={} REQ={request} ACK={} {} DATA={data} PAR={}/{}",
        frame.direction.rnw(),
        frame.ack,
        frame.verdict,
        frame.parity_bit,
        frame.parity.label(),
    ));
    if let Some(tail) = frame.tail {
        line.push_str(&format!(" TAIL={}", tail.driven()));
    }
    line
}

pub fn print_text(name: &str, timescale: Option<&str>, outcome: &Outcome, ts: bool) {
    let timescale = timescale
        .map(|timescale| format!(" (timescale {timescale})"))
        .unwrap_or_default();
    println!(
        "== {name}{timescale}: {} cycles, {}",
        outcome.cycles(),
        outcome.status()
    );
    for record in outcome.frames() {
        println!("{}", summary_line(record, ts));
    }
}

#[derive(Clone, Serialize, Debug, Default)]
#[serde(rename = "swdtrace")]
pub struct XmlReport {
    pub trace: Vec<XmlTrace>,
}

#[derive(Clone, Serialize, Debug)]
pub struct XmlTrace {
    #[serde(rename = "@file")]
    pub file: String,
    #[serde(rename = "@timescale", skip_serializing_if = "Option::is_none")]
    pub timescale: Option<String>,
    #[serde(rename = "@cycles")]
    pub cycles: usize,
    #[serde(rename = "@status")]
    pub status: String,
    pub signal: Vec<XmlSignal>,
    pub lane: Vec<XmlLane>,
    pub frame: Vec<XmlFrame>,
}

#[derive(Clone, Serialize, Debug)]
pub struct XmlSignal {
    #[serde(rename = "@role")]
    pub role: String,
    #[serde(rename = "@name")]
    pub name: String,
}

#[derive(Clone, Serialize, Debug)]
pub struct XmlLane {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "@changes")]
    pub changes: usize,
}

#[derive(Clone, Serialize, Debug)]
pub struct XmlFrame {
    #[serde(rename = "@start")]
    pub start: u64,
    #[serde(rename = "@end")]
    pub end: u64,
    #[serde(rename = "@cycle")]
    pub cycle: usize,
    #[serde(rename = "@anchor")]
    pub anchor: String,
    #[serde(rename = "@score")]
    pub score: u32,
    #[serde(rename = "@direction")]
    pub direction: String,
    #[serde(rename = "@direction-source")]
    pub direction_source: String,
    #[serde(rename = "@request", skip_serializing_if = "Option::is_none")]
    pub request: Option<String>,
    #[serde(rename = "@header", skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
    #[serde(rename = "@header-ok", skip_serializing_if = "Option::is_none")]
    pub header_ok: Option<bool>,
    #[serde(rename = "@ack")]
    pub ack: String,
    #[serde(rename = "@verdict")]
    pub verdict: String,
    #[serde(rename = "@data", skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(rename = "@parity-bit")]
    pub parity_bit: String,
    #[serde(rename = "@parity")]
    pub parity: String,
    #[serde(rename = "@tail", skip_serializing_if = "Option::is_none")]
    pub tail: Option<String>,
    pub zone: Vec<XmlZone>,
}

#[derive(Clone, Serialize, Debug)]
pub struct XmlZone {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "@from")]
    pub from: u64,
    #[serde(rename = "@to")]
    pub to: u64,
}

impl From<&FrameRecord> for XmlFrame {
    fn from(record: &FrameRecord) -> Self {
        let frame = &record.frame;
        let header = frame.request_header();
        Self {
            start: record.start,
            end: record.end,
            cycle: record.alignment.start_index,
            anchor: match record.alignment.anchor {
                Anchor::TraceStart => "start".to_owned(),
                Anchor::Reset(ts) => ts.to_string(),
            },
            score: record.alignment.score,
            direction: format!("{:?}", frame.direction).to_lowercase(),
            direction_source: format!("{:?}", frame.direction_source).to_lowercase(),
            request: frame.request.map(|request| format!("{request:#04x}")),
            header: header.map(|header| header.to_string()),
            header_ok: header.map(|header| header.is_well_formed()),
            ack: frame.ack.to_string(),
            verdict: frame.verdict.to_string(),
            data: frame.data.map(|data| format!("{data:#010x}")),
            parity_bit: frame.parity_bit.to_string(),
            parity: frame.parity.label().to_owned(),
            tail: frame.tail.map(|tail: Level| tail.driven().to_string()),
            zone: record
                .zones
                .iter()
                .map(|span| XmlZone {
                    name: span.zone.label().to_owned(),
                    from: span.from,
                    to: span.to,
                })
                .collect(),
        }
    }
}

impl XmlTrace {
    pub fn new(
        file: String,
        timescale: Option<&str>,
        selection: &[(SignalRole, String)],
        outcome: &Outcome,
    ) -> Self {
        Self {
            file,
            timescale: timescale.map(str::to_owned),
            cycles: outcome.cycles(),
            status: outcome.status(),
            signal: selection
                .iter()
                .map(|(role, name)| XmlSignal {
                    role: role.to_string(),
                    name: name.clone(),
                })
                .collect(),
            lane: outcome
                .lanes()
                .iter()
                .map(|lane| XmlLane {
                    name: lane.kind.label().to_owned(),
                    changes: lane.timeline.len(),
                })
                .collect(),
            frame: outcome.frames().iter().map(XmlFrame::from).collect(),
        }
    }
}
