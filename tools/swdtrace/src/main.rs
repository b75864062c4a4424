use std::{io::Read, process::ExitCode};

use clap::Parser;
use cli::{Args, Format};
use report::{Outcome, XmlReport, XmlTrace};
use swdtrace_common::SignalRole;
use swdtrace_decode::{TraceDecoder, TraceSignals};
use swdtrace_from_vcd::Trace;

mod cli;
mod report;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = Args::parse();
    let inputs = std::mem::take(&mut args.input);
    let total = inputs.len();
    let mapping = args.role_mapping();
    let decoder = TraceDecoder::new(args.decode_config());
    log::debug!("{:?}", decoder.config());

    let mut xml = XmlReport::default();
    let mut failed = 0;
    for mut input in inputs {
        let name = input.path().to_string();
        let mut text = String::new();
        if let Err(err) = input.read_to_string(&mut text) {
            log::error!("{name}: {err}");
            failed += 1;
            continue;
        }
        let trace = match Trace::parse(&text) {
            Ok(trace) => trace,
            Err(err) => {
                log::error!("{name}: {err}");
                failed += 1;
                continue;
            }
        };

        let selection: Vec<(SignalRole, String)> = trace.select_roles(&mapping).into_iter().collect();
        for (role, signal) in selection.iter() {
            log::info!("{name}: {role} = {signal}");
        }
        let signals = selection
            .iter()
            .fold(TraceSignals::default(), |signals, (role, signal)| {
                match trace.signal(signal) {
                    Some(timeline) => signals.with(*role, timeline.clone()),
                    None => signals,
                }
            });

        let outcome = if args.raw_only {
            let (cycles, lanes) = decoder.lanes(&signals);
            Outcome::RawOnly {
                cycles: cycles.len(),
                lanes,
            }
        } else {
            Outcome::Decoded(decoder.decode(&signals))
        };

        match args.format {
            Format::Text => report::print_text(&name, trace.timescale(), &outcome, args.ts),
            Format::Xml => xml
                .trace
                .push(XmlTrace::new(name, trace.timescale(), &selection, &outcome)),
        }
    }

    if args.format == Format::Xml {
        match quick_xml::se::to_string(&xml) {
            Ok(document) => println!("{document}"),
            Err(err) => {
                log::error!("Cannot serialize report: {err}");
                return ExitCode::FAILURE;
            }
        }
    }

    // A single readable trace is enough for success
    if failed == total {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
