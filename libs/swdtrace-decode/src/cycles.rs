use swdtrace_common::{Cycle, CycleList, Level, Timeline};

/// Pairs every clean rising edge of `clock` with the falling edge that follows it.
///
/// Only `0 -> 1` style rises (anything but `1` going to `1`) open a cycle and only
/// `1 -> 0` closes one, so excursions through `X`/`Z` neither open nor close cycles.
/// A rise still open at the end of the trace is dropped.
pub fn build_cycles(clock: &Timeline) -> CycleList {
    let mut cycles = Vec::new();
    let mut last: Option<Level> = None;
    let mut pending_rise = None;
    for event in clock.events() {
        let Some(previous) = last else {
            last = Some(event.level);
            continue;
        };
        if event.level == previous {
            continue;
        }
        match (previous, event.level) {
            (_, Level::One) => pending_rise = Some(event.ts),
            (Level::One, Level::Zero) => {
                if let Some(rise) = pending_rise.take() {
                    cycles.push(Cycle {
                        rise,
                        fall: event.ts,
                    });
                }
            }
            _ => {}
        }
        last = Some(event.level);
    }
    if let Some(rise) = pending_rise {
        log::trace!("Dropping unterminated clock rise at {rise}");
    }
    CycleList::new(cycles)
}
