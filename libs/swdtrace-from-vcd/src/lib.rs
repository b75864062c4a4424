use std::collections::{BTreeMap, HashMap, HashSet};

use nom::{
    branch::alt,
    bytes::complete::take_till1,
    character::complete::{char, digit1, multispace0, one_of},
    combinator::{all_consuming, cut, map_opt, map_res, recognize, verify},
    multi::many0,
    sequence::{pair, preceded, terminated},
    IResult, Parser,
};
use nom_locate::LocatedSpan;
use swdtrace_common::{Event, Level, SignalRole, Time, Timeline};
use thiserror::Error;

type Span<'a> = LocatedSpan<&'a str>;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum VcdError {
    #[error("syntax error at line {line}, column {column} ({kind:?})")]
    Syntax {
        line: u32,
        column: usize,
        kind: nom::error::ErrorKind,
    },
    #[error("unexpected end of input")]
    Incomplete,
}

impl From<nom::Err<nom::error::Error<Span<'_>>>> for VcdError {
    fn from(err: nom::Err<nom::error::Error<Span<'_>>>) -> Self {
        match err {
            nom::Err::Incomplete(_) => VcdError::Incomplete,
            nom::Err::Error(err) | nom::Err::Failure(err) => VcdError::Syntax {
                line: err.input.location_line(),
                column: err.input.get_utf8_column(),
                kind: err.code,
            },
        }
    }
}

/// Every 1-bit signal of a dump, keyed by its dotted hierarchical name
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Trace {
    timescale: Option<String>,
    signals: BTreeMap<String, Timeline>,
}

impl Trace {
    pub fn parse(input: &str) -> Result<Self, VcdError> {
        let (_, items) = all_consuming(terminated(many0(item), multispace0))(Span::new(input))?;
        Ok(Self::build(items))
    }

    fn build(items: Vec<Item>) -> Self {
        let mut timescale = None;
        let mut scopes = Vec::new();
        let mut ids = BTreeMap::new();
        let mut changes: HashMap<&str, Vec<Event>> = HashMap::new();
        let mut undeclared = HashSet::new();
        let mut now: Time = 0;

        for item in items {
            match item {
                Item::Timescale(value) => timescale = Some(value),
                Item::Scope(name) => scopes.push(name),
                Item::Upscope => {
                    scopes.pop();
                }
                Item::Var {
                    id,
                    width,
                    reference,
                } => {
                    let name = scopes
                        .iter()
                        .copied()
                        .chain([reference.as_str()])
                        .collect::<Vec<_>>()
                        .join(".");
                    if width > 1 {
                        log::debug!("{name} is {width} bits wide, only single-bit values are kept");
                    }
                    changes.entry(id).or_default();
                    ids.insert(name, id);
                }
                Item::Time(ts) => now = ts,
                Item::Change { id, level } => match changes.get_mut(id) {
                    Some(events) => events.push(Event { ts: now, level }),
                    None => {
                        if undeclared.insert(id) {
                            log::warn!("Value change for undeclared identifier `{id}` at #{now}, skipping");
                        }
                    }
                },
                Item::Ignored => {}
            }
        }

        let signals = ids
            .into_iter()
            .map(|(name, id)| {
                let events = changes.get(id).cloned().unwrap_or_default();
                (name, Timeline::new(events))
            })
            .collect();
        Self { timescale, signals }
    }

    pub fn timescale(&self) -> Option<&str> {
        self.timescale.as_deref()
    }

    pub fn signal(&self, name: &str) -> Option<&Timeline> {
        self.signals.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.signals.keys().map(String::as_str)
    }

    /// Picks a signal name for every role that can be resolved.
    ///
    /// An explicit mapping wins when the named signal exists (the last entry for a
    /// role counts); otherwise the first name, in order, ending with the role's
    /// default suffix is taken.
    pub fn select_roles(&self, mapping: &[(SignalRole, String)]) -> BTreeMap<SignalRole, String> {
        SignalRole::ALL
            .into_iter()
            .filter_map(|role| {
                let mapped = mapping
                    .iter()
                    .rev()
                    .find(|(mapped, _)| *mapped == role)
                    .map(|(_, name)| name);
                if let Some(name) = mapped {
                    if self.signals.contains_key(name) {
                        return Some((role, name.clone()));
                    }
                    log::warn!("Signal `{name}` mapped to {role} is not in the trace");
                }
                let suffix = role.default_suffix();
                self.names()
                    .find(|name| name.ends_with(suffix) || *name == &suffix[1..])
                    .map(|name| (role, name.to_owned()))
            })
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Item<'a> {
    Timescale(String),
    Scope(&'a str),
    Upscope,
    Var {
        id: &'a str,
        width: u32,
        reference: String,
    },
    Time(Time),
    Change { id: &'a str, level: Level },
    Ignored,
}

fn is_space(c: char) -> bool {
    c.is_whitespace()
}

fn token(input: Span) -> IResult<Span, Span> {
    preceded(multispace0, take_till1(is_space))(input)
}

fn keyword<'a>(name: &'static str) -> impl FnMut(Span<'a>) -> IResult<Span<'a>, Span<'a>> {
    verify(token, move |token: &Span| {
        token.fragment().strip_prefix('$') == Some(name)
    })
}

/// Tokens up to the closing `$end`
fn body<'a>(input: Span<'a>) -> IResult<Span<'a>, Vec<&'a str>> {
    terminated(
        many0(verify(token, |token: &Span| *token.fragment() != "$end").map(|token: Span<'a>| *token.fragment())),
        keyword("end"),
    )(input)
}

fn var<'a>(tokens: Vec<&'a str>) -> Option<Item<'a>> {
    let [_kind, width, id, reference, range @ ..] = tokens.as_slice() else {
        return None;
    };
    Some(Item::Var {
        id: *id,
        width: width.parse().ok()?,
        reference: format!("{reference}{}", range.concat()),
    })
}

fn declaration<'a>(input: Span<'a>) -> IResult<Span<'a>, Item<'a>> {
    alt((
        preceded(keyword("timescale"), body).map(|tokens: Vec<&str>| Item::Timescale(tokens.concat())),
        preceded(keyword("scope"), cut(map_opt(body, |tokens: Vec<&'a str>| tokens.get(1).copied()))).map(Item::Scope),
        preceded(keyword("upscope"), body).map(|_| Item::Upscope),
        preceded(keyword("var"), cut(map_opt(body, var))),
        preceded(
            alt((
                keyword("enddefinitions"),
                keyword("date"),
                keyword("version"),
                keyword("comment"),
            )),
            body,
        )
        .map(|_| Item::Ignored),
    ))(input)
}

/// Bare keywords wrapping the value changes
fn marker<'a>(input: Span<'a>) -> IResult<Span<'a>, Item<'a>> {
    alt((
        keyword("dumpvars"),
        keyword("dumpon"),
        keyword("dumpoff"),
        keyword("dumpall"),
        keyword("end"),
    ))
    .map(|_| Item::Ignored)
    .parse(input)
}

/// Any other `$keyword ... $end` section
fn unknown_section<'a>(input: Span<'a>) -> IResult<Span<'a>, Item<'a>> {
    preceded(
        verify(token, |token: &Span| token.fragment().starts_with('$')),
        body,
    )
    .map(|_| Item::Ignored)
    .parse(input)
}

fn timestamp<'a>(input: Span<'a>) -> IResult<Span<'a>, Item<'a>> {
    map_res(
        preceded(pair(multispace0, char('#')), digit1),
        |digits: Span<'a>| digits.fragment().parse::<Time>(),
    )
    .map(Item::Time)
    .parse(input)
}

fn vector_change<'a>(input: Span<'a>) -> IResult<Span<'a>, Item<'a>> {
    pair(
        preceded(multispace0, recognize(pair(one_of("bB"), take_till1(is_space)))),
        token,
    )
    .map(|(value, id): (Span<'a>, Span<'a>)| Item::Change {
        id: *id.fragment(),
        level: Level::from_literal(value.fragment()),
    })
    .parse(input)
}

fn real_change<'a>(input: Span<'a>) -> IResult<Span<'a>, Item<'a>> {
    pair(
        preceded(multispace0, pair(one_of("rR"), take_till1(is_space))),
        token,
    )
    .map(|(_, id): (_, Span<'a>)| Item::Change {
        id: *id.fragment(),
        level: Level::X,
    })
    .parse(input)
}

fn scalar_change<'a>(input: Span<'a>) -> IResult<Span<'a>, Item<'a>> {
    preceded(multispace0, pair(one_of("01xXzZ"), take_till1(is_space)))
        .map(|(value, id): (char, Span<'a>)| Item::Change {
            id: *id.fragment(),
            level: Level::from_literal(&value.to_string()),
        })
        .parse(input)
}

fn item<'a>(input: Span<'a>) -> IResult<Span<'a>, Item<'a>> {
    alt((
        declaration,
        marker,
        unknown_section,
        timestamp,
        vector_change,
        real_change,
        scalar_change,
    ))(input)
}
