use std::fmt::Display;

use anyhow::{anyhow, Result};
use nom::{
    branch::alt,
    bytes::complete::tag_no_case,
    character::complete::{alpha1, alphanumeric0, char, hex_digit1, i64, space0},
    combinator::{all_consuming, map_res, opt, recognize, value},
    sequence::{pair, preceded, terminated, tuple},
    IResult,
};

use crate::{cache::DUMP_SENTINEL, pattern::MemAccess};

/// One request of a trace, optionally labelled with the data it touches.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceEntry {
    pub label: Option<String>,
    pub request: i64,
}

impl TraceEntry {
    pub fn new(request: i64) -> Self {
        Self {
            label: None,
            request,
        }
    }
    pub fn dump() -> Self {
        Self::new(DUMP_SENTINEL)
    }
    pub fn labelled(label: impl Into<String>, request: i64) -> Self {
        Self {
            label: Some(label.into()),
            request,
        }
    }
    pub fn is_dump(&self) -> bool {
        self.request == DUMP_SENTINEL
    }
}

impl From<MemAccess> for TraceEntry {
    fn from(a: MemAccess) -> Self {
        Self::labelled(a.matrix.label(), a.addr.inner() as i64)
    }
}

impl Display for TraceEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_dump() {
            return write!(f, "dump");
        }
        match &self.label {
            Some(label) => write!(f, "{label}: {}", self.request),
            None => write!(f, "{}", self.request),
        }
    }
}

fn label(input: &str) -> IResult<&str, &str> {
    terminated(
        recognize(pair(alpha1, alphanumeric0)),
        pair(space0, char(':')),
    )(input)
}

fn request(input: &str) -> IResult<&str, i64> {
    alt((
        value(DUMP_SENTINEL, tag_no_case("dump")),
        map_res(preceded(tag_no_case("0x"), hex_digit1), |h| {
            i64::from_str_radix(h, 16)
        }),
        i64,
    ))(input)
}

fn entry(input: &str) -> IResult<&str, TraceEntry> {
    let (input, (_, label, _, request, _)) =
        all_consuming(tuple((space0, opt(label), space0, request, space0)))(input)?;
    Ok((
        input,
        TraceEntry {
            label: label.map(str::to_owned),
            request,
        },
    ))
}

/// Parses a textual trace: one request per line, `#` starts a comment.
///
/// A request is a decimal or `0x` address, or `-1`/`dump` for a dump, and
/// may be prefixed with a label such as `A:`.
pub fn parse_trace(src: &str) -> Result<Vec<TraceEntry>> {
    let mut entries = Vec::new();
    for (n, line) in src.lines().enumerate() {
        let body = line.split('#').next().unwrap_or_default();
        if body.trim().is_empty() {
            continue;
        }
        let (_, e) = entry(body)
            .map_err(|e| anyhow!("failed to parse trace at line {}: `{line}` ({e})", n + 1))?;
        entries.push(e);
    }
    log::info!("finished parsing trace. # of entries: {}", entries.len());
    Ok(entries)
}

pub fn read_trace(mut file: impl std::io::Read) -> Result<Vec<TraceEntry>> {
    let mut buf = String::new();
    file.read_to_string(&mut buf)?;
    parse_trace(&buf)
}
