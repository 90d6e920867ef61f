use std::{
    collections::VecDeque,
    io::{stdin, stdout, Write},
};

use anyhow::Result;
use cache_sim::{
    decode::Addr, sim::Simulator, trace::TraceEntry, RequestError, Response, DUMP_SENTINEL,
};

#[cfg(feature = "stat")]
use cache_sim::stat::AddStats;

use terminal_size::terminal_size;

use crate::DumpFormat;

peg::parser!(grammar command() for str {
    rule count() -> usize
        = n:$(quiet!{['0'..='9']+}) {? n.parse().map_err(|_| "count") }
        / expected!("count")
    rule radix() -> u64
        = quiet!{"0" ['x' | 'X']} n:$(quiet!{['0'..='9'|'a'..='f'|'A'..='F']+})
        {? u64::from_str_radix(n, 16).map_err(|_| "64-bit address") }
        / n:$(quiet!{['0'..='9']+}) {? n.parse().map_err(|_| "64-bit address") }
        / expected!("address")
    rule request() -> i64
        = "-" n:$(quiet!{['0'..='9']+}) {? n.parse::<i64>().map(|v| -v).map_err(|_| "address") }
        / "dump" { DUMP_SENTINEL }
        / a:radix() {? i64::try_from(a).map_err(|_| "address below 2^63") }
    rule show_kind() -> ShowKind
        = ("statistics" / "stat") { ShowKind::Stat }
        / "report" { ShowKind::Report }
        / ("config" / "geometry") { ShowKind::Config }
        / "set" __ index:count() { ShowKind::Set(index) }
        / "queue" { ShowKind::Queue }
    rule command() -> Command
        = ("exit" / "quit") { Command::Exit }
        / "help" { Command::Help }
        / "reset" { Command::Reset }
        / "run" { Command::Run }
        / "step" step:(__ n:count() { n })? { Command::Step(step.unwrap_or(1)) }
        / "decode" __ a:radix() { Command::Decode(Addr::new(a)) }
        / "show" __ s:show_kind() { Command::Show(s) }
        / s:show_kind() { Command::Show(s) }
        / r:request() { Command::Request(r) }
        / { Command::Step(1) }
    pub(crate) rule parse_command() -> Command
        = _ c:command() _ { c }
        / expected!("command")

    rule ws() = quiet!{[' ' | '\t' | '\r' | '\n']}
        / expected!("whitespace")
    rule _() = ws()*
    rule __() = ws()+
});

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Command {
    /// feed one raw request, bypassing the queue
    Request(i64),
    /// feed the next `n` queued entries
    Step(usize),
    Run,
    Decode(Addr),
    Show(ShowKind),
    Reset,
    Help,
    Exit,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ShowKind {
    Stat,
    Report,
    Config,
    Set(usize),
    Queue,
}

const HELP: &str = "\
commands:
  <address> | -1 | dump   send one request (decimal or 0x hex)
  step [n]                send the next n queued requests (empty line: 1)
  run                     send every queued request
  decode <address>        show tag, set and offset of an address
  show stat|report|config|set <i>|queue
  reset                   invalidate the cache, clear counters, requeue the trace
  exit";

fn get_terminal_width() -> Option<u16> {
    terminal_size().map(|(w, _)| w.0.saturating_sub(20))
}

fn show_response(r: Result<Response, RequestError>, format: DumpFormat) -> Result<()> {
    match r {
        Ok(Response::Hit) => println!("hit"),
        Ok(Response::Miss) => println!("miss"),
        Ok(Response::Dump(snapshot)) => match format {
            DumpFormat::Text => println!("{snapshot}"),
            DumpFormat::Json => println!("{}", snapshot.to_json()?),
        },
        Err(e) => println!("{e}"),
    }
    Ok(())
}

/// Drains `pending` into `sim`, printing dumps and rejections as they
/// happen. Returns how many entries were sent and how many were rejected.
fn run_queue(
    sim: &mut Simulator,
    pending: &mut VecDeque<TraceEntry>,
    format: DumpFormat,
) -> Result<(usize, usize)> {
    let (mut fed, mut rejected) = (0, 0);
    while let Some(entry) = pending.pop_front() {
        fed += 1;
        match sim.step(&entry) {
            Ok(Response::Hit | Response::Miss) => {}
            r @ Ok(Response::Dump(_)) => show_response(r, format)?,
            Err(e) => {
                rejected += 1;
                println!("{entry} => {e}");
            }
        }
    }
    Ok((fed, rejected))
}

pub fn execute_interactive(
    sim: &mut Simulator,
    entries: Vec<TraceEntry>,
    format: DumpFormat,
) -> Result<()> {
    let trace: VecDeque<_> = entries.into();
    let mut pending = trace.clone();
    #[cfg(feature = "stat")]
    let width = get_terminal_width();
    println!("entering interactive. {} requests queued.", pending.len());
    loop {
        print!("[{} queued] > ", pending.len());
        stdout().flush()?;
        let mut str = String::new();
        if stdin().read_line(&mut str)? == 0 {
            break;
        }
        let parsed = match command::parse_command(&str) {
            Ok(p) => p,
            Err(e) => {
                println!("parse error: expected {}", e.expected);
                continue;
            }
        };
        match parsed {
            Command::Request(r) => show_response(sim.step(&TraceEntry::new(r)), format)?,
            Command::Step(n) => {
                for _ in 0..n {
                    let Some(entry) = pending.pop_front() else {
                        println!("trace exhausted.");
                        break;
                    };
                    print!("{entry} => ");
                    show_response(sim.step(&entry), format)?;
                }
            }
            Command::Run => {
                let (fed, rejected) = run_queue(sim, &mut pending, format)?;
                println!("sent {fed} requests, {rejected} rejected.");
                println!("{}", sim.report());
            }
            Command::Decode(addr) => println!("{addr} => {}", sim.cache().decode(addr)),
            Command::Show(ShowKind::Report) => println!("{}", sim.report()),
            Command::Show(ShowKind::Config) => println!("{}", sim.cache().geometry()),
            Command::Show(ShowKind::Set(index)) => match sim.cache().sets().get(index) {
                Some(set) => println!("{}", set.snapshot(index)),
                None => println!(
                    "set index {index} out of range (cache has {} sets)",
                    sim.cache().sets().len()
                ),
            },
            Command::Show(ShowKind::Queue) => {
                let next: Vec<_> = pending.iter().take(8).map(|e| e.to_string()).collect();
                println!("next: [{}]", next.join(", "));
            }
            #[cfg(feature = "stat")]
            Command::Show(ShowKind::Stat) => {
                let mut stats = Default::default();
                sim.add_stats(&mut stats);
                println!("{}", stats.view(width.unwrap_or(60) as usize));
            }
            #[cfg(not(feature = "stat"))]
            Command::Show(ShowKind::Stat) => {
                println!("try compile with `--features stat`");
            }
            Command::Reset => {
                sim.reset();
                pending = trace.clone();
                println!("cache reset. {} requests queued.", pending.len());
            }
            Command::Help => println!("{HELP}"),
            Command::Exit => break,
        }
    }
    sim.finish();
    println!("exiting interactive.");
    Ok(())
}
