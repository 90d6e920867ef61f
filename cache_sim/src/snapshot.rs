//! Read-only views of cache contents, produced by a dump request.

use std::fmt;

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct LineSnapshot {
    pub valid: bool,
    pub tag: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SetSnapshot {
    pub index: usize,
    pub lines: Vec<LineSnapshot>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CacheSnapshot {
    pub sets: Vec<SetSnapshot>,
}

impl CacheSnapshot {
    pub fn valid_lines(&self) -> usize {
        self.sets
            .iter()
            .flat_map(|s| &s.lines)
            .filter(|l| l.valid)
            .count()
    }
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for LineSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tag {
            Some(tag) if self.valid => write!(f, "[v {tag:>#10x}]"),
            _ => write!(f, "[- {:>10}]", "-"),
        }
    }
}

impl fmt::Display for SetSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "set {:>4}:", self.index)?;
        for l in &self.lines {
            write!(f, " {l}")?;
        }
        Ok(())
    }
}

impl fmt::Display for CacheSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:-^40}", " cache dump ")?;
        for s in &self.sets {
            writeln!(f, "{s}")?;
        }
        write!(f, "{:-<40}", "")
    }
}
