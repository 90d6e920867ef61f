use crate::{
    line::CacheLine,
    snapshot::{LineSnapshot, SetSnapshot},
};

pub struct CacheSet {
    lines: Vec<CacheLine>,
    /// advanced once per lookup; stamps `CacheLine::last_used`
    clock: u64,
    #[cfg(feature = "stat")]
    stat: stat::SetStat,
}

impl CacheSet {
    pub fn new(associativity: usize) -> Self {
        Self {
            lines: vec![CacheLine::default(); associativity],
            clock: 0,
            #[cfg(feature = "stat")]
            stat: Default::default(),
        }
    }
    pub fn lines(&self) -> &[CacheLine] {
        &self.lines
    }
    pub fn associativity(&self) -> usize {
        self.lines.len()
    }
    pub fn occupancy(&self) -> usize {
        self.lines.iter().filter(|l| l.is_valid()).count()
    }
    /// Looks `tag` up, filling or evicting on a miss. Returns whether it hit.
    pub fn lookup(&mut self, tag: u64) -> bool {
        self.clock += 1;
        let now = self.clock;
        if let Some(line) = self.lines.iter_mut().find(|l| l.matches(tag)) {
            line.touch(now);
            #[cfg(feature = "stat")]
            self.stat.on_hit();
            return true;
        }
        let way = self.victim();
        #[cfg(feature = "stat")]
        {
            if self.lines[way].is_valid() {
                self.stat.on_eviction();
            } else {
                self.stat.on_fill();
            }
        }
        self.lines[way].fill(tag, now);
        false
    }
    /// First invalid way, otherwise the least recently used one.
    /// `min_by_key` keeps the first minimum, so ties go to the lowest way.
    fn victim(&self) -> usize {
        if let Some(way) = self.lines.iter().position(|l| !l.is_valid()) {
            return way;
        }
        self.lines
            .iter()
            .enumerate()
            .min_by_key(|(_, l)| l.last_used())
            .map(|(way, _)| way)
            .unwrap_or(0)
    }
    pub fn invalidate(&mut self) {
        self.lines.iter_mut().for_each(CacheLine::invalidate);
        self.clock = 0;
        #[cfg(feature = "stat")]
        {
            self.stat = Default::default();
        }
    }
    pub fn snapshot(&self, index: usize) -> SetSnapshot {
        SetSnapshot {
            index,
            lines: self
                .lines
                .iter()
                .map(|l| LineSnapshot {
                    valid: l.is_valid(),
                    tag: l.tag(),
                })
                .collect(),
        }
    }
    #[cfg(feature = "stat")]
    pub(crate) fn stat(&self) -> &stat::SetStat {
        &self.stat
    }
}

#[cfg(feature = "stat")]
pub(crate) mod stat {
    #[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
    pub struct SetStat {
        pub hits: usize,
        pub fills: usize,
        pub evictions: usize,
    }

    impl SetStat {
        pub fn on_hit(&mut self) {
            self.hits += 1;
        }
        pub fn on_fill(&mut self) {
            self.fills += 1;
        }
        pub fn on_eviction(&mut self) {
            self.evictions += 1;
        }
        pub fn misses(&self) -> usize {
            self.fills + self.evictions
        }
    }
}
