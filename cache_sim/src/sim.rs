use std::{collections::BTreeMap, fmt, time};

use crate::{
    cache::{Cache, RequestError, Response},
    config::{CacheConfig, ConfigError},
    snapshot::CacheSnapshot,
    stat::Ratio,
    trace::TraceEntry,
};

#[cfg(feature = "stat")]
use crate::stat::{AddStats, Stats};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Counter {
    pub requests: usize,
    pub hits: usize,
}

impl Counter {
    fn record(&mut self, hit: bool) {
        self.requests += 1;
        if hit {
            self.hits += 1;
        }
    }
    pub fn misses(&self) -> usize {
        self.requests - self.hits
    }
    pub fn hit_rate(&self) -> Ratio {
        Ratio::new(self.hits, self.requests)
    }
}

/// Outcome of feeding a trace through the cache. Dumps are never counted.
#[derive(Clone, Debug, Default)]
pub struct RunReport {
    pub total: Counter,
    pub by_label: BTreeMap<String, Counter>,
    /// hit/miss of every counted request, in order
    pub outcomes: Vec<bool>,
    pub dumps: Vec<CacheSnapshot>,
    /// requests refused by the cache, with their position in the trace
    pub rejected: Vec<(usize, RequestError)>,
    pub elapsed: time::Duration,
}

impl RunReport {
    pub fn requests(&self) -> usize {
        self.total.requests
    }
    pub fn hits(&self) -> usize {
        self.total.hits
    }
    pub fn misses(&self) -> usize {
        self.total.misses()
    }
    pub fn hit_rate(&self) -> Ratio {
        self.total.hit_rate()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total Requests: {}", self.requests())?;
        writeln!(f, "    Cache Hits: {}", self.hits())?;
        write!(f, "      Hit Rate: {}", self.hit_rate())
    }
}

pub struct Simulator {
    cache: Cache,
    report: RunReport,
    /// index of the next entry within the current run
    position: usize,
    begin: time::Instant,
}

impl Simulator {
    pub fn new(config: CacheConfig) -> Result<Self, ConfigError> {
        Ok(Self::with_cache(Cache::new(config)?))
    }
    pub fn with_cache(cache: Cache) -> Self {
        Self {
            cache,
            report: Default::default(),
            position: 0,
            begin: time::Instant::now(),
        }
    }
    pub fn cache(&self) -> &Cache {
        &self.cache
    }
    pub fn report(&self) -> &RunReport {
        &self.report
    }
    /// Clears both the cache contents and the counters.
    pub fn reset(&mut self) {
        self.cache.reset();
        self.report = Default::default();
        self.position = 0;
        self.begin = time::Instant::now();
    }
    /// Feeds one entry to the cache and updates the counters.
    pub fn step(&mut self, entry: &TraceEntry) -> Result<Response, RequestError> {
        let position = self.position;
        self.position += 1;
        let r = match self.cache.request(entry.request) {
            Ok(r) => r,
            Err(e) => {
                log::warn!("#{position} `{entry}` rejected: {e}");
                self.report.rejected.push((position, e));
                return Err(e);
            }
        };
        match &r {
            Response::Dump(snapshot) => self.report.dumps.push(snapshot.clone()),
            Response::Hit | Response::Miss => {
                let hit = r.is_hit();
                log::trace!("{entry}{}", if hit { "" } else { " *" });
                self.report.total.record(hit);
                if let Some(label) = &entry.label {
                    self.report
                        .by_label
                        .entry(label.clone())
                        .or_default()
                        .record(hit);
                }
                self.report.outcomes.push(hit);
            }
        }
        Ok(r)
    }
    /// Runs a whole trace on a freshly reset cache.
    ///
    /// Rejected entries are skipped and listed in the report.
    pub fn run<I>(&mut self, entries: I) -> &RunReport
    where
        I: IntoIterator<Item = TraceEntry>,
    {
        self.reset();
        for entry in entries {
            let _ = self.step(&entry);
        }
        self.finish()
    }
    pub fn finish(&mut self) -> &RunReport {
        self.report.elapsed = time::Instant::now() - self.begin;
        log::info!(
            "finished run. {} requests, {} hits, {} dumps",
            self.report.requests(),
            self.report.hits(),
            self.report.dumps.len()
        );
        if !self.report.rejected.is_empty() {
            log::warn!("{} requests rejected", self.report.rejected.len());
        }
        &self.report
    }
}

impl Simulator {
    #[cfg(feature = "stat")]
    pub fn collect_stat(&self) -> Stats {
        let mut ss = Stats::default();
        self.add_stats(&mut ss);
        ss
    }
}

#[cfg(feature = "stat")]
impl AddStats for Simulator {
    fn add_stats(&self, buf: &mut Stats) {
        buf.push(Box::new(stat::SimStat::new(&self.report)));
        self.cache.add_stats(buf);
    }
}

#[cfg(feature = "stat")]
mod stat {
    use crate::stat::*;

    use super::*;

    pub struct SimStat {
        total: Counter,
        by_label: Vec<(String, Counter)>,
        dumps: usize,
        rejected: usize,
        elapsed: time::Duration,
    }

    impl SimStat {
        pub fn new(report: &RunReport) -> Self {
            Self {
                total: report.total,
                by_label: report
                    .by_label
                    .iter()
                    .map(|(l, c)| (l.clone(), *c))
                    .collect(),
                dumps: report.dumps.len(),
                rejected: report.rejected.len(),
                elapsed: report.elapsed,
            }
        }
    }

    impl Stat for SimStat {
        fn view(&self, _: usize) -> Box<dyn StatView + '_> {
            Box::new(self)
        }
    }

    impl StatView for &'_ SimStat {
        fn header(&self) -> &'static str {
            "simulator stat"
        }
        fn width(&self) -> usize {
            40
        }
    }

    impl fmt::Display for &'_ SimStat {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let ms = format!("{} ms", self.elapsed.as_millis());
            writeln!(f, "  elapsed total: {ms:>12}")?;
            writeln!(f, "  requests: {:>17}", self.total.requests)?;
            writeln!(f, "  hits / misses: {:>6} /{:>5}", self.total.hits, self.total.misses())?;
            for (label, c) in &self.by_label {
                writeln!(
                    f,
                    "    {label:>4}: {:>6} /{:>6} ({:.3})",
                    c.hits,
                    c.requests,
                    c.hit_rate()
                )?;
            }
            writeln!(f, "  dumps: {:>20}", self.dumps)?;
            write!(f, "  rejected: {:>17}", self.rejected)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::Pattern;

    fn entries(addrs: &[i64]) -> Vec<TraceEntry> {
        addrs.iter().copied().map(TraceEntry::new).collect()
    }

    #[test]
    fn test_run_counts() {
        let mut sim = Simulator::new(CacheConfig::direct_mapped(4, 4)).unwrap();
        let r = sim.run(entries(&[0, 4, 8, 0]));
        assert_eq!(r.outcomes, vec![false, false, false, true]);
        assert_eq!((r.requests(), r.hits(), r.misses()), (4, 1, 3));
        assert_eq!(r.to_string(), "Total Requests: 4\n    Cache Hits: 1\n      Hit Rate: 0.2500");
    }

    #[test]
    fn test_dumps_not_counted() {
        let mut sim = Simulator::new(CacheConfig::n_way(8, 4, 2)).unwrap();
        let plain = sim.run(entries(&[0, 32, 64, 0, 32])).clone();
        let dumped = sim
            .run(entries(&[-1, 0, 32, -1, 64, 0, -1, -1, 32, -1]))
            .clone();
        assert_eq!(plain.outcomes, dumped.outcomes);
        assert_eq!(plain.total, dumped.total);
        assert_eq!(dumped.dumps.len(), 5);
        assert!(plain.dumps.is_empty());
    }

    #[test]
    fn test_runs_are_independent() {
        let mut sim = Simulator::new(CacheConfig::fully_associative(4, 8)).unwrap();
        let trace = entries(&[0, 8, 16, 0, 8]);
        let first = sim.run(trace.clone()).clone();
        let second = sim.run(trace).clone();
        assert_eq!(first.outcomes, second.outcomes);
        assert_eq!(second.requests(), 5);
    }

    #[test]
    fn test_rejected_entries_are_skipped() {
        let mut sim = Simulator::new(CacheConfig::direct_mapped(4, 4)).unwrap();
        let r = sim.run(entries(&[0, -5, 0]));
        assert_eq!(r.outcomes, vec![false, true]);
        assert_eq!(r.rejected, vec![(1, RequestError::NegativeAddress(-5))]);
    }

    #[test]
    fn test_by_label() {
        let mut sim = Simulator::new(CacheConfig::direct_mapped(16, 16)).unwrap();
        let trace = Pattern::RowMajor
            .accesses(4)
            .unwrap()
            .into_iter()
            .map(TraceEntry::from);
        let r = sim.run(trace);
        assert_eq!(r.requests(), 32);
        assert_eq!(r.by_label["A"].requests, 16);
        assert_eq!(r.by_label["B"].requests, 16);
        // one miss per 16-byte block: four blocks in each matrix
        assert_eq!(r.by_label["A"].hits, 12);
        assert_eq!(r.by_label["B"].hits, 12);
    }

    #[test]
    fn test_step_keeps_state() {
        let mut sim = Simulator::new(CacheConfig::direct_mapped(4, 4)).unwrap();
        assert_eq!(sim.step(&TraceEntry::new(0)).unwrap(), Response::Miss);
        assert_eq!(sim.step(&TraceEntry::new(0)).unwrap(), Response::Hit);
        assert_eq!(sim.step(&TraceEntry::dump()).unwrap().hit(), None);
        assert_eq!(sim.report().requests(), 2);
        sim.reset();
        assert_eq!(sim.report().requests(), 0);
        assert_eq!(sim.cache().snapshot().valid_lines(), 0);
    }

    #[cfg(feature = "stat")]
    #[test]
    fn test_collect_stat() {
        let mut sim = Simulator::new(CacheConfig::n_way(4, 4, 2)).unwrap();
        sim.run(vec![
            TraceEntry::labelled("A", 0),
            TraceEntry::labelled("B", 0),
            TraceEntry::dump(),
        ]);
        let s = sim.collect_stat().view(80).to_string();
        assert!(s.contains("simulator stat"));
        assert!(s.contains("dumps:"));
        assert!(s.contains("total: 1 hits"));
    }
}
