use thiserror::Error;

use crate::{
    config::{CacheConfig, ConfigError, Geometry},
    decode::{self, Addr, DecodedAddr},
    set::CacheSet,
    snapshot::CacheSnapshot,
};

#[cfg(feature = "stat")]
use crate::stat::{AddStats, Stats};

/// Raw request value that asks for a dump instead of an access.
pub const DUMP_SENTINEL: i64 = -1;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestError {
    #[error("address {0} is negative and not the dump sentinel")]
    NegativeAddress(i64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Hit,
    Miss,
    /// answer to [`DUMP_SENTINEL`]; never counts as a request
    Dump(CacheSnapshot),
}

impl Response {
    pub fn is_hit(&self) -> bool {
        matches!(self, Response::Hit)
    }
    /// `Some(hit)` for a real access, `None` for a dump.
    pub fn hit(&self) -> Option<bool> {
        match self {
            Response::Hit => Some(true),
            Response::Miss => Some(false),
            Response::Dump(_) => None,
        }
    }
}

/// Set-associative cache with LRU replacement.
///
/// Direct-mapped and fully-associative caches are the same model with
/// `associativity == 1` and `associativity == num_blocks` respectively.
pub struct Cache {
    geometry: Geometry,
    sets: Vec<CacheSet>,
}

impl Cache {
    pub fn new(config: CacheConfig) -> Result<Self, ConfigError> {
        let geometry = config.validate()?;
        log::debug!("building cache: {geometry}");
        Ok(Self {
            geometry,
            sets: (0..geometry.num_sets())
                .map(|_| CacheSet::new(geometry.associativity()))
                .collect(),
        })
    }
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }
    pub fn config(&self) -> CacheConfig {
        self.geometry.config()
    }
    pub fn sets(&self) -> &[CacheSet] {
        &self.sets
    }
    pub fn decode(&self, addr: Addr) -> DecodedAddr {
        decode::decode(addr, &self.geometry)
    }
    /// Handles one raw request: an address, or [`DUMP_SENTINEL`].
    ///
    /// A rejected request leaves every line untouched.
    pub fn request(&mut self, address: i64) -> Result<Response, RequestError> {
        if address == DUMP_SENTINEL {
            let snapshot = self.snapshot();
            log::debug!("dump requested:\n{snapshot}");
            return Ok(Response::Dump(snapshot));
        }
        let addr = u64::try_from(address).map_err(|_| RequestError::NegativeAddress(address))?;
        Ok(if self.access(Addr::new(addr)) {
            Response::Hit
        } else {
            Response::Miss
        })
    }
    pub fn access(&mut self, addr: Addr) -> bool {
        let DecodedAddr { tag, set_index, .. } = self.decode(addr);
        self.sets[set_index].lookup(tag)
    }
    pub fn snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            sets: self
                .sets
                .iter()
                .enumerate()
                .map(|(i, s)| s.snapshot(i))
                .collect(),
        }
    }
    /// Invalidates every line so the cache can be reused for another trace.
    pub fn reset(&mut self) {
        self.sets.iter_mut().for_each(CacheSet::invalidate);
    }
}

#[cfg(feature = "stat")]
impl AddStats for Cache {
    fn add_stats(&self, buf: &mut Stats) {
        buf.push(Box::new(stat::CacheStat::new(
            self.sets.iter().map(|s| *s.stat()).collect(),
        )));
    }
}

#[cfg(feature = "stat")]
mod stat {
    use std::fmt;

    use crate::{set::stat::SetStat, stat::*};

    /// column width of one set in the per-set table
    const CELL: usize = 24;

    pub struct CacheStat {
        sets: Vec<SetStat>,
    }

    impl CacheStat {
        pub fn new(sets: Vec<SetStat>) -> Self {
            Self { sets }
        }
    }

    impl Width for CacheStat {
        fn width_by_chunk_size(chunk_size: usize) -> usize {
            chunk_size * CELL + 2
        }
    }

    impl Stat for CacheStat {
        fn view(&self, max_width: usize) -> Box<dyn StatView + '_> {
            Box::new(CacheStatView {
                stat: self,
                chunk_size: Self::chunk_size(max_width),
            })
        }
    }

    pub struct CacheStatView<'a> {
        stat: &'a CacheStat,
        chunk_size: usize,
    }

    impl StatView for CacheStatView<'_> {
        fn header(&self) -> &'static str {
            "hits / fills / evictions per set"
        }
        fn width(&self) -> usize {
            CacheStat::width_by_chunk_size(self.chunk_size.min(self.stat.sets.len()))
        }
    }

    impl fmt::Display for CacheStatView<'_> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let total = self.stat.sets.iter().fold(SetStat::default(), |acc, s| SetStat {
                hits: acc.hits + s.hits,
                fills: acc.fills + s.fills,
                evictions: acc.evictions + s.evictions,
            });
            for (c, chunk) in self.stat.sets.chunks(self.chunk_size).enumerate() {
                write!(f, " ")?;
                for (i, s) in chunk.iter().enumerate() {
                    let index = c * self.chunk_size + i;
                    let cell = format!("{}/{}/{}", s.hits, s.fills, s.evictions);
                    write!(f, " {index:>4}: {cell:<w$}", w = CELL - 7)?;
                }
                writeln!(f)?;
            }
            write!(
                f,
                "  total: {} hits, {} compulsory fills, {} evictions",
                total.hits, total.fills, total.evictions
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(cache: &mut Cache, addrs: &[i64]) -> Vec<bool> {
        addrs
            .iter()
            .filter_map(|&a| cache.request(a).unwrap().hit())
            .collect()
    }

    #[test]
    fn test_direct_mapped_example() {
        let mut c = Cache::new(CacheConfig::direct_mapped(4, 4)).unwrap();
        assert_eq!(
            run(&mut c, &[0, 4, 8, 0]),
            vec![false, false, false, true]
        );
    }

    #[test]
    fn test_direct_mapped_conflict() {
        // 16 bytes apart map to the same set of a 4 x 4 B direct-mapped cache
        let mut c = Cache::new(CacheConfig::direct_mapped(4, 4)).unwrap();
        assert_eq!(
            run(&mut c, &[0, 16, 0, 1, 2, 3]),
            vec![false, false, false, true, true, true]
        );
    }

    #[test]
    fn test_repeated_address_hits() {
        let mut c = Cache::new(CacheConfig::n_way(8, 8, 2)).unwrap();
        for a in [0, 9, 1000, 123456, 77] {
            assert_eq!(c.request(a).unwrap(), Response::Miss);
            assert_eq!(c.request(a).unwrap(), Response::Hit);
        }
    }

    #[test]
    fn test_lru_two_way() {
        // one set of two ways; tags A=0, B=1, C=2 with 4 B blocks
        let mut c = Cache::new(CacheConfig::fully_associative(2, 4)).unwrap();
        assert_eq!(
            run(&mut c, &[0, 4, 0, 8, 0, 4]),
            vec![false, false, true, false, true, false]
        );
    }

    #[test]
    fn test_direct_mapped_equals_one_way() {
        let trace: Vec<i64> = (0..500).map(|i| (i * 37 % 211) * 4).collect();
        let mut dm = Cache::new(CacheConfig::direct_mapped(16, 8)).unwrap();
        let mut nw = Cache::new(CacheConfig::n_way(16, 8, 1)).unwrap();
        assert_eq!(run(&mut dm, &trace), run(&mut nw, &trace));
    }

    #[test]
    fn test_fully_associative_no_conflicts() {
        // 4 blocks whose addresses collide in every set of a direct-mapped cache
        let trace = [0, 64, 128, 192, 0, 64, 128, 192];
        let mut dm = Cache::new(CacheConfig::direct_mapped(4, 4)).unwrap();
        let mut fa = Cache::new(CacheConfig::fully_associative(4, 4)).unwrap();
        assert!(run(&mut dm, &trace).iter().all(|h| !h));
        assert_eq!(
            run(&mut fa, &trace),
            vec![false, false, false, false, true, true, true, true]
        );
        // one block over capacity thrashes under LRU
        let mut fa = Cache::new(CacheConfig::fully_associative(4, 4)).unwrap();
        let cyclic: Vec<i64> = (0..20).map(|i| (i % 5) * 4).collect();
        assert!(run(&mut fa, &cyclic).iter().all(|h| !h));
    }

    #[test]
    fn test_dump_does_not_change_outcomes() {
        let trace: Vec<i64> = (0..200).map(|i| (i * 13 % 97) * 2).collect();
        let mut with_dumps = Vec::new();
        for (i, &a) in trace.iter().enumerate() {
            if i % 3 == 0 {
                with_dumps.push(DUMP_SENTINEL);
                with_dumps.push(DUMP_SENTINEL);
            }
            with_dumps.push(a);
        }
        let mut c1 = Cache::new(CacheConfig::n_way(8, 4, 2)).unwrap();
        let mut c2 = Cache::new(CacheConfig::n_way(8, 4, 2)).unwrap();
        assert_eq!(run(&mut c1, &trace), run(&mut c2, &with_dumps));
        assert_eq!(c1.snapshot(), c2.snapshot());
    }

    #[test]
    fn test_dump_is_read_only() {
        let mut c = Cache::new(CacheConfig::n_way(4, 4, 2)).unwrap();
        c.request(0).unwrap();
        c.request(8).unwrap();
        let before = c.snapshot();
        let Response::Dump(dumped) = c.request(DUMP_SENTINEL).unwrap() else {
            panic!("expected dump");
        };
        assert_eq!(before, dumped);
        assert_eq!(dumped.sets.len(), 2);
        assert_eq!(dumped.valid_lines(), 2);
        assert_eq!(c.request(DUMP_SENTINEL).unwrap().hit(), None);
    }

    #[test]
    fn test_negative_address_rejected() {
        let mut c = Cache::new(CacheConfig::direct_mapped(4, 4)).unwrap();
        c.request(0).unwrap();
        let before = c.snapshot();
        assert_eq!(c.request(-2), Err(RequestError::NegativeAddress(-2)));
        assert_eq!(
            c.request(i64::MIN),
            Err(RequestError::NegativeAddress(i64::MIN))
        );
        assert_eq!(before, c.snapshot());
        assert!(c.request(0).unwrap().is_hit());
    }

    #[test]
    fn test_construction_errors() {
        assert!(Cache::new(CacheConfig::direct_mapped(3, 4)).is_err());
        assert!(Cache::new(CacheConfig::direct_mapped(4, 6)).is_err());
        assert!(Cache::new(CacheConfig::n_way(8, 4, 3)).is_err());
        let c = Cache::new(CacheConfig::n_way(32, 4, 4)).unwrap();
        assert_eq!(c.sets().len() * c.geometry().associativity(), 32);
        assert_eq!(c.config(), CacheConfig::n_way(32, 4, 4));
    }

    #[test]
    fn test_reset() {
        let mut c = Cache::new(CacheConfig::n_way(4, 4, 2)).unwrap();
        let trace = [0, 4, 8, 0, 16, 4];
        let first = run(&mut c, &trace);
        c.reset();
        assert_eq!(c.snapshot().valid_lines(), 0);
        assert_eq!(run(&mut c, &trace), first);
    }

    #[cfg(feature = "stat")]
    #[test]
    fn test_stat_view() {
        let mut c = Cache::new(CacheConfig::direct_mapped(2, 4)).unwrap();
        run(&mut c, &[0, 0, 8, 4]);
        let mut stats = Stats::default();
        c.add_stats(&mut stats);
        let s = format!("{}", stats.view(80));
        assert!(s.contains("total: 1 hits, 2 compulsory fills, 1 evictions"));
    }
}
