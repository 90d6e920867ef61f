use std::fmt::Display;

use crate::config::Geometry;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Addr(u64);

impl Addr {
    pub fn new(v: u64) -> Self {
        Self(v)
    }
    pub fn inner(self) -> u64 {
        self.0
    }
    pub fn disp(&self, amount: u64) -> Self {
        Self(self.0 + amount)
    }
}

impl Display for Addr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodedAddr {
    pub tag: u64,
    pub set_index: usize,
    pub offset: u64,
}

impl Display for DecodedAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "tag {:#x}, set {}, offset {}",
            self.tag, self.set_index, self.offset
        )
    }
}

#[inline]
fn mask(bits: u32) -> u64 {
    (1u64 << bits) - 1
}

/// Splits `addr` into `tag | set index | block offset`, low bits last.
pub fn decode(addr: Addr, geometry: &Geometry) -> DecodedAddr {
    let a = addr.inner();
    let offset_bits = geometry.offset_bits();
    let index_bits = geometry.index_bits();
    DecodedAddr {
        tag: a >> (offset_bits + index_bits),
        set_index: ((a >> offset_bits) & mask(index_bits)) as usize,
        offset: a & mask(offset_bits),
    }
}

pub fn compose(decoded: DecodedAddr, geometry: &Geometry) -> Addr {
    let offset_bits = geometry.offset_bits();
    let index_bits = geometry.index_bits();
    Addr::new(
        (decoded.tag << (offset_bits + index_bits))
            | ((decoded.set_index as u64) << offset_bits)
            | decoded.offset,
    )
}
