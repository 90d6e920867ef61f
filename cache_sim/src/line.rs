use std::fmt;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheLine {
    valid: bool,
    tag: u64,
    /// set clock value at the most recent access
    last_used: u64,
}

impl CacheLine {
    pub fn is_valid(&self) -> bool {
        self.valid
    }
    pub fn tag(&self) -> Option<u64> {
        self.valid.then_some(self.tag)
    }
    pub fn last_used(&self) -> u64 {
        self.last_used
    }
    pub fn matches(&self, tag: u64) -> bool {
        self.valid && self.tag == tag
    }
    pub(crate) fn touch(&mut self, now: u64) {
        self.last_used = now;
    }
    pub(crate) fn fill(&mut self, tag: u64, now: u64) {
        self.valid = true;
        self.tag = tag;
        self.last_used = now;
    }
    pub(crate) fn invalidate(&mut self) {
        *self = Self::default();
    }
}

impl fmt::Display for CacheLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tag() {
            Some(tag) => write!(f, "{tag:#x}"),
            None => write!(f, "-"),
        }
    }
}
