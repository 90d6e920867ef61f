use std::fmt;

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("number of blocks must be a power of 2, got {0}")]
    NumBlocksNotPowerOfTwo(usize),
    #[error("block size must be a power of 2, got {0}")]
    BlockSizeNotPowerOfTwo(usize),
    #[error("associativity must be at least 1")]
    ZeroAssociativity,
    #[error("associativity {associativity} does not divide {num_blocks} blocks evenly")]
    AssociativityDoesNotDivide {
        num_blocks: usize,
        associativity: usize,
    },
    #[error("number of sets must be a power of 2, got {0}")]
    SetCountNotPowerOfTwo(usize),
    #[error("{num_sets} sets of {block_size} bytes exceed the address space")]
    AddressSpaceOverflow { num_sets: usize, block_size: usize },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Requested cache shape, before validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct CacheConfig {
    pub num_blocks: usize,
    pub block_size: usize,
    #[serde(default = "one")]
    pub associativity: usize,
}

fn one() -> usize {
    1
}

impl CacheConfig {
    pub fn n_way(num_blocks: usize, block_size: usize, associativity: usize) -> Self {
        Self {
            num_blocks,
            block_size,
            associativity,
        }
    }
    pub fn direct_mapped(num_blocks: usize, block_size: usize) -> Self {
        Self::n_way(num_blocks, block_size, 1)
    }
    /// One set holding every block.
    pub fn fully_associative(num_blocks: usize, block_size: usize) -> Self {
        Self::n_way(num_blocks, block_size, num_blocks)
    }
    pub fn deser(file: impl std::io::Read) -> anyhow::Result<Self> {
        Ok(serde_json::from_reader(file)?)
    }
    pub fn validate(&self) -> Result<Geometry> {
        let &Self {
            num_blocks,
            block_size,
            associativity,
        } = self;
        if !num_blocks.is_power_of_two() {
            return Err(ConfigError::NumBlocksNotPowerOfTwo(num_blocks));
        }
        if !block_size.is_power_of_two() {
            return Err(ConfigError::BlockSizeNotPowerOfTwo(block_size));
        }
        if associativity == 0 {
            return Err(ConfigError::ZeroAssociativity);
        }
        if num_blocks % associativity != 0 {
            return Err(ConfigError::AssociativityDoesNotDivide {
                num_blocks,
                associativity,
            });
        }
        let num_sets = num_blocks / associativity;
        if !num_sets.is_power_of_two() {
            return Err(ConfigError::SetCountNotPowerOfTwo(num_sets));
        }
        // the tag needs at least one bit left above index and offset
        let span = (num_sets as u64).checked_mul(block_size as u64);
        if !matches!(span, Some(s) if s <= 1 << 63) {
            return Err(ConfigError::AddressSpaceOverflow {
                num_sets,
                block_size,
            });
        }
        Ok(Geometry {
            num_sets,
            associativity,
            block_size,
            offset_bits: block_size.trailing_zeros(),
            index_bits: num_sets.trailing_zeros(),
        })
    }
}

impl fmt::Display for CacheConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} blocks x {} B, {}-way",
            self.num_blocks, self.block_size, self.associativity
        )
    }
}

/// Validated cache geometry. Only obtainable through [`CacheConfig::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    num_sets: usize,
    associativity: usize,
    block_size: usize,
    offset_bits: u32,
    index_bits: u32,
}

impl Geometry {
    pub fn num_sets(&self) -> usize {
        self.num_sets
    }
    pub fn associativity(&self) -> usize {
        self.associativity
    }
    pub fn block_size(&self) -> usize {
        self.block_size
    }
    pub fn num_blocks(&self) -> usize {
        self.num_sets * self.associativity
    }
    pub fn offset_bits(&self) -> u32 {
        self.offset_bits
    }
    pub fn index_bits(&self) -> u32 {
        self.index_bits
    }
    pub fn is_direct_mapped(&self) -> bool {
        self.associativity == 1
    }
    pub fn is_fully_associative(&self) -> bool {
        self.num_sets == 1
    }
    pub fn config(&self) -> CacheConfig {
        CacheConfig::n_way(self.num_blocks(), self.block_size, self.associativity)
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_fully_associative() {
            "fully associative".to_owned()
        } else if self.is_direct_mapped() {
            "direct mapped".to_owned()
        } else {
            format!("{}-way set associative", self.associativity)
        };
        write!(
            f,
            "{kind}: {} sets x {} ways x {} B (offset {} bits, index {} bits)",
            self.num_sets, self.associativity, self.block_size, self.offset_bits, self.index_bits
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_geometries() {
        for (blocks, size, ways) in [(4, 4, 1), (16, 8, 4), (8, 1, 8), (1, 1, 1), (64, 32, 2)] {
            let g = CacheConfig::n_way(blocks, size, ways).validate().unwrap();
            assert_eq!(g.num_sets() * g.associativity(), blocks);
            assert!(g.num_sets().is_power_of_two());
            assert!(g.block_size().is_power_of_two());
            assert_eq!(1usize << g.offset_bits(), size);
            assert_eq!(1usize << g.index_bits(), g.num_sets());
        }
    }

    #[test]
    fn test_invalid_geometries() {
        use ConfigError::*;
        let cases = [
            ((6, 4, 1), NumBlocksNotPowerOfTwo(6)),
            ((0, 4, 1), NumBlocksNotPowerOfTwo(0)),
            ((8, 3, 1), BlockSizeNotPowerOfTwo(3)),
            ((8, 0, 1), BlockSizeNotPowerOfTwo(0)),
            ((8, 4, 0), ZeroAssociativity),
            (
                (8, 4, 3),
                AssociativityDoesNotDivide {
                    num_blocks: 8,
                    associativity: 3,
                },
            ),
            (
                (8, 4, 16),
                AssociativityDoesNotDivide {
                    num_blocks: 8,
                    associativity: 16,
                },
            ),
        ];
        for ((blocks, size, ways), expected) in cases {
            assert_eq!(
                CacheConfig::n_way(blocks, size, ways).validate(),
                Err(expected)
            );
        }
    }

    #[test]
    fn test_address_space_limit() {
        let g = CacheConfig::n_way(1 << 62, 1 << 62, 1 << 62)
            .validate()
            .unwrap();
        assert_eq!(g.num_sets(), 1);
        assert_eq!(g.offset_bits(), 62);
        // exactly 2^63 bytes still leaves one tag bit
        let g = CacheConfig::direct_mapped(1 << 62, 2).validate().unwrap();
        assert_eq!(g.offset_bits() + g.index_bits(), 63);
        assert_eq!(
            CacheConfig::direct_mapped(1 << 62, 4).validate(),
            Err(ConfigError::AddressSpaceOverflow {
                num_sets: 1 << 62,
                block_size: 4,
            })
        );
        assert_eq!(
            CacheConfig::n_way(1 << 62, 1 << 62, 2).validate(),
            Err(ConfigError::AddressSpaceOverflow {
                num_sets: 1 << 61,
                block_size: 1 << 62,
            })
        );
    }

    #[test]
    fn test_specializations() {
        let dm = CacheConfig::direct_mapped(16, 4).validate().unwrap();
        assert!(dm.is_direct_mapped());
        assert_eq!(dm.num_sets(), 16);
        let fa = CacheConfig::fully_associative(16, 4).validate().unwrap();
        assert!(fa.is_fully_associative());
        assert_eq!(fa.associativity(), 16);
        assert_eq!(fa.index_bits(), 0);
    }

    #[test]
    fn test_deser() {
        let json = r#"{ "num_blocks": 32, "block_size": 16 }"#;
        let config = CacheConfig::deser(json.as_bytes()).unwrap();
        assert_eq!(config, CacheConfig::direct_mapped(32, 16));
        let json = r#"{ "num_blocks": 32, "block_size": 16, "associativity": 4 }"#;
        let config = CacheConfig::deser(json.as_bytes()).unwrap();
        assert_eq!(config.validate().unwrap().num_sets(), 8);
    }
}
