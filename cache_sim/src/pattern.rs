//! Memory access patterns of small matrix kernels.
//!
//! Every matrix is `dim x dim` 4-byte integers stored row-major. The three
//! matrices live at different places in memory: `A` at 0, `B` right after
//! `A` plus 64 bytes of padding and `C` after `B` plus 128 bytes.

use std::fmt;

use thiserror::Error;

use crate::decode::Addr;

pub const ELEMENT_SIZE: u64 = 4;
pub const DEFAULT_DIM: usize = 8;
pub const DEFAULT_TILE: usize = 2;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternError {
    #[error("matrix dimension must be positive")]
    ZeroDimension,
    #[error("tile size {tile} must be positive and divide the matrix dimension {dim}")]
    BadTile { dim: usize, tile: usize },
    #[error("matrix dimension {dim} is too large to simulate")]
    TooLarge { dim: usize },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Matrix {
    A,
    B,
    C,
}

/// Bytes spanned by the three matrices and their padding, if it fits in
/// the address space.
pub fn extent(dim: usize) -> Option<u64> {
    let n2 = (dim as u64).checked_mul(dim as u64)?;
    n2.checked_mul(3 * ELEMENT_SIZE)?.checked_add(128)
}

impl Matrix {
    /// `dim` must have an [`extent`].
    pub fn base(self, dim: usize) -> Addr {
        let n2 = (dim * dim) as u64;
        Addr::new(match self {
            Matrix::A => 0,
            Matrix::B => ELEMENT_SIZE * n2 + 64,
            Matrix::C => 2 * ELEMENT_SIZE * n2 + 128,
        })
    }
    pub fn element(self, dim: usize, row: usize, col: usize) -> Addr {
        self.base(dim)
            .disp(ELEMENT_SIZE * (row * dim + col) as u64)
    }
    pub fn label(self) -> &'static str {
        match self {
            Matrix::A => "A",
            Matrix::B => "B",
            Matrix::C => "C",
        }
    }
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemAccess {
    pub matrix: Matrix,
    pub row: usize,
    pub col: usize,
    pub addr: Addr,
}

impl fmt::Display for MemAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}][{}]", self.matrix, self.row, self.col)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pattern {
    /// `B[i][j] = 2 * A[i][j]`, walking rows
    RowMajor,
    /// `B[j][i] = 2 * A[j][i]`, walking columns
    ColumnMajor,
    /// `B[i][j] = A[j][i]`
    Transpose,
    /// `C += A * B`, i-j-k loop order
    MatrixMultiply,
    /// `C += A * B` over `tile x tile` blocks
    TiledMultiply { tile: usize },
    /// `B[i][j]` = sum of row `i` and column `j` of `A`
    CrossSum,
    /// `A[j][i] += 1`
    Increment,
}

struct Trace {
    dim: usize,
    accesses: Vec<MemAccess>,
}

impl Trace {
    fn touch(&mut self, matrix: Matrix, row: usize, col: usize) {
        self.accesses.push(MemAccess {
            matrix,
            row,
            col,
            addr: matrix.element(self.dim, row, col),
        });
    }
    fn multiply_step(&mut self, i: usize, j: usize, k: usize) {
        use Matrix::*;
        // read C, read A, read B, write C
        self.touch(C, i, j);
        self.touch(A, i, k);
        self.touch(B, k, j);
        self.touch(C, i, j);
    }
}

impl Pattern {
    pub fn name(&self) -> &'static str {
        match self {
            Pattern::RowMajor => "row-major",
            Pattern::ColumnMajor => "column-major",
            Pattern::Transpose => "transpose",
            Pattern::MatrixMultiply => "matrix-multiply",
            Pattern::TiledMultiply { .. } => "tiled-multiply",
            Pattern::CrossSum => "cross-sum",
            Pattern::Increment => "increment",
        }
    }
    /// Number of accesses [`Pattern::accesses`] produces for `dim`, or
    /// `None` if it does not fit in a `usize`.
    pub fn len(&self, dim: usize) -> Option<usize> {
        let n2 = dim.checked_mul(dim)?;
        match self {
            Pattern::RowMajor | Pattern::ColumnMajor | Pattern::Transpose | Pattern::Increment => {
                n2.checked_mul(2)
            }
            Pattern::MatrixMultiply | Pattern::TiledMultiply { .. } => {
                n2.checked_mul(dim)?.checked_mul(4)
            }
            Pattern::CrossSum => n2.checked_mul(dim.checked_mul(2)?.checked_add(1)?),
        }
    }
    pub fn accesses(&self, dim: usize) -> Result<Vec<MemAccess>, PatternError> {
        use Matrix::*;
        if dim == 0 {
            return Err(PatternError::ZeroDimension);
        }
        let len = match (self.len(dim), extent(dim)) {
            (Some(len), Some(_)) => len,
            _ => return Err(PatternError::TooLarge { dim }),
        };
        let mut accesses: Vec<MemAccess> = Vec::new();
        accesses
            .try_reserve_exact(len)
            .map_err(|_| PatternError::TooLarge { dim })?;
        let mut t = Trace { dim, accesses };
        match *self {
            Pattern::RowMajor => {
                for i in 0..dim {
                    for j in 0..dim {
                        t.touch(A, i, j);
                        t.touch(B, i, j);
                    }
                }
            }
            Pattern::ColumnMajor => {
                for i in 0..dim {
                    for j in 0..dim {
                        t.touch(A, j, i);
                        t.touch(B, j, i);
                    }
                }
            }
            Pattern::Transpose => {
                for i in 0..dim {
                    for j in 0..dim {
                        t.touch(A, j, i);
                        t.touch(B, i, j);
                    }
                }
            }
            Pattern::MatrixMultiply => {
                for i in 0..dim {
                    for j in 0..dim {
                        for k in 0..dim {
                            t.multiply_step(i, j, k);
                        }
                    }
                }
            }
            Pattern::TiledMultiply { tile } => {
                if tile == 0 || dim % tile != 0 {
                    return Err(PatternError::BadTile { dim, tile });
                }
                for i0 in (0..dim).step_by(tile) {
                    for j0 in (0..dim).step_by(tile) {
                        for k0 in (0..dim).step_by(tile) {
                            for i in i0..i0 + tile {
                                for j in j0..j0 + tile {
                                    for k in k0..k0 + tile {
                                        t.multiply_step(i, j, k);
                                    }
                                }
                            }
                        }
                    }
                }
            }
            Pattern::CrossSum => {
                for i in 0..dim {
                    for j in 0..dim {
                        for ii in 0..dim {
                            t.touch(A, ii, j);
                        }
                        for jj in 0..dim {
                            t.touch(A, i, jj);
                        }
                        t.touch(B, i, j);
                    }
                }
            }
            Pattern::Increment => {
                for i in 0..dim {
                    for j in 0..dim {
                        t.touch(A, j, i);
                        t.touch(A, j, i);
                    }
                }
            }
        }
        debug_assert_eq!(t.accesses.len(), len);
        Ok(t.accesses)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::TiledMultiply { tile } => write!(f, "{} (tile {tile})", self.name()),
            _ => write!(f, "{}", self.name()),
        }
    }
}
