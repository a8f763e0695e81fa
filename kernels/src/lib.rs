//! Local, communication-free kernels used by `hpl-rs`.
//!
//! Every routine here works on a single process's memory. Matrices are stored
//! **column-major** with an explicit leading dimension (`lda`), the way the
//! distributed matrix shards are laid out. The staged row panel `U` is the
//! exception: it is stored *transposed*, i.e. one matrix row per contiguous run
//! of `ldu` elements, so that whole rows can be shipped as a single message.

use num_traits::{Float, FromPrimitive, Num, NumAssign, ToPrimitive};
use std::fmt::Debug;
use thiserror::Error;

pub mod gemm;
pub mod getf2;
pub mod laswp;
pub mod transpose;
pub mod trsm;

pub use gemm::gemm_sub;
pub use getf2::{Getf2Info, getf2};
pub use laswp::{RowTarget, laswp01t, laswp06t, permute_rows};
pub use transpose::lacpy_transposed;
pub use trsm::trsm_unit_lower;

#[derive(Error, Debug)]
pub enum KernelError {
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },
    #[error("Row index {index} out of bounds for {rows} rows")]
    RowOutOfBounds { index: usize, rows: usize },
}

pub type Result<T> = std::result::Result<T, KernelError>;

/// Trait bound for elements that can be processed by kernels.
pub trait KernelElem:
    Num + NumAssign + Copy + Clone + Debug + Send + Sync + FromPrimitive + ToPrimitive + PartialOrd
{
}

impl<T> KernelElem for T where
    T: Num
        + NumAssign
        + Copy
        + Clone
        + Debug
        + Send
        + Sync
        + FromPrimitive
        + ToPrimitive
        + PartialOrd
{
}

/// Elements that additionally support magnitude comparison (pivot search).
pub trait FloatElem: KernelElem + Float {}

impl<T> FloatElem for T where T: KernelElem + Float {}

/// Checks that a column-major buffer can hold `rows x cols` with leading dimension `ld`.
pub(crate) fn check_col_major(len: usize, rows: usize, cols: usize, ld: usize) -> Result<()> {
    if cols == 0 || rows == 0 {
        return Ok(());
    }
    let needed = ld * (cols - 1) + rows;
    if ld < rows || len < needed {
        return Err(KernelError::ShapeMismatch {
            expected: vec![needed],
            got: vec![len],
        });
    }
    Ok(())
}
