//! # hpl-rs
//!
//! `hpl-rs` solves a dense linear system `A x = b` by distributed LU
//! factorization with partial pivoting, in the style of the HPL benchmark.
//!
//! The `N x (N + 1)` augmented matrix is spread block-cyclically over a
//! `P x Q` grid of processes. The driver walks it one column block at a time:
//! factor the panel, broadcast it along the process row, exchange the pivoted
//! rows inside each process column (spread, then roll) and update the
//! trailing matrix.
//!
//! Processes talk through the [`comm::Transport`] trait. The bundled
//! [`comm::ChannelTransport`] runs every grid position as a thread of the
//! current process, which is what the tests and benches use.
//!
//! ## Modules
//!
//! - [`comm`]: point-to-point send/receive over communication scopes.
//! - [`grid`]: process grid and block-cyclic index arithmetic.
//! - [`matrix`]: the local shard of the distributed matrix.
//! - [`panel`]: panel buffers and the pivot index.
//! - [`pfact`], [`bcast`], [`swap`], [`update`]: the steps of one iteration.
//! - [`pgesv`]: the driver loop.
//! - [`verify`]: back substitution, scaled residual and the end-to-end test.
//!
//! ## Example
//!
//! ```rust
//! use hpl_rs::config::HplConfig;
//! use hpl_rs::{launch, verify};
//!
//! let cfg = HplConfig { n: 32, nb: 4, ..HplConfig::small() };
//! let reports = launch::run_config(&cfg, |grid| verify::pdtest(&grid, &cfg)).unwrap();
//! let report = reports[0].as_ref().unwrap().as_ref().unwrap();
//! assert!(report.passed());
//! ```

pub mod bcast;
pub mod comm;
pub mod config;
pub mod error;
pub mod grid;
pub mod launch;
pub mod logging;
pub mod matrix;
pub mod panel;
pub mod pfact;
pub mod pgesv;
pub mod swap;
pub mod update;
pub mod verify;

pub use config::{Algorithm, HplConfig};
pub use error::{CommError, HplError, Result};
pub use grid::ProcessGrid;
pub use matrix::DistMatrix;
pub use pgesv::{FactorizationSummary, pdgesv, pdgesv0};
