//! # qrseval — QRS-detection scoring for the CPSC challenges
//!
//! Pure-Rust scoring of R-peak detections against the CPSC2019 reference
//! annotations, plus native readers for the CPSC2019 and CPSC2018 database
//! layouts. MAT-files are parsed by a built-in Level 5 subset reader, so no
//! MATLAB, SciPy or C libraries are involved.
//!
//! ## Overview
//!
//! ```text
//! <db>/data/data_XXXXX.mat ─┐
//!                           ├─ Cpsc2019 ─ load_all_rpeaks() ─► truth ─┐
//! <db>/ref/R_XXXXX.mat ─────┘                                         ├─► qrs_accuracy()
//!                                       your detector ──────► pred ───┘         │
//!                                                                               ▼
//!                                                      per-recording flags ∈ {0, 0.3, 0.7, 1}
//!                                                               round(Σ flag / N, 4)
//! ```
//!
//! ## Quick start
//!
//! Scoring is a pure function over peak indices:
//!
//! ```
//! use qrseval::qrs_accuracy;
//!
//! let truth = vec![vec![500_u32, 1000, 1500]];
//! let pred = vec![vec![498_u32, 1003, 1497]]; // within ±37.5 samples
//! let acc = qrs_accuracy(&truth, &pred, 500.0).unwrap();
//! assert_eq!(acc, 1.0);
//! ```
//!
//! Against a CPSC2019 database directory:
//!
//! ```no_run
//! use qrseval::{score_database, Cpsc2019, DEFAULT_TOLERANCE};
//!
//! let db = Cpsc2019::open("data/cpsc2019").unwrap();
//! let pred: Vec<Vec<u32>> = db
//!     .records()
//!     .iter()
//!     .map(|_| vec![] /* run your detector here */)
//!     .collect();
//! let acc = score_database("data/cpsc2019", &pred, DEFAULT_TOLERANCE).unwrap();
//! println!("QRS_acc: {acc}");
//! ```
//!
//! Per-recording detail is available one level down:
//!
//! ```
//! use qrseval::evaluate_record;
//!
//! let o = evaluate_record(&[1000], &[1000, 1200], 500.0, 0.075);
//! assert_eq!((o.true_positive, o.false_positive), (1, 1));
//! assert_eq!(o.flag(), 0.7);
//! ```

pub mod cpsc2018;
pub mod cpsc2019;
pub mod mat;
pub mod score;

use anyhow::Result;
use std::path::Path;

// ── Crate-root re-exports ─────────────────────────────────────────────────
//
// The scoring surface and the database handles are available directly as
// `qrseval::Foo` without having to know the internal module layout.

// score
pub use score::{
    accuracy_from_outcomes, evaluate_record, evaluate_records, qrs_accuracy, qrs_accuracy_with,
    RecordOutcome, ScoreError, DEFAULT_TOLERANCE,
};

// datasets
pub use cpsc2018::{Cpsc2018, HeaderInfo, LeadSpec};
pub use cpsc2019::Cpsc2019;

// mat — Level 5 subset reader/writer
pub use mat::{MatFile, MatWriter};

/// Score a prediction set against the reference annotations of a CPSC2019
/// database directory.
///
/// Opens the database, loads every listed recording's R-peaks in record
/// order, and runs the challenge metric at the database's 500 Hz sampling
/// rate. `pred` must hold one inner sequence per listed recording, in the
/// same order.
///
/// # Errors
///
/// Fails if the directory cannot be listed, an annotation file is missing
/// or malformed, or `pred` does not pair up with the record listing.
pub fn score_database<P, A>(db_dir: P, pred: &[A], tolerance: f64) -> Result<f64>
where
    P: AsRef<Path>,
    A: AsRef<[u32]>,
{
    let db = Cpsc2019::open(db_dir)?;
    let truth = db.load_all_rpeaks()?;
    let acc = qrs_accuracy_with(&truth, pred, cpsc2019::FS, tolerance)?;
    Ok(acc)
}
