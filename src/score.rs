//! QRS-detection scoring.
//!
//! Implements the recording-level accuracy metric of the CPSC2019 challenge
//! ("Detecting R waves in single-lead ECG"). Every reference R-peak owns a
//! tolerance window of ±`tolerance·fs` samples. One prediction inside the
//! window is a hit; surplus predictions in the same window and predictions
//! stranded between windows are false positives; an empty window is a missed
//! beat. Writing `thr` for the half-width `tolerance·fs`:
//!
//! ```text
//!            ignored      examined       match      examined       match
//! samples ├───────────┼──────────────┼▓▓▓▓▓▓▓▓▓┼──────────────┼▓▓▓▓▓▓▓▓▓┼ ⋯
//!         0      0.5·fs + thr    t₀ − thr  t₀ + thr       t₁ − thr
//! ```
//!
//! The first half second of each recording is a settling period: predictions
//! before `0.5·fs + thr` are ignored. After the last reference peak the
//! examined stretch runs to `9.5·fs − thr` (recordings are 10 s long).
//!
//! Each recording then earns a flag from its error count:
//!
//! | false neg | false pos | flag |
//! |-----------|-----------|------|
//! | 0         | 0         | 1.0  |
//! | 1         | 0         | 0.3  |
//! | 0         | 1         | 0.7  |
//! | fn + fp > 1 combined  | 0.0  |
//!
//! The final score is `round(Σ flag / N, 4)` over all N recordings.
use log::{debug, info, trace};
use thiserror::Error;

/// Default tolerance in seconds (±37.5 samples at 500 Hz).
pub const DEFAULT_TOLERANCE: f64 = 0.075;

/// Settling period at the start of each recording, in seconds.
const SETTLE_SECS: f64 = 0.5;

/// Position of the virtual peak appended after the last reference peak,
/// in seconds (recordings are 10 s; the tail window is clipped half a
/// second short of the end).
const TAIL_SECS: f64 = 9.5;

// ── Errors ────────────────────────────────────────────────────────────────

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScoreError {
    /// Reference and prediction sets must pair up one inner sequence per
    /// recording, in the same order.
    #[error("record count mismatch: {truth} reference recordings vs {pred} predicted")]
    RecordCountMismatch { truth: usize, pred: usize },
}

// ── Per-recording outcome ─────────────────────────────────────────────────

/// Classification counts for a single recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecordOutcome {
    /// Reference peaks with at least one prediction in their window.
    pub true_positive: usize,
    /// Surplus in-window predictions plus predictions between windows.
    pub false_positive: usize,
    /// Reference peaks with no prediction in their window.
    pub false_negative: usize,
}

impl RecordOutcome {
    /// Total error count (false positives + false negatives).
    pub fn errors(&self) -> usize {
        self.false_positive + self.false_negative
    }

    /// Partial-credit flag for this recording: 1.0 for a clean match,
    /// 0.3 for exactly one missed beat, 0.7 for exactly one spurious
    /// detection, 0.0 for anything worse.
    pub fn flag(&self) -> f64 {
        if self.errors() > 1 {
            0.0
        } else if self.false_negative == 1 && self.false_positive == 0 {
            0.3
        } else if self.false_negative == 0 && self.false_positive == 1 {
            0.7
        } else {
            1.0
        }
    }
}

// ── Scoring ───────────────────────────────────────────────────────────────

/// Classify one recording's predictions against its reference peaks.
///
/// `truth` and `pred` are R-peak sample indices (any order, duplicates
/// allowed; neither side is validated). `fs` is the sampling rate in Hz and
/// `tolerance` the window half-width in seconds, so the window around each
/// reference peak spans `±tolerance·fs` samples inclusive.
///
/// A virtual peak at `⌊9.5·fs⌋` closes the last inter-peak stretch; with an
/// empty `truth` there are no windows at all and the outcome is all zeros
/// (flag 1.0), whatever `pred` contains.
pub fn evaluate_record(truth: &[u32], pred: &[u32], fs: f64, tolerance: f64) -> RecordOutcome {
    let thr = tolerance * fs;
    let settle_end = SETTLE_SECS * fs + thr;

    let mut extended: Vec<f64> = truth.iter().map(|&t| f64::from(t)).collect();
    extended.push((TAIL_SECS * fs).floor());

    let mut out = RecordOutcome::default();
    for j in 0..extended.len() - 1 {
        let t = extended[j];
        let next_t = extended[j + 1];

        let matched = pred
            .iter()
            .filter(|&&p| (f64::from(p) - t).abs() <= thr)
            .count();

        // Stray predictions ahead of the first window (past the settling
        // period) and in the stretch up to the next window. Both bounds are
        // inclusive, so with an integer thr a prediction exactly on the
        // window edge is counted here as well as in `matched`.
        let mut stray = 0usize;
        if j == 0 {
            stray += pred
                .iter()
                .filter(|&&p| {
                    let p = f64::from(p);
                    p >= settle_end && p <= t - thr
                })
                .count();
        }
        stray += pred
            .iter()
            .filter(|&&p| {
                let p = f64::from(p);
                p >= t + thr && p <= next_t - thr
            })
            .count();
        out.false_positive += stray;

        if matched >= 1 {
            out.true_positive += 1;
            out.false_positive += matched - 1;
        } else {
            out.false_negative += 1;
        }
    }
    out
}

/// Classify every recording in a paired reference/prediction set.
///
/// # Arguments
///
/// * `truth` – reference R-peak indices, one inner sequence per recording.
/// * `pred`  – predicted R-peak indices, same length and order as `truth`.
/// * `fs`    – sampling rate in Hz.
/// * `tolerance` – window half-width in seconds.
///
/// # Returns
///
/// One [`RecordOutcome`] per recording, in input order.
///
/// # Errors
///
/// [`ScoreError::RecordCountMismatch`] if the two sets disagree in length;
/// nothing is scored in that case.
pub fn evaluate_records<T, P>(
    truth: &[T],
    pred: &[P],
    fs: f64,
    tolerance: f64,
) -> Result<Vec<RecordOutcome>, ScoreError>
where
    T: AsRef<[u32]>,
    P: AsRef<[u32]>,
{
    if truth.len() != pred.len() {
        return Err(ScoreError::RecordCountMismatch {
            truth: truth.len(),
            pred: pred.len(),
        });
    }
    debug!(
        "scoring {} recordings (fs = {fs} Hz, tolerance = ±{} samples)",
        truth.len(),
        tolerance * fs
    );

    let outcomes: Vec<RecordOutcome> = truth
        .iter()
        .zip(pred.iter())
        .enumerate()
        .map(|(i, (t, p))| {
            let o = evaluate_record(t.as_ref(), p.as_ref(), fs, tolerance);
            trace!(
                "recording {i}: tp={} fp={} fn={} flag={}",
                o.true_positive,
                o.false_positive,
                o.false_negative,
                o.flag()
            );
            o
        })
        .collect();
    Ok(outcomes)
}

/// Mean recording flag rounded to 4 decimals.
///
/// An empty slice yields NaN (0/0), same as the challenge reference; guard
/// at the call site if that matters.
pub fn accuracy_from_outcomes(outcomes: &[RecordOutcome]) -> f64 {
    let total: f64 = outcomes.iter().map(RecordOutcome::flag).sum();
    round4(total / outcomes.len() as f64)
}

/// Score a prediction set with the default ±75 ms tolerance.
///
/// Shorthand for [`qrs_accuracy_with`] at [`DEFAULT_TOLERANCE`].
pub fn qrs_accuracy<T, P>(truth: &[T], pred: &[P], fs: f64) -> Result<f64, ScoreError>
where
    T: AsRef<[u32]>,
    P: AsRef<[u32]>,
{
    qrs_accuracy_with(truth, pred, fs, DEFAULT_TOLERANCE)
}

/// Score a prediction set: per-recording flags averaged over all recordings
/// and rounded to 4 decimals.
///
/// Logs the final accuracy at `info` level; per-recording counts are
/// available at `trace` level or, as data, from [`evaluate_records`].
pub fn qrs_accuracy_with<T, P>(
    truth: &[T],
    pred: &[P],
    fs: f64,
    tolerance: f64,
) -> Result<f64, ScoreError>
where
    T: AsRef<[u32]>,
    P: AsRef<[u32]>,
{
    let outcomes = evaluate_records(truth, pred, fs, tolerance)?;
    let acc = accuracy_from_outcomes(&outcomes);
    info!("QRS_acc: {acc}");
    Ok(acc)
}

/// Round half away from zero to 4 decimals.
fn round4(x: f64) -> f64 {
    (x * 1e4).round() / 1e4
}
