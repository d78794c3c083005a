//! CPSC2019 database access.
//!
//! The 2nd China Physiological Signal Challenge: QRS detection and heart
//! rate estimation from single-lead ECG. 2000 recordings from patients with
//! cardiovascular disease, 10 s each at 500 Hz, laid out as
//!
//! ```text
//! <db_dir>/
//!   data/  data_00001.mat … data_02000.mat   "ecg"    [n, 1] f64, mV
//!   ref/   R_00001.mat    … R_02000.mat      "R_peak" [n, 1] u16, sample indices
//!   records.json                              listing cache (written on first scan)
//! ```
//!
//! Known quirks of the published data: 13 recordings carry values above
//! 20 mV, and the R-peak indices are stored as uint16 (watch for wrap-around
//! when subtracting them from anything).
use anyhow::{bail, Context, Result};
use log::{debug, info};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::mat::MatFile;

/// Sampling rate of every recording (Hz).
pub const FS: f64 = 500.0;
/// Nominal size of the training set.
pub const N_RECORDS: usize = 2000;

const REC_PREFIX: &str = "data_";
const ANN_PREFIX: &str = "R_";
const EXT: &str = "mat";
const CACHE_FILE: &str = "records.json";

/// `records.json`: the record listing, cached next to the data after the
/// first directory scan.
#[derive(Serialize, Deserialize)]
struct RecordsCache {
    rec: Vec<String>,
    ann: Vec<String>,
}

/// Handle to a CPSC2019 database directory.
pub struct Cpsc2019 {
    rec_dir: PathBuf,
    ann_dir: PathBuf,
    records: Vec<String>,
    annotations: Vec<String>,
}

impl Cpsc2019 {
    /// Open a database directory, listing its records.
    ///
    /// The listing comes from `records.json` when present; otherwise every
    /// candidate id 00001..02000 is checked on disk, ids with both a data
    /// and an annotation file are kept, and the cache is written back.
    pub fn open<P: AsRef<Path>>(db_dir: P) -> Result<Self> {
        let db_dir = db_dir.as_ref();
        let rec_dir = db_dir.join("data");
        let ann_dir = db_dir.join("ref");
        let (records, annotations) = list_records(db_dir, &rec_dir, &ann_dir)?;
        debug!(
            "CPSC2019 at {}: {} records listed",
            db_dir.display(),
            records.len()
        );
        Ok(Self {
            rec_dir,
            ann_dir,
            records,
            annotations,
        })
    }

    /// Record names (`data_XXXXX`), ascending.
    pub fn records(&self) -> &[String] {
        &self.records
    }

    /// Annotation names (`R_XXXXX`), in the same order as [`records`](Self::records).
    pub fn annotations(&self) -> &[String] {
        &self.annotations
    }

    /// Resolve a 1-based record number to its name.
    pub fn record_name(&self, rec_no: usize) -> Result<&str> {
        if rec_no == 0 || rec_no > self.records.len() {
            bail!(
                "record number {rec_no} out of range 1..={}",
                self.records.len()
            );
        }
        Ok(&self.records[rec_no - 1])
    }

    /// Annotation name corresponding to a record (`data_XXXXX` → `R_XXXXX`).
    pub fn ann_name(&self, rec: &str) -> Result<String> {
        self.check_record(rec)?;
        let id = rec.strip_prefix(REC_PREFIX).unwrap_or(rec);
        Ok(format!("{ANN_PREFIX}{id}"))
    }

    /// Load one recording's ECG signal, flattened, in mV as stored.
    pub fn load_data(&self, rec: &str) -> Result<Array1<f64>> {
        self.check_record(rec)?;
        let fp = self.rec_dir.join(format!("{rec}.{EXT}"));
        let mat = MatFile::open(&fp)?;
        let ecg = mat
            .var("ecg")
            .with_context(|| format!("no 'ecg' variable in {}", fp.display()))?;
        Ok(ecg.iter().copied().collect())
    }

    /// Load one recording's reference R-peak sample indices.
    pub fn load_ann(&self, rec: &str) -> Result<Vec<u32>> {
        let ann = self.ann_name(rec)?;
        let fp = self.ann_dir.join(format!("{ann}.{EXT}"));
        let mat = MatFile::open(&fp)?;
        let peaks = mat
            .var("R_peak")
            .with_context(|| format!("no 'R_peak' variable in {}", fp.display()))?;
        Ok(peaks.iter().map(|&v| v as u32).collect())
    }

    /// Alias of [`load_ann`](Self::load_ann).
    pub fn load_rpeaks(&self, rec: &str) -> Result<Vec<u32>> {
        self.load_ann(rec)
    }

    /// Reference R-peaks for every listed record, in record order.
    pub fn load_all_rpeaks(&self) -> Result<Vec<Vec<u32>>> {
        self.records
            .iter()
            .map(|rec| self.load_ann(rec))
            .collect()
    }

    /// Subject ids are not part of the published database.
    pub fn subject_id(&self, rec: &str) -> Result<u64> {
        bail!("subject id of {rec} is not available: CPSC2019 publishes no subject information")
    }

    fn check_record(&self, rec: &str) -> Result<()> {
        if !self.records.iter().any(|r| r == rec) {
            bail!("record {rec} is not listed in this database");
        }
        Ok(())
    }
}

fn list_records(
    db_dir: &Path,
    rec_dir: &Path,
    ann_dir: &Path,
) -> Result<(Vec<String>, Vec<String>)> {
    let cache_fn = db_dir.join(CACHE_FILE);
    if cache_fn.is_file() {
        let text = std::fs::read_to_string(&cache_fn)
            .with_context(|| format!("reading {}", cache_fn.display()))?;
        let cache: RecordsCache = serde_json::from_str(&text)
            .with_context(|| format!("parsing {}", cache_fn.display()))?;
        return Ok((cache.rec, cache.ann));
    }

    info!("no records.json; checking {N_RECORDS} candidate data/annotation file pairs");
    let mut records = Vec::new();
    let mut annotations = Vec::new();
    for i in 1..=N_RECORDS {
        let rec = format!("{REC_PREFIX}{i:05}");
        let ann = format!("{ANN_PREFIX}{i:05}");
        // A record is listed only when both sides exist.
        if rec_dir.join(format!("{rec}.{EXT}")).is_file()
            && ann_dir.join(format!("{ann}.{EXT}")).is_file()
        {
            records.push(rec);
            annotations.push(ann);
        }
    }

    let cache = RecordsCache {
        rec: records,
        ann: annotations,
    };
    let text = serde_json::to_string(&cache)?;
    std::fs::write(&cache_fn, text)
        .with_context(|| format!("writing {}", cache_fn.display()))?;
    Ok((cache.rec, cache.ann))
}
