//! CPSC2018 database access.
//!
//! The China Physiological Signal Challenge 2018: rhythm/morphology
//! classification of 12-lead ECG. 6877 recordings of 6 to 60 s at 500 Hz,
//! stored flat as `A0001.mat` … `A6877.mat` (signal, `val` variable,
//! `[12, n]`) plus WFDB-style `.hea` text headers:
//!
//! ```text
//! A0001 12 500 7500 12-Mar-2019 14:23:01
//! A0001.mat 16+24 1000/mV 16 0 -127 2544 0 I
//! A0001.mat 16+24 1000/mV 16 0  1994 1578 0 II
//! ⋮                                        (one line per lead)
//! #Age: 74
//! #Sex: Male
//! #Dx: RBBB
//! #Rx: Unknown
//! #Hx: Unknown
//! #Sx: Unknown
//! ```
use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;
use log::debug;
use ndarray::Array2;
use std::path::{Path, PathBuf};

use crate::mat::MatFile;

/// Sampling rate of every recording (Hz).
pub const FS: u32 = 500;
/// Size of the training set.
pub const N_RECORDS: usize = 6877;

/// Lead order used throughout the database.
pub const ALL_LEADS: [&str; 12] = [
    "I", "II", "III", "aVR", "aVL", "aVF", "V1", "V2", "V3", "V4", "V5", "V6",
];

/// Diagnosis abbreviations appearing in `#Dx` fields.
pub const ALL_DIAGNOSES: [&str; 9] = [
    "N", "AF", "I-AVB", "LBBB", "RBBB", "PAC", "PVC", "STD", "STE",
];

/// Full name of a diagnosis abbreviation.
pub fn diagnosis_full_name(abbr: &str) -> Option<&'static str> {
    match abbr {
        "N" => Some("Normal"),
        "AF" => Some("Atrial fibrillation"),
        "I-AVB" => Some("First-degree atrioventricular block"),
        "LBBB" => Some("Left bundle brunch block"),
        "RBBB" => Some("Right bundle brunch block"),
        "PAC" => Some("Premature atrial contraction"),
        "PVC" => Some("Premature ventricular contraction"),
        "STD" => Some("ST-segment depression"),
        "STE" => Some("ST-segment elevated"),
        _ => None,
    }
}

// ── Header model ──────────────────────────────────────────────────────────

/// One signal line of a `.hea` header.
///
/// The second column packs the sample format and byte offset (`16+24`), the
/// third the ADC gain per physical unit (`1000/mV`); both are split here.
/// The constant-zero block-size column is dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeadSpec {
    pub file_name: String,
    pub resolution_bits: i32,
    pub offset: i32,
    pub adc_gain: i32,
    pub adc_bits: i32,
    pub baseline: i32,
    pub first_value: i32,
    pub checksum: i32,
    pub lead_name: String,
}

/// Parsed `.hea` header: record line, per-lead table, patient fields.
#[derive(Debug, Clone)]
pub struct HeaderInfo {
    pub rec_name: String,
    pub nb_leads: usize,
    pub freq: u32,
    pub nb_samples: usize,
    pub recorded_at: NaiveDateTime,
    /// `None` when the header carries `NaN`.
    pub age: Option<u32>,
    pub sex: String,
    /// Abbreviations from `#Dx`, comma-separated in the file; `Normal` is
    /// normalised to its abbreviation `N`.
    pub diagnosis: Vec<String>,
    pub medical_prescription: String,
    pub history: String,
    pub symptom_or_surgery: String,
    pub leads: Vec<LeadSpec>,
}

/// Parse the text of a `.hea` header.
pub fn parse_header(text: &str) -> Result<HeaderInfo> {
    let lines: Vec<&str> = text.lines().collect();
    let first = lines.first().context("empty header")?;

    let mut it = first.split_whitespace();
    let rec_name = it
        .next()
        .context("record line: missing record name")?
        .to_string();
    let nb_leads: usize = it
        .next()
        .context("record line: missing lead count")?
        .parse()
        .context("record line: lead count")?;
    let freq: u32 = it
        .next()
        .context("record line: missing sampling rate")?
        .parse()
        .context("record line: sampling rate")?;
    let nb_samples: usize = it
        .next()
        .context("record line: missing sample count")?
        .parse()
        .context("record line: sample count")?;
    let date = it.next().context("record line: missing date")?;
    let time = it.next().context("record line: missing time")?;
    let recorded_at = NaiveDateTime::parse_from_str(
        &format!("{date} {time}"),
        "%d-%b-%Y %H:%M:%S",
    )
    .with_context(|| format!("record line: timestamp '{date} {time}'"))?;

    if lines.len() < 1 + nb_leads {
        bail!(
            "record line promises {nb_leads} leads but the header has {} lines",
            lines.len()
        );
    }
    let leads = lines[1..1 + nb_leads]
        .iter()
        .map(|l| parse_lead(l))
        .collect::<Result<Vec<_>>>()?;

    let age = comment_field(&lines, "#Age")?.parse().ok();
    let sex = comment_field(&lines, "#Sex")?.to_string();
    let diagnosis = comment_field(&lines, "#Dx")?
        .split(',')
        .map(|d| {
            if d == "Normal" {
                "N".to_string()
            } else {
                d.to_string()
            }
        })
        .collect();
    let medical_prescription = comment_field(&lines, "#Rx")?.to_string();
    let history = comment_field(&lines, "#Hx")?.to_string();
    let symptom_or_surgery = comment_field(&lines, "#Sx")?.to_string();

    Ok(HeaderInfo {
        rec_name,
        nb_leads,
        freq,
        nb_samples,
        recorded_at,
        age,
        sex,
        diagnosis,
        medical_prescription,
        history,
        symptom_or_surgery,
        leads,
    })
}

fn parse_lead(line: &str) -> Result<LeadSpec> {
    let f: Vec<&str> = line.split_whitespace().collect();
    if f.len() != 9 {
        bail!("lead line has {} fields, expected 9: '{line}'", f.len());
    }
    let (bits, offset) = f[1]
        .split_once('+')
        .with_context(|| format!("lead line: format+offset field '{}'", f[1]))?;
    let gain = f[2].split('/').next().unwrap_or(f[2]);
    Ok(LeadSpec {
        file_name: f[0].to_string(),
        resolution_bits: bits.parse().with_context(|| format!("lead line: format '{bits}'"))?,
        offset: offset.parse().with_context(|| format!("lead line: offset '{offset}'"))?,
        adc_gain: gain.parse().with_context(|| format!("lead line: gain '{gain}'"))?,
        adc_bits: f[3].parse().context("lead line: ADC bits")?,
        baseline: f[4].parse().context("lead line: baseline")?,
        first_value: f[5].parse().context("lead line: first value")?,
        checksum: f[6].parse().context("lead line: checksum")?,
        lead_name: f[8].to_string(),
    })
}

/// Value of a `#Tag: value` comment line (everything after the last `": "`).
fn comment_field<'a>(lines: &[&'a str], tag: &str) -> Result<&'a str> {
    let line = lines
        .iter()
        .find(|l| l.starts_with(tag))
        .with_context(|| format!("header has no {tag} line"))?;
    Ok(line.rsplit(": ").next().unwrap_or(""))
}

// ── Database handle ───────────────────────────────────────────────────────

pub struct Cpsc2018 {
    db_dir: PathBuf,
    records: Vec<String>,
}

impl Cpsc2018 {
    /// Open a database directory (flat layout, `*.mat` next to `*.hea`).
    pub fn open<P: AsRef<Path>>(db_dir: P) -> Result<Self> {
        let db_dir = db_dir.as_ref().to_path_buf();
        let mut records = Vec::new();
        let entries = std::fs::read_dir(&db_dir)
            .with_context(|| format!("listing {}", db_dir.display()))?;
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("mat") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    records.push(stem.to_string());
                }
            }
        }
        records.sort();
        debug!(
            "CPSC2018 at {}: {} records present",
            db_dir.display(),
            records.len()
        );
        Ok(Self { db_dir, records })
    }

    /// Record names present on disk (`AXXXX`), ascending.
    pub fn records(&self) -> &[String] {
        &self.records
    }

    /// Load the 12-lead signal of a record, shape `[12, n_samples]`.
    ///
    /// `rec_no` is 1-based, addressing `A{rec_no:04}.mat` directly.
    pub fn load_data(&self, rec_no: usize) -> Result<Array2<f64>> {
        let fp = self.db_dir.join(format!("{}.mat", self.rec_name(rec_no)?));
        let mat = MatFile::open(&fp)?;
        let val = mat
            .var("val")
            .with_context(|| format!("no 'val' variable in {}", fp.display()))?;
        Ok(val.to_owned())
    }

    /// Load and parse the `.hea` header of a record.
    pub fn load_ann(&self, rec_no: usize) -> Result<HeaderInfo> {
        let fp = self.db_dir.join(format!("{}.hea", self.rec_name(rec_no)?));
        let text = std::fs::read_to_string(&fp)
            .with_context(|| format!("reading {}", fp.display()))?;
        parse_header(&text).with_context(|| format!("parsing {}", fp.display()))
    }

    /// Diagnosis abbreviations of a record (the `#Dx` field).
    pub fn labels(&self, rec_no: usize) -> Result<Vec<String>> {
        Ok(self.load_ann(rec_no)?.diagnosis)
    }

    /// Patient ids are not part of the published database.
    pub fn patient_id(&self, rec_no: usize) -> Result<u64> {
        bail!("patient id of record {rec_no} is not available: CPSC2018 publishes no patient identifiers")
    }

    fn rec_name(&self, rec_no: usize) -> Result<String> {
        if rec_no == 0 || rec_no > N_RECORDS {
            bail!("record number {rec_no} out of range 1..={N_RECORDS}");
        }
        Ok(format!("A{rec_no:04}"))
    }
}
