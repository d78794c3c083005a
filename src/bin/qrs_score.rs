use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};

use qrseval::{qrs_accuracy_with, Cpsc2019, DEFAULT_TOLERANCE};

#[derive(Parser)]
#[command(name = "qrs_score", about = "Score QRS detections with the CPSC2019 challenge metric")]
struct Args {
    /// Predictions JSON: one array of sample indices per recording
    #[arg(long)]
    pred: PathBuf,

    /// Reference JSON in the same shape as --pred
    #[arg(long, conflicts_with = "db_dir")]
    truth: Option<PathBuf>,

    /// CPSC2019 database directory; references are loaded in record order
    #[arg(long)]
    db_dir: Option<PathBuf>,

    /// Sampling rate in Hz (default: 500)
    #[arg(long, default_value_t = 500.0)]
    fs: f64,

    /// Match window half-width in seconds (default: 0.075)
    #[arg(long, default_value_t = DEFAULT_TOLERANCE)]
    tolerance: f64,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let pred = load_peaks(&args.pred)?;
    let truth = match (&args.truth, &args.db_dir) {
        (Some(fp), None) => load_peaks(fp)?,
        (None, Some(dir)) => {
            let db = Cpsc2019::open(dir)?;
            println!(
                "Loaded {} reference records from {}",
                db.records().len(),
                dir.display()
            );
            db.load_all_rpeaks()?
        }
        _ => bail!("exactly one of --truth and --db-dir is required"),
    };

    let acc = qrs_accuracy_with(&truth, &pred, args.fs, args.tolerance)?;
    println!("QRS_acc: {acc}");
    println!("Scoring complete.");
    Ok(())
}

fn load_peaks(path: &Path) -> Result<Vec<Vec<u32>>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}
