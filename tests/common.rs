/// Shared helpers for building synthetic CPSC databases on disk.
use qrseval::MatWriter;
use std::path::Path;
use tempfile::TempDir;

#[allow(unused)]
/// Write one CPSC2019 record pair: `data/data_XXXXX.mat` holding the signal
/// and `ref/R_XXXXX.mat` holding the reference R-peaks.
pub fn write_record(db: &Path, id: usize, ecg: &[f64], rpeaks: &[u16]) {
    let data_dir = db.join("data");
    let ref_dir = db.join("ref");
    std::fs::create_dir_all(&data_dir).unwrap();
    std::fs::create_dir_all(&ref_dir).unwrap();

    let mut w = MatWriter::new();
    w.add_f64("ecg", ecg, (ecg.len(), 1));
    w.write(&data_dir.join(format!("data_{id:05}.mat"))).unwrap();

    let mut w = MatWriter::new();
    w.add_u16("R_peak", rpeaks, (rpeaks.len(), 1));
    w.write(&ref_dir.join(format!("R_{id:05}.mat"))).unwrap();
}

#[allow(unused)]
/// A small synthetic CPSC2019 database: `n_records` recordings of 10 s at
/// 500 Hz with one beat per second (slightly shifted per record). Returns
/// the temp directory and the reference peaks of every record.
pub fn synth_db(n_records: usize) -> (TempDir, Vec<Vec<u32>>) {
    let dir = TempDir::new().unwrap();
    let mut truth = Vec::with_capacity(n_records);
    for id in 1..=n_records {
        let jitter = (id % 40) as u16;
        let peaks: Vec<u16> = (1..=9).map(|k| k * 500 + jitter).collect();
        let mut ecg = vec![0.05_f64; 5000];
        for &p in &peaks {
            ecg[p as usize] = 1.2;
        }
        write_record(dir.path(), id, &ecg, &peaks);
        truth.push(peaks.iter().map(|&p| u32::from(p)).collect());
    }
    (dir, truth)
}

#[allow(unused)]
/// Write one CPSC2018 record (`AXXXX.mat` signal + `AXXXX.hea` header) into
/// a flat directory.
pub fn write_cpsc2018_record(dir: &Path, rec_no: usize, n_samples: usize) {
    let name = format!("A{rec_no:04}");

    let val = ndarray::Array2::from_shape_fn((12, n_samples), |(l, t)| (l * 1000 + t) as f64);
    let mut w = MatWriter::new();
    w.add_f64_arr2("val", &val);
    w.write(&dir.join(format!("{name}.mat"))).unwrap();

    let mut hea = format!("{name} 12 500 {n_samples} 02-Dec-2018 10:31:00\n");
    for lead in qrseval::cpsc2018::ALL_LEADS {
        hea.push_str(&format!("{name}.mat 16+24 1000/mV 16 0 7 2048 0 {lead}\n"));
    }
    hea.push_str("#Age: 46\n#Sex: Male\n#Dx: AF,PVC\n#Rx: Unknown\n#Hx: Unknown\n#Sx: Unknown\n");
    std::fs::write(dir.join(format!("{name}.hea")), hea).unwrap();
}
