//! MAT-file (Level 5) I/O for CPSC recordings.
//!
//! Reads the subset of the format the CPSC databases actually use:
//! uncompressed little-endian files holding named 2-D numeric matrices.
//! On-disk layout:
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │ 128-byte header: 116 B text │ 8 B subsys │ version │ "IM"  │
//! ├────────────────────────────────────────────────────────────┤
//! │ element tag: type u32 │ size u32                           │  ← 8 bytes
//! │ <size bytes of payload, padded to an 8-byte boundary>      │
//! ├────────────────────────────────────────────────────────────┤
//! │ …more elements…                                            │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! A payload of ≤ 4 bytes may be packed into the tag itself (the small
//! data element format: byte count in the upper half of the type word,
//! data in the tag's last 4 bytes). Matrices are `miMATRIX` elements whose
//! payload is a sequence of sub-elements: array flags, dimensions, name,
//! then the real data in column-major order.
//!
//! Rejected with a descriptive error: big-endian files, `miCOMPRESSED`
//! elements (re-save with compression off), complex values, and any class
//! that is not a plain numeric matrix.
use anyhow::{bail, Context, Result};
use ndarray::{Array2, ShapeBuilder};
use std::path::Path;

// ── Format constants ──────────────────────────────────────────────────────

const MI_INT8: u32 = 1;
const MI_UINT8: u32 = 2;
const MI_INT16: u32 = 3;
const MI_UINT16: u32 = 4;
const MI_INT32: u32 = 5;
const MI_UINT32: u32 = 6;
const MI_SINGLE: u32 = 7;
const MI_DOUBLE: u32 = 9;
const MI_MATRIX: u32 = 14;
const MI_COMPRESSED: u32 = 15;

const MX_DOUBLE_CLASS: u8 = 6;
const MX_UINT16_CLASS: u8 = 11;
const MX_UINT32_CLASS: u8 = 13;

/// Complex bit in the array-flags word (class lives in the low byte).
const FLAG_COMPLEX: u32 = 0x0800;

const HEADER_LEN: usize = 128;
const MAT5_VERSION: u16 = 0x0100;

fn class_name(class: u8) -> &'static str {
    match class {
        1 => "cell",
        2 => "struct",
        3 => "object",
        4 => "char",
        5 => "sparse",
        6..=13 => "numeric",
        14 | 15 => "64-bit integer",
        _ => "unknown",
    }
}

// ── Reader ────────────────────────────────────────────────────────────────

/// A parsed MAT-file: named 2-D matrices, widened to `f64`, in file order.
#[derive(Debug)]
pub struct MatFile {
    vars: Vec<(String, Array2<f64>)>,
}

impl MatFile {
    /// Read and parse a whole MAT-file (CPSC recordings are tens of
    /// kilobytes, so the file is loaded in one go).
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .with_context(|| format!("reading MAT-file {}", path.display()))?;
        Self::parse(&bytes).with_context(|| format!("parsing MAT-file {}", path.display()))
    }

    fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            bail!("file too small for a Level 5 header: {} bytes", bytes.len());
        }
        if bytes[0] == 0 {
            bail!("Level 4 MAT-file (header text starts with a zero byte) is not supported");
        }
        match &bytes[126..128] {
            b"IM" => {}
            b"MI" => bail!("big-endian MAT-file is not supported"),
            other => bail!("bad endian indicator {other:?}; not a Level 5 MAT-file"),
        }
        let version = u16::from_le_bytes([bytes[124], bytes[125]]);
        if version != MAT5_VERSION {
            bail!("unsupported MAT-file version {version:#06x}");
        }

        let mut vars = Vec::new();
        let mut pos = HEADER_LEN;
        while pos + 8 <= bytes.len() {
            let (dtype, payload, next) = read_element(bytes, pos)?;
            match dtype {
                MI_MATRIX => vars.push(parse_matrix(payload)?),
                MI_COMPRESSED => {
                    bail!("compressed element @ {pos:#x}; re-save the file uncompressed")
                }
                other => bail!("unexpected top-level element type {other} @ {pos:#x}"),
            }
            pos = next;
        }
        Ok(MatFile { vars })
    }

    /// Look up a variable by name.
    pub fn var(&self, name: &str) -> Option<&Array2<f64>> {
        self.vars
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, arr)| arr)
    }

    /// Variable names in file order.
    pub fn var_names(&self) -> impl Iterator<Item = &str> {
        self.vars.iter().map(|(n, _)| n.as_str())
    }
}

/// Decode the 8-byte element tag at `pos` (or its small-element form) and
/// return `(type, payload, next element position)`.
fn read_element(bytes: &[u8], pos: usize) -> Result<(u32, &[u8], usize)> {
    if pos + 8 > bytes.len() {
        bail!("truncated element tag @ {pos:#x}");
    }
    let word = u32::from_le_bytes(bytes[pos..pos + 4].try_into().unwrap());
    if word >> 16 != 0 {
        // Small data element: byte count lives in the upper half of the
        // type word and the payload in the tag's remaining 4 bytes.
        let n = (word >> 16) as usize;
        if n > 4 {
            bail!("small element @ {pos:#x} claims {n} bytes");
        }
        return Ok((word & 0xFFFF, &bytes[pos + 4..pos + 4 + n], pos + 8));
    }
    let n = u32::from_le_bytes(bytes[pos + 4..pos + 8].try_into().unwrap()) as usize;
    let start = pos + 8;
    if start + n > bytes.len() {
        bail!("element @ {pos:#x} runs past end of data ({n} payload bytes)");
    }
    let pad = (8 - n % 8) % 8;
    Ok((word, &bytes[start..start + n], start + n + pad))
}

/// Parse one `miMATRIX` payload into `(name, matrix)`.
fn parse_matrix(data: &[u8]) -> Result<(String, Array2<f64>)> {
    // Array flags: class in the low byte, complex/global/logical above it.
    let (dtype, flags, pos) = read_element(data, 0)?;
    if dtype != MI_UINT32 || flags.len() != 8 {
        bail!("malformed array-flags sub-element");
    }
    let flag_word = u32::from_le_bytes(flags[0..4].try_into().unwrap());
    let class = (flag_word & 0xFF) as u8;
    if !(MX_DOUBLE_CLASS..=MX_UINT32_CLASS).contains(&class) {
        bail!("{} array is not supported (class {class})", class_name(class));
    }
    if flag_word & FLAG_COMPLEX != 0 {
        bail!("complex matrix is not supported");
    }

    let (dtype, dims_raw, pos) = read_element(data, pos)?;
    if dtype != MI_INT32 {
        bail!("expected miINT32 dimensions, got type {dtype}");
    }
    let dims: Vec<usize> = dims_raw
        .chunks_exact(4)
        .map(|b| i32::from_le_bytes(b.try_into().unwrap()) as usize)
        .collect();
    if dims.len() != 2 {
        bail!("only 2-D matrices are supported, got {}-D", dims.len());
    }

    let (dtype, name_raw, pos) = read_element(data, pos)?;
    if dtype != MI_INT8 {
        bail!("expected miINT8 array name, got type {dtype}");
    }
    // Names are ASCII; decode byte-by-byte.
    let name: String = name_raw.iter().map(|&b| b as char).collect();

    let (dtype, real, _pos) = read_element(data, pos)?;
    let values = decode_numeric(dtype, real)
        .with_context(|| format!("decoding data of '{name}'"))?;
    let (rows, cols) = (dims[0], dims[1]);
    if values.len() != rows * cols {
        bail!("'{name}': {} values for a {rows}x{cols} matrix", values.len());
    }
    // MAT data is column-major.
    let arr = Array2::from_shape_vec((rows, cols).f(), values)?;
    Ok((name, arr))
}

/// Widen a numeric payload to `f64`.
fn decode_numeric(dtype: u32, raw: &[u8]) -> Result<Vec<f64>> {
    let vals = match dtype {
        MI_INT8 => raw.iter().map(|&b| f64::from(b as i8)).collect(),
        MI_UINT8 => raw.iter().map(|&b| f64::from(b)).collect(),
        MI_INT16 => raw
            .chunks_exact(2)
            .map(|b| f64::from(i16::from_le_bytes(b.try_into().unwrap())))
            .collect(),
        MI_UINT16 => raw
            .chunks_exact(2)
            .map(|b| f64::from(u16::from_le_bytes(b.try_into().unwrap())))
            .collect(),
        MI_INT32 => raw
            .chunks_exact(4)
            .map(|b| f64::from(i32::from_le_bytes(b.try_into().unwrap())))
            .collect(),
        MI_UINT32 => raw
            .chunks_exact(4)
            .map(|b| f64::from(u32::from_le_bytes(b.try_into().unwrap())))
            .collect(),
        MI_SINGLE => raw
            .chunks_exact(4)
            .map(|b| f64::from(f32::from_le_bytes(b.try_into().unwrap())))
            .collect(),
        MI_DOUBLE => raw
            .chunks_exact(8)
            .map(|b| f64::from_le_bytes(b.try_into().unwrap()))
            .collect(),
        other => bail!("unsupported numeric storage type {other}"),
    };
    Ok(vals)
}

// ── Writer ────────────────────────────────────────────────────────────────

/// Minimal MAT 5 writer (uncompressed, little-endian). Used to build
/// synthetic CPSC databases in tests.
///
/// Usage:
/// ```rust,no_run
/// use qrseval::mat::MatWriter;
/// use std::path::Path;
/// let mut w = MatWriter::new();
/// w.add_f64("ecg", &[0.1, 0.4, 0.1], (3, 1));
/// w.add_u16("R_peak", &[1], (1, 1));
/// w.write(Path::new("/tmp/data_00001.mat")).unwrap();
/// ```
pub struct MatWriter {
    entries: Vec<(String, Vec<u8>, u32, u8, (usize, usize))>,
}

impl MatWriter {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Add an f64 matrix; `data` is in column-major (MAT) order.
    pub fn add_f64(&mut self, name: &str, data: &[f64], shape: (usize, usize)) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries
            .push((name.to_string(), bytes, MI_DOUBLE, MX_DOUBLE_CLASS, shape));
    }

    pub fn add_f64_arr2(&mut self, name: &str, arr: &Array2<f64>) {
        // Transposed iteration yields the column-major order of `arr`.
        let data: Vec<f64> = arr.t().iter().copied().collect();
        self.add_f64(name, &data, (arr.nrows(), arr.ncols()));
    }

    /// Add a u16 matrix; `data` is in column-major (MAT) order.
    pub fn add_u16(&mut self, name: &str, data: &[u16], shape: (usize, usize)) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries
            .push((name.to_string(), bytes, MI_UINT16, MX_UINT16_CLASS, shape));
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.render())
            .with_context(|| format!("writing MAT-file {}", path.display()))?;
        Ok(())
    }

    fn render(&self) -> Vec<u8> {
        let mut out = Vec::new();

        let mut header = [b' '; HEADER_LEN];
        let desc = b"MATLAB 5.0 MAT-file, written by qrseval";
        header[..desc.len()].copy_from_slice(desc);
        header[116..124].fill(0);
        header[124..126].copy_from_slice(&MAT5_VERSION.to_le_bytes());
        header[126] = b'I';
        header[127] = b'M';
        out.extend_from_slice(&header);

        for (name, data, storage, class, (rows, cols)) in &self.entries {
            let mut body = Vec::new();

            let mut flags = [0u8; 8];
            flags[0..4].copy_from_slice(&u32::from(*class).to_le_bytes());
            push_element(&mut body, MI_UINT32, &flags);

            let mut dims = Vec::with_capacity(8);
            dims.extend_from_slice(&(*rows as i32).to_le_bytes());
            dims.extend_from_slice(&(*cols as i32).to_le_bytes());
            push_element(&mut body, MI_INT32, &dims);

            push_element(&mut body, MI_INT8, name.as_bytes());
            push_element(&mut body, *storage, data);

            // Sub-elements are already padded, so no outer padding needed.
            out.extend_from_slice(&MI_MATRIX.to_le_bytes());
            out.extend_from_slice(&(body.len() as u32).to_le_bytes());
            out.extend_from_slice(&body);
        }
        out
    }
}

/// Append one element: 8-byte tag, payload, zero padding to 8 bytes.
fn push_element(buf: &mut Vec<u8>, dtype: u32, payload: &[u8]) {
    buf.extend_from_slice(&dtype.to_le_bytes());
    buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buf.extend_from_slice(payload);
    let pad = (8 - payload.len() % 8) % 8;
    buf.extend(std::iter::repeat(0u8).take(pad));
}
