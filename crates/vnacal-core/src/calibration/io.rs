//! Calibration file reader and writer
//!
//! Text layout, one frequency per data row:
//!
//! ```text
//! ! free-form comment
//! # MHZ CAL12 RI
//! <freq> <e00 re> <e00 im> <e11 re> <e11 im> ... <ep23ep01 re> <ep23ep01 im>
//! ```
//!
//! Values are written with the shortest representation that parses back to
//! the same `f64`, so a write/read cycle reproduces the terms exactly.

use num_complex::Complex64;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Cursor, Write};
use std::path::Path;

use ndarray::Array1;

use crate::constants::NUM_ERROR_TERMS;
use crate::error::{Result, VnaError};
use crate::frequency::{Frequency, FrequencyUnit};

use super::terms::CalibrationTermSet;

const FORMAT_TOKEN: &str = "CAL12";
const COLUMNS: usize = 1 + 2 * NUM_ERROR_TERMS;

/// A calibration term set together with the comments of its file
#[derive(Debug, Clone)]
pub struct CalibrationFile {
    pub comments: Vec<String>,
    pub terms: CalibrationTermSet,
}

impl CalibrationFile {
    pub fn new(terms: CalibrationTermSet) -> Self {
        Self {
            comments: Vec::new(),
            terms,
        }
    }

    /// Read a calibration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::parse(BufReader::new(file))
    }

    /// Parse from string content
    pub fn from_str(content: &str) -> Result<Self> {
        Self::parse(Cursor::new(content))
    }

    fn parse<R: BufRead>(reader: R) -> Result<Self> {
        let mut comments = Vec::new();
        let mut unit: Option<FrequencyUnit> = None;
        let mut freqs = Vec::new();
        let mut columns: Vec<Vec<Complex64>> = vec![Vec::new(); NUM_ERROR_TERMS];

        for (idx, line_result) in reader.lines().enumerate() {
            let line_no = idx + 1;
            let line = line_result?;
            let trimmed = line.trim();

            if trimmed.is_empty() {
                continue;
            }

            if let Some(comment) = trimmed.strip_prefix('!') {
                comments.push(comment.trim().to_string());
                continue;
            }

            if trimmed.starts_with('#') {
                if unit.is_some() {
                    return Err(parse_error(line_no, "duplicate option line"));
                }
                unit = Some(Self::parse_option_line(trimmed, line_no)?);
                continue;
            }

            let scale = unit
                .ok_or_else(|| parse_error(line_no, "data before option line"))?
                .to_mhz();

            let values = trimmed
                .split_whitespace()
                .map(|v| v.parse::<f64>())
                .collect::<std::result::Result<Vec<f64>, _>>()
                .map_err(|e| parse_error(line_no, &format!("invalid number: {e}")))?;
            if values.len() != COLUMNS {
                return Err(parse_error(
                    line_no,
                    &format!("expected {} values, found {}", COLUMNS, values.len()),
                ));
            }

            freqs.push(values[0] * scale);
            for (k, pair) in values[1..].chunks_exact(2).enumerate() {
                columns[k].push(Complex64::new(pair[0], pair[1]));
            }
        }

        if unit.is_none() {
            return Err(parse_error(0, "missing option line"));
        }

        let mut vectors = columns.into_iter().map(Array1::from_vec);
        let vectors: [Array1<Complex64>; NUM_ERROR_TERMS] =
            std::array::from_fn(|_| vectors.next().unwrap_or_else(|| Array1::zeros(0)));
        let terms = CalibrationTermSet::from_vectors(Frequency::from_mhz(freqs), vectors)?;

        Ok(Self { comments, terms })
    }

    /// Parse the option line (# MHZ CAL12 RI)
    fn parse_option_line(line: &str, line_no: usize) -> Result<FrequencyUnit> {
        let mut freq_unit = FrequencyUnit::MHz;
        let mut seen_format = false;

        for part in line[1..].split_whitespace() {
            let part = part.to_uppercase();
            if let Some(u) = FrequencyUnit::from_str(&part) {
                freq_unit = u;
            } else if part == FORMAT_TOKEN {
                seen_format = true;
            } else if part != "RI" {
                return Err(parse_error(line_no, &format!("unsupported option '{part}'")));
            }
        }

        if !seen_format {
            return Err(parse_error(line_no, "not a CAL12 file"));
        }
        Ok(freq_unit)
    }

    /// Write to a calibration file
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Write to a writer
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        for comment in &self.comments {
            writeln!(writer, "! {}", comment)?;
        }
        writeln!(writer, "# {} {} RI", FrequencyUnit::MHz.as_token(), FORMAT_TOKEN)?;

        let vectors = self.terms.to_vectors();
        for (f, freq) in self.terms.frequency.f().iter().enumerate() {
            write!(writer, "{}", freq)?;
            for v in vectors.iter() {
                write!(writer, " {} {}", v[f].re, v[f].im)?;
            }
            writeln!(writer)?;
        }
        Ok(())
    }
}

impl fmt::Display for CalibrationFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = Vec::new();
        if self.write_to(&mut buf).is_err() {
            return Err(fmt::Error);
        }
        write!(f, "{}", String::from_utf8_lossy(&buf))
    }
}

fn parse_error(line: usize, message: &str) -> VnaError {
    VnaError::Parse {
        line,
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::terms::ErrorTerms;

    fn sample() -> CalibrationTermSet {
        let points: Vec<ErrorTerms> = (0..3)
            .map(|i| {
                let mut t = ErrorTerms::ideal();
                t.e00 = Complex64::new(0.1 / 3.0, -1e-17 * i as f64);
                t.ep23ep01 = Complex64::new(std::f64::consts::PI, 2.0f64.sqrt());
                t.e30 = Complex64::new(1.0e-300, -7.25e21);
                t
            })
            .collect();
        CalibrationTermSet::from_points(Frequency::from_mhz(vec![375.0, 1000.123456789, 6050.0]), &points)
            .unwrap()
    }

    #[test]
    fn test_write_then_read_is_exact() {
        let mut file = CalibrationFile::new(sample());
        file.comments.push("serial 401".into());

        let text = file.to_string();
        assert!(text.starts_with("! serial 401\n# MHZ CAL12 RI\n"));

        let back = CalibrationFile::from_str(&text).unwrap();
        assert_eq!(back.comments, vec!["serial 401".to_string()]);
        assert_eq!(back.terms, file.terms);
    }

    #[test]
    fn test_file_round_trip() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("unit.cal");
        CalibrationFile::new(sample()).write(&path)?;
        let back = CalibrationFile::from_file(&path)?;
        assert_eq!(back.terms, sample());
        Ok(())
    }

    #[test]
    fn test_ghz_unit_is_scaled() {
        let mut row = String::from("1.5");
        for _ in 0..NUM_ERROR_TERMS {
            row.push_str(" 0 0");
        }
        let text = format!("# GHZ CAL12 RI\n{row}\n");
        let cal = CalibrationFile::from_str(&text).unwrap();
        assert_eq!(cal.terms.frequency.f(), &[1500.0]);
    }

    #[test]
    fn test_short_row_is_rejected() {
        let text = "# MHZ CAL12 RI\n500 0 0 1 0\n";
        match CalibrationFile::from_str(text) {
            Err(VnaError::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_missing_option_line() {
        assert!(matches!(
            CalibrationFile::from_str("! nothing here\n"),
            Err(VnaError::Parse { .. })
        ));
        assert!(matches!(
            CalibrationFile::from_str("# MHZ S RI R 50\n"),
            Err(VnaError::Parse { .. })
        ));
    }
}
