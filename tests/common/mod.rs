//! Synthetic data files shared by the integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

/// One data line: id, year, `TAVG`, then twelve 8-column monthly groups.
pub fn data_line(stnid: u64, year: u32, values: [i32; 12]) -> String {
    let mut line = format!("{:011}{:04}TAVG", stnid, year);
    for v in values {
        line.push_str(&format!("{:5}  1", v));
    }
    line
}

/// One catalog line for a station at a fixed position.
pub fn catalog_line(stnid: u64, name: &str) -> String {
    format!(
        "{:011}  36.9300    6.9500    7.0 {:<30}   18U  107HIxxCO 1x-9WARM CROPS      C",
        stnid, name
    )
}

/// Monthly values for a year, distinct per year.
pub fn year_values(year: u32) -> [i32; 12] {
    let mut values = [0; 12];
    for (m, v) in values.iter_mut().enumerate() {
        *v = (year as i32 % 100) * 100 + m as i32;
    }
    values
}

/// Write `<dir>/ghcnm.dat` and `<dir>/ghcnm.inv`. Data lines follow the
/// order of `rows`; returns the data path.
pub fn write_station_archive(dir: &Path, stations: &[(u64, &str)], rows: &[(u64, u32)]) -> PathBuf {
    let data = dir.join("ghcnm.dat");
    let catalog = dir.join("ghcnm.inv");
    let mut text = String::new();
    for (id, year) in rows {
        text.push_str(&data_line(*id, *year, year_values(*year)));
        text.push('\n');
    }
    fs::write(&data, text).unwrap();
    let mut text = String::new();
    for (id, name) in stations {
        text.push_str(&catalog_line(*id, name));
        text.push('\n');
    }
    fs::write(&catalog, text).unwrap();
    data
}

/// Archive with three stations, grouped by station.
pub fn sample_archive(dir: &Path) -> PathBuf {
    write_station_archive(
        dir,
        &[
            (10160355000, "SKIKDA"),
            (10160360000, "ANNABA"),
            (10160390001, "DAR-EL-BEIDA"),
        ],
        &[
            (10160355000, 1961),
            (10160355000, 1962),
            (10160360000, 1961),
            (10160360000, 1962),
            (10160360000, 1963),
            (10160390001, 1970),
        ],
    )
}

/// A lightning strike as stored on disk.
#[derive(Debug, Clone, Copy)]
pub struct Strike {
    pub tsec: i32,
    pub lat: i32,
    pub lon: i32,
    pub sgnl: i16,
    pub mult: i8,
}

impl Strike {
    pub fn new(tsec: i32, lat: i32, lon: i32) -> Self {
        Self {
            tsec,
            lat,
            lon,
            sgnl: -150,
            mult: 1,
        }
    }

    fn to_bytes(self) -> [u8; 28] {
        let mut b = [0u8; 28];
        b[0..4].copy_from_slice(&self.tsec.to_be_bytes());
        b[4..8].copy_from_slice(&500i32.to_be_bytes());
        b[8..12].copy_from_slice(&self.lat.to_be_bytes());
        b[12..16].copy_from_slice(&self.lon.to_be_bytes());
        b[18..20].copy_from_slice(&self.sgnl.to_be_bytes());
        b[22] = self.mult as u8;
        b[27] = 9;
        b
    }
}

/// Serialize blocks of strikes with 84 byte `NLDN` headers.
pub fn lightning_bytes(blocks: &[Vec<Strike>]) -> Vec<u8> {
    let mut out = Vec::new();
    for block in blocks {
        let mut header = [0u8; 84];
        header[..4].copy_from_slice(b"NLDN");
        header[8..12].copy_from_slice(&(block.len() as u32).to_be_bytes());
        out.extend_from_slice(&header);
        for strike in block {
            out.extend_from_slice(&strike.to_bytes());
        }
    }
    out
}

/// Write a lightning file to `<dir>/strikes.nldn`.
pub fn write_lightning(dir: &Path, blocks: &[Vec<Strike>]) -> PathBuf {
    let path = dir.join("strikes.nldn");
    fs::write(&path, lightning_bytes(blocks)).unwrap();
    path
}
