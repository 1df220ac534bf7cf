use crate::errors::SourceError;
use crate::stats::QuantileScheme;
use chrono::{DateTime, Local};
use geo::MultiPolygon;

#[derive(Debug, Clone)]
pub struct AreaBoundary {
    pub name: String,
    pub geometry: MultiPolygon<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct Table {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn column(&self, header: &str) -> Result<usize, SourceError> {
        self.headers
            .iter()
            .position(|h| h == header)
            .ok_or_else(|| SourceError::missing_column(&self.name, header))
    }

    /// Short rows read as empty cells.
    pub fn cell(row: &[String], column: usize) -> &str {
        row.get(column).map(String::as_str).unwrap_or("")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HospitalStat {
    pub total: f64,
    pub hospitals: f64,
    pub clinics: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BedStat {
    pub general: f64,
    pub special: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ElderlyStat {
    pub total: f64,
    pub elderly: f64,
    pub ratio: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BivariateStat {
    pub elderly: f64,
    pub doctors_per_10k: f64,
    pub elderly_tertile: u8,
    pub doctor_tertile: u8,
    pub class: String,
}

#[derive(Debug, Clone)]
pub struct JoinedArea<T> {
    pub name: String,
    pub geometry: MultiPolygon<f64>,
    pub attrs: T,
}

#[derive(Debug, Clone)]
pub struct SupplyPage {
    pub hospitals: Vec<JoinedArea<HospitalStat>>,
    pub beds: Vec<JoinedArea<BedStat>>,
    pub hospital_chart: String,
    pub bed_chart: String,
    pub prepared_at: DateTime<Local>,
}

#[derive(Debug, Clone)]
pub struct DemandPage {
    pub areas: Vec<JoinedArea<ElderlyStat>>,
    pub scheme: QuantileScheme,
    pub chart: String,
    pub prepared_at: DateTime<Local>,
}

#[derive(Debug, Clone)]
pub struct MixPage {
    pub areas: Vec<JoinedArea<BivariateStat>>,
    pub chart: String,
    pub prepared_at: DateTime<Local>,
}
