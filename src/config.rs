use crate::fetch::TextEncoding;
use std::{env, path::PathBuf};

const DATA_REPO: &str = "https://raw.githubusercontent.com/peijhuuuuu/Changhua_hospital/main";
const DOCTOR_CSV: &str =
    "https://raw.githubusercontent.com/chenhao0506/gis_final/main/changhua_doctors_per_10000.csv";
const FONT_URL: &str = "https://github.com/google/fonts/raw/main/ofl/iansui/Iansui-Regular.ttf";

#[derive(Debug, Clone)]
pub struct TableSource {
    pub name: String,
    pub url: String,
    pub encodings: Vec<TextEncoding>,
}

impl TableSource {
    fn new(name: &str, url: String, encodings: &[TextEncoding]) -> Self {
        Self {
            name: name.to_string(),
            url,
            encodings: encodings.to_vec(),
        }
    }

    /// Stable descriptor used when fingerprinting a page's inputs.
    pub fn descriptor(&self) -> String {
        let encodings: Vec<&str> = self.encodings.iter().map(|e| e.label()).collect();
        format!("{}|{}|{}", self.name, self.url, encodings.join(","))
    }
}

#[derive(Debug, Clone)]
pub struct BoundarySource {
    pub url: String,
    pub key_property: String,
}

impl BoundarySource {
    pub fn descriptor(&self) -> String {
        format!("boundaries|{}|{}", self.url, self.key_property)
    }
}

#[derive(Debug, Clone)]
pub struct SourceSet {
    pub boundaries: BoundarySource,
    pub hospitals: TableSource,
    pub beds: TableSource,
    pub age_structure: TableSource,
    pub age_population: TableSource,
    pub doctors: TableSource,
}

#[derive(Debug, Clone)]
pub struct FontConfig {
    pub url: String,
    pub path: PathBuf,
    pub family: String,
}

#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub port: u16,
    pub sources: SourceSet,
    pub font: FontConfig,
}

impl DashboardConfig {
    pub fn from_env() -> Self {
        use TextEncoding::{Big5, Utf8};

        let port = env::var("PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(8080);

        let sources = SourceSet {
            boundaries: BoundarySource {
                url: env_or("DASHBOARD_BOUNDARY_URL", format!("{DATA_REPO}/changhua.geojson")),
                key_property: "townname".to_string(),
            },
            hospitals: TableSource::new(
                "hospitals",
                env_or("DASHBOARD_HOSPITAL_CSV_URL", format!("{DATA_REPO}/113hospital.csv")),
                &[Big5, Utf8],
            ),
            beds: TableSource::new(
                "beds",
                env_or("DASHBOARD_BED_CSV_URL", format!("{DATA_REPO}/changhua_bed.csv")),
                &[Utf8, Big5],
            ),
            age_structure: TableSource::new(
                "age_structure",
                env_or(
                    "DASHBOARD_AGE_STRUCTURE_CSV_URL",
                    format!("{DATA_REPO}/彰化縣現住人口之年齡結構.csv"),
                ),
                &[Big5, Utf8],
            ),
            age_population: TableSource::new(
                "age_population",
                env_or("DASHBOARD_AGE_CSV_URL", format!("{DATA_REPO}/age_population.csv")),
                &[Big5, Utf8],
            ),
            doctors: TableSource::new(
                "doctors",
                env_or("DASHBOARD_DOCTOR_CSV_URL", DOCTOR_CSV.to_string()),
                &[Utf8, Big5],
            ),
        };

        let font = FontConfig {
            url: env_or("DASHBOARD_FONT_URL", FONT_URL.to_string()),
            path: PathBuf::from(env_or(
                "DASHBOARD_FONT_PATH",
                "data/Iansui-Regular.ttf".to_string(),
            )),
            family: "Iansui".to_string(),
        };

        Self {
            port,
            sources,
            font,
        }
    }
}

fn env_or(key: &str, default: String) -> String {
    env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or(default)
}
