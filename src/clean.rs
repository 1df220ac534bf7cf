use crate::errors::SourceError;
use crate::models::Table;
use tracing::{debug, warn};

pub const COUNTY_TOTALS: [&str; 3] = ["總計", "合計", "彰化縣"];

/// Coerces a published number to `f64`. Thousands separators are removed;
/// empty or unparseable cells become `0.0`.
pub fn parse_count(raw: &str) -> f64 {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    match cleaned.parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => 0.0,
    }
}

pub fn normalize_key(raw: &str) -> String {
    raw.trim().to_string()
}

/// Drops rows whose key is an aggregate rather than a township, so that
/// county totals never reach the aggregation step.
#[derive(Debug, Clone)]
pub struct AggregateFilter {
    sentinels: Vec<String>,
}

impl AggregateFilter {
    pub fn new(sentinels: &[&str]) -> Self {
        Self {
            sentinels: sentinels.iter().map(|s| normalize_key(s)).collect(),
        }
    }

    pub fn county_totals() -> Self {
        Self::new(&COUNTY_TOTALS)
    }

    pub fn with_header(mut self, header: &str) -> Self {
        self.sentinels.push(normalize_key(header));
        self
    }

    pub fn excludes(&self, key: &str) -> bool {
        self.sentinels.iter().any(|s| s == key)
    }
}

pub fn keyed_values(
    table: &Table,
    key_column: usize,
    value_columns: &[usize],
    filter: &AggregateFilter,
) -> Vec<(String, Vec<f64>)> {
    let mut dropped = 0usize;
    let rows: Vec<(String, Vec<f64>)> = table
        .rows
        .iter()
        .filter_map(|row| {
            let key = normalize_key(Table::cell(row, key_column));
            if key.is_empty() || filter.excludes(&key) {
                dropped += 1;
                return None;
            }
            let values = value_columns
                .iter()
                .map(|&col| parse_count(Table::cell(row, col)))
                .collect();
            Some((key, values))
        })
        .collect();
    if dropped > 0 {
        debug!("{}: dropped {dropped} aggregate or unnamed rows", table.name);
    }
    rows
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgeBucket {
    pub column: usize,
    pub header: String,
    pub lower_bound: u32,
}

#[derive(Debug, Clone)]
pub struct AgeSchema {
    pub buckets: Vec<AgeBucket>,
}

impl AgeSchema {
    /// Declares one bucket per header containing `marker`. Bucket headers
    /// start with their lower bound (`65歲(人數)`, `100歲以上`); a marked
    /// header without one is logged and left out.
    pub fn declare(table: &Table, marker: &str) -> Result<Self, SourceError> {
        let mut buckets = Vec::new();
        for (column, header) in table.headers.iter().enumerate() {
            if !header.contains(marker) {
                continue;
            }
            match lower_bound(header) {
                Some(lower_bound) => buckets.push(AgeBucket {
                    column,
                    header: header.clone(),
                    lower_bound,
                }),
                None => warn!("{}: `{header}` has no age bound", table.name),
            }
        }

        if buckets.is_empty() {
            return Err(SourceError::missing_column(
                &table.name,
                format!("age buckets marked `{marker}`"),
            ));
        }
        Ok(Self { buckets })
    }

    pub fn columns(&self) -> Vec<usize> {
        self.buckets.iter().map(|b| b.column).collect()
    }

    pub fn positions_from(&self, threshold: u32) -> Vec<usize> {
        self.buckets
            .iter()
            .enumerate()
            .filter(|(_, b)| b.lower_bound >= threshold)
            .map(|(i, _)| i)
            .collect()
    }
}

fn lower_bound(header: &str) -> Option<u32> {
    let digits: String = header
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(headers: &[&str], rows: &[&[&str]]) -> Table {
        Table {
            name: "test".to_string(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn parse_count_strips_thousands_separators() {
        assert_eq!(parse_count("1,234"), 1234.0);
        assert_eq!(parse_count(" 12,345,678 "), 12_345_678.0);
        assert_eq!(parse_count("3.5"), 3.5);
    }

    #[test]
    fn parse_count_treats_garbage_as_zero() {
        for raw in ["", "-", "n/a", "NaN", "inf", "１２"] {
            assert_eq!(parse_count(raw), 0.0, "input {raw:?}");
        }
    }

    #[test]
    fn aggregate_filter_drops_totals_and_repeated_headers() {
        let t = table(
            &["鄉鎮", "合計"],
            &[
                &[" 員林市 ", "1,200"],
                &["總計", "9,999"],
                &["鄉鎮", "合計"],
                &["", "5"],
                &["鹿港鎮", "x"],
            ],
        );
        let filter = AggregateFilter::county_totals().with_header("鄉鎮");
        let rows = keyed_values(&t, 0, &[1], &filter);
        assert_eq!(
            rows,
            vec![
                ("員林市".to_string(), vec![1200.0]),
                ("鹿港鎮".to_string(), vec![0.0]),
            ]
        );
    }

    #[test]
    fn short_rows_read_as_zero() {
        let t = table(&["區域", "總計"], &[&["員林市"]]);
        let rows = keyed_values(&t, 0, &[1], &AggregateFilter::county_totals());
        assert_eq!(rows[0].1, vec![0.0]);
    }

    #[test]
    fn age_schema_reads_lower_bounds() {
        let t = table(
            &["區域別", "性別", "0歲(人數)", "64歲(人數)", "65歲(人數)", "100歲以上(人數)", "備註"],
            &[],
        );
        let schema = AgeSchema::declare(&t, "(人數)").unwrap();
        assert_eq!(schema.columns(), vec![2, 3, 4, 5]);
        assert_eq!(schema.positions_from(65), vec![2, 3]);
        assert_eq!(schema.buckets[3].lower_bound, 100);
    }

    #[test]
    fn age_schema_skips_unbounded_headers() {
        let t = table(&["區域別", "總計歲數", "70歲"], &[]);
        let schema = AgeSchema::declare(&t, "歲").unwrap();
        assert_eq!(schema.columns(), vec![2]);
    }

    #[test]
    fn age_schema_requires_a_bucket() {
        let t = table(&["區域別", "人口"], &[]);
        assert!(matches!(
            AgeSchema::declare(&t, "歲"),
            Err(SourceError::MissingColumn { .. })
        ));
    }
}
