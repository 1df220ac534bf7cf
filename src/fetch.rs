use crate::clean::normalize_key;
use crate::config::{BoundarySource, TableSource};
use crate::errors::SourceError;
use crate::models::{AreaBoundary, Table};
use axum::http::StatusCode;
use csv::{ReaderBuilder, StringRecord};
use encoding_rs::{BIG5, Encoding, UTF_8};
use geo::{Geometry, MultiPolygon};
use geojson::GeoJson;
use reqwest::Client;
use tracing::debug;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    /// WHATWG Big5, which also covers the CP950 extensions used by
    /// Taiwanese government exports.
    Big5,
}

impl TextEncoding {
    pub fn label(self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Big5 => "big5",
        }
    }

    fn encoding(self) -> &'static Encoding {
        match self {
            TextEncoding::Utf8 => UTF_8,
            TextEncoding::Big5 => BIG5,
        }
    }
}

pub async fn fetch_bytes(client: &Client, url: &str) -> Result<Vec<u8>, SourceError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|source| SourceError::Fetch {
            url: url.to_string(),
            source,
        })?;

    let status = response.status();
    if status != StatusCode::OK {
        return Err(SourceError::Status {
            url: url.to_string(),
            status,
        });
    }

    let body = response.bytes().await.map_err(|source| SourceError::Fetch {
        url: url.to_string(),
        source,
    })?;
    Ok(body.to_vec())
}

/// Tries each candidate in order with a strict decoder; the first clean decode
/// wins.
pub fn decode_text(
    name: &str,
    bytes: &[u8],
    encodings: &[TextEncoding],
) -> Result<(String, TextEncoding), SourceError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    for &candidate in encodings {
        if let Some(text) = candidate
            .encoding()
            .decode_without_bom_handling_and_without_replacement(bytes)
        {
            return Ok((text.into_owned(), candidate));
        }
        debug!("{name}: not valid {}", candidate.label());
    }

    let tried: Vec<&str> = encodings.iter().map(|e| e.label()).collect();
    Err(SourceError::Decode {
        name: name.to_string(),
        tried: tried.join(", "),
    })
}

/// Parses CSV text whose first non-empty record is the header row.
///
/// Some exports wrap a whole record in one quoted field (`"a,b,c"`); such
/// records are split again so every row has its real columns.
pub fn parse_table(name: &str, text: &str) -> Result<Table, SourceError> {
    let csv_err = |source: csv::Error| SourceError::Csv {
        name: name.to_string(),
        source,
    };

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut records = Vec::new();
    for result in reader.records() {
        let record = unpack_record(result.map_err(csv_err)?).map_err(csv_err)?;
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        records.push(record.iter().map(str::to_string).collect::<Vec<_>>());
    }

    let mut records = records.into_iter();
    let headers = records
        .next()
        .map(|row| row.iter().map(|h| h.trim().to_string()).collect())
        .unwrap_or_default();

    Ok(Table {
        name: name.to_string(),
        headers,
        rows: records.collect(),
    })
}

fn unpack_record(record: StringRecord) -> Result<StringRecord, csv::Error> {
    if record.len() != 1 || !record[0].contains(',') {
        return Ok(record);
    }

    let line = record[0].to_string();
    let mut inner = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());
    match inner.records().next() {
        Some(unpacked) => unpacked,
        None => Ok(record),
    }
}

pub async fn load_table(client: &Client, source: &TableSource) -> Result<Table, SourceError> {
    let bytes = fetch_bytes(client, &source.url).await?;
    let (text, encoding) = decode_text(&source.name, &bytes, &source.encodings)?;
    debug!("{} decoded as {}", source.name, encoding.label());
    let table = parse_table(&source.name, &text)?;
    debug!(
        "{}: {} columns, {} rows",
        source.name,
        table.headers.len(),
        table.rows.len()
    );
    Ok(table)
}

pub fn parse_boundaries(text: &str, key_property: &str) -> Result<Vec<AreaBoundary>, SourceError> {
    let geojson: GeoJson = text
        .parse()
        .map_err(|err: geojson::Error| SourceError::GeoJson(err.to_string()))?;

    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        _ => return Err(SourceError::GeoJson("expected a FeatureCollection".to_string())),
    };

    let mut boundaries = Vec::new();
    for feature in collection.features {
        let name = match feature
            .properties
            .as_ref()
            .and_then(|props| props.get(key_property))
        {
            Some(serde_json::Value::String(s)) => normalize_key(s),
            _ => continue,
        };

        let Some(geometry) = feature.geometry else {
            continue;
        };
        let converted: Result<Geometry<f64>, _> = geometry.value.try_into();
        let geometry = match converted {
            Ok(Geometry::MultiPolygon(mp)) => mp,
            Ok(Geometry::Polygon(p)) => MultiPolygon::new(vec![p]),
            Ok(_) => continue,
            Err(err) => {
                debug!("skipping feature {name}: {err}");
                continue;
            }
        };

        boundaries.push(AreaBoundary { name, geometry });
    }

    if boundaries.is_empty() {
        return Err(SourceError::GeoJson(format!(
            "no polygon features carry a `{key_property}` name"
        )));
    }
    Ok(boundaries)
}

pub async fn load_boundaries(
    client: &Client,
    source: &BoundarySource,
) -> Result<Vec<AreaBoundary>, SourceError> {
    let bytes = fetch_bytes(client, &source.url).await?;
    let (text, _) = decode_text("boundaries", &bytes, &[TextEncoding::Utf8])?;
    parse_boundaries(&text, &source.key_property)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_falls_back_to_big5() {
        let (bytes, _, _) = BIG5.encode("鄉鎮,合計\n員林市,120\n");
        let (text, used) =
            decode_text("hospitals", &bytes, &[TextEncoding::Utf8, TextEncoding::Big5])
                .expect("big5 decode");
        assert_eq!(used, TextEncoding::Big5);
        assert!(text.starts_with("鄉鎮,合計"));
    }

    #[test]
    fn decode_prefers_first_candidate_and_strips_bom() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice("地區,一般病床\n".as_bytes());
        let (text, used) =
            decode_text("beds", &bytes, &[TextEncoding::Utf8, TextEncoding::Big5]).unwrap();
        assert_eq!(used, TextEncoding::Utf8);
        assert_eq!(text, "地區,一般病床\n");
    }

    #[test]
    fn decode_reports_every_candidate_on_failure() {
        let err = decode_text("doctors", &[0xff, 0xfe, 0x80], &[TextEncoding::Utf8]).unwrap_err();
        match err {
            SourceError::Decode { name, tried } => {
                assert_eq!(name, "doctors");
                assert_eq!(tried, "utf-8");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn parse_table_splits_packed_rows() {
        let text = "\"鄉鎮,合計,醫院數,診所數\"\n\"員林市,120,5,115\"\n\n\"鹿港鎮,60,2,58\"\n";
        let table = parse_table("hospitals", text).unwrap();
        assert_eq!(table.headers, vec!["鄉鎮", "合計", "醫院數", "診所數"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1], vec!["鹿港鎮", "60", "2", "58"]);
    }

    #[test]
    fn parse_table_keeps_quoted_thousands() {
        let text = " 區域別 ,65歲(人數)\n員林市,\"1,234\"\n";
        let table = parse_table("age", text).unwrap();
        assert_eq!(table.headers, vec!["區域別", "65歲(人數)"]);
        assert_eq!(table.rows[0][1], "1,234");
    }

    #[test]
    fn boundaries_keep_polygons_with_names() {
        let text = r#"{
          "type": "FeatureCollection",
          "features": [
            {"type": "Feature", "properties": {"townname": " 員林市 "},
             "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,1],[0,0]]]}},
            {"type": "Feature", "properties": {"townname": "鹿港鎮"},
             "geometry": {"type": "Point", "coordinates": [0,0]}},
            {"type": "Feature", "properties": {"other": "x"},
             "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,0]]]}}
          ]
        }"#;
        let boundaries = parse_boundaries(text, "townname").unwrap();
        assert_eq!(boundaries.len(), 1);
        assert_eq!(boundaries[0].name, "員林市");
        assert_eq!(boundaries[0].geometry.0.len(), 1);
    }

    #[test]
    fn boundaries_reject_bare_geometry() {
        let text = r#"{"type": "Point", "coordinates": [0, 0]}"#;
        assert!(matches!(
            parse_boundaries(text, "townname"),
            Err(SourceError::GeoJson(_))
        ));
    }
}
