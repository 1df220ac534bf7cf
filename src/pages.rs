use crate::cache::Fingerprint;
use crate::clean::{AgeSchema, AggregateFilter, keyed_values};
use crate::config::SourceSet;
use crate::errors::SourceError;
use crate::fetch::{load_boundaries, load_table};
use crate::join::{inner_join, inner_join_maps};
use crate::models::{
    BedStat, BivariateStat, DemandPage, ElderlyStat, HospitalStat, JoinedArea, MixPage, SupplyPage,
    Table,
};
use crate::render::{RenderConfig, bivariate_map, choropleth, donut_glyphs, proportional_symbols};
use crate::stats::{bivariate_class, group_sum, quantile_scheme, ratio_percent, tertile_ranks};
use chrono::Local;
use reqwest::Client;
use std::collections::BTreeMap;
use tracing::info;

pub const ELDERLY_AGE: u32 = 65;
const CHOROPLETH_CLASSES: usize = 5;

pub fn supply_fingerprint(sources: &SourceSet) -> Fingerprint {
    Fingerprint::of([
        sources.boundaries.descriptor(),
        sources.hospitals.descriptor(),
        sources.beds.descriptor(),
    ])
}

pub fn demand_fingerprint(sources: &SourceSet) -> Fingerprint {
    Fingerprint::of([
        sources.boundaries.descriptor(),
        sources.age_structure.descriptor(),
    ])
}

pub fn mix_fingerprint(sources: &SourceSet) -> Fingerprint {
    Fingerprint::of([
        sources.boundaries.descriptor(),
        sources.age_population.descriptor(),
        sources.doctors.descriptor(),
    ])
}

pub fn hospital_stats(table: &Table) -> Result<BTreeMap<String, HospitalStat>, SourceError> {
    let key = table.column("鄉鎮")?;
    let columns = [
        table.column("合計")?,
        table.column("醫院數")?,
        table.column("診所數")?,
    ];
    let filter = AggregateFilter::county_totals().with_header("鄉鎮");

    Ok(group_sum(keyed_values(table, key, &columns, &filter))
        .into_iter()
        .map(|(name, v)| {
            let stat = HospitalStat {
                total: v[0],
                hospitals: v[1],
                clinics: v[2],
            };
            (name, stat)
        })
        .collect())
}

pub fn bed_stats(table: &Table) -> Result<BTreeMap<String, BedStat>, SourceError> {
    let key = table.column("地區")?;
    let columns = [table.column("一般病床")?, table.column("特殊病床")?];
    let filter = AggregateFilter::county_totals().with_header("地區");

    Ok(group_sum(keyed_values(table, key, &columns, &filter))
        .into_iter()
        .map(|(name, v)| {
            let stat = BedStat {
                general: v[0],
                special: v[1],
            };
            (name, stat)
        })
        .collect())
}

/// Population totals and the 65+ share per township, summed over the
/// per-sex rows of the age-structure table.
pub fn elderly_stats(
    table: &Table,
    key_header: &str,
    bucket_marker: &str,
) -> Result<BTreeMap<String, ElderlyStat>, SourceError> {
    let key = table.column(key_header)?;
    let per_area = elderly_totals(table, key, key_header, bucket_marker)?;

    Ok(per_area
        .into_iter()
        .map(|(name, v)| {
            let (total, elderly) = (v[0], v[1]);
            let stat = ElderlyStat {
                total,
                elderly,
                ratio: ratio_percent(elderly, total),
            };
            (name, stat)
        })
        .collect())
}

fn elderly_totals(
    table: &Table,
    key: usize,
    key_header: &str,
    bucket_marker: &str,
) -> Result<BTreeMap<String, Vec<f64>>, SourceError> {
    let schema = AgeSchema::declare(table, bucket_marker)?;
    let elderly_positions = schema.positions_from(ELDERLY_AGE);
    let filter = AggregateFilter::county_totals().with_header(key_header);

    let rows = keyed_values(table, key, &schema.columns(), &filter)
        .into_iter()
        .map(|(name, buckets)| {
            let total: f64 = buckets.iter().sum();
            let elderly: f64 = elderly_positions.iter().map(|&i| buckets[i]).sum();
            (name, vec![total, elderly])
        });
    Ok(group_sum(rows))
}

/// 65+ population per area from a table whose first column is the area name.
pub fn elderly_population(
    table: &Table,
    bucket_marker: &str,
) -> Result<BTreeMap<String, f64>, SourceError> {
    let key_header = table
        .headers
        .first()
        .cloned()
        .ok_or_else(|| SourceError::missing_column(&table.name, "area name"))?;
    let per_area = elderly_totals(table, 0, &key_header, bucket_marker)?;
    Ok(per_area.into_iter().map(|(name, v)| (name, v[1])).collect())
}

pub fn doctor_density(table: &Table) -> Result<BTreeMap<String, f64>, SourceError> {
    let key = table.column("區域")?;
    let value = table.column("總計")?;
    let filter = AggregateFilter::county_totals().with_header("區域");

    Ok(group_sum(keyed_values(table, key, &[value], &filter))
        .into_iter()
        .map(|(name, v)| (name, v[0]))
        .collect())
}

/// Tertile-ranks both variables across the joined areas and assigns the
/// two-digit bivariate class.
pub fn classify_bivariate(areas: Vec<JoinedArea<(f64, f64)>>) -> Vec<JoinedArea<BivariateStat>> {
    let elderly: Vec<f64> = areas.iter().map(|a| a.attrs.0).collect();
    let doctors: Vec<f64> = areas.iter().map(|a| a.attrs.1).collect();
    let elderly_bins = tertile_ranks(&elderly);
    let doctor_bins = tertile_ranks(&doctors);

    areas
        .into_iter()
        .enumerate()
        .map(|(i, area)| JoinedArea {
            name: area.name,
            geometry: area.geometry,
            attrs: BivariateStat {
                elderly: area.attrs.0,
                doctors_per_10k: area.attrs.1,
                elderly_tertile: elderly_bins[i],
                doctor_tertile: doctor_bins[i],
                class: bivariate_class(elderly_bins[i], doctor_bins[i]),
            },
        })
        .collect()
}

pub async fn prepare_supply(
    client: &Client,
    sources: &SourceSet,
    render: &RenderConfig,
) -> Result<SupplyPage, SourceError> {
    info!("preparing supply page");
    let boundaries = load_boundaries(client, &sources.boundaries).await?;
    let hospitals = hospital_stats(&load_table(client, &sources.hospitals).await?)?;
    let beds = bed_stats(&load_table(client, &sources.beds).await?)?;

    let hospitals = inner_join(&boundaries, &hospitals, &sources.hospitals.name)?;
    let beds = inner_join(&boundaries, &beds, &sources.beds.name)?;
    let hospital_chart = proportional_symbols(render, &hospitals)?;
    let bed_chart = donut_glyphs(render, &beds)?;
    info!(
        "supply page ready: {} hospital areas, {} bed areas",
        hospitals.len(),
        beds.len()
    );

    Ok(SupplyPage {
        hospitals,
        beds,
        hospital_chart,
        bed_chart,
        prepared_at: Local::now(),
    })
}

pub async fn prepare_demand(
    client: &Client,
    sources: &SourceSet,
    render: &RenderConfig,
) -> Result<DemandPage, SourceError> {
    info!("preparing demand page");
    let boundaries = load_boundaries(client, &sources.boundaries).await?;
    let table = load_table(client, &sources.age_structure).await?;
    let stats = elderly_stats(&table, "區域別", "(人數)")?;

    let areas = inner_join(&boundaries, &stats, &sources.age_structure.name)?;
    let ratios: Vec<f64> = areas.iter().map(|a| a.attrs.ratio).collect();
    let scheme = quantile_scheme(&ratios, CHOROPLETH_CLASSES);
    let chart = choropleth(
        render,
        "彰化縣各鄉鎮市老年人口占比",
        "65歲以上人口占比 (%)",
        &areas,
        &scheme,
    )?;
    info!(
        "demand page ready: {} areas in {} classes",
        areas.len(),
        scheme.class_count()
    );

    Ok(DemandPage {
        areas,
        scheme,
        chart,
        prepared_at: Local::now(),
    })
}

pub async fn prepare_mix(
    client: &Client,
    sources: &SourceSet,
    render: &RenderConfig,
) -> Result<MixPage, SourceError> {
    info!("preparing mix page");
    let boundaries = load_boundaries(client, &sources.boundaries).await?;
    let doctors = doctor_density(&load_table(client, &sources.doctors).await?)?;
    let elderly = elderly_population(&load_table(client, &sources.age_population).await?, "歲")?;

    let merged = inner_join_maps(&elderly, &doctors);
    let areas = classify_bivariate(inner_join(&boundaries, &merged, "population+doctors")?);
    let chart = bivariate_map(render, &areas)?;
    info!("mix page ready: {} areas", areas.len());

    Ok(MixPage {
        areas,
        chart,
        prepared_at: Local::now(),
    })
}
