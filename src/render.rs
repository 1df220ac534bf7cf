use crate::errors::SourceError;
use crate::models::{BedStat, BivariateStat, HospitalStat, JoinedArea};
use crate::stats::{QuantileScheme, bivariate_class, bivariate_color};
use base64::prelude::*;
use geo::{BoundingRect, Centroid, Coord, InteriorPoint, MultiPolygon};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::f64::consts::PI;

type Canvas<'a> = DrawingArea<SVGBackend<'a>, Shift>;

const MARGIN: i32 = 20;
const LEGEND_HEIGHT: i32 = 170;
/// Pixel area of a proportional symbol per counted facility.
const SYMBOL_AREA_PER_UNIT: f64 = 15.0;
const DONUT_RADIUS: f64 = 10.0;
const REDS: [&str; 5] = ["#fee5d9", "#fcae91", "#fb6a4a", "#de2d26", "#a50f15"];
const GENERAL_BED_COLOR: &str = "#a93226";
const SPECIAL_BED_COLOR: &str = "#f1c40f";

#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub font_family: String,
    pub width: u32,
    pub height: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self::with_font("sans-serif")
    }
}

impl RenderConfig {
    pub fn with_font(font_family: impl Into<String>) -> Self {
        Self {
            font_family: font_family.into(),
            width: 800,
            height: 900,
        }
    }

    fn text(&self, size: f64, color: &RGBColor) -> TextStyle<'_> {
        (self.font_family.as_str(), size).into_font().color(color)
    }
}

pub fn proportional_symbols(
    cfg: &RenderConfig,
    areas: &[JoinedArea<HospitalStat>],
) -> Result<String, SourceError> {
    render_svg(cfg, |root| {
        let canvas = titled(root, cfg, "彰化縣各鄉鎮市醫療資源分布圖")?;
        let projection = Projection::fit(areas.iter().map(|a| &a.geometry), map_frame(&canvas));
        let base = hex_color("#ffafaf");
        for area in areas {
            draw_outline(&canvas, &projection, &area.geometry, &base, &BLACK, 1)?;
        }

        let fill = ShapeStyle {
            color: BLUE.mix(0.6),
            filled: true,
            stroke_width: 0,
        };
        for area in areas {
            let Some(anchor) = area.geometry.interior_point() else {
                continue;
            };
            let center = projection.project(anchor.0);
            let radius = symbol_radius(area.attrs.total);
            if radius < 1 {
                continue;
            }
            canvas
                .draw(&Circle::new(center, radius, fill))
                .map_err(SourceError::render)?;
            canvas
                .draw(&Circle::new(center, radius, WHITE.stroke_width(1)))
                .map_err(SourceError::render)?;
        }

        let (_, height) = canvas.dim_in_pixel();
        let y = height as i32 - LEGEND_HEIGHT + MARGIN;
        canvas
            .draw(&Circle::new((MARGIN + 8, y), 8, fill))
            .map_err(SourceError::render)?;
        canvas
            .draw(&Text::new(
                "醫院+診所數量".to_string(),
                (MARGIN + 24, y),
                cfg.text(14.0, &BLACK).pos(Pos::new(HPos::Left, VPos::Center)),
            ))
            .map_err(SourceError::render)
    })
}

fn symbol_radius(count: f64) -> i32 {
    (count.max(0.0) * SYMBOL_AREA_PER_UNIT / PI).sqrt().round() as i32
}

pub fn donut_glyphs(cfg: &RenderConfig, areas: &[JoinedArea<BedStat>]) -> Result<String, SourceError> {
    render_svg(cfg, |root| {
        let canvas = titled(root, cfg, "彰化縣各行政區病床分佈圖")?;
        let projection = Projection::fit(areas.iter().map(|a| &a.geometry), map_frame(&canvas));
        let base = hex_color("#9affa7");
        for area in areas {
            draw_outline(&canvas, &projection, &area.geometry, &base, &BLACK, 1)?;
        }

        let general = hex_color(GENERAL_BED_COLOR);
        let special = hex_color(SPECIAL_BED_COLOR);
        for area in areas {
            let Some(centroid) = area.geometry.centroid() else {
                continue;
            };
            let Some(split) = donut_split(area.attrs) else {
                continue;
            };
            let center = projection.project(centroid.0);
            for (start, end, color) in [(0.0, split, &general), (split, 360.0, &special)] {
                if end - start <= 0.0 {
                    continue;
                }
                canvas
                    .draw(&Polygon::new(wedge(center, DONUT_RADIUS, start, end), color.filled()))
                    .map_err(SourceError::render)?;
            }
            let hole = (DONUT_RADIUS * 0.4).round() as i32;
            canvas
                .draw(&Circle::new(center, hole, WHITE.filled()))
                .map_err(SourceError::render)?;
        }

        let (_, height) = canvas.dim_in_pixel();
        let y = height as i32 - LEGEND_HEIGHT + MARGIN;
        for (row, (label, color)) in [("■ 一般病床", &general), ("■ 特殊病床", &special)]
            .into_iter()
            .enumerate()
        {
            canvas
                .draw(&Text::new(
                    label.to_string(),
                    (MARGIN, y + row as i32 * 24),
                    cfg.text(16.0, color).pos(Pos::new(HPos::Left, VPos::Center)),
                ))
                .map_err(SourceError::render)?;
        }
        Ok(())
    })
}

/// Angle in degrees where the general-bed wedge ends, or `None` when the
/// area has no beds at all.
pub fn donut_split(beds: BedStat) -> Option<f64> {
    let total = beds.general + beds.special;
    if total <= 0.0 {
        return None;
    }
    Some(beds.general / total * 360.0)
}

fn wedge(center: (i32, i32), radius: f64, start_deg: f64, end_deg: f64) -> Vec<(i32, i32)> {
    let steps = ((end_deg - start_deg) / 6.0).ceil().max(1.0) as usize;
    let mut points = Vec::with_capacity(steps + 2);
    points.push(center);
    for step in 0..=steps {
        let angle = (start_deg + (end_deg - start_deg) * step as f64 / steps as f64).to_radians();
        points.push((
            center.0 + (radius * angle.cos()).round() as i32,
            center.1 - (radius * angle.sin()).round() as i32,
        ));
    }
    points
}

pub fn reds_palette(classes: usize) -> Vec<RGBColor> {
    let last = REDS.len() - 1;
    match classes {
        0 => Vec::new(),
        1 => vec![hex_color(REDS[2])],
        n => (0..n)
            .map(|i| hex_color(REDS[(i * last / (n - 1)).min(last)]))
            .collect(),
    }
}

pub fn choropleth<T>(
    cfg: &RenderConfig,
    title: &str,
    legend_title: &str,
    areas: &[JoinedArea<T>],
    scheme: &QuantileScheme,
) -> Result<String, SourceError> {
    let palette = reds_palette(scheme.class_count());
    let edge = RGBColor(204, 204, 204);
    render_svg(cfg, |root| {
        let canvas = titled(root, cfg, title)?;
        let projection = Projection::fit(areas.iter().map(|a| &a.geometry), map_frame(&canvas));
        for (area, &class) in areas.iter().zip(&scheme.classes) {
            let fill = palette.get(class).copied().unwrap_or(edge);
            draw_outline(&canvas, &projection, &area.geometry, &fill, &edge, 1)?;
        }

        let (_, height) = canvas.dim_in_pixel();
        let top = height as i32 - LEGEND_HEIGHT;
        canvas
            .draw(&Text::new(
                legend_title.to_string(),
                (MARGIN, top),
                cfg.text(14.0, &BLACK).pos(Pos::new(HPos::Left, VPos::Center)),
            ))
            .map_err(SourceError::render)?;
        for (class, (lower, upper)) in scheme.bounds().into_iter().enumerate() {
            let y = top + 20 + class as i32 * 22;
            let color = palette.get(class).copied().unwrap_or(edge);
            canvas
                .draw(&Rectangle::new([(MARGIN, y - 8), (MARGIN + 16, y + 8)], color.filled()))
                .map_err(SourceError::render)?;
            canvas
                .draw(&Text::new(
                    class_label(lower, upper),
                    (MARGIN + 24, y),
                    cfg.text(13.0, &BLACK).pos(Pos::new(HPos::Left, VPos::Center)),
                ))
                .map_err(SourceError::render)?;
        }
        Ok(())
    })
}

pub fn class_label(lower: f64, upper: f64) -> String {
    format!("{lower:.1} ~ {upper:.1}")
}

pub fn bivariate_map(
    cfg: &RenderConfig,
    areas: &[JoinedArea<BivariateStat>],
) -> Result<String, SourceError> {
    const CELL: i32 = 30;
    let fallback = RGBColor(200, 200, 200);
    render_svg(cfg, |root| {
        let canvas = titled(root, cfg, "彰化縣：高齡人口與醫師資源雙變量地圖")?;
        let projection = Projection::fit(areas.iter().map(|a| &a.geometry), map_frame(&canvas));
        for area in areas {
            let fill = bivariate_color(&area.attrs.class)
                .map(hex_color)
                .unwrap_or(fallback);
            draw_outline(&canvas, &projection, &area.geometry, &fill, &WHITE, 1)?;
        }

        let (_, height) = canvas.dim_in_pixel();
        let left = MARGIN + 60;
        let bottom = height as i32 - MARGIN - 30;
        for first in 1..=3u8 {
            for second in 1..=3u8 {
                let x = left + (first as i32 - 1) * CELL;
                let y = bottom - second as i32 * CELL;
                let fill = bivariate_color(&bivariate_class(first, second))
                    .map(hex_color)
                    .unwrap_or(fallback);
                canvas
                    .draw(&Rectangle::new([(x, y), (x + CELL, y + CELL)], fill.filled()))
                    .map_err(SourceError::render)?;
                canvas
                    .draw(&Rectangle::new([(x, y), (x + CELL, y + CELL)], WHITE.stroke_width(1)))
                    .map_err(SourceError::render)?;
            }
        }

        let tick = cfg.text(12.0, &BLACK).pos(Pos::new(HPos::Center, VPos::Center));
        for (i, label) in ["低", "中", "高"].into_iter().enumerate() {
            let offset = i as i32 * CELL + CELL / 2;
            canvas
                .draw(&Text::new(label.to_string(), (left + offset, bottom + 10), tick.clone()))
                .map_err(SourceError::render)?;
            canvas
                .draw(&Text::new(label.to_string(), (left - 10, bottom - offset), tick.clone()))
                .map_err(SourceError::render)?;
        }
        canvas
            .draw(&Text::new(
                "65歲以上人口 →".to_string(),
                (left, bottom + 26),
                cfg.text(12.0, &BLACK).pos(Pos::new(HPos::Left, VPos::Center)),
            ))
            .map_err(SourceError::render)?;
        canvas
            .draw(&Text::new(
                "每萬人醫師數 →".to_string(),
                (left, bottom - 3 * CELL - 12),
                cfg.text(12.0, &BLACK).pos(Pos::new(HPos::Left, VPos::Center)),
            ))
            .map_err(SourceError::render)
    })
}

/// Inlines a TTF into a standalone SVG so text keeps the face when the image
/// is loaded outside the dashboard page.
pub fn embed_font(svg: &str, family: &str, font: &[u8]) -> String {
    let Some(open) = svg.find("<svg") else {
        return svg.to_string();
    };
    let Some(end) = svg[open..].find('>').map(|i| open + i + 1) else {
        return svg.to_string();
    };
    let style = format!(
        "<style>@font-face{{font-family:\"{family}\";src:url(data:font/ttf;base64,{});}}</style>",
        BASE64_STANDARD.encode(font)
    );
    let mut out = String::with_capacity(svg.len() + style.len());
    out.push_str(&svg[..end]);
    out.push_str(&style);
    out.push_str(&svg[end..]);
    out
}

fn render_svg<F>(cfg: &RenderConfig, paint: F) -> Result<String, SourceError>
where
    F: FnOnce(&Canvas<'_>) -> Result<(), SourceError>,
{
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (cfg.width, cfg.height)).into_drawing_area();
        root.fill(&WHITE).map_err(SourceError::render)?;
        paint(&root)?;
        root.present().map_err(SourceError::render)?;
    }
    Ok(svg)
}

fn titled<'a>(root: &Canvas<'a>, cfg: &RenderConfig, title: &str) -> Result<Canvas<'a>, SourceError> {
    root.titled(title, cfg.text(22.0, &BLACK))
        .map_err(SourceError::render)
}

fn draw_outline(
    canvas: &Canvas<'_>,
    projection: &Projection,
    geometry: &MultiPolygon<f64>,
    fill: &RGBColor,
    edge: &RGBColor,
    edge_width: u32,
) -> Result<(), SourceError> {
    for polygon in &geometry.0 {
        let exterior: Vec<(i32, i32)> = polygon
            .exterior()
            .coords()
            .map(|c| projection.project(*c))
            .collect();
        canvas
            .draw(&Polygon::new(exterior.clone(), fill.filled()))
            .map_err(SourceError::render)?;
        for hole in polygon.interiors() {
            let ring: Vec<(i32, i32)> = hole.coords().map(|c| projection.project(*c)).collect();
            canvas
                .draw(&Polygon::new(ring.clone(), WHITE.filled()))
                .map_err(SourceError::render)?;
            canvas
                .draw(&PathElement::new(ring, edge.stroke_width(edge_width)))
                .map_err(SourceError::render)?;
        }
        canvas
            .draw(&PathElement::new(exterior, edge.stroke_width(edge_width)))
            .map_err(SourceError::render)?;
    }
    Ok(())
}

fn map_frame(canvas: &Canvas<'_>) -> (i32, i32, i32, i32) {
    let (width, height) = canvas.dim_in_pixel();
    (
        MARGIN,
        MARGIN,
        (width as i32 - 2 * MARGIN).max(1),
        (height as i32 - LEGEND_HEIGHT - 2 * MARGIN).max(1),
    )
}

/// Equirectangular fit of a set of geometries into a pixel frame, keeping the
/// aspect ratio. Longitudes shrink by the cosine of the mid latitude when the
/// data is in degrees.
#[derive(Debug, Clone, Copy)]
struct Projection {
    min_x: f64,
    max_y: f64,
    x_factor: f64,
    scale: f64,
    offset: (f64, f64),
}

impl Projection {
    fn fit<'g>(
        geometries: impl Iterator<Item = &'g MultiPolygon<f64>>,
        frame: (i32, i32, i32, i32),
    ) -> Self {
        let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
        let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for rect in geometries.filter_map(|g| g.bounding_rect()) {
            min_x = min_x.min(rect.min().x);
            min_y = min_y.min(rect.min().y);
            max_x = max_x.max(rect.max().x);
            max_y = max_y.max(rect.max().y);
        }
        if !min_x.is_finite() {
            (min_x, min_y, max_x, max_y) = (0.0, 0.0, 1.0, 1.0);
        }

        let degrees = min_x >= -180.0 && max_x <= 180.0 && min_y >= -90.0 && max_y <= 90.0;
        let x_factor = if degrees {
            ((min_y + max_y) / 2.0).to_radians().cos()
        } else {
            1.0
        };

        let (fx, fy, fw, fh) = frame;
        let span_x = ((max_x - min_x) * x_factor).max(f64::EPSILON);
        let span_y = (max_y - min_y).max(f64::EPSILON);
        let scale = (fw as f64 / span_x).min(fh as f64 / span_y);
        let offset = (
            fx as f64 + (fw as f64 - span_x * scale) / 2.0,
            fy as f64 + (fh as f64 - span_y * scale) / 2.0,
        );

        Self {
            min_x,
            max_y,
            x_factor,
            scale,
            offset,
        }
    }

    fn project(&self, coord: Coord<f64>) -> (i32, i32) {
        let x = self.offset.0 + (coord.x - self.min_x) * self.x_factor * self.scale;
        let y = self.offset.1 + (self.max_y - coord.y) * self.scale;
        (x.round() as i32, y.round() as i32)
    }
}

fn hex_color(hex: &str) -> RGBColor {
    let hex = hex.trim_start_matches('#');
    let channel = |range: std::ops::Range<usize>| {
        hex.get(range)
            .and_then(|h| u8::from_str_radix(h, 16).ok())
            .unwrap_or(0)
    };
    RGBColor(channel(0..2), channel(2..4), channel(4..6))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::quantile_scheme;
    use geo::polygon;

    fn square(name: &str, x: f64) -> (String, MultiPolygon<f64>) {
        let poly = polygon![
            (x: x, y: 0.0),
            (x: x + 1.0, y: 0.0),
            (x: x + 1.0, y: 1.0),
            (x: x, y: 1.0),
        ];
        (name.to_string(), MultiPolygon::new(vec![poly]))
    }

    fn areas<T: Clone>(attrs: &[T]) -> Vec<JoinedArea<T>> {
        ["甲", "乙", "丙"]
            .iter()
            .zip(attrs)
            .enumerate()
            .map(|(i, (name, attrs))| {
                let (name, geometry) = square(name, i as f64);
                JoinedArea {
                    name,
                    geometry,
                    attrs: attrs.clone(),
                }
            })
            .collect()
    }

    #[test]
    fn choropleth_colors_each_class_and_labels_bounds() {
        let values = [10.0, 20.0, 30.0];
        let areas = areas(&values);
        let scheme = quantile_scheme(&values, 5);
        let svg = choropleth(&RenderConfig::default(), "Test", "count", &areas, &scheme)
            .unwrap()
            .to_lowercase();

        assert_eq!(svg.matches("<polygon").count(), 3);
        for color in ["#fee5d9", "#fb6a4a", "#a50f15"] {
            assert!(svg.contains(color), "missing {color}");
        }
        for label in ["10.0 ~ 16.7", "16.7 ~ 23.3", "23.3 ~ 30.0"] {
            assert!(svg.contains(label), "missing legend {label}");
        }
    }

    #[test]
    fn donuts_skip_areas_without_beds() {
        assert_eq!(donut_split(BedStat::default()), None);
        assert_eq!(
            donut_split(BedStat {
                general: 3.0,
                special: 1.0
            }),
            Some(270.0)
        );

        let beds = [
            BedStat {
                general: 0.0,
                special: 0.0,
            },
            BedStat {
                general: 50.0,
                special: 50.0,
            },
            BedStat {
                general: 0.0,
                special: 0.0,
            },
        ];
        let svg = donut_glyphs(&RenderConfig::default(), &areas(&beds))
            .unwrap()
            .to_lowercase();
        // three area fills plus two wedges for the one area with beds
        assert_eq!(svg.matches("<polygon").count(), 5);
        assert!(svg.contains(GENERAL_BED_COLOR));
        assert!(svg.contains(SPECIAL_BED_COLOR));
    }

    #[test]
    fn symbols_scale_with_counts() {
        assert!(symbol_radius(40.0) > symbol_radius(10.0));
        assert_eq!(symbol_radius(0.0), 0);

        let stats = [10.0, 0.0, 30.0].map(|total| HospitalStat {
            total,
            hospitals: 0.0,
            clinics: total,
        });
        let svg = proportional_symbols(&RenderConfig::default(), &areas(&stats)).unwrap();
        // two filled symbols, two white rims, one legend marker
        assert_eq!(svg.matches("<circle").count(), 5);
    }

    #[test]
    fn bivariate_map_draws_full_legend() {
        let stats: Vec<BivariateStat> = [("11", 1), ("23", 2), ("33", 3)]
            .iter()
            .map(|(class, n)| BivariateStat {
                elderly: *n as f64,
                doctors_per_10k: *n as f64,
                elderly_tertile: class.as_bytes()[0] - b'0',
                doctor_tertile: class.as_bytes()[1] - b'0',
                class: class.to_string(),
            })
            .collect();
        let svg = bivariate_map(&RenderConfig::with_font("Iansui"), &areas(&stats))
            .unwrap()
            .to_lowercase();
        for (_, color) in crate::stats::BIVARIATE_PALETTE {
            assert!(svg.contains(color), "missing {color}");
        }
        assert!(svg.contains("iansui"));
        assert!(svg.contains("65歲以上人口"));
    }

    #[test]
    fn standalone_charts_carry_their_font() {
        let svg = bivariate_map(&RenderConfig::with_font("Iansui"), &areas::<BivariateStat>(&[])).unwrap();
        let embedded = embed_font(&svg, "Iansui", b"ttf");
        let open = embedded.find("<svg").unwrap();
        let style = embedded.find("<style>@font-face").unwrap();
        assert!(style > open);
        assert!(style < embedded.find("<text").unwrap());
        assert!(embedded.contains("url(data:font/ttf;base64,dHRm)"));
        let style_end = embedded.find("</style>").unwrap() + "</style>".len();
        assert_eq!(format!("{}{}", &embedded[..style], &embedded[style_end..]), svg);

        assert_eq!(embed_font("not svg", "Iansui", b"ttf"), "not svg");
    }

    #[test]
    fn projection_keeps_geometry_inside_frame() {
        let (_, geometry) = square("a", 120.0);
        let projection = Projection::fit(std::iter::once(&geometry), (20, 20, 760, 600));
        for coord in geometry.0[0].exterior().coords() {
            let (x, y) = projection.project(*coord);
            assert!((20..=780).contains(&x) && (20..=620).contains(&y), "({x}, {y})");
        }
    }
}
