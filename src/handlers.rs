use crate::errors::AppError;
use crate::render::embed_font;
use crate::state::AppState;
use crate::ui::{render_demand, render_index, render_mix, render_supply};
use axum::{
    extract::{Path, State},
    http::header,
    response::{Html, IntoResponse},
};
use tokio::fs;

pub async fn index() -> Html<String> {
    Html(render_index())
}

pub async fn supply(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let page = state.supply_page().await?;
    Ok(Html(render_supply(&page)))
}

pub async fn demand(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let page = state.demand_page().await?;
    Ok(Html(render_demand(&page)))
}

pub async fn mix(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let page = state.mix_page().await?;
    Ok(Html(render_mix(&page)))
}

/// `/charts/{hospitals,beds,elderly,bivariate}.svg`, the images behind the
/// home page dropdown. An `<img>` cannot see the page's `@font-face`, so the
/// font travels inside the SVG.
pub async fn chart(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let svg = match file.as_str() {
        "hospitals.svg" => state.supply_page().await?.hospital_chart.clone(),
        "beds.svg" => state.supply_page().await?.bed_chart.clone(),
        "elderly.svg" => state.demand_page().await?.chart.clone(),
        "bivariate.svg" => state.mix_page().await?.chart.clone(),
        _ => return Err(AppError::not_found(format!("沒有這張圖表：{file}"))),
    };
    let render = state.render_config().await;
    let svg = match fs::read(&state.config.font.path).await {
        Ok(font) if render.font_family == state.config.font.family => {
            embed_font(&svg, &render.font_family, &font)
        }
        _ => svg,
    };
    Ok(([(header::CONTENT_TYPE, "image/svg+xml")], svg))
}

pub async fn font(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    state.render_config().await;
    let bytes = fs::read(&state.config.font.path)
        .await
        .map_err(|_| AppError::not_found("字型尚未下載"))?;
    Ok(([(header::CONTENT_TYPE, "font/ttf")], bytes))
}
