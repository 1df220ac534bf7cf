use crate::cache::Memo;
use crate::config::DashboardConfig;
use crate::errors::SourceError;
use crate::font::resolve_render_config;
use crate::models::{DemandPage, MixPage, SupplyPage};
use crate::pages::{
    demand_fingerprint, mix_fingerprint, prepare_demand, prepare_mix, prepare_supply,
    supply_fingerprint,
};
use crate::render::RenderConfig;
use reqwest::Client;
use std::sync::Arc;
use tokio::sync::OnceCell;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<DashboardConfig>,
    pub client: Client,
    render: Arc<OnceCell<RenderConfig>>,
    supply: Arc<Memo<SupplyPage>>,
    demand: Arc<Memo<DemandPage>>,
    mix: Arc<Memo<MixPage>>,
}

impl AppState {
    pub fn new(config: DashboardConfig) -> Self {
        Self {
            config: Arc::new(config),
            client: Client::new(),
            render: Arc::new(OnceCell::new()),
            supply: Arc::new(Memo::default()),
            demand: Arc::new(Memo::default()),
            mix: Arc::new(Memo::default()),
        }
    }

    pub async fn render_config(&self) -> &RenderConfig {
        self.render
            .get_or_init(|| resolve_render_config(&self.client, &self.config.font))
            .await
    }

    pub async fn supply_page(&self) -> Result<Arc<SupplyPage>, SourceError> {
        let sources = &self.config.sources;
        let render = self.render_config().await;
        self.supply
            .get_or_try_init(&supply_fingerprint(sources), || {
                prepare_supply(&self.client, sources, render)
            })
            .await
    }

    pub async fn demand_page(&self) -> Result<Arc<DemandPage>, SourceError> {
        let sources = &self.config.sources;
        let render = self.render_config().await;
        self.demand
            .get_or_try_init(&demand_fingerprint(sources), || {
                prepare_demand(&self.client, sources, render)
            })
            .await
    }

    pub async fn mix_page(&self) -> Result<Arc<MixPage>, SourceError> {
        let sources = &self.config.sources;
        let render = self.render_config().await;
        self.mix
            .get_or_try_init(&mix_fingerprint(sources), || {
                prepare_mix(&self.client, sources, render)
            })
            .await
    }
}
