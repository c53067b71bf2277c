use crate::config::settings::AppConfig;
use crate::modules::video::catalog::Catalog;
use crate::workers::transcoder::TranscodeWorker;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub catalog: Catalog,
    pub transcoder: TranscodeWorker,
}

impl AppState {
    pub fn new(config: AppConfig, catalog: Catalog, transcoder: TranscodeWorker) -> Self {
        Self {
            config,
            catalog,
            transcoder,
        }
    }
}
