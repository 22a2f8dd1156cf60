use std::sync::Arc;

use crate::config::AppConfig;
use crate::errors::Result;
use crate::services::mpesa_service::MpesaService;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub mpesa_service: Arc<MpesaService>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Result<Self> {
        let mpesa_service = Arc::new(MpesaService::new(config.clone())?);

        Ok(AppState {
            config: Arc::new(config),
            mpesa_service,
        })
    }
}
