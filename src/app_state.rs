// src/app_state.rs

use std::sync::Arc;

use crate::clock::Clock;
use crate::config::Config;
use crate::db::MongoDB;
use crate::files::ImageStore;

#[derive(Clone)]
pub struct AppState {
    pub mongodb: Arc<MongoDB>,
    pub config: Config,
    pub clock: Arc<dyn Clock>,
    pub images: ImageStore,
}
