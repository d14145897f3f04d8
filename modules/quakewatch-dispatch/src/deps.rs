use std::sync::Arc;

use quakewatch_common::FileConfig;
use quakewatch_store::DisasterStore;

use crate::feed::QuakeFeed;
use crate::generator::TextGenerator;
use crate::news::NewsSearcher;
use crate::notify::DeliveryChannel;
use crate::reference::ReferenceLibrary;

/// Central dependency container passed to every handler.
#[derive(Clone)]
pub struct Deps {
    pub feed: Arc<dyn QuakeFeed>,
    pub news: Arc<dyn NewsSearcher>,
    pub store: Arc<dyn DisasterStore>,
    pub generator: Arc<dyn TextGenerator>,
    pub channel: Arc<dyn DeliveryChannel>,
    pub reference: Arc<ReferenceLibrary>,
    pub file_config: Arc<FileConfig>,
}

impl Deps {
    pub fn new(
        feed: Arc<dyn QuakeFeed>,
        news: Arc<dyn NewsSearcher>,
        store: Arc<dyn DisasterStore>,
        generator: Arc<dyn TextGenerator>,
        channel: Arc<dyn DeliveryChannel>,
        reference: Arc<ReferenceLibrary>,
        file_config: Arc<FileConfig>,
    ) -> Self {
        Self {
            feed,
            news,
            store,
            generator,
            channel,
            reference,
            file_config,
        }
    }
}
