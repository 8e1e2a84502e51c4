//! ServerDeps - dependency injection container for the job pipeline.
//!
//! Holds the stores and external collaborators behind trait objects so
//! processors and the worker never name a concrete backend. Built once at
//! startup (or per test) and shared via Arc.

use std::sync::Arc;

use crate::domains::presentations::{DeckStore, TemplateStore};
use crate::kernel::assets::AssetStore;
use crate::kernel::config::ServiceConfig;
use crate::kernel::jobs::JobStore;
use crate::kernel::traits::{BaseDesignAi, BaseRenderer};

pub struct ServerDeps {
    pub config: ServiceConfig,
    pub job_store: Arc<dyn JobStore>,
    pub asset_store: Arc<dyn AssetStore>,
    pub template_store: Arc<dyn TemplateStore>,
    pub deck_store: Arc<dyn DeckStore>,
    pub renderer: Arc<dyn BaseRenderer>,
    pub ai: Arc<dyn BaseDesignAi>,
}

impl ServerDeps {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: ServiceConfig,
        job_store: Arc<dyn JobStore>,
        asset_store: Arc<dyn AssetStore>,
        template_store: Arc<dyn TemplateStore>,
        deck_store: Arc<dyn DeckStore>,
        renderer: Arc<dyn BaseRenderer>,
        ai: Arc<dyn BaseDesignAi>,
    ) -> Self {
        Self {
            config,
            job_store,
            asset_store,
            template_store,
            deck_store,
            renderer,
            ai,
        }
    }
}
