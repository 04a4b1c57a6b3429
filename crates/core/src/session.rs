//! Entry point for a UI: search, bind rows, build the list presenter.

use std::sync::Arc;

use tokio::runtime::Handle;

use crate::binding::{RowBinder, RowSlot};
use crate::config::{http_options_from_config, AppConfig};
use crate::dispatch::UiHandle;
use crate::error::HttpError;
use crate::fetch::HttpFetcher;
use crate::presenter::{ListObserver, VolumeListPresenter};
use crate::query::QueryService;
use crate::volume::{CoverImage, Volume};

/// Wires the services together for one UI. Background work runs on
/// `runtime`; completions come back through `ui`.
#[derive(Clone)]
pub struct BookListing {
    query: QueryService,
    binder: RowBinder,
    runtime: Handle,
    ui: UiHandle,
}

impl BookListing {
    pub fn new(config: &AppConfig, runtime: Handle, ui: UiHandle) -> Result<Self, HttpError> {
        let fetcher = HttpFetcher::new(&http_options_from_config(&config.http))?;
        let query = QueryService::new(fetcher.clone(), &config.api);
        let binder = RowBinder::new(fetcher, runtime.clone(), ui.clone());
        Ok(Self {
            query,
            binder,
            runtime,
            ui,
        })
    }

    /// Search in the background; `on_done` runs on the interactive thread
    /// with the result, which is empty on any failure.
    pub fn search(&self, query: &str, on_done: impl FnOnce(Vec<Arc<Volume>>) + Send + 'static) {
        let service = self.query.clone();
        let ui = self.ui.clone();
        let query = query.to_string();
        self.runtime.spawn(async move {
            let volumes: Vec<Arc<Volume>> = service.search(&query).await.into_iter().map(Arc::new).collect();
            ui.post(move || on_done(volumes));
        });
    }

    pub fn bind_row(
        &self,
        slot: &RowSlot,
        volume: Arc<Volume>,
        on_ready: impl FnOnce(CoverImage) + Send + 'static,
    ) {
        self.binder.bind(slot, volume, on_ready);
    }

    pub fn recycle_row(&self, slot: &RowSlot) {
        self.binder.recycle(slot);
    }

    pub fn presenter(&self, volumes: Vec<Arc<Volume>>, observer: Box<dyn ListObserver>) -> VolumeListPresenter {
        VolumeListPresenter::new(volumes, observer)
    }
}
