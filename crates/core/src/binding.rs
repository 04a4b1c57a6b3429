//! Row binding and cover fetch cancellation for a recycled list.
//!
//! A [`RowSlot`] is one reusable visual row. Each slot carries a generation
//! counter guarded by its mutex; every bind bumps it. A slot waiting on a
//! cover subscribes, under its current generation, to the one fetch running
//! for that volume. When the fetch completes it may only write the cover, or
//! hand it to the interactive thread, for subscribers whose generation is
//! still current. The check and the write happen under the slot lock, so a
//! rebind can never interleave between them.
//!
//! Lock order is slot, then in-flight table. A completing fetch releases the
//! table before it locks any slot.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::dispatch::UiHandle;
use crate::error::ImageError;
use crate::fetch::HttpFetcher;
use crate::volume::{CoverImage, Volume};

pub type ImageReady = Box<dyn FnOnce(CoverImage) + Send + 'static>;

/// At most one cover fetch per volume, keyed by the volume's address. The
/// task holds the `Arc<Volume>`, so the address stays unique while the
/// entry exists.
#[derive(Default)]
struct InFlight {
    next_id: u64,
    fetches: HashMap<usize, VolumeFetch>,
}

struct VolumeFetch {
    id: u64,
    task: JoinHandle<()>,
    subscribers: Vec<(RowSlot, u64)>,
}

type SharedInFlight = Arc<Mutex<InFlight>>;

/// A slot's place in a volume's fetch.
struct Subscription {
    inflight: SharedInFlight,
    volume_key: usize,
    slot_key: usize,
}

impl Subscription {
    /// Leave the fetch. The last subscriber out aborts it, which drops the
    /// in-flight response and its connection.
    fn cancel(self) {
        let mut inflight = lock(&self.inflight);
        let Some(entry) = inflight.fetches.get_mut(&self.volume_key) else {
            return;
        };
        // Keys only; the caller holds one of these slots' locks.
        entry.subscribers.retain(|(s, _)| s.key() != self.slot_key);
        if entry.subscribers.is_empty() {
            if let Some(entry) = inflight.fetches.remove(&self.volume_key) {
                entry.task.abort();
            }
        }
    }
}

#[derive(Default)]
struct SlotState {
    generation: u64,
    volume: Option<Arc<Volume>>,
    displayed: Option<CoverImage>,
    /// Set from subscribe until the result is delivered or the fetch fails.
    fetch: Option<Subscription>,
    on_ready: Option<ImageReady>,
}

impl SlotState {
    /// Supersede whatever the slot was doing.
    fn cancel(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        if let Some(fetch) = self.fetch.take() {
            fetch.cancel();
        }
        self.on_ready = None;
    }
}

/// A reusable row position. Clones refer to the same slot.
#[derive(Clone)]
pub struct RowSlot {
    id: usize,
    state: Arc<Mutex<SlotState>>,
}

impl RowSlot {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            state: Arc::new(Mutex::new(SlotState::default())),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// The cover currently shown in this row, if any.
    pub fn displayed_image(&self) -> Option<CoverImage> {
        self.lock().displayed.clone()
    }

    pub fn bound_volume(&self) -> Option<Arc<Volume>> {
        self.lock().volume.clone()
    }

    /// True while a cover fetch for this slot has not been delivered yet.
    pub fn is_fetching(&self) -> bool {
        self.lock().fetch.is_some()
    }

    /// Cancel any pending fetch and detach the slot from its volume.
    pub fn unbind(&self) {
        let mut st = self.lock();
        st.cancel();
        st.volume = None;
        st.displayed = None;
    }

    fn key(&self) -> usize {
        Arc::as_ptr(&self.state) as usize
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        lock(&self.state)
    }
}

impl std::fmt::Debug for RowSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.lock();
        f.debug_struct("RowSlot")
            .field("id", &self.id)
            .field("generation", &st.generation)
            .field("volume", &st.volume.as_ref().map(|v| v.title.as_str()))
            .field("fetching", &st.fetch.is_some())
            .finish()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panicking callback must not wedge the row forever.
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Binds volumes to row slots and runs their cover fetches in the background.
#[derive(Clone)]
pub struct RowBinder {
    fetcher: HttpFetcher,
    runtime: Handle,
    ui: UiHandle,
    inflight: SharedInFlight,
}

impl RowBinder {
    pub fn new(fetcher: HttpFetcher, runtime: Handle, ui: UiHandle) -> Self {
        Self {
            fetcher,
            runtime,
            ui,
            inflight: SharedInFlight::default(),
        }
    }

    /// Bind `volume` to `slot`. Call on the interactive thread.
    ///
    /// `on_image_ready` runs on the interactive thread once the cover is
    /// available: synchronously if the volume already has it, otherwise from
    /// a [`crate::dispatch::UiQueue`] drain. It never runs if the slot is
    /// rebound or unbound first, or if the fetch fails. A volume already
    /// being fetched for another slot is not fetched again; this slot joins
    /// that fetch.
    pub fn bind(
        &self,
        slot: &RowSlot,
        volume: Arc<Volume>,
        on_image_ready: impl FnOnce(CoverImage) + Send + 'static,
    ) {
        let mut st = slot.lock();
        st.displayed = None;

        let same_volume = st.volume.as_ref().is_some_and(|v| Arc::ptr_eq(v, &volume));
        if same_volume && st.fetch.is_some() {
            // Still fetching this very volume: keep the fetch, swap the callback.
            st.on_ready = Some(Box::new(on_image_ready));
            return;
        }

        st.cancel();
        st.volume = Some(volume.clone());

        if let Some(cover) = volume.cover_image().cloned() {
            st.displayed = Some(cover.clone());
            drop(st);
            on_image_ready(cover);
            return;
        }

        if !volume.has_cover_url() {
            return;
        }

        let generation = st.generation;
        st.on_ready = Some(Box::new(on_image_ready));

        let volume_key = Arc::as_ptr(&volume) as usize;
        let mut inflight = lock(&self.inflight);
        if let Some(entry) = inflight.fetches.get_mut(&volume_key) {
            tracing::debug!(slot = slot.id, generation, fetch = entry.id, "joining cover fetch");
            entry.subscribers.push((slot.clone(), generation));
        } else {
            let id = inflight.next_id;
            inflight.next_id = inflight.next_id.wrapping_add(1);
            tracing::debug!(slot = slot.id, generation, fetch = id, url = %volume.cover_image_url, "starting cover fetch");
            // The table lock is held across spawn, so the task cannot look for
            // its entry before it is recorded.
            let task = self.runtime.spawn(run_fetch(
                self.fetcher.clone(),
                self.ui.clone(),
                self.inflight.clone(),
                volume_key,
                id,
                volume,
            ));
            inflight.fetches.insert(
                volume_key,
                VolumeFetch {
                    id,
                    task,
                    subscribers: vec![(slot.clone(), generation)],
                },
            );
        }
        drop(inflight);

        st.fetch = Some(Subscription {
            inflight: self.inflight.clone(),
            volume_key,
            slot_key: slot.key(),
        });
    }

    /// Release a row that scrolled off screen or whose list was replaced.
    pub fn recycle(&self, slot: &RowSlot) {
        slot.unbind();
    }
}

async fn run_fetch(
    fetcher: HttpFetcher,
    ui: UiHandle,
    inflight: SharedInFlight,
    volume_key: usize,
    id: u64,
    volume: Arc<Volume>,
) {
    let result = fetch_cover(&fetcher, &volume.cover_image_url).await;

    let subscribers = {
        let mut inflight = lock(&inflight);
        match inflight.fetches.get(&volume_key) {
            Some(entry) if entry.id == id => inflight
                .fetches
                .remove(&volume_key)
                .map(|e| e.subscribers)
                .unwrap_or_default(),
            // Every subscriber left and a newer fetch may own the key now.
            _ => Vec::new(),
        }
    };

    match result {
        Ok(image) => {
            for (slot, generation) in subscribers {
                let image = {
                    let st = slot.lock();
                    if st.generation != generation {
                        tracing::debug!(slot = slot.id, generation, error = %ImageError::Canceled, "dropping cover");
                        continue;
                    }
                    volume.set_cover_image(image.clone());
                    volume.cover_image().cloned().unwrap_or_else(|| image.clone())
                };
                ui.post(move || deliver(&slot, generation, image));
            }
        }
        Err(e) => {
            tracing::warn!(fetch = id, url = %volume.cover_image_url, error = %e, "error downloading cover image");
            for (slot, generation) in subscribers {
                let mut st = slot.lock();
                if st.generation == generation {
                    st.fetch = None;
                    st.on_ready = None;
                }
            }
        }
    }
}

/// Runs on the interactive thread.
fn deliver(slot: &RowSlot, generation: u64, image: CoverImage) {
    let callback = {
        let mut st = slot.lock();
        if st.generation != generation {
            tracing::debug!(slot = slot.id, generation, "superseded before delivery");
            return;
        }
        st.displayed = Some(image.clone());
        st.fetch = None;
        st.on_ready.take()
    };
    if let Some(cb) = callback {
        cb(image);
    }
}

async fn fetch_cover(fetcher: &HttpFetcher, url: &str) -> Result<CoverImage, ImageError> {
    let bytes = fetcher.get(url).await?;
    tokio::task::spawn_blocking(move || CoverImage::decode(&bytes))
        .await
        .map_err(|e| ImageError::Decode(e.to_string()))?
        .map_err(|e| ImageError::Decode(e.to_string()))
}
