//! The result list as a recyclable-row data source.

use std::ops::Range;
use std::sync::Arc;

use crate::error::ListError;
use crate::volume::Volume;

/// Receives precise change notifications. Implement this to drive row
/// insert/remove animations in a list widget.
pub trait ListObserver: Send {
    fn items_inserted(&self, range: Range<usize>);
    fn items_removed(&self, range: Range<usize>);
}

/// An observer for when nobody is watching.
pub struct NoopObserver;

impl ListObserver for NoopObserver {
    fn items_inserted(&self, _range: Range<usize>) {}
    fn items_removed(&self, _range: Range<usize>) {}
}

/// Text shown for one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowView {
    pub title: String,
    pub authors: String,
    pub has_cover: bool,
}

pub struct VolumeListPresenter {
    volumes: Vec<Arc<Volume>>,
    observer: Box<dyn ListObserver>,
}

impl VolumeListPresenter {
    pub fn new(volumes: Vec<Arc<Volume>>, observer: Box<dyn ListObserver>) -> Self {
        Self { volumes, observer }
    }

    pub fn count(&self) -> usize {
        self.volumes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }

    pub fn at(&self, index: usize) -> Option<Arc<Volume>> {
        self.volumes.get(index).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Volume>> {
        self.volumes.iter()
    }

    pub fn row_view(&self, index: usize) -> Option<RowView> {
        self.volumes.get(index).map(|v| RowView {
            title: v.title.clone(),
            authors: v.authors_display(),
            has_cover: v.has_cover_url(),
        })
    }

    /// Insert at `index` (`index == count()` appends).
    pub fn insert(&mut self, index: usize, volume: Arc<Volume>) -> Result<(), ListError> {
        if index > self.volumes.len() {
            return Err(ListError::IndexOutOfBounds {
                index,
                len: self.volumes.len(),
            });
        }
        self.volumes.insert(index, volume);
        self.observer.items_inserted(index..index + 1);
        Ok(())
    }

    pub fn remove_at(&mut self, index: usize) -> Result<Arc<Volume>, ListError> {
        if index >= self.volumes.len() {
            return Err(ListError::IndexOutOfBounds {
                index,
                len: self.volumes.len(),
            });
        }
        let removed = self.volumes.remove(index);
        self.observer.items_removed(index..index + 1);
        Ok(removed)
    }
}

impl std::fmt::Debug for VolumeListPresenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VolumeListPresenter")
            .field("volumes", &self.volumes)
            .finish_non_exhaustive()
    }
}
