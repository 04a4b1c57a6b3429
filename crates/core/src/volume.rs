use std::fmt;
use std::sync::{Arc, OnceLock};

use image::DynamicImage;
use serde::Serialize;

/// One book record from a catalog search.
///
/// Everything except the cover slot is fixed at construction. The cover is a
/// write-once cell: it goes from absent to present on a successful fetch and
/// never changes afterwards.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Volume {
    pub title: String,
    pub authors: Vec<String>,
    /// Empty when the catalog has no cover for this volume.
    pub cover_image_url: String,
    #[serde(skip)]
    cover_image: OnceLock<CoverImage>,
}

impl Volume {
    pub fn new(
        title: impl Into<String>,
        authors: Vec<String>,
        cover_image_url: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            authors,
            cover_image_url: cover_image_url.into(),
            cover_image: OnceLock::new(),
        }
    }

    pub fn has_cover_url(&self) -> bool {
        !self.cover_image_url.is_empty()
    }

    /// Authors joined for display, e.g. `"Michael F. McTear, Zoraida Callejas"`.
    pub fn authors_display(&self) -> String {
        self.authors.join(", ")
    }

    pub fn cover_image(&self) -> Option<&CoverImage> {
        self.cover_image.get()
    }

    /// Store the decoded cover. Returns `false` if a cover was already set or
    /// the volume has no cover URL; the existing state is left untouched.
    pub(crate) fn set_cover_image(&self, image: CoverImage) -> bool {
        if !self.has_cover_url() {
            return false;
        }
        self.cover_image.set(image).is_ok()
    }
}

/// Decoded cover art. Clones share the same pixel buffer.
#[derive(Clone)]
pub struct CoverImage(Arc<DynamicImage>);

impl CoverImage {
    pub fn new(image: DynamicImage) -> Self {
        Self(Arc::new(image))
    }

    /// Decode an encoded raster (JPEG, PNG, GIF, WebP), sniffing the format
    /// from the bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, image::ImageError> {
        image::load_from_memory(bytes).map(Self::new)
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    pub fn image(&self) -> &DynamicImage {
        &self.0
    }

    pub fn ptr_eq(&self, other: &CoverImage) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for CoverImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoverImage")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}
