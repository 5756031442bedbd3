//! Memoizing bitmap loader feeding the render pass.
//!
//! The cache maps a logical image path to a shared decoded bitmap. The first
//! request for a path loads it through the [`ImageSource`]; later requests
//! are served from memory. Concurrent first requests for the same path are
//! not coalesced, so a burst of renders can issue duplicate loads; the second
//! insert simply replaces the first with an equivalent bitmap. Entries are
//! never evicted. Failed loads are not cached, so the next pass retries.

#[cfg(test)]
#[path = "image_cache_test.rs"]
mod image_cache_test;

use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;
use std::rc::Rc;

use wasm_bindgen_futures::JsFuture;
use web_sys::HtmlImageElement;

use crate::error::ImageLoadError;

/// A decoded bitmap with known pixel dimensions.
pub trait Bitmap {
    fn width(&self) -> f64;
    fn height(&self) -> f64;
}

impl Bitmap for HtmlImageElement {
    fn width(&self) -> f64 {
        f64::from(self.natural_width())
    }

    fn height(&self) -> f64 {
        f64::from(self.natural_height())
    }
}

/// Resolves a logical image path to a decoded bitmap.
pub trait ImageSource {
    type Image: Bitmap;

    /// Fetch and decode the image at `path`.
    fn load(&self, path: &str) -> impl Future<Output = Result<Self::Image, ImageLoadError>>;
}

/// Path-keyed memo over an [`ImageSource`].
pub struct ImageCache<S: ImageSource> {
    source: S,
    entries: RefCell<HashMap<String, Rc<S::Image>>>,
}

impl<S: ImageSource> ImageCache<S> {
    #[must_use]
    pub fn new(source: S) -> Self {
        Self { source, entries: RefCell::new(HashMap::new()) }
    }

    /// The bitmap for `path`, loading it on first use.
    ///
    /// # Errors
    ///
    /// Returns the source's [`ImageLoadError`] when the load fails; nothing
    /// is cached in that case.
    pub async fn get(&self, path: &str) -> Result<Rc<S::Image>, ImageLoadError> {
        if let Some(image) = self.cached(path) {
            return Ok(image);
        }
        let image = Rc::new(self.source.load(path).await?);
        self.entries.borrow_mut().insert(path.to_owned(), Rc::clone(&image));
        Ok(image)
    }

    /// The bitmap for `path` if it has already been loaded.
    #[must_use]
    pub fn cached(&self, path: &str) -> Option<Rc<S::Image>> {
        self.entries.borrow().get(path).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }
}

/// Browser image source: `<img>` elements under a fixed URL prefix.
#[derive(Debug, Clone)]
pub struct HtmlImageSource {
    base_path: String,
}

impl HtmlImageSource {
    #[must_use]
    pub fn new(base_path: impl Into<String>) -> Self {
        Self { base_path: base_path.into() }
    }

    /// URL the browser is asked to fetch for `path`.
    #[must_use]
    pub fn resolve_url(&self, path: &str) -> String {
        format!("{}{path}", self.base_path)
    }
}

impl ImageSource for HtmlImageSource {
    type Image = HtmlImageElement;

    async fn load(&self, path: &str) -> Result<HtmlImageElement, ImageLoadError> {
        let fail = |reason: String| ImageLoadError { path: path.to_owned(), reason };
        let image = HtmlImageElement::new().map_err(|e| fail(format!("{e:?}")))?;
        image.set_src(&self.resolve_url(path));
        JsFuture::from(image.decode()).await.map_err(|e| fail(format!("{e:?}")))?;
        Ok(image)
    }
}
