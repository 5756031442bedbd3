#![allow(clippy::float_cmp)]

use std::cell::RefCell;
use std::collections::HashSet;

use futures::executor::block_on;

use super::*;

// =============================================================
// Helpers
// =============================================================

#[derive(Debug, PartialEq)]
struct FakeBitmap {
    path: String,
}

impl Bitmap for FakeBitmap {
    fn width(&self) -> f64 {
        200.0
    }

    fn height(&self) -> f64 {
        100.0
    }
}

#[derive(Default)]
struct FakeSource {
    missing: HashSet<String>,
    calls: RefCell<Vec<String>>,
}

impl FakeSource {
    fn missing(paths: &[&str]) -> Self {
        Self { missing: paths.iter().map(|p| (*p).to_owned()).collect(), ..Self::default() }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl ImageSource for FakeSource {
    type Image = FakeBitmap;

    async fn load(&self, path: &str) -> Result<FakeBitmap, ImageLoadError> {
        self.calls.borrow_mut().push(path.to_owned());
        if self.missing.contains(path) {
            return Err(ImageLoadError { path: path.to_owned(), reason: "404".to_owned() });
        }
        Ok(FakeBitmap { path: path.to_owned() })
    }
}

// =============================================================
// ImageCache
// =============================================================

#[test]
fn first_get_loads_and_caches() {
    let cache = ImageCache::new(FakeSource::default());
    assert!(cache.is_empty());
    let image = block_on(cache.get("a.png"));
    assert_eq!(image.map(|i| i.path.clone()), Ok("a.png".to_owned()));
    assert_eq!(cache.len(), 1);
    assert!(cache.cached("a.png").is_some());
}

#[test]
fn second_get_is_served_from_memory() {
    let cache = ImageCache::new(FakeSource::default());
    let first = block_on(cache.get("a.png"));
    let second = block_on(cache.get("a.png"));
    assert_eq!(cache.source().calls(), ["a.png"]);
    match (first, second) {
        (Ok(a), Ok(b)) => assert!(Rc::ptr_eq(&a, &b)),
        other => panic!("both loads should succeed: {other:?}"),
    }
}

#[test]
fn distinct_paths_load_separately() {
    let cache = ImageCache::new(FakeSource::default());
    assert!(block_on(cache.get("a.png")).is_ok());
    assert!(block_on(cache.get("b.png")).is_ok());
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.source().calls(), ["a.png", "b.png"]);
}

#[test]
fn failed_load_is_reported_and_not_cached() {
    let cache = ImageCache::new(FakeSource::missing(&["gone.png"]));
    let err = block_on(cache.get("gone.png"));
    assert_eq!(err.map(|_| ()), Err(ImageLoadError { path: "gone.png".to_owned(), reason: "404".to_owned() }));
    assert!(cache.is_empty());
    assert!(block_on(cache.get("gone.png")).is_err());
    assert_eq!(cache.source().calls().len(), 2);
}

#[test]
fn load_error_message_names_path() {
    let err = ImageLoadError { path: "x.png".to_owned(), reason: "decode".to_owned() };
    assert_eq!(err.to_string(), "failed to load image x.png: decode");
}

// =============================================================
// HtmlImageSource
// =============================================================

#[test]
fn html_source_prefixes_base_path() {
    let source = HtmlImageSource::new("/data/drawings/");
    assert_eq!(source.resolve_url("site/plan.png"), "/data/drawings/site/plan.png");
}
