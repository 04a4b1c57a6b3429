//! Cover fetches through the row binder against a mocked image server.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use book_listing_core::binding::{RowBinder, RowSlot};
use book_listing_core::dispatch::UiQueue;
use book_listing_core::fetch::{HttpFetcher, HttpOptions};
use book_listing_core::volume::Volume;
use image::{DynamicImage, ImageFormat, RgbImage};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn png(width: u32, height: u32) -> Vec<u8> {
    let mut buf = std::io::Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(RgbImage::new(width, height))
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

async fn mount_image(server: &MockServer, route: &str, body: Vec<u8>, delay: Option<Duration>) {
    let mut response = ResponseTemplate::new(200).set_body_bytes(body);
    if let Some(d) = delay {
        response = response.set_delay(d);
    }
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(response)
        .mount(server)
        .await;
}

fn binder(queue: &UiQueue) -> RowBinder {
    RowBinder::new(
        HttpFetcher::new(&HttpOptions::default()).unwrap(),
        tokio::runtime::Handle::current(),
        queue.handle(),
    )
}

/// Records `(label, width, height)` for each delivered cover.
type Deliveries = Arc<Mutex<Vec<(&'static str, u32, u32)>>>;

fn record(log: &Deliveries, label: &'static str) -> impl FnOnce(book_listing_core::volume::CoverImage) + Send + 'static {
    let log = log.clone();
    move |img| log.lock().unwrap().push((label, img.width(), img.height()))
}

async fn drain_one(queue: &mut UiQueue) {
    tokio::time::timeout(Duration::from_secs(5), queue.next())
        .await
        .expect("cover delivery timed out");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fetched_cover_is_stored_and_delivered() {
    let server = MockServer::start().await;
    mount_image(&server, "/cover.png", png(8, 12), None).await;

    let mut queue = UiQueue::new();
    let b = binder(&queue);
    let slot = RowSlot::new(0);
    let volume = Arc::new(Volume::new("A", vec![], format!("{}/cover.png", server.uri())));
    let log: Deliveries = Arc::default();

    b.bind(&slot, volume.clone(), record(&log, "a"));
    assert!(slot.is_fetching());
    drain_one(&mut queue).await;

    assert_eq!(*log.lock().unwrap(), vec![("a", 8, 12)]);
    assert_eq!(volume.cover_image().map(|c| (c.width(), c.height())), Some((8, 12)));
    assert!(slot.displayed_image().is_some());
    assert!(!slot.is_fetching());

    // Rebinding later is served from the volume, no second request.
    let other = RowSlot::new(1);
    b.bind(&other, volume.clone(), record(&log, "again"));
    assert_eq!(log.lock().unwrap().len(), 2);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rebinding_slot_cancels_previous_fetch() {
    let server = MockServer::start().await;
    mount_image(&server, "/slow.png", png(2, 2), Some(Duration::from_millis(600))).await;
    mount_image(&server, "/fast.png", png(5, 7), None).await;

    let mut queue = UiQueue::new();
    let b = binder(&queue);
    let slot = RowSlot::new(0);
    let a = Arc::new(Volume::new("A", vec![], format!("{}/slow.png", server.uri())));
    let bv = Arc::new(Volume::new("B", vec![], format!("{}/fast.png", server.uri())));
    let log: Deliveries = Arc::default();

    b.bind(&slot, a.clone(), record(&log, "a"));
    b.bind(&slot, bv.clone(), record(&log, "b"));
    drain_one(&mut queue).await;

    // Give the slow response time to arrive had it not been canceled.
    tokio::time::sleep(Duration::from_millis(900)).await;
    queue.run_pending();

    assert_eq!(*log.lock().unwrap(), vec![("b", 5, 7)]);
    assert!(a.cover_image().is_none());
    assert_eq!(slot.displayed_image().map(|c| (c.width(), c.height())), Some((5, 7)));
    assert!(Arc::ptr_eq(&slot.bound_volume().unwrap(), &bv));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn completed_but_undelivered_fetch_is_dropped_on_rebind() {
    let server = MockServer::start().await;
    mount_image(&server, "/a.png", png(3, 3), None).await;

    let mut queue = UiQueue::new();
    let b = binder(&queue);
    let slot = RowSlot::new(0);
    let a = Arc::new(Volume::new("A", vec![], format!("{}/a.png", server.uri())));
    let log: Deliveries = Arc::default();

    b.bind(&slot, a.clone(), record(&log, "a"));
    // Let the fetch finish and queue its delivery without draining.
    for _ in 0..50 {
        if a.cover_image().is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(a.cover_image().is_some());

    b.bind(&slot, Arc::new(Volume::new("None", vec![], "")), record(&log, "none"));
    queue.run_pending();
    assert!(log.lock().unwrap().is_empty());
    assert!(slot.displayed_image().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn same_volume_rebind_keeps_fetch_and_uses_latest_callback() {
    let server = MockServer::start().await;
    mount_image(&server, "/c.png", png(4, 4), Some(Duration::from_millis(200))).await;

    let mut queue = UiQueue::new();
    let b = binder(&queue);
    let slot = RowSlot::new(0);
    let v = Arc::new(Volume::new("C", vec![], format!("{}/c.png", server.uri())));
    let log: Deliveries = Arc::default();

    b.bind(&slot, v.clone(), record(&log, "first"));
    b.bind(&slot, v.clone(), record(&log, "second"));
    drain_one(&mut queue).await;

    assert_eq!(*log.lock().unwrap(), vec![("second", 4, 4)]);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn undecodable_or_missing_cover_leaves_no_image() {
    let server = MockServer::start().await;
    mount_image(&server, "/junk.png", b"not an image at all".to_vec(), None).await;
    Mock::given(method("GET"))
        .and(path("/missing.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let mut queue = UiQueue::new();
    let b = binder(&queue);
    let junk_slot = RowSlot::new(0);
    let missing_slot = RowSlot::new(1);
    let junk = Arc::new(Volume::new("Junk", vec![], format!("{}/junk.png", server.uri())));
    let missing = Arc::new(Volume::new("Missing", vec![], format!("{}/missing.png", server.uri())));
    let log: Deliveries = Arc::default();

    b.bind(&junk_slot, junk.clone(), record(&log, "junk"));
    b.bind(&missing_slot, missing.clone(), record(&log, "missing"));

    for _ in 0..100 {
        if !junk_slot.is_fetching() && !missing_slot.is_fetching() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(!junk_slot.is_fetching());
    assert!(!missing_slot.is_fetching());
    assert_eq!(queue.run_pending(), 0);
    assert!(log.lock().unwrap().is_empty());
    assert!(junk.cover_image().is_none());
    assert!(missing.cover_image().is_none());
    assert!(junk_slot.displayed_image().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn independent_slots_complete_in_any_order() {
    let server = MockServer::start().await;
    mount_image(&server, "/slow.png", png(1, 2), Some(Duration::from_millis(300))).await;
    mount_image(&server, "/fast.png", png(3, 4), None).await;

    let mut queue = UiQueue::new();
    let b = binder(&queue);
    let s0 = RowSlot::new(0);
    let s1 = RowSlot::new(1);
    let log: Deliveries = Arc::default();

    b.bind(&s0, Arc::new(Volume::new("slow", vec![], format!("{}/slow.png", server.uri()))), record(&log, "slow"));
    b.bind(&s1, Arc::new(Volume::new("fast", vec![], format!("{}/fast.png", server.uri()))), record(&log, "fast"));
    drain_one(&mut queue).await;
    drain_one(&mut queue).await;

    let mut got = log.lock().unwrap().clone();
    got.sort();
    assert_eq!(got, vec![("fast", 3, 4), ("slow", 1, 2)]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn one_volume_in_two_slots_is_fetched_once() {
    let server = MockServer::start().await;
    mount_image(&server, "/shared.png", png(6, 9), Some(Duration::from_millis(300))).await;

    let mut queue = UiQueue::new();
    let b = binder(&queue);
    let s0 = RowSlot::new(0);
    let s1 = RowSlot::new(1);
    let v = Arc::new(Volume::new("Shared", vec![], format!("{}/shared.png", server.uri())));
    let log: Deliveries = Arc::default();

    b.bind(&s0, v.clone(), record(&log, "s0"));
    b.bind(&s1, v.clone(), record(&log, "s1"));
    assert!(s0.is_fetching() && s1.is_fetching());
    drain_one(&mut queue).await;
    drain_one(&mut queue).await;

    let mut got = log.lock().unwrap().clone();
    got.sort();
    assert_eq!(got, vec![("s0", 6, 9), ("s1", 6, 9)]);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
    let (a, c) = (s0.displayed_image().unwrap(), s1.displayed_image().unwrap());
    assert!(a.ptr_eq(&c));
    assert!(a.ptr_eq(v.cover_image().unwrap()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shared_fetch_survives_until_last_slot_leaves() {
    let server = MockServer::start().await;
    mount_image(&server, "/kept.png", png(2, 5), Some(Duration::from_millis(300))).await;
    mount_image(&server, "/dropped.png", png(1, 1), Some(Duration::from_millis(300))).await;

    let mut queue = UiQueue::new();
    let b = binder(&queue);
    let log: Deliveries = Arc::default();

    // One of two subscribers leaves: the other still gets the cover.
    let kept = Arc::new(Volume::new("Kept", vec![], format!("{}/kept.png", server.uri())));
    let (k0, k1) = (RowSlot::new(0), RowSlot::new(1));
    b.bind(&k0, kept.clone(), record(&log, "k0"));
    b.bind(&k1, kept.clone(), record(&log, "k1"));
    b.recycle(&k0);

    // Every subscriber leaves: the fetch is aborted and nothing is written.
    let dropped = Arc::new(Volume::new("Dropped", vec![], format!("{}/dropped.png", server.uri())));
    let (d0, d1) = (RowSlot::new(2), RowSlot::new(3));
    b.bind(&d0, dropped.clone(), record(&log, "d0"));
    b.bind(&d1, dropped.clone(), record(&log, "d1"));
    b.recycle(&d0);
    b.recycle(&d1);

    drain_one(&mut queue).await;
    tokio::time::sleep(Duration::from_millis(600)).await;
    queue.run_pending();

    assert_eq!(*log.lock().unwrap(), vec![("k1", 2, 5)]);
    assert!(kept.cover_image().is_some());
    assert!(dropped.cover_image().is_none());
    assert!(k0.displayed_image().is_none());
}
