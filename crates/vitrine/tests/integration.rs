//! Integration tests for the assembled pipeline
//!
//! Components fetch through the offline proxy, so a started pipeline keeps
//! serving seeded images after the network goes away.

use std::io::Cursor;
use std::sync::Arc;

use image::DynamicImage;
use vitrine::cache::{FileStorage, MemoryStorage, Representation};
use vitrine::loader::{ImageElement, LoadOutcome, LoadState, Rect, Viewport};
use vitrine::net::{Fetcher, StaticFetcher};
use vitrine::render::{ImageSource, ThumbnailOptions};
use vitrine::worker::{ProxyConfig, WorkerState};
use vitrine::{AssetPipeline, Config};

const PHOTO: &str = "/assets/images/1.png";

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([200, 40, 40, 255]));
    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn config() -> Config {
    Config {
        proxy: ProxyConfig {
            origin: "https://site.test/".into(),
            static_assets: vec!["/index.html".into()],
            gallery_images: vec![PHOTO.into()],
            ..Default::default()
        },
        ..Default::default()
    }
}

fn network() -> Arc<StaticFetcher> {
    let fetcher = Arc::new(StaticFetcher::new());
    fetcher.route_bytes("https://site.test/index.html", b"<html></html>".to_vec(), "text/html");
    fetcher.route_bytes(&format!("https://site.test{PHOTO}"), png(400, 200), "image/png");
    fetcher
}

fn started(network: Arc<StaticFetcher>) -> AssetPipeline {
    let pipeline = AssetPipeline::new(network, Arc::new(MemoryStorage::new()), config()).unwrap();
    smol::block_on(pipeline.start()).unwrap();
    pipeline
}

// ============================================================================
// WIRING
// ============================================================================

#[test]
fn test_start_activates_proxy() {
    let pipeline = started(network());
    assert_eq!(pipeline.proxy().state(), WorkerState::Activated);
    assert_eq!(pipeline.proxy().caches().stats()["events-studio-images-v1"], 1);
}

#[test]
fn test_invalid_config_rejected() {
    let mut config = config();
    config.loader.preload_count = 0;
    let result = AssetPipeline::new(network(), Arc::new(MemoryStorage::new()), config);
    assert!(matches!(result, Err(vitrine::Error::Config(_))));
}

#[test]
fn test_unstarted_proxy_passes_through() {
    let network = network();
    let pipeline = AssetPipeline::new(network.clone(), Arc::new(MemoryStorage::new()), config()).unwrap();
    let fetcher = vitrine::ProxyFetcher::new(pipeline.proxy().clone());

    let resp = smol::block_on(fetcher.get("https://site.test/index.html")).unwrap();
    assert!(resp.ok());
    assert!(pipeline.proxy().caches().keys().is_empty());
}

// ============================================================================
// OFFLINE DELIVERY
// ============================================================================

#[test]
fn test_scheduler_loads_seeded_image_offline() {
    let network = network();
    let pipeline = started(network.clone());
    network.set_offline(true);

    let scheduler = pipeline.scheduler();
    let id = scheduler.observe(
        ImageElement::new("")
            .with_attr("data-src", PHOTO)
            .with_attr("data-lazy", "true")
            .with_rect(Rect::new(0.0, 100.0, 400.0, 200.0)),
    );

    let outcomes = smol::block_on(scheduler.update_viewport(Viewport::new(0.0, 0.0, 800.0, 600.0)));
    assert_eq!(outcomes.len(), 1);
    assert!(matches!(outcomes[0], (got, LoadOutcome::Loaded { .. }) if got == id));
    assert_eq!(scheduler.load_state(PHOTO), LoadState::Loaded);

    let cached = pipeline.cache().get(PHOTO).unwrap();
    assert!(matches!(cached, Representation::Object(_)));
    assert_eq!(scheduler.element(id).unwrap().src, cached.as_src());
}

#[test]
fn test_thumbnail_from_offline_cache() {
    let network = network();
    let pipeline = started(network.clone());
    network.set_offline(true);

    let thumb = smol::block_on(
        pipeline
            .thumbnails()
            .generate(&ImageSource::from(PHOTO), ThumbnailOptions::default()),
    )
    .unwrap();
    assert!(thumb.size > 0);
    assert!(thumb.uri.as_str().starts_with("data:image/"));
}

#[test]
fn test_placeholder_never_fails_offline() {
    let network = network();
    let pipeline = started(network.clone());
    network.set_offline(true);

    let placeholder = smol::block_on(pipeline.placeholders().generate("/assets/images/unknown.png", None, None));
    assert!(placeholder.uri.as_str().starts_with("data:image/"));
}

// ============================================================================
// PERSISTENCE AND CLEARING
// ============================================================================

#[test]
fn test_thumbnails_persist_across_pipelines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("thumbs.json");

    let pipeline = AssetPipeline::new(network(), Arc::new(FileStorage::open(&path).unwrap()), config()).unwrap();
    smol::block_on(pipeline.start()).unwrap();
    smol::block_on(
        pipeline
            .thumbnails()
            .generate(&ImageSource::from(PHOTO), ThumbnailOptions::default()),
    )
    .unwrap();
    drop(pipeline);

    let reopened = AssetPipeline::new(network(), Arc::new(FileStorage::open(&path).unwrap()), config()).unwrap();
    assert_eq!(reopened.thumbnails().cache_stats().entries, 1);
}

#[test]
fn test_clear_all_is_idempotent() {
    let pipeline = started(network());
    let id = pipeline
        .scheduler()
        .observe(ImageElement::new(PHOTO).with_rect(Rect::new(0.0, 0.0, 10.0, 10.0)));
    smol::block_on(pipeline.scheduler().load(id, vitrine::loader::ScheduleTrigger::Manual));

    let first = pipeline.clear_all();
    assert_eq!(first.objects.released, 1);
    assert_eq!(first.caches, 2);

    let second = pipeline.clear_all();
    assert_eq!(second.objects.released, 0);
    assert_eq!(second.caches, 0);
    assert_eq!(pipeline.cache().len(), 0);
}

#[test]
fn test_logging_init_once() {
    vitrine::logging::init();
    assert!(!vitrine::logging::init());
}
