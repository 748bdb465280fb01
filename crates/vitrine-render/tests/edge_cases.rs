//! Edge case tests for vitrine-render
//!
//! Placeholder degradation, thumbnail persistence and batch behaviour.

use std::io::Cursor;
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::DynamicImage;
use vitrine_cache::{AssetFormat, KeyValueStore, MemoryStorage};
use vitrine_net::StaticFetcher;
use vitrine_render::*;

fn png(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba(rgba));
    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn generator(fetcher: Arc<StaticFetcher>, storage: Arc<MemoryStorage>) -> ThumbnailGenerator {
    ThumbnailGenerator::new(fetcher, storage, ThumbnailConfig::default())
}

// ============================================================================
// PLACEHOLDER DEGRADATION
// ============================================================================

#[test]
fn test_placeholder_unreachable_source_resolves() {
    let fetcher = Arc::new(StaticFetcher::new());
    fetcher.set_offline(true);
    let placeholders = PlaceholderGenerator::new(fetcher, PlaceholderConfig::default());

    let started = Instant::now();
    let placeholder = smol::block_on(placeholders.generate("https://gallery.test/missing.jpg", None, None));

    assert_eq!(placeholder.kind, PlaceholderKind::DominantColor);
    assert_eq!(placeholder.uri.mime_type(), "image/png");
    assert!(started.elapsed() < PlaceholderConfig::default().timeout() * 2);
}

#[test]
fn test_placeholder_malformed_bytes() {
    let fetcher = Arc::new(StaticFetcher::new());
    fetcher.route_bytes("https://gallery.test/broken.jpg", b"not really a jpeg".to_vec(), "image/jpeg");
    let placeholders = PlaceholderGenerator::new(fetcher, PlaceholderConfig::default());

    let placeholder = smol::block_on(placeholders.generate("https://gallery.test/broken.jpg", None, None));
    assert_ne!(placeholder.kind, PlaceholderKind::LowQuality);
    assert!(placeholder.uri.decode().is_some());
}

#[test]
fn test_placeholder_times_out_on_slow_network() {
    let fetcher = Arc::new(StaticFetcher::new().with_latency(Duration::from_millis(500)));
    fetcher.route_bytes("https://gallery.test/slow.png", png(4, 4, [0, 0, 255, 255]), "image/png");
    let config = PlaceholderConfig { timeout_ms: 20, ..Default::default() };
    let placeholders = PlaceholderGenerator::new(fetcher, config);

    let started = Instant::now();
    let placeholder = smol::block_on(placeholders.generate("https://gallery.test/slow.png", None, None));

    assert_eq!(placeholder.kind, PlaceholderKind::DominantColor);
    assert_eq!(placeholders.cached_colors(), 0);
    assert!(started.elapsed() < Duration::from_millis(400));
}

#[test]
fn test_red_source_gradient_stops() {
    let fetcher = Arc::new(StaticFetcher::new());
    fetcher.route_bytes("https://gallery.test/red.png", png(64, 32, [255, 0, 0, 255]), "image/png");
    let placeholders = PlaceholderGenerator::new(fetcher, PlaceholderConfig::default());

    let color = smol::block_on(placeholders.color_for("https://gallery.test/red.png", None));
    assert_eq!(color, Rgb::new(255, 0, 0));
    assert_eq!(color.lighten(placeholders.config().lighten_percent), Rgb::new(255, 51, 51));
}

// ============================================================================
// THUMBNAIL PERSISTENCE
// ============================================================================

#[test]
fn test_thumbnail_round_trip_does_not_reencode() {
    let fetcher = Arc::new(StaticFetcher::new());
    fetcher.route_bytes("https://gallery.test/a.png", png(400, 200, [10, 200, 30, 255]), "image/png");
    let storage = Arc::new(MemoryStorage::new());
    let thumbnails = generator(Arc::clone(&fetcher), Arc::clone(&storage));
    let source = ImageSource::from("https://gallery.test/a.png");

    let first = smol::block_on(thumbnails.generate(&source, ThumbnailOptions::default())).unwrap();
    let second = smol::block_on(thumbnails.generate(&source, ThumbnailOptions::default())).unwrap();

    assert_eq!(first.bytes(), second.bytes());
    assert_eq!(thumbnails.encode_count(), 1);
    assert_eq!(fetcher.request_count("https://gallery.test/a.png"), 1);

    // A fresh generator over the same storage serves the persisted entry
    let reopened = generator(Arc::clone(&fetcher), storage);
    let third = smol::block_on(reopened.generate(&source, ThumbnailOptions::default())).unwrap();
    assert_eq!(third.bytes(), first.bytes());
    assert_eq!(reopened.encode_count(), 0);
}

#[test]
fn test_thumbnail_dimensions_keep_aspect() {
    let storage = Arc::new(MemoryStorage::new());
    let thumbnails = generator(Arc::new(StaticFetcher::new()), storage);
    let source = ImageSource::file("tall.png", png(100, 400, [0, 0, 0, 255]));

    let thumb = smol::block_on(thumbnails.generate(&source, ThumbnailOptions::default())).unwrap();
    let decoded = ImageDecoder::decode(&thumb.bytes().unwrap()).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (50, 200));
}

#[test]
fn test_thumbnail_prefers_webp_then_jpeg() {
    let storage = Arc::new(MemoryStorage::new());
    let source = ImageSource::file("x.png", png(20, 20, [1, 2, 3, 255]));

    let webp = ThumbnailGenerator::with_format_support(
        Arc::new(StaticFetcher::new()),
        Arc::clone(&storage) as Arc<dyn KeyValueStore>,
        ThumbnailConfig::default(),
        FormatSupport { webp: true, avif: false },
    );
    let thumb = smol::block_on(webp.generate(&source, ThumbnailOptions::default())).unwrap();
    assert_eq!(thumb.format, AssetFormat::Webp);
    assert_eq!(thumb.extension, ".webp");

    let legacy = ThumbnailGenerator::with_format_support(
        Arc::new(StaticFetcher::new()),
        Arc::new(MemoryStorage::new()),
        ThumbnailConfig::default(),
        FormatSupport::none(),
    );
    let thumb = smol::block_on(legacy.generate(&source, ThumbnailOptions::default())).unwrap();
    assert_eq!(thumb.format, AssetFormat::Jpeg);
    assert_eq!(thumb.uri.mime_type(), "image/jpeg");
}

#[test]
fn test_storage_failure_is_not_fatal() {
    let thumbnails = ThumbnailGenerator::new(
        Arc::new(StaticFetcher::new()),
        Arc::new(MemoryStorage::disabled()),
        ThumbnailConfig::default(),
    );
    let source = ImageSource::file("x.png", png(8, 8, [9, 9, 9, 255]));

    assert!(smol::block_on(thumbnails.generate(&source, ThumbnailOptions::default())).is_ok());
}

#[test]
fn test_thumbnail_unreachable_source_errors() {
    let fetcher = Arc::new(StaticFetcher::new());
    fetcher.set_offline(true);
    let thumbnails = generator(fetcher, Arc::new(MemoryStorage::new()));

    let err = smol::block_on(thumbnails.generate(&ImageSource::from("https://gallery.test/x.png"), ThumbnailOptions::default()))
        .unwrap_err();
    assert!(matches!(err, ThumbnailError::Fetch(_)));
}

#[test]
fn test_expired_entries_swept_at_startup() {
    let storage = Arc::new(MemoryStorage::new());
    storage
        .set_item(
            "events_thumb_stale",
            r#"{"data":{"url":"data:image/jpeg;base64,AAAA","format":"jpeg","extension":".jpg","size":3},"timestamp":0}"#,
        )
        .unwrap();

    let thumbnails = generator(Arc::new(StaticFetcher::new()), Arc::clone(&storage));
    assert_eq!(thumbnails.cache_stats().entries, 0);
    assert!(storage.get_item("events_thumb_stale").unwrap().is_none());
}

// ============================================================================
// MULTI-SIZE AND BATCH
// ============================================================================

#[test]
fn test_generate_multiple_defaults() {
    let thumbnails = generator(Arc::new(StaticFetcher::new()), Arc::new(MemoryStorage::new()));
    let source = ImageSource::file("wide.png", png(800, 400, [50, 50, 50, 255]));

    let results = smol::block_on(thumbnails.generate_multiple(&source, &[]));
    let names: Vec<_> = results.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, ["small", "medium", "large"]);
    assert!(results.iter().all(|(_, r)| r.is_ok()));
    assert_eq!(thumbnails.cache_stats().entries, 3);
}

#[test]
fn test_generate_multiple_reports_partial_failure() {
    let thumbnails = generator(Arc::new(StaticFetcher::new()), Arc::new(MemoryStorage::new()));
    let source = ImageSource::file("x.png", png(10, 10, [0, 0, 0, 255]));
    let sizes = [NamedSize::new("empty", 0, 0), NamedSize::new("ok", 5, 5)];

    let results = smol::block_on(thumbnails.generate_multiple(&source, &sizes));
    assert!(matches!(results[0].1, Err(ThumbnailError::EmptyImage)));
    assert!(results[1].1.is_ok());
}

#[test]
fn test_batch_keeps_order_and_isolates_failures() {
    let fetcher = Arc::new(StaticFetcher::new());
    let mut sources = Vec::new();
    for i in 0..7 {
        let url = format!("https://gallery.test/{i}.png");
        if i != 3 {
            fetcher.route_bytes(&url, png(16, 16, [i as u8, 0, 0, 255]), "image/png");
        }
        sources.push(ImageSource::Url(url));
    }
    let thumbnails = generator(fetcher, Arc::new(MemoryStorage::new()));

    let started = Instant::now();
    let items = smol::block_on(thumbnails.batch_process(sources.clone(), ThumbnailOptions::default()));

    assert_eq!(items.len(), 7);
    for (item, source) in items.iter().zip(&sources) {
        assert_eq!(&item.source, source);
    }
    assert!(!items[3].is_success());
    assert_eq!(items.iter().filter(|i| i.is_success()).count(), 6);
    // Two groups, one pause between them
    assert!(started.elapsed() >= Duration::from_millis(100));
}

#[test]
fn test_clear_cache() {
    let storage = Arc::new(MemoryStorage::new());
    let thumbnails = generator(Arc::new(StaticFetcher::new()), Arc::clone(&storage));
    let source = ImageSource::file("x.png", png(10, 10, [0, 0, 0, 255]));
    smol::block_on(thumbnails.generate(&source, ThumbnailOptions::default())).unwrap();

    assert_eq!(thumbnails.clear_cache(), 1);
    assert_eq!(thumbnails.cache_stats().entries, 0);
    assert!(storage.is_empty());
    assert_eq!(thumbnails.clear_cache(), 0);
}
