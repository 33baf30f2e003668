use std::io::{Cursor, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use gemini_unblend::blending::{apply_watermark, ALPHA_THRESHOLD};
use gemini_unblend::{
    AlphaMap, AlphaMapBuilder, Calibration, DirectorySink, DirectorySource, GeometryConfig,
    MaxChannelBuilder, PixelBuffer, ProcessOptions, Rect, SizeClass, WatermarkEngine, ZipSink,
};

/// A capture whose brightness ramps up to `max` (alpha up to `max / 255`).
#[allow(clippy::cast_possible_truncation)]
fn ramp_capture(size: u32, max: u32) -> PixelBuffer {
    let mut buf = PixelBuffer::new(size, size).unwrap();
    for y in 0..size {
        for x in 0..size {
            let v = ((y * size + x) * max / (size * size)) as u8;
            buf.pixel_mut(x, y).unwrap().copy_from_slice(&[v / 2, v, v / 3, 255]);
        }
    }
    buf
}

fn calibration() -> Calibration {
    Calibration::new(Some(ramp_capture(48, 127)), Some(ramp_capture(96, 127)))
}

#[allow(clippy::cast_possible_truncation)]
fn scene(width: u32, height: u32) -> PixelBuffer {
    let mut buf = PixelBuffer::new(width, height).unwrap();
    for y in 0..height {
        for x in 0..width {
            let px = [(x % 251) as u8, (y % 241) as u8, ((x * y) % 239) as u8, 255];
            buf.pixel_mut(x, y).unwrap().copy_from_slice(&px);
        }
    }
    buf
}

#[derive(Default)]
struct CountingBuilder {
    calls: AtomicUsize,
}

impl AlphaMapBuilder for CountingBuilder {
    fn build(&self, capture: Option<&PixelBuffer>, size: u32) -> AlphaMap {
        self.calls.fetch_add(1, Ordering::SeqCst);
        MaxChannelBuilder.build(capture, size)
    }
}

#[test]
fn removal_recovers_simulated_overlay() {
    let engine = WatermarkEngine::new(calibration());
    let original = scene(600, 400);
    let (class, rect) = engine.resolve(600, 400, None);
    assert_eq!(class, SizeClass::Small);

    let alpha_map = engine.alpha_map(class);
    let mut marked = original.clone();
    apply_watermark(&mut marked, rect, &alpha_map);
    assert_ne!(marked, original);

    let restored = engine.remove_watermark(marked.clone());
    let (rx, ry) = (u32::try_from(rect.x).unwrap(), u32::try_from(rect.y).unwrap());
    for row in 0..48 {
        for col in 0..48 {
            let alpha = alpha_map.values()[(row * 48 + col) as usize];
            let got = restored.pixel(rx + col, ry + row).unwrap();
            if f64::from(alpha) < ALPHA_THRESHOLD {
                assert_eq!(got, marked.pixel(rx + col, ry + row).unwrap());
                continue;
            }
            let want = original.pixel(rx + col, ry + row).unwrap();
            for ch in 0..3 {
                let diff = (i32::from(got[ch]) - i32::from(want[ch])).abs();
                assert!(diff <= 1, "({col},{row}) ch {ch}: {} vs {}", got[ch], want[ch]);
            }
            assert_eq!(got[3], want[3]);
        }
    }

    // Nothing outside the overlay rectangle moves
    assert_eq!(restored.pixel(0, 0), original.pixel(0, 0));
    assert_eq!(restored.pixel(599, 399), original.pixel(599, 399));
}

#[test]
fn large_images_use_large_overlay() {
    let engine = WatermarkEngine::new(calibration());
    let (class, rect) = engine.resolve(2000, 1500, None);
    assert_eq!(class, SizeClass::Large);
    assert_eq!(
        rect,
        Rect {
            x: 1840,
            y: 1340,
            width: 96,
            height: 96
        }
    );
}

#[test]
fn size_selection_boundary() {
    let engine = WatermarkEngine::new(Calibration::default());
    assert_eq!(engine.size_class_for(1024, 1024), SizeClass::Small);
    assert_eq!(engine.size_class_for(1025, 1025), SizeClass::Large);
    assert_eq!(engine.size_class_for(1025, 1000), SizeClass::Small);
}

#[test]
fn builder_runs_once_per_size_class() {
    let builder = Arc::new(CountingBuilder::default());
    let engine = WatermarkEngine::with_builder(
        calibration(),
        GeometryConfig::default(),
        Arc::clone(&builder) as Arc<dyn AlphaMapBuilder>,
    );

    let _ = engine.remove_watermark(scene(300, 300));
    let _ = engine.remove_watermark(scene(200, 500));
    assert_eq!(builder.calls.load(Ordering::SeqCst), 1);

    let _ = engine.remove_watermark(scene(1100, 1100));
    assert_eq!(builder.calls.load(Ordering::SeqCst), 2);
}

#[test]
fn concurrent_removal_builds_each_map_once() {
    let builder = Arc::new(CountingBuilder::default());
    let engine = WatermarkEngine::with_builder(
        calibration(),
        GeometryConfig::default(),
        Arc::clone(&builder) as Arc<dyn AlphaMapBuilder>,
    );

    std::thread::scope(|s| {
        for _ in 0..6 {
            s.spawn(|| engine.remove_watermark(scene(256, 256)));
        }
    });
    assert_eq!(builder.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn tiny_images_do_not_crash() {
    let engine = WatermarkEngine::new(calibration());
    for (w, h) in [(1, 1), (20, 20), (79, 200), (100, 60)] {
        let out = engine.remove_watermark(scene(w, h));
        assert_eq!((out.width(), out.height()), (w, h));
    }

    let mut big = scene(500, 500);
    engine.remove(&mut big, Some(SizeClass::Large));
    assert_eq!((big.width(), big.height()), (500, 500));
}

#[test]
fn missing_calibration_leaves_image_unchanged() {
    let engine = WatermarkEngine::new(Calibration::new(Some(ramp_capture(48, 127)), None));
    assert!(!engine.has_assets());
    let img = scene(1200, 1200);
    assert_eq!(engine.remove_watermark(img.clone()), img);
}

#[test]
fn directory_calibration_feeds_engine() {
    let dir = tempfile::tempdir().unwrap();
    let source = DirectorySource::new(dir.path());
    source.store(SizeClass::Small, &ramp_capture(48, 127)).unwrap();
    source.store(SizeClass::Large, &ramp_capture(96, 127)).unwrap();

    let engine = WatermarkEngine::from_source(&source);
    assert!(engine.has_assets());
    let expected = WatermarkEngine::new(calibration()).alpha_map(SizeClass::Large);
    assert_eq!(*engine.alpha_map(SizeClass::Large), *expected);
}

#[test]
fn process_file_writes_cleaned_png() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("photo.png");
    let output = dir.path().join("out").join("clean_photo.png");
    std::fs::write(&input, scene(300, 200).to_png().unwrap()).unwrap();

    let engine = WatermarkEngine::new(calibration());
    let result = engine.process_file(&input, &output, &ProcessOptions::default());
    assert!(result.success, "{}", result.message);
    assert!(!result.skipped);
    assert_eq!(result.size_class, Some(SizeClass::Small));

    let written = gemini_unblend::load_image(&output).unwrap();
    assert_eq!((written.width(), written.height()), (300, 200));
}

#[test]
fn process_file_skips_without_calibration() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("photo.png");
    let output = dir.path().join("clean_photo.png");
    std::fs::write(&input, scene(64, 64).to_png().unwrap()).unwrap();

    let engine = WatermarkEngine::new(Calibration::default());
    let result = engine.process_file(&input, &output, &ProcessOptions::default());
    assert!(result.success);
    assert!(result.skipped);
    assert!(result.message.contains("unchanged"), "{}", result.message);

    let written = gemini_unblend::load_image(&output).unwrap();
    assert_eq!(written, scene(64, 64));
}

#[test]
fn batch_passes_through_images_without_calibration() {
    let input_dir = tempfile::tempdir().unwrap();
    let output_dir = tempfile::tempdir().unwrap();
    std::fs::write(input_dir.path().join("a.png"), scene(80, 60).to_png().unwrap()).unwrap();

    let engine = WatermarkEngine::new(Calibration::default());
    let mut sink = DirectorySink::new(output_dir.path()).unwrap();
    let results = engine.process_directory(input_dir.path(), &mut sink, &ProcessOptions::default());

    assert_eq!(results.len(), 1);
    assert!(results[0].success);
    assert!(results[0].skipped);
    assert_eq!(results[0].size_class, Some(SizeClass::Small));

    let written = gemini_unblend::load_image(&output_dir.path().join("clean_a.png")).unwrap();
    assert_eq!(written, scene(80, 60));
}

#[test]
fn batch_isolates_failures() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.png");
    let bad = dir.path().join("bad.png");
    std::fs::write(&good, scene(120, 90).to_png().unwrap()).unwrap();
    std::fs::write(&bad, b"not really a png").unwrap();

    let engine = WatermarkEngine::new(calibration());
    let mut sink = ZipSink::new(Cursor::new(Vec::new()));
    let results = engine.process_batch(
        &[bad.clone(), good.clone()],
        &mut sink,
        &ProcessOptions::default(),
    );

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].path, bad);
    assert!(!results[0].success);
    assert_eq!(results[1].path, good);
    assert!(results[1].success, "{}", results[1].message);

    // The batch already finalized the archive; its entries stay readable
    assert!(sink.is_finished());
    let mut archive = zip::ZipArchive::new(sink.into_inner().unwrap()).unwrap();
    assert_eq!(archive.len(), 1);
    assert_eq!(archive.file_names().collect::<Vec<_>>(), ["clean_good.png"]);

    let mut png = Vec::new();
    archive
        .by_name("clean_good.png")
        .unwrap()
        .read_to_end(&mut png)
        .unwrap();
    let cleaned = PixelBuffer::decode(&png).unwrap();
    assert_eq!((cleaned.width(), cleaned.height()), (120, 90));
}

#[test]
fn directory_batch_writes_into_sink_directory() {
    let input_dir = tempfile::tempdir().unwrap();
    let output_dir = tempfile::tempdir().unwrap();
    for name in ["a.png", "b.png"] {
        std::fs::write(input_dir.path().join(name), scene(100, 100).to_png().unwrap()).unwrap();
    }
    std::fs::write(input_dir.path().join("readme.txt"), b"skip me").unwrap();

    let engine = WatermarkEngine::new(calibration());
    let mut sink = DirectorySink::new(output_dir.path()).unwrap();
    let results = engine.process_directory(input_dir.path(), &mut sink, &ProcessOptions::default());

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.success));
    assert!(output_dir.path().join("clean_a.png").is_file());
    assert!(output_dir.path().join("clean_b.png").is_file());
}

#[test]
fn unreadable_directory_reports_failure() {
    let dir = tempfile::tempdir().unwrap();
    let engine = WatermarkEngine::new(calibration());
    let mut sink = DirectorySink::new(dir.path().join("out")).unwrap();
    let results = engine.process_directory(
        &dir.path().join("missing"),
        &mut sink,
        &ProcessOptions::default(),
    );
    assert_eq!(results.len(), 1);
    assert!(!results[0].success);
}
