//! End-to-end runs through the public engine API with a scripted backend.

mod common;

use common::*;
use image::Rgb;
use vtrack_engine::features::CropSignature;
use vtrack_engine::{
    EngineError, EngineResult, Frame, FrameSource, RunStatus, VecFrameSink, VirtualCamera,
};
use vtrack_models::{BlurMode, BoundingBox, Detection, GalleryConfig};

fn gray(w: u32, h: u32) -> Frame {
    Frame::from_pixel(w, h, Rgb([60, 60, 60]))
}

#[test]
fn stationary_target_converges_zoom_and_center() {
    let bbox = BoundingBox::new(100.0, 100.0, 50.0, 50.0);
    let mut engine = engine(ScriptedBackend::new().on(0..25, vec![Detection::face(bbox, 0.9)]));
    engine.enable_zoom(2.0).unwrap();

    let mut sink = VecFrameSink::new();
    let report = engine.run(&mut source(25, &gray(250, 250)), &mut sink);

    assert!(report.is_success());
    assert_eq!(sink.frames.len(), 25);
    assert!(sink.frames.iter().all(|f| f.dimensions() == (250, 250)));

    let camera = report.final_camera.expect("zoom enabled");
    assert!((camera.zoom - 2.0).abs() < 0.05, "zoom {}", camera.zoom);
    assert!((camera.center_x - 125.0).abs() < 1e-9);
    assert!((camera.center_y - 125.0).abs() < 1e-9);
}

#[test]
fn stationary_target_zoom_rises_monotonically() {
    let bbox = BoundingBox::new(100.0, 100.0, 50.0, 50.0);
    let mut camera = VirtualCamera::new(250, 250, 2.0);
    let mut previous = camera.state().zoom;
    for _ in 0..10 {
        camera.advance(Some(&bbox));
        assert!(camera.state().zoom > previous);
        previous = camera.state().zoom;
    }
    // 0.12 blend per frame: 2 - 0.88^10
    assert!((previous - (2.0 - 0.88f64.powi(10))).abs() < 1e-9);
}

#[test]
fn lost_target_zooms_back_out() {
    let bbox = BoundingBox::new(60.0, 40.0, 40.0, 40.0);
    let mut engine = engine(ScriptedBackend::new().on(0..5, vec![Detection::face(bbox, 0.9)]));
    engine.enable_zoom(3.0).unwrap();
    let background = gray(200, 150);

    let at_five = engine.run(&mut source(5, &background), &mut VecFrameSink::new());
    let at_ten = engine.run(&mut source(10, &background), &mut VecFrameSink::new());

    let zoom_five = at_five.final_camera.unwrap().zoom;
    let zoom_ten = at_ten.final_camera.unwrap().zoom;
    assert!(zoom_ten < zoom_five, "{zoom_ten} !< {zoom_five}");
    assert!(zoom_ten >= 1.0);
    assert_eq!(at_ten.fallback_frames, 5);
}

#[test]
fn appearance_picks_target_between_equidistant_candidates() {
    let target = striped_patch(60, 60);
    let distractor = noise_patch(60, 60, 3);

    // frame 0: target alone in the middle; frame 1: target left, distractor
    // right, both 80px from the middle
    let mut frame0 = gray(300, 120);
    paste(&mut frame0, &target, 120, 30);
    let mut frame1 = gray(300, 120);
    paste(&mut frame1, &target, 40, 30);
    paste(&mut frame1, &distractor, 200, 30);
    frame0.put_pixel(0, 0, Rgb([0, 0, 0]));
    frame1.put_pixel(0, 0, Rgb([1, 0, 0]));

    let target_box = bbox_of(&target, 40, 30);
    let distractor_box = bbox_of(&distractor, 200, 30);
    let backend = ScriptedBackend::new()
        .on([0], vec![Detection::face(bbox_of(&target, 120, 30), 0.8)])
        .on(
            [1],
            vec![
                Detection::face(distractor_box, 0.95),
                Detection::face(target_box, 0.7),
            ],
        );
    let mut engine = engine(backend);
    engine.set_target_from_reference_image(&target).unwrap();
    engine.enable_blur(15, BlurMode::OnlyTarget).unwrap();

    let extractor = vtrack_engine::FeatureExtractor::Handcrafted;
    let reference = extractor.extract(&target).unwrap();
    let close = extractor.extract(&target).unwrap().similarity(&reference).unwrap();
    let far = extractor.extract(&distractor).unwrap().similarity(&reference).unwrap();
    assert!(close > 0.9 && far < close);

    let mut sink = VecFrameSink::new();
    let report = engine.run(
        &mut vtrack_engine::VecFrameSource::new(vec![frame0, frame1.clone()], 30.0).unwrap(),
        &mut sink,
    );

    assert!(report.is_success());
    assert_eq!(report.reidentified_frames, 2);
    let out = &sink.frames[1];
    for y in 30..90 {
        for x in 200..260 {
            assert_eq!(out.get_pixel(x, y), frame1.get_pixel(x, y), "distractor touched at ({x}, {y})");
        }
    }
    assert!(region_variance(out, &target_box) < region_variance(&frame1, &target_box));
}

#[test]
fn exclude_target_blurs_everyone_else() {
    let target = noise_patch(60, 60, 1);
    let other = striped_patch(60, 60);
    let mut background = gray(240, 100);
    paste(&mut background, &target, 20, 20);
    paste(&mut background, &other, 150, 20);
    let target_box = bbox_of(&target, 20, 20);
    let other_box = bbox_of(&other, 150, 20);

    let backend = ScriptedBackend::new().on(
        [0],
        vec![Detection::face(other_box, 0.9), Detection::face(target_box, 0.9)],
    );
    let mut engine = engine(backend);
    engine.set_target_from_reference_image(&target).unwrap();
    engine.enable_blur(21, BlurMode::ExcludeTarget).unwrap();

    let frames = stamped_frames(1, &background);
    let input = frames[0].clone();
    let mut sink = VecFrameSink::new();
    let report = engine.run(
        &mut vtrack_engine::VecFrameSource::new(frames, 30.0).unwrap(),
        &mut sink,
    );

    assert!(report.is_success());
    let out = &sink.frames[0];
    for y in 20..80 {
        for x in 20..80 {
            assert_eq!(out.get_pixel(x, y), input.get_pixel(x, y));
        }
    }
    assert!(region_variance(out, &other_box) < region_variance(&input, &other_box));
}

#[test]
fn gallery_has_no_near_duplicates_and_resolves_targets() {
    let patches = [
        (striped_patch(50, 50), 10u32),
        (noise_patch(50, 50, 7), 90),
        (Frame::from_pixel(50, 50, Rgb([20, 40, 200])), 170),
    ];
    let mut background = gray(240, 80);
    let mut detections = Vec::new();
    for (patch, x) in &patches {
        paste(&mut background, patch, *x, 15);
        detections.push(Detection::face(bbox_of(patch, *x, 15), 0.9));
    }
    let mut engine = engine(ScriptedBackend::new().on(0..30, detections));

    let entries = engine.build_gallery(&mut source(30, &background)).unwrap().to_vec();

    assert!(!entries.is_empty() && entries.len() <= 3);
    let config = GalleryConfig::default();
    for (i, a) in entries.iter().enumerate() {
        for b in &entries[i + 1..] {
            let similarity = CropSignature::from_crop(&a.representative_crop)
                .compare(&CropSignature::from_crop(&b.representative_crop));
            assert!(
                !similarity.is_duplicate(config.duplicate_threshold, config.secondary_ratio),
                "{} and {} are near-duplicates",
                a.id,
                b.id
            );
        }
    }

    for entry in &entries {
        let found = engine.find_gallery_match(&entry.representative_crop, None).unwrap();
        assert_eq!(found.map(|e| e.id.as_str()), Some(entry.id.as_str()));
    }

    engine.set_target_from_gallery(&entries[0].id).unwrap();
    assert_eq!(engine.target().map(|t| t.id()), Some(entries[0].id.as_str()));
}

#[test]
fn concurrent_runs_do_not_share_state() {
    let bbox = BoundingBox::new(100.0, 100.0, 50.0, 50.0);
    let mut engine = engine(ScriptedBackend::new().on(0..12, vec![Detection::face(bbox, 0.9)]));
    engine.enable_zoom(2.0).unwrap();
    let background = gray(250, 250);

    let (a, b) = std::thread::scope(|s| {
        let a = s.spawn(|| engine.run(&mut source(12, &background), &mut VecFrameSink::new()));
        let b = s.spawn(|| engine.run(&mut source(12, &background), &mut VecFrameSink::new()));
        (a.join().unwrap(), b.join().unwrap())
    });

    assert_ne!(a.run_id, b.run_id);
    assert_eq!(a.final_camera, b.final_camera);
    assert_eq!(a.frames_processed, 12);
}

#[test]
fn read_failure_stops_run_with_frames_so_far() {
    struct Truncated {
        inner: vtrack_engine::VecFrameSource,
        fail_at: u64,
        read: u64,
    }

    impl FrameSource for Truncated {
        fn next_frame(&mut self) -> EngineResult<Option<Frame>> {
            if self.read == self.fail_at {
                return Err(EngineError::invalid_image("truncated packet"));
            }
            self.read += 1;
            self.inner.next_frame()
        }

        fn dimensions(&self) -> (u32, u32) {
            self.inner.dimensions()
        }

        fn frame_rate(&self) -> f64 {
            self.inner.frame_rate()
        }
    }

    let engine = engine(ScriptedBackend::new());
    let mut source = Truncated {
        inner: source(6, &gray(64, 64)),
        fail_at: 3,
        read: 0,
    };
    let mut sink = VecFrameSink::new();

    let report = engine.run(&mut source, &mut sink);

    assert_eq!(report.frames_processed, 3);
    assert!(!sink.finished);
    assert!(matches!(
        report.status,
        RunStatus::Failed(EngineError::FrameRead { frame_index: 3, .. })
    ));
}
