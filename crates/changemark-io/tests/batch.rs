//! Integration tests: whole batches over temporary directories.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::num::NonZeroUsize;
use std::path::Path;

use changemark_io::{
    BatchConfig, BatchError, ManifestError, PairError, PairOutcome, PairingSource, RunReport,
    SkipKind, run_batch,
};
use changemark_pipeline::{BoundingBox, DetectionConfig};
use image::{Rgb, RgbImage};

fn gray(width: u32, height: u32, value: u8) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb([value, value, value]))
}

fn with_block(mut img: RgbImage, x: u32, y: u32, size: u32) -> RgbImage {
    for yy in y..y + size {
        for xx in x..x + size {
            img.put_pixel(xx, yy, Rgb([230, 230, 230]));
        }
    }
    img
}

fn save(dir: &Path, name: &str, img: &RgbImage) {
    img.save(dir.join(name)).unwrap();
}

fn config_for(input: &Path, output: &Path) -> BatchConfig {
    BatchConfig {
        input_dir: input.to_path_buf(),
        output_dir: output.to_path_buf(),
        jobs: NonZeroUsize::new(2),
        ..BatchConfig::default()
    }
}

#[test]
fn mismatched_pair_is_skipped_while_good_pair_succeeds() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();

    save(input.path(), "good.png", &gray(100, 100, 60));
    save(input.path(), "good~2.png", &with_block(gray(100, 100, 60), 25, 25, 50));
    save(input.path(), "odd.png", &gray(100, 100, 60));
    save(input.path(), "odd~2.png", &gray(200, 200, 60));

    let result = run_batch(&config_for(input.path(), output.path())).unwrap();

    assert_eq!(result.summary.annotated, 1);
    assert_eq!(result.summary.dimension_mismatch, 1);
    match &result.outcomes[..] {
        [
            PairOutcome::Annotated {
                base_name,
                result_path,
                boxes,
                ..
            },
            PairOutcome::Skipped {
                base_name: skipped,
                reason: PairError::DimensionMismatch { .. },
            },
        ] => {
            assert_eq!(base_name, "good");
            assert_eq!(skipped, "odd");
            assert_eq!(boxes, &vec![BoundingBox::new(21, 21, 58, 58)]);
            assert_eq!(*result_path, output.path().join("good~3.png"));
            assert!(result_path.is_file());
        }
        other => panic!("unexpected outcomes: {other:?}"),
    }

    assert!(output.path().join("good.png").is_file());
    assert!(!output.path().join("odd~3.png").exists());
}

#[test]
fn missing_counterpart_and_corrupt_file_are_skipped() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();

    save(input.path(), "alone.png", &gray(20, 20, 10));
    save(input.path(), "broken.png", &gray(20, 20, 10));
    std::fs::write(input.path().join("broken~2.png"), b"not a png").unwrap();

    let result = run_batch(&config_for(input.path(), output.path())).unwrap();
    let kinds: Vec<_> = result
        .outcomes
        .iter()
        .map(|o| match o {
            PairOutcome::Skipped { reason, .. } => Some(reason.kind()),
            PairOutcome::Annotated { .. } => None,
        })
        .collect();
    assert_eq!(
        kinds,
        vec![
            Some(SkipKind::MissingCounterpart),
            Some(SkipKind::LoadFailure)
        ]
    );
    assert_eq!(result.summary.skipped, 2);
}

#[test]
fn unchanged_pair_is_written_without_boxes() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let img = gray(64, 64, 120);
    save(input.path(), "same.png", &img);
    save(input.path(), "same~2.png", &img);

    let result = run_batch(&config_for(input.path(), output.path())).unwrap();
    assert_eq!(result.summary.annotated, 1);
    assert_eq!(result.summary.total_boxes, 0);

    let written = image::open(output.path().join("same~3.png")).unwrap().to_rgb8();
    assert_eq!(written, img);
}

#[test]
fn output_directory_is_created() {
    let input = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let output = scratch.path().join("results/nested");

    let result = run_batch(&config_for(input.path(), &output)).unwrap();
    assert_eq!(result.summary.total(), 0);
    assert!(output.is_dir());
}

#[test]
fn missing_input_directory_is_fatal() {
    let scratch = tempfile::tempdir().unwrap();
    let err = run_batch(&config_for(
        &scratch.path().join("absent"),
        &scratch.path().join("out"),
    ))
    .unwrap_err();
    assert!(matches!(err, BatchError::InputDirectory { .. }));
    assert!(!scratch.path().join("out").exists());
}

#[test]
fn manifest_pairs_arbitrary_file_names() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    save(input.path(), "monday.png", &gray(80, 80, 40));
    save(input.path(), "friday.png", &with_block(gray(80, 80, 40), 10, 10, 30));
    let manifest = input.path().join("pairs.json");
    std::fs::write(
        &manifest,
        r#"[
            { "base_name": "door", "before": "monday.png", "after": "friday.png" },
            { "base_name": "gate", "before": "tuesday.png", "after": "sunday.png" }
        ]"#,
    )
    .unwrap();

    let config = BatchConfig {
        pairing: PairingSource::Manifest(manifest),
        ..config_for(input.path(), output.path())
    };
    let result = run_batch(&config).unwrap();

    assert_eq!(result.summary.annotated, 1);
    assert_eq!(result.summary.missing_counterpart, 1);
    assert!(output.path().join("door~3.png").is_file());
    assert!(output.path().join("monday.png").is_file());
}

#[test]
fn diagnostics_are_collected_on_request() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    save(input.path(), "p.png", &gray(50, 50, 0));
    save(input.path(), "p~2.png", &with_block(gray(50, 50, 0), 5, 5, 30));

    let config = BatchConfig {
        collect_diagnostics: true,
        ..config_for(input.path(), output.path())
    };
    let result = run_batch(&config).unwrap();
    let PairOutcome::Annotated {
        diagnostics: Some(diag),
        ..
    } = &result.outcomes[0]
    else {
        panic!("expected diagnostics: {:?}", result.outcomes);
    };
    assert_eq!(diag.summary.box_count, 1);

    let json: serde_json::Value =
        serde_json::from_str(&RunReport::new(&config, &result).to_json().unwrap()).unwrap();
    assert!(json["pairs"][0]["diagnostics"]["total_duration"].is_number());
}

#[test]
fn invalid_parameters_stop_the_run_before_any_output() {
    let input = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let output = scratch.path().join("out");
    let config = BatchConfig {
        detection: DetectionConfig {
            iterations: 1_000,
            ..DetectionConfig::default()
        },
        ..config_for(input.path(), &output)
    };
    assert!(matches!(
        run_batch(&config),
        Err(BatchError::InvalidParameter(_))
    ));
    assert!(!output.exists());
}

#[test]
fn manifest_with_clashing_before_names_stops_the_run() {
    let input = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let output = scratch.path().join("out");
    for (sub, value) in [("a", 40), ("b", 200)] {
        let dir = input.path().join(sub);
        std::fs::create_dir(&dir).unwrap();
        save(&dir, "img.png", &gray(40, 40, value));
        save(&dir, "img-after.png", &gray(40, 40, value));
    }
    let manifest = input.path().join("pairs.json");
    std::fs::write(
        &manifest,
        r#"[
            { "base_name": "first", "before": "a/img.png", "after": "a/img-after.png" },
            { "base_name": "second", "before": "b/img.png", "after": "b/img-after.png" }
        ]"#,
    )
    .unwrap();

    let config = BatchConfig {
        pairing: PairingSource::Manifest(manifest),
        ..config_for(input.path(), &output)
    };
    let err = run_batch(&config).unwrap_err();
    assert!(matches!(
        err,
        BatchError::Manifest {
            source: ManifestError::OutputCollision { .. },
            ..
        }
    ));
    assert!(!output.exists());
}
