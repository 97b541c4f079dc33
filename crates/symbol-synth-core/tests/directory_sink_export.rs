use std::fs;
use std::path::PathBuf;

use image::{Rgba, RgbaImage};
use rand::SeedableRng;
use rand::rngs::StdRng;
use symbol_synth_core::export::{collect_createml, read_class_names, to_createml_json};
use symbol_synth_core::prelude::*;

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("symbol-synth-{}-{}", name, std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    dir
}

fn session(format: OutputFormat) -> DatasetSession {
    let symbols = SymbolLibrary::from_images(vec![
        ("circle".into(), RgbaImage::from_pixel(20, 20, Rgba([255, 0, 0, 255]))),
        ("arrow".into(), RgbaImage::from_pixel(30, 12, Rgba([0, 255, 0, 255]))),
        ("bolt".into(), RgbaImage::from_pixel(8, 24, Rgba([0, 0, 255, 255]))),
    ]);
    let backgrounds = BackgroundLibrary::from_images(vec![(
        "plain".into(),
        RgbaImage::from_pixel(160, 120, Rgba([40, 40, 40, 255])),
    )]);
    let cfg = SynthConfig::builder()
        .occurrences_per_class(2)
        .per_image(2, 3)
        .output_format(format)
        .build();
    DatasetSession::new(symbols, backgrounds, cfg).expect("session")
}

#[test]
fn directory_sink_writes_parallel_image_and_label_trees() {
    let root = scratch_dir("sink");
    let session = session(OutputFormat::Png);
    let mut sink = DirectorySink::create(&root, OutputFormat::Png).expect("sink");
    let mut rng = StdRng::seed_from_u64(10);
    let stats = session.generate(&mut rng, &mut sink).expect("generate");
    assert!(stats.examples >= 2);

    let classes = read_class_names(&root.join("classes.txt")).expect("classes");
    assert_eq!(classes, vec!["arrow", "bolt", "circle"]);

    for i in 0..stats.examples {
        let image_path = root.join("images").join(format!("img{}.png", i));
        let label_path = root.join("labels").join(format!("img{}.txt", i));
        assert!(image_path.is_file(), "missing {:?}", image_path);
        let text = fs::read_to_string(&label_path).expect("label");
        assert!(text.is_empty() || text.ends_with('\n'));
        for line in text.lines() {
            assert_eq!(line.split(' ').count(), 5);
        }
        assert_eq!(image::image_dimensions(&image_path).expect("dims"), (160, 120));
    }
    let _ = fs::remove_dir_all(&root);
}

#[test]
fn jpeg_output_is_decodable() {
    let root = scratch_dir("jpeg");
    let session = session(OutputFormat::Jpeg);
    let mut sink = DirectorySink::create(&root, OutputFormat::Jpeg).expect("sink");
    let mut rng = StdRng::seed_from_u64(11);
    session.generate(&mut rng, &mut sink).expect("generate");
    let img = image::open(root.join("images").join("img0.jpg")).expect("decode");
    assert_eq!((img.width(), img.height()), (160, 120));
    let _ = fs::remove_dir_all(&root);
}

#[test]
fn createml_export_uses_top_left_pixel_boxes() {
    let root = scratch_dir("createml");
    let session = session(OutputFormat::Png);
    let mut sink = DirectorySink::create(&root, OutputFormat::Png).expect("sink");
    let mut rng = StdRng::seed_from_u64(12);
    let mut collected: Vec<Example> = Vec::new();
    session.generate(&mut StdRng::seed_from_u64(12), &mut collected).expect("generate");
    session.generate(&mut rng, &mut sink).expect("generate");

    let names = read_class_names(&root.join("classes.txt")).expect("classes");
    let records = collect_createml(sink.labels_dir(), sink.images_dir(), Some(names.as_slice()))
        .expect("export");
    let total: usize = collected.iter().map(|e| e.annotations.len()).sum();
    assert_eq!(records.len(), total);

    // label files are visited in name order: img0, img1, ...
    let first = &collected[0];
    for (rec, a) in records.iter().zip(&first.annotations) {
        assert_eq!(rec.image, "img0.png");
        let ann = &rec.annotations[0];
        assert_eq!(ann.kind, "rectangle");
        assert_eq!(ann.label, names[a.class_id]);
        let (x, y, w, h) = a.to_pixel_top_left(160, 120);
        assert!((ann.coordinates.x - x).abs() < 1e-6);
        assert!((ann.coordinates.y - y).abs() < 1e-6);
        assert!((ann.coordinates.width - w).abs() < 1e-6);
        assert!((ann.coordinates.height - h).abs() < 1e-6);
    }

    let json = to_createml_json(&records).expect("json");
    let arr = json.as_array().expect("array");
    assert_eq!(arr.len(), records.len());
    if let Some(first) = arr.first() {
        assert!(first.get("image").is_some());
        assert_eq!(first["annotations"][0]["type"], "rectangle");
        assert!(first["annotations"][0]["coordinates"].get("width").is_some());
    }
    let _ = fs::remove_dir_all(&root);
}

#[test]
fn createml_export_rejects_malformed_labels() {
    let root = scratch_dir("malformed");
    let labels = root.join("labels");
    let images = root.join("images");
    fs::create_dir_all(&labels).expect("mkdir");
    fs::create_dir_all(&images).expect("mkdir");
    RgbaImage::new(10, 10).save(images.join("x.png")).expect("save");
    fs::write(labels.join("x.txt"), "0 0.5 0.5\n").expect("write");
    assert!(matches!(
        collect_createml(&labels, &images, None),
        Err(SynthError::Annotation { .. })
    ));
    let _ = fs::remove_dir_all(&root);
}

#[test]
fn failed_label_write_leaves_no_image_behind() {
    let root = scratch_dir("partial");
    let session = session(OutputFormat::Png);
    let mut sink = DirectorySink::create(&root, OutputFormat::Png).expect("sink");
    // a directory where the first label file should go makes that write fail
    fs::create_dir_all(root.join("labels").join("img0.txt")).expect("blocker");

    let mut rng = StdRng::seed_from_u64(3);
    let result = session.generate(&mut rng, &mut sink);
    assert!(result.is_err());
    assert!(!root.join("images").join("img0.png").exists());
    let _ = fs::remove_dir_all(&root);
}
