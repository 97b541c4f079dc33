use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{instrument, warn};
use walkdir::WalkDir;

use crate::error::{Result, SynthError};
use crate::library::SUPPORTED_EXTENSIONS;
use crate::model::{Annotation, parse_annotations};

/// Pixel-space box in top-left form.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinates {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RectangleAnnotation {
    #[serde(rename = "type")]
    pub kind: String,
    pub label: String,
    pub coordinates: Coordinates,
}

/// One record per bounding box, carrying the file name of its image.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateMlRecord {
    pub image: String,
    pub annotations: Vec<RectangleAnnotation>,
}

/// Label string for `class_id`: the class name when known, otherwise the index.
fn label_for(class_id: usize, class_names: Option<&[String]>) -> String {
    class_names
        .and_then(|names| names.get(class_id))
        .cloned()
        .unwrap_or_else(|| class_id.to_string())
}

/// Converts the boxes of one image into CreateML records.
pub fn to_createml_records(
    image_name: &str,
    image_w: u32,
    image_h: u32,
    annotations: &[Annotation],
    class_names: Option<&[String]>,
) -> Vec<CreateMlRecord> {
    annotations
        .iter()
        .map(|a| {
            let (x, y, width, height) = a.to_pixel_top_left(image_w, image_h);
            CreateMlRecord {
                image: image_name.to_string(),
                annotations: vec![RectangleAnnotation {
                    kind: "rectangle".into(),
                    label: label_for(a.class_id, class_names),
                    coordinates: Coordinates {
                        x,
                        y,
                        width,
                        height,
                    },
                }],
            }
        })
        .collect()
}

/// Finds the image belonging to label file stem `stem` in `images_dir`.
fn find_image(images_dir: &Path, stem: &str) -> Option<PathBuf> {
    SUPPORTED_EXTENSIONS
        .iter()
        .map(|ext| images_dir.join(format!("{}.{}", stem, ext)))
        .find(|p| p.is_file())
}

#[instrument(skip_all, fields(labels = %labels_dir.display(), images = %images_dir.display()))]
/// Reads every `*.txt` label file in `labels_dir` and converts it to CreateML
/// records using the pixel size of the matching image in `images_dir`.
///
/// Notes:
/// - Label files are visited in file name order.
/// - Label files without a matching image are skipped with a warning.
/// - A malformed label line aborts the conversion.
pub fn collect_createml(
    labels_dir: &Path,
    images_dir: &Path,
    class_names: Option<&[String]>,
) -> Result<Vec<CreateMlRecord>> {
    let mut label_paths: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(labels_dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(std::io::Error::from)?;
        let p = entry.path();
        if entry.file_type().is_file() && p.extension().and_then(|e| e.to_str()) == Some("txt") {
            label_paths.push(p.to_path_buf());
        }
    }
    label_paths.sort();

    let mut records = Vec::new();
    for label_path in &label_paths {
        let stem = label_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let Some(image_path) = find_image(images_dir, &stem) else {
            warn!(?label_path, "no image for label file, skipping");
            continue;
        };
        let (w, h) = image::image_dimensions(&image_path)?;
        let text = fs::read_to_string(label_path)?;
        let annotations = parse_annotations(&text)?;
        let image_name = image_path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        records.extend(to_createml_records(&image_name, w, h, &annotations, class_names));
    }
    Ok(records)
}

/// Serializes CreateML records as a JSON array.
pub fn to_createml_json(records: &[CreateMlRecord]) -> Result<Value> {
    serde_json::to_value(records).map_err(SynthError::from)
}

/// Reads `classes.txt` style files: one class name per non-empty line.
pub fn read_class_names(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect())
}
