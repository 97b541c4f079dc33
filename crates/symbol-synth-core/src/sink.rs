use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::buffer::ConvertBuffer;
use image::{RgbImage, RgbaImage};
use tracing::debug;

use crate::config::OutputFormat;
use crate::error::Result;
use crate::model::{Annotation, annotations_to_text};

/// One generated training example: composited image plus its boxes.
#[derive(Debug, Clone)]
pub struct Example {
    pub name: String,
    pub canvas: RgbaImage,
    pub annotations: Vec<Annotation>,
}

impl Example {
    /// Label file body for this example.
    pub fn label_text(&self) -> String {
        annotations_to_text(&self.annotations)
    }
}

/// Destination for generated examples.
///
/// `write` is called once per example, in example order. Implementations must
/// not leave a partially written example behind when they return an error.
pub trait ExampleSink {
    fn write(&mut self, example: &Example) -> Result<()>;

    /// Called once before the first example with the class names in index order.
    fn begin(&mut self, _class_names: &[String]) -> Result<()> {
        Ok(())
    }
}

/// Collects examples in memory.
impl ExampleSink for Vec<Example> {
    fn write(&mut self, example: &Example) -> Result<()> {
        self.push(example.clone());
        Ok(())
    }
}

/// Encodes `canvas` in `format`. JPEG output drops the alpha channel.
pub fn encode_image(canvas: &RgbaImage, format: OutputFormat) -> Result<Vec<u8>> {
    let mut bytes: Vec<u8> = Vec::new();
    let mut cursor = Cursor::new(&mut bytes);
    match format {
        OutputFormat::Png => canvas.write_to(&mut cursor, format.image_format())?,
        OutputFormat::Jpeg => {
            let rgb: RgbImage = canvas.convert();
            rgb.write_to(&mut cursor, format.image_format())?
        }
    }
    Ok(bytes)
}

/// Writes `images/<name>.<ext>` and `labels/<name>.txt` under a root directory,
/// plus `classes.txt` with one class name per line.
pub struct DirectorySink {
    root: PathBuf,
    images_dir: PathBuf,
    labels_dir: PathBuf,
    format: OutputFormat,
}

impl DirectorySink {
    /// Creates the output folder structure under `root`.
    pub fn create(root: &Path, format: OutputFormat) -> Result<Self> {
        let images_dir = root.join("images");
        let labels_dir = root.join("labels");
        fs::create_dir_all(&images_dir)?;
        fs::create_dir_all(&labels_dir)?;
        Ok(Self {
            root: root.to_path_buf(),
            images_dir,
            labels_dir,
            format,
        })
    }

    pub fn image_path(&self, name: &str) -> PathBuf {
        self.images_dir
            .join(format!("{}.{}", name, self.format.extension()))
    }

    pub fn label_path(&self, name: &str) -> PathBuf {
        self.labels_dir.join(format!("{}.txt", name))
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    pub fn labels_dir(&self) -> &Path {
        &self.labels_dir
    }
}

impl ExampleSink for DirectorySink {
    fn begin(&mut self, class_names: &[String]) -> Result<()> {
        let mut body = class_names.join("\n");
        if !body.is_empty() {
            body.push('\n');
        }
        fs::write(self.root.join("classes.txt"), body)?;
        Ok(())
    }

    fn write(&mut self, example: &Example) -> Result<()> {
        // encode both artifacts before touching the filesystem
        let bytes = encode_image(&example.canvas, self.format)?;
        let labels = example.label_text();

        let image_path = self.image_path(&example.name);
        let label_path = self.label_path(&example.name);
        fs::write(&image_path, bytes)?;
        if let Err(e) = fs::write(&label_path, labels) {
            let _ = fs::remove_file(&image_path);
            return Err(e.into());
        }
        debug!(?image_path, boxes = example.annotations.len(), "example written");
        Ok(())
    }
}
