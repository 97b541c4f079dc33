use std::path::{Path, PathBuf};

use image::{ImageReader, RgbaImage};
use tracing::{info, instrument};
use walkdir::WalkDir;

use crate::error::Result;
use crate::placement::SymbolInstance;

/// File extensions accepted for symbols and backgrounds.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

pub fn is_supported_image(p: &Path) -> bool {
    matches!(
        p.extension()
            .and_then(|e| e.to_str())
            .map(|s| s.to_ascii_lowercase()),
        Some(ext) if SUPPORTED_EXTENSIONS.contains(&ext.as_str())
    )
}

/// Lists supported images directly inside `dir`, sorted by file name.
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut list: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(std::io::Error::from)?;
        let p = entry.path();
        if entry.file_type().is_file() && is_supported_image(p) {
            list.push(p.to_path_buf());
        }
    }
    list.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(list)
}

pub fn load_rgba(p: &Path) -> Result<RgbaImage> {
    let img = ImageReader::open(p)?.with_guessed_format()?.decode()?;
    Ok(img.to_rgba8())
}

fn file_stem(p: &Path) -> String {
    p.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// One symbol class: its index, its name (file stem) and its source image.
#[derive(Debug, Clone)]
pub struct SymbolClass {
    pub id: usize,
    pub name: String,
    pub image: RgbaImage,
}

impl SymbolClass {
    pub fn instance(&self) -> SymbolInstance {
        SymbolInstance::new(self.id, self.image.clone())
    }
}

/// Symbol classes indexed by ascending file name.
#[derive(Debug, Clone, Default)]
pub struct SymbolLibrary {
    classes: Vec<SymbolClass>,
}

impl SymbolLibrary {
    /// Builds a library from named images. Names are sorted and class ids
    /// assigned in that order, matching what `load_dir` produces.
    pub fn from_images(mut named: Vec<(String, RgbaImage)>) -> Self {
        named.sort_by(|a, b| a.0.cmp(&b.0));
        let classes = named
            .into_iter()
            .enumerate()
            .map(|(id, (name, image))| SymbolClass { id, name, image })
            .collect();
        Self { classes }
    }

    #[instrument(skip_all, fields(dir = %dir.display()))]
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let paths = list_images(dir)?;
        let mut classes = Vec::with_capacity(paths.len());
        for (id, p) in paths.iter().enumerate() {
            classes.push(SymbolClass {
                id,
                name: file_stem(p),
                image: load_rgba(p)?,
            });
        }
        info!(count = classes.len(), "loaded symbol classes");
        Ok(Self { classes })
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn get(&self, id: usize) -> Option<&SymbolClass> {
        self.classes.get(id)
    }

    pub fn classes(&self) -> &[SymbolClass] {
        &self.classes
    }

    /// Class names in index order.
    pub fn names(&self) -> Vec<String> {
        self.classes.iter().map(|c| c.name.clone()).collect()
    }
}

#[derive(Debug, Clone)]
pub struct Background {
    pub name: String,
    pub image: RgbaImage,
}

/// Background canvases, sorted by file name.
#[derive(Debug, Clone, Default)]
pub struct BackgroundLibrary {
    backgrounds: Vec<Background>,
}

impl BackgroundLibrary {
    pub fn from_images(mut named: Vec<(String, RgbaImage)>) -> Self {
        named.sort_by(|a, b| a.0.cmp(&b.0));
        let backgrounds = named
            .into_iter()
            .map(|(name, image)| Background { name, image })
            .collect();
        Self { backgrounds }
    }

    #[instrument(skip_all, fields(dir = %dir.display()))]
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let paths = list_images(dir)?;
        let mut backgrounds = Vec::with_capacity(paths.len());
        for p in &paths {
            backgrounds.push(Background {
                name: file_stem(p),
                image: load_rgba(p)?,
            });
        }
        info!(count = backgrounds.len(), "loaded backgrounds");
        Ok(Self { backgrounds })
    }

    pub fn len(&self) -> usize {
        self.backgrounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backgrounds.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Background> {
        self.backgrounds.get(idx)
    }

    pub fn backgrounds(&self) -> &[Background] {
        &self.backgrounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_ids_follow_name_order() {
        let lib = SymbolLibrary::from_images(vec![
            ("C150".into(), RgbaImage::new(1, 1)),
            ("A300".into(), RgbaImage::new(2, 2)),
            ("B500".into(), RgbaImage::new(3, 3)),
        ]);
        assert_eq!(lib.names(), vec!["A300", "B500", "C150"]);
        assert_eq!(lib.get(1).map(|c| c.image.width()), Some(3));
        assert_eq!(lib.get(2).map(|c| c.id), Some(2));
    }

    #[test]
    fn extension_filter_is_case_insensitive() {
        assert!(is_supported_image(Path::new("a/B.PNG")));
        assert!(is_supported_image(Path::new("x.jpeg")));
        assert!(!is_supported_image(Path::new("x.gif")));
        assert!(!is_supported_image(Path::new("noext")));
    }
}
