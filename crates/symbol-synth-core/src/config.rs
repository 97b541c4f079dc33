use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::placement::DEFAULT_ATTEMPTS_PER_SYMBOL;

// Dataset generation configuration.
// Key notes:
//   - the draw pool holds every symbol class `occurrences_per_class` times
//   - each image receives between `min_per_image` and `max_per_image` draws
//     (the last one may get fewer)
//   - the three `apply_*` switches enable per-symbol transforms independently
//   - `parallel` composes batches on the rayon pool when the `parallel` feature is on

/// Encoding used for generated images.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Png,
    Jpeg,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }

    pub fn image_format(&self) -> image::ImageFormat {
        match self {
            Self::Png => image::ImageFormat::Png,
            Self::Jpeg => image::ImageFormat::Jpeg,
        }
    }
}

impl FromStr for OutputFormat {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SynthConfig {
    /// How many times each symbol class appears in the draw pool.
    #[serde(default = "default_occurrences")]
    pub occurrences_per_class: usize,
    /// Smallest number of symbols drawn for one image.
    #[serde(default = "default_min_per_image")]
    pub min_per_image: usize,
    /// Largest number of symbols drawn for one image.
    #[serde(default = "default_max_per_image")]
    pub max_per_image: usize,
    /// Random positions tried per symbol before it is dropped.
    #[serde(default = "default_attempts")]
    pub attempts_per_symbol: u32,

    /// Resize each symbol relative to the chosen background.
    #[serde(default)]
    pub apply_relative_resize: bool,
    /// Rotate each symbol by a random angle from `rotation_angles`.
    #[serde(default)]
    pub apply_random_rotation: bool,
    /// Put each symbol on a random opaque solid-color backing.
    #[serde(default)]
    pub apply_random_matte: bool,

    /// Target longest side of a resized symbol, as a fraction of the
    /// background's shorter side.
    #[serde(default = "default_resize_fractions")]
    pub resize_fractions: Vec<f32>,
    /// Allowed rotation angles in degrees (clockwise, multiples of 90).
    #[serde(default = "default_rotation_angles")]
    pub rotation_angles: Vec<u32>,

    /// Encoding of generated images.
    #[serde(default = "default_output_format")]
    pub output_format: OutputFormat,
    /// Example names are `<name_prefix><n>`.
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,
    /// Number of the first generated example.
    #[serde(default)]
    pub first_index: usize,
    /// Draw red outlines around placed boxes (debug).
    #[serde(default)]
    pub draw_boxes: bool,
    /// Compose batches in parallel when feature "parallel" is on.
    #[serde(default)]
    pub parallel: bool,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            occurrences_per_class: default_occurrences(),
            min_per_image: default_min_per_image(),
            max_per_image: default_max_per_image(),
            attempts_per_symbol: default_attempts(),
            apply_relative_resize: false,
            apply_random_rotation: false,
            apply_random_matte: false,
            resize_fractions: default_resize_fractions(),
            rotation_angles: default_rotation_angles(),
            output_format: default_output_format(),
            name_prefix: default_name_prefix(),
            first_index: 0,
            draw_boxes: false,
            parallel: false,
        }
    }
}

impl SynthConfig {
    /// Validates the configuration parameters that do not depend on the inputs.
    ///
    /// Returns an error if:
    /// - a per-image bound is zero or the bounds are inverted
    /// - the attempt budget is zero
    /// - an enabled transform has nothing to choose from or an invalid choice
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::SynthError;

        if self.occurrences_per_class == 0 {
            return Err(SynthError::InvalidConfig(
                "occurrences_per_class must be at least 1".into(),
            ));
        }
        if self.min_per_image == 0 {
            return Err(SynthError::InvalidConfig(
                "min_per_image must be at least 1".into(),
            ));
        }
        if self.min_per_image > self.max_per_image {
            return Err(SynthError::InvalidConfig(format!(
                "min_per_image ({}) exceeds max_per_image ({})",
                self.min_per_image, self.max_per_image
            )));
        }
        if self.attempts_per_symbol == 0 {
            return Err(SynthError::InvalidConfig(
                "attempts_per_symbol must be at least 1".into(),
            ));
        }
        if self.apply_relative_resize {
            if self.resize_fractions.is_empty() {
                return Err(SynthError::InvalidConfig(
                    "resize is enabled but resize_fractions is empty".into(),
                ));
            }
            if let Some(f) = self
                .resize_fractions
                .iter()
                .find(|f| !(f.is_finite() && **f > 0.0 && **f <= 1.0))
            {
                return Err(SynthError::InvalidConfig(format!(
                    "resize fraction {} is outside (0, 1]",
                    f
                )));
            }
        }
        if self.apply_random_rotation {
            if self.rotation_angles.is_empty() {
                return Err(SynthError::InvalidConfig(
                    "rotation is enabled but rotation_angles is empty".into(),
                ));
            }
            if let Some(a) = self.rotation_angles.iter().find(|a| **a % 90 != 0) {
                return Err(SynthError::InvalidConfig(format!(
                    "rotation angle {} is not a multiple of 90",
                    a
                )));
            }
        }
        Ok(())
    }

    /// Size of the draw pool for `num_classes` symbol classes.
    pub fn pool_size(&self, num_classes: usize) -> usize {
        num_classes.saturating_mul(self.occurrences_per_class)
    }

    /// Full validation against the number of available symbol classes.
    pub fn validate_for(&self, num_classes: usize) -> crate::error::Result<()> {
        use crate::error::SynthError;

        self.validate()?;
        let pool = self.pool_size(num_classes);
        if self.max_per_image > pool {
            return Err(SynthError::PoolTooSmall {
                max_per_image: self.max_per_image,
                pool,
            });
        }
        Ok(())
    }
}

fn default_occurrences() -> usize {
    1
}
fn default_min_per_image() -> usize {
    1
}
fn default_max_per_image() -> usize {
    5
}
fn default_attempts() -> u32 {
    DEFAULT_ATTEMPTS_PER_SYMBOL
}
fn default_resize_fractions() -> Vec<f32> {
    vec![0.05, 0.1, 0.15, 0.2]
}
fn default_rotation_angles() -> Vec<u32> {
    vec![0, 90, 180, 270]
}
fn default_output_format() -> OutputFormat {
    OutputFormat::Jpeg
}
fn default_name_prefix() -> String {
    "img".into()
}

/// Builder for `SynthConfig` for ergonomic construction.
#[derive(Debug, Default, Clone)]
pub struct SynthConfigBuilder {
    cfg: SynthConfig,
}

impl SynthConfigBuilder {
    pub fn new() -> Self {
        Self {
            cfg: SynthConfig::default(),
        }
    }
    pub fn occurrences_per_class(mut self, v: usize) -> Self {
        self.cfg.occurrences_per_class = v;
        self
    }
    pub fn per_image(mut self, min: usize, max: usize) -> Self {
        self.cfg.min_per_image = min;
        self.cfg.max_per_image = max;
        self
    }
    pub fn attempts_per_symbol(mut self, v: u32) -> Self {
        self.cfg.attempts_per_symbol = v;
        self
    }
    pub fn relative_resize(mut self, v: bool) -> Self {
        self.cfg.apply_relative_resize = v;
        self
    }
    pub fn random_rotation(mut self, v: bool) -> Self {
        self.cfg.apply_random_rotation = v;
        self
    }
    pub fn random_matte(mut self, v: bool) -> Self {
        self.cfg.apply_random_matte = v;
        self
    }
    pub fn resize_fractions(mut self, v: Vec<f32>) -> Self {
        self.cfg.resize_fractions = v;
        self
    }
    pub fn rotation_angles(mut self, v: Vec<u32>) -> Self {
        self.cfg.rotation_angles = v;
        self
    }
    pub fn output_format(mut self, v: OutputFormat) -> Self {
        self.cfg.output_format = v;
        self
    }
    pub fn name_prefix(mut self, v: impl Into<String>) -> Self {
        self.cfg.name_prefix = v.into();
        self
    }
    pub fn first_index(mut self, v: usize) -> Self {
        self.cfg.first_index = v;
        self
    }
    pub fn draw_boxes(mut self, v: bool) -> Self {
        self.cfg.draw_boxes = v;
        self
    }
    pub fn parallel(mut self, v: bool) -> Self {
        self.cfg.parallel = v;
        self
    }
    pub fn build(self) -> SynthConfig {
        self.cfg
    }
}

impl SynthConfig {
    /// Create a fluent builder for `SynthConfig`.
    pub fn builder() -> SynthConfigBuilder {
        SynthConfigBuilder::new()
    }
}
