//! Synthetic backgrounds: a solid base color covered with random filled ellipses.

use image::{Rgba, RgbaImage};
use imageproc::filter::median_filter;
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SynthError};

/// red, green, blue, gray, yellow, purple, black
pub const DEFAULT_PALETTE: [[u8; 3]; 7] = [
    [255, 0, 0],
    [0, 128, 0],
    [0, 0, 255],
    [128, 128, 128],
    [255, 255, 0],
    [128, 0, 128],
    [0, 0, 0],
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackgroundStyle {
    pub width: u32,
    pub height: u32,
    /// Colors for the base fill and the ellipses.
    pub palette: Vec<[u8; 3]>,
    pub ellipses: usize,
    /// Bounding-box side range of each ellipse, inclusive.
    pub min_axis: u32,
    pub max_axis: u32,
    /// Radius of the median filter applied after painting (4 gives a 9x9
    /// window); `None` keeps hard edges.
    pub median_radius: Option<u32>,
}

impl Default for BackgroundStyle {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 1280,
            palette: DEFAULT_PALETTE.to_vec(),
            ellipses: 500,
            min_axis: 100,
            max_axis: 250,
            median_radius: Some(4),
        }
    }
}

impl BackgroundStyle {
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(SynthError::InvalidConfig(format!(
                "background size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.palette.is_empty() {
            return Err(SynthError::InvalidConfig("palette is empty".into()));
        }
        if self.min_axis == 0 || self.min_axis > self.max_axis {
            return Err(SynthError::InvalidConfig(format!(
                "invalid ellipse axis range {}..={}",
                self.min_axis, self.max_axis
            )));
        }
        Ok(())
    }
}

/// Paints a filled axis-aligned ellipse inscribed in the box `(x, y, w, h)`.
/// The box may start left of or above the canvas; pixels outside are clipped.
pub fn fill_ellipse(img: &mut RgbaImage, x: i64, y: i64, w: u32, h: u32, color: Rgba<u8>) {
    let (cw, ch) = img.dimensions();
    let rx = w as f64 / 2.0;
    let ry = h as f64 / 2.0;
    if rx <= 0.0 || ry <= 0.0 {
        return;
    }
    let cx = x as f64 + rx;
    let cy = y as f64 + ry;
    let x0 = x.max(0);
    let y0 = y.max(0);
    let x1 = (x + w as i64).min(cw as i64);
    let y1 = (y + h as i64).min(ch as i64);
    for py in y0..y1 {
        let dy = (py as f64 + 0.5 - cy) / ry;
        for px in x0..x1 {
            let dx = (px as f64 + 0.5 - cx) / rx;
            if dx * dx + dy * dy <= 1.0 {
                img.put_pixel(px as u32, py as u32, color);
            }
        }
    }
}

fn pick<R: Rng + ?Sized>(palette: &[[u8; 3]], rng: &mut R) -> Rgba<u8> {
    let c = palette.choose(rng).copied().unwrap_or([0, 0, 0]);
    Rgba([c[0], c[1], c[2], 255])
}

/// Generates one background in `style`.
pub fn synthesize_background<R: Rng + ?Sized>(
    style: &BackgroundStyle,
    rng: &mut R,
) -> Result<RgbaImage> {
    style.validate()?;
    let mut img = RgbaImage::from_pixel(style.width, style.height, pick(&style.palette, rng));
    for _ in 0..style.ellipses {
        let x = rng.gen_range(-15..=style.width as i64);
        let y = rng.gen_range(-15..=style.height as i64);
        let w = rng.gen_range(style.min_axis..=style.max_axis);
        let h = rng.gen_range(style.min_axis..=style.max_axis);
        let color = pick(&style.palette, rng);
        fill_ellipse(&mut img, x, y, w, h, color);
    }
    if let Some(r) = style.median_radius.filter(|r| *r > 0) {
        img = median_filter(&img, r, r);
    }
    Ok(img)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn ellipse_clips_at_canvas_edges() {
        let mut img = RgbaImage::new(10, 10);
        let red = Rgba([255, 0, 0, 255]);
        fill_ellipse(&mut img, -5, -5, 10, 10, red);
        assert_eq!(img.get_pixel(0, 0), &red);
        assert_eq!(img.get_pixel(9, 9), &Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn background_is_opaque_and_sized() {
        let style = BackgroundStyle {
            width: 64,
            height: 48,
            ellipses: 20,
            min_axis: 4,
            max_axis: 16,
            median_radius: None,
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        let img = synthesize_background(&style, &mut rng).expect("background");
        assert_eq!(img.dimensions(), (64, 48));
        assert!(img.pixels().all(|p| p[3] == 255));
    }

    #[test]
    fn median_filter_removes_isolated_specks() {
        let style = BackgroundStyle {
            width: 32,
            height: 32,
            palette: vec![[0, 0, 255]],
            ellipses: 0,
            median_radius: Some(1),
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(2);
        let smooth = synthesize_background(&style, &mut rng).expect("background");
        assert!(smooth.pixels().all(|p| *p == Rgba([0, 0, 255, 255])));

        let mut speckled = RgbaImage::from_pixel(9, 9, Rgba([0, 0, 255, 255]));
        speckled.put_pixel(4, 4, Rgba([255, 255, 0, 255]));
        let filtered = median_filter(&speckled, 1, 1);
        assert_eq!(filtered.get_pixel(4, 4), &Rgba([0, 0, 255, 255]));
    }
}
