use image::imageops::{self, FilterType};
use image::GrayImage;
use rand::Rng;
use rand::seq::SliceRandom;

use crate::compositing::matte;
use crate::config::SynthConfig;
use crate::placement::SymbolInstance;

/// Scales `symbol` so its longest side becomes `fraction` of the background's
/// shorter side. Aspect ratio is kept; sides never drop below 1px.
pub fn resize_relative(
    symbol: &SymbolInstance,
    bg_w: u32,
    bg_h: u32,
    fraction: f32,
) -> SymbolInstance {
    let target = (bg_w.min(bg_h) as f32 * fraction).round().max(1.0);
    let (w, h) = (symbol.width(), symbol.height());
    let longest = w.max(h).max(1) as f32;
    let scale = target / longest;
    let nw = ((w as f32 * scale).round() as u32).max(1);
    let nh = ((h as f32 * scale).round() as u32).max(1);
    SymbolInstance {
        class_id: symbol.class_id,
        image: imageops::resize(&symbol.image, nw, nh, FilterType::Triangle),
        mask: symbol
            .mask
            .as_ref()
            .map(|m| imageops::resize(m, nw, nh, FilterType::Triangle)),
    }
}

/// Rotates `symbol` clockwise by `degrees` (a multiple of 90).
pub fn rotate_quarter_turns(symbol: &SymbolInstance, degrees: u32) -> SymbolInstance {
    fn turn<P: image::Pixel + 'static>(
        img: &image::ImageBuffer<P, Vec<P::Subpixel>>,
        quarter: u32,
    ) -> image::ImageBuffer<P, Vec<P::Subpixel>> {
        match quarter {
            1 => imageops::rotate90(img),
            2 => imageops::rotate180(img),
            3 => imageops::rotate270(img),
            _ => img.clone(),
        }
    }
    let quarter = (degrees / 90) % 4;
    SymbolInstance {
        class_id: symbol.class_id,
        image: turn(&symbol.image, quarter),
        mask: symbol.mask.as_ref().map(|m: &GrayImage| turn(m, quarter)),
    }
}

/// Places `symbol` on an opaque backing of `color` with the symbol's own size.
/// The result is fully opaque, so any mask is dropped.
pub fn apply_matte(symbol: &SymbolInstance, color: [u8; 3]) -> SymbolInstance {
    SymbolInstance::new(symbol.class_id, matte(&symbol.image, symbol.mask.as_ref(), color))
}

/// Random opaque RGB color.
pub fn random_matte_color<R: Rng + ?Sized>(rng: &mut R) -> [u8; 3] {
    [rng.r#gen(), rng.r#gen(), rng.r#gen()]
}

/// Applies the transforms enabled in `cfg` to one symbol, in the order
/// resize, rotate, matte. Each choice is drawn from `rng`.
pub fn transform_symbol<R: Rng + ?Sized>(
    symbol: SymbolInstance,
    bg_w: u32,
    bg_h: u32,
    cfg: &SynthConfig,
    rng: &mut R,
) -> SymbolInstance {
    let mut out = symbol;
    if cfg.apply_relative_resize {
        if let Some(&fraction) = cfg.resize_fractions.choose(rng) {
            out = resize_relative(&out, bg_w, bg_h, fraction);
        }
    }
    if cfg.apply_random_rotation {
        if let Some(&degrees) = cfg.rotation_angles.choose(rng) {
            if degrees % 360 != 0 {
                out = rotate_quarter_turns(&out, degrees);
            }
        }
    }
    if cfg.apply_random_matte {
        out = apply_matte(&out, random_matte_color(rng));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn resize_keeps_aspect_and_targets_shorter_background_side() {
        let sym = SymbolInstance::new(0, RgbaImage::new(200, 100));
        let out = resize_relative(&sym, 1000, 500, 0.2);
        // target longest side = 0.2 * 500
        assert_eq!(out.width(), 100);
        assert_eq!(out.height(), 50);
        assert_eq!(out.class_id, 0);
    }

    #[test]
    fn quarter_turn_swaps_dimensions() {
        let sym = SymbolInstance::new(4, RgbaImage::new(30, 10));
        let r = rotate_quarter_turns(&sym, 90);
        assert_eq!((r.width(), r.height()), (10, 30));
        let r = rotate_quarter_turns(&sym, 180);
        assert_eq!((r.width(), r.height()), (30, 10));
        assert_eq!(r.class_id, 4);
    }

    #[test]
    fn matte_makes_transparent_pixels_opaque() {
        let sym = SymbolInstance::new(1, RgbaImage::new(4, 4));
        let m = apply_matte(&sym, [10, 20, 30]);
        assert!(m.mask.is_none());
        assert_eq!(m.image.get_pixel(2, 2), &Rgba([10, 20, 30, 255]));
    }
}
