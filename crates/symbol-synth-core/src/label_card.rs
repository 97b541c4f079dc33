//! Label-card examples: a white card carrying a row of symbols, pasted onto a
//! synthetic background.

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::background::{BackgroundStyle, synthesize_background};
use crate::compositing::overlay_masked;
use crate::error::{Result, SynthError};
use crate::library::SymbolLibrary;
use crate::model::{Annotation, Rect};
use crate::sink::Example;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LabelCardStyle {
    /// Card width as a fraction range of the background width, inclusive.
    pub width_fraction: (f32, f32),
    /// Card height as a fraction range of the background height, inclusive.
    pub height_fraction: (f32, f32),
    /// Symbols pasted side by side on each card.
    pub symbols_per_card: usize,
    /// Distance from the card's top edge to the symbol row.
    pub top_margin: u32,
    pub card_color: [u8; 3],
}

impl Default for LabelCardStyle {
    fn default() -> Self {
        Self {
            width_fraction: (0.2, 0.4),
            height_fraction: (0.5, 0.6),
            symbols_per_card: 2,
            top_margin: 10,
            card_color: [255, 255, 255],
        }
    }
}

impl LabelCardStyle {
    pub fn validate(&self) -> Result<()> {
        for (what, (lo, hi)) in [
            ("width_fraction", self.width_fraction),
            ("height_fraction", self.height_fraction),
        ] {
            if !(lo > 0.0 && lo <= hi && hi <= 1.0) {
                return Err(SynthError::InvalidConfig(format!(
                    "{} must satisfy 0 < min <= max <= 1, got {}..={}",
                    what, lo, hi
                )));
            }
        }
        if self.symbols_per_card == 0 {
            return Err(SynthError::InvalidConfig(
                "symbols_per_card must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn span(total: u32, (lo, hi): (f32, f32)) -> (u32, u32) {
    let a = (total as f32 * lo) as u32;
    let b = (total as f32 * hi) as u32;
    (a.max(1), b.max(a.max(1)))
}

/// Builds one example in label-card mode.
///
/// Notes:
/// - Symbol classes are drawn uniformly with replacement.
/// - Every symbol is scaled to a square of side `card_w / symbols_per_card`
///   (capped by the space below the margin) and pasted left to right at
///   `top_margin` from the card's top edge.
/// - Annotations are normalized against the background, so they include the
///   card's offset.
pub fn synthesize_labeled_example<R: Rng + ?Sized>(
    name: impl Into<String>,
    style: &BackgroundStyle,
    card: &LabelCardStyle,
    symbols: &SymbolLibrary,
    rng: &mut R,
) -> Result<Example> {
    card.validate()?;
    if symbols.is_empty() {
        return Err(SynthError::Empty("symbols"));
    }
    let mut canvas = synthesize_background(style, rng)?;
    let (bg_w, bg_h) = canvas.dimensions();

    let (w_lo, w_hi) = span(bg_w, card.width_fraction);
    let (h_lo, h_hi) = span(bg_h, card.height_fraction);
    let card_w = rng.gen_range(w_lo..=w_hi);
    let card_h = rng.gen_range(h_lo..=h_hi);
    let n = card.symbols_per_card as u32;
    let side = (card_w / n).min(card_h.saturating_sub(card.top_margin));
    if side == 0 {
        return Err(SynthError::InvalidConfig(format!(
            "a {}x{} card has no room for {} symbols below a {}px margin",
            card_w, card_h, n, card.top_margin
        )));
    }

    let [r, g, b] = card.card_color;
    let mut card_img = RgbaImage::from_pixel(card_w, card_h, Rgba([r, g, b, 255]));
    let mut row: Vec<(usize, Rect)> = Vec::with_capacity(card.symbols_per_card);
    for i in 0..n {
        let class = rng.gen_range(0..symbols.len());
        let Some(sym) = symbols.get(class) else {
            continue;
        };
        let scaled = imageops::resize(&sym.image, side, side, FilterType::Triangle);
        let local = Rect::new(side * i, card.top_margin, side, side);
        overlay_masked(&scaled, None, &mut card_img, local.x, local.y);
        row.push((class, local));
    }

    let card_x = rng.gen_range(0..=bg_w - card_w);
    let card_y = rng.gen_range(0..=bg_h - card_h);
    overlay_masked(&card_img, None, &mut canvas, card_x, card_y);
    debug!(card_x, card_y, card_w, card_h, side, "label card pasted");

    let annotations = row
        .into_iter()
        .map(|(class, local)| {
            let rect = Rect::new(card_x + local.x, card_y + local.y, local.w, local.h);
            Annotation::from_rect(class, &rect, bg_w, bg_h)
        })
        .collect();
    Ok(Example {
        name: name.into(),
        canvas,
        annotations,
    })
}
