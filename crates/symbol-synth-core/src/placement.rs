use image::{DynamicImage, GrayImage, Rgba, RgbaImage};
use rand::Rng;
use tracing::{debug, instrument};

use crate::compositing::{outline_rect, overlay_masked};
use crate::error::{Result, SynthError};
use crate::model::{Annotation, Placement, Rect, SkipReason, SkippedSymbol};

/// Number of random positions tried per symbol unless configured otherwise.
pub const DEFAULT_ATTEMPTS_PER_SYMBOL: u32 = 20;

/// A symbol raster tagged with the class it represents.
///
/// The class index is fixed when the symbol is loaded and travels with the
/// instance through every transform, so placement order never affects labels.
#[derive(Debug, Clone)]
pub struct SymbolInstance {
    pub class_id: usize,
    pub image: RgbaImage,
    /// Optional overlay mask (same size as `image`). When absent the alpha
    /// channel of `image` decides which pixels are pasted.
    pub mask: Option<GrayImage>,
}

impl SymbolInstance {
    pub fn new(class_id: usize, image: RgbaImage) -> Self {
        Self {
            class_id,
            image,
            mask: None,
        }
    }

    pub fn from_dynamic(class_id: usize, image: &DynamicImage) -> Self {
        Self::new(class_id, image.to_rgba8())
    }

    pub fn with_mask(mut self, mask: GrayImage) -> Self {
        self.mask = Some(mask);
        self
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }
}

/// Output of one placement round.
#[derive(Debug, Clone)]
pub struct PlacementResult {
    /// Copy of the background with every accepted symbol pasted on it.
    pub canvas: RgbaImage,
    /// Accepted symbols in placement order.
    pub placements: Vec<Placement>,
    /// One normalized box per entry of `placements`, same order.
    pub annotations: Vec<Annotation>,
    pub skipped: Vec<SkippedSymbol>,
}

impl PlacementResult {
    pub fn placed_rects(&self) -> impl Iterator<Item = &Rect> {
        self.placements.iter().map(|p| &p.rect)
    }
}

/// Random non-overlapping placement with a bounded number of attempts per symbol.
#[derive(Debug, Clone)]
pub struct PlacementEngine {
    attempts_per_symbol: u32,
    box_outline: Option<Rgba<u8>>,
}

impl Default for PlacementEngine {
    fn default() -> Self {
        Self {
            attempts_per_symbol: DEFAULT_ATTEMPTS_PER_SYMBOL,
            box_outline: None,
        }
    }
}

impl PlacementEngine {
    pub fn new(attempts_per_symbol: u32) -> Result<Self> {
        if attempts_per_symbol == 0 {
            return Err(SynthError::InvalidConfig(
                "attempts_per_symbol must be at least 1".into(),
            ));
        }
        Ok(Self {
            attempts_per_symbol,
            box_outline: None,
        })
    }

    /// Draw a 1px outline of this color around each placed box (debug).
    pub fn with_box_outline(mut self, color: Option<Rgba<u8>>) -> Self {
        self.box_outline = color;
        self
    }

    pub fn attempts_per_symbol(&self) -> u32 {
        self.attempts_per_symbol
    }

    #[instrument(
        skip_all,
        fields(symbols = symbols.len(), bg_w = background.width(), bg_h = background.height())
    )]
    /// Places as many `symbols` as possible on a copy of `background`.
    ///
    /// Notes:
    /// - Symbols are tried largest area first; ties keep input order.
    /// - Oversized symbols and symbols that exhaust their attempts are
    ///   reported in `skipped`, never as errors.
    /// - `background` is not modified.
    pub fn place<R: Rng + ?Sized>(
        &self,
        symbols: &[SymbolInstance],
        background: &RgbaImage,
        rng: &mut R,
    ) -> PlacementResult {
        let (bg_w, bg_h) = background.dimensions();
        let mut canvas = background.clone();

        let mut order: Vec<usize> = (0..symbols.len()).collect();
        // stable: equal areas keep their input order
        order.sort_by(|&a, &b| symbols[b].area().cmp(&symbols[a].area()));

        let mut placements: Vec<Placement> = Vec::with_capacity(symbols.len());
        let mut annotations: Vec<Annotation> = Vec::with_capacity(symbols.len());
        let mut skipped: Vec<SkippedSymbol> = Vec::new();

        for idx in order {
            let sym = &symbols[idx];
            let (sw, sh) = (sym.width(), sym.height());
            let outcome = if sw > bg_w || sh > bg_h {
                Err(SkipReason::Oversized)
            } else {
                self.find_free_slot(sw, sh, bg_w, bg_h, &placements, rng)
                    .ok_or(SkipReason::Exhausted)
            };
            match outcome {
                Ok(rect) => {
                    overlay_masked(&sym.image, sym.mask.as_ref(), &mut canvas, rect.x, rect.y);
                    if let Some(color) = self.box_outline {
                        outline_rect(&mut canvas, &rect, color);
                    }
                    placements.push(Placement {
                        input_index: idx,
                        class_id: sym.class_id,
                        rect,
                    });
                    annotations.push(Annotation::from_rect(sym.class_id, &rect, bg_w, bg_h));
                }
                Err(reason) => {
                    debug!(
                        index = idx,
                        class = sym.class_id,
                        w = sw,
                        h = sh,
                        ?reason,
                        "symbol skipped"
                    );
                    skipped.push(SkippedSymbol {
                        input_index: idx,
                        class_id: sym.class_id,
                        reason,
                    });
                }
            }
        }

        PlacementResult {
            canvas,
            placements,
            annotations,
            skipped,
        }
    }

    fn find_free_slot<R: Rng + ?Sized>(
        &self,
        w: u32,
        h: u32,
        bg_w: u32,
        bg_h: u32,
        placed: &[Placement],
        rng: &mut R,
    ) -> Option<Rect> {
        let max_x = bg_w - w;
        let max_y = bg_h - h;
        for _ in 0..self.attempts_per_symbol {
            let candidate = Rect::new(rng.gen_range(0..=max_x), rng.gen_range(0..=max_y), w, h);
            if placed.iter().all(|p| !candidate.overlaps(&p.rect)) {
                return Some(candidate);
            }
        }
        None
    }
}

/// Convenience wrapper: validates `attempts_per_symbol` and runs one placement round.
pub fn place_symbols<R: Rng + ?Sized>(
    symbols: &[SymbolInstance],
    background: &RgbaImage,
    attempts_per_symbol: u32,
    rng: &mut R,
) -> Result<PlacementResult> {
    Ok(PlacementEngine::new(attempts_per_symbol)?.place(symbols, background, rng))
}
