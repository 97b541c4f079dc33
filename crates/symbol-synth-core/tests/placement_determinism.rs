use image::{Rgba, RgbaImage};
use rand::SeedableRng;
use rand::rngs::StdRng;
use symbol_synth_core::prelude::*;

fn symbols() -> Vec<SymbolInstance> {
    (0..12)
        .map(|i| {
            let side = 10 + (i as u32 * 7) % 40;
            SymbolInstance::new(i, RgbaImage::from_pixel(side, side + 3, Rgba([0, 255, 0, 255])))
        })
        .collect()
}

#[test]
fn same_seed_same_result() {
    let background = RgbaImage::from_pixel(200, 160, Rgba([10, 10, 10, 255]));
    let symbols = symbols();

    let mut r1 = StdRng::seed_from_u64(42);
    let a = place_symbols(&symbols, &background, 20, &mut r1).expect("place");
    let mut r2 = StdRng::seed_from_u64(42);
    let b = place_symbols(&symbols, &background, 20, &mut r2).expect("place");

    assert_eq!(a.placements, b.placements);
    assert_eq!(a.annotations, b.annotations);
    assert_eq!(a.skipped, b.skipped);
    assert_eq!(a.canvas, b.canvas);
}

#[test]
fn background_is_not_modified() {
    let background = RgbaImage::from_pixel(64, 64, Rgba([1, 2, 3, 255]));
    let before = background.clone();
    let white = RgbaImage::from_pixel(16, 16, Rgba([255, 255, 255, 255]));
    let symbols = vec![SymbolInstance::new(0, white)];
    let mut rng = StdRng::seed_from_u64(0);
    let out = place_symbols(&symbols, &background, 5, &mut rng).expect("place");
    assert_eq!(background, before);
    assert_eq!(out.placements.len(), 1);
    let r = out.placements[0].rect;
    assert_eq!(out.canvas.get_pixel(r.x, r.y), &Rgba([255, 255, 255, 255]));
}

#[test]
fn engine_can_be_reused_across_rounds() {
    let engine = PlacementEngine::new(10).expect("engine");
    let background = RgbaImage::new(100, 100);
    let symbols = symbols();
    let mut rng = StdRng::seed_from_u64(3);
    let first = engine.place(&symbols, &background, &mut rng);
    let mut rng = StdRng::seed_from_u64(3);
    let second = engine.place(&symbols, &background, &mut rng);
    assert_eq!(first.placements, second.placements);
}
