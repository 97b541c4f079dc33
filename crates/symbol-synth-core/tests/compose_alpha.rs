use image::{GrayImage, Luma, Rgba, RgbaImage};
use symbol_synth_core::Rect;
use symbol_synth_core::compositing::{matte, outline_rect, overlay_masked};

#[test]
fn transparent_pixels_keep_background() {
    let mut canvas = RgbaImage::from_pixel(8, 8, Rgba([0, 0, 255, 255]));
    let mut src = RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255]));
    src.put_pixel(0, 0, Rgba([255, 0, 0, 0]));
    overlay_masked(&src, None, &mut canvas, 2, 2);

    assert_eq!(canvas.get_pixel(2, 2), &Rgba([0, 0, 255, 255]));
    assert_eq!(canvas.get_pixel(3, 3), &Rgba([255, 0, 0, 255]));
    assert_eq!(canvas.get_pixel(6, 6), &Rgba([0, 0, 255, 255]));
}

#[test]
fn half_alpha_blends() {
    let mut canvas = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 255]));
    let src = RgbaImage::from_pixel(1, 1, Rgba([255, 255, 255, 128]));
    overlay_masked(&src, None, &mut canvas, 0, 0);
    let p = canvas.get_pixel(0, 0);
    assert!((127..=129).contains(&p[0]), "got {:?}", p);
}

#[test]
fn explicit_mask_overrides_alpha() {
    let mut canvas = RgbaImage::from_pixel(2, 1, Rgba([0, 0, 0, 255]));
    let src = RgbaImage::from_pixel(2, 1, Rgba([9, 9, 9, 255]));
    let mut mask = GrayImage::new(2, 1);
    mask.put_pixel(1, 0, Luma([255]));
    overlay_masked(&src, Some(&mask), &mut canvas, 0, 0);
    assert_eq!(canvas.get_pixel(0, 0), &Rgba([0, 0, 0, 255]));
    assert_eq!(canvas.get_pixel(1, 0), &Rgba([9, 9, 9, 255]));
}

#[test]
fn overlay_clips_at_canvas_edge() {
    let mut canvas = RgbaImage::new(4, 4);
    let src = RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 255]));
    overlay_masked(&src, None, &mut canvas, 2, 2);
    assert_eq!(canvas.get_pixel(3, 3), &Rgba([1, 2, 3, 255]));
    assert_eq!(canvas.get_pixel(1, 1), &Rgba([0, 0, 0, 0]));
}

#[test]
fn matte_backs_symbol_with_solid_color() {
    let mut src = RgbaImage::new(3, 3);
    src.put_pixel(1, 1, Rgba([255, 255, 255, 255]));
    let out = matte(&src, None, [0, 128, 0]);
    assert_eq!(out.get_pixel(0, 0), &Rgba([0, 128, 0, 255]));
    assert_eq!(out.get_pixel(1, 1), &Rgba([255, 255, 255, 255]));
}

#[test]
fn outline_marks_box_border_only() {
    let mut canvas = RgbaImage::new(10, 10);
    let red = Rgba([255, 0, 0, 255]);
    outline_rect(&mut canvas, &Rect::new(2, 2, 4, 4), red);
    assert_eq!(canvas.get_pixel(2, 2), &red);
    assert_eq!(canvas.get_pixel(5, 5), &red);
    assert_eq!(canvas.get_pixel(3, 3), &Rgba([0, 0, 0, 0]));
    assert_eq!(canvas.get_pixel(6, 6), &Rgba([0, 0, 0, 0]));
}
