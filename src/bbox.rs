//! Content detection on captured frames.
//!
//! GtkWave draws its signals on a black canvas surrounded by light window
//! chrome. Each color channel is binarized and grown by one pixel (which wipes
//! out thin dark borders and separators), then inverted: the canvas is every
//! pixel where some channel stays zero across its whole 3x3 neighbourhood. The
//! content box is the tight box of non-black pixels inside that canvas.
//!
//! A pixel only counts as canvas when one of its channels is exactly zero, so
//! gray or black regions on a white window yield no box.

use image::{GenericImageView, GrayImage, Luma, Rgb, RgbImage, imageops};
use imageproc::distance_transform::Norm;
use imageproc::morphology::dilate;
use tracing::debug;

use crate::error::{GtkwaveError, Result};

/// Frames whose content is not taller than this are still loading.
pub const MIN_CONTENT_HEIGHT: u32 = 30;

/// A rectangle in pixel coordinates; `right` and `lower` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub left: u32,
    pub upper: u32,
    pub right: u32,
    pub lower: u32,
}

impl BoundingBox {
    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    pub fn height(&self) -> u32 {
        self.lower - self.upper
    }

    /// Translate a box found inside `self` back into the outer coordinates.
    fn inner(&self, inner: BoundingBox) -> BoundingBox {
        BoundingBox {
            left: self.left + inner.left,
            upper: self.upper + inner.upper,
            right: self.left + inner.right,
            lower: self.upper + inner.lower,
        }
    }
}

/// Tight box around the non-zero pixels of a single-channel view.
fn nonzero_bbox<V>(view: &V) -> Option<BoundingBox>
where
    V: GenericImageView<Pixel = Luma<u8>>,
{
    let mut found: Option<BoundingBox> = None;

    for (x, y, pixel) in view.pixels() {
        if pixel.0[0] == 0 {
            continue;
        }
        let b = found.get_or_insert(BoundingBox {
            left: x,
            upper: y,
            right: x + 1,
            lower: y + 1,
        });
        b.left = b.left.min(x);
        b.upper = b.upper.min(y);
        b.right = b.right.max(x + 1);
        b.lower = b.lower.max(y + 1);
    }

    found
}

/// 255 where channel `channel` (or any channel, for `None`) is set.
fn nonzero_mask(frame: &RgbImage, channel: Option<usize>) -> GrayImage {
    GrayImage::from_fn(frame.width(), frame.height(), |x, y| {
        let Rgb(channels) = frame.get_pixel(x, y);
        let set = match channel {
            Some(c) => channels[c] != 0,
            None => channels.iter().any(|c| *c != 0),
        };
        Luma([if set { 255 } else { 0 }])
    })
}

/// 255 where some channel is zero in the whole 3x3 neighbourhood.
fn canvas_mask(frame: &RgbImage) -> GrayImage {
    let mut canvas = GrayImage::new(frame.width(), frame.height());
    for channel in 0..3 {
        let mut zeros = dilate(&nonzero_mask(frame, Some(channel)), Norm::LInf, 1);
        imageops::invert(&mut zeros);
        for (out, px) in canvas.pixels_mut().zip(zeros.pixels()) {
            out.0[0] = out.0[0].max(px.0[0]);
        }
    }
    canvas
}

/// Box around the signal content of a frame, or `None` for frames without a
/// canvas or without anything drawn on it.
pub fn content_box(frame: &RgbImage) -> Option<BoundingBox> {
    let canvas_box = nonzero_bbox(&canvas_mask(frame))?;

    let drawn = nonzero_mask(frame, None);
    let inside = imageops::crop_imm(
        &drawn,
        canvas_box.left,
        canvas_box.upper,
        canvas_box.width(),
        canvas_box.height(),
    );
    let content = nonzero_bbox(&*inside)?;

    Some(canvas_box.inner(content))
}

/// Whether a frame shows a fully rendered waveform view.
pub fn accept_frame(frame: &RgbImage) -> bool {
    let Some(rec) = content_box(frame) else {
        return false;
    };
    let accept = rec.height() > MIN_CONTENT_HEIGHT;
    debug!(?rec, accept, "cropped frame");
    accept
}

/// Crop an accepted frame down to its content, keeping the full left margin
/// where signal names are drawn.
pub fn crop_to_content(frame: &RgbImage) -> Result<RgbImage> {
    let rec = content_box(frame).ok_or_else(|| {
        GtkwaveError::InvariantViolation("accepted frame has no content box".to_string())
    })?;
    let rec = BoundingBox { left: 0, ..rec };

    Ok(imageops::crop_imm(frame, rec.left, rec.upper, rec.width(), rec.height()).to_image())
}

/// Strip the uniform `background` border from a frame. Returns `None` when the
/// whole frame is background.
pub fn autocrop(frame: &RgbImage, background: Rgb<u8>) -> Option<RgbImage> {
    let diff = GrayImage::from_fn(frame.width(), frame.height(), |x, y| {
        if *frame.get_pixel(x, y) == background {
            Luma([0])
        } else {
            Luma([255])
        }
    });
    let rec = nonzero_bbox(&diff)?;

    Some(imageops::crop_imm(frame, rec.left, rec.upper, rec.width(), rec.height()).to_image())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
    const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
    const GREEN: Rgb<u8> = Rgb([0, 255, 0]);

    fn fill(img: &mut RgbImage, x0: u32, y0: u32, x1: u32, y1: u32, color: Rgb<u8>) {
        for y in y0..y1 {
            for x in x0..x1 {
                img.put_pixel(x, y, color);
            }
        }
    }

    /// A white window with a black canvas and a green block of `height` rows.
    pub(crate) fn waveform_frame(height: u32) -> RgbImage {
        let mut img = RgbImage::from_pixel(200, 200, WHITE);
        fill(&mut img, 20, 20, 180, 180, BLACK);
        fill(&mut img, 40, 50, 100, 50 + height, GREEN);
        img
    }

    #[test]
    fn test_content_box_matches_drawn_region() {
        let rec = content_box(&waveform_frame(45)).unwrap();
        assert_eq!(
            rec,
            BoundingBox {
                left: 40,
                upper: 50,
                right: 100,
                lower: 95
            }
        );
        assert_eq!(rec.height(), 45);
    }

    #[test]
    fn test_uniform_frames_have_no_box() {
        assert_eq!(content_box(&RgbImage::from_pixel(64, 64, WHITE)), None);
        assert_eq!(content_box(&RgbImage::from_pixel(64, 64, BLACK)), None);
        assert!(!accept_frame(&RgbImage::from_pixel(64, 64, WHITE)));
        assert!(!accept_frame(&RgbImage::from_pixel(64, 64, BLACK)));
    }

    #[test]
    fn test_empty_canvas_has_no_box() {
        let mut img = RgbImage::from_pixel(100, 100, WHITE);
        fill(&mut img, 10, 10, 90, 90, BLACK);
        assert_eq!(content_box(&img), None);
    }

    #[test]
    fn test_thin_black_lines_are_ignored() {
        let mut img = RgbImage::from_pixel(100, 100, WHITE);
        fill(&mut img, 0, 40, 100, 41, BLACK);
        assert_eq!(content_box(&img), None);
    }

    fn rectangle_on_white(color: Rgb<u8>, height: u32) -> RgbImage {
        let mut img = RgbImage::from_pixel(200, 200, WHITE);
        fill(&mut img, 70, 40, 130, 40 + height, color);
        img
    }

    #[test]
    fn test_primary_rectangles_on_white() {
        for color in [Rgb([255, 0, 0]), GREEN, Rgb([0, 0, 255])] {
            // The one-pixel dilation trims a row and column on each side.
            let rec = content_box(&rectangle_on_white(color, 100)).unwrap();
            assert_eq!(
                rec,
                BoundingBox {
                    left: 71,
                    upper: 41,
                    right: 129,
                    lower: 139
                },
                "{color:?}"
            );
            assert!(accept_frame(&rectangle_on_white(color, 100)));

            for (height, accepted) in [(30, false), (31, true)] {
                let frame = autocrop(&rectangle_on_white(color, height), WHITE).unwrap();
                let rec = content_box(&frame).unwrap();
                assert_eq!(rec.height(), height, "{color:?}");
                assert_eq!(rec.width(), 60, "{color:?}");
                assert_eq!(accept_frame(&frame), accepted, "{color:?} H={height}");
            }

            // Full frame: 31 rows shrink to 29.
            assert!(!accept_frame(&rectangle_on_white(color, 31)));
            assert!(accept_frame(&rectangle_on_white(color, 33)));
        }
    }

    #[test]
    fn test_gray_and_black_rectangles_have_no_box() {
        for color in [BLACK, Rgb([128, 128, 128])] {
            let img = rectangle_on_white(color, 100);
            assert_eq!(content_box(&img), None, "{color:?}");
            assert!(!accept_frame(&img));
        }
    }

    #[test]
    fn test_accept_threshold() {
        assert!(!accept_frame(&waveform_frame(10)));
        assert!(!accept_frame(&waveform_frame(30)));
        assert!(accept_frame(&waveform_frame(31)));
        assert!(accept_frame(&waveform_frame(100)));
    }

    #[test]
    fn test_crop_extends_to_left_edge() {
        let cropped = crop_to_content(&waveform_frame(60)).unwrap();
        assert_eq!(cropped.width(), 100);
        assert_eq!(cropped.height(), 60);
        assert_eq!(*cropped.get_pixel(0, 0), WHITE);
        assert_eq!(*cropped.get_pixel(45, 10), GREEN);
    }

    #[test]
    fn test_crop_without_content_is_invariant_violation() {
        let err = crop_to_content(&RgbImage::from_pixel(10, 10, WHITE)).unwrap_err();
        assert!(matches!(err, GtkwaveError::InvariantViolation(_)));
    }

    #[test]
    fn test_autocrop() {
        let mut img = RgbImage::from_pixel(50, 40, WHITE);
        fill(&mut img, 5, 10, 25, 30, BLACK);
        let cropped = autocrop(&img, WHITE).unwrap();
        assert_eq!(cropped.dimensions(), (20, 20));
        assert!(autocrop(&RgbImage::from_pixel(8, 8, WHITE), WHITE).is_none());
    }
}
