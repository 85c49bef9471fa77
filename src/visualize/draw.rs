//! Annotated image rendering.
//!
//! Confirmed findings get a solid outline in their tier color with a filled
//! label tag. Gray-zone findings are drawn afterwards as dashed cyan boxes
//! with a `?` tag so they stay visible on top of confirmed ones.

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use tracing::warn;

use super::glyphs::{draw_text, text_width, TEXT_HEIGHT};
use crate::imaging::{encode_jpeg, DEFAULT_JPEG_QUALITY};
use crate::triage::{format_percent, BoundingBox, GrayZoneFinding, ValidatedFinding};

/// Outline color for gray-zone findings (#00FFFF).
pub const GRAY_ZONE_COLOR: Rgb<u8> = Rgb([0, 255, 255]);

const VALIDATED_TEXT: Rgb<u8> = Rgb([255, 255, 255]);
const GRAY_ZONE_TEXT: Rgb<u8> = Rgb([0, 0, 0]);

const DASH_LENGTH: i32 = 10;
const DASH_GAP: i32 = 5;
const OUTLINE_THICKNESS: u32 = 2;
/// Vertical padding around label text.
const LABEL_PADDING: u32 = 12;
/// f32 box coordinates carry no whole-pixel precision past 2^24.
const COORD_LIMIT: i32 = 1 << 24;

/// Renders classified findings onto the normalized image.
///
/// Returns the encoded annotated image, or `None` when there is nothing
/// to draw or rendering failed.
pub trait Visualizer: Send + Sync {
    fn render(
        &self,
        base: &RgbImage,
        validated: &[ValidatedFinding],
        gray_zone: &[GrayZoneFinding],
    ) -> Option<Vec<u8>>;
}

pub struct RiskVisualizer {
    jpeg_quality: u8,
}

impl Default for RiskVisualizer {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

impl RiskVisualizer {
    pub fn new(jpeg_quality: u8) -> Self {
        Self { jpeg_quality }
    }

    /// Return a copy of `base` with every finding drawn on it, or `None`
    /// when there are no findings at all.
    pub fn draw(
        &self,
        base: &RgbImage,
        validated: &[ValidatedFinding],
        gray_zone: &[GrayZoneFinding],
    ) -> Option<RgbImage> {
        if validated.is_empty() && gray_zone.is_empty() {
            return None;
        }

        let mut img = base.clone();
        if img.width() == 0 || img.height() == 0 {
            return Some(img);
        }

        for finding in validated {
            let Some(area) = PixelBox::from_bbox(&finding.detection.bbox) else {
                continue;
            };
            let color = Rgb(finding.rule.risk.color_rgb());
            draw_solid_outline(&mut img, area, color);

            let text = format!("{} {}", finding.rule.label, format_percent(finding.confidence()));
            draw_label(&mut img, area, &text, color, VALIDATED_TEXT);
        }

        for finding in gray_zone {
            let Some(area) = PixelBox::from_bbox(&finding.detection.bbox) else {
                continue;
            };
            draw_dashed_outline(&mut img, area, GRAY_ZONE_COLOR);

            let text = format!("{}? {}", finding.rule.label, format_percent(finding.confidence()));
            draw_label(&mut img, area, &text, GRAY_ZONE_COLOR, GRAY_ZONE_TEXT);
        }

        Some(img)
    }

    /// Draw and JPEG-encode. Returns `None` when there is nothing to draw
    /// or encoding fails.
    pub fn draw_encoded(
        &self,
        base: &RgbImage,
        validated: &[ValidatedFinding],
        gray_zone: &[GrayZoneFinding],
    ) -> Option<Vec<u8>> {
        let annotated = self.draw(base, validated, gray_zone)?;
        match encode_jpeg(&annotated, self.jpeg_quality) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!("Failed to encode annotated image: {}", e);
                None
            }
        }
    }
}

impl Visualizer for RiskVisualizer {
    fn render(
        &self,
        base: &RgbImage,
        validated: &[ValidatedFinding],
        gray_zone: &[GrayZoneFinding],
    ) -> Option<Vec<u8>> {
        self.draw_encoded(base, validated, gray_zone)
    }
}

/// Inclusive pixel box in image coordinates. Not clipped to the image;
/// the canvas drops whatever falls outside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PixelBox {
    x1: i32,
    y1: i32,
    x2: i32,
    y2: i32,
}

impl PixelBox {
    fn from_bbox(bbox: &BoundingBox) -> Option<Self> {
        let coords = [bbox.x1, bbox.y1, bbox.x2, bbox.y2];
        if coords.iter().any(|v| !v.is_finite()) {
            return None;
        }

        let px = |v: f32| (v as i32).clamp(-COORD_LIMIT, COORD_LIMIT);
        let (ax, bx) = (px(bbox.x1), px(bbox.x2));
        let (ay, by) = (px(bbox.y1), px(bbox.y2));

        Some(Self {
            x1: ax.min(bx),
            y1: ay.min(by),
            x2: ax.max(bx),
            y2: ay.max(by),
        })
    }

    fn width(&self) -> u32 {
        (self.x2 - self.x1 + 1) as u32
    }

    fn height(&self) -> u32 {
        (self.y2 - self.y1 + 1) as u32
    }

    /// Top row of the bottom edge strip and left column of the right one.
    fn far_strips(&self) -> (i32, i32) {
        let inset = OUTLINE_THICKNESS as i32 - 1;
        ((self.y2 - inset).max(self.y1), (self.x2 - inset).max(self.x1))
    }
}

/// 2px outline as four filled strips along the inside of the box.
fn draw_solid_outline(img: &mut RgbImage, area: PixelBox, color: Rgb<u8>) {
    let (w, h) = (area.width(), area.height());
    let (bottom, right) = area.far_strips();

    draw_filled_rect_mut(img, Rect::at(area.x1, area.y1).of_size(w, OUTLINE_THICKNESS.min(h)), color);
    draw_filled_rect_mut(img, Rect::at(area.x1, bottom).of_size(w, OUTLINE_THICKNESS.min(h)), color);
    draw_filled_rect_mut(img, Rect::at(area.x1, area.y1).of_size(OUTLINE_THICKNESS.min(w), h), color);
    draw_filled_rect_mut(img, Rect::at(right, area.y1).of_size(OUTLINE_THICKNESS.min(w), h), color);
}

fn draw_dashed_outline(img: &mut RgbImage, area: PixelBox, color: Rgb<u8>) {
    let thickness_x = OUTLINE_THICKNESS.min(area.width());
    let thickness_y = OUTLINE_THICKNESS.min(area.height());
    let (bottom, right) = area.far_strips();

    for x in dash_starts(area.x1, area.x2, img.width() as i32) {
        let len = ((x + DASH_LENGTH).min(area.x2) - x + 1) as u32;
        draw_filled_rect_mut(img, Rect::at(x, area.y1).of_size(len, thickness_y), color);
        draw_filled_rect_mut(img, Rect::at(x, bottom).of_size(len, thickness_y), color);
    }
    for y in dash_starts(area.y1, area.y2, img.height() as i32) {
        let len = ((y + DASH_LENGTH).min(area.y2) - y + 1) as u32;
        draw_filled_rect_mut(img, Rect::at(area.x1, y).of_size(thickness_x, len), color);
        draw_filled_rect_mut(img, Rect::at(right, y).of_size(thickness_x, len), color);
    }
}

/// Dash start positions along `[start, end)` in steps of one dash period,
/// skipping whole dashes that end before pixel 0 or start past `visible`.
fn dash_starts(start: i32, end: i32, visible: i32) -> impl Iterator<Item = i32> {
    let period = DASH_LENGTH + DASH_GAP;
    let skipped = ((-start - DASH_LENGTH) / period).max(0);
    (start + skipped * period..end.min(visible)).step_by(period as usize)
}

/// Filled tag with text, above the box when there is room, else just
/// inside its top edge.
fn draw_label(img: &mut RgbImage, area: PixelBox, text: &str, background: Rgb<u8>, foreground: Rgb<u8>) {
    let tag_height = TEXT_HEIGHT + LABEL_PADDING;
    let tag_width = text_width(text) + 8;

    let (tag_y, text_y) = if area.y1 >= tag_height as i32 {
        (area.y1 - tag_height as i32, area.y1 - 6 - TEXT_HEIGHT as i32)
    } else {
        (area.y1, area.y1 + 6)
    };

    draw_filled_rect_mut(img, Rect::at(area.x1, tag_y).of_size(tag_width, tag_height), background);

    let ascii: String = text.chars().map(|c| if c.is_ascii() { c } else { '?' }).collect();
    draw_text(img, area.x1 + 4, text_y, &ascii, foreground);
}
