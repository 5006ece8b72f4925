use crate::model::{MIN_FONT_PT, TextFragment};
use crate::text::is_cjk;

/// 13.333 in x 7.5 in (16:9).
pub const SLIDE_WIDTH_EMU: i64 = 12_192_000;
pub const SLIDE_HEIGHT_EMU: i64 = 6_858_000;
pub const EMU_PER_PT: i64 = 12_700;

/// Extra height over the scaled box so descenders are not clipped.
const HEIGHT_ALLOWANCE: f64 = 1.3;
const SHRINK_MARGIN: f64 = 0.95;
const CJK_ADVANCE: f64 = 1.0;
const ALNUM_ADVANCE: f64 = 0.55;
const OTHER_ADVANCE: f64 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextBoxPlacement {
    pub left: i64,
    pub top: i64,
    pub width: i64,
    pub height: i64,
    pub font_size_pt: u32,
}

/// Scales a fragment from source pixels onto the canvas and fits its font size.
pub fn place_fragment(fragment: &TextFragment, source_width: u32, source_height: u32) -> TextBoxPlacement {
    let bbox = fragment.bbox();
    let scale_x = SLIDE_WIDTH_EMU as f64 / source_width.max(1) as f64;
    let scale_y = SLIDE_HEIGHT_EMU as f64 / source_height.max(1) as f64;

    let left = (bbox.x as f64 * scale_x) as i64;
    let top = (bbox.y as f64 * scale_y) as i64;
    let width = ((bbox.w as f64 * scale_x) as i64).min(SLIDE_WIDTH_EMU - left).max(0);
    let height = (bbox.h as f64 * scale_y * HEIGHT_ALLOWANCE) as i64;

    TextBoxPlacement {
        left,
        top,
        width,
        height,
        font_size_pt: fit_font_size(fragment.text(), width, fragment.style().size_pt),
    }
}

/// Rough rendered width of a single line, in EMU.
pub fn estimate_text_width(text: &str, font_size_pt: u32) -> f64 {
    let em = font_size_pt as f64 * EMU_PER_PT as f64;
    text.chars()
        .map(|ch| {
            if is_cjk(ch) {
                em * CJK_ADVANCE
            } else if ch.is_alphanumeric() {
                em * ALNUM_ADVANCE
            } else {
                em * OTHER_ADVANCE
            }
        })
        .sum()
}

/// Shrinks `font_size_pt` until the line fits `box_width_emu`, never below 8 pt.
pub fn fit_font_size(text: &str, box_width_emu: i64, font_size_pt: u32) -> u32 {
    let estimated = estimate_text_width(text, font_size_pt);
    if estimated <= box_width_emu as f64 {
        return font_size_pt;
    }
    let ratio = box_width_emu.max(0) as f64 / estimated;
    let adjusted = (font_size_pt as f64 * ratio * SHRINK_MARGIN) as u32;
    adjusted.max(MIN_FONT_PT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BBoxPx, TextStyle};

    fn styled(text: &str, bbox: BBoxPx, size_pt: u32) -> TextFragment {
        TextFragment::new(text, bbox, 0.9).with_style(TextStyle {
            size_pt,
            ..TextStyle::default()
        })
    }

    #[test]
    fn width_estimate_weights_scripts() {
        let close = |a: f64, b: f64| (a - b).abs() < 1e-6;
        assert!(close(estimate_text_width("中文", 10), 254_000.0));
        assert!(close(estimate_text_width("ab", 10), 139_700.0));
        assert!(close(estimate_text_width("、", 10), 50_800.0));
    }

    #[test]
    fn fitting_text_keeps_its_size() {
        assert_eq!(fit_font_size("AI", 1_000_000, 24), 24);
    }

    #[test]
    fn overflowing_text_shrinks_with_margin_and_floor() {
        // 10 CJK chars at 20pt = 2_540_000 EMU into a 1_270_000 box: ratio 0.5.
        assert_eq!(fit_font_size("一二三四五六七八九十", 1_270_000, 20), 9);
        assert_eq!(fit_font_size("一二三四五六七八九十", 100_000, 20), MIN_FONT_PT);
    }

    #[test]
    fn placement_scales_axes_independently_and_clips_right_edge() {
        let fragment = styled("标题", BBoxPx::new(960, 540, 100, 40), 24);
        let placement = place_fragment(&fragment, 1920, 1080);
        assert_eq!(placement.left, SLIDE_WIDTH_EMU / 2);
        assert_eq!(placement.top, SLIDE_HEIGHT_EMU / 2);
        assert_eq!(placement.width, 635_000);
        assert_eq!(placement.height, (40.0 * 6350.0 * 1.3) as i64);

        let edge = styled("边缘文字", BBoxPx::new(1900, 0, 200, 40), 12);
        let placement = place_fragment(&edge, 1920, 1080);
        assert_eq!(placement.left + placement.width, SLIDE_WIDTH_EMU);
    }
}
