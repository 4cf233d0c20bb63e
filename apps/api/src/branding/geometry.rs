//! Fit-and-center geometry for placing a content page on a letterhead page.
//!
//! All quantities are PDF points. The letterhead page is the target frame: the
//! content page is scaled uniformly (one scalar for both axes) and centered on
//! the full letterhead page, not on the padded area. Padding only decides
//! whether the content "fits" and, when it does not, how far to shrink it.
//!
//! Content that already fits is never upscaled. Oversized content with
//! shrinking disabled keeps scale 1.0 and overflows the page; that is
//! accepted output, not an error.

use serde::{Deserialize, Serialize};

/// Gap kept between the content and the letterhead edges when deciding fit.
pub const PAGE_PADDING_PT: f64 = 20.0;
/// Shrink oversized content down to the available area.
pub const SHRINK_IF_LARGER: bool = true;
/// Extra shrink applied beyond the minimum fit scale, in percent.
pub const SHRINK_MARGIN_PCT: f64 = 2.0;

// ────────────────────────────────────────────────────────────────────────────
// Types
// ────────────────────────────────────────────────────────────────────────────

/// Width and height of a page in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

impl PageSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Tuning for [`compute_placement`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitSettings {
    /// Points reserved on every side of the letterhead (`>= 0`).
    pub padding: f64,
    pub allow_shrink: bool,
    /// Percentage in `[0, 100)` taken off the fit scale for breathing room.
    pub shrink_margin_pct: f64,
}

impl Default for FitSettings {
    fn default() -> Self {
        Self {
            padding: PAGE_PADDING_PT,
            allow_shrink: SHRINK_IF_LARGER,
            shrink_margin_pct: SHRINK_MARGIN_PCT,
        }
    }
}

impl FitSettings {
    /// Letterhead area left after removing `padding` from each edge.
    pub fn available_area(&self, letterhead: PageSize) -> PageSize {
        PageSize {
            width: letterhead.width - 2.0 * self.padding,
            height: letterhead.height - 2.0 * self.padding,
        }
    }
}

/// Uniform scale plus the bottom-left offset of the scaled content, relative
/// to the letterhead page origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub scale: f64,
    pub x_offset: f64,
    pub y_offset: f64,
}

// ────────────────────────────────────────────────────────────────────────────
// Core function
// ────────────────────────────────────────────────────────────────────────────

/// Computes how `content` is scaled and positioned on `letterhead`.
///
/// Pure function of its inputs: the same arguments always give the same
/// placement.
pub fn compute_placement(
    letterhead: PageSize,
    content: PageSize,
    settings: &FitSettings,
) -> Placement {
    let avail = settings.available_area(letterhead);

    let mut scale = 1.0_f64;
    if settings.allow_shrink && (content.width > avail.width || content.height > avail.height) {
        let sx = avail.width / content.width;
        let sy = avail.height / content.height;
        let fit = sx.min(sy);
        scale = fit * (1.0 - settings.shrink_margin_pct / 100.0);
        // A margin of 100% or more would zero or invert the page.
        if scale <= 0.0 {
            scale = fit;
        }
    }

    let scaled_w = content.width * scale;
    let scaled_h = content.height * scale;

    Placement {
        scale,
        x_offset: (letterhead.width - scaled_w) / 2.0,
        y_offset: (letterhead.height - scaled_h) / 2.0,
    }
}
