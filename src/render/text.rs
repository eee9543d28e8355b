//! Truncation of text to a pixel width.
//!
//! The cut point is found by binary search over the character count, which
//! relies on measured width never shrinking as characters are added.

use super::font::{Font, GlyphMetrics};

pub const ELLIPSIS: &str = "...";

/// Returns `text` unchanged when it fits in `max_width`, otherwise the
/// longest prefix followed by [`ELLIPSIS`] that fits, or a bare ellipsis
/// when no prefix does.
pub fn fit_text<M: GlyphMetrics + ?Sized>(
    metrics: &M,
    text: &str,
    max_width: u32,
    font: Font,
) -> String {
    if metrics.width(text, font) <= max_width {
        return text.to_string();
    }

    // Byte offset of every char boundary after the first char.
    let cuts: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .skip(1)
        .collect();

    let fits = |k: usize| {
        let candidate = format!("{}{}", &text[..cuts[k]], ELLIPSIS);
        metrics.width(&candidate, font) <= max_width
    };

    let mut best = None;
    let (mut low, mut high) = (0usize, cuts.len());
    while low < high {
        let mid = low + (high - low) / 2;
        if fits(mid) {
            best = Some(mid);
            low = mid + 1;
        } else {
            high = mid;
        }
    }

    match best {
        Some(k) => format!("{}{}", &text[..cuts[k]], ELLIPSIS),
        None => ELLIPSIS.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::font::{MonoMetrics, FALLBACK_FONT};
    use embedded_graphics::geometry::Size;
    use proptest::prelude::*;

    /// Every char is 5 px wide.
    struct FixedWidth;

    impl GlyphMetrics for FixedWidth {
        fn measure(&self, text: &str, _font: Font) -> Size {
            Size::new(text.chars().count() as u32 * 5, 8)
        }
    }

    #[test]
    fn fitting_text_is_unchanged() {
        assert_eq!(fit_text(&FixedWidth, "Standup", 35, FALLBACK_FONT), "Standup");
        assert_eq!(fit_text(&FixedWidth, "", 0, FALLBACK_FONT), "");
    }

    #[test]
    fn cuts_to_longest_prefix_with_ellipsis() {
        // 30 px fits three chars plus the ellipsis.
        assert_eq!(fit_text(&FixedWidth, "Planning meeting", 30, FALLBACK_FONT), "Pla...");
        assert_eq!(fit_text(&FixedWidth, "Planning meeting", 65, FALLBACK_FONT), "Planning m...");
    }

    #[test]
    fn prefix_keeps_trailing_space() {
        // The prefix is cut at a char count, whitespace included.
        assert_eq!(fit_text(&FixedWidth, "09:00 Standup", 45, FALLBACK_FONT), "09:00 ...");
        assert_eq!(fit_text(&FixedWidth, "Planning meeting", 60, FALLBACK_FONT), "Planning ...");
    }

    #[test]
    fn bare_ellipsis_when_nothing_fits() {
        assert_eq!(fit_text(&FixedWidth, "Holiday", 15, FALLBACK_FONT), "...");
        assert_eq!(fit_text(&FixedWidth, "Holiday", 3, FALLBACK_FONT), "...");
    }

    #[test]
    fn multibyte_characters_are_not_split() {
        let cut = fit_text(&FixedWidth, "Reunião técnica", 40, FALLBACK_FONT);
        assert_eq!(cut, "Reuni...");
    }

    #[test]
    fn works_with_mono_metrics() {
        let font = FALLBACK_FONT;
        let cut = fit_text(&MonoMetrics, "Revisão trimestral do orçamento", 96, font);

        assert!(cut.ends_with(ELLIPSIS));
        assert!(MonoMetrics.width(&cut, font) <= 96);
    }

    proptest! {
        #[test]
        fn never_wider_than_requested(text in "\\PC{0,40}", max_width in 15u32..300) {
            let cut = fit_text(&FixedWidth, &text, max_width, FALLBACK_FONT);
            prop_assert!(FixedWidth.width(&cut, FALLBACK_FONT) <= max_width);
        }

        #[test]
        fn truncation_is_idempotent(text in "[a-zA-Z0-9 :]{0,40}", max_width in 15u32..300) {
            let once = fit_text(&FixedWidth, &text, max_width, FALLBACK_FONT);
            let twice = fit_text(&FixedWidth, &once, max_width, FALLBACK_FONT);
            prop_assert_eq!(once, twice);
        }
    }
}
