//! Font resolution and glyph measurement.
//!
//! Faces come from the ISO 8859-15 mono fonts shipped with
//! [`embedded_graphics`], which cover the accented Latin characters used by
//! month and weekday names. A size is the wanted glyph cell height in pixels;
//! the loader picks the tallest face of the family that is not taller than
//! that.

use std::collections::HashMap;
use std::fmt;

use embedded_graphics::{
    geometry::Size,
    mono_font::{iso_8859_15, MonoFont, MonoTextStyle},
    pixelcolor::BinaryColor,
    prelude::*,
    text::{renderer::TextRenderer, Baseline},
};

/// Logical font family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontFamily {
    Regular,
    Bold,
}

impl fmt::Display for FontFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FontFamily::Regular => write!(f, "regular"),
            FontFamily::Bold => write!(f, "bold"),
        }
    }
}

/// Loaded font handle.
///
/// Two handles are equal when they carry the same face name; the face
/// reference itself has no stable address.
#[derive(Clone, Copy)]
pub struct Font {
    name: &'static str,
    face: &'static MonoFont<'static>,
}

impl Font {
    pub const fn new(name: &'static str, face: &'static MonoFont<'static>) -> Self {
        Self { name, face }
    }

    /// Face name, such as `6x13-bold`.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn face(&self) -> &'static MonoFont<'static> {
        self.face
    }

    /// Height of one text line.
    pub fn line_height(&self) -> u32 {
        self.face.character_size.height
    }

    /// Text style drawing this font in `color`.
    pub fn style(&self, color: BinaryColor) -> MonoTextStyle<'static, BinaryColor> {
        MonoTextStyle::new(self.face, color)
    }
}

impl fmt::Debug for Font {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Font({})", self.name)
    }
}

impl PartialEq for Font {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Font {}

/// Face used whenever loading fails.
pub const FALLBACK_FONT: Font = Font::new("6x10", &iso_8859_15::FONT_6X10);

/// Font could not be loaded for the requested family and size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FontLoadError {
    /// The family has no face this small.
    TooSmall { family: FontFamily, size: u32 },
}

impl fmt::Display for FontLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FontLoadError::TooSmall { family, size } => {
                write!(f, "no {} face fits in {} px", family, size)
            }
        }
    }
}

impl std::error::Error for FontLoadError {}

/// Font capability: resolves a family and size to a face.
pub trait FontLoader {
    fn load(&self, family: FontFamily, size: u32) -> Result<Font, FontLoadError>;
}

/// Loader backed by the built-in mono faces.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonoFontLibrary;

const REGULAR_FACES: &[Font] = &[
    Font::new("4x6", &iso_8859_15::FONT_4X6),
    Font::new("5x7", &iso_8859_15::FONT_5X7),
    Font::new("5x8", &iso_8859_15::FONT_5X8),
    Font::new("6x9", &iso_8859_15::FONT_6X9),
    FALLBACK_FONT,
    Font::new("6x12", &iso_8859_15::FONT_6X12),
    Font::new("6x13", &iso_8859_15::FONT_6X13),
    Font::new("7x14", &iso_8859_15::FONT_7X14),
    Font::new("9x15", &iso_8859_15::FONT_9X15),
    Font::new("9x18", &iso_8859_15::FONT_9X18),
    Font::new("10x20", &iso_8859_15::FONT_10X20),
];

const BOLD_FACES: &[Font] = &[
    Font::new("6x13-bold", &iso_8859_15::FONT_6X13_BOLD),
    Font::new("7x14-bold", &iso_8859_15::FONT_7X14_BOLD),
    Font::new("9x15-bold", &iso_8859_15::FONT_9X15_BOLD),
    Font::new("9x18-bold", &iso_8859_15::FONT_9X18_BOLD),
];

impl FontLoader for MonoFontLibrary {
    fn load(&self, family: FontFamily, size: u32) -> Result<Font, FontLoadError> {
        let faces = match family {
            FontFamily::Regular => REGULAR_FACES,
            FontFamily::Bold => BOLD_FACES,
        };

        // Faces are ordered by height, keep the last one that still fits.
        faces
            .iter()
            .copied()
            .filter(|font| font.line_height() <= size)
            .last()
            .ok_or(FontLoadError::TooSmall { family, size })
    }
}

/// Caches loaded fonts by family and size.
///
/// A failed load is cached as the fallback face so the warning is logged
/// once per key.
pub struct FontCache<L = MonoFontLibrary> {
    loader: L,
    fonts: HashMap<(FontFamily, u32), Font>,
}

impl Default for FontCache<MonoFontLibrary> {
    fn default() -> Self {
        Self::new(MonoFontLibrary)
    }
}

impl<L: FontLoader> FontCache<L> {
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            fonts: HashMap::new(),
        }
    }

    /// Returns the font for `family` at `size`, or the fallback face.
    pub fn get(&mut self, family: FontFamily, size: u32) -> Font {
        if let Some(font) = self.fonts.get(&(family, size)) {
            return *font;
        }

        let font = match self.loader.load(family, size) {
            Ok(font) => font,
            Err(e) => {
                log::warn!("Failed to load font: {}, using fallback", e);
                FALLBACK_FONT
            }
        };

        self.fonts.insert((family, size), font);
        font
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }
}

/// Measures rendered text.
pub trait GlyphMetrics {
    /// Pixel size of `text` drawn with `font`. Empty text is zero wide.
    fn measure(&self, text: &str, font: Font) -> Size;

    fn width(&self, text: &str, font: Font) -> u32 {
        self.measure(text, font).width
    }
}

/// Metrics taken from the text renderer itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonoMetrics;

impl GlyphMetrics for MonoMetrics {
    fn measure(&self, text: &str, font: Font) -> Size {
        font.style(BinaryColor::On)
            .measure_string(text, Point::zero(), Baseline::Top)
            .bounding_box
            .size
    }
}
