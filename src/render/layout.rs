//! Composition of the two panels into a frame.
//!
//! The static frame holds the panel borders and the month calendar and only
//! changes when the date does. Every update cycle copies it and draws the
//! clock and the current agenda page on top, leaving the static frame as it
//! was so it can keep serving as the partial update baseline.

use std::time::Instant;

use chrono::{NaiveDate, NaiveTime, Timelike};
use embedded_graphics::{
    geometry::Angle,
    pixelcolor::BinaryColor,
    prelude::*,
    primitives::{Arc, Circle, Line, PrimitiveStyle, Rectangle},
    text::{Baseline, Text},
};

use super::calendar::{Locale, MonthGrid};
use super::font::{
    Font, FontCache, FontFamily, FontLoader, GlyphMetrics, MonoFontLibrary, MonoMetrics,
};
use super::frame::Frame;
use super::paginate::paginate;
use super::text::fit_text;
use crate::config::{Config, FontSizes, Layout, Messages};
use crate::schedule::Agenda;

const INK: BinaryColor = BinaryColor::On;
const BACKGROUND: BinaryColor = BinaryColor::Off;

/// Indent of the location line under an agenda item.
const LOCATION_INDENT: u32 = 6;

/// Regions of the display, derived from [`Layout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// Agenda panel interior, left.
    pub agenda: Rectangle,
    /// Calendar and clock panel interior, right.
    pub calendar_panel: Rectangle,
    /// Where the month grid is drawn.
    pub calendar: Rectangle,
    /// Ink-filled clock block, bottom of the right panel.
    pub clock: Rectangle,
    /// Agenda content: title bar followed by the items.
    pub events: Rectangle,
}

impl Geometry {
    pub fn new(layout: &Layout) -> Self {
        let m = layout.margin as i32;
        let panel_h = layout.height.saturating_sub(layout.margin * 2);
        let tb = layout.time_block_h as i32;

        let agenda = Rectangle::new(
            Point::new(m, m),
            Size::new(layout.left_panel_w.saturating_sub(layout.margin * 2), panel_h),
        );
        let calendar_panel = Rectangle::new(
            Point::new(layout.left_panel_w as i32 + 1, m),
            Size::new(layout.right_panel_w.saturating_sub(layout.margin), panel_h),
        );

        let right = calendar_panel.top_left;
        let right_w = calendar_panel.size.width;
        let clock_y = right.y + panel_h as i32 - tb - 2;

        let clock = Rectangle::with_corners(
            Point::new(right.x + 2, clock_y),
            Point::new(right.x + 2 + right_w.saturating_sub(6) as i32, clock_y + tb),
        );
        let calendar = Rectangle::new(
            Point::new(right.x + 2, right.y + 2),
            Size::new(
                right_w.saturating_sub(6),
                (clock_y - 2 - (right.y + 2)).max(0) as u32,
            ),
        );
        let events = Rectangle::new(
            agenda.top_left + Point::new(2, 2),
            Size::new(
                agenda.size.width.saturating_sub(4),
                agenda.size.height.saturating_sub(6),
            ),
        );

        Self {
            agenda,
            calendar_panel,
            calendar,
            clock,
            events,
        }
    }
}

/// Dynamic frame together with what ended up on it.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub frame: Frame,
    /// Resolved page, 0-based.
    pub page_index: usize,
    pub total_pages: usize,
    /// Items of the page that fit in the panel.
    pub items_drawn: usize,
    pub title: String,
}

/// Builds static and dynamic frames.
pub struct LayoutEngine<L = MonoFontLibrary, M = MonoMetrics> {
    layout: Layout,
    sizes: FontSizes,
    messages: Messages,
    locale: Locale,
    page_size: usize,
    geometry: Geometry,
    fonts: FontCache<L>,
    metrics: M,
}

impl LayoutEngine {
    pub fn new(config: &Config) -> Self {
        Self::with_parts(config, MonoFontLibrary, MonoMetrics)
    }
}

impl<L: FontLoader, M: GlyphMetrics> LayoutEngine<L, M> {
    /// Engine with a custom font loader and metrics.
    pub fn with_parts(config: &Config, loader: L, metrics: M) -> Self {
        Self {
            layout: config.layout,
            sizes: config.fonts,
            messages: config.messages.clone(),
            locale: config.locale,
            page_size: config.events_per_page,
            geometry: Geometry::new(&config.layout),
            fonts: FontCache::new(loader),
            metrics,
        }
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Panel borders and the month calendar for `today`.
    pub fn render_static(&mut self, today: NaiveDate) -> Frame {
        let started = Instant::now();
        let mut frame = Frame::new(self.layout.width, self.layout.height);

        let a = self.geometry.agenda;
        let c = self.geometry.calendar_panel;
        let (ax, ay) = (a.top_left.x, a.top_left.y);
        let (aw, ah) = (a.size.width as i32, a.size.height as i32);
        let (cx, cy) = (c.top_left.x, c.top_left.y);
        let (cw, ch) = (c.size.width as i32, c.size.height as i32);

        outline(&mut frame, ax - 1, ay - 1, ax + aw + 1, ay + ah + 1);
        outline(&mut frame, cx - 1, cy - 1, cx + cw, cy + ch + 1);

        self.draw_month(&mut frame, today);

        log::info!(
            "Static render finished in {} ms",
            started.elapsed().as_millis()
        );
        frame
    }

    /// Copies `base` and draws the clock and page `page_index` of `agenda`.
    pub fn render_dynamic(
        &mut self,
        base: &Frame,
        agenda: &Agenda,
        page_index: usize,
        now: NaiveTime,
    ) -> RenderedPage {
        let started = Instant::now();
        let page = paginate(agenda.items(), self.page_size, page_index);

        let mut frame = base.clone();
        self.draw_clock(&mut frame, now);

        let a = self.geometry.agenda;
        fill(
            &mut frame,
            a.top_left.x + 1,
            a.top_left.y + 1,
            a.top_left.x + a.size.width as i32 - 1,
            a.top_left.y + a.size.height as i32 - 1,
            BACKGROUND,
        );

        let title = if agenda.is_empty() {
            self.messages.no_events.clone()
        } else if page.total_pages > 1 {
            format!("{} ({}/{})", self.messages.events, page.number(), page.total_pages)
        } else {
            self.messages.events.clone()
        };

        let ev = self.geometry.events;
        let (x, y) = (ev.top_left.x, ev.top_left.y);
        let w = ev.size.width;
        let bottom = y + ev.size.height as i32;
        let tb = self.layout.time_block_h as i32;

        let title_font = self.fonts.get(FontFamily::Bold, self.sizes.subtitle);
        fill(&mut frame, x, y, x + w as i32, y + tb, INK);
        let shown_title = fit_text(&self.metrics, &title, w, title_font);
        self.draw_centered(&mut frame, &shown_title, x, w, y + 2, title_font, BACKGROUND);

        let mut cursor = y + tb + 4;
        let mut items_drawn = 0;

        if agenda.is_empty() {
            self.draw_free_day(&mut frame, x, w, cursor, bottom);
        } else {
            let item_font = self.fonts.get(FontFamily::Regular, self.sizes.regular);
            let small_font = self.fonts.get(FontFamily::Regular, self.sizes.small);
            let item_h = item_font.line_height() as i32;
            let small_h = small_font.line_height() as i32;
            let spacing = self.layout.line_spacing as i32;

            for item in page.items {
                let has_location = !item.location.is_empty();
                let needed = item_h + 1 + spacing + 1 + if has_location { small_h } else { 0 };
                if cursor + needed > bottom {
                    break;
                }

                let line = fit_text(&self.metrics, &item.headline(), w, item_font);
                draw_text(&mut frame, &line, Point::new(x, cursor), item_font, INK);
                cursor += item_h + 1;

                if has_location {
                    let indent = LOCATION_INDENT.min(w);
                    let location = fit_text(&self.metrics, &item.location, w - indent, small_font);
                    draw_text(
                        &mut frame,
                        &location,
                        Point::new(x + indent as i32, cursor),
                        small_font,
                        INK,
                    );
                    cursor += small_h;
                }
                cursor += spacing;

                let _ = Line::new(Point::new(x, cursor), Point::new(x + w as i32, cursor))
                    .into_styled(PrimitiveStyle::with_stroke(INK, 1))
                    .draw(&mut frame);
                cursor += 2;
                items_drawn += 1;
            }
        }

        log::info!(
            "Dynamic render p={}/{} items_shown={} in {} ms",
            page.number(),
            page.total_pages,
            items_drawn,
            started.elapsed().as_millis()
        );

        RenderedPage {
            frame,
            page_index: page.index,
            total_pages: page.total_pages,
            items_drawn,
            title,
        }
    }

    fn draw_month(&mut self, frame: &mut Frame, today: NaiveDate) {
        let area = self.geometry.calendar;
        let (ox, oy) = (area.top_left.x, area.top_left.y);
        let w = area.size.width;
        let h = area.size.height as i32;

        let title_font = self.fonts.get(FontFamily::Bold, self.sizes.calendar_title);
        let header_font = self.fonts.get(FontFamily::Regular, self.sizes.regular);
        let day_font = self.fonts.get(FontFamily::Regular, self.sizes.calendar_day);

        let title = self.locale.month_title(today);
        let title_h = self.metrics.measure(&title, title_font).height as i32;
        self.draw_centered(frame, &title, ox, w, oy, title_font, INK);

        let cell_w = (w / 7) as i32;
        let header_y = oy + title_h + 2;
        for (column, name) in self.locale.weekday_headers().iter().enumerate() {
            let cell_x = ox + column as i32 * cell_w;
            self.draw_centered(frame, name, cell_x, cell_w as u32, header_y, header_font, INK);
        }

        let grid = MonthGrid::for_date(today);
        let grid_top = header_y + header_font.line_height() as i32 + 2;
        let rows = grid.weeks().len().max(1) as i32;
        let available = h - (grid_top - oy) - 2;
        let cell_h = (available / rows).max(day_font.line_height() as i32 + 2);

        for (row, week) in grid.weeks().iter().enumerate() {
            let cell_y = grid_top + row as i32 * cell_h;

            for (column, day) in week.iter().enumerate() {
                let Some(day) = day else { continue };
                let cell_x = ox + column as i32 * cell_w;
                let text = day.to_string();
                let text_w = self.metrics.width(&text, day_font) as i32;
                let origin = Point::new(cell_x + cell_w - text_w - 2, cell_y + 1);

                if grid.is_today(*day) {
                    fill(
                        frame,
                        cell_x + 1,
                        cell_y + 1,
                        cell_x + cell_w - 2,
                        cell_y + cell_h - 2,
                        INK,
                    );
                    draw_text(frame, &text, origin, day_font, BACKGROUND);
                } else {
                    draw_text(frame, &text, origin, day_font, INK);
                }
            }
        }
    }

    fn draw_clock(&mut self, frame: &mut Frame, now: NaiveTime) {
        let clock = self.geometry.clock;
        let font = self.fonts.get(FontFamily::Bold, self.sizes.time);
        let text = format!("{:02}:{:02}", now.hour(), now.minute());

        let _ = clock
            .into_styled(PrimitiveStyle::with_fill(INK))
            .draw(frame);
        self.draw_centered(
            frame,
            &text,
            clock.top_left.x,
            clock.size.width,
            clock.top_left.y + 2,
            font,
            BACKGROUND,
        );
    }

    fn draw_free_day(&mut self, frame: &mut Frame, x: i32, w: u32, top: i32, bottom: i32) {
        let font = self.fonts.get(FontFamily::Regular, self.sizes.no_events);
        let message_y = top + 10;
        self.draw_centered(frame, &self.messages.free_day, x, w, message_y, font, INK);

        let glyph_top = message_y + font.line_height() as i32 + 6;
        let diameter = (self.sizes.emoji as i32).min(bottom - glyph_top).min(w as i32);
        if diameter >= 8 {
            let left = x + (w as i32 - diameter) / 2;
            draw_smiley(frame, Point::new(left, glyph_top), diameter as u32);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_centered(
        &self,
        frame: &mut Frame,
        text: &str,
        x: i32,
        width: u32,
        y: i32,
        font: Font,
        color: BinaryColor,
    ) {
        let text_w = self.metrics.width(text, font) as i32;
        let left = x + (width as i32 - text_w) / 2;
        draw_text(frame, text, Point::new(left, y), font, color);
    }
}

fn draw_text(frame: &mut Frame, text: &str, top_left: Point, font: Font, color: BinaryColor) {
    let _ = Text::with_baseline(text, top_left, font.style(color), Baseline::Top).draw(frame);
}

/// Filled rectangle between two inclusive corners.
fn fill(frame: &mut Frame, x0: i32, y0: i32, x1: i32, y1: i32, color: BinaryColor) {
    let _ = Rectangle::with_corners(Point::new(x0, y0), Point::new(x1, y1))
        .into_styled(PrimitiveStyle::with_fill(color))
        .draw(frame);
}

/// One pixel border between two inclusive corners.
fn outline(frame: &mut Frame, x0: i32, y0: i32, x1: i32, y1: i32) {
    let _ = Rectangle::with_corners(Point::new(x0, y0), Point::new(x1, y1))
        .into_styled(PrimitiveStyle::with_stroke(INK, 1))
        .draw(frame);
}

fn draw_smiley(frame: &mut Frame, top_left: Point, diameter: u32) {
    let d = diameter as i32;
    let stroke = PrimitiveStyle::with_stroke(INK, 2);

    let _ = Circle::new(top_left, diameter).into_styled(stroke).draw(frame);

    let eye = (d / 8).max(2);
    for dx in [d / 3, d * 2 / 3] {
        let _ = Circle::with_center(top_left + Point::new(dx, d * 3 / 8), eye as u32)
            .into_styled(PrimitiveStyle::with_fill(INK))
            .draw(frame);
    }

    let _ = Arc::new(
        top_left + Point::new(d / 4, d / 4),
        diameter / 2,
        Angle::from_degrees(30.0),
        Angle::from_degrees(120.0),
    )
    .into_styled(stroke)
    .draw(frame);
}
