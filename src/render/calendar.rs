//! Month grid computation and localized calendar names.

use chrono::{Datelike, NaiveDate};

/// Month and weekday names for the calendar panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Locale {
    months: [&'static str; 12],
    /// Two-letter weekday headers, Monday first.
    weekdays: [&'static str; 7],
}

impl Locale {
    pub const PORTUGUESE: Locale = Locale {
        months: [
            "Janeiro", "Fevereiro", "Março", "Abril", "Maio", "Junho", "Julho", "Agosto",
            "Setembro", "Outubro", "Novembro", "Dezembro",
        ],
        weekdays: ["Se", "Te", "Qu", "Qu", "Se", "Sá", "Do"],
    };

    pub const ENGLISH: Locale = Locale {
        months: [
            "January", "February", "March", "April", "May", "June", "July", "August",
            "September", "October", "November", "December",
        ],
        weekdays: ["Mo", "Tu", "We", "Th", "Fr", "Sa", "Su"],
    };

    /// Looks up a locale by language tag (`pt`, `pt_PT`, `en_US.utf8`...).
    pub fn from_tag(tag: &str) -> Option<Locale> {
        let language = tag
            .split(['_', '-', '.'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();

        match language.as_str() {
            "pt" => Some(Self::PORTUGUESE),
            "en" => Some(Self::ENGLISH),
            _ => None,
        }
    }

    /// Month name for 1..=12.
    pub fn month_name(&self, month: u32) -> &'static str {
        self.months[(month.clamp(1, 12) - 1) as usize]
    }

    pub fn weekday_headers(&self) -> &[&'static str; 7] {
        &self.weekdays
    }

    /// Calendar title, e.g. `Outubro 2026`.
    pub fn month_title(&self, date: NaiveDate) -> String {
        format!("{} {}", self.month_name(date.month()), date.year())
    }
}

impl Default for Locale {
    fn default() -> Self {
        Self::PORTUGUESE
    }
}

/// One week row, Monday first. `None` cells pad partial weeks.
pub type Week = [Option<u32>; 7];

/// Rectangular grid covering one month.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthGrid {
    year: i32,
    month: u32,
    today: u32,
    weeks: Vec<Week>,
}

impl MonthGrid {
    /// Builds the grid of the month containing `date`, marking `date` as today.
    pub fn for_date(date: NaiveDate) -> Self {
        let year = date.year();
        let month = date.month();
        let first = date.with_day(1).unwrap_or(date);
        let days = days_in_month(year, month);
        let offset = first.weekday().num_days_from_monday() as usize;

        let mut weeks = Vec::with_capacity(6);
        let mut week: Week = [None; 7];
        let mut column = offset;

        for day in 1..=days {
            week[column] = Some(day);
            column += 1;
            if column == 7 {
                weeks.push(week);
                week = [None; 7];
                column = 0;
            }
        }
        if column != 0 {
            weeks.push(week);
        }

        Self {
            year,
            month,
            today: date.day(),
            weeks,
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn weeks(&self) -> &[Week] {
        &self.weeks
    }

    pub fn is_today(&self, day: u32) -> bool {
        self.today == day
    }

    /// `(row, column)` of today's cell.
    pub fn today_cell(&self) -> Option<(usize, usize)> {
        self.weeks.iter().enumerate().find_map(|(row, week)| {
            week.iter()
                .position(|cell| *cell == Some(self.today))
                .map(|column| (row, column))
        })
    }
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|next| next.pred_opt())
        .map(|last| last.day())
        .unwrap_or(28)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn month_starting_on_monday() {
        // 1 March 2021 was a Monday.
        let grid = MonthGrid::for_date(date(2021, 3, 15));

        assert_eq!(grid.weeks().len(), 5);
        assert_eq!(grid.weeks()[0][0], Some(1));
        assert_eq!(grid.weeks()[4], [Some(29), Some(30), Some(31), None, None, None, None]);
    }

    #[test]
    fn month_spanning_six_rows() {
        // 1 August 2026 is a Saturday.
        let grid = MonthGrid::for_date(date(2026, 8, 1));

        assert_eq!(grid.weeks().len(), 6);
        assert_eq!(grid.weeks()[0], [None, None, None, None, None, Some(1), Some(2)]);
        assert_eq!(grid.weeks()[5][0], Some(31));
    }

    #[test]
    fn february_fitting_four_rows() {
        // 1 February 2021 was a Monday, 28 days.
        let grid = MonthGrid::for_date(date(2021, 2, 10));

        assert_eq!(grid.weeks().len(), 4);
        assert_eq!(grid.weeks()[3][6], Some(28));
    }

    #[test]
    fn leap_february_has_29_days() {
        let grid = MonthGrid::for_date(date(2024, 2, 29));
        let last = grid.weeks().iter().flatten().flatten().max();

        assert_eq!(last, Some(&29));
        assert!(grid.is_today(29));
    }

    #[test]
    fn exactly_one_today_cell() {
        let grid = MonthGrid::for_date(date(2026, 10, 18));

        let today_cells = grid
            .weeks()
            .iter()
            .flatten()
            .filter(|cell| cell.is_some_and(|d| grid.is_today(d)))
            .count();

        assert_eq!(today_cells, 1);
        // 18 October 2026 is a Sunday.
        assert_eq!(grid.today_cell(), Some((2, 6)));
    }

    #[test]
    fn every_day_appears_once_in_order() {
        let grid = MonthGrid::for_date(date(2026, 12, 25));
        let days: Vec<u32> = grid.weeks().iter().flatten().flatten().copied().collect();

        assert_eq!(days, (1..=31).collect::<Vec<_>>());
        assert!(grid.weeks().iter().all(|week| week.len() == 7));
    }

    #[test]
    fn locale_lookup() {
        assert_eq!(Locale::from_tag("pt_PT.utf8"), Some(Locale::PORTUGUESE));
        assert_eq!(Locale::from_tag("EN"), Some(Locale::ENGLISH));
        assert_eq!(Locale::from_tag("de_DE"), None);
        assert_eq!(Locale::PORTUGUESE.month_title(date(2026, 3, 2)), "Março 2026");
        assert_eq!(Locale::ENGLISH.weekday_headers()[6], "Su");
    }
}
