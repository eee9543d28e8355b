//! Update loop tying the schedule, the layout engine and the display together.
//!
//! Each cycle renders the agenda page for the current time on top of the
//! day's static frame and pushes it as a partial update. A full refresh with
//! the static frame happens on start, on day change, after the display was
//! reset and, optionally, every `FULL_REFRESH_EVERY` partial updates.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, NaiveDateTime};

use crate::config::Config;
use crate::epd::{DisplayError, DisplayStateMachine, DriverLoader};
use crate::render::frame::Frame;
use crate::render::layout::{LayoutEngine, RenderedPage};
use crate::schedule::{Agenda, ScheduleSource};

/// Longest uninterrupted sleep between stop flag checks.
const STOP_POLL: Duration = Duration::from_millis(250);

/// Source of the current local time.
pub trait Clock {
    fn now(&self) -> NaiveDateTime;
}

/// System wall clock in the local timezone.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalClock;

impl Clock for LocalClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Renders one dynamic frame and writes it to `path` as PNG, without
/// touching the display.
pub fn dry_run<S: ScheduleSource>(
    config: &Config,
    source: &mut S,
    now: NaiveDateTime,
    path: &Path,
) -> Result<RenderedPage> {
    let mut engine = LayoutEngine::new(config);
    let base = engine.render_static(now.date());

    let items = source
        .today(now.date())
        .context("fetching today's schedule")?;
    let agenda = Agenda::from_items(items).limited(config.max_events);

    let page = engine.render_dynamic(&base, &agenda, 0, now.time());
    page.frame.save_png(path)?;

    log::info!("PNG saved to {}", path.display());
    Ok(page)
}

pub struct Runner<S, L: DriverLoader, C = LocalClock> {
    engine: LayoutEngine,
    display: DisplayStateMachine<L>,
    source: S,
    clock: C,

    max_events: usize,
    max_failures: u32,
    full_refresh_every: u32,
    sleep_between_updates: bool,
    interval: Duration,

    date: NaiveDate,
    static_frame: Frame,
    page_index: usize,
    full_pending: bool,
    partials_since_full: u32,
    failures: u32,
}

impl<S, L, C> Runner<S, L, C>
where
    S: ScheduleSource,
    L: DriverLoader,
    C: Clock,
{
    /// Prepares the static frame for today. The display is opened on the
    /// first cycle.
    pub fn new(config: &Config, source: S, loader: L, clock: C) -> Self {
        let mut engine = LayoutEngine::new(config);
        let date = clock.now().date();
        let static_frame = engine.render_static(date);

        Self {
            engine,
            display: DisplayStateMachine::new(loader),
            source,
            clock,
            max_events: config.max_events,
            max_failures: config.max_consecutive_failures,
            full_refresh_every: config.full_refresh_every,
            sleep_between_updates: config.sleep_between_updates,
            interval: config.update_interval,
            date,
            static_frame,
            page_index: 0,
            full_pending: true,
            partials_since_full: 0,
            failures: 0,
        }
    }

    pub fn display(&self) -> &DisplayStateMachine<L> {
        &self.display
    }

    /// Page requested on the next cycle, before wrapping.
    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Runs cycles until `stop` is set, then releases the display.
    ///
    /// Returns early only when the display hardware cannot be opened.
    pub fn run(&mut self, stop: &AtomicBool) -> Result<()> {
        log::info!(
            "Starting update loop, every {} s",
            self.interval.as_secs()
        );

        let result = loop {
            if stop.load(Ordering::SeqCst) {
                log::info!("Stop requested");
                break Ok(());
            }
            if let Err(e) = self.cycle() {
                break Err(e);
            }
            self.wait(stop);
        };

        self.display.cleanup();
        result
    }

    /// One cycle with the failure policy applied.
    ///
    /// Failures are counted; past `MAX_CONSECUTIVE_FAILURES` in a row the
    /// display is released and reopened with a full refresh next cycle.
    /// Only a display that cannot be opened is returned as an error.
    pub fn cycle(&mut self) -> Result<()> {
        let e = match self.tick() {
            Ok(()) => {
                self.failures = 0;
                return Ok(());
            }
            Err(e) => e,
        };

        if let Some(DisplayError::HardwareInit(_)) = e.downcast_ref::<DisplayError>() {
            return Err(e.context("cannot open the display"));
        }

        self.failures += 1;
        log::error!(
            "Update failed ({}/{}): {:#}",
            self.failures,
            self.max_failures,
            e
        );

        if self.failures > self.max_failures {
            log::warn!("Too many consecutive failures, resetting display");
            self.display.cleanup();
            self.full_pending = true;
            self.failures = 0;
        }

        Ok(())
    }

    /// Renders and presents the current page.
    pub fn tick(&mut self) -> Result<()> {
        let now = self.clock.now();
        let today = now.date();

        if today != self.date {
            log::info!("Day changed to {}, rebuilding calendar", today);
            self.static_frame = self.engine.render_static(today);
            self.date = today;
            self.page_index = 0;
            self.full_pending = true;
        }

        let items = self
            .source
            .today(today)
            .context("fetching today's schedule")?;
        let agenda = Agenda::from_items(items).limited(self.max_events);

        let page = self
            .engine
            .render_dynamic(&self.static_frame, &agenda, self.page_index, now.time());

        self.present(&page.frame)?;

        log::info!(
            "Partial update OK (page {}/{})",
            page.page_index + 1,
            page.total_pages
        );
        self.page_index = self.page_index.wrapping_add(1);
        Ok(())
    }

    fn present(&mut self, frame: &Frame) -> Result<(), DisplayError> {
        let periodic = self.full_refresh_every > 0
            && self.partials_since_full >= self.full_refresh_every;

        if self.full_pending || periodic {
            self.display.full_update(&self.static_frame)?;
            self.display.prepare_partial(&self.static_frame)?;
            self.full_pending = false;
            self.partials_since_full = 0;
        }

        self.display.partial_update(frame)?;
        self.partials_since_full += 1;

        if self.sleep_between_updates {
            self.display.sleep();
        }
        Ok(())
    }

    fn wait(&self, stop: &AtomicBool) {
        let deadline = Instant::now() + self.interval;

        while !stop.load(Ordering::SeqCst) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            thread::sleep(remaining.min(STOP_POLL));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use anyhow::anyhow;
    use chrono::{NaiveTime, TimeDelta};

    use super::*;
    use crate::epd::fake::{FakeLoader, Op};
    use crate::epd::{Phase, RefreshMode};
    use crate::schedule::{FixedSchedule, ScheduleItem, Source, TimeLabel};

    #[derive(Clone)]
    struct TestClock(Rc<Cell<NaiveDateTime>>);

    impl TestClock {
        fn at(y: i32, m: u32, d: u32, h: u32) -> Self {
            let time = NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_hms_opt(h, 0, 0)
                .unwrap();
            Self(Rc::new(Cell::new(time)))
        }

        fn advance(&self, by: TimeDelta) {
            self.0.set(self.0.get() + by);
        }
    }

    impl Clock for TestClock {
        fn now(&self) -> NaiveDateTime {
            self.0.get()
        }
    }

    struct BrokenSource;

    impl ScheduleSource for BrokenSource {
        fn today(&mut self, _date: NaiveDate) -> Result<Vec<ScheduleItem>> {
            Err(anyhow!("calendar offline"))
        }
    }

    fn schedule(n: usize) -> FixedSchedule {
        FixedSchedule(
            (0..n)
                .map(|i| {
                    ScheduleItem::new(
                        TimeLabel::At(NaiveTime::from_hms_opt(9 + i as u32, 0, 0).unwrap()),
                        format!("Meeting {}", i),
                        Source::Calendar,
                    )
                })
                .collect(),
        )
    }

    fn runner(
        config: &Config,
        loader: &FakeLoader,
        clock: &TestClock,
    ) -> Runner<FixedSchedule, FakeLoader, TestClock> {
        Runner::new(config, schedule(5), loader.clone(), clock.clone())
    }

    #[test]
    fn first_cycle_is_full_then_partial() {
        let loader = FakeLoader::capable();
        let clock = TestClock::at(2026, 10, 18, 9);
        let mut runner = runner(&Config::default(), &loader, &clock);

        runner.tick().unwrap();

        assert_eq!(
            loader.ops(),
            [
                Op::Open,
                Op::Capabilities,
                Op::Init(RefreshMode::Full),
                Op::Clear(0xFF),
                Op::Display,
                Op::Init(RefreshMode::Partial),
                Op::SetBase,
                Op::DisplayPartial,
            ]
        );
        assert_eq!(runner.page_index(), 1);
        assert_eq!(runner.display().phase(), Phase::PartialReady);
    }

    #[test]
    fn later_cycles_are_partial_only() {
        let loader = FakeLoader::capable();
        let clock = TestClock::at(2026, 10, 18, 9);
        let mut runner = runner(&Config::default(), &loader, &clock);
        runner.tick().unwrap();
        loader.clear_ops();

        clock.advance(TimeDelta::minutes(1));
        runner.tick().unwrap();

        assert_eq!(loader.ops(), [Op::DisplayPartial]);
        assert_eq!(runner.page_index(), 2);
    }

    #[test]
    fn day_change_forces_full_refresh_and_first_page() {
        let loader = FakeLoader::capable();
        let clock = TestClock::at(2026, 10, 18, 23);
        let mut runner = runner(&Config::default(), &loader, &clock);
        runner.tick().unwrap();
        runner.tick().unwrap();
        assert_eq!(runner.page_index(), 2);

        clock.advance(TimeDelta::hours(2));
        runner.tick().unwrap();

        assert_eq!(loader.count(Op::Init(RefreshMode::Full)), 2);
        assert_eq!(runner.page_index(), 1);
        assert_eq!(loader.count(Op::Open), 1);
    }

    #[test]
    fn periodic_full_refresh() {
        let config = Config {
            full_refresh_every: 2,
            ..Config::default()
        };
        let loader = FakeLoader::capable();
        let clock = TestClock::at(2026, 10, 18, 9);
        let mut runner = runner(&config, &loader, &clock);

        for _ in 0..5 {
            runner.tick().unwrap();
        }

        // Full refreshes before cycles 1, 3 and 5.
        assert_eq!(loader.count(Op::Init(RefreshMode::Full)), 3);
        assert_eq!(loader.count(Op::DisplayPartial), 5);
    }

    #[test]
    fn sleeping_between_updates_reprepares() {
        let config = Config {
            sleep_between_updates: true,
            ..Config::default()
        };
        let loader = FakeLoader::capable();
        let clock = TestClock::at(2026, 10, 18, 9);
        let mut runner = runner(&config, &loader, &clock);

        runner.tick().unwrap();
        assert_eq!(runner.display().phase(), Phase::Asleep);

        runner.tick().unwrap();
        assert_eq!(runner.display().phase(), Phase::Asleep);
        assert_eq!(loader.count(Op::Init(RefreshMode::Partial)), 2);
        assert_eq!(loader.count(Op::Init(RefreshMode::Full)), 1);
    }

    #[test]
    fn repeated_failures_reset_the_display() {
        let config = Config {
            max_consecutive_failures: 2,
            ..Config::default()
        };
        let loader = FakeLoader::capable();
        let clock = TestClock::at(2026, 10, 18, 9);
        let mut runner = runner(&config, &loader, &clock);
        runner.cycle().unwrap();

        loader.fail(Op::DisplayPartial);
        runner.cycle().unwrap();
        runner.cycle().unwrap();
        assert_eq!(runner.failures(), 2);
        assert_eq!(loader.live(), 1);

        runner.cycle().unwrap();
        assert_eq!(runner.failures(), 0);
        assert_eq!(loader.live(), 0);
        assert_eq!(runner.display().phase(), Phase::Uninit);

        loader.heal();
        runner.cycle().unwrap();
        assert_eq!(loader.count(Op::Open), 2);
        assert_eq!(loader.count(Op::Init(RefreshMode::Full)), 2);
        assert_eq!(loader.max_live(), 1);
    }

    #[test]
    fn success_resets_failure_count() {
        let loader = FakeLoader::capable();
        let clock = TestClock::at(2026, 10, 18, 9);
        let mut runner = runner(&Config::default(), &loader, &clock);

        loader.fail(Op::DisplayPartial);
        runner.cycle().unwrap();
        assert_eq!(runner.failures(), 1);

        loader.heal();
        runner.cycle().unwrap();
        assert_eq!(runner.failures(), 0);
    }

    #[test]
    fn missing_hardware_stops_the_loop() {
        let loader = FakeLoader::capable();
        loader.fail(Op::Open);
        let clock = TestClock::at(2026, 10, 18, 9);
        let mut runner = runner(&Config::default(), &loader, &clock);

        let err = runner.cycle().unwrap_err();

        assert!(matches!(
            err.downcast_ref::<DisplayError>(),
            Some(DisplayError::HardwareInit(_))
        ));
    }

    #[test]
    fn schedule_errors_count_without_touching_display() {
        let loader = FakeLoader::capable();
        let clock = TestClock::at(2026, 10, 18, 9);
        let mut runner = Runner::new(&Config::default(), BrokenSource, loader.clone(), clock);

        runner.cycle().unwrap();

        assert_eq!(runner.failures(), 1);
        assert!(loader.ops().is_empty());
    }

    #[test]
    fn run_honours_stop_and_cleans_up() {
        let loader = FakeLoader::capable();
        let clock = TestClock::at(2026, 10, 18, 9);
        let mut runner = runner(&Config::default(), &loader, &clock);
        runner.tick().unwrap();

        let stop = AtomicBool::new(true);
        runner.run(&stop).unwrap();

        assert_eq!(loader.live(), 0);
        assert_eq!(runner.display().phase(), Phase::Uninit);
    }

    #[test]
    fn dry_run_writes_png() {
        let config = Config::default();
        let now = NaiveDate::from_ymd_opt(2026, 10, 18)
            .unwrap()
            .and_hms_opt(10, 15, 0)
            .unwrap();
        let path = std::env::temp_dir().join(format!("epaper-dry-run-{}.png", std::process::id()));

        let page = dry_run(&config, &mut schedule(2), now, &path).unwrap();
        let decoded = image::open(&path).unwrap().to_luma8();
        let _ = std::fs::remove_file(&path);

        assert_eq!(decoded.dimensions(), (250, 122));
        assert_eq!(page.items_drawn, 2);
        assert_eq!(page.title, "Eventos");
    }
}
