//! Time window generation.
//!
//! Window k starts at `start_date + k * step_size`, computed from the origin
//! so month-end clamping never accumulates, and nominally ends (exclusive) at
//! `start + stats_duration`. Starts are produced while `start < end_date`.
//! A window whose nominal end passes `end_date` is partial and is kept,
//! clipped or dropped according to [`PartialWindow`].

use crate::spec::TimeWindowing;
use crate::spec::types::PartialWindow;

use chrono::NaiveDate;
use serde::Serialize;
use std::iter::FusedIterator;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TimeWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Nominal end passed `end_date`.
    pub partial: bool,
}

impl TimeWindowing {
    /// A fresh pass over the windows. Each call starts from the beginning.
    pub fn windows(&self) -> Windows<'_> {
        Windows {
            spec: self,
            index: 0,
            done: false,
        }
    }

    /// The first window's nominal extent, used as a sample rendering context.
    pub fn sample_window(&self) -> TimeWindow {
        self.windows().next().unwrap_or(TimeWindow {
            start: self.start_date,
            end: self
                .stats_duration
                .advance(self.start_date, 1)
                .unwrap_or(self.end_date),
            partial: false,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Windows<'a> {
    spec: &'a TimeWindowing,
    index: u32,
    done: bool,
}

impl Iterator for Windows<'_> {
    type Item = TimeWindow;

    fn next(&mut self) -> Option<TimeWindow> {
        while !self.done {
            let spec = self.spec;
            let Some(start) = spec.step_size.advance(spec.start_date, self.index) else {
                self.done = true;
                break;
            };
            if start >= spec.end_date {
                self.done = true;
                break;
            }
            self.index += 1;

            let Some(nominal_end) = spec.stats_duration.advance(start, 1) else {
                self.done = true;
                break;
            };
            let partial = nominal_end > spec.end_date;
            match (partial, spec.partial_window) {
                (false, _) | (true, PartialWindow::Overrun) => {
                    return Some(TimeWindow {
                        start,
                        end: nominal_end,
                        partial,
                    });
                }
                (true, PartialWindow::Truncate) => {
                    return Some(TimeWindow {
                        start,
                        end: spec.end_date,
                        partial,
                    });
                }
                // Later starts only end later, so every remaining window is partial too.
                (true, PartialWindow::Skip) => {
                    self.done = true;
                }
            }
        }
        None
    }
}

impl FusedIterator for Windows<'_> {}
