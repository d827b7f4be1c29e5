//! Derives the review panel's view mode from the calendar and record
//! existence.
//!
//! The mode is a pure function of `(today, has_current, has_previous,
//! dismissed)`; `ModeTracker` layers the one-shot prompt and the per-period
//! dismissal flag on top, both keyed by period start so they reset exactly
//! when a new period begins.

use chrono::{Datelike, Duration, NaiveDate, Weekday};

use crate::model::config::PeriodKind;

/// The review panel's active mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    /// Editing the current period's records.
    Normal,
    /// Surfaced automatically at a period boundary; shows the previous
    /// period's records, read-mostly.
    ReviewPrevious,
}

/// Calendar partitioning for the review panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodScheme {
    /// Periods start on Monday.
    Weekly,
    /// Periods start on the first of the month.
    Monthly,
}

impl From<PeriodKind> for PeriodScheme {
    fn from(kind: PeriodKind) -> Self {
        match kind {
            PeriodKind::Weekly => PeriodScheme::Weekly,
            PeriodKind::Monthly => PeriodScheme::Monthly,
        }
    }
}

impl PeriodScheme {
    /// Start of the period containing `d`.
    pub fn start_of(self, d: NaiveDate) -> NaiveDate {
        match self {
            PeriodScheme::Weekly => d - Duration::days(d.weekday().num_days_from_monday() as i64),
            PeriodScheme::Monthly => d.with_day(1).expect("day 1 is always valid"),
        }
    }

    /// Start of the period immediately before the one containing `d`.
    pub fn previous_start(self, d: NaiveDate) -> NaiveDate {
        let start = self.start_of(d);
        match self {
            PeriodScheme::Weekly => start - Duration::days(7),
            PeriodScheme::Monthly => self.start_of(start - Duration::days(1)),
        }
    }

    /// True when `d` is the first day of its period.
    pub fn is_start(self, d: NaiveDate) -> bool {
        match self {
            PeriodScheme::Weekly => d.weekday() == Weekday::Mon,
            PeriodScheme::Monthly => d.day() == 1,
        }
    }
}

/// Pure mode derivation. Review is surfaced only on the first day of a
/// period, when the new period has no records yet, the previous one has
/// some, and the user has not dismissed the review this period.
pub fn derive_mode(
    scheme: PeriodScheme,
    today: NaiveDate,
    has_current: bool,
    has_previous: bool,
    dismissed: bool,
) -> ViewMode {
    if scheme.is_start(today) && !has_current && has_previous && !dismissed {
        ViewMode::ReviewPrevious
    } else {
        ViewMode::Normal
    }
}

/// Result of one evaluation: the mode to render, and whether to fire the
/// one-shot "review last period?" prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeDecision {
    pub mode: ViewMode,
    pub prompt: bool,
}

/// Stateful wrapper owning the prompt and dismissal flags.
#[derive(Debug)]
pub struct ModeTracker {
    scheme: PeriodScheme,
    /// Period start for which the prompt already fired.
    prompted_for: Option<NaiveDate>,
    /// Period start for which the user dismissed the review.
    dismissed_for: Option<NaiveDate>,
}

impl ModeTracker {
    pub fn new(scheme: PeriodScheme) -> Self {
        ModeTracker {
            scheme,
            prompted_for: None,
            dismissed_for: None,
        }
    }

    pub fn scheme(&self) -> PeriodScheme {
        self.scheme
    }

    /// Evaluate once per render. The prompt fires at most once per period;
    /// repeated evaluations with unchanged inputs keep the mode but not the
    /// prompt.
    pub fn evaluate(
        &mut self,
        today: NaiveDate,
        has_current: bool,
        has_previous: bool,
    ) -> ModeDecision {
        let start = self.scheme.start_of(today);
        let dismissed = self.dismissed_for == Some(start);
        let mode = derive_mode(self.scheme, today, has_current, has_previous, dismissed);
        let prompt = mode == ViewMode::ReviewPrevious && self.prompted_for != Some(start);
        if prompt {
            self.prompted_for = Some(start);
        }
        ModeDecision { mode, prompt }
    }

    /// Explicit dismissal: back to Normal until the next period boundary.
    pub fn dismiss(&mut self, today: NaiveDate) {
        self.dismissed_for = Some(self.scheme.start_of(today));
    }
}

/// The next weekday strictly after `d` (deferral target).
pub fn next_working_day(d: NaiveDate) -> NaiveDate {
    let mut next = d + Duration::days(1);
    while matches!(next.weekday(), Weekday::Sat | Weekday::Sun) {
        next = next + Duration::days(1);
    }
    next
}
