//! Trading calendars and market regions.
//!
//! A [`TradingCalendar`] is an ordered, descending snapshot of session dates for
//! one [`Region`]. It is loaded once per batch and shared read-only by every
//! entity of that batch.

mod periods;
mod provider;
mod region;
mod trading_calendar;

pub use periods::report_periods;
pub use provider::{CalendarProvider, WeekdayCalendar};
pub use region::Region;
pub use trading_calendar::TradingCalendar;
