use chrono::NaiveDate;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use log::warn;
use std::sync::Arc;

use super::model::SessionDB;
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::IntoCore;
use crate::schema::trading_sessions;
use crate::utils::rows_per_statement;
use harvest_core::calendar::{CalendarProvider, Region, TradingCalendar, WeekdayCalendar};
use harvest_core::errors::{Error, Result};

const SESSION_FORMAT: &str = "%Y-%m-%d";

/// Trading sessions persisted per region.
///
/// Regions with no stored sessions fall back to a weekday calendar.
pub struct CalendarRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
    fallback: WeekdayCalendar,
}

impl CalendarRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self {
            pool,
            writer,
            fallback: WeekdayCalendar::new(),
        }
    }

    pub fn with_fallback(mut self, fallback: WeekdayCalendar) -> Self {
        self.fallback = fallback;
        self
    }

    /// Stores sessions for `region`; already known sessions are kept.
    pub async fn save_sessions(&self, region: Region, sessions: &[NaiveDate]) -> Result<usize> {
        if sessions.is_empty() {
            return Ok(0);
        }
        let rows: Vec<SessionDB> = sessions
            .iter()
            .map(|d| SessionDB {
                region: region.code().to_string(),
                session: d.format(SESSION_FORMAT).to_string(),
            })
            .collect();

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                let mut written = 0;
                for chunk in rows.chunks(rows_per_statement(2)) {
                    written += diesel::insert_or_ignore_into(trading_sessions::table)
                        .values(chunk)
                        .execute(conn)
                        .into_core()?;
                }
                Ok(written)
            })
            .await
    }

    fn has_sessions(&self, conn: &mut SqliteConnection, region: Region) -> Result<bool> {
        let count: i64 = trading_sessions::table
            .filter(trading_sessions::region.eq(region.code()))
            .count()
            .get_result(conn)
            .into_core()?;
        Ok(count > 0)
    }
}

impl CalendarProvider for CalendarRepository {
    fn load_calendar(
        &self,
        region: Region,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<TradingCalendar> {
        if from > to {
            return Err(Error::Calendar(format!(
                "calendar range start {} is after end {}",
                from, to
            )));
        }
        let mut conn = get_connection(&self.pool)?;
        if !self.has_sessions(&mut conn, region)? {
            warn!(
                "No stored sessions for region {}, using weekday calendar",
                region
            );
            return self.fallback.load_calendar(region, from, to);
        }

        let rows = trading_sessions::table
            .filter(trading_sessions::region.eq(region.code()))
            .filter(trading_sessions::session.ge(from.format(SESSION_FORMAT).to_string()))
            .filter(trading_sessions::session.le(to.format(SESSION_FORMAT).to_string()))
            .select(SessionDB::as_select())
            .load::<SessionDB>(&mut conn)
            .into_core()?;

        let sessions = rows
            .iter()
            .map(|row| NaiveDate::parse_from_str(&row.session, SESSION_FORMAT))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(TradingCalendar::new(region, sessions))
    }
}
