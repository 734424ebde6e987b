use diesel::prelude::*;

/// One trading session of a region, stored as `YYYY-MM-DD`.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::schema::trading_sessions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SessionDB {
    pub region: String,
    pub session: String,
}
