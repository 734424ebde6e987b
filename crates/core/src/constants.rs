/// Number of rows a provider is asked for when the planner cannot size a window.
pub const DEFAULT_FETCH_SIZE: usize = 2000;

/// Entity type used by the stock recorders.
pub const ENTITY_TYPE_STOCK: &str = "stock";

/// Entity type used by index recorders.
pub const ENTITY_TYPE_INDEX: &str = "index";

/// Entity type used by ETF recorders.
pub const ENTITY_TYPE_ETF: &str = "etf";

/// Key columns every dataset table carries.
pub const ID_COLUMN: &str = "id";
pub const ENTITY_ID_COLUMN: &str = "entity_id";
pub const TIMESTAMP_COLUMN: &str = "timestamp";

/// Storage format for timestamps in dataset tables and bulk payloads.
pub const TIMESTAMP_STORAGE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Record id timestamp format for daily and coarser levels.
pub const RECORD_ID_DAY_FORMAT: &str = "%Y-%m-%d";

/// Record id timestamp format for intraday levels.
pub const RECORD_ID_INTRADAY_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
