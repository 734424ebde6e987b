// Diesel schema for the fixed tables. Dataset tables are created at runtime
// from their `DatasetSchema` and queried with raw SQL.

diesel::table! {
    entities (id) {
        id -> Text,
        entity_type -> Text,
        exchange -> Text,
        code -> Text,
        name -> Text,
        timestamp -> Nullable<Text>,
        is_active -> Bool,
    }
}

diesel::table! {
    trading_sessions (region, session) {
        region -> Text,
        session -> Text,
    }
}

diesel::allow_tables_to_appear_in_same_query!(entities, trading_sessions);
