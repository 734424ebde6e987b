use super::Value;
use crate::constants::{ENTITY_ID_COLUMN, ID_COLUMN, TIMESTAMP_COLUMN};

/// Key columns that can appear in record filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Id,
    EntityId,
    Timestamp,
}

impl Column {
    pub fn name(&self) -> &'static str {
        match self {
            Column::Id => ID_COLUMN,
            Column::EntityId => ENTITY_ID_COLUMN,
            Column::Timestamp => TIMESTAMP_COLUMN,
        }
    }

    pub fn eq(self, value: impl Into<Value>) -> Predicate {
        Predicate::Eq(self, value.into())
    }

    pub fn ge(self, value: impl Into<Value>) -> Predicate {
        Predicate::Ge(self, value.into())
    }

    pub fn le(self, value: impl Into<Value>) -> Predicate {
        Predicate::Le(self, value.into())
    }

    pub fn is_in<I, V>(self, values: I) -> Predicate
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Predicate::In(self, values.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq(Column, Value),
    Ge(Column, Value),
    Le(Column, Value),
    In(Column, Vec<Value>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

/// Filter over the key columns of a dataset table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordQuery {
    pub predicates: Vec<Predicate>,
    pub order: Option<(Column, Order)>,
    pub limit: Option<usize>,
}

impl RecordQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// All rows of one entity.
    pub fn for_entity(entity_id: &str) -> Self {
        Self::new().filter(Column::EntityId.eq(entity_id))
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn order_by(mut self, column: Column, order: Order) -> Self {
        self.order = Some((column, order));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let query = RecordQuery::for_entity("stock_sh_600000")
            .filter(Column::Id.is_in(["a", "b"]))
            .order_by(Column::Timestamp, Order::Desc)
            .limit(1);
        assert_eq!(query.predicates.len(), 2);
        assert_eq!(
            query.predicates[0],
            Predicate::Eq(Column::EntityId, Value::Text("stock_sh_600000".into()))
        );
        assert_eq!(query.order, Some((Column::Timestamp, Order::Desc)));
        assert_eq!(query.limit, Some(1));
    }
}
