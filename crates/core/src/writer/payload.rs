use crate::errors::Result;
use crate::records::{ColumnDef, Record};

/// Field delimiter of bulk payloads.
pub const FIELD_DELIMITER: u8 = b'\t';

/// Marker for NULL fields in bulk payloads.
pub const NULL_MARKER: &str = "\\N";

/// Delimiter-separated rows in the target table's declared column order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkPayload {
    columns: Vec<String>,
    body: Vec<u8>,
    rows: usize,
}

impl BulkPayload {
    /// Serializes `rows` projected onto `columns`. Missing values become NULL.
    pub fn encode(columns: &[&ColumnDef], rows: &[Record]) -> Result<Self> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(FIELD_DELIMITER)
            .has_headers(false)
            .from_writer(Vec::new());
        for row in rows {
            let fields = columns.iter().map(|c| {
                row.get(&c.name)
                    .and_then(|v| v.to_field())
                    .unwrap_or_else(|| NULL_MARKER.to_string())
            });
            writer.write_record(fields)?;
        }
        let body = writer
            .into_inner()
            .map_err(|e| crate::Error::Unexpected(e.to_string()))?;
        Ok(BulkPayload {
            columns: columns.iter().map(|c| c.name.clone()).collect(),
            body,
            rows: rows.len(),
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.body
    }

    /// Reads the payload back as rows of optional fields.
    pub fn decode(&self) -> Result<Vec<Vec<Option<String>>>> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(FIELD_DELIMITER)
            .has_headers(false)
            .from_reader(self.body.as_slice());
        let mut rows = Vec::with_capacity(self.rows);
        for record in reader.records() {
            let record = record?;
            rows.push(
                record
                    .iter()
                    .map(|f| (f != NULL_MARKER).then(|| f.to_string()))
                    .collect(),
            );
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{ColumnKind, DatasetSchema, Level};
    use chrono::NaiveDate;

    #[test]
    fn test_encode_uses_declared_order_and_null_marker() {
        let schema = DatasetSchema::keyed(
            "stock_holders",
            vec![
                ColumnDef::new("holder_name", ColumnKind::Text),
                ColumnDef::new("ratio", ColumnKind::Real),
            ],
        );
        let ts = NaiveDate::from_ymd_opt(2023, 12, 31)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let rows = vec![
            Record::new("stock_sh_600000", ts, Level::Day1)
                .set("ratio", 0.25)
                .set("holder_name", "Fund\tA"),
            Record::new("stock_sh_600001", ts, Level::Day1),
        ];
        let columns: Vec<&ColumnDef> = schema.columns().iter().collect();
        let payload = BulkPayload::encode(&columns, &rows).unwrap();

        assert_eq!(payload.columns(), &["id", "entity_id", "timestamp", "holder_name", "ratio"]);
        assert_eq!(payload.row_count(), 2);

        let decoded = payload.decode().unwrap();
        assert_eq!(decoded[0][3].as_deref(), Some("Fund\tA"));
        assert_eq!(decoded[0][4].as_deref(), Some("0.25"));
        assert_eq!(decoded[1][2].as_deref(), Some("2023-12-31 00:00:00"));
        assert_eq!(decoded[1][3], None);
    }
}
