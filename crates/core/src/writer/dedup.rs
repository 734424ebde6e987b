use std::collections::HashSet;

use crate::records::{Record, ReferenceRecords};

/// Collapses rows sharing an id, keeping the last occurrence of each.
///
/// Output order follows the position of each id's last occurrence.
pub fn collapse_duplicates(rows: Vec<Record>) -> Vec<Record> {
    let mut seen = HashSet::with_capacity(rows.len());
    let mut kept: Vec<Record> = rows
        .into_iter()
        .rev()
        .filter(|r| seen.insert(r.id.clone()))
        .collect();
    kept.reverse();
    kept
}

/// Drops rows whose id is already persisted.
pub fn net_new(rows: Vec<Record>, reference: &ReferenceRecords) -> Vec<Record> {
    rows.into_iter()
        .filter(|r| !reference.contains(&r.id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{Level, RecordKey, Value};
    use chrono::{Duration, NaiveDate, NaiveDateTime};
    use proptest::prelude::*;

    fn day(offset: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + Duration::days(offset)
    }

    #[test]
    fn test_collapse_keeps_last_occurrence() {
        let rows = vec![
            Record::new("e", day(1), Level::Day1).set("close", 1.0),
            Record::new("e", day(2), Level::Day1).set("close", 2.0),
            Record::new("e", day(1), Level::Day1).set("close", 3.0),
        ];
        let collapsed = collapse_duplicates(rows);
        assert_eq!(collapsed.len(), 2);
        assert_eq!(collapsed[0].timestamp, day(2));
        assert_eq!(collapsed[1].get("close"), Some(Value::Float(3.0)));
    }

    #[test]
    fn test_net_new_is_set_difference() {
        let reference = ReferenceRecords::new(
            "e",
            vec![RecordKey {
                id: Record::new("e", day(1), Level::Day1).id,
                timestamp: day(1),
            }],
        );
        let rows = vec![
            Record::new("e", day(1), Level::Day1),
            Record::new("e", day(2), Level::Day1),
        ];
        let remaining = net_new(rows, &reference);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].timestamp, day(2));
    }

    proptest! {
        #[test]
        fn prop_no_duplicate_ids_after_collapse(offsets in proptest::collection::vec(0i64..30, 0..200)) {
            let rows: Vec<Record> = offsets
                .iter()
                .enumerate()
                .map(|(i, o)| Record::new("e", day(*o), Level::Day1).set("seq", i as i64))
                .collect();
            let collapsed = collapse_duplicates(rows);

            let ids: HashSet<&str> = collapsed.iter().map(|r| r.id.as_str()).collect();
            prop_assert_eq!(ids.len(), collapsed.len());

            let distinct: HashSet<i64> = offsets.iter().copied().collect();
            prop_assert_eq!(collapsed.len(), distinct.len());

            for record in &collapsed {
                let offset = (record.timestamp - day(0)).num_days();
                let last = offsets.iter().rposition(|o| *o == offset).unwrap() as i64;
                prop_assert_eq!(record.get("seq"), Some(Value::Int(last)));
            }
        }
    }
}
