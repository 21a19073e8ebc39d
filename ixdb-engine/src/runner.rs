//! Drives either an index scan or a full table scan depending on the
//! planner's verdict, applying residual predicates and the requested
//! projection.

use std::cmp::Ordering;
use std::io::{Read, Seek, Write};

use crate::btree::BTreeIndex;
use crate::error::{Error, Result};
use crate::planner::{Attr, CmpOp, Literal, Plan, Predicate, ScanPlanner};
use crate::storage::RecordStore;
use crate::types::IndexCursor;

/// What to emit per matching row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    Key,
    Value,
    Both,
    Count,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub key: i32,
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryResult {
    Rows(Vec<Row>),
    Count(i64),
}

pub struct SelectRunner;

impl SelectRunner {
    /// Run `predicates` with `projection` against `records`, using `index`
    /// (if given and the plan says to) to avoid a full scan.
    pub fn run<P, R>(
        index: Option<&mut BTreeIndex<P>>,
        records: &mut RecordStore<R>,
        predicates: &[Predicate],
        projection: Projection,
    ) -> Result<QueryResult>
    where
        P: Read + Write + Seek,
        R: Read + Write + Seek,
    {
        let plan = ScanPlanner::plan(predicates);
        if !plan.satisfiable {
            return Ok(empty_result(projection));
        }

        let want_count_fast_path = predicates.is_empty() && projection == Projection::Count;
        let use_index = index.is_some() && (plan.use_tree || projection == Projection::Count);

        match index {
            Some(index) if use_index => {
                if want_count_fast_path {
                    return Ok(QueryResult::Count(index.total_entries()?));
                }
                Self::index_scan(index, records, predicates, &plan, projection)
            }
            _ => Self::table_scan(records, predicates, projection),
        }
    }

    fn index_scan<P, R>(
        index: &mut BTreeIndex<P>,
        records: &mut RecordStore<R>,
        predicates: &[Predicate],
        plan: &Plan,
        projection: Projection,
    ) -> Result<QueryResult>
    where
        P: Read + Write + Seek,
        R: Read + Write + Seek,
    {
        let value_predicates: Vec<&Predicate> =
            predicates.iter().filter(|p| p.attr == Attr::Value).collect();

        let mut cursor = IndexCursor::EXHAUSTED;
        match index.locate(plan.start_key, &mut cursor) {
            Ok(()) | Err(Error::NoSuchRecord) => {}
            Err(e) => return Err(e),
        }

        let mut rows = Vec::new();
        let mut count = 0i64;

        loop {
            if cursor.is_exhausted() {
                break;
            }
            let (key, rid) = match index.read_forward(&mut cursor) {
                Ok(entry) => entry,
                Err(Error::InvalidCursor) => break,
                Err(e) => return Err(e),
            };
            if key > plan.end_key {
                break;
            }
            if plan.ne_keys.contains(&key) {
                continue;
            }

            let mut fetched: Option<String> = None;
            let mut rejected = false;
            for p in &value_predicates {
                if fetched.is_none() {
                    fetched = Some(records.read(rid)?.1);
                }
                let v = fetched.as_ref().unwrap();
                if !matches_predicate(p, key, v) {
                    rejected = true;
                    break;
                }
            }
            if rejected {
                continue;
            }

            count += 1;
            match projection {
                Projection::Count => {}
                Projection::Key => rows.push(Row { key, value: None }),
                Projection::Value | Projection::Both => {
                    let value = match fetched {
                        Some(v) => v,
                        None => records.read(rid)?.1,
                    };
                    rows.push(Row { key, value: Some(value) });
                }
            }
        }

        Ok(finish(projection, rows, count))
    }

    fn table_scan<R>(
        records: &mut RecordStore<R>,
        predicates: &[Predicate],
        projection: Projection,
    ) -> Result<QueryResult>
    where
        R: Read + Write + Seek,
    {
        let mut rows = Vec::new();
        let mut count = 0i64;

        'rows: for (_, key, value) in records.scan()? {
            for p in predicates {
                if !matches_predicate(p, key, &value) {
                    continue 'rows;
                }
            }
            count += 1;
            match projection {
                Projection::Count => {}
                Projection::Key => rows.push(Row { key, value: None }),
                Projection::Value | Projection::Both => {
                    rows.push(Row { key, value: Some(value) })
                }
            }
        }

        Ok(finish(projection, rows, count))
    }
}

fn matches_predicate(p: &Predicate, key: i32, value: &str) -> bool {
    let ord = match (&p.attr, &p.value) {
        (Attr::Key, Literal::Int(v)) => key.cmp(v),
        (Attr::Value, Literal::Str(v)) => value.cmp(v.as_str()),
        // A predicate's attr and literal kind are pinned together by its
        // constructors; this arm is unreachable in practice.
        _ => return true,
    };
    match p.op {
        CmpOp::Eq => ord == Ordering::Equal,
        CmpOp::Ne => ord != Ordering::Equal,
        CmpOp::Lt => ord == Ordering::Less,
        CmpOp::Le => ord != Ordering::Greater,
        CmpOp::Gt => ord == Ordering::Greater,
        CmpOp::Ge => ord != Ordering::Less,
    }
}

fn finish(projection: Projection, rows: Vec<Row>, count: i64) -> QueryResult {
    match projection {
        Projection::Count => QueryResult::Count(count),
        _ => QueryResult::Rows(rows),
    }
}

fn empty_result(projection: Projection) -> QueryResult {
    match projection {
        Projection::Count => QueryResult::Count(0),
        _ => QueryResult::Rows(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed(records: &mut RecordStore<std::io::Cursor<Vec<u8>>>, index: &mut BTreeIndex<std::io::Cursor<Vec<u8>>>, rows: &[(i32, &str)]) {
        for (k, v) in rows {
            let rid = records.append(*k, v).unwrap();
            index.insert(*k, rid).unwrap();
        }
    }

    #[test]
    fn table_scan_without_index_applies_all_predicates() {
        let mut records = RecordStore::in_memory(256);
        for (k, v) in [(1, "a"), (2, "b"), (3, "c")] {
            records.append(k, v).unwrap();
        }
        let preds = vec![Predicate::key(CmpOp::Gt, 1)];
        let result = SelectRunner::run::<std::io::Cursor<Vec<u8>>, _>(
            None, &mut records, &preds, Projection::Key,
        )
        .unwrap();
        assert_eq!(
            result,
            QueryResult::Rows(vec![
                Row { key: 2, value: None },
                Row { key: 3, value: None },
            ])
        );
    }

    #[test]
    fn index_scan_respects_range_and_not_equal() {
        let mut records = RecordStore::in_memory(256);
        let mut index = BTreeIndex::in_memory(1024);
        seed(&mut records, &mut index, &[(1, "a"), (2, "b"), (3, "c"), (4, "d")]);

        let preds = vec![
            Predicate::key(CmpOp::Ge, 1),
            Predicate::key(CmpOp::Le, 4),
            Predicate::key(CmpOp::Ne, 2),
        ];
        let result =
            SelectRunner::run(Some(&mut index), &mut records, &preds, Projection::Key).unwrap();
        assert_eq!(
            result,
            QueryResult::Rows(vec![
                Row { key: 1, value: None },
                Row { key: 3, value: None },
                Row { key: 4, value: None },
            ])
        );
    }

    #[test]
    fn unconditional_count_uses_the_fast_path() {
        let mut records = RecordStore::in_memory(256);
        let mut index = BTreeIndex::in_memory(1024);
        seed(&mut records, &mut index, &[(1, "a"), (2, "b"), (3, "c")]);

        let result =
            SelectRunner::run(Some(&mut index), &mut records, &[], Projection::Count).unwrap();
        assert_eq!(result, QueryResult::Count(3));
    }

    #[test]
    fn value_predicate_filters_lazily_during_index_scan() {
        let mut records = RecordStore::in_memory(256);
        let mut index = BTreeIndex::in_memory(1024);
        seed(&mut records, &mut index, &[(1, "apple"), (2, "banana"), (3, "cherry")]);

        let preds = vec![
            Predicate::key(CmpOp::Ge, 1),
            Predicate::value(CmpOp::Eq, "banana"),
        ];
        let result =
            SelectRunner::run(Some(&mut index), &mut records, &preds, Projection::Both).unwrap();
        assert_eq!(
            result,
            QueryResult::Rows(vec![Row { key: 2, value: Some("banana".to_string()) }])
        );
    }

    #[test]
    fn unsatisfiable_plan_returns_no_rows() {
        let mut records = RecordStore::in_memory(256);
        let mut index = BTreeIndex::in_memory(1024);
        seed(&mut records, &mut index, &[(1, "a")]);

        let preds = vec![Predicate::key(CmpOp::Eq, 1), Predicate::key(CmpOp::Eq, 2)];
        let result =
            SelectRunner::run(Some(&mut index), &mut records, &preds, Projection::Count).unwrap();
        assert_eq!(result, QueryResult::Count(0));
    }
}
