//! SQL rendering for [`RecordQuery`] values. Identifiers come only from the
//! collection catalogue; every comparison value is bound.

use sqlx::{Postgres, QueryBuilder};

use crate::application::query::{Filter, FilterOp, RecordQuery};
use crate::domain::collections::{Collection, Column, ColumnKind};

pub(super) fn select_page(query: &RecordQuery, offset: u64, limit: u64) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!(
        "SELECT to_jsonb(t) FROM {} t",
        query.collection.table()
    ));
    push_predicates(&mut qb, &query.filters);

    qb.push(" ORDER BY ");
    if let Some(sort) = query.sort {
        qb.push(format!(
            "t.\"{}\" {} NULLS LAST, ",
            sort.column.name,
            if sort.descending { "DESC" } else { "ASC" }
        ));
    }
    qb.push("t.\"id\" ASC");

    qb.push(" LIMIT ");
    qb.push_bind(clamp_i64(limit));
    qb.push(" OFFSET ");
    qb.push_bind(clamp_i64(offset));
    qb
}

pub(super) fn select_count(query: &RecordQuery) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!(
        "SELECT COUNT(*) FROM {} t",
        query.collection.table()
    ));
    push_predicates(&mut qb, &query.filters);
    qb
}

/// Insert a full row from JSON. Collections with a dedup key skip conflicting rows.
pub(super) fn insert_row(collection: Collection) -> String {
    let table = collection.table();
    let conflict = collection
        .dedup_key()
        .map(|columns| format!(" ON CONFLICT ({}) DO NOTHING", quoted(columns.iter().copied())))
        .unwrap_or_default();
    format!(
        "INSERT INTO {table} AS t SELECT * FROM jsonb_populate_record(NULL::{table}, $1){conflict} RETURNING to_jsonb(t)"
    )
}

/// Merge a JSON patch over the stored row; keys absent from the patch keep their values.
pub(super) fn update_row(collection: Collection) -> String {
    let table = collection.table();
    let columns = quoted(
        collection
            .columns()
            .iter()
            .map(|column| column.name)
            .filter(|name| *name != "id"),
    );
    format!(
        "UPDATE {table} AS t SET ({columns}) = (SELECT {columns} FROM jsonb_populate_record(t, $2)) WHERE t.\"id\" = $1 RETURNING to_jsonb(t)"
    )
}

pub(super) fn delete_row(collection: Collection) -> String {
    format!("DELETE FROM {} WHERE \"id\" = $1", collection.table())
}

fn push_predicates(qb: &mut QueryBuilder<'static, Postgres>, filters: &[Filter]) {
    for (index, filter) in filters.iter().enumerate() {
        qb.push(if index == 0 { " WHERE " } else { " AND " });
        let column = filter.column.name;
        match &filter.op {
            FilterOp::Eq(value) => {
                qb.push(format!("t.\"{column}\" = "));
                push_scalar(qb, filter.column, value);
            }
            FilterOp::NotEq(value) => {
                qb.push(format!("t.\"{column}\" IS DISTINCT FROM "));
                push_scalar(qb, filter.column, value);
            }
            FilterOp::Contains(values) => {
                qb.push(format!("t.\"{column}\" @> "));
                qb.push_bind(values.clone());
                qb.push("::text[]");
            }
        }
    }
}

fn push_scalar(qb: &mut QueryBuilder<'static, Postgres>, column: Column, value: &str) {
    qb.push_bind(value.to_string());
    qb.push(match column.kind {
        ColumnKind::Uuid => "::uuid",
        ColumnKind::Integer => "::bigint",
        ColumnKind::Timestamp => "::timestamptz",
        ColumnKind::Text | ColumnKind::TextArray | ColumnKind::Json => "",
    });
}

fn quoted<'a>(names: impl Iterator<Item = &'a str>) -> String {
    names
        .map(|name| format!("\"{name}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

fn clamp_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
