use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgRow;

/// Name of the insertion timestamp column shared by every TC table.
pub const CREATED_AT_COLUMN: &str = "created_at";

/// DDL of the TC tables.
///
/// Only used to prepare throwaway test databases; production schemas are managed outside
/// of this service.
pub const CREATE_TC_TABLES: &str = r#"
create table if not exists tc_4000_schedule (
    id bigserial primary key,
    "line_code" text not null default '',
    "sequence_no" text not null default '',
    "length" bigint not null default 0,
    "date" text not null default '',
    "time" text not null default '',
    "spare" text not null default '',
    "coil_number" text not null default '',
    "mo_number" text not null default '',
    "product_group" text not null default '',
    "material_code" text not null default '',
    "customer_name" text not null default '',
    "ccl_bom" text not null default '',
    "thickness" double precision not null default 0,
    "width" bigint not null default 0,
    "weight" bigint not null default 0,
    "length_value" bigint not null default 0,
    "through_plate" text not null default '',
    "sequence_order" bigint not null default 0,
    created_at timestamptz not null default now()
);

create table if not exists tc_4001_cut (
    id bigserial primary key,
    "line_code" text not null default '',
    "sequence_no" text not null default '',
    "length" bigint not null default 0,
    "date" text not null default '',
    "time" text not null default '',
    "spare" text not null default '',
    "coil_number" text not null default '',
    "cut_mode" bigint not null default 0,
    "winding_length" bigint not null default 0,
    created_at timestamptz not null default now()
);

create table if not exists tc_4002_wpd (
    id bigserial primary key,
    "line_code" text not null default '',
    "sequence_no" text not null default '',
    "length" bigint not null default 0,
    "date" text not null default '',
    "time" text not null default '',
    "spare" text not null default '',
    "coil_number" text not null default '',
    created_at timestamptz not null default now()
);

create table if not exists tc_4003_speed (
    id bigserial primary key,
    "line_code" text not null default '',
    "sequence_no" text not null default '',
    "length" bigint not null default 0,
    "date" text not null default '',
    "time" text not null default '',
    "spare" text not null default '',
    "line_speed" bigint not null default 0,
    created_at timestamptz not null default now()
);
"#;

/// One table per TC record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TcTable {
    Schedule,
    Cut,
    Wpd,
    Speed,
}

impl TcTable {
    pub const ALL: [TcTable; 4] = [TcTable::Schedule, TcTable::Cut, TcTable::Wpd, TcTable::Speed];

    pub fn name(&self) -> &'static str {
        match self {
            TcTable::Schedule => "tc_4000_schedule",
            TcTable::Cut => "tc_4001_cut",
            TcTable::Wpd => "tc_4002_wpd",
            TcTable::Speed => "tc_4003_speed",
        }
    }
}

/// A value bound to an insert parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SqlValue<'a> {
    Text(&'a str),
    BigInt(i64),
    Double(f64),
}

/// Builds `insert into <table> ("a", "b") values ($1, $2)`.
///
/// `created_at` is left to the column default so the server assigns it.
fn insert_statement(table: TcTable, columns: &[(&str, SqlValue<'_>)]) -> String {
    let names = columns
        .iter()
        .map(|(name, _)| format!(r#""{name}""#))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=columns.len())
        .map(|index| format!("${index}"))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "insert into {} ({names}) values ({placeholders})",
        table.name()
    )
}

/// Inserts one row into `table`.
///
/// Column names must come from the static field catalogue, they are not escaped.
pub async fn insert_row(
    pool: &PgPool,
    table: TcTable,
    columns: &[(&str, SqlValue<'_>)],
) -> Result<(), sqlx::Error> {
    let statement = insert_statement(table, columns);

    let mut query = sqlx::query(&statement);
    for (_, value) in columns {
        query = match *value {
            SqlValue::Text(text) => query.bind(text),
            SqlValue::BigInt(integer) => query.bind(integer),
            SqlValue::Double(decimal) => query.bind(decimal),
        };
    }

    query.execute(pool).await?;

    Ok(())
}

/// Returns the newest `limit` rows of `table`, newest first.
pub async fn fetch_recent(
    pool: &PgPool,
    table: TcTable,
    limit: i64,
) -> Result<Vec<PgRow>, sqlx::Error> {
    let statement = format!(
        "select * from {} order by created_at desc, id desc limit $1",
        table.name()
    );

    sqlx::query(&statement).bind(limit).fetch_all(pool).await
}

/// Returns the newest row of `table` for the coil, if any.
///
/// Only valid for tables carrying a `coil_number` column.
pub async fn fetch_latest_for_coil(
    pool: &PgPool,
    table: TcTable,
    coil_number: &str,
) -> Result<Option<PgRow>, sqlx::Error> {
    let statement = format!(
        "select * from {} where coil_number = $1 order by created_at desc, id desc limit 1",
        table.name()
    );

    sqlx::query(&statement)
        .bind(coil_number)
        .fetch_optional(pool)
        .await
}

/// Returns at most `limit` line speed rows inserted at or after `since`, newest first.
pub async fn fetch_speeds_since(
    pool: &PgPool,
    since: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<PgRow>, sqlx::Error> {
    sqlx::query(
        r#"
        select * from tc_4003_speed
        where created_at >= $1
        order by created_at desc, id desc
        limit $2
        "#,
    )
    .bind(since)
    .bind(limit)
    .fetch_all(pool)
    .await
}
