//! `SeaORM` Entity for the `migrations` ledger table.
//!
//! A version is present in the ledger exactly when its up block has been
//! committed and no rollback of it has committed since.

use sea_orm::entity::prelude::*;
use sea_orm::{QueryOrder, Set};
use serde::{Deserialize, Serialize};

/// DDL for the ledger table. Safe to run on every invocation.
pub const CREATE_TABLE_SQL: &str = r"
CREATE TABLE IF NOT EXISTS migrations (
    version BIGINT PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at TIMESTAMP WITH TIME ZONE DEFAULT CURRENT_TIMESTAMP
)";

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "migrations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub version: i64,
    pub name: String,
    pub applied_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Creates the ledger table if it does not exist yet.
pub async fn ensure_table<C: ConnectionTrait>(conn: &C) -> Result<(), DbErr> {
    conn.execute_unprepared(CREATE_TABLE_SQL).await?;
    Ok(())
}

/// Returns applied versions, highest first.
pub async fn applied_versions<C: ConnectionTrait>(conn: &C) -> Result<Vec<i64>, DbErr> {
    let rows = Entity::find()
        .order_by_desc(Column::Version)
        .all(conn)
        .await?;
    Ok(rows.into_iter().map(|row| row.version).collect())
}

/// Returns every ledger row, lowest version first.
pub async fn entries<C: ConnectionTrait>(conn: &C) -> Result<Vec<Model>, DbErr> {
    Entity::find().order_by_asc(Column::Version).all(conn).await
}

/// Records `version` as applied. `applied_at` comes from the column default.
pub async fn record<C: ConnectionTrait>(conn: &C, version: i64, name: &str) -> Result<(), DbErr> {
    let row = ActiveModel {
        version: Set(version),
        name: Set(name.to_string()),
        ..Default::default()
    };
    Entity::insert(row).exec_without_returning(conn).await?;
    Ok(())
}

/// Removes the ledger row for `version`.
pub async fn remove<C: ConnectionTrait>(conn: &C, version: i64) -> Result<(), DbErr> {
    Entity::delete_by_id(version).exec(conn).await?;
    Ok(())
}
