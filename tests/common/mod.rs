#![allow(dead_code)]

use async_trait::async_trait;
use pagecrate::{DescribedModel, FieldDescriptor, Preload};
use sea_orm::{
    ConnectionTrait, Database, DatabaseConnection, DbErr, FromQueryResult, QueryResult, Statement,
};
use sea_orm_migration::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use tracing_subscriber::EnvFilter;

pub const POST_COUNT: i32 = 25;

/// In-memory SQLite with 2 authors and 25 posts.
///
/// Post `i` has title `Post {i:02}`, status `published` when `i` is even
/// (`draft` otherwise), `views = i * 10`, author `1 + i % 2`, a body mentioning
/// "go" when `i` is a multiple of 5, and is soft deleted when `i > 22`.
pub async fn setup_test_db() -> Result<DatabaseConnection, DbErr> {
    init_tracing();
    let db = Database::connect("sqlite::memory:").await?;

    Migrator::up(&db, None).await?;
    seed(&db).await?;

    Ok(db)
}

/// Honour `RUST_LOG` in test output, e.g. `RUST_LOG=pagecrate=debug`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn seed(db: &DatabaseConnection) -> Result<(), DbErr> {
    db.execute_unprepared("INSERT INTO authors (id, name) VALUES (1, 'Ada'), (2, 'Linus')")
        .await?;

    let rows: Vec<String> = (1..=POST_COUNT)
        .map(|i| {
            let body = if i % 5 == 0 {
                "learning go today"
            } else {
                "rust notes"
            };
            let status = if i % 2 == 0 { "published" } else { "draft" };
            let deleted_at = if i > 22 { "'2024-01-01'" } else { "NULL" };
            format!(
                "({i}, 'Post {i:02}', '{body}', '{status}', {}, {}, {deleted_at})",
                i * 10,
                1 + i % 2
            )
        })
        .collect();

    db.execute_unprepared(&format!(
        "INSERT INTO posts (id, title, body, status, views, author_id, deleted_at) VALUES {}",
        rows.join(", ")
    ))
    .await?;

    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostRow {
    pub id: i32,
    pub title: String,
    pub body: String,
    pub status: String,
    pub views: i32,
    pub author_id: i32,
    pub deleted_at: Option<String>,
    pub author: Option<String>,
}

impl FromQueryResult for PostRow {
    fn from_query_result(res: &QueryResult, pre: &str) -> Result<Self, DbErr> {
        Ok(Self {
            id: res.try_get(pre, "id")?,
            title: res.try_get(pre, "title")?,
            body: res.try_get(pre, "body")?,
            status: res.try_get(pre, "status")?,
            views: res.try_get(pre, "views")?,
            author_id: res.try_get(pre, "author_id")?,
            deleted_at: res.try_get(pre, "deleted_at")?,
            author: None,
        })
    }
}

#[async_trait]
impl Preload for PostRow {
    async fn preload(
        db: &DatabaseConnection,
        rows: &mut [Self],
        relation: &str,
    ) -> Result<(), DbErr> {
        if relation != "author" {
            return Ok(());
        }

        let statement = Statement::from_string(
            db.get_database_backend(),
            "SELECT id, name FROM authors".to_string(),
        );
        let authors: HashMap<i32, String> = db
            .query_all(statement)
            .await?
            .iter()
            .map(|row| -> Result<(i32, String), DbErr> {
                Ok((row.try_get("", "id")?, row.try_get("", "name")?))
            })
            .collect::<Result<_, DbErr>>()?;

        for row in rows.iter_mut() {
            row.author = authors.get(&row.author_id).cloned();
        }
        Ok(())
    }
}

pub struct Post;

impl DescribedModel for Post {
    const TABLE_NAME: &'static str = "posts";
    const FIELDS: &'static [FieldDescriptor] = &[
        FieldDescriptor::new("id"),
        FieldDescriptor::new("Title").with_column("title"),
        FieldDescriptor::new("Status").with_column("status"),
        FieldDescriptor::new("Views").with_column("views"),
        FieldDescriptor::new("AuthorId")
            .with_column("author_id")
            .with_external("authorId"),
        FieldDescriptor::new("DeletedAt")
            .with_column("deleted_at")
            .with_external("deletedAt"),
    ];
}

pub fn ids(rows: &[PostRow]) -> Vec<i32> {
    rows.iter().map(|row| row.id).collect()
}

pub struct Migrator;

#[async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(CreateBlogTables)]
    }
}

pub struct CreateBlogTables;

impl MigrationName for CreateBlogTables {
    fn name(&self) -> &'static str {
        "m20240101_000001_create_blog_tables"
    }
}

#[async_trait]
impl MigrationTrait for CreateBlogTables {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Authors::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Authors::Id).integer().not_null().primary_key())
                    .col(ColumnDef::new(Authors::Name).string().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Posts::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Posts::Id).integer().not_null().primary_key())
                    .col(ColumnDef::new(Posts::Title).string().not_null())
                    .col(ColumnDef::new(Posts::Body).string().not_null())
                    .col(ColumnDef::new(Posts::Status).string().not_null())
                    .col(ColumnDef::new(Posts::Views).integer().not_null())
                    .col(ColumnDef::new(Posts::AuthorId).integer().not_null())
                    .col(ColumnDef::new(Posts::DeletedAt).string().null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Posts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Authors::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Authors {
    Table,
    Id,
    Name,
}

#[derive(DeriveIden)]
enum Posts {
    Table,
    Id,
    Title,
    Body,
    Status,
    Views,
    AuthorId,
    DeletedAt,
}
