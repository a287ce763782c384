use sea_orm::{Database, DatabaseConnection};
use sea_orm_migration::prelude::*;
use std::fs::create_dir_all;
use std::{fs, path};

mod m20260301_000001_init;
mod m20260315_000001_add_email_unique_index;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260301_000001_init::Migration),
            Box::new(m20260315_000001_add_email_unique_index::Migration),
        ]
    }
}

/// 初始化 SQLite 数据库连接（文件不存在时先创建）
pub async fn init_sqlite(db_path: &str) -> crate::error::Result<DatabaseConnection> {
    let path = path::Path::new(db_path);
    if !path.exists() {
        if let Some(parent) = path.parent() {
            create_dir_all(parent)?;
        }
        fs::write(path, "")?;
    }
    let db = Database::connect(format!("sqlite://{}", db_path)).await?;

    Ok(db)
}
