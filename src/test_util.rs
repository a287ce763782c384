//! 测试共用的内存数据库与数据构造

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use serde_json::json;

use crate::entity::inbound::{self, Protocol};
use crate::migration::Migrator;

/// 每个测试独享的内存 SQLite
///
/// 连接数限制为 1，保证全部操作落在同一个内存库上。
pub(crate) async fn test_db() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1);
    let db = Database::connect(options).await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    db
}

/// 构造 settings 文档，每个 (email, totalGB, expiryTime) 三元组一个客户端
pub(crate) fn settings_doc(clients: &[(&str, i64, i64)]) -> String {
    let clients: Vec<_> = clients
        .iter()
        .map(|(email, total, expiry)| {
            json!({
                "id": format!("uuid-{}", email),
                "email": email,
                "totalGB": total,
                "expiryTime": expiry,
            })
        })
        .collect();
    json!({ "clients": clients, "decryption": "none" }).to_string()
}

/// 最小可入库的 vmess 入站
pub(crate) fn inbound_model(port: i32, settings: &str) -> inbound::Model {
    inbound::Model {
        id: 0,
        user_id: 1,
        up: 0,
        down: 0,
        total: 0,
        remark: String::new(),
        enable: true,
        expiry_time: 0,
        listen: String::new(),
        port,
        protocol: Protocol::Vmess,
        settings: settings.to_string(),
        stream_settings: "{}".to_string(),
        tag: String::new(),
        sniffing: "{}".to_string(),
    }
}
