//! 错误类型定义

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// 端口已被其他入站占用
    #[error("Port already exists: {0}")]
    PortConflict(i32),

    /// email 与现有客户端重复（同文档内或跨入站）
    #[error("Duplicate email: {0}")]
    DuplicateEmail(String),

    /// settings 文档无法解析
    #[error("Malformed settings: {0}")]
    MalformedSettings(#[from] serde_json::Error),

    /// 入站不存在
    #[error("Inbound not found: {0}")]
    InboundNotFound(i64),

    /// 客户端不存在
    #[error("Client not found: {0}")]
    ClientNotFound(String),

    #[error("Database error: {0}")]
    Db(#[from] sea_orm::DbErr),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
