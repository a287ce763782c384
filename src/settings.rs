//! 入站 settings 文档解析
//!
//! settings 是入站配置内嵌的 JSON 文档，客户端列表存放在 `clients`
//! 数组中，其余字段原样透传、不做解析。

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::error::Result;

/// settings 文档中的单个客户端
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientSetting {
    /// vmess/vless 凭证
    #[serde(default)]
    pub id: String,
    /// trojan 凭证
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub email: String,
    /// 流量配额（字节，0 表示不限）
    #[serde(rename = "totalGB", default)]
    pub total: i64,
    /// 到期时间（毫秒时间戳，0 表示永不过期）
    #[serde(rename = "expiryTime", default)]
    pub expiry_time: i64,
}

#[derive(Debug, Default, Deserialize)]
struct SettingsDocument {
    #[serde(default)]
    clients: Option<Vec<ClientSetting>>,
}

/// 提取 settings 文档中的客户端列表（保持文档内顺序）
///
/// 文档不可解析时返回 `MalformedSettings`；可解析但没有 `clients`
/// 字段（或为 null）时返回空列表。
pub fn extract_clients(settings: &str) -> Result<Vec<ClientSetting>> {
    let doc: SettingsDocument = serde_json::from_str(settings)?;
    Ok(doc.clients.unwrap_or_default())
}

/// 新旧客户端列表之间的差异，按 email 对齐
///
/// 空 email 的客户端不参与统计，两侧都会被忽略。
#[derive(Debug, Default, PartialEq)]
pub struct ClientDiff {
    /// 新增的客户端
    pub created: Vec<ClientSetting>,
    /// 保留但配额或到期时间有变化的客户端
    pub updated: Vec<ClientSetting>,
    /// 被移除的客户端 email
    pub deleted: Vec<String>,
}

impl ClientDiff {
    /// 计算把 `old` 变成 `new` 所需的客户端增删改
    pub fn between(old: &[ClientSetting], new: &[ClientSetting]) -> Self {
        let old_by_email: HashMap<&str, &ClientSetting> = old
            .iter()
            .filter(|c| !c.email.is_empty())
            .map(|c| (c.email.as_str(), c))
            .collect();

        let mut diff = ClientDiff::default();
        for client in new {
            if client.email.is_empty() {
                continue;
            }
            match old_by_email.get(client.email.as_str()) {
                None => diff.created.push(client.clone()),
                Some(old_client) => {
                    if old_client.total != client.total
                        || old_client.expiry_time != client.expiry_time
                    {
                        diff.updated.push(client.clone());
                    }
                }
            }
        }

        let new_emails: HashSet<&str> = new
            .iter()
            .filter(|c| !c.email.is_empty())
            .map(|c| c.email.as_str())
            .collect();
        for client in old {
            if !client.email.is_empty() && !new_emails.contains(client.email.as_str()) {
                diff.deleted.push(client.email.clone());
            }
        }

        diff
    }

    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(email: &str, total: i64, expiry_time: i64) -> ClientSetting {
        ClientSetting {
            email: email.to_string(),
            total,
            expiry_time,
            ..Default::default()
        }
    }

    #[test]
    fn test_extract_clients() {
        // 常规文档
        let clients = extract_clients(
            r#"{"clients": [{"id": "u1", "email": "a@x", "totalGB": 100, "expiryTime": 9}], "decryption": "none"}"#,
        )
        .unwrap();
        assert_eq!(clients.len(), 1);
        assert_eq!(clients[0].email, "a@x");
        assert_eq!(clients[0].total, 100);
        assert_eq!(clients[0].expiry_time, 9);

        // 缺少 clients 字段
        let clients = extract_clients(r#"{"decryption": "none"}"#).unwrap();
        assert!(clients.is_empty());

        // clients 为 null
        let clients = extract_clients(r#"{"clients": null}"#).unwrap();
        assert!(clients.is_empty());

        // 客户端未给出的字段取默认值
        let clients = extract_clients(r#"{"clients": [{"email": "b@x"}]}"#).unwrap();
        assert_eq!(clients[0].total, 0);
        assert_eq!(clients[0].expiry_time, 0);

        // 不可解析的文档
        assert!(extract_clients("not json").is_err());
        assert!(extract_clients("null").is_err());
        assert!(extract_clients(r#"{"clients": "oops"}"#).is_err());
    }

    #[test]
    fn test_client_diff() {
        let old = vec![client("a@x", 10, 0), client("b@x", 20, 0)];
        let new = vec![client("b@x", 25, 0), client("c@x", 30, 0)];

        let diff = ClientDiff::between(&old, &new);
        assert_eq!(diff.created, vec![client("c@x", 30, 0)]);
        assert_eq!(diff.updated, vec![client("b@x", 25, 0)]);
        assert_eq!(diff.deleted, vec!["a@x".to_string()]);
    }

    #[test]
    fn test_client_diff_mid_list_insertion() {
        // 在列表中间插入，不应把后移的既有客户端当成新增
        let old = vec![client("a@x", 0, 0), client("b@x", 0, 0)];
        let new = vec![client("a@x", 0, 0), client("m@x", 0, 0), client("b@x", 0, 0)];

        let diff = ClientDiff::between(&old, &new);
        assert_eq!(diff.created, vec![client("m@x", 0, 0)]);
        assert!(diff.updated.is_empty());
        assert!(diff.deleted.is_empty());
    }

    #[test]
    fn test_client_diff_ignores_empty_emails() {
        let old = vec![client("", 10, 0), client("a@x", 10, 0)];
        let new = vec![client("a@x", 10, 0), client("", 99, 0)];

        let diff = ClientDiff::between(&old, &new);
        assert!(diff.is_empty());
    }
}
