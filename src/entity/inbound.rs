use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inbound")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[serde(rename = "userId")]
    pub user_id: i64,
    pub up: i64,
    pub down: i64,
    pub total: i64,
    pub remark: String,
    pub enable: bool,
    #[serde(rename = "expiryTime")]
    pub expiry_time: i64,
    pub listen: String,
    pub port: i32,
    pub protocol: Protocol,
    pub settings: String,
    #[serde(rename = "streamSettings")]
    pub stream_settings: String,
    pub tag: String,
    pub sniffing: String,
}

#[derive(Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
pub enum Protocol {
    #[sea_orm(string_value = "vmess")]
    #[serde(rename = "vmess")]
    Vmess,
    #[sea_orm(string_value = "vless")]
    #[serde(rename = "vless")]
    Vless,
    #[sea_orm(string_value = "trojan")]
    #[serde(rename = "trojan")]
    Trojan,
    #[sea_orm(string_value = "shadowsocks")]
    #[serde(rename = "shadowsocks")]
    Shadowsocks,
    #[sea_orm(string_value = "dokodemo-door")]
    #[serde(rename = "dokodemo-door")]
    DokodemoDoor,
    #[sea_orm(string_value = "socks")]
    #[serde(rename = "socks")]
    Socks,
    #[sea_orm(string_value = "http")]
    #[serde(rename = "http")]
    Http,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::client_traffic::Entity")]
    ClientTraffic,
}

impl Related<super::client_traffic::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ClientTraffic.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
