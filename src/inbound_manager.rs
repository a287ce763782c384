//! 入站管理器
//!
//! 管理入站配置的生命周期，保持内嵌客户端列表与 client_traffic
//! 统计行一一对应，port/email 唯一性校验跨全部入站生效。

use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, NotSet,
    PaginatorTrait, QueryFilter, Set, TransactionTrait,
};
use std::collections::HashSet;
use tracing::warn;

use crate::entity::inbound::Protocol;
use crate::entity::{client_traffic, inbound, ClientTraffic, Inbound};
use crate::error::{Error, Result};
use crate::settings::{self, ClientDiff, ClientSetting};

/// 入站管理器，持有数据库连接
pub struct InboundManager {
    db: DatabaseConnection,
}

impl InboundManager {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// 查询指定用户的入站及其客户端流量记录
    pub async fn get_inbounds(
        &self,
        user_id: i64,
    ) -> Result<Vec<(inbound::Model, Vec<client_traffic::Model>)>> {
        let inbounds = Inbound::find()
            .filter(inbound::Column::UserId.eq(user_id))
            .find_with_related(ClientTraffic)
            .all(&self.db)
            .await?;
        Ok(inbounds)
    }

    /// 查询全部入站及其客户端流量记录
    pub async fn get_all_inbounds(
        &self,
    ) -> Result<Vec<(inbound::Model, Vec<client_traffic::Model>)>> {
        let inbounds = Inbound::find()
            .find_with_related(ClientTraffic)
            .all(&self.db)
            .await?;
        Ok(inbounds)
    }

    pub async fn get_inbound(&self, id: i64) -> Result<Option<inbound::Model>> {
        Ok(Inbound::find_by_id(id).one(&self.db).await?)
    }

    /// 新增入站
    ///
    /// 校验通过后写入，tag 由端口推导。客户端流量记录在入站落库后
    /// 逐条创建，单条失败只记日志，不回滚入站。
    pub async fn add_inbound(&self, inbound: &inbound::Model) -> Result<inbound::Model> {
        if self.check_port_exist(inbound.port, 0).await? {
            return Err(Error::PortConflict(inbound.port));
        }
        if let Some(email) = self.check_email_exist_for_inbound(inbound).await? {
            return Err(Error::DuplicateEmail(email));
        }
        let clients = settings::extract_clients(&inbound.settings)?;

        let stored = new_inbound_active(inbound).insert(&self.db).await?;

        for client in &clients {
            if client.email.is_empty() {
                continue;
            }
            if let Err(e) = Self::add_client_stat(&self.db, stored.id, client).await {
                warn!("创建客户端流量记录失败: {} ({})", client.email, e);
            }
        }
        Ok(stored)
    }

    /// 批量新增入站，全部端口校验通过后在一个事务内写入
    ///
    /// 此路径不创建客户端流量记录，由首次流量上报时补建。
    pub async fn add_inbounds(&self, inbounds: &[inbound::Model]) -> Result<()> {
        for inbound in inbounds {
            if self.check_port_exist(inbound.port, 0).await? {
                return Err(Error::PortConflict(inbound.port));
            }
        }

        let txn = self.db.begin().await?;
        for inbound in inbounds {
            new_inbound_active(inbound).insert(&txn).await?;
        }
        txn.commit().await?;

        Ok(())
    }

    /// 更新入站的可变字段，tag 重新由端口推导
    ///
    /// 不调整客户端流量记录，客户端增删改走专门的操作。
    pub async fn update_inbound(&self, inbound: &inbound::Model) -> Result<inbound::Model> {
        if self.check_port_exist(inbound.port, inbound.id).await? {
            return Err(Error::PortConflict(inbound.port));
        }
        if let Some(email) = self.check_email_exist_for_inbound(inbound).await? {
            return Err(Error::DuplicateEmail(email));
        }
        let stored = self
            .get_inbound(inbound.id)
            .await?
            .ok_or(Error::InboundNotFound(inbound.id))?;

        let mut active: inbound::ActiveModel = stored.into();
        active.up = Set(inbound.up);
        active.down = Set(inbound.down);
        active.total = Set(inbound.total);
        active.remark = Set(inbound.remark.clone());
        active.enable = Set(inbound.enable);
        active.expiry_time = Set(inbound.expiry_time);
        active.listen = Set(inbound.listen.clone());
        active.port = Set(inbound.port);
        active.protocol = Set(inbound.protocol.clone());
        active.settings = Set(inbound.settings.clone());
        active.stream_settings = Set(inbound.stream_settings.clone());
        active.sniffing = Set(inbound.sniffing.clone());
        active.tag = Set(format!("inbound-{}", inbound.port));

        Ok(active.update(&self.db).await?)
    }

    /// 删除入站，先删它的客户端流量记录再删入站本身
    pub async fn del_inbound(&self, id: i64) -> Result<()> {
        ClientTraffic::delete_many()
            .filter(client_traffic::Column::InboundId.eq(id))
            .exec(&self.db)
            .await?;
        Inbound::delete_by_id(id).exec(&self.db).await?;
        Ok(())
    }

    /// 用传入的 settings 文档整体替换存量文档，并按 email 差异
    /// 调整客户端流量记录，全程一个事务
    pub async fn add_inbound_client(&self, inbound: &inbound::Model) -> Result<()> {
        if let Some(email) = self.check_email_exist_for_inbound(inbound).await? {
            return Err(Error::DuplicateEmail(email));
        }
        let new_clients = settings::extract_clients(&inbound.settings)?;

        let stored = self
            .get_inbound(inbound.id)
            .await?
            .ok_or(Error::InboundNotFound(inbound.id))?;
        let old_clients = settings::extract_clients(&stored.settings)?;

        let diff = ClientDiff::between(&old_clients, &new_clients);

        let txn = self.db.begin().await?;
        for client in &diff.created {
            Self::add_client_stat(&txn, stored.id, client).await?;
        }
        for client in &diff.updated {
            Self::update_client_stat(&txn, &client.email, client).await?;
        }
        for email in &diff.deleted {
            Self::del_client_stat(&txn, email).await?;
        }

        let mut active: inbound::ActiveModel = stored.into();
        active.settings = Set(inbound.settings.clone());
        active.update(&txn).await?;
        txn.commit().await?;

        Ok(())
    }

    /// 删除指定 email 的客户端：流量记录与文档替换在一个事务内完成
    pub async fn del_inbound_client(&self, inbound: &inbound::Model, email: &str) -> Result<()> {
        let stored = self
            .get_inbound(inbound.id)
            .await?
            .ok_or(Error::InboundNotFound(inbound.id))?;

        let txn = self.db.begin().await?;
        Self::del_client_stat(&txn, email).await?;

        let mut active: inbound::ActiveModel = stored.into();
        active.settings = Set(inbound.settings.clone());
        active.update(&txn).await?;
        txn.commit().await?;

        Ok(())
    }

    /// 更新第 `index` 个客户端
    ///
    /// email 改名沿用旧 email 的流量记录；email 清空则删除记录；
    /// 旧槽位没有 email 而新值有，则补建记录。越界返回 `ClientNotFound`。
    pub async fn update_inbound_client(
        &self,
        inbound: &inbound::Model,
        index: usize,
    ) -> Result<()> {
        if let Some(email) = self.check_email_exist_for_inbound(inbound).await? {
            return Err(Error::DuplicateEmail(email));
        }
        let clients = settings::extract_clients(&inbound.settings)?;

        let stored = self
            .get_inbound(inbound.id)
            .await?
            .ok_or(Error::InboundNotFound(inbound.id))?;
        let old_clients = settings::extract_clients(&stored.settings)?;

        let client = clients
            .get(index)
            .ok_or_else(|| Error::ClientNotFound(format!("#{}", index)))?;
        let old_client = old_clients
            .get(index)
            .ok_or_else(|| Error::ClientNotFound(format!("#{}", index)))?;

        let txn = self.db.begin().await?;
        if !client.email.is_empty() {
            if !old_client.email.is_empty() {
                Self::update_client_stat(&txn, &old_client.email, client).await?;
            } else {
                Self::add_client_stat(&txn, stored.id, client).await?;
            }
        } else if !old_client.email.is_empty() {
            Self::del_client_stat(&txn, &old_client.email).await?;
        }

        let mut active: inbound::ActiveModel = stored.into();
        active.settings = Set(inbound.settings.clone());
        active.update(&txn).await?;
        txn.commit().await?;

        Ok(())
    }

    /// 端口是否已被占用，ignore_id > 0 时排除该入站自身
    async fn check_port_exist(&self, port: i32, ignore_id: i64) -> Result<bool> {
        let mut query = Inbound::find().filter(inbound::Column::Port.eq(port));
        if ignore_id > 0 {
            query = query.filter(inbound::Column::Id.ne(ignore_id));
        }
        Ok(query.count(&self.db).await? > 0)
    }

    /// 在多客户端协议的全部入站中查找与候选集合重复的 email
    async fn check_emails_exist(
        &self,
        emails: &HashSet<String>,
        ignore_id: i64,
    ) -> Result<Option<String>> {
        if emails.is_empty() {
            return Ok(None);
        }
        let mut query = Inbound::find().filter(
            inbound::Column::Protocol.is_in([Protocol::Vmess, Protocol::Vless, Protocol::Trojan]),
        );
        if ignore_id > 0 {
            query = query.filter(inbound::Column::Id.ne(ignore_id));
        }

        for other in query.all(&self.db).await? {
            for client in settings::extract_clients(&other.settings)? {
                if emails.contains(&client.email) {
                    return Ok(Some(client.email));
                }
            }
        }
        Ok(None)
    }

    /// 校验入站文档内的 email：先查文档内重复，再查跨入站重复
    async fn check_email_exist_for_inbound(
        &self,
        inbound: &inbound::Model,
    ) -> Result<Option<String>> {
        let clients = settings::extract_clients(&inbound.settings)?;
        let mut emails = HashSet::new();
        for client in &clients {
            if client.email.is_empty() {
                continue;
            }
            if !emails.insert(client.email.clone()) {
                return Ok(Some(client.email.clone()));
            }
        }
        self.check_emails_exist(&emails, inbound.id).await
    }

    async fn add_client_stat<C>(conn: &C, inbound_id: i64, client: &ClientSetting) -> Result<()>
    where
        C: ConnectionTrait,
    {
        let stat = client_traffic::ActiveModel {
            id: NotSet,
            inbound_id: Set(inbound_id),
            enable: Set(true),
            email: Set(client.email.clone()),
            up: Set(0),
            down: Set(0),
            expiry_time: Set(client.expiry_time),
            total: Set(client.total),
        };
        stat.insert(conn).await?;
        Ok(())
    }

    async fn update_client_stat<C>(conn: &C, email: &str, client: &ClientSetting) -> Result<()>
    where
        C: ConnectionTrait,
    {
        ClientTraffic::update_many()
            .col_expr(client_traffic::Column::Enable, Expr::value(true))
            .col_expr(
                client_traffic::Column::Email,
                Expr::value(client.email.as_str()),
            )
            .col_expr(client_traffic::Column::Total, Expr::value(client.total))
            .col_expr(
                client_traffic::Column::ExpiryTime,
                Expr::value(client.expiry_time),
            )
            .filter(client_traffic::Column::Email.eq(email))
            .exec(conn)
            .await?;
        Ok(())
    }

    async fn del_client_stat<C>(conn: &C, email: &str) -> Result<()>
    where
        C: ConnectionTrait,
    {
        ClientTraffic::delete_many()
            .filter(client_traffic::Column::Email.eq(email))
            .exec(conn)
            .await?;
        Ok(())
    }
}

fn new_inbound_active(inbound: &inbound::Model) -> inbound::ActiveModel {
    inbound::ActiveModel {
        id: NotSet,
        user_id: Set(inbound.user_id),
        up: Set(inbound.up),
        down: Set(inbound.down),
        total: Set(inbound.total),
        remark: Set(inbound.remark.clone()),
        enable: Set(inbound.enable),
        expiry_time: Set(inbound.expiry_time),
        listen: Set(inbound.listen.clone()),
        port: Set(inbound.port),
        protocol: Set(inbound.protocol.clone()),
        settings: Set(inbound.settings.clone()),
        stream_settings: Set(inbound.stream_settings.clone()),
        tag: Set(format!("inbound-{}", inbound.port)),
        sniffing: Set(inbound.sniffing.clone()),
    }
}
