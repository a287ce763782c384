//! 流量上报入账
//!
//! 节点周期性上报入站与客户端两类流量。每批在一个事务内落库，
//! 找不到对应记录的上报记日志后跳过，不拖累同批其它记录。

use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, NotSet, QueryFilter, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::entity::{client_traffic, inbound, ClientTraffic, Inbound};
use crate::error::Result;
use crate::settings;

/// 入站级流量上报，按 tag 归属
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TrafficReport {
    #[serde(rename = "isInbound")]
    pub is_inbound: bool,
    pub tag: String,
    pub up: i64,
    pub down: i64,
}

/// 客户端级流量上报，按 email 归属
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ClientTrafficReport {
    pub email: String,
    pub up: i64,
    pub down: i64,
}

/// 按 tag 累加入站流量，整批一个事务
pub async fn add_traffic(db: &DatabaseConnection, reports: &[TrafficReport]) -> Result<()> {
    if reports.is_empty() {
        return Ok(());
    }
    let txn = db.begin().await?;
    for report in reports {
        if !report.is_inbound {
            continue;
        }
        Inbound::update_many()
            .col_expr(
                inbound::Column::Up,
                Expr::col(inbound::Column::Up).add(report.up),
            )
            .col_expr(
                inbound::Column::Down,
                Expr::col(inbound::Column::Down).add(report.down),
            )
            .filter(inbound::Column::Tag.eq(&report.tag))
            .exec(&txn)
            .await?;
    }
    txn.commit().await?;
    Ok(())
}

/// 按 email 累加客户端流量，同时用文档里的最新配额刷新统计行
///
/// 文档里找不到该 email（或文档解析失败）时配额按 0 处理，即不限制。
/// 统计行在累加瞬间已不存在的，按上报内容重建。
pub async fn add_client_traffic(
    db: &DatabaseConnection,
    reports: &[ClientTrafficReport],
) -> Result<()> {
    if reports.is_empty() {
        return Ok(());
    }
    let txn = db.begin().await?;
    for report in reports {
        let stat = match ClientTraffic::find()
            .filter(client_traffic::Column::Email.eq(&report.email))
            .one(&txn)
            .await?
        {
            Some(stat) => stat,
            None => {
                warn!("未找到客户端流量记录: {}", report.email);
                continue;
            }
        };
        let inbound = match Inbound::find_by_id(stat.inbound_id).one(&txn).await? {
            Some(inbound) => inbound,
            None => {
                warn!("客户端 {} 所属入站 {} 不存在", report.email, stat.inbound_id);
                continue;
            }
        };

        let (total, expiry_time) = match settings::extract_clients(&inbound.settings) {
            Ok(clients) => clients
                .iter()
                .find(|c| c.email == report.email)
                .map(|c| (c.total, c.expiry_time))
                .unwrap_or((0, 0)),
            Err(e) => {
                warn!("入站 {} 的 settings 解析失败: {}", inbound.id, e);
                (0, 0)
            }
        };

        let result = ClientTraffic::update_many()
            .col_expr(client_traffic::Column::Enable, Expr::value(true))
            .col_expr(client_traffic::Column::Total, Expr::value(total))
            .col_expr(
                client_traffic::Column::ExpiryTime,
                Expr::value(expiry_time),
            )
            .col_expr(
                client_traffic::Column::Up,
                Expr::col(client_traffic::Column::Up).add(report.up),
            )
            .col_expr(
                client_traffic::Column::Down,
                Expr::col(client_traffic::Column::Down).add(report.down),
            )
            .filter(client_traffic::Column::InboundId.eq(stat.inbound_id))
            .filter(client_traffic::Column::Email.eq(&report.email))
            .exec(&txn)
            .await?;

        if result.rows_affected == 0 {
            let rebuilt = client_traffic::ActiveModel {
                id: NotSet,
                inbound_id: Set(stat.inbound_id),
                enable: Set(true),
                email: Set(report.email.clone()),
                up: Set(report.up),
                down: Set(report.down),
                expiry_time: Set(expiry_time),
                total: Set(total),
            };
            rebuilt.insert(&txn).await?;
        }
    }
    txn.commit().await?;
    Ok(())
}

/// 查询 email 以 `@<tg_username>` 结尾的客户端流量记录
pub async fn get_client_traffic_tg_bot(
    db: &DatabaseConnection,
    tg_username: &str,
) -> Result<Vec<client_traffic::Model>> {
    let stats = ClientTraffic::find()
        .filter(client_traffic::Column::Email.ends_with(format!("@{}", tg_username)))
        .all(db)
        .await?;
    Ok(stats)
}

/// 按 email 子串模糊查询客户端流量记录
pub async fn get_client_traffic_by_email(
    db: &DatabaseConnection,
    email: &str,
) -> Result<Vec<client_traffic::Model>> {
    let stats = ClientTraffic::find()
        .filter(client_traffic::Column::Email.contains(email))
        .all(db)
        .await?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inbound_manager::InboundManager;
    use crate::test_util::{inbound_model, settings_doc, test_db};

    fn report(email: &str, up: i64, down: i64) -> ClientTrafficReport {
        ClientTrafficReport {
            email: email.to_string(),
            up,
            down,
        }
    }

    async fn stat_by_email(db: &DatabaseConnection, email: &str) -> Option<client_traffic::Model> {
        ClientTraffic::find()
            .filter(client_traffic::Column::Email.eq(email))
            .one(db)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_add_traffic() {
        let db = test_db().await;
        let manager = InboundManager::new(db.clone());
        let stored = manager
            .add_inbound(&inbound_model(10443, &settings_doc(&[])))
            .await
            .unwrap();

        let reports = vec![TrafficReport {
            is_inbound: true,
            tag: "inbound-10443".to_string(),
            up: 100,
            down: 200,
        }];
        add_traffic(&db, &reports).await.unwrap();
        add_traffic(&db, &reports).await.unwrap();

        let after = manager.get_inbound(stored.id).await.unwrap().unwrap();
        assert_eq!(after.up, 200);
        assert_eq!(after.down, 400);

        // 出站方向与未知 tag 不入账
        add_traffic(
            &db,
            &[
                TrafficReport {
                    is_inbound: false,
                    tag: "inbound-10443".to_string(),
                    up: 999,
                    down: 999,
                },
                TrafficReport {
                    is_inbound: true,
                    tag: "inbound-12345".to_string(),
                    up: 999,
                    down: 999,
                },
            ],
        )
        .await
        .unwrap();
        let after = manager.get_inbound(stored.id).await.unwrap().unwrap();
        assert_eq!(after.up, 200);
        assert_eq!(after.down, 400);

        add_traffic(&db, &[]).await.unwrap();
    }

    #[tokio::test]
    async fn test_add_client_traffic() {
        let db = test_db().await;
        let manager = InboundManager::new(db.clone());
        manager
            .add_inbound(&inbound_model(
                10443,
                &settings_doc(&[("a@x", 1000, 9), ("b@x", 0, 0)]),
            ))
            .await
            .unwrap();

        // 统计行里的配额先改成过期值，入账时应以文档为准刷新
        ClientTraffic::update_many()
            .col_expr(client_traffic::Column::Total, Expr::value(5i64))
            .col_expr(client_traffic::Column::Enable, Expr::value(false))
            .filter(client_traffic::Column::Email.eq("a@x"))
            .exec(&db)
            .await
            .unwrap();

        // 未知 email 跳过，不影响同批其它上报
        add_client_traffic(
            &db,
            &[
                report("ghost@x", 7, 7),
                report("a@x", 10, 20),
                report("b@x", 1, 2),
            ],
        )
        .await
        .unwrap();

        let a = stat_by_email(&db, "a@x").await.unwrap();
        assert_eq!(a.up, 10);
        assert_eq!(a.down, 20);
        assert_eq!(a.total, 1000);
        assert_eq!(a.expiry_time, 9);
        assert!(a.enable);

        let b = stat_by_email(&db, "b@x").await.unwrap();
        assert_eq!(b.up, 1);
        assert_eq!(b.down, 2);

        // 再入账一次累加
        add_client_traffic(&db, &[report("a@x", 10, 20)]).await.unwrap();
        let a = stat_by_email(&db, "a@x").await.unwrap();
        assert_eq!(a.up, 20);
        assert_eq!(a.down, 40);

        add_client_traffic(&db, &[]).await.unwrap();
    }

    #[tokio::test]
    async fn test_add_client_traffic_email_missing_from_doc() {
        let db = test_db().await;
        let manager = InboundManager::new(db.clone());
        manager
            .add_inbound(&inbound_model(10443, &settings_doc(&[("a@x", 1000, 9)])))
            .await
            .unwrap();

        // 文档被改得不再包含 a@x，配额按 0 处理
        Inbound::update_many()
            .col_expr(
                inbound::Column::Settings,
                Expr::value(settings_doc(&[]).as_str()),
            )
            .filter(inbound::Column::Port.eq(10443))
            .exec(&db)
            .await
            .unwrap();

        add_client_traffic(&db, &[report("a@x", 3, 4)]).await.unwrap();
        let a = stat_by_email(&db, "a@x").await.unwrap();
        assert_eq!(a.up, 3);
        assert_eq!(a.down, 4);
        assert_eq!(a.total, 0);
        assert_eq!(a.expiry_time, 0);
    }

    #[tokio::test]
    async fn test_add_client_traffic_orphaned_stat() {
        let db = test_db().await;
        let manager = InboundManager::new(db.clone());
        let stored = manager
            .add_inbound(&inbound_model(10443, &settings_doc(&[("a@x", 1000, 9)])))
            .await
            .unwrap();

        // 直接删入站行，留下孤儿统计行
        Inbound::delete_by_id(stored.id).exec(&db).await.unwrap();

        add_client_traffic(&db, &[report("a@x", 3, 4)]).await.unwrap();
        let a = stat_by_email(&db, "a@x").await.unwrap();
        assert_eq!(a.up, 0);
        assert_eq!(a.down, 0);
    }

    #[tokio::test]
    async fn test_get_client_traffic_queries() {
        let db = test_db().await;
        let manager = InboundManager::new(db.clone());
        manager
            .add_inbound(&inbound_model(
                10443,
                &settings_doc(&[("alice@bot1", 0, 0), ("bob@bot1", 0, 0), ("carol@other", 0, 0)]),
            ))
            .await
            .unwrap();

        let stats = get_client_traffic_tg_bot(&db, "bot1").await.unwrap();
        assert_eq!(stats.len(), 2);

        let stats = get_client_traffic_by_email(&db, "ali").await.unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].email, "alice@bot1");

        let stats = get_client_traffic_by_email(&db, "nobody").await.unwrap();
        assert!(stats.is_empty());
    }
}
