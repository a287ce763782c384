//! 配额与有效期管控
//!
//! 把超量或已过期的入站/客户端置为停用。扫描只看 enable=true 的行，
//! 所以重复执行是幂等的；total=0、expiry_time=0 表示不限制。

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter};

use crate::entity::{client_traffic, inbound, ClientTraffic, Inbound};
use crate::error::Result;

/// 停用超量或已过期的入站，返回本次停用的数量
pub async fn disable_invalid_inbounds(db: &DatabaseConnection) -> Result<u64> {
    let now = Utc::now().timestamp_millis();
    let result = Inbound::update_many()
        .col_expr(inbound::Column::Enable, Expr::value(false))
        .filter(
            Condition::all()
                .add(inbound::Column::Enable.eq(true))
                .add(
                    Condition::any()
                        .add(
                            Condition::all().add(inbound::Column::Total.gt(0)).add(
                                Expr::expr(
                                    Expr::col(inbound::Column::Up)
                                        .add(Expr::col(inbound::Column::Down)),
                                )
                                .gte(Expr::col(inbound::Column::Total)),
                            ),
                        )
                        .add(
                            Condition::all()
                                .add(inbound::Column::ExpiryTime.gt(0))
                                .add(inbound::Column::ExpiryTime.lte(now)),
                        ),
                ),
        )
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

/// 停用超量或已过期的客户端，返回本次停用的数量
pub async fn disable_invalid_clients(db: &DatabaseConnection) -> Result<u64> {
    let now = Utc::now().timestamp_millis();
    let result = ClientTraffic::update_many()
        .col_expr(client_traffic::Column::Enable, Expr::value(false))
        .filter(
            Condition::all()
                .add(client_traffic::Column::Enable.eq(true))
                .add(
                    Condition::any()
                        .add(
                            Condition::all().add(client_traffic::Column::Total.gt(0)).add(
                                Expr::expr(
                                    Expr::col(client_traffic::Column::Up)
                                        .add(Expr::col(client_traffic::Column::Down)),
                                )
                                .gte(Expr::col(client_traffic::Column::Total)),
                            ),
                        )
                        .add(
                            Condition::all()
                                .add(client_traffic::Column::ExpiryTime.gt(0))
                                .add(client_traffic::Column::ExpiryTime.lte(now)),
                        ),
                ),
        )
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

/// 清零客户端累计流量并重新启用，配额与有效期保持不动
pub async fn reset_client_traffic(
    db: &DatabaseConnection,
    inbound_id: i64,
    email: &str,
) -> Result<()> {
    ClientTraffic::update_many()
        .col_expr(client_traffic::Column::Enable, Expr::value(true))
        .col_expr(client_traffic::Column::Up, Expr::value(0i64))
        .col_expr(client_traffic::Column::Down, Expr::value(0i64))
        .filter(client_traffic::Column::InboundId.eq(inbound_id))
        .filter(client_traffic::Column::Email.eq(email))
        .exec(db)
        .await?;
    Ok(())
}
