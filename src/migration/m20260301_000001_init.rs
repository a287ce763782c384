use sea_orm_migration::prelude::*;
use sea_orm_migration::schema::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 创建 inbound 表
        manager
            .create_table(
                Table::create()
                    .table(Inbound::Table)
                    .if_not_exists()
                    .col(big_integer(Inbound::Id).auto_increment().primary_key())
                    .col(big_integer(Inbound::UserId))
                    .col(big_integer(Inbound::Up).default(0))
                    .col(big_integer(Inbound::Down).default(0))
                    .col(big_integer(Inbound::Total).default(0))
                    .col(string(Inbound::Remark).default(""))
                    .col(boolean(Inbound::Enable).default(true))
                    .col(big_integer(Inbound::ExpiryTime).default(0))
                    .col(string(Inbound::Listen).default(""))
                    .col(integer(Inbound::Port))
                    .col(string(Inbound::Protocol))
                    .col(string(Inbound::Settings))
                    .col(string(Inbound::StreamSettings))
                    .col(string(Inbound::Tag))
                    .col(string(Inbound::Sniffing))
                    .to_owned(),
            )
            .await?;

        // 为 port 创建唯一索引
        manager
            .create_index(
                Index::create()
                    .name("idx_inbound_port")
                    .table(Inbound::Table)
                    .col(Inbound::Port)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // 为 tag 创建唯一索引
        manager
            .create_index(
                Index::create()
                    .name("idx_inbound_tag")
                    .table(Inbound::Table)
                    .col(Inbound::Tag)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // 创建 client_traffic 表（inbound_id 为弱引用，不加外键）
        manager
            .create_table(
                Table::create()
                    .table(ClientTraffic::Table)
                    .if_not_exists()
                    .col(big_integer(ClientTraffic::Id).auto_increment().primary_key())
                    .col(big_integer(ClientTraffic::InboundId))
                    .col(boolean(ClientTraffic::Enable).default(true))
                    .col(string(ClientTraffic::Email))
                    .col(big_integer(ClientTraffic::Up).default(0))
                    .col(big_integer(ClientTraffic::Down).default(0))
                    .col(big_integer(ClientTraffic::ExpiryTime).default(0))
                    .col(big_integer(ClientTraffic::Total).default(0))
                    .to_owned(),
            )
            .await?;

        // 创建 client_traffic 索引
        manager
            .create_index(
                Index::create()
                    .name("idx_client_traffic_inbound_id")
                    .table(ClientTraffic::Table)
                    .col(ClientTraffic::InboundId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_client_traffic_email")
                    .table(ClientTraffic::Table)
                    .col(ClientTraffic::Email)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ClientTraffic::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Inbound::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Inbound {
    Table,
    Id,
    UserId,
    Up,
    Down,
    Total,
    Remark,
    Enable,
    ExpiryTime,
    Listen,
    Port,
    Protocol,
    Settings,
    StreamSettings,
    Tag,
    Sniffing,
}

#[derive(DeriveIden)]
enum ClientTraffic {
    Table,
    Id,
    InboundId,
    Enable,
    Email,
    Up,
    Down,
    ExpiryTime,
    Total,
}
