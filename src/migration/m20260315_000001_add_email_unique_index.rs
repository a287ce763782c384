use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // email 索引改为唯一索引，并发创建时由数据库约束去重
        manager
            .drop_index(
                Index::drop()
                    .name("idx_client_traffic_email")
                    .table(ClientTraffic::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_client_traffic_email")
                    .table(ClientTraffic::Table)
                    .col(ClientTraffic::Email)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_client_traffic_email")
                    .table(ClientTraffic::Table)
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
}

#[derive(DeriveIden)]
enum ClientTraffic {
    Table,
    Email,
}
