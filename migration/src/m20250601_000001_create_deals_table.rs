use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Deals::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Deals::Id)
                            .big_integer() // HubSpot ids and millisecond timestamps both fit i64
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Deals::Dealname).text().null())
                    .col(ColumnDef::new(Deals::Amount).double().null())
                    .col(ColumnDef::new(Deals::Pipeline).text().null())
                    .col(ColumnDef::new(Deals::Dealstage).text().null())
                    .col(ColumnDef::new(Deals::Createdate).timestamp_with_time_zone().null())
                    .col(ColumnDef::new(Deals::HsLastmodifieddate).timestamp_with_time_zone().null())
                    .col(ColumnDef::new(Deals::Closedate).timestamp_with_time_zone().null())
                    .col(
                        ColumnDef::new(Deals::Properties)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'{}'::jsonb")),
                    )
                    .to_owned(),
            )
            .await?;

        // Backs the listing order.
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_deals_createdate")
                    .table(Deals::Table)
                    .col(Deals::Createdate)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Deals::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Deals {
    Table,
    Id,
    Dealname,
    Amount,
    Pipeline,
    Dealstage,
    Createdate,
    HsLastmodifieddate,
    Closedate,
    Properties,
}
