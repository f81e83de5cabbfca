use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MandiPrices::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MandiPrices::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(MandiPrices::State).string_len(100).not_null())
                    .col(ColumnDef::new(MandiPrices::District).string_len(100).null())
                    .col(ColumnDef::new(MandiPrices::Market).string_len(200).not_null())
                    .col(ColumnDef::new(MandiPrices::Commodity).string_len(200).not_null())
                    // Empty string when the feed reports no variety, so the
                    // unique index below treats it as a single value
                    .col(
                        ColumnDef::new(MandiPrices::Variety)
                            .string_len(200)
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(MandiPrices::Grade).string_len(100).null())
                    .col(ColumnDef::new(MandiPrices::MinPrice).decimal_len(14, 2).null())
                    .col(ColumnDef::new(MandiPrices::MaxPrice).decimal_len(14, 2).null())
                    .col(
                        ColumnDef::new(MandiPrices::ModalPrice)
                            .decimal_len(14, 2)
                            .not_null(),
                    )
                    .col(ColumnDef::new(MandiPrices::PriceDate).date().not_null())
                    .col(
                        ColumnDef::new(MandiPrices::SourceUpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Identity key for idempotent upserts
        manager
            .create_index(
                Index::create()
                    .name("idx_mandi_prices_identity")
                    .table(MandiPrices::Table)
                    .col(MandiPrices::State)
                    .col(MandiPrices::Market)
                    .col(MandiPrices::Commodity)
                    .col(MandiPrices::Variety)
                    .col(MandiPrices::PriceDate)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_mandi_prices_price_date")
                    .table(MandiPrices::Table)
                    .col(MandiPrices::PriceDate)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MandiPrices::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum MandiPrices {
    Table,
    Id,
    State,
    District,
    Market,
    Commodity,
    Variety,
    Grade,
    MinPrice,
    MaxPrice,
    ModalPrice,
    PriceDate,
    SourceUpdatedAt,
}
