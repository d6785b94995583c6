use sea_orm_migration::prelude::*;

use crate::m20250301_000001_create_users_table::Users;
use crate::m20250301_000003_create_cart_tables::Carts;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m20250301_000004_create_purchase_tables"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // item_id columns carry no foreign key: purchase history outlives catalog items.
        manager
            .create_table(
                Table::create()
                    .table(PurchaseRecords::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PurchaseRecords::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PurchaseRecords::UserId).uuid().not_null())
                    .col(ColumnDef::new(PurchaseRecords::CartId).uuid().not_null())
                    .col(ColumnDef::new(PurchaseRecords::ItemId).uuid().not_null())
                    .col(
                        ColumnDef::new(PurchaseRecords::ItemQuantity)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PurchaseRecords::ItemPrice)
                            .decimal_len(10, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PurchaseRecords::PhoneNumber)
                            .string_len(30)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PurchaseRecords::CardNumber)
                            .string_len(30)
                            .not_null(),
                    )
                    .col(ColumnDef::new(PurchaseRecords::Cvv).string_len(3).not_null())
                    .col(
                        ColumnDef::new(PurchaseRecords::Status)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(PurchaseRecords::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_purchase_records_user")
                            .from(PurchaseRecords::Table, PurchaseRecords::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_purchase_records_cart")
                            .from(PurchaseRecords::Table, PurchaseRecords::CartId)
                            .to(Carts::Table, Carts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_purchase_records_created_at")
                    .table(PurchaseRecords::Table)
                    .col(PurchaseRecords::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PurchaseSnapshots::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PurchaseSnapshots::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PurchaseSnapshots::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(PurchaseSnapshots::ItemName)
                            .string_len(128)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PurchaseSnapshots::PriceWas)
                            .decimal_len(10, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PurchaseSnapshots::Quantity)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(ColumnDef::new(PurchaseSnapshots::ItemId).uuid().not_null())
                    .col(
                        ColumnDef::new(PurchaseSnapshots::BoughtAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_purchase_snapshots_user")
                            .from(PurchaseSnapshots::Table, PurchaseSnapshots::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_purchase_snapshots_user_id")
                    .table(PurchaseSnapshots::Table)
                    .col(PurchaseSnapshots::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PurchaseSnapshots::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PurchaseRecords::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum PurchaseRecords {
    Table,
    Id,
    UserId,
    CartId,
    ItemId,
    ItemQuantity,
    ItemPrice,
    PhoneNumber,
    CardNumber,
    Cvv,
    Status,
    CreatedAt,
}

#[derive(DeriveIden)]
pub enum PurchaseSnapshots {
    Table,
    Id,
    UserId,
    ItemName,
    PriceWas,
    Quantity,
    ItemId,
    BoughtAt,
}
