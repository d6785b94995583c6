use sea_orm_migration::prelude::*;

use crate::m20250301_000001_create_users_table::Users;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m20250301_000002_create_catalog_tables"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ItemClasses::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ItemClasses::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ItemClasses::Name)
                            .string_len(255)
                            .not_null()
                            .unique_key(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Colors::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Colors::Id).uuid().not_null().primary_key())
                    .col(
                        ColumnDef::new(Colors::Color)
                            .string_len(25)
                            .not_null()
                            .unique_key(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Materials::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Materials::Id).uuid().not_null().primary_key())
                    .col(
                        ColumnDef::new(Materials::Material)
                            .string_len(25)
                            .not_null()
                            .unique_key(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Items::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Items::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Items::Name).string_len(255).not_null())
                    .col(ColumnDef::new(Items::SearchName).string_len(255).not_null())
                    .col(ColumnDef::new(Items::Price).decimal_len(7, 2).not_null())
                    .col(ColumnDef::new(Items::Description).text().null())
                    .col(ColumnDef::new(Items::ColorId).uuid().null())
                    .col(ColumnDef::new(Items::ItemClassId).uuid().null())
                    .col(
                        ColumnDef::new(Items::Count)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Items::ImageUrl).string_len(1024).null())
                    .col(
                        ColumnDef::new(Items::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Items::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_items_color")
                            .from(Items::Table, Items::ColorId)
                            .to(Colors::Table, Colors::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_items_item_class")
                            .from(Items::Table, Items::ItemClassId)
                            .to(ItemClasses::Table, ItemClasses::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_items_price")
                    .table(Items::Table)
                    .col(Items::Price)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_items_item_class_id")
                    .table(Items::Table)
                    .col(Items::ItemClassId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ItemMaterials::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ItemMaterials::ItemId).uuid().not_null())
                    .col(ColumnDef::new(ItemMaterials::MaterialId).uuid().not_null())
                    .primary_key(
                        Index::create()
                            .col(ItemMaterials::ItemId)
                            .col(ItemMaterials::MaterialId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_item_materials_item")
                            .from(ItemMaterials::Table, ItemMaterials::ItemId)
                            .to(Items::Table, Items::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_item_materials_material")
                            .from(ItemMaterials::Table, ItemMaterials::MaterialId)
                            .to(Materials::Table, Materials::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Comments::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Comments::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Comments::ItemId).uuid().not_null())
                    .col(ColumnDef::new(Comments::UserId).uuid().not_null())
                    .col(ColumnDef::new(Comments::Text).string_len(255).null())
                    .col(
                        ColumnDef::new(Comments::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_comments_item")
                            .from(Comments::Table, Comments::ItemId)
                            .to(Items::Table, Items::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_comments_user")
                            .from(Comments::Table, Comments::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_comments_item_id")
                    .table(Comments::Table)
                    .col(Comments::ItemId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Comments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ItemMaterials::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Items::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Materials::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Colors::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ItemClasses::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum ItemClasses {
    Table,
    Id,
    Name,
}

#[derive(DeriveIden)]
pub enum Colors {
    Table,
    Id,
    Color,
}

#[derive(DeriveIden)]
pub enum Materials {
    Table,
    Id,
    Material,
}

#[derive(DeriveIden)]
pub enum Items {
    Table,
    Id,
    Name,
    SearchName,
    Price,
    Description,
    ColorId,
    ItemClassId,
    Count,
    ImageUrl,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub enum ItemMaterials {
    Table,
    ItemId,
    MaterialId,
}

#[derive(DeriveIden)]
pub enum Comments {
    Table,
    Id,
    ItemId,
    UserId,
    Text,
    CreatedAt,
}
