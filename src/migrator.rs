use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_menu_items_table::Migration),
            Box::new(m20240301_000002_create_promotions_table::Migration),
            Box::new(m20240301_000003_create_orders_table::Migration),
        ]
    }
}

mod m20240301_000001_create_menu_items_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000001_create_menu_items_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(MenuItems::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(MenuItems::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(MenuItems::Name).string().not_null())
                        .col(ColumnDef::new(MenuItems::Category).string().not_null())
                        .col(ColumnDef::new(MenuItems::Description).text().not_null())
                        .col(
                            ColumnDef::new(MenuItems::Price)
                                .decimal_len(10, 2)
                                .not_null(),
                        )
                        .col(ColumnDef::new(MenuItems::ImageUrl).string().null())
                        .col(
                            ColumnDef::new(MenuItems::CustomizationGroups)
                                .json()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(MenuItems::IsAvailable)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(MenuItems::CreatedAt).timestamp_with_time_zone().not_null())
                        .col(ColumnDef::new(MenuItems::UpdatedAt).timestamp_with_time_zone().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_menu_items_category")
                        .table(MenuItems::Table)
                        .col(MenuItems::Category)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(MenuItems::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum MenuItems {
        Table,
        Id,
        Name,
        Category,
        Description,
        Price,
        ImageUrl,
        CustomizationGroups,
        IsAvailable,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000002_create_promotions_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000002_create_promotions_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Promotions::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Promotions::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Promotions::Name).string().not_null())
                        .col(ColumnDef::new(Promotions::Description).text().not_null())
                        .col(
                            ColumnDef::new(Promotions::PromotionType)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Promotions::DiscountValue)
                                .decimal_len(5, 2)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Promotions::StartTime).timestamp_with_time_zone().not_null())
                        .col(ColumnDef::new(Promotions::EndTime).timestamp_with_time_zone().not_null())
                        .col(
                            ColumnDef::new(Promotions::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(Promotions::CreatedAt).timestamp_with_time_zone().not_null())
                        .col(ColumnDef::new(Promotions::UpdatedAt).timestamp_with_time_zone().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_promotions_active_window")
                        .table(Promotions::Table)
                        .col(Promotions::IsActive)
                        .col(Promotions::StartTime)
                        .col(Promotions::EndTime)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Promotions::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Promotions {
        Table,
        Id,
        Name,
        Description,
        PromotionType,
        DiscountValue,
        StartTime,
        EndTime,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000003_create_orders_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000003_create_orders_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Orders::GatewayOrderId).string().null())
                        .col(
                            ColumnDef::new(Orders::VerificationCode)
                                .string_len(2)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Orders::CustomerName).string().not_null())
                        .col(ColumnDef::new(Orders::CustomerPhone).string().not_null())
                        .col(ColumnDef::new(Orders::CustomerEmail).string().null())
                        .col(ColumnDef::new(Orders::Items).json().not_null())
                        .col(ColumnDef::new(Orders::Subtotal).decimal_len(12, 2).not_null())
                        .col(
                            ColumnDef::new(Orders::DiscountAmount)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Orders::DiscountPercent).decimal_len(5, 2).null())
                        .col(ColumnDef::new(Orders::PromotionName).string().null())
                        .col(ColumnDef::new(Orders::TotalPrice).decimal_len(12, 2).not_null())
                        .col(ColumnDef::new(Orders::Currency).string_len(3).not_null())
                        .col(ColumnDef::new(Orders::Status).string_len(32).not_null())
                        .col(ColumnDef::new(Orders::IdempotencyKey).string().null())
                        .col(ColumnDef::new(Orders::CreatedAt).timestamp_with_time_zone().not_null())
                        .col(ColumnDef::new(Orders::UpdatedAt).timestamp_with_time_zone().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_status")
                        .table(Orders::Table)
                        .col(Orders::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_created_at")
                        .table(Orders::Table)
                        .col(Orders::CreatedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Orders {
        Table,
        Id,
        GatewayOrderId,
        VerificationCode,
        CustomerName,
        CustomerPhone,
        CustomerEmail,
        Items,
        Subtotal,
        DiscountAmount,
        DiscountPercent,
        PromotionName,
        TotalPrice,
        Currency,
        Status,
        IdempotencyKey,
        CreatedAt,
        UpdatedAt,
    }
}
