use payroll_db_entity::db::*;
use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m20250301_000002_create_table"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(payroll::Entity)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(payroll::Column::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(payroll::Column::Name)
                            .string_len(128)
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(payroll::Column::Address)
                            .string_len(128)
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(payroll::Column::SafeAccount)
                            .string_len(128)
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(payroll::Column::BaseSalary)
                            .decimal_len(20, 2)
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(payroll::Column::Bonus)
                            .decimal_len(20, 2)
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(payroll::Column::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .extra("DEFAULT CURRENT_TIMESTAMP".to_owned()),
                    )
                    .col(
                        ColumnDef::new(payroll::Column::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .extra("DEFAULT CURRENT_TIMESTAMP".to_owned()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uk_address_safe")
                    .table(payroll::Entity)
                    .col(payroll::Column::Address)
                    .col(payroll::Column::SafeAccount)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_payroll_safe_account")
                    .table(payroll::Entity)
                    .col(payroll::Column::SafeAccount)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(payroll::Entity).to_owned())
            .await
    }
}
