use sea_orm::{DbBackend, Statement};
use sea_orm_migration::{prelude::*, sea_orm::ConnectionTrait};

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m20250301_000005_create_trigger"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let conn = manager.get_connection();

        let function_statement =
            Statement::from_string(DbBackend::Postgres, CREATE_FUNCTION.to_string());
        conn.execute(function_statement).await?;

        for table in TABLES {
            let trigger = format!(
                r#"CREATE TRIGGER trg_{table}_set_updated_at
    BEFORE UPDATE
    ON public."{table}"
    FOR EACH ROW
    EXECUTE FUNCTION public.set_updated_at();"#
            );
            let trigger_statement = Statement::from_string(DbBackend::Postgres, trigger);
            conn.execute(trigger_statement).await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let conn = manager.get_connection();

        for table in TABLES {
            let trigger = format!(
                r#"DROP TRIGGER IF EXISTS trg_{table}_set_updated_at ON public."{table}";"#
            );
            let trigger_statement = Statement::from_string(DbBackend::Postgres, trigger);
            conn.execute(trigger_statement).await?;
        }

        let function_statement =
            Statement::from_string(DbBackend::Postgres, DROP_FUNCTION.to_string());
        conn.execute(function_statement).await?;

        Ok(())
    }
}

const TABLES: [&str; 4] = ["user", "payroll", "transactions", "tran_history"];

const CREATE_FUNCTION: &str = r#"CREATE OR REPLACE FUNCTION public.set_updated_at()
    RETURNS trigger
    LANGUAGE 'plpgsql'
    COST 100
    VOLATILE NOT LEAKPROOF
AS $BODY$
BEGIN
    NEW.updated_at = now();
    RETURN NEW;
END;
$BODY$;"#;

const DROP_FUNCTION: &str = r#"DROP FUNCTION IF EXISTS public.set_updated_at();"#;
