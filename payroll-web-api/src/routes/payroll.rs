use crate::dto::{
    fail, ok, ApiResponse, DashboardData, EmployeeEntry, EmployeeId, EmployeeUpsertRequest,
    ErrorKind, WalletAuth, WalletQuery, WalletRequest,
};
use crate::pool::Db;
use crate::routes::user::find_user;
use crate::settlement::is_unique_violation;
use crate::sql_stmt::{DASHBOARD_SUMMARY, DB_BACKEND, PAYROLL_WITH_TOTAL};
use payroll_db_entity::db::payroll::{
    ActiveModel as PayrollActiveModel, Column as PayrollColumn, Entity as Payroll,
};
use rocket::serde::json::Json;
use sea_orm::prelude::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, ModelTrait, QueryFilter, Statement,
};
use sea_orm_rocket::Connection;
use tracing::{error, warn};

/// Aggregates head count and total payroll for one safe account. A row that
/// cannot be decoded is a storage error, not an empty organization.
pub async fn fetch_summary(
    db: &DatabaseConnection,
    safe_account: &str,
) -> Result<DashboardData, DbErr> {
    let row = db
        .query_one(Statement::from_sql_and_values(
            DB_BACKEND,
            DASHBOARD_SUMMARY,
            vec![safe_account.to_owned().into()],
        ))
        .await?;

    match row {
        Some(row) => Ok(DashboardData {
            total_employees: row.try_get::<i64>("", "total_employees")?,
            total_payroll: row.try_get::<Decimal>("", "total_payroll")?,
            safe_account: safe_account.to_owned(),
        }),
        None => Ok(DashboardData {
            total_employees: 0,
            total_payroll: Decimal::ZERO,
            safe_account: safe_account.to_owned(),
        }),
    }
}

#[get("/api/dashboard?<q..>", format = "application/json")]
pub async fn get_dashboard(
    conn: Connection<'_, Db>,
    auth: WalletAuth,
    q: WalletQuery,
) -> ApiResponse<DashboardData> {
    if !auth.matches(&q.wallet_address) {
        return fail(ErrorKind::Unauthenticated);
    }
    let db = conn.into_inner();

    let user = match find_user(db, &q.wallet_address, q.chain_id.unwrap_or(0)).await {
        Ok(Some(user)) => user,
        Ok(None) => return fail(ErrorKind::NotFound),
        Err(find_error) => {
            error!("Error finding user: {:?}", find_error);
            return fail(ErrorKind::Internal);
        }
    };

    match fetch_summary(db, &user.safe_account).await {
        Ok(data) => ok(data),
        Err(query_error) => {
            error!("Error fetching dashboard summary: {:?}", query_error);
            fail(ErrorKind::Internal)
        }
    }
}

#[get("/api/payroll?<q..>", format = "application/json")]
pub async fn get_payroll(
    conn: Connection<'_, Db>,
    auth: WalletAuth,
    q: WalletQuery,
) -> ApiResponse<Vec<EmployeeEntry>> {
    if !auth.matches(&q.wallet_address) {
        return fail(ErrorKind::Unauthenticated);
    }
    let db = conn.into_inner();

    let user = match find_user(db, &q.wallet_address, q.chain_id.unwrap_or(0)).await {
        Ok(Some(user)) => user,
        Ok(None) => return fail(ErrorKind::NotFound),
        Err(find_error) => {
            error!("Error finding user: {:?}", find_error);
            return fail(ErrorKind::Internal);
        }
    };

    let rows = db
        .query_all(Statement::from_sql_and_values(
            DB_BACKEND,
            PAYROLL_WITH_TOTAL,
            vec![user.safe_account.into()],
        ))
        .await;

    let rows = match rows {
        Ok(rows) => rows,
        Err(query_error) => {
            error!("Error fetching payroll: {:?}", query_error);
            return fail(ErrorKind::Internal);
        }
    };

    let mut employees = Vec::with_capacity(rows.len());
    for row in &rows {
        match EmployeeEntry::new(row) {
            Ok(entry) => employees.push(entry),
            Err(row_error) => {
                error!("Error reading payroll row: {:?}", row_error);
                return fail(ErrorKind::Internal);
            }
        }
    }
    ok(employees)
}

/// Upsert-by-id: a request carrying an id overwrites an existing entry owned
/// by the caller's safe account; without an id a new entry is created.
#[post("/api/employee", format = "application/json", data = "<request>")]
pub async fn upsert_employee(
    conn: Connection<'_, Db>,
    auth: WalletAuth,
    request: Json<EmployeeUpsertRequest>,
) -> ApiResponse<EmployeeId> {
    if !auth.matches(&request.wallet_address) {
        return fail(ErrorKind::Unauthenticated);
    }
    let employee = &request.employee_data;
    if employee.address.is_empty()
        || employee.base_salary < Decimal::ZERO
        || employee.bonus < Decimal::ZERO
    {
        warn!("Rejecting employee payload for {}", request.wallet_address);
        return fail(ErrorKind::InvalidArgument);
    }
    let db = conn.into_inner();

    let user = match find_user(db, &request.wallet_address, request.chain_id.unwrap_or(0)).await {
        Ok(Some(user)) => user,
        Ok(None) => return fail(ErrorKind::NotFound),
        Err(find_error) => {
            error!("Error finding user: {:?}", find_error);
            return fail(ErrorKind::Internal);
        }
    };

    if let Some(id) = employee.id {
        let existing = Payroll::find()
            .filter(PayrollColumn::Id.eq(id))
            .filter(PayrollColumn::SafeAccount.eq(user.safe_account.to_owned()))
            .one(db)
            .await;
        let existing = match existing {
            Ok(Some(existing)) => existing,
            Ok(None) => {
                warn!("Employee {} not in safe account {}", id, user.safe_account);
                return fail(ErrorKind::NotFound);
            }
            Err(find_error) => {
                error!("Error finding employee: {:?}", find_error);
                return fail(ErrorKind::Internal);
            }
        };

        let mut active: PayrollActiveModel = existing.into();
        active.name = ActiveValue::Set(employee.name.to_owned());
        active.address = ActiveValue::Set(employee.address.to_owned());
        active.base_salary = ActiveValue::Set(employee.base_salary);
        active.bonus = ActiveValue::Set(employee.bonus);
        match active.update(db).await {
            Ok(updated) => ok(EmployeeId { id: updated.id }),
            Err(update_error) if is_unique_violation(&update_error) => {
                warn!("Employee address collision: {:?}", update_error);
                fail(ErrorKind::Conflict)
            }
            Err(update_error) => {
                error!("Error updating employee: {:?}", update_error);
                fail(ErrorKind::Internal)
            }
        }
    } else {
        let active = PayrollActiveModel {
            id: ActiveValue::NotSet,
            name: ActiveValue::Set(employee.name.to_owned()),
            address: ActiveValue::Set(employee.address.to_owned()),
            safe_account: ActiveValue::Set(user.safe_account.to_owned()),
            base_salary: ActiveValue::Set(employee.base_salary),
            bonus: ActiveValue::Set(employee.bonus),
            created_at: ActiveValue::NotSet,
            updated_at: ActiveValue::NotSet,
        };
        match Payroll::insert(active).exec(db).await {
            Ok(inserted) => ok(EmployeeId {
                id: inserted.last_insert_id,
            }),
            Err(insert_error) if is_unique_violation(&insert_error) => {
                warn!("Employee already exists: {:?}", insert_error);
                fail(ErrorKind::Conflict)
            }
            Err(insert_error) => {
                error!("Error creating employee: {:?}", insert_error);
                fail(ErrorKind::Internal)
            }
        }
    }
}

#[delete("/api/employee/<id>", format = "application/json", data = "<request>")]
pub async fn delete_employee(
    conn: Connection<'_, Db>,
    auth: WalletAuth,
    id: i64,
    request: Json<WalletRequest>,
) -> ApiResponse<()> {
    if !auth.matches(&request.wallet_address) {
        return fail(ErrorKind::Unauthenticated);
    }
    let db = conn.into_inner();

    let user = match find_user(db, &request.wallet_address, request.chain_id.unwrap_or(0)).await {
        Ok(Some(user)) => user,
        Ok(None) => return fail(ErrorKind::NotFound),
        Err(find_error) => {
            error!("Error finding user: {:?}", find_error);
            return fail(ErrorKind::Internal);
        }
    };

    let employee = Payroll::find()
        .filter(PayrollColumn::Id.eq(id))
        .filter(PayrollColumn::SafeAccount.eq(user.safe_account.to_owned()))
        .one(db)
        .await;

    let employee = match employee {
        Ok(Some(employee)) => employee,
        Ok(None) => {
            warn!("Employee {} not in safe account {}", id, user.safe_account);
            return fail(ErrorKind::NotFound);
        }
        Err(find_error) => {
            error!("Error finding employee: {:?}", find_error);
            return fail(ErrorKind::Internal);
        }
    };

    match employee.delete(db).await {
        Ok(_) => ok(()),
        Err(delete_error) => {
            error!("Error deleting employee: {:?}", delete_error);
            fail(ErrorKind::Internal)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fetch_summary;
    use crate::sql_stmt::DB_BACKEND;
    use sea_orm::prelude::Decimal;
    use sea_orm::{MockDatabase, Value};
    use std::collections::BTreeMap;

    fn summary_row(total_employees: Value, total_payroll: Value) -> BTreeMap<&'static str, Value> {
        let mut row = BTreeMap::new();
        row.insert("total_employees", total_employees);
        row.insert("total_payroll", total_payroll);
        row
    }

    #[tokio::test]
    async fn summary_reads_aggregates() {
        let db = MockDatabase::new(DB_BACKEND)
            .append_query_results(vec![vec![summary_row(
                3i64.into(),
                Decimal::new(45000, 2).into(),
            )]])
            .into_connection();

        let data = fetch_summary(&db, "0xSAFE").await.unwrap();
        assert_eq!(data.total_employees, 3);
        assert_eq!(data.total_payroll, Decimal::new(45000, 2));
        assert_eq!(data.safe_account, "0xSAFE");
    }

    #[tokio::test]
    async fn summary_without_row_is_zeroed() {
        let no_rows: Vec<BTreeMap<&'static str, Value>> = Vec::new();
        let db = MockDatabase::new(DB_BACKEND)
            .append_query_results(vec![no_rows])
            .into_connection();

        let data = fetch_summary(&db, "0xSAFE").await.unwrap();
        assert_eq!(data.total_employees, 0);
        assert_eq!(data.total_payroll, Decimal::ZERO);
    }

    #[tokio::test]
    async fn summary_decode_error_is_not_an_empty_organization() {
        let db = MockDatabase::new(DB_BACKEND)
            .append_query_results(vec![vec![summary_row(
                3i64.into(),
                "not-a-number".to_owned().into(),
            )]])
            .into_connection();

        assert!(fetch_summary(&db, "0xSAFE").await.is_err());
    }
}
