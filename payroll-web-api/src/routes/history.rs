use crate::dto::{fail, ok, ApiResponse, ErrorKind, HistoryQuery, HistoryRecord, WalletAuth};
use crate::pool::Db;
use payroll_db_entity::db::tran_history::{Column as HistoryColumn, Entity as TranHistory};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use sea_orm_rocket::Connection;
use tracing::error;

/// Completed payments for one recipient under one safe account, newest pay
/// time first. No rows is an empty list, not an error.
#[get("/api/transaction-history?<q..>", format = "application/json")]
pub async fn get_transaction_history(
    conn: Connection<'_, Db>,
    auth: WalletAuth,
    q: HistoryQuery,
) -> ApiResponse<Vec<HistoryRecord>> {
    if !auth.matches(&q.address) {
        return fail(ErrorKind::Unauthenticated);
    }
    let db = conn.into_inner();

    let mut select = TranHistory::find()
        .filter(HistoryColumn::Address.eq(q.address.to_owned()))
        .filter(HistoryColumn::SafeAccount.eq(q.safe_account.to_owned()));
    if let Some(chain_id) = q.chain_id {
        select = select.filter(HistoryColumn::ChainId.eq(chain_id));
    }

    match select.order_by_desc(HistoryColumn::PayTime).all(db).await {
        Ok(rows) => ok(rows.iter().map(HistoryRecord::new).collect()),
        Err(find_error) => {
            error!("Error fetching transaction history: {:?}", find_error);
            fail(ErrorKind::Internal)
        }
    }
}
