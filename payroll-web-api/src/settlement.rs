//! Pending-transaction lifecycle: pending (0) -> completed (1) | failed (2).
//!
//! Settling a transaction as completed fans its line items out into
//! `tran_history` rows. The status flip and the fan-out run inside one
//! database transaction, so a partial failure rolls both back. The flip is a
//! conditional update on `status = 0`: a second settle attempt matches zero
//! rows and surfaces as [`SettleError::AlreadySettled`].

use crate::dto::{TransactionDetail, STATUS_COMPLETED, STATUS_FAILED, STATUS_PENDING};
use payroll_db_entity::db::tran_history::{
    ActiveModel as HistoryActiveModel, Entity as TranHistory,
};
use payroll_db_entity::db::transaction::{
    Column as TransactionColumn, Entity as Transaction, Model as TransactionModel,
};
use sea_orm::prelude::{DateTimeWithTimeZone, Decimal};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveValue, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    TransactionError, TransactionTrait,
};
use std::fmt;
use tracing::warn;

#[derive(Debug)]
pub enum SettleError {
    NotFound,
    AlreadySettled,
    CorruptDetails(String),
    Storage(DbErr),
}

impl fmt::Display for SettleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettleError::NotFound => write!(f, "transaction not found"),
            SettleError::AlreadySettled => write!(f, "transaction already settled"),
            SettleError::CorruptDetails(error) => {
                write!(f, "transaction details unreadable: {}", error)
            }
            SettleError::Storage(error) => write!(f, "storage error: {}", error),
        }
    }
}

impl std::error::Error for SettleError {}

pub fn is_terminal_status(status: i16) -> bool {
    status == STATUS_COMPLETED || status == STATUS_FAILED
}

/// Checks a proposed batch before it is persisted: a non-empty safe account
/// and transaction hash, at least one line item, every item with a recipient
/// and a non-negative amount, and the declared total equal to the sum of
/// item amounts.
pub fn validate_proposal(
    safe_account: &str,
    transaction_hash: &str,
    details: &[TransactionDetail],
    total: Decimal,
) -> Result<(), String> {
    if safe_account.is_empty() {
        return Err("safeAccount must not be empty".to_owned());
    }
    if transaction_hash.is_empty() {
        return Err("transactionHash must not be empty".to_owned());
    }
    if details.is_empty() {
        return Err("transactionDetails must not be empty".to_owned());
    }
    let mut sum = Decimal::ZERO;
    for detail in details {
        if detail.address.is_empty() {
            return Err("line item without recipient address".to_owned());
        }
        if detail.total < Decimal::ZERO {
            return Err(format!("negative amount for {}", detail.address));
        }
        sum += detail.total;
    }
    if sum != total {
        return Err(format!("total {} does not match line item sum {}", total, sum));
    }
    Ok(())
}

pub fn parse_details(value: &serde_json::Value) -> Result<Vec<TransactionDetail>, String> {
    serde_json::from_value(value.to_owned()).map_err(|error| error.to_string())
}

pub fn is_unique_violation(error: &DbErr) -> bool {
    let text = error.to_string();
    text.contains("duplicate key") || text.contains("unique constraint")
}

/// Builds the history rows appended when a transaction settles as completed:
/// one row per line item carrying the item's amount, stamped with `pay_time`
/// and inheriting safe account and chain id from the parent. The commit hash
/// is the one supplied with the settle request, or the parent's stored value
/// when the request carried none.
pub fn build_history_rows(
    parent: &TransactionModel,
    details: &[TransactionDetail],
    commit_hash: Option<&str>,
    pay_time: DateTimeWithTimeZone,
) -> Vec<HistoryActiveModel> {
    let commit = commit_hash.unwrap_or(&parent.commit_hash);
    details
        .iter()
        .map(|detail| HistoryActiveModel {
            id: ActiveValue::NotSet,
            name: ActiveValue::Set(detail.name.to_owned().unwrap_or_default()),
            address: ActiveValue::Set(detail.address.to_owned()),
            amount: ActiveValue::Set(detail.total),
            pay_time: ActiveValue::Set(pay_time),
            commit_hash: ActiveValue::Set(commit.to_owned()),
            safe_account: ActiveValue::Set(parent.safe_account.to_owned()),
            chain_id: ActiveValue::Set(parent.chain_id),
            created_at: ActiveValue::NotSet,
            updated_at: ActiveValue::NotSet,
        })
        .collect()
}

/// Moves a pending transaction to a terminal status. On `completed`, one
/// history row per line item is appended in the same unit of work, stamped
/// with the current wall clock as pay time and inheriting commit hash,
/// safe account, and chain id from the parent.
pub async fn settle(
    db: &DatabaseConnection,
    transaction_hash: &str,
    chain_id: i64,
    new_status: i16,
    commit_hash: Option<String>,
) -> Result<TransactionModel, SettleError> {
    let transaction_hash = transaction_hash.to_owned();
    let result = db
        .transaction::<_, TransactionModel, SettleError>(move |txn| {
            Box::pin(async move {
                let model = Transaction::find()
                    .filter(TransactionColumn::TransactionHash.eq(transaction_hash.to_owned()))
                    .filter(TransactionColumn::ChainId.eq(chain_id))
                    .one(txn)
                    .await
                    .map_err(SettleError::Storage)?
                    .ok_or(SettleError::NotFound)?;

                let mut update = Transaction::update_many()
                    .col_expr(TransactionColumn::Status, Expr::value(new_status))
                    .filter(TransactionColumn::Id.eq(model.id))
                    .filter(TransactionColumn::Status.eq(STATUS_PENDING));
                if let Some(commit) = &commit_hash {
                    update =
                        update.col_expr(TransactionColumn::CommitHash, Expr::value(commit.to_owned()));
                }
                let updated = update.exec(txn).await.map_err(SettleError::Storage)?;
                if updated.rows_affected == 0 {
                    // Row exists but is no longer pending; a concurrent or
                    // repeated settle got there first.
                    return Err(SettleError::AlreadySettled);
                }

                if new_status == STATUS_COMPLETED {
                    let details = parse_details(&model.transaction_details)
                        .map_err(SettleError::CorruptDetails)?;
                    let pay_time: DateTimeWithTimeZone = chrono::Utc::now().into();
                    let rows =
                        build_history_rows(&model, &details, commit_hash.as_deref(), pay_time);
                    if !rows.is_empty() {
                        TranHistory::insert_many(rows)
                            .exec(txn)
                            .await
                            .map_err(SettleError::Storage)?;
                    }
                }

                Transaction::find_by_id(model.id)
                    .one(txn)
                    .await
                    .map_err(SettleError::Storage)?
                    .ok_or(SettleError::NotFound)
            })
        })
        .await;

    match result {
        Ok(model) => Ok(model),
        Err(TransactionError::Connection(error)) => {
            warn!("Settle connection error: {:?}", error);
            Err(SettleError::Storage(error))
        }
        Err(TransactionError::Transaction(error)) => Err(error),
    }
}
