use crate::dto::{
    fail, ok, ApiResponse, ErrorKind, PendingListQuery, ProposeTransactionRequest,
    TransactionRecord, UpdateStatusRequest, WalletAuth, STATUS_PENDING,
};
use crate::pool::Db;
use crate::routes::user::find_user;
use crate::settlement::{self, is_terminal_status, is_unique_violation, SettleError};
use payroll_db_entity::db::transaction::{
    ActiveModel as TransactionActiveModel, Column as TransactionColumn, Entity as Transaction,
};
use payroll_db_entity::db::user::{Column as UserColumn, Entity as User};
use rocket::serde::json::Json;
use sea_orm::{ActiveValue, ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use sea_orm_rocket::Connection;
use std::collections::{HashMap, HashSet};
use tracing::{error, warn};

/// Persists a proposed payment batch in pending state. The declared total
/// must match the line item sum, and the proposer must belong to the safe
/// account it is proposing for.
#[post("/api/pending-transaction", format = "application/json", data = "<request>")]
pub async fn propose(
    conn: Connection<'_, Db>,
    auth: WalletAuth,
    request: Json<ProposeTransactionRequest>,
) -> ApiResponse<TransactionRecord> {
    if !auth.matches(&request.propose_address) {
        return fail(ErrorKind::Unauthenticated);
    }
    if let Err(reason) = settlement::validate_proposal(
        &request.safe_account,
        &request.transaction_hash,
        &request.transaction_details,
        request.total,
    ) {
        warn!("Rejecting proposal {}: {}", request.transaction_hash, reason);
        return fail(ErrorKind::InvalidArgument);
    }
    let db = conn.into_inner();
    let chain_id = request.chain_id.unwrap_or(0);

    match find_user(db, &request.propose_address, chain_id).await {
        Ok(Some(user)) if user.safe_account == request.safe_account => {}
        Ok(_) => {
            warn!(
                "Proposer {} not a member of {}",
                request.propose_address, request.safe_account
            );
            return fail(ErrorKind::InvalidArgument);
        }
        Err(find_error) => {
            error!("Error finding proposer: {:?}", find_error);
            return fail(ErrorKind::Internal);
        }
    }

    let details = match serde_json::to_value(&request.transaction_details) {
        Ok(details) => details,
        Err(json_error) => {
            error!("Error encoding transaction details: {:?}", json_error);
            return fail(ErrorKind::Internal);
        }
    };

    let active = TransactionActiveModel {
        id: ActiveValue::NotSet,
        safe_account: ActiveValue::Set(request.safe_account.to_owned()),
        propose_address: ActiveValue::Set(request.propose_address.to_owned()),
        transaction_details: ActiveValue::Set(details),
        total: ActiveValue::Set(request.total),
        status: ActiveValue::Set(STATUS_PENDING),
        transaction_hash: ActiveValue::Set(request.transaction_hash.to_owned()),
        chain_id: ActiveValue::Set(chain_id),
        commit_hash: ActiveValue::Set("".to_owned()),
        created_at: ActiveValue::NotSet,
        updated_at: ActiveValue::NotSet,
    };

    match Transaction::insert(active).exec_with_returning(db).await {
        Ok(model) => ok(TransactionRecord::new(&model, None)),
        Err(insert_error) if is_unique_violation(&insert_error) => {
            warn!(
                "Transaction {} already recorded for chain {}",
                request.transaction_hash, chain_id
            );
            fail(ErrorKind::Conflict)
        }
        Err(insert_error) => {
            error!("Error creating transaction: {:?}", insert_error);
            fail(ErrorKind::Internal)
        }
    }
}

#[post(
    "/api/pending-transaction/update",
    format = "application/json",
    data = "<request>"
)]
pub async fn update_status(
    conn: Connection<'_, Db>,
    auth: WalletAuth,
    request: Json<UpdateStatusRequest>,
) -> ApiResponse<TransactionRecord> {
    if !auth.matches(&request.wallet_address) {
        return fail(ErrorKind::Unauthenticated);
    }
    if !is_terminal_status(request.status) {
        return fail(ErrorKind::InvalidArgument);
    }
    let db = conn.into_inner();
    let chain_id = request.chain_id.unwrap_or(0);

    let settled = settlement::settle(
        db,
        &request.transaction_hash,
        chain_id,
        request.status,
        request.commit_hash.to_owned(),
    )
    .await;

    match settled {
        Ok(model) => ok(TransactionRecord::new(&model, None)),
        Err(SettleError::NotFound) => {
            warn!(
                "Transaction {} not found for chain {}",
                request.transaction_hash, chain_id
            );
            fail(ErrorKind::NotFound)
        }
        Err(SettleError::AlreadySettled) => {
            warn!(
                "Transaction {} already settled on chain {}",
                request.transaction_hash, chain_id
            );
            fail(ErrorKind::Conflict)
        }
        Err(settle_error) => {
            error!("Error settling transaction: {:?}", settle_error);
            fail(ErrorKind::Internal)
        }
    }
}

/// Lists the caller's organization's transactions newest-update first, each
/// annotated best-effort with the proposer's display name.
#[get("/api/pending-transactions?<q..>", format = "application/json")]
pub async fn list_pending(
    conn: Connection<'_, Db>,
    auth: WalletAuth,
    q: PendingListQuery,
) -> ApiResponse<Vec<TransactionRecord>> {
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

    let mut select = Transaction::find()
        .filter(TransactionColumn::SafeAccount.eq(user.safe_account.to_owned()));
    if let Some(status) = q.status {
        select = select.filter(TransactionColumn::Status.eq(status));
    }
    if let Some(chain_id) = q.chain_id {
        select = select.filter(TransactionColumn::ChainId.eq(chain_id));
    }

    let transactions = match select
        .order_by_desc(TransactionColumn::UpdatedAt)
        .all(db)
        .await
    {
        Ok(transactions) => transactions,
        Err(find_error) => {
            error!("Error listing transactions: {:?}", find_error);
            return fail(ErrorKind::Internal);
        }
    };

    let addresses: HashSet<String> = transactions
        .iter()
        .map(|trx| trx.propose_address.to_owned())
        .collect();
    let mut names: HashMap<String, String> = HashMap::new();
    if !addresses.is_empty() {
        let proposers = User::find()
            .filter(UserColumn::Address.is_in(addresses))
            .filter(UserColumn::SafeAccount.eq(user.safe_account.to_owned()))
            .all(db)
            .await;
        match proposers {
            Ok(proposers) => {
                for proposer in proposers {
                    if !proposer.user_name.is_empty() {
                        names.insert(proposer.address, proposer.user_name);
                    }
                }
            }
            // Name annotation is best-effort; records go out unannotated.
            Err(find_error) => {
                warn!("Error resolving proposer names: {:?}", find_error);
            }
        }
    }

    let records = transactions
        .iter()
        .map(|trx| TransactionRecord::new(trx, names.get(&trx.propose_address).cloned()))
        .collect();
    ok(records)
}
