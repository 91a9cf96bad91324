use crate::dto::{
    fail, ok, ApiResponse, ErrorKind, MemberDetails, Role, SafeAccountRequest, UpdateUserRequest,
    UserProfile, WalletAuth, WalletQuery,
};
use crate::pool::Db;
use payroll_db_entity::db::user::{Column as UserColumn, Entity as User, Model as UserModel};
use rocket::serde::json::Json;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter};
use sea_orm_rocket::Connection;
use tracing::{error, warn};

pub async fn find_user(
    db: &DatabaseConnection,
    address: &str,
    chain_id: i64,
) -> Result<Option<UserModel>, DbErr> {
    User::find()
        .filter(UserColumn::Address.eq(address.to_owned()))
        .filter(UserColumn::ChainId.eq(chain_id))
        .one(db)
        .await
}

#[get("/api/user?<q..>", format = "application/json")]
pub async fn get_user(
    conn: Connection<'_, Db>,
    auth: WalletAuth,
    q: WalletQuery,
) -> ApiResponse<UserProfile> {
    if !auth.matches(&q.wallet_address) {
        return fail(ErrorKind::Unauthenticated);
    }
    let db = conn.into_inner();
    match find_user(db, &q.wallet_address, q.chain_id.unwrap_or(0)).await {
        Ok(Some(user)) => ok(UserProfile::new(&user)),
        Ok(None) => {
            warn!("User not found: {}", q.wallet_address);
            fail(ErrorKind::NotFound)
        }
        Err(find_error) => {
            error!("Error finding user: {:?}", find_error);
            fail(ErrorKind::Internal)
        }
    }
}

#[put("/api/user", format = "application/json", data = "<request>")]
pub async fn update_user(
    conn: Connection<'_, Db>,
    auth: WalletAuth,
    request: Json<UpdateUserRequest>,
) -> ApiResponse<()> {
    if !auth.matches(&request.wallet_address) {
        return fail(ErrorKind::Unauthenticated);
    }
    let db = conn.into_inner();
    let chain_id = request.chain_id.unwrap_or(0);

    let user = match find_user(db, &request.wallet_address, chain_id).await {
        Ok(Some(user)) => user,
        Ok(None) => return fail(ErrorKind::NotFound),
        Err(find_error) => {
            error!("Error finding user: {:?}", find_error);
            return fail(ErrorKind::Internal);
        }
    };

    let result = User::update_many()
        .col_expr(
            UserColumn::UserName,
            Expr::value(request.user_name.to_owned()),
        )
        .filter(UserColumn::Id.eq(user.id))
        .exec(db)
        .await;

    match result {
        Ok(_) => ok(()),
        Err(update_error) => {
            error!("Error updating user name: {:?}", update_error);
            fail(ErrorKind::Internal)
        }
    }
}

/// Assigns the caller to a safe account and recomputes the role from the
/// signer list. The conditional filter on the previous safe account catches
/// a concurrent reassignment, surfaced as conflict.
#[post("/api/safe-account", format = "application/json", data = "<request>")]
pub async fn set_safe_account(
    conn: Connection<'_, Db>,
    auth: WalletAuth,
    request: Json<SafeAccountRequest>,
) -> ApiResponse<()> {
    if !auth.matches(&request.wallet_address) {
        return fail(ErrorKind::Unauthenticated);
    }
    if request.safe_address.is_empty() {
        return fail(ErrorKind::InvalidArgument);
    }
    let db = conn.into_inner();
    let chain_id = request.chain_id.unwrap_or(0);

    let user = match find_user(db, &request.wallet_address, chain_id).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            warn!("User not found: {}", request.wallet_address);
            return fail(ErrorKind::NotFound);
        }
        Err(find_error) => {
            error!("Error finding user: {:?}", find_error);
            return fail(ErrorKind::Internal);
        }
    };

    let role = Role::from_signers(&request.wallet_address, &request.signers);
    let result = User::update_many()
        .col_expr(
            UserColumn::SafeAccount,
            Expr::value(request.safe_address.to_owned()),
        )
        .col_expr(UserColumn::Role, Expr::value(role.to_string()))
        .filter(UserColumn::Id.eq(user.id))
        .filter(UserColumn::SafeAccount.eq(user.safe_account.to_owned()))
        .exec(db)
        .await;

    match result {
        Ok(updated) => {
            if updated.rows_affected == 0 {
                warn!(
                    "Safe account changed concurrently for {}",
                    request.wallet_address
                );
                return fail(ErrorKind::Conflict);
            }
            ok(())
        }
        Err(update_error) => {
            error!("Error assigning safe account: {:?}", update_error);
            fail(ErrorKind::Internal)
        }
    }
}

#[get("/api/members?<q..>", format = "application/json")]
pub async fn get_members(
    conn: Connection<'_, Db>,
    auth: WalletAuth,
    q: WalletQuery,
) -> ApiResponse<Vec<MemberDetails>> {
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

    let members = User::find()
        .filter(UserColumn::SafeAccount.eq(user.safe_account.to_owned()))
        .all(db)
        .await;

    match members {
        Ok(members) => ok(members.iter().map(MemberDetails::new).collect()),
        Err(find_error) => {
            error!("Error listing members: {:?}", find_error);
            fail(ErrorKind::Internal)
        }
    }
}
