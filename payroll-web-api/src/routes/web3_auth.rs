use crate::dto::{
    encode_auth_token, fail, ok, ApiResponse, ErrorKind, LoginData, LoginRequest, Role,
    USER_STATUS_ACTIVE,
};
use crate::pool::Db;
use crate::settlement::is_unique_violation;
use payroll_db_entity::db::user::{
    ActiveModel as UserActiveModel, Column as UserColumn, Entity as User,
};
use rocket::serde::json::Json;
use sea_orm::{ActiveValue, ColumnTrait, EntityTrait, QueryFilter};
use sea_orm_rocket::Connection;
use tracing::{error, warn};

/// Find-or-create login. Idempotent per (address, chain id): a repeat call
/// returns a token for the same underlying user row.
#[post("/api/login", format = "application/json", data = "<login_request>")]
pub async fn login(
    conn: Connection<'_, Db>,
    login_request: Json<LoginRequest>,
) -> ApiResponse<LoginData> {
    if login_request.wallet_address.is_empty() {
        return fail(ErrorKind::InvalidArgument);
    }

    let db = conn.into_inner();
    let chain_id = login_request.chain_id.unwrap_or(0);

    let existing = User::find()
        .filter(UserColumn::Address.eq(login_request.wallet_address.to_owned()))
        .filter(UserColumn::ChainId.eq(chain_id))
        .one(db)
        .await;

    match existing {
        Ok(Some(_)) => {}
        Ok(None) => {
            let user = UserActiveModel {
                id: ActiveValue::NotSet,
                user_name: ActiveValue::Set("".to_owned()),
                address: ActiveValue::Set(login_request.wallet_address.to_owned()),
                safe_account: ActiveValue::Set("".to_owned()),
                role: ActiveValue::Set(Role::Worker.to_string()),
                user_status: ActiveValue::Set(USER_STATUS_ACTIVE),
                chain_id: ActiveValue::Set(chain_id),
                created_at: ActiveValue::NotSet,
                updated_at: ActiveValue::NotSet,
            };
            match User::insert(user).exec(db).await {
                Ok(_) => {}
                // Two first logins can race on uk_address_chain; the row the
                // other request inserted serves this one as well.
                Err(insert_error) if is_unique_violation(&insert_error) => {
                    warn!("Concurrent first login: {:?}", insert_error);
                }
                Err(insert_error) => {
                    error!("Error creating user: {:?}", insert_error);
                    return fail(ErrorKind::Internal);
                }
            }
        }
        Err(find_error) => {
            error!("Error finding user: {:?}", find_error);
            return fail(ErrorKind::Internal);
        }
    }

    ok(LoginData {
        auth_token: encode_auth_token(&login_request.wallet_address),
    })
}
