use base64::{engine::general_purpose, Engine as _};
use payroll_db_entity::db::tran_history::Model as HistoryModel;
use payroll_db_entity::db::transaction::Model as TransactionModel;
use payroll_db_entity::db::user::Model as UserModel;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use rocket::serde::{Deserialize, Serialize};
use sea_orm::prelude::Decimal;
use sea_orm::QueryResult;
use strum_macros::Display;

/// Response envelope shared by every endpoint: `{success, message?, data?}`.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(crate = "rocket::serde")]
pub struct ResponseData<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

pub type ApiResponse<T> = Custom<Json<ResponseData<T>>>;

pub fn ok<T>(data: T) -> ApiResponse<T> {
    Custom(
        Status::Ok,
        Json(ResponseData {
            success: true,
            message: None,
            data: Some(data),
        }),
    )
}

pub fn fail<T>(kind: ErrorKind) -> ApiResponse<T> {
    Custom(
        kind.status(),
        Json(ResponseData {
            success: false,
            message: Some(kind.to_string()),
            data: None,
        }),
    )
}

/// Stable machine-readable error kinds. Storage error text is logged,
/// never returned to clients.
#[derive(Copy, Clone, Debug, PartialEq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    Unauthenticated,
    NotFound,
    InvalidArgument,
    Conflict,
    Internal,
}

impl ErrorKind {
    pub fn status(&self) -> Status {
        match self {
            ErrorKind::Unauthenticated => Status::Forbidden,
            ErrorKind::NotFound => Status::NotFound,
            ErrorKind::InvalidArgument => Status::BadRequest,
            ErrorKind::Conflict => Status::Conflict,
            ErrorKind::Internal => Status::InternalServerError,
        }
    }
}

pub const USER_STATUS_ACTIVE: i16 = 0;

pub const STATUS_PENDING: i16 = 0;
pub const STATUS_COMPLETED: i16 = 1;
pub const STATUS_FAILED: i16 = 2;

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, Display)]
#[serde(crate = "rocket::serde")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    #[serde(rename = "signer")]
    Signer,
    #[serde(rename = "worker")]
    Worker,
}

impl Role {
    /// Signer iff the address appears in the safe account's signer list.
    /// Addresses compare case-insensitively (EVM addresses are hex).
    pub fn from_signers(address: &str, signers: &[String]) -> Role {
        if signers.iter().any(|s| s.eq_ignore_ascii_case(address)) {
            Role::Signer
        } else {
            Role::Worker
        }
    }
}

pub fn encode_auth_token(address: &str) -> String {
    general_purpose::STANDARD.encode(address)
}

pub fn decode_auth_token(token: &str) -> Option<String> {
    let bytes = general_purpose::STANDARD.decode(token).ok()?;
    String::from_utf8(bytes).ok()
}

/// Request guard holding the wallet address decoded from the `auth-token`
/// header. Handlers must still call [`WalletAuth::matches`] against the
/// address carried in the body or query before touching storage.
#[derive(Debug)]
pub struct WalletAuth {
    pub address: String,
}

#[derive(Debug)]
pub enum AuthTokenError {
    Missing,
    Invalid,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for WalletAuth {
    type Error = AuthTokenError;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match req.headers().get_one("auth-token") {
            None => Outcome::Failure((Status::Forbidden, AuthTokenError::Missing)),
            Some(token) => match decode_auth_token(token) {
                Some(address) => Outcome::Success(WalletAuth { address }),
                None => Outcome::Failure((Status::Forbidden, AuthTokenError::Invalid)),
            },
        }
    }
}

impl WalletAuth {
    pub fn matches(&self, wallet_address: &str) -> bool {
        self.address == wallet_address
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(crate = "rocket::serde")]
pub struct LoginRequest {
    #[serde(rename = "walletAddress")]
    pub wallet_address: String,
    #[serde(rename = "chainId")]
    pub chain_id: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(crate = "rocket::serde")]
pub struct LoginData {
    #[serde(rename = "authToken")]
    pub auth_token: String,
}

#[derive(FromForm)]
pub struct WalletQuery {
    #[field(name = "walletAddress")]
    pub wallet_address: String,
    #[field(name = "chainId")]
    pub chain_id: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(crate = "rocket::serde")]
pub struct DashboardData {
    #[serde(rename = "totalEmployees")]
    pub total_employees: i64,
    #[serde(rename = "totalPayroll")]
    pub total_payroll: Decimal,
    #[serde(rename = "safeAccount")]
    pub safe_account: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(crate = "rocket::serde")]
pub struct EmployeeEntry {
    pub id: i64,
    pub name: String,
    pub address: String,
    #[serde(rename = "baseSalary")]
    pub base_salary: Decimal,
    pub bonus: Decimal,
    pub total: Decimal,
}

impl EmployeeEntry {
    pub fn new(row: &QueryResult) -> Result<EmployeeEntry, sea_orm::DbErr> {
        Ok(EmployeeEntry {
            id: row.try_get("", "id")?,
            name: row.try_get("", "name")?,
            address: row.try_get("", "address")?,
            base_salary: row.try_get("", "base_salary")?,
            bonus: row.try_get("", "bonus")?,
            total: row.try_get("", "total")?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(crate = "rocket::serde")]
pub struct EmployeeData {
    pub id: Option<i64>,
    pub name: String,
    pub address: String,
    #[serde(rename = "baseSalary")]
    pub base_salary: Decimal,
    pub bonus: Decimal,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(crate = "rocket::serde")]
pub struct EmployeeUpsertRequest {
    #[serde(rename = "walletAddress")]
    pub wallet_address: String,
    #[serde(rename = "chainId")]
    pub chain_id: Option<i64>,
    #[serde(rename = "employeeData")]
    pub employee_data: EmployeeData,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(crate = "rocket::serde")]
pub struct EmployeeId {
    pub id: i64,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(crate = "rocket::serde")]
pub struct WalletRequest {
    #[serde(rename = "walletAddress")]
    pub wallet_address: String,
    #[serde(rename = "chainId")]
    pub chain_id: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(crate = "rocket::serde")]
pub struct MemberDetails {
    #[serde(rename = "userName")]
    pub user_name: String,
    pub address: String,
    pub role: String,
    #[serde(rename = "userStatus")]
    pub user_status: i16,
}

impl MemberDetails {
    pub fn new(user: &UserModel) -> MemberDetails {
        MemberDetails {
            user_name: user.user_name.to_owned(),
            address: user.address.to_owned(),
            role: user.role.to_owned(),
            user_status: user.user_status,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(crate = "rocket::serde")]
pub struct SafeAccountRequest {
    #[serde(rename = "walletAddress")]
    pub wallet_address: String,
    #[serde(rename = "safeAddress")]
    pub safe_address: String,
    pub signers: Vec<String>,
    #[serde(rename = "chainId")]
    pub chain_id: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(crate = "rocket::serde")]
pub struct UserProfile {
    #[serde(rename = "userName")]
    pub user_name: String,
    #[serde(rename = "safeAccount")]
    pub safe_account: String,
    pub role: String,
}

impl UserProfile {
    pub fn new(user: &UserModel) -> UserProfile {
        UserProfile {
            user_name: user.user_name.to_owned(),
            safe_account: user.safe_account.to_owned(),
            role: user.role.to_owned(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(crate = "rocket::serde")]
pub struct UpdateUserRequest {
    #[serde(rename = "walletAddress")]
    pub wallet_address: String,
    #[serde(rename = "userName")]
    pub user_name: String,
    #[serde(rename = "chainId")]
    pub chain_id: Option<i64>,
}

/// One line item of a proposed payment batch. Clients send the item amount
/// as `total`; `amount` is accepted as an alias.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(crate = "rocket::serde")]
pub struct TransactionDetail {
    pub name: Option<String>,
    pub address: String,
    #[serde(alias = "amount")]
    pub total: Decimal,
    pub note: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(crate = "rocket::serde")]
pub struct ProposeTransactionRequest {
    #[serde(rename = "safeAccount")]
    pub safe_account: String,
    #[serde(rename = "chainId")]
    pub chain_id: Option<i64>,
    #[serde(rename = "proposeAddress", alias = "walletAddress")]
    pub propose_address: String,
    #[serde(rename = "transactionDetails")]
    pub transaction_details: Vec<TransactionDetail>,
    pub total: Decimal,
    #[serde(rename = "transactionHash", alias = "transaction_hash")]
    pub transaction_hash: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(crate = "rocket::serde")]
pub struct UpdateStatusRequest {
    #[serde(rename = "walletAddress")]
    pub wallet_address: String,
    #[serde(rename = "transaction_hash", alias = "transactionHash")]
    pub transaction_hash: String,
    pub status: i16,
    #[serde(rename = "chainId", alias = "chain_id")]
    pub chain_id: Option<i64>,
    #[serde(rename = "commit_hash", alias = "commitHash")]
    pub commit_hash: Option<String>,
}

#[derive(FromForm)]
pub struct PendingListQuery {
    #[field(name = "walletAddress")]
    pub wallet_address: String,
    pub status: Option<i16>,
    #[field(name = "chainId")]
    pub chain_id: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(crate = "rocket::serde")]
pub struct TransactionRecord {
    pub id: i64,
    #[serde(rename = "safeAccount")]
    pub safe_account: String,
    #[serde(rename = "proposeAddress")]
    pub propose_address: String,
    #[serde(rename = "proposeName", skip_serializing_if = "Option::is_none")]
    pub propose_name: Option<String>,
    #[serde(rename = "transactionDetails")]
    pub transaction_details: serde_json::Value,
    pub total: Decimal,
    pub status: i16,
    #[serde(rename = "transactionHash")]
    pub transaction_hash: String,
    #[serde(rename = "commitHash")]
    pub commit_hash: String,
    #[serde(rename = "chainId")]
    pub chain_id: i64,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    #[serde(rename = "updatedAt")]
    pub updated_at: String,
}

impl TransactionRecord {
    pub fn new(trx: &TransactionModel, propose_name: Option<String>) -> TransactionRecord {
        TransactionRecord {
            id: trx.id,
            safe_account: trx.safe_account.to_owned(),
            propose_address: trx.propose_address.to_owned(),
            propose_name,
            transaction_details: trx.transaction_details.to_owned(),
            total: trx.total,
            status: trx.status,
            transaction_hash: trx.transaction_hash.to_owned(),
            commit_hash: trx.commit_hash.to_owned(),
            chain_id: trx.chain_id,
            created_at: trx.created_at.to_rfc3339(),
            updated_at: trx.updated_at.to_rfc3339(),
        }
    }
}

#[derive(FromForm)]
pub struct HistoryQuery {
    pub address: String,
    pub chain_id: Option<i64>,
    pub safe_account: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(crate = "rocket::serde")]
pub struct HistoryRecord {
    pub id: i64,
    pub name: String,
    pub address: String,
    pub amount: Decimal,
    #[serde(rename = "payTime")]
    pub pay_time: String,
    #[serde(rename = "commitHash")]
    pub commit_hash: String,
    #[serde(rename = "safeAccount")]
    pub safe_account: String,
    #[serde(rename = "chainId")]
    pub chain_id: i64,
}

impl HistoryRecord {
    pub fn new(row: &HistoryModel) -> HistoryRecord {
        HistoryRecord {
            id: row.id,
            name: row.name.to_owned(),
            address: row.address.to_owned(),
            amount: row.amount,
            pay_time: row.pay_time.to_rfc3339(),
            commit_hash: row.commit_hash.to_owned(),
            safe_account: row.safe_account.to_owned(),
            chain_id: row.chain_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_token_roundtrip() {
        let token = encode_auth_token("0xAbC123");
        assert_eq!(decode_auth_token(&token), Some("0xAbC123".to_owned()));
    }

    #[test]
    fn auth_token_rejects_garbage() {
        assert_eq!(decode_auth_token("not base64!!"), None);
    }

    #[test]
    fn role_from_signers_case_insensitive() {
        let signers = vec!["0xABCD".to_owned(), "0xEF01".to_owned()];
        assert_eq!(Role::from_signers("0xabcd", &signers), Role::Signer);
        assert_eq!(Role::from_signers("0x9999", &signers), Role::Worker);
    }

    #[test]
    fn error_kind_is_snake_case() {
        assert_eq!(ErrorKind::InvalidArgument.to_string(), "invalid_argument");
        assert_eq!(ErrorKind::NotFound.to_string(), "not_found");
    }

    #[test]
    fn detail_accepts_amount_alias() {
        let detail: TransactionDetail =
            serde_json::from_str(r#"{"address":"0xA","amount":"100.00"}"#).unwrap();
        assert_eq!(detail.total.to_string(), "100.00");
    }

    #[test]
    fn envelope_omits_absent_fields() {
        let body = serde_json::to_string(&ResponseData::<String> {
            success: true,
            message: None,
            data: None,
        })
        .unwrap();
        assert_eq!(body, r#"{"success":true}"#);
    }
}
