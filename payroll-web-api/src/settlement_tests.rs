// Unit tests covering the settlement module's pure checks.

use crate::dto::TransactionDetail;
use crate::settlement::*;
use payroll_db_entity::db::transaction::Model as TransactionModel;
use sea_orm::prelude::{DateTimeWithTimeZone, Decimal};
use sea_orm::DbErr;
use std::str::FromStr;

fn detail(address: &str, total: &str) -> TransactionDetail {
    TransactionDetail {
        name: None,
        address: address.to_owned(),
        total: Decimal::from_str(total).unwrap(),
        note: None,
    }
}

fn pending_transaction(commit_hash: &str) -> TransactionModel {
    let now: DateTimeWithTimeZone = chrono::Utc::now().into();
    TransactionModel {
        id: 7,
        safe_account: "0xSAFE".to_owned(),
        propose_address: "0xPROPOSER".to_owned(),
        transaction_details: serde_json::json!([]),
        total: Decimal::from_str("150.00").unwrap(),
        status: 0,
        transaction_hash: "0xHASH".to_owned(),
        chain_id: 137,
        commit_hash: commit_hash.to_owned(),
        created_at: now,
        updated_at: now,
    }
}

#[test]
fn proposal_with_matching_total_passes() {
    let details = vec![detail("0xA", "100.00"), detail("0xB", "50.00")];
    let total = Decimal::from_str("150.00").unwrap();
    assert!(validate_proposal("0xSAFE", "0xHASH", &details, total).is_ok());
}

#[test]
fn proposal_with_mismatched_total_fails() {
    let details = vec![detail("0xA", "100.00"), detail("0xB", "50.00")];
    let total = Decimal::from_str("140.00").unwrap();
    assert!(validate_proposal("0xSAFE", "0xHASH", &details, total).is_err());
}

#[test]
fn proposal_without_line_items_fails() {
    assert!(validate_proposal("0xSAFE", "0xHASH", &[], Decimal::ZERO).is_err());
}

#[test]
fn proposal_with_negative_amount_fails() {
    let details = vec![detail("0xA", "-1.00")];
    let total = Decimal::from_str("-1.00").unwrap();
    assert!(validate_proposal("0xSAFE", "0xHASH", &details, total).is_err());
}

#[test]
fn proposal_without_recipient_fails() {
    let details = vec![detail("", "10.00")];
    let total = Decimal::from_str("10.00").unwrap();
    assert!(validate_proposal("0xSAFE", "0xHASH", &details, total).is_err());
}

#[test]
fn proposal_without_safe_account_fails() {
    let details = vec![detail("0xA", "10.00")];
    let total = Decimal::from_str("10.00").unwrap();
    assert!(validate_proposal("", "0xHASH", &details, total).is_err());
}

#[test]
fn proposal_without_transaction_hash_fails() {
    let details = vec![detail("0xA", "10.00")];
    let total = Decimal::from_str("10.00").unwrap();
    assert!(validate_proposal("0xSAFE", "", &details, total).is_err());
}

#[test]
fn fan_out_builds_one_history_row_per_line_item() {
    let parent = pending_transaction("0xOLD_COMMIT");
    let details = vec![detail("0xA", "100.00"), detail("0xB", "50.00")];
    let pay_time: DateTimeWithTimeZone = chrono::Utc::now().into();

    let rows = build_history_rows(&parent, &details, Some("0xCOMMIT"), pay_time);

    assert_eq!(rows.len(), 2);
    assert_eq!(
        rows[0].amount.clone().unwrap(),
        Decimal::from_str("100.00").unwrap()
    );
    assert_eq!(
        rows[1].amount.clone().unwrap(),
        Decimal::from_str("50.00").unwrap()
    );
    assert_eq!(rows[0].address.clone().unwrap(), "0xA");
    assert_eq!(rows[1].address.clone().unwrap(), "0xB");
    for row in &rows {
        assert_eq!(row.commit_hash.clone().unwrap(), "0xCOMMIT");
        assert_eq!(row.safe_account.clone().unwrap(), "0xSAFE");
        assert_eq!(row.chain_id.clone().unwrap(), 137);
        assert_eq!(row.pay_time.clone().unwrap(), pay_time);
    }
}

#[test]
fn fan_out_without_commit_hash_inherits_parent_value() {
    let parent = pending_transaction("0xSTORED");
    let details = vec![detail("0xA", "10.00")];
    let pay_time: DateTimeWithTimeZone = chrono::Utc::now().into();

    let rows = build_history_rows(&parent, &details, None, pay_time);

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].commit_hash.clone().unwrap(), "0xSTORED");
}

#[test]
fn fan_out_defaults_missing_line_item_names() {
    let parent = pending_transaction("");
    let mut named = detail("0xA", "10.00");
    named.name = Some("alice".to_owned());
    let details = vec![named, detail("0xB", "5.00")];
    let pay_time: DateTimeWithTimeZone = chrono::Utc::now().into();

    let rows = build_history_rows(&parent, &details, Some("0xC"), pay_time);

    assert_eq!(rows[0].name.clone().unwrap(), "alice");
    assert_eq!(rows[1].name.clone().unwrap(), "");
}

#[test]
fn parse_details_reads_stored_json() {
    let value = serde_json::json!([
        {"address": "0xA", "total": "100.00", "note": "march salary"},
        {"name": "bob", "address": "0xB", "amount": "50.00"}
    ]);
    let details = parse_details(&value).unwrap();
    assert_eq!(details.len(), 2);
    assert_eq!(details[0].address, "0xA");
    assert_eq!(details[1].total, Decimal::from_str("50.00").unwrap());
}

#[test]
fn parse_details_rejects_non_array() {
    let value = serde_json::json!({"address": "0xA"});
    assert!(parse_details(&value).is_err());
}

#[test]
fn terminal_status_check() {
    assert!(!is_terminal_status(0));
    assert!(is_terminal_status(1));
    assert!(is_terminal_status(2));
    assert!(!is_terminal_status(3));
}

#[test]
fn unique_violation_detection() {
    let error = DbErr::Custom(
        "duplicate key value violates unique constraint \"uk_trans\"".to_owned(),
    );
    assert!(is_unique_violation(&error));
    let error = DbErr::Custom("connection refused".to_owned());
    assert!(!is_unique_violation(&error));
}
