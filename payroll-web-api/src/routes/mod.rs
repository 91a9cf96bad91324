use rocket::fairing::AdHoc;

pub mod history;
pub mod payroll;
pub mod transaction;
pub mod user;
pub mod web3_auth;

pub fn mount() -> AdHoc {
    AdHoc::on_ignite("Attaching Routes", |rocket| async {
        rocket.mount(
            "/",
            routes![
                history::get_transaction_history,
                payroll::get_dashboard,
                payroll::get_payroll,
                payroll::upsert_employee,
                payroll::delete_employee,
                transaction::propose,
                transaction::update_status,
                transaction::list_pending,
                user::get_members,
                user::get_user,
                user::set_safe_account,
                user::update_user,
                web3_auth::login
            ],
        )
    })
}
