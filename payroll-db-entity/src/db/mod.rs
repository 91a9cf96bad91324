pub mod payroll;
pub mod tran_history;
pub mod transaction;
pub mod user;
