use sea_orm::DbBackend;

pub const DB_BACKEND: DbBackend = DbBackend::Postgres;

pub const DASHBOARD_SUMMARY: &str = r#"SELECT COUNT(*) AS total_employees,
    COALESCE(SUM(payroll.base_salary + payroll.bonus), 0) AS total_payroll
    FROM payroll
    WHERE safe_account = $1"#;

pub const PAYROLL_WITH_TOTAL: &str = r#"SELECT payroll.id,
    payroll.name,
    payroll.address,
    payroll.base_salary,
    payroll.bonus,
    (payroll.base_salary + payroll.bonus) AS total
    FROM payroll
    WHERE safe_account = $1
    ORDER BY payroll.id ASC"#;
