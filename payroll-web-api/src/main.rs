mod cors;
mod dto;
mod maintenance;
mod pool;
mod routes;
mod settlement;
mod sql_stmt;

#[cfg(test)]
mod settlement_tests;

use dto::{ErrorKind, ResponseData};
use pool::Db;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::{serde::json::Json, Config, Request};
use sea_orm_rocket::Database;
use std::collections::HashSet;
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

#[macro_use]
extern crate rocket;

#[get("/")]
async fn health_ping() -> &'static str {
    ""
}

#[get("/maintenance_mode")]
async fn maintenance_mode() -> Custom<Json<ResponseData<&'static str>>> {
    Custom(
        Status::ServiceUnavailable,
        Json(ResponseData {
            success: false,
            message: Some("maintenance".to_owned()),
            data: None,
        }),
    )
}

#[options("/<_..>")]
async fn preflight() {}

fn error_envelope(kind: ErrorKind) -> Json<ResponseData<String>> {
    Json(ResponseData {
        success: false,
        message: Some(kind.to_string()),
        data: None,
    })
}

#[catch(400)]
async fn invalid_argument() -> Json<ResponseData<String>> {
    error_envelope(ErrorKind::InvalidArgument)
}

#[catch(403)]
async fn unauthenticated() -> Json<ResponseData<String>> {
    error_envelope(ErrorKind::Unauthenticated)
}

#[catch(404)]
async fn not_found(req: &Request<'_>) -> Json<ResponseData<String>> {
    tracing::warn!("Couldn't find '{}'", req.uri());
    error_envelope(ErrorKind::NotFound)
}

#[catch(422)]
async fn unprocessable() -> Json<ResponseData<String>> {
    error_envelope(ErrorKind::InvalidArgument)
}

#[catch(500)]
async fn internal_error() -> Json<ResponseData<String>> {
    error_envelope(ErrorKind::Internal)
}

#[launch]
async fn rocket() -> _ {
    let payroll_config = Config::figment().extract::<pool::PayrollConfig>().unwrap();
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", &payroll_config.rust_log);
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(
                format!("payroll_web_api={}", &payroll_config.web_api_log)
                    .parse()
                    .expect("Error parsing directive"),
            ),
        )
        .with_span_events(FmtSpan::FULL)
        .init();

    let allowed_domains: HashSet<String> = payroll_config
        .cors_allowed_domains
        .split(',')
        .map(|s| s.to_owned())
        .collect();

    rocket::build()
        .register(
            "/",
            catchers![
                invalid_argument,
                unauthenticated,
                not_found,
                unprocessable,
                internal_error
            ],
        )
        .attach(Db::init())
        .attach(maintenance::MaintenanceMode)
        .manage(payroll_config)
        .attach(cors::OriginHeader { allowed_domains })
        .attach(routes::mount())
        .mount("/", routes![health_ping, maintenance_mode, preflight])
}
