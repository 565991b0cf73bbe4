#[macro_use]
extern crate rocket;

mod api;
mod auth;
mod db;
mod engine;
mod env;
mod error;
mod models;
mod telemetry;
#[cfg(test)]
mod test;
mod validation;

use api::{
    api_abandon_session, api_add_measurement, api_create_assignment, api_create_execution,
    api_create_plan, api_create_trainee, api_delete_plan, api_delete_trainee, api_finish_session,
    api_get_assignment_executions, api_get_coach_assignments, api_get_plan, api_get_plans,
    api_get_session, api_get_trainee, api_get_trainee_assignments, api_get_trainee_executions,
    api_get_trainees, api_login, api_logout, api_me, api_me_unauthorized, api_previous_exercise,
    api_register_coach, api_register_trainee, api_skip_rest, api_start_session, api_submit_set,
    api_update_assignment, api_update_plan, api_update_trainee, health,
};
use auth::unauthorized_api;
use db::clean_expired_sessions;
use engine::SessionRegistry;
use rocket::fairing::AdHoc;
use rocket::{Build, Rocket, tokio};
use sqlx::SqlitePool;
use telemetry::TelemetryFairing;
use telemetry::{init_tracing, shutdown_telemetry};
use tracing::{error, info};

#[launch]
async fn rocket() -> _ {
    if let Err(e) = env::load_environment() {
        eprintln!("Failed to load environment files: {}", e);
    }
    init_tracing();

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite:fitness-tracker.db?mode=rwc".to_string());

    let pool = SqlitePool::connect(&database_url)
        .await
        .expect("Failed to connect to SQLite database");

    let pool_clone = pool.clone();

    tokio::spawn(async move {
        tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;

        loop {
            match clean_expired_sessions(&pool_clone).await {
                Ok(count) => {
                    if count > 0 {
                        info!("Cleaned up {} expired login sessions", count);
                    }
                }
                Err(e) => {
                    error!("Failed to clean expired login sessions: {}", e);
                }
            }

            tokio::time::sleep(tokio::time::Duration::from_secs(3600)).await;
        }
    });

    info!("Running database migrations...");
    match sqlx::migrate!("./migrations").run(&pool).await {
        Ok(_) => info!("Migrations completed successfully"),
        Err(e) => {
            error!("Failed to run migrations: {}", e);
            panic!("Database migration failed: {}", e);
        }
    }

    init_rocket(pool).await
}

pub async fn init_rocket(pool: SqlitePool) -> Rocket<Build> {
    info!("Starting fitness tracker");

    rocket::build()
        .manage(pool)
        .manage(SessionRegistry::new())
        .mount(
            "/api",
            routes![
                api_login,
                api_logout,
                api_me,
                api_me_unauthorized,
                api_register_coach,
                api_register_trainee,
                api_get_trainees,
                api_create_trainee,
                api_get_trainee,
                api_update_trainee,
                api_delete_trainee,
                api_add_measurement,
                api_create_plan,
                api_get_plans,
                api_get_plan,
                api_update_plan,
                api_delete_plan,
                api_create_assignment,
                api_get_coach_assignments,
                api_get_trainee_assignments,
                api_update_assignment,
                api_create_execution,
                api_get_trainee_executions,
                api_get_assignment_executions,
                api_start_session,
                api_get_session,
                api_submit_set,
                api_skip_rest,
                api_previous_exercise,
                api_abandon_session,
                api_finish_session,
            ],
        )
        .register("/api", catchers![unauthorized_api])
        .mount("/api", routes![health])
        .attach(TelemetryFairing)
        .attach(AdHoc::on_shutdown("Telemetry shutdown", |_| {
            Box::pin(async {
                shutdown_telemetry();
            })
        }))
}
