// src/main.rs
use actix_web::{App, HttpServer, middleware::Logger, web};
use sqlx::PgPool;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod access;
mod articles;
mod auth;
mod breaking;
mod categories;
mod config;
mod db;
mod error;
mod mailer;
mod models;
mod newsletter;
mod subscriptions;
mod videos;
mod view_count;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    tracing::info!("Starting newsdesk service");

    dotenv::dotenv().ok();
    let config = config::Config::from_env().expect("Failed to load config from environment");

    let pool = PgPool::connect(&config.database_url)
        .await
        .expect("Failed to connect to Postgres");
    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let dedup = view_count::MemoryDedupStore::new();
    let mailer = mailer::Mailer::from_config(&config);
    let bind_addr = config.bind_addr.clone();

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(dedup.clone()))
            .app_data(web::Data::new(mailer.clone()))
            .wrap(Logger::default())
            .configure(auth::init_routes)
            .configure(subscriptions::init_routes)
            .configure(articles::init_routes)
            .configure(videos::init_routes)
            .configure(categories::init_routes)
            .configure(breaking::init_routes)
            .configure(newsletter::init_routes)
    })
    .bind(bind_addr)?
    .run()
    .await
}
