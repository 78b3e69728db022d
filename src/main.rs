mod models;
mod routes;
mod db;
mod errors;
mod services;

use actix_web::{App, HttpServer, web};
use tracing_subscriber::EnvFilter;

use services::market_data_service::FinnhubService;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!("🔌 Connecting to database...");
    let db = db::establish_connection()
        .await
        .expect("Failed to connect to database");
    tracing::info!("✅ Database connected!");

    // Enrichissement marché optionnel: sans clé Finnhub le serveur tourne quand même
    let market_data = FinnhubService::from_env();

    tracing::info!("🚀 Starting server on http://127.0.0.1:8080");

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(db.clone()))
            .app_data(web::Data::new(market_data.clone()))
            .configure(routes::configure_routes)
    })
        .bind(("127.0.0.1", 8080))?
        .run()
        .await
}
