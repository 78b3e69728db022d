pub mod health;
pub mod trades;
pub mod scale_plans;
pub mod executions;
pub mod annotations;

use actix_web::web;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(health::health_check)
            .configure(trades::trades_routes)
            .configure(scale_plans::scale_plans_routes)
            .configure(executions::executions_routes)
            .configure(annotations::annotations_routes),
    );
}
