use actix_web::web;

use crate::handlers::system::admin_dashboard;

pub fn config_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .route("/dashboard", web::get().to(admin_dashboard))
    );
}
