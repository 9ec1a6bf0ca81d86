use actix_web::web;

use crate::handlers::{
    home::home,
    images::get_original_image,
    json_error::route_not_found,
    system::health_check,
};

mod admin;
mod images;
mod json_error;
mod uploads;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(home);
    cfg.service(health_check);

    cfg.service(
        web::scope("/api/v1")
            .configure(uploads::config_routes)
            .configure(images::config_routes)
            .configure(admin::config_routes)
    );

    cfg.service(
        web::resource("/uploads/{category}/{filename}")
            .route(web::get().to(get_original_image))
    );

    cfg.configure(json_error::config_routes);
    cfg.default_service(web::to(route_not_found));
}
