use actix_web::web;

use crate::handlers::uploads;

pub fn config_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/uploads")
            .service(
                web::resource("/single")
                    .route(web::post().to(uploads::upload_single))
            )
            .service(
                web::resource("/multiple")
                    .route(web::post().to(uploads::upload_multiple))
            )
    );
}
