use actix_web::web;

use crate::handlers::images;

pub fn config_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/images")
            .service(
                web::resource("")
                    .route(web::get().to(images::list_images))
            )
            .service(
                web::resource("/{filename}")
                    .route(web::delete().to(images::delete_image))
            )
            .service(
                web::resource("/{filename}/info")
                    .route(web::get().to(images::get_image_info))
            )
            .service(
                web::resource("/{filename}/optimized")
                    .route(web::get().to(images::get_optimized_image))
            )
            .service(
                web::resource("/{filename}/metadata")
                    .route(web::put().to(images::update_image_metadata))
            )
            .service(
                web::resource("/{filename}/references")
                    .route(web::get().to(images::get_image_references))
            )
    );
}
