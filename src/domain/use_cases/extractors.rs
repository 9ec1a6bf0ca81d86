use actix_web::{FromRequest, HttpRequest, HttpMessage};
use futures_util::future::{ready, Ready};
use crate::{entities::token::{Claims, Role}, errors::AuthError};

/// Caller allowed to manage media (`admin` or `editor`).
/// Returns 403 for other roles, 401 when unauthenticated.
#[derive(Debug)]
pub struct EditorClaims(pub Claims);

impl FromRequest for EditorClaims {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut actix_web::dev::Payload) -> Self::Future {
        match req.extensions().get::<Claims>() {
            Some(claims) if claims.role.can_manage_media() => {
                ready(Ok(EditorClaims(claims.clone())))
            }
            Some(_) => {
                ready(Err(AuthError::Forbidden("Editor or admin role required".into()).into()))
            }
            None => ready(Err(AuthError::MissingCredentials.into())),
        }
    }
}

#[derive(Debug)]
pub struct AdminClaims(pub Claims);

impl FromRequest for AdminClaims {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut actix_web::dev::Payload) -> Self::Future {
        match req.extensions().get::<Claims>() {
            Some(claims) if claims.role == Role::Admin => {
                ready(Ok(AdminClaims(claims.clone())))
            }
            Some(_) => {
                ready(Err(AuthError::Forbidden("Admin access required".into()).into()))
            }
            None => {
                ready(Err(AuthError::MissingCredentials.into()))
            }
        }
    }
}
