use actix_web::{
    body::BoxBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    web, Error, HttpMessage, HttpResponse, ResponseError,
};
use futures_util::future::{ok, Ready, LocalBoxFuture};
use std::{rc::Rc, task::{Context, Poll}};

use crate::{entities::token::{Claims, Role}, errors::AuthError, AppState};

/// Decodes the bearer token on every non-public route and attaches the
/// claims to the request. Role checks for media routes happen in the
/// `EditorClaims`/`AdminClaims` extractors; `/api/v1/admin` is guarded here too.
pub struct AuthMiddleware;

impl<S> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = Error> + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AuthMiddlewareService {
            service: Rc::new(service),
        })
    }
}

pub struct AuthMiddlewareService<S> {
    service: Rc<S>,
}

impl<S> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = Error> + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, ctx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);

        Box::pin(async move {
            if is_public_route(req.path(), req.method().as_str()) {
                return service.call(req).await;
            }

            let claims = match get_valid_claims(&req) {
                Ok(claims) => claims,
                Err(err) => {
                    tracing::warn!(path = %req.path(), error = %err, "rejected unauthenticated request");
                    return Ok(custom_error_response(req, err.error_response()));
                }
            };

            if let Err(err) = enforce_admin_access(req.path(), &claims) {
                return Ok(custom_error_response(req, err.error_response()));
            }

            req.extensions_mut().insert(claims);
            service.call(req).await
        })
    }
}

fn is_public_route(path: &str, method: &str) -> bool {
    if method == "OPTIONS" {
        return true;
    }
    if method != "GET" && method != "HEAD" {
        return false;
    }

    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
    matches!(
        segments.as_slice(),
        [""] | ["health"] |
        ["uploads", _, _] |
        ["api", "v1", "images", _, "info"] |
        ["api", "v1", "images", _, "optimized"]
    )
}

fn extract_token(req: &ServiceRequest) -> Option<String> {
    req.headers()
        .get("Authorization")
        .and_then(|header| header.to_str().ok())
        .and_then(|header| {
            let parts: Vec<&str> = header.split_whitespace().collect();
            if parts.len() == 2 && parts[0].eq_ignore_ascii_case("bearer") {
                Some(parts[1].to_string())
            } else {
                None
            }
        })
}

fn get_valid_claims(req: &ServiceRequest) -> Result<Claims, AuthError> {
    let state = req.app_data::<web::Data<AppState>>()
        .ok_or_else(|| {
            tracing::error!("AppState missing in middleware");
            AuthError::MissingJwtService
        })?;

    let token = extract_token(req).ok_or(AuthError::MissingCredentials)?;
    let decoded = state.token_service.decode_jwt(&token)?;
    Ok(decoded.claims)
}

fn enforce_admin_access(path: &str, claims: &Claims) -> Result<(), AuthError> {
    if path.starts_with("/api/v1/admin") && claims.role != Role::Admin {
        tracing::warn!(path, sub = %claims.sub, "admin access required");
        return Err(AuthError::Forbidden("Admin access required".into()));
    }
    Ok(())
}

fn custom_error_response(req: ServiceRequest, res: HttpResponse) -> ServiceResponse<BoxBody> {
    req.into_response(res)
}

#[cfg(test)]
mod tests {
    use super::is_public_route;

    #[test]
    fn delivery_and_info_are_public() {
        assert!(is_public_route("/", "GET"));
        assert!(is_public_route("/health", "GET"));
        assert!(is_public_route("/uploads/articles/a.jpg", "GET"));
        assert!(is_public_route("/api/v1/images/a.jpg/info", "GET"));
        assert!(is_public_route("/api/v1/images/a.jpg/optimized", "GET"));
        assert!(is_public_route("/api/v1/uploads/single", "OPTIONS"));
    }

    #[test]
    fn mutations_and_listing_need_a_token() {
        assert!(!is_public_route("/api/v1/images", "GET"));
        assert!(!is_public_route("/api/v1/images/a.jpg", "DELETE"));
        assert!(!is_public_route("/api/v1/images/a.jpg/metadata", "PUT"));
        assert!(!is_public_route("/api/v1/images/a.jpg/references", "GET"));
        assert!(!is_public_route("/api/v1/uploads/single", "POST"));
        assert!(!is_public_route("/api/v1/admin/dashboard", "GET"));
    }
}
