/// Access-token gate
///
/// Reads the `accessToken` cookie, verifies it as an access token and loads
/// the user it names. The user is injected into request extensions for
/// handlers to pick up with `web::ReqData<AuthenticatedUser>`. There is no
/// silent refresh: an expired access token is a 401 and the client has to
/// call the refresh endpoint itself.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;
use std::sync::Arc;

use crate::auth::{TokenClass, TokenCodec, ACCESS_COOKIE};
use crate::error::{AppError, AuthError};
use crate::models::User;
use crate::store::UserStore;

/// The caller, resolved from a valid access token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

/// Gate for routes that require a session
///
/// Must be applied to every scope that reads `AuthenticatedUser`.
pub struct AuthGate {
    codec: Arc<TokenCodec>,
    users: Arc<dyn UserStore>,
}

impl AuthGate {
    pub fn new(codec: Arc<TokenCodec>, users: Arc<dyn UserStore>) -> Self {
        Self { codec, users }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthGate
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthGateService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(AuthGateService {
            service: Rc::new(service),
            codec: self.codec.clone(),
            users: self.users.clone(),
        }))
    }
}

pub struct AuthGateService<S> {
    service: Rc<S>,
    codec: Arc<TokenCodec>,
    users: Arc<dyn UserStore>,
}

impl<S, B> Service<ServiceRequest> for AuthGateService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let token = req
            .cookie(ACCESS_COOKIE)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty());

        let service = self.service.clone();
        let codec = self.codec.clone();
        let users = self.users.clone();

        Box::pin(async move {
            let token = token.ok_or(AppError::Auth(AuthError::MissingToken))?;
            let user_id = codec
                .verify(&token, TokenClass::Access)
                .map_err(AppError::Auth)?;

            let user = match users.find_by_id(user_id).await? {
                Some(user) => user,
                None => {
                    tracing::warn!(user_id = %user_id, "Access token for a missing user");
                    return Err(AppError::Auth(AuthError::MissingToken).into());
                }
            };

            tracing::debug!(user_id = %user.id, "Access token accepted");
            req.extensions_mut().insert(AuthenticatedUser(user));
            service.call(req).await
        })
    }
}
