use std::marker::PhantomData;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};

use super::{
    claims::{Claims, Role},
    jwt::JwtKeys,
};
use crate::error::ApiError;

/// Any caller holding a valid session token.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // Expect "Bearer <token>"
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer ").or_else(|| h.strip_prefix("bearer ")))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(ApiError::AuthenticationRequired)?;

        let claims = JwtKeys::from_ref(state)
            .verify(token)
            .map_err(ApiError::InvalidToken)?;
        Ok(AuthUser(claims))
    }
}

/// Roles an operation admits, fixed at the type level.
pub trait RoleSet: Send + Sync + 'static {
    const ALLOWED: &'static [Role];
}

#[derive(Debug)]
pub struct StudentOnly;

impl RoleSet for StudentOnly {
    const ALLOWED: &'static [Role] = &[Role::Student];
}

#[derive(Debug)]
pub struct StaffOnly;

impl RoleSet for StaffOnly {
    const ALLOWED: &'static [Role] = &[Role::Staff];
}

/// A caller whose token is valid and whose role is in `R::ALLOWED`.
#[derive(Debug)]
pub struct Authorized<R: RoleSet> {
    pub claims: Claims,
    _roles: PhantomData<R>,
}

#[async_trait]
impl<S, R> FromRequestParts<S> for Authorized<R>
where
    S: Send + Sync,
    R: RoleSet,
    JwtKeys: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthUser(claims) = AuthUser::from_request_parts(parts, state).await?;
        if !R::ALLOWED.contains(&claims.role) {
            return Err(ApiError::AccessDenied {
                role: claims.role,
                required: R::ALLOWED,
            });
        }
        Ok(Authorized {
            claims,
            _roles: PhantomData,
        })
    }
}
