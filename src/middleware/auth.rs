use std::future::{ready, Ready};
use std::rc::Rc;

use actix_web::{
    dev::{forward_ready, Extensions, Service, ServiceRequest, ServiceResponse, Transform},
    http::header,
    web, Error, HttpMessage, HttpRequest,
};
use futures::future::LocalBoxFuture;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use mongodb::{
    bson::{doc, oid::ObjectId},
    Database,
};
use serde::{Deserialize, Serialize};

use crate::config::get_jwt_secret;
use crate::errors::ApiError;
use crate::models::user::{Role, User};

pub const TOKEN_TTL_SECS: i64 = 7 * 24 * 3600;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id as a hex ObjectId.
    pub sub: String,
    pub email: String,
    pub iat: usize,
    pub exp: usize,
}

/// The user loaded by the authentication middleware for this request.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Why the middleware could not attach a user. Public routes ignore this;
/// protected handlers turn it into the matching 401.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    MissingToken,
    InvalidToken,
    UserNotFound,
}

impl AuthFailure {
    fn message(self) -> &'static str {
        match self {
            AuthFailure::MissingToken => "Unauthorized, Token missing",
            AuthFailure::InvalidToken => "Unauthorized, Token invalid",
            AuthFailure::UserNotFound => "Unauthorized, User not found",
        }
    }
}

pub fn issue_token(user_id: &ObjectId, email: &str) -> Result<String, ApiError> {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_hex(),
        email: email.to_string(),
        iat: now as usize,
        exp: (now + TOKEN_TTL_SECS) as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(get_jwt_secret().as_ref()),
    )
    .map_err(|e| ApiError::internal(format!("failed to sign token: {e}")))
}

pub fn decode_token(token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(get_jwt_secret().as_ref()),
        &Validation::default(),
    )
    .map(|data| data.claims)
}

/// Locate a session token: Authorization header first, then the session
/// cookies. Clients occasionally send the token still wrapped in the quotes
/// it was stored with, so those are stripped.
pub fn token_from_request(req: &HttpRequest) -> Option<String> {
    let from_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer ").map(str::to_string));

    let from_cookie = req
        .cookie("token")
        .or_else(|| req.cookie("accessToken"))
        .map(|cookie| cookie.value().to_string());

    from_header
        .or(from_cookie)
        .map(|token| strip_wrapping_quotes(&token).to_string())
}

fn strip_wrapping_quotes(token: &str) -> &str {
    token
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(token)
}

pub fn get_current_user(extensions: &Extensions) -> Option<User> {
    extensions.get::<CurrentUser>().map(|current| current.0.clone())
}

/// Require a valid session: middleware must have attached the user, or the
/// recorded failure becomes the 401 message.
pub fn require_auth(extensions: &Extensions) -> Result<User, ApiError> {
    if let Some(user) = get_current_user(extensions) {
        return Ok(user);
    }

    let failure = extensions
        .get::<AuthFailure>()
        .copied()
        .unwrap_or(AuthFailure::MissingToken);
    Err(ApiError::Unauthorized(failure.message().to_string()))
}

/// Require an authenticated admin.
pub fn require_admin(extensions: &Extensions) -> Result<User, ApiError> {
    let user = require_auth(extensions)?;
    if user.role == Role::Admin {
        Ok(user)
    } else {
        Err(ApiError::Forbidden("Forbidden, admins only".to_string()))
    }
}

/// App-wide authentication middleware. Runs on every request and records the
/// outcome in the request extensions without rejecting, so public routes keep
/// working with or without a token.
pub struct Authentication;

impl<S, B> Transform<S, ServiceRequest> for Authentication
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = AuthenticationMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthenticationMiddleware {
            service: Rc::new(service),
        }))
    }
}

pub struct AuthenticationMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AuthenticationMiddleware<S>
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
        let service = Rc::clone(&self.service);

        Box::pin(async move {
            match identify(req.request()).await {
                Ok(user) => {
                    req.extensions_mut().insert(CurrentUser(user));
                }
                Err(failure) => {
                    req.extensions_mut().insert(failure);
                }
            }

            service.call(req).await
        })
    }
}

async fn identify(req: &HttpRequest) -> Result<User, AuthFailure> {
    let token = token_from_request(req).ok_or(AuthFailure::MissingToken)?;
    let claims = decode_token(&token).map_err(|_| AuthFailure::InvalidToken)?;
    let user_id = ObjectId::parse_str(&claims.sub).map_err(|_| AuthFailure::InvalidToken)?;

    let db = match req.app_data::<web::Data<Database>>() {
        Some(db) => db,
        None => {
            log::error!("database handle missing from app data");
            return Err(AuthFailure::UserNotFound);
        }
    };

    let users_collection = db.collection::<User>("users");
    match users_collection.find_one(doc! { "_id": user_id }, None).await {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(AuthFailure::UserNotFound),
        Err(err) => {
            log::error!("failed to load user {user_id}: {err}");
            Err(AuthFailure::UserNotFound)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::cookie::Cookie;
    use actix_web::test::TestRequest;

    fn set_secret() {
        std::env::set_var("JWT_SECRET", "test-secret");
    }

    #[test]
    fn issued_tokens_round_trip() {
        set_secret();
        let user_id = ObjectId::new();
        let token = issue_token(&user_id, "asha@example.com").expect("token should sign");
        let claims = decode_token(&token).expect("token should verify");
        assert_eq!(claims.sub, user_id.to_hex());
        assert_eq!(claims.email, "asha@example.com");
        assert!(claims.exp > claims.iat);
        assert_eq!(claims.exp - claims.iat, TOKEN_TTL_SECS as usize);
    }

    #[test]
    fn expired_tokens_are_rejected() {
        set_secret();
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: ObjectId::new().to_hex(),
            email: "asha@example.com".to_string(),
            iat: (now - 7_200) as usize,
            exp: (now - 3_600) as usize,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(get_jwt_secret().as_ref()),
        )
        .unwrap();

        assert!(decode_token(&token).is_err());
    }

    #[test]
    fn tampered_tokens_are_rejected() {
        set_secret();
        let token = issue_token(&ObjectId::new(), "asha@example.com").unwrap();
        let mut tampered = token;
        tampered.push('x');
        assert!(decode_token(&tampered).is_err());
    }

    #[test]
    fn wrapping_quotes_are_stripped() {
        assert_eq!(strip_wrapping_quotes("\"abc\""), "abc");
        assert_eq!(strip_wrapping_quotes("abc"), "abc");
        assert_eq!(strip_wrapping_quotes("\"abc"), "\"abc");
    }

    #[test]
    fn header_token_takes_precedence_over_cookie() {
        let req = TestRequest::default()
            .insert_header((header::AUTHORIZATION, "Bearer header-token"))
            .cookie(Cookie::new("token", "cookie-token"))
            .to_http_request();
        assert_eq!(token_from_request(&req).as_deref(), Some("header-token"));
    }

    #[test]
    fn cookie_token_is_used_when_header_is_absent() {
        let req = TestRequest::default()
            .cookie(Cookie::new("accessToken", "\"cookie-token\""))
            .to_http_request();
        assert_eq!(token_from_request(&req).as_deref(), Some("cookie-token"));
    }

    #[test]
    fn missing_token_yields_none() {
        let req = TestRequest::default().to_http_request();
        assert_eq!(token_from_request(&req), None);
    }
}
