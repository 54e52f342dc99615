/// Authentication Routes
///
/// Login, logout, token refresh and current session lookup.

use actix_web::http::header::USER_AGENT;
use actix_web::{web, HttpRequest, HttpResponse, ResponseError};

use crate::auth::{
    AuthResponse, AuthService, Claims, ClientContext, LoginRequest, SessionCookies, SessionResponse,
};
use crate::client_ip::ClientIpResolver;
use crate::error::{AppError, ErrorContext, RequestError, ValidationError};

const LOGIN_BODY_LIMIT: usize = 4096;

fn client_context(req: &HttpRequest, client_ip: &ClientIpResolver) -> ClientContext {
    let device_info = req
        .headers()
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();

    ClientContext {
        device_info,
        ip_address: client_ip.client_ip(req),
    }
}

/// JSON extractor config for the login body
///
/// Undecodable bodies get the same response shape as every other failure.
pub fn login_json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(LOGIN_BODY_LIMIT)
        .error_handler(|err, req| {
            ErrorContext::for_request(req, "login")
                .fail(ValidationError::MalformedBody(err.to_string()))
                .into()
        })
}

/// POST /api/auth/login
///
/// Authenticate with email and password. On success the access token is
/// returned in the body and the refresh token is set as an HttpOnly cookie.
///
/// # Errors
/// - 400: Malformed body, invalid input, or invalid credentials
/// - 500: Store or signing failure
///
/// # Security Notes
/// - "Unknown email" and "wrong password" share one message
/// - The cookie is only set once the refresh token is persisted
pub async fn login(
    req: HttpRequest,
    form: web::Json<LoginRequest>,
    auth: web::Data<AuthService>,
    cookies: web::Data<SessionCookies>,
    client_ip: web::Data<ClientIpResolver>,
) -> Result<HttpResponse, RequestError> {
    let context = ErrorContext::for_request(&req, "login");
    let client = client_context(&req, &client_ip);

    let outcome = auth
        .login(&form, &client)
        .await
        .map_err(|e| context.fail(e))?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %outcome.user_id,
        ip_address = %client.ip_address,
        "User logged in successfully"
    );

    let mut response = HttpResponse::Ok();
    cookies.set_refresh_cookie(&mut response, &outcome.refresh_token.token);
    Ok(response.json(
        AuthResponse::success("Login successful").with_access_token(outcome.access_token.token),
    ))
}

/// POST /api/auth/logout
///
/// Revokes the refresh token from the cookie if there is one and clears
/// the cookie. Always 200; revocation problems only reach the logs.
pub async fn logout(
    req: HttpRequest,
    auth: web::Data<AuthService>,
    cookies: web::Data<SessionCookies>,
) -> HttpResponse {
    let context = ErrorContext::for_request(&req, "logout");
    let refresh_token = cookies.read_refresh_cookie(&req);

    auth.logout(refresh_token.as_deref()).await;

    tracing::info!(
        request_id = %context.request_id,
        had_session = refresh_token.is_some(),
        "User logged out"
    );

    let mut response = HttpResponse::Ok();
    cookies.clear_refresh_cookie(&mut response);
    response.json(AuthResponse::success("Logged out successfully"))
}

/// POST /api/auth/refresh
///
/// Exchanges the refresh cookie for a new access token and rotates the
/// refresh token.
///
/// # Errors
/// - 401: Missing, unknown, revoked or expired refresh token
/// - 500: Store or signing failure
pub async fn refresh(
    req: HttpRequest,
    auth: web::Data<AuthService>,
    cookies: web::Data<SessionCookies>,
    client_ip: web::Data<ClientIpResolver>,
) -> Result<HttpResponse, RequestError> {
    let context = ErrorContext::for_request(&req, "token refresh");
    let client = client_context(&req, &client_ip);
    let presented = cookies.read_refresh_cookie(&req);

    let outcome = match auth.refresh(presented.as_deref(), &client).await {
        Ok(outcome) => outcome,
        // A dead token is useless to the browser; drop it along with the 401.
        Err(e @ AppError::Auth(_)) => {
            let mut response = context.fail(e).error_response();
            if let Err(err) = response.add_cookie(&cookies.expired_cookie()) {
                tracing::warn!(
                    request_id = %context.request_id,
                    error = %err,
                    "Could not clear refresh cookie"
                );
            }
            return Ok(response);
        }
        Err(e) => return Err(context.fail(e)),
    };

    tracing::info!(
        request_id = %context.request_id,
        user_id = %outcome.user_id,
        "Token refreshed successfully"
    );

    let mut response = HttpResponse::Ok();
    cookies.set_refresh_cookie(&mut response, &outcome.refresh_token.token);
    Ok(response.json(
        AuthResponse::success("Token refreshed successfully")
            .with_access_token(outcome.access_token.token),
    ))
}

/// GET /api/auth/me
///
/// **Requires a valid access token** in the Authorization header; claims
/// are injected by the bearer middleware.
pub async fn current_session(
    req: HttpRequest,
    claims: web::ReqData<Claims>,
) -> Result<HttpResponse, RequestError> {
    let context =
        ErrorContext::for_request(&req, "session lookup").with_user_id(claims.sub.clone());
    let user_id = claims
        .user_id()
        .map_err(|e| context.fail(e))?;

    Ok(HttpResponse::Ok().json(SessionResponse {
        success: true,
        user_id: user_id.to_string(),
        expires_at: claims.expires_at().to_rfc3339(),
    }))
}
