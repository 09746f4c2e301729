//! Authentication middleware that reads the caller's identity and records the user.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    auth::Identity,
    user::{User, upsert_user},
};

/// The state needed for the auth middleware
#[derive(Debug, Clone)]
pub struct AuthState {
    /// The database connection for recording users.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// Middleware function that checks for the identity headers set by the identity proxy.
///
/// If the headers are present, the user is created or refreshed in the database and the request
/// is executed normally, otherwise a 401 response with a JSON error body is returned.
///
/// **Note**: Route handlers can use the function argument `Extension(user_id): Extension<UserID>`
/// to receive the user ID, or `Extension(user): Extension<User>` for the full user.
pub async fn auth_guard(
    State(state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Response {
    let identity = match Identity::from_headers(request.headers()) {
        Some(identity) => identity,
        None => {
            tracing::debug!(
                "Rejecting request to {} without identity headers",
                request.uri().path()
            );
            return Error::Unauthorized.into_response();
        }
    };

    let user = identity.to_user();

    if let Err(error) = record_user(&state, &user) {
        return error.into_response();
    }

    tracing::debug!("Authenticated user {} (groups: {:?})", user.id, identity.groups);
    request.extensions_mut().insert(user.id.clone());
    request.extensions_mut().insert(user);

    next.run(request).await
}

fn record_user(state: &AuthState, user: &User) -> Result<(), Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    upsert_user(user, &connection)
}
