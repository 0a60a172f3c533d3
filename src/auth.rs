use async_trait::async_trait;
use pgwire::api::auth::{AuthSource, LoginInfo, Password};
use pgwire::error::{PgWireError, PgWireResult};
use tracing::warn;

use crate::observability::AUTH_FAILURES_TOTAL;

/// Single configured login. Any other user name is refused before the
/// password is compared.
#[derive(Debug)]
pub struct SlotbookAuthSource {
    user: String,
    password: String,
}

impl SlotbookAuthSource {
    pub fn new(user: String, password: String) -> Self {
        Self { user, password }
    }
}

#[async_trait]
impl AuthSource for SlotbookAuthSource {
    async fn get_password(&self, login: &LoginInfo) -> PgWireResult<Password> {
        let user = login.user().unwrap_or_default();
        if user != self.user {
            metrics::counter!(AUTH_FAILURES_TOTAL).increment(1);
            warn!(user, "login refused: unknown user");
            return Err(PgWireError::InvalidPassword(user.to_owned()));
        }
        Ok(Password::new(None, self.password.as_bytes().to_vec()))
    }
}
