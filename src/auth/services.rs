use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        claims::Identity,
        dto::PublicUser,
        jwt::JwtKeys,
        password::{hash_password, verify_password, MIN_PASSWORD_LEN},
        repo::UserStore,
        repo_types::User,
    },
    error::AppError,
    policy::Role,
};

const INVALID_CREDENTIALS: &str = "Invalid credentials";

pub(crate) fn is_valid_username(username: &str) -> bool {
    lazy_static! {
        static ref USERNAME_RE: Regex =
            Regex::new(r"^[A-Za-z0-9_.-]{3,32}$").expect("username pattern compiles");
    }
    USERNAME_RE.is_match(username)
}

/// Verifies credentials and issues a session token.
///
/// Unknown user and wrong password answer with the same message; only the
/// log tells them apart.
#[instrument(skip(users, keys, password))]
pub async fn login(
    users: &dyn UserStore,
    keys: &JwtKeys,
    username: &str,
    password: &str,
) -> Result<(PublicUser, String), AppError> {
    let user = match users.find_by_username(username).await? {
        Some(u) => u,
        None => {
            warn!(%username, "login unknown username");
            return Err(AppError::Unauthenticated(INVALID_CREDENTIALS.into()));
        }
    };

    if !verify_password(password, &user.password_hash)? {
        warn!(%username, user_id = %user.id, "login invalid password");
        return Err(AppError::Unauthenticated(INVALID_CREDENTIALS.into()));
    }

    let identity = Identity {
        id: user.id,
        username: user.username,
        role: user.role,
    };
    let token = keys.sign(&identity)?;

    info!(user_id = %identity.id, role = ?identity.role, "user logged in");
    Ok((
        PublicUser {
            id: identity.id,
            username: identity.username,
            role: identity.role,
        },
        token,
    ))
}

/// Creates a user with a hashed password. Used by the seeder; there is no
/// public registration endpoint.
pub async fn create_user(
    users: &dyn UserStore,
    username: &str,
    password: &str,
    role: Role,
) -> Result<User, AppError> {
    if !is_valid_username(username) {
        return Err(AppError::validation(format!("Invalid username: {username}")));
    }
    if role == Role::Unrecognized {
        return Err(AppError::validation("Unknown role"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation("Password too short"));
    }
    let hash = hash_password(password)?;
    let user = users.insert(username, &hash, role).await?;
    info!(user_id = %user.id, %username, role = ?role, "user created");
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{auth::repo::MemoryUserStore, config::AppConfig};

    async fn store_with_admin() -> MemoryUserStore {
        let users = MemoryUserStore::new();
        create_user(&users, "admin", "admin123", Role::Company)
            .await
            .expect("create admin");
        users
    }

    fn keys() -> JwtKeys {
        JwtKeys::from_config(&AppConfig::for_tests().jwt)
    }

    #[test]
    fn username_pattern() {
        assert!(is_valid_username("vendedor"));
        assert!(is_valid_username("tienda_01.centro"));
        assert!(!is_valid_username("ab"));
        assert!(!is_valid_username("has space"));
    }

    #[tokio::test]
    async fn login_issues_token_with_role() {
        let users = store_with_admin().await;
        let keys = keys();
        let (user, token) = login(&users, &keys, "admin", "admin123")
            .await
            .expect("login ok");
        assert_eq!(user.username, "admin");
        assert_eq!(user.role, Role::Company);

        let claims = keys.verify(&token).expect("token verifies");
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.role, Role::Company);
    }

    #[tokio::test]
    async fn login_failures_share_a_generic_message() {
        let users = store_with_admin().await;
        let keys = keys();

        let unknown = login(&users, &keys, "nobody", "admin123").await.unwrap_err();
        let wrong = login(&users, &keys, "admin", "admin124").await.unwrap_err();
        let wrong_case = login(&users, &keys, "ADMIN", "admin123").await.unwrap_err();

        for err in [unknown, wrong, wrong_case] {
            assert!(matches!(&err, AppError::Unauthenticated(m) if m == INVALID_CREDENTIALS));
        }
    }

    #[tokio::test]
    async fn create_user_validates_input() {
        let users = MemoryUserStore::new();
        assert!(matches!(
            create_user(&users, "x", "admin123", Role::Company).await,
            Err(AppError::Validation { .. })
        ));
        assert!(matches!(
            create_user(&users, "cajero", "short", Role::Seller).await,
            Err(AppError::Validation { .. })
        ));
        assert!(matches!(
            create_user(&users, "cajero", "long-enough", Role::Unrecognized).await,
            Err(AppError::Validation { .. })
        ));
    }
}
