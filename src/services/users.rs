//! Identity service: registration, credentials and user lookups

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use validator::Validate;

use crate::{
    config::{AdminConfig, AuthConfig},
    error::{AppError, AppResult},
    models::user::{
        CreateUser, LoginRequest, LoginResponse, Role, User, UserClaims, UserDetails,
    },
    repository::{self, retry_on_busy, Repository},
};

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
    config: AuthConfig,
}

impl UsersService {
    pub fn new(repository: Repository, config: AuthConfig) -> Self {
        Self { repository, config }
    }

    /// Validate and store a new user with a hashed password
    #[tracing::instrument(skip(self, request), fields(username = %request.username))]
    pub async fn register(&self, request: &CreateUser) -> AppResult<User> {
        request.validate()?;
        let roll_number = request.normalized_roll_number()?;
        let password_hash = self.hash_password(&request.password)?;
        let now = repository::now();

        let users = &self.repository.users;
        let user = retry_on_busy(self.repository.retry, || {
            users.create(
                request.username.trim(),
                request.email.trim(),
                &password_hash,
                request.role,
                roll_number.as_deref(),
                now,
            )
        })
        .await?;

        tracing::info!(user_id = user.id, role = %user.role, "user registered");
        Ok(user)
    }

    /// The user when username, password and role all match
    pub async fn verify_credentials(
        &self,
        username: &str,
        password: &str,
        role: Role,
    ) -> AppResult<Option<User>> {
        let Some(user) = self.repository.users.get_by_username(username).await? else {
            return Ok(None);
        };
        if user.role != role || !self.verify_password(&user, password)? {
            return Ok(None);
        }
        Ok(Some(user))
    }

    /// Verify credentials and issue a bearer token
    pub async fn login(&self, request: &LoginRequest) -> AppResult<LoginResponse> {
        let user = self
            .verify_credentials(&request.username, &request.password, request.role)
            .await?
            .ok_or_else(|| {
                tracing::warn!(username = %request.username, "failed login");
                AppError::Authentication("Invalid username, password or role".to_string())
            })?;

        let claims =
            UserClaims::for_user(&user, repository::now(), self.config.jwt_expiration_hours);
        let token = claims
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))?;

        Ok(LoginResponse {
            token,
            token_type: "Bearer".to_string(),
            expires_in: (self.config.jwt_expiration_hours as i64) * 3600,
            user,
        })
    }

    /// Create the configured administrator when the store has none.
    ///
    /// Skipped when no admin password is configured.
    pub async fn ensure_default_admin(&self, admin: &AdminConfig) -> AppResult<Option<User>> {
        if self.repository.users.admin_exists().await? {
            return Ok(None);
        }
        let Some(ref password) = admin.password else {
            tracing::warn!("no administrator exists and no admin password is configured");
            return Ok(None);
        };

        let user = self
            .register(&CreateUser {
                username: admin.username.clone(),
                email: admin.email.clone(),
                password: password.clone(),
                role: Role::Admin,
                roll_number: None,
            })
            .await?;
        tracing::info!(username = %user.username, "default administrator created");
        Ok(Some(user))
    }

    pub async fn get(&self, id: i64) -> AppResult<User> {
        self.repository.users.get_by_id(id).await
    }

    /// User with total, open and overdue loan counts
    pub async fn details(&self, id: i64) -> AppResult<UserDetails> {
        let user = self.repository.users.get_by_id(id).await?;
        let counts = self
            .repository
            .users
            .loan_counts(id, repository::now())
            .await?;

        Ok(UserDetails {
            user,
            total_loans: counts.total_loans,
            open_loans: counts.open_loans,
            overdue_loans: counts.overdue_loans,
        })
    }

    pub async fn list(&self) -> AppResult<Vec<User>> {
        self.repository.users.list().await
    }

    pub async fn search(&self, query: &str) -> AppResult<Vec<User>> {
        if query.trim().is_empty() {
            return self.list().await;
        }
        self.repository.users.search(query).await
    }

    /// Delete a user without open loans, along with their history
    pub async fn delete(&self, id: i64) -> AppResult<()> {
        let users = &self.repository.users;
        retry_on_busy(self.repository.retry, || users.delete(id)).await?;
        tracing::info!(user_id = id, "user deleted");
        Ok(())
    }

    fn verify_password(&self, user: &User, password: &str) -> AppResult<bool> {
        let parsed_hash = PasswordHash::new(&user.password_hash)
            .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Hash a password using Argon2
    pub fn hash_password(&self, password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
        Ok(hash.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::testing;

    fn service(repo: Repository) -> UsersService {
        UsersService::new(repo, AuthConfig::default())
    }

    fn student(username: &str) -> CreateUser {
        CreateUser {
            username: username.to_string(),
            email: format!("{}@example.org", username),
            password: "Secr3t!pass".to_string(),
            role: Role::Student,
            roll_number: Some(format!("R-{}", username)),
        }
    }

    #[tokio::test]
    async fn test_credentials_round_trip() {
        let service = service(testing::repository().await);
        let user = service.register(&student("alice")).await.unwrap();

        assert!(user.password_hash.starts_with("$argon2"));
        assert_ne!(user.password_hash, "Secr3t!pass");

        let found = service
            .verify_credentials("alice", "Secr3t!pass", Role::Student)
            .await
            .unwrap();
        assert_eq!(found.map(|u| u.id), Some(user.id));

        assert!(service
            .verify_credentials("alice", "wrong", Role::Student)
            .await
            .unwrap()
            .is_none());
        assert!(service
            .verify_credentials("alice", "Secr3t!pass", Role::Admin)
            .await
            .unwrap()
            .is_none());
        assert!(service
            .verify_credentials("nobody", "Secr3t!pass", Role::Student)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_register_validates() {
        let service = service(testing::repository().await);

        let mut weak = student("alice");
        weak.password = "password".to_string();
        assert!(matches!(service.register(&weak).await, Err(AppError::Validation(_))));

        let mut no_roll = student("bob");
        no_roll.roll_number = None;
        assert!(matches!(service.register(&no_roll).await, Err(AppError::Validation(_))));

        service.register(&student("carol")).await.unwrap();
        assert!(matches!(
            service.register(&student("carol")).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_login_issues_token() {
        let service = service(testing::repository().await);
        let user = service.register(&student("alice")).await.unwrap();

        let response = service
            .login(&LoginRequest {
                username: "alice".to_string(),
                password: "Secr3t!pass".to_string(),
                role: Role::Student,
            })
            .await
            .unwrap();
        let claims = UserClaims::from_token(&response.token, &AuthConfig::default().jwt_secret)
            .unwrap();
        assert_eq!(claims.user_id, user.id);

        let err = service
            .login(&LoginRequest {
                username: "alice".to_string(),
                password: "nope".to_string(),
                role: Role::Student,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_default_admin_bootstrap() {
        let service = service(testing::repository().await);

        let unset = AdminConfig::default();
        assert!(service.ensure_default_admin(&unset).await.unwrap().is_none());

        let admin = AdminConfig {
            password: Some("Adm1n!secret".to_string()),
            ..AdminConfig::default()
        };
        let created = service.ensure_default_admin(&admin).await.unwrap().unwrap();
        assert_eq!(created.role, Role::Admin);
        assert!(service.ensure_default_admin(&admin).await.unwrap().is_none());
    }
}
