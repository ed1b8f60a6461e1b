use groupware_core::domain::user::{User, ROLE_ADMIN, ROLE_USER};
use groupware_core::TokenService;
use groupware_db::SqlUserRepository;

use crate::commands::{load_config, migrated_pool, runtime, CommandResult};

/// Issues a bearer token for an existing user. `role` narrows or widens the
/// role claim for this token only; the stored user is unchanged.
pub fn run(user_id: i64, role: Option<&str>) -> CommandResult {
    let role = match role.map(normalize_role).transpose() {
        Ok(role) => role,
        Err(message) => return CommandResult::failure("token", "invalid_argument", message, 2),
    };
    let config = match load_config("token") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("token") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = migrated_pool(&config).await?;
        let user = SqlUserRepository::new(pool.clone())
            .get(user_id)
            .await
            .map_err(|error| ("user_lookup", error.to_string(), 5u8));
        pool.close().await;
        user?.ok_or_else(|| ("user_not_found", format!("user {user_id} not found"), 6u8))
    });

    let mut user: User = match result {
        Ok(user) => user,
        Err((error_class, message, exit_code)) => {
            return CommandResult::failure("token", error_class, message, exit_code)
        }
    };
    if let Some(role) = role {
        user.role_cd = role.to_string();
    }

    let tokens = TokenService::new(&config.auth.jwt_secret, config.auth.token_ttl_minutes);
    match tokens.issue(&user) {
        Ok((token, _)) => CommandResult::success("token", token),
        Err(error) => CommandResult::failure("token", "token_encoding", error.to_string(), 7),
    }
}

fn normalize_role(raw: &str) -> Result<&'static str, String> {
    match raw.trim().to_ascii_uppercase().as_str() {
        "ADMIN" => Ok(ROLE_ADMIN),
        "USER" => Ok(ROLE_USER),
        other => Err(format!("unknown role `{other}` (expected ADMIN or USER)")),
    }
}

#[cfg(test)]
mod tests {
    use super::normalize_role;

    #[test]
    fn roles_are_case_insensitive_and_closed() {
        assert_eq!(normalize_role(" admin "), Ok("ADMIN"));
        assert_eq!(normalize_role("User"), Ok("USER"));
        assert!(normalize_role("OWNER").is_err());
    }
}
