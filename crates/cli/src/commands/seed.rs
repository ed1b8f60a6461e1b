use groupware_db::DemoSeedDataset;

use crate::commands::{load_config, migrated_pool, runtime, CommandResult, StepFailure};

pub fn run() -> CommandResult {
    let config = match load_config("seed") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("seed") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = migrated_pool(&config).await?;

        let seed_result = DemoSeedDataset::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;
        let verification = DemoSeedDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

        let outcome: Result<String, StepFailure> = if verification.all_present {
            Ok(summary(
                &seed_result.users_created,
                seed_result.customers,
                seed_result.products,
            ))
        } else {
            let failed = verification
                .checks
                .iter()
                .filter_map(|(check, passed)| (!passed).then_some(*check))
                .collect::<Vec<_>>();
            Err(("seed_verification", verification_message(&failed), 6u8))
        };

        pool.close().await;
        outcome
    });

    match result {
        Ok(message) => CommandResult::success("seed", message),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

fn summary(users_created: &[&str], customers: usize, products: usize) -> String {
    let users = if users_created.is_empty() {
        "demo users already present".to_string()
    } else {
        format!("created users: {}", users_created.join(", "))
    };
    format!("demo dataset loaded ({users}; {customers} customers; {products} products)")
}

fn verification_message(failed_checks: &[&str]) -> String {
    if failed_checks.is_empty() {
        "some seed data failed to load".to_string()
    } else {
        format!("seed verification failed for checks: {}", failed_checks.join(", "))
    }
}
