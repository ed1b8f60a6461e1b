use groupware_core::domain::user::{UserInput, ROLE_ADMIN, ROLE_USER};
use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::{RepositoryError, SqlUserRepository};

/// Operator accounts created by the demo seed. Passwords are hashed on insert.
const SEED_USERS: &[SeedUser] = &[
    SeedUser { login_id: "admin", name: "관리자", password: "admin1234", role_cd: ROLE_ADMIN },
    SeedUser { login_id: "sales01", name: "김영업", password: "sales1234", role_cd: ROLE_USER },
    SeedUser { login_id: "lead01", name: "이팀장", password: "lead1234", role_cd: ROLE_USER },
    SeedUser { login_id: "exec01", name: "박이사", password: "exec1234", role_cd: ROLE_ADMIN },
];

const SEED_CUSTOMER_IDS: &[i64] = &[9001, 9002];
const SEED_PRODUCT_IDS: &[i64] = &[9101, 9102, 9103];
const SEED_MANAGER_COUNT: i64 = 3;

/// Demo dataset for local runs: a few users, two customers with managers and
/// a small product catalog. Loading twice leaves the same rows behind.
pub struct DemoSeedDataset;

impl DemoSeedDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_seed_data.sql");

    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        let users = SqlUserRepository::new(pool.clone());
        let mut users_created = Vec::new();
        for seed in SEED_USERS {
            if users.find_credentials_by_login(seed.login_id).await?.is_some() {
                continue;
            }
            users
                .create(&UserInput {
                    login_id: seed.login_id.to_string(),
                    name: seed.name.to_string(),
                    password: Some(seed.password.to_string()),
                    email: Some(format!("{}@groupware.example", seed.login_id)),
                    role_cd: Some(seed.role_cd.to_string()),
                    ..UserInput::default()
                })
                .await?;
            users_created.push(seed.login_id);
        }

        Ok(SeedResult {
            users_created,
            customers: SEED_CUSTOMER_IDS.len(),
            products: SEED_PRODUCT_IDS.len(),
        })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for seed in SEED_USERS {
            let exists: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM users WHERE login_id = ?1 AND role_cd = ?2)",
            )
            .bind(seed.login_id)
            .bind(seed.role_cd)
            .fetch_one(pool)
            .await?;
            checks.push((seed.login_id, exists == 1));
        }

        let customers: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM customer WHERE customer_id IN {}",
            sql_array_from_ids(SEED_CUSTOMER_IDS)
        ))
        .fetch_one(pool)
        .await?;
        checks.push(("customers", customers == SEED_CUSTOMER_IDS.len() as i64));

        let managers: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM customer_manager WHERE customer_id IN {}",
            sql_array_from_ids(SEED_CUSTOMER_IDS)
        ))
        .fetch_one(pool)
        .await?;
        checks.push(("customer-managers", managers == SEED_MANAGER_COUNT));

        let products: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM product WHERE id IN {}",
            sql_array_from_ids(SEED_PRODUCT_IDS)
        ))
        .fetch_one(pool)
        .await?;
        checks.push(("products", products == SEED_PRODUCT_IDS.len() as i64));

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }

    /// Removes the seeded rows. Users that already own documents are kept.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;

        sqlx::query(&format!(
            "DELETE FROM product WHERE id IN {}",
            sql_array_from_ids(SEED_PRODUCT_IDS)
        ))
        .execute(&mut *tx)
        .await?;
        sqlx::query(&format!(
            "DELETE FROM customer WHERE customer_id IN {}",
            sql_array_from_ids(SEED_CUSTOMER_IDS)
        ))
        .execute(&mut *tx)
        .await?;
        for seed in SEED_USERS {
            sqlx::query(
                "DELETE FROM users WHERE login_id = ?1
                   AND NOT EXISTS (SELECT 1 FROM approval_request WHERE requester_id = users.id)
                   AND NOT EXISTS (SELECT 1 FROM approval_line WHERE approver_id = users.id)",
            )
            .bind(seed.login_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct SeedUser {
    login_id: &'static str,
    name: &'static str,
    password: &'static str,
    role_cd: &'static str,
}

fn sql_array_from_ids(ids: &[i64]) -> String {
    let joined = ids.iter().map(i64::to_string).collect::<Vec<_>>().join(",");
    format!("({joined})")
}

#[derive(Debug)]
pub struct SeedResult {
    pub users_created: Vec<&'static str>,
    pub customers: usize,
    pub products: usize,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
