use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use sqlx::{error::ErrorKind, PgPool};
use uuid::Uuid;

use super::{ProfileRepository, RepositoryError};
use crate::domain::{Gender, ProfileDetails, ProfileRecord, Profession, SubscriptionPlan};

const PROFILE_COLUMNS: &str = r#"
    id, username, credential_hash, profession, company_name, address_line1,
    country, state, city, subscription_plan, newsletter, gender, custom_gender,
    profile_photo, created_at, updated_at
"#;

pub struct PostgresProfileRepository {
    pool: PgPool,
}

impl PostgresProfileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row for profile
#[derive(Debug, sqlx::FromRow)]
struct ProfileRow {
    id: Uuid,
    username: String,
    credential_hash: String,
    profession: String,
    company_name: Option<String>,
    address_line1: String,
    country: String,
    state: String,
    city: String,
    subscription_plan: String,
    newsletter: bool,
    gender: String,
    custom_gender: Option<String>,
    profile_photo: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProfileRow> for ProfileRecord {
    type Error = RepositoryError;

    fn try_from(row: ProfileRow) -> Result<Self, Self::Error> {
        let unexpected = |column: &str, value: &str| {
            RepositoryError::Unexpected(format!("Unknown {column} value {value:?} in profiles"))
        };

        let profession =
            Profession::parse(&row.profession).ok_or_else(|| unexpected("profession", &row.profession))?;
        let subscription_plan = SubscriptionPlan::parse(&row.subscription_plan)
            .ok_or_else(|| unexpected("subscription_plan", &row.subscription_plan))?;
        let gender = Gender::parse(&row.gender).ok_or_else(|| unexpected("gender", &row.gender))?;

        Ok(Self {
            id: row.id,
            username: row.username,
            credential_hash: SecretString::new(row.credential_hash),
            details: ProfileDetails {
                profession,
                company_name: row.company_name,
                address_line1: row.address_line1,
                country: row.country,
                state: row.state,
                city: row.city,
                subscription_plan,
                newsletter: row.newsletter,
                gender,
                custom_gender: row.custom_gender,
            },
            profile_photo: row.profile_photo,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn map_write_error(e: sqlx::Error) -> RepositoryError {
    let kind = e.as_database_error().map(|db_err| db_err.kind());
    write_error_from_kind(kind, e.to_string())
}

/// The `profiles` table has a single unique constraint, on `username`.
fn write_error_from_kind(kind: Option<ErrorKind>, message: String) -> RepositoryError {
    match kind {
        Some(ErrorKind::UniqueViolation) => RepositoryError::UsernameTaken,
        _ => RepositoryError::Unexpected(message),
    }
}

#[async_trait::async_trait]
impl ProfileRepository for PostgresProfileRepository {
    #[tracing::instrument(name = "Loading profile from PostgreSQL", skip(self))]
    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<ProfileRecord>, RepositoryError> {
        let row = sqlx::query_as::<_, ProfileRow>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryError::Unexpected(e.to_string()))?;

        row.map(ProfileRecord::try_from).transpose()
    }

    #[tracing::instrument(name = "Checking username in PostgreSQL", skip(self))]
    async fn username_exists(&self, username: &str) -> Result<bool, RepositoryError> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM profiles WHERE username = $1)")
            .bind(username)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RepositoryError::Unexpected(e.to_string()))
    }

    #[tracing::instrument(name = "Adding profile to PostgreSQL", skip_all, fields(username = %record.username))]
    async fn insert(&self, record: &ProfileRecord) -> Result<(), RepositoryError> {
        let d = &record.details;
        sqlx::query(
            r#"
            INSERT INTO profiles (
                id, username, credential_hash, profession, company_name, address_line1,
                country, state, city, subscription_plan, newsletter, gender, custom_gender,
                profile_photo, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(record.id)
        .bind(&record.username)
        .bind(record.credential_hash.expose_secret())
        .bind(d.profession.as_str())
        .bind(&d.company_name)
        .bind(&d.address_line1)
        .bind(&d.country)
        .bind(&d.state)
        .bind(&d.city)
        .bind(d.subscription_plan.as_str())
        .bind(d.newsletter)
        .bind(d.gender.as_str())
        .bind(&d.custom_gender)
        .bind(&record.profile_photo)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        Ok(())
    }

    #[tracing::instrument(name = "Updating profile in PostgreSQL", skip_all, fields(username = %record.username))]
    async fn update(
        &self,
        record: &ProfileRecord,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let d = &record.details;
        let result = sqlx::query(
            r#"
            UPDATE profiles SET
                credential_hash = $2,
                profession = $3,
                company_name = $4,
                address_line1 = $5,
                country = $6,
                state = $7,
                city = $8,
                subscription_plan = $9,
                newsletter = $10,
                gender = $11,
                custom_gender = $12,
                profile_photo = $13,
                updated_at = $14
            WHERE username = $1 AND updated_at = $15
            "#,
        )
        .bind(&record.username)
        .bind(record.credential_hash.expose_secret())
        .bind(d.profession.as_str())
        .bind(&d.company_name)
        .bind(&d.address_line1)
        .bind(&d.country)
        .bind(&d.state)
        .bind(&d.city)
        .bind(d.subscription_plan.as_str())
        .bind(d.newsletter)
        .bind(d.gender.as_str())
        .bind(&d.custom_gender)
        .bind(&record.profile_photo)
        .bind(record.updated_at)
        .bind(expected_updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        if result.rows_affected() == 0 {
            return if self.username_exists(&record.username).await? {
                Err(RepositoryError::StaleWrite)
            } else {
                Err(RepositoryError::NotFound)
            };
        }

        Ok(())
    }

    async fn health_check(&self) -> bool {
        crate::db::health_check(&self.pool).await
    }
}
