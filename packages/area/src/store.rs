use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use area_types::{Area, AreaId, ComponentName, Credential, UserId};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("malformed area row {0}: {1}")]
    MalformedRow(i64, String),
}

/// Read-side view of the areas table. The HTTP API owns writes; the
/// supervisor only polls.
#[async_trait]
pub trait AreaStore: Send + Sync {
    async fn list_areas(&self) -> Result<Vec<Area>, StoreError>;
}

/// `resolve(user, service) -> credential or none`. Absence is a valid
/// result and means "forward a null token". Resolved fresh at every
/// firing - credentials are never cached inside the core.
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    async fn resolve(
        &self,
        user_id: UserId,
        service: &str,
    ) -> Result<Option<Credential>, StoreError>;
}

/// Postgres-backed store. Sessions are short-lived pool acquires; there is
/// no state here beyond the pool handle.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect(url)
            .await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl AreaStore for PgStore {
    async fn list_areas(&self) -> Result<Vec<Area>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, action_kind, reaction_kind, trigger_kind,
                   action_config, reaction_config, trigger_config
            FROM areas
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(area_from_row).collect()
    }
}

#[async_trait]
impl CredentialResolver for PgStore {
    async fn resolve(
        &self,
        user_id: UserId,
        service: &str,
    ) -> Result<Option<Credential>, StoreError> {
        let token: Option<Option<String>> = sqlx::query_scalar(
            r#"
            SELECT us.access_token
            FROM user_services us
            JOIN services s ON s.id = us.service_id
            WHERE us.user_id = $1 AND s.name = $2
            "#,
        )
        .bind(user_id.inner())
        .bind(service)
        .fetch_optional(&self.pool)
        .await?;

        Ok(token.flatten().map(Credential::new))
    }
}

fn area_from_row(row: sqlx::postgres::PgRow) -> Result<Area, StoreError> {
    let id: i64 = row.try_get("id")?;

    let component = |column: &str| -> Result<ComponentName, StoreError> {
        let raw: String = row.try_get(column)?;
        ComponentName::new(raw.clone())
            .map_err(|e| StoreError::MalformedRow(id, format!("{column} `{raw}`: {e}")))
    };

    let config = |column: &str| -> Result<serde_json::Map<String, serde_json::Value>, StoreError> {
        let raw: Option<serde_json::Value> = row.try_get(column)?;
        Ok(raw
            .and_then(|v| v.as_object().cloned())
            .unwrap_or_default())
    };

    let trigger: Option<String> = row.try_get("trigger_kind")?;
    let trigger = trigger
        .map(|raw| {
            ComponentName::new(raw.clone())
                .map_err(|e| StoreError::MalformedRow(id, format!("trigger_kind `{raw}`: {e}")))
        })
        .transpose()?;

    Ok(Area {
        id: AreaId::new(id),
        user_id: UserId::new(row.try_get("user_id")?),
        action: component("action_kind")?,
        reaction: component("reaction_kind")?,
        trigger,
        action_config: config("action_config")?,
        reaction_config: config("reaction_config")?,
        trigger_config: config("trigger_config")?,
    })
}

#[derive(Default)]
struct MemoryStoreInner {
    areas: BTreeMap<AreaId, Area>,
    credentials: HashMap<(UserId, String), Credential>,
}

/// In-process store used by the integration tests: areas and credentials
/// can be mutated mid-run to exercise the supervisor's reconciliation.
#[derive(Default, Clone)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryStoreInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_area(&self, area: Area) {
        self.inner.write().unwrap().areas.insert(area.id, area);
    }

    pub fn remove_area(&self, id: AreaId) {
        self.inner.write().unwrap().areas.remove(&id);
    }

    pub fn set_credential(&self, user_id: UserId, service: &str, credential: Credential) {
        self.inner
            .write()
            .unwrap()
            .credentials
            .insert((user_id, service.to_string()), credential);
    }
}

#[async_trait]
impl AreaStore for MemoryStore {
    async fn list_areas(&self) -> Result<Vec<Area>, StoreError> {
        Ok(self.inner.read().unwrap().areas.values().cloned().collect())
    }
}

#[async_trait]
impl CredentialResolver for MemoryStore {
    async fn resolve(
        &self,
        user_id: UserId,
        service: &str,
    ) -> Result<Option<Credential>, StoreError> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .credentials
            .get(&(user_id, service.to_string()))
            .cloned())
    }
}
