use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;

/// Event record in the database. `is_free` is derived from `price` and is
/// rewritten on every write path.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: i64,
    pub title: String,
    pub sport: String,
    pub description: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub datetime: OffsetDateTime,
    pub address: Option<String>,
    pub capacity: i32,
    pub price: i32,
    pub is_free: bool,
    pub user_id: i64,
    pub image_url: Option<String>,
}

/// Fields for a new event; the owner is the authenticated caller.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub title: String,
    pub sport: String,
    pub description: Option<String>,
    pub datetime: OffsetDateTime,
    pub address: String,
    pub capacity: i32,
    pub price: i32,
    pub image_url: Option<String>,
}

impl Event {
    pub async fn list_all(db: &PgPool) -> anyhow::Result<Vec<Event>> {
        let rows = sqlx::query_as::<_, Event>(
            r#"
            SELECT id, title, sport, description, datetime, address,
                   capacity, price, is_free, user_id, image_url
            FROM events
            ORDER BY id
            "#,
        )
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn find_by_id(db: &PgPool, id: i64) -> anyhow::Result<Option<Event>> {
        let event = sqlx::query_as::<_, Event>(
            r#"
            SELECT id, title, sport, description, datetime, address,
                   capacity, price, is_free, user_id, image_url
            FROM events
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(event)
    }

    pub async fn create(db: &PgPool, owner_id: i64, new: &NewEvent) -> anyhow::Result<Event> {
        let event = sqlx::query_as::<_, Event>(
            r#"
            INSERT INTO events (title, sport, description, datetime, address,
                                capacity, price, is_free, user_id, image_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id, title, sport, description, datetime, address,
                      capacity, price, is_free, user_id, image_url
            "#,
        )
        .bind(&new.title)
        .bind(&new.sport)
        .bind(new.description.as_deref())
        .bind(new.datetime)
        .bind(&new.address)
        .bind(new.capacity)
        .bind(new.price)
        .bind(new.price == 0)
        .bind(owner_id)
        .bind(new.image_url.as_deref())
        .fetch_one(db)
        .await?;
        Ok(event)
    }

    /// Persist the current in-memory state of a patched event.
    /// `is_free` is written from `price`, never from the stored value.
    pub async fn update(&self, db: &PgPool) -> anyhow::Result<Event> {
        let event = sqlx::query_as::<_, Event>(
            r#"
            UPDATE events
            SET title = $2, sport = $3, description = $4, datetime = $5,
                address = $6, capacity = $7, price = $8, is_free = $9
            WHERE id = $1
            RETURNING id, title, sport, description, datetime, address,
                      capacity, price, is_free, user_id, image_url
            "#,
        )
        .bind(self.id)
        .bind(&self.title)
        .bind(&self.sport)
        .bind(self.description.as_deref())
        .bind(self.datetime)
        .bind(self.address.as_deref())
        .bind(self.capacity)
        .bind(self.price)
        .bind(self.price == 0)
        .fetch_one(db)
        .await?;
        Ok(event)
    }

    pub async fn delete(db: &PgPool, id: i64) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }
}
