use serde::Serialize;
use time::OffsetDateTime;

use crate::users::repo::User;

/// Public part of the user returned to the client. Never carries the
/// password hash.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub level: i32,
    pub avatar_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            name: u.name,
            level: u.level,
            avatar_url: u.avatar_url,
            created_at: u.created_at,
        }
    }
}
