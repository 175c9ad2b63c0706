use std::error::Error as StdError;

use serde::{Deserialize, Serialize};
use tokio_postgres::{
    types::{
        accepts, private::BytesMut, to_sql_checked, FromSql, IsNull, ToSql,
        Type,
    },
    Error,
};
use uuid::Uuid;

use super::Client;

/// A staff account. There is a single capability level: holding a valid
/// session grants access to every staff operation.
#[derive(Clone, Debug)]
pub struct User {
    pub id: Id,
    pub name: String,
    pub login: String,
    pub password_hash: PasswordHash,
}

#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize,
)]
pub struct Id(Uuid);

impl Id {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl From<u128> for Id {
    fn from(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }
}

impl FromSql<'_> for Id {
    accepts!(UUID);

    fn from_sql(
        ty: &Type,
        raw: &[u8],
    ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        Uuid::from_sql(ty, raw).map(Self)
    }
}

impl ToSql for Id {
    accepts!(UUID);

    to_sql_checked!();

    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn StdError + Sync + Send>> {
        self.0.to_sql(ty, out)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PasswordHash(String);

impl PasswordHash {
    pub fn new(secret: &str) -> Self {
        // TODO: Use real hash function.
        Self(secret.to_string())
    }
}

impl FromSql<'_> for PasswordHash {
    accepts!(TEXT);

    fn from_sql(
        ty: &Type,
        raw: &[u8],
    ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        String::from_sql(ty, raw).map(Self)
    }
}

impl ToSql for PasswordHash {
    accepts!(TEXT);

    to_sql_checked!();

    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn StdError + Sync + Send>> {
        self.0.to_sql(ty, out)
    }
}

impl Client {
    pub async fn get_user_by_login(
        &self,
        login: &str,
    ) -> Result<Option<User>, Error> {
        const SQL: &str = "SELECT id, name, login, password_hash \
                           FROM staff \
                           WHERE login = $1 \
                           LIMIT 1";
        Ok(self.inner.query_opt(SQL, &[&login]).await?.map(|row| User {
            id: row.get("id"),
            name: row.get("name"),
            login: row.get("login"),
            password_hash: row.get("password_hash"),
        }))
    }

    pub async fn get_user_by_id(&self, id: Id) -> Result<Option<User>, Error> {
        const SQL: &str = "SELECT id, name, login, password_hash \
                           FROM staff \
                           WHERE id = $1 \
                           LIMIT 1";
        Ok(self.inner.query_opt(SQL, &[&id]).await?.map(|row| User {
            id: row.get("id"),
            name: row.get("name"),
            login: row.get("login"),
            password_hash: row.get("password_hash"),
        }))
    }
}
