pub mod query_timeout;
pub mod rewarddb;

use sqlx::{Pool, Postgres};

#[derive(Debug, Clone)]
pub struct DBClient {
    pub pool: Pool<Postgres>,
}

impl DBClient {
    pub fn new(pool: Pool<Postgres>) -> Self {
        DBClient { pool }
    }
}
