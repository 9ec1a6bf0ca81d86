use sqlx::PgPool;

#[derive(Clone)]
pub struct SqlxMetadataRepo {
    pub pool: PgPool,
}

#[derive(Clone)]
pub struct SqlxContentRepo {
    pub pool: PgPool,
}
