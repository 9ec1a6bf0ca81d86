pub mod content;
pub mod metadata;
pub mod sqlx_repo;
