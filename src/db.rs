use crate::api_error::ApiError;
use diesel::pg::PgConnection;
use diesel::r2d2::ConnectionManager;
use std::env;

type Pool = r2d2::Pool<ConnectionManager<PgConnection>>;
pub type DbConnection = r2d2::PooledConnection<ConnectionManager<PgConnection>>;

embed_migrations!();

lazy_static! {
    static ref POOL: Pool = {
        let db_url = env::var("DATABASE_URL").unwrap_or_default();
        let manager = ConnectionManager::<PgConnection>::new(db_url);
        Pool::builder().build_unchecked(manager)
    };
}

/// Opens the pool and brings the schema up to date.
pub fn init() -> Result<(), ApiError> {
    info!("Initializing DB");
    lazy_static::initialize(&POOL);
    let conn = connection()?;
    embedded_migrations::run(&conn)
        .map_err(|e| ApiError::new(500, format!("Failed running migrations: {}", e)))?;
    Ok(())
}

pub fn connection() -> Result<DbConnection, ApiError> {
    POOL.get()
        .map_err(|e| ApiError::new(500, format!("Failed getting db connection: {}", e)))
}
