pub mod email;
pub mod event;
pub mod id;
/// Database schema
pub mod schema;
pub mod submission;
pub mod user;

use std::time::{Duration, Instant};

use diesel::connection::{
    DefaultLoadingMode, LoadConnection, TransactionManager,
};
use diesel::expression::QueryMetadata;
use diesel::migration::{MigrationConnection, CREATE_MIGRATIONS_TABLE};
use diesel::query_builder::Query;
use diesel::{
    connection::{
        AnsiTransactionManager, ConnectionSealed, Instrumentation,
        InstrumentationEvent, SimpleConnection,
    },
    query_builder::{QueryFragment, QueryId},
    r2d2::{ConnectionManager, ManageConnection},
    sqlite::Sqlite,
    Connection, ConnectionResult, QueryResult, SqliteConnection,
};
use diesel::{sql_query, RunQueryDsl};
use rocket::{Build, Rocket};
use rocket_sync_db_pools::{database, Config, PoolResult, Poolable};

/// Name of the database in the `databases` table of the Rocket config.
pub const DATABASE_NAME: &str = "registrations";

/// Queries slower than this are logged at `warn` level.
const SLOW_QUERY: Duration = Duration::from_millis(250);

#[database("registrations")]
pub struct DbConn(DbWrapper);

/// A SQLite connection which emits `tracing` spans for every statement.
pub struct DbWrapper(SqliteConnection);

impl SimpleConnection for DbWrapper {
    #[tracing::instrument(skip(self, query))]
    fn batch_execute(&mut self, query: &str) -> QueryResult<()> {
        self.0.batch_execute(query)
    }
}

impl ConnectionSealed for DbWrapper {}

impl DbWrapper {
    /// Runs `f` in a transaction which takes the write lock up front, so
    /// that a read followed by a write cannot be invalidated by another
    /// writer in between.
    #[tracing::instrument(skip(self, f))]
    pub fn immediate_transaction<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Self) -> Result<T, E>,
        E: From<diesel::result::Error>,
    {
        AnsiTransactionManager::begin_transaction_sql(&mut *self, "BEGIN IMMEDIATE")?;
        match f(&mut *self) {
            Ok(value) => {
                AnsiTransactionManager::commit_transaction(&mut *self)?;
                Ok(value)
            }
            Err(e) => {
                AnsiTransactionManager::rollback_transaction(&mut *self)?;
                Err(e)
            }
        }
    }
}

impl Connection for DbWrapper {
    type Backend = Sqlite;
    type TransactionManager = AnsiTransactionManager;

    fn establish(database_url: &str) -> ConnectionResult<DbWrapper> {
        Ok(DbWrapper(SqliteConnection::establish(database_url)?))
    }

    #[tracing::instrument(skip(self, f))]
    fn transaction<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Self) -> Result<T, E>,
        E: From<diesel::result::Error>,
    {
        Self::TransactionManager::transaction(self, f)
    }

    fn execute_returning_count<T>(&mut self, source: &T) -> QueryResult<usize>
    where
        T: QueryFragment<Sqlite> + QueryId,
    {
        self.0.execute_returning_count(source)
    }

    fn transaction_state(&mut self) -> &mut Self::TransactionManager {
        self.0.transaction_state()
    }

    fn instrumentation(&mut self) -> &mut dyn Instrumentation {
        self.0.instrumentation()
    }

    fn set_instrumentation(&mut self, instrumentation: impl Instrumentation) {
        self.0.set_instrumentation(instrumentation)
    }
}

impl LoadConnection<DefaultLoadingMode> for DbWrapper {
    type Cursor<'conn, 'query>
        = <SqliteConnection as LoadConnection<DefaultLoadingMode>>::Cursor<
        'conn,
        'query,
    >
    where
        Self: 'conn;
    type Row<'conn, 'query>
        = <SqliteConnection as LoadConnection<DefaultLoadingMode>>::Row<
        'conn,
        'query,
    >
    where
        Self: 'conn;

    #[tracing::instrument(skip(self, source))]
    fn load<'conn, 'query, T>(
        &'conn mut self,
        source: T,
    ) -> QueryResult<Self::Cursor<'conn, 'query>>
    where
        T: Query + QueryFragment<Self::Backend> + QueryId + 'query,
        Self::Backend: QueryMetadata<T::SqlType>,
    {
        self.0.load(source)
    }
}

impl MigrationConnection for DbWrapper {
    fn setup(&mut self) -> QueryResult<usize> {
        sql_query(CREATE_MIGRATIONS_TABLE).execute(self)
    }
}

pub struct DbWrapperManager {
    manager: ConnectionManager<SqliteConnection>,
}

impl ManageConnection for DbWrapperManager {
    type Connection = DbWrapper;

    type Error = diesel::r2d2::Error;

    fn connect(&self) -> Result<Self::Connection, Self::Error> {
        self.manager.connect().map(DbWrapper)
    }

    fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        self.manager.is_valid(&mut conn.0)
    }

    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        self.manager.has_broken(&mut conn.0)
    }
}

/// Times each statement and reports failures and slow queries.
#[derive(Default)]
struct QueryTracer {
    started: Option<Instant>,
}

impl Instrumentation for QueryTracer {
    fn on_connection_event(&mut self, event: InstrumentationEvent<'_>) {
        match event {
            InstrumentationEvent::StartQuery { query, .. } => {
                tracing::trace!("running query {query}");
                self.started = Some(Instant::now());
            }
            InstrumentationEvent::FinishQuery { query, error, .. } => {
                let elapsed = self.started.take().map(|t| t.elapsed());
                if let Some(error) = error {
                    tracing::warn!(%error, "query failed: {query}");
                } else if let Some(elapsed) = elapsed {
                    if elapsed > SLOW_QUERY {
                        tracing::warn!(?elapsed, "slow query: {query}");
                    }
                }
            }
            _ => (),
        }
    }
}

impl Poolable for DbWrapper {
    type Manager = DbWrapperManager;

    type Error = std::convert::Infallible;

    fn pool(db_name: &str, rocket: &Rocket<Build>) -> PoolResult<Self> {
        use diesel::r2d2::{CustomizeConnection, Error, Pool};

        #[derive(Debug)]
        struct Customizer;

        impl CustomizeConnection<DbWrapper, Error> for Customizer {
            fn on_acquire(&self, conn: &mut DbWrapper) -> Result<(), Error> {
                conn.0.set_instrumentation(QueryTracer::default());

                conn.0
                    .batch_execute(
                        "\
                    PRAGMA journal_mode = WAL;\
                    PRAGMA busy_timeout = 5000;\
                    PRAGMA foreign_keys = ON;\
                ",
                    )
                    .map_err(Error::QueryError)?;

                Ok(())
            }
        }

        let config = Config::from(db_name, rocket)?;
        let manager = DbWrapperManager {
            manager: ConnectionManager::new(&config.url),
        };
        let pool = Pool::builder()
            .connection_customizer(Box::new(Customizer))
            .max_size(config.pool_size)
            .connection_timeout(Duration::from_secs(config.timeout as u64))
            .build(manager)?;

        Ok(pool)
    }
}
