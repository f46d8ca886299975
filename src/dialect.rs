//! Static per-dialect metadata consulted by connections.

use clap::ValueEnum;

use crate::sql_text::is_select_like;

/// SQL dialects the session layer knows something about.
///
/// Parsed case-insensitively from the names drivers report (`"postgresql"` and `"postgres"`
/// both resolve to [`Dialect::Postgres`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Dialect {
    Sqlite,
    #[value(alias = "postgresql")]
    Postgres,
    Duckdb,
    Mysql,
    Mariadb,
    #[value(alias = "tsql", alias = "sqlserver")]
    Mssql,
    Oracle,
    Snowflake,
    Bigquery,
    Redshift,
    Clickhouse,
    Teradata,
    Hive,
    Spark,
    Databricks,
    #[value(alias = "presto")]
    Trino,
}

impl Dialect {
    /// Resolve a driver-reported dialect name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        <Self as ValueEnum>::from_str(name.trim(), true).ok()
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Dialect::Sqlite => "sqlite",
            Dialect::Postgres => "postgres",
            Dialect::Duckdb => "duckdb",
            Dialect::Mysql => "mysql",
            Dialect::Mariadb => "mariadb",
            Dialect::Mssql => "mssql",
            Dialect::Oracle => "oracle",
            Dialect::Snowflake => "snowflake",
            Dialect::Bigquery => "bigquery",
            Dialect::Redshift => "redshift",
            Dialect::Clickhouse => "clickhouse",
            Dialect::Teradata => "teradata",
            Dialect::Hive => "hive",
            Dialect::Spark => "spark",
            Dialect::Databricks => "databricks",
            Dialect::Trino => "trino",
        }
    }
}

/// How a connection makes statements durable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitStrategy {
    /// The backend runs in a native auto-commit isolation mode.
    NativeIsolation,
    /// The connection issues a commit after each statement.
    ManualCommit,
    /// Nothing is committed by the session layer.
    None,
}

/// Capabilities and commit rules for one dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialectPolicy {
    pub dialect: Option<Dialect>,
    /// CTE names may be wrapped in backticks.
    pub backtick_identifiers: bool,
    /// Engines that reject `COMMIT` inside some statement types; manual commit is never
    /// issued for them.
    pub commit_blacklisted: bool,
    /// Committing after a `SELECT` empties the pending result buffer.
    pub commit_clears_select_results: bool,
    /// The engine form shares one cursor between all result sets of a connection.
    pub single_live_cursor: bool,
    /// Result sets closed by the driver must be re-run before fetching again.
    pub closed_cursors_need_refresh: bool,
}

impl DialectPolicy {
    const DEFAULT: DialectPolicy = DialectPolicy {
        dialect: None,
        backtick_identifiers: false,
        commit_blacklisted: false,
        commit_clears_select_results: false,
        single_live_cursor: false,
        closed_cursors_need_refresh: false,
    };

    /// Policy for a dialect name as reported by a driver; unknown or missing names get
    /// the conservative default (no backticks, manual commit allowed, independent cursors).
    #[must_use]
    pub fn lookup(name: Option<&str>) -> Self {
        name.and_then(Dialect::parse)
            .map_or(Self::DEFAULT, Self::for_dialect)
    }

    #[must_use]
    pub fn for_dialect(dialect: Dialect) -> Self {
        let backtick_identifiers = matches!(
            dialect,
            Dialect::Sqlite
                | Dialect::Mysql
                | Dialect::Mariadb
                | Dialect::Bigquery
                | Dialect::Clickhouse
                | Dialect::Hive
                | Dialect::Spark
                | Dialect::Databricks
        );
        DialectPolicy {
            dialect: Some(dialect),
            backtick_identifiers,
            commit_blacklisted: matches!(
                dialect,
                Dialect::Mssql | Dialect::Clickhouse | Dialect::Teradata
            ),
            commit_clears_select_results: dialect == Dialect::Duckdb,
            single_live_cursor: dialect == Dialect::Duckdb,
            closed_cursors_need_refresh: dialect == Dialect::Mssql,
        }
    }

    /// Whether the manual commit after `statement` must be skipped.
    #[must_use]
    pub fn suppress_commit_for(&self, statement: &str) -> bool {
        self.commit_blacklisted
            || (self.commit_clears_select_results && is_select_like(statement))
    }

    /// Whether cursors closed by the driver are re-run, given the driver's name.
    ///
    /// Only ODBC drivers for SQL Server lose closed result sets.
    #[must_use]
    pub fn refreshes_closed_cursors(&self, driver: Option<&str>) -> bool {
        self.closed_cursors_need_refresh
            && driver.is_some_and(|d| d.to_ascii_lowercase().contains("odbc"))
    }

    /// Resolve the commit strategy of an engine-form connection.
    ///
    /// `native_isolation` is the outcome of trying to switch the backend to native
    /// auto-commit (attempted only when auto-commit was requested).
    #[must_use]
    pub fn engine_commit_strategy(
        &self,
        autocommit: bool,
        native_isolation: bool,
    ) -> CommitStrategy {
        if !autocommit {
            CommitStrategy::None
        } else if native_isolation {
            CommitStrategy::NativeIsolation
        } else if self.commit_blacklisted {
            CommitStrategy::None
        } else {
            CommitStrategy::ManualCommit
        }
    }

    /// Raw-driver connections commit manually whenever auto-commit is requested;
    /// blacklisted dialects still skip each commit through [`Self::suppress_commit_for`].
    #[must_use]
    pub fn raw_commit_strategy(&self, autocommit: bool) -> CommitStrategy {
        if autocommit {
            CommitStrategy::ManualCommit
        } else {
            CommitStrategy::None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_resolve_case_insensitively() {
        assert_eq!(Dialect::parse("PostgreSQL"), Some(Dialect::Postgres));
        assert_eq!(Dialect::parse("duckdb"), Some(Dialect::Duckdb));
        assert_eq!(Dialect::parse("tsql"), Some(Dialect::Mssql));
        assert_eq!(Dialect::parse("notadb"), None);
    }

    #[test]
    fn commit_blacklist_wins_over_manual_commit() {
        let mssql = DialectPolicy::lookup(Some("mssql"));
        assert_eq!(
            mssql.engine_commit_strategy(true, false),
            CommitStrategy::None
        );
        assert!(mssql.suppress_commit_for("INSERT INTO t VALUES (1)"));

        let pg = DialectPolicy::lookup(Some("postgresql"));
        assert_eq!(
            pg.engine_commit_strategy(true, false),
            CommitStrategy::ManualCommit
        );
        assert_eq!(
            pg.engine_commit_strategy(true, true),
            CommitStrategy::NativeIsolation
        );
        assert_eq!(pg.engine_commit_strategy(false, false), CommitStrategy::None);
    }

    #[test]
    fn duckdb_selects_skip_commit() {
        let duck = DialectPolicy::lookup(Some("duckdb"));
        assert!(duck.suppress_commit_for("  select 1"));
        assert!(duck.suppress_commit_for("FROM t"));
        assert!(!duck.suppress_commit_for("create table t (x int)"));
        assert!(duck.single_live_cursor);
    }

    #[test]
    fn unknown_dialects_are_conservative() {
        let policy = DialectPolicy::lookup(None);
        assert!(!policy.backtick_identifiers);
        assert!(!policy.single_live_cursor);
        assert_eq!(policy.raw_commit_strategy(true), CommitStrategy::ManualCommit);
        assert!(DialectPolicy::lookup(Some("mysql")).backtick_identifiers);
    }

    #[test]
    fn only_odbc_drivers_refresh_closed_cursors() {
        let mssql = DialectPolicy::lookup(Some("mssql"));
        assert!(mssql.refreshes_closed_cursors(Some("pyodbc")));
        assert!(!mssql.refreshes_closed_cursors(Some("tiberius")));
    }
}
