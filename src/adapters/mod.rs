// Adapters layer: concrete implementations for external systems. The only
// one today is the tiberius-backed SQL Server session.

pub mod mssql;
