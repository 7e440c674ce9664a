//! Core engine of a PL/pgSQL language server: rewrites embedded SQL into
//! executable parameterized statements, validates them against a live
//! Postgres session, and maps reported errors back onto the source
//! document. The editor transport layer lives elsewhere and consumes the
//! diagnostics produced here.

pub mod check;
pub mod error;
pub mod migrate;
pub mod params;
pub mod position;
pub mod session;
pub mod settings;
pub mod split;
pub mod validate;

pub use params::{resolve_parameter_info, sanitize_statement, QueryParameterInfo};
pub use session::{PgSession, PooledSession, SessionPool, ValidatorSession};
pub use settings::Settings;
pub use validate::{validate_document, ValidateOptions};
