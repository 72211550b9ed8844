pub use self::parser::{
    Config, DatabaseConfig, DbType, LoggingConfig, ResolverConfig, ServerConfig,
    DEFAULT_CONFIG_PATH,
};
pub use self::validator::ConfigError;

mod parser;
mod validator;
