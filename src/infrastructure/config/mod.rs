mod settings;

pub use settings::{
    ApiConfig, DatabaseConfig, DispatchConfig, LoggingConfig, OtelConfig, ProviderConfig, RedisConfig,
    RegistryConfig, ServerConfig, Settings,
};
