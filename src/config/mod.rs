pub mod defaults;
pub mod resolver;

pub use defaults::{platform_default, platform_section, platform_sections, PLATFORM_DEFAULTS};
pub use resolver::{config_equals, ConfigContext, ConfigError, ConfigResolver, ResolvedConfig};
