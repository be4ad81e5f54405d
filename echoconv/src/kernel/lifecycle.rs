use super::ConfigError;

/// Constructor validation lifecycle shared by kernel structs.
///
/// Every kernel in this crate is built from a plain config value, so a rejected config never
/// leaves a half-built kernel behind.
pub trait KernelLifecycle: Sized {
    /// Kernel config type.
    type Config;

    /// Construct a validated kernel from config.
    fn try_new(config: Self::Config) -> Result<Self, ConfigError>;
}
