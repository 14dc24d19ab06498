use crate::device::SelectorOverride;
use crate::error::{Error, Result};
use crate::executor::PanicStrategy;

#[derive(Debug, Clone)]
pub struct Config {
    /// Record submit/start/end timestamps on every event.
    pub enable_profiling: bool,
    pub selector: SelectorOverride,
    pub panic_strategy: PanicStrategy,

    pub pin_workers: bool,
    pub stack_size: Option<usize>,
    pub thread_name_prefix: String,

    /// Flat launches are split into `compute_units * flat_chunks_per_unit` tasks.
    pub flat_chunks_per_unit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enable_profiling: true,
            selector: SelectorOverride::none(),
            panic_strategy: PanicStrategy::default(),

            pin_workers: false,
            stack_size: Some(2 * 1024 * 1024),
            thread_name_prefix: "veda-cu".to_string(),

            flat_chunks_per_unit: 4,
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Defaults plus the device override from `SYCL_*` / `OCL_*`.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            selector: SelectorOverride::from_env()?,
            ..Self::default()
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.stack_size == Some(0) {
            return Err(Error::config("stack_size must be > 0"));
        }

        if self.flat_chunks_per_unit == 0 {
            return Err(Error::config("flat_chunks_per_unit must be > 0"));
        }

        if self.thread_name_prefix.contains('\0') {
            return Err(Error::config("thread_name_prefix must not contain NUL"));
        }

        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn enable_profiling(mut self, enable: bool) -> Self {
        self.config.enable_profiling = enable;
        self
    }

    pub fn selector(mut self, selector: SelectorOverride) -> Self {
        self.config.selector = selector;
        self
    }

    /// Shorthand for an explicit platform/device pair.
    pub fn device(mut self, platform: i64, device: i64) -> Self {
        self.config.selector = SelectorOverride::explicit(platform, device);
        self
    }

    pub fn panic_strategy(mut self, strategy: PanicStrategy) -> Self {
        self.config.panic_strategy = strategy;
        self
    }

    pub fn pin_workers(mut self, pin: bool) -> Self {
        self.config.pin_workers = pin;
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    pub fn thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    pub fn flat_chunks_per_unit(mut self, chunks: usize) -> Self {
        self.config.flat_chunks_per_unit = chunks;
        self
    }

    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
