//!
//! Host bundle
//!
//! A `Host` groups the configured thread manager and TLS registry. Rust
//! callers build one with `Host::new` and pass it where it is needed.
//!
//! The C ABI has no place to carry one, so it runs against a process-wide
//! instance: `install_host` sets it before first use, otherwise
//! `default_host` builds one from `HostConfig::default()` on first call.
//!

use std::ffi::{c_char, CStr};
use std::path::Path;
use std::sync::OnceLock;

use hostrt_core::{init_logging, load_config, ConfigError, HostConfig};

use crate::thread::ThreadManager;
use crate::tls::TlsRegistry;

pub struct Host {
    config: HostConfig,
    pub threads: ThreadManager,
    pub tls: TlsRegistry,
}

impl Host {
    pub fn new(config: HostConfig) -> Self {
        Self {
            threads: ThreadManager::new(config.threads.clone()),
            tls: TlsRegistry::new(&config.tls),
            config,
        }
    }

    pub fn from_config_file(path: &Path) -> Result<Self, ConfigError> {
        Ok(Self::new(load_config(path)?))
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }
}

impl Default for Host {
    fn default() -> Self {
        Self::new(HostConfig::default())
    }
}

static DEFAULT_HOST: OnceLock<Host> = OnceLock::new();

/// Install the host the C ABI runs against. Fails, returning `host`, if one
/// is already in use.
pub fn install_host(host: Host) -> Result<(), Host> {
    DEFAULT_HOST.set(host)
}

pub fn default_host() -> &'static Host {
    DEFAULT_HOST.get_or_init(Host::default)
}

/// Load the TOML config at `path` (defaults when null), start logging and
/// install the host. Returns 0, `-EINVAL` for a bad config or `-EBUSY` if a
/// host is already installed.
///
/// # Safety
/// `path` must be null or a valid NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hostrt_host_init(path: *const c_char) -> i32 {
    let config = if path.is_null() {
        Ok(HostConfig::default())
    } else {
        let path = unsafe { CStr::from_ptr(path) }.to_string_lossy().into_owned();
        load_config(Path::new(&path))
    };
    let config = match config {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(op = "host_init", "{}", err);
            return -libc::EINVAL;
        }
    };

    if let Err(err) = init_logging(&config.log) {
        tracing::warn!(op = "host_init", "{}", err);
        return -libc::EINVAL;
    }

    match install_host(Host::new(config)) {
        Ok(()) => {
            tracing::debug!("host installed");
            0
        }
        Err(_) => -libc::EBUSY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostrt_core::{parse_config_str, TlsConfig};

    #[test]
    fn test_host_from_config() {
        let config = parse_config_str("[tls]\nmax_keys = 1\n[threads]\nname_prefix = \"k\"\n").unwrap();
        let host = Host::new(config);

        assert_eq!(host.config().tls, TlsConfig { max_keys: 1 });
        assert_eq!(host.config().threads.name_prefix, "k");

        let _key = host.tls.allocate(None).unwrap();
        assert!(host.tls.allocate(None).is_err());
        assert_eq!(host.threads.joinable_count().unwrap(), 0);
    }

    #[test]
    fn test_default_host_is_shared() {
        let a = default_host() as *const Host;
        let b = default_host() as *const Host;
        assert_eq!(a, b);
        assert!(install_host(Host::default()).is_err());
        assert_eq!(unsafe { hostrt_host_init(std::ptr::null()) }, -libc::EBUSY);
    }
}
