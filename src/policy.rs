use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::PoisonError;

use tracing::{debug, info};

use retrobus_core::bus;
use retrobus_core::{nullhandler, ExceptionHandler, Fault};

use crate::guards::{self, Collected, Exit};

/// How the outermost layer of an application treats failures.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(default)]
pub struct ErrorPolicy {
    /// Let bus errors escape unchanged instead of turning them into an exit.
    pub debug: bool,
    /// Collect errors raised by individual work items and carry on.
    pub keep_going: bool,
    /// Status used when a bus error terminates the application.
    pub exit_code: i32,
}

impl Default for ErrorPolicy {
    fn default() -> Self {
        Self {
            debug: false,
            keep_going: false,
            exit_code: 1,
        }
    }
}

/// Handlers assembled by [`ErrorPolicy::handlers`].
#[derive(Debug, Clone)]
pub struct PolicyHandlers {
    /// Guards the whole run.
    pub main: ExceptionHandler,
    /// Guards a single work item inside the run.
    pub nested: ExceptionHandler,
}

impl ErrorPolicy {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Failed to parse error policy")
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize error policy to TOML")
    }

    /// Load the policy at `path`, or the default one if the file does not exist.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "no error policy file, using defaults");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read error policy: {}", path.display()))?;

        Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to load error policy: {}", path.display()))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = self.to_toml_string()?;

        fs::write(&path, contents).with_context(|| {
            format!("Failed to write error policy: {}", path.as_ref().display())
        })?;

        Ok(())
    }

    /// Assemble the main and nested handlers around `core`.
    ///
    /// `core` is usually the bus's error handler, so events are published
    /// before the policy decides what happens to the fault. With
    /// `keep_going`, the nested handler stores bus errors in `errors`;
    /// otherwise it lets everything through to the main handler.
    pub fn handlers(&self, core: &ExceptionHandler, errors: Collected) -> PolicyHandlers {
        let terminal = if self.debug {
            nullhandler()
        } else {
            guards::exit_on::<bus::Error>(self.exit_code)
        };
        let nested = if self.keep_going {
            core.then(&guards::collect(errors))
        } else {
            nullhandler()
        };
        debug!(policy = ?self, "assembled error handlers");

        PolicyHandlers {
            main: core.then(&terminal),
            nested,
        }
    }

    /// Finish a run: fail with [`Exit`] if any errors were collected.
    pub fn conclude(&self, errors: &Collected) -> Result<(), Fault> {
        let count = errors.lock().unwrap_or_else(PoisonError::into_inner).len();
        if count == 0 {
            return Ok(());
        }
        info!(count, code = self.exit_code, "run finished with errors");
        Err(Exit::new(self.exit_code).into())
    }
}
