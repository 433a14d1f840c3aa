//! Build lifecycle hooks.

use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::build_config::{BuildConfig, BuildOptions};
use crate::bundler::BuildReport;
use crate::package::Package;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookName {
    /// Before synthesis; may mutate the bundler option overrides.
    Extend,
    /// After synthesis; may mutate the synthesized configurations.
    ExtendConfig,
    /// After one configuration has been written.
    Done,
}

impl HookName {
    pub const ALL: [HookName; 3] = [HookName::Extend, HookName::ExtendConfig, HookName::Done];

    pub fn as_str(&self) -> &'static str {
        match self {
            HookName::Extend => "build:extend",
            HookName::ExtendConfig => "build:extendRollup",
            HookName::Done => "build:done",
        }
    }
}

impl fmt::Display for HookName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HookName {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        HookName::ALL
            .into_iter()
            .find(|hook| hook.as_str() == s)
            .ok_or_else(|| format!("unknown hook `{}`", s))
    }
}

/// The value each hook receives. Exactly one shape per [`HookName`].
pub enum HookPayload<'a> {
    Extend(&'a mut BuildOptions),
    ExtendConfig(&'a mut Vec<BuildConfig>),
    Done(&'a BuildReport),
}

impl HookPayload<'_> {
    pub fn name(&self) -> HookName {
        match self {
            HookPayload::Extend(_) => HookName::Extend,
            HookPayload::ExtendConfig(_) => HookName::ExtendConfig,
            HookPayload::Done(_) => HookName::Done,
        }
    }
}

pub type HookError = Box<dyn std::error::Error + Send + Sync>;
pub type HookResult = std::result::Result<(), HookError>;
pub type HookHandler = Arc<dyn Fn(&Package, &mut HookPayload<'_>) -> HookResult + Send + Sync>;

/// Shell commands registered for a hook in a config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandList {
    One(String),
    Many(Vec<String>),
}

impl CommandList {
    pub fn commands(&self) -> Vec<&str> {
        match self {
            CommandList::One(command) => vec![command.as_str()],
            CommandList::Many(commands) => commands.iter().map(String::as_str).collect(),
        }
    }
}

/// Registered in-process handlers, keyed by hook.
#[derive(Clone, Default)]
pub struct Hooks {
    handlers: HashMap<HookName, Vec<HookHandler>>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<&str, usize> = self
            .handlers
            .iter()
            .map(|(name, handlers)| (name.as_str(), handlers.len()))
            .collect();
        f.debug_struct("Hooks").field("handlers", &counts).finish()
    }
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: HookName, handler: F)
    where
        F: Fn(&Package, &mut HookPayload<'_>) -> HookResult + Send + Sync + 'static,
    {
        self.handlers.entry(name).or_default().push(Arc::new(handler));
    }

    pub fn register_all(&mut self, name: HookName, handlers: impl IntoIterator<Item = HookHandler>) {
        self.handlers.entry(name).or_default().extend(handlers);
    }

    pub fn handlers(&self, name: HookName) -> &[HookHandler] {
        self.handlers.get(&name).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.values().all(Vec::is_empty)
    }

    /// Runs every handler for the payload's hook.
    ///
    /// A failing or panicking handler is logged and the remaining handlers
    /// still run. Returns the number of handlers that failed.
    pub fn dispatch(&self, package: &Package, payload: &mut HookPayload<'_>) -> usize {
        let name = payload.name();
        let mut failures = 0;
        for handler in self.handlers(name) {
            let outcome = catch_unwind(AssertUnwindSafe(|| handler(package, payload)));
            let message = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(panic) => panic_message(panic.as_ref()),
            };
            failures += 1;
            warn!(
                package = %package.name(),
                hook = %name,
                "Couldn't run hook for {}: {}",
                package.name(),
                message
            );
        }
        failures
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "hook panicked".to_string()
    }
}
