//! Handler registry and dispatch precedence.
//!
//! Handlers live in three tiers. Resolution tries them in a fixed order and
//! the first match wins:
//!
//! ```text
//! ┌───────────────────────────┐
//! │ 1. command   exact text   │  HashMap<name, handler>, latest wins
//! ├───────────────────────────┤
//! │ 2. regex     full match   │  registration order, first match fires
//! ├───────────────────────────┤
//! │ 3. global    fallback     │  only the first registered one runs
//! └───────────────────────────┘
//! ```
//!
//! Tiers 1 and 2 only apply when the event has non-empty text.
//!
//! The table is held in an [`ArcSwap`]. Every registration builds a new
//! table and swaps it in, so a dispatch that loaded the table earlier keeps
//! a consistent view.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::{debug, warn};

use crate::context::{Captures, HandlerContext};
use crate::handler::{BoxedHandler, HandlerResult, into_handler};
use crate::pattern::{CompiledPattern, Pattern, Registration, classify};

/// Which tier selected a handler.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    /// Exact command; holds the matched name.
    Command(String),
    /// Full-match regex; holds the pattern source.
    Regex(String),
    /// Global fallback.
    Global,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Command(name) => write!(f, "command:{name}"),
            Route::Regex(source) => write!(f, "regex:{source}"),
            Route::Global => f.write_str("global"),
        }
    }
}

/// The outcome of resolving an event's text against the table.
pub struct Resolved {
    pub route: Route,
    pub handler: BoxedHandler,
    pub captures: Option<Captures>,
}

impl fmt::Debug for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolved")
            .field("route", &self.route)
            .field("captures", &self.captures)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// RouteTable
// ============================================================================

/// An immutable snapshot of all registrations.
#[derive(Clone, Default)]
pub struct RouteTable {
    commands: HashMap<String, BoxedHandler>,
    regexes: Vec<(CompiledPattern, BoxedHandler)>,
    globals: Vec<BoxedHandler>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a classified registration.
    ///
    /// Command names get a `/`-prefixed alias unless they already start
    /// with `/`.
    pub fn add(&mut self, registration: Registration, handler: BoxedHandler) {
        match registration {
            Registration::Global => self.globals.push(handler),
            Registration::Command(names) => {
                for name in names {
                    let name = name.trim();
                    if name.is_empty() {
                        continue;
                    }
                    if !name.starts_with('/') {
                        self.commands.insert(format!("/{name}"), handler.clone());
                    }
                    self.commands.insert(name.to_string(), handler.clone());
                }
            }
            Registration::Regex(pattern) => self.regexes.push((pattern, handler)),
        }
    }

    /// Resolves `text` to at most one handler.
    pub fn resolve(&self, text: &str) -> Option<Resolved> {
        if !text.is_empty() {
            if let Some(handler) = self.commands.get(text) {
                return Some(Resolved {
                    route: Route::Command(text.to_string()),
                    handler: handler.clone(),
                    captures: None,
                });
            }

            for (pattern, handler) in &self.regexes {
                if let Some(caps) = pattern.full_match(text) {
                    return Some(Resolved {
                        route: Route::Regex(pattern.as_str().to_string()),
                        handler: handler.clone(),
                        captures: Some(Captures::from_regex(pattern.anchored(), &caps)),
                    });
                }
            }
        }

        self.globals.first().map(|handler| Resolved {
            route: Route::Global,
            handler: handler.clone(),
            captures: None,
        })
    }

    /// Number of command names, aliases included.
    pub fn command_count(&self) -> usize {
        self.commands.len()
    }

    pub fn regex_count(&self) -> usize {
        self.regexes.len()
    }

    pub fn global_count(&self) -> usize {
        self.globals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty() && self.regexes.is_empty() && self.globals.is_empty()
    }

    /// Returns true if `name` is registered as an exact command.
    pub fn has_command(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }
}

impl fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut commands: Vec<_> = self.commands.keys().collect();
        commands.sort();
        f.debug_struct("RouteTable")
            .field("commands", &commands)
            .field(
                "regexes",
                &self.regexes.iter().map(|(p, _)| p.as_str()).collect::<Vec<_>>(),
            )
            .field("globals", &self.globals.len())
            .finish()
    }
}

// ============================================================================
// HandlerRegistry
// ============================================================================

/// The live registry shared by registration code and the dispatcher.
pub struct HandlerRegistry {
    table: ArcSwap<RouteTable>,
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            table: ArcSwap::from_pointee(RouteTable::new()),
        }
    }

    /// Starts a registration. See [`classify`] for how `pattern` is read.
    pub fn on_event(&self, pattern: impl Into<Pattern>) -> EventHandle<'_> {
        EventHandle {
            registry: self,
            registration: classify(pattern),
        }
    }

    /// Starts a global registration.
    pub fn on_any(&self) -> EventHandle<'_> {
        self.on_event(Pattern::Any)
    }

    /// Adds a classified registration.
    pub fn register(&self, registration: Registration, handler: BoxedHandler) {
        if let Registration::Command(names) = &registration
            && names.iter().all(|n| n.trim().is_empty())
        {
            warn!("Command registration has no usable names, skipping");
            return;
        }

        debug!(
            tier = registration.tier(),
            detail = ?registration,
            "Registering handler"
        );
        self.table.rcu(|current| {
            let mut next = RouteTable::clone(current);
            next.add(registration.clone(), handler.clone());
            next
        });
    }

    /// Appends a global handler.
    pub fn register_global(&self, handler: BoxedHandler) {
        self.register(Registration::Global, handler);
    }

    /// Maps each exact name (and its `/` alias) to `handler`.
    pub fn register_command<I, S>(&self, names: I, handler: BoxedHandler)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = names
            .into_iter()
            .map(|n| n.as_ref().trim().to_string())
            .filter(|n| !n.is_empty())
            .collect();
        self.register(Registration::Command(names), handler);
    }

    /// Compiles `pattern` once and appends it to the regex tier.
    ///
    /// A pattern that does not compile is registered as a literal command.
    pub fn register_regex(&self, pattern: &str, handler: BoxedHandler) {
        let registration = match CompiledPattern::new(pattern) {
            Ok(compiled) => Registration::Regex(compiled),
            Err(e) => {
                debug!(pattern, error = %e, "Regex does not compile, registering as literal command");
                Registration::Command(vec![pattern.to_string()])
            }
        };
        self.register(registration, handler);
    }

    /// Returns the current table.
    pub fn snapshot(&self) -> Arc<RouteTable> {
        self.table.load_full()
    }

    /// Swaps in a prebuilt table.
    pub fn replace(&self, table: RouteTable) {
        debug!(
            commands = table.command_count(),
            regexes = table.regex_count(),
            globals = table.global_count(),
            "Replacing route table"
        );
        self.table.store(Arc::new(table));
    }

    /// Removes every registration.
    pub fn clear(&self) {
        self.table.store(Arc::new(RouteTable::new()));
    }

    /// Resolves `text` against the current table.
    pub fn resolve(&self, text: &str) -> Option<Resolved> {
        self.table.load().resolve(text)
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HandlerRegistry")
            .field(&*self.table.load())
            .finish()
    }
}

/// A pending registration returned by [`HandlerRegistry::on_event`].
#[must_use = "call `bind` to complete the registration"]
pub struct EventHandle<'a> {
    registry: &'a HandlerRegistry,
    registration: Registration,
}

impl EventHandle<'_> {
    /// How the pattern was classified.
    pub fn registration(&self) -> &Registration {
        &self.registration
    }

    /// Completes the registration with an async function or closure.
    pub fn bind<F, Fut>(self, handler: F)
    where
        F: Fn(HandlerContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.bind_boxed(into_handler(handler));
    }

    /// Completes the registration with an already boxed handler.
    pub fn bind_boxed(self, handler: BoxedHandler) {
        self.registry.register(self.registration, handler);
    }
}
