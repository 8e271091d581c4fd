use super::types::{StatementEvent, StatementHook, Subscription};
use crate::error::{ScanError, ScanResult};
use crate::options::QueryKind;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

struct RegisteredHook {
    key: String,
    hook: Arc<dyn StatementHook>,
}

/// Per-kind hook table of a session.
///
/// Hooks run in registration order. Keys are unique per kind.
#[derive(Default)]
pub struct HookRegistry {
    hooks: RwLock<BTreeMap<QueryKind, Vec<RegisteredHook>>>,
}

impl HookRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one hook.
    pub fn register(
        &self,
        kind: QueryKind,
        key: &str,
        hook: Arc<dyn StatementHook>,
    ) -> ScanResult<()> {
        self.register_all(vec![Subscription::new(kind, key, hook)])
    }

    /// Register a batch of hooks. Either all of them are added or none is.
    pub fn register_all(&self, subscriptions: Vec<Subscription>) -> ScanResult<()> {
        let mut hooks = self.hooks.write().unwrap_or_else(PoisonError::into_inner);

        for (i, sub) in subscriptions.iter().enumerate() {
            if sub.key.is_empty() {
                return Err(ScanError::registration(
                    &sub.key,
                    format!("empty hook key for {}", sub.kind),
                ));
            }
            let taken = hooks
                .get(&sub.kind)
                .is_some_and(|list| list.iter().any(|h| h.key == sub.key));
            let repeated = subscriptions[..i]
                .iter()
                .any(|prev| prev.kind == sub.kind && prev.key == sub.key);
            if taken || repeated {
                return Err(ScanError::registration(
                    &sub.key,
                    format!("a hook with this key is already registered for {}", sub.kind),
                ));
            }
        }

        for sub in subscriptions {
            hooks.entry(sub.kind).or_default().push(RegisteredHook {
                key: sub.key,
                hook: sub.hook,
            });
        }
        Ok(())
    }

    /// Remove a hook. Returns whether it was registered.
    pub fn unregister(&self, kind: QueryKind, key: &str) -> bool {
        let mut hooks = self.hooks.write().unwrap_or_else(PoisonError::into_inner);
        let Some(list) = hooks.get_mut(&kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|h| h.key != key);
        let removed = list.len() != before;
        if list.is_empty() {
            hooks.remove(&kind);
        }
        removed
    }

    /// Whether any hook is registered for `kind`.
    pub fn is_watched(&self, kind: QueryKind) -> bool {
        self.hooks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .is_some_and(|list| !list.is_empty())
    }

    /// Registered keys for `kind`, in run order.
    pub fn keys(&self, kind: QueryKind) -> Vec<String> {
        self.hooks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .map(|list| list.iter().map(|h| h.key.clone()).collect())
            .unwrap_or_default()
    }

    fn hooks_for(&self, kind: QueryKind) -> Vec<Arc<dyn StatementHook>> {
        self.hooks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .map(|list| list.iter().map(|h| h.hook.clone()).collect())
            .unwrap_or_default()
    }

    /// Run every hook registered for the event's kind, in order.
    pub async fn dispatch(&self, event: StatementEvent) {
        // Hooks are cloned out so no lock is held across an await.
        let hooks = self.hooks_for(event.statement().kind);
        for hook in hooks {
            hook.on_statement(event.clone()).await;
        }
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let hooks = self.hooks.read().unwrap_or_else(PoisonError::into_inner);
        let keys: BTreeMap<_, Vec<_>> = hooks
            .iter()
            .map(|(kind, list)| (*kind, list.iter().map(|h| h.key.as_str()).collect()))
            .collect();
        f.debug_struct("HookRegistry").field("hooks", &keys).finish()
    }
}
