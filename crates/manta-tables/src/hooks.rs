//! The three-stage hook pipeline.
//!
//! Hooks are appended at registration time and run in registration order.
//! Pre-change and pre-delete failures abort before any mutation; a
//! post-change failure is returned to the caller even though the underlying
//! write has already committed.

use std::fmt;

use async_trait::async_trait;

use crate::error::{BoxError, TableError};

/// The pipeline stage a hook is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookStage {
    /// Before an insert/update/upsert statement is built.
    PreChange,
    /// Before a delete; the engine fetches the target row so the hook can
    /// observe the record being removed.
    PreDelete,
    /// After a successful insert/update/upsert.
    PostChange,
}

impl fmt::Display for HookStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HookStage::PreChange => "pre-change",
            HookStage::PreDelete => "pre-delete",
            HookStage::PostChange => "post-change",
        };
        write!(f, "{}", name)
    }
}

/// A callback observing a record at one pipeline stage.
#[async_trait]
pub trait ChangeHook<T>: Send + Sync {
    async fn on_change(&self, record: &T) -> Result<(), BoxError>;
}

/// Adapts a plain closure into a [`ChangeHook`].
pub struct FnHook<F>(pub F);

#[async_trait]
impl<T, F> ChangeHook<T> for FnHook<F>
where
    T: Sync,
    F: Fn(&T) -> Result<(), BoxError> + Send + Sync,
{
    async fn on_change(&self, record: &T) -> Result<(), BoxError> {
        (self.0)(record)
    }
}

/// Runs `hooks` in order; the first failure is wrapped with the stage and
/// the failing hook's registration index.
pub(crate) async fn run_hooks<T: Sync>(
    hooks: &[std::sync::Arc<dyn ChangeHook<T>>],
    stage: HookStage,
    record: &T,
) -> Result<(), TableError> {
    for (index, hook) in hooks.iter().enumerate() {
        hook.on_change(record)
            .await
            .map_err(|source| TableError::Hook { stage, index, source })?;
    }
    Ok(())
}
