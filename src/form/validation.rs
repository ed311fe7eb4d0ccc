use std::borrow::Cow;
use std::fmt::{Debug, Formatter};
use std::future::{Future, IntoFuture};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared, join_all};

use super::controller::{FormController, FormResult, FormState, Task, read_lock};
use super::field::FieldHandle;
use crate::tree::{Tree, error_keys, get_in, get_leaf_in_or, set_in, set_leaf_in};

pub trait ValidationError: Clone + PartialEq + Debug + Send + Sync + 'static {
    fn message(&self) -> Cow<'_, str>;
}

impl ValidationError for String {
    fn message(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.as_str())
    }
}

impl ValidationError for &'static str {
    fn message(&self) -> Cow<'_, str> {
        Cow::Borrowed(*self)
    }
}

pub type PendingError<E> = Shared<BoxFuture<'static, Option<E>>>;

/// One leaf of a validator's report: an error known now, or one that will be
/// known once its future settles. A pending result resolving to `None` clears
/// the error.
#[derive(Clone)]
pub enum ErrorOutcome<E: ValidationError> {
    Resolved(E),
    Pending(PendingError<E>),
}

impl<E: ValidationError> ErrorOutcome<E> {
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = Option<E>> + Send + 'static,
    {
        Self::Pending(future.boxed().shared())
    }

    pub fn resolved(&self) -> Option<E> {
        match self {
            Self::Resolved(error) => Some(error.clone()),
            Self::Pending(_) => None,
        }
    }

    /// The error once known: resolved, or pending and already settled.
    pub fn settled(&self) -> Option<E> {
        match self {
            Self::Resolved(error) => Some(error.clone()),
            Self::Pending(pending) => pending.peek().cloned().flatten(),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }
}

impl<E: ValidationError> From<E> for ErrorOutcome<E> {
    fn from(error: E) -> Self {
        Self::Resolved(error)
    }
}

impl<E: ValidationError> Debug for ErrorOutcome<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Resolved(error) => f.debug_tuple("Resolved").field(error).finish(),
            Self::Pending(pending) => match pending.peek() {
                Some(settled) => f.debug_tuple("Pending").field(settled).finish(),
                None => f.write_str("Pending(..)"),
            },
        }
    }
}

/// What a validator returns: errors keyed by field path.
pub type ErrorReport<E> = Tree<ErrorOutcome<E>>;

pub trait FormValidator<E: ValidationError>: Send + Sync {
    fn validate(&self, field_name: Option<&str>, state: &FormState<E>) -> ErrorReport<E>;
}

impl<E, F> FormValidator<E> for F
where
    E: ValidationError,
    F: Fn(Option<&str>, &FormState<E>) -> ErrorReport<E> + Send + Sync,
{
    fn validate(&self, field_name: Option<&str>, state: &FormState<E>) -> ErrorReport<E> {
        (self)(field_name, state)
    }
}

/// Completes once every async result of one validation pass has settled,
/// whether or not a reset discarded it.
#[derive(Default)]
pub struct ValidationHandle {
    tasks: Vec<Task>,
}

impl ValidationHandle {
    pub fn pending(&self) -> usize {
        self.tasks
            .iter()
            .filter(|task| task.peek().is_none())
            .count()
    }

    pub fn is_settled(&self) -> bool {
        self.pending() == 0
    }
}

impl Debug for ValidationHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationHandle")
            .field("tasks", &self.tasks.len())
            .field("pending", &self.pending())
            .finish()
    }
}

impl IntoFuture for ValidationHandle {
    type Output = ();
    type IntoFuture = BoxFuture<'static, ()>;

    fn into_future(self) -> Self::IntoFuture {
        join_all(self.tasks).map(drop).boxed()
    }
}

impl<E: ValidationError> FormController<E> {
    /// Runs the configured validator, scoped to `field_name` when given.
    pub fn run_validation(&self, field_name: Option<&str>) -> FormResult<ValidationHandle> {
        let Some(validator) = self.validator()? else {
            return Ok(ValidationHandle::default());
        };
        let report = self.validate_with(validator.as_ref(), field_name)?;
        self.set_errors(report)
    }

    /// Replaces `errors` and `validating` with what `next` reports.
    ///
    /// Fields missing from the report lose their error. A path holding any
    /// pending result, directly or inside a collapsed sequence, bumps its
    /// validating count now and writes its value once everything under it
    /// settles, unless the form was reset in between.
    pub fn set_errors(&self, next: ErrorReport<E>) -> FormResult<ValidationHandle> {
        let paths = error_keys(&next);
        let fields = self.registered_fields()?;
        for field in fields
            .iter()
            .filter(|field| !paths.iter().any(|path| path == field.name()))
        {
            field.set_error(None, 0);
        }

        let current_validating = read_lock(&self.inner.state, "reading validating counts")?
            .validating
            .clone();
        let epoch = self.epoch();
        let mut errors = Tree::empty();
        let mut validating = Tree::empty();
        let mut tasks = Vec::new();

        for path in &paths {
            let Some(node) = get_in(&next, path) else {
                continue;
            };
            let targets = fields
                .iter()
                .filter(|field| field.name() == path.as_str())
                .cloned()
                .collect::<Vec<_>>();

            if has_pending(node) {
                let count = get_leaf_in_or(&current_validating, path, 0) + 1;
                validating = set_leaf_in(path, Some(count), &validating);
                for field in &targets {
                    field.set_error(None, 1);
                }
                let settle = self.settle_pending(path.clone(), node.clone(), targets, epoch);
                tasks.push(self.enqueue(settle)?);
            } else {
                let error = Some(node.filter_map_leaves(&ErrorOutcome::resolved))
                    .filter(|error| !error.is_empty_container());
                errors = set_in(path, error.clone(), &errors);
                for field in &targets {
                    field.set_error(error.clone(), 0);
                }
            }
        }

        self.commit("applying validation errors", |state| {
            state.errors = errors;
            state.validating = validating;
        })?;
        Ok(ValidationHandle { tasks })
    }

    /// Waits for every pending outcome under `node`, then writes the whole
    /// unit at `path` in one go.
    fn settle_pending(
        &self,
        path: String,
        node: ErrorReport<E>,
        targets: Vec<Arc<dyn FieldHandle<E>>>,
        epoch: u64,
    ) -> BoxFuture<'static, ()> {
        let controller = self.downgrade();
        async move {
            let mut pending = Vec::new();
            collect_pending(&node, &mut pending);
            join_all(pending).await;
            let Some(controller) = controller.upgrade() else {
                return;
            };
            if controller.epoch() != epoch {
                tracing::trace!(
                    form = controller.id().0,
                    path = %path,
                    "discarding async validation result from before a reset"
                );
                return;
            }

            let error = Some(node.filter_map_leaves(&ErrorOutcome::settled))
                .filter(|error| !error.is_empty_container());
            for field in &targets {
                field.set_error(error.clone(), -1);
            }
            let applied = controller.commit("applying async validation result", |state| {
                let count = get_leaf_in_or(&state.validating, &path, 0).saturating_sub(1);
                state.errors = set_in(&path, error, &state.errors);
                state.validating =
                    set_leaf_in(&path, (count > 0).then_some(count), &state.validating);
            });
            if let Err(error) = applied {
                tracing::error!(path = %path, %error, "failed to apply async validation result");
            }
        }
        .boxed()
    }
}

fn has_pending<E: ValidationError>(node: &ErrorReport<E>) -> bool {
    match node {
        Tree::Leaf(outcome) => outcome.is_pending(),
        Tree::Map(entries) => entries.values().any(|child| has_pending(child)),
        Tree::Seq(items) => items.iter().flatten().any(|child| has_pending(child)),
    }
}

fn collect_pending<E: ValidationError>(
    node: &ErrorReport<E>,
    pending: &mut Vec<PendingError<E>>,
) {
    match node {
        Tree::Leaf(ErrorOutcome::Pending(future)) => pending.push(future.clone()),
        Tree::Leaf(ErrorOutcome::Resolved(_)) => {}
        Tree::Map(entries) => entries
            .values()
            .for_each(|child| collect_pending(child, pending)),
        Tree::Seq(items) => items
            .iter()
            .flatten()
            .for_each(|child| collect_pending(child, pending)),
    }
}
