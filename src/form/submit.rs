use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::{BoxFuture, FutureExt};

use super::controller::{FormController, FormResult, FormState, read_lock};
use super::validation::{ErrorReport, ValidationError, ValidationHandle};
use crate::tree::Values;

/// Result of a submit or reset handler: already available, or still running.
pub enum Completion<T> {
    Ready(T),
    Pending(BoxFuture<'static, T>),
}

impl<T> Completion<T> {
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        Self::Pending(future.boxed())
    }

    pub async fn resolve(self) -> T {
        match self {
            Self::Ready(value) => value,
            Self::Pending(future) => future.await,
        }
    }
}

impl Completion<()> {
    pub fn done() -> Self {
        Self::Ready(())
    }
}

impl<T> From<T> for Completion<T> {
    fn from(value: T) -> Self {
        Self::Ready(value)
    }
}

impl<T: Debug> Debug for Completion<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            Self::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

pub trait SubmitHandler<E: ValidationError>: Send + Sync {
    fn submit(&self, state: &FormState<E>, actions: &FormActions<E>) -> Completion<()>;
}

impl<E, F> SubmitHandler<E> for F
where
    E: ValidationError,
    F: Fn(&FormState<E>, &FormActions<E>) -> Completion<()> + Send + Sync,
{
    fn submit(&self, state: &FormState<E>, actions: &FormActions<E>) -> Completion<()> {
        (self)(state, actions)
    }
}

/// Runs before a user-initiated reset. Resolving to `Some(values)` resets to
/// those values instead of the configured initial ones.
pub trait ResetHandler<E: ValidationError>: Send + Sync {
    fn reset(&self, state: &FormState<E>, actions: &FormActions<E>) -> Completion<Option<Values>>;
}

impl<E, F> ResetHandler<E> for F
where
    E: ValidationError,
    F: Fn(&FormState<E>, &FormActions<E>) -> Completion<Option<Values>> + Send + Sync,
{
    fn reset(&self, state: &FormState<E>, actions: &FormActions<E>) -> Completion<Option<Values>> {
        (self)(state, actions)
    }
}

/// The operations submit and reset handlers may call back into.
#[derive(Clone)]
pub struct FormActions<E: ValidationError> {
    controller: FormController<E>,
}

impl<E: ValidationError> FormActions<E> {
    pub(super) fn new(controller: FormController<E>) -> Self {
        Self { controller }
    }

    pub fn set_errors(&self, next: ErrorReport<E>) -> FormResult<ValidationHandle> {
        self.controller.set_errors(next)
    }

    pub fn set_submitting(&self, is_submitting: bool) -> FormResult<()> {
        self.controller.set_submitting(is_submitting)
    }

    pub fn reset_form(&self, next_initial: Option<Values>) -> FormResult<()> {
        self.controller.reset_form(next_initial)
    }
}

impl<E: ValidationError> FormController<E> {
    /// Touches every registered field, validates the whole form and calls the
    /// submit handler when no errors remain.
    ///
    /// A reset while validation is pending drops the submission.
    pub async fn submit_form(&self) -> FormResult<()> {
        let fields = self.registered_fields()?;
        for field in &fields {
            field.set_touched(true);
        }
        let epoch = self.epoch();
        self.commit("starting submit", |state| {
            for field in &fields {
                state.touched = crate::tree::set_leaf_in(field.name(), Some(true), &state.touched);
            }
            state.is_submitting = true;
        })?;
        tracing::debug!(form = self.inner.id.0, fields = fields.len(), "submitting form");

        self.run_validation(None)?.await;
        if self.epoch() != epoch {
            tracing::debug!(
                form = self.inner.id.0,
                "form was reset during submit validation, dropping submission"
            );
            return Ok(());
        }

        let state = self.state()?;
        if state.is_valid() {
            let on_submit = read_lock(&self.inner.config, "reading submit handler")?
                .on_submit
                .clone();
            let actions = self.actions();
            on_submit.submit(&state, &actions).resolve().await;
            tracing::debug!(form = self.inner.id.0, "submit handler finished");
        } else {
            tracing::debug!(
                form = self.inner.id.0,
                errors = state.errors.len(),
                "submit blocked by validation errors"
            );
        }
        self.set_submitting(false)
    }

    /// Runs the reset handler, if any, then resets the form.
    pub async fn handle_reset(&self) -> FormResult<()> {
        let on_reset = read_lock(&self.inner.config, "reading reset handler")?
            .on_reset
            .clone();
        let Some(on_reset) = on_reset else {
            return self.reset_form(None);
        };

        let state = self.state()?;
        let actions = self.actions();
        let next_initial = {
            let _resetting = ResettingGuard::set(&self.inner.resetting);
            on_reset.reset(&state, &actions).resolve().await
        };
        self.reset_form(next_initial)
    }

    /// Queues [`FormController::submit_form`]; it runs when the queue is
    /// driven through [`FormController::settle`].
    pub fn handle_submit(&self) -> FormResult<()> {
        let controller = self.downgrade();
        self.enqueue(
            async move {
                let Some(controller) = controller.upgrade() else {
                    return;
                };
                if let Err(error) = controller.submit_form().await {
                    tracing::error!(form = controller.id().0, %error, "submit failed");
                }
            }
            .boxed(),
        )?;
        Ok(())
    }

    /// Queues [`FormController::handle_reset`].
    pub fn request_reset(&self) -> FormResult<()> {
        let controller = self.downgrade();
        self.enqueue(
            async move {
                let Some(controller) = controller.upgrade() else {
                    return;
                };
                if let Err(error) = controller.handle_reset().await {
                    tracing::error!(form = controller.id().0, %error, "reset failed");
                }
            }
            .boxed(),
        )?;
        Ok(())
    }
}

/// Raises the resetting flag for as long as it lives. A reset future dropped
/// before its handler finishes still lowers the flag.
struct ResettingGuard<'a>(&'a AtomicBool);

impl<'a> ResettingGuard<'a> {
    fn set(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for ResettingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
