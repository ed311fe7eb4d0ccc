use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use futures::future::{BoxFuture, FutureExt, Shared, join_all};
use serde::{Deserialize, Serialize};

use super::field::FieldHandle;
use super::render::RenderProps;
use super::submit::{FormActions, ResetHandler, SubmitHandler};
use super::validation::{ErrorReport, FormValidator, ValidationError};
use crate::tree::{Tree, Values, error_keys};

static FORM_ID_ALLOCATOR: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FormId(pub u64);

impl FormId {
    pub fn next() -> Self {
        Self(FORM_ID_ALLOCATOR.fetch_add(1, Ordering::SeqCst))
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SubscriptionId(u64);

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormOptions {
    /// Reset the form whenever [`FormController::reinitialize`] receives
    /// initial values that differ from the current ones.
    pub enable_reinitialize: bool,
    pub validate_on_blur: bool,
    pub validate_on_change: bool,
}

impl Default for FormOptions {
    fn default() -> Self {
        Self {
            enable_reinitialize: false,
            validate_on_blur: true,
            validate_on_change: true,
        }
    }
}

#[derive(Clone)]
pub struct FormConfig<E: ValidationError> {
    pub initial_values: Values,
    pub options: FormOptions,
    pub(super) validate: Option<Arc<dyn FormValidator<E>>>,
    pub(super) on_submit: Arc<dyn SubmitHandler<E>>,
    pub(super) on_reset: Option<Arc<dyn ResetHandler<E>>>,
}

impl<E: ValidationError> FormConfig<E> {
    pub fn new<S>(on_submit: S) -> Self
    where
        S: SubmitHandler<E> + 'static,
    {
        Self {
            initial_values: Values::empty(),
            options: FormOptions::default(),
            validate: None,
            on_submit: Arc::new(on_submit),
            on_reset: None,
        }
    }

    pub fn initial_values(mut self, values: Values) -> Self {
        self.initial_values = values;
        self
    }

    pub fn initial_json(mut self, value: serde_json::Value) -> FormResult<Self> {
        self.initial_values =
            Values::from_json(value).map_err(|error| FormError::InvalidValues(error.to_string()))?;
        Ok(self)
    }

    pub fn model<M>(mut self, model: &M) -> Self
    where
        M: super::model::FormValues + ?Sized,
    {
        self.initial_values = model.form_values().unwrap_or_default();
        self
    }

    pub fn options(mut self, options: FormOptions) -> Self {
        self.options = options;
        self
    }

    pub fn validate_on_blur(mut self, enabled: bool) -> Self {
        self.options.validate_on_blur = enabled;
        self
    }

    pub fn validate_on_change(mut self, enabled: bool) -> Self {
        self.options.validate_on_change = enabled;
        self
    }

    pub fn enable_reinitialize(mut self, enabled: bool) -> Self {
        self.options.enable_reinitialize = enabled;
        self
    }

    pub fn validate<V>(mut self, validator: V) -> Self
    where
        V: FormValidator<E> + 'static,
    {
        self.validate = Some(Arc::new(validator));
        self
    }

    pub fn on_reset<R>(mut self, handler: R) -> Self
    where
        R: ResetHandler<E> + 'static,
    {
        self.on_reset = Some(Arc::new(handler));
        self
    }
}

/// Authoritative state of a form. Cloning is cheap: trees share branches.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FormState<E> {
    pub active: Option<String>,
    pub touched: Tree<bool>,
    pub values: Values,
    pub errors: Tree<E>,
    pub validating: Tree<usize>,
    pub is_submitting: bool,
}

impl<E> FormState<E> {
    pub fn initial(values: Values) -> Self {
        Self {
            active: None,
            touched: Tree::empty(),
            values,
            errors: Tree::empty(),
            validating: Tree::empty(),
            is_submitting: false,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FormStatus {
    Idle,
    Active(String),
    Validating(Vec<String>),
    Submitting,
    Resetting,
}

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum FormError {
    #[error("form state lock poisoned while {0}")]
    StatePoisoned(&'static str),
    #[error("invalid form values: {0}")]
    InvalidValues(String),
}

pub type FormResult<T> = Result<T, FormError>;

pub(super) type Task = Shared<BoxFuture<'static, ()>>;
pub(super) type Observer<E> = Arc<dyn Fn(&RenderProps<E>) + Send + Sync>;

pub(super) struct FormInner<E: ValidationError> {
    pub(super) id: FormId,
    pub(super) config: RwLock<FormConfig<E>>,
    pub(super) state: RwLock<FormState<E>>,
    pub(super) fields: RwLock<Vec<Arc<dyn FieldHandle<E>>>>,
    pub(super) observers: RwLock<Vec<(SubscriptionId, Observer<E>)>>,
    pub(super) tasks: RwLock<Vec<Task>>,
    pub(super) resets: AtomicU64,
    pub(super) resetting: AtomicBool,
    next_subscription: AtomicU64,
}

#[derive(Clone)]
pub struct FormController<E: ValidationError> {
    pub(super) inner: Arc<FormInner<E>>,
}

pub(super) struct WeakFormController<E: ValidationError>(Weak<FormInner<E>>);

impl<E: ValidationError> WeakFormController<E> {
    pub(super) fn upgrade(&self) -> Option<FormController<E>> {
        self.0.upgrade().map(|inner| FormController { inner })
    }
}

impl<E: ValidationError> FormController<E> {
    pub fn new(config: FormConfig<E>) -> Self {
        let state = FormState::initial(config.initial_values.clone());
        Self {
            inner: Arc::new(FormInner {
                id: FormId::next(),
                config: RwLock::new(config),
                state: RwLock::new(state),
                fields: RwLock::new(Vec::new()),
                observers: RwLock::new(Vec::new()),
                tasks: RwLock::new(Vec::new()),
                resets: AtomicU64::new(0),
                resetting: AtomicBool::new(false),
                next_subscription: AtomicU64::new(1),
            }),
        }
    }

    pub fn id(&self) -> FormId {
        self.inner.id
    }

    pub fn state(&self) -> FormResult<FormState<E>> {
        Ok(read_lock(&self.inner.state, "reading form state")?.clone())
    }

    pub fn options(&self) -> FormResult<FormOptions> {
        Ok(read_lock(&self.inner.config, "reading form options")?.options)
    }

    pub fn actions(&self) -> FormActions<E> {
        FormActions::new(self.clone())
    }

    pub fn status(&self) -> FormResult<FormStatus> {
        if self.inner.resetting.load(Ordering::SeqCst) {
            return Ok(FormStatus::Resetting);
        }
        let state = read_lock(&self.inner.state, "reading form status")?;
        Ok(if state.is_submitting {
            FormStatus::Submitting
        } else if !state.validating.is_empty() {
            FormStatus::Validating(error_keys(&state.validating))
        } else if let Some(active) = &state.active {
            FormStatus::Active(active.clone())
        } else {
            FormStatus::Idle
        })
    }

    pub fn subscribe<F>(&self, observer: F) -> FormResult<SubscriptionId>
    where
        F: Fn(&RenderProps<E>) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.inner.next_subscription.fetch_add(1, Ordering::SeqCst));
        write_lock(&self.inner.observers, "subscribing to form state")?.push((id, Arc::new(observer)));
        Ok(id)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> FormResult<()> {
        write_lock(&self.inner.observers, "unsubscribing from form state")?
            .retain(|(subscription, _)| *subscription != id);
        Ok(())
    }

    pub fn register_field(&self, handle: Arc<dyn FieldHandle<E>>) -> FormResult<()> {
        tracing::debug!(form = self.inner.id.0, field = handle.name(), "registering field");
        write_lock(&self.inner.fields, "registering field")?.push(handle);
        Ok(())
    }

    pub fn unregister_field(&self, handle: &dyn FieldHandle<E>) -> FormResult<()> {
        let mut fields = write_lock(&self.inner.fields, "unregistering field")?;
        if let Some(index) = fields
            .iter()
            .position(|field| std::ptr::addr_eq(Arc::as_ptr(field), handle))
        {
            fields.remove(index);
            tracing::debug!(form = self.inner.id.0, field = handle.name(), "unregistered field");
        }
        Ok(())
    }

    pub fn field_count(&self) -> FormResult<usize> {
        Ok(read_lock(&self.inner.fields, "counting fields")?.len())
    }

    pub fn handle_field_focus(&self, handle: &dyn FieldHandle<E>) -> FormResult<()> {
        let name = handle.name();
        for field in self.fields_named(name)? {
            field.set_active(true);
        }
        self.commit("focusing field", |state| state.active = Some(name.to_owned()))
    }

    pub fn handle_field_change(
        &self,
        handle: &dyn FieldHandle<E>,
        value: crate::tree::FieldValue,
    ) -> FormResult<super::ValidationHandle> {
        let name = handle.name();
        for field in self.fields_named(name)? {
            field.set_value(value.clone());
        }
        self.commit("changing field value", |state| {
            state.values = crate::tree::set_leaf_in(name, Some(value), &state.values);
        })?;

        if self.options()?.validate_on_change {
            self.run_validation(Some(name))
        } else {
            Ok(super::ValidationHandle::default())
        }
    }

    pub fn handle_field_blur(
        &self,
        handle: &dyn FieldHandle<E>,
    ) -> FormResult<super::ValidationHandle> {
        let name = handle.name();
        for field in self.fields_named(name)? {
            field.set_active(false);
            field.set_touched(true);
        }
        self.commit("blurring field", |state| {
            state.active = None;
            state.touched = crate::tree::set_leaf_in(name, Some(true), &state.touched);
        })?;

        if self.options()?.validate_on_blur {
            self.run_validation(Some(name))
        } else {
            Ok(super::ValidationHandle::default())
        }
    }

    pub fn set_submitting(&self, is_submitting: bool) -> FormResult<()> {
        self.commit("setting submitting flag", |state| {
            state.is_submitting = is_submitting;
        })
    }

    /// Replaces the state with a fresh one built from `next_initial`, or from
    /// the configured initial values. Outstanding async validations are
    /// invalidated and every registered field resets its shadow.
    pub fn reset_form(&self, next_initial: Option<Values>) -> FormResult<()> {
        let epoch = self.inner.resets.fetch_add(1, Ordering::SeqCst) + 1;
        let values = match next_initial {
            Some(values) => values,
            None => read_lock(&self.inner.config, "reading initial values")?
                .initial_values
                .clone(),
        };
        tracing::debug!(form = self.inner.id.0, epoch, "resetting form");

        let fresh = FormState::initial(values.clone());
        self.commit("resetting form", |state| *state = fresh)?;
        for field in self.registered_fields()? {
            field.reset(&values);
        }
        Ok(())
    }

    /// Stores new initial values; resets when reinitializing is enabled and
    /// the values changed. Returns whether a reset happened.
    pub fn reinitialize(&self, next_initial: Values) -> FormResult<bool> {
        let (changed, enabled) = {
            let mut config = write_lock(&self.inner.config, "reinitializing form")?;
            let changed = config.initial_values != next_initial;
            config.initial_values = next_initial.clone();
            (changed, config.options.enable_reinitialize)
        };
        if enabled && changed {
            self.reset_form(Some(next_initial))?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Drives every queued task (async validations, submissions and resets
    /// started from render props) until the queue is empty.
    pub async fn settle(&self) -> FormResult<()> {
        loop {
            let tasks = std::mem::take(&mut *write_lock(&self.inner.tasks, "draining tasks")?);
            if tasks.is_empty() {
                return Ok(());
            }
            join_all(tasks).await;
        }
    }

    pub fn pending_tasks(&self) -> FormResult<usize> {
        Ok(read_lock(&self.inner.tasks, "counting tasks")?
            .iter()
            .filter(|task| task.peek().is_none())
            .count())
    }

    pub(super) fn enqueue(&self, future: BoxFuture<'static, ()>) -> FormResult<Task> {
        let task = future.shared();
        let mut tasks = write_lock(&self.inner.tasks, "queueing task")?;
        tasks.retain(|queued| queued.peek().is_none());
        tasks.push(task.clone());
        Ok(task)
    }

    pub(super) fn downgrade(&self) -> WeakFormController<E> {
        WeakFormController(Arc::downgrade(&self.inner))
    }

    pub(super) fn epoch(&self) -> u64 {
        self.inner.resets.load(Ordering::SeqCst)
    }

    pub(super) fn registered_fields(&self) -> FormResult<Vec<Arc<dyn FieldHandle<E>>>> {
        Ok(read_lock(&self.inner.fields, "reading registered fields")?.clone())
    }

    pub(super) fn fields_named(&self, name: &str) -> FormResult<Vec<Arc<dyn FieldHandle<E>>>> {
        Ok(read_lock(&self.inner.fields, "reading fields by name")?
            .iter()
            .filter(|field| field.name() == name)
            .cloned()
            .collect())
    }

    pub(super) fn validator(&self) -> FormResult<Option<Arc<dyn FormValidator<E>>>> {
        Ok(read_lock(&self.inner.config, "reading validator")?.validate.clone())
    }

    pub(super) fn validate_with(
        &self,
        validator: &dyn FormValidator<E>,
        field_name: Option<&str>,
    ) -> FormResult<ErrorReport<E>> {
        let state = self.state()?;
        Ok(validator.validate(field_name, &state))
    }

    /// Applies `update` and notifies subscribers, unless the state came out
    /// structurally unchanged.
    pub(super) fn commit(
        &self,
        context: &'static str,
        update: impl FnOnce(&mut FormState<E>),
    ) -> FormResult<()> {
        let next = {
            let mut state = write_lock(&self.inner.state, context)?;
            let previous = state.clone();
            update(&mut *state);
            if *state == previous {
                return Ok(());
            }
            state.clone()
        };
        self.notify(next)
    }

    fn notify(&self, state: FormState<E>) -> FormResult<()> {
        let observers = read_lock(&self.inner.observers, "reading observers")?
            .iter()
            .map(|(_, observer)| observer.clone())
            .collect::<Vec<_>>();
        if observers.is_empty() {
            return Ok(());
        }
        let props = RenderProps::new(self.clone(), state, self.options()?);
        for observer in observers {
            observer(&props);
        }
        Ok(())
    }
}

pub(super) fn read_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockReadGuard<'a, T>> {
    lock.read().map_err(|_| FormError::StatePoisoned(context))
}

pub(super) fn write_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockWriteGuard<'a, T>> {
    lock.write().map_err(|_| FormError::StatePoisoned(context))
}
