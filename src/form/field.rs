use std::sync::{Arc, PoisonError, RwLock};

use super::ValidationHandle;
use super::controller::{FormController, FormResult, read_lock};
use super::render::Renderer;
use super::validation::ValidationError;
use crate::tree::{FieldValue, Tree, Values, get_leaf_in};

/// What a field registers with its controller. Only the controller calls the
/// mutators; they must not call back into it.
pub trait FieldHandle<E: ValidationError>: Send + Sync {
    fn name(&self) -> &str;
    fn set_value(&self, value: FieldValue);
    fn set_touched(&self, touched: bool);
    fn set_active(&self, active: bool);
    /// Stores `error` and adds `validator_delta` to the in-flight count,
    /// clamping at zero.
    fn set_error(&self, error: Option<Tree<E>>, validator_delta: i32);
    fn reset(&self, values: &Values);
}

/// A field's local copy of its slice of the form state.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldShadow<E> {
    pub value: FieldValue,
    pub touched: bool,
    pub active: bool,
    pub error: Option<Tree<E>>,
    pub validating: u32,
}

impl<E> FieldShadow<E> {
    pub fn from_values(values: &Values, name: &str) -> Self {
        Self {
            value: get_leaf_in(values, name).cloned().unwrap_or_default(),
            touched: false,
            active: false,
            error: None,
            validating: 0,
        }
    }
}

pub struct FieldRecord<E> {
    name: String,
    shadow: RwLock<FieldShadow<E>>,
}

impl<E: ValidationError> FieldRecord<E> {
    pub fn new(name: impl Into<String>, values: &Values) -> Self {
        let name = name.into();
        let shadow = FieldShadow::from_values(values, &name);
        Self {
            name,
            shadow: RwLock::new(shadow),
        }
    }

    pub fn shadow(&self) -> FieldShadow<E> {
        self.shadow
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn update(&self, update: impl FnOnce(&mut FieldShadow<E>)) {
        update(&mut *self.shadow.write().unwrap_or_else(PoisonError::into_inner));
    }
}

impl<E: ValidationError> FieldHandle<E> for FieldRecord<E> {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_value(&self, value: FieldValue) {
        self.update(|shadow| shadow.value = value);
    }

    fn set_touched(&self, touched: bool) {
        self.update(|shadow| shadow.touched = touched);
    }

    fn set_active(&self, active: bool) {
        self.update(|shadow| shadow.active = active);
    }

    fn set_error(&self, error: Option<Tree<E>>, validator_delta: i32) {
        self.update(|shadow| {
            shadow.error = error;
            let count = i64::from(shadow.validating) + i64::from(validator_delta);
            shadow.validating = u32::try_from(count.max(0)).unwrap_or(u32::MAX);
        });
    }

    fn reset(&self, values: &Values) {
        self.update(|shadow| *shadow = FieldShadow::from_values(values, &self.name));
    }
}

/// A raw change coming from an input.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChangeEvent {
    pub input_type: Option<String>,
    pub value: String,
    pub checked: bool,
}

impl ChangeEvent {
    pub fn text(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }

    pub fn typed(input_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            input_type: Some(input_type.into()),
            value: value.into(),
            checked: false,
        }
    }

    pub fn checkbox(checked: bool) -> Self {
        Self {
            input_type: Some("checkbox".to_owned()),
            value: String::new(),
            checked,
        }
    }

    /// Numeric inputs parse the trimmed text (NaN when it does not parse),
    /// checkboxes report their checked state and everything else passes the
    /// text through.
    pub fn coerce(&self) -> FieldValue {
        let input_type = self.input_type.as_deref().unwrap_or_default();
        if input_type.contains("number") || input_type.contains("range") {
            FieldValue::Number(self.value.trim().parse().unwrap_or(f64::NAN))
        } else if input_type.contains("checkbox") {
            FieldValue::Bool(self.checked)
        } else {
            FieldValue::Text(self.value.clone())
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct InputProps {
    pub value: FieldValue,
    pub input_type: Option<String>,
    /// Set for radio and checkbox inputs only.
    pub checked: Option<bool>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldMeta<E> {
    pub touched: bool,
    pub active: bool,
    pub error: Option<Tree<E>>,
    pub validating: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldProps<E> {
    pub name: String,
    pub input: InputProps,
    pub meta: FieldMeta<E>,
}

/// A mounted field. Dropping it unregisters the field from its form.
pub struct Field<E: ValidationError> {
    record: Arc<FieldRecord<E>>,
    controller: FormController<E>,
    input_type: Option<String>,
    declared_value: Option<FieldValue>,
}

impl<E: ValidationError> Field<E> {
    pub fn with_type(mut self, input_type: impl Into<String>) -> Self {
        self.input_type = Some(input_type.into());
        self
    }

    /// The value a radio or checkbox input stands for.
    pub fn with_value(mut self, value: impl Into<FieldValue>) -> Self {
        self.declared_value = Some(value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.record.name
    }

    pub fn shadow(&self) -> FieldShadow<E> {
        self.record.shadow()
    }

    pub fn focus(&self) -> FormResult<()> {
        self.controller.handle_field_focus(self.record.as_ref())
    }

    /// Events without an input type take the field's own.
    pub fn change(&self, mut event: ChangeEvent) -> FormResult<ValidationHandle> {
        if event.input_type.is_none() {
            event.input_type = self.input_type.clone();
        }
        self.controller
            .handle_field_change(self.record.as_ref(), event.coerce())
    }

    pub fn blur(&self) -> FormResult<ValidationHandle> {
        self.controller.handle_field_blur(self.record.as_ref())
    }

    pub fn props(&self) -> FieldProps<E> {
        let shadow = self.record.shadow();
        let checkable = self
            .input_type
            .as_deref()
            .is_some_and(|input_type| input_type == "radio" || input_type == "checkbox");

        let input = if checkable {
            let checked = match &self.declared_value {
                Some(declared) => shadow.value == *declared,
                None => shadow.value == FieldValue::Bool(true),
            };
            InputProps {
                value: self.declared_value.clone().unwrap_or(shadow.value),
                input_type: self.input_type.clone(),
                checked: Some(checked),
            }
        } else {
            InputProps {
                value: shadow.value,
                input_type: self.input_type.clone(),
                checked: None,
            }
        };

        FieldProps {
            name: self.record.name.clone(),
            input,
            meta: FieldMeta {
                touched: shadow.touched,
                active: shadow.active,
                error: shadow.error,
                validating: shadow.validating > 0,
            },
        }
    }

    pub fn render<O>(&self, renderer: &Renderer<FieldProps<E>, O>) -> Option<O> {
        renderer.render(&self.props())
    }
}

impl<E: ValidationError> Drop for Field<E> {
    fn drop(&mut self) {
        if let Err(error) = self.controller.unregister_field(self.record.as_ref()) {
            tracing::error!(field = %self.record.name, %error, "failed to unregister field");
        }
    }
}

impl<E: ValidationError> FormController<E> {
    /// Mounts a field at `name`, seeded from the current values.
    pub fn field(&self, name: impl Into<String>) -> FormResult<Field<E>> {
        let record = {
            let state = read_lock(&self.inner.state, "mounting field")?;
            Arc::new(FieldRecord::new(name, &state.values))
        };
        self.register_field(record.clone())?;
        Ok(Field {
            record,
            controller: self.clone(),
            input_type: None,
            declared_value: None,
        })
    }
}
