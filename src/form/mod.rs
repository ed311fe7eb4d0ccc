mod controller;
mod field;
mod model;
mod render;
mod submit;
mod validation;

#[cfg(test)]
mod tests;

pub use calmform_derive::FormModel;
pub use controller::{
    FormConfig, FormController, FormError, FormId, FormOptions, FormResult, FormState, FormStatus,
    SubscriptionId,
};
pub use field::{
    ChangeEvent, Field, FieldHandle, FieldMeta, FieldProps, FieldRecord, FieldShadow, InputProps,
};
pub use model::{FormModel, FormValues};
pub use render::{RenderProps, Renderer, warning};
pub use submit::{Completion, FormActions, ResetHandler, SubmitHandler};
pub use validation::{
    ErrorOutcome, ErrorReport, FormValidator, PendingError, ValidationError, ValidationHandle,
};
