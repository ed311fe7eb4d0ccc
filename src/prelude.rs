pub use crate::form::{
    ChangeEvent, Completion, ErrorOutcome, ErrorReport, Field, FieldProps, FormActions,
    FormConfig, FormController, FormError, FormModel, FormOptions, FormResult, FormState,
    FormStatus, FormValues, RenderProps, Renderer, ValidationError, ValidationHandle,
};
pub use crate::tree::{FieldValue, Tree, Values, get_in, set_in};
