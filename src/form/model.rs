use std::sync::Arc;

use crate::tree::{FieldValue, Tree, Values, trim_holes};

/// Converts a typed value into a branch of the `values` tree. `None` means
/// "no value" and leaves the key out.
///
/// Numbers are stored as `f64`. Integers beyond 2^53 in magnitude
/// (`i64`, `u64`, `isize`, `usize`) round to the nearest representable
/// value; keep such identifiers in a `String` field instead.
pub trait FormValues {
    fn form_values(&self) -> Option<Values>;
}

/// Implemented by `#[derive(FormModel)]`.
pub trait FormModel: FormValues {
    type Fields;

    fn fields() -> Self::Fields;
}

impl FormValues for str {
    fn form_values(&self) -> Option<Values> {
        Some(Tree::Leaf(FieldValue::Text(self.to_owned())))
    }
}

impl FormValues for String {
    fn form_values(&self) -> Option<Values> {
        self.as_str().form_values()
    }
}

impl FormValues for bool {
    fn form_values(&self) -> Option<Values> {
        Some(Tree::Leaf(FieldValue::Bool(*self)))
    }
}

impl FormValues for FieldValue {
    fn form_values(&self) -> Option<Values> {
        Some(Tree::Leaf(self.clone()))
    }
}

impl FormValues for Values {
    fn form_values(&self) -> Option<Values> {
        (!self.is_empty_container()).then(|| self.clone())
    }
}

macro_rules! numeric_form_values {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FormValues for $ty {
                fn form_values(&self) -> Option<Values> {
                    Some(Tree::Leaf(FieldValue::Number(*self as f64)))
                }
            }
        )*
    };
}

numeric_form_values!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

impl<T: FormValues + ?Sized> FormValues for &T {
    fn form_values(&self) -> Option<Values> {
        (**self).form_values()
    }
}

impl<T: FormValues> FormValues for Option<T> {
    fn form_values(&self) -> Option<Values> {
        self.as_ref().and_then(T::form_values)
    }
}

impl<T: FormValues> FormValues for Vec<T> {
    fn form_values(&self) -> Option<Values> {
        let mut items = self
            .iter()
            .map(|item| item.form_values().map(Arc::new))
            .collect::<Vec<_>>();
        trim_holes(&mut items);
        (!items.is_empty()).then_some(Tree::Seq(items))
    }
}
