use calmform::form::{FormModel, FormValues};
use calmform::tree::{FieldValue, get_leaf_in};

#[derive(Clone, calmform::form::FormModel)]
struct DemoForm {
    email: String,
    age: u32,
    nickname: Option<String>,
    tags: Vec<String>,
}

fn main() {
    let fields = DemoForm::fields();
    assert_eq!(fields.email(), "email");
    assert_eq!(fields.tags(), "tags");

    let model = DemoForm {
        email: "a@calm.form".to_string(),
        age: 30,
        nickname: None,
        tags: vec!["x".to_string()],
    };
    let values = model.form_values().expect("struct always has values");
    assert_eq!(
        get_leaf_in(&values, fields.email()),
        Some(&FieldValue::from("a@calm.form"))
    );
    assert_eq!(get_leaf_in(&values, "age"), Some(&FieldValue::Number(30.0)));
    assert_eq!(get_leaf_in(&values, "tags.0"), Some(&FieldValue::from("x")));
    assert!(get_leaf_in(&values, fields.nickname()).is_none());
}
