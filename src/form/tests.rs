use super::*;
use futures::FutureExt;
use futures::channel::oneshot;
use futures::executor::block_on;
use serde_json::json;
use std::collections::VecDeque;
use std::future::IntoFuture;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::tree::{FieldValue, Tree, Values, get_in, get_leaf_in, set_in};

type TestError = String;

fn values(value: serde_json::Value) -> Values {
    Values::from_json(value).expect("fixture must be a valid values tree")
}

fn report(entries: &[(&str, ErrorOutcome<TestError>)]) -> ErrorReport<TestError> {
    entries.iter().fold(Tree::empty(), |tree, (path, outcome)| {
        set_in(path, Some(Tree::Leaf(outcome.clone())), &tree)
    })
}

fn resolved(message: &str) -> ErrorOutcome<TestError> {
    ErrorOutcome::from(message.to_owned())
}

fn pending_from(receiver: oneshot::Receiver<Option<TestError>>) -> ErrorOutcome<TestError> {
    ErrorOutcome::pending(receiver.map(|result| result.ok().flatten()))
}

fn noop_submit(_: &FormState<TestError>, _: &FormActions<TestError>) -> Completion<()> {
    Completion::done()
}

fn counting_submit(
    count: Arc<AtomicUsize>,
) -> impl Fn(&FormState<TestError>, &FormActions<TestError>) -> Completion<()> + Send + Sync {
    move |_, _| {
        count.fetch_add(1, Ordering::SeqCst);
        Completion::done()
    }
}

/// A validator that hands out one pending result per receiver, then reports
/// nothing.
fn pending_validator(
    path: &'static str,
    receivers: Vec<oneshot::Receiver<Option<TestError>>>,
) -> impl Fn(Option<&str>, &FormState<TestError>) -> ErrorReport<TestError> + Send + Sync {
    let receivers = Mutex::new(receivers.into_iter().collect::<VecDeque<_>>());
    move |_, _| {
        let next = receivers.lock().expect("receiver list lock").pop_front();
        match next {
            Some(receiver) => report(&[(path, pending_from(receiver))]),
            None => Tree::empty(),
        }
    }
}

fn required(
    path: &'static str,
) -> impl Fn(Option<&str>, &FormState<TestError>) -> ErrorReport<TestError> + Send + Sync {
    move |_, state| {
        let empty = get_leaf_in(&state.values, path)
            .and_then(FieldValue::as_str)
            .is_none_or(str::is_empty);
        if empty {
            report(&[(path, resolved("required"))])
        } else {
            Tree::empty()
        }
    }
}

#[test]
fn sync_errors_follow_the_value() {
    let controller = FormController::new(FormConfig::new(noop_submit).validate(required("name")));
    let field = controller.field("name").expect("mount");

    let handle = field.change(ChangeEvent::text("")).expect("change");
    assert!(handle.is_settled());
    let state = controller.state().expect("state");
    assert_eq!(get_leaf_in(&state.errors, "name"), Some(&"required".to_owned()));
    assert_eq!(
        field.shadow().error,
        Some(Tree::Leaf("required".to_owned()))
    );
    assert!(!state.is_valid());

    field.change(ChangeEvent::text("Ada")).expect("change");
    let state = controller.state().expect("state");
    assert!(state.errors.is_empty());
    assert_eq!(field.shadow().error, None);
    assert_eq!(get_leaf_in(&state.values, "name"), Some(&FieldValue::from("Ada")));
}

#[test]
fn async_error_counts_while_pending_and_lands_when_settled() {
    let (sender, receiver) = oneshot::channel();
    let controller = FormController::new(
        FormConfig::new(noop_submit).validate(pending_validator("username", vec![receiver])),
    );
    let field = controller.field("username").expect("mount");

    let handle = field.change(ChangeEvent::text("taken")).expect("change");
    let state = controller.state().expect("state");
    assert_eq!(get_leaf_in(&state.validating, "username"), Some(&1));
    assert!(state.errors.is_empty());
    assert_eq!(field.shadow().validating, 1);
    assert!(field.props().meta.validating);
    assert_eq!(
        controller.status().expect("status"),
        FormStatus::Validating(vec!["username".to_owned()])
    );
    assert_eq!(handle.pending(), 1);

    sender.send(Some("taken".to_owned())).expect("send");
    block_on(handle.into_future());

    let state = controller.state().expect("state");
    assert_eq!(get_leaf_in(&state.errors, "username"), Some(&"taken".to_owned()));
    assert!(state.validating.is_empty());
    assert_eq!(field.shadow().validating, 0);
    assert_eq!(field.shadow().error, Some(Tree::Leaf("taken".to_owned())));
    assert_eq!(controller.status().expect("status"), FormStatus::Idle);
}

#[test]
fn async_result_without_error_clears_the_path() {
    let (sender, receiver) = oneshot::channel();
    let controller = FormController::<TestError>::new(FormConfig::new(noop_submit));
    let field = controller.field("username").expect("mount");
    let actions = controller.actions();

    actions
        .set_errors(report(&[("username", resolved("taken"))]))
        .expect("sync errors");
    assert!(!controller.state().expect("state").is_valid());

    let handle = actions
        .set_errors(report(&[("username", pending_from(receiver))]))
        .expect("async errors");
    sender.send(None).expect("send");
    block_on(handle.into_future());

    let state = controller.state().expect("state");
    assert!(state.errors.is_empty());
    assert!(state.validating.is_empty());
    assert_eq!(field.shadow().error, None);
    assert_eq!(field.shadow().validating, 0);
}

#[test]
fn overlapping_async_results_apply_in_settle_order() {
    let (first_sender, first_receiver) = oneshot::channel();
    let (second_sender, second_receiver) = oneshot::channel();
    let controller = FormController::<TestError>::new(FormConfig::new(noop_submit));
    let field = controller.field("username").expect("mount");
    let actions = controller.actions();

    let first = actions
        .set_errors(report(&[("username", pending_from(first_receiver))]))
        .expect("first");
    let second = actions
        .set_errors(report(&[("username", pending_from(second_receiver))]))
        .expect("second");
    let state = controller.state().expect("state");
    assert_eq!(get_leaf_in(&state.validating, "username"), Some(&2));
    assert_eq!(field.shadow().validating, 2);

    second_sender.send(Some("second".to_owned())).expect("send");
    block_on(second.into_future());
    let state = controller.state().expect("state");
    assert_eq!(get_leaf_in(&state.validating, "username"), Some(&1));
    assert_eq!(get_leaf_in(&state.errors, "username"), Some(&"second".to_owned()));

    first_sender.send(Some("first".to_owned())).expect("send");
    block_on(first.into_future());
    let state = controller.state().expect("state");
    assert!(state.validating.is_empty());
    assert_eq!(get_leaf_in(&state.errors, "username"), Some(&"first".to_owned()));
    assert_eq!(field.shadow().validating, 0);
    assert_eq!(field.shadow().error, Some(Tree::Leaf("first".to_owned())));
}

#[test]
fn reset_discards_results_that_settle_afterwards() {
    let (sender, receiver) = oneshot::channel();
    let controller = FormController::new(
        FormConfig::new(noop_submit)
            .initial_values(values(json!({ "username": "ada" })))
            .validate(pending_validator("username", vec![receiver])),
    );
    let field = controller.field("username").expect("mount");

    let handle = field.change(ChangeEvent::text("taken")).expect("change");
    controller.reset_form(None).expect("reset");
    sender.send(Some("taken".to_owned())).expect("send");
    block_on(handle.into_future());

    let state = controller.state().expect("state");
    assert_eq!(state, FormState::initial(values(json!({ "username": "ada" }))));
    let shadow = field.shadow();
    assert_eq!(shadow.validating, 0);
    assert_eq!(shadow.error, None);
    assert_eq!(shadow.value, FieldValue::from("ada"));
}

#[test]
fn stale_nested_errors_are_cleared() {
    let controller = FormController::<TestError>::new(FormConfig::new(noop_submit));
    let city = controller.field("address.city").expect("mount");
    let zip = controller.field("address.zip").expect("mount");
    let actions = controller.actions();

    actions
        .set_errors(report(&[
            ("address.city", resolved("required")),
            ("address.zip", resolved("invalid")),
        ]))
        .expect("first report");
    assert!(city.shadow().error.is_some());

    actions
        .set_errors(report(&[("address.zip", resolved("invalid"))]))
        .expect("second report");

    let state = controller.state().expect("state");
    assert!(get_in(&state.errors, "address.city").is_none());
    assert_eq!(
        get_leaf_in(&state.errors, "address.zip"),
        Some(&"invalid".to_owned())
    );
    assert_eq!(city.shadow().error, None);
    assert_eq!(zip.shadow().error, Some(Tree::Leaf("invalid".to_owned())));
}

#[test]
fn plain_error_sequences_reach_the_field_as_one_subtree() {
    let controller = FormController::<TestError>::new(FormConfig::new(noop_submit));
    let tags = controller.field("tags").expect("mount");
    let report: ErrorReport<TestError> = [(
        "tags",
        Tree::Seq(vec![
            Some(Arc::new(Tree::Leaf(resolved("too short")))),
            Some(Arc::new(Tree::Leaf(resolved("duplicate")))),
        ]),
    )]
    .into_iter()
    .collect();

    controller.actions().set_errors(report).expect("errors");

    let expected: Tree<TestError> = Tree::from_json(json!(["too short", "duplicate"]))
        .expect("valid error tree");
    let state = controller.state().expect("state");
    assert_eq!(get_in(&state.errors, "tags"), Some(&expected));
    assert_eq!(tags.shadow().error, Some(expected));
}

#[test]
fn submit_without_errors_touches_fields_and_calls_the_handler() {
    let submitted = Arc::new(AtomicUsize::new(0));
    let controller = FormController::new(
        FormConfig::new(counting_submit(submitted.clone()))
            .initial_values(values(json!({ "name": "Ada", "email": "ada@calm.form" })))
            .validate(required("name")),
    );
    let name = controller.field("name").expect("mount");
    let email = controller.field("email").expect("mount");

    block_on(controller.submit_form()).expect("submit");

    assert_eq!(submitted.load(Ordering::SeqCst), 1);
    let state = controller.state().expect("state");
    assert!(!state.is_submitting);
    assert_eq!(get_leaf_in(&state.touched, "name"), Some(&true));
    assert_eq!(get_leaf_in(&state.touched, "email"), Some(&true));
    assert!(name.shadow().touched);
    assert!(email.props().meta.touched);
}

#[test]
fn submit_with_errors_skips_the_handler() {
    let submitted = Arc::new(AtomicUsize::new(0));
    let controller = FormController::new(
        FormConfig::new(counting_submit(submitted.clone())).validate(required("name")),
    );
    let _name = controller.field("name").expect("mount");

    block_on(controller.submit_form()).expect("submit");

    assert_eq!(submitted.load(Ordering::SeqCst), 0);
    let state = controller.state().expect("state");
    assert!(!state.is_submitting);
    assert_eq!(get_leaf_in(&state.errors, "name"), Some(&"required".to_owned()));
}

#[test]
fn reset_during_submit_validation_drops_the_submission() {
    let (sender, receiver) = oneshot::channel();
    let submitted = Arc::new(AtomicUsize::new(0));
    let controller = FormController::new(
        FormConfig::new(counting_submit(submitted.clone()))
            .validate(pending_validator("username", vec![receiver])),
    );
    let _field = controller.field("username").expect("mount");

    let mut submit = Box::pin(controller.submit_form());
    assert!(submit.as_mut().now_or_never().is_none());
    assert!(controller.state().expect("state").is_submitting);
    assert_eq!(controller.status().expect("status"), FormStatus::Submitting);

    controller.reset_form(None).expect("reset");
    sender.send(None).expect("send");
    block_on(submit).expect("submit");

    assert_eq!(submitted.load(Ordering::SeqCst), 0);
    let state = controller.state().expect("state");
    assert!(!state.is_submitting);
    assert!(state.touched.is_empty());
}

#[test]
fn pending_submit_handler_keeps_the_form_submitting() {
    let (sender, receiver) = oneshot::channel::<()>();
    let receiver = Mutex::new(Some(receiver));
    let controller = FormController::<TestError>::new(FormConfig::new(
        move |_: &FormState<TestError>, _: &FormActions<TestError>| {
            match receiver.lock().expect("receiver lock").take() {
                Some(receiver) => Completion::pending(receiver.map(drop)),
                None => Completion::done(),
            }
        },
    ));

    let mut submit = Box::pin(controller.submit_form());
    assert!(submit.as_mut().now_or_never().is_none());
    assert_eq!(controller.status().expect("status"), FormStatus::Submitting);

    sender.send(()).expect("send");
    block_on(submit).expect("submit");
    assert!(!controller.state().expect("state").is_submitting);
}

#[test]
fn focus_and_blur_track_the_active_field() {
    let controller = FormController::<TestError>::new(FormConfig::new(noop_submit));
    let field = controller.field("name").expect("mount");

    field.focus().expect("focus");
    assert_eq!(
        controller.state().expect("state").active.as_deref(),
        Some("name")
    );
    assert!(field.shadow().active);
    assert_eq!(
        controller.status().expect("status"),
        FormStatus::Active("name".to_owned())
    );

    field.blur().expect("blur");
    let state = controller.state().expect("state");
    assert_eq!(state.active, None);
    assert_eq!(get_leaf_in(&state.touched, "name"), Some(&true));
    let shadow = field.shadow();
    assert!(!shadow.active);
    assert!(shadow.touched);
}

#[test]
fn validation_switches_gate_change_and_blur() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let recorded = calls.clone();
    let controller = FormController::new(
        FormConfig::new(noop_submit)
            .validate_on_change(false)
            .validate(
                move |field_name: Option<&str>, _: &FormState<TestError>| -> ErrorReport<TestError> {
                    recorded
                        .lock()
                        .expect("calls lock")
                        .push(field_name.map(str::to_owned));
                    Tree::empty()
                },
            ),
    );
    let field = controller.field("name").expect("mount");

    field.change(ChangeEvent::text("Ada")).expect("change");
    assert!(calls.lock().expect("calls lock").is_empty());

    field.blur().expect("blur");
    block_on(controller.submit_form()).expect("submit");
    assert_eq!(
        *calls.lock().expect("calls lock"),
        vec![Some("name".to_owned()), None]
    );
}

#[test]
fn no_validator_means_no_error_changes() {
    let controller = FormController::<TestError>::new(FormConfig::new(noop_submit));
    let handle = controller.run_validation(None).expect("validate");
    assert!(handle.is_settled());
    assert!(controller.state().expect("state").errors.is_empty());
}

#[test]
fn dropping_a_field_unregisters_only_that_field() {
    let controller = FormController::<TestError>::new(FormConfig::new(noop_submit));
    let first = controller.field("color").expect("mount");
    let second = controller.field("color").expect("mount");
    assert_eq!(controller.field_count().expect("count"), 2);

    drop(first);
    assert_eq!(controller.field_count().expect("count"), 1);

    second.change(ChangeEvent::text("red")).expect("change");
    assert_eq!(second.shadow().value, FieldValue::from("red"));

    drop(second);
    assert_eq!(controller.field_count().expect("count"), 0);
}

#[test]
fn radio_group_fans_out_and_derives_checked() {
    let controller = FormController::<TestError>::new(
        FormConfig::new(noop_submit).initial_values(values(json!({ "color": "blue" }))),
    );
    let red = controller
        .field("color")
        .expect("mount")
        .with_type("radio")
        .with_value("red");
    let blue = controller
        .field("color")
        .expect("mount")
        .with_type("radio")
        .with_value("blue");
    assert_eq!(red.props().input.checked, Some(false));
    assert_eq!(blue.props().input.checked, Some(true));

    red.change(ChangeEvent::typed("radio", "red")).expect("change");

    assert_eq!(red.props().input.checked, Some(true));
    assert_eq!(blue.props().input.checked, Some(false));
    assert_eq!(blue.props().input.value, FieldValue::from("blue"));
    assert_eq!(blue.shadow().value, FieldValue::from("red"));
}

#[test]
fn checkbox_and_number_inputs_coerce_their_values() {
    let controller = FormController::<TestError>::new(FormConfig::new(noop_submit));
    let agree = controller
        .field("agree")
        .expect("mount")
        .with_type("checkbox");
    let age = controller.field("age").expect("mount").with_type("number");
    let plain = controller.field("nickname").expect("mount");
    assert_eq!(plain.props().input.checked, None);

    agree.change(ChangeEvent::checkbox(true)).expect("change");
    age.change(ChangeEvent::text("42")).expect("change");

    let state = controller.state().expect("state");
    assert_eq!(get_leaf_in(&state.values, "agree"), Some(&FieldValue::Bool(true)));
    assert_eq!(get_leaf_in(&state.values, "age"), Some(&FieldValue::Number(42.0)));
    assert_eq!(agree.props().input.checked, Some(true));
}

#[test]
fn reset_without_handler_restores_initial_values() {
    let controller = FormController::<TestError>::new(
        FormConfig::new(noop_submit).initial_values(values(json!({ "name": "Ada" }))),
    );
    let field = controller.field("name").expect("mount");
    field.change(ChangeEvent::text("Grace")).expect("change");
    field.blur().expect("blur");

    block_on(controller.handle_reset()).expect("reset");

    let state = controller.state().expect("state");
    assert_eq!(state, FormState::initial(values(json!({ "name": "Ada" }))));
    assert_eq!(field.shadow().value, FieldValue::from("Ada"));
    assert!(!field.shadow().touched);
}

#[test]
fn reset_handler_can_supply_next_initial_values() {
    let controller = FormController::<TestError>::new(
        FormConfig::new(noop_submit)
            .initial_values(values(json!({ "name": "Ada" })))
            .on_reset(
                |_: &FormState<TestError>, _: &FormActions<TestError>| {
                    Completion::Ready(Some(values(json!({ "name": "Grace" }))))
                },
            ),
    );
    let field = controller.field("name").expect("mount");

    block_on(controller.handle_reset()).expect("reset");

    assert_eq!(
        controller.state().expect("state").values,
        values(json!({ "name": "Grace" }))
    );
    assert_eq!(field.shadow().value, FieldValue::from("Grace"));
}

#[test]
fn form_reports_resetting_while_the_reset_handler_runs() {
    let (sender, receiver) = oneshot::channel::<()>();
    let receiver = Mutex::new(Some(receiver));
    let controller = FormController::<TestError>::new(FormConfig::new(noop_submit).on_reset(
        move |_: &FormState<TestError>, _: &FormActions<TestError>| -> Completion<Option<Values>> {
            match receiver.lock().expect("receiver lock").take() {
                Some(receiver) => Completion::pending(receiver.map(|_| None)),
                None => Completion::Ready(None),
            }
        },
    ));

    let mut reset = Box::pin(controller.handle_reset());
    assert!(reset.as_mut().now_or_never().is_none());
    assert_eq!(controller.status().expect("status"), FormStatus::Resetting);

    sender.send(()).expect("send");
    block_on(reset).expect("reset");
    assert_eq!(controller.status().expect("status"), FormStatus::Idle);
}

#[test]
fn reinitialize_resets_only_when_enabled_and_changed() {
    let disabled = FormController::<TestError>::new(
        FormConfig::new(noop_submit).initial_values(values(json!({ "name": "Ada" }))),
    );
    assert!(!disabled
        .reinitialize(values(json!({ "name": "Grace" })))
        .expect("reinitialize"));
    assert_eq!(
        disabled.state().expect("state").values,
        values(json!({ "name": "Ada" }))
    );
    disabled.reset_form(None).expect("reset");
    assert_eq!(
        disabled.state().expect("state").values,
        values(json!({ "name": "Grace" }))
    );

    let enabled = FormController::<TestError>::new(
        FormConfig::new(noop_submit)
            .initial_values(values(json!({ "name": "Ada" })))
            .enable_reinitialize(true),
    );
    assert!(!enabled
        .reinitialize(values(json!({ "name": "Ada" })))
        .expect("reinitialize"));
    assert!(enabled
        .reinitialize(values(json!({ "name": "Grace" })))
        .expect("reinitialize"));
    assert_eq!(
        enabled.state().expect("state").values,
        values(json!({ "name": "Grace" }))
    );
}

#[test]
fn observers_skip_commits_that_change_nothing() {
    let controller = FormController::<TestError>::new(FormConfig::new(noop_submit));
    let notified = Arc::new(Mutex::new(Vec::new()));
    let seen = notified.clone();
    let subscription = controller
        .subscribe(move |props: &RenderProps<TestError>| {
            seen.lock()
                .expect("observer lock")
                .push(props.state.is_submitting);
        })
        .expect("subscribe");

    controller.set_submitting(false).expect("no-op");
    controller.set_submitting(true).expect("start");
    controller.set_submitting(true).expect("no-op");
    controller.unsubscribe(subscription).expect("unsubscribe");
    controller.set_submitting(false).expect("stop");

    assert_eq!(*notified.lock().expect("observer lock"), vec![true]);
}

#[test]
fn render_props_queue_submissions_until_settled() {
    let submitted = Arc::new(AtomicUsize::new(0));
    let controller = FormController::new(FormConfig::new(counting_submit(submitted.clone())));

    let rendered = controller
        .render(&Renderer::new().render_with(|props: &RenderProps<TestError>| {
            props.handle_submit().expect("queue submit");
            props.state.is_submitting
        }))
        .expect("render");
    assert_eq!(rendered, Some(false));
    assert_eq!(controller.pending_tasks().expect("tasks"), 1);
    assert_eq!(submitted.load(Ordering::SeqCst), 0);

    block_on(controller.settle()).expect("settle");
    assert_eq!(submitted.load(Ordering::SeqCst), 1);
    assert_eq!(controller.pending_tasks().expect("tasks"), 0);
}

#[test]
fn settle_drives_validations_started_by_fields() {
    let (sender, receiver) = oneshot::channel();
    let controller = FormController::new(
        FormConfig::new(noop_submit).validate(pending_validator("username", vec![receiver])),
    );
    let field = controller.field("username").expect("mount");
    drop(field.blur().expect("blur"));
    assert_eq!(controller.pending_tasks().expect("tasks"), 1);

    sender.send(Some("taken".to_owned())).expect("send");
    block_on(controller.settle()).expect("settle");

    assert_eq!(controller.pending_tasks().expect("tasks"), 0);
    assert_eq!(
        get_leaf_in(&controller.state().expect("state").errors, "username"),
        Some(&"taken".to_owned())
    );
}

#[test]
fn fields_render_through_their_renderer() {
    let controller = FormController::<TestError>::new(
        FormConfig::new(noop_submit).initial_values(values(json!({ "name": "Ada" }))),
    );
    let field = controller.field("name").expect("mount");

    let rendered = field.render(&Renderer::new().component(|props: &FieldProps<TestError>| {
        format!("{}={}", props.name, props.input.value)
    }));
    assert_eq!(rendered.as_deref(), Some("name=Ada"));
    assert_eq!(field.render(&Renderer::<FieldProps<TestError>, String>::new()), None);
}

#[allow(dead_code)]
#[derive(Clone, FormModel)]
struct SignupForm {
    email: String,
    age: u32,
    newsletter: bool,
    referrer: Option<String>,
    tags: Vec<String>,
}

#[test]
fn derive_macro_builds_values_and_field_paths() {
    let fields = SignupForm::fields();
    assert_eq!(fields.email(), "email");
    assert_eq!(fields.newsletter(), "newsletter");

    let model = SignupForm {
        email: "ada@calm.form".to_owned(),
        age: 36,
        newsletter: true,
        referrer: None,
        tags: vec!["rust".to_owned()],
    };
    let controller = FormController::<TestError>::new(FormConfig::new(noop_submit).model(&model));
    let state = controller.state().expect("state");

    assert_eq!(
        state.values,
        values(json!({
            "email": "ada@calm.form",
            "age": 36.0,
            "newsletter": true,
            "tags": ["rust"]
        }))
    );
    let email = controller.field(fields.email()).expect("mount");
    assert_eq!(email.shadow().value, FieldValue::from("ada@calm.form"));
    assert!(get_leaf_in(&state.values, fields.referrer()).is_none());
}

#[test]
fn options_deserialize_with_defaults() {
    let options: FormOptions =
        serde_json::from_value(json!({ "validate_on_blur": false })).expect("options");
    assert_eq!(
        options,
        FormOptions {
            enable_reinitialize: false,
            validate_on_blur: false,
            validate_on_change: true,
        }
    );

    let config = FormConfig::<TestError>::new(noop_submit)
        .initial_json(json!({ "name": "Ada" }))
        .expect("valid initial values");
    assert_eq!(config.initial_values, values(json!({ "name": "Ada" })));
}

#[test]
fn named_and_indexed_error_keys_share_a_mapping() {
    let controller = FormController::<TestError>::new(FormConfig::new(noop_submit));
    let title = controller.field("rows.title").expect("mount");
    let first = controller.field("rows.0").expect("mount");

    controller
        .actions()
        .set_errors(report(&[
            ("rows.title", resolved("required")),
            ("rows.0", resolved("bad")),
        ]))
        .expect("errors");

    let state = controller.state().expect("state");
    assert_eq!(
        get_leaf_in(&state.errors, "rows.title"),
        Some(&"required".to_owned())
    );
    assert_eq!(get_leaf_in(&state.errors, "rows.0"), Some(&"bad".to_owned()));
    assert_eq!(title.shadow().error, Some(Tree::Leaf("required".to_owned())));
    assert_eq!(first.shadow().error, Some(Tree::Leaf("bad".to_owned())));
}

#[test]
fn pending_entries_in_an_error_sequence_block_submit() {
    let (sender, receiver) = oneshot::channel();
    let receivers = Mutex::new(Some(receiver));
    let submitted = Arc::new(AtomicUsize::new(0));
    let controller = FormController::new(
        FormConfig::new(counting_submit(submitted.clone())).validate(
            move |_: Option<&str>, _: &FormState<TestError>| -> ErrorReport<TestError> {
                let mut items = vec![Some(Arc::new(Tree::Leaf(resolved("too short"))))];
                if let Some(receiver) = receivers.lock().expect("receiver lock").take() {
                    items.push(Some(Arc::new(Tree::Leaf(pending_from(receiver)))));
                }
                [("tags", Tree::Seq(items))].into_iter().collect()
            },
        ),
    );
    let tags = controller.field("tags").expect("mount");

    let mut submit = Box::pin(controller.submit_form());
    assert!(submit.as_mut().now_or_never().is_none());
    let state = controller.state().expect("state");
    assert_eq!(get_leaf_in(&state.validating, "tags"), Some(&1));
    assert_eq!(tags.shadow().validating, 1);

    sender.send(Some("duplicate".to_owned())).expect("send");
    block_on(submit).expect("submit");

    assert_eq!(submitted.load(Ordering::SeqCst), 0);
    let expected: Tree<TestError> =
        Tree::from_json(json!(["too short", "duplicate"])).expect("valid error tree");
    let state = controller.state().expect("state");
    assert_eq!(get_in(&state.errors, "tags"), Some(&expected));
    assert!(state.validating.is_empty());
    assert!(!state.is_submitting);
    assert_eq!(tags.shadow().error, Some(expected));
    assert_eq!(tags.shadow().validating, 0);
}

#[test]
fn pending_sequence_entry_without_error_still_counts_the_rest() {
    let (sender, receiver) = oneshot::channel();
    let controller = FormController::<TestError>::new(FormConfig::new(noop_submit));
    let report: ErrorReport<TestError> = [(
        "tags",
        Tree::Seq(vec![
            Some(Arc::new(Tree::Leaf(pending_from(receiver)))),
            Some(Arc::new(Tree::Leaf(resolved("duplicate")))),
        ]),
    )]
    .into_iter()
    .collect();

    let handle = controller.actions().set_errors(report).expect("errors");
    assert!(controller.state().expect("state").errors.is_empty());

    sender.send(None).expect("send");
    block_on(handle.into_future());

    let expected: Tree<TestError> =
        Tree::from_json(json!([null, "duplicate"])).expect("valid error tree");
    assert_eq!(
        get_in(&controller.state().expect("state").errors, "tags"),
        Some(&expected)
    );
}

#[test]
fn dropping_a_pending_reset_lowers_the_resetting_flag() {
    let (_sender, receiver) = oneshot::channel::<()>();
    let receiver = Mutex::new(Some(receiver));
    let controller = FormController::<TestError>::new(FormConfig::new(noop_submit).on_reset(
        move |_: &FormState<TestError>, _: &FormActions<TestError>| -> Completion<Option<Values>> {
            match receiver.lock().expect("receiver lock").take() {
                Some(receiver) => Completion::pending(receiver.map(|_| None)),
                None => Completion::Ready(None),
            }
        },
    ));

    let mut reset = Box::pin(controller.handle_reset());
    assert!(reset.as_mut().now_or_never().is_none());
    assert_eq!(controller.status().expect("status"), FormStatus::Resetting);

    drop(reset);
    assert_eq!(controller.status().expect("status"), FormStatus::Idle);
}
