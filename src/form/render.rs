use std::sync::Arc;

use super::controller::{FormController, FormOptions, FormResult, FormState, read_lock};
use super::submit::FormActions;
use super::validation::ValidationError;

type RenderFn<P, O> = Arc<dyn Fn(&P) -> O + Send + Sync>;

/// The ways a consumer can render a form or a field. When several are set,
/// `component` wins over `render`, which wins over `children`.
pub struct Renderer<P, O> {
    component: Option<RenderFn<P, O>>,
    render: Option<RenderFn<P, O>>,
    children: Option<RenderFn<P, O>>,
}

impl<P, O> Renderer<P, O> {
    pub fn new() -> Self {
        Self {
            component: None,
            render: None,
            children: None,
        }
    }

    pub fn component(mut self, component: impl Fn(&P) -> O + Send + Sync + 'static) -> Self {
        self.component = Some(Arc::new(component));
        self
    }

    pub fn render_with(mut self, render: impl Fn(&P) -> O + Send + Sync + 'static) -> Self {
        self.render = Some(Arc::new(render));
        self
    }

    pub fn children(mut self, children: impl Fn(&P) -> O + Send + Sync + 'static) -> Self {
        self.children = Some(Arc::new(children));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.component.is_none() && self.render.is_none() && self.children.is_none()
    }

    pub fn render(&self, props: &P) -> Option<O> {
        let strategy = self
            .component
            .as_ref()
            .or(self.render.as_ref())
            .or(self.children.as_ref());
        match strategy {
            Some(strategy) => Some(strategy(props)),
            None => {
                warning("renderer has no component, render function or children");
                None
            }
        }
    }
}

impl<P, O> Default for Renderer<P, O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P, O> Clone for Renderer<P, O> {
    fn clone(&self) -> Self {
        Self {
            component: self.component.clone(),
            render: self.render.clone(),
            children: self.children.clone(),
        }
    }
}

/// Reports misuse in debug builds only.
pub fn warning(message: &str) {
    if cfg!(debug_assertions) {
        tracing::warn!(target: "calmform", "{message}");
    }
}

/// What the form hands to its render consumer on every state change.
#[derive(Clone)]
pub struct RenderProps<E: ValidationError> {
    pub state: FormState<E>,
    pub options: FormOptions,
    controller: FormController<E>,
}

impl<E: ValidationError> RenderProps<E> {
    pub(super) fn new(
        controller: FormController<E>,
        state: FormState<E>,
        options: FormOptions,
    ) -> Self {
        Self {
            state,
            options,
            controller,
        }
    }

    pub fn handle_submit(&self) -> FormResult<()> {
        self.controller.handle_submit()
    }

    pub fn handle_reset(&self) -> FormResult<()> {
        self.controller.request_reset()
    }

    pub fn actions(&self) -> FormActions<E> {
        self.controller.actions()
    }
}

impl<E: ValidationError> FormController<E> {
    pub fn render_props(&self) -> FormResult<RenderProps<E>> {
        let state = read_lock(&self.inner.state, "building render props")?.clone();
        Ok(RenderProps::new(self.clone(), state, self.options()?))
    }

    pub fn render<O>(&self, renderer: &Renderer<RenderProps<E>, O>) -> FormResult<Option<O>> {
        Ok(renderer.render(&self.render_props()?))
    }
}
