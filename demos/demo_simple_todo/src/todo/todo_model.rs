use crate::todo::todo_state::{Todo, TodoState};
use std::time::Duration;
use tokio::time::sleep;
use transitrx::{
    path, Action, ReduceContext, Reducer, Store, StoreBuilder, StoreError, TransitionPath,
};

/// Stand-in for a remote todo service.
pub struct TodoApi {
    pub latency: Duration,
    /// Index the service refuses to save.
    pub reject: Option<usize>,
}

impl TodoApi {
    async fn save(&self, index: usize) -> Result<(), StoreError> {
        sleep(self.latency).await;
        match self.reject {
            Some(rejected) if rejected == index => {
                Err(StoreError::code("E_SAVE", format!("todo {index} was rejected")))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone)]
pub enum TodoMsg {
    Add(String),
    Toggle(usize),
    RemoveCompleted,
    Exit,
}

struct TodoReducer;

impl Reducer<TodoState, TodoMsg, TodoApi> for TodoReducer {
    fn reduce(
        &self,
        cx: &mut ReduceContext<'_, TodoState, TodoMsg, TodoApi>,
        action: TodoMsg,
    ) -> Result<(), StoreError> {
        match action {
            TodoMsg::Add(text) => {
                let todo = Todo::new(&text);
                cx.set(move |state: &mut TodoState| state.add_todo(todo.clone()));
            }
            TodoMsg::Toggle(index) => {
                if index >= cx.state().todos.len() {
                    return Err(StoreError::msg(format!("no todo at {index}")));
                }
                cx.set_optimistic(move |state: &mut TodoState| state.toggle_todo(index));
                cx.promise_as("save", move |effect| async move {
                    effect.deps().save(index).await?;
                    effect.set(move |state: &mut TodoState| state.toggle_todo(index));
                    Ok(())
                });
            }
            TodoMsg::RemoveCompleted => cx.set(|state: &mut TodoState| state.remove_completed_todos()),
            TodoMsg::Exit => cx.set(|state: &mut TodoState| state.exit = true),
        }
        Ok(())
    }

    fn derive(&self, state: &mut TodoState) {
        state.derive_progress();
    }
}

pub struct TodoModel {
    store: Store<TodoState, TodoMsg, TodoApi>,
}

impl TodoModel {
    pub fn new(api: TodoApi) -> Result<Self, StoreError> {
        let store = StoreBuilder::from_reducer(TodoState::default(), api, TodoReducer)
            .name("todos")
            .error_handler(|error| tracing::warn!("todo error: {}", error.message()))
            .build()?;
        Ok(Self { store })
    }

    pub fn store(&self) -> Store<TodoState, TodoMsg, TodoApi> {
        self.store.clone()
    }

    pub fn exit(&self) {
        self.store.dispatch(TodoMsg::Exit);
    }

    pub fn add_todo(&self, text: &str) {
        self.store.dispatch(TodoMsg::Add(text.to_string()));
    }

    pub fn remove_completed_todos(&self) {
        self.store.dispatch(TodoMsg::RemoveCompleted);
    }

    /// Flips the todo right away and keeps the flip only if the save succeeds.
    pub fn toggle_todo(&self, index: usize) -> TransitionPath {
        let path = path!["todo", index, "toggle"];
        self.store
            .dispatch(Action::new(TodoMsg::Toggle(index)).transition(path.clone()));
        path
    }

    pub fn is_saving(&self) -> bool {
        self.store.transitions().is_happening(&path!["todo"])
    }
}
