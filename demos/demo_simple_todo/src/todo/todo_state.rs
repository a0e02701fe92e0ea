use std::fmt::{Display, Formatter};
use transitrx::State;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Todo {
    pub text: String,
    pub completed: bool,
}

impl Todo {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            completed: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TodoState {
    pub todos: Vec<Todo>,
    /// Derived on every commit.
    pub progress: TodoProgress,
    pub exit: bool,
}

impl State for TodoState {}

impl TodoState {
    pub fn add_todo(&mut self, value: Todo) {
        self.todos.push(value);
    }

    pub fn remove_completed_todos(&mut self) {
        self.todos.retain(|todo| !todo.completed);
    }

    pub fn toggle_todo(&mut self, index: usize) {
        if let Some(todo) = self.todos.get_mut(index) {
            todo.completed = !todo.completed;
        }
    }

    pub fn derive_progress(&mut self) {
        let total = self.todos.len();
        let completed = self.todos.iter().filter(|todo| todo.completed).count();
        self.progress = if total == 0 {
            TodoProgress::default()
        } else {
            TodoProgress {
                completed,
                total,
                percentage: (completed as f64 / total as f64) * 100.0,
            }
        };
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TodoProgress {
    pub completed: usize,
    pub total: usize,
    pub percentage: f64,
}

impl Display for TodoProgress {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Progress:{}/{} Percentage:{:.2}%",
            self.completed, self.total, self.percentage
        )
    }
}
