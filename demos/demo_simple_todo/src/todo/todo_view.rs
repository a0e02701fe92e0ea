use crate::todo::todo_state::TodoState;
use std::process::Command;
use tracing::{debug, info};

fn clear_screen() {
    if cfg!(target_os = "windows") {
        let _ = Command::new("cmd").args(["/c", "cls"]).status();
    } else {
        let _ = Command::new("clear").status();
    }
}

pub fn show_todos(state: &TodoState, saving: bool) {
    clear_screen();
    info!("=================================");
    debug!("| {}", state.progress);
    debug!("| Saving: {}", saving);
    if state.todos.is_empty() {
        debug!("| No todos available.");
    } else {
        for (index, todo) in state.todos.iter().enumerate() {
            let status = if todo.completed { "✓" } else { " " };
            debug!("| [{}] {} {}", index, status, todo.text);
        }
    }
}
