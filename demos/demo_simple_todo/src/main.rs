use crate::todo::todo_model::{TodoApi, TodoModel};
use crate::todo::todo_view::show_todos;
use crate::tracing_setup::tracing_init;
use futures_signals::signal::SignalExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::info;

mod todo;
mod tracing_setup;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_init();

    let model = Arc::new(TodoModel::new(TodoApi {
        latency: Duration::from_millis(800),
        reject: Some(3),
    })?);
    let script = model.clone();

    tokio::task::spawn(async move {
        for text in [
            "Build a Todo App",
            "Contribute to Open Source",
            "Read Rust Book",
            "Learn Async Rust",
            "Have breakfast",
        ] {
            sleep(Duration::from_millis(500)).await;
            script.add_todo(text);
        }

        sleep(Duration::from_secs(1)).await;
        script.toggle_todo(0);
        script.toggle_todo(1);
        // Rejected by the api: shown as done, then rolled back.
        let rejected = script.toggle_todo(3);
        script.store().settled(&rejected).await;

        sleep(Duration::from_secs(1)).await;
        script.remove_completed_todos();
        sleep(Duration::from_secs(2)).await;
        script.exit();
    });

    let saving = model.clone();
    model
        .store()
        .to_signal()
        .stop_if(|state| state.exit)
        .for_each(move |state| {
            show_todos(&state, saving.is_saving());
            async {}
        })
        .await;
    info!("=================================");
    info!("  Main thread | Finish");
    Ok(())
}
