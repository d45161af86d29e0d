pub mod app;
pub mod cli;
pub mod core;
pub mod reminder;
pub mod shared;
pub mod summary;
pub mod todo;

use crate::app::App;
use crate::cli::Invocation;
use crate::core::logging;
use crate::core::notify::DesktopNotifier;
use crate::core::settings::{load_settings, AppSettings};
use crate::shared::paths::resolve_data_file;
use crate::summary::Summarizer;
use crate::todo::TodoStore;

pub fn run() {
    let invocation = match Invocation::parse(std::env::args().skip(1)) {
        Ok(invocation) => invocation,
        Err(message) => {
            eprintln!("{}", message);
            std::process::exit(2);
        }
    };

    // Logging first, everything after may log
    let _logging_guards = match logging::init_logging() {
        Ok(guards) => Some(guards),
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            None
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(target: "system", "Failed to start runtime: {}", e);
            eprintln!("Failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };

    let settings = load_settings();
    let code = runtime.block_on(execute(invocation, settings));
    if code != 0 {
        std::process::exit(code);
    }
}

async fn execute(invocation: Invocation, settings: AppSettings) -> i32 {
    let store = TodoStore::new(resolve_data_file(&settings.data_file));
    let summarizer = match Summarizer::from_env(&settings.summary) {
        Ok(summarizer) => summarizer,
        Err(e) => {
            tracing::error!(target: "system", "Failed to build summary client: {}", e);
            eprintln!("{}", e);
            return 1;
        }
    };

    let mut app = App::new(settings, store, Box::new(DesktopNotifier), summarizer);

    match invocation {
        Invocation::Resident => {
            app.run().await;
            0
        }
        Invocation::Command(command) => {
            app.startup();
            let result = cli::execute(&mut app, command).await;
            app.shutdown();

            match result {
                Ok(output) => {
                    println!("{}", output);
                    0
                }
                Err(e) => {
                    eprintln!("{}", e);
                    1
                }
            }
        }
    }
}
