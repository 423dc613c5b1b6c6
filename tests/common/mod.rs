#![allow(dead_code)]

use pick_arena::prelude::*;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

pub fn init_test_logger() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// The bundled bot playing `strategy`.
pub fn bot(strategy: &[&str]) -> Program {
    Program::from_path(env!("CARGO_BIN_EXE_arena-bot"))
        .with_name(strategy.join("-"))
        .with_args(strategy.iter().copied())
}

pub fn quiet_config() -> Configuration {
    Configuration::new().with_verbose(false)
}
