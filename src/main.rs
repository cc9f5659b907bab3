//! smoothie – builds the EEx email templates of a project.
//!
//! Usage:
//!   SMOOTHIE_TEMPLATE_DIR=priv/templates/email smoothie
//!
//! All options come from `SMOOTHIE_*` environment variables, optionally set
//! in a `.env` file. Output goes to `<template dir>/build/`.

use std::process;

use smoothie::{Config, Error, Pipeline};

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("error")).init();

    match build() {
        Ok(count) => {
            log::info!("built {count} template(s)");
            println!("Done");
            Ok(())
        }
        Err(e) if e.is_user_facing() => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}

fn build() -> Result<usize, Error> {
    let config = Config::from_env()?;
    let pipeline = Pipeline::new(&config)?;
    pipeline.run()
}
