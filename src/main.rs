/*
 * ModKit - plugin and theme runtime
 * Copyright (C) 2025 Akaere Networks
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 */

use anyhow::{Result, bail};
use clap::Parser;
use std::sync::Arc;

use modkit::config::{Cli, Command};
use modkit::core::logger::init_from_args;
use modkit::events::names;
use modkit::{MemoryStyleSink, Runtime, RuntimeConfig, log_debug};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Cli::parse();

    init_from_args(args.debug, args.journald)?;
    log_debug!("Using base directory {}", args.base_dir.display());

    let runtime = Runtime::new(
        RuntimeConfig::from_base_dir(&args.base_dir),
        Arc::new(MemoryStyleSink::new()),
    );

    match args.command {
        Command::List => {
            runtime.start().await;
            print_plugins(&runtime).await;
        }
        Command::Enable { file } => toggle(&runtime, &file, true).await?,
        Command::Disable { file } => toggle(&runtime, &file, false).await?,
        Command::Themes => {
            let active = runtime.themes().apply_configured();
            for theme in runtime.themes().discover()? {
                let marker = if active.as_deref() == Some(theme.file.as_str()) {
                    "*"
                } else {
                    " "
                };
                println!(
                    "{} {:<32} {} {}",
                    marker, theme.file, theme.metadata.name, theme.metadata.version
                );
            }
        }
        Command::Theme { name, clear } => {
            let target = if clear { None } else { name.as_deref() };
            let change = runtime.themes().set_active_theme(target);
            if let Some(error) = change.apply_error {
                bail!("failed to apply theme: {}", error);
            }
            if !change.persisted {
                bail!("theme applied but settings could not be saved");
            }
            match change.active {
                Some(theme) => println!("Active theme: {}", theme),
                None => println!("Theme cleared"),
            }
        }
        Command::Check => {
            let failures = Arc::new(std::sync::Mutex::new(Vec::new()));
            for event in [
                names::PLUGIN_LOAD_FAILED,
                names::PLUGIN_ON_LOAD_FAILED,
                names::PLUGIN_ENABLE_FAILED,
                names::THEME_LOAD_FAILED,
            ] {
                let failures = failures.clone();
                runtime.bus().subscribe(event, move |payload| {
                    failures
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .push(format!("{}: {}", event, payload));
                    Ok(())
                });
            }

            let summary = runtime.start().await;
            runtime.teardown().await;

            let failures = failures.lock().unwrap_or_else(|e| e.into_inner());
            for failure in failures.iter() {
                println!("{}", failure);
            }
            if !failures.is_empty() {
                bail!(
                    "{} of {} plugin(s) failed to load",
                    summary.failed,
                    summary.discovered
                );
            }
            println!("{} plugin(s) OK", summary.loaded);
        }
    }

    Ok(())
}

async fn toggle(runtime: &Runtime, file: &str, enabled: bool) -> Result<()> {
    runtime.start().await;
    let outcome = runtime.plugins().set_plugin_enabled(file, enabled).await;

    if outcome.state.is_none() {
        println!("{} is not loaded; setting saved for next start", file);
    }
    if let Some(error) = outcome.hook_error {
        bail!("{} hook failed: {}", file, error);
    }
    if !outcome.persisted {
        bail!("could not save settings");
    }
    print_plugins(runtime).await;
    Ok(())
}

async fn print_plugins(runtime: &Runtime) {
    for plugin in runtime.plugins().plugins().await {
        let flag = if plugin.enabled { "on " } else { "off" };
        println!(
            "[{}] {:<32} {:<14} {} {}",
            flag, plugin.file, plugin.state, plugin.metadata.name, plugin.metadata.version
        );
        if let Some(error) = plugin.last_error {
            println!("      {}", error);
        }
    }
}
