//! CLI command handling
//!
//! Loads configuration and scenario files, runs them and formats output.

use colored::Colorize;

use crate::commands::Commands;
use crate::common::config::Config;
use crate::common::{logging, Error, Result};
use crate::context::parse_scalar;
use crate::report::ConsoleReporter;
use crate::scenario::{BuildOptions, Engine, Node, Scenario, ScenarioDoc, Step};
use crate::session::WebDriverFactory;

/// Dispatch a CLI command
pub async fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Run {
            path,
            verbose,
            webdriver,
            base_url,
            vars,
            report,
        } => {
            let mut config = Config::load()?;
            if let Some(url) = webdriver {
                config.webdriver.url = url;
            }

            let doc = ScenarioDoc::load(&path)?;
            let scenario = doc.build(&build_options(&config))?;
            let factory = WebDriverFactory::new(&config.webdriver, &config.timeouts)?;

            // Later values win: config, scenario vars, then command line
            let mut engine = Engine::new(factory)
                .with_reporter(ConsoleReporter::new(verbose))
                .with_base_context(doc.base_context())
                .with_var("base_url", config.shop.base_url.clone());
            for (key, value) in &doc.vars {
                engine = engine.with_var(key.clone(), value.clone());
            }
            if let Some(url) = base_url {
                engine = engine.with_var("base_url", url);
            }
            for (key, value) in vars {
                engine = engine.with_var(key, parse_scalar(&value));
            }

            let run = engine.run(&scenario).await?;

            if let Some(report_path) = report {
                run.write_json(&report_path)?;
                println!("Report written to {}", report_path.display());
            }

            if run.passed() {
                Ok(())
            } else {
                Err(Error::RunFailed {
                    name: run.scenario.clone(),
                    status: run.status.to_string(),
                })
            }
        }

        Commands::Validate { path } => {
            let doc = ScenarioDoc::load(&path)?;
            let scenario = doc.build(&BuildOptions::default())?;

            println!(
                "{} {} ({} steps, base context '{}')",
                "✓".green(),
                scenario.name.bold(),
                scenario.len(),
                doc.base_context()
            );
            if let Some(description) = &doc.description {
                println!("  {}", description.trim().dimmed());
            }
            print_scenario(&scenario, 1);
            Ok(())
        }

        Commands::Logs { lines, clear } => {
            let Some(path) = logging::run_log_path() else {
                println!("No log directory available");
                return Ok(());
            };

            if clear {
                logging::truncate_run_log()?;
                println!("Run log cleared");
                return Ok(());
            }

            if !path.exists() {
                println!("(no log file at {})", path.display());
                return Ok(());
            }

            let content = std::fs::read_to_string(&path).map_err(|e| Error::FileRead {
                path: path.display().to_string(),
                error: e.to_string(),
            })?;
            let all: Vec<&str> = content.lines().collect();
            let start = all.len().saturating_sub(lines);
            for line in &all[start..] {
                println!("{}", line);
            }
            Ok(())
        }
    }
}

fn build_options(config: &Config) -> BuildOptions {
    BuildOptions {
        tab_timeout_ms: config.timeouts.tab_ms,
    }
}

fn print_scenario(scenario: &Scenario, depth: usize) {
    let pad = "  ".repeat(depth);
    for step in &scenario.setup {
        print_step(step.as_ref(), &pad, "[setup] ");
    }
    for child in &scenario.children {
        match child {
            Node::Step(step) => print_step(step.as_ref(), &pad, ""),
            Node::Scenario(nested) => {
                println!("{}{}", pad, nested.name.cyan());
                print_scenario(nested, depth + 1);
            }
        }
    }
    for step in &scenario.teardown {
        print_step(step.as_ref(), &pad, "[teardown] ");
    }
}

fn print_step(step: &dyn Step, pad: &str, phase: &str) {
    match step.skip_reason() {
        Some(reason) => println!(
            "{}{} {}{} {}",
            pad,
            "-".yellow(),
            phase.dimmed(),
            step.id(),
            format!("(skipped: {})", reason).dimmed()
        ),
        None => println!(
            "{}{} {}{} {}",
            pad,
            "•".dimmed(),
            phase.dimmed(),
            step.id(),
            step.label().dimmed()
        ),
    }
}
