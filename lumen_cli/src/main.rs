//! Lumen: command-line driver for the Lumen scripting engine.
//!
//! Dispatches between script, `-c`, stdin, check-only, and REPL modes.
//! Exit codes follow the conventional split: 0 for success, 1 for compile
//! or runtime errors, 2 for usage errors, 120 for engine invariant
//! violations. All paths return a plain `u8`; `main` converts to
//! [`ExitCode`] exactly once.

mod args;
mod config;
mod diagnostics;
mod error;

use std::io::{self, Read, Write};
use std::process::ExitCode;

use args::ExecutionMode;
use config::RuntimeConfig;
use lumen_core::SourceMap;
use lumen_vm::{Engine, Value};

fn main() -> ExitCode {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    ExitCode::from(run(&argv))
}

/// Parse arguments, resolve configuration, and dispatch on mode.
fn run(argv: &[String]) -> u8 {
    let parsed = match args::parse_args_vec(argv) {
        Ok(parsed) => parsed,
        Err(err) => return usage_error(&err.to_string()),
    };

    let config = match RuntimeConfig::from_args(&parsed) {
        Ok(config) => config,
        Err(err) => return usage_error(&err.to_string()),
    };

    match &parsed.mode {
        ExecutionMode::PrintVersion => {
            println!("{}", args::version_string());
            error::EXIT_SUCCESS
        }
        ExecutionMode::PrintHelp => {
            println!("{}", args::help_text());
            error::EXIT_SUCCESS
        }
        ExecutionMode::Script(path) => {
            let name = path.display().to_string();
            let source = match std::fs::read_to_string(path) {
                Ok(source) => source,
                Err(err) => {
                    eprintln!("lumen: can't open file '{}': {}", name, err);
                    return error::EXIT_ERROR;
                }
            };
            run_program(&source, &name, &config)
        }
        ExecutionMode::Command(program) => run_program(program, "<command>", &config),
        ExecutionMode::Stdin => {
            let mut source = String::new();
            if let Err(err) = io::stdin().read_to_string(&mut source) {
                eprintln!("lumen: failed to read stdin: {}", err);
                return error::EXIT_ERROR;
            }
            run_program(&source, "<stdin>", &config)
        }
        ExecutionMode::Repl => repl_loop(Engine::new(config.engine_config()), &config),
    }
}

/// Report a bad invocation and return the usage exit code.
fn usage_error(message: &str) -> u8 {
    eprintln!("{}", message);
    eprintln!("usage: lumen [option] ... [-c program | file | -] [arg] ...");
    eprintln!("Try `lumen -h' for more information.");
    error::EXIT_USAGE_ERROR
}

/// Compile and run one complete program, or just check it.
///
/// Diagnostics and errors go to stderr; program output (via `print`) goes to
/// stdout. With `-i`, the REPL takes over the engine afterwards so the
/// script's globals stay inspectable.
fn run_program(source: &str, name: &str, config: &RuntimeConfig) -> u8 {
    let mut engine = Engine::new(config.engine_config());
    let map = SourceMap::new(source, name);

    if config.check {
        let compilation = engine.check(source);
        eprint!(
            "{}",
            diagnostics::render_diagnostic_list(&map, &compilation.diagnostics)
        );
        return if compilation.succeeded() {
            error::EXIT_SUCCESS
        } else {
            error::EXIT_ERROR
        };
    }

    let report = engine.execute(source);
    eprint!(
        "{}",
        diagnostics::render_diagnostic_list(&map, &report.compile_diagnostics)
    );

    let code = match report.outcome {
        None => error::EXIT_ERROR,
        Some(outcome) => {
            eprint!(
                "{}",
                diagnostics::render_diagnostic_list(&map, &report.runtime_warnings)
            );
            match outcome {
                Ok(_) => error::EXIT_SUCCESS,
                Err(err) => error::report_error(&err, Some(&map)),
            }
        }
    };

    if config.inspect {
        return repl_loop(engine, config);
    }
    code
}

/// Read-eval-print loop around a persistent engine.
///
/// Strictly line-based: each line is a complete program unit. Definitions
/// persist across lines because the engine's interpreter, and with it the
/// realm's globals, lives for the whole session. Expression-statement
/// values echo to stdout; `null` stays silent.
fn repl_loop(mut engine: Engine, config: &RuntimeConfig) -> u8 {
    if !config.quiet {
        println!("{}", args::version_string());
        println!("Type \"exit\" or press Ctrl-D to leave.");
    }

    let stdin = io::stdin();
    let mut line = String::new();

    loop {
        print!("> ");
        let _ = io::stdout().flush();

        line.clear();
        match stdin.read_line(&mut line) {
            Ok(0) => {
                // Ctrl-D: leave the prompt on its own line.
                println!();
                break;
            }
            Ok(_) => {}
            Err(err) => {
                eprintln!("lumen: failed to read stdin: {}", err);
                return error::EXIT_ERROR;
            }
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed == "exit" {
            break;
        }

        let map = SourceMap::new(&line, "<repl>");
        let report = engine.execute(&line);
        eprint!(
            "{}",
            diagnostics::render_diagnostic_list(&map, &report.compile_diagnostics)
        );
        let Some(outcome) = report.outcome else {
            continue;
        };
        eprint!(
            "{}",
            diagnostics::render_diagnostic_list(&map, &report.runtime_warnings)
        );
        match outcome {
            Ok(Value::Null) => {}
            Ok(value) => println!("{}", value),
            // No map: traceback frames may refer to earlier lines.
            Err(err) => {
                error::report_error(&err, None);
            }
        }
    }

    error::EXIT_SUCCESS
}

// =============================================================================
// Tests
// =============================================================================
