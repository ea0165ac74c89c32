//! Command-line argument parser.
//!
//! Hand-rolled for zero-overhead startup. Options are parsed left to right;
//! the first non-option names a script, and everything after it belongs to
//! the script. Engine tuning flags carry their raw text here and are
//! validated later, in [`crate::config`], so a bad `--max-frames` value
//! reports as a usage error rather than a parse failure.

use std::ffi::OsString;
use std::path::PathBuf;

// =============================================================================
// Execution Mode
// =============================================================================

/// What the driver should execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Run a script file: `lumen script.lum [args...]`
    Script(PathBuf),
    /// Run a program string: `lumen -c "print(1);"`
    Command(String),
    /// Read the program from stdin: `echo "print(1);" | lumen -`
    Stdin,
    /// Interactive REPL: `lumen` with no arguments.
    Repl,
    /// Print version and exit: `lumen -V` or `lumen --version`
    PrintVersion,
    /// Print help and exit: `lumen -h` or `lumen --help`
    PrintHelp,
}

// =============================================================================
// Parsed Arguments
// =============================================================================

/// Complete set of parsed CLI arguments.
///
/// Tuning values (`marker_grammar`, `boundary_policy`, `max_frames`) stay as
/// raw strings; [`crate::config::RuntimeConfig::from_args`] resolves them
/// against the environment and rejects nonsense.
#[derive(Debug, Clone)]
pub struct LumenArgs {
    /// What to execute.
    pub mode: ExecutionMode,

    /// Arguments visible to the program. For scripts, the first element is
    /// the script path; for `-c`, it is `"-c"`; for stdin, `"-"`.
    pub script_args: Vec<String>,

    /// `--check`: parse and validate only, print diagnostics, never run.
    pub check: bool,

    /// `-i`: enter the REPL after running the script or command.
    pub inspect: bool,

    /// `-q`: quiet mode (suppress the banner on interactive startup).
    pub quiet: bool,

    /// `-E`: ignore `LUMEN*` environment variables.
    pub ignore_environment: bool,

    /// `-X <option>`: engine options, in order of specification.
    pub x_options: Vec<String>,

    /// `--marker-grammar <g>`: raw grammar name, unvalidated.
    pub marker_grammar: Option<String>,

    /// `--boundary-policy <p>`: raw policy name, unvalidated.
    pub boundary_policy: Option<String>,

    /// `--max-frames <n>`: raw depth limit, unvalidated.
    pub max_frames: Option<String>,
}

impl Default for LumenArgs {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Repl,
            script_args: Vec::new(),
            check: false,
            inspect: false,
            quiet: false,
            ignore_environment: false,
            x_options: Vec::new(),
            marker_grammar: None,
            boundary_policy: None,
            max_frames: None,
        }
    }
}

// =============================================================================
// Parse Error
// =============================================================================

/// Error during argument parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgError {
    /// Missing required argument value (e.g., `-c` without a program).
    MissingValue(&'static str),
    /// Unknown flag.
    UnknownFlag(String),
}

impl std::fmt::Display for ArgError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArgError::MissingValue(flag) => {
                write!(f, "Argument expected for the {} option", flag)
            }
            ArgError::UnknownFlag(flag) => {
                write!(f, "Unknown option: {}", flag)
            }
        }
    }
}

impl std::error::Error for ArgError {}

// =============================================================================
// Parser Entry Point
// =============================================================================

/// Parse command-line arguments into `LumenArgs`.
///
/// Parsing rules:
///
/// 1. Options are parsed left-to-right until a non-option or `--` is found.
/// 2. After `-c <program>`, all remaining args go to the program.
/// 3. After a script path, all remaining args go to the script.
/// 4. `-` means read the program from stdin.
/// 5. If no mode is specified, enter the REPL.
pub fn parse_args<I, S>(args: I) -> Result<LumenArgs, ArgError>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
{
    let args: Vec<String> = args
        .into_iter()
        .map(|s| s.into().to_string_lossy().into_owned())
        .collect();

    parse_args_vec(&args)
}

/// Parse from a pre-collected `Vec<String>`.
///
/// The first element should be the first argument, NOT the program name;
/// the caller is responsible for skipping `argv[0]`.
pub fn parse_args_vec(args: &[String]) -> Result<LumenArgs, ArgError> {
    let mut result = LumenArgs::default();
    let mut i = 0;

    while i < args.len() {
        let arg = &args[i];

        // `--` terminates option parsing; rest goes to script_args.
        if arg == "--" {
            i += 1;
            // If no mode set yet, remaining args are script path + script args.
            if result.mode == ExecutionMode::Repl && i < args.len() {
                result.mode = ExecutionMode::Script(PathBuf::from(&args[i]));
                result.script_args.push(args[i].clone());
                i += 1;
            }
            while i < args.len() {
                result.script_args.push(args[i].clone());
                i += 1;
            }
            break;
        }

        // Non-option: treat as script path (or `-` as stdin).
        if !arg.starts_with('-') || arg == "-" {
            if arg == "-" {
                result.mode = ExecutionMode::Stdin;
                result.script_args.push("-".to_string());
            } else {
                result.mode = ExecutionMode::Script(PathBuf::from(arg));
                result.script_args.push(arg.clone());
            }
            i += 1;
            while i < args.len() {
                result.script_args.push(args[i].clone());
                i += 1;
            }
            break;
        }

        // Option parsing: handle `-qEi` bundled short options.
        let flag_chars: Vec<char> = arg[1..].chars().collect();
        let mut j = 0;

        while j < flag_chars.len() {
            match flag_chars[j] {
                'V' => {
                    result.mode = ExecutionMode::PrintVersion;
                    return Ok(result);
                }
                'h' => {
                    result.mode = ExecutionMode::PrintHelp;
                    return Ok(result);
                }
                'c' => {
                    // `-c <program>`: rest of this arg or the next arg is the
                    // program text; terminates option parsing.
                    let program = if j + 1 < flag_chars.len() {
                        flag_chars[j + 1..].iter().collect::<String>()
                    } else {
                        i += 1;
                        if i >= args.len() {
                            return Err(ArgError::MissingValue("-c"));
                        }
                        args[i].clone()
                    };
                    result.mode = ExecutionMode::Command(program);
                    result.script_args.push("-c".to_string());
                    i += 1;
                    while i < args.len() {
                        result.script_args.push(args[i].clone());
                        i += 1;
                    }
                    return Ok(result);
                }
                'X' => {
                    // `-X <option>`: engine option.
                    let opt = if j + 1 < flag_chars.len() {
                        flag_chars[j + 1..].iter().collect::<String>()
                    } else {
                        i += 1;
                        if i >= args.len() {
                            return Err(ArgError::MissingValue("-X"));
                        }
                        args[i].clone()
                    };
                    result.x_options.push(opt);
                    // Consumed rest of bundled chars.
                    j = flag_chars.len();
                    continue;
                }
                'i' => result.inspect = true,
                'q' => result.quiet = true,
                'E' => result.ignore_environment = true,
                '-' => {
                    // Long option: `--check`, `--marker-grammar g`,
                    // `--boundary-policy=warn`.
                    let long_opt: String = flag_chars[j..].iter().collect();
                    let (name, inline_value) = match long_opt.split_once('=') {
                        Some((n, v)) => (n, Some(v.to_string())),
                        None => (long_opt.as_str(), None),
                    };
                    match name {
                        "-version" => {
                            result.mode = ExecutionMode::PrintVersion;
                            return Ok(result);
                        }
                        "-help" => {
                            result.mode = ExecutionMode::PrintHelp;
                            return Ok(result);
                        }
                        "-check" => result.check = true,
                        "-marker-grammar" => {
                            result.marker_grammar = Some(long_value(
                                inline_value,
                                args,
                                &mut i,
                                "--marker-grammar",
                            )?);
                        }
                        "-boundary-policy" => {
                            result.boundary_policy = Some(long_value(
                                inline_value,
                                args,
                                &mut i,
                                "--boundary-policy",
                            )?);
                        }
                        "-max-frames" => {
                            result.max_frames =
                                Some(long_value(inline_value, args, &mut i, "--max-frames")?);
                        }
                        _ => {
                            return Err(ArgError::UnknownFlag(format!("-{}", name)));
                        }
                    }
                    j = flag_chars.len();
                    continue;
                }
                other => {
                    return Err(ArgError::UnknownFlag(format!("-{}", other)));
                }
            }
            j += 1;
        }

        i += 1;
    }

    Ok(result)
}

/// Value of a long option: the `=`-joined text if present, otherwise the
/// next argument.
fn long_value(
    inline: Option<String>,
    args: &[String],
    i: &mut usize,
    flag: &'static str,
) -> Result<String, ArgError> {
    if let Some(value) = inline {
        return Ok(value);
    }
    *i += 1;
    if *i >= args.len() {
        return Err(ArgError::MissingValue(flag));
    }
    Ok(args[*i].clone())
}

// =============================================================================
// Version / Help Text
// =============================================================================

/// Build the version string.
///
/// Output: `Lumen <version> (dialect <language_version>)`
#[inline]
pub fn version_string() -> String {
    format!(
        "Lumen {} (dialect {}.{}.{})",
        lumen_core::VERSION,
        lumen_core::LANGUAGE_VERSION.0,
        lumen_core::LANGUAGE_VERSION.1,
        lumen_core::LANGUAGE_VERSION.2,
    )
}

/// Build the help text.
pub fn help_text() -> String {
    format!(
        r#"usage: lumen [option] ... [-c program | file | -] [arg] ...
Options (and corresponding environment variables):
-c prog : program passed in as string (terminates option list)
-E      : ignore LUMEN* environment variables
-h      : print this help message and exit (also --help)
-i      : inspect interactively after running script (LUMEN_INSPECT=x)
-q      : don't print the version banner on interactive startup
-V      : print the Lumen version number and exit (also --version)
-X opt  : set engine option; the last one wins (tco=on|off, notco)
--check : parse and validate only; print diagnostics without running
--marker-grammar g  : marker surface: statement, expression, or sigil
                      (LUMEN_MARKER_GRAMMAR)
--boundary-policy p : cross-realm tail calls: allow, warn, or error
                      (LUMEN_BOUNDARY_POLICY)
--max-frames n      : ordinary-call depth limit (LUMEN_MAX_FRAMES)
file    : program read from script file
-       : program read from stdin
arg ... : arguments passed to the program

Lumen {} - scripting engine with opt-in tail-call optimization
dialect {}.{}.{}"#,
        lumen_core::VERSION,
        lumen_core::LANGUAGE_VERSION.0,
        lumen_core::LANGUAGE_VERSION.1,
        lumen_core::LANGUAGE_VERSION.2,
    )
}

// =============================================================================
// Tests
// =============================================================================
