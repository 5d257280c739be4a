//! fml CLI: evaluate formulas, compile batches to chunks and run them.

use std::env;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process;

use colored::Colorize;
use mimalloc::MiMalloc;
use tracing::Level;

use formulang::bytecode::{self, Chunk};
use formulang::error::FormulaError;
use formulang::{DefaultEnvironment, Environment, ExecutionMode, Instance, Runner, Value};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// CLI command to execute.
enum Command {
    /// Evaluate formulas given on the command line
    Eval { code: Vec<String> },
    /// Run a formula file, one formula per line
    Run { file: String },
    /// Compile a formula file to a chunk
    Compile { file: String, output: Option<String> },
    /// Run a compiled chunk
    Exec { file: String },
    /// Print the bytecode listing of a formula file or a chunk
    Disasm { file: String },
}

/// CLI options parsed from arguments.
struct Options {
    command: Command,
    mode: ExecutionMode,
    need_sort: bool,
    trace: bool,
    json: bool,
    env_file: Option<String>,
    sets: Vec<(String, String)>,
}

fn print_usage() {
    eprintln!("fml {} - formula evaluator", VERSION);
    eprintln!();
    eprintln!("Usage: fml eval <formula>... [options]");
    eprintln!("       fml run <file> [options]");
    eprintln!("       fml compile <file> [-o <chunk>]");
    eprintln!("       fml exec <chunk> [options]");
    eprintln!("       fml disasm <file|chunk>");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --tree            Evaluate by walking the syntax tree (default)");
    eprintln!("  --vm              Compile to bytecode and run on the VM");
    eprintln!("  --no-sort         Keep input order instead of sorting by dependencies");
    eprintln!("  --env <file>      Load variables from a JSON object");
    eprintln!("  --set name=value  Set a variable (value parsed as JSON, else a string)");
    eprintln!("  --json            Print results as JSON");
    eprintln!("  --trace           Log pipeline phases to stderr");
    eprintln!("  -o <file>         Output path for compile");
    eprintln!("  --help, -h        Show this help message");
    eprintln!();
    eprintln!("Formula files hold one formula per line; blank lines and lines");
    eprintln!("starting with // are skipped.");
}

fn usage_error(message: &str) -> ! {
    eprintln!("{}", message);
    print_usage();
    process::exit(64);
}

fn parse_args() -> Options {
    let args: Vec<String> = env::args().skip(1).collect();
    let mut positional = Vec::new();
    let mut output = None;
    let mut options = Options {
        command: Command::Eval { code: Vec::new() },
        mode: ExecutionMode::TreeWalk,
        need_sort: true,
        trace: false,
        json: false,
        env_file: None,
        sets: Vec::new(),
    };

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_usage();
                process::exit(0);
            }
            "--version" | "-v" => {
                println!("fml {}", VERSION);
                process::exit(0);
            }
            "--tree" => options.mode = ExecutionMode::TreeWalk,
            "--vm" => options.mode = ExecutionMode::Bytecode,
            "--no-sort" => options.need_sort = false,
            "--trace" => options.trace = true,
            "--json" => options.json = true,
            "--env" => {
                i += 1;
                match args.get(i) {
                    Some(file) => options.env_file = Some(file.clone()),
                    None => usage_error("--env requires a file"),
                }
            }
            "--set" => {
                i += 1;
                let Some(assignment) = args.get(i) else {
                    usage_error("--set requires name=value");
                };
                match assignment.split_once('=') {
                    Some((name, value)) if !name.is_empty() => options
                        .sets
                        .push((name.trim().to_string(), value.to_string())),
                    _ => usage_error(&format!("Invalid --set value: {}", assignment)),
                }
            }
            "-o" => {
                i += 1;
                match args.get(i) {
                    Some(file) => output = Some(file.clone()),
                    None => usage_error("-o requires a file"),
                }
            }
            arg if arg.starts_with('-') && positional.first().map(String::as_str) != Some("eval") => {
                usage_error(&format!("Unknown option: {}", arg))
            }
            _ => positional.push(args[i].clone()),
        }
        i += 1;
    }

    let mut positional = positional.into_iter();
    let command = positional.next();
    let rest: Vec<String> = positional.collect();
    let file = || {
        rest.first()
            .cloned()
            .unwrap_or_else(|| usage_error("A file argument is required"))
    };
    options.command = match command.as_deref() {
        Some("eval") => {
            let code = rest.clone();
            if code.is_empty() {
                usage_error("eval requires at least one formula");
            }
            Command::Eval { code }
        }
        Some("run") => Command::Run { file: file() },
        Some("compile") => Command::Compile {
            file: file(),
            output,
        },
        Some("exec") => Command::Exec { file: file() },
        Some("disasm") => Command::Disasm { file: file() },
        Some(other) => usage_error(&format!("Unknown command: {}", other)),
        None => {
            print_usage();
            process::exit(64);
        }
    };
    options
}

fn init_logging(trace: bool) {
    let level = if trace { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let options = parse_args();
    init_logging(options.trace);

    let mut runner = Runner::new();
    runner
        .set_execute_mode(options.mode)
        .set_need_sort(options.need_sort);

    let result = match &options.command {
        Command::Eval { code } => run_batch(&runner, code, &options),
        Command::Run { file } => {
            read_formulas(file).and_then(|lines| run_batch(&runner, &lines, &options))
        }
        Command::Compile { file, output } => run_compile(&runner, file, output.as_deref()),
        Command::Exec { file } => run_exec(&runner, file, &options),
        Command::Disasm { file } => run_disasm(&runner, file),
    };

    if let Err(e) = result {
        report(&e, options.json);
        process::exit(exit_code(&e));
    }
}

fn run_batch(runner: &Runner, lines: &[String], options: &Options) -> Result<(), FormulaError> {
    let mut env = load_environment(options)?;
    let values = runner.execute_batch(lines, &mut env)?;
    print_values(&values, options.json);
    Ok(())
}

fn run_compile(runner: &Runner, file: &str, output: Option<&str>) -> Result<(), FormulaError> {
    let lines = read_formulas(file)?;
    let chunk = runner.compile_source(&lines)?;
    let output = output
        .map(PathBuf::from)
        .unwrap_or_else(|| Path::new(file).with_extension("chunk"));
    chunk.write_to(&mut File::create(&output)?)?;
    println!(
        "{} {} formulas -> {} ({} bytes: {} code, {} constants, {} vars)",
        "Compiled".green().bold(),
        lines.len(),
        output.display(),
        chunk.byte_size(),
        chunk.codes_size(),
        chunk.consts_size(),
        chunk.vars_size()
    );
    Ok(())
}

fn run_exec(runner: &Runner, file: &str, options: &Options) -> Result<(), FormulaError> {
    let chunk = Chunk::read_from(&mut File::open(file)?)?;
    let mut env = load_environment(options)?;
    let values = runner.run_chunk(&chunk, &mut env)?;
    print_values(&values, options.json);
    Ok(())
}

/// Chunks are listed as they are; anything that does not decode as a chunk is compiled first.
fn run_disasm(runner: &Runner, file: &str) -> Result<(), FormulaError> {
    let bytes = fs::read(file)?;
    let chunk = match Chunk::from_bytes(&bytes) {
        Ok(chunk) if bytecode::disassemble(&chunk).is_ok() => chunk,
        _ => runner.compile_source(&formula_lines(&String::from_utf8_lossy(&bytes)))?,
    };
    bytecode::print_disassembly(&chunk)?;
    Ok(())
}

fn read_formulas(file: &str) -> Result<Vec<String>, FormulaError> {
    Ok(formula_lines(&fs::read_to_string(file)?))
}

fn formula_lines(source: &str) -> Vec<String> {
    source
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("//"))
        .map(String::from)
        .collect()
}

fn load_environment(options: &Options) -> Result<DefaultEnvironment, FormulaError> {
    let mut env = DefaultEnvironment::new();
    if let Some(file) = &options.env_file {
        let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(file)?)
            .map_err(|e| invalid_input(format!("{}: {}", file, e)))?;
        let serde_json::Value::Object(map) = json else {
            return Err(invalid_input(format!("{}: expected a JSON object", file)));
        };
        for (name, value) in map {
            env.put(&name, from_json(value)?);
        }
    }
    for (name, text) in &options.sets {
        let value = match serde_json::from_str(text) {
            Ok(json) => from_json(json)?,
            Err(_) => Value::String(text.clone()),
        };
        env.put(name, value);
    }
    Ok(env)
}

/// Objects become instances; arrays have no formula counterpart.
fn from_json(json: serde_json::Value) -> Result<Value, FormulaError> {
    Ok(match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Boolean(b),
        serde_json::Value::Number(n) => match n.as_i64().and_then(|n| i32::try_from(n).ok()) {
            Some(n) => Value::Integer(n),
            None => Value::Double(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Object(map) => {
            let mut instance = Instance::new();
            for (name, value) in map {
                instance.set(name, from_json(value)?);
            }
            Value::instance(instance)
        }
        serde_json::Value::Array(_) => {
            return Err(invalid_input("arrays are not supported as variables"))
        }
    })
}

fn invalid_input(message: impl Into<String>) -> FormulaError {
    FormulaError::Io(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        message.into(),
    ))
}

fn print_values(values: &[Value], json: bool) {
    if json {
        match serde_json::to_string_pretty(values) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("{} {}", "Error:".red().bold(), e),
        }
        return;
    }
    for value in values {
        println!("{}", value);
    }
}

fn report(error: &FormulaError, json: bool) {
    if let FormulaError::Aborted(run) = error {
        let results: Vec<_> = run.completed.iter().chain(&run.failed).collect();
        if json {
            if let Ok(text) = serde_json::to_string_pretty(&results) {
                println!("{}", text);
            }
        } else {
            for result in results {
                match &result.error {
                    Some(message) => {
                        println!("{} {}", format!("[{}]", result.index).red(), message)
                    }
                    None => println!("{} {}", format!("[{}]", result.index).dimmed(), result.value),
                }
            }
        }
    }
    eprintln!("{} {}", "Error:".red().bold(), error);
}

fn exit_code(error: &FormulaError) -> i32 {
    match error {
        FormulaError::Lexer(_)
        | FormulaError::Parser(_)
        | FormulaError::Analysis(_)
        | FormulaError::Compile(_)
        | FormulaError::Format(_) => 65,
        FormulaError::Io(_) => 74,
        FormulaError::Runtime(_) | FormulaError::Aborted(_) | FormulaError::Rejected => 70,
    }
}
