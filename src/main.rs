use clap::{Parser as ClapParser, Subcommand};
use docql::cli::{
    self, CheckOptions, CliError, EvalOptions, ExecOptions, ExecResult, PlanOptions, QueryOptions,
};
use docql::value::{Value, to_json, to_json_pretty};
use std::fs;
use std::io::{self, Read};

#[derive(ClapParser)]
#[command(name = "docql")]
#[command(about = "docql - query JSON documents with a SQL-like language")]
#[command(version)]
struct Cli {
    /// Log planning and execution to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate an expression against a JSON document
    Eval {
        /// The expression to evaluate
        expr: String,

        /// JSON input (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<String>,

        /// Named parameter, as name=<json>
        #[arg(short = 'P', long = "param")]
        params: Vec<String>,

        /// Positional parameter as JSON ($1, $2, ...)
        #[arg(short = 'a', long = "arg")]
        args: Vec<String>,

        /// Pretty-print the output
        #[arg(short, long)]
        pretty: bool,
    },

    /// Parse and validate a statement, printing its canonical form
    Check {
        /// The SELECT statement to check
        query: String,
    },

    /// Run a SELECT statement over documents from a JSON file
    Query {
        /// The SELECT statement to run
        query: String,

        /// File mapping keyspace names to documents by key
        #[arg(short, long)]
        data: String,

        /// Named parameter, as name=<json>
        #[arg(short = 'P', long = "param")]
        params: Vec<String>,

        /// Positional parameter as JSON ($1, $2, ...)
        #[arg(short = 'a', long = "arg")]
        args: Vec<String>,

        /// Pretty-print the output
        #[arg(short, long)]
        pretty: bool,
    },

    /// Print the execution plan of a SELECT statement
    Plan {
        /// The SELECT statement to plan
        query: String,

        /// File mapping keyspace names to documents by key
        #[arg(short, long)]
        data: Option<String>,

        /// Print an indented outline instead of JSON
        #[arg(short, long)]
        explain: bool,
    },

    /// Run a JSON plan (from a file, or '-' for stdin)
    Exec {
        /// Plan file, or '-' for stdin
        plan: String,

        /// File mapping keyspace names to documents by key
        #[arg(short, long)]
        data: Option<String>,

        /// Named parameter, as name=<json>
        #[arg(short = 'P', long = "param")]
        params: Vec<String>,

        /// Positional parameter as JSON ($1, $2, ...)
        #[arg(short = 'a', long = "arg")]
        args: Vec<String>,

        /// Only decode the plan and print its outline
        #[arg(short, long)]
        explain: bool,

        /// Pretty-print the output
        #[arg(short, long)]
        pretty: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let result = match cli.command {
        Commands::Eval {
            expr,
            input,
            params,
            args,
            pretty,
        } => run_eval(expr, input, params, args, pretty),
        Commands::Check { query } => {
            cli::execute_check(&CheckOptions { query }).map(|text| println!("{text}"))
        }
        Commands::Query {
            query,
            data,
            params,
            args,
            pretty,
        } => read_file(&data).and_then(|data| {
            let rows = cli::execute_query(&QueryOptions {
                query,
                data,
                params,
                args,
            })?;
            print_value(&Value::Array(rows), pretty);
            Ok(())
        }),
        Commands::Plan {
            query,
            data,
            explain,
        } => data.as_deref().map(read_file).transpose().and_then(|data| {
            let plan = cli::execute_plan(&PlanOptions {
                query,
                data,
                explain,
            })?;
            print!("{plan}");
            if !explain {
                println!();
            }
            Ok(())
        }),
        Commands::Exec {
            plan,
            data,
            params,
            args,
            explain,
            pretty,
        } => run_exec(plan, data, params, args, explain, pretty),
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn read_stdin() -> Result<String, CliError> {
    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    Ok(buffer)
}

fn read_file(path: &str) -> Result<String, CliError> {
    if path == "-" {
        return read_stdin();
    }
    Ok(fs::read_to_string(path)?)
}

fn print_value(value: &Value, pretty: bool) {
    if pretty {
        println!("{}", to_json_pretty(value));
    } else {
        println!("{}", to_json(value));
    }
}

fn run_eval(
    expr: String,
    input: Option<String>,
    params: Vec<String>,
    args: Vec<String>,
    pretty: bool,
) -> Result<(), CliError> {
    let input = match input {
        Some(s) => Some(s),
        None if !atty::is(atty::Stream::Stdin) => Some(read_stdin()?),
        None => None,
    };

    let options = EvalOptions {
        expr,
        input,
        params,
        args,
    };
    let value = cli::execute_eval(&options)?;
    if value.is_missing() {
        println!("missing");
    } else {
        print_value(&value, pretty);
    }
    Ok(())
}

fn run_exec(
    plan: String,
    data: Option<String>,
    params: Vec<String>,
    args: Vec<String>,
    explain: bool,
    pretty: bool,
) -> Result<(), CliError> {
    let options = ExecOptions {
        plan: read_file(&plan)?,
        data: data.as_deref().map(read_file).transpose()?,
        params,
        args,
        explain,
    };

    match cli::execute_exec(&options)? {
        ExecResult::Explained(text) => print!("{text}"),
        ExecResult::Rows(rows) => print_value(&Value::Array(rows), pretty),
    }
    Ok(())
}
