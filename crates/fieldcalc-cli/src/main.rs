//! fieldcalc CLI - formula checking and row computation tool

mod json;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use fieldcalc::date::parse_date;
use fieldcalc::prelude::*;
use fieldcalc::{tokenize, TokenKind};
use log::LevelFilter;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "fieldcalc")]
#[command(author, version, about = "Check and evaluate virtual-field formulas")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the tokens of a formula
    Tokens {
        /// Formula text
        formula: String,
    },

    /// Print the syntax tree of a formula
    Parse {
        /// Formula text
        formula: String,
    },

    /// Check a formula for syntax errors
    Check {
        /// Formula text
        formula: String,

        /// Schema file; references to fields it does not declare are reported
        #[arg(short, long)]
        schema: Option<PathBuf>,
    },

    /// Evaluate a formula against one row
    Eval {
        /// Formula text
        formula: String,

        /// Schema file (default: field types guessed from the row)
        #[arg(short, long)]
        schema: Option<PathBuf>,

        /// Row as a JSON object
        #[arg(short, long, default_value = "{}")]
        row: String,

        /// Clock for NOW() and TODAY() (RFC 3339)
        #[arg(long)]
        now: Option<String>,
    },

    /// Compute every formula field of each row, printing JSON lines
    Compute {
        /// Schema file
        #[arg(short, long)]
        schema: PathBuf,

        /// Rows as a JSON array or JSON lines (default: stdin)
        #[arg(short, long)]
        rows: Option<PathBuf>,

        /// Formula field ordering
        #[arg(short, long, value_enum, default_value_t = Order::Declared)]
        order: Order,

        /// Clock for NOW() and TODAY() (RFC 3339)
        #[arg(long)]
        now: Option<String>,

        /// Print calculation statistics to stderr
        #[arg(long)]
        stats: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Order {
    /// Declaration order
    Declared,
    /// Referenced formula fields first
    Dependency,
}

impl From<Order> for EvaluationOrder {
    fn from(order: Order) -> Self {
        match order {
            Order::Declared => EvaluationOrder::Declared,
            Order::Dependency => EvaluationOrder::Dependency,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Tokens { formula } => print_tokens(&formula),
        Commands::Parse { formula } => print_ast(&formula),
        Commands::Check { formula, schema } => check(&formula, schema.as_deref()),
        Commands::Eval {
            formula,
            schema,
            row,
            now,
        } => eval(&formula, schema.as_deref(), &row, now.as_deref()),
        Commands::Compute {
            schema,
            rows,
            order,
            now,
            stats,
        } => compute(&schema, rows.as_deref(), order, now.as_deref(), stats),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    // RUST_LOG overrides the flag
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn print_tokens(formula: &str) -> Result<()> {
    let tokens = tokenize(formula).map_err(|e| syntax_failure(formula, &e))?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for token in &tokens {
        writeln!(
            out,
            "{:>4}  {:<16} {}",
            token.position,
            token_kind_name(&token.kind),
            token.text
        )?;
    }
    Ok(())
}

fn token_kind_name(kind: &TokenKind) -> &'static str {
    match kind {
        TokenKind::Number(_) => "NUMBER",
        TokenKind::String(_) => "STRING",
        TokenKind::FieldReference { .. } => "FIELD_REFERENCE",
        TokenKind::Operator(_) => "OPERATOR",
        TokenKind::Logical(_) => "LOGICAL",
        TokenKind::Boolean(_) => "BOOLEAN",
        TokenKind::FunctionName(_) => "FUNCTION_NAME",
        TokenKind::LParen => "LPAREN",
        TokenKind::RParen => "RPAREN",
        TokenKind::Comma => "COMMA",
        TokenKind::End => "END",
    }
}

fn print_ast(formula: &str) -> Result<()> {
    let ast = parse_formula(formula).map_err(|e| syntax_failure(formula, &e))?;
    println!("{:#?}", ast);
    Ok(())
}

fn check(formula: &str, schema: Option<&Path>) -> Result<()> {
    let ast = parse_formula(formula).map_err(|e| syntax_failure(formula, &e))?;

    if let Some(path) = schema {
        let catalog = load_catalog(path)?;
        for name in ast.field_references() {
            if let Err(e) = catalog.require(&name) {
                eprintln!("warning: {}; the reference evaluates to #FIELD!", e);
            }
        }
    }

    if ast.is_volatile() {
        eprintln!("note: the result depends on the current time (NOW/TODAY)");
    }

    println!("ok");
    Ok(())
}

/// Print a syntax error with a caret under the failing position
fn syntax_failure(formula: &str, error: &SyntaxError) -> anyhow::Error {
    let offset = error.position().min(formula.len());
    let column = formula
        .get(..offset)
        .map_or(offset, |prefix| prefix.chars().count());

    eprintln!("{}", formula);
    eprintln!("{}^", " ".repeat(column));
    anyhow::Error::new(error.clone()).context("Invalid formula")
}

fn eval(formula: &str, schema: Option<&Path>, row: &str, now: Option<&str>) -> Result<()> {
    let row = json::parse_row(row)?;
    let fields = match schema {
        Some(path) => load_catalog(path)?.fields().to_vec(),
        None => json::infer_fields(&row),
    };

    let mut ctx = EvaluationContext::new(&row, &fields);
    if let Some(now) = parse_now(now)? {
        ctx = ctx.with_now(now);
    }

    match evaluate_formula(formula, &ctx) {
        Ok(value) => println!("{}", value),
        Err(error) => println!("{}", error),
    }
    Ok(())
}

fn compute(
    schema: &Path,
    rows: Option<&Path>,
    order: Order,
    now: Option<&str>,
    print_stats: bool,
) -> Result<()> {
    let catalog = load_catalog(schema)?;
    let rows = json::parse_rows(&read_input(rows)?)?;

    let mut options = CalculationOptions {
        order: order.into(),
        ..Default::default()
    };
    if let Some(now) = parse_now(now)? {
        options = options.with_now(now);
    }

    let calculator = RowCalculator::new(&catalog, options);
    log::info!(
        "computing {} formula fields for {} rows",
        calculator.formula_count(),
        rows.len()
    );

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut totals = CalculationStats::default();

    for row in &rows {
        let computed = calculator.compute(row);
        serde_json::to_writer(&mut out, &json::from_row(&computed.row))?;
        writeln!(out)?;

        totals.fields_calculated += computed.stats.fields_calculated;
        totals.errors += computed.stats.errors;
        totals.blank += computed.stats.blank;
        totals.circular_references = computed.stats.circular_references;
    }
    out.flush()?;

    if print_stats {
        eprintln!(
            "Computed {} rows: {} formulas evaluated, {} errors, {} blank, {} circular fields",
            rows.len(),
            totals.fields_calculated,
            totals.errors,
            totals.blank,
            totals.circular_references
        );
    }
    Ok(())
}

fn load_catalog(path: &Path) -> Result<FieldCatalog> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read schema '{}'", path.display()))?;
    let schema = json::Schema::from_json(&text)
        .with_context(|| format!("Failed to load schema '{}'", path.display()))?;
    FieldCatalog::new(schema.fields)
        .with_context(|| format!("Invalid field catalog in '{}'", path.display()))
}

fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read rows '{}'", path.display())),
        _ => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read rows from stdin")?;
            Ok(text)
        }
    }
}

fn parse_now(now: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    match now {
        None => Ok(None),
        Some(text) => match parse_date(text) {
            Some(instant) => Ok(Some(instant)),
            None => bail!("Invalid --now value '{}'", text),
        },
    }
}
