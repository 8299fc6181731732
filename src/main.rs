use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use coltree::{FilterColumn, Pattern, Session, TreeModel, Value, filter, statics};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "coltree", version, about = statics::EN_APP_ABOUT)]
struct Cli {
    /// Document to open (`.json`, or `.gz` for gzip-compressed JSON).
    file: PathBuf,

    /// Write changes to this path instead of back to FILE.
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// More log output (-v debug, -vv trace). RUST_LOG overrides this.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

/// Rows are named by paths from the top level, e.g. `0/2/1`; an empty path
/// is the top level itself. Columns are given by name or by index.
#[derive(Subcommand, Debug)]
enum Command {
    /// Print the tree, optionally filtered.
    Show {
        /// Case-insensitive regex (or plain text) to filter rows by.
        #[arg(short, long, default_value = "")]
        pattern: String,
        /// Only test this column against the pattern.
        #[arg(short, long)]
        column: Option<String>,
    },
    /// List the column schema.
    Columns,
    /// Distinct values of a column.
    Values { column: String },
    /// Print one field.
    Get { path: String, column: String },
    /// Set one field. VALUE is read as JSON, falling back to a plain string.
    Set {
        path: String,
        column: String,
        value: String,
    },
    /// Insert empty rows under a parent (appends by default).
    Insert {
        #[arg(default_value = "")]
        parent: String,
        #[arg(long)]
        row: Option<usize>,
        #[arg(long, default_value_t = 1)]
        count: usize,
    },
    /// Remove rows and their subtrees.
    Remove {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Add a column to the schema.
    AddColumn {
        name: String,
        #[arg(long)]
        at: Option<usize>,
    },
    /// Drop a column from the schema (stored values are kept in the file).
    RemoveColumn { column: String },
    /// Rename a column.
    RenameColumn { column: String, name: String },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut session = Session::load_path(&cli.file)?;
    run(cli.command, &mut session)?;

    if session.is_dirty() {
        match cli.output {
            Some(path) => session.save_to_path(&path)?,
            None => session.save()?,
        }
    }
    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run(command: Command, session: &mut Session) -> anyhow::Result<()> {
    match command {
        Command::Show { pattern, column } => {
            let model = session.model();
            let target = match column {
                Some(c) => FilterColumn::Column(resolve_column(model, &c)?),
                None => FilterColumn::All,
            };
            print_tree(model, &Pattern::new(&pattern), target)?;
        }
        Command::Columns => {
            let model = session.model();
            if model.column_count() == 0 {
                println!("{}", statics::EN_NO_COLUMNS);
            }
            for (i, name) in model.columns().iter().enumerate() {
                println!("{i}\t{name}");
            }
        }
        Command::Values { column } => {
            let model = session.model();
            let column = resolve_column(model, &column)?;
            for value in filter::distinct_values(model, column)? {
                println!("{value}");
            }
        }
        Command::Get { path, column } => {
            let model = session.model();
            let (row, parent) = resolve_row(model, &path)?;
            let column = resolve_column(model, &column)?;
            println!("{}", model.value(row, column, parent)?.display_text());
        }
        Command::Set {
            path,
            column,
            value,
        } => {
            let model = session.model_mut();
            let (row, parent) = resolve_row(model, &path)?;
            let column = resolve_column(model, &column)?;
            model.set_value(row, column, parent, parse_value(&value))?;
        }
        Command::Insert { parent, row, count } => {
            let model = session.model_mut();
            let parent = model.resolve_path(&parse_path(&parent)?)?;
            let row = match row {
                Some(row) => row,
                None => model.row_count(parent)?,
            };
            model.insert_rows(row, count, parent)?;
        }
        Command::Remove { paths } => {
            let model = session.model_mut();
            let selection = paths
                .iter()
                .map(|p| Ok(model.resolve_path(&parse_path(p)?)?))
                .collect::<anyhow::Result<Vec<_>>>()?;
            model.remove_items(&selection)?;
        }
        Command::AddColumn { name, at } => {
            let model = session.model_mut();
            let index = at.unwrap_or(model.column_count());
            model.insert_columns(index, 1)?;
            model.set_column_name(index, name)?;
        }
        Command::RemoveColumn { column } => {
            let model = session.model_mut();
            let index = resolve_column(model, &column)?;
            model.remove_columns(index, 1)?;
        }
        Command::RenameColumn { column, name } => {
            let model = session.model_mut();
            let index = resolve_column(model, &column)?;
            model.set_column_name(index, name)?;
        }
    }
    Ok(())
}

fn print_tree(model: &TreeModel, pattern: &Pattern, target: FilterColumn) -> anyhow::Result<()> {
    let visible = filter::visible_items(model, pattern, target)?;
    tracing::debug!(
        pattern = pattern.as_str(),
        ?target,
        shown = visible.len(),
        "filtered rows"
    );
    if visible.is_empty() {
        println!("{}", statics::EN_NO_MATCHES);
        return Ok(());
    }

    let mut header = vec![statics::EN_HEADER_ROW.to_string()];
    header.extend(model.columns().iter().cloned());
    println!("{}", header.join("\t"));

    for id in visible {
        let path = model.path_of(id)?;
        let depth = path.len().saturating_sub(1);
        let label = path
            .iter()
            .map(usize::to_string)
            .collect::<Vec<_>>()
            .join(&statics::PATH_SEPARATOR.to_string());
        let mut cells = vec![format!("{}{label}", "  ".repeat(depth))];
        for column in 0..model.column_count() {
            cells.push(model.item_value(id, column)?.display_text());
        }
        println!("{}", cells.join("\t"));
    }
    Ok(())
}

fn parse_path(text: &str) -> anyhow::Result<Vec<usize>> {
    text.split(statics::PATH_SEPARATOR)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.trim()
                .parse::<usize>()
                .with_context(|| format!("{}: {text:?}", statics::EN_ERR_BAD_PATH))
        })
        .collect()
}

/// Split a row path into the `(row, parent)` address of its last element.
fn resolve_row(model: &TreeModel, text: &str) -> anyhow::Result<(usize, coltree::ItemId)> {
    let mut path = parse_path(text)?;
    let row = path
        .pop()
        .with_context(|| format!("{}: {text:?}", statics::EN_ERR_BAD_PATH))?;
    Ok((row, model.resolve_path(&path)?))
}

fn resolve_column(model: &TreeModel, text: &str) -> anyhow::Result<usize> {
    if let Some(index) = model.column_index(text) {
        return Ok(index);
    }
    match text.parse::<usize>() {
        Ok(index) if index < model.column_count() => Ok(index),
        _ => anyhow::bail!("{}: {text:?}", statics::EN_ERR_UNKNOWN_COLUMN),
    }
}

fn parse_value(text: &str) -> Value {
    Value::parse(text).unwrap_or_else(|_| Value::from(text))
}
