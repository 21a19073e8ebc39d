//! ixdb - a tiny relational shell over a disk-resident B+Tree secondary
//! index: `LOAD` a two-column (key, value) table from a CSV-ish file,
//! optionally building an index over it, then `SELECT` against it.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use ixdb_engine::{BTreeIndex, OpenMode, RecordStore, ScanPlanner, SelectRunner};

mod config;
mod statement;

use config::Config;
use statement::{Projection, Statement};

/// ixdb - loads tables and runs index-backed SELECT queries
#[derive(Parser, Debug)]
#[command(name = "ixdb")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Page size for newly created table and index files
    #[arg(short, long)]
    page_size: Option<u16>,

    /// Directory holding table and index files
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Read statements from this file instead of stdin, one per line
    command_file: Option<PathBuf>,
}

/// An open table: its record heap and, if it was loaded `WITH INDEX`,
/// the secondary index over its keys.
struct Table {
    records: RecordStore<File>,
    index: Option<BTreeIndex<File>>,
}

struct Session {
    config: Config,
    tables: HashMap<String, Table>,
}

impl Session {
    fn new(config: Config) -> Self {
        Session { config, tables: HashMap::new() }
    }

    fn execute(&mut self, stmt: Statement) -> Result<()> {
        match stmt {
            Statement::Load { table, file, with_index } => self.load(&table, &file, with_index),
            Statement::Select { table, projection, predicates } => {
                self.select(&table, projection, predicates)
            }
        }
    }

    fn load(&mut self, table: &str, file: &str, with_index: bool) -> Result<()> {
        std::fs::create_dir_all(&self.config.data_dir)?;
        let records_path = self.config.table_path(table, "tbl");
        let index_path = self.config.table_path(table, "idx");

        let mut records = RecordStore::open_with_page_size(
            &records_path,
            OpenMode::ReadWrite,
            self.config.page_size as usize,
        )
        .with_context(|| format!("opening table file {}", records_path.display()))?;
        let mut index = if with_index {
            Some(
                BTreeIndex::open_with_page_size(
                    &index_path,
                    OpenMode::ReadWrite,
                    self.config.page_size as usize,
                )
                .with_context(|| format!("opening index file {}", index_path.display()))?,
            )
        } else {
            None
        };

        let source = File::open(file).with_context(|| format!("opening load source {file}"))?;
        let mut loaded = 0u64;
        for line in io::BufReader::new(source).lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (key_str, value) = line
                .split_once(',')
                .with_context(|| format!("malformed load line: {line}"))?;
            let key: i32 = key_str
                .trim()
                .parse()
                .with_context(|| format!("malformed key in load line: {line}"))?;
            let value = value.trim();

            let rid = records.append(key, value)?;
            if let Some(index) = index.as_mut() {
                index.insert(key, rid)?;
            }
            loaded += 1;
        }

        records.flush()?;
        if let Some(index) = index.as_mut() {
            index.flush()?;
        }
        info!("loaded {loaded} rows into '{table}'");

        self.tables.insert(table.to_string(), Table { records, index });
        Ok(())
    }

    fn select(
        &mut self,
        table: &str,
        projection: Projection,
        predicates: Vec<statement::PredicateSpec>,
    ) -> Result<()> {
        let entry = self.open_table_for_select(table)?;
        let predicates: Result<Vec<_>, String> =
            predicates.into_iter().map(|p| p.into_predicate()).collect();
        let predicates = predicates.map_err(|e| anyhow::anyhow!(e))?;

        let plan = ScanPlanner::plan(&predicates);
        debug!(?plan, "planned select on '{table}'");

        let result = SelectRunner::run(
            entry.index.as_mut(),
            &mut entry.records,
            &predicates,
            projection,
        )?;
        print_result(result);
        Ok(())
    }

    /// Opens the table's files if this is the first reference to it in
    /// the session.
    fn open_table_for_select(&mut self, table: &str) -> Result<&mut Table> {
        if !self.tables.contains_key(table) {
            let records_path = self.config.table_path(table, "tbl");
            let index_path = self.config.table_path(table, "idx");
            let page_size = self.config.page_size as usize;
            let records = RecordStore::open_with_page_size(&records_path, OpenMode::ReadOnly, page_size)
                .with_context(|| format!("table '{table}' has not been loaded"))?;
            let index = BTreeIndex::open_with_page_size(&index_path, OpenMode::ReadOnly, page_size).ok();
            self.tables.insert(table.to_string(), Table { records, index });
        }
        Ok(self.tables.get_mut(table).unwrap())
    }
}

fn print_result(result: ixdb_engine::QueryResult) {
    match result {
        ixdb_engine::QueryResult::Count(n) => println!("{n}"),
        ixdb_engine::QueryResult::Rows(rows) => {
            for row in rows {
                match row.value {
                    Some(v) => println!("{}\t{}", row.key, v),
                    None => println!("{}", row.key),
                }
            }
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = Config::resolve(args.page_size, args.data_dir)?;
    let mut session = Session::new(config);

    let input: Box<dyn BufRead> = match &args.command_file {
        Some(path) => Box::new(io::BufReader::new(
            File::open(path).with_context(|| format!("opening command file {}", path.display()))?,
        )),
        None => Box::new(io::BufReader::new(io::stdin())),
    };

    let mut had_error = false;
    for line in input.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with("--") {
            continue;
        }
        let line = line.trim_end_matches(';');

        match statement::parse(line).and_then(|stmt| session.execute(stmt).map_err(|e| e.to_string())) {
            Ok(()) => {}
            Err(e) => {
                warn!("{e}");
                eprintln!("error: {e}");
                had_error = true;
            }
        }
        io::stdout().flush()?;
    }

    if had_error {
        std::process::exit(1);
    }
    Ok(())
}
