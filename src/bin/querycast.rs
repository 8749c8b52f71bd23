use clap::{Parser, Subcommand};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use querycast::config::QueryConfig;
use querycast::interpret::Translator;
use querycast::sql::{DialectKind, to_sql};
use querycast::utils::json::{bson_to_json, json_to_bson, parse_json_document};
use querycast::{ObjectQueryParser, matcher, mongo};

#[derive(Parser, Debug)]
#[command(name = "querycast", version, about = "Parse Mongo-style queries and render them as SQL or filters", long_about = None)]
struct Cli {
    #[arg(long, help = "Path to a config file (TOML). Defaults to $QUERYCAST_CONFIG or ./querycast.toml")]
    config: Option<PathBuf>,
    #[arg(long, help = "Skip keys and operands equal to this string (e.g., __ignore__)")]
    ignore_value: Option<String>,
    #[arg(long, help = "Log level: off|error|warn|info|debug|trace")]
    log_level: Option<String>,
    #[arg(long, help = "Directory for rolling log files; logging stays off when unset")]
    log_dir: Option<PathBuf>,
    #[arg(long, help = "Write rendered SQL to sql.log next to querycast.log")]
    log_sql: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Parse a query and print its condition tree as JSON")]
    Parse {
        #[arg(help = "Query JSON (e.g., {\"age\": {\"$gte\": 21}})")]
        query: String,
    },
    #[command(about = "Render a query as a parameterized SQL where clause")]
    Sql {
        #[arg(help = "Query JSON")]
        query: String,
        #[arg(long, help = "Dialect: pg|oracle|mysql|sqlite|mssql")]
        dialect: Option<DialectKind>,
        #[arg(long, help = "Alias prepended to root table columns")]
        root_alias: Option<String>,
        #[arg(long = "join", help = "Relation to join (repeatable)")]
        joins: Vec<String>,
    },
    #[command(about = "Print NDJSON documents that match a query")]
    Match {
        #[arg(help = "Query JSON")]
        query: String,
        #[arg(long, help = "NDJSON input file; reads stdin when omitted")]
        input: Option<PathBuf>,
    },
    #[command(about = "List cargo features compiled into this binary")]
    Features,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut overrides = QueryConfig {
        log_dir: cli.log_dir.clone(),
        log_level: cli.log_level.clone(),
        log_sql: cli.log_sql.then_some(true),
        ignore_value: cli.ignore_value.clone(),
        ..QueryConfig::default()
    };
    if let Commands::Sql { dialect, root_alias, joins, .. } = &cli.command {
        overrides.dialect = *dialect;
        overrides.root_alias = root_alias.clone();
        if !joins.is_empty() {
            overrides.joins = Some(joins.clone());
        }
    }
    let cfg = QueryConfig::load(cli.config.as_deref(), overrides)?;

    cfg.init_logging()?;

    let parser = ObjectQueryParser::new(mongo::instructions(), cfg.parser_options());
    let mut out = std::io::stdout().lock();

    match cli.command {
        Commands::Parse { query } => {
            let ast = parser.parse(&parse_json_document(&query)?)?;
            writeln!(out, "{}", serde_json::to_string_pretty(&ast)?)?;
        }
        Commands::Sql { query, .. } => {
            let ast = parser.parse(&parse_json_document(&query)?)?;
            let rendered = to_sql(&ast, cfg.sql_options())?;
            log::info!(target: "querycast::sql", "{}", rendered.sql);
            let params: Vec<_> = rendered.params.iter().map(bson_to_json).collect();
            let json = serde_json::json!({ "sql": rendered.sql, "params": params, "joins": rendered.joins });
            writeln!(out, "{}", serde_json::to_string_pretty(&json)?)?;
        }
        Commands::Match { query, input } => {
            let translator = Translator::new(move |q: &bson::Document| parser.parse(q), matcher::default_operators());
            let filter = translator.translate(&parse_json_document(&query)?)?;
            let reader: Box<dyn BufRead> = match input {
                Some(path) => Box::new(BufReader::new(std::fs::File::open(path)?)),
                None => Box::new(BufReader::new(std::io::stdin())),
            };
            for line in reader.lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let value = json_to_bson(serde_json::from_str(&line)?);
                if filter.evaluate(&value)? {
                    writeln!(out, "{line}")?;
                }
            }
        }
        Commands::Features => {
            for feature in querycast::COMPILED_FEATURES {
                writeln!(out, "{feature}")?;
            }
        }
    }
    Ok(())
}
