use clap::Parser;
use fsmtpl::{Config, Table, Template};
use indexmap::IndexMap;
use std::fs;

#[derive(Parser)]
#[command(name = "fsm-parse")]
#[command(about = "Parse semi-structured command output using FSM templates")]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Parser)]
enum Commands {
    /// Parse a data file against a single template file.
    ParseTemplate {
        /// Path to the template source file
        template_file: String,
        /// Path to the raw data file
        data_file: String,
    },
    /// Dispatch through an index table by command and tag attributes.
    ParseCommand {
        /// Command string, e.g. "show version"
        command: String,
        /// Path to the raw data file
        data_file: String,
        /// Path to the index file
        #[arg(long)]
        index: String,
        /// Directory templates referenced by the index resolve against
        #[arg(long)]
        template_dir: Option<String>,
        /// Tag attribute in `name=value` form; may be repeated
        #[arg(long = "tag", value_parser = parse_tag)]
        tags: Vec<(String, String)>,
    },
}

fn parse_tag(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) => Ok((name.to_string(), value.to_string())),
        None => Err(format!("tag '{s}' is not in name=value form")),
    }
}

fn main() -> fsmtpl::Result<()> {
    let config = Config::load(Some("fsmtpl.toml")).unwrap_or_default();
    fsmtpl::logging::init_tracing(&config.log_level);

    let args = Args::parse();

    let records = match args.command {
        Commands::ParseTemplate { template_file, data_file } => {
            let mut template = Template::from_path(&template_file)?;
            let text = fs::read_to_string(&data_file)?;
            template.parse(&text)?
        }
        Commands::ParseCommand {
            command,
            data_file,
            index,
            template_dir,
            tags,
        } => {
            let template_dir = template_dir.unwrap_or(config.template_dir.clone());
            let table = Table::open(&index, &template_dir)?;
            let text = fs::read_to_string(&data_file)?;
            let tags: IndexMap<String, String> = tags.into_iter().collect();
            table.parse_command(&command, &tags, &text)?
        }
    };

    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}
