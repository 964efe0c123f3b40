use clap::{Args, Parser, Subcommand};
use cmdb_fixip::cmdb::{JsonRpcClient, MemoryCmdb};
use cmdb_fixip::config::{self, ConfigFile};
use cmdb_fixip::output::print_summary;
use cmdb_fixip::reconcile;
use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::error::Error;
use std::path::Path;

#[derive(Parser)]
#[command(name = "cmdb-fixip")]
#[command(about = "Audit and repair subnet assignments of IP addresses in the CMDB.")]
struct CommandLine {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bind lost IP addresses to the one subnet that contains them
    Fixip(FixipArgs),
}

#[derive(Args)]
struct FixipArgs {
    /// Report what would be fixed without writing anything
    #[arg(long)]
    dry_run: bool,
    /// Objects per page, 0 reads everything at once
    #[arg(long)]
    limit: Option<usize>,
    /// Max sub-requests per batch request, 0 = unbounded
    #[arg(long)]
    batch_limit: Option<usize>,
    /// JSON config file (default: $CMDB_CONFIG)
    #[arg(long)]
    config: Option<String>,
    /// Work on a JSON snapshot instead of the live CMDB
    #[arg(long)]
    snapshot: Option<String>,
}

fn init_logging() -> Result<(), Box<dyn Error>> {
    if Path::new("log4rs.yml").exists() {
        log4rs::init_file("log4rs.yml", Default::default())?;
    } else {
        let stdout = ConsoleAppender::builder()
            .encoder(Box::new(PatternEncoder::new("{d(%H:%M:%S)} {h({l:5})} - {m}{n}")))
            .build();
        let config = Config::builder()
            .appender(Appender::builder().build("stdout", Box::new(stdout)))
            .build(Root::builder().appender("stdout").build(LevelFilter::Info))?;
        log4rs::init_config(config)?;
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    // Do as little as possible in main.rs as it can't contain any tests
    init_logging()?;
    dotenv::dotenv().ok();
    log::info!("#Start main()");

    let Commands::Fixip(args) = CommandLine::parse().command;

    let config_path = args.config.or_else(|| std::env::var("CMDB_CONFIG").ok());
    let file = match config_path.as_deref() {
        Some(path) => config::read_config_file(path)?,
        None => ConfigFile::default(),
    };
    let (mut settings, mut fixip) = config::build_config(file, |k| std::env::var(k).ok())?;

    if let Some(limit) = args.limit {
        fixip.limit = limit;
    }
    if let Some(batch_limit) = args.batch_limit {
        settings.batch_limit = batch_limit;
        fixip.batch_limit = batch_limit;
    }
    fixip.dry_run = args.dry_run;

    let result = match args.snapshot.as_deref() {
        Some(path) => reconcile(&MemoryCmdb::from_file(path)?, &fixip),
        None => reconcile(&JsonRpcClient::new(&settings)?, &fixip),
    };

    let stats = result.map_err(|e| {
        log::error!("fixip aborted: {e}");
        e
    })?;
    print_summary(&stats, fixip.dry_run);

    Ok(())
}
