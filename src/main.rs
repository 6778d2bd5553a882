use clap::{Parser, Subcommand};
use price_editor::api::run_server;
use price_editor::cli;
use price_editor::config::{ServerConfig, DEFAULT_WORKBOOK};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "price-editor")]
#[command(about = "Edit prices in an Excel workbook and export a sheet as CSV")]
#[command(long_about = "Price Editor - Excel price editing and CSV export
Cells D4-D7 of the 'Prices' sheet | 'Export' sheet as CSV

COMMANDS:
  show    - Print the current prices
  set     - Validate and write four new prices
  export  - Write the 'Export' sheet as CSV
  sheets  - List the sheets in a workbook
  check   - Show which Export formulas read the prices
  serve   - Run the web editor

EXAMPLES:
  price-editor show your_workbook.xlsx
  price-editor set your_workbook.xlsx 10.5 20 15.75 5
  price-editor export your_workbook.xlsx -o export_data.csv
  price-editor serve --port 3000")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the prices in D4-D7 of the 'Prices' sheet
    Show {
        /// Path to the workbook
        #[arg(default_value = DEFAULT_WORKBOOK)]
        workbook: PathBuf,
    },

    #[command(long_about = "Validate and write four new prices.

All four values must be numbers; negative values are accepted
(price-editor set book.xlsx -3 20 18 5). If any value is invalid nothing
is written and every problem is reported.

Only D4-D7 change. Every other cell, style, number format and sheet is
kept as it was. Saving needs an .xlsx or .xlsm file.")]
    /// Validate and write four new prices
    Set {
        /// Path to the workbook
        workbook: PathBuf,

        /// Value for D4
        #[arg(allow_negative_numbers = true)]
        d4: String,

        /// Value for D5
        #[arg(allow_negative_numbers = true)]
        d5: String,

        /// Value for D6
        #[arg(allow_negative_numbers = true)]
        d6: String,

        /// Value for D7
        #[arg(allow_negative_numbers = true)]
        d7: String,

        /// Show the previous values before writing
        #[arg(short, long)]
        verbose: bool,
    },

    /// Write the 'Export' sheet as CSV (stdout unless --output is given)
    Export {
        /// Path to the workbook
        #[arg(default_value = DEFAULT_WORKBOOK)]
        workbook: PathBuf,

        /// Output CSV file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the sheets in a workbook
    Sheets {
        /// Path to the workbook
        #[arg(default_value = DEFAULT_WORKBOOK)]
        workbook: PathBuf,
    },

    /// Show which 'Export' formulas reference the prices
    Check {
        /// Path to the workbook
        #[arg(default_value = DEFAULT_WORKBOOK)]
        workbook: PathBuf,
    },

    #[command(long_about = "Run the web editor.

Endpoints:
  - GET  /                - Editor page
  - POST /prices          - Save the four prices (form)
  - POST /upload          - Upload a workbook for this session
  - GET  /export.csv      - Download the 'Export' sheet
  - GET  /api/v1/prices   - Current prices (JSON)
  - POST /api/v1/prices   - Save prices (JSON)
  - GET  /health          - Health check
  - GET  /version         - Server version info

Settings come from defaults, then --config, then flags and
PRICE_EDITOR_* environment variables.")]
    /// Run the web editor
    Serve {
        /// Host address to bind to (use 0.0.0.0 for all interfaces)
        #[arg(short = 'H', long, env = "PRICE_EDITOR_HOST")]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long, env = "PRICE_EDITOR_PORT")]
        port: Option<u16>,

        /// Default workbook served to new sessions
        #[arg(short, long, env = "PRICE_EDITOR_WORKBOOK")]
        workbook: Option<PathBuf>,

        /// Directory for uploaded workbooks
        #[arg(long, env = "PRICE_EDITOR_UPLOAD_DIR")]
        upload_dir: Option<PathBuf>,

        /// YAML config file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Show { workbook } => cli::show(workbook)?,

        Commands::Set {
            workbook,
            d4,
            d5,
            d6,
            d7,
            verbose,
        } => cli::set(workbook, [d4, d5, d6, d7], verbose)?,

        Commands::Export { workbook, output } => cli::export(workbook, output)?,

        Commands::Sheets { workbook } => cli::sheets(workbook)?,

        Commands::Check { workbook } => cli::check(workbook)?,

        Commands::Serve {
            host,
            port,
            workbook,
            upload_dir,
            config,
        } => {
            let mut settings = match config {
                Some(path) => ServerConfig::from_yaml_file(&path)?,
                None => ServerConfig::default(),
            };
            if let Some(host) = host {
                settings.host = host;
            }
            if let Some(port) = port {
                settings.port = port;
            }
            if let Some(workbook) = workbook {
                settings.workbook = workbook;
            }
            if let Some(upload_dir) = upload_dir {
                settings.upload_dir = upload_dir;
            }

            tokio::runtime::Runtime::new()?.block_on(run_server(settings))?;
        }
    }

    Ok(())
}
