//! VESPA Upload CLI - bulk upload of staff and student CSV files
//!
//! # Commands
//!
//! ```bash
//! vespa-upload template staff                 # Download the staff CSV template
//! vespa-upload parse students.csv             # Parse a CSV file to JSON
//! vespa-upload validate ks4 ks4.csv           # Validate without submitting
//! vespa-upload orgs --search ashlyns          # List organizations (super users)
//! vespa-upload upload staff staff.csv         # Run the whole wizard
//! ```
//!
//! The operator identity comes from `VESPA_USER_ID`, `VESPA_USER_EMAIL` and
//! `VESPA_USER_ROLE` (a `.env` file is read when present).

use clap::{Parser, Subcommand};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use vespa_upload::emulation::EmulationResolver;
use vespa_upload::parser::parse_csv;
use vespa_upload::{
    templates, validate_local, ClientConfig, HttpBackend, JobStatus, Percentile, ProcessingOptions, Role,
    SelectedFile, Step, UploadType, ValidationResult, ValidationSource, Wizard,
};

type CliResult = Result<(), Box<dyn Error>>;

#[derive(Parser)]
#[command(name = "vespa-upload")]
#[command(about = "Bulk upload staff and student records to VESPA", long_about = None)]
struct Cli {
    /// Backing service base URL (overrides VESPA_UPLOAD_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Operator role (overrides VESPA_USER_ROLE)
    #[arg(long, global = true)]
    role: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download the CSV template for an upload type
    Template {
        /// staff, onboard, ks4 or ks5
        upload_type: UploadType,

        /// Build the header-only template locally instead of downloading it
        #[arg(long)]
        offline: bool,

        /// Output file (default: <type>-template.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Parse a CSV file and output JSON rows
    Parse {
        /// Input CSV file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate a CSV file without submitting it
    Validate {
        /// staff, onboard, ks4 or ks5
        upload_type: UploadType,

        /// Input CSV file
        input: PathBuf,

        /// Only run the local rules (no network)
        #[arg(long)]
        local_only: bool,
    },

    /// List organizations available for emulation (super users only)
    Orgs {
        /// Case-insensitive filter on name or school id
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Validate and submit a CSV file through the wizard
    Upload {
        /// staff, onboard, ks4 or ks5
        upload_type: UploadType,

        /// Input CSV file
        input: PathBuf,

        /// Organization id to act for (super users only)
        #[arg(long)]
        org: Option<String>,

        /// Do not send the completion email
        #[arg(long)]
        no_notify: bool,

        /// Send the completion email here instead of to the operator
        #[arg(long)]
        notify_email: Option<String>,

        /// Skip MEG calculators for subject uploads
        #[arg(long)]
        no_calculators: bool,

        /// MEG percentile benchmark: 60, 75, 90 or 100
        #[arg(long, default_value = "75")]
        percentile: Percentile,

        /// Skip server-side validation
        #[arg(long)]
        no_remote: bool,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let overrides = Overrides {
        api_url: cli.api_url,
        role: cli.role,
    };

    let result = match cli.command {
        Commands::Template {
            upload_type,
            offline,
            output,
        } => cmd_template(&overrides, upload_type, offline, output.as_deref()).await,

        Commands::Parse { input, output } => cmd_parse(&input, output.as_deref()).await,

        Commands::Validate {
            upload_type,
            input,
            local_only,
        } => cmd_validate(&overrides, upload_type, &input, local_only).await,

        Commands::Orgs { search } => cmd_orgs(&overrides, search.as_deref()).await,

        Commands::Upload {
            upload_type,
            input,
            org,
            no_notify,
            notify_email,
            no_calculators,
            percentile,
            no_remote,
        } => {
            let options = ProcessingOptions {
                send_notifications: !no_notify,
                notification_email: notify_email,
                run_calculators: !no_calculators,
                percentile,
            };
            cmd_upload(&overrides, upload_type, &input, org.as_deref(), options, !no_remote).await
        }
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

struct Overrides {
    api_url: Option<String>,
    role: Option<String>,
}

fn load_config(overrides: &Overrides) -> Result<ClientConfig, Box<dyn Error>> {
    let mut config = ClientConfig::from_env()?;
    if let Some(url) = &overrides.api_url {
        config.api_url = url.trim_end_matches('/').to_string();
    }
    if let Some(role) = &overrides.role {
        config.operator.role = Role::from(role.clone());
    }
    Ok(config)
}

async fn cmd_template(overrides: &Overrides, upload_type: UploadType, offline: bool, output: Option<&Path>) -> CliResult {
    let text = if offline {
        templates::blank(upload_type)?
    } else {
        let backend = HttpBackend::new(load_config(overrides)?);
        templates::download(&backend, upload_type).await?
    };

    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(templates::file_name(upload_type)));
    write_output(&text, Some(&output)).await
}

async fn cmd_parse(input: &Path, output: Option<&Path>) -> CliResult {
    eprintln!("📄 Parsing CSV: {}", input.display());

    let file = SelectedFile::from_path(input)?;
    let parsed = parse_csv(&file.contents)?;

    eprintln!("   Encoding: {}", file.encoding);
    eprintln!("   Columns: {}", parsed.headers.join(", "));
    eprintln!("✅ Parsed {} rows", parsed.rows.len());

    let json = serde_json::to_string_pretty(&parsed.rows)?;
    write_output(&json, output).await
}

async fn cmd_validate(overrides: &Overrides, upload_type: UploadType, input: &Path, local_only: bool) -> CliResult {
    eprintln!("🔍 Validating {} upload: {}", upload_type.label(), input.display());
    let file = SelectedFile::from_path(input)?;

    let result = if local_only {
        match vespa_upload::parse_rows(&file.contents) {
            Ok(rows) => {
                let errors = validate_local(upload_type, &rows);
                ValidationResult::new(rows, errors, ValidationSource::Local)
            }
            Err(e) => ValidationResult::csv_failure(&e),
        }
    } else {
        let config = load_config(overrides)?;
        let remote = config.remote_validation;
        let backend = HttpBackend::new(config);
        vespa_upload::validate_file(&backend, upload_type, &file.contents, remote).await
    };

    report_validation(&result)
}

fn report_validation(result: &ValidationResult) -> CliResult {
    if result.is_valid {
        eprintln!("✅ {} row(s) valid", result.rows.len());
        return Ok(());
    }
    for error in &result.errors {
        eprintln!("   ❌ {}", error);
    }
    Err(format!("validation failed with {} error(s)", result.errors.len()).into())
}

async fn cmd_orgs(overrides: &Overrides, search: Option<&str>) -> CliResult {
    let config = load_config(overrides)?;
    let backend = HttpBackend::new(config.clone());
    let mut resolver = EmulationResolver::new(&backend, &config.operator);
    resolver.load().await?;

    for org in resolver.search(search.unwrap_or("")) {
        println!(
            "{}\t{}\t{}",
            org.id,
            org.name,
            org.school_id_text.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

async fn cmd_upload(
    overrides: &Overrides,
    upload_type: UploadType,
    input: &Path,
    org: Option<&str>,
    options: ProcessingOptions,
    remote: bool,
) -> CliResult {
    let config = load_config(overrides)?;
    let remote = remote && config.remote_validation;
    let operator = config.operator.clone();
    let wizard = Wizard::new(Arc::new(HttpBackend::new(config)), operator).with_remote_validation(remote);

    wizard.select_upload_type(upload_type).await?;
    wizard.next().await?;

    if wizard.step().await == Step::SelectOrganization {
        let org = org.ok_or("super users must choose an organization with --org")?;
        wizard.load_organizations().await?;
        wizard.select_organization(org).await?;
        eprintln!("   {}", wizard.banner().await.text());
        wizard.next().await?;
    }

    wizard.select_file(SelectedFile::from_path(input)?).await?;
    wizard.set_options(options).await?;
    wizard.next().await?;

    if let Err(e) = wizard.next().await {
        if let Some(result) = wizard.validation().await {
            report_validation(&result)?;
        }
        return Err(e.into());
    }

    wizard.next().await?;
    let job = wizard.job().await.ok_or("no job recorded")?;
    match job.status {
        JobStatus::Queued => {
            println!("{}", job.job_id);
            eprintln!("✅ {}", job.message);
            Ok(())
        }
        JobStatus::SubmissionFailed => Err(job.message.into()),
    }
}

async fn write_output(content: &str, output: Option<&Path>) -> CliResult {
    match output {
        Some(path) => {
            tokio::fs::write(path, content).await?;
            eprintln!("💾 Written to: {}", path.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}
