//! Command-line parsing and command execution.

use anyhow::{anyhow, bail, Context, Result};
use chrono::{Local, Utc};

use jobtrail_core::utils::{format_age, format_date, format_optional, truncate_string};
use jobtrail_core::{
    ApplicationRecord, ApplicationStatus, ApplicationUpdate, AutoSync, Config, InterviewStage,
    NewApplication, SyncManager, SyncOutcome,
};

// ============================================================================
// Constants
// ============================================================================

const TITLE_WIDTH: usize = 32;
const COMPANY_WIDTH: usize = 24;

pub const USAGE: &str = "\
Usage: jobtrail <command>

Commands:
  list                       List cached applications
  show <id>                  Show one application
  add --title T --company C [options]
                             Create an application
  update <id> [options]      Change fields of an application
  delete <id>                Delete an application
  sync                       Reconcile with the backend now
  status                     Show sync status
  online                     Leave offline mode and reconcile
  offline                    Enter offline mode
  clear-cache                Drop all locally cached applications

Options for add/update:
  --title T  --company C  --date YYYY-MM-DD  --status S  --stage S
  --location L  --salary S  --url U  --notes N

Environment:
  JOBTRAIL_API_URL    Backend base URL (default http://localhost:8000/api)
  JOBTRAIL_API_TOKEN  Bearer token sent with every request
  RUST_LOG            Log filter for the log file (default warn)";

// ============================================================================
// Parsing
// ============================================================================

/// Field flags shared by `add` and `update`.
#[derive(Debug, Default, PartialEq)]
pub struct FieldArgs {
    pub title: Option<String>,
    pub company: Option<String>,
    pub date: Option<String>,
    pub status: Option<ApplicationStatus>,
    pub stage: Option<InterviewStage>,
    pub location: Option<String>,
    pub salary: Option<String>,
    pub url: Option<String>,
    pub notes: Option<String>,
}

impl FieldArgs {
    fn parse(args: &[String]) -> Result<Self> {
        let mut fields = Self::default();
        let mut iter = args.iter();
        while let Some(flag) = iter.next() {
            let value = iter
                .next()
                .ok_or_else(|| anyhow!("Missing value for {}", flag))?
                .clone();
            match flag.as_str() {
                "--title" => fields.title = Some(value),
                "--company" => fields.company = Some(value),
                "--date" => fields.date = Some(value),
                "--status" => fields.status = Some(value.parse()?),
                "--stage" => fields.stage = Some(value.parse()?),
                "--location" => fields.location = Some(value),
                "--salary" => fields.salary = Some(value),
                "--url" => fields.url = Some(value),
                "--notes" => fields.notes = Some(value),
                other => bail!("Unknown option: {}", other),
            }
        }
        Ok(fields)
    }

    /// Build a create request. Title and company are required; the date
    /// defaults to today.
    pub fn into_new_application(self) -> Result<NewApplication> {
        let title = self.title.ok_or_else(|| anyhow!("add requires --title"))?;
        let company = self.company.ok_or_else(|| anyhow!("add requires --company"))?;
        let date = self
            .date
            .unwrap_or_else(|| Local::now().format("%Y-%m-%d").to_string());

        let mut app = NewApplication::new(title, company, date);
        if let Some(status) = self.status {
            app.status = status;
        }
        if let Some(stage) = self.stage {
            app.interview_stage = stage;
        }
        app.location = self.location;
        app.salary = self.salary;
        app.url = self.url;
        app.notes = self.notes;
        Ok(app)
    }

    pub fn into_update(self) -> ApplicationUpdate {
        ApplicationUpdate {
            job_title: self.title,
            company: self.company,
            date_applied: self.date,
            status: self.status,
            interview_stage: self.stage,
            location: self.location,
            salary: self.salary,
            url: self.url,
            notes: self.notes,
            ..Default::default()
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum Command {
    List,
    Show(i64),
    Add(FieldArgs),
    Update(i64, ApplicationUpdate),
    Delete(i64),
    Sync,
    Status,
    Online,
    Offline,
    ClearCache,
    Help,
}

fn parse_id(arg: Option<&String>, command: &str) -> Result<i64> {
    let raw = arg.ok_or_else(|| anyhow!("{} requires an application id", command))?;
    raw.parse()
        .with_context(|| format!("Invalid application id: {}", raw))
}

/// Parse the arguments after the program name.
pub fn parse_args(args: &[String]) -> Result<Command> {
    let Some(name) = args.first() else {
        return Ok(Command::Help);
    };
    let rest = &args[1..];

    let command = match name.as_str() {
        "list" => Command::List,
        "show" => Command::Show(parse_id(rest.first(), "show")?),
        "add" => Command::Add(FieldArgs::parse(rest)?),
        "update" => {
            let id = parse_id(rest.first(), "update")?;
            let update = FieldArgs::parse(&rest[1..])?.into_update();
            if update.is_empty() {
                bail!("update requires at least one option");
            }
            Command::Update(id, update)
        }
        "delete" => Command::Delete(parse_id(rest.first(), "delete")?),
        "sync" => Command::Sync,
        "status" => Command::Status,
        "online" => Command::Online,
        "offline" => Command::Offline,
        "clear-cache" => Command::ClearCache,
        "help" | "--help" | "-h" => Command::Help,
        other => bail!("Unknown command: {}", other),
    };
    Ok(command)
}

// ============================================================================
// Execution
// ============================================================================

pub async fn run(
    command: Command,
    manager: &SyncManager,
    auto_sync: AutoSync,
    config: &mut Config,
) -> Result<()> {
    match command {
        Command::List => print_list(&manager.applications().await),
        Command::Show(id) => match manager.application(id).await {
            Some(record) => {
                print_record(&record);
                println!("Sync:        {}", manager.record_status(id).await);
            }
            None => println!("No application with id {}", id),
        },
        Command::Add(fields) => {
            let record = manager.add_with_sync(fields.into_new_application()?).await;
            println!(
                "Added {} (id {})",
                record.display_name(),
                record.id.map(|id| id.to_string()).unwrap_or_default()
            );
            report_local_only(manager, record.id).await;
        }
        Command::Update(id, update) => {
            if manager.application(id).await.is_none() {
                println!("No application with id {}", id);
            } else if manager.update_with_sync(id, update).await {
                println!("Updated application {}", id);
            } else {
                println!("Updated application {} locally", id);
                report_error(manager).await;
            }
        }
        Command::Delete(id) => {
            if manager.application(id).await.is_none() {
                println!("No application with id {}", id);
            } else if manager.delete_with_sync(id).await {
                println!("Deleted application {}", id);
            } else {
                println!("Deleted application {} locally", id);
                report_error(manager).await;
            }
        }
        Command::Sync => print_outcome(&manager.force_sync().await),
        Command::Status => print_status(manager).await,
        Command::Online => {
            config.offline_mode = false;
            config.save().context("Failed to save config")?;
            // A real transition reaches AutoSync; otherwise reconcile directly
            if manager.connectivity().set_online(true).is_none() {
                print_outcome(&manager.force_sync().await);
            }
            auto_sync.shutdown().await;
            println!("Online");
            print_status(manager).await;
            return Ok(());
        }
        Command::Offline => {
            config.offline_mode = true;
            config.save().context("Failed to save config")?;
            manager.connectivity().set_online(false);
            println!("Offline: changes will be kept locally until you go online");
        }
        Command::ClearCache => {
            manager.clear_local_data().await;
            println!("Local cache cleared");
        }
        Command::Help => println!("{}", USAGE),
    }

    auto_sync.shutdown().await;
    Ok(())
}

async fn report_local_only(manager: &SyncManager, id: Option<i64>) {
    if let Some(id) = id {
        if manager.record_status(id).await.is_pending() {
            println!("Saved locally; will sync when online");
            report_error(manager).await;
        }
    }
}

async fn report_error(manager: &SyncManager) {
    if let Some(error) = manager.status().await.error {
        println!("  ({})", error);
    }
}

fn print_list(records: &[ApplicationRecord]) {
    if records.is_empty() {
        println!("No applications");
        return;
    }

    println!(
        "{:>14}  {:<tw$}  {:<cw$}  {:<12}  {:<13}  {}",
        "ID",
        "TITLE",
        "COMPANY",
        "STATUS",
        "STAGE",
        "APPLIED",
        tw = TITLE_WIDTH,
        cw = COMPANY_WIDTH
    );
    for record in records {
        println!(
            "{:>14}  {:<tw$}  {:<cw$}  {:<12}  {:<13}  {}",
            record.id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string()),
            truncate_string(&record.job_title, TITLE_WIDTH),
            truncate_string(&record.company, COMPANY_WIDTH),
            record.status.to_string(),
            record.interview_stage.to_string(),
            format_date(&record.date_applied),
            tw = TITLE_WIDTH,
            cw = COMPANY_WIDTH
        );
    }

    let open = records.iter().filter(|r| !r.status.is_closed()).count();
    println!("\n{} applications, {} still open", records.len(), open);
}

fn print_record(record: &ApplicationRecord) {
    println!("{}", record.display_name());
    println!("Status:      {}", record.status);
    println!("Stage:       {}", record.interview_stage);
    println!("Applied:     {}", format_date(&record.date_applied));
    println!("Location:    {}", format_optional(&record.location, "-"));
    println!("Salary:      {}", format_optional(&record.salary, "-"));
    println!("URL:         {}", format_optional(&record.url, "-"));
    if record.has_referral() {
        println!(
            "Referral:    {} ({})",
            format_optional(&record.referrer_name, "unknown"),
            format_optional(&record.referral_relationship, "-")
        );
    }
    if let Some(ref notes) = record.notes {
        println!("Notes:       {}", notes);
    }
    if let Some(updated) = record.updated_at_parsed() {
        println!("Updated:     {}", format_age(updated, Utc::now()));
    }
}

fn print_outcome(outcome: &SyncOutcome) {
    match outcome {
        SyncOutcome::Completed { records } => println!("Synced {} applications", records),
        SyncOutcome::AlreadySyncing => println!("A sync is already in progress"),
        SyncOutcome::Offline => println!("Offline: run `jobtrail online` to sync"),
        SyncOutcome::Failed(message) => println!("{}", message),
    }
}

async fn print_status(manager: &SyncManager) {
    let status = manager.status().await;
    println!(
        "Network:     {}",
        if status.online { "online" } else { "offline" }
    );
    println!("Pending:     {}", status.pending_changes);
    println!("Unsynced:    {}", manager.unreconciled_count().await);
    let last_sync = status
        .last_sync
        .map(|t| format_age(t, Utc::now()))
        .unwrap_or_else(|| "never".to_string());
    println!("Last sync:   {}", last_sync);
    if let Some(error) = status.error {
        println!("Error:       {}", error);
    }
}

// ============================================================================
// Tests
// ============================================================================
