use crate::infra::build_service;
use clap::Args;
use event_match::config::AppConfig;
use event_match::error::AppError;
use event_match::matchmaking::{
    export_matches, parse_quiz_csv, EventMatchService, EventRepository, EventStore, ImportReport,
    MatchingReport, QuizKind, RejectedRow, UserId,
};
use event_match::telemetry;
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct ImportArgs {
    /// Which questionnaire the file holds
    #[arg(long, value_parser = parse_kind)]
    pub(crate) kind: QuizKind,
    /// CSV file with a `username,q1..qN` header
    pub(crate) csv: PathBuf,
}

#[derive(Args, Debug, Default)]
pub(crate) struct ExportArgs {
    /// Write to this file instead of stdout
    #[arg(long)]
    pub(crate) output: Option<PathBuf>,
}

fn parse_kind(raw: &str) -> Result<QuizKind, String> {
    QuizKind::parse(raw)
        .ok_or_else(|| format!("unknown quiz kind '{raw}' (personality|attraction)"))
}

fn prepare() -> Result<Arc<EventMatchService<EventStore>>, AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;
    build_service(&config)
}

pub(crate) fn run_matching() -> Result<(), AppError> {
    let service = prepare()?;
    let report = service.run_matching()?;
    render_matching_report(&mut io::stdout().lock(), &report)?;
    Ok(())
}

pub(crate) fn run_import(args: ImportArgs) -> Result<(), AppError> {
    let service = prepare()?;
    let report = import_file(&service, &args)?;
    render_import_report(&mut io::stdout().lock(), args.kind, &report)?;
    Ok(())
}

pub(crate) fn run_list() -> Result<(), AppError> {
    let service = prepare()?;
    render_match_list(&mut io::stdout().lock(), &service)
}

pub(crate) fn run_export(args: ExportArgs) -> Result<(), AppError> {
    let service = prepare()?;
    let matches = service.all_matches()?;
    let usernames = service.usernames()?;

    match args.output {
        Some(path) => {
            let written = export_matches(File::create(&path)?, &matches, &usernames)?;
            println!("Exported {} matches to {}.", written, path.display());
        }
        None => {
            export_matches(io::stdout().lock(), &matches, &usernames)?;
        }
    }
    Ok(())
}

pub(crate) fn import_file<R>(
    service: &EventMatchService<R>,
    args: &ImportArgs,
) -> Result<ImportReport, AppError>
where
    R: EventRepository + 'static,
{
    let reader = BufReader::new(File::open(&args.csv)?);
    let (rows, rejected) = parse_quiz_csv(reader, args.kind)?;
    let mut report = service.import_quizzes(args.kind, rows)?;

    let mut all_rejected: Vec<RejectedRow> = rejected;
    all_rejected.append(&mut report.rejected);
    all_rejected.sort_by_key(|row| row.line);
    report.rejected = all_rejected;
    Ok(report)
}

pub(crate) fn render_matching_report<W: Write>(
    out: &mut W,
    report: &MatchingReport,
) -> io::Result<()> {
    match report {
        MatchingReport::Completed {
            results_written,
            per_user,
            ..
        } => {
            for entry in per_user {
                writeln!(
                    out,
                    "Computed {} matches for {}.",
                    entry.matches, entry.username
                )?;
            }
            writeln!(
                out,
                "Successfully computed matches for all users ({} results).",
                results_written
            )
        }
        MatchingReport::Skipped { .. } => writeln!(
            out,
            "Not enough quiz responses (need at least 2 users). No matches computed."
        ),
    }
}

pub(crate) fn render_import_report<W: Write>(
    out: &mut W,
    kind: QuizKind,
    report: &ImportReport,
) -> io::Result<()> {
    writeln!(out, "Imported {} {} quizzes.", report.imported, kind)?;
    if !report.registered.is_empty() {
        writeln!(
            out,
            "Registered {} new attendees: {}",
            report.registered.len(),
            report.registered.join(", ")
        )?;
    }
    if !report.skipped_existing.is_empty() {
        writeln!(
            out,
            "Skipped {} already submitted: {}",
            report.skipped_existing.len(),
            report.skipped_existing.join(", ")
        )?;
    }
    for row in &report.rejected {
        writeln!(
            out,
            "  line {} ({}): {}",
            row.line,
            row.username.as_deref().unwrap_or("-"),
            row.reason
        )?;
    }
    Ok(())
}

pub(crate) fn render_match_list<W, R>(
    out: &mut W,
    service: &EventMatchService<R>,
) -> Result<(), AppError>
where
    W: Write,
    R: EventRepository + 'static,
{
    let matches = service.all_matches()?;
    if matches.is_empty() {
        writeln!(out, "No matches computed yet.")?;
        return Ok(());
    }

    let usernames = service.usernames()?;
    let name = |id: UserId| {
        usernames
            .get(&id)
            .cloned()
            .unwrap_or_else(|| format!("user-{id}"))
    };

    if let Some(run) = service.last_match_run()? {
        writeln!(
            out,
            "Last run {} ({} users, {} results)",
            run.completed_at.format("%Y-%m-%d %H:%M:%S UTC"),
            run.users_matched,
            run.results_written
        )?;
    }

    let mut current = None;
    for result in &matches {
        if current != Some(result.user_id) {
            writeln!(out, "{}", name(result.user_id))?;
            current = Some(result.user_id);
        }
        writeln!(
            out,
            "  #{} {} (score {})",
            result.rank,
            name(result.matched_user_id),
            result.score
        )?;
    }
    Ok(())
}
