use anyhow::{anyhow, bail, Result};
use std::process;

use spiralscreen::admin::hash_password;
use spiralscreen::classifier::HttpClassifier;
use spiralscreen::config::Config;
use spiralscreen::logging::{log, obj, v_str, Domain, Level};
use spiralscreen::record::RecordId;
use spiralscreen::session::{Dashboard, Session};
use spiralscreen::storage::build_store;
use spiralscreen::SessionError;

const USAGE: &str = "usage: spiralscreen <command> [args]

commands:
  analyze <subject> <image>       classify a PNG/JPEG/PPM drawing and record it
  feedback <text>                 attach feedback to the latest record
  history                         list recorded predictions
  stats [--json]                  summary, risk buckets and drift
  export [path]                   plain-text report (stdout if no path)
  clear                           remove every record
  admin <password>                admin view: all records with ids
  delete <id> [password]          delete one record (admin; or ADMIN_PASSWORD)
  hash-password <password> [salt] print a value for ADMIN_PASSWORD_HASH";

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Err(err) = run(args).await {
        log(
            Level::Error,
            Domain::System,
            "command_failed",
            obj(&[("error", v_str(&format!("{:#}", err)))]),
        );
        eprintln!("error: {:#}", err);
        let code = match err.downcast_ref::<SessionError>() {
            Some(SessionError::InvalidInput(_)) | Some(SessionError::NoRecords) => 2,
            Some(SessionError::NotAuthorized) => 3,
            _ => 1,
        };
        process::exit(code);
    }
}

fn arg<'a>(args: &'a [String], idx: usize, name: &str) -> Result<&'a str> {
    args.get(idx)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("missing <{}>\n\n{}", name, USAGE))
}

async fn run(args: Vec<String>) -> Result<()> {
    let Some(command) = args.first().map(String::as_str) else {
        println!("{}", USAGE);
        return Ok(());
    };

    if command == "hash-password" {
        let password = arg(&args, 1, "password")?;
        println!("{}", hash_password(password, args.get(2).map(String::as_str)));
        return Ok(());
    }
    if matches!(command, "help" | "-h" | "--help") {
        println!("{}", USAGE);
        return Ok(());
    }

    let cfg = Config::from_env()?;
    let store = build_store(&cfg)?;
    let classifier = HttpClassifier::new(&cfg.classifier_url, &cfg.model_name)?;
    let mut session = Session::from_config(&cfg, store, Box::new(classifier));
    log(
        Level::Info,
        Domain::System,
        "startup",
        obj(&[
            ("command", v_str(command)),
            ("backend", v_str(session.store_backend())),
        ]),
    );

    match command {
        "analyze" => {
            let subject = arg(&args, 1, "subject")?;
            let path = arg(&args, 2, "image")?;
            let bytes = std::fs::read(path).map_err(|e| anyhow!("cannot read {}: {}", path, e))?;
            session.ensure_model_ready().await?;
            let outcome = session.analyze(subject, &bytes).await?;
            let rec = &outcome.record;
            if let Some(info) = &outcome.image {
                println!("Image: {}x{} {} ({})", info.width, info.height, info.format, info.mode);
            }
            println!("Record: {}", rec.id.map(|id| id.to_string()).unwrap_or_default());
            println!("Subject: {}", rec.subject_label);
            println!("Result: {}", rec.classification().label());
            println!("Probability: {:.2}%", rec.probability() * 100.0);
            println!("Confidence: {:.2}%", rec.confidence() * 100.0);
            println!("This is a preliminary screening, not a medical diagnosis.");
        }
        "feedback" => {
            let text = args[1..].join(" ");
            if text.trim().is_empty() {
                bail!("missing <text>\n\n{}", USAGE);
            }
            let id = session.add_feedback(&text).await?;
            println!("Feedback saved on record {}", id);
        }
        "history" => {
            let history = session.refresh().await?;
            if history.is_empty() {
                println!("No predictions recorded yet.");
            }
            for rec in history.records().iter().rev() {
                println!(
                    "{}  {:<20} {:>7.2}%  {}",
                    rec.recorded_at_text(),
                    rec.subject_label,
                    rec.probability() * 100.0,
                    rec.classification().label()
                );
            }
        }
        "stats" => {
            let dashboard = session.dashboard().await?;
            if args.iter().any(|a| a == "--json") {
                println!("{}", serde_json::to_string_pretty(&dashboard)?);
            } else {
                print_dashboard(&dashboard);
            }
        }
        "export" => {
            let report = session.export_report().await?;
            match args.get(1) {
                Some(path) => {
                    std::fs::write(path, &report)?;
                    println!("Report written to {}", path);
                }
                None => print!("{}", report),
            }
        }
        "clear" => {
            session.clear_history().await?;
            println!("History cleared.");
        }
        "admin" => {
            let password = arg(&args, 1, "password")?;
            if !session.login(password) {
                return Err(SessionError::NotAuthorized.into());
            }
            let records = session.admin_records().await?;
            println!("{} records ({} backend)", records.len(), session.store_backend());
            for rec in &records {
                println!(
                    "#{:<6} {}  {:<20} {:>7.2}%  {}  {}",
                    rec.id.map(|id| id.to_string()).unwrap_or_default(),
                    rec.recorded_at_text(),
                    rec.subject_label,
                    rec.probability() * 100.0,
                    rec.classification().as_str(),
                    rec.feedback.as_deref().unwrap_or("-")
                );
            }
        }
        "delete" => {
            let id: i64 = arg(&args, 1, "id")?
                .parse()
                .map_err(|e| anyhow!("bad record id: {}", e))?;
            let password = args
                .get(2)
                .cloned()
                .or_else(|| std::env::var("ADMIN_PASSWORD").ok())
                .unwrap_or_default();
            session.login(&password);
            if session.delete_record(RecordId(id)).await? {
                println!("Deleted record {}", id);
            } else {
                println!("No record {}", id);
            }
        }
        other => bail!("unknown command {:?}\n\n{}", other, USAGE),
    }
    Ok(())
}

fn print_dashboard(d: &Dashboard) {
    let Some(s) = &d.summary else {
        println!("No predictions recorded yet.");
        return;
    };
    println!("Total analyses:   {}", s.total);
    println!("Positive:         {}", s.positive_count);
    println!("Negative:         {}", s.negative_count);
    if let Some(rate) = d.detection_rate {
        println!("Detection rate:   {:.1}%", rate * 100.0);
    }
    println!("Mean probability: {:.2}%", s.mean_probability * 100.0);
    println!("Min / max:        {:.2}% / {:.2}%", s.min_probability * 100.0, s.max_probability * 100.0);
    println!("Unique subjects:  {}", s.unique_subjects);
    println!("Risk buckets:");
    for (label, count) in s.risk_buckets.rows() {
        println!("  {:<8} {}", label, count);
    }
    match &d.drift {
        Some(drift) => {
            println!(
                "Drift ({}-record window): {:+.2} pts, {} (early {:.2}%, late {:.2}%)",
                drift.window,
                drift.drift_value,
                drift.trend.as_str(),
                drift.early_mean * 100.0,
                drift.late_mean * 100.0
            );
        }
        None => println!("Drift: not enough data"),
    }
}
