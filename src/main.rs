use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use charlot::config::{Settings, FORECAST_DAYS};
use charlot::db::{self, LogOnError};
use charlot::domain::{Bucket, DueItem, Item, ItemFields, UserDifficulty};
use charlot::events::JsonlEventLog;
use charlot::paths;
use charlot::progress::ProgressTracker;
use charlot::services::StudyService;
use charlot::session::{ReviewSession, SessionStatus, Step};

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "charlot", about = "Vocabulary notebook with spaced repetition", version)]
struct Cli {
  /// Database file (overrides config.toml and CHARLOT_DB_PATH)
  #[arg(long, global = true)]
  db: Option<PathBuf>,

  /// Output format
  #[arg(long, global = true, default_value = "plain")]
  format: OutputFormat,

  /// Record events in the data directory when no event log is configured
  #[arg(long, global = true)]
  log_events: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
  Plain,
  Json,
}

#[derive(Subcommand)]
enum Command {
  /// Add an item
  Add {
    front: String,
    back: String,
    #[arg(long)]
    language: Option<String>,
    /// Comma-separated tags
    #[arg(long)]
    tags: Option<String>,
    #[arg(long)]
    example: Option<String>,
    #[arg(long)]
    notes: Option<String>,
  },

  /// Change an item's content; omitted fields keep their value
  Edit {
    id: i64,
    #[arg(long)]
    front: Option<String>,
    #[arg(long)]
    back: Option<String>,
    #[arg(long)]
    language: Option<String>,
    #[arg(long)]
    tags: Option<String>,
    #[arg(long)]
    example: Option<String>,
    #[arg(long)]
    notes: Option<String>,
  },

  /// Delete an item and its review history
  Delete { id: i64 },

  /// Show an item with its schedule
  Show { id: i64 },

  /// List items, most recently edited first
  List {
    /// Substring of front, back, example or notes
    #[arg(long, default_value = "")]
    filter: String,
    #[arg(long, default_value = "")]
    tag: String,
    /// Only items added on this date (YYYY-MM-DD)
    #[arg(long)]
    created_on: Option<NaiveDate>,
    /// Only items in this bucket: new, easy, meh or difficult
    #[arg(long)]
    bucket: Option<String>,
  },

  /// List all tags
  Tags,

  /// List items due for review
  Due {
    /// Date to check against (default: today)
    #[arg(long)]
    as_of: Option<NaiveDate>,
  },

  /// Grade one item: 1 = very easy .. 5 = very hard
  Grade {
    id: i64,
    #[arg(value_parser = clap::value_parser!(i64).range(1..=5))]
    difficulty: i64,
  },

  /// Review due items interactively
  Review {
    #[arg(long)]
    as_of: Option<NaiveDate>,
  },

  /// Buckets, progress and upcoming reviews
  Stats {
    /// Forecast window in days
    #[arg(long, default_value_t = FORECAST_DAYS)]
    days: u32,
  },
}

fn main() -> ExitCode {
  tracing_subscriber::registry()
    .with(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "charlot=info".into()),
    )
    .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
    .init();

  let cli = Cli::parse();
  match run(cli) {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      eprintln!("error: {}", e);
      ExitCode::FAILURE
    }
  }
}

fn run(cli: Cli) -> CliResult {
  let mut settings = Settings::load();
  if let Some(path) = cli.db {
    settings.database_path = path;
  }
  if cli.log_events && settings.event_log.is_none() {
    settings.event_log = Some(PathBuf::from(paths::event_log_path()));
  }

  let pool = db::init_db(&settings.database_path)?;
  let mut svc = StudyService::from_settings(pool.clone(), &settings);

  if let Some(path) = &settings.event_log {
    if let Some(log) = JsonlEventLog::open(path).log_warn("Event log disabled") {
      svc.subscribe(Arc::new(log));
    }
  }
  let tracker = Arc::new(ProgressTracker::new(pool, settings.retry, svc.clock().clone()));
  tracker.reconcile_with_item_count().log_warn("Could not reconcile XP");
  svc.subscribe(tracker.clone());

  let format = cli.format;
  match cli.command {
    Command::Add { front, back, language, tags, example, notes } => {
      let fields = ItemFields {
        language: language.unwrap_or_default(),
        front,
        back,
        tags: tags.unwrap_or_default(),
        example: example.unwrap_or_default(),
        notes: notes.unwrap_or_default(),
      };
      let id = svc.create_item(&fields)?;
      match format {
        OutputFormat::Json => print_json(&serde_json::json!({ "id": id }))?,
        OutputFormat::Plain => println!("Added item {}", id),
      }
    }
    Command::Edit { id, front, back, language, tags, example, notes } => {
      let item = svc.get_item(id)?.ok_or(charlot::Error::NotFound(id))?;
      let fields = ItemFields {
        language: language.unwrap_or(item.language),
        front: front.unwrap_or(item.front),
        back: back.unwrap_or(item.back),
        tags: tags.unwrap_or(item.tags),
        example: example.unwrap_or(item.example),
        notes: notes.unwrap_or(item.notes),
      };
      svc.update_item(id, &fields)?;
      if format == OutputFormat::Plain {
        println!("Updated item {}", id);
      }
    }
    Command::Delete { id } => {
      let deleted = svc.delete_item(id)?;
      match format {
        OutputFormat::Json => print_json(&serde_json::json!({ "id": id, "deleted": deleted }))?,
        OutputFormat::Plain if deleted => println!("Deleted item {}", id),
        OutputFormat::Plain => println!("No item {}", id),
      }
    }
    Command::Show { id } => {
      let due = svc.get_item_with_review(id)?.ok_or(charlot::Error::NotFound(id))?;
      let preview = svc.preview(id)?;
      match format {
        OutputFormat::Json => print_json(&serde_json::json!({
          "item": due.item,
          "review": due.review,
          "bucket": charlot::srs::bucket(due.review.last_quality).as_str(),
          "preview": preview,
        }))?,
        OutputFormat::Plain => print_item_detail(&due, &preview),
      }
    }
    Command::List { filter, tag, created_on, bucket } => {
      let narrowed = created_on.is_some() || bucket.is_some();
      let mut items = match (created_on, bucket) {
        (Some(date), _) => svc.items_created_on(date)?,
        (None, Some(name)) => {
          let bucket = Bucket::from_str(name.trim())
            .ok_or_else(|| charlot::Error::validation(format!("unknown bucket '{}'", name)))?;
          svc.items_in_bucket(bucket)?
        }
        (None, None) => svc.list_items(&filter, &tag)?,
      };
      // Date and bucket listings still honour --tag
      if narrowed && !tag.trim().is_empty() {
        items.retain(|item| item.has_tag(&tag));
      }
      match format {
        OutputFormat::Json => print_json(&items)?,
        OutputFormat::Plain => print_items(&items),
      }
    }
    Command::Tags => {
      let tags = svc.all_tags()?;
      match format {
        OutputFormat::Json => print_json(&tags)?,
        OutputFormat::Plain if tags.is_empty() => println!("No tags."),
        OutputFormat::Plain => println!("{}", tags.join("\n")),
      }
    }
    Command::Due { as_of } => {
      let as_of = as_of.unwrap_or_else(|| svc.today());
      let due = svc.due_items(as_of)?;
      match format {
        OutputFormat::Json => print_json(&due)?,
        OutputFormat::Plain if due.is_empty() => println!("Nothing due by {}.", as_of),
        OutputFormat::Plain => {
          println!("{} due by {}:", due.len(), as_of);
          for d in &due {
            println!("  [{}] {} (due {})", d.item.id, d.item.front, d.review.due_date);
          }
        }
      }
    }
    Command::Grade { id, difficulty } => {
      let state = svc.grade(id, UserDifficulty::new(difficulty)?)?;
      match format {
        OutputFormat::Json => print_json(&state)?,
        OutputFormat::Plain => println!(
          "Item {}: next review {} (in {} days)",
          id, state.due_date, state.interval_days
        ),
      }
    }
    Command::Review { as_of } => {
      let as_of = as_of.unwrap_or_else(|| svc.today());
      review_loop(&svc, as_of)?;
    }
    Command::Stats { days } => {
      let counts = svc.bucket_counts()?;
      let progress = tracker.current()?;
      let (level, in_level, needed) = progress.level();
      let forecast = svc.due_forecast(days)?;
      match format {
        OutputFormat::Json => print_json(&serde_json::json!({
          "items": counts.total(),
          "buckets": counts,
          "progress": progress,
          "level": level,
          "forecast": forecast,
        }))?,
        OutputFormat::Plain => {
          println!("Items: {}", counts.total());
          for bucket in Bucket::ALL {
            println!("  {:<10} {}", bucket.as_str(), counts.get(bucket));
          }
          println!(
            "Level {} ({}/{} XP), {} XP total, streak {} day(s)",
            level, in_level, needed, progress.xp, progress.streak
          );
          println!("Due (cumulative):");
          for (day, count) in forecast {
            println!("  {}  {}", day, count);
          }
        }
      }
    }
  }
  Ok(())
}

fn review_loop(svc: &StudyService, as_of: NaiveDate) -> CliResult {
  let mut session = ReviewSession::start(svc, as_of)?;
  if session.status() == SessionStatus::NothingDue {
    println!("Nothing due by {}.", as_of);
    return Ok(());
  }

  let stdin = io::stdin();
  let mut lines = stdin.lock().lines();
  loop {
    let SessionStatus::InProgress { position, total } = session.status() else {
      break;
    };
    let Some(due) = session.current(svc)? else {
      // Deleted since the session started
      if session.skip() == Step::Completed {
        println!("Round complete.");
      }
      continue;
    };

    println!();
    println!("[{}/{}] {}", position + 1, total, due.item.front);
    prompt("(enter to reveal) ")?;
    let Some(line) = lines.next().transpose()? else {
      break;
    };
    if line.trim() == "q" {
      break;
    }

    println!("  {}", due.item.back);
    if !due.item.example.is_empty() {
      println!("  e.g. {}", due.item.example);
    }
    let preview = charlot::srs::preview_intervals(&due.review);
    let options: Vec<String> = UserDifficulty::all()
      .iter()
      .zip(preview)
      .map(|(d, days)| format!("{}={} ({}d)", d.value(), d.label(), days))
      .collect();
    println!("  {}", options.join("  "));

    let step = loop {
      prompt("grade 1-5, s skip, b back, q quit: ")?;
      let Some(line) = lines.next().transpose()? else {
        return Ok(());
      };
      match line.trim() {
        "q" => return Ok(()),
        "s" => break session.skip(),
        "b" => break session.back(),
        input => match input.parse::<i64>().map(UserDifficulty::new) {
          Ok(Ok(difficulty)) => {
            if let Some(graded) = session.grade(svc, difficulty)? {
              if let Some(state) = &graded.state {
                println!("  next review {} (in {} days)", state.due_date, state.interval_days);
              }
              break graded.step;
            }
            return Ok(());
          }
          _ => println!("  enter 1-5, s, b or q"),
        },
      }
    };

    if step == Step::Completed {
      println!();
      println!("Round {} complete. Starting over from the first item.", session.rounds_completed());
    }
  }
  Ok(())
}

fn prompt(text: &str) -> io::Result<()> {
  print!("{}", text);
  io::stdout().flush()
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

fn print_items(items: &[Item]) {
  if items.is_empty() {
    println!("No items.");
    return;
  }
  let front_width = items.iter().map(|i| i.front.chars().count()).max().unwrap_or(5).clamp(5, 30);
  for item in items {
    let tags = if item.tags.is_empty() {
      String::new()
    } else {
      format!("  [{}]", item.tag_list().join(", "))
    };
    println!(
      "{:>5}  {:<fw$}  {}{}",
      item.id,
      item.front,
      item.back,
      tags,
      fw = front_width
    );
  }
}

fn print_item_detail(due: &DueItem, preview: &[i64; 5]) {
  let item = &due.item;
  let review = &due.review;
  println!("#{} ({})", item.id, item.language);
  println!("  front:   {}", item.front);
  println!("  back:    {}", item.back);
  if !item.tags.is_empty() {
    println!("  tags:    {}", item.tag_list().join(", "));
  }
  if !item.example.is_empty() {
    println!("  example: {}", item.example);
  }
  if !item.notes.is_empty() {
    println!("  notes:   {}", item.notes);
  }
  println!(
    "  due {}  interval {}d  reps {}  ease {:.2}  bucket {}",
    review.due_date,
    review.interval_days,
    review.repetitions,
    review.ease,
    charlot::srs::bucket(review.last_quality).as_str()
  );
  if review.is_new() {
    println!("  never reviewed");
  } else if let Some(at) = review.last_reviewed_at {
    println!("  last reviewed {}", at.format("%Y-%m-%d %H:%M"));
  }
  let labels: Vec<String> = preview
    .iter()
    .enumerate()
    .map(|(i, days)| format!("{}:{}d", i + 1, days))
    .collect();
  println!("  next intervals by difficulty  {}", labels.join("  "));
}
