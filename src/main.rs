mod api;
mod app;
mod cache;
mod commands;
mod config;
mod event;
mod feed;
mod logging;
mod reviewer;
mod session;
#[cfg(test)]
mod testing;
mod ui;

use api::types::SubmitRequest;
use clap::{Parser, Subcommand};
use color_eyre::eyre::eyre;
use color_eyre::Result;
use feed::{LoadOutcome, Pager};
use reviewer::Reviewer;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "code-reviewer")]
#[command(about = "Terminal client for the code-reviewer mock interview backend")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/code-reviewer/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Skip the response cache for this run
  #[arg(long)]
  no_cache: bool,

  /// Run a single action instead of the terminal UI
  #[command(subcommand)]
  command: Option<Cmd>,
}

#[derive(Subcommand, Debug)]
enum Cmd {
  /// Print one page of job listings
  Jobs {
    #[arg(short, long, default_value_t = 1)]
    page: usize,
  },
  /// Print your past submissions
  Submissions {
    /// Number of pages to load
    #[arg(long, default_value_t = 1)]
    pages: u32,
  },
  /// Log in and remember the token
  Login {
    #[arg(long)]
    email: String,
    #[arg(long, env = "CODE_REVIEWER_PASSWORD", hide_env_values = true)]
    password: String,
  },
  /// Create an account
  Signup {
    #[arg(long)]
    email: String,
    #[arg(long, env = "CODE_REVIEWER_PASSWORD", hide_env_values = true)]
    password: String,
    /// Repeat of the password (defaults to --password)
    #[arg(long, env = "CODE_REVIEWER_PASSWORD_CONFIRM", hide_env_values = true)]
    confirm: Option<String>,
  },
  /// Forget the stored token
  Logout,
  /// Print the question for a job
  Question {
    /// Job id
    #[arg(required_unless_present = "random")]
    job: Option<String>,
    /// Pick a random question instead
    #[arg(long, conflicts_with = "job")]
    random: bool,
  },
  /// Print a past submission with its review
  Submission { id: String },
  /// Compile and run a file on the backend
  Compile {
    file: PathBuf,
    #[arg(short, long)]
    language: String,
  },
  /// Save a file as the answer to a job's question and print the review
  Submit {
    file: PathBuf,
    #[arg(short, long)]
    language: String,
    /// Job id whose question this answers
    #[arg(long)]
    job: String,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  let _log_guard = logging::init_logging(&config::data_dir()?)?;

  // Load configuration
  let mut config = config::Config::load(args.config.as_deref())?;
  if args.no_cache {
    config.cache.enabled = false;
  }
  info!(backend = %config.backend.url, cache = config.cache.enabled, "starting");

  let reviewer = Reviewer::new(config)?;

  match args.command {
    None => {
      let mut app = app::App::new(reviewer)?;
      app.run().await?;
    }
    Some(cmd) => run_command(&reviewer, cmd).await?,
  }

  Ok(())
}

async fn run_command(reviewer: &Reviewer, cmd: Cmd) -> Result<()> {
  match cmd {
    Cmd::Jobs { page } => {
      let listing = reviewer.job_listing();
      if reviewer.load_jobs(&listing).await == LoadOutcome::Failed {
        return Err(eyre!(listing.view().error.unwrap_or_default()));
      }

      let view = listing.view();
      let mut pager = Pager::new(view.total_pages, listing.page_size());
      pager.go_to(page);
      for job in pager.slice(&view.jobs) {
        println!("{:<26} {}", job.id, job.title);
      }
      println!("-- page {}/{}", pager.page(), pager.total_pages().max(1));
    }
    Cmd::Submissions { pages } => {
      let feed = reviewer.submission_feed();
      for _ in 0..pages {
        match reviewer.load_more_submissions(&feed).await {
          LoadOutcome::Failed => return Err(eyre!(feed.view().error.unwrap_or_default())),
          LoadOutcome::Exhausted => break,
          _ => {}
        }
      }
      for submission in feed.view().submissions {
        println!(
          "{:<26} {}  {}",
          submission.id,
          submission.created_at.format("%Y-%m-%d %H:%M"),
          submission.question_name
        );
      }
    }
    Cmd::Login { email, password } => {
      reviewer
        .session()
        .login(reviewer.api(), &email, &password)
        .await?;
      println!("Logged in as {}", email);
    }
    Cmd::Signup {
      email,
      password,
      confirm,
    } => {
      let confirm = confirm.unwrap_or_else(|| password.clone());
      reviewer
        .session()
        .signup(reviewer.api(), &email, &password, &confirm)
        .await?;
      println!("Account created. Log in with `code-reviewer login --email {}`", email);
    }
    Cmd::Logout => {
      reviewer.session().logout()?;
      println!("Logged out");
    }
    Cmd::Question { job, random } => {
      let question = match job {
        Some(id) if !random => reviewer.job_question(&id).await?,
        _ => reviewer.random_question().await?,
      };
      println!("{}\n\n{}", question.name, question.question);
    }
    Cmd::Submission { id } => {
      let detail = reviewer.submission(&id).await?;
      println!("{}\n\n{}", detail.question_name, detail.question);
      println!("\n--- Your code ---\n\n{}", detail.prompt);
      println!("\n--- Review ---\n\n{}", detail.review);
    }
    Cmd::Compile { file, language } => {
      let code = std::fs::read_to_string(&file)?;
      let outcome = reviewer.compile(&code, &language).await?;
      println!("Status: {}", outcome.compile_status);
      println!(
        "Time: {}s  Memory: {}KB",
        outcome.time_used, outcome.memory_used
      );
      println!("\n{}", outcome.output);
    }
    Cmd::Submit {
      file,
      language,
      job,
    } => {
      let prompt = std::fs::read_to_string(&file)?;
      let question = reviewer.job_question(&job).await?;
      let review = reviewer
        .submit(&SubmitRequest {
          prompt,
          language,
          question_name: question.name,
          question: question.question,
        })
        .await?;
      println!("{}", review.message);
    }
  }

  Ok(())
}
