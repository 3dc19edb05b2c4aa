use clap::{Parser, Subcommand};
use futures::StreamExt;
use lesson_enroll_core::app::{build_native, NativeContext, CAPACITY_POLL_INTERVAL};
use lesson_enroll_core::client::request::ReqwestTransport;
use lesson_enroll_core::config::ClientConfig;
use lesson_enroll_core::error::Result;
use lesson_enroll_core::interface::EventSink;
use lesson_enroll_core::model::dtos::{AntiForgeryToken, EnrollmentRequest};
use lesson_enroll_core::model::structs::{NoticeLevel, UiEvent};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lesson_enroll", about = "Course enrollment client with an offline write queue")]
struct Cli {
    /// JSON config file
    #[arg(long, default_value = "lesson_enroll.json")]
    config: PathBuf,

    /// Anti-forgery header name, e.g. X-CSRF-TOKEN
    #[arg(long, env = "LESSON_ENROLL_CSRF_HEADER", requires = "csrf_token")]
    csrf_header: Option<String>,

    #[arg(long, env = "LESSON_ENROLL_CSRF_TOKEN", requires = "csrf_header")]
    csrf_token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Enroll in a course
    Enroll {
        #[arg(long)]
        course_id: i64,
        #[arg(long)]
        voucher: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        payment_method: Option<String>,
        #[arg(long)]
        agree_to_terms: bool,
    },
    /// Withdraw from a course
    Withdraw {
        #[arg(long)]
        enrollment_id: i64,
        #[arg(long, default_value = "")]
        reason: String,
    },
    /// Show seats left, or keep polling with --watch
    Capacity {
        #[arg(long)]
        course_id: i64,
        #[arg(long)]
        watch: bool,
    },
    Prerequisites {
        #[arg(long)]
        course_id: i64,
    },
    Voucher {
        #[arg(long)]
        code: String,
        #[arg(long)]
        course_id: i64,
    },
    /// List writes waiting in the offline queue
    Queue,
    /// Replay the offline queue
    Flush,
}

/// Prints notices, everything else goes to the debug log
struct ConsoleEvents;

impl EventSink for ConsoleEvents {
    fn emit(&self, event: UiEvent) {
        match event {
            UiEvent::Notice { level, message } => {
                let tag = match level {
                    NoticeLevel::Success => "ok",
                    NoticeLevel::Info => "info",
                    NoticeLevel::Warning => "warn",
                    NoticeLevel::Error => "error",
                };
                println!("[{tag}] {message}");
            }
            UiEvent::SessionExpired => println!("Please log in again and retry."),
            other => log::debug!("ui event: {other:?}"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = ClientConfig::load_or_default(&cli.config);

    let token = match (cli.csrf_header, cli.csrf_token) {
        (Some(header_name), Some(value)) => Some(AntiForgeryToken { header_name, value }),
        _ => None,
    };
    let (context, outbox) = build_native(&config, ConsoleEvents, token)?;
    let analytics = ReqwestTransport::new(config.request_timeout())?;

    // the outbox drains once the context (and its telemetry handle) is gone
    let command = async move {
        let result = run(&context, cli.command).await;
        drop(context);
        result
    };
    let delivery = async {
        match outbox {
            Some(outbox) => outbox.deliver(&analytics).await,
            None => 0,
        }
    };

    let (result, delivered) = futures::join!(command, delivery);
    log::debug!("delivered {delivered} telemetry record(s)");
    result
}

async fn run(context: &NativeContext, command: Command) -> Result<()> {
    match command {
        Command::Enroll {
            course_id,
            voucher,
            notes,
            payment_method,
            agree_to_terms,
        } => {
            let request = EnrollmentRequest {
                voucher_code: voucher,
                notes,
                payment_method,
                agree_to_terms,
                ..EnrollmentRequest::for_course(course_id)
            };
            let outcome = context.enroll_in_course(&request).await?;
            println!("{outcome:?}");
        }
        Command::Withdraw {
            enrollment_id,
            reason,
        } => {
            let outcome = context.withdraw_from_course(enrollment_id, &reason).await?;
            println!("{outcome:?}");
        }
        Command::Capacity { course_id, watch } => {
            print_capacity(context.check_capacity(course_id).await);
            if watch {
                let updates = context.capacity_updates(course_id, CAPACITY_POLL_INTERVAL);
                futures::pin_mut!(updates);
                while let Some(capacity) = updates.next().await {
                    print_capacity(capacity);
                }
            }
        }
        Command::Prerequisites { course_id } => {
            let check = context.validate_prerequisites(course_id).await;
            println!("met: {}", check.met);
            for course in &check.missing {
                println!("  missing: [{}] {}", course.id, course.title);
            }
            if check.can_request_waiver {
                println!("  a waiver can be requested");
            }
        }
        Command::Voucher { code, course_id } => {
            let validation = context.validate_voucher(&code, course_id).await;
            if validation.valid {
                println!("valid, discount {:.2}", validation.discount);
            } else {
                println!("invalid: {}", validation.message);
            }
        }
        Command::Queue => {
            let queued = context.queue().list()?;
            if queued.is_empty() {
                println!("offline queue is empty");
            }
            for op in queued {
                println!(
                    "{} {} {} (queued {})",
                    op.id,
                    op.method,
                    op.endpoint,
                    op.enqueued_at.to_rfc3339()
                );
            }
        }
        Command::Flush => {
            let report = context.on_online().await?;
            println!(
                "replayed {} operation(s), {} still queued",
                report.succeeded.len(),
                report.failed.len()
            );
        }
    }
    Ok(())
}

fn print_capacity(capacity: Option<lesson_enroll_core::model::structs::CapacityInfo>) {
    let Some(capacity) = capacity else {
        println!("capacity unavailable");
        return;
    };
    match (capacity.capacity, capacity.fill_percent()) {
        (Some(total), Some(percent)) => println!(
            "{}/{} enrolled ({percent:.0}%), waitlist {}{}",
            capacity.enrolled,
            total,
            capacity.waitlist_size,
            if capacity.is_at_capacity { ", full" } else { "" }
        ),
        _ => println!("{} enrolled, no cap", capacity.enrolled),
    }
}
