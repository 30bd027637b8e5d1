//! taskweb simulator
//!
//! Runs two board sessions against one in-memory store and walks through a
//! collaborative session: Alice creates a board and shares the link, Bob
//! joins, both edit tasks under the advisory lock, reorder columns, move a
//! task, and watch each other's presence.
//!
//! ## Usage
//!
//! ```bash
//! taskweb-sim
//! taskweb-sim --tasks 12 --name "Launch plan"
//! taskweb-sim --config client.ron
//! RUST_LOG=taskweb_client=debug taskweb-sim
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use taskweb_client::constants::DATE_FORMAT;
use taskweb_client::{
    AnonymousAuth, BoardError, BoardLocation, ClientConfig, DashboardStats, NavEvent, ReorderEvent,
    Session, StateSnapshot, calendar_date,
};
use taskweb_store::{DocumentStore, MemoryStore};
use taskweb_types::{Priority, TaskDraft, TaskPatch};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Simulate two users sharing a collaborative board.
#[derive(Parser, Debug)]
#[command(name = "taskweb-sim")]
#[command(about = "Two-user collaborative kanban simulation")]
struct Args {
    /// RON client config (missing file means defaults)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of tasks Alice creates
    #[arg(short, long, default_value_t = 6)]
    tasks: usize,

    /// Board name
    #[arg(long, default_value = "Launch plan")]
    name: String,

    /// Base URL for the share link
    #[arg(long, default_value = "https://taskweb.local/")]
    base_url: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => ClientConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => ClientConfig::default(),
    };

    let store = Arc::new(MemoryStore::new());
    let alice = Session::start(store.clone(), &AnonymousAuth::new(), config.clone()).await?;
    let bob = Session::start(store.clone(), &AnonymousAuth::new(), config).await?;
    echo_notices("alice", &alice);
    echo_notices("bob", &bob);

    run(&args, &store, &alice, &bob).await?;

    bob.unbind().await;
    alice.unbind().await;
    info!("simulation finished");
    Ok(())
}

async fn run(args: &Args, store: &Arc<MemoryStore>, alice: &Session, bob: &Session) -> Result<()> {
    // ── Alice creates and shares ──
    let board = alice.commands().create_board(true, Some(&args.name)).await?;
    alice.navigate(NavEvent::Push(board)).await?;
    let link = alice.share_link(&args.base_url).context("bound board has no share link")?;
    println!("alice created {board} and shared {link}");

    // ── Bob follows the link ──
    bob.navigate(NavEvent::Pop(BoardLocation::from_query(&link))).await?;
    wait_for(alice, |s| s.columns.len() >= 3).await?;
    wait_for(bob, |s| s.columns.len() >= 3).await?;
    let columns: Vec<_> = alice.state().snapshot().columns.iter().map(|c| c.id).collect();

    // ── Tasks ──
    let today = calendar_date(store.now_millis()).context("clock out of range")?;
    let yesterday = today.pred_opt().unwrap_or(today);
    for i in 0..args.tasks {
        let priority = Priority::ALL[i % Priority::ALL.len()];
        let due = if i % 2 == 0 { yesterday } else { today };
        let draft = TaskDraft::new(columns[i % columns.len()], format!("Task {}", i + 1))
            .with_priority(priority)
            .with_due_date(due.format(DATE_FORMAT).to_string());
        alice.commands().create_task(board, draft).await?;
    }
    wait_for(bob, |s| s.tasks.len() == args.tasks).await?;
    print_board("bob sees", &bob.state().snapshot());

    // ── Lock contention ──
    if let Some(first) = alice.state().snapshot().tasks.first().map(|t| t.id) {
        let mut editor = alice.open_task(first)?;
        wait_for(bob, |s| s.task(first).is_some_and(|t| t.locked_by == Some(alice.user()))).await?;

        let blocked = bob.open_task(first)?;
        println!(
            "bob opened {first} read-only: {} (held by {:?})",
            blocked.is_read_only(),
            blocked.lock_holder().map(|u| u.short())
        );
        let patch = TaskPatch { title: Some("Bob was here".into()), ..TaskPatch::default() };
        match bob.commands().update_task(board, first, patch, false).await {
            Err(BoardError::Locked { holder, .. }) => println!("bob's edit refused, locked by {}", holder.short()),
            Err(e) => warn!(error = %e, "unexpected update failure"),
            Ok(()) => bail!("update went through a held lock"),
        }
        blocked.close().await;

        let snapshot = alice.state().snapshot();
        if let Some(task) = snapshot.task(first) {
            let draft = TaskDraft::new(task.column_id, format!("{} (reviewed)", task.title))
                .with_priority(Priority::High)
                .with_description("Edited while holding the lock");
            editor.save(draft).await?;
        }
        editor.close().await;
        wait_for(bob, |s| s.task(first).is_some_and(|t| t.locked_by.is_none())).await?;
        println!("alice released {first}");
    }

    // ── Drag and drop ──
    let mut reversed = columns.clone();
    reversed.reverse();
    bob.apply_reorder(ReorderEvent::ColumnsReordered(reversed.clone())).await?;
    wait_for(alice, |s| s.columns.iter().map(|c| c.id).eq(reversed.iter().copied())).await?;

    let done = alice.state().snapshot().columns.iter().find(|c| c.is_done_column()).map(|c| c.id);
    let movable = alice.state().snapshot().tasks.iter().find(|t| Some(t.column_id) != done).map(|t| t.id);
    if let (Some(done), Some(task)) = (done, movable) {
        alice.apply_reorder(ReorderEvent::TaskMoved { task, column: done, index: 0 }).await?;
        wait_for(bob, |s| s.task(task).is_some_and(|t| t.column_id == done)).await?;
        println!("alice moved {task} to Done");
    }

    // ── Presence ──
    wait_for(alice, |s| s.active_users.len() == 2).await?;
    let initials: Vec<String> = alice.state().snapshot().active_users.iter().map(|u| u.initials()).collect();
    println!("active now: {}", initials.join(", "));

    print_board("alice sees", &alice.state().snapshot());
    print_dashboard(&alice.dashboard());
    Ok(())
}

/// Log every notice a session raises.
fn echo_notices(who: &'static str, session: &Session) {
    let mut rx = session.subscribe_notices();
    tokio::spawn(async move {
        while let Ok(notice) = rx.recv().await {
            info!(user = who, level = %notice.level, "{}", notice.message);
        }
    });
}

/// Poll until `cond` holds for the session's state.
async fn wait_for(session: &Session, cond: impl Fn(&StateSnapshot) -> bool) -> Result<()> {
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        while !cond(&session.state().snapshot()) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .with_context(|| format!("state did not settle within {deadline:?}"))
}

fn print_board(header: &str, snapshot: &StateSnapshot) {
    let name = snapshot.board.as_ref().map_or("(none)", |b| b.name.as_str());
    println!("{header} \"{name}\":");
    for column in &snapshot.columns {
        println!("  [{}]", column.title);
        for task in snapshot.tasks_in(column.id) {
            let lock = if task.locked_by.is_some() { " (locked)" } else { "" };
            let due = task.due_date.as_deref().unwrap_or("-");
            println!("    {} [{}] due {due}{lock}", task.title, task.priority);
        }
    }
}

fn print_dashboard(stats: &DashboardStats) {
    println!(
        "dashboard: {} tasks, {} high priority, {} overdue, {} completed",
        stats.total, stats.high_priority, stats.overdue, stats.completed
    );
    for (priority, count) in &stats.priorities {
        println!("  {priority}: {count} ({:.0}%)", stats.priority_share(*priority) * 100.0);
    }
    for recent in &stats.recent {
        let column = recent.column_title.as_deref().unwrap_or("?");
        println!("  recent: {} in {column}", recent.title);
    }
}
