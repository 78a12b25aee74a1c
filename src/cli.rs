use std::{
    future::Future,
    io::{self, Write},
    path::PathBuf,
    pin::Pin,
    time::Duration,
};

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use clap::{Parser, Subcommand};
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::{
    audio::fit_window,
    export::export_json,
    focus::FocusController,
    timeline::{format_date, format_duration, format_time, gap_message, TimelineItem},
};

const REDRAW_INTERVAL: Duration = Duration::from_millis(100);
const BAR_GLYPHS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

#[derive(Parser, Debug)]
#[command(name = "void", version, about = "Focus sessions with a live microphone meter")]
pub struct Cli {
    /// Directory holding the session store and settings.json
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start a session and show live levels until Ctrl-C
    Focus {
        /// End the session automatically after this many minutes
        #[arg(short, long)]
        minutes: Option<u64>,

        /// Number of bars to draw
        #[arg(short, long)]
        bars: Option<usize>,
    },
    /// Show completed sessions and the gaps between them
    Timeline,
    /// Delete one session by id
    Delete { id: String },
    /// Write the session history as JSON
    Export {
        /// Output file; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

pub async fn dispatch(command: Command, controller: &FocusController, bar_count: usize) -> Result<()> {
    match command {
        Command::Focus { minutes, bars } => {
            focus(controller, minutes, bars.unwrap_or(bar_count)).await
        }
        Command::Timeline => timeline(controller).await,
        Command::Delete { id } => delete(controller, &id).await,
        Command::Export { output } => export(controller, output).await,
    }
}

async fn focus(controller: &FocusController, minutes: Option<u64>, bars: usize) -> Result<()> {
    let session = controller.enter().await?;
    println!("Focusing ({}). Press Ctrl-C to stop.", session.id);
    if controller.permission_granted().await == Some(false) {
        eprintln!("Microphone access required to show levels; the session is still recorded.");
    }

    let mut deadline: Pin<Box<dyn Future<Output = ()> + Send>> = match minutes {
        Some(minutes) => Box::pin(time::sleep_until(
            Instant::now() + Duration::from_secs(minutes.saturating_mul(60)),
        )),
        None => Box::pin(std::future::pending()),
    };

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut levels = controller.levels();
    let mut redraw = time::interval(REDRAW_INTERVAL);
    redraw.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                result.context("failed to listen for Ctrl-C")?;
                break;
            }
            _ = &mut deadline => break,
            _ = redraw.tick() => {
                let line = render_bars(&levels.borrow_and_update(), bars);
                draw(&line, controller.elapsed_secs().await)?;
            }
        }
    }

    let finished = controller.exit().await?;
    controller.wait_for_fade().await;
    let faded = render_bars(&levels.borrow(), bars);
    draw(&faded, 0)?;
    println!();

    if let Some(session) = finished {
        println!("Focused for {}", format_duration(session.duration));
    }
    Ok(())
}

fn draw(bars: &str, elapsed_secs: u64) -> Result<()> {
    let mut stdout = io::stdout().lock();
    write!(stdout, "\r{bars}  {:>10}", format_duration(elapsed_secs))?;
    stdout.flush()?;
    Ok(())
}

/// Levels as block glyphs, sized to `bars` the same way the ring adapts to
/// a display.
pub fn render_bars(levels: &[f32], bars: usize) -> String {
    fit_window(levels, bars)
        .into_iter()
        .map(|level| {
            let index = (level.clamp(0.0, 1.0) * (BAR_GLYPHS.len() - 1) as f32).round() as usize;
            BAR_GLYPHS[index.min(BAR_GLYPHS.len() - 1)]
        })
        .collect()
}

async fn timeline(controller: &FocusController) -> Result<()> {
    controller.refresh().await;
    let now = Local::now();
    let items = controller.timeline_at(&now);

    if items.is_empty() {
        println!("No completed sessions yet.");
        return Ok(());
    }

    for item in items {
        match item {
            TimelineItem::Session(entry) => println!(
                "{:<10} {}-{}  {:>10}  {}",
                format_date(entry.start_time, &now),
                format_time(entry.start_time, &Local),
                format_time(entry.end_time, &Local),
                format_duration(entry.duration),
                entry.id,
            ),
            TimelineItem::Gap(entry) => println!("    ~ {}", gap_message(entry.duration)),
        }
    }
    Ok(())
}

async fn delete(controller: &FocusController, id: &str) -> Result<()> {
    let before = controller.refresh().await.len();
    let after = controller.delete(id).await.len();

    if after < before {
        println!("Deleted session {id}");
    } else {
        println!("No session with id {id}");
    }
    Ok(())
}

async fn export(controller: &FocusController, output: Option<PathBuf>) -> Result<()> {
    let sessions = controller.refresh().await;
    let json = export_json(&sessions, Utc::now())?;

    match output {
        Some(path) => {
            std::fs::write(&path, json)
                .with_context(|| format!("Failed to write export to {}", path.display()))?;
            println!("Exported {} sessions to {}", sessions.len(), path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}
