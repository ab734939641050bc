use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "flushgraph", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a script and print every flush: plan, outcome and device commands.
    Run(RunArgs),
    /// Replay a script and print only the sorted plan of each flush.
    Plan(PlanArgs),
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Input script JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Print the whole replay report as JSON instead of text.
    #[arg(long)]
    json: bool,
}

#[derive(Parser, Debug)]
struct PlanArgs {
    /// Input script JSON.
    #[arg(long = "in")]
    in_path: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Run(args) => cmd_run(args),
        Command::Plan(args) => cmd_plan(args),
    }
}

fn read_script(path: &Path) -> anyhow::Result<flushgraph::script::Script> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read script '{}'", path.display()))?;
    let script = flushgraph::script::Script::from_json(&text).with_context(|| "parse script JSON")?;
    Ok(script)
}

fn cmd_run(args: RunArgs) -> anyhow::Result<()> {
    let script = read_script(&args.in_path)?;
    let replay = script.run().with_context(|| "replay script")?;

    if args.json {
        let out = serde_json::to_string_pretty(&replay).with_context(|| "encode report")?;
        println!("{out}");
        return Ok(());
    }

    for (n, f) in replay.flushes.iter().enumerate() {
        println!(
            "flush #{n} (step {}): {}",
            f.step,
            if f.ok { "ok" } else { "failed" }
        );
        for line in &f.plan {
            println!("  {line}");
        }
        for cmd in &f.commands {
            println!("    > {cmd}");
        }
    }
    let s = replay.stats;
    println!(
        "flushes={} failed={} executed={} merged={} reordered={} submits={}",
        s.flushes, s.failed_flushes, s.tasks_executed, s.merged_tasks, s.reordered_dags, replay.submits
    );
    if replay.unflushed_tasks > 0 {
        eprintln!("warning: {} tasks left unflushed", replay.unflushed_tasks);
    }
    Ok(())
}

fn cmd_plan(args: PlanArgs) -> anyhow::Result<()> {
    let script = read_script(&args.in_path)?;
    let replay = script.run().with_context(|| "replay script")?;
    for (n, f) in replay.flushes.iter().enumerate() {
        println!("flush #{n} (step {})", f.step);
        for line in &f.plan {
            println!("  {line}");
        }
    }
    Ok(())
}
