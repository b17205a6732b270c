//! Repository check handler
//!
//! Opens one session exactly as a provisioning call would and reports what it
//! prepared.

use anyhow::{Context, Result};
use colored::Colorize;

use crate::context::CallContext;
use crate::git::{GitSyncEngine, SubmoduleDecision, SyncRequest};
use crate::logger;
use crate::settings::BrokerConfig;

/// Handle check command
pub fn handle_check(config: &BrokerConfig, keep: bool) -> Result<()> {
    let engine = GitSyncEngine::new(config.repository_handle()?);
    let mut ctx = CallContext::new();
    config.fill_context(&mut ctx);
    let request = SyncRequest::from_context(&ctx, engine.alias());

    println!(
        "{} {}",
        "Cloning".cyan().bold(),
        engine.handle().url.as_str()
    );

    let mut session = match engine.open_session(&request) {
        Ok(session) => session,
        Err(e) => {
            logger::log_to_file(&format!("check {}: {}", engine.handle().url, e))?;
            return Err(e).context("Repository check failed");
        }
    };

    let workdir = session.workdir()?.display().to_string();
    println!("  {} {}", "Workspace:".dimmed(), workdir);
    if let Some(intent) = session.branch_intent() {
        println!("  {} {}", "Checked out:".dimmed(), intent.checkout_source);
        println!("  {} {}", "Push target:".dimmed(), intent.target.green());
    }

    let submodules = session.submodules();
    if submodules.is_empty() {
        println!("  {} {}", "Submodules:".dimmed(), "none declared".dimmed());
    } else {
        println!("  {}", "Submodules:".dimmed());
        for path in submodules.paths() {
            let decision = match submodules.decision(path) {
                Some(SubmoduleDecision::Fetch) => "fetched".green(),
                _ => "skipped".yellow(),
            };
            println!("    {} {}", path, decision);
        }
    }

    session.close(!keep);
    if keep {
        println!("{} {}", "Workspace kept at".yellow(), workdir);
    }

    logger::log_to_file(&format!("check {}: ok", engine.handle().url))?;
    println!("{}", "Repository check succeeded".green().bold());
    Ok(())
}
