use std::sync::Arc;

use console::Term;
use retrogit::platform::PlatformClient;
use retrogit::repos::{RepoListing, Repository, aggregate_repos};
use retrogit::vintage::VintageReport;
use sea_orm::DatabaseConnection;

use crate::commands::shared::{build_services, deferred_limit, log_cache_stats, settle_deferred};
use crate::config::Config;

pub(crate) struct ReposArgs {
    pub(crate) wait: Option<u64>,
    pub(crate) redact: bool,
    pub(crate) json: bool,
}

pub(crate) async fn handle_repos(
    args: ReposArgs,
    config: &Config,
    db: &Arc<DatabaseConnection>,
) -> Result<(), Box<dyn std::error::Error>> {
    let services = build_services(config, db)?;
    let prefs = config.digest_preferences();
    let user = services.client.get_authenticated_user().await?;

    let (mut listing, mut report) =
        aggregate_repos(&services.client, &services.resolver, &user, &prefs).await?;

    let mut abandoned = 0;
    if !report.pending.is_empty() {
        let settled = settle_deferred(
            services.worker,
            &services.queue,
            Arc::new(services.resolver.clone()),
            deferred_limit(args.wait, config),
        )
        .await;
        abandoned = settled.abandoned;
        // Only a fully drained queue can be re-read without scheduling into a
        // worker that has already stopped.
        if abandoned == 0 {
            (listing, report) =
                aggregate_repos(&services.client, &services.resolver, &user, &prefs).await?;
        }
    }

    if args.redact {
        listing.redact();
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&listing)?);
    } else {
        print_listing(&listing);
    }
    report_vintage_problems(&report, abandoned);
    log_cache_stats(services.cache.as_ref());

    Ok(())
}

fn repo_line(repo: &Repository) -> String {
    let kind = match repo.type_as_class_name() {
        "" => String::new(),
        class => format!(" ({class})"),
    };
    format!(
        "  {:<48} {}{}",
        repo.repo.full_name,
        repo.display_vintage(),
        kind
    )
}

fn print_listing(listing: &RepoListing) {
    let oldest = listing.oldest_vintage.format(retrogit::repos::VINTAGE_DATE_FORMAT);

    println!("Your repositories");
    for repo in &listing.user_repos {
        println!("{}", repo_line(repo));
    }
    for group in &listing.other_user_repos {
        println!();
        println!("{}'s repositories", group.user.login);
        for repo in &group.repos {
            println!("{}", repo_line(repo));
        }
    }
    for group in &listing.org_repos {
        println!();
        println!("{} organization", group.org.login);
        for repo in &group.repos {
            println!("{}", repo_line(repo));
        }
    }
    println!();
    println!(
        "{} repositories, earliest activity {}",
        listing.all_repos.len(),
        oldest
    );
}

fn report_vintage_problems(report: &VintageReport, abandoned: usize) {
    let is_tty = Term::stderr().is_term();

    for failure in &report.failures {
        if is_tty {
            eprintln!("warning: {}", failure.error);
        } else {
            tracing::warn!(repo = %failure.repo, error = %failure.error, "vintage unavailable");
        }
    }

    if let Some(hint) = pending_hint(report, abandoned) {
        if is_tty {
            eprintln!("{hint}:");
            for repo in &report.pending {
                eprintln!("  {repo}");
            }
        } else {
            tracing::warn!(pending = ?report.pending, "{hint}");
        }
    }
}

/// What to tell the user about vintages that are still unresolved.
fn pending_hint(report: &VintageReport, abandoned: usize) -> Option<String> {
    if report.pending.is_empty() {
        return None;
    }
    Some(if abandoned > 0 {
        format!(
            "{abandoned} deferred vintage computations did not finish and will resume on the \
             next run (pass --wait to allow longer)"
        )
    } else {
        format!(
            "GitHub is still computing statistics for {} repositories",
            report.pending.len()
        )
    })
}
