use std::sync::Arc;

use chrono::Utc;
use retrogit::digest::{Digest, RepoDigest, build_digest};
use retrogit::platform::PlatformClient;
use retrogit::repos::aggregate_repos;
use sea_orm::DatabaseConnection;

use crate::commands::shared::{build_services, deferred_limit, log_cache_stats, settle_deferred};
use crate::config::Config;

const WINDOW_DATE_FORMAT: &str = "%A, %B %-d, %Y";
const SHORT_SHA_LEN: usize = 7;

pub(crate) async fn handle_digest(
    json: bool,
    config: &Config,
    db: &Arc<DatabaseConnection>,
) -> Result<(), Box<dyn std::error::Error>> {
    let services = build_services(config, db)?;
    let user = services.client.get_authenticated_user().await?;

    // Vintages narrow the digest to repositories the user was active in by then.
    let (listing, report) = aggregate_repos(
        &services.client,
        &services.resolver,
        &user,
        &config.digest_preferences(),
    )
    .await?;
    if !report.is_complete() {
        tracing::debug!(
            pending = report.pending.len(),
            failed = report.failures.len(),
            "some vintages unresolved, using creation dates"
        );
    }

    let digest = build_digest(
        &services.client,
        &user,
        &listing,
        &config.digest_options(),
        Utc::now(),
    )
    .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&digest)?);
    } else {
        print!("{}", render_digest(&digest));
    }

    // Retries scheduled while aggregating still need to land in the store.
    settle_deferred(
        services.worker,
        &services.queue,
        Arc::new(services.resolver.clone()),
        deferred_limit(None, config),
    )
    .await;
    log_cache_stats(services.cache.as_ref());

    Ok(())
}

fn render_repo(out: &mut String, repo_digest: &RepoDigest) {
    out.push_str(&format!("{}\n", repo_digest.repo.repo.full_name));
    for commit in &repo_digest.commits {
        let sha = commit.sha.get(..SHORT_SHA_LEN).unwrap_or(&commit.sha);
        out.push_str(&format!(
            "  {} {} {}\n",
            sha,
            commit.authored_at.format("%H:%M"),
            commit.title()
        ));
    }
}

fn render_digest(digest: &Digest) -> String {
    let mut out = format!(
        "{} on {}\n\n",
        digest.user.login,
        digest.window.start.format(WINDOW_DATE_FORMAT)
    );
    let mut any = false;
    for repo_digest in digest.active() {
        render_repo(&mut out, repo_digest);
        out.push('\n');
        any = true;
    }
    if !any {
        out.push_str("No commits on this day.\n");
    }
    out
}
