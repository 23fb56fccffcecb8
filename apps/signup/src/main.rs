mod config;

use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::Parser;
use signup_core::{
    JsonFileProgressStore, SiteStep, SiteStepOptions, WpcomClient, SITE, SITE_TITLE,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Fill in, validate and submit the site step of the signup flow")]
struct Args {
    #[arg(long, default_value = "signup.toml")]
    config: PathBuf,
    #[arg(long)]
    api_base: Option<String>,
    #[arg(long)]
    progress_path: Option<PathBuf>,
    #[arg(long)]
    site: Option<String>,
    #[arg(long)]
    site_title: Option<String>,
    /// Submit the step instead of only validating it.
    #[arg(long)]
    submit: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
    let args = Args::parse();

    let mut settings = config::load_settings(&args.config);
    if let Some(api_base) = args.api_base {
        settings.api_base = api_base;
    }
    if let Some(progress_path) = args.progress_path {
        settings.progress_path = progress_path;
    }

    let api = WpcomClient::new(&settings.api_base)
        .with_context(|| format!("invalid api base '{}'", settings.api_base))?
        .with_credentials(settings.credentials());
    let progress = JsonFileProgressStore::new(&settings.progress_path);
    info!(
        api_base = %api.api_base(),
        progress = %progress.path().display(),
        "mounting site step"
    );

    let step = SiteStep::mount(
        Arc::new(api),
        Arc::new(progress),
        SiteStepOptions {
            debounce_wait: settings.debounce_wait(),
            login_url: settings.login_url.clone(),
            ..SiteStepOptions::default()
        },
    )
    .context("failed to restore site step")?;

    if let Some(site_title) = args.site_title {
        step.handle_change(SITE_TITLE, site_title)?;
    }
    if let Some(site) = args.site {
        step.handle_change(SITE, site)?;
    }

    if args.submit {
        match step.submit().await? {
            Some(submission) => {
                println!("{}", serde_json::to_string_pretty(&submission)?);
            }
            None => {
                print_errors(&step);
                step.unmount()?;
                bail!("site step has errors");
            }
        }
    } else {
        if let Err(err) = step.handle_blur().await {
            warn!(error = %err, "validation did not complete");
        }
        print_errors(&step);
        let form = step.form();
        println!(
            "site={:?} siteTitle={:?} valid={}",
            form.value(SITE),
            form.value(SITE_TITLE),
            form.is_field_valid(SITE) && form.is_field_valid(SITE_TITLE)
        );
    }

    step.unmount()?;
    Ok(())
}

fn print_errors(step: &SiteStep) {
    for field in [SITE, SITE_TITLE] {
        for message in step.error_messages(field) {
            eprintln!("{field}: {message}");
        }
    }
}
