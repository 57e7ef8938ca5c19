//! Watch command: synth, resolve, then run every session.

use std::sync::Arc;

use anyhow::{Context, bail};

use crate::aws::{AwsCodeUploader, AwsContext, AwsFunctionResolver, FunctionResolver, resolve_targets};
use crate::build::{EsbuildBundler, TscCompiler};
use crate::cli::WatchArgs;
use crate::config::Settings;
use crate::io::{StatusSink, StatusUpdate, TerminalStatus};
use crate::manifest::Manifest;
use crate::session::{SessionDeps, WatchOptions, prepare_sessions, run_sessions};
use crate::synth::{SynthOptions, run_synth};

const RESOLVING_KEY: &str = "lambda";
const RESOLVING_TEXT: &str = "resolving lambda configuration";

pub async fn run_watch(settings: &Settings, args: &WatchArgs) -> anyhow::Result<()> {
    let status: Arc<dyn StatusSink> = Arc::new(TerminalStatus::new());
    let profile = args.profile.clone().or_else(|| settings.aws.profile.clone());

    if !args.no_synth {
        let synth = SynthOptions {
            app: args.app.clone(),
            profile: profile.clone(),
            context: args.context.clone(),
        };
        run_synth(&settings.tools.cdk, &synth, status.as_ref()).await?;
    }

    let manifest = Manifest::read(&settings.manifest_path)?;
    let context = AwsContext::new(manifest.region.clone(), profile);

    let resolver: Arc<dyn FunctionResolver> = Arc::new(AwsFunctionResolver::new(&context).await);
    let deps = SessionDeps {
        bundler: Arc::new(EsbuildBundler::new(
            &settings.tools.node,
            &settings.tools.esbuild,
        )?),
        compiler: Arc::new(TscCompiler::new(&settings.tools.tsc)?),
        uploader: Arc::new(AwsCodeUploader::new(&context).await),
        status,
    };
    let options = WatchOptions {
        out_dir: settings.out_dir.clone(),
        skip_initial: args.skip_initial || settings.watch.skip_initial,
        debounce_ms: settings.watch.debounce_ms,
    };

    watch_manifest(&manifest, &args.glob, resolver, deps, &options).await
}

/// Filter, resolve and watch. Returns only on a fatal error.
///
/// Resolution is all-or-nothing: if any entry cannot be resolved no session
/// is started.
pub async fn watch_manifest(
    manifest: &Manifest,
    glob: &str,
    resolver: Arc<dyn FunctionResolver>,
    deps: SessionDeps,
    options: &WatchOptions,
) -> anyhow::Result<()> {
    let filtered = manifest.filter(glob)?;
    if filtered.is_empty() {
        bail!("No Lambda functions matched {glob}");
    }
    crate::log_event!("watch", "matched", "{} functions", filtered.len());

    deps.status
        .put(RESOLVING_KEY, StatusUpdate::active(RESOLVING_TEXT));
    let targets = match resolve_targets(resolver, &filtered).await {
        Ok(targets) => {
            deps.status
                .put(RESOLVING_KEY, StatusUpdate::settled(RESOLVING_TEXT));
            targets
        }
        Err(e) => {
            deps.status.put(
                RESOLVING_KEY,
                StatusUpdate::settled(RESOLVING_TEXT).with_error(e.to_string()),
            );
            return Err(e).context("Failed to resolve deployed functions");
        }
    };

    let sessions = prepare_sessions(&filtered, targets, options, deps).await?;
    run_sessions(sessions, options).await?;
    Ok(())
}
