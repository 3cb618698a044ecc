//! Remote extension sync command

use anyhow::{Context, Result};
use indicatif::{MultiProgress, ProgressBar};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tabled::{settings::Style, Table};
use xext_extensions::{
    ChangeAction, ChangeListener, HttpDownloader, HttpTransport, RemoteSession,
    RemoteSyncEngine, SharedExtension,
};

use super::ExtensionRow;
use crate::cli::SyncArgs;
use crate::host::Host;
use crate::output;

/// Shows one progress bar per downloading remote extension
struct ProgressListener {
    multi: MultiProgress,
    bars: Mutex<HashMap<String, ProgressBar>>,
}

impl ProgressListener {
    fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
        }
    }

    fn clear(&self) {
        if let Ok(mut bars) = self.bars.lock() {
            for (_, bar) in bars.drain() {
                bar.finish_and_clear();
            }
        }
    }
}

impl ChangeListener for ProgressListener {
    fn on_change(&self, extensions: &[SharedExtension], action: ChangeAction) {
        let Ok(mut bars) = self.bars.lock() else {
            return;
        };
        for ext in extensions {
            let name = ext.name().to_string();
            match action {
                ChangeAction::Update if ext.load_remote_failed() => {
                    if let Some(bar) = bars.remove(&name) {
                        bar.abandon_with_message(format!("{} failed", name));
                    }
                }
                ChangeAction::Update => {
                    let bar = bars.entry(name).or_insert_with_key(|name| {
                        self.multi.add(output::download_bar(name))
                    });
                    bar.set_position((ext.download_progress() * 100.0).round() as u64);
                }
                ChangeAction::Add if ext.remote_loaded() => {
                    if let Some(bar) = bars.remove(&name) {
                        bar.finish_with_message(format!("{} loaded", name));
                    }
                }
                ChangeAction::Add | ChangeAction::Remove => {}
            }
        }
    }
}

/// Sign in to the extension server, load every published extension and
/// report the result
pub async fn run(host: &Host, args: SyncArgs) -> Result<()> {
    let network = &host.config.network;
    let mut transport = HttpTransport::new(args.endpoint.clone(), network)
        .context("Failed to create transport")?;
    if let Some(token) = &args.token {
        transport = transport.with_token(token.clone());
    }
    let downloader = HttpDownloader::new(network).context("Failed to create downloader")?;

    let engine = RemoteSyncEngine::new(
        host.paths.clone(),
        host.store.clone(),
        host.fs.clone(),
        Arc::new(downloader),
        Arc::new(transport),
        host.loader.clone(),
        &host.config.remote,
    );
    let listener = Arc::new(ProgressListener::new());
    if !args.json {
        engine.set_listener(listener.clone());
    }

    engine
        .start_session(RemoteSession::new(args.account.clone()))
        .await
        .with_context(|| format!("Failed to fetch extensions of {}", args.account))?;

    let waited = tokio::time::timeout(
        Duration::from_secs(network.download_timeout_secs),
        engine.wait_idle(),
    )
    .await;
    listener.clear();
    if waited.is_err() {
        output::warning("Timed out waiting for remote extensions");
    }

    let extensions = engine.extensions();
    let rows: Vec<ExtensionRow> = extensions.iter().map(|ext| ExtensionRow::new(ext)).collect();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else if rows.is_empty() {
        output::info(&format!("No remote extensions for {}", args.account));
    } else {
        println!("{}", Table::new(rows).with(Style::sharp()));
        for ext in extensions.iter().filter(|ext| ext.load_remote_failed()) {
            for issue in ext.issues() {
                output::error(&format!("{}: {}", ext.name(), issue.message));
            }
        }
    }

    if let Some(name) = &args.entry {
        let ext = engine
            .get(name)
            .with_context(|| format!("Remote extension '{}' not found", name))?;
        match engine
            .entry_url(&ext, args.referer.as_deref())
            .await
            .with_context(|| format!("Failed to resolve entry of {}", name))?
        {
            Some(url) => println!("{}", url),
            None => output::warning(&format!("{} has no entry", name)),
        }
    }

    engine.end_session();
    Ok(())
}
