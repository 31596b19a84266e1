// SPDX-FileCopyrightText: 2022-2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
#![deny(elided_lifetimes_in_paths)]
#![warn(
    rust_2018_idioms,
    future_incompatible,
    unused,
    unused_lifetimes,
    unused_qualifications,
    unused_results,
    anonymous_parameters,
    deprecated_in_future,
    elided_lifetimes_in_paths,
    explicit_outlives_requirements,
    keyword_idents,
    macro_use_extern_crate,
    missing_doc_code_examples,
    private_doc_tests,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::cargo,
    clippy::unseparated_literal_suffix,
    clippy::decimal_literal_representation,
    clippy::single_char_lifetime_names,
    clippy::fallible_impl_from,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::wildcard_enum_match_arm,
    clippy::deref_by_slicing,
    clippy::default_numeric_fallback,
    clippy::shadow_reuse,
    clippy::clone_on_ref_ptr,
    clippy::todo,
    clippy::string_add,
    clippy::use_debug,
    clippy::future_not_send
)]
#![cfg_attr(not(test), warn(clippy::panic_in_result_fn))]

mod cache;
mod command;
mod dashboard;
mod error;
mod gateway;
mod metadata;
mod password;
mod session;
mod storage;

use std::{path::PathBuf, process, sync::Arc, time::Duration};

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use command::Context;
use dashboard::Dashboard;
use error::Result;
use gateway::{
    credential::{Credential, CredentialStorage},
    transport::Http,
    CredentialStore, Gateway,
};
use log::{debug, error, warn};
use session::{AuthCheck, SessionManager};
use tokio_util::sync::CancellationToken;
use url::Url;

#[derive(Debug, Subcommand)]
enum Command {
    Login(command::auth::Login),
    Logout(command::auth::Logout),
    Whoami(command::auth::Whoami),
    Register(command::auth::Register),
    #[command(subcommand)]
    Patients(command::patients::Command),
    #[command(subcommand)]
    Studies(command::studies::Command),
    #[command(subcommand)]
    Analysis(command::analysis::Command),
    #[command(subcommand)]
    Reports(command::reports::Command),
    #[command(subcommand)]
    Config(command::config::Command),
    Health(command::health::Command),
}

impl Command {
    /// Whether the command needs a signed-in session before it runs.
    const fn requires_session(&self) -> bool {
        match *self {
            Self::Login(_) | Self::Logout(_) | Self::Whoami(_) | Self::Register(_) | Self::Health(_) => {
                false
            }
            Self::Patients(_)
            | Self::Studies(_)
            | Self::Analysis(_)
            | Self::Reports(_)
            | Self::Config(_) => true,
        }
    }
}

#[async_trait]
impl command::Command for Command {
    async fn execute(self, ctx: &Context) -> Result<()> {
        match self {
            Self::Login(cmd) => cmd.execute(ctx).await,
            Self::Logout(cmd) => cmd.execute(ctx).await,
            Self::Whoami(cmd) => cmd.execute(ctx).await,
            Self::Register(cmd) => cmd.execute(ctx).await,
            Self::Patients(cmd) => cmd.execute(ctx).await,
            Self::Studies(cmd) => cmd.execute(ctx).await,
            Self::Analysis(cmd) => cmd.execute(ctx).await,
            Self::Reports(cmd) => cmd.execute(ctx).await,
            Self::Config(cmd) => cmd.execute(ctx).await,
            Self::Health(cmd) => cmd.execute(ctx).await,
        }
    }
}

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// The base URL of the RadiantAI backend.
    #[arg(long, env = "RADIANT_API_URL", default_value = "http://localhost:8000", value_parser = Url::parse)]
    api_url: Url,

    /// Keep the sign-in credential in memory only, so that it is forgotten
    /// when the command exits.
    #[arg(long)]
    no_persist_credential: bool,

    /// How long to wait for the backend to answer a request, in seconds.
    #[arg(long, env = "RADIANT_TIMEOUT_SECS", default_value_t = 30)]
    timeout_secs: u64,

    /// How many more times a read is attempted when the backend cannot be
    /// reached.
    #[arg(long, env = "RADIANT_READ_RETRIES", default_value_t = 3)]
    read_retries: u32,

    /// Refetch cached reads older than this many seconds even if nothing
    /// changed them.
    #[arg(long, env = "RADIANT_STALE_AFTER_SECS")]
    stale_after_secs: Option<u64>,

    /// How often `health --watch` checks the backend, in seconds.
    #[arg(long, env = "RADIANT_HEALTH_INTERVAL_SECS", default_value_t = 30)]
    health_interval_secs: u64,

    /// The path to the Pinentry program to use when asking for a password.
    #[arg(long, value_hint = clap::ValueHint::ExecutablePath)]
    pinentry_program: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

async fn get_credential_storage(args: &Args) -> CredentialStorage {
    if !args.no_persist_credential {
        #[cfg(feature = "secret-service")]
        match storage::SecretService::new(&args.api_url).await {
            Ok(secret_service_storage) => return Box::new(secret_service_storage),
            Err(e) => {
                warn!("We need to fall back to unencrypted file storage because we can't connect to the secret service: {}", e);
            }
        }

        #[cfg(feature = "keychain")]
        match storage::Keychain::new(&args.api_url) {
            Ok(keychain_storage) => return Box::new(keychain_storage),
            Err(e) => {
                warn!("We need to fall back to unencrypted file storage because we can't connect to Keychain: {}", e);
            }
        }

        if let Some(file_storage) = storage::File::new("credential.json") {
            return Box::new(file_storage);
        }

        warn!("No place to keep the credential was found, so it will be forgotten on exit");
    }

    Box::new(storage::Memory::<Credential>::new())
}

async fn run(args: Args) -> Result<()> {
    let prompt: Vec<Box<dyn password::Prompt>> = vec![
        Box::new(args.pinentry_program.clone().map_or_else(
            password::PinentryPrompt::new,
            password::PinentryPrompt::new_with_executable,
        )),
        Box::new(password::RpasswordPrompt),
    ];

    let credentials = CredentialStore::open(get_credential_storage(&args).await).await?;
    let transport = Http::new(Duration::from_secs(args.timeout_secs))?;
    let gateway = Gateway::new(args.api_url, Arc::new(transport), credentials);
    debug!("Using the backend at {}", gateway.base());

    let consumer = CancellationToken::new();
    let interrupt = consumer.clone();
    _ = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("Interrupted, cancelling outstanding reads");
            interrupt.cancel();
        }
    });

    let options = cache::Options {
        read_retries: args.read_retries,
        stale_after: args.stale_after_secs.map(Duration::from_secs),
        ..cache::Options::default()
    };
    let ctx = Context {
        session: SessionManager::new(gateway.clone()),
        dashboard: Dashboard::new(gateway, options, consumer),
        prompt: Box::new(prompt),
        health_interval: Duration::from_secs(args.health_interval_secs),
    };

    if args.command.requires_session() {
        match ctx.session.check_auth().await {
            AuthCheck::Restored => {}
            AuthCheck::NoCredential | AuthCheck::Rejected(_) => {
                return Err(error::Error::SignedOut);
            }
        }
    }

    let result = command::Command::execute(args.command, &ctx).await;
    if let Err(ref e) = result {
        _ = ctx.session.observe_error(e).await;
    }

    result
}

#[tokio::main]
async fn main() {
    let logger_env = env_logger::Env::new()
        .filter_or("RADIANT_LOG", "warn")
        .write_style("RADIANT_LOG_STYLE");
    env_logger::Builder::from_env(logger_env).init();

    if let Err(e) = run(Args::parse()).await {
        error!("We encountered an error: {}", e);
        process::exit(1);
    };
}
