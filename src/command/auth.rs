// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use clap::Parser;
use log::{error, warn};
use secrecy::SecretString;
use tokio::io::{self, AsyncBufReadExt as _, BufReader};

use super::{or_dash, print_details, Context};
use crate::{
    error::{self, ErrorClass, Result},
    gateway::model::{Registration, Role, User},
    password::{Prompt as _, RequestBuilder},
    session::AuthCheck,
};

const MAX_ATTEMPTS: usize = 3;

async fn read_password_from_stdin() -> Result<SecretString> {
    let mut line = String::new();
    _ = BufReader::new(io::stdin()).read_line(&mut line).await?;
    Ok(SecretString::new(line.trim_end_matches(&['\r', '\n'][..]).to_owned()))
}

fn print_user(user: &User) {
    print_details([
        ("Username", Some(user.username.clone())),
        ("Name", user.full_name.clone()),
        ("Email", user.email.clone()),
        ("Role", user.role.map(|role| role.to_string())),
        ("ID", Some(user.id.clone())),
    ]);
}

async fn report_signed_in(ctx: &Context, user: &User) {
    println!("Signed in as {}", user.username);
    if !ctx.dashboard.credentials().is_persistent().await {
        warn!("The credential is kept in memory only and will be forgotten on exit");
    }
}

/// Sign in to the backend and store the credential for later commands.
#[derive(Debug, Parser)]
pub(crate) struct Login {
    /// The account to sign in as.
    #[arg(long, short, env = "RADIANT_USERNAME")]
    username: String,

    /// Read the password from the first line of standard input instead of
    /// prompting for it.
    #[arg(long)]
    password_stdin: bool,
}

#[async_trait]
impl super::Command for Login {
    async fn execute(self, ctx: &Context) -> Result<()> {
        if self.password_stdin {
            let password = read_password_from_stdin().await?;
            let user = ctx.session.login(&self.username, &password).await?;
            report_signed_in(ctx, &user).await;
            return Ok(());
        }

        let mut req = RequestBuilder::new(&self.username).into_request();
        for _ in 0..MAX_ATTEMPTS {
            let password = ctx
                .prompt
                .prompt(req)
                .await?
                .ok_or(error::Password::NoPrompt)?;

            match ctx.session.login(&self.username, &password).await {
                Ok(user) => {
                    report_signed_in(ctx, &user).await;
                    return Ok(());
                }
                Err(e) if e.class() == ErrorClass::Auth => {
                    warn!("Sign-in for {} was rejected: {}", self.username, e);
                    req = RequestBuilder::new(&self.username)
                        .with_error(&e.to_string())
                        .into_request();
                }
                Err(e) => return Err(e),
            }
        }

        error!("Giving up after {} attempts", MAX_ATTEMPTS);
        Err(error::Error::Command)
    }
}

/// Sign out and forget the stored credential.
#[derive(Debug, Parser)]
pub(crate) struct Logout {}

#[async_trait]
impl super::Command for Logout {
    async fn execute(self, ctx: &Context) -> Result<()> {
        ctx.session.logout().await;
        println!("Signed out");
        Ok(())
    }
}

/// Check the stored credential with the backend and show who it belongs to.
#[derive(Debug, Parser)]
pub(crate) struct Whoami {}

#[async_trait]
impl super::Command for Whoami {
    async fn execute(self, ctx: &Context) -> Result<()> {
        match ctx.session.check_auth().await {
            AuthCheck::Restored => {
                if let Some(user) = ctx.session.current().user() {
                    print_user(user);
                }
                Ok(())
            }
            AuthCheck::NoCredential => {
                println!("Not signed in");
                Err(error::Error::SignedOut)
            }
            AuthCheck::Rejected(_) => {
                println!("The stored credential is no longer valid; sign in again");
                Err(error::Error::SignedOut)
            }
        }
    }
}

/// Create a new account. This does not sign in.
#[derive(Debug, Parser)]
pub(crate) struct Register {
    #[arg(long, short)]
    username: String,

    #[arg(long, short)]
    email: String,

    /// The user's full display name.
    #[arg(long)]
    full_name: String,

    #[arg(long, value_enum, default_value_t = Role::Radiologist)]
    role: Role,

    /// Read the password from the first line of standard input instead of
    /// prompting for it.
    #[arg(long)]
    password_stdin: bool,
}

#[async_trait]
impl super::Command for Register {
    async fn execute(self, ctx: &Context) -> Result<()> {
        let password = if self.password_stdin {
            read_password_from_stdin().await?
        } else {
            ctx.prompt
                .prompt(RequestBuilder::new(&self.username).into_request())
                .await?
                .ok_or(error::Password::NoPrompt)?
        };

        let user = ctx
            .session
            .register(&Registration {
                username: self.username,
                email: self.email,
                password,
                full_name: self.full_name,
                role: self.role,
            })
            .await?;
        println!("Registered {} ({})", user.username, or_dash(user.email.as_deref()));
        Ok(())
    }
}
