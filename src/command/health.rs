// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use chrono::Local;
use clap::Args;
use log::warn;
use tabled::Tabled;

use super::{print_rows, Context};
use crate::{cache::Observed, error::Result, gateway::model::Health};

#[derive(Tabled)]
struct Row<'row> {
    #[tabled(rename = "Component")]
    name: &'row str,
    #[tabled(rename = "Up")]
    up: &'static str,
}

fn print_health(health: &Health) {
    println!("Backend is {} ({} mode)", health.status, health.mode);
    print_rows(
        health.components.iter().map(|(name, up)| Row {
            name,
            up: if *up { "yes" } else { "no" },
        }),
        "No components reported",
    );
}

/// Check that the backend is reachable and healthy.
#[derive(Debug, Args)]
pub(crate) struct Command {
    /// Keep checking until interrupted.
    #[arg(long, short)]
    watch: bool,
}

#[async_trait]
impl super::Command for Command {
    async fn execute(self, ctx: &Context) -> Result<()> {
        if !self.watch {
            print_health(&*ctx.dashboard.health().await?);
            return Ok(());
        }

        let mut health = ctx.dashboard.watch_health(ctx.health_interval);
        while health.changed().await.is_ok() {
            match &*health.borrow_and_update() {
                Observed::Loading => {}
                Observed::Ready(health) => {
                    println!("{}", Local::now().format("%Y-%m-%d %H:%M:%S"));
                    print_health(health);
                }
                Observed::Failed(err) => warn!("Health check failed: {}", err),
            }
        }
        Ok(())
    }
}
