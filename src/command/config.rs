// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use clap::Subcommand;

use super::{print_details, Context};
use crate::{
    error::Result,
    gateway::model::{Config, ConfigUpdate},
};

/// Parses `KEY=VALUE`. The value is read as JSON where it can be, so that
/// `offline_sync=true` sends a boolean and `mode=online` sends a string.
fn parse_setting(raw: &str) -> Result<(String, serde_json::Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{raw}`"))?;
    if key.is_empty() {
        return Err(format!("missing key in `{raw}`"));
    }

    let value = serde_json::from_str(value).unwrap_or_else(|_| value.into());
    Ok((key.to_owned(), value))
}

fn print_config(config: &Config) {
    let flag = |enabled: bool| Some(if enabled { "on" } else { "off" }.to_owned());
    print_details([
        ("Mode", Some(config.mode.to_string())),
        ("PACS", flag(config.features.pacs_integration)),
        ("RIS", flag(config.features.ris_integration)),
        ("FHIR", flag(config.features.fhir_integration)),
        ("Offline sync", flag(config.features.offline_sync)),
        ("Modalities", Some(config.supported_modalities.join(", "))),
        (
            "Max upload",
            Some(format!("{} MiB", config.max_upload_size / (1024 * 1024))),
        ),
    ]);
}

/// Show or change the backend configuration.
#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Show the current configuration.
    Get,
    /// Change configuration values.
    Set {
        /// Settings to apply, as KEY=VALUE.
        #[arg(required = true, value_parser = parse_setting)]
        settings: Vec<(String, serde_json::Value)>,
    },
}

#[async_trait]
impl super::Command for Command {
    async fn execute(self, ctx: &Context) -> Result<()> {
        match self {
            Self::Get => print_config(&*ctx.dashboard.config().await?),
            Self::Set { settings } => {
                let update: ConfigUpdate = settings.into_iter().collect();
                let ack = ctx.dashboard.update_config(update).await?;
                println!(
                    "{}{}",
                    ack.status,
                    ack.message.map(|m| format!(": {m}")).unwrap_or_default()
                );
                print_config(&*ctx.dashboard.config().await?);
            }
        }
        Ok(())
    }
}
