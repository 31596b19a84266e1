// SPDX-FileCopyrightText: 2022-2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use async_trait::async_trait;
use tabled::{settings::Style, Table, Tabled};

use crate::{dashboard::Dashboard, error::Result, password, session::SessionManager};

pub(crate) mod analysis;
pub(crate) mod auth;
pub(crate) mod config;
pub(crate) mod health;
pub(crate) mod patients;
pub(crate) mod reports;
pub(crate) mod studies;

/// Everything a command may use.
pub(crate) struct Context {
    pub(crate) session: SessionManager,
    pub(crate) dashboard: Dashboard,
    pub(crate) prompt: Box<dyn password::Prompt>,
    pub(crate) health_interval: Duration,
}

#[async_trait]
pub(crate) trait Command {
    async fn execute(self, ctx: &Context) -> Result<()>;
}

#[derive(Tabled)]
struct Detail {
    #[tabled(rename = "Field")]
    name: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

/// Prints one record as a two-column table, skipping unset values.
pub(crate) fn print_details<I: IntoIterator<Item = (&'static str, Option<String>)>>(fields: I) {
    let rows = fields
        .into_iter()
        .filter_map(|(name, value)| value.map(|value| Detail { name, value }));
    println!("{}", Table::new(rows).with(Style::rounded()));
}

/// Prints rows as a table, or a short note if there are none.
pub(crate) fn print_rows<T: Tabled, I: IntoIterator<Item = T>>(rows: I, empty: &str) {
    let mut rows = rows.into_iter().peekable();
    if rows.peek().is_none() {
        println!("{empty}");
    } else {
        println!("{}", Table::new(rows).with(Style::rounded()));
    }
}

pub(crate) fn or_dash(value: Option<&str>) -> String {
    value.map_or_else(|| "-".to_owned(), str::to_owned)
}
