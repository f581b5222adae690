use crate::schedule::{FilterSelection, Selection};
use crate::source::Source;

use std::{error::Error as StdError, path::PathBuf, str::FromStr};

use anyhow::{anyhow, bail, Context, Error};
use chrono_tz::Tz;
use getopts::{Matches, Options};
use url::Url;

pub const DEFAULT_TIMEZONE: &str = "Europe/Warsaw";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub action_id: i64,
    pub status: String,
}

impl FromStr for StatusUpdate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (id, status) = s
            .split_once(':')
            .ok_or_else(|| anyhow!("expected ID:STATUS, got {s:?}"))?;
        let action_id = id
            .trim()
            .parse()
            .with_context(|| format!("action id {id:?} is not a number"))?;
        let status = status.trim();
        if status.is_empty() {
            bail!("status is empty in {s:?}");
        }

        Ok(StatusUpdate {
            action_id,
            status: status.to_string(),
        })
    }
}

/// A status change and the server it is posted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRequest {
    pub base: Url,
    pub change: StatusUpdate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub source: Source,
    pub timezone: Tz,
    pub token: Option<String>,
    pub selection: FilterSelection,
    pub output: Option<PathBuf>,
    pub update: Option<UpdateRequest>,
}

#[derive(Debug)]
pub enum Invocation {
    Help(String),
    Run(Config),
}

fn opts() -> Options {
    let mut opts = Options::new();
    opts.optflag(
        "h",
        "help",
        concat!("Print the help output of ", env!("CARGO_PKG_NAME")),
    );
    opts.optopt(
        "z",
        "timezone",
        "Timezone used to assign entries to days [Default: Europe/Warsaw]",
        "TZ",
    );
    opts.optopt("t", "token", "Bearer token sent with HTTP requests", "TOKEN");
    opts.optopt("p", "party", "Only show entries of this responsible party", "ID");
    opts.optopt("d", "day", "Only show entries starting on this day", "YYYY-MM-DD");
    opts.optopt("s", "status", "Only show entries with this status", "STATUS");
    opts.optopt("c", "category", "Only show entries of this category", "NAME");
    opts.optopt("o", "output", "Write the view to a file instead of stdout", "FILE");
    opts.optopt(
        "u",
        "update-status",
        "Post a status change for one action instead of rendering",
        "ID:STATUS",
    );
    opts
}

/// Reads the command line (without the program name). Values missing from the
/// command line are looked up through `env`.
pub fn parse<F>(args: &[String], env: F) -> Result<Invocation, Error>
where
    F: Fn(&str) -> Option<String>,
{
    let opts = opts();
    let matches = opts.parse(args)?;

    if matches.opt_present("help") {
        let brief = format!("Usage: {} [options] SOURCE", env!("CARGO_PKG_NAME"));
        return Ok(Invocation::Help(opts.usage(&brief)));
    }

    let location = matches
        .free
        .first()
        .cloned()
        .or_else(|| env("SCHEDULE_SOURCE"))
        .ok_or_else(|| anyhow!("no SOURCE given and SCHEDULE_SOURCE is not set"))?;
    let source = Source::parse(&location)
        .with_context(|| format!("source {location:?} is not a valid address"))?;

    let timezone_name = matches
        .opt_str("timezone")
        .or_else(|| env("SCHEDULE_TIMEZONE"))
        .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
    let timezone = timezone_name
        .parse::<Tz>()
        .map_err(|err| anyhow!("unknown timezone {timezone_name:?}: {err}"))?;

    let selection = FilterSelection {
        party: selection(&matches, "party")?,
        day: selection(&matches, "day")?,
        status: selection(&matches, "status")?,
        category: selection(&matches, "category")?,
    };

    let update = match matches.opt_str("update-status") {
        Some(spec) => {
            let change = spec.parse::<StatusUpdate>()?;
            let Source::Http(url) = &source else {
                bail!("status updates need an http(s) SOURCE");
            };
            Some(UpdateRequest {
                base: url.join("/")?,
                change,
            })
        }
        None => None,
    };

    Ok(Invocation::Run(Config {
        source,
        timezone,
        token: matches.opt_str("token").or_else(|| env("SCHEDULE_API_TOKEN")),
        selection,
        output: matches.opt_str("output").map(PathBuf::from),
        update,
    }))
}

fn selection<T>(matches: &Matches, name: &str) -> Result<Selection<T>, Error>
where
    T: FromStr,
    T::Err: StdError + Send + Sync + 'static,
{
    match matches.opt_str(name) {
        Some(value) => value
            .parse()
            .with_context(|| format!("invalid value {value:?} for --{name}")),
        None => Ok(Selection::All),
    }
}
