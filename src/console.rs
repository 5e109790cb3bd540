// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Interactive console commands.

use anyhow::{anyhow, bail, Context, Result};
use route_sync::{Coordinate, DestinationQuery};

pub const HELP: &str = "\
Commands:
  search <text|placeId>   resolve and route to a destination
  dest <lat>,<lng>        route to a coordinate
  origin <lat>,<lng>      set the origin manually
  select <n>              highlight route n (again to clear)
  clear-selection         remove the highlight
  clear                   forget the destination
  status                  show fetch status and recent diagnostics
  help                    show this help
  quit                    exit";

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Search(DestinationQuery),
    Destination(Coordinate),
    Origin(Coordinate),
    /// 0-based route index
    Select(usize),
    ClearSelection,
    Clear,
    Status,
    Help,
    Quit,
}

/// Parse `lat,lng` into a validated coordinate.
pub fn parse_coordinate(input: &str) -> Result<Coordinate> {
    let (lat, lng) = input
        .split_once(',')
        .ok_or_else(|| anyhow!("expected <lat>,<lng>, got '{input}'"))?;
    let lat: f64 = lat.trim().parse().context("invalid latitude")?;
    let lng: f64 = lng.trim().parse().context("invalid longitude")?;
    Ok(Coordinate::validated(lat, lng)?)
}

/// Parse one console line. Blank lines yield `None`.
pub fn parse_command(line: &str) -> Result<Option<ConsoleCommand>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (word, rest) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(word, rest)| (word, rest.trim()));

    let command = match word {
        "search" | "s" => {
            let query = DestinationQuery::from_input(rest)
                .ok_or_else(|| anyhow!("search needs a place name or place id"))?;
            ConsoleCommand::Search(query)
        }
        "dest" | "destination" => ConsoleCommand::Destination(parse_coordinate(rest)?),
        "origin" => ConsoleCommand::Origin(parse_coordinate(rest)?),
        "select" => {
            let number: usize = rest
                .parse()
                .with_context(|| format!("invalid route number '{rest}'"))?;
            let index = number
                .checked_sub(1)
                .ok_or_else(|| anyhow!("route numbers start at 1"))?;
            ConsoleCommand::Select(index)
        }
        "clear-selection" | "unselect" => ConsoleCommand::ClearSelection,
        "clear" => ConsoleCommand::Clear,
        "status" => ConsoleCommand::Status,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" | "q" => ConsoleCommand::Quit,
        other => bail!("unknown command '{other}' (try 'help')"),
    };
    Ok(Some(command))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search() {
        assert_eq!(
            parse_command("search  MG Road, Bengaluru ").unwrap(),
            Some(ConsoleCommand::Search(DestinationQuery::Text(
                "MG Road, Bengaluru".to_string()
            )))
        );
        assert_eq!(
            parse_command("search ChIJbU60yXAWrjsR4E9-UejD3_g").unwrap(),
            Some(ConsoleCommand::Search(DestinationQuery::PlaceId(
                "ChIJbU60yXAWrjsR4E9-UejD3_g".to_string()
            )))
        );
        assert!(parse_command("search   ").is_err());
    }

    #[test]
    fn test_parse_coordinates() {
        assert_eq!(
            parse_command("dest 12.95, 77.60").unwrap(),
            Some(ConsoleCommand::Destination(Coordinate::new(12.95, 77.60)))
        );
        assert!(parse_command("origin 12.95").is_err());
        assert!(parse_command("origin 95.0,77.0").is_err());
    }

    #[test]
    fn test_parse_select_is_one_based() {
        assert_eq!(
            parse_command("select 2").unwrap(),
            Some(ConsoleCommand::Select(1))
        );
        assert!(parse_command("select 0").is_err());
        assert!(parse_command("select two").is_err());
    }

    #[test]
    fn test_parse_misc() {
        assert_eq!(parse_command("   ").unwrap(), None);
        assert_eq!(parse_command("quit").unwrap(), Some(ConsoleCommand::Quit));
        assert_eq!(
            parse_command("clear-selection").unwrap(),
            Some(ConsoleCommand::ClearSelection)
        );
        assert!(parse_command("teleport").is_err());
    }
}
