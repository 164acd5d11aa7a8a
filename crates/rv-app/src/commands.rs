//! Line commands of the interactive browser

use anyhow::{anyhow, bail, Result};
use rv_core::{ColumnSortOrientation, FindOptions, NavigationError, SelectionInput, TableNavigator};

pub const HELP: &str = "\
commands:
  home | end | pgup | pgdn       move the window
  scroll <0..1>                  jump to a relative position
  find <text> | findprev <text>  search the visible columns (find! searches from the top)
  sort <column> [desc]           make a column the primary sort key
  show <column> [desc] | hide <column> | toggle <column>
  select row|col <index> [ctrl|shift]
  help | quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Home,
    End,
    PageUp,
    PageDown,
    Scroll(f64),
    Find {
        pattern: String,
        forward: bool,
        from_top: bool,
    },
    Sort {
        column: String,
        ascending: bool,
    },
    Show {
        column: String,
        ascending: bool,
    },
    Hide(String),
    Toggle(String),
    Select {
        rows: bool,
        input: SelectionInput,
        index: usize,
    },
    Help,
    Quit,
}

impl Command {
    /// Parse one input line; blank lines yield `None`
    pub fn parse(line: &str) -> Result<Option<Command>> {
        let line = line.trim();
        let Some((word, rest)) = split_word(line) else {
            return Ok(None);
        };
        let command = match word {
            "home" => Command::Home,
            "end" => Command::End,
            "pgup" | "up" => Command::PageUp,
            "pgdn" | "down" => Command::PageDown,
            "scroll" => Command::Scroll(
                rest.parse()
                    .map_err(|_| anyhow!("scroll expects a number, got {:?}", rest))?,
            ),
            "find" | "find!" | "findprev" => Command::Find {
                pattern: rest.to_string(),
                forward: word != "findprev",
                from_top: word == "find!",
            },
            "sort" | "show" => {
                let (column, ascending) = column_and_direction(rest)?;
                if word == "sort" {
                    Command::Sort { column, ascending }
                } else {
                    Command::Show { column, ascending }
                }
            }
            "hide" => Command::Hide(required(rest, "hide")?),
            "toggle" => Command::Toggle(required(rest, "toggle")?),
            "select" => parse_select(rest)?,
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            other => bail!("unknown command {:?}; try help", other),
        };
        Ok(Some(command))
    }

    /// Run the command against a view; `Help` and `Quit` are handled by the caller
    pub fn apply(&self, view: &TableNavigator, options: FindOptions) -> Result<(), NavigationError> {
        match self {
            Command::Home => view.goto_start(),
            Command::End => view.goto_end(),
            Command::PageUp => view.page_up(),
            Command::PageDown => view.page_down(),
            Command::Scroll(fraction) => view.scroll_to_fraction(*fraction),
            Command::Find {
                pattern,
                forward: true,
                from_top,
            } => view.find_next(pattern, options, *from_top),
            Command::Find {
                pattern, from_top, ..
            } => view.find_previous(pattern, options, *from_top),
            Command::Sort { column, ascending } => {
                let description = view
                    .summary()
                    .and_then(|s| s.schema.find(column).cloned())
                    .ok_or_else(|| NavigationError::UnknownColumn(column.clone()))?;
                view.sort_first(ColumnSortOrientation::new(description, *ascending))
            }
            Command::Show { column, ascending } => view.show_column(column, *ascending),
            Command::Hide(column) => view.hide_column(column),
            Command::Toggle(column) => view.toggle_direction(column),
            Command::Select { rows, input, index } => {
                if *rows {
                    view.select_row(*input, *index);
                } else {
                    view.select_column(*input, *index);
                }
                Ok(())
            }
            Command::Help | Command::Quit => Ok(()),
        }
    }
}

fn split_word(line: &str) -> Option<(&str, &str)> {
    if line.is_empty() {
        return None;
    }
    Some(match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    })
}

fn required(rest: &str, command: &str) -> Result<String> {
    if rest.is_empty() {
        bail!("{} needs a column name", command);
    }
    Ok(rest.to_string())
}

fn column_and_direction(rest: &str) -> Result<(String, bool)> {
    match rest.rsplit_once(char::is_whitespace) {
        Some((column, "desc")) => Ok((column.trim().to_string(), false)),
        Some((column, "asc")) => Ok((column.trim().to_string(), true)),
        _ => Ok((required(rest, "sort")?, true)),
    }
}

fn parse_select(rest: &str) -> Result<Command> {
    let mut words = rest.split_whitespace();
    let rows = match words.next() {
        Some("row") => true,
        Some("col") | Some("column") => false,
        _ => bail!("select row|col <index> [ctrl|shift]"),
    };
    let index = words
        .next()
        .and_then(|w| w.parse().ok())
        .ok_or_else(|| anyhow!("select needs an index"))?;
    let input = match words.next() {
        None => SelectionInput::Plain,
        Some("ctrl") => SelectionInput::Ctrl,
        Some("shift") => SelectionInput::Shift,
        Some(other) => bail!("unknown modifier {:?}", other),
    };
    Ok(Command::Select { rows, input, index })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Command {
        Command::parse(line).unwrap().unwrap()
    }

    #[test]
    fn parses_movement() {
        assert_eq!(parse("home"), Command::Home);
        assert_eq!(parse("  pgdn "), Command::PageDown);
        assert_eq!(parse("scroll 0.25"), Command::Scroll(0.25));
        assert!(Command::parse("").unwrap().is_none());
        assert!(Command::parse("scroll half").is_err());
    }

    #[test]
    fn parses_search() {
        assert_eq!(
            parse("find two words"),
            Command::Find {
                pattern: "two words".into(),
                forward: true,
                from_top: false
            }
        );
        assert_eq!(
            parse("findprev x"),
            Command::Find {
                pattern: "x".into(),
                forward: false,
                from_top: false
            }
        );
        assert!(matches!(parse("find! x"), Command::Find { from_top: true, .. }));
    }

    #[test]
    fn parses_columns() {
        assert_eq!(
            parse("sort unit price desc"),
            Command::Sort {
                column: "unit price".into(),
                ascending: false
            }
        );
        assert_eq!(
            parse("show city"),
            Command::Show {
                column: "city".into(),
                ascending: true
            }
        );
        assert_eq!(parse("hide city"), Command::Hide("city".into()));
        assert!(Command::parse("toggle").is_err());
    }

    #[test]
    fn parses_selection() {
        assert_eq!(
            parse("select row 3 shift"),
            Command::Select {
                rows: true,
                input: SelectionInput::Shift,
                index: 3
            }
        );
        assert!(Command::parse("select cell 1").is_err());
        assert!(Command::parse("frobnicate").is_err());
    }
}
