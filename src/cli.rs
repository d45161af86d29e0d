//! Command-line surface of the binary.
//!
//! Without arguments the app stays resident. Every other invocation loads
//! the store, runs one command through `App` and exits.

use crate::app::{App, AppError};
use crate::todo::types::{parse_timestamp, Category, Todo};
use chrono::NaiveDateTime;
use std::path::PathBuf;

pub const USAGE: &str = "usage: todotips [command]

  (no command)                  stay resident: reminders, hotkeys, notifications
  quick <text>                  add to today with reminders in 5 min, 15 min and 1 h
  add [-c today|week|month] [-d <description>] [--due <time>] <title>
  done <id>                     mark completed
  reopen <id>                   mark open again
  rm <id>                       delete
  remind <id> <time>            add a reminder
  list [today|week|month]       show todos
  export <file>                 write every bucket as JSON
  summary                       print a summary of every bucket

times: YYYY-MM-DD, YYYY-MM-DD HH:MM or YYYY-MM-DDTHH:MM:SS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Resident,
    Command(Command),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    QuickAdd(String),
    Add(NewTodo),
    Done(String),
    Reopen(String),
    Remove(String),
    Remind { id: String, at: NaiveDateTime },
    List(Option<Category>),
    Export(PathBuf),
    Summary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTodo {
    pub title: String,
    pub category: Category,
    pub description: Option<String>,
    pub due_date: Option<NaiveDateTime>,
}

impl Invocation {
    pub fn parse<I: IntoIterator<Item = String>>(args: I) -> Result<Self, String> {
        let mut args = args.into_iter();
        let Some(name) = args.next() else {
            return Ok(Invocation::Resident);
        };
        let rest: Vec<String> = args.collect();

        let command = match name.as_str() {
            "quick" => Command::QuickAdd(non_empty_text(&rest, "quick <text>")?),
            "add" => Command::Add(parse_add(&rest)?),
            "done" => Command::Done(single_id(&rest, "done <id>")?),
            "reopen" => Command::Reopen(single_id(&rest, "reopen <id>")?),
            "rm" => Command::Remove(single_id(&rest, "rm <id>")?),
            "remind" => match rest.as_slice() {
                [id, time @ ..] if !time.is_empty() => Command::Remind {
                    id: id.clone(),
                    at: parse_time(&time.join(" "))?,
                },
                _ => return Err("usage: todotips remind <id> <time>".to_string()),
            },
            "list" => match rest.as_slice() {
                [] => Command::List(None),
                [bucket] => Command::List(Some(parse_bucket(bucket)?)),
                _ => return Err("usage: todotips list [today|week|month]".to_string()),
            },
            "export" => match rest.as_slice() {
                [path] => Command::Export(PathBuf::from(path)),
                _ => return Err("usage: todotips export <file>".to_string()),
            },
            "summary" => Command::Summary,
            "help" | "-h" | "--help" => return Err(USAGE.to_string()),
            other => return Err(format!("unknown command '{}'\n\n{}", other, USAGE)),
        };

        Ok(Invocation::Command(command))
    }
}

fn parse_add(args: &[String]) -> Result<NewTodo, String> {
    let mut category = Category::Today;
    let mut description = None;
    let mut due_date = None;
    let mut words = Vec::new();

    let mut args = args.iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-c" | "--category" => {
                category = parse_bucket(flag_value(&mut args, arg)?)?;
            }
            "-d" | "--description" => {
                description = Some(flag_value(&mut args, arg)?.to_string());
            }
            "--due" => {
                due_date = Some(parse_time(flag_value(&mut args, arg)?)?);
            }
            word => words.push(word),
        }
    }

    let title = words.join(" ");
    if title.trim().is_empty() {
        return Err("usage: todotips add [-c <bucket>] [-d <description>] [--due <time>] <title>".to_string());
    }

    Ok(NewTodo {
        title,
        category,
        description,
        due_date,
    })
}

fn flag_value<'a>(
    args: &mut impl Iterator<Item = &'a String>,
    flag: &str,
) -> Result<&'a str, String> {
    args.next()
        .map(String::as_str)
        .ok_or_else(|| format!("{} needs a value", flag))
}

fn non_empty_text(args: &[String], usage: &str) -> Result<String, String> {
    let text = args.join(" ");
    if text.trim().is_empty() {
        return Err(format!("usage: todotips {}", usage));
    }
    Ok(text)
}

fn single_id(args: &[String], usage: &str) -> Result<String, String> {
    match args {
        [id] => Ok(id.clone()),
        _ => Err(format!("usage: todotips {}", usage)),
    }
}

fn parse_bucket(raw: &str) -> Result<Category, String> {
    let category = Category::from(raw.to_lowercase());
    if category.is_known() {
        Ok(category)
    } else {
        Err(format!("unknown list '{}' (expected today, week or month)", raw))
    }
}

fn parse_time(raw: &str) -> Result<NaiveDateTime, String> {
    parse_timestamp(raw).ok_or_else(|| format!("cannot read time '{}'", raw))
}

/// Runs one command against a started app and returns what to print.
pub async fn execute(app: &mut App, command: Command) -> Result<String, AppError> {
    match command {
        Command::QuickAdd(text) => app.quick_add(&text),
        Command::Add(new) => app.add_todo(
            &new.title,
            new.category,
            new.description.as_deref(),
            new.due_date,
        ),
        Command::Done(id) => {
            app.complete_todo(&id)?;
            Ok(format!("Completed {}", id))
        }
        Command::Reopen(id) => {
            let armed = app.reopen_todo(&id)?;
            Ok(format!("Reopened {} ({} reminders armed)", id, armed))
        }
        Command::Remove(id) => {
            app.delete_todo(&id)?;
            Ok(format!("Removed {}", id))
        }
        Command::Remind { id, at } => {
            app.add_reminder(&id, at)?;
            Ok(format!("Reminder for {} at {}", id, format_time(at)))
        }
        Command::List(bucket) => Ok(render_list(app, bucket.as_ref())),
        Command::Export(path) => {
            app.store().export_to_file(&path)?;
            Ok(format!("Exported to {}", path.display()))
        }
        Command::Summary => Ok(app.summarize().await?),
    }
}

fn render_list(app: &App, bucket: Option<&Category>) -> String {
    let buckets: Vec<Category> = match bucket {
        Some(bucket) => vec![bucket.clone()],
        None => Category::BUCKETS.to_vec(),
    };

    let mut sections = Vec::with_capacity(buckets.len());
    for category in &buckets {
        let todos = app.store().list_by_category(category);
        let done = todos.iter().filter(|todo| todo.completed).count();

        let mut section = format!("{} ({}/{} done)", category, done, todos.len());
        for todo in todos {
            section.push('\n');
            section.push_str(&render_todo(todo));
        }
        sections.push(section);
    }

    sections.join("\n\n")
}

fn render_todo(todo: &Todo) -> String {
    let mark = if todo.completed { "x" } else { " " };
    let mut line = format!("  [{}] {}  {}", mark, todo.id, todo.title);
    if let Some(due) = todo.due_date {
        line.push_str(&format!("  (due {})", format_time(due)));
    }
    if !todo.description.is_empty() {
        line.push_str(&format!("\n        {}", todo.description));
    }
    line
}

fn format_time(at: NaiveDateTime) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}
