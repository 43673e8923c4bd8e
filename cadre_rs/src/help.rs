//! Help page construction and rendering.
//!
//! The parser produces a [`HelpPage`] instead of printing anything itself;
//! rendering happens once, at the CLI boundary, where color enablement is
//! known.

use colored::{Color, Colorize};
use serde_json::Value;

/// A status marker rendered next to a name or above a description.
#[derive(Clone, Debug)]
pub struct HelpTag {
    pub text: String,
    pub color: Color,
}

/// One child listed on a group page.
#[derive(Clone, Debug)]
pub struct HelpEntry {
    pub name: String,
    pub description: Option<String>,
    pub tags: Vec<HelpTag>,
    pub is_group: bool,
}

/// One argument listed on a command page.
#[derive(Clone, Debug)]
pub struct HelpArgument {
    pub options: Vec<String>,
    pub help: Option<String>,
    pub required: bool,
    pub choices: Option<Vec<String>>,
    pub default: Option<Value>,
    pub arg_group: Option<String>,
    pub tags: Vec<HelpTag>,
}

/// A fully assembled help page, ready to render.
#[derive(Clone, Debug)]
pub enum HelpPage {
    /// Printed when the CLI is invoked with no arguments at all.
    Welcome {
        cli_name: String,
        version: String,
    },
    Group {
        prog: String,
        description: Option<String>,
        notices: Vec<HelpTag>,
        entries: Vec<HelpEntry>,
    },
    Command {
        prog: String,
        description: Option<String>,
        notices: Vec<HelpTag>,
        arguments: Vec<HelpArgument>,
    },
}

impl HelpPage {
    pub fn render(&self, enable_color: bool) -> String {
        match self {
            HelpPage::Welcome { cli_name, version } => {
                let mut out = String::new();
                out.push_str(&format!("{}\n", cli_name));
                out.push_str(&format!("version {}\n\n", version));
                out.push_str(&format!(
                    "Use `{} --help` to see available commands.\n",
                    cli_name
                ));
                out
            }
            HelpPage::Group {
                prog,
                description,
                notices,
                entries,
            } => {
                let mut out = String::new();
                out.push_str("\nGroup\n");
                out.push_str(&format!("    {}{}\n", prog, describe(description)));
                render_notices(&mut out, notices, enable_color);
                let width = entries
                    .iter()
                    .map(|e| e.name.len() + tag_width(&e.tags))
                    .max()
                    .unwrap_or(0);
                let groups: Vec<&HelpEntry> = entries.iter().filter(|e| e.is_group).collect();
                let commands: Vec<&HelpEntry> = entries.iter().filter(|e| !e.is_group).collect();
                if !groups.is_empty() {
                    out.push_str("\nSubgroups:\n");
                    for entry in groups {
                        render_entry(&mut out, entry, width, enable_color);
                    }
                }
                if !commands.is_empty() {
                    out.push_str("\nCommands:\n");
                    for entry in commands {
                        render_entry(&mut out, entry, width, enable_color);
                    }
                }
                out
            }
            HelpPage::Command {
                prog,
                description,
                notices,
                arguments,
            } => {
                let mut out = String::new();
                out.push_str("\nCommand\n");
                out.push_str(&format!("    {}{}\n", prog, describe(description)));
                render_notices(&mut out, notices, enable_color);
                let mut current_group: Option<&str> = None;
                let mut first_section = true;
                for argument in arguments {
                    let group = argument.arg_group.as_deref();
                    if first_section || group != current_group {
                        out.push_str(&format!("\n{}\n", group.unwrap_or("Arguments")));
                        current_group = group;
                        first_section = false;
                    }
                    render_argument(&mut out, argument, enable_color);
                }
                out
            }
        }
    }
}

fn describe(description: &Option<String>) -> String {
    match description {
        Some(text) => format!(" : {}", text),
        None => String::new(),
    }
}

fn tag_width(tags: &[HelpTag]) -> usize {
    tags.iter()
        .filter(|t| !t.text.is_empty())
        .map(|t| t.text.len() + 1)
        .sum()
}

fn paint(text: &str, color: Color, enable_color: bool) -> String {
    if enable_color {
        text.color(color).to_string()
    } else {
        text.to_string()
    }
}

fn render_notices(out: &mut String, notices: &[HelpTag], enable_color: bool) {
    for notice in notices {
        if !notice.text.is_empty() {
            out.push_str(&format!(
                "        {}\n",
                paint(&notice.text, notice.color, enable_color)
            ));
        }
    }
}

fn render_entry(out: &mut String, entry: &HelpEntry, width: usize, enable_color: bool) {
    let mut name = entry.name.clone();
    let mut painted = name.clone();
    for tag in &entry.tags {
        if tag.text.is_empty() {
            continue;
        }
        name.push_str(&format!(" {}", tag.text));
        painted.push_str(&format!(" {}", paint(&tag.text, tag.color, enable_color)));
    }
    let padding = " ".repeat(width.saturating_sub(name.len()));
    out.push_str(&format!(
        "    {}{}{}\n",
        painted,
        padding,
        describe(&entry.description)
    ));
}

fn render_argument(out: &mut String, argument: &HelpArgument, enable_color: bool) {
    let mut line = format!("    {}", argument.options.join(" "));
    if argument.required {
        line.push_str(" [Required]");
    }
    for tag in &argument.tags {
        if !tag.text.is_empty() {
            line.push_str(&format!(" {}", paint(&tag.text, tag.color, enable_color)));
        }
    }
    if let Some(help) = &argument.help {
        line.push_str(&format!(" : {}", help));
    }
    out.push('\n');
    out.push_str(&line);
    out.push('\n');
    if let Some(choices) = &argument.choices {
        out.push_str(&format!("        Allowed values: {}.\n", choices.join(", ")));
    }
    if let Some(default) = &argument.default {
        if !default.is_null() {
            out.push_str(&format!("        Default: {}.\n", render_default(default)));
        }
    }
}

fn render_default(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_welcome_page_names_the_cli() {
        let page = HelpPage::Welcome {
            cli_name: "mycli".to_string(),
            version: "1.2.3".to_string(),
        };
        let text = page.render(false);
        assert!(text.contains("mycli"));
        assert!(text.contains("version 1.2.3"));
    }

    #[test]
    fn test_group_page_separates_groups_and_commands() {
        let page = HelpPage::Group {
            prog: "cli net".to_string(),
            description: Some("Network things.".to_string()),
            notices: vec![],
            entries: vec![
                HelpEntry {
                    name: "list".to_string(),
                    description: Some("List them.".to_string()),
                    tags: vec![],
                    is_group: false,
                },
                HelpEntry {
                    name: "vpn".to_string(),
                    description: None,
                    tags: vec![HelpTag {
                        text: "[Preview]".to_string(),
                        color: Color::Cyan,
                    }],
                    is_group: true,
                },
            ],
        };
        let text = page.render(false);
        let subgroups_at = text.find("Subgroups:").unwrap();
        let commands_at = text.find("Commands:").unwrap();
        assert!(subgroups_at < commands_at);
        assert!(text.contains("vpn [Preview]"));
        assert!(text.contains("list"));
    }

    #[test]
    fn test_command_page_marks_required_and_choices() {
        let page = HelpPage::Command {
            prog: "cli thing make".to_string(),
            description: None,
            notices: vec![],
            arguments: vec![HelpArgument {
                options: vec!["--name".to_string(), "-n".to_string()],
                help: Some("The name.".to_string()),
                required: true,
                choices: Some(vec!["a".to_string(), "b".to_string()]),
                default: None,
                arg_group: None,
                tags: vec![],
            }],
        };
        let text = page.render(false);
        assert!(text.contains("--name -n [Required] : The name."));
        assert!(text.contains("Allowed values: a, b."));
    }
}
